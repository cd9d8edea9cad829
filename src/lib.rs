pub mod backend;
pub mod cli;
pub mod clipboard;
pub mod config;
pub mod controller;
pub mod models;
pub mod render;
pub mod stream;

use backend::HttpBackend;
use cli::terminal::TerminalView;
use cli::Args;
use config::ClientConfig;
use controller::ConversationController;
use log::{ info, warn };
use std::error::Error;
use std::sync::Arc;

pub async fn run(args: Args) -> Result<(), Box<dyn Error + Send + Sync>> {
    let config = ClientConfig::from_args(&args)?;
    let generation = &config.controller.generation;

    info!("--- Client Configuration ---");
    info!("Server URL: {}", config.server_url);
    info!("Mode: {}", generation.mode);
    info!("Temperature: {}", generation.temperature);
    info!("Max Tokens: {}", generation.max_tokens);
    info!("Tick Interval: {:?}", config.controller.tick);
    info!(
        "Reconcile: {} attempts, {:?} backoff",
        config.controller.reconcile.attempts,
        config.controller.reconcile.backoff
    );
    info!("Request Timeout: {:?}", config.request_timeout);
    if let Some(path) = &config.render_out {
        info!("HTML Preview: {}", path.display());
    }
    info!("----------------------------");

    let backend = Arc::new(HttpBackend::new(config.server_url.clone(), config.request_timeout)?);
    let mut controller = ConversationController::new(backend, config.controller.clone());
    let mut view = TerminalView::stdout(config.render_out.clone());

    if let Some(id) = &config.conversation {
        if let Err(e) = controller.open_conversation(id, &mut view).await {
            warn!("Could not open conversation {}: {}", id, e);
        }
    }

    cli::repl::run(&mut controller, &mut view, &config.server_url).await?;
    Ok(())
}
