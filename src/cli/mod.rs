pub mod command;
pub mod repl;
pub mod terminal;

use clap::Parser;
use std::path::PathBuf;

use crate::models::api::ChatMode;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Terminal chat client for a local Thursday backend", long_about = None)]
pub struct Args {
    // --- Backend ---
    /// Base URL of the chat backend (e.g., http://localhost:5000)
    #[arg(long, env = "THURSDAY_SERVER_URL", default_value = "http://localhost:5000")]
    pub server_url: String,

    /// Timeout in seconds for ordinary requests; bounds only the connect phase of completions
    #[arg(long, env = "THURSDAY_REQUEST_TIMEOUT_SECS", default_value = "120")]
    pub request_timeout_secs: u64,

    // --- Generation ---
    /// Backend pipeline: raw (plain proxy) or thursday (personality + memory)
    #[arg(long, env = "THURSDAY_MODE", default_value = "thursday")]
    pub mode: ChatMode,

    /// Sampling temperature sent with each completion
    #[arg(long, env = "THURSDAY_TEMPERATURE", default_value = "0.7")]
    pub temperature: f32,

    /// Upper bound on generated tokens per reply
    #[arg(long, env = "THURSDAY_MAX_TOKENS", default_value = "512")]
    pub max_tokens: u32,

    // --- Streaming ---
    /// Interval in milliseconds between elapsed-time updates while a reply streams
    #[arg(long, env = "THURSDAY_TICK_MS", default_value = "100")]
    pub tick_ms: u64,

    /// How many times to poll the conversation list after a reply
    #[arg(long, env = "THURSDAY_RECONCILE_ATTEMPTS", default_value = "3")]
    pub reconcile_attempts: u32,

    /// Base backoff in milliseconds between conversation list polls (grows linearly)
    #[arg(long, env = "THURSDAY_RECONCILE_BACKOFF_MS", default_value = "300")]
    pub reconcile_backoff_ms: u64,

    // --- Session ---
    /// Open this conversation id at start instead of a fresh one
    #[arg(long, env = "THURSDAY_CONVERSATION")]
    pub conversation: Option<String>,

    /// Write the rendered HTML of the streaming reply to this file after every token
    #[arg(long, env = "THURSDAY_RENDER_OUT")]
    pub render_out: Option<PathBuf>,
}
