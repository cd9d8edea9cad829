use log::{ debug, warn };
use std::future::Future;
use std::io::{ self, Write };
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader, Lines };
use url::Url;

use super::command::{ self, Command, Input, HELP_TEXT };
use super::terminal::{ format_conversations, format_reminders, printable, TerminalView, USER_LABEL };
use crate::backend::ApiError;
use crate::clipboard::{ self, CopyOutcome };
use crate::controller::{ ControllerError, ConversationController };

pub async fn run(
    controller: &mut ConversationController,
    view: &mut TerminalView,
    server_url: &Url
) -> io::Result<()> {
    println!("\n  Thursday  ·  {}\n", server_url);
    preflight(controller, server_url).await;
    println!("Type /help for commands.\n");

    let cancel = controller.cancel_handle();
    let interrupts = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling in-flight reply");
            cancel.cancel();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", USER_LABEL);
        io::stdout().flush()?;
        // Ctrl-C at the prompt quits; while a reply streams it only cancels.
        let line = match next_input(&mut lines, tokio::signal::ctrl_c()).await? {
            Prompt::Line(line) => line,
            Prompt::Closed => {
                println!();
                break;
            }
            Prompt::Interrupted => {
                println!("\n\nInterrupted.");
                break;
            }
        };
        let keep_going = match command::parse(&line) {
            Input::Empty => true,
            Input::Invalid(usage) => {
                println!("[!] {}\n", usage);
                true
            }
            Input::Chat(text) => {
                if let Err(e) = controller.send(&text, view).await {
                    report_stream_error(&e);
                }
                true
            }
            Input::Command(cmd) => dispatch(cmd, controller, view).await,
        };
        if !keep_going {
            break;
        }
    }

    interrupts.abort();
    println!("Goodbye. 👋");
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum Prompt {
    Line(String),
    Closed,
    Interrupted,
}

/// Waits for the next input line or an interrupt, whichever comes first. An
/// interrupt source that fails to install is ignored.
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> io::Result<Prompt>
    where R: AsyncBufRead + Unpin, F: Future<Output = io::Result<()>>
{
    tokio::select! {
        line = lines.next_line() => Ok(line?.map_or(Prompt::Closed, Prompt::Line)),
        Ok(()) = interrupt => Ok(Prompt::Interrupted),
    }
}

async fn preflight(controller: &ConversationController, server_url: &Url) {
    match controller.health().await {
        Ok(health) if health.llama_ok() => println!("[✓] Connected to llama-server."),
        Ok(health) => {
            warn!("llama-server status: {}", health.llama_server);
            println!("[!] Warning: the backend is up but llama-server is not reachable.");
            println!("[!] Make sure it's running before chatting.");
        }
        Err(e) => {
            warn!("Health check failed: {}", e);
            println!("[!] Warning: no backend reachable at {}.", server_url);
        }
    }
}

/// Streaming failures were already shown by the view; only rejections
/// that happen before a request starts still need printing.
fn report_stream_error(e: &ControllerError) {
    match e {
        ControllerError::Busy | ControllerError::EmptyInput | ControllerError::NothingToRegenerate => {
            println!("[!] {}\n", e);
        }
        other => debug!("Reply ended with error: {}", other),
    }
}

/// Returns `false` when the loop should exit.
async fn dispatch(cmd: Command, controller: &mut ConversationController, view: &mut TerminalView) -> bool {
    let result: Result<(), ControllerError> = match cmd {
        Command::Exit => {
            return false;
        }
        Command::Help => {
            println!("{}", HELP_TEXT);
            Ok(())
        }
        Command::Regenerate => {
            if let Err(e) = controller.regenerate(view).await {
                report_stream_error(&e);
            }
            Ok(())
        }
        Command::New =>
            controller.new_conversation(view).await.map(|id| {
                println!("[✓] Started conversation {}.\n", id);
            }),
        Command::List =>
            controller.refresh_conversations(view).await.map(|()| {
                let state = controller.state();
                println!("{}", format_conversations(state.conversations(), state.conversation_id()));
            }),
        Command::Open(id) => controller.open_conversation(&id, view).await,
        Command::Delete(id) =>
            controller.delete_conversation(&id, view).await.map(|()| {
                println!("[✓] Deleted conversation {}.\n", id);
            }),
        Command::Rename(title) =>
            controller.rename_conversation(&title, view).await.map(|()| {
                println!("[✓] Renamed to \"{}\".\n", title);
            }),
        Command::Memory =>
            controller.memory().await.map(|facts| {
                if facts.is_empty() {
                    println!("No long-term memories stored.\n");
                    return;
                }
                for fact in facts {
                    println!("  #{}  {}", fact.id, printable(&fact.content));
                }
                println!();
            }),
        Command::Forget(id) =>
            match controller.forget(id).await {
                Err(ControllerError::Api(ApiError::NotFound(_))) => {
                    println!("[!] No memory with ID {}.\n", id);
                    Ok(())
                }
                other =>
                    other.map(|()| {
                        println!("[✓] Removed memory #{}.\n", id);
                    }),
            }
        Command::Reminders { all } =>
            controller.reminders(all).await.map(|reminders| {
                println!("{}", format_reminders(&reminders));
            }),
        Command::Unremind(id) =>
            match controller.unremind(id).await {
                Err(ControllerError::Api(ApiError::NotFound(_))) => {
                    println!("[!] No reminder with ID {}.\n", id);
                    Ok(())
                }
                other =>
                    other.map(|()| {
                        println!("[✓] Cancelled reminder #{}.\n", id);
                    }),
            }
        Command::Clear =>
            controller.clear_history().await.map(|()| {
                println!("[✓] Conversation history cleared.\n");
            }),
        Command::Copy(index) => {
            copy(controller, index);
            Ok(())
        }
        Command::Stats => {
            match controller.state().last_stats() {
                Some(stats) => println!("{}\n", stats),
                None => println!("No reply yet.\n"),
            }
            Ok(())
        }
    };

    if let Err(e) = result {
        warn!("Command failed: {}", e);
        println!("[!] {}\n", e);
    }
    true
}

/// `/copy` copies the whole last reply, `/copy n` its n-th finished code
/// block (1-based).
fn copy(controller: &ConversationController, index: Option<usize>) {
    let Some(document) = controller.last_document() else {
        println!("[!] Nothing to copy yet.\n");
        return;
    };
    let text = match index {
        None => controller.state().last_reply().map(|m| m.content.clone()),
        Some(n) => n.checked_sub(1).and_then(|i| document.copyable(i)).map(str::to_string),
    };
    let Some(text) = text else {
        println!("[!] No code block {}.\n", index.unwrap_or_default());
        return;
    };
    match clipboard::copy_text(&text) {
        CopyOutcome::Native => println!("[✓] Copied.\n"),
        CopyOutcome::Osc52 => println!("\n[✓] Copied via terminal.\n"),
        CopyOutcome::Failed => println!("[!] Could not copy.\n"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interrupt_at_the_prompt_ends_input() {
        let (_keep_open, reader) = tokio::io::duplex(64);
        let mut lines = BufReader::new(reader).lines();
        let prompt = next_input(&mut lines, async { Ok(()) }).await.unwrap();
        assert_eq!(prompt, Prompt::Interrupted);
    }

    #[tokio::test]
    async fn lines_then_end_of_input() {
        let mut lines = BufReader::new(&b"hello\n"[..]).lines();
        let first = next_input(&mut lines, std::future::pending()).await.unwrap();
        assert_eq!(first, Prompt::Line("hello".into()));
        let second = next_input(&mut lines, std::future::pending()).await.unwrap();
        assert_eq!(second, Prompt::Closed);
    }

    #[tokio::test]
    async fn failed_interrupt_handler_is_ignored() {
        let mut lines = BufReader::new(&b"still here\n"[..]).lines();
        let prompt = next_input(&mut lines, async { Err(io::Error::other("no handler")) }).await.unwrap();
        assert_eq!(prompt, Prompt::Line("still here".into()));
    }
}
