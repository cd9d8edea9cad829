//! Copy to the system clipboard, falling back to an OSC 52 escape for
//! terminals reached over SSH or without a display server.

use base64::{ engine::general_purpose::STANDARD, Engine as _ };
use log::{ debug, warn };
use std::io::Write;

/// Larger payloads are commonly dropped by terminals.
pub const MAX_OSC52_PAYLOAD: usize = 74_994;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Native,
    Osc52,
    /// Nothing could be copied; the reason was logged.
    Failed,
}

pub fn osc52_sequence(text: &str) -> Option<String> {
    let payload = STANDARD.encode(text.as_bytes());
    if payload.len() > MAX_OSC52_PAYLOAD {
        return None;
    }
    Some(format!("\x1b]52;c;{}\x07", payload))
}

/// Never fails loudly: a copy that does not land is only logged.
pub fn copy_text(text: &str) -> CopyOutcome {
    match arboard::Clipboard::new().and_then(|mut clipboard| clipboard.set_text(text.to_string())) {
        Ok(()) => {
            debug!("Copied {} chars to clipboard", text.len());
            return CopyOutcome::Native;
        }
        Err(e) => warn!("Clipboard unavailable, trying OSC 52: {}", e),
    }

    let Some(sequence) = osc52_sequence(text) else {
        warn!("Text too large for OSC 52 ({} bytes)", text.len());
        return CopyOutcome::Failed;
    };
    let mut stdout = std::io::stdout();
    match stdout.write_all(sequence.as_bytes()).and_then(|_| stdout.flush()) {
        Ok(()) => CopyOutcome::Osc52,
        Err(e) => {
            warn!("Failed to write OSC 52 sequence: {}", e);
            CopyOutcome::Failed
        }
    }
}
