use log::debug;
use tokio::time::Instant;

use crate::models::api::StreamChunk;

/// Running text of one streamed reply plus the arrival bookkeeping the
/// telemetry needs. Text only ever grows.
#[derive(Debug, Default, Clone)]
pub struct DeltaAccumulator {
    text: String,
    token_count: usize,
    first_token_at: Option<Instant>,
    last_token_at: Option<Instant>,
    skipped: usize,
}

impl DeltaAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `data:` payload observed at `now`. Returns the fragment
    /// that was appended, if any. Unparseable payloads and empty fragments
    /// leave the state untouched apart from the skip counter.
    pub fn apply(&mut self, payload: &str, now: Instant) -> Option<&str> {
        let fragment = match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => chunk.into_fragment()?,
            Err(e) => {
                self.skipped += 1;
                debug!("Skipping malformed event payload: {} ({})", e, payload);
                return None;
            }
        };
        if fragment.is_empty() {
            return None;
        }

        self.token_count += 1;
        if self.first_token_at.is_none() {
            self.first_token_at = Some(now);
        }
        self.last_token_at = Some(now);
        let start = self.text.len();
        self.text.push_str(&fragment);
        Some(&self.text[start..])
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn token_count(&self) -> usize {
        self.token_count
    }

    pub fn first_token_at(&self) -> Option<Instant> {
        self.first_token_at
    }

    pub fn last_token_at(&self) -> Option<Instant> {
        self.last_token_at
    }

    /// Number of payloads that failed to parse.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}
