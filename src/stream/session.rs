use tokio::time::Instant;

use super::accumulator::DeltaAccumulator;
use super::telemetry::{ StatsSnapshot, Telemetry };

/// Identifies one in-flight request. Events carrying a stale tag are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionTag(pub u64);

/// Ephemeral state of one streamed reply. Discarded once the reply is
/// committed or the request fails.
#[derive(Debug, Clone)]
pub struct StreamSession {
    tag: SessionTag,
    telemetry: Telemetry,
    accumulator: DeltaAccumulator,
}

impl StreamSession {
    pub fn new(tag: SessionTag, started_at: Instant, estimated_input_tokens: usize) -> Self {
        Self {
            tag,
            telemetry: Telemetry::start(started_at, estimated_input_tokens),
            accumulator: DeltaAccumulator::new(),
        }
    }

    pub fn tag(&self) -> SessionTag {
        self.tag
    }

    pub fn apply(&mut self, payload: &str, now: Instant) -> Option<&str> {
        self.accumulator.apply(payload, now)
    }

    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    pub fn token_count(&self) -> usize {
        self.accumulator.token_count()
    }

    pub fn first_token_at(&self) -> Option<Instant> {
        self.accumulator.first_token_at()
    }

    pub fn started_at(&self) -> Instant {
        self.telemetry.started_at()
    }

    pub fn stats(&self, now: Instant) -> StatsSnapshot {
        self.telemetry.snapshot(now, self.accumulator.token_count(), self.accumulator.first_token_at())
    }

    pub fn into_text(self) -> String {
        self.accumulator.into_text()
    }
}
