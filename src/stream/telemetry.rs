use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

use crate::models::chat::Message;

const CHARS_PER_TOKEN: usize = 4;
const PLACEHOLDER: &str = "--";

/// Coarse prompt size estimate: one token per four characters, rounded up.
pub fn estimate_tokens(messages: &[Message]) -> usize {
    let chars: usize = messages
        .iter()
        .map(|m| m.content.chars().count())
        .sum();
    chars.div_ceil(CHARS_PER_TOKEN)
}

/// Timing state for one request, measured from the moment the send began.
#[derive(Debug, Clone, Copy)]
pub struct Telemetry {
    started_at: Instant,
    estimated_input_tokens: usize,
}

impl Telemetry {
    pub fn start(started_at: Instant, estimated_input_tokens: usize) -> Self {
        Self { started_at, estimated_input_tokens }
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn estimated_input_tokens(&self) -> usize {
        self.estimated_input_tokens
    }

    pub fn snapshot(
        &self,
        now: Instant,
        token_count: usize,
        first_token_at: Option<Instant>
    ) -> StatsSnapshot {
        let elapsed = now.saturating_duration_since(self.started_at);
        let time_to_first_token = first_token_at.map(|t| t.saturating_duration_since(self.started_at));

        let generation_rate = match first_token_at {
            Some(first) if token_count > 1 => {
                rate(
                    (token_count - 1) as f64,
                    now.saturating_duration_since(first)
                )
            }
            _ => None,
        };
        let prompt_rate = time_to_first_token.and_then(|ttft| {
            rate(self.estimated_input_tokens as f64, ttft)
        });

        StatsSnapshot {
            elapsed,
            time_to_first_token,
            token_count,
            generation_rate,
            prompt_rate,
            estimated_input_tokens: self.estimated_input_tokens,
        }
    }
}

fn rate(count: f64, over: Duration) -> Option<f64> {
    let secs = over.as_secs_f64();
    if secs > 0.0 {
        Some(count / secs)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub elapsed: Duration,
    pub time_to_first_token: Option<Duration>,
    pub token_count: usize,
    /// Tokens per second after the first token.
    pub generation_rate: Option<f64>,
    /// Rough prompt-processing throughput derived from the TTFT.
    pub prompt_rate: Option<f64>,
    pub estimated_input_tokens: usize,
}

impl StatsSnapshot {
    pub fn elapsed_label(&self) -> String {
        format!("{:.1}s", self.elapsed.as_secs_f64())
    }

    pub fn ttft_label(&self) -> String {
        match self.time_to_first_token {
            Some(ttft) => format!("{:.2}s", ttft.as_secs_f64()),
            None => PLACEHOLDER.to_string(),
        }
    }

    pub fn generation_rate_label(&self) -> String {
        rate_label(self.generation_rate)
    }

    pub fn prompt_rate_label(&self) -> String {
        rate_label(self.prompt_rate)
    }
}

fn rate_label(rate: Option<f64>) -> String {
    match rate {
        Some(r) if r.is_finite() => format!("{:.1}", r),
        _ => PLACEHOLDER.to_string(),
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} | TTFT {} | {} tokens | {} tok/s | ~{} prompt tok/s",
            self.elapsed_label(),
            self.ttft_label(),
            self.token_count,
            self.generation_rate_label(),
            self.prompt_rate_label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn nothing_is_defined_before_the_first_token() {
        let t0 = Instant::now();
        let telemetry = Telemetry::start(t0, 100);
        let stats = telemetry.snapshot(t0 + ms(300), 0, None);
        assert_eq!(stats.elapsed, ms(300));
        assert_eq!(stats.time_to_first_token, None);
        assert_eq!(stats.generation_rate, None);
        assert_eq!(stats.prompt_rate, None);
        assert_eq!(stats.ttft_label(), "--");
        assert_eq!(stats.generation_rate_label(), "--");
    }

    #[test]
    fn single_token_has_no_generation_rate() {
        let t0 = Instant::now();
        let telemetry = Telemetry::start(t0, 100);
        let stats = telemetry.snapshot(t0 + ms(900), 1, Some(t0 + ms(500)));
        assert_eq!(stats.time_to_first_token, Some(ms(500)));
        assert_eq!(stats.generation_rate, None);
        assert_eq!(stats.prompt_rate, Some(200.0));
    }

    #[test]
    fn rate_excludes_the_first_token() {
        let t0 = Instant::now();
        let telemetry = Telemetry::start(t0, 0);
        let stats = telemetry.snapshot(t0 + ms(2500), 11, Some(t0 + ms(500)));
        assert_eq!(stats.generation_rate, Some(5.0));
        assert_eq!(stats.generation_rate_label(), "5.0");
    }

    #[test]
    fn zero_time_to_first_token_leaves_prompt_rate_undefined() {
        let t0 = Instant::now();
        let telemetry = Telemetry::start(t0, 40);
        let stats = telemetry.snapshot(t0 + ms(200), 2, Some(t0));
        assert_eq!(stats.time_to_first_token, Some(Duration::ZERO));
        assert_eq!(stats.prompt_rate, None);
        assert_eq!(stats.generation_rate, Some(5.0));
        assert_eq!(stats.prompt_rate_label(), "--");
    }

    #[test]
    fn estimate_rounds_up_per_four_chars() {
        assert_eq!(estimate_tokens(&[]), 0);
        assert_eq!(estimate_tokens(&[Message::user("abc")]), 1);
        assert_eq!(estimate_tokens(&[Message::user("abcd"), Message::assistant("e")]), 2);
        assert_eq!(estimate_tokens(&[Message::user("\u{e9}\u{e9}\u{e9}\u{e9}")]), 1);
    }

    #[test]
    fn display_uses_placeholders() {
        let t0 = Instant::now();
        let stats = Telemetry::start(t0, 10).snapshot(t0 + ms(1200), 0, None);
        assert_eq!(stats.to_string(), "1.2s | TTFT -- | 0 tokens | -- tok/s | ~-- prompt tok/s");
    }
}
