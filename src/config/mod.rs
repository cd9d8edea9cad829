use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cli::Args;
use crate::models::api::ChatMode;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid server URL '{url}': {source}")] ServerUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("server URL must use http or https, got '{0}'")] Scheme(String),
    #[error("temperature must be between 0.0 and 2.0, got {0}")] Temperature(f32),
    #[error("max tokens must be greater than zero")]
    MaxTokens,
    #[error("{0} must be greater than zero")] ZeroDuration(&'static str),
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Generation {
    pub mode: ChatMode,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Generation {
    fn default() -> Self {
        Self {
            mode: ChatMode::Thursday,
            temperature: 0.7,
            max_tokens: 512,
        }
    }
}

/// How hard to look for a just-written conversation in the remote listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl ReconcilePolicy {
    /// Linear backoff before attempt `n` (1-based); the first attempt is immediate.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        self.backoff * attempt.saturating_sub(1)
    }
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(300),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControllerConfig {
    pub generation: Generation,
    pub tick: Duration,
    pub reconcile: ReconcilePolicy,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            generation: Generation::default(),
            tick: Duration::from_millis(100),
            reconcile: ReconcilePolicy::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_url: Url,
    pub request_timeout: Duration,
    pub controller: ControllerConfig,
    pub conversation: Option<String>,
    pub render_out: Option<PathBuf>,
}

impl ClientConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let mut raw_url = args.server_url.trim().to_string();
        // Url::join treats the last segment as a file unless the path ends in '/'.
        if !raw_url.ends_with('/') {
            raw_url.push('/');
        }
        let server_url = Url::parse(&raw_url).map_err(|source| ConfigError::ServerUrl {
            url: args.server_url.clone(),
            source,
        })?;
        if !matches!(server_url.scheme(), "http" | "https") {
            return Err(ConfigError::Scheme(server_url.scheme().to_string()));
        }

        if !(0.0..=2.0).contains(&args.temperature) {
            return Err(ConfigError::Temperature(args.temperature));
        }
        if args.max_tokens == 0 {
            return Err(ConfigError::MaxTokens);
        }
        if args.tick_ms == 0 {
            return Err(ConfigError::ZeroDuration("tick interval"));
        }
        if args.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroDuration("request timeout"));
        }

        Ok(Self {
            server_url,
            request_timeout: Duration::from_secs(args.request_timeout_secs),
            controller: ControllerConfig {
                generation: Generation {
                    mode: args.mode,
                    temperature: args.temperature,
                    max_tokens: args.max_tokens,
                },
                tick: Duration::from_millis(args.tick_ms),
                reconcile: ReconcilePolicy {
                    attempts: args.reconcile_attempts.max(1),
                    backoff: Duration::from_millis(args.reconcile_backoff_ms),
                },
            },
            conversation: args.conversation.clone().filter(|id| !id.trim().is_empty()),
            render_out: args.render_out.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["thursday"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::from_args(&args(&["--server-url", "http://localhost:5000"])).unwrap();
        assert_eq!(config.server_url.as_str(), "http://localhost:5000/");
        assert_eq!(config.controller.generation.max_tokens, 512);
        assert_eq!(config.controller.tick, Duration::from_millis(100));
        assert_eq!(config.controller.reconcile.attempts, 3);
    }

    #[test]
    fn base_path_is_kept_for_joins() {
        let config = ClientConfig::from_args(&args(&["--server-url", "http://box:8000/thursday"])).unwrap();
        assert_eq!(config.server_url.join("v1/memory").unwrap().as_str(), "http://box:8000/thursday/v1/memory");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            ClientConfig::from_args(&args(&["--server-url", "not a url"])),
            Err(ConfigError::ServerUrl { .. })
        ));
        assert!(matches!(
            ClientConfig::from_args(&args(&["--server-url", "ftp://x", "--mode", "raw"])),
            Err(ConfigError::Scheme(_))
        ));
        assert!(matches!(
            ClientConfig::from_args(&args(&["--server-url", "http://x", "--temperature", "3.5"])),
            Err(ConfigError::Temperature(_))
        ));
        assert!(matches!(
            ClientConfig::from_args(&args(&["--server-url", "http://x", "--max-tokens", "0"])),
            Err(ConfigError::MaxTokens)
        ));
        assert!(matches!(
            ClientConfig::from_args(&args(&["--server-url", "http://x", "--tick-ms", "0"])),
            Err(ConfigError::ZeroDuration(_))
        ));
    }

    #[test]
    fn reconcile_backoff_is_linear() {
        let policy = ReconcilePolicy {
            attempts: 3,
            backoff: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_before(1), Duration::ZERO);
        assert_eq!(policy.delay_before(3), Duration::from_millis(500));
    }
}
