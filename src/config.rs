//! Configuration types.

use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default endpoint for the real-time bus.
const DEFAULT_ENDPOINT: &str = "ws://127.0.0.1:8080/ws/events";

/// Default offline backlog capacity.
const DEFAULT_BACKLOG_CAPACITY: usize = 256;

/// What `publish` does while the channel is not connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfflinePolicy {
    /// Keep up to `capacity` events for replay on reconnect, dropping the oldest.
    Queue { capacity: usize },
    /// Return `TransportError::Offline` immediately.
    FailFast,
}

impl Default for OfflinePolicy {
    fn default() -> Self {
        Self::Queue {
            capacity: DEFAULT_BACKLOG_CAPACITY,
        }
    }
}

/// Reconnect backoff settings.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for any single delay.
    pub max_delay: Duration,
    /// Attempts per connect cycle. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Randomize delays to avoid reconnect storms.
    pub jitter: bool,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            max_attempts: Some(8),
            jitter: true,
        }
    }
}

/// Dispatch channel configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// WebSocket URL of the event bus.
    pub endpoint: String,
    pub offline_policy: OfflinePolicy,
    pub reconnect: ReconnectConfig,
    /// A frame not accepted by the transport within this window counts as a lost link.
    pub send_timeout: Duration,
    /// Upper bound for one connect attempt, TCP plus WebSocket handshake.
    pub connect_timeout: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            offline_policy: OfflinePolicy::default(),
            reconnect: ReconnectConfig::default(),
            send_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl DispatchConfig {
    /// Create a config for the given endpoint with default policies.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Load from `VOICE_DISPATCH_*` environment variables.
    ///
    /// Unset variables fall back to defaults. `VOICE_DISPATCH_MAX_ATTEMPTS=0`
    /// means unbounded retries.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ReconnectConfig::default();

        let endpoint = std::env::var("VOICE_DISPATCH_ENDPOINT")
            .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        if !endpoint.starts_with("ws://") && !endpoint.starts_with("wss://") {
            return Err(ConfigError::InvalidValue {
                key: "VOICE_DISPATCH_ENDPOINT".into(),
                message: format!("expected a ws:// or wss:// URL, got '{endpoint}'"),
            });
        }

        let base_ms: u64 = std::env::var("VOICE_DISPATCH_BACKOFF_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.base_delay.as_millis() as u64);

        let max_ms: u64 = std::env::var("VOICE_DISPATCH_BACKOFF_MAX_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.max_delay.as_millis() as u64);

        let max_attempts = match std::env::var("VOICE_DISPATCH_MAX_ATTEMPTS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
        {
            Some(0) => None,
            Some(n) => Some(n),
            None => defaults.max_attempts,
        };

        let connect_timeout_ms: u64 = std::env::var("VOICE_DISPATCH_CONNECT_TIMEOUT_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|ms| *ms > 0)
            .unwrap_or(10_000);

        let offline_policy = match std::env::var("VOICE_DISPATCH_OFFLINE_POLICY")
            .unwrap_or_else(|_| "queue".to_string())
            .to_lowercase()
            .as_str()
        {
            "queue" => OfflinePolicy::Queue {
                capacity: std::env::var("VOICE_DISPATCH_BACKLOG")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_BACKLOG_CAPACITY),
            },
            "fail" | "fail_fast" | "fail-fast" => OfflinePolicy::FailFast,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: "VOICE_DISPATCH_OFFLINE_POLICY".into(),
                    message: format!("unknown policy '{other}' (expected queue or fail_fast)"),
                });
            }
        };

        Ok(Self {
            endpoint,
            offline_policy,
            reconnect: ReconnectConfig {
                base_delay: Duration::from_millis(base_ms),
                max_delay: Duration::from_millis(max_ms.max(base_ms)),
                max_attempts,
                jitter: defaults.jitter,
            },
            send_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
        })
    }
}

/// Remote workflow endpoint settings.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Full run URL of the flow.
    pub url: String,
    /// Bearer token.
    pub api_token: SecretString,
}

impl WorkflowConfig {
    /// Load from the environment. Returns `None` when no workflow URL is set.
    pub fn from_env() -> Result<Option<Self>, ConfigError> {
        let Ok(url) = std::env::var("VOICE_DISPATCH_WORKFLOW_URL") else {
            return Ok(None);
        };
        let token = std::env::var("VOICE_DISPATCH_WORKFLOW_TOKEN")
            .map_err(|_| ConfigError::MissingEnvVar("VOICE_DISPATCH_WORKFLOW_TOKEN".into()))?;
        Ok(Some(Self {
            url,
            api_token: SecretString::from(token),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_queues() {
        let config = DispatchConfig::default();
        assert_eq!(
            config.offline_policy,
            OfflinePolicy::Queue {
                capacity: DEFAULT_BACKLOG_CAPACITY
            }
        );
        assert!(config.reconnect.max_attempts.is_some());
        assert!(config.reconnect.base_delay <= config.reconnect.max_delay);
    }

    #[test]
    fn new_overrides_endpoint_only() {
        let config = DispatchConfig::new("ws://bus.local/events");
        assert_eq!(config.endpoint, "ws://bus.local/events");
        assert_eq!(config.offline_policy, OfflinePolicy::default());
    }
}
