//! Error types for voice-dispatch.

use serde::Serialize;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A single candidate failed record validation.
///
/// Never fatal: the pipeline collects these into the delivery summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// The offending field (or `record` when the candidate itself is malformed).
    pub field: String,
    /// Human-readable reason.
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Dispatch channel errors.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Channel is offline and the offline policy is fail-fast")]
    Offline,

    #[error("Reconnect gave up after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Failed to connect to {endpoint} after {attempts} attempts: {reason}")]
    ConnectFailed {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Remote workflow errors.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("Workflow request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Workflow returned status {status}")]
    Status { status: u16 },

    #[error("Workflow response had no text output")]
    MissingText,
}
