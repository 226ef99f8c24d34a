//! The `error` module defines the error types used across `pubsub-relocate`.
//!
//! Errors are split by the layer that raises them:
//! - [`BrokerError`]: anything the broker client reports (bad resource names,
//!   transport failures, non-success responses).
//! - [`ConfigError`]: invalid or unsupported run parameters, raised before
//!   any broker connection exists.
//! - [`RelocationError`]: fatal outcomes of a relocation run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("invalid resource name '{name}': {reason}")]
    InvalidResource { name: String, reason: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("broker returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed broker response: {0}")]
    Decode(String),

    #[error("broker client is closed")]
    Closed,

    #[error("{0}")]
    Injected(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unsupported source type '{0}' (expected GCP_PUBSUB_SUBSCRIPTION)")]
    UnsupportedSourceType(String),

    #[error("unsupported destination type '{0}' (expected GCP_PUBSUB_TOPIC)")]
    UnsupportedDestinationType(String),

    #[error(transparent)]
    InvalidResource(#[from] BrokerError),

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Error)]
pub enum RelocationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to create broker client: {0}")]
    Broker(#[source] BrokerError),

    #[error("aborting after {count} consecutive pull errors")]
    TooManyPullErrors { count: u32 },

    #[error("run cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    /// True when the broker gave up waiting for a message. A pull that ends
    /// this way means the source is drained, not that something broke.
    pub fn is_deadline_exceeded(&self) -> bool {
        match self {
            BrokerError::Transport(e) => e.is_timeout(),
            BrokerError::Status { status, message } => {
                *status == 504 || message.contains("DEADLINE_EXCEEDED")
            }
            _ => false,
        }
    }
}
