//! Error types for the request core.
//!
//! # Design
//! Two families live here. `ConfigError` is raised while configuring things
//! (backoff strategies, client defaults) and is the only error a caller ever
//! has to `?`. `TransportError` is what a `Transport` reports for a failed
//! attempt; the engine folds it into a `RequestResult` and never hands it
//! back to the caller directly.

use thiserror::Error;

/// Status code synthesized when an attempt runs out of time.
pub const REQUEST_TIMEOUT: u16 = 408;

/// Status code used when a failure carries no status of its own.
pub const INTERNAL_SERVER_ERROR: u16 = 500;

/// Errors raised while building configuration values.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A duration parameter was negative.
    #[error("{field} must not be negative (got {value_ms} ms)")]
    NegativeDuration { field: &'static str, value_ms: i64 },

    /// An exponential growth factor was below 1.0 or not finite.
    #[error("backoff factor must be a finite number >= 1.0 (got {0})")]
    InvalidFactor(f64),

    /// The client defaults are reachable from another handle.
    #[error("client defaults are shared by {0} handles; configure them before issuing requests")]
    DefaultsInUse(usize),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}

/// Failure of a single attempt, as reported by a `Transport`.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport enforced its own deadline.
    #[error("transport timed out: {0}")]
    Timeout(String),

    /// A recognized network or protocol failure (refused, reset, DNS, ...).
    #[error("{message}")]
    Network {
        status: Option<u16>,
        message: String,
    },

    /// Anything the transport could not classify.
    #[error("unexpected transport failure: {0}")]
    Unexpected(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    pub fn network(message: impl Into<String>) -> Self {
        TransportError::Network {
            status: None,
            message: message.into(),
        }
    }

    pub fn unexpected(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransportError::Unexpected(err.into())
    }

    /// Status code carried by the failure, if any.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Timeout(_) => Some(REQUEST_TIMEOUT),
            TransportError::Network { status, .. } => *status,
            TransportError::Unexpected(_) => None,
        }
    }

    /// Whether the failure falls inside the anticipated network taxonomy.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, TransportError::Unexpected(_))
    }
}
