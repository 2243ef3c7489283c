//! Error types for watchdog runs
//!
//! Errors are split by the layer that produces them. A capability probe that
//! comes back negative is not an error at all; it is recorded as a skip.

use thiserror::Error;

/// Failures talking to a target's diagnostic interface
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish the connection
    #[error("Failed to connect to {endpoint}: {reason}")]
    Connect { endpoint: String, reason: String },

    /// Endpoint URL is not usable
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// A bounded network call did not finish in time
    #[error("Operation timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The subscription ended before the stop signal fired
    #[error("Subscription closed before stop: {0}")]
    ClosedBeforeStop(String),

    /// Malformed frame or unexpected payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The remote answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Socket-level failure after the connection was established
    #[error("Connection error: {0}")]
    Connection(String),
}

impl TransportError {
    /// Build a timeout error from a duration
    pub fn timeout(duration: std::time::Duration) -> Self {
        TransportError::Timeout {
            duration_ms: duration.as_millis() as u64,
        }
    }
}

/// Failures of the load-producing action
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    /// The ceiling was hit before the requested units were produced
    #[error("Load ceiling reached: produced {produced} of {requested} units in {attempts} attempts")]
    CeilingReached {
        requested: u64,
        produced: u64,
        attempts: u64,
    },

    /// The load call exceeded the run deadline
    #[error("Load timed out after {duration_ms}ms")]
    Timeout { duration_ms: u64 },

    /// The driver could not talk to the target
    #[error("Load transport error: {0}")]
    Transport(#[from] TransportError),

    /// Anything else the driver wants to surface
    #[error("Load error: {0}")]
    Other(String),
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Target specification could not be parsed
    #[error("Invalid target '{0}': expected name=url")]
    InvalidTarget(String),

    /// A field holds an unusable value
    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    /// Config file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Config file could not be parsed
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Errors fatal to a single target's watchdog run
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchdogError {
    /// Subscription could not be opened or dropped unexpectedly
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// A task belonging to the run panicked or was cancelled
    #[error("{task} task failed: {reason}")]
    TaskFailed { task: &'static str, reason: String },
}

/// Result type for watchdog runs
pub type Result<T> = std::result::Result<T, WatchdogError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_timeout_from_duration() {
        let err = TransportError::timeout(Duration::from_millis(1500));
        assert_eq!(err, TransportError::Timeout { duration_ms: 1500 });
        assert_eq!(err.to_string(), "Operation timed out after 1500ms");
    }

    #[test]
    fn test_transport_error_converts_into_watchdog_error() {
        let err: WatchdogError = TransportError::Protocol("bad frame".into()).into();
        assert!(matches!(err, WatchdogError::Transport(TransportError::Protocol(_))));
        assert_eq!(err.to_string(), "Transport failure: Protocol error: bad frame");
    }

    #[test]
    fn test_ceiling_message() {
        let err = LoadError::CeilingReached {
            requested: 40,
            produced: 12,
            attempts: 100,
        };
        assert_eq!(
            err.to_string(),
            "Load ceiling reached: produced 12 of 40 units in 100 attempts"
        );
    }
}
