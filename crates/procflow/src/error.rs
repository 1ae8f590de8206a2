//! Error types for the process tracker
//!
//! Tracker-level failures are routed through the tracker's central error
//! handler; transport failures stay inside the delivery queue where they are
//! retried.

use thiserror::Error;

/// Main error type for tracking operations
#[derive(Error, Debug)]
pub enum TrackerError {
    /// A registered process id has no record in the registry
    #[error("No process found with id {0}")]
    ProcessNotFound(String),

    /// Invalid input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Unexpected internal state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TrackerError {
    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        TrackerError::InvalidInput(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        TrackerError::Internal(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        TrackerError::Config(msg.into())
    }
}

impl From<toml::de::Error> for TrackerError {
    fn from(err: toml::de::Error) -> Self {
        TrackerError::Config(format!("TOML error: {}", err))
    }
}

/// Failure of a single delivery attempt
///
/// Every variant counts as one failed attempt for retry purposes.
#[derive(Error, Debug)]
pub enum DeliveryError {
    /// Transport-level failure (connection refused, reset, invalid body)
    #[error("HTTP client error: {0}")]
    Http(String),

    /// The ingestion endpoint answered with a non-success status
    #[error("Server responded with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Well-formed response that did not confirm success
    #[error("Server did not confirm success for process {0}")]
    Rejected(String),

    /// The payload could not be serialized
    #[error("Failed to serialize payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for DeliveryError {
    fn from(err: reqwest::Error) -> Self {
        DeliveryError::Http(err.to_string())
    }
}

/// Result type alias for tracking operations
pub type Result<T> = std::result::Result<T, TrackerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TrackerError::ProcessNotFound("fetch".to_string());
        assert_eq!(err.to_string(), "No process found with id fetch");

        let err = DeliveryError::Status {
            status: 500,
            body: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "Server responded with status 500: boom");
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(
            TrackerError::invalid_input("x"),
            TrackerError::InvalidInput(_)
        ));
        assert!(matches!(TrackerError::internal("x"), TrackerError::Internal(_)));
        assert!(matches!(TrackerError::config("x"), TrackerError::Config(_)));
    }
}
