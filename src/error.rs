//! Error types and handling for the TURN service layer
//!
//! This module provides error types for:
//! - Configuration resolution and validation
//! - Relay engine construction
//! - Lifecycle state violations
//! - Runtime failures reported by the relay engine
//!
//! Configuration and construction errors are surfaced immediately and never
//! retried; invalid-state errors may be retried by the caller once the
//! in-flight transition completes.

use thiserror::Error;

/// The main error type for the TURN service layer
#[derive(Error, Debug)]
pub enum Error {
    /// Missing required field, malformed or out-of-range value, or a
    /// contradictory authentication mode in the supplied options
    #[error("Configuration error: {0}")]
    Config(String),

    /// The relay engine rejected the resolved configuration; fatal for the
    /// instance being constructed
    #[error("Engine construction error: {0}")]
    EngineConstruction(String),

    /// A lifecycle operation was requested from an incompatible state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// A failure reported by the relay engine after successful construction
    #[error("Engine runtime error: {0}")]
    EngineRuntime(String),
}

/// Result type alias for TURN service operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = Error::Config("realm is required".into());
        assert_eq!(err.to_string(), "Configuration error: realm is required");

        let err = Error::EngineConstruction("cannot bind 0.0.0.0:3478".into());
        assert_eq!(
            err.to_string(),
            "Engine construction error: cannot bind 0.0.0.0:3478"
        );

        let err = Error::InvalidState("start while stopping".into());
        assert_eq!(err.to_string(), "Invalid state: start while stopping");

        let err = Error::EngineRuntime("socket closed".into());
        assert_eq!(err.to_string(), "Engine runtime error: socket closed");
    }

    #[test]
    fn test_error_display_and_debug() {
        let err = Error::Config("test".into());
        assert_eq!(format!("{}", err), "Configuration error: test");
        assert_eq!(format!("{:?}", err), "Config(\"test\")");
    }
}
