//! services/api/src/error.rs
//!
//! Defines the error type returned by the `api` binary during startup and serving.
//! Request-level failures never reach it: handlers answer them with JSON envelopes,
//! and failures after a stream has opened become `error` frames.

use crate::config::ConfigError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The environment did not describe a usable configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Connecting to PostgreSQL or running the migrations failed.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Binding the listener or serving connections failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A startup value could not be turned into what the server needs.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn startup(missing_key: bool) -> Result<(), ApiError> {
        if missing_key {
            Err(ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        }
        Err(std::io::Error::new(std::io::ErrorKind::AddrInUse, "port 8000 taken"))?
    }

    #[test]
    fn startup_failures_convert_with_their_cause() {
        let err = startup(true).unwrap_err();
        assert!(matches!(err, ApiError::Config(ConfigError::MissingVar(ref var)) if var == "GEMINI_API_KEY"));
        assert!(err.to_string().contains("GEMINI_API_KEY"));

        let err = startup(false).unwrap_err();
        assert!(matches!(err, ApiError::Io(_)));
        assert!(err.to_string().contains("port 8000 taken"));
    }
}
