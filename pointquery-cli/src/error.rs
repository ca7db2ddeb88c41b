//! CLI error type.

use pointquery::config::ConfigError;
use pointquery::logging::LoggingError;
use pointquery::service::ServiceError;
use thiserror::Error;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration problem in arguments or settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The configuration file could not be loaded or saved.
    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    /// Talking to the remote service failed.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Logging could not be initialised.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The Tokio runtime could not be created.
    #[error("Failed to create Tokio runtime: {0}")]
    Runtime(String),

    /// Reading from the terminal failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let err = CliError::Config("no datasets".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("no datasets"));
    }

    #[test]
    fn test_from_config_file_error() {
        let err: CliError = ConfigError::UnknownKey("a.b".to_string()).into();
        assert!(matches!(err, CliError::ConfigFile(_)));
        assert_eq!(err.to_string(), "Unknown configuration key 'a.b'");
    }
}
