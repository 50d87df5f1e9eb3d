//! CLI error handling with user-friendly messages.

use std::fmt;
use std::process;

use tilechain::backend::{LoaderError, WorkerError};
use tilechain::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(std::io::Error),
    /// Configuration error
    Config(ConfigFileError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// Failed to create a backend
    Backend(String),
    /// Some requested tiles could not be fetched
    Incomplete { failed: usize, total: usize },
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        if let CliError::Incomplete { .. } = self {
            eprintln!();
            eprintln!("Failed tiles are backed off; run again later or check the log for details.");
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(e) => write!(f, "Failed to initialize logging: {}", e),
            CliError::Config(e) => write!(f, "Configuration error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Backend(msg) => write!(f, "Failed to create backend: {}", msg),
            CliError::Incomplete { failed, total } => {
                write!(f, "{} of {} tiles could not be fetched", failed, total)
            }
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::LoggingInit(e) | CliError::Runtime(e) => Some(e),
            CliError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e)
    }
}

impl From<WorkerError> for CliError {
    fn from(e: WorkerError) -> Self {
        CliError::Backend(e.to_string())
    }
}

impl From<LoaderError> for CliError {
    fn from(e: LoaderError) -> Self {
        CliError::Backend(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incomplete_message() {
        let err = CliError::Incomplete {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.to_string(), "2 of 5 tiles could not be fetched");
    }

    #[test]
    fn test_config_error_has_source() {
        let err: CliError = ConfigFileError::WriteError("disk full".to_string()).into();
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
