//! Error types for the CLI

use spa_probe::ProbeError;
use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// Errors that can occur in the CLI
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// Invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// A check ran to completion and failed
    #[error("Check failed: {message}")]
    CheckFailed {
        /// Error message
        message: String,
    },

    /// Subcommand needs a feature this binary was built without
    #[error("{command} needs the `{feature}` feature; rebuild with --features {feature}")]
    FeatureDisabled {
        /// Subcommand name
        command: String,
        /// Missing cargo feature
        feature: String,
    },

    /// IO error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Library error
    #[error("{0}")]
    Probe(#[from] ProbeError),
}

impl CliError {
    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a check failure
    #[must_use]
    pub fn check_failed(message: impl Into<String>) -> Self {
        Self::CheckFailed {
            message: message.into(),
        }
    }

    /// Create a feature-disabled error
    #[must_use]
    pub fn feature_disabled(command: impl Into<String>, feature: impl Into<String>) -> Self {
        Self::FeatureDisabled {
            command: command.into(),
            feature: feature.into(),
        }
    }
}
