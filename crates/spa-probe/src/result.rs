//! Result and error types for spa-probe.

use thiserror::Error;

/// Result type for spa-probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Errors that can occur while probing a page
#[derive(Debug, Error)]
pub enum ProbeError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Top-level navigation failed (network/DNS error or non-2xx response)
    #[error("Navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A query for a single signal failed (e.g. malformed selector)
    #[error("Query for `{signal}` failed: {message}")]
    Query {
        /// Signal that was queried
        signal: String,
        /// Error message
        message: String,
    },

    /// No candidate signal became visible within the budget
    #[error("None of [{}] became visible within {budget_ms}ms", attempted.join(", "))]
    NoSignalVisible {
        /// Signals that were polled, in order
        attempted: Vec<String>,
        /// Budget in milliseconds
        budget_ms: u64,
    },

    /// Fill-with-retry exhausted its attempts
    #[error("Writing to `{signal}` failed after {attempts} attempt(s): {last}")]
    WriteVerificationFailed {
        /// Field signal
        signal: String,
        /// Number of attempts made
        attempts: u32,
        /// Last error or mismatch observed
        last: String,
    },

    /// Operation timed out
    #[error("Operation timed out after {ms}ms")]
    Timeout {
        /// Timeout in milliseconds
        ms: u64,
    },

    /// Caller passed an invalid argument
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message
        message: String,
    },

    /// Generic driver failure (element vanished, protocol error, ...)
    #[error("Driver error: {message}")]
    Driver {
        /// Error message
        message: String,
    },

    /// Accessibility audit failed to run or parse
    #[error("Accessibility audit failed: {message}")]
    Audit {
        /// Error message
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl ProbeError {
    /// Create a driver error
    #[must_use]
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver {
            message: message.into(),
        }
    }

    /// Create a query error for a signal
    #[must_use]
    pub fn query(signal: impl ToString, message: impl Into<String>) -> Self {
        Self::Query {
            signal: signal.to_string(),
            message: message.into(),
        }
    }

    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NavigationFailed {
            url: url.into(),
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

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Whether this error means the page context could not be established
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NavigationFailed { .. } | Self::BrowserLaunch { .. }
        )
    }
}
