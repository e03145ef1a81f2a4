use std::path::PathBuf;

use thiserror::Error;

/// Canonical error type for load test setup and output.
///
/// Individual request failures are not errors: they are recorded as failed
/// [`RequestResult`](crate::result::RequestResult)s and the run continues.
#[derive(Debug, Error)]
pub enum LoadTestError {
    /// Run arguments failed validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Human-readable explanation of the rejected value.
        message: String,
    },

    /// Layered configuration could not be loaded or deserialized.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// The result output could not be opened or written.
    #[error("error opening {path}: {source}")]
    Output {
        /// Output destination as given by the caller.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },

    /// Encoding a result record failed.
    #[error("error writing result: {0}")]
    Csv(#[from] csv::Error),

    /// The HTTP client could not be constructed.
    #[error("error building HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl LoadTestError {
    /// Creates an `InvalidConfig` variant.
    #[must_use]
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, LoadTestError>;
