//! Error types for the cohort engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and cohort execution.

use malaria_intrahost::{ConfigError, InfectionError};

/// Top-level error for the cohort engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// An infection or host operation failed.
    #[error("infection error: {source}")]
    Infection {
        /// The underlying infection error.
        #[from]
        source: InfectionError,
    },

    /// A host worker task panicked or was cancelled.
    #[error("host task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },

    /// The cohort section of the configuration is unusable.
    #[error("cohort error: {message}")]
    Cohort {
        /// Description of the cohort failure.
        message: String,
    },
}
