//! Error types for the malaria-intrahost crate.
//!
//! Errors are reserved for genuine misuse: bad configuration, out-of-range
//! indices, and calling operations out of order. Clearance and death are
//! ordinary [`LifecycleStatus`] values, and internally computed population
//! corrections are logged rather than returned.
//!
//! [`LifecycleStatus`]: malaria_types::LifecycleStatus

use malaria_types::InfectionId;

use crate::config::ConfigError;

/// Errors that can occur during infection operations.
#[derive(Debug, thiserror::Error)]
pub enum InfectionError {
    /// The infection could not be constructed from the given inputs.
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of what is wrong.
        reason: String,
    },

    /// Parameters failed validation.
    #[error("invalid parameters: {source}")]
    Parameters {
        /// The underlying validation error.
        #[from]
        source: ConfigError,
    },

    /// A stage or variant slot accessor was called out of range.
    #[error("{what} index {index} out of range (len {len})")]
    Index {
        /// Which collection was indexed.
        what: &'static str,
        /// The requested index.
        index: usize,
        /// The collection length.
        len: usize,
    },

    /// `update` was called before `set_parameters`.
    #[error("infection {0} updated before parameters were set")]
    ParametersNotSet(InfectionId),

    /// `set_parameters` was called after the infection began cycling.
    #[error("infection {0} has already begun cycling")]
    AlreadyCycling(InfectionId),

    /// The timestep is negative or not finite.
    #[error("invalid timestep: {0}")]
    InvalidTimestep(f64),

    /// An epitope switch would duplicate an epitope held by another slot.
    #[error("epitope {epitope} already expressed by slot {held_by}")]
    EpitopeInUse {
        /// The requested epitope.
        epitope: u32,
        /// The slot currently expressing it.
        held_by: usize,
    },

    /// A restored snapshot does not match the configured shape.
    #[error("snapshot mismatch: {reason}")]
    SnapshotMismatch {
        /// Description of the mismatch.
        reason: String,
    },

    /// A sampling distribution could not be constructed.
    #[error("distribution error: {reason}")]
    Distribution {
        /// Description of the invalid distribution parameters.
        reason: String,
    },
}
