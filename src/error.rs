//! Error types for veredicto
//!
//! Per-observation failures (adapter, scoring) are recorded as observation
//! status, never raised. Only configuration and integrity faults surface
//! through this enum.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Veredicto error types
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed sweep definition (raised before any execution)
    #[error("invalid sweep: {0}")]
    InvalidSweep(String),

    /// Dataset construction rejected (duplicate case id, empty dataset)
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),

    /// Measurement definition rejected (no metrics, unknown metric name)
    #[error("invalid measurement: {0}")]
    InvalidMeasurement(String),

    /// Attempt to record an observation under an already-used key.
    /// Integrity fault: the store is left unchanged.
    #[error("duplicate observation key: {0}")]
    DuplicateObservation(String),

    /// Every parameter point in the sweep was abandoned by the collection
    /// policy. Surfaced so a caller is not handed a misleadingly complete
    /// but empty record.
    #[error("sweep abandoned: all {points} parameter points exceeded the failure tolerance")]
    SweepAbandoned {
        /// Number of abandoned points (the whole sweep)
        points: usize,
    },

    /// Tokio task join failure inside the executor (panicked unit)
    #[error("executor task failed: {0}")]
    TaskFailed(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
