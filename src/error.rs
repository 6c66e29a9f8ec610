//! Error types for the lattice simulation library.

use thiserror::Error;

/// Result alias used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for configuration, invariant, and I/O failures.
///
/// Configuration errors are rejected before any simulation work begins.
/// `UnitarityLost` is a fatal internal-consistency failure: the update
/// algorithm produced a link off the group manifold, which is a defect,
/// not a recoverable condition.
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid run configuration (bad lattice size, sweep counts, coupling).
    #[error("configuration error: {0}")]
    Config(String),

    /// Wilson loop or correlator extent does not fit on the lattice.
    #[error("loop extent {requested} must be smaller than lattice extent {extent}")]
    LoopTooLarge { requested: usize, extent: usize },

    /// A gauge link drifted off SU(2) beyond floating-point tolerance.
    #[error(
        "gauge link at site {site}, direction {dir} lost unitarity: |det - 1| = {deviation:.3e}"
    )]
    UnitarityLost {
        site: usize,
        dir: usize,
        deviation: f64,
    },

    /// Checkpoint or time-series file I/O failure.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint (de)serialization failure.
    #[error("checkpoint format error: {0}")]
    Checkpoint(#[from] serde_json::Error),

    /// Time-series CSV failure.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A checkpoint file does not match the run it is resumed into.
    #[error("checkpoint mismatch: {0}")]
    CheckpointMismatch(String),
}
