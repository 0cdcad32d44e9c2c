//! Error types for recurrence analysis runs.

use thiserror::Error;

/// Errors raised while configuring or executing a recurrence analysis.
///
/// Every variant is fatal for the run that produced it: the engine never
/// retries and never returns partial histograms.
#[derive(Debug, Error)]
pub enum RqaError {
    /// Even a minimal tile exceeds the device's single-allocation limit.
    #[error(
        "sub matrix {dim_x}x{dim_y} needs {size_bytes} bytes, device limit is {max_alloc_bytes}"
    )]
    SubMatrixTooLarge {
        dim_x: usize,
        dim_y: usize,
        size_bytes: usize,
        max_alloc_bytes: usize,
    },

    /// A tile failed allocation or kernel submission.
    #[error(
        "sub matrix at ({start_x}, {start_y}) of size {dim_x}x{dim_y} not processed: {reason}"
    )]
    SubMatrixNotProcessed {
        start_x: usize,
        start_y: usize,
        dim_x: usize,
        dim_y: usize,
        reason: String,
    },

    /// The neighbourhood condition cannot be evaluated.
    #[error("invalid neighbourhood condition: {0}")]
    InvalidNeighbourhoodCondition(String),

    /// Embedding dimension or time delay out of range.
    #[error("invalid embedding: {0}")]
    InvalidEmbedding(String),

    /// Not enough samples to form a single embedded vector.
    #[error("time series has {samples} samples, at least {required} are required")]
    SeriesTooShort { samples: usize, required: usize },

    /// Embedded vectors of the two series differ in dimension.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Any other rejected configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A device buffer could not be allocated.
    #[error(
        "device allocation of {requested} bytes failed, {available} bytes available"
    )]
    Allocation { requested: usize, available: usize },

    /// The run was cancelled before all tiles were processed.
    #[error("run cancelled after {tiles_completed} tiles")]
    Cancelled { tiles_completed: usize },

    /// A result could not be written or read as JSON.
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for recurrence analysis operations.
pub type Result<T> = std::result::Result<T, RqaError>;
