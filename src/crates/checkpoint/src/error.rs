//! Error types for checkpoint operations.

use thiserror::Error;

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Checkpoint not found.
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(String),

    /// A checkpoint violated one of its own invariants (e.g.
    /// `completedBatch >= totalBatches`, input over 1 MiB).
    #[error("invalid checkpoint: {0}")]
    Invalid(String),

    /// I/O error from a file-backed store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
