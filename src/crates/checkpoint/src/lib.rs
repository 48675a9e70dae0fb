//! The workflow checkpoint aggregate and its storage port.
//!
//! A [`WorkflowCheckpoint`] is a persisted snapshot of a skill run, keyed
//! by `{skill_id, input_hash}`, sufficient for the checkpointing executor
//! (in the `executor` crate) to resume at the next incomplete batch after
//! a crash. [`CheckpointStore`] is the port that crate depends on;
//! [`InMemoryCheckpointStore`] is the bundled, non-durable implementation.

pub mod checkpoint;
pub mod error;
pub mod store;
pub mod traits;

pub use checkpoint::{
    hash_input, CheckpointStatus, PhaseResultData, WorkflowCheckpoint, MAX_INPUT_BYTES,
};
pub use error::{CheckpointError, Result};
pub use store::InMemoryCheckpointStore;
pub use traits::{CheckpointFilter, CheckpointStore};
