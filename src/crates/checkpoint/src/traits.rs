//! The workflow checkpoint port: the capability set the checkpointing
//! executor depends on, independent of any concrete storage backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::checkpoint::{CheckpointStatus, WorkflowCheckpoint};
use crate::error::Result;

/// Query filter for [`CheckpointStore::list`]. Every field is an
/// optional `AND`-combined predicate; `None` means "don't filter on
/// this field".
#[derive(Debug, Clone, Default)]
pub struct CheckpointFilter {
    pub skill_id: Option<String>,
    pub status: Option<CheckpointStatus>,
    pub machine_id: Option<String>,
}

/// A pluggable backend for persisting and querying [`WorkflowCheckpoint`]s.
///
/// The checkpointing executor (in the `executor` crate) depends only on
/// this trait, never on a concrete store, so a durable backend (a file, a
/// database) can be swapped in without touching execution logic. This
/// crate ships [`crate::store::InMemoryCheckpointStore`] as the reference
/// implementation.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persists a brand-new checkpoint. Implementations should fail if a
    /// checkpoint with the same `id` already exists.
    async fn create(&self, checkpoint: &WorkflowCheckpoint) -> Result<()>;

    /// Persists the current state of an existing checkpoint (by `id`).
    async fn update(&self, checkpoint: &WorkflowCheckpoint) -> Result<()>;

    /// Fetches a checkpoint by id, or `None` if no such checkpoint exists.
    async fn get(&self, id: &str) -> Result<Option<WorkflowCheckpoint>>;

    /// Deletes a checkpoint by id. A no-op (not an error) if it does not
    /// exist.
    async fn delete(&self, id: &str) -> Result<()>;

    /// The most recently updated `in_progress` checkpoint for the given
    /// `{skill_id, input_hash}` pair, if any: the resume entry point for
    /// the checkpointing executor.
    async fn get_latest_in_progress(
        &self,
        skill_id: &str,
        input_hash: &str,
    ) -> Result<Option<WorkflowCheckpoint>>;

    /// All checkpoints matching `filter`.
    async fn list(&self, filter: &CheckpointFilter) -> Result<Vec<WorkflowCheckpoint>>;

    /// Deletes every checkpoint recorded for a given `execution_id`.
    async fn delete_by_execution_id(&self, execution_id: &str) -> Result<()>;

    /// Marks every `in_progress` checkpoint owned by `machine_id` as
    /// `abandoned` (used when a new process instance comes up and finds
    /// stale state from a machine that is presumed dead). Returns the
    /// number of checkpoints affected.
    async fn mark_abandoned(&self, machine_id: &str) -> Result<u64>;

    /// Deletes every checkpoint whose `updated_at` is strictly older than
    /// `older_than`. Returns the number of checkpoints deleted.
    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64>;
}
