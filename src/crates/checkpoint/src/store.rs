//! In-memory reference implementation of the checkpoint store port.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::checkpoint::{CheckpointStatus, WorkflowCheckpoint};
use crate::error::Result;
use crate::traits::{CheckpointFilter, CheckpointStore};

type Storage = Arc<RwLock<HashMap<String, WorkflowCheckpoint>>>;

/// A process-local, non-durable [`CheckpointStore`]. Intended as the
/// default for single-process runs and as the reference implementation
/// the checkpointing executor's tests exercise; a durable deployment
/// plugs in a different backend behind the same trait.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCheckpointStore {
    storage: Storage,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Number of checkpoints currently held, for test assertions.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn clear(&self) {
        self.storage.write().await.clear();
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn create(&self, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.insert(checkpoint.id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn update(&self, checkpoint: &WorkflowCheckpoint) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.insert(checkpoint.id.clone(), checkpoint.clone());
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<WorkflowCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage.get(id).cloned())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.remove(id);
        Ok(())
    }

    async fn get_latest_in_progress(
        &self,
        skill_id: &str,
        input_hash: &str,
    ) -> Result<Option<WorkflowCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|cp| {
                cp.skill_id == skill_id
                    && cp.input_hash == input_hash
                    && cp.status == CheckpointStatus::InProgress
            })
            .max_by_key(|cp| cp.updated_at)
            .cloned())
    }

    async fn list(&self, filter: &CheckpointFilter) -> Result<Vec<WorkflowCheckpoint>> {
        let storage = self.storage.read().await;
        Ok(storage
            .values()
            .filter(|cp| {
                filter
                    .skill_id
                    .as_ref()
                    .map(|id| &cp.skill_id == id)
                    .unwrap_or(true)
                    && filter.status.map(|s| cp.status == s).unwrap_or(true)
                    && filter
                        .machine_id
                        .as_ref()
                        .map(|m| &cp.machine_id == m)
                        .unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    async fn delete_by_execution_id(&self, execution_id: &str) -> Result<()> {
        let mut storage = self.storage.write().await;
        storage.retain(|_, cp| cp.execution_id != execution_id);
        Ok(())
    }

    async fn mark_abandoned(&self, machine_id: &str) -> Result<u64> {
        let mut storage = self.storage.write().await;
        let mut count = 0;
        for cp in storage.values_mut() {
            if cp.machine_id == machine_id && cp.status == CheckpointStatus::InProgress {
                cp.mark_abandoned();
                count += 1;
            }
        }
        Ok(count)
    }

    async fn cleanup(&self, older_than: DateTime<Utc>) -> Result<u64> {
        let mut storage = self.storage.write().await;
        let before = storage.len();
        storage.retain(|_, cp| cp.updated_at >= older_than);
        Ok((before - storage.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(skill_id: &str, input: &str, machine_id: &str) -> WorkflowCheckpoint {
        WorkflowCheckpoint::new(
            uuid::Uuid::new_v4().to_string(),
            skill_id,
            "Skill",
            input,
            2,
            machine_id,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryCheckpointStore::new();
        let cp = sample("s1", "hi", "m1");
        store.create(&cp).await.unwrap();
        let fetched = store.get(&cp.id).await.unwrap().unwrap();
        assert_eq!(fetched.id, cp.id);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_latest_in_progress_ignores_completed() {
        let store = InMemoryCheckpointStore::new();
        let mut cp = sample("s1", "hi", "m1");
        store.create(&cp).await.unwrap();
        cp.mark_completed();
        store.update(&cp).await.unwrap();

        let result = store
            .get_latest_in_progress("s1", &cp.input_hash)
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_get_latest_in_progress_picks_most_recently_updated() {
        let store = InMemoryCheckpointStore::new();
        let mut older = sample("s1", "hi", "m1");
        older.update_batch(0, [], []);
        store.create(&older).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;

        let mut newer = sample("s1", "hi", "m1");
        newer.input_hash = older.input_hash.clone();
        newer.update_batch(0, [], []);
        store.create(&newer).await.unwrap();

        let result = store
            .get_latest_in_progress("s1", &older.input_hash)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(result.id, newer.id);
    }

    #[tokio::test]
    async fn test_list_filters_by_skill_id() {
        let store = InMemoryCheckpointStore::new();
        store.create(&sample("s1", "a", "m1")).await.unwrap();
        store.create(&sample("s2", "b", "m1")).await.unwrap();

        let filter = CheckpointFilter {
            skill_id: Some("s1".to_string()),
            ..Default::default()
        };
        let results = store.list(&filter).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].skill_id, "s1");
    }

    #[tokio::test]
    async fn test_delete_by_execution_id() {
        let store = InMemoryCheckpointStore::new();
        let cp = sample("s1", "a", "m1");
        store.create(&cp).await.unwrap();
        store.delete_by_execution_id(&cp.execution_id).await.unwrap();
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_mark_abandoned_only_affects_in_progress_on_machine() {
        let store = InMemoryCheckpointStore::new();
        let cp1 = sample("s1", "a", "dead-machine");
        let mut cp2 = sample("s1", "b", "dead-machine");
        cp2.mark_completed();
        let cp3 = sample("s1", "c", "other-machine");
        store.create(&cp1).await.unwrap();
        store.create(&cp2).await.unwrap();
        store.create(&cp3).await.unwrap();

        let affected = store.mark_abandoned("dead-machine").await.unwrap();
        assert_eq!(affected, 1);

        let fetched1 = store.get(&cp1.id).await.unwrap().unwrap();
        assert_eq!(fetched1.status, CheckpointStatus::Abandoned);
        let fetched3 = store.get(&cp3.id).await.unwrap().unwrap();
        assert_eq!(fetched3.status, CheckpointStatus::InProgress);
    }

    #[tokio::test]
    async fn test_cleanup_removes_old_checkpoints() {
        let store = InMemoryCheckpointStore::new();
        let cp = sample("s1", "a", "m1");
        store.create(&cp).await.unwrap();

        let cutoff = Utc::now() + chrono::Duration::seconds(1);
        let removed = store.cleanup(cutoff).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryCheckpointStore::new();
        store.create(&sample("s1", "a", "m1")).await.unwrap();
        store.clear().await;
        assert_eq!(store.len().await, 0);
    }
}
