//! The checkpointing executor decorator: wraps the batch-dispatch engine
//! with crash-recoverable persistence, resuming a prior in-progress run
//! instead of starting over when one exists for the same
//! `{skill_id, input}` pair.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use checkpoint::{CheckpointStore, PhaseResultData, WorkflowCheckpoint};
use dag::{Dag, ExecutionResult, PhaseResult, Skill};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::time::Instant;

use crate::config::{CheckpointConfig, ExecutorConfig};
use crate::engine::{self, BatchDelta, BatchObserver, EngineOutcome};
use crate::error::{ExecutorError, Result};
use crate::phase_executor::PhaseExecutor;
use crate::workflow::{initial_outputs, initial_results};

struct CheckpointPersister {
    store: Arc<dyn CheckpointStore>,
    checkpoint: Mutex<WorkflowCheckpoint>,
}

#[async_trait]
impl BatchObserver for CheckpointPersister {
    async fn on_batch_completed(&self, batch_index: usize, delta: &BatchDelta) {
        let mut checkpoint = self.checkpoint.lock().await;
        checkpoint.update_batch(
            batch_index,
            delta
                .results
                .iter()
                .map(|(id, result)| (id.clone(), PhaseResultData::from(result))),
            delta.outputs.iter().map(|(id, output)| (id.clone(), output.clone())),
        );
        // Best-effort: a failed persist must not abort the run. The
        // in-memory state this batch produced is still correct, only the
        // crash-resume point falls behind.
        if let Err(error) = self.store.update(&checkpoint).await {
            tracing::warn!(%error, batch_index, "failed to persist checkpoint after batch");
        }
    }
}

/// Decorates a [`PhaseExecutor`]-driven run with checkpoint persistence
/// and resume.
pub struct CheckpointingExecutor {
    phase_executor: Arc<PhaseExecutor>,
    executor_config: ExecutorConfig,
    checkpoint_config: CheckpointConfig,
    store: Arc<dyn CheckpointStore>,
}

impl CheckpointingExecutor {
    pub fn new(
        phase_executor: PhaseExecutor,
        executor_config: ExecutorConfig,
        checkpoint_config: CheckpointConfig,
        store: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            phase_executor: Arc::new(phase_executor),
            executor_config,
            checkpoint_config,
            store,
        }
    }

    /// Runs `skill` against `input`. When checkpointing is disabled this
    /// delegates straight to a plain [`crate::workflow::WorkflowExecutor`]
    /// equivalent; otherwise it implements the full validate ->
    /// resume-or-create -> per-batch-persist -> mark-completed protocol.
    pub async fn execute(&self, skill: &Skill, input: &str) -> Result<ExecutionResult> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.execute_cancellable(skill, input, cancel_rx).await
    }

    pub async fn execute_cancellable(
        &self,
        skill: &Skill,
        input: &str,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<ExecutionResult> {
        if !self.checkpoint_config.enabled {
            return self.run_without_checkpoint(skill, input, cancel_rx).await;
        }

        skill.validate()?;
        let dag = Dag::build(skill.phases.clone())?;
        let batches = dag.parallel_batches()?;
        let input_hash = checkpoint::hash_input(input);

        let existing = if self.checkpoint_config.resume {
            self.store
                .get_latest_in_progress(&skill.id, &input_hash)
                .await?
        } else {
            None
        };

        let (checkpoint, start_batch, results, outputs) = match existing {
            Some(restored) => {
                let (results, outputs) = restore_state(&skill.phases, &restored);
                let start_batch = (restored.completed_batch + 1).max(0) as usize;
                (restored, start_batch, results, outputs)
            }
            None => {
                let fresh = WorkflowCheckpoint::new(
                    uuid::Uuid::new_v4().to_string(),
                    skill.id.clone(),
                    skill.name.clone(),
                    input,
                    batches.len(),
                    self.checkpoint_config.machine_id.clone(),
                )?;
                self.store.create(&fresh).await?;
                (fresh, 0, initial_results(&skill.phases), initial_outputs(input))
            }
        };

        let results = Arc::new(Mutex::new(results));
        let outputs = Arc::new(Mutex::new(outputs));
        let semaphore = Arc::new(Semaphore::new(self.executor_config.max_parallel));
        let deadline = Instant::now() + self.executor_config.timeout;
        let start_time = Utc::now();

        let persister = Arc::new(CheckpointPersister {
            store: self.store.clone(),
            checkpoint: Mutex::new(checkpoint),
        });
        let observer: Arc<dyn BatchObserver> = persister.clone();

        let outcome = engine::run_batches(
            &dag,
            &batches,
            start_batch,
            self.phase_executor.clone(),
            semaphore,
            cancel_rx,
            deadline,
            results.clone(),
            outputs,
            Some(observer),
        )
        .await;

        match outcome {
            EngineOutcome::Cancelled => {
                self.mark_store_failed(&persister).await;
                Err(ExecutorError::Cancelled)
            }
            EngineOutcome::DeadlineExceeded => {
                self.mark_store_failed(&persister).await;
                Err(ExecutorError::DeadlineExceeded)
            }
            EngineOutcome::Completed => {
                let end_time = Utc::now();
                let result = engine::finalize(&skill.id, &dag, results, start_time, end_time).await;
                self.mark_store_terminal(&persister, &result).await;
                Ok(result)
            }
        }
    }

    async fn run_without_checkpoint(
        &self,
        skill: &Skill,
        input: &str,
        cancel_rx: watch::Receiver<bool>,
    ) -> Result<ExecutionResult> {
        skill.validate()?;
        let dag = Dag::build(skill.phases.clone())?;
        let batches = dag.parallel_batches()?;

        let results = Arc::new(Mutex::new(initial_results(&skill.phases)));
        let outputs = Arc::new(Mutex::new(initial_outputs(input)));
        let semaphore = Arc::new(Semaphore::new(self.executor_config.max_parallel));
        let deadline = Instant::now() + self.executor_config.timeout;
        let start_time = Utc::now();

        let outcome = engine::run_batches(
            &dag,
            &batches,
            0,
            self.phase_executor.clone(),
            semaphore,
            cancel_rx,
            deadline,
            results.clone(),
            outputs,
            None,
        )
        .await;

        match outcome {
            EngineOutcome::Cancelled => Err(ExecutorError::Cancelled),
            EngineOutcome::DeadlineExceeded => Err(ExecutorError::DeadlineExceeded),
            EngineOutcome::Completed => {
                let end_time = Utc::now();
                Ok(engine::finalize(&skill.id, &dag, results, start_time, end_time).await)
            }
        }
    }

    async fn mark_store_terminal(&self, persister: &Arc<CheckpointPersister>, result: &ExecutionResult) {
        let mut checkpoint = persister.checkpoint.lock().await;
        if result.status == dag::ExecutionStatus::Completed {
            checkpoint.mark_completed();
        } else {
            checkpoint.mark_failed();
        }
        if let Err(error) = self.store.update(&checkpoint).await {
            tracing::warn!(%error, "failed to persist final checkpoint status");
        }
    }

    async fn mark_store_failed(&self, persister: &Arc<CheckpointPersister>) {
        let mut checkpoint = persister.checkpoint.lock().await;
        checkpoint.mark_failed();
        if let Err(error) = self.store.update(&checkpoint).await {
            tracing::warn!(%error, "failed to persist checkpoint after cancellation/timeout");
        }
    }
}

/// Rebuilds the shared `results`/`outputs` maps from a resumed checkpoint:
/// every phase recorded as terminal keeps its persisted result and output;
/// every other phase (including any newly added to the skill since the
/// checkpoint was written) starts `pending`.
fn restore_state(phases: &[dag::Phase], checkpoint: &WorkflowCheckpoint) -> (HashMap<String, PhaseResult>, HashMap<String, String>) {
    let mut results = initial_results(phases);
    for (id, data) in &checkpoint.phase_results {
        if results.contains_key(id) {
            results.insert(id.clone(), data.to_phase_result());
        }
    }
    let outputs = checkpoint.phase_outputs.clone();
    (results, outputs)
}
