//! The batch-parallel dispatch loop shared by [`crate::workflow::WorkflowExecutor`]
//! and [`crate::checkpointing::CheckpointingExecutor`].
//!
//! Neither caller talks to [`tokio::task`]/[`tokio::sync::Semaphore`]
//! directly; they hand this module a [`Dag`], the batch plan, and the
//! shared run state, and get back an [`EngineOutcome`] plus an optional
//! per-batch notification for the checkpointing layer to persist.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dag::{compute_final_output, Dag, ExecutionResult, ExecutionStatus, PhaseResult, PhaseStatus};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::time::Instant;

use crate::phase_executor::{PhaseExecutor, PhaseOutcome};

/// How a [`run_batches`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EngineOutcome {
    /// Every batch from the starting index was dispatched (individual
    /// phases may still have failed or been skipped; that is recorded in
    /// `results`, not in this outcome).
    Completed,
    Cancelled,
    DeadlineExceeded,
}

/// The phase results and outputs touched by one batch, handed to a
/// [`BatchObserver`] right after that batch's barrier so it can persist an
/// incremental checkpoint without re-reading the whole run's state.
pub(crate) struct BatchDelta {
    pub results: HashMap<String, PhaseResult>,
    pub outputs: HashMap<String, String>,
}

/// Notified once per completed batch. [`crate::checkpointing::CheckpointingExecutor`]
/// is the one real implementation; the plain workflow executor passes `None`.
#[async_trait]
pub(crate) trait BatchObserver: Send + Sync {
    async fn on_batch_completed(&self, batch_index: usize, delta: &BatchDelta);
}

/// Runs `batches[start_batch..]` to completion, one barrier per batch,
/// with up to `semaphore`'s permit count of phases in flight at once.
///
/// `results` must already contain a (pending or restored-terminal) entry
/// for every phase in `dag`; `outputs` must already contain `_input` (and,
/// on resume, every previously-completed phase's output). Phases whose
/// result is already terminal on entry are treated as restored from a
/// checkpoint and are not re-dispatched.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn run_batches(
    dag: &Dag,
    batches: &[Vec<String>],
    start_batch: usize,
    phase_executor: Arc<PhaseExecutor>,
    semaphore: Arc<Semaphore>,
    cancel_rx: watch::Receiver<bool>,
    deadline: Instant,
    results: Arc<Mutex<HashMap<String, PhaseResult>>>,
    outputs: Arc<Mutex<HashMap<String, String>>>,
    observer: Option<Arc<dyn BatchObserver>>,
) -> EngineOutcome {
    for (batch_index, batch) in batches.iter().enumerate().skip(start_batch) {
        if *cancel_rx.borrow() {
            skip_remaining(dag, &batches[batch_index..], &results).await;
            return EngineOutcome::Cancelled;
        }
        if Instant::now() >= deadline {
            skip_remaining(dag, &batches[batch_index..], &results).await;
            return EngineOutcome::DeadlineExceeded;
        }

        let mut handles = Vec::with_capacity(batch.len());
        for phase_id in batch {
            let already_terminal = results
                .lock()
                .await
                .get(phase_id)
                .map(|r| r.status.is_terminal())
                .unwrap_or(false);
            if already_terminal {
                continue;
            }

            // A phase's declared dependencies are always satisfied by the
            // time its batch is dispatched: any failure in an earlier
            // batch aborts the whole run (see the batch-failure check
            // below) before this batch is ever reached.
            let phase = match dag.get_phase(phase_id) {
                Some(p) => p.clone(),
                None => continue,
            };
            let phase_executor = phase_executor.clone();
            let semaphore = semaphore.clone();
            let results = results.clone();
            let outputs = outputs.clone();
            let mut cancel_rx = cancel_rx.clone();
            let phase_id = phase_id.clone();

            handles.push(tokio::spawn(async move {
                let permit = tokio::select! {
                    biased;
                    _ = cancel_rx.wait_for(|cancelled| *cancelled) => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    let mut guard = results.lock().await;
                    if let Some(r) = guard.get_mut(&phase_id) {
                        r.mark_skipped(Utc::now());
                    }
                    return;
                };

                {
                    let mut guard = results.lock().await;
                    if let Some(r) = guard.get_mut(&phase_id) {
                        r.mark_running(Utc::now());
                    }
                }

                let namespace = outputs.lock().await.clone();
                let outcome = phase_executor.execute(&phase, &namespace).await;
                let now = Utc::now();

                match outcome {
                    PhaseOutcome::Completed {
                        output,
                        input_tokens,
                        output_tokens,
                        model_used,
                        cache_hit,
                    } => {
                        {
                            let mut guard = results.lock().await;
                            if let Some(r) = guard.get_mut(&phase_id) {
                                r.mark_completed(output.clone(), input_tokens, output_tokens, model_used, cache_hit, now);
                            }
                        }
                        outputs.lock().await.insert(phase_id.clone(), output);
                    }
                    PhaseOutcome::Failed { error } => {
                        let mut guard = results.lock().await;
                        if let Some(r) = guard.get_mut(&phase_id) {
                            r.mark_failed(error, now);
                        }
                    }
                }
            }));
        }

        for handle in handles {
            // A panicking phase task must not be silently lost; surface it
            // as a failed phase instead of propagating the panic here.
            if let Err(join_error) = handle.await {
                tracing::error!(%join_error, "phase task panicked");
            }
        }

        if let Some(observer) = &observer {
            let delta = build_delta(batch, &results, &outputs).await;
            observer.on_batch_completed(batch_index, &delta).await;
        }

        // §4.4 point 3: a phase failure anywhere in this batch aborts the
        // whole run, not just that phase's own dependents. Every phase not
        // yet terminal — including independent branches with no relation
        // to the failed phase — is skipped and dispatch stops here.
        let batch_failed = {
            let guard = results.lock().await;
            batch
                .iter()
                .any(|id| matches!(guard.get(id).map(|r| r.status), Some(PhaseStatus::Failed)))
        };
        if batch_failed {
            skip_remaining(dag, &batches[batch_index + 1..], &results).await;
            return EngineOutcome::Completed;
        }
    }

    EngineOutcome::Completed
}

async fn build_delta(
    batch: &[String],
    results: &Arc<Mutex<HashMap<String, PhaseResult>>>,
    outputs: &Arc<Mutex<HashMap<String, String>>>,
) -> BatchDelta {
    let results_guard = results.lock().await;
    let outputs_guard = outputs.lock().await;
    let mut delta = BatchDelta {
        results: HashMap::with_capacity(batch.len()),
        outputs: HashMap::new(),
    };
    for phase_id in batch {
        if let Some(result) = results_guard.get(phase_id) {
            delta.results.insert(phase_id.clone(), result.clone());
        }
        if let Some(output) = outputs_guard.get(phase_id) {
            delta.outputs.insert(phase_id.clone(), output.clone());
        }
    }
    delta
}

/// Reduces the final shared state into the [`dag::ExecutionResult`] both
/// executors return: aggregate token/cost/cache totals, `finalOutput` from
/// the DAG's terminal phases, and a run status of `Failed` iff any phase
/// failed (a skip is always downstream of a failure or of cancellation,
/// neither of which should read as a silent success).
pub(crate) async fn finalize(
    skill_id: &str,
    dag: &Dag,
    results: Arc<Mutex<HashMap<String, PhaseResult>>>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
) -> ExecutionResult {
    let phase_results = results.lock().await.clone();

    let mut total_tokens = 0u64;
    let mut total_cost = 0.0;
    let mut cache_hits = 0u64;
    let mut cache_misses = 0u64;
    let mut any_failed = false;

    for result in phase_results.values() {
        total_tokens += result.input_tokens + result.output_tokens;
        total_cost += result.cost;
        match result.status {
            PhaseStatus::Failed => any_failed = true,
            PhaseStatus::Completed => {
                if result.cache_hit {
                    cache_hits += 1;
                } else {
                    cache_misses += 1;
                }
            }
            _ => {}
        }
    }

    let final_output = compute_final_output(&dag.terminal_phases(), &phase_results);
    let status = if any_failed {
        ExecutionStatus::Failed
    } else {
        ExecutionStatus::Completed
    };

    ExecutionResult {
        skill_id: skill_id.to_string(),
        status,
        phase_results,
        final_output,
        total_tokens,
        total_cost,
        cache_hits,
        cache_misses,
        start_time,
        end_time,
    }
}

async fn skip_remaining(dag: &Dag, remaining_batches: &[Vec<String>], results: &Arc<Mutex<HashMap<String, PhaseResult>>>) {
    let mut guard = results.lock().await;
    let now = Utc::now();
    for batch in remaining_batches {
        for phase_id in batch {
            if dag.get_phase(phase_id).is_none() {
                continue;
            }
            if let Some(r) = guard.get_mut(phase_id) {
                if !r.status.is_terminal() {
                    r.mark_skipped(now);
                }
            }
        }
    }
}
