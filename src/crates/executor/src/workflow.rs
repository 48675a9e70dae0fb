//! The plain (non-checkpointing) workflow executor: dispatches a skill's
//! phases batch by batch, bounded to `config.max_parallel` concurrent
//! phases, honoring cancellation and an overall deadline.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use dag::{Dag, ExecutionResult, PhaseResult, Skill};
use tokio::sync::{watch, Mutex, Semaphore};
use tokio::time::Instant;

use crate::config::ExecutorConfig;
use crate::engine::{self, EngineOutcome};
use crate::error::{ExecutorError, Result};
use crate::phase_executor::PhaseExecutor;

/// Executes one skill run to completion against a fresh, non-persisted
/// set of phase results.
///
/// For crash-recoverable runs, wrap this in a
/// [`crate::checkpointing::CheckpointingExecutor`] instead of calling it
/// directly.
pub struct WorkflowExecutor {
    phase_executor: Arc<PhaseExecutor>,
    config: ExecutorConfig,
}

impl WorkflowExecutor {
    pub fn new(phase_executor: PhaseExecutor, config: ExecutorConfig) -> Self {
        Self {
            phase_executor: Arc::new(phase_executor),
            config,
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.config = self.config.with_max_parallel(max_parallel);
        self
    }

    /// Validates `skill`, builds its DAG and batch plan, and runs every
    /// phase to a terminal status. Returns `Err` only for a validation
    /// failure, a cancellation, or a deadline overrun; a phase's own
    /// provider/template failure is captured in its [`PhaseResult`], never
    /// propagated here.
    pub async fn execute(&self, skill: &Skill, input: &str) -> Result<ExecutionResult> {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        self.execute_cancellable(skill, input, cancel_rx).await
    }

    /// Same as [`Self::execute`], but dispatch stops as soon as
    /// `cancel_rx` observes `true`: every phase not yet in flight is
    /// marked skipped and [`ExecutorError::Cancelled`] is returned.
    pub async fn execute_cancellable(
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
        let semaphore = Arc::new(Semaphore::new(self.config.max_parallel));
        let deadline = Instant::now() + self.config.timeout;
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
}

pub(crate) fn initial_results(phases: &[dag::Phase]) -> HashMap<String, PhaseResult> {
    phases
        .iter()
        .map(|p| (p.id.clone(), PhaseResult::pending(&p.id, &p.name)))
        .collect()
}

pub(crate) fn initial_outputs(input: &str) -> HashMap<String, String> {
    let mut outputs = HashMap::new();
    outputs.insert("_input".to_string(), input.to_string());
    outputs
}

#[cfg(test)]
mod tests {
    use super::*;
    use dag::{Phase, RoutingConfig};
    use llm::MockProvider;
    use std::time::Duration;

    fn routing() -> RoutingConfig {
        RoutingConfig {
            cheap_model: "cheap".into(),
            balanced_model: "balanced".into(),
            premium_model: "premium".into(),
        }
    }

    fn executor_with(provider: Arc<MockProvider>) -> WorkflowExecutor {
        let phase_executor = PhaseExecutor::new(provider, routing());
        WorkflowExecutor::new(phase_executor, ExecutorConfig::default())
    }

    #[tokio::test]
    async fn test_linear_chain_runs_every_phase_and_joins_output() {
        let provider = Arc::new(MockProvider::responding_with(|req| {
            format!("[{}]", req.messages.last().unwrap().content)
        }));
        let executor = executor_with(provider.clone());
        let skill = Skill::new(
            "s1",
            "Skill",
            vec![
                Phase::new("a", "A", "{{._input}}"),
                Phase::new("b", "B", "{{.a}}").with_depends_on(vec!["a".to_string()]),
                Phase::new("c", "C", "{{.b}}").with_depends_on(vec!["b".to_string()]),
            ],
        );

        let result = executor.execute(&skill, "in").await.unwrap();
        assert_eq!(result.status, dag::ExecutionStatus::Completed);
        assert!(result.all_phases_terminal());
        assert_eq!(provider.call_count(), 3);
        assert_eq!(result.final_output, "[[[in]]]");
    }

    #[tokio::test]
    async fn test_diamond_dag_runs_middle_batch_concurrently() {
        let provider = Arc::new(MockProvider::responding_with(|_| "x".to_string()).with_delay(Duration::from_millis(20)));
        let executor = executor_with(provider.clone()).with_max_parallel(2);
        let skill = Skill::new(
            "s1",
            "Skill",
            vec![
                Phase::new("a", "A", "{{._input}}"),
                Phase::new("b", "B", "{{.a}}").with_depends_on(vec!["a".to_string()]),
                Phase::new("c", "C", "{{.a}}").with_depends_on(vec!["a".to_string()]),
                Phase::new("d", "D", "{{.b}}{{.c}}").with_depends_on(vec!["b".to_string(), "c".to_string()]),
            ],
        );

        let result = executor.execute(&skill, "in").await.unwrap();
        assert_eq!(result.status, dag::ExecutionStatus::Completed);
        assert!(provider.max_observed_concurrency() >= 2);
    }

    #[tokio::test]
    async fn test_failed_phase_skips_its_dependents() {
        let provider = Arc::new(MockProvider::failing_with("boom"));
        let executor = executor_with(provider.clone());
        let skill = Skill::new(
            "s1",
            "Skill",
            vec![
                Phase::new("a", "A", "{{._input}}"),
                Phase::new("b", "B", "{{.a}}").with_depends_on(vec!["a".to_string()]),
            ],
        );

        let result = executor.execute(&skill, "in").await.unwrap();
        assert_eq!(result.status, dag::ExecutionStatus::Failed);
        assert_eq!(result.phase_results["a"].status, dag::PhaseStatus::Failed);
        assert_eq!(result.phase_results["b"].status, dag::PhaseStatus::Skipped);
    }

    /// A provider that fails calls whose rendered prompt carries `fail_marker`
    /// and otherwise echoes the prompt back, used to fail exactly one phase
    /// in a batch while letting its independent siblings succeed.
    struct PartialFailureProvider {
        fail_marker: &'static str,
        calls: std::sync::atomic::AtomicU64,
    }

    impl PartialFailureProvider {
        fn new(fail_marker: &'static str) -> Self {
            Self {
                fail_marker,
                calls: std::sync::atomic::AtomicU64::new(0),
            }
        }

        fn call_count(&self) -> u64 {
            self.calls.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl llm::Complete for PartialFailureProvider {
        async fn complete(&self, request: llm::Request) -> llm::Result<llm::Response> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let prompt = &request.messages.last().unwrap().content;
            if prompt.contains(self.fail_marker) {
                return Err(llm::LlmError::ProviderError("boom".to_string()));
            }
            Ok(llm::Response {
                content: prompt.clone(),
                input_tokens: 0,
                output_tokens: 0,
                finish_reason: llm::FinishReason::Stop,
                model_used: request.model_id,
                duration: Duration::ZERO,
            })
        }
    }

    #[async_trait::async_trait]
    impl llm::Stream for PartialFailureProvider {
        async fn stream(
            &self,
            request: llm::Request,
            on_chunk: &mut (dyn FnMut(llm::StreamChunk) -> llm::Result<()> + Send),
        ) -> llm::Result<llm::Response> {
            let response = self.complete(request).await?;
            on_chunk(llm::StreamChunk {
                text: response.content.clone(),
                input_tokens_so_far: 0,
                output_tokens_estimate: 0,
            })?;
            Ok(response)
        }
    }

    #[tokio::test]
    async fn test_failure_aborts_the_whole_run_not_just_dependents() {
        // `fail` and `ok` are independent (batch 0, no shared dependency);
        // `after` depends only on `ok` (batch 1). Per §4.4 point 3, a
        // failure anywhere aborts the whole run: `after` must be skipped
        // even though its own dependency succeeded, and the provider must
        // never be called for it.
        let provider = Arc::new(PartialFailureProvider::new("fail-me"));
        let provider_dyn: Arc<dyn llm::Provider> = provider.clone();
        let phase_executor = PhaseExecutor::new(provider_dyn, routing());
        let executor = WorkflowExecutor::new(phase_executor, ExecutorConfig::default());
        let skill = Skill::new(
            "s1",
            "Skill",
            vec![
                Phase::new("fail", "Fail", "fail-me:{{._input}}"),
                Phase::new("ok", "Ok", "ok:{{._input}}"),
                Phase::new("after", "After", "{{.ok}}").with_depends_on(vec!["ok".to_string()]),
            ],
        );

        let result = executor.execute(&skill, "in").await.unwrap();
        assert_eq!(result.status, dag::ExecutionStatus::Failed);
        assert_eq!(result.phase_results["fail"].status, dag::PhaseStatus::Failed);
        assert_eq!(result.phase_results["ok"].status, dag::PhaseStatus::Completed);
        assert_eq!(
            result.phase_results["after"].status,
            dag::PhaseStatus::Skipped,
            "after has no dependency on the failed phase but the whole run must still abort"
        );
        assert_eq!(provider.call_count(), 2, "after must never reach the provider");
    }

    #[tokio::test]
    async fn test_cancellation_skips_phases_not_yet_dispatched() {
        let provider = Arc::new(MockProvider::responding_with(|_| "ok".to_string()).with_delay(Duration::from_millis(50)));
        let executor = executor_with(provider.clone()).with_max_parallel(1);
        let skill = Skill::new(
            "s1",
            "Skill",
            vec![
                Phase::new("a", "A", "{{._input}}"),
                Phase::new("b", "B", "{{.a}}").with_depends_on(vec!["a".to_string()]),
            ],
        );
        let (cancel_tx, cancel_rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let _ = cancel_tx.send(true);
        });

        let result = executor.execute_cancellable(&skill, "in", cancel_rx).await;
        assert!(matches!(result, Err(ExecutorError::Cancelled)));
    }
}
