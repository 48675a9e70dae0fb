//! Tunables for the workflow and checkpointing executors.

use std::time::Duration;

/// Runtime configuration for a single [`crate::workflow::WorkflowExecutor`]
/// run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Maximum number of phases dispatched concurrently within a batch.
    pub max_parallel: usize,
    /// Wall-clock budget for the whole run, from the first batch dispatch.
    pub timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_parallel: 4,
            timeout: Duration::from_secs(5 * 60),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Checkpointing behavior layered on top of an [`ExecutorConfig`] run.
#[derive(Debug, Clone, Default)]
pub struct CheckpointConfig {
    /// Whether the checkpointing decorator is active at all. When
    /// `false`, [`crate::checkpointing::CheckpointingExecutor`] delegates
    /// straight through to the wrapped workflow executor.
    pub enabled: bool,
    /// Whether to look for and resume an in-progress checkpoint for the
    /// same `{skill_id, input}` pair before starting a fresh run.
    pub resume: bool,
    /// Machine identity recorded on checkpoints this process creates, and
    /// used to scope `mark_abandoned` sweeps.
    pub machine_id: String,
}

impl CheckpointConfig {
    pub fn enabled(machine_id: impl Into<String>) -> Self {
        Self {
            enabled: true,
            resume: false,
            machine_id: machine_id.into(),
        }
    }

    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }
}
