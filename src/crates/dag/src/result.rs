//! Mutable run-time results: per-phase status and the aggregate outcome
//! of executing a whole skill.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a single phase within a run.
///
/// `pending` at run start; `running` once dispatched; `completed` or
/// `failed` on provider return; `skipped` if a predecessor failed or the
/// run was cancelled before this phase started. All but `pending` and
/// `running` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PhaseStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PhaseStatus::Completed | PhaseStatus::Failed | PhaseStatus::Skipped
        )
    }
}

/// The outcome of running one phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResult {
    pub phase_id: String,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_used: Option<String>,
    pub cache_hit: bool,
    pub cost: f64,
}

impl PhaseResult {
    /// A fresh `pending` result for `phase_id`/`phase_name`, as created at
    /// run start before any batch has dispatched it.
    pub fn pending(phase_id: impl Into<String>, phase_name: impl Into<String>) -> Self {
        Self {
            phase_id: phase_id.into(),
            phase_name: phase_name.into(),
            status: PhaseStatus::Pending,
            output: None,
            error: None,
            start_time: None,
            end_time: None,
            duration_ms: None,
            input_tokens: 0,
            output_tokens: 0,
            model_used: None,
            cache_hit: false,
            cost: 0.0,
        }
    }

    pub fn mark_running(&mut self, now: DateTime<Utc>) {
        self.status = PhaseStatus::Running;
        self.start_time = Some(now);
    }

    pub fn mark_completed(
        &mut self,
        output: String,
        input_tokens: u64,
        output_tokens: u64,
        model_used: String,
        cache_hit: bool,
        now: DateTime<Utc>,
    ) {
        self.status = PhaseStatus::Completed;
        self.output = Some(output);
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self.model_used = Some(model_used);
        self.cache_hit = cache_hit;
        self.finish(now);
    }

    pub fn mark_failed(&mut self, error: String, now: DateTime<Utc>) {
        self.status = PhaseStatus::Failed;
        self.error = Some(error);
        self.finish(now);
    }

    /// Marks the phase `skipped` with a zero duration but a terminal
    /// `start_time = end_time = now`: the phase was never dispatched
    /// because a predecessor failed or the run was cancelled.
    pub fn mark_skipped(&mut self, now: DateTime<Utc>) {
        self.status = PhaseStatus::Skipped;
        self.start_time = Some(now);
        self.end_time = Some(now);
        self.duration_ms = Some(0);
    }

    fn finish(&mut self, now: DateTime<Utc>) {
        self.end_time = Some(now);
        if let Some(start) = self.start_time {
            self.duration_ms = Some((now - start).num_milliseconds());
        }
    }
}

/// The final status of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Completed,
    Failed,
}

/// The aggregate outcome of executing a skill end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub skill_id: String,
    pub status: ExecutionStatus,
    pub phase_results: HashMap<String, PhaseResult>,
    pub final_output: String,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl ExecutionResult {
    /// `true` iff every phase result has a terminal status: the universal
    /// property every run must satisfy regardless of outcome.
    pub fn all_phases_terminal(&self) -> bool {
        self.phase_results.values().all(|r| r.status.is_terminal())
    }
}

/// Computes the run's final output: the output of the unique terminal
/// phase, or, if multiple, their outputs concatenated in
/// `declaration_order` joined by a blank-line separator. Phases with no
/// output (failed/skipped) contribute nothing.
pub fn compute_final_output(
    terminal_phase_ids: &[String],
    phase_results: &HashMap<String, PhaseResult>,
) -> String {
    terminal_phase_ids
        .iter()
        .filter_map(|id| phase_results.get(id))
        .filter_map(|r| r.output.clone())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_result_is_not_terminal() {
        let result = PhaseResult::pending("a", "A");
        assert!(!result.status.is_terminal());
    }

    #[test]
    fn test_mark_completed_sets_terminal_fields() {
        let mut result = PhaseResult::pending("a", "A");
        let t0 = Utc::now();
        result.mark_running(t0);
        result.mark_completed("out".into(), 10, 20, "balanced-model".into(), false, t0);
        assert!(result.status.is_terminal());
        assert_eq!(result.output.as_deref(), Some("out"));
    }

    #[test]
    fn test_mark_skipped_has_zero_duration() {
        let mut result = PhaseResult::pending("a", "A");
        let now = Utc::now();
        result.mark_skipped(now);
        assert_eq!(result.duration_ms, Some(0));
        assert_eq!(result.start_time, result.end_time);
    }

    #[test]
    fn test_compute_final_output_single_terminal() {
        let mut results = HashMap::new();
        let mut c = PhaseResult::pending("c", "C");
        c.mark_completed("out-C".into(), 0, 0, "m".into(), false, Utc::now());
        results.insert("c".to_string(), c);
        assert_eq!(
            compute_final_output(&["c".to_string()], &results),
            "out-C"
        );
    }

    #[test]
    fn test_compute_final_output_multiple_terminals_joined() {
        let mut results = HashMap::new();
        let mut b = PhaseResult::pending("b", "B");
        b.mark_completed("out-B".into(), 0, 0, "m".into(), false, Utc::now());
        let mut c = PhaseResult::pending("c", "C");
        c.mark_completed("out-C".into(), 0, 0, "m".into(), false, Utc::now());
        results.insert("b".to_string(), b);
        results.insert("c".to_string(), c);
        assert_eq!(
            compute_final_output(&["b".to_string(), "c".to_string()], &results),
            "out-B\n\nout-C"
        );
    }
}
