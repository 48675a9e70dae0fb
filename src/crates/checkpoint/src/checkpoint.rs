//! The `WorkflowCheckpoint` aggregate: a persisted snapshot sufficient to
//! resume a workflow at the next incomplete batch after a crash.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dag::{PhaseResult, PhaseStatus};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CheckpointError, Result};

/// 1 MiB, the maximum size of the `input` a checkpoint may carry.
pub const MAX_INPUT_BYTES: usize = 1024 * 1024;

/// Status of a checkpointed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    InProgress,
    Completed,
    Failed,
    Abandoned,
}

/// Serializable form of a [`dag::PhaseResult`]: timestamps as unix-nanos
/// and the error reduced to a plain string, so the checkpoint aggregate
/// has no dependency on how the executor represents an in-flight error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseResultData {
    pub phase_id: String,
    pub phase_name: String,
    pub status: PhaseStatus,
    pub output: Option<String>,
    pub error: Option<String>,
    pub start_time_unix_nanos: Option<i64>,
    pub end_time_unix_nanos: Option<i64>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_used: Option<String>,
    pub cache_hit: bool,
    pub cost: f64,
}

impl From<&PhaseResult> for PhaseResultData {
    fn from(r: &PhaseResult) -> Self {
        Self {
            phase_id: r.phase_id.clone(),
            phase_name: r.phase_name.clone(),
            status: r.status,
            output: r.output.clone(),
            error: r.error.clone(),
            start_time_unix_nanos: r.start_time.and_then(|t| t.timestamp_nanos_opt()),
            end_time_unix_nanos: r.end_time.and_then(|t| t.timestamp_nanos_opt()),
            input_tokens: r.input_tokens,
            output_tokens: r.output_tokens,
            model_used: r.model_used.clone(),
            cache_hit: r.cache_hit,
            cost: r.cost,
        }
    }
}

impl PhaseResultData {
    /// Reconstructs a [`dag::PhaseResult`] from its persisted form.
    pub fn to_phase_result(&self) -> PhaseResult {
        PhaseResult {
            phase_id: self.phase_id.clone(),
            phase_name: self.phase_name.clone(),
            status: self.status,
            output: self.output.clone(),
            error: self.error.clone(),
            start_time: self.start_time_unix_nanos.map(DateTime::from_timestamp_nanos),
            end_time: self.end_time_unix_nanos.map(DateTime::from_timestamp_nanos),
            duration_ms: match (self.start_time_unix_nanos, self.end_time_unix_nanos) {
                (Some(s), Some(e)) => Some((e - s) / 1_000_000),
                _ => None,
            },
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            model_used: self.model_used.clone(),
            cache_hit: self.cache_hit,
            cost: self.cost,
        }
    }
}

/// A persisted snapshot of one in-flight (or finished) workflow run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub id: String,
    pub execution_id: String,
    pub skill_id: String,
    pub skill_name: String,
    pub input: String,
    pub input_hash: String,
    pub completed_batch: i64,
    pub total_batches: usize,
    pub phase_results: HashMap<String, PhaseResultData>,
    pub phase_outputs: HashMap<String, String>,
    pub status: CheckpointStatus,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub machine_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    /// Starts a new in-progress checkpoint for a run about to begin its
    /// first batch: `completedBatch = -1`, `_input` pre-seeded into
    /// `phaseOutputs`.
    pub fn new(
        execution_id: impl Into<String>,
        skill_id: impl Into<String>,
        skill_name: impl Into<String>,
        input: impl Into<String>,
        total_batches: usize,
        machine_id: impl Into<String>,
    ) -> Result<Self> {
        let input = input.into();
        if input.len() > MAX_INPUT_BYTES {
            return Err(CheckpointError::Invalid(format!(
                "input is {} bytes, exceeds the 1 MiB limit",
                input.len()
            )));
        }
        if total_batches == 0 {
            return Err(CheckpointError::Invalid(
                "total_batches must be at least 1".into(),
            ));
        }

        let input_hash = hash_input(&input);
        let now = Utc::now();
        let mut phase_outputs = HashMap::new();
        phase_outputs.insert("_input".to_string(), input.clone());

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            execution_id: execution_id.into(),
            skill_id: skill_id.into(),
            skill_name: skill_name.into(),
            input,
            input_hash,
            completed_batch: -1,
            total_batches,
            phase_results: HashMap::new(),
            phase_outputs,
            status: CheckpointStatus::InProgress,
            input_tokens: 0,
            output_tokens: 0,
            machine_id: machine_id.into(),
            created_at: now,
            updated_at: now,
        })
    }

    /// A checkpoint is resumable iff it is still `in_progress`.
    pub fn is_resumable(&self) -> bool {
        self.status == CheckpointStatus::InProgress
    }

    /// Validates the aggregate's own invariants: `totalBatches >= 1`,
    /// `completedBatch < totalBatches`, `input <= 1 MiB`, `createdAt <=
    /// updatedAt`.
    pub fn validate(&self) -> Result<()> {
        if self.total_batches == 0 {
            return Err(CheckpointError::Invalid(
                "total_batches must be at least 1".into(),
            ));
        }
        if self.completed_batch >= self.total_batches as i64 {
            return Err(CheckpointError::Invalid(format!(
                "completed_batch {} must be less than total_batches {}",
                self.completed_batch, self.total_batches
            )));
        }
        if self.input.len() > MAX_INPUT_BYTES {
            return Err(CheckpointError::Invalid(
                "input exceeds the 1 MiB limit".into(),
            ));
        }
        if self.updated_at < self.created_at {
            return Err(CheckpointError::Invalid(
                "updated_at must not precede created_at".into(),
            ));
        }
        Ok(())
    }

    /// Records batch `batch_index` as completed, merging `results`
    /// (phase-id → result) and `outputs` (phase-id → output) into the
    /// aggregate, touching `updatedAt`.
    pub fn update_batch(
        &mut self,
        batch_index: usize,
        results: impl IntoIterator<Item = (String, PhaseResultData)>,
        outputs: impl IntoIterator<Item = (String, String)>,
    ) {
        self.completed_batch = batch_index as i64;
        self.phase_results.extend(results);
        self.phase_outputs.extend(outputs);
        self.touch();
    }

    pub fn mark_completed(&mut self) {
        self.status = CheckpointStatus::Completed;
        self.touch();
    }

    pub fn mark_failed(&mut self) {
        self.status = CheckpointStatus::Failed;
        self.touch();
    }

    pub fn mark_abandoned(&mut self) {
        self.status = CheckpointStatus::Abandoned;
        self.touch();
    }

    fn touch(&mut self) {
        let now = Utc::now();
        // updated_at is required to be monotonic; never move it backward
        // even if the system clock jitters between calls.
        self.updated_at = now.max(self.updated_at);
    }
}

/// `inputHash`: the first 16 bytes (32 hex chars) of the SHA-256 digest of
/// `input`, used to correlate resumable checkpoints with a given
/// `{skillId, input}` pair without storing `input` itself as a lookup key.
pub fn hash_input(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest[..16].iter().map(|b| format!("{b:02x}")).collect()
}
