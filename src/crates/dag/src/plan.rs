//! Pre-run, read-only view of how a skill would execute: resolved models,
//! estimated cost, and the computed batch layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::phase::RoutingProfile;

/// One phase's resolved, estimated execution parameters, ahead of any
/// actual provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhasePlan {
    pub phase_id: String,
    pub routing_profile: RoutingProfile,
    pub resolved_model: String,
    pub resolved_provider: String,
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub estimated_cost: f64,
    pub batch_index: usize,
}

/// Aggregate token/cost estimates across every phase in a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanTotals {
    pub estimated_input_tokens: u64,
    pub estimated_output_tokens: u64,
    pub estimated_cost: f64,
}

/// A serializable, read-only pre-run view of a skill's execution: which
/// model each phase resolves to, how the phases batch, and totals across
/// the whole run. Emitted once; never mutated afterward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub skill_id: String,
    pub skill_name: String,
    pub input: String,
    pub phases: Vec<PhasePlan>,
    pub batches: Vec<Vec<String>>,
    pub totals: PlanTotals,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
