//! Phase/skill value objects and DAG scheduling.
//!
//! A [`Skill`] is a named, versioned workflow expressed as a sequence of
//! [`Phase`]s. [`Dag::build`] validates the dependency relation between
//! phases and [`Dag::parallel_batches`] yields the batch-by-batch
//! topological order the workflow executor dispatches at runtime.
//!
//! This crate owns the value objects and the scheduling algorithm only;
//! it has no knowledge of LLM providers, caching, or checkpointing; those
//! live in the `llm`, `executor`, and `checkpoint` crates respectively.

pub mod error;
pub mod graph;
pub mod loader;
pub mod phase;
pub mod plan;
pub mod result;
pub mod skill;

pub use error::{DagError, Result};
pub use graph::{Dag, DagNode};
pub use loader::{load_skill_file, SkillLoadError};
pub use phase::{Phase, RoutingProfile};
pub use plan::{ExecutionPlan, PhasePlan, PlanTotals};
pub use result::{
    compute_final_output, ExecutionResult, ExecutionStatus, PhaseResult, PhaseStatus,
};
pub use skill::{RoutingConfig, Skill};
