//! Error types for phase/skill validation and DAG construction.

use thiserror::Error;

/// Result type for DAG operations.
pub type Result<T> = std::result::Result<T, DagError>;

/// Errors that can occur while validating a [`crate::Skill`] or building a
/// [`crate::Dag`] from its phases.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    /// A phase or skill field failed validation (empty required field, out
    /// of range numeric field, etc).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A skill was built with an empty phase list.
    #[error("skill '{0}' has no phases")]
    NoPhases(String),

    /// A phase's `dependsOn` references a phase id that does not exist in
    /// the skill.
    #[error("phase '{phase}' depends on unknown phase '{missing}'")]
    DependencyNotFound { phase: String, missing: String },

    /// The dependency relation among phases contains a cycle (including a
    /// self-loop).
    #[error("cycle detected in phase dependency graph, involving phase '{0}'")]
    Cycle(String),
}

impl DagError {
    /// The taxonomy tag this error corresponds to, for callers that branch
    /// on error kind rather than matching the full enum.
    pub fn tag(&self) -> &'static str {
        match self {
            DagError::Validation(_) => "VALIDATION",
            DagError::NoPhases(_) => "NO_PHASES",
            DagError::DependencyNotFound { .. } => "DEP_NOT_FOUND",
            DagError::Cycle(_) => "CYCLE",
        }
    }
}
