//! Facade error type unifying every lower-layer error this crate depends
//! on, plus the execution-layer errors that originate here.

use thiserror::Error;

/// Result type for executor operations.
pub type Result<T> = std::result::Result<T, ExecutorError>;

/// Errors the executor crate's public entry points can return.
///
/// Per-phase provider/template failures are captured in the phase's own
/// [`dag::PhaseResult`] and never surface here (see the propagation
/// policy this mirrors); this enum carries only the errors that abort a
/// whole run: validation, DAG construction, and cancellation/timeout.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The skill itself (or its routing config) failed validation.
    #[error("validation failed: {0}")]
    Validation(#[from] dag::DagError),

    /// A prompt template failed to parse or resolve.
    #[error("template error: {0}")]
    Template(#[from] TemplateError),

    /// The checkpoint store rejected or could not be read for a resume.
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    /// Reserved for call sites that route through the MCP tool layer;
    /// not exercised by the phase/workflow executors themselves.
    #[error("mcp error: {0}")]
    Mcp(#[from] mcp::McpError),

    /// The run's deadline elapsed before every phase reached a terminal
    /// status.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The run was cancelled by its caller.
    #[error("cancelled")]
    Cancelled,
}

/// Errors raised while rendering a phase's prompt template.
///
/// Kept distinct from [`ExecutorError`] so a failed render can be
/// captured as a phase's own error string (tagged `TEMPLATE_ERROR`)
/// without aborting the whole run, matching the propagation policy: a
/// template failure fails the one phase, not the run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unterminated template tag in {0:?}")]
    UnterminatedTag(String),

    #[error("invalid template variable path {0:?}")]
    InvalidPath(String),
}

impl TemplateError {
    pub fn tag(&self) -> &'static str {
        "TEMPLATE_ERROR"
    }
}
