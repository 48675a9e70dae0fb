//! Phase, workflow, and checkpointing executors for skillgraph.
//!
//! This crate turns a [`dag::Skill`] into a running workflow: [`phase_executor::PhaseExecutor`]
//! renders one phase's prompt and calls an [`llm::Provider`] (optionally
//! through a [`cache::ResponseCache`]); [`workflow::WorkflowExecutor`]
//! dispatches a whole skill's phases batch by batch with bounded
//! concurrency; [`checkpointing::CheckpointingExecutor`] wraps that in
//! crash-recoverable persistence via a [`checkpoint::CheckpointStore`].
//!
//! The MCP subsystem (the `mcp` crate) is a separate, independently usable
//! tool-calling surface; nothing in this crate currently invokes it, since
//! a [`dag::Phase`] has no tool-reference field to dispatch through.

pub mod cache;
pub mod checkpointing;
pub mod config;
mod engine;
pub mod error;
pub mod phase_executor;
pub mod template;
pub mod workflow;

pub use cache::{default_fingerprint, CachedResponse, InMemoryResponseCache, ResponseCache, DEFAULT_CACHE_TTL};
pub use checkpointing::CheckpointingExecutor;
pub use config::{CheckpointConfig, ExecutorConfig};
pub use error::{ExecutorError, Result, TemplateError};
pub use phase_executor::{PhaseExecutor, PhaseOutcome};
pub use workflow::WorkflowExecutor;
