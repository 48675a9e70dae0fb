//! The LLM provider port.
//!
//! This crate defines the request/response/message shapes a phase
//! executor speaks, the [`Complete`]/[`Stream`] provider traits, and the
//! routing-profile → model-id mapping contract. It intentionally ships no
//! concrete provider implementation: wiring up an HTTP client against a
//! hosted API (or a local inference server) is external-collaborator
//! territory the binary crate owns, not this crate. [`mock::MockProvider`]
//! is the one bundled implementation, used throughout this workspace's
//! tests.

pub mod error;
pub mod message;
pub mod mock;
pub mod provider;
pub mod request;
pub mod routing;

pub use error::{LlmError, Result};
pub use message::{Message, Role};
pub use mock::MockProvider;
pub use provider::{Complete, Provider, Stream};
pub use request::{FinishReason, Request, Response, StreamChunk};
pub use routing::resolve_model;
