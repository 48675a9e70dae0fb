//! The provider port: the capability set every LLM backend implements.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::{Request, Response, StreamChunk};

/// A provider capable of a single request/response completion.
///
/// This crate defines the port only; concrete backends (an HTTP client
/// against a hosted API, a local inference server) are external
/// collaborators plugged in at construction time by the binary wiring
/// them up, matching the rest of this workspace's port/adapter split.
#[async_trait]
pub trait Complete: Send + Sync {
    async fn complete(&self, request: Request) -> Result<Response>;
}

/// A provider capable of streaming its completion token-by-token.
///
/// `on_chunk` is invoked serially, in stream order; if it returns an
/// error the stream is aborted and that error is returned from
/// [`Stream::stream`].
#[async_trait]
pub trait Stream: Send + Sync {
    async fn stream(
        &self,
        request: Request,
        on_chunk: &mut (dyn FnMut(StreamChunk) -> Result<()> + Send),
    ) -> Result<Response>;
}

/// The full provider capability set the executor depends on. A provider
/// that only supports non-streaming completion may implement `Complete`
/// alone and layer a trivial `Stream` adapter that emits one synthetic
/// chunk (see [`crate::mock::MockProvider`] for the pattern).
pub trait Provider: Complete + Stream {}

impl<T: Complete + Stream> Provider for T {}
