//! A scriptable mock provider for executor and scenario tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{LlmError, Result};
use crate::provider::{Complete, Stream};
use crate::request::{FinishReason, Request, Response, StreamChunk};

/// How a [`MockProvider`] should respond to `complete`/`stream` calls.
pub enum MockBehavior {
    /// Return `content` derived from the request via `responder`.
    Respond(Arc<dyn Fn(&Request) -> String + Send + Sync>),
    /// Fail every call with the given message.
    Fail(String),
}

/// A provider whose behavior and latency are fixed at construction time,
/// used throughout this workspace's tests in place of a real LLM backend
/// (see the scenario tests in the `executor` crate).
pub struct MockProvider {
    behavior: MockBehavior,
    delay: Duration,
    call_count: AtomicU64,
    concurrent_calls: AtomicU64,
    max_observed_concurrency: AtomicU64,
    guard: Mutex<()>,
}

impl MockProvider {
    pub fn responding_with(responder: impl Fn(&Request) -> String + Send + Sync + 'static) -> Self {
        Self {
            behavior: MockBehavior::Respond(Arc::new(responder)),
            delay: Duration::ZERO,
            call_count: AtomicU64::new(0),
            concurrent_calls: AtomicU64::new(0),
            max_observed_concurrency: AtomicU64::new(0),
            guard: Mutex::new(()),
        }
    }

    pub fn failing_with(message: impl Into<String>) -> Self {
        Self {
            behavior: MockBehavior::Fail(message.into()),
            delay: Duration::ZERO,
            call_count: AtomicU64::new(0),
            concurrent_calls: AtomicU64::new(0),
            max_observed_concurrency: AtomicU64::new(0),
            guard: Mutex::new(()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Total number of `complete`/`stream` calls observed so far.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// The maximum number of calls that were ever in flight
    /// simultaneously, used to assert bounded parallelism.
    pub fn max_observed_concurrency(&self) -> u64 {
        self.max_observed_concurrency.load(Ordering::SeqCst)
    }

    async fn run(&self, request: &Request) -> Result<String> {
        let _permit = self.guard.lock().await;
        let in_flight = self.concurrent_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_observed_concurrency
            .fetch_max(in_flight, Ordering::SeqCst);
        drop(_permit);

        self.call_count.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match &self.behavior {
            MockBehavior::Respond(responder) => Ok(responder(request)),
            MockBehavior::Fail(message) => Err(LlmError::ProviderError(message.clone())),
        };

        self.concurrent_calls.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl Complete for MockProvider {
    async fn complete(&self, request: Request) -> Result<Response> {
        let content = self.run(&request).await?;
        Ok(Response {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
            model_used: request.model_id,
            duration: self.delay,
        })
    }
}

#[async_trait]
impl Stream for MockProvider {
    async fn stream(
        &self,
        request: Request,
        on_chunk: &mut (dyn FnMut(StreamChunk) -> Result<()> + Send),
    ) -> Result<Response> {
        let content = self.run(&request).await?;
        on_chunk(StreamChunk {
            text: content.clone(),
            input_tokens_so_far: 0,
            output_tokens_estimate: 0,
        })?;
        Ok(Response {
            content,
            input_tokens: 0,
            output_tokens: 0,
            finish_reason: FinishReason::Stop,
            model_used: request.model_id,
            duration: self.delay,
        })
    }
}
