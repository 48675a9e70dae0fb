//! Executes one phase end-to-end: prompt assembly, model selection,
//! provider call (optionally through a response cache), producing the
//! content half of a [`dag::PhaseResult`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dag::{Phase, RoutingConfig};
use llm::{Message, Provider, Request, StreamChunk};

use crate::cache::{default_fingerprint, CachedResponse, ResponseCache, DEFAULT_CACHE_TTL};
use crate::template;
use tooling::logging::timed;

/// The content-producing outcome of one phase execution, independent of
/// the surrounding [`dag::PhaseResult`] bookkeeping (timestamps, status)
/// the workflow executor owns.
#[derive(Debug, Clone)]
pub enum PhaseOutcome {
    Completed {
        output: String,
        input_tokens: u64,
        output_tokens: u64,
        model_used: String,
        cache_hit: bool,
    },
    Failed {
        error: String,
    },
}

type FingerprintFn = dyn Fn(&Request) -> String + Send + Sync;

/// Renders a phase's prompt, resolves its model, and calls the
/// configured [`llm::Provider`], optionally by way of a response cache.
pub struct PhaseExecutor {
    provider: Arc<dyn Provider>,
    routing: RoutingConfig,
    memory_content: Option<String>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
    fingerprint: Arc<FingerprintFn>,
}

impl PhaseExecutor {
    pub fn new(provider: Arc<dyn Provider>, routing: RoutingConfig) -> Self {
        Self {
            provider,
            routing,
            memory_content: None,
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
            fingerprint: Arc::new(default_fingerprint),
        }
    }

    /// Project memory rendered as the first system message, when non-empty.
    pub fn with_memory_content(mut self, memory_content: impl Into<String>) -> Self {
        let content = memory_content.into();
        if !content.trim().is_empty() {
            self.memory_content = Some(content);
        }
        self
    }

    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Overrides the default fingerprint function used to key the cache.
    pub fn with_fingerprint_fn(mut self, f: impl Fn(&Request) -> String + Send + Sync + 'static) -> Self {
        self.fingerprint = Arc::new(f);
        self
    }

    /// Non-streaming execution.
    pub async fn execute(&self, phase: &Phase, namespace: &HashMap<String, String>) -> PhaseOutcome {
        let request = match self.build_request(phase, namespace) {
            Ok(request) => request,
            Err(template_error) => return PhaseOutcome::Failed { error: template_error.to_string() },
        };

        if let Some(cache) = &self.cache {
            let key = (self.fingerprint)(&request);
            match cache.get(&key).await {
                Ok(Some(hit)) => {
                    return PhaseOutcome::Completed {
                        output: hit.content,
                        input_tokens: hit.input_tokens,
                        output_tokens: hit.output_tokens,
                        model_used: hit.model_used,
                        cache_hit: true,
                    };
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%error, "response cache read failed, falling through to provider");
                }
            }

            let label = format!("phase_execute:{}", phase.id);
            return match timed(&label, self.provider.complete(request.clone())).await {
                Ok(response) => {
                    let cached = CachedResponse {
                        content: response.content.clone(),
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        model_used: response.model_used.clone(),
                    };
                    if let Err(error) = cache.set(&key, cached, self.cache_ttl).await {
                        tracing::warn!(%error, "response cache write failed, continuing without it");
                    }
                    PhaseOutcome::Completed {
                        output: response.content,
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        model_used: response.model_used,
                        cache_hit: false,
                    }
                }
                Err(error) => PhaseOutcome::Failed { error: error.to_string() },
            };
        }

        let label = format!("phase_execute:{}", phase.id);
        match timed(&label, self.provider.complete(request)).await {
            Ok(response) => PhaseOutcome::Completed {
                output: response.content,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                model_used: response.model_used,
                cache_hit: false,
            },
            Err(error) => PhaseOutcome::Failed { error: error.to_string() },
        }
    }

    /// Streaming execution: same prompt assembly and model selection as
    /// [`Self::execute`], but drives the provider's
    /// streaming call and invokes `on_chunk` for every piece of content as
    /// it arrives. A cache hit (when caching is composed in) is delivered
    /// as a single synthetic chunk instead of a provider call.
    pub async fn execute_streaming(
        &self,
        phase: &Phase,
        namespace: &HashMap<String, String>,
        on_chunk: &mut (dyn FnMut(StreamChunk) + Send),
    ) -> PhaseOutcome {
        let request = match self.build_request(phase, namespace) {
            Ok(request) => request,
            Err(template_error) => return PhaseOutcome::Failed { error: template_error.to_string() },
        };

        if let Some(cache) = &self.cache {
            let key = (self.fingerprint)(&request);
            match cache.get(&key).await {
                Ok(Some(hit)) => {
                    on_chunk(StreamChunk {
                        text: hit.content.clone(),
                        input_tokens_so_far: hit.input_tokens,
                        output_tokens_estimate: hit.output_tokens,
                    });
                    return PhaseOutcome::Completed {
                        output: hit.content,
                        input_tokens: hit.input_tokens,
                        output_tokens: hit.output_tokens,
                        model_used: hit.model_used,
                        cache_hit: true,
                    };
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::warn!(%error, "response cache read failed, falling through to provider");
                }
            }

            let mut forward = |chunk: StreamChunk| -> llm::Result<()> {
                on_chunk(chunk);
                Ok(())
            };
            let label = format!("phase_execute:{}", phase.id);
            return match timed(&label, self.provider.stream(request.clone(), &mut forward)).await {
                Ok(response) => {
                    let cached = CachedResponse {
                        content: response.content.clone(),
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        model_used: response.model_used.clone(),
                    };
                    if let Err(error) = cache.set(&key, cached, self.cache_ttl).await {
                        tracing::warn!(%error, "response cache write failed, continuing without it");
                    }
                    PhaseOutcome::Completed {
                        output: response.content,
                        input_tokens: response.input_tokens,
                        output_tokens: response.output_tokens,
                        model_used: response.model_used,
                        cache_hit: false,
                    }
                }
                Err(error) => PhaseOutcome::Failed { error: error.to_string() },
            };
        }

        let mut forward = |chunk: StreamChunk| -> llm::Result<()> {
            on_chunk(chunk);
            Ok(())
        };
        let label = format!("phase_execute:{}", phase.id);
        match timed(&label, self.provider.stream(request, &mut forward)).await {
            Ok(response) => PhaseOutcome::Completed {
                output: response.content,
                input_tokens: response.input_tokens,
                output_tokens: response.output_tokens,
                model_used: response.model_used,
                cache_hit: false,
            },
            Err(error) => PhaseOutcome::Failed { error: error.to_string() },
        }
    }

    fn build_request(
        &self,
        phase: &Phase,
        namespace: &HashMap<String, String>,
    ) -> Result<Request, crate::error::TemplateError> {
        let prompt = template::render(&phase.prompt_template, namespace)?;
        let model_id = llm::resolve_model(phase.routing_profile, &self.routing);
        let messages = self.build_messages(namespace, &prompt);

        Ok(Request::new(model_id, messages)
            .with_max_tokens(phase.max_tokens)
            .with_temperature(phase.temperature))
    }

    /// Message construction order: memory (if any), then prior-phase
    /// context (if any), then the rendered prompt as the user message.
    fn build_messages(&self, namespace: &HashMap<String, String>, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(3);

        if let Some(memory) = &self.memory_content {
            messages.push(Message::system(format!("Project Memory:\n\n{memory}")));
        }

        if let Some(context) = build_context_block(namespace) {
            messages.push(Message::system(format!("Context from previous phases:\n\n{context}")));
        }

        messages.push(Message::user(prompt.to_string()));
        messages
    }
}

fn build_context_block(namespace: &HashMap<String, String>) -> Option<String> {
    let mut parts = Vec::new();

    if let Some(input) = namespace.get("_input") {
        if !input.is_empty() {
            parts.push(format!("Original Input:\n{input}"));
        }
    }

    let mut dependency_ids: Vec<&String> = namespace.keys().filter(|k| k.as_str() != "_input").collect();
    dependency_ids.sort();
    for id in dependency_ids {
        let output = &namespace[id];
        if !output.is_empty() {
            parts.push(format!("Previous Phase ({id}):\n{output}"));
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n\n---\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dag::RoutingProfile;
    use llm::MockProvider;
    use std::time::Duration as StdDuration;

    fn routing() -> RoutingConfig {
        RoutingConfig {
            cheap_model: "cheap".into(),
            balanced_model: "balanced".into(),
            premium_model: "premium".into(),
        }
    }

    #[tokio::test]
    async fn test_execute_renders_prompt_and_calls_provider() {
        let provider = Arc::new(MockProvider::responding_with(|req| {
            assert_eq!(req.model_id, "balanced");
            format!("echo:{}", req.messages.last().unwrap().content)
        }));
        let executor = PhaseExecutor::new(provider, routing());
        let phase = Phase::new("a", "A", "hi {{._input}}").with_routing_profile(RoutingProfile::Balanced);
        let mut namespace = HashMap::new();
        namespace.insert("_input".to_string(), "world".to_string());

        let outcome = executor.execute(&phase, &namespace).await;
        match outcome {
            PhaseOutcome::Completed { output, cache_hit, .. } => {
                assert_eq!(output, "echo:hi world");
                assert!(!cache_hit);
            }
            PhaseOutcome::Failed { error } => panic!("unexpected failure: {error}"),
        }
    }

    #[tokio::test]
    async fn test_execute_template_error_is_captured_as_failure_not_panic() {
        let provider = Arc::new(MockProvider::responding_with(|_| "unused".to_string()));
        let executor = PhaseExecutor::new(provider, routing());
        let phase = Phase::new("a", "A", "{{.unterminated");

        let outcome = executor.execute(&phase, &HashMap::new()).await;
        assert!(matches!(outcome, PhaseOutcome::Failed { .. }));
    }

    #[tokio::test]
    async fn test_execute_provider_failure_is_captured_not_propagated() {
        let provider = Arc::new(MockProvider::failing_with("boom"));
        let executor = PhaseExecutor::new(provider, routing());
        let phase = Phase::new("a", "A", "{{._input}}");

        let outcome = executor.execute(&phase, &HashMap::new()).await;
        match outcome {
            PhaseOutcome::Failed { error } => assert!(error.contains("boom")),
            PhaseOutcome::Completed { .. } => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_execute_cache_hit_skips_provider() {
        let provider = Arc::new(MockProvider::responding_with(|_| "fresh".to_string()));
        let cache = Arc::new(crate::cache::InMemoryResponseCache::new());
        let executor = PhaseExecutor::new(provider.clone(), routing()).with_cache(cache.clone());
        let phase = Phase::new("a", "A", "{{._input}}");
        let mut namespace = HashMap::new();
        namespace.insert("_input".to_string(), "x".to_string());

        let first = executor.execute(&phase, &namespace).await;
        assert!(matches!(first, PhaseOutcome::Completed { cache_hit: false, .. }));
        assert_eq!(provider.call_count(), 1);

        let second = executor.execute(&phase, &namespace).await;
        match second {
            PhaseOutcome::Completed { cache_hit, output, .. } => {
                assert!(cache_hit);
                assert_eq!(output, "fresh");
            }
            PhaseOutcome::Failed { error } => panic!("unexpected failure: {error}"),
        }
        assert_eq!(provider.call_count(), 1, "cache hit must not re-invoke the provider");
    }

    #[tokio::test]
    async fn test_execute_streaming_emits_chunks_and_completes() {
        let provider = Arc::new(MockProvider::responding_with(|_| "streamed".to_string()));
        let executor = PhaseExecutor::new(provider, routing());
        let phase = Phase::new("a", "A", "{{._input}}");
        let mut chunks = Vec::new();

        let outcome = executor
            .execute_streaming(&phase, &HashMap::new(), &mut |chunk| chunks.push(chunk.text))
            .await;

        assert_eq!(chunks, vec!["streamed".to_string()]);
        assert!(matches!(outcome, PhaseOutcome::Completed { .. }));
    }

    #[tokio::test]
    async fn test_execute_streaming_cache_hit_emits_single_synthetic_chunk() {
        let provider = Arc::new(MockProvider::responding_with(|_| "fresh".to_string()));
        let cache = Arc::new(crate::cache::InMemoryResponseCache::new());
        let executor = PhaseExecutor::new(provider.clone(), routing()).with_cache(cache);
        let phase = Phase::new("a", "A", "{{._input}}");

        let mut first_chunks = Vec::new();
        executor
            .execute_streaming(&phase, &HashMap::new(), &mut |chunk| first_chunks.push(chunk.text))
            .await;

        let mut second_chunks = Vec::new();
        let outcome = executor
            .execute_streaming(&phase, &HashMap::new(), &mut |chunk| second_chunks.push(chunk.text))
            .await;

        assert_eq!(second_chunks, vec!["fresh".to_string()]);
        assert!(matches!(outcome, PhaseOutcome::Completed { cache_hit: true, .. }));
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_build_messages_includes_memory_and_context() {
        let provider = Arc::new(MockProvider::responding_with(|req| {
            req.messages.iter().map(|m| m.content.clone()).collect::<Vec<_>>().join("||")
        }));
        let executor = PhaseExecutor::new(provider, routing()).with_memory_content("remember this");
        let phase = Phase::new("b", "B", "{{._input}}").with_depends_on(vec!["a".to_string()]);
        let mut namespace = HashMap::new();
        namespace.insert("_input".to_string(), "original".to_string());
        namespace.insert("a".to_string(), "out-a".to_string());

        let outcome = executor.execute(&phase, &namespace).await;
        let output = match outcome {
            PhaseOutcome::Completed { output, .. } => output,
            PhaseOutcome::Failed { error } => panic!("unexpected failure: {error}"),
        };

        assert!(output.contains("Project Memory:\n\nremember this"));
        assert!(output.contains("Original Input:\noriginal"));
        assert!(output.contains("Previous Phase (a):\nout-a"));
    }

    #[test]
    fn test_default_cache_ttl_is_24_hours() {
        assert_eq!(DEFAULT_CACHE_TTL, StdDuration::from_secs(86_400));
    }
}
