//! The response cache port and its in-memory reference implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use llm::{Message, Request, Role};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::Result;

/// Default time-to-live applied to a cache write when the caller does not
/// specify one.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// A cached provider response, reconstructable into a [`dag::PhaseResult`]
/// without re-invoking the provider.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub model_used: String,
}

/// A pluggable response cache keyed by a request fingerprint.
///
/// This crate ships [`InMemoryResponseCache`] as the reference
/// implementation; a durable backend (Redis, a local disk cache) is an
/// external collaborator plugged in behind this trait at construction
/// time.
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>>;
    async fn set(&self, key: &str, response: CachedResponse, ttl: Duration) -> Result<()>;
}

/// The default fingerprint: `model_id + ":" + Σ(role + ":" + content +
/// "|")`, stable across process restarts and suitable as a cache key
/// without hashing. Callers needing a shorter or salted key can inject
/// their own fingerprint function instead of this one.
pub fn default_fingerprint(request: &Request) -> String {
    let mut key = String::new();
    key.push_str(&request.model_id);
    key.push(':');
    for message in &request.messages {
        key.push_str(role_str(message.role));
        key.push(':');
        key.push_str(&message.content);
        key.push('|');
    }
    key
}

fn role_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

/// Rebuilds the [`Message`] sequence a cached fingerprint was computed
/// over. Unused by the cache itself, kept for callers (and tests) that
/// want to verify a fingerprint against a reconstructed request.
pub fn messages_key(messages: &[Message]) -> String {
    messages
        .iter()
        .map(|m| format!("{}:{}|", role_str(m.role), m.content))
        .collect()
}

struct Entry {
    response: CachedResponse,
    inserted_at: Instant,
    ttl: Duration,
}

impl Entry {
    fn is_expired(&self) -> bool {
        self.inserted_at.elapsed() >= self.ttl
    }
}

/// A process-local, non-durable [`ResponseCache`]. Entries past their TTL
/// are evicted lazily on the next `get` for that key.
#[derive(Default)]
pub struct InMemoryResponseCache {
    entries: RwLock<HashMap<String, Entry>>,
}

impl InMemoryResponseCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Number of live (possibly stale) entries, for test assertions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ResponseCache for InMemoryResponseCache {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key) {
                if !entry.is_expired() {
                    return Ok(Some(entry.response.clone()));
                }
            } else {
                return Ok(None);
            }
        }
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn set(&self, key: &str, response: CachedResponse, ttl: Duration) -> Result<()> {
        self.entries.write().await.insert(
            key.to_string(),
            Entry {
                response,
                inserted_at: Instant::now(),
                ttl,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llm::Message;

    #[test]
    fn test_default_fingerprint_includes_model_and_messages() {
        let request = Request::new("m1", vec![Message::system("sys"), Message::user("hi")]);
        let fp = default_fingerprint(&request);
        assert_eq!(fp, "m1:system:sys|user:hi|");
    }

    #[test]
    fn test_default_fingerprint_distinguishes_different_models() {
        let a = Request::new("m1", vec![Message::user("hi")]);
        let b = Request::new("m2", vec![Message::user("hi")]);
        assert_ne!(default_fingerprint(&a), default_fingerprint(&b));
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let cache = InMemoryResponseCache::new();
        let response = CachedResponse {
            content: "out".to_string(),
            input_tokens: 1,
            output_tokens: 2,
            model_used: "m1".to_string(),
        };
        cache.set("key", response, Duration::from_secs(60)).await.unwrap();
        let fetched = cache.get("key").await.unwrap().unwrap();
        assert_eq!(fetched.content, "out");
    }

    #[tokio::test]
    async fn test_cache_miss_returns_none() {
        let cache = InMemoryResponseCache::new();
        assert!(cache.get("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cache_expires_past_ttl() {
        let cache = InMemoryResponseCache::new();
        let response = CachedResponse {
            content: "out".to_string(),
            input_tokens: 0,
            output_tokens: 0,
            model_used: "m1".to_string(),
        };
        cache.set("key", response, Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(cache.get("key").await.unwrap().is_none());
        assert_eq!(cache.len().await, 0);
    }
}
