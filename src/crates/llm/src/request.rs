//! Provider request/response types.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::message::Message;

/// A single completion request sent to a [`crate::Provider`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    pub model_id: String,
    pub messages: Vec<Message>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Request {
    pub fn new(model_id: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model_id: model_id.into(),
            messages,
            max_tokens: 1024,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Why a provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    MaxTokens,
    Cancelled,
    Error,
}

/// A completed (or cache-reconstructed) provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub content: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub finish_reason: FinishReason,
    pub model_used: String,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
}

/// One incremental chunk delivered to a streaming caller's `on_chunk`.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub text: String,
    pub input_tokens_so_far: u64,
    pub output_tokens_estimate: u64,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
