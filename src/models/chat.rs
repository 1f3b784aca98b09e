//! OpenAI-compatible chat completion models
//!
//! Request, response and stream chunk structures for `/v1/chat/completions`

use serde::{Deserialize, Serialize};

/// Chat completion request
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatRequest {
    /// Model name
    pub model: String,
    /// Message list
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Temperature parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to stream response (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Stream options, used to ask for usage in the final chunk (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_options: Option<StreamOptions>,
}

impl ChatRequest {
    /// Create a non-streaming request
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Default::default()
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Turn on streaming and request usage in the final chunk
    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self.stream_options = Some(StreamOptions { include_usage: true });
        self
    }
}

/// Stream options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

/// Chat message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    /// Role (system/user/assistant)
    pub role: String,
    /// Message content
    pub content: String,
    /// Anthropic-style cache marker forwarded by some gateways (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<CacheControl>,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            cache_control: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new("user", content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new("assistant", content)
    }

    /// Mark this message as an ephemeral cache breakpoint
    pub fn ephemeral(mut self) -> Self {
        self.cache_control = Some(CacheControl {
            control_type: "ephemeral".to_string(),
        });
        self
    }
}

/// Cache control marker
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheControl {
    #[serde(rename = "type")]
    pub control_type: String,
}

/// Chat completion response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Response ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Choice list
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
    /// Usage statistics; absent usage reads as all zeros
    #[serde(default)]
    pub usage: ChatUsage,
}

impl ChatResponse {
    /// Text of the first choice, empty if there is none
    pub fn text(&self) -> &str {
        self.choices
            .first()
            .and_then(|choice| choice.message.content.as_deref())
            .unwrap_or("")
    }

    /// Finish reason of the first choice
    pub fn finish_reason(&self) -> Option<&str> {
        self.choices.first().and_then(|c| c.finish_reason.as_deref())
    }
}

/// Chat choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: ChatResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Assistant message in a response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatResponseMessage {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    /// Reasoning text returned by thinking models (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
}

/// Token usage for chat completions
///
/// Moonshot reports `cached_tokens` at the top level, OpenAI under
/// `prompt_tokens_details`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ChatUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,
}

/// Prompt token breakdown
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PromptTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
}

impl ChatUsage {
    /// Cached prompt tokens: the top-level value if non-zero, else the nested one
    pub fn effective_cached_tokens(&self) -> u64 {
        if self.cached_tokens > 0 {
            self.cached_tokens
        } else {
            self.prompt_tokens_details
                .as_ref()
                .map(|d| d.cached_tokens)
                .unwrap_or(0)
        }
    }

    /// Share of prompt tokens served from cache, in percent
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.prompt_tokens == 0 {
            0.0
        } else {
            self.effective_cached_tokens() as f64 / self.prompt_tokens as f64 * 100.0
        }
    }
}

/// Streaming chunk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChunk {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub choices: Vec<ChatStreamChoice>,
    /// Present on the final chunk when usage is requested
    #[serde(default)]
    pub usage: Option<ChatUsage>,
}

impl ChatStreamChunk {
    /// Content delta of the first choice
    pub fn delta_text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

/// Streaming choice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatStreamChoice {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: ChatDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Streaming delta
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ChatDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_skips_unset_fields() {
        let request = ChatRequest::new("kimi-k2.5", vec![ChatMessage::user("hi")]).max_tokens(1);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            json!({"model": "kimi-k2.5", "messages": [{"role": "user", "content": "hi"}], "max_tokens": 1})
        );
    }

    #[test]
    fn test_streaming_request_asks_for_usage() {
        let request = ChatRequest::new("m", vec![]).streaming();
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], true);
        assert_eq!(value["stream_options"]["include_usage"], true);
    }

    #[test]
    fn test_missing_usage_is_zero() {
        let response: ChatResponse = serde_json::from_value(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}]
        }))
        .unwrap();
        assert_eq!(response.usage, ChatUsage::default());
        assert_eq!(response.text(), "4");
        assert_eq!(response.finish_reason(), Some("stop"));
    }

    #[test]
    fn test_effective_cached_tokens() {
        let moonshot: ChatUsage = serde_json::from_value(json!({
            "prompt_tokens": 200, "cached_tokens": 150,
            "prompt_tokens_details": {"cached_tokens": 10}
        }))
        .unwrap();
        assert_eq!(moonshot.effective_cached_tokens(), 150);
        assert!((moonshot.cache_hit_ratio() - 75.0).abs() < 1e-9);

        let openai: ChatUsage = serde_json::from_value(json!({
            "prompt_tokens": 100, "prompt_tokens_details": {"cached_tokens": 64}
        }))
        .unwrap();
        assert_eq!(openai.effective_cached_tokens(), 64);

        assert_eq!(ChatUsage::default().cache_hit_ratio(), 0.0);
    }

    #[test]
    fn test_stream_chunk_delta() {
        let chunk: ChatStreamChunk = serde_json::from_value(json!({
            "id": "c1",
            "choices": [{"index": 0, "delta": {"content": "Hel"}}]
        }))
        .unwrap();
        assert_eq!(chunk.delta_text(), Some("Hel"));
        assert!(chunk.usage.is_none());
    }
}
