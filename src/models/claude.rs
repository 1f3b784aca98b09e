//! Anthropic Messages API models
//!
//! Request, response and stream event structures for `/v1/messages`

use serde::{Deserialize, Serialize};

/// Anthropic API version header value
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Messages API request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeRequest {
    /// Model name
    pub model: String,
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Message list
    pub messages: Vec<ClaudeMessage>,
    /// System prompt (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Temperature parameter (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Whether to stream response (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ClaudeRequest {
    pub fn new(model: impl Into<String>, max_tokens: u32, messages: Vec<ClaudeMessage>) -> Self {
        Self {
            model: model.into(),
            max_tokens,
            messages,
            system: None,
            temperature: None,
            stream: None,
        }
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Message (plain text content only)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClaudeMessage {
    /// Role (user/assistant)
    pub role: String,
    /// Message content
    pub content: String,
}

impl ClaudeMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Content block in a response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentBlock {
    /// Text block
    #[serde(rename = "text")]
    Text { text: String },
    /// Thinking block
    #[serde(rename = "thinking")]
    Thinking {
        #[serde(default)]
        thinking: String,
    },
    /// Any other block type
    #[serde(other)]
    Other,
}

/// Messages API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeResponse {
    /// Response ID
    #[serde(default)]
    pub id: String,
    /// Model used
    #[serde(default)]
    pub model: String,
    /// Response content
    #[serde(default)]
    pub content: Vec<ClaudeContentBlock>,
    /// Stop reason
    #[serde(default)]
    pub stop_reason: Option<String>,
    /// Usage statistics
    #[serde(default)]
    pub usage: ClaudeUsage,
}

impl ClaudeResponse {
    /// Concatenated text blocks
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ClaudeContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Usage statistics
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClaudeUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
    #[serde(default)]
    pub cache_read_input_tokens: u64,
}

/// Streaming event
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeStreamEvent {
    /// Message start, carries input usage
    #[serde(rename = "message_start")]
    MessageStart { message: ClaudeStreamMessage },
    /// Content block delta
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ClaudeContentDelta },
    /// Message delta, carries output usage
    #[serde(rename = "message_delta")]
    MessageDelta {
        #[serde(default)]
        usage: ClaudeUsage,
    },
    /// Message stop
    #[serde(rename = "message_stop")]
    MessageStop,
    /// Error event
    #[serde(rename = "error")]
    Error { error: ClaudeError },
    /// Ping and block start/stop events
    #[serde(other)]
    Other,
}

/// Message header in `message_start`
#[derive(Debug, Clone, Deserialize)]
pub struct ClaudeStreamMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub usage: ClaudeUsage,
}

/// Content delta
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ClaudeContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(other)]
    Other,
}

/// Error structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaudeError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub message: String,
}

/// Accumulates text and usage from a message stream
#[derive(Debug, Default, Clone)]
pub struct ClaudeStreamAccumulator {
    pub text: String,
    pub usage: ClaudeUsage,
    pub finished: bool,
}

impl ClaudeStreamAccumulator {
    /// Fold one event in; returns the text delta it carried, if any
    pub fn push(&mut self, event: ClaudeStreamEvent) -> Result<Option<String>, ClaudeError> {
        match event {
            ClaudeStreamEvent::MessageStart { message } => {
                self.usage.input_tokens = message.usage.input_tokens;
                self.usage.cache_read_input_tokens = message.usage.cache_read_input_tokens;
                self.usage.cache_creation_input_tokens = message.usage.cache_creation_input_tokens;
                Ok(None)
            }
            ClaudeStreamEvent::ContentBlockDelta {
                delta: ClaudeContentDelta::TextDelta { text },
            } => {
                self.text.push_str(&text);
                Ok(Some(text))
            }
            ClaudeStreamEvent::MessageDelta { usage } => {
                self.usage.output_tokens = usage.output_tokens;
                if usage.input_tokens > 0 {
                    self.usage.input_tokens = usage.input_tokens;
                }
                Ok(None)
            }
            ClaudeStreamEvent::MessageStop => {
                self.finished = true;
                Ok(None)
            }
            ClaudeStreamEvent::Error { error } => Err(error),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_serialization() {
        let request = ClaudeRequest::new("claude-sonnet-4-20250514", 1024, vec![ClaudeMessage::user("Hello")])
            .system("You are a friendly pirate.");
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["max_tokens"], 1024);
        assert_eq!(value["system"], "You are a friendly pirate.");
        assert!(value.get("temperature").is_none());
    }

    #[test]
    fn test_response_text_skips_thinking() {
        let response: ClaudeResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "model": "claude",
            "content": [
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "Ahoy"}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        }))
        .unwrap();
        assert_eq!(response.text(), "Ahoy");
        assert_eq!(response.usage.output_tokens, 3);
    }

    #[test]
    fn test_stream_accumulator() {
        let events = [
            json!({"type": "message_start", "message": {"id": "m", "model": "c", "usage": {"input_tokens": 20}}}),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
            json!({"type": "ping"}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Roses"}}),
            json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " are red"}}),
            json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 7}}),
            json!({"type": "message_stop"}),
        ];

        let mut acc = ClaudeStreamAccumulator::default();
        let mut deltas = 0;
        for event in events {
            let event: ClaudeStreamEvent = serde_json::from_value(event).unwrap();
            if acc.push(event).unwrap().is_some() {
                deltas += 1;
            }
        }

        assert_eq!(deltas, 2);
        assert_eq!(acc.text, "Roses are red");
        assert_eq!(acc.usage.input_tokens, 20);
        assert_eq!(acc.usage.output_tokens, 7);
        assert!(acc.finished);
    }

    #[test]
    fn test_stream_error_event() {
        let event: ClaudeStreamEvent = serde_json::from_value(json!({
            "type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}
        }))
        .unwrap();
        let err = ClaudeStreamAccumulator::default().push(event).unwrap_err();
        assert_eq!(err.error_type, "overloaded_error");
    }
}
