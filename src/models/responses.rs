//! Responses API models
//!
//! Request, response and stream event structures for the OpenAI/BytePlus
//! Responses API (`/v1/responses` on the gateway, `/api/v3/responses` on Ark)

use serde::{Deserialize, Serialize};

/// Responses API request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesRequest {
    /// Model name or endpoint ID
    pub model: String,
    /// Input text or message list
    pub input: ResponsesInput,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Chains this request onto a cached earlier response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caching: Option<Caching>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thinking: Option<Thinking>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
}

impl ResponsesRequest {
    pub fn new(model: impl Into<String>, input: impl Into<ResponsesInput>) -> Self {
        Self {
            model: model.into(),
            input: input.into(),
            max_output_tokens: None,
            instructions: None,
            previous_response_id: None,
            caching: None,
            thinking: None,
            stream: None,
        }
    }

    pub fn max_output_tokens(mut self, tokens: u32) -> Self {
        self.max_output_tokens = Some(tokens);
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn previous_response(mut self, id: impl Into<String>) -> Self {
        self.previous_response_id = Some(id.into());
        self
    }

    pub fn caching(mut self, caching: Caching) -> Self {
        self.caching = Some(caching);
        self
    }

    pub fn thinking_disabled(mut self) -> Self {
        self.thinking = Some(Thinking {
            thinking_type: "disabled".to_string(),
        });
        self
    }

    pub fn streaming(mut self) -> Self {
        self.stream = Some(true);
        self
    }
}

/// Input: plain string or role/content messages
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ResponsesInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

impl From<&str> for ResponsesInput {
    fn from(text: &str) -> Self {
        ResponsesInput::Text(text.to_string())
    }
}

impl From<String> for ResponsesInput {
    fn from(text: String) -> Self {
        ResponsesInput::Text(text)
    }
}

impl From<Vec<InputMessage>> for ResponsesInput {
    fn from(messages: Vec<InputMessage>) -> Self {
        ResponsesInput::Messages(messages)
    }
}

/// Input message
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputMessage {
    pub role: String,
    pub content: String,
}

impl InputMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Caching configuration (`{"type": "enabled", "prefix": true}`)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Caching {
    #[serde(rename = "type")]
    pub caching_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<bool>,
}

impl Caching {
    /// Caching enabled, reusing whatever the previous response stored
    pub fn enabled() -> Self {
        Self {
            caching_type: "enabled".to_string(),
            prefix: None,
        }
    }

    /// Caching enabled and the prompt prefix stored for later requests
    pub fn prefix() -> Self {
        Self {
            caching_type: "enabled".to_string(),
            prefix: Some(true),
        }
    }
}

/// Thinking configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Thinking {
    #[serde(rename = "type")]
    pub thinking_type: String,
}

/// Responses API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
    #[serde(default)]
    pub usage: ResponsesUsage,
}

impl ResponsesResponse {
    /// Concatenated text of every output content part
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .flat_map(|item| item.content.iter())
            .filter_map(|part| part.text.as_deref())
            .collect::<Vec<_>>()
            .join("")
    }
}

/// Output item (message or reasoning)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type", default)]
    pub item_type: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

/// Output content part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub content_type: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// Token usage for the Responses API
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResponsesUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
    #[serde(default)]
    pub input_tokens_details: InputTokensDetails,
    #[serde(default)]
    pub output_tokens_details: OutputTokensDetails,
}

impl ResponsesUsage {
    pub fn cached_tokens(&self) -> u64 {
        self.input_tokens_details.cached_tokens
    }

    pub fn cache_creation_tokens(&self) -> u64 {
        self.input_tokens_details.cache_creation_input_tokens
    }

    /// Share of input tokens served from cache, in percent
    pub fn cache_hit_ratio(&self) -> f64 {
        if self.input_tokens == 0 {
            0.0
        } else {
            self.cached_tokens() as f64 / self.input_tokens as f64 * 100.0
        }
    }
}

/// Input token breakdown
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct InputTokensDetails {
    #[serde(default)]
    pub cached_tokens: u64,
    #[serde(default)]
    pub cache_creation_input_tokens: u64,
}

/// Output token breakdown
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct OutputTokensDetails {
    #[serde(default)]
    pub reasoning_tokens: u64,
}

/// Streaming event
///
/// Only the events the probes read are modelled; everything else is `Other`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ResponsesStreamEvent {
    #[serde(rename = "response.output_text.delta")]
    OutputTextDelta {
        #[serde(default)]
        delta: String,
    },
    #[serde(rename = "response.completed")]
    Completed { response: ResponsesResponse },
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prefix_caching_request() {
        let request = ResponsesRequest::new(
            "seed-1-6-250915",
            vec![
                InputMessage::new("system", "context"),
                InputMessage::new("user", "What is the main theme?"),
            ],
        )
        .caching(Caching::prefix())
        .thinking_disabled();

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["caching"], json!({"type": "enabled", "prefix": true}));
        assert_eq!(value["thinking"], json!({"type": "disabled"}));
        assert_eq!(value["input"][1]["role"], "user");
        assert!(value.get("previous_response_id").is_none());
    }

    #[test]
    fn test_chained_request() {
        let request = ResponsesRequest::new("m", "Who are the main characters?")
            .previous_response("resp_1")
            .caching(Caching::enabled());
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["input"], "Who are the main characters?");
        assert_eq!(value["previous_response_id"], "resp_1");
        assert_eq!(value["caching"], json!({"type": "enabled"}));
    }

    #[test]
    fn test_usage_details() {
        let response: ResponsesResponse = serde_json::from_value(json!({
            "id": "resp_1",
            "status": "completed",
            "output": [
                {"type": "reasoning", "content": []},
                {"type": "message", "role": "assistant", "content": [
                    {"type": "output_text", "text": "Hello"},
                    {"type": "output_text", "text": " world"}
                ]}
            ],
            "usage": {
                "input_tokens": 1000, "output_tokens": 10, "total_tokens": 1010,
                "input_tokens_details": {"cached_tokens": 800, "cache_creation_input_tokens": 0}
            }
        }))
        .unwrap();

        assert_eq!(response.output_text(), "Hello world");
        assert_eq!(response.usage.cached_tokens(), 800);
        assert_eq!(response.usage.output_tokens_details.reasoning_tokens, 0);
        assert!((response.usage.cache_hit_ratio() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn test_stream_events() {
        let delta: ResponsesStreamEvent =
            serde_json::from_value(json!({"type": "response.output_text.delta", "delta": "1, 2"})).unwrap();
        assert!(matches!(delta, ResponsesStreamEvent::OutputTextDelta { ref delta } if delta == "1, 2"));

        let other: ResponsesStreamEvent =
            serde_json::from_value(json!({"type": "response.created", "response": {}})).unwrap();
        assert!(matches!(other, ResponsesStreamEvent::Other));

        let done: ResponsesStreamEvent = serde_json::from_value(json!({
            "type": "response.completed",
            "response": {"id": "r", "usage": {"input_tokens": 5}}
        }))
        .unwrap();
        match done {
            ResponsesStreamEvent::Completed { response } => assert_eq!(response.usage.input_tokens, 5),
            _ => panic!("Expected completed event"),
        }
    }
}
