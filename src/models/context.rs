//! BytePlus context cache models
//!
//! `/api/v3/context/create` and `/api/v3/context/chat/completions`

use crate::models::chat::{ChatMessage, ChatUsage};
use serde::{Deserialize, Serialize};

/// Context cache mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContextMode {
    /// Cache grows with the conversation
    Session,
    /// Fixed shared prefix
    CommonPrefix,
}

/// Context cache create request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCreateRequest {
    /// Endpoint ID (ep-...) or model name
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub mode: ContextMode,
    /// Time to live in seconds (3600..=604800 upstream)
    pub ttl: u64,
}

impl ContextCreateRequest {
    pub fn session(model: impl Into<String>, messages: Vec<ChatMessage>, ttl: u64) -> Self {
        Self {
            model: model.into(),
            messages,
            mode: ContextMode::Session,
            ttl,
        }
    }
}

/// Context cache create response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextCreateResponse {
    /// Context ID
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub mode: Option<ContextMode>,
    #[serde(default)]
    pub ttl: Option<u64>,
    #[serde(default)]
    pub usage: ChatUsage,
}

/// Chat request against an existing context cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChatRequest {
    pub model: String,
    pub context_id: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}
