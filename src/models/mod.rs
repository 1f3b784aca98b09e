//! Data models module
//!
//! Request and response structures for the provider APIs the probes call.
//! Usage fields default to zero when absent; unknown fields are ignored.

pub mod chat;
pub mod claude;
pub mod context;
pub mod media;
pub mod responses;

pub use chat::{ChatMessage, ChatRequest, ChatResponse, ChatStreamChunk, ChatUsage};
pub use claude::{ClaudeMessage, ClaudeRequest, ClaudeResponse, ClaudeStreamEvent, ClaudeUsage};
pub use context::{ContextChatRequest, ContextCreateRequest, ContextCreateResponse};
pub use media::{TaskSubmitResponse, UnifiedTask};
pub use responses::{ResponsesRequest, ResponsesResponse, ResponsesStreamEvent, ResponsesUsage};
