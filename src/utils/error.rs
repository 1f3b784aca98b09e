//! Error handling module
//!
//! Defines error types shared by the gateway client, the poller and the probes

use serde::Deserialize;
use thiserror::Error;

/// Maximum number of body characters kept in a status error
pub const MAX_ERROR_BODY_CHARS: usize = 500;

/// Probe error types
#[derive(Error, Debug)]
pub enum ProbeError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] anyhow::Error),

    /// HTTP transport error (connect, TLS, body read)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Upstream answered with a non-success status code
    #[error("Request failed with status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },

    /// Upstream answered 200 but reported a business error code
    #[error("Business error (code {code}): {message}")]
    Business {
        code: String,
        message: String,
    },

    /// Response is missing a field the probe depends on
    #[error("Missing field in response: {0}")]
    MissingField(String),

    /// Probe input rejected before sending
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Request timeout
    #[error("Request timeout after {0}s")]
    Timeout(u64),

    /// Stream ended before a terminal event
    #[error("Stream error: {0}")]
    Stream(String),
}

/// Provider error envelope (OpenAI and Anthropic both use `{"error": {"message": ...}}`)
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
}

impl ProbeError {
    /// Build a status error from a raw response body
    ///
    /// If the body is a provider error envelope the message is surfaced, otherwise
    /// the body text is kept (truncated).
    pub fn from_status(status: u16, body: &str) -> Self {
        let body = match serde_json::from_str::<ErrorEnvelope>(body) {
            Ok(envelope) if !envelope.error.message.is_empty() => match envelope.error.error_type {
                Some(kind) => format!("{} ({})", envelope.error.message, kind),
                None => envelope.error.message,
            },
            _ => truncate_chars(body, MAX_ERROR_BODY_CHARS),
        };
        ProbeError::Status { status, body }
    }

    /// HTTP status code, if this error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProbeError::Status { status, .. } => Some(*status),
            ProbeError::HttpClient(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this error came from a timeout
    pub fn is_timeout(&self) -> bool {
        match self {
            ProbeError::Timeout(_) => true,
            ProbeError::HttpClient(e) => e.is_timeout(),
            ProbeError::Status { status, .. } => *status == 408 || *status == 504,
            _ => false,
        }
    }

    /// Short error kind used in log fields
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Config(_) => "config",
            ProbeError::HttpClient(_) => "transport",
            ProbeError::Serialization(_) => "decode",
            ProbeError::Status { .. } => "status",
            ProbeError::Business { .. } => "business",
            ProbeError::MissingField(_) => "missing_field",
            ProbeError::InvalidInput(_) => "invalid_input",
            ProbeError::Timeout(_) => "timeout",
            ProbeError::Stream(_) => "stream",
        }
    }
}

/// Truncate to at most `max_chars` characters, marking the cut
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &s[..idx]),
        None => s.to_string(),
    }
}

/// Result type alias
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Error handling helper functions
pub mod helpers {
    use super::*;

    /// Create missing field error
    pub fn missing_field(field: impl Into<String>) -> ProbeError {
        ProbeError::MissingField(field.into())
    }

    /// Create invalid input error
    pub fn invalid_input(message: impl Into<String>) -> ProbeError {
        ProbeError::InvalidInput(message.into())
    }

    /// Create business error
    pub fn business_error(code: impl ToString, message: impl Into<String>) -> ProbeError {
        ProbeError::Business {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Error context extension trait
pub trait ErrorContext<T> {
    /// Wrap a foreign error as an invalid input error
    fn input_context(self, message: &str) -> ProbeResult<T>;

    /// Wrap a foreign error as a stream error
    fn stream_context(self, message: &str) -> ProbeResult<T>;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn input_context(self, message: &str) -> ProbeResult<T> {
        self.map_err(|e| ProbeError::InvalidInput(format!("{}: {}", message, e)))
    }

    fn stream_context(self, message: &str) -> ProbeResult<T> {
        self.map_err(|e| ProbeError::Stream(format!("{}: {}", message, e)))
    }
}
