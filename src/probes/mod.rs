//! Probe module
//!
//! Defines the Probe trait and one implementation per CLI subcommand. Each
//! probe drives a provider API through the gateway and records step outcomes
//! in a [`SuiteReport`].

pub mod chat;
pub mod claude;
pub mod image;
pub mod kling;
pub mod long_stream;
pub mod moonshot_cache;
pub mod responses_cache;
pub mod stress;
pub mod tiered_pricing;
pub mod video;

use crate::config::Settings;
use crate::models::chat::{ChatRequest, ChatStreamChunk, ChatUsage};
use crate::services::client::GatewayClient;
use crate::utils::console::{self, SuiteReport};
use crate::utils::error::{ProbeError, ProbeResult};
use crate::utils::pricing::PricingTable;
use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use std::io::Write;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Shared inputs of every probe run
#[derive(Debug, Clone)]
pub struct ProbeContext {
    pub settings: Settings,
    pub pricing: PricingTable,
}

impl ProbeContext {
    pub fn new(settings: Settings, pricing: PricingTable) -> Self {
        Self { settings, pricing }
    }

    /// Gateway client; fails when no gateway key is configured
    pub fn gateway_client(&self) -> Result<GatewayClient> {
        self.settings.require_gateway_key()?;
        Ok(GatewayClient::gateway(&self.settings)?)
    }
}

/// Probe trait for CLI subcommands
///
/// `run` returns `Err` only for setup problems (missing key, bad options).
/// Failed API calls are recorded in the report and the suite moves on.
#[async_trait]
pub trait Probe: Send + Sync {
    /// Get the probe name
    fn name(&self) -> &str;

    /// Run every selected step
    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport>;
}

/// Print a failed step's error
pub(crate) fn report_error(step: &str, err: &ProbeError) {
    warn!(step, kind = err.kind(), "Step failed");
    console::fail(&format!("{}: {}", step, err));
}

/// First `max_chars` characters, with `...` when cut
pub(crate) fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    } else {
        text.to_string()
    }
}

/// Result of a streamed chat completion
#[derive(Debug, Clone, Default)]
pub struct StreamedChat {
    pub text: String,
    pub chunks: usize,
    /// Usage from the final chunk, when the provider sent one
    pub usage: Option<ChatUsage>,
    /// Time to the first content delta
    pub first_token: Option<Duration>,
    pub elapsed: Duration,
}

/// Stream a chat completion, optionally echoing deltas to stdout
pub async fn stream_chat(
    client: &GatewayClient,
    path: &str,
    request: &ChatRequest,
    echo: bool,
) -> ProbeResult<StreamedChat> {
    let started = Instant::now();
    let mut events = client.post_stream(path, request).await?;
    let mut result = StreamedChat::default();

    while let Some(event) = events.next().await {
        let data = event?;
        let chunk: ChatStreamChunk = match serde_json::from_str(&data) {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("Skipping undecodable chunk: {}", e);
                continue;
            }
        };
        result.chunks += 1;
        if let Some(usage) = chunk.usage.clone() {
            result.usage = Some(usage);
        }
        if let Some(delta) = chunk.delta_text() {
            if delta.is_empty() {
                continue;
            }
            if result.first_token.is_none() {
                result.first_token = Some(started.elapsed());
            }
            if echo {
                print!("{}", delta);
                let _ = std::io::stdout().flush();
            }
            result.text.push_str(delta);
        }
    }
    if echo {
        println!();
    }

    result.elapsed = started.elapsed();
    Ok(result)
}

/// Check `/api/status`; warns instead of failing the suite
pub async fn check_gateway_health(client: &GatewayClient) -> bool {
    console::section("Gateway Health Check");
    match client.get_raw("/api/status").await {
        Ok(raw) if raw.is_success() => {
            let healthy = raw
                .json::<serde_json::Value>()
                .ok()
                .and_then(|v| v.get("success").and_then(serde_json::Value::as_bool))
                .unwrap_or(false);
            if healthy {
                console::success(&format!("Gateway healthy ({} ms)", raw.elapsed.as_millis()));
            } else {
                console::warn("Gateway status endpoint did not report success");
            }
            healthy
        }
        Ok(raw) => {
            console::warn(&format!("Gateway status returned HTTP {}", raw.status));
            false
        }
        Err(e) => {
            console::warn(&format!("Gateway health check failed: {}", e));
            false
        }
    }
}
