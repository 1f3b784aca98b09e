//! Long streaming request probe
//!
//! Streams a long translation so the response outlives typical proxy read
//! timeouts, then reports how long the stream stayed open.

use crate::models::chat::{ChatMessage, ChatRequest};
use crate::probes::{report_error, stream_chat, Probe, ProbeContext};
use crate::utils::console::{self, SuiteReport};
use crate::utils::error::ProbeError;
use crate::utils::text::{long_english_text, word_count};
use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

const CHAT_PATH: &str = "/v1/chat/completions";

const TRANSLATOR_PROMPT: &str = "你是一个专业的翻译官，请将以下英文翻译成中文，并保持文学风格。";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Long streaming translation
#[derive(Debug, Clone, Args)]
pub struct LongStreamProbe {
    /// Model name
    #[arg(long, default_value = "claude-sonnet-4-5-20250929")]
    pub model: String,

    /// Minimum words of generated source text
    #[arg(long, default_value_t = 5000)]
    pub words: usize,

    /// Translate this file instead of generated text
    #[arg(long)]
    pub file: Option<PathBuf>,
}

/// Whether a failure looks like a proxy cutting the stream
pub fn is_proxy_timeout(err: &ProbeError) -> bool {
    err.is_timeout() || err.status_code() == Some(500) || {
        let text = err.to_string();
        text.contains("500") || text.to_lowercase().contains("timeout")
    }
}

#[async_trait]
impl Probe for LongStreamProbe {
    fn name(&self) -> &str {
        "long-stream"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let client = ctx.gateway_client()?.with_user_agent(BROWSER_USER_AGENT)?;

        let text = match &self.file {
            Some(path) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?,
            None => long_english_text(self.words),
        };

        console::header("Long Streaming Translation");
        console::field("Base URL", client.base_url());
        console::field("Model", &self.model);
        console::field("Stream timeout", format!("{} s", ctx.settings.request.stream_timeout));
        console::info(&format!("Source text has about {} words", word_count(&text)));
        console::info("Sending the translation request, watch for a disconnect around 60 seconds...");

        let request = ChatRequest::new(
            self.model.as_str(),
            vec![
                ChatMessage::system(TRANSLATOR_PROMPT),
                ChatMessage::user(format!("请翻译以下内容：\n\n{}", text)),
            ],
        )
        .streaming();

        let mut report = SuiteReport::new();
        let started = Instant::now();
        println!("{}", "-".repeat(30));
        match stream_chat(&client, CHAT_PATH, &request, true).await {
            Ok(result) => {
                println!("{}", "-".repeat(30));
                info!(chunks = result.chunks, elapsed = ?result.elapsed, "Long stream finished");
                console::success(&format!(
                    "Completed in {:.2} s ({} chunks, {} characters)",
                    result.elapsed.as_secs_f64(),
                    result.chunks,
                    result.text.chars().count()
                ));
                if let Some(first) = result.first_token {
                    console::field("First token", format!("{:.2} s", first.as_secs_f64()));
                }
                report.check("long_stream", !result.text.is_empty());
            }
            Err(e) => {
                report_error("Long stream", &e);
                console::field("Disconnected after", format!("{:.2} s", started.elapsed().as_secs_f64()));
                if is_proxy_timeout(&e) {
                    console::warn(
                        "A 500 or timeout around 60 seconds usually means Nginx proxy_read_timeout or RELAY_TIMEOUT needs raising.",
                    );
                }
                report.fail("long_stream");
            }
        }
        Ok(report)
    }
}
