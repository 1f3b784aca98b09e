//! Claude Messages API probe
//!
//! Raw HTTP diagnostics for both auth styles, then message, streaming,
//! multi-turn, system prompt, long context and temperature checks against
//! the gateway's `/v1/messages`.

use crate::models::claude::{
    ClaudeMessage, ClaudeRequest, ClaudeResponse, ClaudeStreamAccumulator, ClaudeStreamEvent, ANTHROPIC_VERSION,
};
use crate::probes::{preview, report_error, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::utils::console::{self, SuiteReport};
use crate::utils::error::{ProbeError, ProbeResult};
use crate::utils::text::ai_history_article;
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use futures::StreamExt;
use std::io::Write;
use std::time::Instant;
use tracing::debug;

const MESSAGES_PATH: &str = "/v1/messages";

/// Browser-like user agent; some WAFs reject SDK defaults
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

const SDK_USER_AGENT: &str = "anthropic-python/0.76.0";

/// Claude check to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ClaudeTest {
    Raw,
    Basic,
    Stream,
    Multi,
    System,
    Long,
    Temp,
    All,
}

/// Claude Messages API checks
#[derive(Debug, Clone, Args)]
pub struct ClaudeProbe {
    /// Model name
    #[arg(long, default_value = "claude-sonnet-4-20250514")]
    pub model: String,

    /// Check to run
    #[arg(long, value_enum, default_value_t = ClaudeTest::All)]
    pub test: ClaudeTest,
}

impl ClaudeProbe {
    fn selected(&self, test: ClaudeTest) -> bool {
        self.test == ClaudeTest::All || self.test == test
    }
}

#[async_trait]
impl Probe for ClaudeProbe {
    fn name(&self) -> &str {
        "claude"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let base = ctx.gateway_client()?.with_user_agent(BROWSER_USER_AGENT)?;
        let raw = base.clone().without_bearer();
        let client = base
            .without_bearer()
            .with_header("x-api-key", ctx.settings.gateway.api_key.as_str())
            .with_header("anthropic-version", ANTHROPIC_VERSION);

        console::header("Claude Messages API Test Suite");
        console::field("Base URL", client.base_url());
        console::field("Model", &self.model);
        console::field("API Key", crate::config::Settings::masked_key(client.api_key()));

        let model = self.model.as_str();
        let mut report = SuiteReport::new();
        if self.selected(ClaudeTest::Raw) {
            report.check("raw HTTP diagnostics", raw_diagnostics(&raw, model).await);
        }
        if self.selected(ClaudeTest::Basic) {
            report.check("basic message", basic(&client, model).await);
        }
        if self.selected(ClaudeTest::Stream) {
            report.check("streaming message", streaming(&client, model).await);
        }
        if self.selected(ClaudeTest::Multi) {
            report.check("multi-turn", multi_turn(&client, model).await);
        }
        if self.selected(ClaudeTest::System) {
            report.check("system prompt", system_prompt(&client, model).await);
        }
        if self.selected(ClaudeTest::Long) {
            report.check("long context", long_context(&client, model).await);
        }
        if self.selected(ClaudeTest::Temp) {
            report.check("temperature", temperature(&client, model).await);
        }
        Ok(report)
    }
}

async fn send(client: &GatewayClient, request: &ClaudeRequest) -> ProbeResult<ClaudeResponse> {
    client.post_json(MESSAGES_PATH, request).await
}

fn print_usage(response: &ClaudeResponse) {
    console::field("Input tokens", response.usage.input_tokens);
    console::field("Output tokens", response.usage.output_tokens);
    if response.usage.cache_read_input_tokens > 0 {
        console::field("Cache read tokens", response.usage.cache_read_input_tokens);
    }
}

/// Try both auth styles and SDK-like headers, printing full responses
async fn raw_diagnostics(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 0: raw HTTP diagnostics");

    let payload = ClaudeRequest::new(model, 100, vec![ClaudeMessage::user("Say hello")]);
    let api_key = client.api_key().to_string();
    let bearer = format!("Bearer {}", api_key);

    let auth_methods: [(&str, Vec<(&str, &str)>); 2] = [
        (
            "x-api-key (Anthropic native)",
            vec![("x-api-key", api_key.as_str()), ("anthropic-version", ANTHROPIC_VERSION)],
        ),
        ("Authorization Bearer (OpenAI compatible)", vec![("Authorization", bearer.as_str())]),
    ];

    let mut success = false;
    for (name, headers) in &auth_methods {
        console::info(&format!("Auth style: {}", name));
        match client.post_raw(MESSAGES_PATH, &payload, headers).await {
            Ok(response) => {
                console::field("Status", response.status);
                for (key, value) in &response.headers {
                    debug!(header = %key, value = %value, "Response header");
                }
                let body = serde_json::from_str::<serde_json::Value>(&response.body)
                    .and_then(|v| serde_json::to_string_pretty(&v))
                    .unwrap_or_else(|_| preview(&response.body, 500));
                println!("{}", body);
                if response.is_success() {
                    console::success(&format!("{} works", name));
                    success = true;
                } else {
                    console::fail(&format!("{} failed", name));
                }
            }
            Err(e) => report_error(name, &e),
        }
    }

    console::info("SDK-like headers");
    let sdk_headers = [
        ("x-api-key", api_key.as_str()),
        ("anthropic-version", ANTHROPIC_VERSION),
        ("User-Agent", SDK_USER_AGENT),
        ("Accept", "application/json"),
    ];
    match client.post_raw(MESSAGES_PATH, &payload, &sdk_headers).await {
        Ok(response) if response.is_success() => console::success("SDK-like headers work"),
        Ok(response) => console::fail(&format!(
            "SDK-like headers failed with {}: {}",
            response.status,
            preview(&response.body, 500)
        )),
        Err(e) => report_error("SDK-like headers", &e),
    }

    success
}

async fn basic(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 1: basic message");

    let request = ClaudeRequest::new(
        model,
        1024,
        vec![ClaudeMessage::user("Hello! Please introduce yourself in one sentence.")],
    );
    let started = Instant::now();
    match send(client, &request).await {
        Ok(response) => {
            console::field("Model", &response.model);
            console::field("Stop reason", response.stop_reason.as_deref().unwrap_or("-"));
            print_usage(&response);
            console::field("Latency", format!("{:.3} s", started.elapsed().as_secs_f64()));
            console::field("Reply", response.text());
            true
        }
        Err(e) => {
            report_error("Basic message", &e);
            false
        }
    }
}

/// Stream a message and fold its events; returns the accumulator and TTFB
async fn stream_message(
    client: &GatewayClient,
    request: &ClaudeRequest,
) -> ProbeResult<(ClaudeStreamAccumulator, Option<f64>)> {
    let started = Instant::now();
    let mut events = client.post_stream(MESSAGES_PATH, request).await?;
    let mut acc = ClaudeStreamAccumulator::default();
    let mut ttfb = None;

    while let Some(data) = events.next().await {
        let data = data?;
        let event: ClaudeStreamEvent = match serde_json::from_str(&data) {
            Ok(event) => event,
            Err(e) => {
                debug!("Skipping undecodable event: {}", e);
                continue;
            }
        };
        let delta = acc
            .push(event)
            .map_err(|e| ProbeError::Stream(format!("{}: {}", e.error_type, e.message)))?;
        if let Some(text) = delta {
            if ttfb.is_none() {
                ttfb = Some(started.elapsed().as_secs_f64());
            }
            print!("{}", text);
            let _ = std::io::stdout().flush();
        }
    }
    println!();
    Ok((acc, ttfb))
}

async fn streaming(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 2: streaming message");

    let request = ClaudeRequest::new(model, 1024, vec![ClaudeMessage::user("Write a short 4-line poem about coding.")])
        .streaming();
    let started = Instant::now();
    match stream_message(client, &request).await {
        Ok((acc, ttfb)) => {
            console::field("TTFB", format!("{:.3} s", ttfb.unwrap_or(0.0)));
            console::field("Total latency", format!("{:.3} s", started.elapsed().as_secs_f64()));
            console::field("Input tokens", acc.usage.input_tokens);
            console::field("Output tokens", acc.usage.output_tokens);
            if !acc.finished {
                console::warn("Stream closed without message_stop");
            }
            !acc.text.is_empty()
        }
        Err(e) => {
            report_error("Streaming message", &e);
            false
        }
    }
}

async fn multi_turn(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 3: multi-turn conversation");

    let mut messages = vec![ClaudeMessage::user("I want to learn Python. Give me 3 tips.")];
    let first = match send(client, &ClaudeRequest::new(model, 1024, messages.clone())).await {
        Ok(response) => response,
        Err(e) => {
            report_error("Round 1", &e);
            return false;
        }
    };
    let first_text = first.text();
    console::field("User", "I want to learn Python. Give me 3 tips.");
    console::field("Assistant", preview(&first_text, 200));

    messages.push(ClaudeMessage::assistant(first_text));
    messages.push(ClaudeMessage::user("Can you elaborate on the first tip?"));
    let second = match send(client, &ClaudeRequest::new(model, 1024, messages)).await {
        Ok(response) => response,
        Err(e) => {
            report_error("Round 2", &e);
            return false;
        }
    };
    console::field("User", "Can you elaborate on the first tip?");
    console::field("Assistant", preview(&second.text(), 200));

    console::field("Total input tokens", first.usage.input_tokens + second.usage.input_tokens);
    console::field("Total output tokens", first.usage.output_tokens + second.usage.output_tokens);
    true
}

async fn system_prompt(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 4: system prompt");

    let system = "You are a friendly pirate. Speak like a pirate.";
    let request = ClaudeRequest::new(model, 1024, vec![ClaudeMessage::user("How is the weather today?")]).system(system);
    match send(client, &request).await {
        Ok(response) => {
            console::field("System", system);
            console::field("Assistant", response.text());
            print_usage(&response);
            true
        }
        Err(e) => {
            report_error("System prompt", &e);
            false
        }
    }
}

async fn long_context(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 5: long context");

    let article = ai_history_article(3);
    let request = ClaudeRequest::new(
        model,
        512,
        vec![ClaudeMessage::user(format!(
            "Please read the following article and summarize it in 3 sentences:\n\n{}",
            article
        ))],
    );
    let started = Instant::now();
    match send(client, &request).await {
        Ok(response) => {
            console::field("Input length", format!("{} characters", article.chars().count()));
            console::field("Summary", response.text());
            print_usage(&response);
            console::field("Latency", format!("{:.3} s", started.elapsed().as_secs_f64()));
            true
        }
        Err(e) => {
            report_error("Long context", &e);
            false
        }
    }
}

async fn temperature(client: &GatewayClient, model: &str) -> bool {
    console::section("Test 6: temperature comparison");

    let prompt = "Describe the color of the sky in one word.";
    console::field("Prompt", prompt);
    for temp in [0.0, 1.0] {
        let request = ClaudeRequest::new(model, 50, vec![ClaudeMessage::user(prompt)]).temperature(temp);
        match send(client, &request).await {
            Ok(response) => console::field(&format!("temperature {:.1}", temp), response.text()),
            Err(e) => {
                report_error(&format!("temperature {:.1}", temp), &e);
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        let probe = ClaudeProbe {
            model: "claude-sonnet-4-20250514".to_string(),
            test: ClaudeTest::Long,
        };
        assert!(probe.selected(ClaudeTest::Long));
        assert!(!probe.selected(ClaudeTest::Raw));
    }
}
