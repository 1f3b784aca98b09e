//! Chat completion smoke test
//!
//! Exercises OpenAI-compatible `/v1/chat/completions` across one or more
//! models: plain, streaming, system prompt, multi-turn and temperature.

use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse};
use crate::probes::{preview, report_error, stream_chat, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::utils::console::{self, SuiteReport};
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};

const CHAT_PATH: &str = "/v1/chat/completions";

/// Doubao seed chat models
pub const DEFAULT_MODELS: [&str; 3] = ["seed-1-8-251228", "seed-1-6-250915", "seed-1-6-flash-250715"];

/// Chat scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChatScenario {
    Basic,
    Stream,
    System,
    MultiTurn,
    Temperature,
    All,
}

impl ChatScenario {
    const EACH: [ChatScenario; 5] = [
        ChatScenario::Basic,
        ChatScenario::Stream,
        ChatScenario::System,
        ChatScenario::MultiTurn,
        ChatScenario::Temperature,
    ];

    fn label(self) -> &'static str {
        match self {
            ChatScenario::Basic => "basic",
            ChatScenario::Stream => "stream",
            ChatScenario::System => "system",
            ChatScenario::MultiTurn => "multi-turn",
            ChatScenario::Temperature => "temperature",
            ChatScenario::All => "all",
        }
    }
}

/// Expand `All` and drop duplicates, keeping order
pub fn expand_scenarios(selected: &[ChatScenario]) -> Vec<ChatScenario> {
    let mut expanded = Vec::new();
    for scenario in selected {
        let items: &[ChatScenario] = if *scenario == ChatScenario::All {
            &ChatScenario::EACH
        } else {
            std::slice::from_ref(scenario)
        };
        for item in items {
            if !expanded.contains(item) {
                expanded.push(*item);
            }
        }
    }
    expanded
}

/// OpenAI-compatible chat checks
#[derive(Debug, Clone, Args)]
pub struct ChatProbe {
    /// Model to test (repeatable)
    #[arg(long = "model", num_args = 1.., default_values_t = DEFAULT_MODELS.map(String::from))]
    pub models: Vec<String>,

    /// Scenarios to run (repeatable)
    #[arg(long = "scenario", value_enum, num_args = 1.., default_values_t = [ChatScenario::Basic])]
    pub scenarios: Vec<ChatScenario>,
}

#[async_trait]
impl Probe for ChatProbe {
    fn name(&self) -> &str {
        "chat"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let client = ctx.gateway_client()?;
        let scenarios = expand_scenarios(&self.scenarios);

        console::header("Chat Completions Smoke Test");
        console::field("Base URL", client.base_url());
        console::field("Models", self.models.join(", "));

        let mut report = SuiteReport::new();
        for model in &self.models {
            console::section(&format!("Model: {}", model));
            for scenario in &scenarios {
                let passed = match scenario {
                    ChatScenario::Basic => basic(&client, model).await,
                    ChatScenario::Stream => stream(&client, model).await,
                    ChatScenario::System => system_prompt(&client, model).await,
                    ChatScenario::MultiTurn => multi_turn(&client, model).await,
                    ChatScenario::Temperature => temperature(&client, model).await,
                    ChatScenario::All => continue,
                };
                report.check(format!("{} {}", model, scenario.label()), passed);
            }
        }
        Ok(report)
    }
}

async fn send(client: &GatewayClient, request: &ChatRequest) -> Option<ChatResponse> {
    match client.post_json::<_, ChatResponse>(CHAT_PATH, request).await {
        Ok(response) => Some(response),
        Err(e) => {
            report_error(&format!("{} request", request.model), &e);
            None
        }
    }
}

async fn basic(client: &GatewayClient, model: &str) -> bool {
    console::info("Basic chat");
    let request = ChatRequest::new(model, vec![ChatMessage::user("你好，请用一句话介绍一下你自己")]).max_tokens(1024);
    let Some(response) = send(client, &request).await else {
        return false;
    };
    console::field("Reply", response.text());
    console::chat_usage(&response.usage);
    true
}

async fn stream(client: &GatewayClient, model: &str) -> bool {
    console::info("Streaming chat");
    let request = ChatRequest::new(model, vec![ChatMessage::user("请写一首关于春天的短诗")])
        .max_tokens(1024)
        .streaming();
    match stream_chat(client, CHAT_PATH, &request, true).await {
        Ok(result) => {
            if let Some(first) = result.first_token {
                console::field("First token", format!("{} ms", first.as_millis()));
            }
            console::field("Chunks", result.chunks);
            if let Some(usage) = &result.usage {
                console::chat_usage(usage);
            }
            !result.text.is_empty()
        }
        Err(e) => {
            report_error("Streaming request", &e);
            false
        }
    }
}

async fn system_prompt(client: &GatewayClient, model: &str) -> bool {
    console::info("System prompt");
    let request = ChatRequest::new(
        model,
        vec![
            ChatMessage::system("你是一位古代诗人，请用文言文回答问题。"),
            ChatMessage::user("今天天气如何？"),
        ],
    )
    .max_tokens(1024);
    let Some(response) = send(client, &request).await else {
        return false;
    };
    console::field("Reply", response.text());
    true
}

async fn multi_turn(client: &GatewayClient, model: &str) -> bool {
    console::info("Multi-turn conversation");
    let mut messages = vec![ChatMessage::user("我想学习机器学习，应该从哪里开始？")];

    let Some(first) = send(client, &ChatRequest::new(model, messages.clone()).max_tokens(512)).await else {
        return false;
    };
    console::field("Round 1", preview(first.text(), 200));
    console::field(
        "Tokens",
        format!(
            "prompt={}, completion={}, total={}",
            first.usage.prompt_tokens, first.usage.completion_tokens, first.usage.total_tokens
        ),
    );

    messages.push(ChatMessage::assistant(first.text()));
    messages.push(ChatMessage::user("请详细展开第一个建议。"));

    let Some(second) = send(client, &ChatRequest::new(model, messages).max_tokens(512)).await else {
        return false;
    };
    console::field("Round 2", preview(second.text(), 200));
    console::field(
        "Tokens",
        format!(
            "prompt={}, completion={}, total={}",
            second.usage.prompt_tokens, second.usage.completion_tokens, second.usage.total_tokens
        ),
    );
    // History must be billed again on the second round
    if second.usage.prompt_tokens > 0 && second.usage.prompt_tokens <= first.usage.prompt_tokens {
        console::warn("Second round prompt tokens did not grow with the history");
    }
    true
}

async fn temperature(client: &GatewayClient, model: &str) -> bool {
    console::info("Temperature comparison");
    let mut ok = true;
    for temp in [0.0, 1.0] {
        let request = ChatRequest::new(model, vec![ChatMessage::user("用一个词描述大海。")])
            .max_tokens(50)
            .temperature(temp);
        match send(client, &request).await {
            Some(response) => console::field(&format!("temperature {:.1}", temp), response.text()),
            None => ok = false,
        }
    }
    ok
}
