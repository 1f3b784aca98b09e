//! Moonshot automatic cache probe
//!
//! Moonshot caches prompt prefixes on its own and reports hits as a
//! top-level `usage.cached_tokens`. These checks send unique, repeated and
//! prefix-sharing chat requests and read that field back.

use crate::models::chat::{ChatMessage, ChatRequest, ChatResponse, ChatUsage};
use crate::probes::{preview, report_error, stream_chat, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::utils::console::{self, SuiteReport};
use crate::utils::text::unique_marker;
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use std::time::Duration;

const CHAT_PATH: &str = "/v1/chat/completions";
const CACHE_SETTLE: Duration = Duration::from_secs(2);

const FULL_CACHE_SYSTEM: &str = "你是一个专业的技术助手。你需要遵循以下规则：
1. 回答要简洁明了
2. 使用专业术语时要解释清楚
3. 如果不确定，要诚实说明
4. 回答要有条理，使用列表或分点说明
5. 注意回答的准确性和时效性
这是测试缓存功能的固定提示词。";

const PARTIAL_CACHE_SYSTEM: &str = "你是一个专业的人工智能技术助手，专门负责解答关于机器学习、深度学习、自然语言处理等AI领域的问题。

你需要严格遵循以下规则：
1. 回答要简洁明了，避免冗余信息
2. 使用专业术语时要解释清楚，确保用户能够理解
3. 如果不确定答案，要诚实说明，不要编造信息
4. 回答要有条理，使用列表或分点说明来组织内容
5. 注意回答的准确性和时效性，AI领域发展很快
6. 如果问题涉及代码，请提供简洁的示例代码
7. 对于复杂概念，可以使用类比来帮助理解
8. 回答应该考虑到不同技术水平的用户

这是一个用于测试上下文缓存功能的固定提示词。
当用户提问时，请根据问题类型给出合适的回答。
请确保回答专业、准确、易懂。";

const STREAM_SYSTEM: &str = "你是一个专业的技术助手。这是一个用于测试流式请求缓存的固定提示词。
请根据用户的问题给出简洁的回答。";

const PARTIAL_QUESTIONS: [&str; 3] = [
    "请解释一下什么是卷积神经网络(CNN)？",
    "请解释一下什么是循环神经网络(RNN)？",
    "请解释一下什么是 Transformer 架构？",
];

/// Which cache scenario to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MoonshotTest {
    #[value(name = "no_cache")]
    NoCache,
    #[value(name = "full_cache")]
    FullCache,
    #[value(name = "partial_cache")]
    PartialCache,
    Stream,
    All,
}

/// Moonshot context cache checks
#[derive(Debug, Clone, Args)]
pub struct MoonshotCacheProbe {
    /// Model name
    #[arg(long, default_value = "kimi-k2.5")]
    pub model: String,

    /// Scenario to run
    #[arg(long, value_enum, default_value_t = MoonshotTest::All)]
    pub test: MoonshotTest,

    /// Maximum completion tokens per request
    #[arg(long, default_value_t = 100)]
    pub max_tokens: u32,
}

impl MoonshotCacheProbe {
    fn selected(&self, test: MoonshotTest) -> bool {
        self.test == MoonshotTest::All || self.test == test
    }

    async fn chat(&self, client: &GatewayClient, messages: Vec<ChatMessage>) -> Option<ChatResponse> {
        let request = ChatRequest::new(self.model.as_str(), messages).max_tokens(self.max_tokens);
        match client.post_json::<_, ChatResponse>(CHAT_PATH, &request).await {
            Ok(response) => Some(response),
            Err(e) => {
                report_error("Chat request", &e);
                None
            }
        }
    }
}

#[async_trait]
impl Probe for MoonshotCacheProbe {
    fn name(&self) -> &str {
        "moonshot-cache"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let client = ctx.gateway_client()?;

        console::header("Moonshot Context Cache Test");
        console::field("Base URL", client.base_url());
        console::field("Model", &self.model);

        let mut report = SuiteReport::new();
        if self.selected(MoonshotTest::NoCache) {
            report.check("no_cache", self.test_no_cache(&client).await);
        }
        if self.selected(MoonshotTest::FullCache) {
            report.check("full_cache", self.test_full_cache(&client).await);
        }
        if self.selected(MoonshotTest::PartialCache) {
            report.check("partial_cache", self.test_partial_cache(&client).await);
        }
        if self.selected(MoonshotTest::Stream) {
            report.check("stream", self.test_stream(&client).await);
        }
        Ok(report)
    }
}

fn cache_hit_line(label: &str, usage: &ChatUsage) -> bool {
    let cached = usage.effective_cached_tokens();
    if cached > 0 {
        console::success(&format!(
            "{}: cache hit! cached_tokens={}, hit ratio={:.1}%",
            label,
            cached,
            usage.cache_hit_ratio()
        ));
        true
    } else {
        console::warn(&format!("{}: no cache hit detected", label));
        false
    }
}

impl MoonshotCacheProbe {
    async fn test_no_cache(&self, client: &GatewayClient) -> bool {
        console::section("Test 1: no cache hit (first request)");

        let unique_content = format!("这是一个唯一的测试消息，时间戳: {}", unique_marker());
        console::info(&format!("Sending unique content: {}", preview(&unique_content, 50)));

        let messages = vec![ChatMessage::system("你是一个有帮助的助手。"), ChatMessage::user(unique_content)];
        let Some(response) = self.chat(client, messages).await else {
            return false;
        };

        console::chat_usage(&response.usage);
        let cached = response.usage.effective_cached_tokens();
        if cached == 0 {
            console::success("Expected: no cache hit (cached_tokens = 0)");
        } else {
            console::warn(&format!("Unexpected: first request hit the cache (cached_tokens = {})", cached));
        }
        true
    }

    async fn test_full_cache(&self, client: &GatewayClient) -> bool {
        console::section("Test 2: full cache hit (repeated request)");

        let test_id = unique_marker();
        let messages = vec![
            ChatMessage::system(FULL_CACHE_SYSTEM),
            ChatMessage::user(format!("请简单介绍一下人工智能的发展历史。(测试ID: {})", test_id)),
        ];

        console::info("First request (creates the cache)...");
        let Some(first) = self.chat(client, messages.clone()).await else {
            return false;
        };
        console::chat_usage(&first.usage);

        console::info("Waiting 2 seconds for the cache to settle...");
        tokio::time::sleep(CACHE_SETTLE).await;

        console::info("Second request (should hit the cache)...");
        let Some(second) = self.chat(client, messages).await else {
            return false;
        };
        console::chat_usage(&second.usage);

        if !cache_hit_line("Second request", &second.usage) {
            console::warn("  1. the model may not support automatic caching");
            console::warn("  2. the cache may not be in effect yet");
            console::warn("  3. the gateway may not forward cache usage");
        }
        true
    }

    async fn test_partial_cache(&self, client: &GatewayClient) -> bool {
        console::section("Test 3: partial cache hit (shared long prefix)");

        let history = vec![
            ChatMessage::system(PARTIAL_CACHE_SYSTEM),
            ChatMessage::user("什么是神经网络？"),
            ChatMessage::assistant(
                "神经网络是一种模仿人脑神经元结构的计算模型。它由多层节点（神经元）组成，每层之间通过权重连接。主要特点包括：1) 输入层接收数据；2) 隐藏层进行特征提取和转换；3) 输出层产生最终结果。神经网络通过反向传播算法学习调整权重，从而能够识别模式和做出预测。",
            ),
            ChatMessage::user("深度学习和机器学习有什么区别？"),
            ChatMessage::assistant(
                "深度学习是机器学习的一个子集。主要区别：1) 特征工程：传统机器学习需要手动设计特征，深度学习可以自动学习特征；2) 数据需求：深度学习通常需要更多数据；3) 计算资源：深度学习需要更强的计算能力（GPU）；4) 模型复杂度：深度学习模型层数更多，参数更多；5) 可解释性：传统机器学习模型通常更容易解释。",
            ),
        ];

        let mut later_hits = 0;
        for (i, question) in PARTIAL_QUESTIONS.iter().enumerate() {
            if i > 0 {
                console::info("Waiting 2 seconds...");
                tokio::time::sleep(CACHE_SETTLE).await;
            }

            let mut messages = history.clone();
            messages.push(ChatMessage::user(*question));
            console::info(&format!("Request {} ({} messages): {}", i + 1, messages.len(), question));

            let Some(response) = self.chat(client, messages).await else {
                return false;
            };
            console::chat_usage(&response.usage);
            if i > 0 && cache_hit_line(&format!("Request {}", i + 1), &response.usage) {
                later_hits += 1;
            }
        }

        if later_hits == 0 {
            console::warn("Possible reasons:");
            console::warn("  1. Moonshot only hits on an identical prefix");
            console::warn("  2. a different final message can invalidate the cache");
        }
        true
    }

    async fn test_stream(&self, client: &GatewayClient) -> bool {
        console::section("Test 4: streaming request cache");

        let request = ChatRequest::new(
            self.model.as_str(),
            vec![ChatMessage::system(STREAM_SYSTEM), ChatMessage::user("用一句话解释什么是 API。")],
        )
        .max_tokens(self.max_tokens)
        .streaming();

        console::info("First streaming request...");
        let first = match stream_chat(client, CHAT_PATH, &request, false).await {
            Ok(result) => result,
            Err(e) => {
                report_error("First streaming request", &e);
                return false;
            }
        };
        console::field("Content", preview(&first.text, 100));
        match &first.usage {
            Some(usage) => console::chat_usage(usage),
            None => console::warn("First streaming request returned no usage"),
        }

        console::info("Waiting 2 seconds...");
        tokio::time::sleep(CACHE_SETTLE).await;

        console::info("Second streaming request (should hit the cache)...");
        let second = match stream_chat(client, CHAT_PATH, &request, false).await {
            Ok(result) => result,
            Err(e) => {
                report_error("Second streaming request", &e);
                return false;
            }
        };
        match &second.usage {
            Some(usage) => {
                console::chat_usage(usage);
                cache_hit_line("Streaming request", usage);
                true
            }
            None => {
                console::warn("Second streaming request returned no usage");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection() {
        let probe = MoonshotCacheProbe {
            model: "kimi-k2.5".to_string(),
            test: MoonshotTest::Stream,
            max_tokens: 100,
        };
        assert!(probe.selected(MoonshotTest::Stream));
        assert!(!probe.selected(MoonshotTest::NoCache));

        let all = MoonshotCacheProbe {
            test: MoonshotTest::All,
            ..probe
        };
        assert!(all.selected(MoonshotTest::PartialCache));
    }
}
