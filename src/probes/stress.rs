//! Stress probe
//!
//! Paced chat completion load against the gateway, in quota mode (tiny
//! requests, rate limit behaviour) or latency mode (long streamed prompts,
//! TTFB and full latency percentiles).

use crate::probes::{Probe, ProbeContext};
use crate::services::stress::{normalize_endpoint, run_stress, StressConfig, StressMode};
use crate::utils::console::{self, SuiteReport};
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use std::time::Duration;
use tracing::warn;

/// Request shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StressKind {
    Quota,
    Latency,
}

/// Paced load test
#[derive(Debug, Clone, Args)]
pub struct StressProbe {
    /// Request shape
    #[arg(long, value_enum, default_value_t = StressKind::Quota)]
    pub mode: StressKind,

    /// Model name [default: gpt-3.5-turbo (quota), deepseek-v3.2 (latency)]
    #[arg(long)]
    pub model: Option<String>,

    /// Target requests per minute [default: 60 (quota), 25000 (latency)]
    #[arg(long)]
    pub qpm: Option<u32>,

    /// Maximum concurrent requests [default: 10 (quota), 100 (latency)]
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Test duration in seconds [default: 30 (quota), 10 (latency)]
    #[arg(long)]
    pub duration: Option<u64>,

    /// Approximate input tokens per latency request
    #[arg(long, default_value_t = 8000)]
    pub tokens: usize,
}

impl StressProbe {
    /// Resolve mode-dependent defaults into a run configuration
    pub fn config(&self, base_url: &str, api_key: &str, request_timeout: Duration) -> StressConfig {
        let (model, qpm, concurrency, duration, mode) = match self.mode {
            StressKind::Quota => ("gpt-3.5-turbo", 60, 10, 30, StressMode::Quota),
            StressKind::Latency => (
                "deepseek-v3.2",
                25_000,
                100,
                10,
                StressMode::Latency {
                    approx_tokens: self.tokens,
                },
            ),
        };
        StressConfig {
            url: normalize_endpoint(base_url),
            api_key: api_key.to_string(),
            model: self.model.clone().unwrap_or_else(|| model.to_string()),
            qpm: self.qpm.unwrap_or(qpm),
            concurrency: self.concurrency.unwrap_or(concurrency).max(1),
            duration: Duration::from_secs(self.duration.unwrap_or(duration)),
            mode,
            request_timeout,
        }
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}

#[async_trait]
impl Probe for StressProbe {
    fn name(&self) -> &str {
        "stress"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let api_key = ctx.settings.require_gateway_key()?;
        let config = self.config(
            &ctx.settings.gateway.base_url,
            api_key,
            Duration::from_secs(ctx.settings.request.timeout),
        );

        console::header("Stress Test");
        console::field("Target", &config.url);
        console::field("Model", &config.model);
        console::field("Mode", format!("{:?}", config.mode));
        console::field("Target QPM", config.qpm);
        console::field("Concurrency", config.concurrency);
        console::field("Duration", format!("{} s", config.duration.as_secs()));
        console::info("Press Ctrl+C to stop early");
        println!();

        let report = run_stress(&config, ctrl_c()).await?;
        report.print();

        let mut suite = SuiteReport::new();
        if report.interrupted {
            suite.skip("stress run (interrupted)");
        } else {
            suite.check("stress run", report.stats.success > 0);
        }
        Ok(suite)
    }
}
