//! gatewayprobe CLI
//!
//! Runs one probe suite against an AI API gateway and exits with 0 when it
//! passes, 1 when a check fails and 2 on configuration errors.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gatewayprobe::config::{LoggingConfig, Overrides, Settings};
use gatewayprobe::probes::{
    chat::ChatProbe, claude::ClaudeProbe, image::ImageProbe, kling::KlingProbe, long_stream::LongStreamProbe,
    moonshot_cache::MoonshotCacheProbe, responses_cache::ResponsesCacheProbe, stress::StressProbe,
    tiered_pricing::TieredPricingProbe, video::VideoProbe, Probe, ProbeContext,
};
use gatewayprobe::utils::console::SuiteReport;
use gatewayprobe::utils::pricing::PricingTable;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "gatewayprobe", version, about = "Probe AI provider APIs through an API gateway")]
struct Cli {
    /// Gateway base URL [env: NEW_API_BASE_URL]
    #[arg(long, global = true)]
    url: Option<String>,

    /// Gateway API key [env: NEW_API_KEY or EZMODEL_API_KEY]
    #[arg(long, global = true)]
    key: Option<String>,

    /// Request timeout in seconds [env: REQUEST_TIMEOUT]
    #[arg(long, global = true)]
    timeout: Option<u64>,

    /// Pricing table JSON [default: ~/.config/gatewayprobe/pricing.json, ./pricing.json, built-in]
    #[arg(long, global = true)]
    pricing: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Paced load test (quota or latency mode)
    Stress(StressProbe),
    /// Moonshot automatic prefix cache
    MoonshotCache(MoonshotCacheProbe),
    /// Responses API prefix caching
    ResponsesCache(ResponsesCacheProbe),
    /// Tiered pricing, context cache and billing log checks
    TieredPricing(TieredPricingProbe),
    /// Anthropic Messages API diagnostics
    Claude(ClaudeProbe),
    /// OpenAI-compatible chat smoke test
    Chat(ChatProbe),
    /// Long streamed completion through the proxy timeout
    LongStream(LongStreamProbe),
    /// Text-to-image generation
    Image(ImageProbe),
    /// Video generation submit and poll
    Video(VideoProbe),
    /// Kling native routes
    Kling(KlingProbe),
}

impl Commands {
    fn probe(&self) -> &dyn Probe {
        match self {
            Commands::Stress(probe) => probe,
            Commands::MoonshotCache(probe) => probe,
            Commands::ResponsesCache(probe) => probe,
            Commands::TieredPricing(probe) => probe,
            Commands::Claude(probe) => probe,
            Commands::Chat(probe) => probe,
            Commands::LongStream(probe) => probe,
            Commands::Image(probe) => probe,
            Commands::Video(probe) => probe,
            Commands::Kling(probe) => probe,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(report) => {
            report.print_summary();
            if report.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: Cli) -> Result<SuiteReport> {
    let settings = Settings::new()
        .context("Failed to load settings")?
        .with_overrides(Overrides {
            base_url: cli.url,
            api_key: cli.key,
            timeout: cli.timeout,
        })
        .context("Invalid command-line settings")?;

    init_logging(&settings.logging)?;

    let pricing =
        PricingTable::load_or_default(cli.pricing.as_deref()).context("Failed to load pricing table")?;

    let probe = cli.command.probe();
    info!(probe = probe.name(), gateway = %settings.gateway.base_url, "Starting probe");

    let ctx = ProbeContext::new(settings, pricing);
    probe.run(&ctx).await
}

/// Initialize logging system; logs go to stderr so reports on stdout stay readable
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let subscriber: Box<dyn tracing::Subscriber + Send + Sync> = if config.format == "json" {
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.as_str())
                .with_writer(std::io::stderr)
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .finish(),
        )
    } else {
        Box::new(
            tracing_subscriber::fmt()
                .with_env_filter(config.level.as_str())
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish(),
        )
    };

    tracing::subscriber::set_global_default(subscriber).context("Failed to set tracing subscriber")?;

    Ok(())
}
