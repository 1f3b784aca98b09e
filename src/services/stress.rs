//! Stress load generator
//!
//! Paced request loop with a concurrency bound. Requests are issued so that
//! `floor(elapsed * qpm / 60)` have been sent at any moment; each runs in its
//! own task behind a semaphore. No retries.

use crate::models::chat::{ChatMessage, ChatRequest};
use crate::utils::console;
use crate::utils::error::ProbeResult;
use crate::utils::text::stress_prompt;
use futures::StreamExt;
use reqwest::Client;
use std::collections::BTreeMap;
use std::future::Future;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Progress line redraw interval
const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Above this rate the loop yields instead of sleeping
const HIGH_QPM: u32 = 10_000;

/// What each request looks like
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StressMode {
    /// Minimal `hi` request with `max_tokens` 1, for rate limit and quota checks
    Quota,
    /// Long streaming prompt with a unique prefix, for TTFB and full latency
    Latency { approx_tokens: usize },
}

impl StressMode {
    /// Loop tick; `None` means a bare yield
    pub fn tick(&self, qpm: u32) -> Option<Duration> {
        match self {
            StressMode::Quota => Some(Duration::from_millis(10)),
            StressMode::Latency { .. } if qpm > HIGH_QPM => None,
            StressMode::Latency { .. } => Some(Duration::from_millis(1)),
        }
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, StressMode::Latency { .. })
    }

    /// Build one request; latency prompts get a fresh UUID so no two share a prefix
    pub fn build_request(&self, model: &str, base_prompt: &str) -> ChatRequest {
        match self {
            StressMode::Quota => ChatRequest::new(model, vec![ChatMessage::user("hi")]).max_tokens(1),
            StressMode::Latency { .. } => {
                let prompt = format!("RandomID: {}\nContent: {}", Uuid::new_v4(), base_prompt);
                let mut request = ChatRequest::new(model, vec![ChatMessage::user(prompt)]).max_tokens(50);
                request.stream = Some(true);
                request
            }
        }
    }
}

/// Stress run configuration
#[derive(Debug, Clone)]
pub struct StressConfig {
    /// Base URL or full chat completions URL
    pub url: String,
    pub api_key: String,
    pub model: String,
    /// Target requests per minute
    pub qpm: u32,
    /// Maximum in-flight requests
    pub concurrency: usize,
    pub duration: Duration,
    pub mode: StressMode,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Endpoint URL ending in `/v1/chat/completions`
pub fn normalize_endpoint(url: &str) -> String {
    let url = url.trim_end_matches('/');
    if url.ends_with("/chat/completions") {
        url.to_string()
    } else if url.ends_with("/v1") {
        format!("{}/chat/completions", url)
    } else {
        format!("{}/v1/chat/completions", url)
    }
}

/// Requests that should have been issued after `elapsed`
pub fn expected_requests(elapsed: Duration, qpm: u32) -> u64 {
    (elapsed.as_secs_f64() * qpm as f64 / 60.0).floor() as u64
}

/// `sorted[floor(n * q)]`, index clamped to `n - 1`
pub fn percentile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let index = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    Some(sorted[index])
}

/// Counters shared by the request tasks
#[derive(Debug, Clone, Default)]
pub struct StressStats {
    pub total: u64,
    pub success: u64,
    pub fail: u64,
    /// Transport errors (no HTTP status)
    pub errors: u64,
    pub status_codes: BTreeMap<u16, u64>,
    /// Time to first body chunk of successful streaming requests, seconds
    pub ttfb: Vec<f64>,
    /// Full response time of successful requests, seconds
    pub latency: Vec<f64>,
}

impl StressStats {
    pub fn record_response(&mut self, status: u16, ttfb: Option<Duration>, latency: Duration) {
        self.total += 1;
        *self.status_codes.entry(status).or_insert(0) += 1;
        if (200..300).contains(&status) {
            self.success += 1;
            if let Some(ttfb) = ttfb {
                self.ttfb.push(ttfb.as_secs_f64());
            }
            self.latency.push(latency.as_secs_f64());
        } else {
            self.fail += 1;
        }
    }

    pub fn record_error(&mut self) {
        self.total += 1;
        self.errors += 1;
    }

    /// Success share in percent
    pub fn success_rate(&self) -> f64 {
        self.success as f64 / self.total.max(1) as f64 * 100.0
    }
}

/// Average, percentiles and extremes of a latency set
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub avg: f64,
    pub p95: f64,
    pub p99: f64,
    pub min: f64,
    pub max: f64,
}

impl LatencySummary {
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Some(Self {
            avg: sorted.iter().sum::<f64>() / sorted.len() as f64,
            p95: percentile(&sorted, 0.95)?,
            p99: percentile(&sorted, 0.99)?,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Result of a stress run
#[derive(Debug, Clone)]
pub struct StressReport {
    pub stats: StressStats,
    pub sent: u64,
    pub elapsed: Duration,
    pub interrupted: bool,
}

impl StressReport {
    /// Completed requests per minute over the whole run
    pub fn actual_rpm(&self) -> f64 {
        let minutes = self.elapsed.as_secs_f64() / 60.0;
        if minutes > 0.0 {
            self.stats.total as f64 / minutes
        } else {
            0.0
        }
    }

    pub fn print(&self) {
        console::header("Test Results");
        println!("Total Requests: {}", self.stats.total);
        println!("Success Rate: {:.2}%", self.stats.success_rate());
        println!("Failed: {}", self.stats.fail);
        println!("Errors (Exceptions): {}", self.stats.errors);
        println!("Actual RPM: {:.2}", self.actual_rpm());

        print_latency("First Byte (TTFB)", &self.stats.ttfb);
        print_latency("Full Response", &self.stats.latency);

        println!();
        println!("Status Code Distribution:");
        for (code, count) in &self.stats.status_codes {
            let line = format!("{}: {}", code, count);
            if *code == 200 {
                console::info(&line);
            } else {
                console::fail(&line);
            }
        }
    }
}

fn print_latency(name: &str, samples: &[f64]) {
    if let Some(summary) = LatencySummary::from_samples(samples) {
        println!();
        println!("[{}]", name);
        println!("  Average: {:.3}s", summary.avg);
        println!("  P95:     {:.3}s", summary.p95);
        println!("  P99:     {:.3}s", summary.p99);
        println!("  Max:     {:.3}s", summary.max);
        println!("  Min:     {:.3}s", summary.min);
    }
}

async fn pause(tick: Option<Duration>) {
    match tick {
        Some(duration) => tokio::time::sleep(duration).await,
        None => tokio::task::yield_now().await,
    }
}

async fn send_one(
    client: Client,
    url: Arc<str>,
    api_key: Arc<str>,
    request: ChatRequest,
    streaming: bool,
    stats: Arc<Mutex<StressStats>>,
) {
    let started = Instant::now();

    let response = match client.post(&*url).bearer_auth(&*api_key).json(&request).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Request failed: {}", e);
            stats.lock().await.record_error();
            return;
        }
    };

    let status = response.status().as_u16();
    let mut ttfb = None;

    if streaming {
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            if let Err(e) = chunk {
                warn!("Stream read failed: {}", e);
                stats.lock().await.record_error();
                return;
            }
            if ttfb.is_none() {
                ttfb = Some(started.elapsed());
            }
        }
    } else if let Err(e) = response.bytes().await {
        warn!("Body read failed: {}", e);
        stats.lock().await.record_error();
        return;
    }

    stats.lock().await.record_response(status, ttfb, started.elapsed());
}

fn draw_progress(stats: &StressStats, sent: u64, elapsed: Duration) {
    let secs = elapsed.as_secs_f64();
    let rate_429 = stats.status_codes.get(&429).copied().unwrap_or(0);
    print!(
        "\rTime: {:.1}s | Sent: {} | Success: {} | Fail: {} (429s: {}) | QPS: {:.2}",
        secs,
        sent,
        stats.success,
        stats.fail,
        rate_429,
        sent as f64 / secs.max(0.1)
    );
    let _ = std::io::stdout().flush();
}

/// Run the load loop until the duration elapses or `interrupt` resolves
pub async fn run_stress<I>(config: &StressConfig, interrupt: I) -> ProbeResult<StressReport>
where
    I: Future<Output = ()>,
{
    let client = Client::builder()
        .timeout(config.request_timeout)
        .pool_max_idle_per_host(config.concurrency)
        .build()?;

    let url: Arc<str> = Arc::from(normalize_endpoint(&config.url));
    let api_key: Arc<str> = Arc::from(config.api_key.as_str());
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));
    let stats = Arc::new(Mutex::new(StressStats::default()));
    let base_prompt = match config.mode {
        StressMode::Latency { approx_tokens } => stress_prompt(approx_tokens),
        StressMode::Quota => String::new(),
    };
    let tick = config.mode.tick(config.qpm);
    let streaming = config.mode.is_streaming();

    info!(url = %url, qpm = config.qpm, concurrency = config.concurrency, "Starting stress run");

    let mut handles: Vec<JoinHandle<()>> = Vec::new();
    let mut sent = 0u64;
    let mut last_draw: Option<Instant> = None;
    let mut interrupted = false;
    let started = Instant::now();

    tokio::pin!(interrupt);

    loop {
        let elapsed = started.elapsed();
        if elapsed >= config.duration {
            break;
        }

        if sent < expected_requests(elapsed, config.qpm) {
            sent += 1;
            let request = config.mode.build_request(&config.model, &base_prompt);
            let task = send_one(client.clone(), url.clone(), api_key.clone(), request, streaming, stats.clone());
            let semaphore = semaphore.clone();
            handles.push(tokio::spawn(async move {
                // Closed semaphore means the run is shutting down
                if let Ok(_permit) = semaphore.acquire_owned().await {
                    task.await;
                }
            }));
        }

        if last_draw.map_or(true, |t| t.elapsed() >= PROGRESS_INTERVAL) {
            draw_progress(&*stats.lock().await, sent, elapsed);
            last_draw = Some(Instant::now());
        }

        tokio::select! {
            _ = &mut interrupt => {
                interrupted = true;
                break;
            }
            _ = pause(tick) => {}
        }
    }

    println!();
    if !interrupted {
        console::warn("Waiting for pending requests to complete...");
        let total = handles.len();
        loop {
            let pending = handles.iter().filter(|h| !h.is_finished()).count();
            if pending == 0 {
                break;
            }
            print!("\rClosing: {}/{} pending... ", pending, total);
            let _ = std::io::stdout().flush();
            tokio::select! {
                _ = &mut interrupt => {
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(PROGRESS_INTERVAL) => {}
            }
        }
        println!();
    }

    if interrupted {
        semaphore.close();
        for handle in &handles {
            handle.abort();
        }
        console::warn("Test interrupted by user.");
    } else {
        for handle in handles {
            if let Err(e) = handle.await {
                debug!("Request task ended abnormally: {}", e);
            }
        }
        console::success("All requests completed. Generating report...");
    }

    let stats = stats.lock().await.clone();
    Ok(StressReport {
        stats,
        sent,
        elapsed: started.elapsed(),
        interrupted,
    })
}
