//! Stress runner tests against a mock gateway

use gatewayprobe::services::stress::{
    expected_requests, percentile, run_stress, LatencySummary, StressConfig, StressMode, StressStats,
};
use httpmock::prelude::*;
use serde_json::json;
use std::time::Duration;

fn config(url: String, mode: StressMode, qpm: u32, duration_ms: u64) -> StressConfig {
    StressConfig {
        url,
        api_key: "sk-test".to_string(),
        model: "gpt-3.5-turbo".to_string(),
        qpm,
        concurrency: 5,
        duration: Duration::from_millis(duration_ms),
        mode,
        request_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn test_quota_run_respects_pacing() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"max_tokens": 1}"#);
            then.status(200).json_body(json!({"choices": [{"index": 0, "message": {"role": "assistant", "content": "h"}}]}));
        })
        .await;

    let config = config(server.base_url(), StressMode::Quota, 600, 1000);
    let report = run_stress(&config, std::future::pending::<()>()).await.unwrap();

    assert!(!report.interrupted);
    // At most floor(1 s * 600 / 60) requests, and pacing should get close to it
    assert!(report.sent <= 10, "sent {}", report.sent);
    assert!(report.sent >= 8, "sent {}", report.sent);
    assert_eq!(report.stats.total, report.sent);
    assert_eq!(report.stats.success, report.sent);
    assert_eq!(report.stats.status_codes.get(&200).copied(), Some(report.sent));
    assert!(report.stats.ttfb.is_empty());
    assert_eq!(report.stats.latency.len() as u64, report.sent);
    mock.assert_hits_async(report.sent as usize).await;
}

#[tokio::test]
async fn test_rate_limited_responses_count_as_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429).json_body(json!({"error": {"message": "rate limit"}}));
        })
        .await;

    let config = config(format!("{}/v1", server.base_url()), StressMode::Quota, 300, 500);
    let report = run_stress(&config, std::future::pending::<()>()).await.unwrap();

    assert!(report.sent <= 2);
    assert_eq!(report.stats.success, 0);
    assert_eq!(report.stats.fail, report.sent);
    assert_eq!(report.stats.status_codes.get(&429).copied().unwrap_or(0), report.sent);
    assert!(report.stats.latency.is_empty());
}

#[tokio::test]
async fn test_latency_run_records_ttfb() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .body_contains("RandomID: ")
                .json_body_partial(r#"{"stream": true, "max_tokens": 50}"#);
            then.status(200)
                .header("content-type", "text/event-stream")
                .body("data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"ok\"}}]}\n\ndata: [DONE]\n\n");
        })
        .await;

    let config = config(server.base_url(), StressMode::Latency { approx_tokens: 200 }, 300, 1000);
    let report = run_stress(&config, std::future::pending::<()>()).await.unwrap();

    assert!(report.sent >= 1 && report.sent <= 5, "sent {}", report.sent);
    assert_eq!(report.stats.success, report.sent);
    assert_eq!(report.stats.ttfb.len() as u64, report.sent);
    mock.assert_hits_async(report.sent as usize).await;
}

#[tokio::test]
async fn test_interrupt_stops_the_run() {
    let config = config("http://127.0.0.1:9".to_string(), StressMode::Quota, 60, 30_000);
    let report = run_stress(&config, std::future::ready(())).await.unwrap();

    assert!(report.interrupted);
    assert!(report.elapsed < Duration::from_secs(5));
}

#[test]
fn test_pacing_and_percentile_math() {
    assert_eq!(expected_requests(Duration::from_millis(999), 60), 0);
    assert_eq!(expected_requests(Duration::from_secs(1), 60), 1);
    assert_eq!(expected_requests(Duration::from_secs(30), 25_000), 12_500);

    let sorted: Vec<f64> = (1..=20).map(f64::from).collect();
    assert_eq!(percentile(&sorted, 0.95), Some(20.0));
    assert_eq!(percentile(&sorted, 0.5), Some(11.0));
    assert_eq!(percentile(&[], 0.5), None);

    let summary = LatencySummary::from_samples(&[0.3, 0.1, 0.2]).unwrap();
    assert_eq!(summary.min, 0.1);
    assert_eq!(summary.max, 0.3);
    assert_eq!(summary.p99, 0.3);

    let mut stats = StressStats::default();
    stats.record_response(200, None, Duration::from_millis(100));
    stats.record_response(503, None, Duration::from_millis(100));
    stats.record_error();
    assert_eq!((stats.total, stats.success, stats.fail, stats.errors), (3, 1, 1, 1));
    assert!((stats.success_rate() - 33.33).abs() < 0.01);
}
