//! Task polling tests

use gatewayprobe::config::RequestConfig;
use gatewayprobe::services::client::GatewayClient;
use gatewayprobe::services::poller::{classify_value, poll_task, PollConfig, PollOutcome, TaskState};
use gatewayprobe::utils::error::ProbeError;
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

fn pending() -> Value {
    json!({"code": "success", "data": {"status": "IN_PROGRESS", "progress": "30%"}})
}

#[tokio::test]
async fn test_times_out_after_exact_attempts() {
    let calls = AtomicU32::new(0);
    let config = PollConfig::new(Duration::ZERO, 4);

    let outcome = poll_task(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ProbeError>(pending()) }
        },
        classify_value,
        &config,
    )
    .await;

    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 4 });
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_stops_at_first_terminal_state() {
    let calls = AtomicU32::new(0);
    let config = PollConfig::new(Duration::ZERO, 10);

    let outcome = poll_task(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                Ok::<_, ProbeError>(if n < 2 {
                    pending()
                } else {
                    json!({"code": "success", "data": {"status": "SUCCESS", "url": "https://cdn.example.com/v.mp4"}})
                })
            }
        },
        classify_value,
        &config,
    )
    .await;

    assert_eq!(calls.load(Ordering::SeqCst), 3);
    let task = outcome.ok().unwrap();
    assert_eq!(task.video().and_then(|v| v.url).as_deref(), Some("https://cdn.example.com/v.mp4"));
}

#[tokio::test]
async fn test_failure_reason_is_reported() {
    let config = PollConfig::new(Duration::ZERO, 5);
    let outcome = poll_task(
        || async {
            Ok::<_, ProbeError>(json!({"data": {"status": "FAILURE", "fail_reason": "content policy"}}))
        },
        classify_value,
        &config,
    )
    .await;
    assert_eq!(outcome, PollOutcome::Failed("content policy".to_string()));
}

#[tokio::test]
async fn test_kling_payload_error_overrides_gateway_success() {
    let config = PollConfig::new(Duration::ZERO, 5);
    let outcome = poll_task(
        || async {
            Ok::<_, ProbeError>(json!({
                "code": "success",
                "data": {"status": "SUCCESS", "data": {"code": 1102, "message": "balance not enough"}}
            }))
        },
        classify_value,
        &config,
    )
    .await;
    match outcome {
        PollOutcome::Failed(reason) => assert!(reason.contains("1102")),
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_errors_strict_and_tolerated() {
    let fetch = |calls: &AtomicU32| {
        let n = calls.fetch_add(1, Ordering::SeqCst);
        async move {
            if n == 0 {
                Err(ProbeError::from_status(502, "bad gateway"))
            } else {
                Ok(json!({"status": "succeed"}))
            }
        }
    };

    let calls = AtomicU32::new(0);
    let strict = poll_task(|| fetch(&calls), classify_value, &PollConfig::new(Duration::ZERO, 3)).await;
    assert!(matches!(strict, PollOutcome::Failed(ref reason) if reason.contains("502")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let calls = AtomicU32::new(0);
    let tolerant = poll_task(
        || fetch(&calls),
        classify_value,
        &PollConfig::new(Duration::ZERO, 3).tolerate_errors(),
    )
    .await;
    assert!(tolerant.is_success());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_sleep_first_waits_before_each_fetch() {
    let started = std::time::Instant::now();
    let config = PollConfig::new(Duration::from_millis(20), 2).sleep_first();

    let outcome = poll_task(
        || async { Ok::<_, ProbeError>(pending()) },
        classify_value,
        &config,
    )
    .await;

    assert_eq!(outcome, PollOutcome::TimedOut { attempts: 2 });
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn test_custom_classifier() {
    let config = PollConfig::new(Duration::ZERO, 3);
    let outcome = poll_task(
        || async { Ok::<u32, ProbeError>(7) },
        |value: &u32| -> TaskState<u32> { TaskState::Succeeded(*value * 2) },
        &config,
    )
    .await;
    assert_eq!(outcome, PollOutcome::Succeeded(14));
}

#[tokio::test]
async fn test_polls_gateway_task_route() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/video/generations/task-9");
            then.status(200).json_body(json!({
                "code": "success",
                "data": {"task_id": "task-9", "status": "SUCCESS", "video_url": "https://cdn.example.com/9.mp4"}
            }));
        })
        .await;

    let client = GatewayClient::new(
        server.base_url(),
        "sk-test",
        &RequestConfig {
            timeout: 10,
            stream_timeout: 10,
        },
    )
    .unwrap();
    let outcome = poll_task(
        || client.get_json::<Value>("/v1/video/generations/task-9"),
        classify_value,
        &PollConfig::new(Duration::ZERO, 3),
    )
    .await;

    mock.assert_hits_async(1).await;
    let task = outcome.ok().unwrap();
    assert_eq!(task.task_id.as_deref(), Some("task-9"));
    assert_eq!(task.video().and_then(|v| v.url).as_deref(), Some("https://cdn.example.com/9.mp4"));
}
