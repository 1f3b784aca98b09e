//! Gateway client tests against a mock gateway

use futures::StreamExt;
use gatewayprobe::config::RequestConfig;
use gatewayprobe::models::chat::{ChatMessage, ChatRequest, ChatResponse};
use gatewayprobe::services::client::GatewayClient;
use gatewayprobe::utils::error::ProbeError;
use httpmock::prelude::*;
use serde_json::{json, Value};

fn request_config() -> RequestConfig {
    RequestConfig {
        timeout: 10,
        stream_timeout: 10,
    }
}

fn client(server: &MockServer) -> GatewayClient {
    GatewayClient::new(server.base_url(), "sk-test", &request_config()).unwrap()
}

#[tokio::test]
async fn test_post_json_sends_bearer_and_decodes() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/chat/completions")
                .header("authorization", "Bearer sk-test")
                .json_body_partial(r#"{"model": "doubao-seed-1-6-250615", "max_tokens": 8}"#);
            then.status(200).json_body(json!({
                "id": "chatcmpl-1",
                "model": "doubao-seed-1-6-250615",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hello!"}, "finish_reason": "stop"}],
                "usage": {"prompt_tokens": 9, "completion_tokens": 2, "total_tokens": 11}
            }));
        })
        .await;

    let request = ChatRequest::new("doubao-seed-1-6-250615", vec![ChatMessage::user("hi")]).max_tokens(8);
    let response: ChatResponse = client(&server).post_json("/v1/chat/completions", &request).await.unwrap();

    mock.assert_async().await;
    assert_eq!(response.text(), "Hello!");
    assert_eq!(response.finish_reason(), Some("stop"));
    assert_eq!(response.usage.prompt_tokens, 9);
    assert_eq!(response.usage.effective_cached_tokens(), 0);
}

#[tokio::test]
async fn test_non_success_status_maps_to_status_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(429)
                .json_body(json!({"error": {"message": "rate limit exceeded", "type": "rate_limit_error"}}));
        })
        .await;

    let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]);
    let err = client(&server)
        .post_json::<_, Value>("/v1/chat/completions", &request)
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), Some(429));
    match err {
        ProbeError::Status { status, body } => {
            assert_eq!(status, 429);
            assert_eq!(body, "rate limit exceeded (rate_limit_error)");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_body_is_serialization_error() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v1/video/generations/task-1");
            then.status(200).body("<html>gateway error</html>");
        })
        .await;

    let err = client(&server)
        .get_json::<Value>("/v1/video/generations/task-1")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "decode");
}

#[tokio::test]
async fn test_custom_headers_without_bearer() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/messages")
                .header("x-api-key", "sk-test")
                .header("anthropic-version", "2023-06-01")
                .matches(|req| {
                    !req.headers
                        .as_ref()
                        .map(|headers| headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("authorization")))
                        .unwrap_or(false)
                });
            then.status(200).json_body(json!({"ok": true}));
        })
        .await;

    let client = client(&server)
        .without_bearer()
        .with_header("x-api-key", "sk-test")
        .with_header("anthropic-version", "2023-06-01");
    let value: Value = client.post_json("/v1/messages", &json!({"model": "m"})).await.unwrap();

    mock.assert_async().await;
    assert_eq!(value["ok"], true);
}

#[tokio::test]
async fn test_post_raw_keeps_error_bodies_and_headers() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/kling/v1/audio/tts").header("x-cache-control", "ephemeral");
            then.status(400)
                .header("x-request-id", "req-42")
                .json_body(json!({"code": 1201, "message": "text is required"}));
        })
        .await;

    let raw = client(&server)
        .post_raw("/kling/v1/audio/tts", &json!({"voice_id": "v"}), &[("x-cache-control", "ephemeral")])
        .await
        .unwrap();

    assert_eq!(raw.status, 400);
    assert!(!raw.is_success());
    assert_eq!(raw.header("X-Request-Id"), Some("req-42"));
    let body: Value = raw.json().unwrap();
    assert_eq!(body["code"], 1201);
}

#[tokio::test]
async fn test_post_stream_yields_data_until_done() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions").header("accept", "text/event-stream");
            then.status(200).header("content-type", "text/event-stream").body(
                "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n\
                 : keep-alive\n\n\
                 data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n\
                 data: [DONE]\n\n\
                 data: {\"ignored\":true}\n\n",
            );
        })
        .await;

    let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]).streaming();
    let events: Vec<String> = client(&server)
        .post_stream("/v1/chat/completions", &request)
        .await
        .unwrap()
        .map(|event| event.unwrap())
        .collect()
        .await;

    assert_eq!(events.len(), 2);
    assert!(events[0].contains("Hel"));
    assert!(events[1].contains("lo"));
}

#[tokio::test]
async fn test_post_stream_error_status() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(504).body("upstream timed out");
        })
        .await;

    let request = ChatRequest::new("m", vec![ChatMessage::user("hi")]).streaming();
    let err = match client(&server).post_stream("/v1/chat/completions", &request).await {
        Ok(_) => panic!("expected an error"),
        Err(e) => e,
    };
    assert_eq!(err.status_code(), Some(504));
    assert!(err.is_timeout());
}
