//! Data model tests against provider-shaped payloads

use gatewayprobe::models::chat::{ChatMessage, ChatRequest, ChatUsage};
use gatewayprobe::models::claude::{ClaudeStreamAccumulator, ClaudeStreamEvent};
use gatewayprobe::models::context::ContextChatRequest;
use gatewayprobe::models::media::{
    EditMode, FaceChoose, FaceData, ImageRef, KlingResponse, KlingTaskData, LipSyncRequest, MultiElementsRequest,
    UnifiedTask,
};
use gatewayprobe::models::responses::{ResponsesResponse, ResponsesStreamEvent};
use gatewayprobe::services::sse::SseDecoder;
use serde_json::json;

#[test]
fn test_moonshot_and_openai_cached_tokens() {
    // Moonshot reports cached_tokens at the top level
    let moonshot: ChatUsage = serde_json::from_value(json!({
        "prompt_tokens": 2048, "completion_tokens": 20, "total_tokens": 2068, "cached_tokens": 1536
    }))
    .unwrap();
    assert_eq!(moonshot.effective_cached_tokens(), 1536);
    assert_eq!(moonshot.cache_hit_ratio(), 75.0);

    // OpenAI-compatible providers nest it
    let nested: ChatUsage = serde_json::from_value(json!({
        "prompt_tokens": 1000, "completion_tokens": 10,
        "prompt_tokens_details": {"cached_tokens": 250}
    }))
    .unwrap();
    assert_eq!(nested.effective_cached_tokens(), 250);
    assert_eq!(nested.total_tokens, 0);
}

#[test]
fn test_cache_request_marks_system_prompt() {
    let request = ChatRequest::new(
        "seed-1-8-251228",
        vec![ChatMessage::system("long shared context").ephemeral(), ChatMessage::user("Summarize.")],
    )
    .max_tokens(100);
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["messages"][0]["cache_control"]["type"], "ephemeral");
    assert!(value["messages"][1].get("cache_control").is_none());
}

#[test]
fn test_responses_stream_completion() {
    let mut decoder = SseDecoder::new();
    let mut events = decoder.push(
        b"event: response.output_text.delta\n\
          data: {\"type\":\"response.output_text.delta\",\"delta\":\"Del\"}\n\n\
          data: {\"type\":\"response.output_text.delta\",\"delta\":\"la\"}\n\n\
          data: {\"type\":\"response.in_progress\"}\n\n",
    );
    events.extend(decoder.push(
        b"data: {\"type\":\"response.completed\",\"response\":{\"id\":\"resp_1\",\"status\":\"completed\",\
          \"output\":[{\"type\":\"message\",\"content\":[{\"type\":\"output_text\",\"text\":\"Della\"}]}],\
          \"usage\":{\"input_tokens\":1200,\"output_tokens\":5,\"input_tokens_details\":{\"cached_tokens\":1024}}}}\n\n",
    ));

    let mut text = String::new();
    let mut completed: Option<ResponsesResponse> = None;
    for data in &events {
        match serde_json::from_str::<ResponsesStreamEvent>(data).unwrap() {
            ResponsesStreamEvent::OutputTextDelta { delta } => text.push_str(&delta),
            ResponsesStreamEvent::Completed { response } => completed = Some(response),
            ResponsesStreamEvent::Other => {}
        }
    }

    assert_eq!(text, "Della");
    let response = completed.unwrap();
    assert_eq!(response.output_text(), "Della");
    assert_eq!(response.usage.cached_tokens(), 1024);
    assert!(response.usage.cache_hit_ratio() > 85.0);
}

#[test]
fn test_claude_stream_usage_from_start_and_delta() {
    let lines = [
        json!({"type": "message_start", "message": {"id": "msg_1", "model": "claude-sonnet-4-20250514",
            "usage": {"input_tokens": 25, "cache_read_input_tokens": 10}}}),
        json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        json!({"type": "ping"}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": "Ahoy"}}),
        json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": " matey"}}),
        json!({"type": "message_delta", "delta": {"stop_reason": "end_turn"}, "usage": {"output_tokens": 4}}),
        json!({"type": "message_stop"}),
    ];

    let mut accumulator = ClaudeStreamAccumulator::default();
    for line in lines {
        let event: ClaudeStreamEvent = serde_json::from_value(line).unwrap();
        accumulator.push(event).unwrap();
    }

    assert!(accumulator.finished);
    assert_eq!(accumulator.text, "Ahoy matey");
    assert_eq!(accumulator.usage.input_tokens, 25);
    assert_eq!(accumulator.usage.cache_read_input_tokens, 10);
    assert_eq!(accumulator.usage.output_tokens, 4);
}

#[test]
fn test_context_chat_request_shape() {
    let request = ContextChatRequest {
        model: "ep-20250101-abc".to_string(),
        context_id: "ctx-1".to_string(),
        messages: vec![ChatMessage::user("What is this article about?")],
        max_tokens: None,
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["context_id"], "ctx-1");
    assert!(value.get("max_tokens").is_none());
}

#[test]
fn test_kling_wire_shapes() {
    let request = MultiElementsRequest {
        model_name: "kling-v1-6".to_string(),
        session_id: "s-1".to_string(),
        edit_mode: EditMode::Addition,
        prompt: "基于<<<video_1>>>中的原始内容".to_string(),
        image_list: Some(vec![ImageRef {
            image: "https://example.com/cat.jpg".to_string(),
        }]),
        negative_prompt: None,
        mode: "std".to_string(),
        duration: "5".to_string(),
    };
    let value = serde_json::to_value(&request).unwrap();
    assert_eq!(value["edit_mode"], "addition");
    assert_eq!(value["image_list"][0]["image"], "https://example.com/cat.jpg");
    assert!(value.get("negative_prompt").is_none());

    let face = FaceData {
        face_id: "0".to_string(),
        start_time: 1000,
        end_time: 3500,
    };
    let lip_sync = LipSyncRequest {
        session_id: "s-2".to_string(),
        face_choose: vec![FaceChoose::for_face(&face, "https://example.com/a.mp3")],
    };
    let value = serde_json::to_value(&lip_sync).unwrap();
    assert_eq!(value["face_choose"][0]["sound_end_time"], 2500);
    assert_eq!(value["face_choose"][0]["sound_insert_time"], 1000);
    assert!(value["face_choose"][0].get("audio_id").is_none());
}

#[test]
fn test_kling_tts_response() {
    let response: KlingResponse<KlingTaskData> = serde_json::from_value(json!({
        "code": 0,
        "message": "SUCCEED",
        "request_id": "req-1",
        "data": {
            "task_id": "t-1",
            "task_status": "succeed",
            "task_result": {"audios": [{"id": "a-1", "url": "https://cdn.example.com/a.mp3", "duration": "3.2"}]}
        }
    }))
    .unwrap();
    let data = response.data.unwrap();
    assert_eq!(data.task_result.audios[0].url.as_deref(), Some("https://cdn.example.com/a.mp3"));
    assert!(data.task_result.videos.is_empty());
}

#[test]
fn test_unified_task_flat_multi_image() {
    let task = UnifiedTask::from_value(&json!({
        "task_id": "t-3",
        "status": "SUCCESS",
        "metadata": {"url": "https://cdn.example.com/multi.mp4"}
    }))
    .unwrap();
    assert_eq!(task.video().and_then(|v| v.url).as_deref(), Some("https://cdn.example.com/multi.mp4"));
    assert_eq!(task.progress(), "0%");
}
