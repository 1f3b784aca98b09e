//! Media generation models
//!
//! Video submit/fetch through the gateway task system, OpenAI-style image
//! generation, Gemini `generateContent`, and the Kling endpoints

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Gateway video tasks
// ---------------------------------------------------------------------------

/// `/v1/video/generations` submit request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSubmitRequest {
    pub model: String,
    pub prompt: String,
    /// Reference images for image-to-video models
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// Task submit response
///
/// The gateway answers with `task_id`, Kling routes with `id` or `data.task_id`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TaskSubmitResponse {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub data: Option<Value>,
}

impl TaskSubmitResponse {
    pub fn task_id(&self) -> Option<String> {
        self.task_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| self.id.clone().filter(|id| !id.is_empty()))
            .or_else(|| {
                self.data
                    .as_ref()
                    .and_then(|d| d.get("task_id"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
    }
}

/// Unified task view: `data` of the gateway envelope `{code, data: {...}}`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UnifiedTask {
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub progress: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub fail_reason: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Raw provider payload
    #[serde(default)]
    pub data: Option<Value>,
}

impl UnifiedTask {
    /// Locate the task object in a fetch response
    ///
    /// Accepts `{code, data: {status, ...}}`, `{data: {status, ...}}`, or a bare
    /// task object with a top-level `status`.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match value.get("data") {
            Some(inner) if inner.is_object() && inner.get("status").is_some() => {
                serde_json::from_value(inner.clone())
            }
            _ => serde_json::from_value(value.clone()),
        }
    }

    /// Progress string, defaulting to `0%`
    pub fn progress(&self) -> &str {
        self.progress.as_deref().unwrap_or("0%")
    }

    /// Failure reason if the gateway reported one
    pub fn failure_reason(&self) -> String {
        self.fail_reason
            .clone()
            .or_else(|| self.reason.clone())
            .unwrap_or_else(|| "unknown reason".to_string())
    }

    /// Provider payload parsed as a Kling response
    pub fn kling(&self) -> Option<KlingResponse<KlingTaskData>> {
        self.data
            .as_ref()
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }

    /// First generated video, looking at the gateway fields then the Kling payload
    pub fn video(&self) -> Option<KlingVideo> {
        let direct = self
            .url
            .clone()
            .or_else(|| self.video_url.clone())
            .or_else(|| {
                self.metadata
                    .as_ref()
                    .and_then(|m| m.get("url"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .filter(|u| !u.is_empty());

        if let Some(url) = direct {
            return Some(KlingVideo {
                url: Some(url),
                ..Default::default()
            });
        }

        self.kling()
            .filter(|k| k.code == 0)
            .and_then(|k| k.data)
            .and_then(|d| d.task_result.videos.into_iter().next())
    }
}

// ---------------------------------------------------------------------------
// Image generation
// ---------------------------------------------------------------------------

/// `/v1/images/generations` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageGenerationRequest {
    pub model: String,
    pub prompt: String,
    pub size: String,
    pub n: u32,
    /// `-1` asks for a random seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
}

/// Image generation response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageGenerationResponse {
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub data: Vec<ImageData>,
}

impl ImageGenerationResponse {
    /// Image URLs with escaped ampersands restored
    pub fn urls(&self) -> Vec<String> {
        self.data
            .iter()
            .filter_map(|d| d.url.as_deref())
            .map(unescape_url)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ImageData {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub b64_json: Option<String>,
}

/// Restore `&` that upstreams return JSON-escaped as a literal `&`
pub fn unescape_url(url: &str) -> String {
    url.replace("\\u0026", "&")
}

// ---------------------------------------------------------------------------
// Gemini
// ---------------------------------------------------------------------------

/// `generateContent` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
}

impl GenerateContentRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: Some(prompt.into()),
                    inline_data: None,
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<GeminiInlineData>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiInlineData {
    #[serde(default)]
    pub mime_type: String,
    /// Base64 payload
    #[serde(default)]
    pub data: String,
}

/// `generateContent` response
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiCandidate {
    pub content: GeminiContent,
}

impl GenerateContentResponse {
    /// Returned text parts and inline images as (mime type, base64 length)
    pub fn summarize(&self) -> (Vec<String>, Vec<(String, usize)>) {
        let mut texts = Vec::new();
        let mut images = Vec::new();
        for part in self.candidates.iter().flat_map(|c| c.content.parts.iter()) {
            if let Some(text) = &part.text {
                texts.push(text.clone());
            }
            if let Some(inline) = &part.inline_data {
                images.push((inline.mime_type.clone(), inline.data.len()));
            }
        }
        (texts, images)
    }
}

// ---------------------------------------------------------------------------
// Kling
// ---------------------------------------------------------------------------

/// Kling native response wrapper (`code` 0 means success)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlingResponse<T> {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: Option<String>,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
}

/// Kling task data
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KlingTaskData {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub task_status: String,
    #[serde(default)]
    pub task_status_msg: Option<String>,
    #[serde(default)]
    pub task_result: KlingTaskResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KlingTaskResult {
    #[serde(default)]
    pub videos: Vec<KlingVideo>,
    #[serde(default)]
    pub audios: Vec<KlingAudio>,
}

/// Generated video
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KlingVideo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Seconds; Kling sends it as a string
    #[serde(default)]
    pub duration: Option<Value>,
}

/// Generated audio
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct KlingAudio {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub duration: Option<Value>,
}

/// Render a loosely typed duration for display
pub fn display_duration(duration: &Option<Value>) -> String {
    match duration {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => "?".to_string(),
    }
}

/// `text2video` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Text2VideoRequest {
    pub model: String,
    pub prompt: String,
    /// `std` or `pro`
    pub mode: String,
    /// Seconds as a string (`"5"` / `"10"`)
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
}

/// `image2video` request, with optional tail frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image2VideoRequest {
    pub model: String,
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_tail: Option<String>,
    pub prompt: String,
    pub duration: String,
    pub aspect_ratio: String,
    pub mode: String,
}

/// Image reference in list payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageRef {
    pub image: String,
}

/// `multi-image2video` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiImage2VideoRequest {
    pub model: String,
    pub prompt: String,
    pub image_list: Vec<ImageRef>,
    pub mode: String,
    pub duration: String,
    pub aspect_ratio: String,
}

/// `motion-control` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MotionControlRequest {
    pub model: String,
    pub mode: String,
    pub prompt: String,
    /// Character image
    pub image_url: String,
    /// Motion reference video
    pub video_url: String,
    /// `image` or `video`
    pub character_orientation: String,
}

/// `video-extend` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoExtendRequest {
    pub video_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    /// Prompt adherence in [0, 1]
    pub cfg_scale: f32,
}

/// Video source: Kling video ID or URL (exactly one is sent)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum VideoSource {
    VideoId(String),
    VideoUrl(String),
}

/// `identify-face` and `multi-elements/init-selection` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSourceRequest {
    #[serde(flatten)]
    pub source: VideoSource,
}

/// `identify-face` result
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentifyFaceData {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub face_data: Vec<FaceData>,
}

/// Detected face with its time span in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FaceData {
    #[serde(default)]
    pub face_id: String,
    #[serde(default)]
    pub start_time: i64,
    #[serde(default)]
    pub end_time: i64,
}

/// `advanced-lip-sync` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LipSyncRequest {
    pub session_id: String,
    pub face_choose: Vec<FaceChoose>,
}

/// Face/audio pairing for lip sync (times in milliseconds)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceChoose {
    pub face_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_file: Option<String>,
    pub sound_start_time: i64,
    pub sound_end_time: i64,
    pub sound_insert_time: i64,
    pub sound_volume: f32,
    pub original_audio_volume: f32,
}

impl FaceChoose {
    /// Pair an audio URL with a detected face, clipping audio to at most 5 s of face time
    pub fn for_face(face: &FaceData, audio_url: &str) -> Self {
        let available = (face.end_time - face.start_time).max(0);
        Self {
            face_id: face.face_id.clone(),
            audio_id: None,
            sound_file: Some(audio_url.to_string()),
            sound_start_time: 0,
            sound_end_time: available.min(5000),
            sound_insert_time: face.start_time,
            sound_volume: 1.0,
            original_audio_volume: 0.5,
        }
    }
}

/// Normalized selection point, [0,0] is top-left
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

/// `init-selection` result (`status` 0 means accepted)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InitSelectionData {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub fps: Option<f64>,
    #[serde(default)]
    pub original_duration: Option<i64>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
    #[serde(default)]
    pub total_frame: Option<i64>,
    #[serde(default)]
    pub normalized_video: Option<String>,
}

/// `add-selection` / `delete-selection` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    pub session_id: String,
    pub frame_index: u32,
    pub points: Vec<Point>,
}

/// `add-selection` result
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectionData {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub res: SelectionResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SelectionResult {
    #[serde(default)]
    pub frame_index: Option<u32>,
    #[serde(default)]
    pub rle_mask_list: Vec<Value>,
}

/// Session-only request (`preview-selection`, `clear-selection`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub session_id: String,
}

/// `preview-selection` result
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreviewSelectionData {
    #[serde(default)]
    pub res: PreviewResult,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PreviewResult {
    #[serde(default)]
    pub video: Option<String>,
    #[serde(default)]
    pub video_cover: Option<String>,
}

/// Multi-elements edit mode
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    Addition,
    Swap,
    Removal,
}

impl EditMode {
    /// Number of reference images the mode accepts (min, max)
    pub fn image_bounds(self) -> (usize, usize) {
        match self {
            EditMode::Addition => (1, 2),
            EditMode::Swap => (1, 1),
            EditMode::Removal => (0, 0),
        }
    }
}

/// `multi-elements` create task request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiElementsRequest {
    pub model_name: String,
    pub session_id: String,
    pub edit_mode: EditMode,
    /// Uses `<<<video_1>>>` / `<<<image_1>>>` placeholders
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_list: Option<Vec<ImageRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    pub mode: String,
    pub duration: String,
}

impl MultiElementsRequest {
    /// Check the image list against the edit mode
    pub fn validate(&self) -> Result<(), String> {
        let count = self.image_list.as_ref().map(Vec::len).unwrap_or(0);
        let (min, max) = self.edit_mode.image_bounds();
        if count < min || count > max {
            return Err(format!(
                "{:?} mode takes {}-{} reference images, got {}",
                self.edit_mode, min, max, count
            ));
        }
        if self.prompt.chars().count() > 2500 {
            return Err("prompt exceeds 2500 characters".to_string());
        }
        Ok(())
    }
}

/// Maximum TTS text length in characters
pub const TTS_MAX_CHARS: usize = 1000;

/// `/kling/v1/audio/tts` request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsRequest {
    pub text: String,
    pub voice_id: String,
    /// In [0.8, 2.0]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_speed: Option<f32>,
    /// `zh` or `en`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_language: Option<String>,
}

impl TtsRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.text.trim().is_empty() {
            return Err("text is required".to_string());
        }
        if self.text.chars().count() > TTS_MAX_CHARS {
            return Err(format!("text exceeds {} characters", TTS_MAX_CHARS));
        }
        if self.voice_id.is_empty() {
            return Err("voice_id is required".to_string());
        }
        if let Some(speed) = self.voice_speed {
            if !(0.8..=2.0).contains(&speed) {
                return Err(format!("voice_speed {} outside [0.8, 2.0]", speed));
            }
        }
        if let Some(lang) = &self.voice_language {
            if lang != "zh" && lang != "en" {
                return Err(format!("voice_language '{}' must be zh or en", lang));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_submit_task_id_variants() {
        let gateway: TaskSubmitResponse = serde_json::from_value(json!({"task_id": "t1"})).unwrap();
        assert_eq!(gateway.task_id().as_deref(), Some("t1"));

        let kling: TaskSubmitResponse = serde_json::from_value(json!({"id": "k1"})).unwrap();
        assert_eq!(kling.task_id().as_deref(), Some("k1"));

        let nested: TaskSubmitResponse =
            serde_json::from_value(json!({"code": 0, "data": {"task_id": "n1"}})).unwrap();
        assert_eq!(nested.task_id().as_deref(), Some("n1"));

        let empty: TaskSubmitResponse = serde_json::from_value(json!({"error": "x"})).unwrap();
        assert!(empty.task_id().is_none());
    }

    #[test]
    fn test_unified_task_kling_video() {
        let value = json!({
            "code": "success",
            "data": {
                "status": "SUCCESS",
                "progress": "100%",
                "data": {
                    "code": 0,
                    "data": {
                        "task_id": "k1",
                        "task_status": "succeed",
                        "task_result": {"videos": [{"id": "v1", "url": "https://cdn/v.mp4", "duration": "5.1"}]}
                    }
                }
            }
        });
        let task = UnifiedTask::from_value(&value).unwrap();
        assert_eq!(task.status, "SUCCESS");
        assert_eq!(task.progress(), "100%");
        let video = task.video().unwrap();
        assert_eq!(video.id.as_deref(), Some("v1"));
        assert_eq!(display_duration(&video.duration), "5.1");
    }

    #[test]
    fn test_unified_task_bare_object() {
        let task = UnifiedTask::from_value(&json!({"status": "SUCCESS", "metadata": {"url": "https://m"}})).unwrap();
        assert_eq!(task.video().and_then(|v| v.url).as_deref(), Some("https://m"));

        let failed = UnifiedTask::from_value(&json!({"data": {"status": "failure", "fail_reason": "nsfw"}})).unwrap();
        assert_eq!(failed.failure_reason(), "nsfw");
        assert_eq!(failed.progress(), "0%");
    }

    #[test]
    fn test_image_urls_unescaped() {
        let response: ImageGenerationResponse = serde_json::from_value(json!({
            "data": [{"url": "https://img?a=1\\u0026b=2"}]
        }))
        .unwrap();
        assert_eq!(response.urls(), vec!["https://img?a=1&b=2".to_string()]);
    }

    #[test]
    fn test_video_source_flatten() {
        let request = VideoSourceRequest {
            source: VideoSource::VideoUrl("https://v.mp4".to_string()),
        };
        assert_eq!(serde_json::to_value(&request).unwrap(), json!({"video_url": "https://v.mp4"}));
    }

    #[test]
    fn test_face_choose_clips_audio() {
        let face = FaceData {
            face_id: "f1".to_string(),
            start_time: 1000,
            end_time: 4000,
        };
        let choose = FaceChoose::for_face(&face, "https://a.mp3");
        assert_eq!(choose.sound_end_time, 3000);
        assert_eq!(choose.sound_insert_time, 1000);
        let value = serde_json::to_value(&choose).unwrap();
        assert!(value.get("audio_id").is_none());
        assert_eq!(value["sound_file"], "https://a.mp3");
    }

    #[test]
    fn test_multi_elements_validation() {
        let mut request = MultiElementsRequest {
            model_name: "kling-v1-6".to_string(),
            session_id: "s".to_string(),
            edit_mode: EditMode::Removal,
            prompt: "remove".to_string(),
            image_list: None,
            negative_prompt: None,
            mode: "std".to_string(),
            duration: "5".to_string(),
        };
        assert!(request.validate().is_ok());

        request.edit_mode = EditMode::Swap;
        assert!(request.validate().is_err());

        request.image_list = Some(vec![ImageRef { image: "i".to_string() }]);
        assert!(request.validate().is_ok());
        assert_eq!(serde_json::to_value(&request).unwrap()["edit_mode"], "swap");
    }

    #[test]
    fn test_tts_validation() {
        let mut request = TtsRequest {
            text: "你好".to_string(),
            voice_id: "genshin_vindi2".to_string(),
            voice_speed: Some(1.5),
            voice_language: Some("zh".to_string()),
        };
        assert!(request.validate().is_ok());

        request.voice_speed = Some(3.0);
        assert!(request.validate().is_err());

        request.voice_speed = None;
        request.voice_language = Some("fr".to_string());
        assert!(request.validate().is_err());

        request.voice_language = None;
        request.text = "字".repeat(TTS_MAX_CHARS + 1);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_gemini_summary() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "Here is your banana"},
                {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
            ]}}]
        }))
        .unwrap();
        let (texts, images) = response.summarize();
        assert_eq!(texts, vec!["Here is your banana".to_string()]);
        assert_eq!(images, vec![("image/png".to_string(), 8)]);
    }
}
