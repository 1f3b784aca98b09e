//! Kling probe
//!
//! Drives the gateway's `/kling/v1/...` routes. Video routes are asynchronous:
//! submit, then poll `{route}/{task_id}` through the unified task view. Face
//! identification, selection sessions and text-to-speech answer synchronously
//! in the Kling `{code, message, data}` envelope.

use crate::models::media::{
    display_duration, EditMode, FaceChoose, IdentifyFaceData, Image2VideoRequest, ImageRef, InitSelectionData,
    KlingResponse, KlingTaskData, KlingVideo, LipSyncRequest, MotionControlRequest, MultiElementsRequest,
    MultiImage2VideoRequest, Point, PreviewSelectionData, SelectionData, SelectionRequest, SessionRequest,
    TaskSubmitResponse, Text2VideoRequest, TtsRequest, UnifiedTask, VideoExtendRequest, VideoSource,
    VideoSourceRequest,
};
use crate::probes::{preview, report_error, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::services::poller::{classify_value, poll_task, PollConfig, PollOutcome};
use crate::utils::console::{self, SuiteReport};
use crate::utils::error::helpers::{business_error, invalid_input, missing_field};
use crate::utils::error::ProbeResult;
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, Subcommand};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const VIDEOS_PATH: &str = "/kling/v1/videos";
const TTS_PATH: &str = "/kling/v1/audio/tts";

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const CHARACTER_IMAGE: &str = "https://p2-kling.klingai.com/bs2/upload-ylab-stunt/special-effect/output/HB1_PROD_ai_web_299690834263822_-4012665849171309178/-7957711300647229468/tempwyvwb.png?x-kcdn-pid=112452&x-oss-process=image%2Fresize%2Cw_1440%2Ch_1851%2Cm_mfit%2Fformat%2Cwebp";
const TEST_VIDEO_URL: &str = "https://example.com/test_video.mp4";
const TEST_AUDIO_URL: &str = "https://example.com/test_audio.mp3";
const TEST_IMAGE_URL: &str = "https://example.com/test_image.jpg";

const TEXT2VIDEO_PROMPT: &str = "A cute cat running in the garden, cinematic style.";
const MOTION_PROMPT: &str = "The character follows the movement of the reference video.";
const IMAGE_TAIL_PROMPT: &str = "The characters in the images are dancing together in a futuristic city.";
const MULTI_IMAGE_PROMPT: &str = "The two characters in the images are dancing together in a futuristic city.";
const EXTEND_BASE_PROMPT: &str =
    "A beautiful sunset over the ocean, waves gently rolling onto the beach, cinematic style.";
const EXTEND_PROMPT: &str = "继续展现日落的美景，镜头缓缓拉远，天空逐渐变暗";
const EXTEND_EXISTING_PROMPT: &str = "继续展现场景，保持画面风格一致";
const EXTEND_NEGATIVE: &str = "模糊, 抖动, 画面跳跃";

const TTS_VOICE: &str = "genshin_vindi2";

/// Kling native routes through the gateway
#[derive(Debug, Clone, Args)]
pub struct KlingProbe {
    /// Poll attempts per task
    #[arg(long, default_value_t = 60)]
    pub attempts: u32,

    /// Seconds between polls
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    #[command(subcommand)]
    pub command: KlingCommand,
}

/// Kling scenario
#[derive(Debug, Clone, Subcommand)]
pub enum KlingCommand {
    /// Text to video, optionally chained into motion control
    Text2video(Text2VideoArgs),
    /// Image to video with first and last frame
    ImageTail(ImageTailArgs),
    /// Video from several reference images
    MultiImage(MultiImageArgs),
    /// Extend an existing video (generates a base video when no ID is given)
    Extend(ExtendArgs),
    /// Identify faces, then lip sync audio onto the first one
    LipSync(LipSyncArgs),
    /// Multi-elements video editing session
    MultiElements(MultiElementsArgs),
    /// Synchronous text to speech
    Tts(TtsArgs),
}

#[derive(Debug, Clone, Args)]
pub struct Text2VideoArgs {
    #[arg(long, default_value = "kling-v2-6")]
    pub model: String,

    #[arg(long, default_value = TEXT2VIDEO_PROMPT)]
    pub prompt: String,

    /// `std` or `pro`
    #[arg(long, default_value = "pro")]
    pub mode: String,

    #[arg(long, default_value = "5")]
    pub duration: String,

    /// Feed the generated video into motion control
    #[arg(long)]
    pub motion: bool,

    /// Character image for motion control
    #[arg(long, default_value = CHARACTER_IMAGE)]
    pub character_image: String,
}

#[derive(Debug, Clone, Args)]
pub struct ImageTailArgs {
    #[arg(long, default_value = "kling-v2-6")]
    pub model: String,

    /// First frame
    #[arg(long, default_value = CHARACTER_IMAGE)]
    pub image: String,

    /// Last frame [default: same as --image]
    #[arg(long)]
    pub image_tail: Option<String>,

    #[arg(long, default_value = IMAGE_TAIL_PROMPT)]
    pub prompt: String,
}

#[derive(Debug, Clone, Args)]
pub struct MultiImageArgs {
    #[arg(long, default_value = "kling-v1-6")]
    pub model: String,

    /// Reference image (repeatable) [default: the character image twice]
    #[arg(long = "image")]
    pub images: Vec<String>,

    #[arg(long, default_value = MULTI_IMAGE_PROMPT)]
    pub prompt: String,
}

#[derive(Debug, Clone, Args)]
pub struct ExtendArgs {
    /// Extend this video instead of generating a base video
    #[arg(long)]
    pub video_id: Option<String>,

    #[arg(long, default_value = "kling-v1-6")]
    pub base_model: String,

    /// Prompt adherence in [0, 1]
    #[arg(long, default_value_t = 0.5)]
    pub cfg_scale: f32,
}

#[derive(Debug, Clone, Args)]
pub struct LipSyncArgs {
    #[arg(long, default_value = TEST_VIDEO_URL, conflicts_with = "video_id")]
    pub video_url: String,

    /// Kling video ID instead of a URL
    #[arg(long)]
    pub video_id: Option<String>,

    #[arg(long, default_value = TEST_AUDIO_URL)]
    pub audio_url: String,
}

#[derive(Debug, Clone, Args)]
pub struct MultiElementsArgs {
    #[arg(long, value_enum, default_value_t = EditMode::Addition)]
    pub edit_mode: EditMode,

    #[arg(long, default_value = TEST_VIDEO_URL, conflicts_with = "video_id")]
    pub video_url: String,

    /// Kling video ID instead of a URL
    #[arg(long)]
    pub video_id: Option<String>,

    /// Reference image for addition and swap
    #[arg(long, default_value = TEST_IMAGE_URL)]
    pub image: String,

    /// Frame to mark for swap and removal
    #[arg(long, default_value_t = 0)]
    pub frame: u32,
}

#[derive(Debug, Clone, Args)]
pub struct TtsArgs {
    #[arg(long, default_value = TTS_VOICE)]
    pub voice_id: String,

    /// Send invalid requests and expect rejections
    #[arg(long)]
    pub errors: bool,
}

fn video_source(video_id: &Option<String>, video_url: &str) -> VideoSource {
    match video_id {
        Some(id) => VideoSource::VideoId(id.clone()),
        None => VideoSource::VideoUrl(video_url.to_string()),
    }
}

/// Kling envelope `data`, failing on a non-zero business code
fn unwrap_kling<T>(response: KlingResponse<T>) -> ProbeResult<T> {
    if response.code != 0 {
        return Err(business_error(response.code, response.message));
    }
    response.data.ok_or_else(|| missing_field("data"))
}

async fn kling_call<B, T>(client: &GatewayClient, path: &str, body: &B) -> ProbeResult<T>
where
    B: Serialize + Sync,
    T: DeserializeOwned,
{
    let response: KlingResponse<T> = client.post_json(path, body).await?;
    if let Some(request_id) = &response.request_id {
        debug!(path, request_id = %request_id, "Kling response");
    }
    unwrap_kling(response)
}

/// Video with an ID when the provider payload has one
fn task_video(task: &UnifiedTask) -> Option<KlingVideo> {
    task.kling()
        .filter(|k| k.code == 0)
        .and_then(|k| k.data)
        .and_then(|d| d.task_result.videos.into_iter().next())
        .or_else(|| task.video())
}

fn print_video(video: &KlingVideo) {
    if let Some(id) = &video.id {
        console::field("Video ID", id);
    }
    if let Some(url) = &video.url {
        console::field("Video URL", url);
    }
    if video.duration.is_some() {
        console::field("Duration", format!("{} s", display_duration(&video.duration)));
    }
}

struct Session {
    client: GatewayClient,
    poll: PollConfig,
}

impl Session {
    /// Submit a video task on `route` and poll it to a terminal state
    async fn video_task<B: Serialize + Sync>(&self, route: &str, body: &B) -> Option<KlingVideo> {
        let path = format!("{}/{}", VIDEOS_PATH, route);
        console::info(&format!("Submitting {}...", route));
        let submitted = match self.client.post_json::<_, TaskSubmitResponse>(&path, body).await {
            Ok(submitted) => submitted,
            Err(e) => {
                report_error(&format!("{} submit", route), &e);
                return None;
            }
        };
        let Some(task_id) = submitted.task_id() else {
            console::fail(&format!("No task ID in submit response: {:?}", submitted));
            return None;
        };
        console::success(&format!("Task submitted, Task ID: {}", task_id));
        info!(route, task_id = %task_id, "Kling task submitted");

        console::info(&format!("Polling task status (max attempts: {})...", self.poll.max_attempts));
        let fetch_path = format!("{}/{}", path, task_id);
        let outcome = poll_task(|| self.client.get_json::<Value>(&fetch_path), classify_value, &self.poll).await;
        match outcome {
            PollOutcome::Succeeded(task) => {
                console::success("Task succeeded!");
                match task_video(&task) {
                    Some(video) => {
                        print_video(&video);
                        Some(video)
                    }
                    None => {
                        console::fail("Task succeeded without a video");
                        None
                    }
                }
            }
            PollOutcome::Failed(reason) => {
                console::fail(&format!("Task failed: {}", reason));
                None
            }
            PollOutcome::TimedOut { attempts } => {
                console::fail(&format!(
                    "Timed out: task did not finish within {} seconds",
                    attempts as u64 * self.poll.interval.as_secs()
                ));
                None
            }
        }
    }

    async fn text2video(&self, args: &Text2VideoArgs, report: &mut SuiteReport) {
        console::section("Text to Video");
        let request = Text2VideoRequest {
            model: args.model.clone(),
            prompt: args.prompt.clone(),
            mode: args.mode.clone(),
            duration: args.duration.clone(),
            negative_prompt: None,
            aspect_ratio: None,
        };
        let video = self.video_task("text2video", &request).await;
        report.check("text2video", video.is_some());

        if !args.motion {
            return;
        }
        console::section("Motion Control");
        let Some(video_url) = video.and_then(|v| v.url) else {
            report.skip("motion-control (no source video)");
            return;
        };
        let request = MotionControlRequest {
            model: args.model.clone(),
            mode: "std".to_string(),
            prompt: MOTION_PROMPT.to_string(),
            image_url: args.character_image.clone(),
            video_url,
            character_orientation: "image".to_string(),
        };
        let passed = self.video_task("motion-control", &request).await.is_some();
        report.check("motion-control", passed);
    }

    async fn image_tail(&self, args: &ImageTailArgs, report: &mut SuiteReport) {
        console::section("Image to Video (first and last frame)");
        let request = Image2VideoRequest {
            model: args.model.clone(),
            image: args.image.clone(),
            image_tail: Some(args.image_tail.clone().unwrap_or_else(|| args.image.clone())),
            prompt: args.prompt.clone(),
            duration: "5".to_string(),
            aspect_ratio: "16:9".to_string(),
            mode: "std".to_string(),
        };
        let passed = self.video_task("image2video", &request).await.is_some();
        report.check("image-tail", passed);
    }

    async fn multi_image(&self, args: &MultiImageArgs, report: &mut SuiteReport) {
        console::section("Multi-Image to Video");
        let images = if args.images.is_empty() {
            vec![CHARACTER_IMAGE.to_string(); 2]
        } else {
            args.images.clone()
        };
        let request = MultiImage2VideoRequest {
            model: args.model.clone(),
            prompt: args.prompt.clone(),
            image_list: images.into_iter().map(|image| ImageRef { image }).collect(),
            mode: "std".to_string(),
            duration: "5".to_string(),
            aspect_ratio: "16:9".to_string(),
        };
        console::field("Images", request.image_list.len());
        let passed = self.video_task("multi-image2video", &request).await.is_some();
        report.check("multi-image", passed);
    }

    async fn extend(&self, args: &ExtendArgs, report: &mut SuiteReport) {
        let (video_id, prompt) = match &args.video_id {
            Some(id) => (id.clone(), EXTEND_EXISTING_PROMPT),
            None => {
                console::section("Base Video");
                let request = Text2VideoRequest {
                    model: args.base_model.clone(),
                    prompt: EXTEND_BASE_PROMPT.to_string(),
                    mode: "std".to_string(),
                    duration: "5".to_string(),
                    negative_prompt: None,
                    aspect_ratio: None,
                };
                let video = self.video_task("text2video", &request).await;
                report.check("base video", video.is_some());
                match video.and_then(|v| v.id) {
                    Some(id) => (id, EXTEND_PROMPT),
                    None => {
                        console::warn("Base video carried no video ID, cannot extend");
                        report.skip("video-extend (no base video ID)");
                        return;
                    }
                }
            }
        };

        console::section("Video Extend");
        console::field("Video ID", &video_id);
        let request = VideoExtendRequest {
            video_id,
            prompt: Some(prompt.to_string()),
            negative_prompt: Some(EXTEND_NEGATIVE.to_string()),
            cfg_scale: args.cfg_scale,
        };
        let passed = self.video_task("video-extend", &request).await.is_some();
        report.check("video-extend", passed);
    }

    async fn lip_sync(&self, args: &LipSyncArgs, report: &mut SuiteReport) {
        console::section("Identify Face");
        let request = VideoSourceRequest {
            source: video_source(&args.video_id, &args.video_url),
        };
        let path = format!("{}/identify-face", VIDEOS_PATH);
        let identified: IdentifyFaceData = match kling_call(&self.client, &path, &request).await {
            Ok(data) => data,
            Err(e) => {
                report_error("identify-face", &e);
                report.check("identify-face", false);
                return;
            }
        };
        console::field("Session ID", &identified.session_id);
        console::field("Faces", identified.face_data.len());
        for face in &identified.face_data {
            console::info(&format!("face {}: {} ms - {} ms", face.face_id, face.start_time, face.end_time));
        }
        let Some(face) = identified.face_data.first() else {
            console::fail("No face detected in the video");
            report.check("identify-face", false);
            return;
        };
        report.check("identify-face", true);

        console::section("Advanced Lip Sync");
        let request = LipSyncRequest {
            session_id: identified.session_id.clone(),
            face_choose: vec![FaceChoose::for_face(face, &args.audio_url)],
        };
        let passed = self.video_task("advanced-lip-sync", &request).await.is_some();
        report.check("advanced-lip-sync", passed);
    }

    async fn multi_elements(&self, args: &MultiElementsArgs, report: &mut SuiteReport) {
        console::section("Init Selection");
        let request = VideoSourceRequest {
            source: video_source(&args.video_id, &args.video_url),
        };
        let path = format!("{}/multi-elements/init-selection", VIDEOS_PATH);
        let init = match kling_call::<_, InitSelectionData>(&self.client, &path, &request).await {
            Ok(data) if data.status == 0 => data,
            Ok(data) => {
                console::fail(&format!("Video rejected (status {})", data.status));
                report.check("init-selection", false);
                return;
            }
            Err(e) => {
                report_error("init-selection", &e);
                report.check("init-selection", false);
                return;
            }
        };
        console::field("Session ID", &init.session_id);
        if let (Some(width), Some(height)) = (init.width, init.height) {
            console::field("Resolution", format!("{}x{}", width, height));
        }
        if let Some(frames) = init.total_frame {
            console::field("Frames", frames);
        }
        report.check("init-selection", true);

        if args.edit_mode != EditMode::Addition {
            self.mark_selection(&init.session_id, args.frame, report).await;
        }

        console::section("Create Multi-Elements Task");
        let request = multi_elements_request(args, &init.session_id);
        if let Err(reason) = request.validate() {
            report_error("multi-elements", &invalid_input(reason));
            report.check("multi-elements", false);
            return;
        }
        console::field("Edit mode", format!("{:?}", request.edit_mode));
        console::field("Prompt", &request.prompt);
        let passed = self.video_task("multi-elements", &request).await.is_some();
        report.check("multi-elements", passed);
    }

    /// Mark the frame center and preview the selection
    async fn mark_selection(&self, session_id: &str, frame: u32, report: &mut SuiteReport) {
        console::section("Add Selection");
        let request = SelectionRequest {
            session_id: session_id.to_string(),
            frame_index: frame,
            points: vec![Point { x: 0.5, y: 0.5 }],
        };
        let path = format!("{}/multi-elements/add-selection", VIDEOS_PATH);
        match kling_call::<_, SelectionData>(&self.client, &path, &request).await {
            Ok(data) => {
                console::success(&format!("{} mask(s) on frame {}", data.res.rle_mask_list.len(), frame));
                report.check("add-selection", data.status == 0);
            }
            Err(e) => {
                report_error("add-selection", &e);
                report.check("add-selection", false);
                return;
            }
        }

        console::section("Preview Selection");
        let request = SessionRequest {
            session_id: session_id.to_string(),
        };
        let path = format!("{}/multi-elements/preview-selection", VIDEOS_PATH);
        match kling_call::<_, PreviewSelectionData>(&self.client, &path, &request).await {
            Ok(data) => {
                if let Some(video) = &data.res.video {
                    console::field("Preview", video);
                }
                report.check("preview-selection", true);
            }
            Err(e) => {
                report_error("preview-selection", &e);
                report.check("preview-selection", false);
            }
        }
    }

    async fn tts(&self, args: &TtsArgs, report: &mut SuiteReport) {
        if args.errors {
            self.tts_errors(report).await;
            return;
        }
        for (name, request) in tts_cases(&args.voice_id) {
            console::section(&format!("TTS: {}", name));
            console::field("Text", preview(&request.text, 60));
            if let Err(reason) = request.validate() {
                report_error(name, &invalid_input(reason));
                report.check(name, false);
                continue;
            }
            let passed = match kling_call::<_, KlingTaskData>(&self.client, TTS_PATH, &request).await {
                Ok(data) => match data.task_result.audios.first() {
                    Some(audio) => {
                        console::success("Synthesized");
                        if let Some(url) = &audio.url {
                            console::field("Audio URL", url);
                        }
                        console::field("Duration", format!("{} s", display_duration(&audio.duration)));
                        true
                    }
                    None => {
                        report_error(name, &missing_field("task_result.audios"));
                        false
                    }
                },
                Err(e) => {
                    report_error(name, &e);
                    false
                }
            };
            report.check(name, passed);
        }
    }

    /// Invalid payloads; each passes when the gateway rejects it
    async fn tts_errors(&self, report: &mut SuiteReport) {
        for (name, body) in tts_error_cases() {
            console::section(&format!("TTS error: {}", name));
            if let Ok(request) = serde_json::from_value::<TtsRequest>(body.clone()) {
                if let Err(reason) = request.validate() {
                    console::info(&format!("Local validation: {}", reason));
                }
            }
            let rejected = match self.client.post_raw(TTS_PATH, &body, &[]).await {
                Ok(raw) => {
                    let code = raw
                        .json::<Value>()
                        .ok()
                        .and_then(|v| v.get("code").and_then(Value::as_i64))
                        .unwrap_or(0);
                    console::field("Status", raw.status);
                    console::field("Body", preview(&raw.body, 200));
                    !raw.is_success() || code != 0
                }
                Err(e) => {
                    report_error(name, &e);
                    false
                }
            };
            if rejected {
                console::success("Rejected as expected");
            } else {
                console::fail("Invalid request was accepted");
            }
            report.check(name, rejected);
        }
    }
}

fn multi_elements_request(args: &MultiElementsArgs, session_id: &str) -> MultiElementsRequest {
    let (prompt, image_list, negative_prompt) = match args.edit_mode {
        EditMode::Addition => (
            "基于<<<video_1>>>中的原始内容，以自然生动的方式，将<<<image_1>>>中的猫咪，融入<<<video_1>>>的画面右侧",
            Some(vec![ImageRef {
                image: args.image.clone(),
            }]),
            Some("模糊, 变形".to_string()),
        ),
        EditMode::Swap => (
            "使用<<<image_1>>>中的新角色，替换<<<video_1>>>中标记的人物",
            Some(vec![ImageRef {
                image: args.image.clone(),
            }]),
            None,
        ),
        EditMode::Removal => ("删除<<<video_1>>>中标记的人物", None, None),
    };
    MultiElementsRequest {
        model_name: "kling-v1-6".to_string(),
        session_id: session_id.to_string(),
        edit_mode: args.edit_mode,
        prompt: prompt.to_string(),
        image_list,
        negative_prompt,
        mode: "std".to_string(),
        duration: "5".to_string(),
    }
}

fn tts_cases(voice_id: &str) -> Vec<(&'static str, TtsRequest)> {
    let case = |text: &str, speed: Option<f32>, language: Option<&str>| TtsRequest {
        text: text.to_string(),
        voice_id: voice_id.to_string(),
        voice_speed: speed,
        voice_language: language.map(str::to_string),
    };
    vec![
        ("basic", case("你好，欢迎使用可灵AI语音合成服务。", None, None)),
        (
            "fast speech",
            case("这是一段快速播放的测试语音，语速设置为1.5倍。", Some(1.5), Some("zh")),
        ),
        (
            "slow speech",
            case("这是一段慢速播放的测试语音，语速设置为0.8倍。", Some(0.8), Some("zh")),
        ),
        (
            "english",
            case("Hello, this is a test for English text-to-speech.", Some(1.0), Some("en")),
        ),
        (
            "long text",
            case(
                "人工智能语音合成技术是一种将文本转换为自然流畅语音的技术。\
                 随着深度学习的发展，语音合成的质量得到了显著提升，\
                 合成的语音在音色、韵律和情感表达方面越来越接近真人。\
                 这项技术被广泛应用于智能助手、有声读物、导航播报和无障碍服务等领域。",
                None,
                Some("zh"),
            ),
        ),
    ]
}

fn tts_error_cases() -> Vec<(&'static str, Value)> {
    vec![
        ("missing text", json!({"voice_id": TTS_VOICE})),
        ("missing voice", json!({"text": "测试文本"})),
        (
            "speed out of range",
            json!({"text": "测试文本", "voice_id": TTS_VOICE, "voice_speed": 3.0}),
        ),
        (
            "unsupported language",
            json!({"text": "测试文本", "voice_id": TTS_VOICE, "voice_language": "fr"}),
        ),
    ]
}

#[async_trait]
impl Probe for KlingProbe {
    fn name(&self) -> &str {
        "kling"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        ctx.settings.require_gateway_key()?;
        let mut client = GatewayClient::kling(&ctx.settings)?;
        if matches!(self.command, KlingCommand::Extend(_)) {
            client = client.with_user_agent(BROWSER_USER_AGENT)?;
        }

        console::header("Kling API Test");
        console::field("Base URL", client.base_url());

        let mut poll = PollConfig::new(Duration::from_secs(self.interval), self.attempts);
        // Extend and lip-sync tasks run for minutes; a failed status fetch is logged and retried
        if matches!(self.command, KlingCommand::Extend(_) | KlingCommand::LipSync(_)) {
            poll = poll.tolerate_errors();
        }
        let session = Session { client, poll };
        let mut report = SuiteReport::new();
        match &self.command {
            KlingCommand::Text2video(args) => session.text2video(args, &mut report).await,
            KlingCommand::ImageTail(args) => session.image_tail(args, &mut report).await,
            KlingCommand::MultiImage(args) => session.multi_image(args, &mut report).await,
            KlingCommand::Extend(args) => session.extend(args, &mut report).await,
            KlingCommand::LipSync(args) => session.lip_sync(args, &mut report).await,
            KlingCommand::MultiElements(args) => session.multi_elements(args, &mut report).await,
            KlingCommand::Tts(args) => session.tts(args, &mut report).await,
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        probe: KlingProbe,
    }

    #[test]
    fn test_poll_defaults_and_subcommand() {
        let probe = Harness::parse_from(["kling", "text2video", "--motion"]).probe;
        assert_eq!((probe.attempts, probe.interval), (60, 10));
        match probe.command {
            KlingCommand::Text2video(args) => {
                assert!(args.motion);
                assert_eq!(args.model, "kling-v2-6");
                assert_eq!(args.mode, "pro");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_lip_sync_source_selection() {
        let probe = Harness::parse_from(["kling", "lip-sync", "--video-id", "vid-1"]).probe;
        let KlingCommand::LipSync(args) = probe.command else {
            panic!("expected lip-sync");
        };
        assert_eq!(
            video_source(&args.video_id, &args.video_url),
            VideoSource::VideoId("vid-1".to_string())
        );
        assert_eq!(
            video_source(&None, TEST_VIDEO_URL),
            VideoSource::VideoUrl(TEST_VIDEO_URL.to_string())
        );
    }

    #[test]
    fn test_multi_elements_requests_validate() {
        for mode in ["addition", "swap", "removal"] {
            let probe = Harness::parse_from(["kling", "multi-elements", "--edit-mode", mode]).probe;
            let KlingCommand::MultiElements(args) = probe.command else {
                panic!("expected multi-elements");
            };
            let request = multi_elements_request(&args, "session-1");
            assert!(request.validate().is_ok(), "{} should validate", mode);
            assert!(request.prompt.contains("<<<video_1>>>"));
        }
    }

    #[test]
    fn test_tts_cases_are_valid_and_error_cases_are_not() {
        let cases = tts_cases(TTS_VOICE);
        assert_eq!(cases.len(), 5);
        assert!(cases.iter().all(|(_, request)| request.validate().is_ok()));

        for (name, body) in tts_error_cases() {
            let rejected = match serde_json::from_value::<TtsRequest>(body) {
                Ok(request) => request.validate().is_err(),
                Err(_) => true,
            };
            assert!(rejected, "{} should be invalid", name);
        }
    }

    #[test]
    fn test_unwrap_kling_business_error() {
        let response: KlingResponse<KlingTaskData> =
            serde_json::from_value(json!({"code": 1201, "message": "invalid voice"})).unwrap();
        let err = unwrap_kling(response).unwrap_err();
        assert!(err.to_string().contains("1201"));

        let response: KlingResponse<KlingTaskData> = serde_json::from_value(json!({"code": 0})).unwrap();
        assert!(unwrap_kling(response).is_err());
    }

    #[test]
    fn test_task_video_prefers_provider_payload() {
        let task = UnifiedTask::from_value(&json!({
            "status": "SUCCESS",
            "url": "https://cdn.example.com/v.mp4",
            "data": {"code": 0, "data": {"task_id": "t", "task_status": "succeed",
                "task_result": {"videos": [{"id": "vid-9", "url": "https://cdn.example.com/v.mp4", "duration": "5.1"}]}}}
        }))
        .unwrap();
        let video = task_video(&task).unwrap();
        assert_eq!(video.id.as_deref(), Some("vid-9"));

        let flat = UnifiedTask::from_value(&json!({"status": "SUCCESS", "metadata": {"url": "https://cdn.example.com/m.mp4"}}))
            .unwrap();
        assert_eq!(task_video(&flat).unwrap().url.as_deref(), Some("https://cdn.example.com/m.mp4"));
    }
}
