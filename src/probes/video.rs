//! Video generation probe
//!
//! Submits `/v1/video/generations` tasks and polls the gateway's unified task
//! view until each finishes.

use crate::models::media::{TaskSubmitResponse, UnifiedTask, VideoSubmitRequest};
use crate::probes::{report_error, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::services::poller::{classify_value, poll_task, PollConfig, PollOutcome};
use crate::utils::console::{self, SuiteReport};
use anyhow::Result;
use async_trait::async_trait;
use clap::Args;
use serde_json::Value;
use std::time::Duration;
use tracing::info;

const VIDEO_PATH: &str = "/v1/video/generations";

/// Seedance video models
pub const DEFAULT_VIDEO_MODELS: [&str; 5] = [
    "seedance-1-5-pro-251215",
    "seedance-1-0-pro-fast-251015",
    "seedance-1-0-pro-250528",
    "seedance-1-0-lite-i2v-250428",
    "seedance-1-0-lite-t2v-250428",
];

const DEFAULT_PROMPT: &str = "一只可爱的小猫在花园里玩耍，阳光明媚，色彩鲜艳，电影级画质。";
const DEFAULT_REFERENCE_IMAGE: &str =
    "https://www.google.com/images/branding/googlelogo/2x/googlelogo_color_272x92dp.png";

/// Video generation submit and poll
#[derive(Debug, Clone, Args)]
pub struct VideoProbe {
    /// Model to test (repeatable)
    #[arg(long = "model", num_args = 1.., default_values_t = DEFAULT_VIDEO_MODELS.map(String::from))]
    pub models: Vec<String>,

    /// Generation prompt
    #[arg(long, default_value = DEFAULT_PROMPT)]
    pub prompt: String,

    /// Reference image sent to image-to-video (`i2v`) models
    #[arg(long, default_value = DEFAULT_REFERENCE_IMAGE)]
    pub image: String,

    /// Output size, e.g. 1024x1024 for sora-2
    #[arg(long)]
    pub size: Option<String>,

    /// Only submit, do not poll
    #[arg(long)]
    pub no_poll: bool,

    /// Poll attempts per task
    #[arg(long, default_value_t = 30)]
    pub attempts: u32,

    /// Seconds between polls
    #[arg(long, default_value_t = 10)]
    pub interval: u64,

    /// Seconds to wait between models
    #[arg(long, default_value_t = 5)]
    pub pause: u64,
}

impl VideoProbe {
    /// Submit body for `model`; image-to-video models get the reference image
    pub fn request(&self, model: &str) -> VideoSubmitRequest {
        VideoSubmitRequest {
            model: model.to_string(),
            prompt: self.prompt.clone(),
            images: model.contains("i2v").then(|| vec![self.image.clone()]),
            size: self.size.clone(),
        }
    }

    fn poll_config(&self) -> PollConfig {
        PollConfig::new(Duration::from_secs(self.interval), self.attempts).sleep_first()
    }

    async fn test_model(&self, client: &GatewayClient, model: &str) -> bool {
        console::section(&format!("Model: {}", model));

        let request = self.request(model);
        if request.images.is_some() {
            console::info("Image-to-video model, reference image added");
        }

        console::info("Submitting task...");
        let submitted = match client.post_json::<_, TaskSubmitResponse>(VIDEO_PATH, &request).await {
            Ok(submitted) => submitted,
            Err(e) => {
                report_error("Submit", &e);
                return false;
            }
        };
        let Some(task_id) = submitted.task_id() else {
            console::fail(&format!("No task_id in submit response: {:?}", submitted));
            return false;
        };
        console::success(&format!("Task submitted, Task ID: {}", task_id));
        info!(model, task_id = %task_id, "Video task submitted");

        if self.no_poll {
            return true;
        }

        let config = self.poll_config();
        console::info(&format!("Polling task status (max attempts: {})...", config.max_attempts));
        let fetch_path = format!("{}/{}", VIDEO_PATH, task_id);
        let outcome = poll_task(|| client.get_json::<Value>(&fetch_path), classify_value, &config).await;
        report_outcome(outcome, &config)
    }
}

fn report_outcome(outcome: PollOutcome<UnifiedTask>, config: &PollConfig) -> bool {
    match outcome {
        PollOutcome::Succeeded(task) => {
            console::success("Task succeeded!");
            match task.video().and_then(|video| video.url) {
                Some(url) => console::field("Video URL", url),
                None => console::warn("Task succeeded without a video URL"),
            }
            true
        }
        PollOutcome::Failed(reason) => {
            console::fail(&format!("Task failed: {}", reason));
            false
        }
        PollOutcome::TimedOut { attempts } => {
            console::fail(&format!(
                "Timed out: task did not finish within {} seconds",
                attempts as u64 * config.interval.as_secs()
            ));
            false
        }
    }
}

#[async_trait]
impl Probe for VideoProbe {
    fn name(&self) -> &str {
        "video"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let client = ctx.gateway_client()?;

        console::header("Video Generation Test");
        console::field("Base URL", client.base_url());
        console::field("Models", self.models.join(", "));

        let mut report = SuiteReport::new();
        for (i, model) in self.models.iter().enumerate() {
            if i > 0 && self.pause > 0 {
                console::info(&format!("Waiting {} seconds before the next model...", self.pause));
                tokio::time::sleep(Duration::from_secs(self.pause)).await;
            }
            let passed = self.test_model(&client, model).await;
            report.check(model.as_str(), passed);
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
        probe: VideoProbe,
    }

    #[test]
    fn test_defaults() {
        let probe = Harness::parse_from(["video"]).probe;
        assert_eq!(probe.models.len(), 5);
        assert_eq!((probe.attempts, probe.interval, probe.pause), (30, 10, 5));
        assert!(probe.poll_config().initial_delay);
    }

    #[test]
    fn test_i2v_models_get_reference_image() {
        let probe = Harness::parse_from(["video", "--model", "sora-2", "--size", "1024x1024"]).probe;
        assert_eq!(probe.models, vec!["sora-2".to_string()]);

        let t2v = probe.request("seedance-1-0-lite-t2v-250428");
        assert!(t2v.images.is_none());
        assert_eq!(t2v.size.as_deref(), Some("1024x1024"));

        let i2v = probe.request("seedance-1-0-lite-i2v-250428");
        assert_eq!(i2v.images, Some(vec![DEFAULT_REFERENCE_IMAGE.to_string()]));
    }
}
