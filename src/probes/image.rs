//! Image generation probe
//!
//! Seedream text-to-image presets through `/v1/images/generations`, and a
//! Gemini `generateContent` image request.

use crate::models::media::{
    GenerateContentRequest, GenerateContentResponse, ImageGenerationRequest, ImageGenerationResponse,
};
use crate::probes::{preview, report_error, Probe, ProbeContext};
use crate::services::client::GatewayClient;
use crate::utils::console::{self, SuiteReport};
use anyhow::Result;
use async_trait::async_trait;
use clap::{Args, ValueEnum};
use tracing::debug;

const IMAGES_PATH: &str = "/v1/images/generations";

const DEFAULT_IMAGE_MODEL: &str = "doubao-seedream-4-0-250828";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash-image";
const GEMINI_PROMPT: &str = "Create a picture of a nano banana dish in a fancy restaurant with a Gemini theme";
const CAT_PROMPT: &str = "一只可爱的橘猫坐在窗台上，阳光洒在身上，温馨治愈风格";

/// Seedream 4.5 needs at least 3686400 pixels
const MODEL_COMPARISON: [(&str, &str); 2] = [("seedream-4-5-251128", "2048x2048"), ("seedream-4-0-250828", "1024x1024")];

/// Image request preset
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImagePreset {
    Basic,
    Advanced,
    Portrait,
    Landscape,
    Negative,
    Batch,
    /// Same prompt on Seedream 4.5 and 4.0
    Models,
    All,
}

impl ImagePreset {
    const EACH: [ImagePreset; 7] = [
        ImagePreset::Basic,
        ImagePreset::Advanced,
        ImagePreset::Portrait,
        ImagePreset::Landscape,
        ImagePreset::Negative,
        ImagePreset::Batch,
        ImagePreset::Models,
    ];

    fn label(self) -> &'static str {
        match self {
            ImagePreset::Basic => "basic",
            ImagePreset::Advanced => "advanced",
            ImagePreset::Portrait => "portrait",
            ImagePreset::Landscape => "landscape",
            ImagePreset::Negative => "negative",
            ImagePreset::Batch => "batch",
            ImagePreset::Models => "models",
            ImagePreset::All => "all",
        }
    }

    /// Request for a single-request preset; `None` for `Models` and `All`
    pub fn request(self, model: &str) -> Option<ImageGenerationRequest> {
        let (prompt, size, n) = match self {
            ImagePreset::Basic => (CAT_PROMPT, "1024x1024", 1),
            ImagePreset::Advanced => ("星际穿越，巨大的黑洞，复古列车穿越星空，电影大片风格，史诗级画面", "2048x2048", 1),
            ImagePreset::Portrait => (
                "一位年轻女性，穿着白色连衣裙，站在樱花树下，微风吹过，花瓣飘落，日系清新风格，柔和光线",
                "1024x1536",
                1,
            ),
            ImagePreset::Landscape => (
                "壮丽的山川风景，云雾缭绕，日出时分，金色阳光洒在山峰上，中国水墨画风格",
                "1536x1024",
                1,
            ),
            ImagePreset::Negative => (
                "高质量产品摄影，一杯咖啡，拿铁艺术，木质桌面，柔和自然光，商业摄影风格",
                "1024x1024",
                1,
            ),
            ImagePreset::Batch => ("可爱的卡通小动物，圆润的造型，明亮的色彩，儿童插画风格", "1024x1024", 2),
            ImagePreset::Models | ImagePreset::All => return None,
        };
        Some(ImageGenerationRequest {
            model: model.to_string(),
            prompt: prompt.to_string(),
            size: size.to_string(),
            n,
            seed: (self == ImagePreset::Advanced).then_some(-1),
            negative_prompt: (self == ImagePreset::Negative).then(|| "模糊, 低质量, 变形, 水印, 文字".to_string()),
        })
    }
}

/// Text-to-image checks
#[derive(Debug, Clone, Args)]
pub struct ImageProbe {
    /// Presets to run (repeatable)
    #[arg(long = "preset", value_enum, num_args = 1.., default_values_t = [ImagePreset::Models])]
    pub presets: Vec<ImagePreset>,

    /// Model for the single-model presets
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    pub model: String,

    /// Run the Gemini generateContent request instead
    #[arg(long)]
    pub gemini: bool,

    /// Gemini image model
    #[arg(long, default_value = DEFAULT_GEMINI_MODEL)]
    pub gemini_model: String,
}

impl ImageProbe {
    fn selected(&self) -> Vec<ImagePreset> {
        if self.presets.contains(&ImagePreset::All) {
            return ImagePreset::EACH.to_vec();
        }
        let mut selected = Vec::new();
        for preset in &self.presets {
            if !selected.contains(preset) {
                selected.push(*preset);
            }
        }
        selected
    }
}

#[async_trait]
impl Probe for ImageProbe {
    fn name(&self) -> &str {
        "image"
    }

    async fn run(&self, ctx: &ProbeContext) -> Result<SuiteReport> {
        let client = ctx.gateway_client()?;
        let mut report = SuiteReport::new();

        if self.gemini {
            console::header("Gemini Image Generation");
            console::field("Base URL", client.base_url());
            report.check("gemini", gemini(&client, &self.gemini_model).await);
            return Ok(report);
        }

        console::header("Doubao Seedream Text-to-Image");
        console::field("Base URL", client.base_url());
        for preset in self.selected() {
            if preset == ImagePreset::Models {
                console::section("Seedream 4.5 and 4.0 comparison");
                for (model, size) in MODEL_COMPARISON {
                    let request = ImageGenerationRequest {
                        model: model.to_string(),
                        prompt: CAT_PROMPT.to_string(),
                        size: size.to_string(),
                        n: 1,
                        seed: None,
                        negative_prompt: None,
                    };
                    report.check(format!("models {}", model), generate(&client, &request).await);
                }
                continue;
            }
            let Some(request) = preset.request(&self.model) else {
                continue;
            };
            console::section(&format!("Preset: {}", preset.label()));
            report.check(preset.label(), generate(&client, &request).await);
        }
        Ok(report)
    }
}

async fn generate(client: &GatewayClient, request: &ImageGenerationRequest) -> bool {
    console::field("Model", &request.model);
    console::field("Size", &request.size);
    console::field("Prompt", &request.prompt);

    match client.post_json::<_, ImageGenerationResponse>(IMAGES_PATH, request).await {
        Ok(response) => {
            let urls = response.urls();
            if urls.is_empty() {
                console::fail("Response carried no image URL");
                return false;
            }
            console::success("Generated");
            for (i, url) in urls.iter().enumerate() {
                console::field(&format!("Image {} URL", i + 1), url);
            }
            true
        }
        Err(e) => {
            report_error(&format!("{} generation", request.model), &e);
            false
        }
    }
}

async fn gemini(client: &GatewayClient, model: &str) -> bool {
    let path = format!("/v1beta/models/{}:generateContent", model);
    console::field("Path", &path);
    console::field("Prompt", GEMINI_PROMPT);

    let request = GenerateContentRequest::text(GEMINI_PROMPT);
    match client.post_json::<_, GenerateContentResponse>(&path, &request).await {
        Ok(response) => {
            let (texts, images) = response.summarize();
            debug!(texts = texts.len(), images = images.len(), "Gemini response");
            for text in &texts {
                console::field("Text", preview(text, 200));
            }
            for (mime, len) in &images {
                console::field("Inline image", format!("{} ({} base64 chars)", mime, len));
            }
            if response.candidates.is_empty() {
                console::fail("Response carried no candidates");
                false
            } else {
                console::success("Request succeeded");
                true
            }
        }
        Err(e) => {
            report_error("generateContent", &e);
            false
        }
    }
}
