//! Application configuration settings
//!
//! Defines the gateway/provider endpoints, credentials and logging options,
//! loaded from environment variables (and `.env`), then overridden by CLI flags

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Gateway configuration
    pub gateway: GatewayConfig,
    /// Direct BytePlus (Ark) configuration
    pub byteplus: BytePlusConfig,
    /// Kling configuration
    pub kling: KlingConfig,
    /// Request configuration
    pub request: RequestConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Gateway base URL, without the `/v1` suffix
    pub base_url: String,
    /// Gateway API key (may be empty until a probe needs it)
    pub api_key: String,
}

/// Direct BytePlus configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BytePlusConfig {
    /// Ark API base URL
    pub base_url: String,
    /// Ark API key
    pub api_key: String,
    /// Default model or endpoint ID
    pub model: String,
}

/// Kling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KlingConfig {
    /// Base URL that serves the `/kling/v1/...` routes
    pub base_url: String,
}

/// Request configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Request timeout in seconds
    pub timeout: u64,
    /// Streaming request timeout in seconds
    pub stream_timeout: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Log format (text/json)
    pub format: String,
}

/// CLI-level overrides applied on top of the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub timeout: Option<u64>,
}

impl Settings {
    /// Create a new configuration instance
    pub fn new() -> Result<Self> {
        // Load .env file if it exists
        dotenv::dotenv().ok();

        let gateway_url = trim_base_url(&get_env_or_default("NEW_API_BASE_URL", "http://localhost:3000"));

        let settings = Self {
            gateway: GatewayConfig {
                base_url: gateway_url.clone(),
                api_key: first_env(&["NEW_API_KEY", "EZMODEL_API_KEY"]).unwrap_or_default(),
            },
            byteplus: BytePlusConfig {
                base_url: trim_base_url(&get_env_or_default(
                    "BYTEPLUS_BASE_URL",
                    "https://ark.ap-southeast.bytepluses.com",
                )),
                api_key: first_env(&["VOLC_API_KEY", "ARK_API_KEY"]).unwrap_or_default(),
                model: get_env_or_default("BYTEPLUS_MODEL", "seed-1-6-250915"),
            },
            kling: KlingConfig {
                base_url: trim_base_url(&get_env_or_default("KLING_BASE_URL", &gateway_url)),
            },
            request: RequestConfig {
                timeout: get_env_or_default("REQUEST_TIMEOUT", "120")
                    .parse()
                    .context("Invalid timeout value")?,
                stream_timeout: get_env_or_default("STREAM_TIMEOUT", "600")
                    .parse()
                    .context("Invalid stream timeout value")?,
            },
            logging: LoggingConfig {
                level: get_env_or_default("RUST_LOG", "info"),
                format: get_env_or_default("LOG_FORMAT", "text"),
            },
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Apply CLI overrides and re-validate
    pub fn with_overrides(mut self, overrides: Overrides) -> Result<Self> {
        if let Some(url) = overrides.base_url {
            let url = trim_base_url(&url);
            // Kling follows the gateway unless it was configured separately
            if self.kling.base_url == self.gateway.base_url {
                self.kling.base_url = url.clone();
            }
            self.gateway.base_url = url;
        }
        if let Some(key) = overrides.api_key {
            self.gateway.api_key = key;
        }
        if let Some(timeout) = overrides.timeout {
            self.request.timeout = timeout;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate configuration validity
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("gateway", &self.gateway.base_url),
            ("BytePlus", &self.byteplus.base_url),
            ("Kling", &self.kling.base_url),
        ] {
            if !url.starts_with("http") {
                anyhow::bail!("Invalid {} base URL format, should start with 'http': {}", name, url);
            }
        }

        if self.gateway.api_key.contains(char::is_whitespace) {
            anyhow::bail!("Gateway API key cannot contain whitespace characters");
        }

        if self.request.timeout == 0 || self.request.stream_timeout == 0 {
            anyhow::bail!("Timeout values cannot be 0");
        }

        // RUST_LOG may carry directives such as "gatewayprobe=debug"; only plain levels are checked
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        let level = self.logging.level.to_ascii_lowercase();
        if !level.contains('=') && !valid_levels.contains(&level.as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.logging.format.as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        Ok(())
    }

    /// Gateway API key, or an error naming the variables that supply it
    pub fn require_gateway_key(&self) -> Result<&str> {
        if self.gateway.api_key.is_empty() {
            anyhow::bail!("No gateway API key: pass --key or set NEW_API_KEY / EZMODEL_API_KEY");
        }
        if self.gateway.api_key == "sk-" || self.gateway.api_key == "sk-test" {
            warn!("Using placeholder API key '{}'", self.gateway.api_key);
        }
        Ok(&self.gateway.api_key)
    }

    /// BytePlus API key, or an error naming the variables that supply it
    pub fn require_byteplus_key(&self) -> Result<&str> {
        if self.byteplus.api_key.is_empty() {
            anyhow::bail!("No BytePlus API key: set VOLC_API_KEY or ARK_API_KEY");
        }
        Ok(&self.byteplus.api_key)
    }

    /// Masked key for display (first 10 characters)
    pub fn masked_key(key: &str) -> String {
        if key.chars().count() > 10 {
            format!("{}...", key.chars().take(10).collect::<String>())
        } else {
            key.to_string()
        }
    }
}

/// Strip trailing slashes from a base URL
pub fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

/// Get environment variable or default value
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// First non-empty environment variable among `keys`
fn first_env(keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
}
