//! Configuration management module
//!
//! Loads settings from environment variables and CLI flags, and the pricing table from a JSON file

pub mod file;
pub mod settings;

pub use file::DEFAULT_TIERED_MODEL;
pub use settings::{
    BytePlusConfig, GatewayConfig, KlingConfig, LoggingConfig, Overrides, RequestConfig, Settings,
};
