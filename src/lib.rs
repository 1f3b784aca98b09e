//! gatewayprobe library
//!
//! Probes that exercise generative-AI provider APIs (chat, responses,
//! messages, context cache, image, video, Kling) through an API gateway and
//! report whether each step behaved as expected

pub mod config;
pub mod models;
pub mod probes;
pub mod services;
pub mod utils;

// Re-export common types
pub use config::Settings;
pub use probes::{Probe, ProbeContext};
pub use services::{GatewayClient, PollConfig, PollOutcome};
pub use utils::console::{Outcome, SuiteReport};
pub use utils::error::{ProbeError, ProbeResult};
pub use utils::pricing::PricingTable;

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Library description
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get version information
pub fn version_info() -> String {
    format!("{} v{} - {}", NAME, VERSION, DESCRIPTION)
}
