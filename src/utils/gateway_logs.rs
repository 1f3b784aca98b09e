//! Gateway log and database inspection
//!
//! Reads the gateway's billing decisions out of its container logs and checks
//! the tiered pricing option stored in its database. Both go through the
//! `docker` CLI and are optional: failures warn and return empty results.

use crate::utils::console;
use once_cell::sync::Lazy;
use regex::Regex;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

/// Default gateway container name
pub const DEFAULT_CONTAINER: &str = "new-api-local";

/// Default database container name
pub const DEFAULT_DB_CONTAINER: &str = "postgres-local";

/// Log lines read per check
pub const DEFAULT_LOG_LINES: usize = 50;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

static TIER_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(
        r#""tiered_pricing":\s*true.*?"tiered_tier_range":\s*"([^"]+)".*?"tiered_input_price":\s*([\d.]+).*?"tiered_output_price":\s*([\d.]+)"#,
    )
    .map_err(|e| warn!("Invalid tier log pattern: {}", e))
    .ok()
});

static CACHED_PATTERN: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r#"(?:cached_tokens=|"cache_tokens":\s*)(\d+)"#)
        .map_err(|e| warn!("Invalid cached tokens pattern: {}", e))
        .ok()
});

/// Marker of the gateway's Responses API billing line
pub const RESPONSES_BILLING_MARKER: &str = "BytePlus Responses consume";

/// Billing decision logged by the gateway
#[derive(Debug, Clone, PartialEq)]
pub struct LoggedTier {
    /// `min-max` in thousands of tokens, e.g. `0-128` or `128--1`
    pub tier_range: String,
    pub input_price: f64,
    pub output_price: f64,
}

/// Last tiered-pricing decision in a log excerpt
pub fn parse_tier_from_logs(logs: &str) -> Option<LoggedTier> {
    let pattern = TIER_PATTERN.as_ref()?;
    let captures = pattern.captures_iter(logs).last()?;
    Some(LoggedTier {
        tier_range: captures.get(1)?.as_str().to_string(),
        input_price: captures.get(2)?.as_str().parse().ok()?,
        output_price: captures.get(3)?.as_str().parse().ok()?,
    })
}

/// Last cached token count the gateway logged
///
/// Matches both `cached_tokens=N` (Responses billing) and `"cache_tokens": N`
/// (chat billing).
pub fn parse_cached_tokens_from_logs(logs: &str) -> Option<u64> {
    let pattern = CACHED_PATTERN.as_ref()?;
    let captures = pattern.captures_iter(logs).last()?;
    captures.get(1)?.as_str().parse().ok()
}

async fn run_docker(args: &[&str]) -> Option<String> {
    debug!(?args, "Running docker");
    let output = tokio::time::timeout(COMMAND_TIMEOUT, Command::new("docker").args(args).output()).await;
    match output {
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            Some(text)
        }
        Ok(Err(e)) => {
            console::warn(&format!("Failed to run docker: {}", e));
            None
        }
        Err(_) => {
            console::warn(&format!("docker {} timed out", args.first().unwrap_or(&"")));
            None
        }
    }
}

/// Tail of a container's logs (stdout and stderr), empty on failure
pub async fn fetch_container_logs(container: &str, lines: usize) -> String {
    let lines = lines.to_string();
    run_docker(&["logs", container, "--tail", &lines]).await.unwrap_or_default()
}

/// Result of inspecting the `TieredPricing` option
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PricingOptionCheck {
    /// Model present and the option enabled
    pub found: bool,
    /// `[0, 128K)` tier present
    pub tier_one: bool,
    /// `[128K, ∞)` tier present
    pub tier_two: bool,
    pub raw: String,
}

/// Inspect `psql` output of the `TieredPricing` option for `model`
pub fn inspect_pricing_option(output: &str, model: &str) -> PricingOptionCheck {
    let found = output.contains(model) && output.contains(r#""enabled": true"#);
    PricingOptionCheck {
        found,
        tier_one: found && output.contains(r#""min_tokens": 0"#) && output.contains(r#""max_tokens": 128"#),
        tier_two: found && output.contains(r#""min_tokens": 128"#) && output.contains(r#""max_tokens": -1"#),
        raw: output.to_string(),
    }
}

/// Query the gateway database for the `TieredPricing` option
pub async fn check_pricing_option(db_container: &str, model: &str) -> Option<PricingOptionCheck> {
    let output = run_docker(&[
        "exec",
        db_container,
        "psql",
        "-U",
        "root",
        "-d",
        "new-api",
        "-c",
        "SELECT value FROM options WHERE key = 'TieredPricing';",
    ])
    .await?;
    Some(inspect_pricing_option(&output, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_last_tier_line() {
        let logs = concat!(
            r#"{"level":"info","tiered_pricing": true,"tiered_tier_range": "0-128","tiered_input_price": 0.25,"tiered_output_price": 2}"#,
            "\n",
            r#"{"level":"info","msg":"unrelated"}"#,
            "\n",
            r#"{"level":"info","tiered_pricing": true,"tiered_tier_range": "128--1","tiered_input_price": 0.5,"tiered_output_price": 4.0}"#,
            "\n"
        );
        let tier = parse_tier_from_logs(logs).unwrap();
        assert_eq!(tier.tier_range, "128--1");
        assert_eq!(tier.input_price, 0.5);
        assert_eq!(tier.output_price, 4.0);
    }

    #[test]
    fn test_parse_ignores_disabled_pricing() {
        let logs = r#"{"tiered_pricing": false,"tiered_tier_range": "0-128","tiered_input_price": 0.25,"tiered_output_price": 2}"#;
        assert!(parse_tier_from_logs(logs).is_none());
        assert!(parse_tier_from_logs("").is_none());
    }

    #[test]
    fn test_parse_cached_tokens() {
        let logs = "[INFO] BytePlus Responses consume: input_tokens=1200, cached_tokens=1024\n";
        assert_eq!(parse_cached_tokens_from_logs(logs), Some(1024));

        let logs = r#"{"other":{"cache_tokens": 12}}
{"other":{"cache_tokens": 640}}"#;
        assert_eq!(parse_cached_tokens_from_logs(logs), Some(640));
        assert_eq!(parse_cached_tokens_from_logs("nothing here"), None);
    }

    #[test]
    fn test_inspect_pricing_option() {
        let output = r#"
 value
-------
 {"seed-1-8-251228": {"enabled": true, "tiers": [{"min_tokens": 0, "max_tokens": 128}, {"min_tokens": 128, "max_tokens": -1}]}}
(1 row)
"#;
        let check = inspect_pricing_option(output, "seed-1-8-251228");
        assert!(check.found && check.tier_one && check.tier_two);

        let missing = inspect_pricing_option(output, "other-model");
        assert!(!missing.found);
        assert!(!missing.tier_one);
    }
}
