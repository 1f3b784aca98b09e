//! Tiered pricing arithmetic
//!
//! Tier lookup and cost estimates (USD per million tokens) used to check what
//! the gateway billed against what the usage says it should have billed.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// One pricing tier; bounds in thousands of input tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierConfig {
    pub min_tokens_k: i64,
    /// `-1` means unbounded
    pub max_tokens_k: i64,
    pub input_price: f64,
    pub output_price: f64,
    #[serde(default)]
    pub cache_hit_price: f64,
    #[serde(default)]
    pub cache_store_price: f64,
}

impl TierConfig {
    pub fn is_unbounded(&self) -> bool {
        self.max_tokens_k == -1
    }

    /// Whether `input_tokens_k` falls in `[min, max)`
    pub fn contains(&self, input_tokens_k: f64) -> bool {
        self.min_tokens_k as f64 <= input_tokens_k
            && (self.is_unbounded() || input_tokens_k < self.max_tokens_k as f64)
    }

    /// Range as the gateway logs it (`0-128`, `128--1`)
    pub fn log_range(&self) -> String {
        format!("{}-{}", self.min_tokens_k, self.max_tokens_k)
    }
}

impl fmt::Display for TierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "{}K-unlimited", self.min_tokens_k)
        } else {
            write!(f, "{}K-{}K", self.min_tokens_k, self.max_tokens_k)
        }
    }
}

/// Per-model tier lists
#[derive(Debug, Clone, Default)]
pub struct PricingTable {
    models: HashMap<String, Vec<TierConfig>>,
}

impl PricingTable {
    pub fn new(models: HashMap<String, Vec<TierConfig>>) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &HashMap<String, Vec<TierConfig>> {
        &self.models
    }

    pub fn tiers(&self, model: &str) -> Option<&[TierConfig]> {
        self.models.get(model).map(Vec::as_slice)
    }

    /// Tier expected for an input size; the last tier if none matches
    pub fn expected_tier(&self, model: &str, input_tokens_k: f64) -> Option<&TierConfig> {
        let tiers = self.tiers(model)?;
        tiers
            .iter()
            .find(|tier| tier.contains(input_tokens_k))
            .or_else(|| tiers.last())
    }
}

/// Estimated cost in USD
///
/// Cached tokens larger than the input are clamped to the input.
pub fn expected_cost(input_tokens: u64, output_tokens: u64, tier: &TierConfig, cached_tokens: u64) -> f64 {
    let cached = cached_tokens.min(input_tokens);
    let uncached = input_tokens - cached;
    uncached as f64 / 1_000_000.0 * tier.input_price
        + output_tokens as f64 / 1_000_000.0 * tier.output_price
        + cached as f64 / 1_000_000.0 * tier.cache_hit_price
}

/// Cost of storing `tokens` in a context cache (one hour)
pub fn cache_store_cost(tokens: u64, tier: &TierConfig) -> f64 {
    tokens as f64 / 1_000_000.0 * tier.cache_store_price
}

/// What a cache hit saved on the input side
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheSavings {
    /// Input cost without any cache hit
    pub full_cost: f64,
    /// Input cost with cached tokens at the cache-hit price
    pub actual_cost: f64,
    pub saved: f64,
    /// Saved share of the full cost, in percent
    pub saved_percent: f64,
}

impl CacheSavings {
    pub fn compute(prompt_tokens: u64, cached_tokens: u64, tier: &TierConfig) -> Self {
        let full_cost = expected_cost(prompt_tokens, 0, tier, 0);
        let actual_cost = expected_cost(prompt_tokens, 0, tier, cached_tokens);
        let saved = full_cost - actual_cost;
        let saved_percent = if full_cost > 0.0 { saved / full_cost * 100.0 } else { 0.0 };
        Self {
            full_cost,
            actual_cost,
            saved,
            saved_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tier(min: i64, max: i64, input: f64, output: f64) -> TierConfig {
        TierConfig {
            min_tokens_k: min,
            max_tokens_k: max,
            input_price: input,
            output_price: output,
            cache_hit_price: 0.05,
            cache_store_price: 0.0083,
        }
    }

    fn table() -> PricingTable {
        let mut models = HashMap::new();
        models.insert("seed".to_string(), vec![tier(0, 128, 0.25, 2.0), tier(128, -1, 0.5, 4.0)]);
        PricingTable::new(models)
    }

    #[test]
    fn test_tier_display() {
        assert_eq!(tier(0, 128, 0.0, 0.0).to_string(), "0K-128K");
        assert_eq!(tier(128, -1, 0.0, 0.0).to_string(), "128K-unlimited");
        assert_eq!(tier(128, -1, 0.0, 0.0).log_range(), "128--1");
    }

    #[test]
    fn test_expected_tier_boundaries() {
        let table = table();
        assert_eq!(table.expected_tier("seed", 0.01).unwrap().min_tokens_k, 0);
        assert_eq!(table.expected_tier("seed", 127.9).unwrap().min_tokens_k, 0);
        assert_eq!(table.expected_tier("seed", 128.0).unwrap().min_tokens_k, 128);
        assert_eq!(table.expected_tier("seed", 900.0).unwrap().min_tokens_k, 128);
        assert!(table.expected_tier("unknown", 1.0).is_none());
    }

    #[test]
    fn test_expected_tier_falls_back_to_last() {
        let mut models = HashMap::new();
        models.insert("gap".to_string(), vec![tier(10, 20, 1.0, 1.0), tier(20, 30, 2.0, 2.0)]);
        let table = PricingTable::new(models);
        assert_eq!(table.expected_tier("gap", 5.0).unwrap().min_tokens_k, 20);
    }

    #[test]
    fn test_expected_cost() {
        let t = tier(0, 128, 0.25, 2.0);
        let cost = expected_cost(1_000_000, 1_000_000, &t, 0);
        assert!((cost - 2.25).abs() < 1e-12);

        let cost = expected_cost(1_000_000, 0, &t, 400_000);
        assert!((cost - (0.6 * 0.25 + 0.4 * 0.05)).abs() < 1e-12);
    }

    #[test]
    fn test_cached_clamped_to_input() {
        let t = tier(0, 128, 0.25, 2.0);
        let clamped = expected_cost(1000, 0, &t, 5000);
        let exact = expected_cost(1000, 0, &t, 1000);
        assert_eq!(clamped, exact);
    }

    #[test]
    fn test_cache_savings() {
        let t = tier(0, 128, 0.25, 2.0);
        let savings = CacheSavings::compute(1_000_000, 1_000_000, &t);
        assert!((savings.full_cost - 0.25).abs() < 1e-12);
        assert!((savings.actual_cost - 0.05).abs() < 1e-12);
        assert!((savings.saved_percent - 80.0).abs() < 1e-9);

        let none = CacheSavings::compute(0, 0, &t);
        assert_eq!(none.saved_percent, 0.0);
    }

    #[test]
    fn test_cache_store_cost() {
        let t = tier(0, 128, 0.25, 2.0);
        assert!((cache_store_cost(2_000_000, &t) - 0.0166).abs() < 1e-12);
    }
}
