//! File-based configuration loading
//!
//! Loads the tiered pricing table from a JSON file

use crate::utils::pricing::{PricingTable, TierConfig};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Model priced by the built-in table
pub const DEFAULT_TIERED_MODEL: &str = "seed-1-8-251228";

impl PricingTable {
    /// Load pricing table from JSON file
    ///
    /// Expected shape: `{"<model>": [{"min_tokens_k": 0, "max_tokens_k": 128, ...}, ...]}`
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading pricing table from: {:?}", path);

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read pricing file: {:?}", path))?;

        let models: HashMap<String, Vec<TierConfig>> = serde_json::from_str(&content)
            .with_context(|| "Failed to parse pricing JSON")?;

        let table = PricingTable::new(models);
        table.validate()?;

        debug!("Loaded pricing for {} models", table.models().len());
        Ok(table)
    }

    /// Load pricing table from default locations
    /// Searches in order:
    /// 1. ~/.config/gatewayprobe/pricing.json
    /// 2. ./pricing.json
    ///
    /// Falls back to the built-in table when no file is found.
    pub fn load_default() -> Result<Self> {
        match Self::find_default_path() {
            Some(path) => Self::load(&path),
            None => {
                debug!("No pricing file found, using built-in table");
                Ok(Self::builtin())
            }
        }
    }

    /// Load from an explicit path if given, otherwise from default locations
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::load_default(),
        }
    }

    fn find_default_path() -> Option<PathBuf> {
        if let Some(home) = dirs::home_dir() {
            let config_path = home.join(".config").join("gatewayprobe").join("pricing.json");
            if config_path.exists() {
                return Some(config_path);
            }
        }

        let local_path = PathBuf::from("pricing.json");
        if local_path.exists() {
            return Some(local_path);
        }

        None
    }

    /// Built-in table (USD per million tokens)
    pub fn builtin() -> Self {
        let mut models = HashMap::new();
        models.insert(
            DEFAULT_TIERED_MODEL.to_string(),
            vec![
                TierConfig {
                    min_tokens_k: 0,
                    max_tokens_k: 128,
                    input_price: 0.25,
                    output_price: 2.0,
                    cache_hit_price: 0.05,
                    cache_store_price: 0.0083,
                },
                TierConfig {
                    min_tokens_k: 128,
                    max_tokens_k: -1,
                    input_price: 0.5,
                    output_price: 4.0,
                    cache_hit_price: 0.05,
                    cache_store_price: 0.0083,
                },
            ],
        );
        PricingTable::new(models)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (model, tiers) in self.models() {
            if tiers.is_empty() {
                anyhow::bail!("Model '{}' must have at least one pricing tier", model);
            }
            for tier in tiers {
                if tier.max_tokens_k != -1 && tier.max_tokens_k <= tier.min_tokens_k {
                    anyhow::bail!(
                        "Invalid tier {} for model '{}': max_tokens_k must be -1 or greater than min_tokens_k",
                        tier, model
                    );
                }
                if tier.input_price < 0.0 || tier.output_price < 0.0 {
                    anyhow::bail!("Negative price in tier {} for model '{}'", tier, model);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_pricing_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{
            "glm-4.6": [
                {"min_tokens_k": 0, "max_tokens_k": 32, "input_price": 0.6, "output_price": 2.2},
                {"min_tokens_k": 32, "max_tokens_k": -1, "input_price": 1.2, "output_price": 4.4, "cache_hit_price": 0.11}
            ]
        }"#).unwrap();

        let table = PricingTable::load(file.path()).unwrap();
        let tier = table.expected_tier("glm-4.6", 40.0).unwrap();
        assert_eq!(tier.input_price, 1.2);
        assert_eq!(tier.cache_hit_price, 0.11);
        assert_eq!(tier.cache_store_price, 0.0);
    }

    #[test]
    fn test_reject_inverted_tier() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(br#"{"m": [{"min_tokens_k": 128, "max_tokens_k": 64, "input_price": 1, "output_price": 1}]}"#)
            .unwrap();
        let err = PricingTable::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("max_tokens_k"));
    }

    #[test]
    fn test_builtin_table() {
        let table = PricingTable::builtin();
        assert!(table.validate().is_ok());
        assert_eq!(table.tiers(DEFAULT_TIERED_MODEL).unwrap().len(), 2);
    }
}
