//! Configuration for risk engine

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Risk engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Score at or above which a transaction is fraudulent
    pub fraud_threshold: f64,

    /// Score at or above which a transaction goes to review
    pub review_threshold: f64,

    /// Exported model weights (JSON); scoring is disabled when absent
    pub model_path: Option<PathBuf>,

    /// Upper bound on a single model prediction
    pub scoring_timeout_ms: u64,

    /// Upper bound on listing rules from the rule store
    pub rule_store_timeout_ms: u64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            fraud_threshold: 0.70,
            review_threshold: 0.50,
            model_path: None,
            scoring_timeout_ms: 250,
            rule_store_timeout_ms: 500,
        }
    }
}

impl RiskConfig {
    /// Check thresholds and timeouts
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f64| v.is_finite() && (0.0..=1.0).contains(&v);
        if !in_unit(self.fraud_threshold) || !in_unit(self.review_threshold) {
            return Err(Error::InvalidConfig(
                "thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.review_threshold > self.fraud_threshold {
            return Err(Error::InvalidConfig(format!(
                "review threshold {} exceeds fraud threshold {}",
                self.review_threshold, self.fraud_threshold
            )));
        }
        if self.scoring_timeout_ms == 0 || self.rule_store_timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeouts must be non-zero".to_string()));
        }
        Ok(())
    }

    /// Scoring timeout
    pub fn scoring_timeout(&self) -> Duration {
        Duration::from_millis(self.scoring_timeout_ms)
    }

    /// Rule store timeout
    pub fn rule_store_timeout(&self) -> Duration {
        Duration::from_millis(self.rule_store_timeout_ms)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: RiskConfig = toml::from_str(&content)
            .map_err(|e| Error::InvalidConfig(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = RiskConfig::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `RISK_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    /// Override fields from `RISK_*` variables resolved through `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("RISK_MODEL_PATH") {
            self.model_path = Some(PathBuf::from(path));
        }

        if let Some(value) = lookup("RISK_FRAUD_THRESHOLD") {
            self.fraud_threshold = parse_env("RISK_FRAUD_THRESHOLD", &value)?;
        }

        if let Some(value) = lookup("RISK_REVIEW_THRESHOLD") {
            self.review_threshold = parse_env("RISK_REVIEW_THRESHOLD", &value)?;
        }

        if let Some(value) = lookup("RISK_SCORING_TIMEOUT_MS") {
            self.scoring_timeout_ms = parse_env("RISK_SCORING_TIMEOUT_MS", &value)?;
        }

        if let Some(value) = lookup("RISK_RULE_STORE_TIMEOUT_MS") {
            self.rule_store_timeout_ms = parse_env("RISK_RULE_STORE_TIMEOUT_MS", &value)?;
        }

        self.validate()
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{} has invalid value {:?}", name, value)))
}
