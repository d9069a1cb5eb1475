//! Configuration for the settlement node

use crate::{Error, Result};
use risk_engine::RiskConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settlement node configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Service name
    pub service_name: String,

    /// Scoring and classification settings
    pub risk: RiskConfig,

    /// Fraud rules (JSON array); no rules when absent
    pub rules_path: Option<PathBuf>,

    /// Seed accounts (JSON array)
    pub accounts_path: Option<PathBuf>,

    /// Emit logs as JSON
    pub json_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_name: "risk-node".to_string(),
            risk: RiskConfig::default(),
            rules_path: None,
            accounts_path: None,
            json_logs: false,
        }
    }
}

impl Config {
    /// Validate nested settings
    pub fn validate(&self) -> Result<()> {
        if self.service_name.trim().is_empty() {
            return Err(Error::Config("service_name cannot be empty".to_string()));
        }
        self.risk.validate()?;
        Ok(())
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Override fields from `SETTLEMENT_*` and `RISK_*` environment variables
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(name) = std::env::var("SETTLEMENT_SERVICE_NAME") {
            self.service_name = name;
        }

        if let Ok(path) = std::env::var("SETTLEMENT_RULES_PATH") {
            self.rules_path = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("SETTLEMENT_ACCOUNTS_PATH") {
            self.accounts_path = Some(PathBuf::from(path));
        }

        if let Ok(value) = std::env::var("SETTLEMENT_JSON_LOGS") {
            self.json_logs = value.parse().map_err(|_| {
                Error::Config(format!("SETTLEMENT_JSON_LOGS has invalid value {:?}", value))
            })?;
        }

        self.risk.apply_env()?;
        self.validate()
    }
}
