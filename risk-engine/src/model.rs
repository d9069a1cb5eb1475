//! Fraud classifier interface
//!
//! The engine treats the classifier as opaque: anything that maps a
//! [`FeatureVector`] to a probability can sit behind [`RiskModel`]. The
//! bundled [`LogisticModel`] reads exported weights from JSON.

use crate::{Error, FeatureVector, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Pretrained binary classifier
pub trait RiskModel: Send + Sync + fmt::Debug {
    /// Probability that the transaction is fraudulent
    fn predict(&self, features: &FeatureVector) -> Result<f64>;

    /// Model name for logs
    fn name(&self) -> &str {
        "risk-model"
    }
}

/// Per-feature coefficients
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    /// Raw amount
    pub amount: f64,
    /// Hour of day
    pub hour: f64,
    /// ln(1 + amount)
    pub log_amount: f64,
    /// sin(2π·hour/24)
    pub hour_sin: f64,
    /// cos(2π·hour/24)
    pub hour_cos: f64,
    /// amount · hour/23
    pub amount_x_hour: f64,
}

impl FeatureWeights {
    fn all(&self) -> [f64; 6] {
        [
            self.amount,
            self.hour,
            self.log_amount,
            self.hour_sin,
            self.hour_cos,
            self.amount_x_hour,
        ]
    }
}

/// Logistic regression over the engineered features
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    /// Model name / version tag
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Bias term
    pub intercept: f64,

    /// Coefficients
    pub weights: FeatureWeights,
}

fn default_model_name() -> String {
    "logistic".to_string()
}

impl LogisticModel {
    /// Create model from coefficients
    pub fn new(intercept: f64, weights: FeatureWeights) -> Result<Self> {
        let model = Self {
            name: default_model_name(),
            intercept,
            weights,
        };
        model.validate()?;
        Ok(model)
    }

    /// Load exported weights from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let model: LogisticModel = serde_json::from_str(&content)?;
        model.validate()?;
        tracing::info!(model = %model.name, path = %path.as_ref().display(), "Loaded risk model");
        Ok(model)
    }

    fn validate(&self) -> Result<()> {
        if !self.intercept.is_finite() || self.weights.all().iter().any(|w| !w.is_finite()) {
            return Err(Error::ModelError(format!(
                "model {} has non-finite coefficients",
                self.name
            )));
        }
        Ok(())
    }
}

impl RiskModel for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let w = &self.weights;
        let z = self.intercept
            + w.amount * features.amount
            + w.hour * f64::from(features.hour)
            + w.log_amount * features.log_amount
            + w.hour_sin * features.hour_sin
            + w.hour_cos * features.hour_cos
            + w.amount_x_hour * features.amount_x_hour;

        if !z.is_finite() {
            return Err(Error::ModelError(format!("non-finite logit for {:?}", features)));
        }

        Ok(1.0 / (1.0 + (-z).exp()))
    }

    fn name(&self) -> &str {
        &self.name
    }
}
