//! Risk scoring
//!
//! Wraps the classifier behind a fail-open contract: every failure (no
//! model, unparseable input, model error, panic, timeout) becomes
//! [`ScoreOutcome::Unavailable`] instead of an error.

use crate::{hour_of_day, FeatureVector, LogisticModel, RiskConfig, RiskModel, RiskScore, ScoreOutcome};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Model handle state
#[derive(Debug, Clone)]
enum ModelState {
    Loaded(Arc<dyn RiskModel>),
    Unavailable(String),
}

/// Risk scorer
#[derive(Debug, Clone)]
pub struct RiskScorer {
    state: ModelState,
    timeout: Duration,
}

impl RiskScorer {
    /// Create scorer around a loaded model
    pub fn new(model: Arc<dyn RiskModel>, timeout: Duration) -> Self {
        Self {
            state: ModelState::Loaded(model),
            timeout,
        }
    }

    /// Create scorer with no model; every score is unavailable
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Unavailable(reason.into()),
            timeout: Duration::ZERO,
        }
    }

    /// Build from config, loading the model once
    ///
    /// A missing or broken model file does not fail startup; the scorer runs
    /// in degraded mode instead.
    pub fn from_config(config: &RiskConfig) -> Self {
        let Some(ref path) = config.model_path else {
            tracing::warn!("No risk model configured, scoring disabled");
            return Self::unavailable("no model configured");
        };

        match LogisticModel::from_file(path) {
            Ok(model) => {
                tracing::info!(model = model.name(), path = %path.display(), "Risk scoring enabled");
                Self::new(Arc::new(model), config.scoring_timeout())
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Risk model failed to load, scoring disabled");
                Self::unavailable(format!("model failed to load: {}", e))
            }
        }
    }

    /// True if a model is loaded
    pub fn is_available(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    /// Score a transaction
    pub async fn score(&self, amount: Decimal, timestamp: &str) -> ScoreOutcome {
        let outcome = self.try_score(amount, timestamp).await;
        if let ScoreOutcome::Unavailable(ref reason) = outcome {
            tracing::warn!(%amount, timestamp, reason = %reason, "Risk scoring unavailable");
        }
        outcome
    }

    async fn try_score(&self, amount: Decimal, timestamp: &str) -> ScoreOutcome {
        let model = match self.state {
            ModelState::Loaded(ref model) => model.clone(),
            ModelState::Unavailable(ref reason) => {
                return ScoreOutcome::Unavailable(reason.clone());
            }
        };

        let Some(hour) = hour_of_day(timestamp) else {
            return ScoreOutcome::Unavailable(format!("unparseable timestamp {:?}", timestamp));
        };

        let Some(features) = amount.to_f64().and_then(|a| FeatureVector::new(a, hour)) else {
            return ScoreOutcome::Unavailable(format!("amount {} is not a valid model input", amount));
        };

        let task = tokio::task::spawn_blocking(move || model.predict(&features));

        match tokio::time::timeout(self.timeout, task).await {
            Err(_) => ScoreOutcome::Unavailable(format!(
                "model timed out after {}ms",
                self.timeout.as_millis()
            )),
            Ok(Err(join_error)) => {
                ScoreOutcome::Unavailable(format!("model task failed: {}", join_error))
            }
            Ok(Ok(Err(e))) => ScoreOutcome::Unavailable(e.to_string()),
            Ok(Ok(Ok(probability))) => match RiskScore::new(probability) {
                Some(score) => ScoreOutcome::Scored(score),
                None => ScoreOutcome::Unavailable(format!(
                    "model returned invalid probability {}",
                    probability
                )),
            },
        }
    }
}
