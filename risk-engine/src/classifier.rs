//! Status classification
//!
//! Thresholds (checked in this order):
//!
//! | score            | status       |
//! |------------------|--------------|
//! | `>= fraud`       | `fraudulent` |
//! | `>= review`      | `in_review`  |
//! | below review     | `approved`   |
//! | unavailable      | `approved`   |
//!
//! A triggered rule replaces the ML status only when strictly more severe,
//! so rules never lower the ML classification.

use crate::{Evaluation, RiskConfig, RuleOutcome, ScoreOutcome};
use ledger_core::TransactionStatus;

/// Reason used when no score is available
pub const ML_UNAVAILABLE_REASON: &str = "ML unavailable";

/// Merges score and rule outcome into a final status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatusClassifier {
    fraud_threshold: f64,
    review_threshold: f64,
}

impl StatusClassifier {
    /// Create classifier with explicit thresholds
    pub fn new(fraud_threshold: f64, review_threshold: f64) -> Self {
        Self {
            fraud_threshold,
            review_threshold,
        }
    }

    /// Create classifier from config
    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(config.fraud_threshold, config.review_threshold)
    }

    /// Status and reason from the score alone
    pub fn ml_status(&self, score: &ScoreOutcome) -> (TransactionStatus, String) {
        let Some(score) = score.score() else {
            return (TransactionStatus::Approved, ML_UNAVAILABLE_REASON.to_string());
        };

        let p = score.value();
        if p >= self.fraud_threshold {
            (
                TransactionStatus::Fraudulent,
                format!("High fraud risk: ML score {} >= {:.2}", score, self.fraud_threshold),
            )
        } else if p >= self.review_threshold {
            (
                TransactionStatus::InReview,
                format!("Elevated fraud risk: ML score {} requires review", score),
            )
        } else {
            (
                TransactionStatus::Approved,
                format!("Low fraud risk: ML score {}", score),
            )
        }
    }

    /// Final classification
    pub fn classify(&self, score: &ScoreOutcome, rules: &RuleOutcome) -> Evaluation {
        let (ml_status, ml_reason) = self.ml_status(score);

        let (status, reason, decided_by_rule) = match rules.matched {
            Some(ref rule) if rule.result.severity() > ml_status.severity() => {
                (rule.result, rule.description.clone(), Some(rule.rule_id.clone()))
            }
            _ => (ml_status, ml_reason, None),
        };

        Evaluation {
            status,
            reason,
            risk_score: score.score().map(|s| s.value()),
            decided_by_rule,
            degradations: Vec::new(),
        }
    }
}

impl Default for StatusClassifier {
    fn default() -> Self {
        Self::from_config(&RiskConfig::default())
    }
}
