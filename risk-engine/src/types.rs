//! Core types for risk engine

use ledger_core::TransactionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fraud probability in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RiskScore(f64);

impl RiskScore {
    /// Create a score; `None` if not a finite probability
    pub fn new(probability: f64) -> Option<Self> {
        if probability.is_finite() && (0.0..=1.0).contains(&probability) {
            Some(Self(probability))
        } else {
            None
        }
    }

    /// Get raw probability
    pub fn value(&self) -> f64 {
        self.0
    }
}

/// Truncated, never rounded, to four places so a score below a threshold
/// never prints as the threshold itself
impl fmt::Display for RiskScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let truncated = (self.0 * 10_000.0 + 1e-9).floor() / 10_000.0;
        write!(f, "{:.4}", truncated)
    }
}

/// Result of asking the scorer for a probability
#[derive(Debug, Clone, PartialEq)]
pub enum ScoreOutcome {
    /// Model produced a probability
    Scored(RiskScore),
    /// No score; carries the reason for logs
    Unavailable(String),
}

impl ScoreOutcome {
    /// Score, if available
    pub fn score(&self) -> Option<RiskScore> {
        match self {
            ScoreOutcome::Scored(score) => Some(*score),
            ScoreOutcome::Unavailable(_) => None,
        }
    }
}

/// Status a fraud rule escalates to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleResult {
    /// Hold for analyst review
    InReview,
    /// Block outright
    Fraudulent,
}

impl From<RuleResult> for TransactionStatus {
    fn from(result: RuleResult) -> Self {
        match result {
            RuleResult::InReview => TransactionStatus::InReview,
            RuleResult::Fraudulent => TransactionStatus::Fraudulent,
        }
    }
}

/// First rule that triggered during evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMatch {
    /// Rule ID
    pub rule_id: String,
    /// Status the rule escalates to
    pub result: TransactionStatus,
    /// Rule description, used as the reason when the rule wins
    pub description: String,
}

/// Rule engine output
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleOutcome {
    /// Triggered rule, if any
    pub matched: Option<RuleMatch>,
}

impl RuleOutcome {
    /// No rule triggered
    pub fn none() -> Self {
        Self { matched: None }
    }

    /// Escalated status, if a rule triggered
    pub fn status(&self) -> Option<TransactionStatus> {
        self.matched.as_ref().map(|m| m.result)
    }
}

/// Non-fatal condition absorbed during evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum Degradation {
    /// Scorer produced no probability
    ScoringDegraded(String),
    /// Rule store unreachable, no rules applied
    RuleStoreDegraded(String),
}

impl Degradation {
    /// Short label for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Degradation::ScoringDegraded(_) => "scoring",
            Degradation::RuleStoreDegraded(_) => "rule_store",
        }
    }
}

/// Final risk classification for a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    /// Final status
    pub status: TransactionStatus,

    /// Human-readable reason
    pub reason: String,

    /// Model probability, if available
    pub risk_score: Option<f64>,

    /// Rule that decided the status, if a rule escalated it
    pub decided_by_rule: Option<String>,

    /// Degraded conditions absorbed while evaluating
    pub degradations: Vec<Degradation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_risk_score_bounds() {
        assert!(RiskScore::new(0.0).is_some());
        assert!(RiskScore::new(1.0).is_some());
        assert!(RiskScore::new(1.01).is_none());
        assert!(RiskScore::new(-0.1).is_none());
        assert!(RiskScore::new(f64::NAN).is_none());
    }

    #[test]
    fn test_risk_score_display() {
        assert_eq!(RiskScore::new(0.8234).unwrap().to_string(), "0.8234");
        assert_eq!(RiskScore::new(0.82).unwrap().to_string(), "0.8200");
        assert_eq!(RiskScore::new(0.69999).unwrap().to_string(), "0.6999");
        assert_eq!(RiskScore::new(1.0).unwrap().to_string(), "1.0000");
    }

    #[test]
    fn test_rule_result_wire_names() {
        let result: RuleResult = serde_json::from_str("\"in_review\"").unwrap();
        assert_eq!(result, RuleResult::InReview);
        assert_eq!(TransactionStatus::from(RuleResult::Fraudulent), TransactionStatus::Fraudulent);
    }
}
