//! Risk evaluation pipeline
//!
//! Scorer → rules → classifier. Degradations from the scorer and the rule
//! store are collected on the [`Evaluation`] and noted in its reason.

use crate::{
    Degradation, Evaluation, InMemoryRuleStore, RiskConfig, RiskScorer, RuleEngine, RuleStore,
    ScoreOutcome, StatusClassifier,
};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Suffix appended to the reason when rules could not be loaded
pub const RULES_UNAVAILABLE_NOTE: &str = "rules unavailable";

/// Risk engine
#[derive(Debug)]
pub struct RiskEngine {
    scorer: RiskScorer,
    rules: RuleEngine,
    classifier: StatusClassifier,
}

impl RiskEngine {
    /// Assemble an engine from its parts
    pub fn new(scorer: RiskScorer, rules: RuleEngine, classifier: StatusClassifier) -> Self {
        Self {
            scorer,
            rules,
            classifier,
        }
    }

    /// Build from config with the given rule store
    pub fn from_config(config: &RiskConfig, store: Arc<dyn RuleStore>) -> Self {
        Self::new(
            RiskScorer::from_config(config),
            RuleEngine::new(store, config.rule_store_timeout()),
            StatusClassifier::from_config(config),
        )
    }

    /// Engine with no model and no rules; everything is approved
    pub fn permissive() -> Self {
        let config = RiskConfig::default();
        Self::new(
            RiskScorer::unavailable("no model configured"),
            RuleEngine::new(Arc::new(InMemoryRuleStore::default()), config.rule_store_timeout()),
            StatusClassifier::from_config(&config),
        )
    }

    /// Scorer in use
    pub fn scorer(&self) -> &RiskScorer {
        &self.scorer
    }

    /// Evaluate a transaction
    pub async fn evaluate(&self, amount: Decimal, merchant: &str, timestamp: &str) -> Evaluation {
        let score = self.scorer.score(amount, timestamp).await;
        let (rule_outcome, rule_degradation) = self.rules.evaluate_transaction(amount, merchant).await;

        let mut evaluation = self.classifier.classify(&score, &rule_outcome);

        if let ScoreOutcome::Unavailable(detail) = score {
            evaluation.degradations.push(Degradation::ScoringDegraded(detail));
        }

        if let Some(degradation) = rule_degradation {
            evaluation.reason = format!("{}; {}", evaluation.reason, RULES_UNAVAILABLE_NOTE);
            evaluation.degradations.push(degradation);
        }

        tracing::debug!(
            status = %evaluation.status,
            score = ?evaluation.risk_score,
            rule = ?evaluation.decided_by_rule,
            "Transaction evaluated"
        );

        evaluation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Error, FeatureVector, FraudRule, Result, RiskModel, RuleResult};
    use async_trait::async_trait;
    use ledger_core::TransactionStatus;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    #[derive(Debug)]
    struct FixedModel(f64);

    impl RiskModel for FixedModel {
        fn predict(&self, _features: &FeatureVector) -> Result<f64> {
            Ok(self.0)
        }
    }

    struct DownStore;

    #[async_trait]
    impl RuleStore for DownStore {
        async fn list_rules(&self) -> Result<Vec<FraudRule>> {
            Err(Error::RuleStore("timeout".to_string()))
        }
    }

    fn engine(score: f64, store: Arc<dyn RuleStore>) -> RiskEngine {
        RiskEngine::new(
            RiskScorer::new(Arc::new(FixedModel(score)), Duration::from_millis(200)),
            RuleEngine::new(store, Duration::from_millis(200)),
            StatusClassifier::default(),
        )
    }

    #[tokio::test]
    async fn test_rule_escalates_low_score() {
        let store = Arc::new(InMemoryRuleStore::new(vec![FraudRule::amount_threshold(
            "big",
            dec!(500),
            RuleResult::InReview,
            "Amount above 500",
        )]));

        let evaluation = engine(0.20, store)
            .evaluate(dec!(600), "Electronics Hub", "2024-06-01T12:00:00Z")
            .await;

        assert_eq!(evaluation.status, TransactionStatus::InReview);
        assert_eq!(evaluation.reason, "Amount above 500");
        assert!(evaluation.degradations.is_empty());
    }

    #[tokio::test]
    async fn test_permissive_engine_records_scoring_degradation() {
        let evaluation = RiskEngine::permissive()
            .evaluate(dec!(20), "Cafe", "2024-06-01T08:00:00Z")
            .await;

        assert_eq!(evaluation.status, TransactionStatus::Approved);
        assert_eq!(evaluation.reason, "ML unavailable");
        assert_eq!(evaluation.degradations.len(), 1);
        assert_eq!(evaluation.degradations[0].kind(), "scoring");
    }

    #[tokio::test]
    async fn test_rule_store_outage_noted_in_reason() {
        let evaluation = engine(0.10, Arc::new(DownStore))
            .evaluate(dec!(20), "Cafe", "2024-06-01T08:00:00Z")
            .await;

        assert_eq!(evaluation.status, TransactionStatus::Approved);
        assert!(evaluation.reason.ends_with(RULES_UNAVAILABLE_NOTE));
        assert!(matches!(
            evaluation.degradations.as_slice(),
            [Degradation::RuleStoreDegraded(_)]
        ));
    }
}
