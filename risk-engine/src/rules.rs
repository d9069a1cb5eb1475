//! Fraud rules
//!
//! Rules are evaluated in stored order and the first one that triggers
//! decides the outcome; later rules are never looked at. Rules can only
//! escalate (their result is `in_review` or `fraudulent`).

use crate::{Degradation, Error, Result, RuleMatch, RuleOutcome, RuleResult};
use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What a rule checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RuleCondition {
    /// Triggers when `amount > threshold`
    AmountThreshold {
        /// Strict lower bound
        threshold: Decimal,
    },
    /// Triggers when the merchant name contains `keyword`, ignoring case
    MerchantKeyword {
        /// Substring to look for
        keyword: String,
    },
}

/// Fraud rule definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRule {
    /// Rule ID
    #[serde(alias = "id")]
    pub rule_id: String,

    /// Description, shown as the reason when the rule decides
    pub description: String,

    /// Condition
    #[serde(flatten)]
    pub condition: RuleCondition,

    /// Status the rule escalates to
    pub result: RuleResult,
}

impl FraudRule {
    /// Amount-threshold rule
    pub fn amount_threshold(
        rule_id: impl Into<String>,
        threshold: Decimal,
        result: RuleResult,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            description: description.into(),
            condition: RuleCondition::AmountThreshold { threshold },
            result,
        }
    }

    /// Merchant-keyword rule
    pub fn merchant_keyword(
        rule_id: impl Into<String>,
        keyword: impl Into<String>,
        result: RuleResult,
        description: impl Into<String>,
    ) -> Self {
        Self {
            rule_id: rule_id.into(),
            description: description.into(),
            condition: RuleCondition::MerchantKeyword {
                keyword: keyword.into(),
            },
            result,
        }
    }

    /// Reject rules that cannot be evaluated sensibly
    pub fn validate(&self) -> Result<()> {
        match self.condition {
            RuleCondition::AmountThreshold { threshold } if threshold.is_sign_negative() => {
                Err(Error::InvalidRule(format!(
                    "rule {}: negative threshold {}",
                    self.rule_id, threshold
                )))
            }
            // An empty keyword would match every merchant
            RuleCondition::MerchantKeyword { ref keyword } if keyword.trim().is_empty() => Err(
                Error::InvalidRule(format!("rule {}: empty keyword", self.rule_id)),
            ),
            _ => Ok(()),
        }
    }

    /// Check whether the rule triggers
    pub fn matches(&self, amount: Decimal, merchant: &str) -> bool {
        match self.condition {
            RuleCondition::AmountThreshold { threshold } => amount > threshold,
            RuleCondition::MerchantKeyword { ref keyword } => merchant
                .to_lowercase()
                .contains(&keyword.to_lowercase()),
        }
    }
}

/// Read-only source of rules, in evaluation order
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// List all rules in stored order
    async fn list_rules(&self) -> Result<Vec<FraudRule>>;
}

/// In-memory rule store
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: RwLock<Vec<FraudRule>>,
}

impl InMemoryRuleStore {
    /// Create store with rules
    pub fn new(rules: Vec<FraudRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
        }
    }

    /// Load rules from a JSON array file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let entries: Vec<serde_json::Value> = serde_json::from_str(&content)?;

        let mut rules = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<FraudRule>(entry) {
                Ok(rule) => rules.push(rule),
                Err(e) => tracing::warn!(index, error = %e, "Skipping malformed fraud rule"),
            }
        }

        tracing::info!(count = rules.len(), path = %path.as_ref().display(), "Loaded fraud rules");
        Ok(Self::new(rules))
    }

    /// Load rules from a file, falling back to an empty rule set
    ///
    /// A missing or unreadable file is logged and treated as "no rules".
    pub fn load_or_empty(path: impl AsRef<Path>) -> Self {
        Self::from_file(path.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(
                path = %path.as_ref().display(),
                error = %e,
                "Fraud rules failed to load, running without rules"
            );
            Self::default()
        })
    }

    /// Replace the rule set
    pub fn replace(&self, rules: Vec<FraudRule>) {
        *self.rules.write() = rules;
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn list_rules(&self) -> Result<Vec<FraudRule>> {
        Ok(self.rules.read().clone())
    }
}

/// Rule engine
pub struct RuleEngine {
    store: Arc<dyn RuleStore>,
    timeout: Duration,
}

impl std::fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleEngine")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl RuleEngine {
    /// Create rule engine over a store
    pub fn new(store: Arc<dyn RuleStore>, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Evaluate rules in order; first match wins
    pub fn evaluate(amount: Decimal, merchant: &str, rules: &[FraudRule]) -> RuleOutcome {
        rules
            .iter()
            .find(|rule| rule.matches(amount, merchant))
            .map(|rule| RuleOutcome {
                matched: Some(RuleMatch {
                    rule_id: rule.rule_id.clone(),
                    result: rule.result.into(),
                    description: rule.description.clone(),
                }),
            })
            .unwrap_or_default()
    }

    /// Fetch the current rule set
    ///
    /// An unreachable or slow store yields an empty set plus a degradation
    /// marker. Invalid rules are skipped.
    pub async fn load_rules(&self) -> (Vec<FraudRule>, Option<Degradation>) {
        let listed = match tokio::time::timeout(self.timeout, self.store.list_rules()).await {
            Ok(Ok(rules)) => rules,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Rule store unavailable, evaluating without rules");
                return (Vec::new(), Some(Degradation::RuleStoreDegraded(e.to_string())));
            }
            Err(_) => {
                let detail = format!("rule store timed out after {}ms", self.timeout.as_millis());
                tracing::warn!(detail = %detail, "Rule store unavailable, evaluating without rules");
                return (Vec::new(), Some(Degradation::RuleStoreDegraded(detail)));
            }
        };

        let rules = listed
            .into_iter()
            .filter(|rule| match rule.validate() {
                Ok(()) => true,
                Err(e) => {
                    tracing::warn!(rule_id = %rule.rule_id, error = %e, "Skipping invalid fraud rule");
                    false
                }
            })
            .collect();

        (rules, None)
    }

    /// Load rules and evaluate them against a transaction
    pub async fn evaluate_transaction(
        &self,
        amount: Decimal,
        merchant: &str,
    ) -> (RuleOutcome, Option<Degradation>) {
        let (rules, degradation) = self.load_rules().await;
        (Self::evaluate(amount, merchant, &rules), degradation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::TransactionStatus;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[derive(Debug)]
    struct DownStore;

    #[async_trait]
    impl RuleStore for DownStore {
        async fn list_rules(&self) -> Result<Vec<FraudRule>> {
            Err(Error::RuleStore("connection refused".to_string()))
        }
    }

    #[derive(Debug)]
    struct HangingStore;

    #[async_trait]
    impl RuleStore for HangingStore {
        async fn list_rules(&self) -> Result<Vec<FraudRule>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    #[test]
    fn test_amount_threshold_is_strict() {
        let rule = FraudRule::amount_threshold("r1", dec!(500), RuleResult::InReview, "Large");
        assert!(!rule.matches(dec!(500), "Any"));
        assert!(rule.matches(dec!(500.01), "Any"));
    }

    #[test]
    fn test_keyword_is_case_insensitive_substring() {
        let rule = FraudRule::merchant_keyword("r2", "Casino", RuleResult::Fraudulent, "Gambling");
        assert!(rule.matches(dec!(1), "Lucky CASINO Royale"));
        assert!(rule.matches(dec!(1), "casinoworld"));
        assert!(!rule.matches(dec!(1), "Grocery"));
    }

    #[test]
    fn test_first_match_wins() {
        let rules = vec![
            FraudRule::amount_threshold("review", dec!(100), RuleResult::InReview, "Over 100"),
            FraudRule::merchant_keyword("block", "crypto", RuleResult::Fraudulent, "Crypto merchant"),
        ];

        let outcome = RuleEngine::evaluate(dec!(250), "CryptoX", &rules);
        let matched = outcome.matched.unwrap();
        assert_eq!(matched.rule_id, "review");
        assert_eq!(matched.result, TransactionStatus::InReview);
        assert_eq!(matched.description, "Over 100");
    }

    #[test]
    fn test_no_match() {
        let rules = vec![FraudRule::amount_threshold("r", dec!(100), RuleResult::InReview, "x")];
        assert_eq!(RuleEngine::evaluate(dec!(5), "Cafe", &rules), RuleOutcome::none());
        assert_eq!(RuleEngine::evaluate(dec!(5), "Cafe", &[]), RuleOutcome::none());
    }

    #[test]
    fn test_rule_json_shape() {
        let json = r#"[
            {"id": "r1", "type": "amount-threshold", "description": "Big", "threshold": 500, "result": "in_review"},
            {"id": "r2", "type": "merchant-keyword", "description": "Bets", "keyword": "bet", "result": "fraudulent"}
        ]"#;
        let rules: Vec<FraudRule> = serde_json::from_str(json).unwrap();
        assert_eq!(
            rules[0].condition,
            RuleCondition::AmountThreshold { threshold: dec!(500) }
        );
        assert_eq!(rules[1].result, RuleResult::Fraudulent);
    }

    #[test]
    fn test_threshold_rule_requires_threshold() {
        let json = r#"{"id": "r1", "type": "amount-threshold", "description": "Big", "result": "in_review"}"#;
        assert!(serde_json::from_str::<FraudRule>(json).is_err());
    }

    #[tokio::test]
    async fn test_invalid_rules_skipped() {
        let store = InMemoryRuleStore::new(vec![
            FraudRule::merchant_keyword("empty", "  ", RuleResult::Fraudulent, "matches all"),
            FraudRule::amount_threshold("neg", dec!(-1), RuleResult::Fraudulent, "negative"),
            FraudRule::amount_threshold("ok", dec!(10), RuleResult::InReview, "fine"),
        ]);
        let engine = RuleEngine::new(Arc::new(store), Duration::from_millis(100));

        let (rules, degradation) = engine.load_rules().await;
        assert!(degradation.is_none());
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].rule_id, "ok");
    }

    #[tokio::test]
    async fn test_store_down_degrades_to_no_rules() {
        let engine = RuleEngine::new(Arc::new(DownStore), Duration::from_millis(100));
        let (outcome, degradation) = engine.evaluate_transaction(dec!(1_000_000), "casino").await;
        assert_eq!(outcome, RuleOutcome::none());
        assert!(matches!(degradation, Some(Degradation::RuleStoreDegraded(_))));
    }

    #[tokio::test]
    async fn test_store_timeout_degrades() {
        let engine = RuleEngine::new(Arc::new(HangingStore), Duration::from_millis(20));
        let (rules, degradation) = engine.load_rules().await;
        assert!(rules.is_empty());
        assert!(matches!(degradation, Some(Degradation::RuleStoreDegraded(_))));
    }

    #[tokio::test]
    async fn test_store_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"id": "kw", "type": "merchant-keyword", "description": "Gift cards", "keyword": "gift", "result": "in_review"}},
                {{"id": "bad", "type": "amount-threshold", "description": "No threshold", "result": "fraudulent"}}
            ]"#
        )
        .unwrap();

        let store = InMemoryRuleStore::from_file(file.path()).unwrap();
        let rules = store.list_rules().await.unwrap();
        assert_eq!(rules.len(), 1);

        store.replace(vec![]);
        assert!(store.list_rules().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_rules_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = InMemoryRuleStore::load_or_empty(dir.path().join("rules.json"));
        assert!(store.list_rules().await.unwrap().is_empty());
    }
}
