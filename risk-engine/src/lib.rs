//! Risk Engine for Sentinel
//!
//! Real-time fraud classification for card transactions:
//!
//! 1. **Scoring**: an opaque classifier turns (amount, hour) into a fraud probability
//! 2. **Rules**: an ordered rule set may escalate the result
//! 3. **Classification**: score and rule outcome merge into one status and reason
//!
//! Scoring and rule loading never fail an evaluation. A missing model or an
//! unreachable rule store degrades to "no signal" and is reported alongside
//! the result.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod types;
pub mod config;
pub mod features;
pub mod model;
pub mod scoring;
pub mod rules;
pub mod classifier;
pub mod engine;

pub use error::{Error, Result};
pub use types::*;
pub use config::RiskConfig;
pub use features::{hour_of_day, FeatureVector};
pub use model::{FeatureWeights, LogisticModel, RiskModel};
pub use scoring::RiskScorer;
pub use rules::{FraudRule, InMemoryRuleStore, RuleCondition, RuleEngine, RuleStore};
pub use classifier::StatusClassifier;
pub use engine::RiskEngine;
