//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `risk_evaluations_total{status}` - Evaluations by final status
//! - `risk_degradations_total{kind}` - Absorbed scoring / rule store failures
//! - `settlements_total{outcome}` - Settlement attempts by outcome
//! - `finality_conflicts_total` - Rejected mutations of terminal transactions

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};
use risk_engine::Evaluation;
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Evaluations by status
    pub evaluations: IntCounterVec,

    /// Degradations by kind
    pub degradations: IntCounterVec,

    /// Settlements by outcome
    pub settlements: IntCounterVec,

    /// Finality conflicts
    pub finality_conflicts: IntCounter,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("finality_conflicts", &self.finality_conflicts.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector with its own registry
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let evaluations = IntCounterVec::new(
            Opts::new("risk_evaluations_total", "Evaluations by final status"),
            &["status"],
        )?;
        registry.register(Box::new(evaluations.clone()))?;

        let degradations = IntCounterVec::new(
            Opts::new("risk_degradations_total", "Degraded conditions absorbed during evaluation"),
            &["kind"],
        )?;
        registry.register(Box::new(degradations.clone()))?;

        let settlements = IntCounterVec::new(
            Opts::new("settlements_total", "Settlement attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(settlements.clone()))?;

        let finality_conflicts = IntCounter::new(
            "finality_conflicts_total",
            "Rejected mutations of terminal transactions",
        )?;
        registry.register(Box::new(finality_conflicts.clone()))?;

        Ok(Self {
            evaluations,
            degradations,
            settlements,
            finality_conflicts,
            registry,
        })
    }

    /// Record a finished evaluation
    pub fn record_evaluation(&self, evaluation: &Evaluation) {
        self.evaluations
            .with_label_values(&[evaluation.status.as_str()])
            .inc();
        for degradation in &evaluation.degradations {
            self.degradations
                .with_label_values(&[degradation.kind()])
                .inc();
        }
    }

    /// Record a settlement attempt
    pub fn record_settlement(&self, outcome: &str) {
        self.settlements.with_label_values(&[outcome]).inc();
    }

    /// Record a finality conflict
    pub fn record_finality_conflict(&self) {
        self.finality_conflicts.inc();
    }

    /// Render in the Prometheus text format
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
