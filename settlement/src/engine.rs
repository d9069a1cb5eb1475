//! Transaction engine
//!
//! Orchestrates evaluation, the state machine, and settlement:
//!
//! 1. **Create**: validate, evaluate, settle if approved, then persist
//! 2. **Finalize**: `in_review → approved | fraudulent`, settling on approval
//! 3. **Settle**: re-run settlement on an approved record (idempotent)
//!
//! Every write to an existing transaction runs under a per-transaction lock,
//! and the store write itself is guarded on (status, funds_applied). A debit
//! whose record write does not land is credited back before the error is
//! returned.

use crate::{Error, Metrics, Result, Settlement, SettlementLedger};
use chrono::Utc;
use dashmap::DashMap;
use ledger_core::{
    transition, AccountId, AccountStore, AnalystNote, Transaction, TransactionFilter,
    TransactionGuard, TransactionPatch, TransactionStatus, TransactionStore,
};
use risk_engine::{hour_of_day, RiskEngine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Incoming transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransaction {
    /// Caller-supplied ID; generated when absent
    #[serde(default)]
    pub transaction_id: Option<Uuid>,

    /// Account to debit on approval
    pub account_id: AccountId,

    /// Amount (non-negative)
    pub amount: Decimal,

    /// Merchant name
    pub merchant: String,

    /// Location
    #[serde(default)]
    pub location: String,

    /// Transaction time (ISO-8601)
    pub timestamp: String,
}

impl NewTransaction {
    /// Check request fields
    pub fn validate(&self) -> Result<()> {
        if self.amount < Decimal::ZERO {
            return Err(Error::Validation(format!("amount {} is negative", self.amount)));
        }
        if self.account_id.as_str().trim().is_empty() {
            return Err(Error::Validation("account_id is required".to_string()));
        }
        if self.merchant.trim().is_empty() {
            return Err(Error::Validation("merchant is required".to_string()));
        }
        if hour_of_day(&self.timestamp).is_none() {
            return Err(Error::Validation(format!(
                "timestamp {:?} is not ISO-8601",
                self.timestamp
            )));
        }
        Ok(())
    }
}

/// Transaction engine
pub struct TransactionEngine {
    transactions: Arc<dyn TransactionStore>,
    ledger: SettlementLedger,
    risk: Arc<RiskEngine>,
    metrics: Metrics,
    locks: DashMap<Uuid, Arc<Mutex<()>>>,
}

impl std::fmt::Debug for TransactionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionEngine")
            .field("risk", &self.risk)
            .field("ledger", &self.ledger)
            .field("locks", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl TransactionEngine {
    /// Create engine over the given stores
    pub fn new(
        transactions: Arc<dyn TransactionStore>,
        accounts: Arc<dyn AccountStore>,
        risk: Arc<RiskEngine>,
    ) -> Result<Self> {
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        Ok(Self {
            transactions,
            ledger: SettlementLedger::new(accounts),
            risk,
            metrics,
            locks: DashMap::new(),
        })
    }

    /// Metrics collector
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Evaluate and record a new transaction
    ///
    /// An approved transaction is settled before it is stored. If settlement
    /// fails nothing is stored and the settlement error is returned.
    pub async fn create(&self, request: NewTransaction) -> Result<Transaction> {
        request.validate()?;

        let evaluation = self
            .risk
            .evaluate(request.amount, &request.merchant, &request.timestamp)
            .await;
        self.metrics.record_evaluation(&evaluation);

        let mut transaction = Transaction {
            transaction_id: request.transaction_id.unwrap_or_else(Uuid::new_v4),
            account_id: request.account_id,
            amount: request.amount,
            merchant: request.merchant,
            location: request.location,
            status: evaluation.status,
            reason: evaluation.reason,
            created_at: Utc::now(),
            risk_score: evaluation.risk_score,
            notes: Vec::new(),
            funds_applied: false,
        };

        if transaction.status == TransactionStatus::Approved {
            self.settle_funds(&transaction).await?;
            transaction.funds_applied = true;
        }

        if let Err(e) = self.transactions.create(transaction.clone()).await {
            if transaction.funds_applied {
                self.compensate(&transaction).await;
            }
            return Err(e.into());
        }

        tracing::info!(
            transaction_id = %transaction.transaction_id,
            account_id = %transaction.account_id,
            amount = %transaction.amount,
            status = %transaction.status,
            reason = %transaction.reason,
            "Transaction created"
        );

        Ok(transaction)
    }

    /// Move an `in_review` transaction to a terminal status
    pub async fn finalize(
        &self,
        transaction_id: Uuid,
        decision: TransactionStatus,
        note: Option<AnalystNote>,
    ) -> Result<Transaction> {
        let result = self
            .with_lock(transaction_id, || self.finalize_locked(transaction_id, decision, note))
            .await;
        self.observe(&result);
        result
    }

    /// Append an analyst note to an `in_review` transaction
    pub async fn annotate(
        &self,
        transaction_id: Uuid,
        analyst: &str,
        note: &str,
    ) -> Result<Transaction> {
        if analyst.trim().is_empty() || note.trim().is_empty() {
            return Err(Error::Validation("analyst and note are required".to_string()));
        }

        let note = AnalystNote::new(analyst, note);
        let result = self
            .with_lock(transaction_id, || async move {
                let record = self.load(transaction_id).await?;
                let guard = TransactionGuard {
                    status: record.status,
                    funds_applied: record.funds_applied,
                };
                self.apply(transaction_id, guard, TransactionPatch::note(note))
                    .await
            })
            .await;
        self.observe(&result);
        result
    }

    /// Settle an approved transaction; no-op when funds are already applied
    pub async fn settle(&self, transaction_id: Uuid) -> Result<Transaction> {
        let result = self
            .with_lock(transaction_id, || async move {
                let record = self.load(transaction_id).await?;
                if record.funds_applied {
                    self.metrics.record_settlement(Settlement::AlreadyApplied.as_str());
                    return Ok(record);
                }

                if record.status == TransactionStatus::Fraudulent {
                    return Err(Error::FinalityConflict(record.status));
                }

                if self.settle_funds(&record).await? == Settlement::AlreadyApplied {
                    return Ok(record);
                }

                let guard = TransactionGuard::unsettled(TransactionStatus::Approved);
                self.apply_settled(&record, guard, TransactionPatch::funds_applied())
                    .await
            })
            .await;
        self.observe(&result);
        result
    }

    /// Fetch a transaction
    pub async fn get(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.load(transaction_id).await
    }

    /// List transactions, newest first
    pub async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        Ok(self.transactions.list(filter).await?)
    }

    async fn finalize_locked(
        &self,
        transaction_id: Uuid,
        decision: TransactionStatus,
        note: Option<AnalystNote>,
    ) -> Result<Transaction> {
        let record = self.load(transaction_id).await?;
        let next = transition(record.status, decision)?;

        let mut patch = TransactionPatch::finalize(next);
        if let Some(note) = note {
            patch = patch.with_note(note);
        }
        let guard = TransactionGuard::unsettled(record.status);

        let updated = if next == TransactionStatus::Approved {
            let approved = Transaction {
                status: TransactionStatus::Approved,
                ..record
            };
            self.settle_funds(&approved).await?;
            self.apply_settled(&approved, guard, patch.with_funds_applied())
                .await?
        } else {
            self.apply(transaction_id, guard, patch).await?
        };

        tracing::info!(
            %transaction_id,
            status = %updated.status,
            funds_applied = updated.funds_applied,
            "Transaction finalized"
        );

        Ok(updated)
    }

    /// Run settlement and count the outcome
    async fn settle_funds(&self, transaction: &Transaction) -> Result<Settlement> {
        match self.ledger.apply_funds_once(transaction).await {
            Ok(settlement) => {
                self.metrics.record_settlement(settlement.as_str());
                Ok(settlement)
            }
            Err(e) => {
                self.metrics.record_settlement(e.code());
                tracing::warn!(
                    transaction_id = %transaction.transaction_id,
                    account_id = %transaction.account_id,
                    error = %e,
                    "Settlement failed"
                );
                Err(e)
            }
        }
    }

    /// Write a patch that records a debit already made; reverse it if the write fails
    async fn apply_settled(
        &self,
        settled: &Transaction,
        guard: TransactionGuard,
        patch: TransactionPatch,
    ) -> Result<Transaction> {
        let transaction_id = settled.transaction_id;
        match self.apply(transaction_id, guard, patch).await {
            Ok(updated) => Ok(updated),
            Err(e) => {
                self.compensate(settled).await;
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        transaction_id: Uuid,
        guard: TransactionGuard,
        patch: TransactionPatch,
    ) -> Result<Transaction> {
        if !self
            .transactions
            .conditional_update(transaction_id, guard, patch)
            .await?
        {
            return Err(self.conflict(transaction_id).await);
        }
        self.load(transaction_id).await
    }

    /// Error for a guarded write that did not apply
    async fn conflict(&self, transaction_id: Uuid) -> Error {
        match self.load(transaction_id).await {
            Ok(current) if current.is_terminal() => Error::FinalityConflict(current.status),
            Ok(_) => Error::Persistence(format!(
                "transaction {} was modified concurrently",
                transaction_id
            )),
            Err(e) => e,
        }
    }

    async fn compensate(&self, transaction: &Transaction) {
        if let Err(e) = self.ledger.reverse(transaction).await {
            tracing::error!(
                transaction_id = %transaction.transaction_id,
                account_id = %transaction.account_id,
                amount = %transaction.amount,
                error = %e,
                "Failed to reverse settlement"
            );
        }
    }

    async fn load(&self, transaction_id: Uuid) -> Result<Transaction> {
        self.transactions
            .get(transaction_id)
            .await?
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))
    }

    fn observe<T>(&self, result: &Result<T>) {
        if let Err(Error::FinalityConflict(status)) = result {
            tracing::warn!(%status, "Update rejected: transaction is final");
            self.metrics.record_finality_conflict();
        }
    }

    /// Run `op` while holding the lock for `transaction_id`
    async fn with_lock<F, Fut, T>(&self, transaction_id: Uuid, op: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let lock = self.locks.entry(transaction_id).or_default().clone();
        let result = {
            let _guard = lock.lock().await;
            op().await
        };
        drop(lock);
        self.locks
            .remove_if(&transaction_id, |_, lock| Arc::strong_count(lock) == 1);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_core::{Account, InMemoryAccountStore, InMemoryTransactionStore};
    use rust_decimal_macros::dec;

    fn request(account: &str, amount: Decimal) -> NewTransaction {
        NewTransaction {
            transaction_id: None,
            account_id: AccountId::new(account),
            amount,
            merchant: "Corner Store".to_string(),
            location: "Denver, CO".to_string(),
            timestamp: "2024-06-01T14:30:00Z".to_string(),
        }
    }

    fn engine(accounts: Vec<Account>) -> (TransactionEngine, Arc<InMemoryAccountStore>) {
        let accounts = Arc::new(InMemoryAccountStore::with_accounts(accounts));
        let engine = TransactionEngine::new(
            Arc::new(InMemoryTransactionStore::new()),
            accounts.clone(),
            Arc::new(RiskEngine::permissive()),
        )
        .unwrap();
        (engine, accounts)
    }

    #[test]
    fn test_validation() {
        assert!(request("ana", dec!(0)).validate().is_ok());
        assert!(matches!(request("ana", dec!(-1)).validate(), Err(Error::Validation(_))));
        assert!(matches!(request(" ", dec!(1)).validate(), Err(Error::Validation(_))));

        let mut bad_time = request("ana", dec!(1));
        bad_time.timestamp = "yesterday".to_string();
        assert!(matches!(bad_time.validate(), Err(Error::Validation(_))));

        let mut no_merchant = request("ana", dec!(1));
        no_merchant.merchant = String::new();
        assert!(matches!(no_merchant.validate(), Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_create_approved_settles() {
        let (engine, accounts) = engine(vec![Account::new("ana", dec!(100))]);

        let tx = engine.create(request("ana", dec!(30))).await.unwrap();
        assert_eq!(tx.status, TransactionStatus::Approved);
        assert!(tx.funds_applied);
        assert_eq!(accounts.balance(&tx.account_id), Some(dec!(70)));
        assert_eq!(engine.metrics().settlements.with_label_values(&["debited"]).get(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_id_reverses_debit() {
        let (engine, accounts) = engine(vec![Account::new("ana", dec!(100))]);
        let id = Uuid::new_v4();

        let mut first = request("ana", dec!(30));
        first.transaction_id = Some(id);
        engine.create(first.clone()).await.unwrap();

        let result = engine.create(first).await;
        assert!(matches!(result, Err(Error::Validation(_))));
        assert_eq!(accounts.balance(&AccountId::new("ana")), Some(dec!(70)));
    }

    #[tokio::test]
    async fn test_locks_released() {
        let (engine, _) = engine(vec![Account::new("ana", dec!(100))]);
        let tx = engine.create(request("ana", dec!(10))).await.unwrap();

        let _ = engine.settle(tx.transaction_id).await.unwrap();
        let _ = engine.finalize(tx.transaction_id, TransactionStatus::Fraudulent, None).await;
        assert!(engine.locks.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let (engine, _) = engine(vec![]);
        assert!(matches!(
            engine.get(Uuid::new_v4()).await,
            Err(Error::TransactionNotFound(_))
        ));
    }
}
