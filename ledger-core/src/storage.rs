//! Store interfaces and in-memory backends
//!
//! Stores are the only place records change. Both conditional operations
//! (`conditional_update`, `conditional_debit`) check and write while holding
//! the per-key shard lock, so concurrent callers serialize on the record.

use crate::{
    check_patch, Account, AccountId, Error, Result, Transaction, TransactionFilter,
    TransactionGuard, TransactionPatch,
};
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use uuid::Uuid;

/// Transaction persistence
#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Insert a new record; fails if the ID is taken
    async fn create(&self, transaction: Transaction) -> Result<()>;

    /// Fetch a record
    async fn get(&self, transaction_id: Uuid) -> Result<Option<Transaction>>;

    /// Apply `patch` iff the record still matches `expected`
    ///
    /// Returns `Ok(false)` when the guard does not match. The patch is
    /// validated against the state machine before it is written.
    async fn conditional_update(
        &self,
        transaction_id: Uuid,
        expected: TransactionGuard,
        patch: TransactionPatch,
    ) -> Result<bool>;

    /// List records matching `filter`, newest first
    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
}

/// Account persistence
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Fetch an account
    async fn get(&self, account_id: &AccountId) -> Result<Option<Account>>;

    /// Decrement balance by `amount` iff `balance >= amount`
    ///
    /// Returns `Ok(false)` when the balance is insufficient or the account
    /// does not exist.
    async fn conditional_debit(&self, account_id: &AccountId, amount: Decimal) -> Result<bool>;

    /// Increment balance by `amount` (used to reverse a debit)
    async fn credit(&self, account_id: &AccountId, amount: Decimal) -> Result<()>;
}

/// In-memory transaction store
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<Uuid, Transaction>,
}

impl InMemoryTransactionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored transactions
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// True if no transactions are stored
    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn create(&self, transaction: Transaction) -> Result<()> {
        match self.transactions.entry(transaction.transaction_id) {
            Entry::Occupied(_) => Err(Error::DuplicateTransaction(
                transaction.transaction_id.to_string(),
            )),
            Entry::Vacant(slot) => {
                slot.insert(transaction);
                Ok(())
            }
        }
    }

    async fn get(&self, transaction_id: Uuid) -> Result<Option<Transaction>> {
        Ok(self.transactions.get(&transaction_id).map(|tx| tx.clone()))
    }

    async fn conditional_update(
        &self,
        transaction_id: Uuid,
        expected: TransactionGuard,
        patch: TransactionPatch,
    ) -> Result<bool> {
        let mut record = self
            .transactions
            .get_mut(&transaction_id)
            .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

        if !expected.matches(&record) {
            tracing::debug!(
                %transaction_id,
                status = %record.status,
                funds_applied = record.funds_applied,
                "Conditional update skipped: guard mismatch"
            );
            return Ok(false);
        }

        check_patch(&record, &patch)?;
        record.apply_patch(&patch);
        Ok(true)
    }

    async fn list(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        let mut matching: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.transaction_id.cmp(&a.transaction_id))
        });

        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }

        Ok(matching)
    }
}

/// In-memory account store
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<AccountId, Account>,
}

impl InMemoryAccountStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store seeded with `accounts`
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.insert(account);
        }
        store
    }

    /// Insert or replace an account (administrative seeding)
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.account_id.clone(), account);
    }

    /// Current balance, if the account exists
    pub fn balance(&self, account_id: &AccountId) -> Option<Decimal> {
        self.accounts.get(account_id).map(|account| account.balance)
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, account_id: &AccountId) -> Result<Option<Account>> {
        Ok(self.accounts.get(account_id).map(|account| account.clone()))
    }

    async fn conditional_debit(&self, account_id: &AccountId, amount: Decimal) -> Result<bool> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidAmount(format!("cannot debit {}", amount)));
        }

        let Some(mut account) = self.accounts.get_mut(account_id) else {
            return Ok(false);
        };

        if account.balance < amount {
            return Ok(false);
        }

        account.balance -= amount;
        Ok(true)
    }

    async fn credit(&self, account_id: &AccountId, amount: Decimal) -> Result<()> {
        if amount.is_sign_negative() {
            return Err(Error::InvalidAmount(format!("cannot credit {}", amount)));
        }

        let mut account = self
            .accounts
            .get_mut(account_id)
            .ok_or_else(|| Error::Persistence(format!("account {} disappeared", account_id)))?;
        account.balance += amount;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransactionStatus;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn transaction(status: TransactionStatus) -> Transaction {
        Transaction {
            transaction_id: Uuid::new_v4(),
            account_id: AccountId::new("erin@example.com"),
            amount: dec!(25),
            merchant: "Bookshop".to_string(),
            location: "Portland, OR".to_string(),
            status,
            reason: "test".to_string(),
            created_at: Utc::now(),
            risk_score: Some(0.1),
            notes: vec![],
            funds_applied: false,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryTransactionStore::new();
        let tx = transaction(TransactionStatus::InReview);
        store.create(tx.clone()).await.unwrap();

        let fetched = store.get(tx.transaction_id).await.unwrap().unwrap();
        assert_eq!(fetched, tx);
        assert!(store.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_rejected() {
        let store = InMemoryTransactionStore::new();
        let tx = transaction(TransactionStatus::Approved);
        store.create(tx.clone()).await.unwrap();

        let result = store.create(tx).await;
        assert!(matches!(result, Err(Error::DuplicateTransaction(_))));
    }

    #[tokio::test]
    async fn test_conditional_update_guard_mismatch() {
        let store = InMemoryTransactionStore::new();
        let tx = transaction(TransactionStatus::InReview);
        store.create(tx.clone()).await.unwrap();

        let applied = store
            .conditional_update(
                tx.transaction_id,
                TransactionGuard::unsettled(TransactionStatus::Approved),
                TransactionPatch::funds_applied(),
            )
            .await
            .unwrap();
        assert!(!applied);

        let applied = store
            .conditional_update(
                tx.transaction_id,
                TransactionGuard::unsettled(TransactionStatus::InReview),
                TransactionPatch::finalize(TransactionStatus::Fraudulent),
            )
            .await
            .unwrap();
        assert!(applied);

        let stored = store.get(tx.transaction_id).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Fraudulent);
    }

    #[tokio::test]
    async fn test_conditional_update_missing_record() {
        let store = InMemoryTransactionStore::new();
        let result = store
            .conditional_update(
                Uuid::new_v4(),
                TransactionGuard::unsettled(TransactionStatus::InReview),
                TransactionPatch::finalize(TransactionStatus::Approved),
            )
            .await;
        assert!(matches!(result, Err(Error::TransactionNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_newest_first_with_limit() {
        let store = InMemoryTransactionStore::new();
        let mut older = transaction(TransactionStatus::Approved);
        older.created_at = Utc::now() - Duration::hours(1);
        let newer = transaction(TransactionStatus::Approved);
        let review = transaction(TransactionStatus::InReview);

        store.create(older.clone()).await.unwrap();
        store.create(newer.clone()).await.unwrap();
        store.create(review).await.unwrap();

        let filter = TransactionFilter {
            status: Some(TransactionStatus::Approved),
            ..Default::default()
        };
        let listed = store.list(&filter).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].transaction_id, newer.transaction_id);

        let limited = store
            .list(&TransactionFilter {
                limit: Some(1),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_conditional_debit() {
        let store = InMemoryAccountStore::with_accounts([Account::new("frank", dec!(50))]);
        let id = AccountId::new("frank");

        assert!(!store.conditional_debit(&id, dec!(100)).await.unwrap());
        assert_eq!(store.balance(&id), Some(dec!(50)));

        assert!(store.conditional_debit(&id, dec!(50)).await.unwrap());
        assert_eq!(store.balance(&id), Some(dec!(0)));

        assert!(!store
            .conditional_debit(&AccountId::new("nobody"), dec!(1))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_credit_reverses_debit() {
        let store = InMemoryAccountStore::with_accounts([Account::new("gina", dec!(80))]);
        let id = AccountId::new("gina");

        assert!(store.conditional_debit(&id, dec!(30)).await.unwrap());
        store.credit(&id, dec!(30)).await.unwrap();
        assert_eq!(store.balance(&id), Some(dec!(80)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_debits_never_overdraw() {
        let store = Arc::new(InMemoryAccountStore::with_accounts([Account::new(
            "hank",
            dec!(100),
        )]));
        let id = AccountId::new("hank");

        let mut handles = Vec::new();
        for _ in 0..10 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                store.conditional_debit(&id, dec!(30)).await.unwrap()
            }));
        }

        let mut applied = 0;
        for handle in handles {
            if handle.await.unwrap() {
                applied += 1;
            }
        }

        assert_eq!(applied, 3);
        assert_eq!(store.balance(&id), Some(dec!(10)));
    }
}
