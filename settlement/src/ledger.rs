//! Settlement ledger
//!
//! Debits an account once per approved transaction. Eligibility is checked
//! up front for a precise error; the debit itself is the store's atomic
//! conditional operation, so a balance that drops between the check and the
//! debit still cannot go negative.

use crate::{Error, Result};
use ledger_core::{AccountStore, Transaction, TransactionStatus};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Outcome of a settlement attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Balance debited by the transaction amount
    Debited,
    /// Funds were already applied, nothing changed
    AlreadyApplied,
}

impl Settlement {
    /// Label for logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Settlement::Debited => "debited",
            Settlement::AlreadyApplied => "already_applied",
        }
    }
}

/// Settlement ledger
#[derive(Clone)]
pub struct SettlementLedger {
    accounts: Arc<dyn AccountStore>,
}

impl std::fmt::Debug for SettlementLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementLedger").finish_non_exhaustive()
    }
}

impl SettlementLedger {
    /// Create ledger over an account store
    pub fn new(accounts: Arc<dyn AccountStore>) -> Self {
        Self { accounts }
    }

    /// Debit the account for `transaction` unless funds are already applied
    ///
    /// The caller records `funds_applied` on the transaction and must call
    /// [`SettlementLedger::reverse`] if that write fails.
    pub async fn apply_funds_once(&self, transaction: &Transaction) -> Result<Settlement> {
        if transaction.funds_applied {
            tracing::debug!(
                transaction_id = %transaction.transaction_id,
                "Funds already applied, skipping settlement"
            );
            return Ok(Settlement::AlreadyApplied);
        }

        if transaction.status != TransactionStatus::Approved {
            return Err(Error::Validation(format!(
                "only approved transactions settle, transaction {} is {}",
                transaction.transaction_id, transaction.status
            )));
        }

        let account_id = &transaction.account_id;
        let amount = transaction.amount;

        let account = self
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;

        if account.is_banned {
            return Err(Error::AccountSuspended(account_id.to_string()));
        }

        if account.card_frozen {
            return Err(Error::AccountFrozen(account_id.to_string()));
        }

        if account.balance < amount {
            return Err(Error::InsufficientFunds {
                required: amount,
                available: account.balance,
            });
        }

        if !self.accounts.conditional_debit(account_id, amount).await? {
            let available = self.available(transaction).await;
            return Err(Error::InsufficientFunds {
                required: amount,
                available,
            });
        }

        tracing::info!(
            transaction_id = %transaction.transaction_id,
            account_id = %account_id,
            %amount,
            "Funds applied"
        );

        Ok(Settlement::Debited)
    }

    /// Credit back a debit made by [`SettlementLedger::apply_funds_once`]
    pub async fn reverse(&self, transaction: &Transaction) -> Result<()> {
        self.accounts
            .credit(&transaction.account_id, transaction.amount)
            .await?;

        tracing::warn!(
            transaction_id = %transaction.transaction_id,
            account_id = %transaction.account_id,
            amount = %transaction.amount,
            "Settlement reversed"
        );

        Ok(())
    }

    async fn available(&self, transaction: &Transaction) -> Decimal {
        match self.accounts.get(&transaction.account_id).await {
            Ok(Some(account)) => account.balance,
            _ => Decimal::ZERO,
        }
    }
}
