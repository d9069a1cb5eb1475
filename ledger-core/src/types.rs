//! Core types for the ledger
//!
//! All types are designed for:
//! - Exact arithmetic (Decimal for money)
//! - Closed, typed updates (no free-form patch payloads)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Account identifier (email or account number)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    /// Create new account ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction status
///
/// Ordering follows severity: `Approved < InReview < Fraudulent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Cleared, funds move (terminal)
    Approved,
    /// Waiting on an analyst decision
    InReview,
    /// Blocked (terminal)
    Fraudulent,
}

impl TransactionStatus {
    /// Severity rank (0-2)
    pub fn severity(&self) -> u8 {
        match self {
            TransactionStatus::Approved => 0,
            TransactionStatus::InReview => 1,
            TransactionStatus::Fraudulent => 2,
        }
    }

    /// Check if status is terminal
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransactionStatus::Approved | TransactionStatus::Fraudulent)
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Approved => "approved",
            TransactionStatus::InReview => "in_review",
            TransactionStatus::Fraudulent => "fraudulent",
        }
    }

    /// Parse from wire name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "approved" => Some(TransactionStatus::Approved),
            "in_review" => Some(TransactionStatus::InReview),
            "fraudulent" => Some(TransactionStatus::Fraudulent),
            _ => None,
        }
    }

    /// The more severe of two statuses; ties keep `self`
    pub fn escalate(self, other: TransactionStatus) -> TransactionStatus {
        if other.severity() > self.severity() {
            other
        } else {
            self
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Analyst note attached to a transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalystNote {
    /// When the note was written
    pub timestamp: DateTime<Utc>,
    /// Analyst who wrote it
    pub analyst: String,
    /// Free text
    pub note: String,
}

impl AnalystNote {
    /// Create a note stamped with the current time
    pub fn new(analyst: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            analyst: analyst.into(),
            note: note.into(),
        }
    }
}

/// Transaction record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID
    pub transaction_id: Uuid,

    /// Account debited on approval
    pub account_id: AccountId,

    /// Amount (non-negative)
    pub amount: Decimal,

    /// Merchant name
    pub merchant: String,

    /// Location as reported by the card network
    pub location: String,

    /// Current status
    pub status: TransactionStatus,

    /// Human-readable classification reason
    pub reason: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Model fraud probability, if scoring was available
    pub risk_score: Option<f64>,

    /// Analyst notes, oldest first
    #[serde(default)]
    pub notes: Vec<AnalystNote>,

    /// Balance already debited for this transaction
    #[serde(default)]
    pub funds_applied: bool,
}

impl Transaction {
    /// Check if transaction is in a terminal status
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Apply a patch in place. Callers validate with [`crate::check_patch`] first.
    pub fn apply_patch(&mut self, patch: &TransactionPatch) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(ref reason) = patch.reason {
            self.reason = reason.clone();
        }
        if let Some(funds_applied) = patch.funds_applied {
            self.funds_applied = funds_applied;
        }
        if let Some(ref note) = patch.note {
            self.notes.push(note.clone());
        }
    }
}

/// Account record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Account identifier
    pub account_id: AccountId,

    /// Available balance
    pub balance: Decimal,

    /// Suspended by an administrator
    #[serde(default)]
    pub is_banned: bool,

    /// Card frozen by the holder or an administrator
    #[serde(default)]
    pub card_frozen: bool,
}

impl Account {
    /// Create an active account with the given balance
    pub fn new(account_id: impl Into<String>, balance: Decimal) -> Self {
        Self {
            account_id: AccountId::new(account_id),
            balance,
            is_banned: false,
            card_frozen: false,
        }
    }
}

/// Closed set of transaction mutations
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionPatch {
    /// New status
    pub status: Option<TransactionStatus>,

    /// New reason text
    pub reason: Option<String>,

    /// Funds flag (may only be set to true)
    pub funds_applied: Option<bool>,

    /// Note to append
    pub note: Option<AnalystNote>,
}

impl TransactionPatch {
    /// Patch that finalizes to `status`
    pub fn finalize(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    /// Patch that only marks funds as applied
    pub fn funds_applied() -> Self {
        Self {
            funds_applied: Some(true),
            ..Default::default()
        }
    }

    /// Patch that only appends a note
    pub fn note(note: AnalystNote) -> Self {
        Self {
            note: Some(note),
            ..Default::default()
        }
    }

    /// Attach a note
    pub fn with_note(mut self, note: AnalystNote) -> Self {
        self.note = Some(note);
        self
    }

    /// Mark funds as applied alongside the other fields
    pub fn with_funds_applied(mut self) -> Self {
        self.funds_applied = Some(true);
        self
    }

    /// True if the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.reason.is_none()
            && self.funds_applied.is_none()
            && self.note.is_none()
    }

    /// True if the patch only sets the funds flag
    pub fn is_settlement_only(&self) -> bool {
        self.funds_applied == Some(true)
            && self.status.is_none()
            && self.reason.is_none()
            && self.note.is_none()
    }
}

/// Expected record state for a conditional update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionGuard {
    /// Expected status
    pub status: TransactionStatus,
    /// Expected funds flag
    pub funds_applied: bool,
}

impl TransactionGuard {
    /// Guard matching an unsettled record in `status`
    pub fn unsettled(status: TransactionStatus) -> Self {
        Self {
            status,
            funds_applied: false,
        }
    }

    /// Check the guard against a record
    pub fn matches(&self, transaction: &Transaction) -> bool {
        transaction.status == self.status && transaction.funds_applied == self.funds_applied
    }
}

/// Filter for listing transactions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Only this account
    pub account_id: Option<AccountId>,
    /// Only this status
    pub status: Option<TransactionStatus>,
    /// Only settled / unsettled records
    pub funds_applied: Option<bool>,
    /// Maximum number of records
    pub limit: Option<usize>,
}

impl TransactionFilter {
    /// Check a record against the filter (ignores `limit`)
    pub fn matches(&self, transaction: &Transaction) -> bool {
        if let Some(ref account_id) = self.account_id {
            if &transaction.account_id != account_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if transaction.status != status {
                return false;
            }
        }
        if let Some(funds_applied) = self.funds_applied {
            if transaction.funds_applied != funds_applied {
                return false;
            }
        }
        true
    }
}
