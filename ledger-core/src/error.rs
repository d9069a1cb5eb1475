//! Error types for the ledger

use crate::types::TransactionStatus;
use thiserror::Error;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Transaction not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Transaction identifier already in use
    #[error("Duplicate transaction: {0}")]
    DuplicateTransaction(String),

    /// Mutation attempted on a transaction in a terminal status
    #[error("Transaction is final ({0}), no further updates allowed")]
    FinalityConflict(TransactionStatus),

    /// Requested status change is not a legal transition
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: TransactionStatus,
        /// Requested status
        to: TransactionStatus,
    },

    /// Patch is structurally invalid
    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    /// Amount is negative or otherwise unusable
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Backing store unreachable or write failed
    #[error("Persistence failure: {0}")]
    Persistence(String),
}
