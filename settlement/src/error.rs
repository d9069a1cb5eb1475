//! Error types for settlement

use ledger_core::TransactionStatus;
use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for settlement operations
pub type Result<T> = std::result::Result<T, Error>;

/// Settlement errors
#[derive(Error, Debug)]
pub enum Error {
    /// Request failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Account does not exist
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Account is banned
    #[error("Account suspended: {0}")]
    AccountSuspended(String),

    /// Card is frozen
    #[error("Account frozen: {0}")]
    AccountFrozen(String),

    /// Balance below the transaction amount
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Transaction amount
        required: Decimal,
        /// Balance at the time of the check
        available: Decimal,
    },

    /// Mutation attempted on a terminal transaction
    #[error("Finality conflict: transaction is already {0}")]
    FinalityConflict(TransactionStatus),

    /// Requested status change is not a legal transition
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status
        from: TransactionStatus,
        /// Requested status
        to: TransactionStatus,
    },

    /// Transaction does not exist
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Store failure; safe to retry
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable error code for callers
    pub fn code(&self) -> &'static str {
        match self {
            Error::Validation(_) => "validation_error",
            Error::AccountNotFound(_) => "account_not_found",
            Error::AccountSuspended(_) => "account_suspended",
            Error::AccountFrozen(_) => "account_frozen",
            Error::InsufficientFunds { .. } => "insufficient_funds",
            Error::FinalityConflict(_) => "finality_conflict",
            Error::InvalidTransition { .. } => "invalid_transition",
            Error::TransactionNotFound(_) => "transaction_not_found",
            Error::Persistence(_) => "persistence_failure",
            Error::Config(_) => "config_error",
            Error::Io(_) => "io_error",
        }
    }

    /// True if the caller may retry the same request
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Persistence(_))
    }
}

impl From<ledger_core::Error> for Error {
    fn from(err: ledger_core::Error) -> Self {
        match err {
            ledger_core::Error::TransactionNotFound(id) => Error::TransactionNotFound(id),
            ledger_core::Error::DuplicateTransaction(id) => {
                Error::Validation(format!("duplicate transaction id {}", id))
            }
            ledger_core::Error::FinalityConflict(status) => Error::FinalityConflict(status),
            ledger_core::Error::InvalidTransition { from, to } => {
                Error::InvalidTransition { from, to }
            }
            ledger_core::Error::InvalidPatch(msg) => Error::Validation(msg),
            ledger_core::Error::InvalidAmount(msg) => Error::Validation(msg),
            ledger_core::Error::Persistence(msg) => Error::Persistence(msg),
        }
    }
}

impl From<risk_engine::Error> for Error {
    fn from(err: risk_engine::Error) -> Self {
        match err {
            risk_engine::Error::Io(e) => Error::Io(e),
            other => Error::Config(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_errors_map_to_taxonomy() {
        let err: Error = ledger_core::Error::FinalityConflict(TransactionStatus::Approved).into();
        assert!(matches!(err, Error::FinalityConflict(TransactionStatus::Approved)));

        let err: Error = ledger_core::Error::InvalidTransition {
            from: TransactionStatus::InReview,
            to: TransactionStatus::InReview,
        }
        .into();
        assert_eq!(err.code(), "invalid_transition");

        let err: Error = ledger_core::Error::Persistence("disk full".to_string()).into();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_insufficient_funds_message() {
        let err = Error::InsufficientFunds {
            required: Decimal::new(100, 0),
            available: Decimal::new(50, 0),
        };
        assert_eq!(err.to_string(), "Insufficient funds: required 100, available 50");
        assert!(!err.is_retryable());
    }
}
