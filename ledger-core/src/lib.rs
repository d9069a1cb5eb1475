//! Sentinel Ledger Core
//!
//! Transaction and account records, the transaction state machine, and the
//! store interfaces the risk and settlement layers are built on.
//!
//! # Invariants
//!
//! - Finality: `approved` and `fraudulent` are terminal, no status change afterwards
//! - Single transition: the only legal move is `in_review → approved | fraudulent`
//! - Funds flag: `funds_applied` is only ever set on an approved record, never cleared
//! - No overdraft: balance checks and debits are one atomic conditional operation

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod types;
pub mod state;
pub mod storage;
pub mod error;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    Account, AccountId, AnalystNote, Transaction, TransactionFilter, TransactionGuard,
    TransactionPatch, TransactionStatus,
};
pub use state::{check_patch, transition};
pub use storage::{AccountStore, InMemoryAccountStore, InMemoryTransactionStore, TransactionStore};
