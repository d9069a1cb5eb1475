//! Sentinel Settlement
//!
//! Records card transactions and settles the approved ones against account
//! balances exactly once.
//!
//! # Flow
//!
//! 1. **Evaluation**: the risk engine classifies the transaction
//! 2. **Settlement**: an approved transaction debits its account
//! 3. **Review**: an `in_review` transaction is finalized once by an analyst,
//!    settling on approval
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{AccountId, InMemoryAccountStore, InMemoryTransactionStore};
//! use risk_engine::RiskEngine;
//! use settlement::{NewTransaction, TransactionEngine};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> settlement::Result<()> {
//!     let engine = TransactionEngine::new(
//!         Arc::new(InMemoryTransactionStore::new()),
//!         Arc::new(InMemoryAccountStore::new()),
//!         Arc::new(RiskEngine::permissive()),
//!     )?;
//!
//!     let tx = engine
//!         .create(NewTransaction {
//!             transaction_id: None,
//!             account_id: AccountId::new("ana@example.com"),
//!             amount: "42.50".parse().unwrap(),
//!             merchant: "Corner Store".to_string(),
//!             location: "Denver, CO".to_string(),
//!             timestamp: "2024-06-01T14:30:00Z".to_string(),
//!         })
//!         .await?;
//!     println!("{} -> {} ({})", tx.transaction_id, tx.status, tx.reason);
//!
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]

pub mod error;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod engine;

// Re-exports
pub use error::{Error, Result};
pub use config::Config;
pub use ledger::{Settlement, SettlementLedger};
pub use metrics::Metrics;
pub use engine::{NewTransaction, TransactionEngine};
