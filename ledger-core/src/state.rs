//! Transaction state machine
//!
//! ```text
//!   create ──▶ in_review ──finalize──▶ approved   (terminal)
//!     │                    └─────────▶ fraudulent (terminal)
//!     └──────▶ approved | fraudulent   (classified terminal on creation)
//! ```
//!
//! Every status change goes through [`transition`]; every record mutation
//! goes through [`check_patch`], which stores call under their per-record
//! write lock so the check and the write are one step.

use crate::{Error, Result, Transaction, TransactionPatch, TransactionStatus};

/// Validate `current → requested` and return the new status
pub fn transition(current: TransactionStatus, requested: TransactionStatus) -> Result<TransactionStatus> {
    if current.is_terminal() {
        return Err(Error::FinalityConflict(current));
    }

    if !requested.is_terminal() {
        return Err(Error::InvalidTransition {
            from: current,
            to: requested,
        });
    }

    Ok(requested)
}

/// Validate a patch against the current record
///
/// Terminal records accept exactly one kind of write: marking funds as
/// applied on an approved, unsettled record. Everything else is a
/// finality conflict.
pub fn check_patch(current: &Transaction, patch: &TransactionPatch) -> Result<()> {
    if patch.is_empty() {
        return Err(Error::InvalidPatch("empty patch".to_string()));
    }

    if patch.funds_applied == Some(false) {
        return Err(Error::InvalidPatch(
            "funds_applied cannot be cleared".to_string(),
        ));
    }

    if let Some(ref reason) = patch.reason {
        if reason.trim().is_empty() {
            return Err(Error::InvalidPatch("reason cannot be blank".to_string()));
        }
    }

    if current.is_terminal() {
        let settles_approved = patch.is_settlement_only()
            && current.status == TransactionStatus::Approved
            && !current.funds_applied;
        if !settles_approved {
            return Err(Error::FinalityConflict(current.status));
        }
        return Ok(());
    }

    let next_status = match patch.status {
        Some(requested) => transition(current.status, requested)?,
        None => current.status,
    };

    if patch.funds_applied == Some(true) && next_status != TransactionStatus::Approved {
        return Err(Error::InvalidPatch(format!(
            "funds can only be applied to approved transactions, not {}",
            next_status
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AccountId, AnalystNote};
    use chrono::Utc;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn transaction(status: TransactionStatus, funds_applied: bool) -> Transaction {
        Transaction {
            transaction_id: Uuid::new_v4(),
            account_id: AccountId::new("carol@example.com"),
            amount: dec!(100),
            merchant: "Hardware Depot".to_string(),
            location: "Denver, CO".to_string(),
            status,
            reason: "test".to_string(),
            created_at: Utc::now(),
            risk_score: None,
            notes: vec![],
            funds_applied,
        }
    }

    fn status_strategy() -> impl Strategy<Value = TransactionStatus> {
        prop_oneof![
            Just(TransactionStatus::Approved),
            Just(TransactionStatus::InReview),
            Just(TransactionStatus::Fraudulent),
        ]
    }

    #[test]
    fn test_in_review_finalizes() {
        assert_eq!(
            transition(TransactionStatus::InReview, TransactionStatus::Approved).unwrap(),
            TransactionStatus::Approved
        );
        assert_eq!(
            transition(TransactionStatus::InReview, TransactionStatus::Fraudulent).unwrap(),
            TransactionStatus::Fraudulent
        );
    }

    #[test]
    fn test_in_review_to_in_review_is_invalid() {
        let err = transition(TransactionStatus::InReview, TransactionStatus::InReview).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
    }

    #[test]
    fn test_same_terminal_status_is_conflict() {
        let err = transition(TransactionStatus::Approved, TransactionStatus::Approved).unwrap_err();
        assert!(matches!(err, Error::FinalityConflict(TransactionStatus::Approved)));
    }

    #[test]
    fn test_note_on_terminal_rejected() {
        let tx = transaction(TransactionStatus::Fraudulent, false);
        let patch = TransactionPatch::note(AnalystNote::new("dave", "late note"));
        assert!(matches!(
            check_patch(&tx, &patch),
            Err(Error::FinalityConflict(TransactionStatus::Fraudulent))
        ));
    }

    #[test]
    fn test_settlement_flag_on_approved() {
        let tx = transaction(TransactionStatus::Approved, false);
        assert!(check_patch(&tx, &TransactionPatch::funds_applied()).is_ok());

        let settled = transaction(TransactionStatus::Approved, true);
        assert!(check_patch(&settled, &TransactionPatch::funds_applied()).is_err());
    }

    #[test]
    fn test_funds_flag_never_cleared() {
        let tx = transaction(TransactionStatus::InReview, false);
        let patch = TransactionPatch {
            funds_applied: Some(false),
            ..Default::default()
        };
        assert!(matches!(check_patch(&tx, &patch), Err(Error::InvalidPatch(_))));
    }

    #[test]
    fn test_funds_flag_requires_approval() {
        let tx = transaction(TransactionStatus::InReview, false);
        let patch = TransactionPatch::finalize(TransactionStatus::Fraudulent).with_funds_applied();
        assert!(matches!(check_patch(&tx, &patch), Err(Error::InvalidPatch(_))));

        let patch = TransactionPatch::finalize(TransactionStatus::Approved).with_funds_applied();
        assert!(check_patch(&tx, &patch).is_ok());
    }

    proptest! {
        /// Property: no status change ever leaves a terminal status
        #[test]
        fn prop_terminal_is_final(current in status_strategy(), requested in status_strategy()) {
            let result = transition(current, requested);
            if current.is_terminal() {
                prop_assert!(matches!(result, Err(Error::FinalityConflict(_))));
            } else {
                prop_assert_eq!(result.is_ok(), requested.is_terminal());
            }
        }
    }
}
