//! Append-only audit trail of applied ledger transitions.
//!
//! Every committed operation emits one or more events. Terminal loan
//! states plus this trail give clients (dashboards, analytics) the full
//! history without replaying state.

use crate::account::ScoreReason;
use crate::address::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Position in the trail, starting at 0
    pub sequence: u64,
    /// Ledger timestamp of the enclosing transaction
    pub at: u64,
    #[serde(flatten)]
    pub kind: LedgerEventKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEventKind {
    UserRegistered {
        address: Address,
    },
    Endorsed {
        endorser: Address,
        endorsee: Address,
        stake: u128,
        score_credit: u16,
    },
    Deposited {
        from: Address,
        amount: u128,
    },
    LoanRequested {
        loan_id: u64,
        borrower: Address,
        amount: u128,
        collateral: u128,
    },
    LoanActivated {
        loan_id: u64,
        repayment_deadline: u64,
    },
    LoanCancelled {
        loan_id: u64,
        collateral_refunded: u128,
    },
    LoanRepaid {
        loan_id: u64,
        payer: Address,
        amount_paid: u128,
    },
    LoanDefaulted {
        loan_id: u64,
        swept_by: Address,
    },
    CommissionPaid {
        loan_id: u64,
        endorser: Address,
        amount: u128,
    },
    CollateralReturned {
        loan_id: u64,
        borrower: Address,
        amount: u128,
    },
    CollateralSeized {
        loan_id: u64,
        amount: u128,
    },
    ScoreAdjusted {
        address: Address,
        reason: ScoreReason,
        new_score: u16,
    },
}
