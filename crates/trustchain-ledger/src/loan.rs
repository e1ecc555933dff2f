//! Loan Engine data model.
//!
//! Loans are exclusively owned by the [`LoanBook`]; borrowers and lenders
//! hold only the `loan_id`. Transitions are one-way and terminal states are
//! retained forever for audit. The cross-component effects of each
//! transition (pool movement, score adjustment, commission) are sequenced
//! by the ledger facade.

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoanError {
    #[error("loan not found: {0}")]
    NotFound(u64),

    #[error("loan {loan_id} is not active (status: {status:?})")]
    NotActive { loan_id: u64, status: LoanStatus },

    #[error("loan amount must be positive")]
    InvalidAmount,

    #[error("trust score too low: {score} is below the required {required}")]
    TrustScoreTooLow { score: u16, required: u16 },

    #[error("collateral mismatch: required {required}, supplied {supplied}")]
    CollateralMismatch { required: u128, supplied: u128 },

    #[error("wrong repayment amount: required {required}, supplied {supplied}")]
    WrongRepaymentAmount { required: u128, supplied: u128 },

    #[error("repayment deadline {deadline} has not passed at {now}")]
    DeadlineNotReached { deadline: u64, now: u64 },

    #[error("loan {loan_id} cannot transition from {from:?} to {to:?}")]
    InvalidTransition {
        loan_id: u64,
        from: LoanStatus,
        to: LoanStatus,
    },
}

/// Loan lifecycle states. The wire codes match the order here:
/// 0 Requested, 1 Active, 2 Repaid, 3 Defaulted, 4 Cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    Requested,
    Active,
    Repaid,
    Defaulted,
    Cancelled,
}

impl LoanStatus {
    pub fn code(&self) -> u8 {
        match self {
            LoanStatus::Requested => 0,
            LoanStatus::Active => 1,
            LoanStatus::Repaid => 2,
            LoanStatus::Defaulted => 3,
            LoanStatus::Cancelled => 4,
        }
    }

    /// Repaid, Defaulted and Cancelled are absorbing.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanStatus::Repaid | LoanStatus::Defaulted | LoanStatus::Cancelled
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub loan_id: u64,
    pub borrower: Address,
    /// Zero address until funded, then the pool's address
    pub lender: Address,
    /// Principal
    pub amount: u128,
    /// Basis points, fixed at creation
    pub interest_rate: u16,
    pub collateral_amount: u128,
    /// Principal plus interest, fixed at creation
    pub repayment_amount: u128,
    pub requested_timestamp: u64,
    pub approval_timestamp: u64,
    pub repayment_deadline: u64,
    pub status: LoanStatus,
}

impl Loan {
    fn request(
        loan_id: u64,
        borrower: Address,
        amount: u128,
        interest_rate: u16,
        collateral_amount: u128,
        repayment_amount: u128,
        now: u64,
    ) -> Self {
        Loan {
            loan_id,
            borrower,
            lender: Address::zero(),
            amount,
            interest_rate,
            collateral_amount,
            repayment_amount,
            requested_timestamp: now,
            approval_timestamp: 0,
            repayment_deadline: 0,
            status: LoanStatus::Requested,
        }
    }

    fn transition(&mut self, to: LoanStatus) -> Result<(), LoanError> {
        let allowed = matches!(
            (self.status, to),
            (LoanStatus::Requested, LoanStatus::Active)
                | (LoanStatus::Requested, LoanStatus::Cancelled)
                | (LoanStatus::Active, LoanStatus::Repaid)
                | (LoanStatus::Active, LoanStatus::Defaulted)
        );
        if !allowed {
            return Err(LoanError::InvalidTransition {
                loan_id: self.loan_id,
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    /// Funding succeeded: record the lender and start the clock.
    pub fn activate(
        &mut self,
        lender: Address,
        now: u64,
        duration_secs: u64,
    ) -> Result<(), LoanError> {
        self.transition(LoanStatus::Active)?;
        self.lender = lender;
        self.approval_timestamp = now;
        self.repayment_deadline = now.saturating_add(duration_secs);
        Ok(())
    }

    pub fn mark_repaid(&mut self) -> Result<(), LoanError> {
        self.transition(LoanStatus::Repaid)
    }

    pub fn mark_defaulted(&mut self) -> Result<(), LoanError> {
        self.transition(LoanStatus::Defaulted)
    }

    pub fn mark_cancelled(&mut self) -> Result<(), LoanError> {
        self.transition(LoanStatus::Cancelled)
    }

    pub fn is_overdue(&self, now: u64) -> bool {
        self.status == LoanStatus::Active && now > self.repayment_deadline
    }
}

/// Arena of all loans ever created, keyed by a monotonically increasing id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanBook {
    loans: BTreeMap<u64, Loan>,
    by_borrower: HashMap<Address, Vec<u64>>,
    next_loan_id: u64,
}

impl Default for LoanBook {
    fn default() -> Self {
        LoanBook {
            loans: BTreeMap::new(),
            by_borrower: HashMap::new(),
            next_loan_id: 1,
        }
    }
}

impl LoanBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loan in Requested state and return its id.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        &mut self,
        borrower: Address,
        amount: u128,
        interest_rate: u16,
        collateral_amount: u128,
        repayment_amount: u128,
        now: u64,
    ) -> u64 {
        let loan_id = self.next_loan_id;
        self.next_loan_id += 1;
        let loan = Loan::request(
            loan_id,
            borrower.clone(),
            amount,
            interest_rate,
            collateral_amount,
            repayment_amount,
            now,
        );
        self.loans.insert(loan_id, loan);
        self.by_borrower.entry(borrower).or_default().push(loan_id);
        loan_id
    }

    pub fn get(&self, loan_id: u64) -> Result<&Loan, LoanError> {
        self.loans.get(&loan_id).ok_or(LoanError::NotFound(loan_id))
    }

    pub fn get_mut(&mut self, loan_id: u64) -> Result<&mut Loan, LoanError> {
        self.loans
            .get_mut(&loan_id)
            .ok_or(LoanError::NotFound(loan_id))
    }

    /// Ids of the borrower's non-terminal loans, oldest first.
    pub fn active_ids_for(&self, borrower: &Address) -> Vec<u64> {
        self.by_borrower
            .get(borrower)
            .map(Vec::as_slice)
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(|id| {
                self.loans
                    .get(id)
                    .map(|loan| !loan.status.is_terminal())
                    .unwrap_or(false)
            })
            .collect()
    }

    /// All loans ever taken by the borrower, oldest first.
    pub fn ids_for(&self, borrower: &Address) -> Vec<u64> {
        self.by_borrower
            .get(borrower)
            .cloned()
            .unwrap_or_default()
    }

    pub fn active_count(&self) -> u64 {
        self.loans
            .values()
            .filter(|loan| loan.status == LoanStatus::Active)
            .count() as u64
    }

    pub fn len(&self) -> usize {
        self.loans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loans.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_loan(book: &mut LoanBook) -> u64 {
        book.create(Address::from("bob"), 10_000, 700, 13_000, 10_700, 100)
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut book = LoanBook::new();
        let first = sample_loan(&mut book);
        let second = sample_loan(&mut book);
        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[test]
    fn test_new_loan_is_requested_and_unfunded() {
        let mut book = LoanBook::new();
        let id = sample_loan(&mut book);
        let loan = book.get(id).unwrap();
        assert_eq!(loan.status, LoanStatus::Requested);
        assert!(loan.lender.is_zero());
        assert_eq!(loan.repayment_deadline, 0);
    }

    #[test]
    fn test_activate_sets_deadline() {
        let mut book = LoanBook::new();
        let id = sample_loan(&mut book);
        let loan = book.get_mut(id).unwrap();
        loan.activate(Address::from("pool"), 200, 1_000).unwrap();
        assert_eq!(loan.status, LoanStatus::Active);
        assert_eq!(loan.approval_timestamp, 200);
        assert_eq!(loan.repayment_deadline, 1_200);
        assert_eq!(loan.lender, Address::from("pool"));
    }

    #[test]
    fn test_terminal_states_are_absorbing() {
        let mut book = LoanBook::new();
        let id = sample_loan(&mut book);
        let loan = book.get_mut(id).unwrap();
        loan.activate(Address::from("pool"), 200, 1_000).unwrap();
        loan.mark_repaid().unwrap();

        assert!(loan.mark_defaulted().is_err());
        assert!(loan.mark_repaid().is_err());
        assert!(loan.mark_cancelled().is_err());
        assert_eq!(loan.status, LoanStatus::Repaid);
    }

    #[test]
    fn test_cancel_only_from_requested() {
        let mut book = LoanBook::new();
        let id = sample_loan(&mut book);
        book.get_mut(id).unwrap().mark_cancelled().unwrap();
        assert_eq!(book.get(id).unwrap().status, LoanStatus::Cancelled);

        let id2 = sample_loan(&mut book);
        let loan = book.get_mut(id2).unwrap();
        loan.activate(Address::from("pool"), 200, 1_000).unwrap();
        assert!(loan.mark_cancelled().is_err());
    }

    #[test]
    fn test_overdue_check() {
        let mut book = LoanBook::new();
        let id = sample_loan(&mut book);
        let loan = book.get_mut(id).unwrap();
        loan.activate(Address::from("pool"), 200, 1_000).unwrap();
        assert!(!loan.is_overdue(1_200));
        assert!(loan.is_overdue(1_201));
    }

    #[test]
    fn test_active_ids_exclude_terminal() {
        let mut book = LoanBook::new();
        let bob = Address::from("bob");
        let id1 = sample_loan(&mut book);
        let id2 = sample_loan(&mut book);
        book.get_mut(id1)
            .unwrap()
            .activate(Address::from("pool"), 200, 1_000)
            .unwrap();
        book.get_mut(id1).unwrap().mark_repaid().unwrap();
        book.get_mut(id2)
            .unwrap()
            .activate(Address::from("pool"), 200, 1_000)
            .unwrap();

        assert_eq!(book.active_ids_for(&bob), vec![id2]);
        assert_eq!(book.ids_for(&bob), vec![id1, id2]);
        assert_eq!(book.active_count(), 1);
    }
}
