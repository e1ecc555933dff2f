//! Ledger Facade.
//!
//! `TrustLedger` is the single entry point for every operation and the
//! serialization boundary for the whole ledger: one logical writer, with
//! read-only queries served from the same snapshot. Every mutating
//! operation validates all preconditions and computes every new value with
//! checked arithmetic *before* touching state, so a failed call never
//! leaves a partial transaction behind.
//!
//! Each mutating method has an `_at` variant taking an explicit timestamp;
//! the plain variants read the wall clock. Tests drive deadlines through
//! the `_at` forms.

use crate::account::{Account, RegistryError, ScoreReason, TrustRegistry};
use crate::address::Address;
use crate::config::{ConfigError, LedgerConfig};
use crate::endorsement::{Endorsement, EndorsementBook, EndorsementError};
use crate::events::{LedgerEvent, LedgerEventKind};
use crate::loan::{Loan, LoanBook, LoanError, LoanStatus};
use crate::pool::{LiquidityPool, PoolError};
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Endorsement(#[from] EndorsementError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Loan(#[from] LoanError),

    #[error("internal ledger invariant violated: {0}")]
    Internal(String),
}

/// Pool snapshot for clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolStats {
    pub total_liquidity: u128,
    pub available_to_borrow: u128,
    pub active_loans: u64,
}

/// The authoritative ledger aggregate: accounts, endorsements, pool, loans,
/// withdrawable balances and the audit trail, behind one write boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustLedger {
    config: LedgerConfig,
    registry: TrustRegistry,
    endorsements: EndorsementBook,
    pool: LiquidityPool,
    loans: LoanBook,
    /// Funds the ledger owes each address: loan disbursements, collateral
    /// refunds and endorser commissions accumulate here for withdrawal.
    balances: HashMap<Address, u128>,
    events: Vec<LedgerEvent>,
}

fn current_timestamp() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

impl TrustLedger {
    pub fn new(config: LedgerConfig) -> Result<Self, LedgerError> {
        config.validate()?;
        let registry = TrustRegistry::new(config.initial_trust_score, config.max_trust_score);
        Ok(TrustLedger {
            config,
            registry,
            endorsements: EndorsementBook::new(),
            pool: LiquidityPool::new(),
            loans: LoanBook::new(),
            balances: HashMap::new(),
            events: Vec::new(),
        })
    }

    pub fn with_defaults() -> Self {
        // The default config always validates
        Self::new(LedgerConfig::default()).expect("default config is valid")
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ---- mutating operations ----------------------------------------

    /// Register the caller as a new user.
    pub fn register(&mut self, caller: &Address) -> Result<(), LedgerError> {
        self.register_at(caller, current_timestamp())
    }

    pub fn register_at(&mut self, caller: &Address, now: u64) -> Result<(), LedgerError> {
        self.registry.register(caller.clone(), now)?;
        self.push_event(
            now,
            LedgerEventKind::UserRegistered {
                address: caller.clone(),
            },
        );
        Ok(())
    }

    /// Stake value on another user, boosting their score and the pool.
    pub fn endorse(
        &mut self,
        caller: &Address,
        endorsee: &Address,
        stake: u128,
    ) -> Result<(), LedgerError> {
        self.endorse_at(caller, endorsee, stake, current_timestamp())
    }

    pub fn endorse_at(
        &mut self,
        caller: &Address,
        endorsee: &Address,
        stake: u128,
        now: u64,
    ) -> Result<(), LedgerError> {
        // Validate
        self.registry.get(caller)?;
        self.registry.get(endorsee)?;
        if caller == endorsee {
            return Err(EndorsementError::SelfEndorsement.into());
        }
        if stake == 0 {
            return Err(EndorsementError::InvalidStake.into());
        }
        let score_credit = self.config.score_credit.credit(stake);

        // Commit
        self.pool.deposit(stake)?;
        self.endorsements
            .record(caller.clone(), endorsee.clone(), stake, now)?;
        let new_score = self
            .registry
            .credit_endorsement(endorsee, stake, score_credit)?;
        self.push_event(
            now,
            LedgerEventKind::Endorsed {
                endorser: caller.clone(),
                endorsee: endorsee.clone(),
                stake,
                score_credit,
            },
        );
        self.push_event(
            now,
            LedgerEventKind::ScoreAdjusted {
                address: endorsee.clone(),
                reason: ScoreReason::EndorsementReceived,
                new_score,
            },
        );
        info!(
            "{} endorsed {} with stake {} (score credit {})",
            caller, endorsee, stake, score_credit
        );
        Ok(())
    }

    /// Contribute capital to the lending pool. Open to anyone.
    pub fn deposit(&mut self, caller: &Address, amount: u128) -> Result<(), LedgerError> {
        self.deposit_at(caller, amount, current_timestamp())
    }

    pub fn deposit_at(
        &mut self,
        caller: &Address,
        amount: u128,
        now: u64,
    ) -> Result<(), LedgerError> {
        self.pool.deposit(amount)?;
        self.push_event(
            now,
            LedgerEventKind::Deposited {
                from: caller.clone(),
                amount,
            },
        );
        info!("{} deposited {} into the pool", caller, amount);
        Ok(())
    }

    /// Request a loan, supplying the full collateral up front. Funding is
    /// automatic and synchronous: the returned loan is already Active. If
    /// the pool cannot cover the principal, the loan is retained as
    /// Cancelled, the collateral is refunded to the borrower's balance and
    /// `InsufficientLiquidity` is returned.
    pub fn request_loan(
        &mut self,
        caller: &Address,
        amount: u128,
        supplied_collateral: u128,
    ) -> Result<u64, LedgerError> {
        self.request_loan_at(caller, amount, supplied_collateral, current_timestamp())
    }

    pub fn request_loan_at(
        &mut self,
        caller: &Address,
        amount: u128,
        supplied_collateral: u128,
        now: u64,
    ) -> Result<u64, LedgerError> {
        // Validate
        let score = self.registry.get(caller)?.trust_score;
        if amount == 0 {
            return Err(LoanError::InvalidAmount.into());
        }
        let required = self.config.min_trust_score_for_loan;
        if score < required {
            return Err(LoanError::TrustScoreTooLow { score, required }.into());
        }
        let required_collateral = self
            .config
            .collateral_for(amount)
            .ok_or_else(|| LedgerError::Internal("collateral computation overflow".into()))?;
        if supplied_collateral != required_collateral {
            return Err(LoanError::CollateralMismatch {
                required: required_collateral,
                supplied: supplied_collateral,
            }
            .into());
        }
        let repayment_amount = self
            .config
            .repayment_for(amount)
            .ok_or_else(|| LedgerError::Internal("repayment computation overflow".into()))?;

        // Commit: the loan record exists from here on, for audit, even if
        // funding fails
        let loan_id = self.loans.create(
            caller.clone(),
            amount,
            self.config.interest_rate_bps,
            required_collateral,
            repayment_amount,
            now,
        );
        self.push_event(
            now,
            LedgerEventKind::LoanRequested {
                loan_id,
                borrower: caller.clone(),
                amount,
                collateral: required_collateral,
            },
        );

        match self.pool.lock(amount) {
            Ok(()) => {
                let pool_address = self.config.pool_address.clone();
                let duration = self.config.loan_duration_secs;
                let deadline = {
                    let loan = self
                        .loans
                        .get_mut(loan_id)
                        .map_err(|e| LedgerError::Internal(e.to_string()))?;
                    loan.activate(pool_address, now, duration)
                        .map_err(|e| LedgerError::Internal(e.to_string()))?;
                    loan.repayment_deadline
                };
                self.credit_balance(caller, amount);
                self.push_event(
                    now,
                    LedgerEventKind::LoanActivated {
                        loan_id,
                        repayment_deadline: deadline,
                    },
                );
                info!(
                    "loan {} activated: {} borrowed {} against {} collateral, due {}",
                    loan_id, caller, amount, required_collateral, deadline
                );
                Ok(loan_id)
            }
            Err(err @ PoolError::InsufficientLiquidity { .. }) => {
                self.loans
                    .get_mut(loan_id)
                    .and_then(Loan::mark_cancelled)
                    .map_err(|e| LedgerError::Internal(e.to_string()))?;
                self.credit_balance(caller, supplied_collateral);
                self.push_event(
                    now,
                    LedgerEventKind::LoanCancelled {
                        loan_id,
                        collateral_refunded: supplied_collateral,
                    },
                );
                warn!(
                    "loan {} cancelled for lack of liquidity, collateral {} refunded to {}",
                    loan_id, supplied_collateral, caller
                );
                Err(err.into())
            }
            Err(other) => Err(other.into()),
        }
    }

    /// Repay an active loan in full. Any payer may repay on the borrower's
    /// behalf; collateral and score credit always go to the borrower. Late
    /// repayment is accepted as long as no default sweep has fired.
    pub fn repay(
        &mut self,
        caller: &Address,
        loan_id: u64,
        supplied_amount: u128,
    ) -> Result<(), LedgerError> {
        self.repay_at(caller, loan_id, supplied_amount, current_timestamp())
    }

    pub fn repay_at(
        &mut self,
        caller: &Address,
        loan_id: u64,
        supplied_amount: u128,
        now: u64,
    ) -> Result<(), LedgerError> {
        // Validate
        let (borrower, amount, repayment_amount, collateral_amount) = {
            let loan = self.loans.get(loan_id)?;
            if loan.status != LoanStatus::Active {
                return Err(LoanError::NotActive {
                    loan_id,
                    status: loan.status,
                }
                .into());
            }
            (
                loan.borrower.clone(),
                loan.amount,
                loan.repayment_amount,
                loan.collateral_amount,
            )
        };
        if supplied_amount != repayment_amount {
            return Err(LoanError::WrongRepaymentAmount {
                required: repayment_amount,
                supplied: supplied_amount,
            }
            .into());
        }
        self.registry.get(&borrower)?;

        let commission_due = self
            .config
            .commission_for(amount)
            .ok_or_else(|| LedgerError::Internal("commission computation overflow".into()))?;
        let shares =
            self.endorsements
                .commission_shares(&borrower, commission_due, self.config.commission)?;
        let distributed: u128 = shares.iter().map(|(_, share)| share).sum();
        let interest = repayment_amount
            .checked_sub(amount)
            .ok_or_else(|| LedgerError::Internal("repayment below principal".into()))?;
        let net_gain = interest.checked_sub(distributed).ok_or_else(|| {
            LedgerError::Internal("commission exceeds interest inflow".into())
        })?;

        // Commit: pool first (its settlement is atomic), then the purely
        // infallible effects
        self.pool.settle_repayment(amount, net_gain)?;
        self.loans
            .get_mut(loan_id)
            .and_then(Loan::mark_repaid)
            .map_err(|e| LedgerError::Internal(e.to_string()))?;
        for (endorser, share) in &shares {
            self.credit_balance(endorser, *share);
            self.push_event(
                now,
                LedgerEventKind::CommissionPaid {
                    loan_id,
                    endorser: endorser.clone(),
                    amount: *share,
                },
            );
        }
        self.credit_balance(&borrower, collateral_amount);
        self.push_event(
            now,
            LedgerEventKind::CollateralReturned {
                loan_id,
                borrower: borrower.clone(),
                amount: collateral_amount,
            },
        );
        let new_score = self
            .registry
            .credit_repayment(&borrower, self.config.repay_score_reward)?;
        self.push_event(
            now,
            LedgerEventKind::ScoreAdjusted {
                address: borrower.clone(),
                reason: ScoreReason::LoanRepaid,
                new_score,
            },
        );
        self.push_event(
            now,
            LedgerEventKind::LoanRepaid {
                loan_id,
                payer: caller.clone(),
                amount_paid: supplied_amount,
            },
        );
        info!(
            "loan {} repaid by {}: {} to pool, {} commission, collateral {} returned",
            loan_id, caller, net_gain, distributed, collateral_amount
        );
        Ok(())
    }

    /// Transition an overdue active loan to Defaulted, seizing its
    /// collateral into the pool. Anyone may sweep; sweeping a terminal
    /// loan fails with `NotActive`, sweeping before the deadline with
    /// `DeadlineNotReached`.
    pub fn default_sweep(&mut self, caller: &Address, loan_id: u64) -> Result<(), LedgerError> {
        self.default_sweep_at(caller, loan_id, current_timestamp())
    }

    pub fn default_sweep_at(
        &mut self,
        caller: &Address,
        loan_id: u64,
        now: u64,
    ) -> Result<(), LedgerError> {
        // Validate
        let (borrower, amount, collateral_amount) = {
            let loan = self.loans.get(loan_id)?;
            if loan.status != LoanStatus::Active {
                return Err(LoanError::NotActive {
                    loan_id,
                    status: loan.status,
                }
                .into());
            }
            if !loan.is_overdue(now) {
                return Err(LoanError::DeadlineNotReached {
                    deadline: loan.repayment_deadline,
                    now,
                }
                .into());
            }
            (loan.borrower.clone(), loan.amount, loan.collateral_amount)
        };
        self.registry.get(&borrower)?;

        // Commit
        self.pool.settle_default(amount, collateral_amount)?;
        self.loans
            .get_mut(loan_id)
            .and_then(Loan::mark_defaulted)
            .map_err(|e| LedgerError::Internal(e.to_string()))?;
        let new_score = self
            .registry
            .penalize_default(&borrower, self.config.default_score_penalty)?;
        self.push_event(
            now,
            LedgerEventKind::CollateralSeized {
                loan_id,
                amount: collateral_amount,
            },
        );
        self.push_event(
            now,
            LedgerEventKind::ScoreAdjusted {
                address: borrower.clone(),
                reason: ScoreReason::LoanDefaulted,
                new_score,
            },
        );
        self.push_event(
            now,
            LedgerEventKind::LoanDefaulted {
                loan_id,
                swept_by: caller.clone(),
            },
        );
        warn!(
            "loan {} defaulted: collateral {} seized, borrower {} score now {}",
            loan_id, collateral_amount, borrower, new_score
        );
        Ok(())
    }

    // ---- read-only queries ------------------------------------------

    pub fn get_user(&self, address: &Address) -> Result<&Account, LedgerError> {
        Ok(self.registry.get(address)?)
    }

    pub fn get_loan(&self, loan_id: u64) -> Result<&Loan, LedgerError> {
        Ok(self.loans.get(loan_id)?)
    }

    pub fn get_active_loans_for_user(&self, address: &Address) -> Vec<u64> {
        self.loans.active_ids_for(address)
    }

    pub fn get_loans_for_user(&self, address: &Address) -> Vec<u64> {
        self.loans.ids_for(address)
    }

    pub fn total_liquidity(&self) -> u128 {
        self.pool.total_liquidity()
    }

    pub fn available_to_borrow(&self) -> u128 {
        self.pool.available_to_borrow()
    }

    pub fn pool_stats(&self) -> PoolStats {
        PoolStats {
            total_liquidity: self.pool.total_liquidity(),
            available_to_borrow: self.pool.available_to_borrow(),
            active_loans: self.loans.active_count(),
        }
    }

    /// Withdrawable funds the ledger has credited to `address`.
    pub fn balance_of(&self, address: &Address) -> u128 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    pub fn endorsements(&self) -> &[Endorsement] {
        self.endorsements.all()
    }

    pub fn events(&self) -> &[LedgerEvent] {
        &self.events
    }

    // ---- internals ---------------------------------------------------

    fn credit_balance(&mut self, address: &Address, amount: u128) {
        let balance = self.balances.entry(address.clone()).or_insert(0);
        *balance = balance.saturating_add(amount);
    }

    fn push_event(&mut self, at: u64, kind: LedgerEventKind) {
        let sequence = self.events.len() as u64;
        self.events.push(LedgerEvent { sequence, at, kind });
    }
}

impl Default for TrustLedger {
    fn default() -> Self {
        Self::with_defaults()
    }
}
