//! Trust Registry.
//!
//! Owns every per-address reputation record. `adjust_score` is the only
//! mutator of `trust_score`; the endorsement ledger and the loan engine go
//! through the dedicated credit/penalize entry points, which also keep the
//! loan and endorsement counters in step.

use crate::address::Address;
use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("user already registered: {0}")]
    AlreadyRegistered(Address),

    #[error("user not registered: {0}")]
    NotRegistered(Address),
}

/// Why a score adjustment was applied. Recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreReason {
    EndorsementReceived,
    LoanRepaid,
    LoanDefaulted,
}

/// A registered user's reputation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    /// Bounded reputation score, clamped to [0, max_trust_score]
    pub trust_score: u16,
    pub loans_completed: u64,
    pub loans_defaulted: u64,
    /// Sum of active endorsement stakes received
    pub total_staked_on_user: u128,
    pub endorsements_received: u64,
    pub is_registered: bool,
    pub registered_at: u64,
}

/// Registry of all accounts. Accounts are created by explicit registration
/// and never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRegistry {
    accounts: HashMap<Address, Account>,
    initial_score: u16,
    max_score: u16,
}

impl TrustRegistry {
    pub fn new(initial_score: u16, max_score: u16) -> Self {
        TrustRegistry {
            accounts: HashMap::new(),
            initial_score,
            max_score,
        }
    }

    /// Create an account for `address` with the configured initial score.
    pub fn register(&mut self, address: Address, now: u64) -> Result<&Account, RegistryError> {
        if self.accounts.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered(address));
        }
        let account = Account {
            address: address.clone(),
            trust_score: self.initial_score,
            loans_completed: 0,
            loans_defaulted: 0,
            total_staked_on_user: 0,
            endorsements_received: 0,
            is_registered: true,
            registered_at: now,
        };
        info!("registered user {} with score {}", address, self.initial_score);
        Ok(self.accounts.entry(address).or_insert(account))
    }

    pub fn get(&self, address: &Address) -> Result<&Account, RegistryError> {
        self.accounts
            .get(address)
            .ok_or_else(|| RegistryError::NotRegistered(address.clone()))
    }

    fn get_mut(&mut self, address: &Address) -> Result<&mut Account, RegistryError> {
        self.accounts
            .get_mut(address)
            .ok_or_else(|| RegistryError::NotRegistered(address.clone()))
    }

    pub fn is_registered(&self, address: &Address) -> bool {
        self.accounts.contains_key(address)
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Apply a signed score delta, clamped to [0, max_score].
    /// Returns the new score.
    pub fn adjust_score(
        &mut self,
        address: &Address,
        delta: i32,
        reason: ScoreReason,
    ) -> Result<u16, RegistryError> {
        let max_score = self.max_score;
        let account = self.get_mut(address)?;
        let adjusted = (account.trust_score as i64 + delta as i64).clamp(0, max_score as i64);
        account.trust_score = adjusted as u16;
        info!(
            "score of {} adjusted by {} ({:?}) to {}",
            address, delta, reason, account.trust_score
        );
        Ok(account.trust_score)
    }

    /// Endorsement received: stake recorded against the endorsee, score
    /// credited per the configured policy.
    pub fn credit_endorsement(
        &mut self,
        address: &Address,
        stake: u128,
        score_credit: u16,
    ) -> Result<u16, RegistryError> {
        {
            let account = self.get_mut(address)?;
            account.total_staked_on_user = account.total_staked_on_user.saturating_add(stake);
            account.endorsements_received = account.endorsements_received.saturating_add(1);
        }
        self.adjust_score(address, score_credit as i32, ScoreReason::EndorsementReceived)
    }

    /// Successful repayment: fixed reward, completion counter bumped.
    pub fn credit_repayment(&mut self, address: &Address, reward: u16) -> Result<u16, RegistryError> {
        self.get_mut(address)?.loans_completed += 1;
        self.adjust_score(address, reward as i32, ScoreReason::LoanRepaid)
    }

    /// Default: fixed penalty, default counter bumped. The penalty is larger
    /// than the repayment reward so repeated default cycles strictly lose
    /// score.
    pub fn penalize_default(&mut self, address: &Address, penalty: u16) -> Result<u16, RegistryError> {
        self.get_mut(address)?.loans_defaulted += 1;
        self.adjust_score(address, -(penalty as i32), ScoreReason::LoanDefaulted)
    }
}
