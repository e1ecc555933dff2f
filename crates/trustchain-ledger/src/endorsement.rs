//! Endorsement Ledger.
//!
//! Stake-weighted vouching relation between addresses. Stakes are permanent
//! capital contributions: there is no withdrawal operation, the `active`
//! flag exists so one could deactivate without deleting history.

use crate::address::Address;
use crate::config::CommissionPolicy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EndorsementError {
    #[error("cannot endorse yourself")]
    SelfEndorsement,

    #[error("stake amount must be positive")]
    InvalidStake,

    #[error("commission arithmetic overflow")]
    CommissionOverflow,
}

/// One endorser locking stake on one endorsee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endorsement {
    pub endorser: Address,
    pub endorsee: Address,
    pub stake: u128,
    pub active: bool,
    pub endorsed_at: u64,
}

/// Append-only book of endorsements, indexed by endorsee.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndorsementBook {
    endorsements: Vec<Endorsement>,
    by_endorsee: HashMap<Address, Vec<usize>>,
}

impl EndorsementBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new endorsement. Registration of both parties is the
    /// facade's precondition; this validates the relation itself.
    pub fn record(
        &mut self,
        endorser: Address,
        endorsee: Address,
        stake: u128,
        now: u64,
    ) -> Result<&Endorsement, EndorsementError> {
        if endorser == endorsee {
            return Err(EndorsementError::SelfEndorsement);
        }
        if stake == 0 {
            return Err(EndorsementError::InvalidStake);
        }
        let index = self.endorsements.len();
        self.endorsements.push(Endorsement {
            endorser,
            endorsee: endorsee.clone(),
            stake,
            active: true,
            endorsed_at: now,
        });
        self.by_endorsee.entry(endorsee).or_default().push(index);
        Ok(&self.endorsements[index])
    }

    pub fn all(&self) -> &[Endorsement] {
        &self.endorsements
    }

    /// Active stake per endorser of `endorsee`, aggregated, in first-seen
    /// order.
    pub fn active_stakes_for(&self, endorsee: &Address) -> Vec<(Address, u128)> {
        let mut order: Vec<Address> = Vec::new();
        let mut totals: HashMap<&Address, u128> = HashMap::new();
        for &index in self.by_endorsee.get(endorsee).map(Vec::as_slice).unwrap_or(&[]) {
            let endorsement = &self.endorsements[index];
            if !endorsement.active {
                continue;
            }
            let entry = totals.entry(&endorsement.endorser).or_insert(0);
            if *entry == 0 {
                order.push(endorsement.endorser.clone());
            }
            *entry = entry.saturating_add(endorsement.stake);
        }
        order
            .into_iter()
            .map(|endorser| {
                let stake = totals[&endorser];
                (endorser, stake)
            })
            .collect()
    }

    pub fn total_active_stake_for(&self, endorsee: &Address) -> u128 {
        self.active_stakes_for(endorsee)
            .iter()
            .map(|(_, stake)| stake)
            .sum()
    }

    /// The endorser whose active endorsement of `endorsee` is newest.
    pub fn most_recent_endorser(&self, endorsee: &Address) -> Option<Address> {
        self.by_endorsee
            .get(endorsee)?
            .iter()
            .rev()
            .map(|&index| &self.endorsements[index])
            .find(|e| e.active)
            .map(|e| e.endorser.clone())
    }

    /// Split `commission` among the endorsee's backers per the policy.
    ///
    /// Stake-weighted shares truncate individually, so the distributed sum
    /// never exceeds `commission`; the remainder is the caller's to absorb.
    /// Returns an empty split when the borrower has no active endorsers.
    pub fn commission_shares(
        &self,
        endorsee: &Address,
        commission: u128,
        policy: CommissionPolicy,
    ) -> Result<Vec<(Address, u128)>, EndorsementError> {
        if commission == 0 {
            return Ok(Vec::new());
        }
        match policy {
            CommissionPolicy::MostRecent => Ok(self
                .most_recent_endorser(endorsee)
                .map(|endorser| vec![(endorser, commission)])
                .unwrap_or_default()),
            CommissionPolicy::StakeWeighted => {
                let stakes = self.active_stakes_for(endorsee);
                let total: u128 = stakes.iter().map(|(_, stake)| stake).sum();
                if total == 0 {
                    return Ok(Vec::new());
                }
                stakes
                    .into_iter()
                    .map(|(endorser, stake)| {
                        let share = commission
                            .checked_mul(stake)
                            .ok_or(EndorsementError::CommissionOverflow)?
                            / total;
                        Ok((endorser, share))
                    })
                    .filter(|share| !matches!(share, Ok((_, 0))))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(raw: &str) -> Address {
        Address::from(raw)
    }

    #[test]
    fn test_self_endorsement_rejected() {
        let mut book = EndorsementBook::new();
        assert_eq!(
            book.record(addr("a"), addr("a"), 10, 0).err(),
            Some(EndorsementError::SelfEndorsement)
        );
    }

    #[test]
    fn test_zero_stake_rejected() {
        let mut book = EndorsementBook::new();
        assert_eq!(
            book.record(addr("a"), addr("b"), 0, 0).err(),
            Some(EndorsementError::InvalidStake)
        );
    }

    #[test]
    fn test_stakes_aggregate_per_endorser() {
        let mut book = EndorsementBook::new();
        book.record(addr("a"), addr("b"), 10, 0).unwrap();
        book.record(addr("a"), addr("b"), 5, 1).unwrap();
        book.record(addr("c"), addr("b"), 20, 2).unwrap();

        let stakes = book.active_stakes_for(&addr("b"));
        assert_eq!(stakes, vec![(addr("a"), 15), (addr("c"), 20)]);
        assert_eq!(book.total_active_stake_for(&addr("b")), 35);
    }

    #[test]
    fn test_most_recent_endorser() {
        let mut book = EndorsementBook::new();
        assert_eq!(book.most_recent_endorser(&addr("b")), None);
        book.record(addr("a"), addr("b"), 10, 0).unwrap();
        book.record(addr("c"), addr("b"), 20, 1).unwrap();
        assert_eq!(book.most_recent_endorser(&addr("b")), Some(addr("c")));
    }

    #[test]
    fn test_stake_weighted_shares_truncate() {
        let mut book = EndorsementBook::new();
        book.record(addr("a"), addr("b"), 100, 0).unwrap();
        book.record(addr("c"), addr("b"), 200, 1).unwrap();

        // 100 commission split 1:2 -> 33 + 66, 1 unit of dust remains
        let shares = book
            .commission_shares(&addr("b"), 100, CommissionPolicy::StakeWeighted)
            .unwrap();
        assert_eq!(shares, vec![(addr("a"), 33), (addr("c"), 66)]);
        let distributed: u128 = shares.iter().map(|(_, s)| s).sum();
        assert!(distributed <= 100);
    }

    #[test]
    fn test_most_recent_takes_whole_commission() {
        let mut book = EndorsementBook::new();
        book.record(addr("a"), addr("b"), 100, 0).unwrap();
        book.record(addr("c"), addr("b"), 1, 1).unwrap();

        let shares = book
            .commission_shares(&addr("b"), 600, CommissionPolicy::MostRecent)
            .unwrap();
        assert_eq!(shares, vec![(addr("c"), 600)]);
    }

    #[test]
    fn test_no_endorsers_no_shares() {
        let book = EndorsementBook::new();
        let shares = book
            .commission_shares(&addr("b"), 600, CommissionPolicy::StakeWeighted)
            .unwrap();
        assert!(shares.is_empty());
    }
}
