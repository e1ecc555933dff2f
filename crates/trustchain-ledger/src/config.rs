//! Ledger parameters.
//!
//! All economic constants live here so the policy choices stay isolated
//! from the state machine and can be tuned per deployment. Rates are in
//! basis points, durations in seconds, amounts in the smallest unit of
//! value.

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// How much trust score an endorsement credits to the endorsee.
///
/// Stake-proportional credit saturates at `cap` so a single large stake
/// cannot buy an arbitrary score. Flat credit ignores stake size entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum ScoreCreditPolicy {
    Flat { points: u16 },
    StakeProportional { divisor: u128, cap: u16 },
}

impl ScoreCreditPolicy {
    /// Score points credited for a single endorsement of `stake` units.
    pub fn credit(&self, stake: u128) -> u16 {
        match *self {
            ScoreCreditPolicy::Flat { points } => points,
            ScoreCreditPolicy::StakeProportional { divisor, cap } => {
                let raw = stake / divisor.max(1);
                raw.min(cap as u128) as u16
            }
        }
    }
}

/// Who receives the endorser commission when an endorsed borrower repays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionPolicy {
    /// The endorser who most recently endorsed the borrower takes the
    /// whole commission.
    MostRecent,
    /// Every active endorser of the borrower takes a share weighted by
    /// stake. Integer-division dust stays in the pool.
    StakeWeighted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Score assigned at registration
    pub initial_trust_score: u16,
    /// Upper clamp for every score adjustment
    pub max_trust_score: u16,
    /// Minimum score required to request a loan
    pub min_trust_score_for_loan: u16,
    /// Score increase on successful repayment
    pub repay_score_reward: u16,
    /// Score decrease on default. Must exceed `repay_score_reward` so a
    /// default-repay cycle is strictly loss-making.
    pub default_score_penalty: u16,
    /// Fixed loan interest rate in basis points
    pub interest_rate_bps: u16,
    /// Collateral required, as basis points of principal
    pub collateral_factor_bps: u16,
    /// Loan term in seconds
    pub loan_duration_secs: u64,
    /// Endorser commission on repayment, as basis points of principal
    pub commission_bps: u16,
    /// Endorsement score credit policy
    pub score_credit: ScoreCreditPolicy,
    /// Commission attribution policy
    pub commission: CommissionPolicy,
    /// Address recorded as lender once the pool funds a loan
    pub pool_address: Address,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        LedgerConfig {
            initial_trust_score: 400,
            max_trust_score: 1000,
            min_trust_score_for_loan: 500,
            repay_score_reward: 50,
            default_score_penalty: 150,
            interest_rate_bps: 700,        // 7.00% per term
            collateral_factor_bps: 13_000, // 130% of principal
            loan_duration_secs: 30 * 24 * 60 * 60,
            commission_bps: 600, // 6% of principal
            score_credit: ScoreCreditPolicy::StakeProportional {
                divisor: 1,
                cap: 50,
            },
            commission: CommissionPolicy::StakeWeighted,
            pool_address: Address::from("pool"),
        }
    }
}

impl LedgerConfig {
    /// Load a config from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let config: LedgerConfig = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate parameter bounds and designed asymmetries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_trust_score == 0 {
            return Err(ConfigError::Invalid("max_trust_score must be > 0".into()));
        }
        if self.initial_trust_score > self.max_trust_score {
            return Err(ConfigError::Invalid(
                "initial_trust_score cannot exceed max_trust_score".into(),
            ));
        }
        if self.min_trust_score_for_loan > self.max_trust_score {
            return Err(ConfigError::Invalid(
                "min_trust_score_for_loan cannot exceed max_trust_score".into(),
            ));
        }
        if self.default_score_penalty <= self.repay_score_reward {
            return Err(ConfigError::Invalid(
                "default_score_penalty must exceed repay_score_reward".into(),
            ));
        }
        if self.collateral_factor_bps < 10_000 {
            return Err(ConfigError::Invalid(
                "collateral_factor_bps must be at least 10000 (100% of principal)".into(),
            ));
        }
        if self.interest_rate_bps > 10_000 {
            return Err(ConfigError::Invalid(
                "interest_rate_bps cannot exceed 10000".into(),
            ));
        }
        if self.commission_bps > self.interest_rate_bps {
            return Err(ConfigError::Invalid(
                "commission_bps cannot exceed interest_rate_bps".into(),
            ));
        }
        if self.loan_duration_secs == 0 {
            return Err(ConfigError::Invalid("loan_duration_secs must be > 0".into()));
        }
        if let ScoreCreditPolicy::StakeProportional { divisor, .. } = self.score_credit {
            if divisor == 0 {
                return Err(ConfigError::Invalid(
                    "score credit divisor must be > 0".into(),
                ));
            }
        }
        Ok(())
    }

    /// Collateral required for a loan of `amount`, truncating.
    pub fn collateral_for(&self, amount: u128) -> Option<u128> {
        amount
            .checked_mul(self.collateral_factor_bps as u128)
            .map(|v| v / 10_000)
    }

    /// Total owed at repayment: principal plus fixed interest, truncating.
    pub fn repayment_for(&self, amount: u128) -> Option<u128> {
        let interest = amount.checked_mul(self.interest_rate_bps as u128)? / 10_000;
        amount.checked_add(interest)
    }

    /// Endorser commission due on repayment of a loan of `amount`.
    pub fn commission_for(&self, amount: u128) -> Option<u128> {
        amount
            .checked_mul(self.commission_bps as u128)
            .map(|v| v / 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(LedgerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_penalty_must_exceed_reward() {
        let config = LedgerConfig {
            repay_score_reward: 100,
            default_score_penalty: 100,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_collateral_formula_truncates() {
        let config = LedgerConfig::default();
        assert_eq!(config.collateral_for(10_000), Some(13_000));
        assert_eq!(config.collateral_for(10), Some(13));
        assert_eq!(config.collateral_for(7), Some(9)); // 9.1 truncated
    }

    #[test]
    fn test_repayment_formula() {
        let config = LedgerConfig::default();
        assert_eq!(config.repayment_for(10_000), Some(10_700));
        // Interest below one unit truncates to zero
        assert_eq!(config.repayment_for(10), Some(10));
    }

    #[test]
    fn test_commission_formula() {
        let config = LedgerConfig::default();
        assert_eq!(config.commission_for(10_000), Some(600));
    }

    #[test]
    fn test_stake_proportional_credit_saturates() {
        let policy = ScoreCreditPolicy::StakeProportional {
            divisor: 1,
            cap: 50,
        };
        assert_eq!(policy.credit(10), 10);
        assert_eq!(policy.credit(50), 50);
        assert_eq!(policy.credit(1_000_000), 50);
    }

    #[test]
    fn test_flat_credit_ignores_stake() {
        let policy = ScoreCreditPolicy::Flat { points: 25 };
        assert_eq!(policy.credit(1), 25);
        assert_eq!(policy.credit(1_000_000), 25);
    }
}
