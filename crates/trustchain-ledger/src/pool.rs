// LIQUIDITY POOL
//
// Custody of pooled capital. Accounting invariants:
// 1. available_to_borrow <= total_liquidity, always
// 2. neither balance is ever negative (unsigned + checked arithmetic)
// 3. total_liquidity counts the principal of active loans as a receivable,
//    so funding a loan moves only available_to_borrow

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: u128, available: u128 },

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("pool balance overflow")]
    BalanceOverflow,

    #[error("pool accounting violation: {0}")]
    AccountingViolation(String),
}

/// Singleton pool balance sheet.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidityPool {
    total_liquidity: u128,
    available_to_borrow: u128,
}

impl LiquidityPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_liquidity(&self) -> u128 {
        self.total_liquidity
    }

    pub fn available_to_borrow(&self) -> u128 {
        self.available_to_borrow
    }

    /// New capital enters custody and is immediately lendable.
    pub fn deposit(&mut self, amount: u128) -> Result<(), PoolError> {
        if amount == 0 {
            return Err(PoolError::InvalidAmount);
        }
        let total = self
            .total_liquidity
            .checked_add(amount)
            .ok_or(PoolError::BalanceOverflow)?;
        let available = self
            .available_to_borrow
            .checked_add(amount)
            .ok_or(PoolError::BalanceOverflow)?;
        self.total_liquidity = total;
        self.available_to_borrow = available;
        Ok(())
    }

    /// Reserve `amount` of principal for a loan being funded.
    pub fn lock(&mut self, amount: u128) -> Result<(), PoolError> {
        if amount > self.available_to_borrow {
            warn!(
                "loan funding rejected: requested {} exceeds available {}",
                amount, self.available_to_borrow
            );
            return Err(PoolError::InsufficientLiquidity {
                requested: amount,
                available: self.available_to_borrow,
            });
        }
        self.available_to_borrow -= amount;
        Ok(())
    }

    /// Unlock previously reserved principal (repayment or cancellation).
    pub fn release(&mut self, amount: u128) -> Result<(), PoolError> {
        let available = self
            .available_to_borrow
            .checked_add(amount)
            .ok_or(PoolError::BalanceOverflow)?;
        if available > self.total_liquidity {
            return Err(PoolError::AccountingViolation(format!(
                "release of {} would push available {} past total {}",
                amount, available, self.total_liquidity
            )));
        }
        self.available_to_borrow = available;
        Ok(())
    }

    /// Net inflow that grows the pool (interest after commission).
    pub fn absorb(&mut self, amount: u128) -> Result<(), PoolError> {
        let total = self
            .total_liquidity
            .checked_add(amount)
            .ok_or(PoolError::BalanceOverflow)?;
        let available = self
            .available_to_borrow
            .checked_add(amount)
            .ok_or(PoolError::BalanceOverflow)?;
        self.total_liquidity = total;
        self.available_to_borrow = available;
        Ok(())
    }

    /// Forfeited collateral enters custody as lendable capital.
    pub fn seize(&mut self, amount: u128) -> Result<(), PoolError> {
        self.absorb(amount)
    }

    /// Remove a defaulted loan's principal receivable from the books. The
    /// matching available_to_borrow reduction already happened at lock time.
    pub fn write_off(&mut self, amount: u128) -> Result<(), PoolError> {
        let total = self
            .total_liquidity
            .checked_sub(amount)
            .ok_or_else(|| {
                PoolError::AccountingViolation(format!(
                    "write-off of {} exceeds total liquidity {}",
                    amount, self.total_liquidity
                ))
            })?;
        self.total_liquidity = total;
        Ok(())
    }

    /// Apply the pool side of a repayment atomically: the principal unlocks
    /// and the net gain is absorbed, or nothing changes.
    pub fn settle_repayment(&mut self, principal: u128, net_gain: u128) -> Result<(), PoolError> {
        let total = self
            .total_liquidity
            .checked_add(net_gain)
            .ok_or(PoolError::BalanceOverflow)?;
        let available = self
            .available_to_borrow
            .checked_add(principal)
            .and_then(|v| v.checked_add(net_gain))
            .ok_or(PoolError::BalanceOverflow)?;
        if available > total {
            return Err(PoolError::AccountingViolation(format!(
                "repayment settlement would push available {} past total {}",
                available, total
            )));
        }
        self.total_liquidity = total;
        self.available_to_borrow = available;
        Ok(())
    }

    /// Apply the pool side of a default atomically: the principal receivable
    /// is written off and the seized collateral enters custody.
    pub fn settle_default(&mut self, principal: u128, collateral: u128) -> Result<(), PoolError> {
        let total = self
            .total_liquidity
            .checked_sub(principal)
            .ok_or_else(|| {
                PoolError::AccountingViolation(format!(
                    "defaulted principal {} exceeds total liquidity {}",
                    principal, self.total_liquidity
                ))
            })?
            .checked_add(collateral)
            .ok_or(PoolError::BalanceOverflow)?;
        let available = self
            .available_to_borrow
            .checked_add(collateral)
            .ok_or(PoolError::BalanceOverflow)?;
        if available > total {
            return Err(PoolError::AccountingViolation(format!(
                "default settlement would push available {} past total {}",
                available, total
            )));
        }
        self.total_liquidity = total;
        self.available_to_borrow = available;
        Ok(())
    }

    /// Consistency check of the two balances.
    pub fn verify(&self) -> Result<(), PoolError> {
        if self.available_to_borrow > self.total_liquidity {
            return Err(PoolError::AccountingViolation(format!(
                "available {} exceeds total {}",
                self.available_to_borrow, self.total_liquidity
            )));
        }
        Ok(())
    }
}
