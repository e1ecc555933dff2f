//! TrustChain Ledger Core
//!
//! This crate implements the trust-scored, collateralized micro-lending
//! ledger behind TrustChain:
//! - A user registry with a bounded, mutable reputation score
//! - A stake-weighted endorsement mechanism feeding the registry and pool
//! - A liquidity pool funding loans and receiving repayments
//! - A loan lifecycle state machine with collateralization, fixed interest,
//!   repayment, and default handling
//!
//! All mutating operations go through the [`TrustLedger`] facade and are
//! atomic: either every sub-effect applies, or none do. The ledger is a
//! single logical writer; callers serialize mutations behind one lock.

pub mod account;
pub mod address;
pub mod config;
pub mod endorsement;
pub mod events;
pub mod ledger;
pub mod loan;
pub mod pool;

// Re-export key types for easy access
pub use account::{Account, RegistryError, ScoreReason, TrustRegistry};
pub use address::Address;
pub use config::{CommissionPolicy, ConfigError, LedgerConfig, ScoreCreditPolicy};
pub use endorsement::{Endorsement, EndorsementBook, EndorsementError};
pub use events::{LedgerEvent, LedgerEventKind};
pub use ledger::{LedgerError, PoolStats, TrustLedger};
pub use loan::{Loan, LoanBook, LoanError, LoanStatus};
pub use pool::{LiquidityPool, PoolError};
