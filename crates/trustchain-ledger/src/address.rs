use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque account identifier.
///
/// The ledger never interprets the contents; clients supply whatever
/// addressing scheme their wallet layer uses. The zero address marks a
/// loan's lender slot before funding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

impl Address {
    pub fn new(raw: impl Into<String>) -> Self {
        Address(raw.into())
    }

    pub fn zero() -> Self {
        Address(ZERO_ADDRESS.to_string())
    }

    pub fn is_zero(&self) -> bool {
        self.0 == ZERO_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(raw: &str) -> Self {
        Address(raw.to_string())
    }
}

impl From<String> for Address {
    fn from(raw: String) -> Self {
        Address(raw)
    }
}
