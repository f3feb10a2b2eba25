//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Values mirror the settlement ledger's fixed-point integers and are
//! serialized as decimal strings, since raw ledger values routinely exceed
//! the 53-bit safe-integer range of JSON consumers.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when constructing numeric values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("invalid decimal value: {0}")]
    InvalidDecimal(String),

    #[error("value must be non-negative: {0}")]
    Negative(String),
}

/// A limit price in quote-currency fixed-point units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Price {
    pub const ZERO: Price = Price(Decimal::ZERO);

    /// Create from a raw integer value
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Create from a non-negative decimal, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Parse from a decimal string (the ledger's wire representation)
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value =
            Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(value).ok_or_else(|| NumericError::Negative(s.to_string()))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A base-asset quantity in fixed-point units.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Quantity(#[serde(with = "rust_decimal::serde::str")] Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    /// Zero quantity
    pub fn zero() -> Self {
        Self::ZERO
    }

    /// Create from a raw integer value
    pub fn from_u64(value: u64) -> Self {
        Self(Decimal::from(value))
    }

    /// Create from a non-negative decimal, returning None if negative
    pub fn try_new(value: Decimal) -> Option<Self> {
        if value.is_sign_negative() {
            None
        } else {
            Some(Self(value))
        }
    }

    /// Parse from a decimal string (the ledger's wire representation)
    pub fn from_str(s: &str) -> Result<Self, NumericError> {
        let value =
            Decimal::from_str(s).map_err(|_| NumericError::InvalidDecimal(s.to_string()))?;
        Self::try_new(value).ok_or_else(|| NumericError::Negative(s.to_string()))
    }

    /// Get the inner decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Whether this quantity is zero
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Checked addition, None on decimal overflow
    pub fn checked_add(&self, other: Quantity) -> Option<Quantity> {
        self.0.checked_add(other.0).map(Quantity)
    }

    /// Subtraction floored at zero — the ledger never reports negative
    /// remaining liquidity, and neither do we.
    pub fn saturating_sub(&self, other: Quantity) -> Quantity {
        if other.0 >= self.0 {
            Quantity::ZERO
        } else {
            Quantity(self.0 - other.0)
        }
    }

    /// The smaller of two quantities
    pub fn min(self, other: Quantity) -> Quantity {
        if self.0 <= other.0 {
            self
        } else {
            other
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
