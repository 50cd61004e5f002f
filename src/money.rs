//! Money types: all amounts in the system are integer minor units (cents).
//!
//! Product prices, account balances, and transaction deltas all flow through
//! `Money` (unsigned) or `SignedMoney` (signed, for ledger deltas). Both are
//! newtypes over the raw integer so a stray `u64`/`i64` can't silently stand
//! in for a price or balance at a call site.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;

/// An unsigned amount of money, in minor units (e.g. cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(u64);

/// A signed amount of money, in minor units. Used for ledger deltas, where
/// the sign records debit vs. credit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignedMoney(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn to_raw(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// True if subtracting `other` would underflow, i.e. `self < other`.
    pub fn is_less_than(&self, other: &Self) -> bool {
        self.0 < other.0
    }

    pub fn as_signed(&self) -> SignedMoney {
        SignedMoney(self.0 as i64)
    }
}

impl SignedMoney {
    pub fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn to_raw(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Money {
        Money(self.0.unsigned_abs())
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn negate(self) -> Self {
        Self(-self.0)
    }
}

impl From<u64> for Money {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl From<i64> for SignedMoney {
    fn from(v: i64) -> Self {
        Self(v)
    }
}

impl Deref for Money {
    type Target = u64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Deref for SignedMoney {
    type Target = i64;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SignedMoney {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_sub_roundtrip() {
        let a = Money::new(500);
        let b = Money::new(300);
        assert_eq!(a.checked_add(b), Some(Money::new(800)));
        assert_eq!(a.checked_sub(b), Some(Money::new(200)));
        assert_eq!(b.checked_sub(a), None);
    }

    #[test]
    fn is_less_than_guards_underflow() {
        let a = Money::new(100);
        let b = Money::new(200);
        assert!(a.is_less_than(&b));
        assert!(!b.is_less_than(&a));
    }

    #[test]
    fn signed_money_abs_and_negate() {
        let debit = SignedMoney::new(-750);
        assert!(debit.is_negative());
        assert_eq!(debit.abs(), Money::new(750));
        assert_eq!(debit.negate(), SignedMoney::new(750));
    }

    #[test]
    fn money_as_signed_for_ledger_credit() {
        let amount = Money::new(1000);
        assert_eq!(amount.as_signed(), SignedMoney::new(1000));
    }
}
