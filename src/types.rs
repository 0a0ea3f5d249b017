// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Shared identifiers, the `Energy` denomination and time primitives.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

pub const DAY_SECS: u64 = 86_400;
pub const WEEK_SECS: u64 = 7 * DAY_SECS;
pub const THIRTY_DAYS_SECS: u64 = 30 * DAY_SECS;

/// Seconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn from_secs(secs: u64) -> Self {
        Self(secs)
    }

    pub fn from_millis(ms: u64) -> Self {
        Self(ms / 1000)
    }

    pub fn secs(&self) -> u64 {
        self.0
    }

    /// Saturating `self - secs`, used for window cutoffs near the epoch.
    pub fn minus(&self, secs: u64) -> Self {
        Self(self.0.saturating_sub(secs))
    }

    pub fn plus(&self, secs: u64) -> Self {
        Self(self.0.saturating_add(secs))
    }

    /// Seconds elapsed since `earlier`, zero if `earlier` is in the future.
    pub fn since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t+{}s", self.0)
    }
}

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Platform user (the energy holder).
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for UserId {
    fn from(s: String) -> Self { UserId(s) }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self { UserId(s.to_string()) }
}

/// Researcher or AI persona answering a consultation.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct ResponderId(pub String);

impl fmt::Display for ResponderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ResponderId {
    fn from(s: &str) -> Self { ResponderId(s.to_string()) }
}

impl From<String> for ResponderId {
    fn from(s: String) -> Self { ResponderId(s) }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess-{:06}", self.0)
    }
}

/// Per-user, strictly increasing transaction sequence number.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TxId(pub u64);

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct VoucherId(pub u64);

impl fmt::Display for VoucherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voucher-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Energy
// ---------------------------------------------------------------------------

/// Decimal places carried by every energy amount.
pub const ENERGY_DP: u32 = 8;

/// Ceiling on the energy one ledger may ever mint. Keeps every balance at
/// `ENERGY_DP` places inside `Decimal`'s 96-bit mantissa, so sums stay exact.
pub const MAX_ENERGY: Energy = Energy(dec!(1000000000000000000));

/// Energy denomination backed by `rust_decimal::Decimal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Energy(pub Decimal);

impl Energy {
    pub const ZERO: Energy = Energy(Decimal::ZERO);

    pub fn zero() -> Self {
        Self::ZERO
    }

    pub fn from_decimal(d: Decimal) -> Self {
        Self(d)
    }

    pub fn from_units(n: i64) -> Self {
        Self(Decimal::from(n))
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    pub fn is_negative(&self) -> bool {
        self.0 < Decimal::ZERO
    }

    /// `self - rhs`, floored at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        if rhs.0 >= self.0 {
            Self::ZERO
        } else {
            Self(self.0 - rhs.0)
        }
    }

    /// Whole units only; fractional energy is truncated toward zero.
    pub fn floor(self) -> Self {
        Self(self.0.floor())
    }

    pub fn scale(self, factor: Decimal) -> Self {
        Self(self.0 * factor)
    }

    /// Truncate to [`ENERGY_DP`] places.
    pub fn quantize(self) -> Self {
        Self(self.0.round_dp_with_strategy(ENERGY_DP, RoundingStrategy::ToZero))
    }

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }
}

impl Add for Energy {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Energy {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Energy {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Energy {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Sum for Energy {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Energy::ZERO, Add::add)
    }
}

impl fmt::Display for Energy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}E", self.0.normalize())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn saturating_sub_floors_at_zero() {
        let a = Energy(dec!(10));
        let b = Energy(dec!(25));
        assert_eq!(a.saturating_sub(b), Energy::ZERO);
        assert_eq!(b.saturating_sub(a), Energy(dec!(15)));
    }

    #[test]
    fn floor_truncates_fraction() {
        assert_eq!(Energy(dec!(12.99)).floor(), Energy(dec!(12)));
        assert_eq!(Energy(dec!(0.4)).floor(), Energy::ZERO);
    }

    #[test]
    fn quantize_truncates_to_fixed_places() {
        let third = Energy(Decimal::ONE / dec!(3));
        assert_eq!(third.quantize(), Energy(dec!(0.33333333)));
        assert_eq!(Energy(dec!(-0.123456789)).quantize(), Energy(dec!(-0.12345678)));
        assert_eq!(Energy(dec!(42)).quantize(), Energy(dec!(42)));
    }

    #[test]
    fn checked_add_reports_overflow() {
        assert_eq!(Energy(Decimal::MAX).checked_add(Energy(dec!(1))), None);
        assert_eq!(MAX_ENERGY.checked_add(Energy::ZERO), Some(MAX_ENERGY));
    }

    #[test]
    fn timestamp_minus_saturates() {
        let t = Timestamp(100);
        assert_eq!(t.minus(500), Timestamp(0));
        assert_eq!(t.since(Timestamp(40)), 60);
        assert_eq!(Timestamp(40).since(t), 0);
    }

    #[test]
    fn display_formats() {
        assert_eq!(Energy(dec!(12.50)).to_string(), "12.5E");
        assert_eq!(SessionId(42).to_string(), "sess-000042");
        assert_eq!(TxId(7).to_string(), "tx-7");
    }
}
