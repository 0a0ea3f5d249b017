// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! SoSo holding boost: a mint-time multiplier on earned energy.
//!
//! ```text
//! boost(h) = 0                                         h <  threshold
//!          = max_boost * (h - threshold) / (cap - threshold)   threshold <= h < cap
//!          = max_boost                                 h >= cap
//! minted   = fee * (1 + boost)
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Energy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostCurve {
    /// Holding below which no boost applies.
    pub threshold: Decimal,
    /// Holding at which the boost saturates.
    pub cap: Decimal,
    pub max_boost: Decimal,
}

impl Default for BoostCurve {
    fn default() -> Self {
        Self {
            threshold: dec!(1000),
            cap: dec!(100000),
            max_boost: dec!(0.5),
        }
    }
}

impl BoostCurve {
    /// Boost for a SoSo holding, in `[0, max_boost]`.
    pub fn boost(&self, holding: Decimal) -> Decimal {
        if holding < self.threshold {
            return Decimal::ZERO;
        }
        if holding >= self.cap {
            return self.max_boost;
        }
        let span = self.cap - self.threshold;
        if span <= Decimal::ZERO {
            return self.max_boost;
        }
        let ramp = self.max_boost * (holding - self.threshold) / span;
        ramp.clamp(Decimal::ZERO, self.max_boost)
    }

    /// Energy minted for `fee` under `boost`, truncated to the energy
    /// scale. `None` when the product does not fit a `Decimal`.
    pub fn apply(fee: Decimal, boost: Decimal) -> Option<Energy> {
        let factor = Decimal::ONE.checked_add(boost)?;
        fee.checked_mul(factor).map(|d| Energy(d).quantize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_below_threshold() {
        let curve = BoostCurve::default();
        assert_eq!(curve.boost(dec!(0)), Decimal::ZERO);
        assert_eq!(curve.boost(dec!(999.99)), Decimal::ZERO);
        assert_eq!(curve.boost(dec!(1000)), Decimal::ZERO);
    }

    #[test]
    fn linear_ramp_between_threshold_and_cap() {
        let curve = BoostCurve::default();
        // midpoint of [1000, 100000] is 50500
        assert_eq!(curve.boost(dec!(50500)), dec!(0.25));
    }

    #[test]
    fn saturates_at_cap() {
        let curve = BoostCurve::default();
        assert_eq!(curve.boost(dec!(100000)), dec!(0.5));
        assert_eq!(curve.boost(dec!(10000000)), dec!(0.5));
    }

    #[test]
    fn apply_multiplies_fee() {
        assert_eq!(BoostCurve::apply(dec!(20), dec!(0.5)), Some(Energy(dec!(30))));
        assert_eq!(BoostCurve::apply(dec!(20), Decimal::ZERO), Some(Energy(dec!(20))));
    }

    #[test]
    fn apply_truncates_repeating_boost() {
        let curve = BoostCurve::default();
        // 0.5 * 32333 / 99000 never terminates
        let boost = curve.boost(dec!(33333));
        let minted = BoostCurve::apply(dec!(0.86419746), boost).expect("test: fits");
        assert!(minted.0.scale() <= crate::types::ENERGY_DP);
        assert!(minted.0 <= dec!(0.86419746) * (Decimal::ONE + boost));
    }

    #[test]
    fn apply_overflow_is_none() {
        assert_eq!(BoostCurve::apply(Decimal::MAX, dec!(1)), None);
    }

    #[test]
    fn degenerate_curve_jumps_to_max() {
        let curve = BoostCurve {
            threshold: dec!(10),
            cap: dec!(10),
            max_boost: dec!(0.3),
        };
        assert_eq!(curve.boost(dec!(9)), Decimal::ZERO);
        assert_eq!(curve.boost(dec!(10)), dec!(0.3));
    }
}
