// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! SSI staking shield: the slice of available energy exempt from decay.
//!
//! ```text
//! shield_floor(stake) = max(tier_floor(ssi_tier(stake)), stake * weekly_rate)
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::types::Energy;

/// Stake bucket, by USD value staked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SsiTier {
    None,
    Normal,
    Core,
    Vip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShieldSchedule {
    pub normal_threshold: Decimal,
    pub core_threshold: Decimal,
    pub vip_threshold: Decimal,
    pub normal_floor: Decimal,
    pub core_floor: Decimal,
    pub vip_floor: Decimal,
    /// Energy shielded per staked USD.
    pub weekly_rate: Decimal,
}

impl Default for ShieldSchedule {
    fn default() -> Self {
        Self {
            normal_threshold: dec!(100),
            core_threshold: dec!(1000),
            vip_threshold: dec!(10000),
            normal_floor: dec!(50),
            core_floor: dec!(200),
            vip_floor: dec!(500),
            weekly_rate: dec!(0.02),
        }
    }
}

impl ShieldSchedule {
    pub fn ssi_tier(&self, staked: Decimal) -> SsiTier {
        if staked >= self.vip_threshold {
            SsiTier::Vip
        } else if staked >= self.core_threshold {
            SsiTier::Core
        } else if staked >= self.normal_threshold {
            SsiTier::Normal
        } else {
            SsiTier::None
        }
    }

    pub fn tier_floor(&self, tier: SsiTier) -> Decimal {
        match tier {
            SsiTier::None => Decimal::ZERO,
            SsiTier::Normal => self.normal_floor,
            SsiTier::Core => self.core_floor,
            SsiTier::Vip => self.vip_floor,
        }
    }

    pub fn shield_floor(&self, staked: Decimal) -> Energy {
        let staked = staked.max(Decimal::ZERO);
        let fixed = self.tier_floor(self.ssi_tier(staked));
        let rated = staked * self.weekly_rate;
        Energy(fixed.max(rated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_stake_no_shield() {
        let s = ShieldSchedule::default();
        assert_eq!(s.shield_floor(Decimal::ZERO), Energy::ZERO);
        assert_eq!(s.ssi_tier(dec!(99.99)), SsiTier::None);
    }

    #[test]
    fn vip_threshold_gets_fixed_floor_over_rate() {
        let s = ShieldSchedule::default();
        // 10000 * 0.02 = 200 < 500 fixed floor
        let floor = s.shield_floor(dec!(10000));
        assert!(floor >= Energy(dec!(500)));
        assert_eq!(floor, Energy(dec!(500)));
    }

    #[test]
    fn rate_wins_for_large_stake() {
        let s = ShieldSchedule::default();
        assert_eq!(s.shield_floor(dec!(100000)), Energy(dec!(2000)));
    }

    #[test]
    fn buckets_at_thresholds() {
        let s = ShieldSchedule::default();
        assert_eq!(s.ssi_tier(dec!(100)), SsiTier::Normal);
        assert_eq!(s.ssi_tier(dec!(1000)), SsiTier::Core);
        assert_eq!(s.ssi_tier(dec!(10000)), SsiTier::Vip);
        assert_eq!(s.shield_floor(dec!(100)), Energy(dec!(50)));
        assert_eq!(s.shield_floor(dec!(1000)), Energy(dec!(200)));
    }
}
