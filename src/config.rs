// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Economy parameters: tier table, boost curve, shield schedule, windows and
//! session policy. Loadable from TOML; every constructor path validates.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::boost::BoostCurve;
use crate::shield::ShieldSchedule;
use crate::tier::{Tier, TierTable};
use crate::types::{DAY_SECS, THIRTY_DAYS_SECS, WEEK_SECS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse economy config: {0}")]
    Parse(String),

    #[error("tier table is empty")]
    EmptyTierTable,

    #[error("lowest tier must start at zero fees, starts at {0}")]
    TierFloorNotZero(Decimal),

    #[error("gap or overlap between {lower} and {upper}: {lower} ends at {end:?}, {upper} starts at {start}")]
    TierDiscontinuity {
        lower: Tier,
        upper: Tier,
        end: Option<Decimal>,
        start: Decimal,
    },

    #[error("highest tier {0} must be unbounded")]
    TopTierBounded(Tier),

    #[error("tiers out of order: {0} listed after {1}")]
    TierOrder(Tier, Tier),

    #[error("decay rate {rate} for {tier} outside [0, 1]")]
    InvalidRate { tier: Tier, rate: Decimal },

    #[error("invalid boost curve: {0}")]
    InvalidCurve(String),

    #[error("invalid shield schedule: {0}")]
    InvalidShield(String),

    #[error("invalid window policy: {0}")]
    InvalidWindow(String),
}

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowPolicy {
    pub fee_window_secs: u64,
    pub log_retention_secs: u64,
    pub decay_period_secs: u64,
    /// Apply due decay whenever a ledger is touched, in addition to sweeps.
    pub lazy_decay: bool,
}

impl Default for WindowPolicy {
    fn default() -> Self {
        Self {
            fee_window_secs: THIRTY_DAYS_SECS,
            log_retention_secs: THIRTY_DAYS_SECS,
            decay_period_secs: WEEK_SECS,
            lazy_decay: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionPolicy {
    pub default_max_rounds: u32,
    pub extension_rounds: u32,
    pub answer_timeout_secs: u64,
    pub chat_idle_timeout_secs: u64,
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            default_max_rounds: 10,
            extension_rounds: 10,
            answer_timeout_secs: 15 * 60,
            chat_idle_timeout_secs: 30 * 60,
        }
    }
}

// ---------------------------------------------------------------------------
// EconomyConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomyConfig {
    pub tiers: TierTable,
    pub boost: BoostCurve,
    pub shield: ShieldSchedule,
    pub windows: WindowPolicy,
    pub sessions: SessionPolicy,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            tiers: TierTable::default(),
            boost: BoostCurve::default(),
            shield: ShieldSchedule::default(),
            windows: WindowPolicy::default(),
            sessions: SessionPolicy::default(),
        }
    }
}

impl EconomyConfig {
    /// Parse and validate a TOML document. Missing sections take defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let cfg: EconomyConfig = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_tiers()?;
        self.validate_boost()?;
        self.validate_shield()?;
        self.validate_windows()
    }

    fn validate_tiers(&self) -> Result<(), ConfigError> {
        let defs = &self.tiers.definitions;
        let first = defs.first().ok_or(ConfigError::EmptyTierTable)?;
        if !first.min_fees.is_zero() {
            return Err(ConfigError::TierFloorNotZero(first.min_fees));
        }
        for def in defs {
            if def.decay_rate < Decimal::ZERO || def.decay_rate > Decimal::ONE {
                return Err(ConfigError::InvalidRate { tier: def.tier, rate: def.decay_rate });
            }
        }
        for pair in defs.windows(2) {
            let (lo, hi) = (&pair[0], &pair[1]);
            if hi.tier <= lo.tier {
                return Err(ConfigError::TierOrder(hi.tier, lo.tier));
            }
            if lo.max_fees != Some(hi.min_fees) || hi.min_fees <= lo.min_fees {
                return Err(ConfigError::TierDiscontinuity {
                    lower: lo.tier,
                    upper: hi.tier,
                    end: lo.max_fees,
                    start: hi.min_fees,
                });
            }
        }
        if let Some(last) = defs.last() {
            if last.max_fees.is_some() {
                return Err(ConfigError::TopTierBounded(last.tier));
            }
        }
        Ok(())
    }

    fn validate_boost(&self) -> Result<(), ConfigError> {
        let b = &self.boost;
        if b.max_boost < Decimal::ZERO {
            return Err(ConfigError::InvalidCurve(format!("max_boost {} is negative", b.max_boost)));
        }
        if b.threshold < Decimal::ZERO || b.cap < b.threshold {
            return Err(ConfigError::InvalidCurve(format!(
                "threshold {} must be non-negative and <= cap {}",
                b.threshold, b.cap
            )));
        }
        Ok(())
    }

    fn validate_shield(&self) -> Result<(), ConfigError> {
        let s = &self.shield;
        if !(s.normal_threshold <= s.core_threshold && s.core_threshold <= s.vip_threshold) {
            return Err(ConfigError::InvalidShield("thresholds must ascend".to_string()));
        }
        if s.weekly_rate < Decimal::ZERO
            || s.normal_floor < Decimal::ZERO
            || s.core_floor < Decimal::ZERO
            || s.vip_floor < Decimal::ZERO
        {
            return Err(ConfigError::InvalidShield("floors and rate must be non-negative".to_string()));
        }
        Ok(())
    }

    fn validate_windows(&self) -> Result<(), ConfigError> {
        let w = &self.windows;
        if w.fee_window_secs < DAY_SECS {
            return Err(ConfigError::InvalidWindow(format!(
                "fee window {}s shorter than a day",
                w.fee_window_secs
            )));
        }
        if w.decay_period_secs == 0 || w.log_retention_secs == 0 {
            return Err(ConfigError::InvalidWindow("periods must be non-zero".to_string()));
        }
        if self.sessions.default_max_rounds == 0 {
            return Err(ConfigError::InvalidWindow("sessions need at least one round".to_string()));
        }
        Ok(())
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
    fn default_config_is_valid() {
        EconomyConfig::default().validate().expect("test: default config validates");
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg = EconomyConfig::from_toml_str("").expect("test: empty toml parses");
        assert_eq!(cfg, EconomyConfig::default());
    }

    #[test]
    fn partial_toml_overrides_sections() {
        let cfg = EconomyConfig::from_toml_str(
            r#"
            [sessions]
            default_max_rounds = 5

            [boost]
            threshold = "500"
            cap = "5000"
            max_boost = "1.0"
            "#,
        )
        .expect("test: partial toml parses");
        assert_eq!(cfg.sessions.default_max_rounds, 5);
        assert_eq!(cfg.sessions.extension_rounds, 10);
        assert_eq!(cfg.boost.max_boost, dec!(1.0));
        assert_eq!(cfg.tiers, TierTable::default());
    }

    #[test]
    fn round_trips_through_toml() {
        let cfg = EconomyConfig::default();
        let text = cfg.to_toml_string().expect("test: serializes");
        let back = EconomyConfig::from_toml_str(&text).expect("test: parses back");
        assert_eq!(back, cfg);
    }

    #[test]
    fn gap_between_tiers_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.tiers.definitions[1].max_fees = Some(dec!(999));
        let err = cfg.validate().expect_err("test: gap must fail");
        assert!(matches!(err, ConfigError::TierDiscontinuity { lower: Tier::Silver, .. }), "got {err}");
    }

    #[test]
    fn bounded_top_tier_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.tiers.definitions[3].max_fees = Some(dec!(1000000));
        assert!(matches!(cfg.validate(), Err(ConfigError::TopTierBounded(Tier::Diamond))));
    }

    #[test]
    fn decay_rate_out_of_range_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.tiers.definitions[0].decay_rate = dec!(1.5);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidRate { tier: Tier::Bronze, .. })));
    }

    #[test]
    fn inverted_boost_curve_rejected() {
        let mut cfg = EconomyConfig::default();
        cfg.boost.cap = dec!(10);
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidCurve(_))));
    }
}
