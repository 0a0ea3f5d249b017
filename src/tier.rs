// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Membership tiers and the tier table.
//!
//! A tier is derived from a user's rolling 30-day fee contribution. The
//! table is a right-continuous step function: tier `i` covers
//! `[min_fees_i, max_fees_i)` and `max_fees_i == min_fees_{i+1}`, so every
//! non-negative fee sum maps to exactly one tier.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Membership rank, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    Bronze,
    Silver,
    Gold,
    Diamond,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Bronze, Tier::Silver, Tier::Gold, Tier::Diamond];

    pub fn index(&self) -> usize {
        match self {
            Self::Bronze => 0,
            Self::Silver => 1,
            Self::Gold => 2,
            Self::Diamond => 3,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Bronze => "Bronze",
            Self::Silver => "Silver",
            Self::Gold => "Gold",
            Self::Diamond => "Diamond",
        }
    }
}

impl Default for Tier {
    fn default() -> Self { Tier::Bronze }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Mint-time privileges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MintCapability {
    /// SoSo holding boost applies to minted energy.
    HoldingBoost,
}

/// Consultation kinds a tier may open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionCapability {
    AiChat,
    ResearcherChat,
    VoiceCall,
    PriorityMatching,
}

impl fmt::Display for SessionCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AiChat => "ai-chat",
            Self::ResearcherChat => "researcher-chat",
            Self::VoiceCall => "voice-call",
            Self::PriorityMatching => "priority-matching",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// TierDefinition
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierDefinition {
    pub tier: Tier,
    /// Inclusive lower bound on 30-day fees.
    pub min_fees: Decimal,
    /// Exclusive upper bound; `None` means unbounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_fees: Option<Decimal>,
    /// Fraction of unshielded available energy removed per decay period.
    pub decay_rate: Decimal,
    pub color: String,
    #[serde(default)]
    pub mint_capabilities: Vec<MintCapability>,
    #[serde(default)]
    pub session_capabilities: Vec<SessionCapability>,
}

impl TierDefinition {
    pub fn contains(&self, fees: Decimal) -> bool {
        fees >= self.min_fees && self.max_fees.map_or(true, |max| fees < max)
    }

    pub fn allows_session(&self, capability: SessionCapability) -> bool {
        self.session_capabilities.contains(&capability)
    }

    pub fn allows_mint(&self, capability: MintCapability) -> bool {
        self.mint_capabilities.contains(&capability)
    }
}

/// Where a fee sum sits relative to the next tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierProgress {
    pub tier: Tier,
    pub next: Option<Tier>,
    /// Fees still needed to reach `next`, zero at the top tier.
    pub fees_to_next: Decimal,
}

// ---------------------------------------------------------------------------
// TierTable
// ---------------------------------------------------------------------------

/// Ordered, contiguous tier definitions. Validated by
/// [`EconomyConfig::validate`](crate::config::EconomyConfig::validate).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTable {
    #[serde(rename = "tier")]
    pub definitions: Vec<TierDefinition>,
}

impl Default for TierTable {
    fn default() -> Self {
        use SessionCapability::*;
        let base = vec![AiChat, ResearcherChat];
        let gold = vec![AiChat, ResearcherChat, VoiceCall];
        let diamond = vec![AiChat, ResearcherChat, VoiceCall, PriorityMatching];
        let boost = vec![MintCapability::HoldingBoost];
        Self {
            definitions: vec![
                TierDefinition {
                    tier: Tier::Bronze,
                    min_fees: dec!(0),
                    max_fees: Some(dec!(100)),
                    decay_rate: dec!(0.20),
                    color: "#CD7F32".to_string(),
                    mint_capabilities: boost.clone(),
                    session_capabilities: base.clone(),
                },
                TierDefinition {
                    tier: Tier::Silver,
                    min_fees: dec!(100),
                    max_fees: Some(dec!(1000)),
                    decay_rate: dec!(0.15),
                    color: "#C0C0C0".to_string(),
                    mint_capabilities: boost.clone(),
                    session_capabilities: base,
                },
                TierDefinition {
                    tier: Tier::Gold,
                    min_fees: dec!(1000),
                    max_fees: Some(dec!(10000)),
                    decay_rate: dec!(0.10),
                    color: "#FFD700".to_string(),
                    mint_capabilities: boost.clone(),
                    session_capabilities: gold,
                },
                TierDefinition {
                    tier: Tier::Diamond,
                    min_fees: dec!(10000),
                    max_fees: None,
                    decay_rate: dec!(0.05),
                    color: "#B9F2FF".to_string(),
                    mint_capabilities: boost,
                    session_capabilities: diamond,
                },
            ],
        }
    }
}

impl TierTable {
    /// Definition covering `fees`. Negative sums are treated as zero.
    pub fn definition_for(&self, fees: Decimal) -> &TierDefinition {
        let fees = fees.max(Decimal::ZERO);
        // Scan from the top so the first match is the highest tier whose
        // lower bound has been reached.
        self.definitions
            .iter()
            .rev()
            .find(|d| fees >= d.min_fees)
            .unwrap_or(&self.definitions[0])
    }

    pub fn tier_for(&self, fees: Decimal) -> Tier {
        self.definition_for(fees).tier
    }

    /// Look up a tier's definition; falls back to the lowest tier when a
    /// custom table omits it.
    pub fn get(&self, tier: Tier) -> &TierDefinition {
        self.definitions
            .iter()
            .find(|d| d.tier == tier)
            .unwrap_or(&self.definitions[0])
    }

    pub fn decay_rate(&self, tier: Tier) -> Decimal {
        self.get(tier).decay_rate
    }

    pub fn progress(&self, fees: Decimal) -> TierProgress {
        let current = self.definition_for(fees);
        let next = self.definitions.iter().find(|d| d.min_fees > current.min_fees);
        match next {
            Some(n) => TierProgress {
                tier: current.tier,
                next: Some(n.tier),
                fees_to_next: (n.min_fees - fees.max(Decimal::ZERO)).max(Decimal::ZERO),
            },
            None => TierProgress {
                tier: current.tier,
                next: None,
                fees_to_next: Decimal::ZERO,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gold_boundary_is_right_continuous() {
        let table = TierTable::default();
        assert_eq!(table.tier_for(dec!(999.99)), Tier::Silver);
        assert_eq!(table.tier_for(dec!(1000.00)), Tier::Gold);
        assert_eq!(table.tier_for(dec!(1000.01)), Tier::Gold);
    }

    #[test]
    fn every_boundary_has_exactly_one_owner() {
        let table = TierTable::default();
        for def in &table.definitions {
            let owners = table
                .definitions
                .iter()
                .filter(|d| d.contains(def.min_fees))
                .count();
            assert_eq!(owners, 1, "boundary {} owned by {owners} tiers", def.min_fees);
            assert_eq!(table.tier_for(def.min_fees), def.tier);
        }
    }

    #[test]
    fn tier_is_monotonic_in_fees() {
        let table = TierTable::default();
        let mut last = Tier::Bronze;
        for cents in (0..2_000_000i64).step_by(997) {
            let tier = table.tier_for(Decimal::new(cents, 2));
            assert!(tier >= last, "tier dropped from {last} to {tier} at {cents}c");
            last = tier;
        }
        assert_eq!(last, Tier::Diamond);
    }

    #[test]
    fn negative_fees_map_to_lowest_tier() {
        let table = TierTable::default();
        assert_eq!(table.tier_for(dec!(-5)), Tier::Bronze);
    }

    #[test]
    fn decay_rate_drops_with_tier() {
        let table = TierTable::default();
        assert_eq!(table.decay_rate(Tier::Bronze), dec!(0.20));
        assert_eq!(table.decay_rate(Tier::Diamond), dec!(0.05));
    }

    #[test]
    fn progress_reports_distance_to_next_tier() {
        let table = TierTable::default();
        let p = table.progress(dec!(250));
        assert_eq!(p.tier, Tier::Silver);
        assert_eq!(p.next, Some(Tier::Gold));
        assert_eq!(p.fees_to_next, dec!(750));

        let top = table.progress(dec!(50000));
        assert_eq!(top.next, None);
        assert_eq!(top.fees_to_next, Decimal::ZERO);
    }

    #[test]
    fn capabilities_widen_with_tier() {
        let table = TierTable::default();
        assert!(!table.get(Tier::Silver).allows_session(SessionCapability::VoiceCall));
        assert!(table.get(Tier::Gold).allows_session(SessionCapability::VoiceCall));
        assert!(table.get(Tier::Diamond).allows_session(SessionCapability::PriorityMatching));
        assert!(table.get(Tier::Bronze).allows_mint(MintCapability::HoldingBoost));
    }
}
