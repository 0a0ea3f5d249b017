// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Energy Economy Engine - Rolling Fee Window

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::tier::{Tier, TierTable};
use crate::types::{Energy, Timestamp, MAX_ENERGY, THIRTY_DAYS_SECS};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeeWindowError {
    #[error("invalid trade: volume {volume}, fee rate {fee_rate}")]
    InvalidTrade { volume: Decimal, fee_rate: Decimal },

    #[error("fee {0} overflows the rolling window")]
    WindowOverflow(Decimal),
}

// ---------------------------------------------------------------------------
// FeeEvent
// ---------------------------------------------------------------------------

/// One trade reported by the fee generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEvent {
    pub id: u64,
    pub timestamp: Timestamp,
    pub volume: Decimal,
    pub fee_rate: Decimal,
    pub fee: Decimal,
}

impl FeeEvent {
    /// `fee = volume * fee_rate`, truncated to the energy scale and capped
    /// at [`MAX_ENERGY`].
    pub fn new(id: u64, timestamp: Timestamp, volume: Decimal, fee_rate: Decimal) -> Result<Self, FeeWindowError> {
        let invalid = FeeWindowError::InvalidTrade { volume, fee_rate };
        if volume < Decimal::ZERO || fee_rate < Decimal::ZERO {
            return Err(invalid);
        }
        let fee = match volume.checked_mul(fee_rate) {
            Some(fee) if fee <= MAX_ENERGY.0 => Energy(fee).quantize().0,
            _ => return Err(invalid),
        };
        Ok(Self {
            id,
            timestamp,
            volume,
            fee_rate,
            fee,
        })
    }
}

/// Result of recomputing the tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TierChange {
    Unchanged(Tier),
    Upgraded { from: Tier, to: Tier },
    Downgraded { from: Tier, to: Tier },
}

impl TierChange {
    pub fn current(&self) -> Tier {
        match *self {
            Self::Unchanged(t) => t,
            Self::Upgraded { to, .. } | Self::Downgraded { to, .. } => to,
        }
    }
}

// ---------------------------------------------------------------------------
// FeeWindow
// ---------------------------------------------------------------------------

/// Per-user trailing fee sum.
///
/// Events are kept sorted by timestamp alongside a running sum, so pruning
/// pops from the front and never rescans the retained events. The cached
/// tier is recomputed from the sum on every observation, which makes the
/// recomputation idempotent for a fixed `now`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FeeWindow {
    events: VecDeque<FeeEvent>,
    sum: Decimal,
    window_secs: u64,
    tier: Tier,
}

impl Default for FeeWindow {
    fn default() -> Self {
        Self::new(THIRTY_DAYS_SECS)
    }
}

impl FeeWindow {
    pub fn new(window_secs: u64) -> Self {
        Self {
            events: VecDeque::new(),
            sum: Decimal::ZERO,
            window_secs,
            tier: Tier::Bronze,
        }
    }

    /// Append a trade, prune what aged out relative to `now`, and return the
    /// new rolling sum. Events already outside the window are dropped. The
    /// window is untouched when the sum would overflow.
    pub fn record(&mut self, event: FeeEvent, now: Timestamp) -> Result<Decimal, FeeWindowError> {
        let cutoff = now.minus(self.window_secs);
        if event.timestamp >= cutoff {
            self.sum = self
                .sum
                .checked_add(event.fee)
                .ok_or(FeeWindowError::WindowOverflow(event.fee))?;
            let pos = self
                .events
                .iter()
                .rposition(|e| e.timestamp <= event.timestamp)
                .map_or(0, |i| i + 1);
            self.events.insert(pos, event);
        }
        Ok(self.prune(now))
    }

    /// Σ fee over events with `timestamp >= now - window`.
    pub fn rolling_sum(&mut self, now: Timestamp) -> Decimal {
        self.prune(now)
    }

    /// Last computed sum without pruning.
    pub fn cached_sum(&self) -> Decimal {
        self.sum
    }

    pub fn cached_tier(&self) -> Tier {
        self.tier
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> impl Iterator<Item = &FeeEvent> {
        self.events.iter()
    }

    /// Prune, recompute the tier against `table`, and report the change.
    pub fn observe(&mut self, table: &TierTable, now: Timestamp) -> TierChange {
        let sum = self.prune(now);
        let from = self.tier;
        let to = table.tier_for(sum);
        self.tier = to;
        if to > from {
            TierChange::Upgraded { from, to }
        } else if to < from {
            TierChange::Downgraded { from, to }
        } else {
            TierChange::Unchanged(to)
        }
    }

    fn prune(&mut self, now: Timestamp) -> Decimal {
        let cutoff = now.minus(self.window_secs);
        while let Some(front) = self.events.front() {
            if front.timestamp >= cutoff {
                break;
            }
            self.sum -= front.fee;
            self.events.pop_front();
        }
        if self.events.is_empty() {
            // Clear any residue so an empty window reads exactly zero.
            self.sum = Decimal::ZERO;
        }
        self.sum
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
