// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Per-user energy ledger.
//!
//! Each [`UserLedger`] owns the live balances, an append-only transaction
//! log and the user's rolling fee window. Every operation that moves energy
//! appends exactly one log entry and updates the balances in the same call;
//! operations that end up moving nothing (a clamped zero unlock, a decay
//! with nothing to drop) append nothing.
//!
//! ```text
//! minted  : available += a
//! locked  : available -= a   locked  += a
//! unlocked: locked    -= a   available += a
//! spent   : locked    -= a   spent   += a
//! expired : available -= a   expired += a
//!
//! available + locked + spent + expired == minted   (always)
//! ```
//!
//! Log entries older than the retention window are folded into an opening
//! snapshot on write, so `opening + replay(log)` always reproduces the live
//! balances.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::boost::BoostCurve;
use crate::config::{EconomyConfig, WindowPolicy};
use crate::fee_window::{FeeEvent, FeeWindow, TierChange};
use crate::shield::ShieldSchedule;
use crate::tier::{MintCapability, Tier, TierProgress, TierTable};
use crate::types::{Energy, Timestamp, TxId, UserId, MAX_ENERGY};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient energy: requested {requested}, available {available}")]
    InsufficientEnergy { requested: Energy, available: Energy },

    #[error("invalid amount: {0}")]
    InvalidAmount(Decimal),
}

// ---------------------------------------------------------------------------
// Transaction log
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxKind {
    Minted,
    Locked,
    Unlocked,
    Spent,
    Expired,
}

impl fmt::Display for TxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Minted => "minted",
            Self::Locked => "locked",
            Self::Unlocked => "unlocked",
            Self::Spent => "spent",
            Self::Expired => "expired",
        };
        f.write_str(s)
    }
}

/// Immutable audit record of one balance movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub kind: TxKind,
    /// Always strictly positive.
    pub amount: Energy,
    /// `available` after this entry was applied.
    pub balance_after: Energy,
    pub timestamp: Timestamp,
    pub description: String,
    pub related_id: Option<String>,
}

/// One page of history, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPage {
    pub entries: Vec<Transaction>,
    /// Pass back as `before` to continue with strictly older entries.
    pub next_cursor: Option<TxId>,
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Balances {
    pub available: Energy,
    pub locked: Energy,
    pub spent: Energy,
    pub expired: Energy,
    /// Cumulative energy ever minted.
    pub minted: Energy,
}

impl Balances {
    pub fn apply(&mut self, kind: TxKind, amount: Energy) {
        match kind {
            TxKind::Minted => {
                self.available += amount;
                self.minted += amount;
            }
            TxKind::Locked => {
                self.available -= amount;
                self.locked += amount;
            }
            TxKind::Unlocked => {
                self.locked -= amount;
                self.available += amount;
            }
            TxKind::Spent => {
                self.locked -= amount;
                self.spent += amount;
            }
            TxKind::Expired => {
                self.available -= amount;
                self.expired += amount;
            }
        }
    }

    /// `available + locked + spent + expired`; equals `minted` when sound.
    pub fn accounted(&self) -> Energy {
        self.available + self.locked + self.spent + self.expired
    }

    pub fn replay<'a>(opening: &Balances, log: impl IntoIterator<Item = &'a Transaction>) -> Balances {
        let mut b = *opening;
        for tx in log {
            b.apply(tx.kind, tx.amount);
        }
        b
    }
}

// ---------------------------------------------------------------------------
// Operation outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecayOutcome {
    /// Less than one decay period since the last application.
    TooSoon { next_due: Timestamp },
    Applied {
        dropped: Energy,
        shielded: Energy,
        rate: Decimal,
        tier: Tier,
    },
}

impl DecayOutcome {
    pub fn dropped(&self) -> Energy {
        match self {
            Self::TooSoon { .. } => Energy::ZERO,
            Self::Applied { dropped, .. } => *dropped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReceipt {
    pub fee: Decimal,
    pub boost: Decimal,
    pub minted: Energy,
    pub fees_30d: Decimal,
    pub tier_change: TierChange,
}

/// What the presentation layer renders for a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceView {
    pub user: UserId,
    pub available: Energy,
    pub locked: Energy,
    pub spent: Energy,
    pub expired: Energy,
    pub tier: Tier,
    pub color: String,
    pub fees_30d: Decimal,
    pub progress: TierProgress,
    pub shield_floor: Energy,
    pub boost: Decimal,
    pub last_decay_at: Timestamp,
}

// ---------------------------------------------------------------------------
// UserLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLedger {
    user: UserId,
    balances: Balances,
    opening: Balances,
    log: VecDeque<Transaction>,
    next_tx: u64,
    next_fee_event: u64,
    last_decay_at: Timestamp,
    decay_period_secs: u64,
    retention_secs: u64,
    soso_holding: Decimal,
    ssi_staked: Decimal,
    fees: FeeWindow,
}

impl UserLedger {
    /// A fresh ledger anchors its first decay period at `now`.
    pub fn new(user: UserId, windows: &WindowPolicy, now: Timestamp) -> Self {
        Self {
            user,
            balances: Balances::default(),
            opening: Balances::default(),
            log: VecDeque::new(),
            next_tx: 1,
            next_fee_event: 1,
            last_decay_at: now,
            decay_period_secs: windows.decay_period_secs,
            retention_secs: windows.log_retention_secs,
            soso_holding: Decimal::ZERO,
            ssi_staked: Decimal::ZERO,
            fees: FeeWindow::new(windows.fee_window_secs),
        }
    }

    pub fn user(&self) -> &UserId {
        &self.user
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn opening(&self) -> &Balances {
        &self.opening
    }

    pub fn available(&self) -> Energy {
        self.balances.available
    }

    pub fn locked(&self) -> Energy {
        self.balances.locked
    }

    pub fn last_decay_at(&self) -> Timestamp {
        self.last_decay_at
    }

    pub fn log(&self) -> impl DoubleEndedIterator<Item = &Transaction> {
        self.log.iter()
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn holdings(&self) -> (Decimal, Decimal) {
        (self.soso_holding, self.ssi_staked)
    }

    /// Update the external token-economy inputs. Negative values clamp to 0.
    pub fn set_holdings(&mut self, soso_holding: Decimal, ssi_staked: Decimal) {
        self.soso_holding = soso_holding.max(Decimal::ZERO);
        self.ssi_staked = ssi_staked.max(Decimal::ZERO);
    }

    pub fn fee_window(&self) -> &FeeWindow {
        &self.fees
    }

    // -- log plumbing -------------------------------------------------------

    fn append(
        &mut self,
        kind: TxKind,
        amount: Energy,
        now: Timestamp,
        description: String,
        related_id: Option<String>,
    ) -> TxId {
        let id = TxId(self.next_tx);
        self.next_tx += 1;
        self.balances.apply(kind, amount);
        self.log.push_back(Transaction {
            id,
            kind,
            amount,
            balance_after: self.balances.available,
            timestamp: now,
            description,
            related_id,
        });
        self.prune_log(now);
        id
    }

    fn prune_log(&mut self, now: Timestamp) {
        let cutoff = now.minus(self.retention_secs);
        while let Some(front) = self.log.front() {
            if front.timestamp >= cutoff {
                break;
            }
            self.opening.apply(front.kind, front.amount);
            self.log.pop_front();
        }
    }

    /// Refuse a mint that would push cumulative `minted` past [`MAX_ENERGY`].
    fn ensure_mint_room(&self, amount: Energy) -> Result<(), LedgerError> {
        match self.balances.minted.checked_add(amount) {
            Some(total) if total <= MAX_ENERGY => Ok(()),
            _ => Err(LedgerError::InvalidAmount(amount.0)),
        }
    }

    /// Holding boost a mint gets at `tier`: the curve value, or nothing if
    /// the tier lacks [`MintCapability::HoldingBoost`].
    fn effective_boost(&self, config: &EconomyConfig, tier: Tier) -> Decimal {
        if config.tiers.get(tier).allows_mint(MintCapability::HoldingBoost) {
            config.boost.boost(self.soso_holding)
        } else {
            Decimal::ZERO
        }
    }

    // -- operations ---------------------------------------------------------

    /// `available += fee * (1 + boost)`, truncated to the energy scale.
    /// Zero mints write nothing.
    pub fn mint(
        &mut self,
        fee: Decimal,
        boost: Decimal,
        now: Timestamp,
        related_id: Option<String>,
    ) -> Result<Energy, LedgerError> {
        if fee < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(fee));
        }
        if boost < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(boost));
        }
        let amount = BoostCurve::apply(fee, boost).ok_or(LedgerError::InvalidAmount(fee))?;
        if !amount.is_positive() {
            return Ok(Energy::ZERO);
        }
        self.ensure_mint_room(amount)?;
        let description = if boost.is_zero() {
            format!("trade fee {}", fee.normalize())
        } else {
            format!("trade fee {} with {}% boost", fee.normalize(), (boost * Decimal::ONE_HUNDRED).normalize())
        };
        self.append(TxKind::Minted, amount, now, description, related_id);
        tracing::debug!(user = %self.user, %amount, "minted energy");
        Ok(amount)
    }

    /// Reserve `amount` against an in-flight session.
    pub fn lock(
        &mut self,
        amount: Energy,
        now: Timestamp,
        related_id: Option<String>,
    ) -> Result<(), LedgerError> {
        if amount.is_negative() {
            return Err(LedgerError::InvalidAmount(amount.0));
        }
        let amount = amount.quantize();
        if self.balances.available < amount {
            return Err(LedgerError::InsufficientEnergy {
                requested: amount,
                available: self.balances.available,
            });
        }
        if amount.is_zero() {
            return Ok(());
        }
        let description = match &related_id {
            Some(r) => format!("reserved for {r}"),
            None => "reserved".to_string(),
        };
        self.append(TxKind::Locked, amount, now, description, related_id);
        Ok(())
    }

    /// Return up to `amount` of locked energy to `available`. Never fails;
    /// requests beyond `locked` (or negative ones) are clamped.
    pub fn unlock(&mut self, amount: Energy, now: Timestamp, related_id: Option<String>) -> Energy {
        let honored = amount.quantize().max(Energy::ZERO).min(self.balances.locked);
        if honored < amount {
            tracing::debug!(user = %self.user, requested = %amount, %honored, "unlock clamped");
        }
        if honored.is_positive() {
            let description = match &related_id {
                Some(r) => format!("refund from {r}"),
                None => "refund".to_string(),
            };
            self.append(TxKind::Unlocked, honored, now, description, related_id);
        }
        honored
    }

    /// Consume up to `amount` of locked energy. Never fails; clamps like
    /// [`unlock`](Self::unlock).
    pub fn spend(&mut self, amount: Energy, now: Timestamp, related_id: Option<String>) -> Energy {
        let honored = amount.quantize().max(Energy::ZERO).min(self.balances.locked);
        if honored < amount {
            tracing::debug!(user = %self.user, requested = %amount, %honored, "spend clamped");
        }
        if honored.is_positive() {
            let description = match &related_id {
                Some(r) => format!("spent on {r}"),
                None => "spent".to_string(),
            };
            self.append(TxKind::Spent, honored, now, description, related_id);
        }
        honored
    }

    /// Weekly decay of unshielded available energy.
    ///
    /// A no-op within one decay period of the last application. Otherwise
    /// drops `floor((available - shield) * tier.decay_rate)` and re-anchors
    /// `last_decay_at` even when nothing was dropped.
    pub fn decay(&mut self, tiers: &TierTable, shield: &ShieldSchedule, now: Timestamp) -> DecayOutcome {
        if now.since(self.last_decay_at) < self.decay_period_secs {
            return DecayOutcome::TooSoon {
                next_due: self.last_decay_at.plus(self.decay_period_secs),
            };
        }
        let tier = self.fees.observe(tiers, now).current();
        let rate = tiers.decay_rate(tier);
        let shielded = shield.shield_floor(self.ssi_staked);
        let decayable = self.balances.available.saturating_sub(shielded);
        let dropped = decayable.scale(rate).floor().min(self.balances.available);
        self.last_decay_at = now;
        if dropped.is_positive() {
            let description = format!("weekly decay at {} ({} tier)", rate.normalize(), tier);
            self.append(TxKind::Expired, dropped, now, description, None);
        }
        tracing::debug!(user = %self.user, %dropped, %shielded, "decay applied");
        DecayOutcome::Applied {
            dropped,
            shielded,
            rate,
            tier,
        }
    }

    /// Record a trade: update the fee window, recompute the tier, then mint
    /// `fee * (1 + boost)` where the boost applies only if the new tier
    /// grants [`MintCapability::HoldingBoost`].
    pub fn record_trade(
        &mut self,
        volume: Decimal,
        fee_rate: Decimal,
        traded_at: Timestamp,
        config: &EconomyConfig,
        now: Timestamp,
    ) -> Result<TradeReceipt, LedgerError> {
        let event = FeeEvent::new(self.next_fee_event, traded_at, volume, fee_rate)
            .map_err(|_| LedgerError::InvalidAmount(volume.min(fee_rate)))?;
        let fee = event.fee;
        // the gated boost never exceeds the curve value, so this bounds the mint
        let ceiling = BoostCurve::apply(fee, config.boost.boost(self.soso_holding))
            .ok_or(LedgerError::InvalidAmount(fee))?;
        self.ensure_mint_room(ceiling)?;

        let related = format!("trade-{}", event.id);
        let fees_30d = self
            .fees
            .record(event, now)
            .map_err(|_| LedgerError::InvalidAmount(fee))?;
        self.next_fee_event += 1;
        let tier_change = self.fees.observe(&config.tiers, now);
        let boost = self.effective_boost(config, tier_change.current());
        let minted = self.mint(fee, boost, now, Some(related))?;
        Ok(TradeReceipt {
            fee,
            boost,
            minted,
            fees_30d,
            tier_change,
        })
    }

    /// Current tier, recomputed lazily from the rolling window. A drop
    /// caused by trades aging out is applied silently.
    pub fn refresh_tier(&mut self, tiers: &TierTable, now: Timestamp) -> TierChange {
        self.fees.observe(tiers, now)
    }

    pub fn view(&mut self, config: &EconomyConfig, now: Timestamp) -> BalanceView {
        let tier = self.refresh_tier(&config.tiers, now).current();
        let fees_30d = self.fees.cached_sum();
        BalanceView {
            user: self.user.clone(),
            available: self.balances.available,
            locked: self.balances.locked,
            spent: self.balances.spent,
            expired: self.balances.expired,
            tier,
            color: config.tiers.get(tier).color.clone(),
            fees_30d,
            progress: config.tiers.progress(fees_30d),
            shield_floor: config.shield.shield_floor(self.ssi_staked),
            boost: self.effective_boost(config, tier),
            last_decay_at: self.last_decay_at,
        }
    }

    /// Newest-first page of at most `limit` entries strictly older than
    /// `before` (or from the newest entry when `before` is `None`).
    pub fn history(&self, before: Option<TxId>, limit: usize) -> HistoryPage {
        let mut older = self
            .log
            .iter()
            .rev()
            .filter(|tx| before.map_or(true, |b| tx.id < b));
        let entries: Vec<Transaction> = older.by_ref().take(limit).cloned().collect();
        let next_cursor = match (entries.last(), older.next()) {
            (Some(last), Some(_)) => Some(last.id),
            _ => None,
        };
        HistoryPage { entries, next_cursor }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
