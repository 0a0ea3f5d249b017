// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Conservation law for the energy ledger.
//!
//! ```text
//! minted == available + locked + spent + expired
//! live   == opening + replay(log)
//! ```
//!
//! Amounts are `Decimal`, so both checks are exact. [`ConservationMonitor`]
//! accumulates failed audits across users and trips a circuit breaker once
//! the violation count exceeds its threshold.

use serde::{Deserialize, Serialize};

use crate::ledger::{Balances, UserLedger};
use crate::types::{Energy, UserId};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AuditError {
    #[error("conservation broken for {user}: minted {minted}, accounted {accounted}")]
    Imbalance {
        user: UserId,
        minted: Energy,
        accounted: Energy,
    },

    #[error("negative balance for {user}: available {available}, locked {locked}")]
    NegativeBalance {
        user: UserId,
        available: Energy,
        locked: Energy,
    },

    #[error("replay of {user}'s log diverges from live balances")]
    ReplayMismatch {
        user: UserId,
        live: Balances,
        replayed: Balances,
    },

    #[error("circuit breaker tripped after {0} failed audits")]
    CircuitBreakerTripped(u32),
}

// ---------------------------------------------------------------------------
// Single-ledger audit
// ---------------------------------------------------------------------------

/// Check counters, sign and replay equivalence of one ledger.
pub fn audit(ledger: &UserLedger) -> Result<(), AuditError> {
    let b = ledger.balances();
    let user = ledger.user().clone();

    if b.available.is_negative() || b.locked.is_negative() {
        return Err(AuditError::NegativeBalance {
            user,
            available: b.available,
            locked: b.locked,
        });
    }

    let accounted = b.accounted();
    if accounted != b.minted {
        return Err(AuditError::Imbalance {
            user,
            minted: b.minted,
            accounted,
        });
    }

    let replayed = Balances::replay(ledger.opening(), ledger.log());
    if replayed != *b {
        return Err(AuditError::ReplayMismatch {
            user,
            live: *b,
            replayed,
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConservationMonitor {
    audits: u64,
    violations: u32,
    threshold: u32,
    tripped: bool,
}

impl Default for ConservationMonitor {
    fn default() -> Self {
        Self::new(0)
    }
}

impl ConservationMonitor {
    /// `threshold` failed audits are tolerated; the next one trips.
    pub fn new(threshold: u32) -> Self {
        Self {
            audits: 0,
            violations: 0,
            threshold,
            tripped: false,
        }
    }

    /// Audit a ledger and record the result. Once tripped, every call fails
    /// with `CircuitBreakerTripped` until [`reset`](Self::reset).
    pub fn check(&mut self, ledger: &UserLedger) -> Result<(), AuditError> {
        if self.tripped {
            return Err(AuditError::CircuitBreakerTripped(self.violations));
        }
        self.audits += 1;
        match audit(ledger) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.violations += 1;
                tracing::error!(error = %err, violations = self.violations, "conservation audit failed");
                if self.violations > self.threshold {
                    self.tripped = true;
                }
                Err(err)
            }
        }
    }

    pub fn is_tripped(&self) -> bool {
        self.tripped
    }

    pub fn violations(&self) -> u32 {
        self.violations
    }

    pub fn audits(&self) -> u64 {
        self.audits
    }

    /// Admin reset after investigation clears the breaker and counts.
    pub fn reset(&mut self) {
        self.tripped = false;
        self.violations = 0;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
