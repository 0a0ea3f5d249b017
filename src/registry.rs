// Copyright (c) 2026 Hypermesh Foundation. All rights reserved.
// Licensed under the Business Source License 1.1.
// See the LICENSE file in the repository root for full license text.

//! Concurrent map of per-user ledgers.
//!
//! The outer `RwLock` only guards membership; each ledger sits behind its
//! own `Mutex`, so operations on different users never contend and every
//! read-modify-write on one user is a single critical section. The map
//! lock is always released before a user lock is taken.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EconomyConfig;
use crate::conservation::{AuditError, ConservationMonitor};
use crate::ledger::{DecayOutcome, UserLedger};
use crate::types::{Energy, Timestamp, UserId};

type LedgerHandle = Arc<Mutex<UserLedger>>;

/// Totals from one [`LedgerRegistry::sweep_decay`] pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub users: usize,
    pub decayed: usize,
    pub dropped: Energy,
}

pub struct LedgerRegistry {
    config: Arc<EconomyConfig>,
    ledgers: RwLock<HashMap<UserId, LedgerHandle>>,
}

impl LedgerRegistry {
    pub fn new(config: Arc<EconomyConfig>) -> Self {
        Self {
            config,
            ledgers: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &EconomyConfig {
        &self.config
    }

    fn handle(&self, user: &UserId, now: Timestamp) -> LedgerHandle {
        if let Some(h) = self.ledgers.read().get(user) {
            return Arc::clone(h);
        }
        let mut map = self.ledgers.write();
        let h = map.entry(user.clone()).or_insert_with(|| {
            tracing::debug!(%user, "opening ledger");
            Arc::new(Mutex::new(UserLedger::new(user.clone(), &self.config.windows, now)))
        });
        Arc::clone(h)
    }

    /// Run `f` inside `user`'s critical section, creating the ledger on
    /// first touch. With lazy decay enabled, an overdue decay is applied
    /// before `f` sees the ledger.
    pub fn with_ledger<R>(
        &self,
        user: &UserId,
        now: Timestamp,
        f: impl FnOnce(&mut UserLedger, &EconomyConfig) -> R,
    ) -> R {
        let handle = self.handle(user, now);
        let mut ledger = handle.lock();
        if self.config.windows.lazy_decay {
            ledger.decay(&self.config.tiers, &self.config.shield, now);
        }
        f(&mut ledger, &self.config)
    }

    /// Read an existing ledger without creating or decaying it.
    pub fn peek<R>(&self, user: &UserId, f: impl FnOnce(&UserLedger) -> R) -> Option<R> {
        let handle = self.ledgers.read().get(user).map(Arc::clone)?;
        let ledger = handle.lock();
        Some(f(&ledger))
    }

    pub fn contains(&self, user: &UserId) -> bool {
        self.ledgers.read().contains_key(user)
    }

    pub fn len(&self) -> usize {
        self.ledgers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.read().is_empty()
    }

    pub fn users(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.ledgers.read().keys().cloned().collect();
        users.sort();
        users
    }

    fn handles(&self) -> Vec<LedgerHandle> {
        self.ledgers.read().values().map(Arc::clone).collect()
    }

    /// Apply decay to every ledger that is due. Each user is locked in turn,
    /// never more than one at a time.
    pub fn sweep_decay(&self, now: Timestamp) -> SweepReport {
        let mut report = SweepReport::default();
        for handle in self.handles() {
            let mut ledger = handle.lock();
            report.users += 1;
            if let DecayOutcome::Applied { dropped, .. } =
                ledger.decay(&self.config.tiers, &self.config.shield, now)
            {
                report.decayed += 1;
                report.dropped += dropped;
            }
        }
        tracing::info!(users = report.users, decayed = report.decayed, dropped = %report.dropped, "decay sweep");
        report
    }

    /// Audit every ledger through `monitor`, collecting failures.
    pub fn audit_all(&self, monitor: &mut ConservationMonitor) -> Vec<AuditError> {
        let mut failures = Vec::new();
        for handle in self.handles() {
            let ledger = handle.lock();
            if let Err(err) = monitor.check(&ledger) {
                failures.push(err);
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WEEK_SECS;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::thread;

    fn registry() -> LedgerRegistry {
        LedgerRegistry::new(Arc::new(EconomyConfig::default()))
    }

    #[test]
    fn creates_on_first_touch_only() {
        let reg = registry();
        let alice = UserId::from("alice");
        assert!(reg.peek(&alice, |l| l.available()).is_none());
        let avail = reg.with_ledger(&alice, Timestamp(0), |l, _| l.available());
        assert_eq!(avail, Energy::ZERO);
        assert!(reg.contains(&alice));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn lazy_decay_applies_on_access() {
        let reg = registry();
        let bob = UserId::from("bob");
        reg.with_ledger(&bob, Timestamp(0), |l, _| {
            l.mint(dec!(100), Decimal::ZERO, Timestamp(0), None).expect("test: mint")
        });
        let avail = reg.with_ledger(&bob, Timestamp(WEEK_SECS), |l, _| l.available());
        assert_eq!(avail, Energy::from_units(80));
    }

    #[test]
    fn sweep_decays_only_due_users() {
        let reg = registry();
        for (name, start) in [("a", 0u64), ("b", 3 * 86_400)] {
            let user = UserId::from(name);
            reg.with_ledger(&user, Timestamp(start), |l, _| {
                l.mint(dec!(50), Decimal::ZERO, Timestamp(start), None).expect("test: mint")
            });
        }
        let report = reg.sweep_decay(Timestamp(WEEK_SECS));
        assert_eq!(report.users, 2);
        assert_eq!(report.decayed, 1);
        assert_eq!(report.dropped, Energy::from_units(10));
    }

    #[test]
    fn concurrent_mints_are_not_lost() {
        let reg = Arc::new(registry());
        let user = UserId::from("shared");
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                let user = user.clone();
                thread::spawn(move || {
                    for _ in 0..50 {
                        reg.with_ledger(&user, Timestamp(1), |l, _| {
                            l.mint(Decimal::ONE, Decimal::ZERO, Timestamp(1), None).expect("test: mint")
                        });
                    }
                })
            })
            .collect();
        for w in workers {
            w.join().expect("test: join");
        }
        let avail = reg.peek(&user, |l| l.available()).expect("test: ledger");
        assert_eq!(avail, Energy::from_units(400));
        let mut monitor = ConservationMonitor::default();
        assert!(reg.audit_all(&mut monitor).is_empty());
    }
}
