#![cfg(not(target_arch = "wasm32"))]

#[cfg(test)]
mod tests {
    use energy_engine::collaborators::StaticMatcher;
    use energy_engine::conservation::{audit, ConservationMonitor};
    use energy_engine::ledger::{Balances, DecayOutcome};
    use energy_engine::tier::MintCapability;
    use energy_engine::*;
    use proptest::prelude::*;
    use rust_decimal::{Decimal, RoundingStrategy};
    use std::sync::Arc;

    /// A decimal drawn as `mantissa * 10^-scale`, so inputs carry every
    /// scale the boundary has to absorb.
    fn scaled(max_units: i64) -> impl Strategy<Value = Decimal> {
        (0u32..=12).prop_flat_map(move |scale| {
            (0..max_units * 10i64.pow(scale)).prop_map(move |m| Decimal::new(m, scale))
        })
    }

    /// Boosts as `n / d`, most of which do not terminate in base ten.
    fn ratio_boost() -> impl Strategy<Value = Decimal> {
        (0i64..60, 1i64..97).prop_map(|(n, d)| Decimal::from(n) / Decimal::from(d))
    }

    fn truncated(d: Decimal) -> Decimal {
        d.round_dp_with_strategy(ENERGY_DP, RoundingStrategy::ToZero)
    }

    #[derive(Debug, Clone)]
    enum Op {
        Mint(Decimal, Decimal),
        Trade(Decimal, Decimal),
        Holdings(Decimal, Decimal),
        Lock(Decimal),
        Unlock(Decimal),
        Spend(Decimal),
        Decay,
        Advance(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            2 => (scaled(10_000), ratio_boost()).prop_map(|(f, b)| Op::Mint(f, b)),
            3 => (scaled(1_000_000), (1i64..30).prop_map(|n| Decimal::new(n, 4))).prop_map(|(v, r)| Op::Trade(v, r)),
            1 => (scaled(200_000), scaled(50_000)).prop_map(|(h, s)| Op::Holdings(h, s)),
            2 => scaled(2_000).prop_map(Op::Lock),
            1 => scaled(2_000).prop_map(Op::Unlock),
            1 => scaled(2_000).prop_map(Op::Spend),
            1 => Just(Op::Decay),
            2 => (0u64..(10 * DAY_SECS)).prop_map(Op::Advance),
        ]
    }

    /// Runs `op` and returns what the ledger should have minted for it,
    /// computed from the inputs alone.
    fn apply(ledger: &mut UserLedger, config: &EconomyConfig, now: &mut Timestamp, op: &Op) -> Decimal {
        match op {
            Op::Mint(fee, boost) => {
                let minted = ledger.mint(*fee, *boost, *now, None).expect("test: non-negative mint");
                let expected = truncated(*fee * (Decimal::ONE + *boost));
                assert_eq!(minted.0, expected);
                expected
            }
            Op::Trade(volume, rate) => {
                let (holding, _) = ledger.holdings();
                let receipt = ledger
                    .record_trade(*volume, *rate, *now, config, *now)
                    .expect("test: trade within bounds");
                let fee = truncated(*volume * *rate);
                assert_eq!(receipt.fee, fee);
                let tier = receipt.tier_change.current();
                let boost = if config.tiers.get(tier).allows_mint(MintCapability::HoldingBoost) {
                    config.boost.boost(holding)
                } else {
                    Decimal::ZERO
                };
                assert_eq!(receipt.boost, boost);
                truncated(fee * (Decimal::ONE + boost))
            }
            Op::Holdings(soso, ssi) => {
                ledger.set_holdings(*soso, *ssi);
                Decimal::ZERO
            }
            Op::Lock(n) => {
                let before = *ledger.balances();
                if ledger.lock(Energy(*n), *now, None).is_err() {
                    assert_eq!(*ledger.balances(), before, "rejected lock must not move energy");
                }
                Decimal::ZERO
            }
            Op::Unlock(n) => {
                ledger.unlock(Energy(*n), *now, None);
                Decimal::ZERO
            }
            Op::Spend(n) => {
                ledger.spend(Energy(*n), *now, None);
                Decimal::ZERO
            }
            Op::Decay => {
                ledger.decay(&config.tiers, &config.shield, *now);
                Decimal::ZERO
            }
            Op::Advance(secs) => {
                *now = now.plus(*secs);
                Decimal::ZERO
            }
        }
    }

    // -----------------------------------------------------------------------
    // Session escrow
    // -----------------------------------------------------------------------

    #[derive(Debug, Clone)]
    enum SessionOp {
        Create(Decimal, bool),
        Match(usize),
        Select(usize, bool),
        Skip(usize),
        Resubmit(usize),
        Message(usize),
        Extend(usize, Decimal),
        Finish(usize),
        Complete(usize, u8),
        Timeout(usize),
        Cancel(usize),
        Expire,
        Advance(u64),
        Trade(Decimal),
    }

    fn session_op() -> impl Strategy<Value = SessionOp> {
        prop_oneof![
            3 => (scaled(40), any::<bool>()).prop_map(|(c, d)| SessionOp::Create(c, d)),
            2 => any::<usize>().prop_map(SessionOp::Match),
            2 => (any::<usize>(), any::<bool>()).prop_map(|(i, r)| SessionOp::Select(i, r)),
            1 => any::<usize>().prop_map(SessionOp::Skip),
            1 => any::<usize>().prop_map(SessionOp::Resubmit),
            3 => any::<usize>().prop_map(SessionOp::Message),
            2 => (any::<usize>(), scaled(20)).prop_map(|(i, c)| SessionOp::Extend(i, c)),
            1 => any::<usize>().prop_map(SessionOp::Finish),
            1 => (any::<usize>(), 1u8..=5).prop_map(|(i, s)| SessionOp::Complete(i, s)),
            1 => any::<usize>().prop_map(SessionOp::Timeout),
            1 => any::<usize>().prop_map(SessionOp::Cancel),
            1 => Just(SessionOp::Expire),
            2 => (0u64..3_600).prop_map(SessionOp::Advance),
            1 => scaled(50_000).prop_map(SessionOp::Trade),
        ]
    }

    fn escrow_economy() -> (Economy, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Timestamp(1_700_000_000)));
        let economy = Economy::new(EconomyConfig::default(), clock.clone())
            .expect("test: default config")
            .with_matcher(Arc::new(StaticMatcher {
                answers: vec![
                    ResponderAnswer::new("r1", "up"),
                    ResponderAnswer::new("r2", "down"),
                ],
            }));
        (economy, clock)
    }

    fn pick(ids: &[SessionId], i: usize) -> Option<SessionId> {
        (!ids.is_empty()).then(|| ids[i % ids.len()])
    }

    /// Drives one operation; rejected transitions are part of the search.
    fn drive(economy: &Economy, clock: &ManualClock, user: &UserId, ids: &mut Vec<SessionId>, op: &SessionOp) {
        match op {
            SessionOp::Create(cost, direct) => {
                let mut req = SessionRequest::new(user.clone(), "where next?", Energy(*cost));
                if *direct {
                    req = req.with_responder("r1");
                }
                if let Ok(id) = economy.create_session(req) {
                    ids.push(id);
                }
            }
            SessionOp::Match(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.match_responders(id);
                }
            }
            SessionOp::Select(i, second) => {
                if let Some(id) = pick(ids, *i) {
                    let r = ResponderId::from(if *second { "r2" } else { "r1" });
                    let _ = economy.select_responder(id, &r);
                }
            }
            SessionOp::Skip(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.skip(id);
                }
            }
            SessionOp::Resubmit(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.resubmit(id);
                }
            }
            SessionOp::Message(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.advance_round(id, "and then?");
                }
            }
            SessionOp::Extend(i, cost) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.extend_rounds(id, Energy(*cost));
                }
            }
            SessionOp::Finish(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.end_chat(id);
                }
            }
            SessionOp::Complete(i, score) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.complete_and_rate(id, *score, None);
                }
            }
            SessionOp::Timeout(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.timeout(id);
                }
            }
            SessionOp::Cancel(i) => {
                if let Some(id) = pick(ids, *i) {
                    let _ = economy.cancel(id);
                }
            }
            SessionOp::Expire => {
                economy.expire_overdue();
            }
            SessionOp::Advance(secs) => {
                clock.advance(*secs);
            }
            SessionOp::Trade(volume) => {
                let _ = economy.record_trade(user, *volume, Decimal::new(7, 4), None);
            }
        }
    }

    fn open_escrow(economy: &Economy, user: &UserId) -> Energy {
        economy
            .sessions_for(user)
            .iter()
            .filter(|s| !s.phase.is_terminal())
            .fold(Energy::ZERO, |acc, s| acc + s.locked_energy)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(128))]

        #[test]
        fn energy_is_conserved(ops in prop::collection::vec(op(), 1..60)) {
            let config = EconomyConfig::default();
            let mut now = Timestamp(1_700_000_000);
            let mut ledger = UserLedger::new(UserId::from("prop"), &config.windows, now);
            let mut expected_minted = Decimal::ZERO;
            let mut expired = Energy::ZERO;

            for op in &ops {
                expected_minted += apply(&mut ledger, &config, &mut now, op);
                let b = *ledger.balances();
                prop_assert!(!b.available.is_negative());
                prop_assert!(!b.locked.is_negative());
                prop_assert_eq!(b.minted.0, expected_minted);
                prop_assert_eq!(b.accounted().0, expected_minted);
                prop_assert!(b.available.0.scale() <= ENERGY_DP);
                prop_assert!(b.expired >= expired, "expired went backwards");
                expired = b.expired;
            }
            prop_assert!(audit(&ledger).is_ok(), "audit failed: {:?}", audit(&ledger));
        }

        #[test]
        fn log_replays_to_live_balances(ops in prop::collection::vec(op(), 1..60)) {
            let config = EconomyConfig::default();
            let mut now = Timestamp(1_700_000_000);
            let mut ledger = UserLedger::new(UserId::from("prop"), &config.windows, now);
            for op in &ops {
                apply(&mut ledger, &config, &mut now, op);
            }
            let replayed = Balances::replay(ledger.opening(), ledger.log());
            prop_assert_eq!(replayed, *ledger.balances());
            for tx in ledger.log() {
                prop_assert!(tx.amount.is_positive());
            }
        }

        #[test]
        fn decay_applies_once_per_period(
            minted in scaled(100_000),
            locked in scaled(100_000),
            first in WEEK_SECS..(3 * WEEK_SECS),
            retry in 0u64..WEEK_SECS,
        ) {
            let config = EconomyConfig::default();
            let start = Timestamp(1_700_000_000);
            let mut ledger = UserLedger::new(UserId::from("prop"), &config.windows, start);
            ledger.mint(minted, Decimal::ZERO, start, None).expect("test: mint");
            let _ = ledger.lock(Energy(locked), start, None);
            let locked_before = ledger.locked();

            let due = start.plus(first);
            let outcome = ledger.decay(&config.tiers, &config.shield, due);
            prop_assert!(
                matches!(outcome, DecayOutcome::Applied { .. }),
                "a full period has elapsed"
            );
            prop_assert_eq!(ledger.locked(), locked_before, "locked energy never decays");

            let after_first = *ledger.balances();
            let again = ledger.decay(&config.tiers, &config.shield, due.plus(retry));
            prop_assert!(
                matches!(again, DecayOutcome::TooSoon { .. }),
                "a second decay inside the period is a no-op"
            );
            prop_assert_eq!(*ledger.balances(), after_first);
        }

        #[test]
        fn open_escrow_matches_locked(
            fee in scaled(200).prop_map(|d| d + Decimal::ONE),
            ops in prop::collection::vec(session_op(), 1..80),
        ) {
            let (economy, clock) = escrow_economy();
            let user = UserId::from("prop");
            economy.record_trade(&user, fee, Decimal::ONE, None).expect("test: funding trade");
            let mut monitor = ConservationMonitor::new(1);
            let mut ids = Vec::new();

            for op in &ops {
                drive(&economy, &clock, &user, &mut ids, op);
                prop_assert_eq!(open_escrow(&economy, &user), economy.balance(&user).locked, "after {:?}", op);
            }
            prop_assert!(economy.audit_all(&mut monitor).is_empty());
        }
    }
}
