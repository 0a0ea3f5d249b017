// Monte Carlo Infrastructure - N runs per scenario with statistical aggregation
// Each scenario runs N times with seeds base..base+N, computing mean ± 95% CI

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;
use std::time::Instant;

use energy_engine::adapter::{from_energy, to_decimal, to_energy};
use energy_engine::collaborators::StaticMatcher;
use energy_engine::conservation::ConservationMonitor;
use energy_engine::*;

use crate::report::*;
use crate::scenarios::Scenario;
use crate::traffic::{SessionPlan, TrafficGenerator};

const START: Timestamp = Timestamp(1_700_000_000);
const TICK_SECS: u64 = 3_600;

fn matcher() -> StaticMatcher {
    StaticMatcher {
        answers: vec![
            ResponderAnswer::new("analyst-1", "Funding is flipping negative."),
            ResponderAnswer::new("analyst-2", "Watch the weekly close."),
            ResponderAnswer::new("analyst-3", "Open interest looks crowded."),
        ],
    }
}

/// Count a session call; anything but a clean result is a bookkeeping bug.
fn track<T>(result: Result<T, SessionError>, counts: &mut SessionCounts) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(SessionError::InsufficientEnergy { .. }) => None,
        Err(err) => {
            tracing::warn!(error = %err, "unexpected session error");
            counts.invalid_transitions += 1;
            None
        }
    }
}

/// Play one session to the end of its plan.
fn drive_session(
    economy: &Economy,
    traffic: &mut TrafficGenerator,
    scenario: &Scenario,
    id: SessionId,
    counts: &mut SessionCounts,
) {
    let plan = traffic.plan(scenario.plan, economy.config().sessions.default_max_rounds + 5);
    if track(economy.match_responders(id), counts).is_none() {
        return;
    }
    let pick = ResponderId::from("analyst-2");
    match plan {
        SessionPlan::Skip => {
            track(economy.skip(id), counts);
            counts.skipped += 1;
            track(economy.cancel(id), counts);
        }
        SessionPlan::Cancel => {
            track(economy.cancel(id), counts);
        }
        SessionPlan::Abandon => {
            track(economy.select_responder(id, &pick), counts);
        }
        SessionPlan::Complete { rounds, score } => {
            track(economy.select_responder(id, &pick), counts);
            let mut exhausted = false;
            for i in 0..rounds {
                if exhausted {
                    if !traffic.chance(scenario.extend_prob) {
                        break;
                    }
                    let cost = to_energy(scenario.session_cost / 2.0);
                    match economy.extend_rounds(id, cost) {
                        Ok(_) => counts.extended += 1,
                        Err(SessionError::InsufficientEnergy { .. }) => break,
                        Err(err) => {
                            tracing::warn!(session = %id, error = %err, "extension failed");
                            counts.invalid_transitions += 1;
                            break;
                        }
                    }
                }
                let message = format!("follow-up {i}");
                match track(economy.advance_round(id, &message), counts) {
                    Some(Some(receipt)) => exhausted = receipt.exhausted,
                    _ => break,
                }
            }
            track(economy.complete_and_rate(id, score, None), counts);
        }
    }
}

/// Run a single scenario iteration with a specific seed.
pub fn run_single(scenario: &Scenario, seed: u64) -> Result<SimResult, ConfigError> {
    let start = Instant::now();
    let clock = Arc::new(ManualClock::new(START));
    let sink = Arc::new(BufferedSink::new());
    let economy = Economy::new(EconomyConfig::default(), clock.clone())?
        .with_sink(sink.clone())
        .with_matcher(Arc::new(matcher()));

    let users: Vec<UserId> = (0..scenario.users)
        .map(|i| UserId::from(format!("{}-{i:03}", scenario.name.to_lowercase())))
        .collect();
    for user in &users {
        economy.set_holdings(user, to_decimal(scenario.soso_holding), to_decimal(scenario.ssi_staked));
        for _ in 0..scenario.vouchers_per_user {
            economy.grant_voucher(user);
        }
    }

    let mut traffic = TrafficGenerator::new(ChaCha8Rng::seed_from_u64(seed));
    let mut monitor = ConservationMonitor::new(0);
    let mut counts = SessionCounts::default();
    let mut trades_refused = 0u32;
    let mut audit_failures = 0usize;
    let fee_rate = to_decimal(scenario.fee_rate);

    for tick in 0..scenario.ticks {
        let trading = scenario.trading_stops_at.map_or(true, |stop| tick < stop);
        if trading {
            for (u, volume) in traffic.trades(scenario.trade_lambda, users.len(), scenario.volume) {
                // a tripped breaker freezes minting until an operator resets it
                if monitor.is_tripped() {
                    trades_refused += 1;
                    continue;
                }
                if let Err(err) = economy.record_trade(&users[u], to_decimal(volume), fee_rate, None) {
                    tracing::warn!(user = %users[u], error = %err, "trade rejected");
                    trades_refused += 1;
                }
            }
        }

        for u in traffic.sessions(scenario.session_lambda, users.len()) {
            let user = &users[u];
            let mut req = SessionRequest::new(user.clone(), "Where is BTC heading this week?", to_energy(scenario.session_cost));
            let voucher = economy.vouchers_available(user) > 0;
            if voucher {
                req = req.with_voucher();
            }
            match economy.create_session(req) {
                Ok(id) => {
                    counts.created += 1;
                    if voucher {
                        counts.voucher_paid += 1;
                    }
                    drive_session(&economy, &mut traffic, scenario, id, &mut counts);
                }
                Err(err) if err.is_insufficient_energy() => counts.rejected += 1,
                Err(err) => {
                    tracing::warn!(%user, error = %err, "session rejected");
                    counts.rejected += 1;
                }
            }
        }

        clock.advance(TICK_SECS);
        economy.expire_overdue();
        if tick % 24 == 23 {
            economy.sweep_decay();
            audit_failures += economy.audit_all(&mut monitor).len();
        }
    }
    audit_failures += economy.audit_all(&mut monitor).len();

    // ─── Collect ────────────────────────────────────────────────────────

    let mut result = SimResult {
        scenario: scenario.label.to_string(),
        name: scenario.name.to_string(),
        seed,
        pass: false,
        users: users.len(),
        ticks: scenario.ticks,
        trades: traffic.trade_count,
        trades_refused,
        minted: 0.0,
        spent: 0.0,
        expired: 0.0,
        locked_at_end: 0.0,
        available_at_end: 0.0,
        conservation_error: 0.0,
        normalized_conservation_error: 0.0,
        audit_failures,
        breaker_tripped: monitor.is_tripped(),
        level_ups: 0,
        refunds: 0,
        rounds_exhausted: 0,
        tier_breakdown: [0; 4],
        sessions: counts,
        elapsed_ms: 0,
    };

    for user in &users {
        if let Some(b) = economy.ledgers().peek(user, |l| *l.balances()) {
            result.minted += from_energy(b.minted);
            result.spent += from_energy(b.spent);
            result.expired += from_energy(b.expired);
            result.locked_at_end += from_energy(b.locked);
            result.available_at_end += from_energy(b.available);
            result.conservation_error += from_energy(b.minted - b.accounted()).abs();
        }
        result.tier_breakdown[economy.balance(user).tier.index()] += 1;
        for s in economy.sessions_for(user) {
            match s.phase {
                Phase::Completed => result.sessions.completed += 1,
                Phase::TimedOut => result.sessions.timed_out += 1,
                Phase::Cancelled => result.sessions.cancelled += 1,
                _ => {}
            }
        }
    }
    result.normalized_conservation_error = if result.minted > 0.0 {
        result.conservation_error / result.minted
    } else {
        0.0
    };
    for n in sink.drain() {
        match n {
            Notification::LevelUp { .. } => result.level_ups += 1,
            Notification::Refund { .. } => result.refunds += 1,
            Notification::RoundsExhausted { .. } => result.rounds_exhausted += 1,
        }
    }

    // ─── Evaluate ───────────────────────────────────────────────────────

    let c = &scenario.criteria;
    let mut pass = result.conservation_error <= c.max_conservation_error
        && result.audit_failures == 0
        && result.sessions.invalid_transitions == 0;
    if let Some(tier) = c.require_tier {
        if result.tier_breakdown[tier.index()..].iter().sum::<u32>() == 0 {
            pass = false;
        }
    }
    if c.require_decay && result.expired <= 0.0 {
        pass = false;
    }
    if let Some(min) = c.min_completed {
        if result.sessions.completed < min {
            pass = false;
        }
    }
    if let Some(min) = c.min_timed_out {
        if result.sessions.timed_out < min {
            pass = false;
        }
    }
    if let Some(min) = c.min_voucher_paid {
        if result.sessions.voucher_paid < min {
            pass = false;
        }
    }
    result.pass = pass;
    result.elapsed_ms = start.elapsed().as_millis();
    Ok(result)
}

/// Run Monte Carlo: N runs of a scenario, aggregate stats.
pub fn run_monte_carlo(scenario: &Scenario, n_runs: usize, base_seed: u64) -> Result<MonteCarloReport, ConfigError> {
    let mut results = Vec::with_capacity(n_runs);
    for i in 0..n_runs {
        results.push(run_single(scenario, base_seed + i as u64)?);
    }
    Ok(aggregate(scenario, results))
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn stats_of(results: &[SimResult], metric: impl Fn(&SimResult) -> f64) -> Stats {
    Stats::from_samples(&results.iter().map(metric).collect::<Vec<_>>())
}

/// Aggregate individual runs into a MonteCarloReport.
fn aggregate(scenario: &Scenario, results: Vec<SimResult>) -> MonteCarloReport {
    let n = results.len();
    let passed = results.iter().filter(|r| r.pass).count();

    MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        n_runs: n,
        pass_rate: ratio(passed as f64, n as f64),
        conservation_error: stats_of(&results, |r| r.conservation_error),
        normalized_conservation_error: stats_of(&results, |r| r.normalized_conservation_error),
        minted: stats_of(&results, |r| r.minted),
        expired_share: stats_of(&results, |r| ratio(r.expired, r.minted)),
        completion_rate: stats_of(&results, |r| ratio(r.sessions.completed as f64, r.sessions.created as f64)),
        timeout_rate: stats_of(&results, |r| ratio(r.sessions.timed_out as f64, r.sessions.created as f64)),
        diamond_users: stats_of(&results, |r| r.tier_breakdown[Tier::Diamond.index()] as f64),
        elapsed_ms: stats_of(&results, |r| r.elapsed_ms as f64),
        individual_runs: results,
    }
}
