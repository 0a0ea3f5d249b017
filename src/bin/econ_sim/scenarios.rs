// Scenario Definitions - trader populations, holdings and session habits
// Every scenario runs against the default economy config

use energy_engine::Tier;

use crate::traffic::PlanWeights;

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub users: usize,
    /// One tick is one hour of simulated time.
    pub ticks: u64,
    /// Expected trades per tick across the whole population.
    pub trade_lambda: f64,
    /// Trades stop after this tick (None = never).
    pub trading_stops_at: Option<u64>,
    pub volume: (f64, f64),
    pub fee_rate: f64,
    pub soso_holding: f64,
    pub ssi_staked: f64,
    /// Expected new sessions per tick across the whole population.
    pub session_lambda: f64,
    pub session_cost: f64,
    pub plan: PlanWeights,
    /// Probability an exhausted session pays for more rounds.
    pub extend_prob: f64,
    pub vouchers_per_user: u32,
    pub criteria: PassCriteria,
}

pub struct PassCriteria {
    pub max_conservation_error: f64,
    pub require_tier: Option<Tier>,
    pub require_decay: bool,
    pub min_completed: Option<u32>,
    pub min_timed_out: Option<u32>,
    pub min_voucher_paid: Option<u32>,
}

impl Default for PassCriteria {
    fn default() -> Self {
        Self {
            max_conservation_error: 0.0,
            require_tier: None,
            require_decay: false,
            min_completed: None,
            min_timed_out: None,
            min_voucher_paid: None,
        }
    }
}

const DAY: u64 = 24;

const MOSTLY_COMPLETE: PlanWeights = PlanWeights {
    abandon: 0.05,
    skip: 0.05,
    cancel: 0.05,
};

const CHURN: PlanWeights = PlanWeights {
    abandon: 0.35,
    skip: 0.15,
    cancel: 0.10,
};

// ─── Scenarios ──────────────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "STEADY_TRADERS",
            label: "Steady retail traders",
            users: 50,
            ticks: 30 * DAY,
            trade_lambda: 4.0,
            trading_stops_at: None,
            volume: (100.0, 5_000.0),
            fee_rate: 0.001,
            soso_holding: 0.0,
            ssi_staked: 0.0,
            session_lambda: 0.2,
            session_cost: 2.0,
            plan: MOSTLY_COMPLETE,
            extend_prob: 0.2,
            vouchers_per_user: 0,
            criteria: PassCriteria {
                require_decay: true,
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "WHALE_BOOST",
            label: "Whales with full SoSo boost",
            users: 5,
            ticks: 14 * DAY,
            trade_lambda: 1.0,
            trading_stops_at: None,
            volume: (100_000.0, 1_000_000.0),
            fee_rate: 0.001,
            soso_holding: 100_000.0,
            ssi_staked: 0.0,
            session_lambda: 0.1,
            session_cost: 50.0,
            plan: MOSTLY_COMPLETE,
            extend_prob: 0.8,
            vouchers_per_user: 0,
            criteria: PassCriteria {
                require_tier: Some(Tier::Diamond),
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "STAKER_DECAY",
            label: "VIP stakers after trading stops",
            users: 20,
            ticks: 60 * DAY,
            trade_lambda: 2.0,
            trading_stops_at: Some(7 * DAY),
            volume: (10_000.0, 500_000.0),
            fee_rate: 0.001,
            soso_holding: 0.0,
            ssi_staked: 10_000.0,
            session_lambda: 0.0,
            session_cost: 0.0,
            plan: MOSTLY_COMPLETE,
            extend_prob: 0.0,
            vouchers_per_user: 0,
            criteria: PassCriteria {
                require_decay: true,
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "SESSION_CHURN",
            label: "Heavy session churn with timeouts",
            users: 30,
            ticks: 10 * DAY,
            trade_lambda: 3.0,
            trading_stops_at: None,
            volume: (500.0, 20_000.0),
            fee_rate: 0.001,
            soso_holding: 5_000.0,
            ssi_staked: 100.0,
            session_lambda: 2.0,
            session_cost: 3.0,
            plan: CHURN,
            extend_prob: 0.5,
            vouchers_per_user: 0,
            criteria: PassCriteria {
                min_completed: Some(1),
                min_timed_out: Some(1),
                ..PassCriteria::default()
            },
        },
        Scenario {
            name: "VOUCHER_TRIAL",
            label: "New users on trial vouchers",
            users: 20,
            ticks: 3 * DAY,
            trade_lambda: 0.0,
            trading_stops_at: None,
            volume: (0.0, 0.0),
            fee_rate: 0.0,
            soso_holding: 0.0,
            ssi_staked: 0.0,
            session_lambda: 1.0,
            session_cost: 5.0,
            plan: MOSTLY_COMPLETE,
            extend_prob: 0.0,
            vouchers_per_user: 1,
            criteria: PassCriteria {
                min_voucher_paid: Some(1),
                ..PassCriteria::default()
            },
        },
    ]
}
