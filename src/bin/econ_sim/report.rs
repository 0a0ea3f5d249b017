// Simulation Report Types
// Structured JSON output for offline analysis of ledger and session behaviour

use serde::Serialize;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub mean: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub min: f64,
    pub max: f64,
    pub n: usize,
}

impl Stats {
    pub fn from_samples(samples: &[f64]) -> Self {
        let n = samples.len();
        if n == 0 {
            return Self { mean: 0.0, std_dev: 0.0, ci_lower: 0.0, ci_upper: 0.0, min: 0.0, max: 0.0, n: 0 };
        }
        let mean = samples.iter().sum::<f64>() / n as f64;
        let variance = if n > 1 {
            samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64
        } else {
            0.0
        };
        let std_dev = variance.sqrt();
        let stderr = std_dev / (n as f64).sqrt();
        let z = 1.96; // 95% CI
        Self {
            mean,
            std_dev,
            ci_lower: mean - z * stderr,
            ci_upper: mean + z * stderr,
            min: samples.iter().cloned().fold(f64::INFINITY, f64::min),
            max: samples.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            n,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionCounts {
    pub created: u32,
    pub rejected: u32,
    pub completed: u32,
    pub timed_out: u32,
    pub cancelled: u32,
    pub skipped: u32,
    pub extended: u32,
    pub voucher_paid: u32,
    pub invalid_transitions: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimResult {
    pub scenario: String,
    pub name: String,
    pub seed: u64,
    pub pass: bool,
    pub users: usize,
    pub ticks: u64,
    pub trades: u32,
    pub trades_refused: u32,
    pub minted: f64,
    pub spent: f64,
    pub expired: f64,
    pub locked_at_end: f64,
    pub available_at_end: f64,
    pub conservation_error: f64,
    pub normalized_conservation_error: f64,
    pub audit_failures: usize,
    pub breaker_tripped: bool,
    pub level_ups: u32,
    pub refunds: u32,
    pub rounds_exhausted: u32,
    /// Bronze, Silver, Gold, Diamond.
    pub tier_breakdown: [u32; 4],
    pub sessions: SessionCounts,
    pub elapsed_ms: u128,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub n_runs: usize,
    pub pass_rate: f64,
    pub conservation_error: Stats,
    pub normalized_conservation_error: Stats,
    pub minted: Stats,
    pub expired_share: Stats,
    pub completion_rate: Stats,
    pub timeout_rate: Stats,
    pub diamond_users: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<SimResult>,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SimReport {
    pub timestamp: String,
    pub version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub summary: Summary,
    pub max_conservation_error: f64,
    pub scenarios: Vec<MonteCarloReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_of_constant_samples() {
        let s = Stats::from_samples(&[2.0, 2.0, 2.0]);
        assert_eq!(s.mean, 2.0);
        assert_eq!(s.std_dev, 0.0);
        assert_eq!(s.half_width(), 0.0);
        assert_eq!(s.n, 3);
    }

    #[test]
    fn stats_of_nothing_is_zero() {
        let s = Stats::from_samples(&[]);
        assert_eq!(s.n, 0);
        assert_eq!(s.max, 0.0);
    }
}
