// Poisson Traffic Generator - seedable trade and session arrivals
// Drives the economy with user activity drawn from a ChaCha8 stream

use rand::Rng;
use rand_chacha::ChaCha8Rng;

/// How a simulated user plays out a session after creating it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPlan {
    /// Pick a responder, send `rounds` messages, then rate.
    Complete { rounds: u32, score: u8 },
    /// Pick a responder and go quiet until the idle timeout fires.
    Abandon,
    /// Reject every candidate, then give up.
    Skip,
    Cancel,
}

/// Outcome weights for [`SessionPlan`]; the remainder completes.
#[derive(Debug, Clone, Copy)]
pub struct PlanWeights {
    pub abandon: f64,
    pub skip: f64,
    pub cancel: f64,
}

pub struct TrafficGenerator {
    rng: ChaCha8Rng,
    pub trade_count: u32,
    pub session_count: u32,
}

impl TrafficGenerator {
    pub fn new(rng: ChaCha8Rng) -> Self {
        Self {
            rng,
            trade_count: 0,
            session_count: 0,
        }
    }

    /// Poisson trade arrivals for one tick.
    /// Returns Vec of (user index, volume).
    pub fn trades(&mut self, lambda: f64, users: usize, volume: (f64, f64)) -> Vec<(usize, f64)> {
        if users == 0 || lambda <= 0.0 {
            return Vec::new();
        }
        let n = poisson_sample(&mut self.rng, lambda);
        let mut out = Vec::with_capacity(n as usize);
        for _ in 0..n {
            let user = self.rng.gen_range(0..users);
            out.push((user, log_uniform(&mut self.rng, volume.0, volume.1)));
            self.trade_count += 1;
        }
        out
    }

    /// Poisson session arrivals for one tick, as user indices.
    pub fn sessions(&mut self, lambda: f64, users: usize) -> Vec<usize> {
        if users == 0 || lambda <= 0.0 {
            return Vec::new();
        }
        let n = poisson_sample(&mut self.rng, lambda);
        self.session_count += n;
        (0..n).map(|_| self.rng.gen_range(0..users)).collect()
    }

    pub fn plan(&mut self, weights: PlanWeights, max_rounds: u32) -> SessionPlan {
        let r: f64 = self.rng.gen();
        if r < weights.abandon {
            SessionPlan::Abandon
        } else if r < weights.abandon + weights.skip {
            SessionPlan::Skip
        } else if r < weights.abandon + weights.skip + weights.cancel {
            SessionPlan::Cancel
        } else {
            SessionPlan::Complete {
                rounds: self.rng.gen_range(1..=max_rounds.max(1)),
                score: self.rng.gen_range(1..=5),
            }
        }
    }

    pub fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }
}

/// Volumes spread over orders of magnitude.
fn log_uniform(rng: &mut ChaCha8Rng, lo: f64, hi: f64) -> f64 {
    if hi <= lo || lo <= 0.0 {
        return lo.max(0.0);
    }
    rng.gen_range(lo.ln()..hi.ln()).exp().clamp(lo, hi)
}

/// Poisson sampling via Knuth algorithm.
/// For λ < 30, uses direct method. For larger λ, uses normal approximation.
fn poisson_sample(rng: &mut ChaCha8Rng, lambda: f64) -> u32 {
    if lambda < 30.0 {
        let l = (-lambda).exp();
        let mut k: u32 = 0;
        let mut p: f64 = 1.0;
        loop {
            k += 1;
            p *= rng.gen::<f64>();
            if p <= l {
                return k - 1;
            }
        }
    } else {
        let u1: f64 = rng.gen();
        let u2: f64 = rng.gen();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let result = lambda + lambda.sqrt() * z;
        result.round().max(0.0) as u32
    }
}
