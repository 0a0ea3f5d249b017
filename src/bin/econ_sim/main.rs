// Energy Economy Simulator - Monte Carlo validation of ledger and sessions
// Seedable ChaCha8 traffic, N runs per scenario, JSON report
//
// Usage:
//   cargo run --release --bin econ-sim                       # All scenarios (20 runs each)
//   cargo run --release --bin econ-sim -- --runs 5           # Quick mode
//   cargo run --release --bin econ-sim -- WHALE              # Filter by name
//   cargo run --release --bin econ-sim -- --seed 42          # Custom base seed
//   RUST_LOG=energy_engine=debug cargo run --bin econ-sim    # Engine tracing

mod monte_carlo;
mod report;
mod scenarios;
mod traffic;

use report::*;
use scenarios::*;
use std::error::Error;
use std::time::{Instant, SystemTime, UNIX_EPOCH};
use tracing_subscriber::EnvFilter;

// ─── CLI Parsing ────────────────────────────────────────────────────────────

struct CliArgs {
    runs: usize,
    seed: u64,
    filter: Option<String>,
}

fn parse_args() -> CliArgs {
    let mut cli = CliArgs {
        runs: 20,
        seed: 0,
        filter: None,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--runs" => cli.runs = args.next().and_then(|v| v.parse().ok()).unwrap_or(cli.runs),
            "--seed" => cli.seed = args.next().and_then(|v| v.parse().ok()).unwrap_or(cli.seed),
            flag if flag.starts_with('-') => eprintln!("Unknown argument: {flag}"),
            _ => cli.filter = Some(arg),
        }
    }
    cli
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = parse_args();
    let all_scenarios = scenarios();

    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios
                .iter()
                .filter(|s| s.name.to_lowercase().contains(&f_lower) || s.label.to_lowercase().contains(&f_lower))
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };

    if to_run.is_empty() {
        eprintln!("No scenarios match filter: {:?}", cli.filter);
        std::process::exit(1);
    }

    println!("\n  Energy Economy Simulator v0.3.0");
    println!("  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {}", cli.runs, cli.seed);
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!(
        "  {:<36} {:>5} {:>12} {:>10} {:>9} {:>9} {:>7}",
        "Scenario", "Pass%", "Conserv", "Minted", "Done%", "Timeout%", "Time"
    );
    println!("  {}", "-".repeat(96));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        let report = monte_carlo::run_monte_carlo(scenario, cli.runs, cli.seed)?;
        let pass_pct = report.pass_rate * 100.0;
        let status = if report.pass_rate >= 1.0 { "PASS" } else { "FAIL" };

        println!(
            "  {:<36} {:>4}% {:>12.2e} {:>10.0} {:>8.1}% {:>8.1}% {:>5.0}ms  {}",
            report.label,
            pass_pct as u32,
            report.conservation_error.max,
            report.minted.mean,
            report.completion_rate.mean * 100.0,
            report.timeout_rate.mean * 100.0,
            report.elapsed_ms.mean,
            status,
        );

        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= 1.0).count();
    let failed = total - passed;
    let max_conservation_error = mc_reports
        .iter()
        .map(|r| r.conservation_error.max)
        .fold(0.0_f64, f64::max);

    println!("  {}", "-".repeat(96));
    println!(
        "  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s",
        total,
        passed,
        failed,
        suite_elapsed.as_secs_f64()
    );
    println!("  Max conservation error: {:.2e}\n", max_conservation_error);

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let timestamp = format!("{}", ts);

    let report = SimReport {
        timestamp: timestamp.clone(),
        version: "0.3.0",
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        max_conservation_error,
        scenarios: mc_reports,
    };

    let dir = std::path::Path::new("sim-results");
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("sim-{}.json", timestamp));
    std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
