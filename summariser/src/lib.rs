use anyhow::{bail, Context};
use exec_harness_core::prelude::Contention;
use exec_harness_instruments::speedup;
use exec_harness_summary_model::{RunSummary, Strategy};

mod analyze;
mod decision;
pub mod filter;
pub mod model;
mod table;

pub use model::{
    ComparisonReport, Decision, InvariantViolation, StrategyReport, ViolationKind,
    WorkloadInterval, WorkloadProfile,
};
pub use table::{render_report, ComparisonRow};

/// Fraction a run may deviate from its timing law before a violation is reported.
pub const DEFAULT_TOLERANCE: f64 = 0.2;

/// Compare strategy runs over the same workload set.
///
/// The first complete sequential run is the baseline for speedups and for the duration of compute
/// workloads. Timing law violations are reported on the strategy they belong to and logged, they
/// never fail the comparison.
pub fn compare(runs: &[RunSummary], tolerance: f64) -> anyhow::Result<ComparisonReport> {
    if !tolerance.is_finite() || tolerance < 0.0 {
        bail!("Tolerance must be a non-negative number, got {tolerance}");
    }
    let Some(first) = runs.first() else {
        bail!("No runs to compare");
    };

    let fingerprint = first.fingerprint();
    if let Some(other) = runs.iter().find(|r| r.fingerprint() != fingerprint) {
        bail!(
            "Run {} ({}) executed a different workload set than run {} ({})",
            other.run_id,
            other.strategy,
            first.run_id,
            first.strategy
        );
    }

    let baseline = runs
        .iter()
        .find(|r| r.strategy == Strategy::Sequential && !r.is_partial());

    let mut report = ComparisonReport {
        fingerprint,
        workloads: first
            .workloads
            .iter()
            .map(|w| w.name().to_string())
            .collect(),
        profile: WorkloadProfile::of(&first.workloads),
        available_cores: first.available_cores,
        tolerance,
        baseline: baseline.map(|b| b.strategy),
        strategies: Vec::with_capacity(runs.len()),
        caveats: Vec::new(),
        decision: None,
    };

    if baseline.is_none() {
        report.add_caveat("No complete sequential run, speedups are not reported");
    }

    for run in runs {
        let strategy_report = strategy_report(run, baseline, tolerance)
            .with_context(|| format!("Failed to analyse run {}", run.run_id))?;
        for violation in &strategy_report.violations {
            log::warn!("{} broke its timing law: {violation}", run.strategy);
        }
        add_caveats(&mut report, run);
        report.strategies.push(strategy_report);
    }
    report.decision = decision::decide(&report);

    Ok(report)
}

fn strategy_report(
    run: &RunSummary,
    baseline: Option<&RunSummary>,
    tolerance: f64,
) -> anyhow::Result<StrategyReport> {
    for workload in &run.workloads {
        workload.validate()?;
    }

    let individual = analyze::individual_durations(run, baseline);
    let expected = if run.is_partial() {
        None
    } else {
        analyze::expected_elapsed(run, &individual)
    };
    let violations = analyze::check_laws(run, expected, tolerance);

    Ok(StrategyReport {
        strategy: run.strategy,
        run_id: run.run_id.clone(),
        status: run.status,
        wall_clock_elapsed: run.wall_clock_elapsed,
        expected_elapsed: expected.map(|(_, d)| d),
        startup_overhead: run.startup_overhead,
        per_workload: run
            .results
            .iter()
            .map(|r| WorkloadInterval {
                name: r.workload_name.clone(),
                start: r.start,
                end: r.end,
                executor: r.executor.to_string(),
            })
            .collect(),
        failures: run.failures.clone(),
        speedup_vs_baseline: baseline.and_then(|b| speedup(b, run)),
        violations,
    })
}

fn add_caveats(report: &mut ComparisonReport, run: &RunSummary) {
    if run.is_partial() {
        report.add_caveat(format!(
            "The {} run is partial, its timing laws were not checked",
            run.strategy
        ));
    }

    if let Some(overhead) = run.startup_overhead {
        if run.strategy.has_startup_overhead() {
            report.add_caveat(format!(
                "The {} wall clock includes up to {:.3}s of worker startup, which is left out of \
                 its timing law",
                run.strategy,
                overhead.as_secs_f64()
            ));
        }
    }

    if run.strategy == Strategy::Threaded
        && run.contention == Some(Contention::None)
        && run.workloads.iter().any(|w| w.is_compute())
    {
        report.add_caveat(
            "Threads computed without contention, so their elapsed time depends on the cores \
             available and is not checked",
        );
    }
}
