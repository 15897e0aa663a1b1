use std::time::Duration;

use anyhow::Context;
use exec_harness_core::prelude::{Contention, ExecutionError, ShutdownHandle};
use exec_harness_instruments::{ReportConfig, Reporter};
use exec_harness_summariser::{compare, render_report, ComparisonReport};
use exec_harness_summary_model::{run_summary_path, RunSummary, Strategy};

use crate::cli::ExecHarnessCli;
use crate::context::RunConfig;
use crate::definition::WorkloadSet;
use crate::monitor::start_monitor;
use crate::progress::StrategyProgress;
use crate::shutdown::start_shutdown_listener;
use crate::strategy::runner_for;
use crate::types::HarnessResult;

/// The runs of one comparison, and the strategies that could not run the set at all.
#[derive(Debug)]
pub struct ComparisonRuns {
    pub runs: Vec<RunSummary>,
    pub skipped: Vec<(Strategy, ExecutionError)>,
}

impl ComparisonRuns {
    /// Compare the runs and explain any skipped strategy in the report.
    pub fn compare(&self, tolerance: f64) -> HarnessResult<ComparisonReport> {
        let mut report = compare(&self.runs, tolerance).context("Failed to compare runs")?;
        for (strategy, e) in &self.skipped {
            report.add_caveat(format!("The {strategy} strategy was skipped: {e}"));
        }
        Ok(report)
    }
}

/// Run `strategies` over the same workload set, one after another, and hand each summary to
/// `reporter`.
///
/// A strategy that rejects the set is skipped and the comparison carries on. Once the session
/// stop signal fires, for example on Ctrl-C, no further strategy is started.
pub fn run_comparison(
    set: &WorkloadSet,
    strategies: &[Strategy],
    config: &RunConfig,
    reporter: &Reporter,
) -> HarnessResult<ComparisonRuns> {
    let progress = StrategyProgress::new(strategies.len(), false)?;
    Ok(run_strategies(set, strategies, config, reporter, &progress))
}

fn run_strategies(
    set: &WorkloadSet,
    strategies: &[Strategy],
    config: &RunConfig,
    reporter: &Reporter,
    progress: &StrategyProgress,
) -> ComparisonRuns {
    let mut comparison = ComparisonRuns {
        runs: Vec::with_capacity(strategies.len()),
        skipped: Vec::new(),
    };

    for strategy in strategies {
        if config.shutdown_handle().is_shutdown() {
            log::warn!("Shutdown requested, not starting the {strategy} strategy");
            break;
        }

        progress.start(*strategy);
        match runner_for(*strategy).execute(set.workloads(), config) {
            Ok(run) => {
                progress.finish_run(&run);
                reporter.add_run(&run);
                comparison.runs.push(run);
            }
            Err(e) => {
                log::error!("The {strategy} strategy cannot run '{}': {e}", set.name());
                progress.skip(*strategy);
                comparison.skipped.push((*strategy, e));
            }
        }
    }
    progress.finish();

    comparison
}

/// Drive a whole comparison from the command line: load the workload set, run every selected
/// strategy, print the comparison and optionally write it as JSON.
pub fn run(cli: ExecHarnessCli) -> HarnessResult<ComparisonReport> {
    let set = match &cli.workloads_file {
        Some(path) => WorkloadSet::load(path)?,
        None => WorkloadSet::preset(&cli.workloads)?,
    };
    let strategies = cli.strategies();

    log::info!(
        "Comparing {} strategies over workload set '{}' ({})",
        strategies.len(),
        set.name(),
        set.fingerprint()
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to create Tokio runtime")?;
    let shutdown_handle = ShutdownHandle::new();
    start_shutdown_listener(&runtime, &shutdown_handle);

    let config = RunConfig::new()
        .with_deadline(cli.deadline.map(secs).transpose().context("Invalid --deadline")?)
        .with_process_timeout(secs(cli.process_timeout).context("Invalid --process-timeout")?)
        .with_contention(if cli.no_contention {
            Contention::None
        } else {
            Contention::Global
        })
        .with_tolerance(cli.tolerance)
        .with_shutdown_handle(shutdown_handle.clone());

    let mut report_config = ReportConfig::default().enable_in_memory().enable_summary();
    if cli.persist {
        let path = run_summary_path();
        log::info!("Appending run summaries to {}", path.display());
        report_config = report_config.enable_jsonl(path);
    }
    let reporter = report_config.init();

    // Started once the set is known to be valid, so it only watches the runs themselves.
    let monitor = match start_monitor(shutdown_handle.new_listener()) {
        Ok(monitor) => Some(monitor),
        Err(e) => {
            log::warn!("Running without the host monitor: {e:?}");
            None
        }
    };

    let progress = StrategyProgress::new(strategies.len(), !cli.no_progress)?;
    let comparison = run_strategies(&set, &strategies, &config, &reporter, &progress);

    shutdown_handle.shutdown();
    let host_was_busy = monitor.is_some_and(|monitor| {
        let busy = monitor.host_was_busy();
        monitor.join();
        busy
    });
    runtime.shutdown_background();

    reporter.finalize();

    let mut report = comparison.compare(config.tolerance)?;
    if host_was_busy {
        report.add_caveat(
            "Other processes kept the host busy during the runs, so timings may be inflated",
        );
    }

    println!("{}", render_report(&report));

    if let Some(output) = &cli.output {
        report.write_json(output)?;
        log::info!("Wrote comparison report to {}", output.display());
    }

    Ok(report)
}

fn secs(value: f64) -> HarnessResult<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{value} is not a valid number of seconds"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::WorkloadSetBuilder;

    #[test]
    fn rejecting_strategy_is_skipped() {
        let set = WorkloadSetBuilder::new("mixed")
            .wait("toast", 0.05)
            .compute("sum", 1_000)
            .build()
            .unwrap();
        let reporter = ReportConfig::default().init();

        let comparison = run_comparison(
            &set,
            &[Strategy::Sequential, Strategy::CooperativeConcurrent],
            &RunConfig::default(),
            &reporter,
        )
        .unwrap();

        assert_eq!(1, comparison.runs.len());
        assert_eq!(Strategy::CooperativeConcurrent, comparison.skipped[0].0);

        let report = comparison.compare(0.2).unwrap();
        assert!(report.caveats.iter().any(|c| c.contains("skipped")));
    }

    #[test]
    fn no_strategy_starts_after_shutdown() {
        let set = WorkloadSetBuilder::new("wait")
            .wait("toast", 0.05)
            .build()
            .unwrap();
        let config = RunConfig::default();
        config.shutdown_handle().shutdown();

        let comparison = run_comparison(
            &set,
            &[Strategy::Sequential],
            &config,
            &ReportConfig::default().init(),
        )
        .unwrap();
        assert!(comparison.runs.is_empty());
        assert!(comparison.compare(0.2).is_err());
    }

    #[test]
    fn seconds_must_be_valid() {
        assert_eq!(Duration::from_millis(1500), secs(1.5).unwrap());
        assert!(secs(-1.0).is_err());
        assert!(secs(f64::NAN).is_err());
    }
}
