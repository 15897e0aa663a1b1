mod cooperative;
mod process;
mod sequential;
mod threaded;

use std::time::Duration;

use exec_harness_core::prelude::{ExecutionError, Workload};
use exec_harness_summary_model::{RunSummary, Strategy, TaskFailure, TaskResult};

use crate::context::RunConfig;

pub use cooperative::{
    wait_cooperatively, CooperativeConcurrentRunner, CooperativeSequentialRunner,
};
pub use process::{MultiProcessRunner, WORKER_FLAG};
pub use sequential::SequentialRunner;
pub use threaded::ThreadedRunner;

/// Executes a workload set under one execution model and measures it.
///
/// Every implementation times each workload against one monotonic epoch, fixed when the run
/// starts, and measures the wall clock around all of its work. Failures of single workloads are
/// collected into the summary. An `Err` is only returned when the strategy cannot run the set at
/// all.
pub trait StrategyRunner {
    fn strategy(&self) -> Strategy;

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError>;
}

pub fn runner_for(strategy: Strategy) -> Box<dyn StrategyRunner> {
    match strategy {
        Strategy::Sequential => Box::new(SequentialRunner),
        Strategy::CooperativeSequential => Box::new(CooperativeSequentialRunner),
        Strategy::CooperativeConcurrent => Box::new(CooperativeConcurrentRunner),
        Strategy::Threaded => Box::new(ThreadedRunner),
        Strategy::MultiProcess => Box::new(MultiProcessRunner),
    }
}

/// Cores the harness may use, as seen by the operating system.
pub fn available_cores() -> usize {
    let mut sys = sysinfo::System::new();
    sys.refresh_cpu_all();
    match sys.cpus().len() {
        0 => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
        n => n,
    }
}

/// Collects the outcome of every workload slot of one run and turns them into a [RunSummary].
pub(crate) struct RunCollector {
    summary: RunSummary,
    outcomes: Vec<Option<Result<TaskResult, ExecutionError>>>,
}

impl RunCollector {
    pub(crate) fn start(strategy: Strategy, workloads: &[Workload]) -> Self {
        log::info!(
            "Running {} workload(s) with the {strategy} strategy",
            workloads.len()
        );

        Self {
            summary: RunSummary::new(
                nanoid::nanoid!(),
                strategy,
                chrono::Utc::now().timestamp(),
                workloads.to_vec(),
                available_cores(),
                env!("CARGO_PKG_VERSION").to_string(),
            ),
            outcomes: (0..workloads.len()).map(|_| None).collect(),
        }
    }

    pub(crate) fn summary_mut(&mut self) -> &mut RunSummary {
        &mut self.summary
    }

    pub(crate) fn record(&mut self, slot: usize, outcome: Result<TaskResult, ExecutionError>) {
        match self.outcomes.get_mut(slot) {
            Some(entry) => *entry = Some(outcome),
            None => log::error!("Outcome for unknown workload slot {slot} ignored"),
        }
    }

    pub(crate) fn has_outcome(&self, slot: usize) -> bool {
        self.outcomes.get(slot).is_some_and(Option::is_some)
    }

    /// Build the summary. Slots without an outcome were never finished and count as cancelled.
    pub(crate) fn finish(mut self, wall_clock_elapsed: Duration, interrupted: bool) -> RunSummary {
        let mut results = Vec::new();
        for (slot, outcome) in self.outcomes.into_iter().enumerate() {
            let name = self.summary.workloads[slot].name().to_string();
            match outcome {
                Some(Ok(result)) => {
                    log::debug!(
                        "'{name}' finished after {:.3}s on {}",
                        result.duration().as_secs_f64(),
                        result.executor
                    );
                    results.push((slot, result));
                }
                Some(Err(e)) => {
                    if e.kind().is_interruption() {
                        log::warn!("{e}");
                    } else {
                        log::error!("{e}");
                    }
                    self.summary.failures.push(TaskFailure::from_error(name, &e));
                }
                None => {
                    let e = ExecutionError::cancelled(&name);
                    log::warn!("{e}");
                    self.summary.failures.push(TaskFailure::from_error(name, &e));
                }
            }
        }

        results.sort_by_key(|(slot, result)| (result.end, *slot));
        self.summary.results = results.into_iter().map(|(_, result)| result).collect();
        self.summary.wall_clock_elapsed = wall_clock_elapsed;

        if interrupted || self.summary.failures.iter().any(|f| f.kind.is_interruption()) {
            self.summary.mark_partial();
        }

        log::info!(
            "{} run finished in {:.3}s: {} completed, {} failed, status {:?}",
            self.summary.strategy,
            wall_clock_elapsed.as_secs_f64(),
            self.summary.results.len(),
            self.summary.failures.len(),
            self.summary.status
        );

        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_harness_core::prelude::FailureKind;
    use exec_harness_summary_model::{ExecutorIdentity, RunStatus};

    fn workloads() -> Vec<Workload> {
        vec![
            Workload::wait_secs("a", 1.0).unwrap(),
            Workload::wait_secs("b", 0.5).unwrap(),
            Workload::wait_secs("c", 0.3).unwrap(),
        ]
    }

    fn result(name: &str, start_ms: u64, end_ms: u64) -> TaskResult {
        TaskResult::new(
            name,
            Duration::from_millis(start_ms),
            Duration::from_millis(end_ms),
            1,
            ExecutorIdentity::EventLoopTask { task_id: 0 },
        )
    }

    #[test]
    fn results_are_kept_in_completion_order() {
        let mut collector = RunCollector::start(Strategy::CooperativeConcurrent, &workloads());
        collector.record(0, Ok(result("a", 0, 1000)));
        collector.record(1, Ok(result("b", 0, 500)));
        collector.record(2, Ok(result("c", 0, 300)));

        let summary = collector.finish(Duration::from_millis(1000), false);
        assert_eq!(vec!["c", "b", "a"], summary.completion_order());
        assert_eq!(RunStatus::Complete, summary.status);
        assert!(summary.available_cores >= 1);
    }

    #[test]
    fn missing_outcomes_are_cancelled_and_partial() {
        let mut collector = RunCollector::start(Strategy::Sequential, &workloads());
        collector.record(0, Ok(result("a", 0, 1000)));
        assert!(collector.has_outcome(0));
        assert!(!collector.has_outcome(1));

        let summary = collector.finish(Duration::from_millis(1200), true);
        assert_eq!(RunStatus::Partial, summary.status);
        assert_eq!(2, summary.failures.len());
        assert!(summary
            .failures
            .iter()
            .all(|f| f.kind == FailureKind::Cancelled));
    }

    #[test]
    fn non_interrupting_failure_keeps_run_complete() {
        let mut collector = RunCollector::start(Strategy::MultiProcess, &workloads());
        collector.record(0, Ok(result("a", 0, 1000)));
        collector.record(
            1,
            Err(ExecutionError::Injected {
                workload: "b".to_string(),
            }),
        );
        collector.record(2, Ok(result("c", 0, 300)));

        let summary = collector.finish(Duration::from_millis(1000), false);
        assert_eq!(RunStatus::Complete, summary.status);
        assert_eq!(2, summary.results.len());
        assert_eq!(FailureKind::Injected, summary.failures[0].kind);
    }

    #[test]
    fn runner_for_every_strategy() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy, runner_for(strategy).strategy());
        }
    }
}
