use std::time::Instant;

use exec_harness_core::prelude::{execute_blocking, ExecutionError, Workload};
use exec_harness_instruments::TimingRecorder;
use exec_harness_summary_model::{ExecutorIdentity, RunSummary, Strategy, TaskResult};

use crate::context::RunConfig;
use crate::strategy::{RunCollector, StrategyRunner};

/// Runs each workload to completion on the calling thread before starting the next.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialRunner;

impl StrategyRunner for SequentialRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Sequential
    }

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError> {
        let run = config.start_run();
        let mut collector = RunCollector::start(self.strategy(), workloads);
        let recorder = TimingRecorder::new(workloads.len());
        let executor = ExecutorIdentity::current_thread();

        let mut stopped = false;
        let wall_start = Instant::now();
        for (slot, workload) in workloads.iter().enumerate() {
            if run.should_stop() {
                stopped = true;
                break;
            }

            log::debug!("Starting '{}'", workload.name());
            let timing = recorder.record(slot, workload.name());
            let outcome = execute_blocking(workload, run.listener(), None);
            let interval = timing.finish();

            collector.record(
                slot,
                outcome.map(|value| {
                    TaskResult::new(
                        workload.name(),
                        interval.start,
                        interval.end,
                        value,
                        executor.clone(),
                    )
                }),
            );
        }
        let wall_clock_elapsed = wall_start.elapsed();

        Ok(collector.finish(wall_clock_elapsed, stopped))
    }
}
