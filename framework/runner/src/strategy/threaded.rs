use std::sync::Arc;
use std::time::Instant;

use exec_harness_core::prelude::{execute_blocking, ExecutionError, InterpreterLock, Workload};
use exec_harness_instruments::TimingRecorder;
use exec_harness_summary_model::{ExecutorIdentity, RunSummary, Strategy, TaskResult};

use crate::context::RunConfig;
use crate::strategy::{RunCollector, StrategyRunner};

/// Starts one OS thread per workload and joins them all.
///
/// Waits overlap freely. Compute workloads take turns on an [InterpreterLock] when the config asks
/// for [exec_harness_core::prelude::Contention::Global], so they end up no faster than running
/// them one after another.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadedRunner;

impl StrategyRunner for ThreadedRunner {
    fn strategy(&self) -> Strategy {
        Strategy::Threaded
    }

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError> {
        let run = config.start_run();
        let mut collector = RunCollector::start(self.strategy(), workloads);
        collector.summary_mut().contention = Some(config.contention);

        let shared: Arc<[Workload]> = workloads.into();
        let lock = InterpreterLock::for_contention(config.contention);
        let recorder = TimingRecorder::new(workloads.len());

        let wall_start = Instant::now();
        let mut handles = Vec::with_capacity(workloads.len());
        for (slot, workload) in workloads.iter().enumerate() {
            let shared = shared.clone();
            let lock = lock.clone();
            let recorder = recorder.clone();
            let listener = run.new_listener();

            let spawned = std::thread::Builder::new()
                .name(format!("worker-{slot}"))
                .spawn(move || {
                    let workload = &shared[slot];
                    let timing = recorder.record(slot, workload.name());
                    let outcome = execute_blocking(workload, &listener, lock.as_ref());
                    let interval = timing.finish();

                    let thread = std::thread::current();
                    let executor = ExecutorIdentity::Thread {
                        name: thread.name().unwrap_or("unnamed").to_string(),
                        id: format!("{:?}", thread.id()),
                    };

                    outcome.map(|value| {
                        TaskResult::new(
                            workload.name(),
                            interval.start,
                            interval.end,
                            value,
                            executor,
                        )
                    })
                });

            match spawned {
                Ok(handle) => handles.push((slot, handle)),
                Err(source) => collector.record(
                    slot,
                    Err(ExecutionError::SpawnFailed {
                        workload: workload.name().to_string(),
                        source,
                    }),
                ),
            }
        }

        for (slot, handle) in handles {
            let outcome = handle.join().unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "thread panicked".to_string());
                Err(ExecutionError::Crashed {
                    workload: shared[slot].name().to_string(),
                    message,
                })
            });
            collector.record(slot, outcome);
        }
        let wall_clock_elapsed = wall_start.elapsed();

        Ok(collector.finish(wall_clock_elapsed, false))
    }
}
