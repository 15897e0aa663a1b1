use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use exec_harness_core::prelude::{derive_value, run_compute, ExecutionError, Workload, WorkloadKind};
use exec_harness_instruments::TimingRecorder;
use exec_harness_summary_model::{ExecutorIdentity, RunSummary, Strategy, TaskResult};

use crate::context::RunConfig;
use crate::event_loop::{EventLoop, LoopHandle};
use crate::strategy::{RunCollector, StrategyRunner};

/// The suspension-capable form of a wait workload: it parks on the event loop's timer heap
/// instead of blocking the thread, so other tasks can run in the meantime.
///
/// Compute workloads have no suspension point and are refused.
pub async fn wait_cooperatively(
    handle: &LoopHandle,
    workload: &Workload,
) -> Result<u64, ExecutionError> {
    if workload.injects_failure() {
        return Err(ExecutionError::Injected {
            workload: workload.name().to_string(),
        });
    }

    match *workload.kind() {
        WorkloadKind::Wait { duration } => {
            handle.sleep(duration).await;
            Ok(derive_value(workload.name()))
        }
        WorkloadKind::Compute { .. } => Err(ExecutionError::NoSuspensionPoint {
            workloads: vec![workload.name().to_string()],
        }),
    }
}

type Outcomes = Rc<RefCell<Vec<(usize, Result<TaskResult, ExecutionError>)>>>;

/// Awaits each workload in turn from a single driver task. The calls can suspend, but nothing
/// else is scheduled while they do, so the run takes as long as the sequential one.
#[derive(Debug, Default, Clone, Copy)]
pub struct CooperativeSequentialRunner;

impl StrategyRunner for CooperativeSequentialRunner {
    fn strategy(&self) -> Strategy {
        Strategy::CooperativeSequential
    }

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError> {
        let run = config.start_run();
        let mut collector = RunCollector::start(self.strategy(), workloads);
        let recorder = TimingRecorder::new(workloads.len());

        let mut event_loop = EventLoop::new();
        let handle = event_loop.handle();
        let outcomes: Outcomes = Rc::new(RefCell::new(Vec::new()));

        let driver_outcomes = outcomes.clone();
        let listener = run.new_listener();
        let owned = workloads.to_vec();
        let driver = handle.clone().spawn_with(move |task_id| async move {
            let executor = ExecutorIdentity::EventLoopTask { task_id };
            for (slot, workload) in owned.iter().enumerate() {
                let timing = recorder.record(slot, workload.name());
                let outcome = match *workload.kind() {
                    // Runs inline and holds the loop until it is done.
                    WorkloadKind::Compute { iterations } if !workload.injects_failure() => {
                        run_compute(workload.name(), iterations, &listener, None)
                    }
                    _ => wait_cooperatively(&handle, workload).await,
                };
                let interval = timing.finish();

                driver_outcomes.borrow_mut().push((
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
                ));
            }
        });
        log::debug!("Driver scheduled as task #{}", driver.id());

        let wall_start = Instant::now();
        let loop_outcome = event_loop.run(run.listener());
        let wall_clock_elapsed = wall_start.elapsed();

        if loop_outcome.stalled > 0 {
            return Err(ExecutionError::Stalled {
                pending: loop_outcome.stalled,
            });
        }

        for (slot, outcome) in outcomes.borrow_mut().drain(..) {
            collector.record(slot, outcome);
        }

        Ok(collector.finish(wall_clock_elapsed, loop_outcome.interrupted))
    }
}

/// Spawns every workload onto the event loop at once and gathers them. Waits overlap, so the run
/// takes about as long as the longest one.
#[derive(Debug, Default, Clone, Copy)]
pub struct CooperativeConcurrentRunner;

impl StrategyRunner for CooperativeConcurrentRunner {
    fn strategy(&self) -> Strategy {
        Strategy::CooperativeConcurrent
    }

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError> {
        let compute_bound = workloads
            .iter()
            .filter(|w| w.is_compute())
            .map(|w| w.name().to_string())
            .collect::<Vec<_>>();
        if !compute_bound.is_empty() {
            return Err(ExecutionError::NoSuspensionPoint {
                workloads: compute_bound,
            });
        }

        let run = config.start_run();
        let mut collector = RunCollector::start(self.strategy(), workloads);
        let recorder = TimingRecorder::new(workloads.len());

        let mut event_loop = EventLoop::new();
        let joins = workloads
            .iter()
            .enumerate()
            .map(|(slot, workload)| {
                let handle = event_loop.handle();
                let recorder = recorder.clone();
                let workload = workload.clone();
                event_loop.handle().spawn_with(move |task_id| async move {
                    let timing = recorder.record(slot, workload.name());
                    let outcome = wait_cooperatively(&handle, &workload).await;
                    let interval = timing.finish();

                    outcome.map(|value| {
                        TaskResult::new(
                            workload.name(),
                            interval.start,
                            interval.end,
                            value,
                            ExecutorIdentity::EventLoopTask { task_id },
                        )
                    })
                })
            })
            .collect::<Vec<_>>();

        let wall_start = Instant::now();
        let loop_outcome = event_loop.run(run.listener());
        let wall_clock_elapsed = wall_start.elapsed();

        if loop_outcome.stalled > 0 {
            return Err(ExecutionError::Stalled {
                pending: loop_outcome.stalled,
            });
        }

        for (slot, join) in joins.iter().enumerate() {
            if let Some(outcome) = join.try_take() {
                collector.record(slot, outcome);
            }
        }

        Ok(collector.finish(wall_clock_elapsed, loop_outcome.interrupted))
    }
}
