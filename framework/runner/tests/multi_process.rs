use std::time::Duration;

use exec_harness_core::prelude::{derive_value, FailureKind};
use exec_harness_runner::prelude::*;
use exec_harness_summary_model::{ExecutorIdentity, RunStatus};
use serial_test::serial;

fn config() -> RunConfig {
    env_logger::try_init().ok();
    RunConfig::default().with_worker_program(env!("CARGO_BIN_EXE_exec-harness"))
}

#[test]
fn each_workload_gets_its_own_process() {
    let set = WorkloadSetBuilder::new("waits")
        .wait("coffee", 0.3)
        .wait("toast", 0.2)
        .wait("fruit", 0.1)
        .build()
        .unwrap();

    let run = MultiProcessRunner.execute(set.workloads(), &config()).unwrap();

    assert_eq!(RunStatus::Complete, run.status);
    assert_eq!(vec!["fruit", "toast", "coffee"], run.completion_order());
    assert_eq!(derive_value("coffee"), run.result_for("coffee").unwrap().value);

    let mut pids = run
        .results
        .iter()
        .map(|r| match r.executor {
            ExecutorIdentity::Process { pid } => pid,
            ref other => panic!("unexpected executor {other}"),
        })
        .collect::<Vec<_>>();
    pids.sort();
    pids.dedup();
    assert_eq!(3, pids.len());
    assert!(!pids.contains(&std::process::id()));

    assert!(run.startup_overhead.is_some());
    assert!(run.results.iter().all(|r| r.startup_overhead.is_some()));
}

#[test]
fn failing_worker_does_not_abort_the_batch() {
    let set = WorkloadSetBuilder::new("partial-failure")
        .wait("coffee", 0.2)
        .wait("toast", 0.1)
        .failing("toast")
        .wait("fruit", 0.1)
        .build()
        .unwrap();

    let run = MultiProcessRunner.execute(set.workloads(), &config()).unwrap();

    assert_eq!(RunStatus::Complete, run.status);
    assert_eq!(2, run.results.len());
    assert_eq!(1, run.failures.len());
    assert_eq!(FailureKind::Injected, run.failure_for("toast").unwrap().kind);
}

#[test]
fn missing_worker_program_is_a_spawn_failure() {
    let set = WorkloadSetBuilder::new("waits")
        .wait("coffee", 0.1)
        .wait("toast", 0.1)
        .build()
        .unwrap();
    let config = RunConfig::default().with_worker_program("/nonexistent/exec-harness-worker");

    let run = MultiProcessRunner.execute(set.workloads(), &config).unwrap();

    assert!(run.results.is_empty());
    assert_eq!(2, run.failures.len());
    assert!(run
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::SpawnFailed));
}

#[test]
fn slow_worker_is_killed_at_the_timeout() {
    let set = WorkloadSetBuilder::new("slow")
        .wait("stew", 30.0)
        .wait("toast", 0.05)
        .build()
        .unwrap();
    let config = config().with_process_timeout(Duration::from_millis(1500));

    let run = MultiProcessRunner.execute(set.workloads(), &config).unwrap();

    assert_eq!(RunStatus::Partial, run.status);
    assert_eq!(vec!["toast"], run.completion_order());
    assert_eq!(FailureKind::TimedOut, run.failure_for("stew").unwrap().kind);
    assert!(run.wall_clock_elapsed < Duration::from_secs(5));
}

#[test]
fn run_deadline_cancels_unfinished_workers() {
    let set = WorkloadSetBuilder::new("slow")
        .wait("coffee", 3.0)
        .wait("toast", 0.1)
        .build()
        .unwrap();
    let config = config().with_deadline(Some(Duration::from_millis(700)));

    let run = MultiProcessRunner.execute(set.workloads(), &config).unwrap();

    assert_eq!(RunStatus::Partial, run.status);
    assert_eq!(vec!["toast"], run.completion_order());
    assert_eq!(FailureKind::Cancelled, run.failure_for("coffee").unwrap().kind);
    assert!(run.wall_clock_elapsed >= Duration::from_millis(600));
    assert!(run.wall_clock_elapsed < Duration::from_secs(2));
}

#[test]
#[serial]
fn compute_spreads_over_cores() {
    if available_cores() < 3 {
        eprintln!("Skipping, fewer than 3 cores available");
        return;
    }

    // Large enough that worker startup is a small share of the wall clock
    let set = WorkloadSetBuilder::new("big-kitchen-compute")
        .compute("risotto", 300_000_000)
        .compute("sauce", 300_000_000)
        .compute("vegetables", 300_000_000)
        .build()
        .unwrap();
    let sequential = SequentialRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();
    let processes = MultiProcessRunner.execute(set.workloads(), &config()).unwrap();

    assert_eq!(RunStatus::Complete, processes.status);
    assert!(
        processes.wall_clock_elapsed < sequential.wall_clock_elapsed / 2,
        "processes took {:.3}s, sequential {:.3}s",
        processes.wall_clock_elapsed.as_secs_f64(),
        sequential.wall_clock_elapsed.as_secs_f64()
    );

    let working = processes
        .wall_clock_elapsed
        .saturating_sub(processes.startup_overhead.unwrap_or_default());
    let speedup = sequential.wall_clock_elapsed.as_secs_f64() / working.as_secs_f64();
    assert!(speedup > 2.0, "speedup was only {speedup:.2}");
}
