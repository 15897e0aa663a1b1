use std::time::Duration;

use exec_harness_core::prelude::{derive_value, Contention, FailureKind};
use exec_harness_runner::prelude::*;
use exec_harness_summary_model::{RunStatus, Strategy};
use serial_test::serial;

fn secs(run: &exec_harness_summary_model::RunSummary) -> f64 {
    run.wall_clock_elapsed.as_secs_f64()
}

fn short_waits() -> WorkloadSet {
    WorkloadSetBuilder::new("short-waits")
        .wait("coffee", 0.4)
        .wait("toast", 0.2)
        .wait("fruit", 0.1)
        .build()
        .unwrap()
}

fn computes(iterations: u64) -> WorkloadSet {
    WorkloadSetBuilder::new("computes")
        .compute("task-1", iterations)
        .compute("task-2", iterations)
        .build()
        .unwrap()
}

#[test]
fn sequential_takes_the_sum_in_input_order() {
    let set = short_waits();
    let run = SequentialRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();

    assert_eq!(RunStatus::Complete, run.status);
    assert_eq!(vec!["coffee", "toast", "fruit"], run.completion_order());
    assert!(secs(&run) >= 0.7, "took {:.3}s", secs(&run));
    assert!(secs(&run) < 0.7 * 1.1, "took {:.3}s", secs(&run));
    assert_eq!(
        derive_value("toast"),
        run.result_for("toast").unwrap().value
    );
}

#[test]
fn cooperative_sequential_behaves_like_sequential() {
    let set = short_waits();
    let run = CooperativeSequentialRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();

    assert_eq!(vec!["coffee", "toast", "fruit"], run.completion_order());
    assert!(secs(&run) >= 0.7, "took {:.3}s", secs(&run));
    assert!(secs(&run) < 0.7 * 1.1, "took {:.3}s", secs(&run));
}

#[test]
fn kitchen_waits_overlap_on_the_event_loop() {
    let set = WorkloadSet::preset("kitchen-wait").unwrap();
    let run = CooperativeConcurrentRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();

    assert_eq!(RunStatus::Complete, run.status);
    assert_eq!(vec!["fruit", "toast", "coffee"], run.completion_order());
    assert!(secs(&run) >= 1.0, "took {:.3}s", secs(&run));
    assert!(secs(&run) < 1.15, "took {:.3}s", secs(&run));

    let starts = run.results.iter().map(|r| r.start).collect::<Vec<_>>();
    assert!(starts.iter().all(|s| *s < Duration::from_millis(50)));
}

#[test]
fn concurrent_runs_repeat_the_same_outcome() {
    let set = short_waits();
    let first = CooperativeConcurrentRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();
    let second = CooperativeConcurrentRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();

    assert_eq!(first.completion_order(), second.completion_order());
    assert_eq!(
        first.results.iter().map(|r| r.value).collect::<Vec<_>>(),
        second.results.iter().map(|r| r.value).collect::<Vec<_>>()
    );
    assert_ne!(first.run_id, second.run_id);

    let drift = (secs(&first) - secs(&second)).abs() / secs(&first);
    assert!(drift < 0.15, "wall clocks drifted by {:.1}%", drift * 100.0);
}

#[test]
fn event_loop_rejects_compute() {
    let err = CooperativeConcurrentRunner
        .execute(computes(1_000).workloads(), &RunConfig::default())
        .unwrap_err();
    assert_eq!(FailureKind::Unsupported, err.kind());
}

#[test]
fn threads_overlap_waits() {
    let set = short_waits();
    let run = ThreadedRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();

    assert_eq!(vec!["fruit", "toast", "coffee"], run.completion_order());
    assert!(secs(&run) < 0.4 * 1.2, "took {:.3}s", secs(&run));

    let mut names = run
        .results
        .iter()
        .map(|r| r.executor.to_string())
        .collect::<Vec<_>>();
    names.sort();
    names.dedup();
    assert_eq!(3, names.len());
}

#[test]
#[serial]
fn contended_threads_compute_no_faster_than_sequential() {
    let set = computes(100_000_000);
    let sequential = SequentialRunner
        .execute(set.workloads(), &RunConfig::default())
        .unwrap();
    let threaded = ThreadedRunner
        .execute(
            set.workloads(),
            &RunConfig::default().with_contention(Contention::Global),
        )
        .unwrap();

    assert_eq!(Some(Contention::Global), threaded.contention);
    assert_eq!(2, threaded.results.len());
    let ratio = secs(&threaded) / secs(&sequential);
    assert!(
        (1.0 - DEFAULT_TOLERANCE..=1.0 + DEFAULT_TOLERANCE).contains(&ratio),
        "threaded/sequential = {ratio:.2}"
    );
}

#[test]
fn deadline_makes_the_run_partial() {
    let set = WorkloadSet::preset("kitchen-wait").unwrap();
    let config = RunConfig::default().with_deadline(Some(Duration::from_millis(200)));

    let run = SequentialRunner.execute(set.workloads(), &config).unwrap();

    assert_eq!(RunStatus::Partial, run.status);
    assert!(run.results.is_empty());
    assert_eq!(3, run.failures.len());
    assert!(run
        .failures
        .iter()
        .all(|f| f.kind == FailureKind::Cancelled));
    assert!(secs(&run) < 0.5, "took {:.3}s", secs(&run));
}

#[test]
fn deadline_keeps_what_finished_on_the_event_loop() {
    let set = short_waits();
    let config = RunConfig::default().with_deadline(Some(Duration::from_millis(300)));

    let run = CooperativeConcurrentRunner
        .execute(set.workloads(), &config)
        .unwrap();

    assert_eq!(RunStatus::Partial, run.status);
    assert_eq!(vec!["fruit", "toast"], run.completion_order());
    assert_eq!(FailureKind::Cancelled, run.failure_for("coffee").unwrap().kind);
}

#[test]
fn deadline_cancels_sleeping_threads() {
    let set = short_waits();
    let config = RunConfig::default().with_deadline(Some(Duration::from_millis(300)));

    let run = ThreadedRunner.execute(set.workloads(), &config).unwrap();

    assert_eq!(RunStatus::Partial, run.status);
    assert_eq!(vec!["fruit", "toast"], run.completion_order());
    assert_eq!(FailureKind::Cancelled, run.failure_for("coffee").unwrap().kind);
    assert!(secs(&run) >= 0.25, "took {:.3}s", secs(&run));
    assert!(secs(&run) < 0.4, "took {:.3}s", secs(&run));
}

#[test]
fn injected_failure_does_not_stop_siblings() {
    let set = WorkloadSetBuilder::new("failing")
        .wait("coffee", 0.1)
        .wait("toast", 0.05)
        .failing("toast")
        .wait("fruit", 0.05)
        .build()
        .unwrap();

    for strategy in [
        Strategy::Sequential,
        Strategy::CooperativeSequential,
        Strategy::CooperativeConcurrent,
        Strategy::Threaded,
    ] {
        let run = runner_for(strategy)
            .execute(set.workloads(), &RunConfig::default())
            .unwrap();
        assert_eq!(RunStatus::Complete, run.status, "{strategy}");
        assert_eq!(2, run.results.len(), "{strategy}");
        assert_eq!(
            FailureKind::Injected,
            run.failure_for("toast").unwrap().kind,
            "{strategy}"
        );
    }
}
