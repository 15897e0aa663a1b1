use std::process::Command;

use exec_harness_summariser::ComparisonReport;
use exec_harness_summary_model::{load_summary_runs, RunStatus, Strategy, RUN_SUMMARY_PATH_ENV};

#[test]
fn compares_strategies_and_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let set_path = dir.path().join("breakfast.toml");
    std::fs::write(
        &set_path,
        r#"
name = "breakfast"

[[workload]]
name = "coffee"
wait_secs = 0.3

[[workload]]
name = "toast"
wait_secs = 0.1
"#,
    )
    .unwrap();
    let report_path = dir.path().join("report.json");
    let summary_path = dir.path().join("run_summary.jsonl");

    let output = Command::new(env!("CARGO_BIN_EXE_exec-harness"))
        .arg("--workloads-file")
        .arg(&set_path)
        .arg("--strategy=cooperative-concurrent,threaded")
        .arg("--no-progress")
        .arg("--persist")
        .arg("--output")
        .arg(&report_path)
        .env(RUN_SUMMARY_PATH_ENV, &summary_path)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: ComparisonReport =
        serde_json::from_reader(std::fs::File::open(&report_path).unwrap()).unwrap();
    assert_eq!(Some(Strategy::Sequential), report.baseline);
    assert_eq!(
        vec![
            Strategy::Sequential,
            Strategy::CooperativeConcurrent,
            Strategy::Threaded
        ],
        report
            .strategies
            .iter()
            .map(|s| s.strategy)
            .collect::<Vec<_>>()
    );
    assert!(report
        .strategies
        .iter()
        .all(|s| s.status == RunStatus::Complete));

    let concurrent = report.strategy(Strategy::CooperativeConcurrent).unwrap();
    assert!(concurrent.speedup_vs_baseline.unwrap() > 1.1);

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("cooperative-concurrent"));

    assert_eq!(3, load_summary_runs(&summary_path).unwrap().len());
}

#[test]
fn unknown_preset_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_exec-harness"))
        .arg("--workloads=brunch")
        .arg("--no-progress")
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("kitchen-wait"));
}
