mod strategy;
mod task;

use exec_harness_core::prelude::{Contention, Workload, WorkloadKind};
use exec_harness_core::serde_secs;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use sha3::Digest;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub use strategy::Strategy;
pub use task::{ExecutorIdentity, TaskFailure, TaskResult};

/// Whether every workload of a run got to finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Complete,
    /// The run hit its deadline or was shut down; only some results were captured.
    Partial,
}

/// Summary of one strategy run over one workload set
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    /// The unique run id
    ///
    /// Chosen by the runner. Unique for each run.
    pub run_id: String,
    /// The strategy that executed the workloads
    pub strategy: Strategy,
    pub status: RunStatus,
    /// The time the run started
    ///
    /// This is a Unix timestamp in seconds.
    pub started_at: i64,
    /// The workload set, in input order
    pub workloads: Vec<Workload>,
    /// Successful results, in the order they completed
    pub results: Vec<TaskResult>,
    /// Workloads that did not produce a result
    #[serde(default)]
    pub failures: Vec<TaskFailure>,
    /// Wall-clock time of the whole run, measured by the runner around all of its work
    #[serde(with = "serde_secs")]
    pub wall_clock_elapsed: Duration,
    /// The longest startup overhead of any execution unit
    ///
    /// Only set for the multi-process strategy. Workers start together, so this is the part of
    /// [RunSummary::wall_clock_elapsed] spent before the last worker could begin.
    #[serde(
        default,
        with = "serde_secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_overhead: Option<Duration>,
    /// The contention model used, for the threaded strategy only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contention: Option<Contention>,
    /// Cores available to the harness when the run started
    pub available_cores: usize,
    /// The version of the harness that produced this summary
    pub harness_version: String,
}

impl RunSummary {
    /// Create a new, empty, run summary
    pub fn new(
        run_id: String,
        strategy: Strategy,
        started_at: i64,
        workloads: Vec<Workload>,
        available_cores: usize,
        harness_version: String,
    ) -> Self {
        Self {
            run_id,
            strategy,
            status: RunStatus::Complete,
            started_at,
            workloads,
            results: Vec::new(),
            failures: Vec::new(),
            wall_clock_elapsed: Duration::ZERO,
            startup_overhead: None,
            contention: None,
            available_cores,
            harness_version,
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == RunStatus::Partial
    }

    pub fn mark_partial(&mut self) {
        self.status = RunStatus::Partial;
    }

    pub fn result_for(&self, workload_name: &str) -> Option<&TaskResult> {
        self.results
            .iter()
            .find(|r| r.workload_name == workload_name)
    }

    pub fn failure_for(&self, workload_name: &str) -> Option<&TaskFailure> {
        self.failures
            .iter()
            .find(|f| f.workload_name == workload_name)
    }

    /// Names of the workloads in the order they finished.
    pub fn completion_order(&self) -> Vec<&str> {
        self.results
            .iter()
            .map(|r| r.workload_name.as_str())
            .collect()
    }

    /// `max(end) - min(start)` over all results, or `None` if nothing finished.
    pub fn result_span(&self) -> Option<Duration> {
        let start = self.results.iter().map(|r| r.start).min()?;
        let end = self.results.iter().map(|r| r.end).max()?;
        Some(end.saturating_sub(start))
    }

    /// Compute a fingerprint for the workload set of this run
    ///
    /// Two summaries with the same fingerprint ran the same work and can be compared.
    pub fn fingerprint(&self) -> String {
        workload_fingerprint(&self.workloads)
    }
}

/// Fingerprint a workload set
///
/// Uses each workload's name, kind, size and whether it fails deliberately. Labels are cosmetic
/// and input order does not matter. The fingerprint is computed using [sha3::Sha3_256].
pub fn workload_fingerprint(workloads: &[Workload]) -> String {
    let mut hasher = sha3::Sha3_256::new();
    workloads
        .iter()
        .sorted_by_key(|w| w.name())
        .for_each(|w| {
            Digest::update(&mut hasher, w.name().as_bytes());
            match *w.kind() {
                WorkloadKind::Wait { duration } => {
                    Digest::update(&mut hasher, b"wait");
                    Digest::update(&mut hasher, duration.as_nanos().to_le_bytes());
                }
                WorkloadKind::Compute { iterations } => {
                    Digest::update(&mut hasher, b"compute");
                    Digest::update(&mut hasher, iterations.to_le_bytes());
                }
            }
            Digest::update(&mut hasher, [u8::from(w.injects_failure())]);
        });

    format!("{:x}", hasher.finalize())
}

/// Environment variable name to set a custom run summary file path
pub const RUN_SUMMARY_PATH_ENV: &str = "RUN_SUMMARY_PATH";
/// Default path for the run summary file
pub const DEFAULT_RUN_SUMMARY_PATH: &str = "run_summary.jsonl";

/// The file run summaries are appended to and loaded from, taken from [RUN_SUMMARY_PATH_ENV].
pub fn run_summary_path() -> PathBuf {
    std::env::var(RUN_SUMMARY_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_RUN_SUMMARY_PATH))
}

/// Append the run summary to a file
///
/// The summary will be serialized to JSON and output as a single line followed by a newline. The
/// recommended file extension is `.jsonl`.
pub fn append_run_summary(run_summary: &RunSummary, path: impl AsRef<Path>) -> anyhow::Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)?;
    store_run_summary(run_summary, &mut file)?;
    file.write_all(b"\n")?;
    Ok(())
}

/// Serialize the run summary to a writer
pub fn store_run_summary<W: Write>(run_summary: &RunSummary, writer: &mut W) -> anyhow::Result<()> {
    serde_json::to_writer(writer, run_summary)?;
    Ok(())
}

/// Load a run summary from a reader
pub fn load_run_summary<R: Read>(reader: R) -> anyhow::Result<RunSummary> {
    let reader = std::io::BufReader::new(reader);
    let run_summary: RunSummary = serde_json::from_reader(reader)?;
    Ok(run_summary)
}

/// Load run summaries from a file
///
/// The file should contain one JSON object per line. This is the format produced by
/// [append_run_summary]. Blank lines are skipped.
pub fn load_summary_runs(path: impl AsRef<Path>) -> anyhow::Result<Vec<RunSummary>> {
    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);
    let mut runs = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let run: RunSummary = serde_json::from_str(&line)?;
        runs.push(run);
    }
    Ok(runs)
}
