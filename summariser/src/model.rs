use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use exec_harness_core::prelude::Workload;
use exec_harness_core::serde_secs;
use exec_harness_summary_model::{RunStatus, Strategy, TaskFailure};
use serde::{Deserialize, Serialize};

/// Side by side comparison of strategy runs over one workload set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonReport {
    /// Fingerprint of the workload set every run executed
    pub fingerprint: String,
    /// Workload names, in input order
    pub workloads: Vec<String>,
    pub profile: WorkloadProfile,
    /// Cores the host offered to the runs
    pub available_cores: usize,
    /// Fraction a run may deviate from its timing law before a violation is flagged
    pub tolerance: f64,
    /// The strategy speedups are measured against, if a complete sequential run was present
    pub baseline: Option<Strategy>,
    pub strategies: Vec<StrategyReport>,
    /// Things a reader should keep in mind when reading the numbers
    #[serde(default)]
    pub caveats: Vec<String>,
    /// Which strategy the measurements favour, absent without a baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
}

impl ComparisonReport {
    pub fn strategy(&self, strategy: Strategy) -> Option<&StrategyReport> {
        self.strategies.iter().find(|s| s.strategy == strategy)
    }

    pub fn violations(&self) -> impl Iterator<Item = (Strategy, &InvariantViolation)> {
        self.strategies
            .iter()
            .flat_map(|s| s.violations.iter().map(move |v| (s.strategy, v)))
    }

    pub fn add_caveat(&mut self, caveat: impl Into<String>) {
        let caveat = caveat.into();
        if !self.caveats.contains(&caveat) {
            self.caveats.push(caveat);
        }
    }

    /// Write the report as pretty printed JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)
            .with_context(|| format!("Failed to create report file {}", path.display()))?;
        serde_json::to_writer_pretty(file, self)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        Ok(())
    }
}

/// How one strategy did.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyReport {
    pub strategy: Strategy,
    pub run_id: String,
    pub status: RunStatus,
    #[serde(with = "serde_secs")]
    pub wall_clock_elapsed: Duration,
    /// Wall clock the strategy's timing law predicts, when one applies
    #[serde(
        default,
        with = "serde_secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_elapsed: Option<Duration>,
    #[serde(
        default,
        with = "serde_secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_overhead: Option<Duration>,
    /// Successful workloads in completion order
    pub per_workload: Vec<WorkloadInterval>,
    pub failures: Vec<TaskFailure>,
    /// `baseline wall / this wall`, absent without a baseline
    pub speedup_vs_baseline: Option<f64>,
    pub violations: Vec<InvariantViolation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkloadInterval {
    pub name: String,
    #[serde(with = "serde_secs")]
    pub start: Duration,
    #[serde(with = "serde_secs")]
    pub end: Duration,
    pub executor: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    /// The wall clock is shorter than the span of the results it contains.
    Span,
    /// A strategy that runs one workload at a time did not take the sum of the durations.
    SumLaw,
    /// A concurrent strategy did not take about as long as its longest workload.
    MaxLaw,
}

/// A timing law that a run broke by more than the tolerance. Reported, never fatal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvariantViolation {
    pub kind: ViolationKind,
    #[serde(with = "serde_secs")]
    pub expected: Duration,
    #[serde(with = "serde_secs")]
    pub actual: Duration,
    /// `|actual - expected| / expected`
    pub deviation: f64,
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:?}: expected {:.3}s, measured {:.3}s ({:+.1}%)",
            self.kind,
            self.expected.as_secs_f64(),
            self.actual.as_secs_f64(),
            (self.actual.as_secs_f64() / self.expected.as_secs_f64().max(f64::EPSILON) - 1.0)
                * 100.0
        )
    }
}

/// What kind of work a workload set contains.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorkloadProfile {
    WaitBound,
    ComputeBound,
    Mixed,
}

impl WorkloadProfile {
    pub fn of(workloads: &[Workload]) -> Self {
        if workloads.iter().all(|w| w.is_wait()) {
            WorkloadProfile::WaitBound
        } else if workloads.iter().all(|w| w.is_compute()) {
            WorkloadProfile::ComputeBound
        } else {
            WorkloadProfile::Mixed
        }
    }
}

impl std::fmt::Display for WorkloadProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            WorkloadProfile::WaitBound => "wait-bound",
            WorkloadProfile::ComputeBound => "compute-bound",
            WorkloadProfile::Mixed => "mixed",
        })
    }
}

/// The strategy to reach for with this kind of work, as measured.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Decision {
    pub profile: WorkloadProfile,
    /// The fastest clean strategy, or sequential when nothing beat it by more than the tolerance
    pub recommended: Strategy,
    pub speedup: f64,
    /// Every other clean strategy that also beat sequential, fastest first
    pub also_faster: Vec<(Strategy, f64)>,
    /// Clean strategies that gave no meaningful gain
    pub no_gain: Vec<Strategy>,
}
