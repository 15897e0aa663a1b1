use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WorkloadError;

/// What a workload does when it is executed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkloadKind {
    /// A *simulated* wait on an external event such as a disk or network reply. Nothing is read
    /// or written; the execution unit is simply idle for the duration.
    Wait {
        #[serde(with = "crate::serde_secs")]
        duration: Duration,
    },
    /// A CPU-bound reduction over `iterations` values. It has no point at which it could yield.
    Compute { iterations: u64 },
}

/// A named unit of simulated work.
///
/// Workloads are plain descriptions, immutable once built. Executing one is the job of a
/// strategy runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workload {
    name: String,
    #[serde(flatten)]
    kind: WorkloadKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    inject_failure: bool,
}

impl Workload {
    pub fn wait(name: impl Into<String>, duration: Duration) -> Result<Self, WorkloadError> {
        Self::new(name.into(), WorkloadKind::Wait { duration })
    }

    pub fn wait_secs(name: impl Into<String>, secs: f64) -> Result<Self, WorkloadError> {
        let name = name.into();
        let duration = Duration::try_from_secs_f64(secs)
            .map_err(|_| WorkloadError::InvalidDuration {
                name: name.clone(),
                secs,
            })?;
        Self::new(name, WorkloadKind::Wait { duration })
    }

    pub fn compute(name: impl Into<String>, iterations: u64) -> Result<Self, WorkloadError> {
        Self::new(name.into(), WorkloadKind::Compute { iterations })
    }

    fn new(name: String, kind: WorkloadKind) -> Result<Self, WorkloadError> {
        let workload = Self {
            name,
            kind,
            label: None,
            inject_failure: false,
        };
        workload.validate()?;
        Ok(workload)
    }

    /// Attach a cosmetic label, for example an emoji, used only when printing.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Make the execution unit running this workload fail before it produces a result.
    pub fn with_injected_failure(mut self) -> Self {
        self.inject_failure = true;
        self
    }

    /// Check the construction invariants. Needed after deserializing, which bypasses the
    /// constructors.
    pub fn validate(&self) -> Result<(), WorkloadError> {
        if self.name.trim().is_empty() {
            return Err(WorkloadError::EmptyName);
        }

        match self.kind {
            WorkloadKind::Wait { duration } if duration.is_zero() => {
                Err(WorkloadError::ZeroDuration {
                    name: self.name.clone(),
                })
            }
            WorkloadKind::Compute { iterations: 0 } => Err(WorkloadError::ZeroIterations {
                name: self.name.clone(),
            }),
            _ => Ok(()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &WorkloadKind {
        &self.kind
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Name with the label in front, when there is one.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{label} {}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn injects_failure(&self) -> bool {
        self.inject_failure
    }

    pub fn is_wait(&self) -> bool {
        matches!(self.kind, WorkloadKind::Wait { .. })
    }

    pub fn is_compute(&self) -> bool {
        matches!(self.kind, WorkloadKind::Compute { .. })
    }

    /// The duration a wait workload is expected to take. Compute workloads have no nominal
    /// duration, it depends on the host.
    pub fn nominal_duration(&self) -> Option<Duration> {
        match self.kind {
            WorkloadKind::Wait { duration } => Some(duration),
            WorkloadKind::Compute { .. } => None,
        }
    }
}
