use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::shutdown::ShutdownSignalError;

/// A workload description that breaks the construction invariants.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkloadError {
    #[error("workload name must not be empty")]
    EmptyName,
    #[error("wait workload '{name}' must have a positive duration")]
    ZeroDuration { name: String },
    #[error("wait workload '{name}' has an invalid duration of {secs} seconds")]
    InvalidDuration { name: String, secs: f64 },
    #[error("compute workload '{name}' must have a positive iteration count")]
    ZeroIterations { name: String },
    #[error("duplicate workload name '{name}'")]
    DuplicateName { name: String },
}

/// Failure of a single execution unit.
///
/// In multi-unit strategies these are collected per workload and never abort the siblings.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("failed to spawn execution unit for '{workload}': {source}")]
    SpawnFailed {
        workload: String,
        #[source]
        source: std::io::Error,
    },

    #[error("execution unit for '{workload}' crashed: {message}")]
    Crashed { workload: String, message: String },

    #[error("protocol error talking to the worker for '{workload}': {message}")]
    Protocol { workload: String, message: String },

    #[error("workload '{workload}' failed deliberately")]
    Injected { workload: String },

    #[error("workload '{workload}' was cancelled")]
    Cancelled {
        workload: String,
        #[source]
        source: ShutdownSignalError,
    },

    #[error("workload '{workload}' did not report back within {timeout:?}")]
    TimedOut { workload: String, timeout: Duration },

    #[error(
        "cooperative scheduling needs a suspension point but these workloads are compute-bound: {}",
        .workloads.join(", ")
    )]
    NoSuspensionPoint { workloads: Vec<String> },

    #[error("event loop stalled with {pending} pending task(s) and no timer to wake them")]
    Stalled { pending: usize },
}

impl ExecutionError {
    pub fn cancelled(workload: &str) -> Self {
        Self::Cancelled {
            workload: workload.to_string(),
            source: ShutdownSignalError::default(),
        }
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::SpawnFailed { .. } => FailureKind::SpawnFailed,
            Self::Crashed { .. } | Self::Protocol { .. } => FailureKind::Crashed,
            Self::Injected { .. } => FailureKind::Injected,
            Self::Cancelled { .. } | Self::Stalled { .. } => FailureKind::Cancelled,
            Self::TimedOut { .. } => FailureKind::TimedOut,
            Self::NoSuspensionPoint { .. } => FailureKind::Unsupported,
        }
    }
}

/// Coarse classification of an [ExecutionError], kept with the run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    SpawnFailed,
    Crashed,
    Injected,
    Cancelled,
    TimedOut,
    Unsupported,
}

impl FailureKind {
    /// Failures caused by the run being stopped rather than by the unit itself.
    pub fn is_interruption(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut)
    }
}
