use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The execution strategies the harness knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One workload after another on the calling thread.
    Sequential,
    /// Suspension-capable calls, each awaited to completion before the next starts.
    CooperativeSequential,
    /// All wait workloads scheduled together on a single-threaded event loop.
    CooperativeConcurrent,
    /// One OS thread per workload.
    Threaded,
    /// One worker process per workload.
    MultiProcess,
}

impl Strategy {
    pub const ALL: [Strategy; 5] = [
        Strategy::Sequential,
        Strategy::CooperativeSequential,
        Strategy::CooperativeConcurrent,
        Strategy::Threaded,
        Strategy::MultiProcess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Sequential => "sequential",
            Strategy::CooperativeSequential => "cooperative-sequential",
            Strategy::CooperativeConcurrent => "cooperative-concurrent",
            Strategy::Threaded => "threaded",
            Strategy::MultiProcess => "multi-process",
        }
    }

    /// Strategies that run a single workload at a time, whose elapsed time is the sum of the
    /// individual durations.
    pub fn is_sequential(&self) -> bool {
        matches!(
            self,
            Strategy::Sequential | Strategy::CooperativeSequential
        )
    }

    /// Only the multi-process strategy pays a startup cost per execution unit.
    pub fn has_startup_overhead(&self) -> bool {
        matches!(self, Strategy::MultiProcess)
    }
}

impl Display for Strategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "sequential" | "seq" => Ok(Strategy::Sequential),
            "cooperative-sequential" | "async-sequential" => Ok(Strategy::CooperativeSequential),
            "cooperative-concurrent" | "async" | "event-loop" => {
                Ok(Strategy::CooperativeConcurrent)
            }
            "threaded" | "threads" => Ok(Strategy::Threaded),
            "multi-process" | "process" | "processes" => Ok(Strategy::MultiProcess),
            other => Err(anyhow::anyhow!(
                "Unknown strategy '{other}', expected one of: {}",
                Strategy::ALL.map(|s| s.as_str()).join(", ")
            )),
        }
    }
}
