use std::fmt::{Display, Formatter};
use std::time::Duration;

use exec_harness_core::prelude::{ExecutionError, FailureKind};
use exec_harness_core::serde_secs;
use serde::{Deserialize, Serialize};

/// The execution unit that ran a workload. Only used to show which vehicle did the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum ExecutorIdentity {
    /// The thread that called the runner.
    Caller { thread: String },
    /// A task on the single-threaded event loop.
    EventLoopTask { task_id: u64 },
    /// A dedicated OS thread.
    Thread { name: String, id: String },
    /// A worker process.
    Process { pid: u32 },
}

impl ExecutorIdentity {
    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        ExecutorIdentity::Caller {
            thread: thread
                .name()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{:?}", thread.id())),
        }
    }
}

impl Display for ExecutorIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutorIdentity::Caller { thread } => write!(f, "caller ({thread})"),
            ExecutorIdentity::EventLoopTask { task_id } => write!(f, "task #{task_id}"),
            ExecutorIdentity::Thread { name, id } => write!(f, "thread {name} ({id})"),
            ExecutorIdentity::Process { pid } => write!(f, "PID {pid}"),
        }
    }
}

/// The outcome of one workload that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub workload_name: String,
    /// Offset from the start of the run, on a monotonic clock.
    #[serde(with = "serde_secs")]
    pub start: Duration,
    /// Offset from the start of the run, on a monotonic clock.
    #[serde(with = "serde_secs")]
    pub end: Duration,
    pub value: u64,
    pub executor: ExecutorIdentity,
    /// Time between asking for the execution unit and the unit being ready to work.
    ///
    /// Only measured for worker processes, where it is not amortised over a short run.
    #[serde(
        default,
        with = "serde_secs::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub startup_overhead: Option<Duration>,
}

impl TaskResult {
    pub fn new(
        workload_name: impl Into<String>,
        start: Duration,
        end: Duration,
        value: u64,
        executor: ExecutorIdentity,
    ) -> Self {
        Self {
            workload_name: workload_name.into(),
            start,
            end: end.max(start),
            value,
            executor,
            startup_overhead: None,
        }
    }

    pub fn with_startup_overhead(mut self, overhead: Duration) -> Self {
        self.startup_overhead = Some(overhead);
        self
    }

    pub fn duration(&self) -> Duration {
        self.end.saturating_sub(self.start)
    }
}

/// A workload that did not produce a result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFailure {
    pub workload_name: String,
    pub kind: FailureKind,
    pub error: String,
}

impl TaskFailure {
    pub fn from_error(workload_name: impl Into<String>, error: &ExecutionError) -> Self {
        Self {
            workload_name: workload_name.into(),
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}
