mod cli;
mod context;
mod definition;
mod event_loop;
mod init;
mod ipc;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod strategy;
mod types;
mod worker;
mod worker_binary;

pub mod prelude {
    pub use crate::cli::{ExecHarnessCli, StrategyList};
    pub use crate::context::{RunConfig, DEFAULT_PROCESS_TIMEOUT, DEFAULT_TOLERANCE};
    pub use crate::definition::{WorkloadSet, WorkloadSetBuilder, PRESETS};
    pub use crate::event_loop::{EventLoop, JoinHandle, LoopHandle, LoopOutcome, Sleep, TaskId};
    pub use crate::init::init;
    pub use crate::ipc::{
        read_frame, write_frame, FrameError, WorkerCommand, WorkerMessage, MAX_FRAME_SIZE,
    };
    pub use crate::run::{run, run_comparison, ComparisonRuns};
    pub use crate::strategy::{
        available_cores, runner_for, wait_cooperatively, CooperativeConcurrentRunner,
        CooperativeSequentialRunner, MultiProcessRunner, SequentialRunner, StrategyRunner,
        ThreadedRunner, WORKER_FLAG,
    };
    pub use crate::types::HarnessResult;
    pub use crate::worker::{serve, serve_stdio, WorkerExit, INJECTED_FAILURE_EXIT_CODE};
    pub use crate::worker_binary::{worker_path, WORKER_PATH_ENV};
}
