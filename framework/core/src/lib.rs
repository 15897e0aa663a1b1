mod error;
mod shutdown;
mod work;
mod workload;

pub mod serde_secs;

pub mod prelude {
    pub use crate::error::{ExecutionError, FailureKind, WorkloadError};
    pub use crate::shutdown::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};
    pub use crate::work::{
        derive_value, execute_blocking, run_compute, run_wait, Contention, InterpreterLock,
        COMPUTE_SLICE,
    };
    pub use crate::workload::{Workload, WorkloadKind};
}
