use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ExecutionError;
use crate::shutdown::DelegatedShutdownListener;
use crate::workload::{Workload, WorkloadKind};

/// Number of compute iterations between two checks of the stop signal. With global contention
/// this is also how long a thread holds the interpreter lock before giving others a chance.
pub const COMPUTE_SLICE: u64 = 1 << 16;

/// How CPU-bound threads that share memory compete for the processor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Contention {
    /// Model a global interpreter lock: only one thread can compute at a time, so CPU-bound
    /// threads serialize onto one effective core.
    #[default]
    Global,
    /// No global lock. Threads run truly in parallel and compute workloads can speed up.
    None,
}

/// The process-wide lock compute slices take under [Contention::Global].
///
/// Wait workloads never take it, which is why threads still overlap their waits.
#[derive(Debug, Clone, Default)]
pub struct InterpreterLock(Arc<parking_lot::Mutex<()>>);

impl InterpreterLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_contention(contention: Contention) -> Option<Self> {
        match contention {
            Contention::Global => Some(Self::new()),
            Contention::None => None,
        }
    }

    fn hold(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.0.lock()
    }
}

/// The value a wait workload hands back, derived from its name.
pub fn derive_value(name: &str) -> u64 {
    name.bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(u64::from(b)))
}

/// Block the calling execution unit for `duration` without using the CPU.
pub fn run_wait(
    name: &str,
    duration: Duration,
    listener: &DelegatedShutdownListener,
) -> Result<u64, ExecutionError> {
    if listener.sleep(duration) {
        Ok(derive_value(name))
    } else {
        Err(ExecutionError::cancelled(name))
    }
}

/// Sum `0..iterations`, the way `sum(range(n))` does, keeping the CPU busy the whole time.
///
/// The stop signal is checked once per [COMPUTE_SLICE]. When an [InterpreterLock] is supplied,
/// each slice runs while holding it.
pub fn run_compute(
    name: &str,
    iterations: u64,
    listener: &DelegatedShutdownListener,
    lock: Option<&InterpreterLock>,
) -> Result<u64, ExecutionError> {
    let mut sum = 0u64;
    let mut i = 0u64;
    while i < iterations {
        if listener.should_shutdown() {
            return Err(ExecutionError::cancelled(name));
        }

        let slice_end = iterations.min(i.saturating_add(COMPUTE_SLICE));
        let _guard = lock.map(InterpreterLock::hold);
        while i < slice_end {
            sum = sum.wrapping_add(black_box(i));
            i += 1;
        }
    }

    Ok(sum)
}

/// Execute a workload on the calling thread, blocking until it finishes.
pub fn execute_blocking(
    workload: &Workload,
    listener: &DelegatedShutdownListener,
    lock: Option<&InterpreterLock>,
) -> Result<u64, ExecutionError> {
    if workload.injects_failure() {
        return Err(ExecutionError::Injected {
            workload: workload.name().to_string(),
        });
    }

    match *workload.kind() {
        WorkloadKind::Wait { duration } => run_wait(workload.name(), duration, listener),
        WorkloadKind::Compute { iterations } => {
            run_compute(workload.name(), iterations, listener, lock)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::shutdown::ShutdownHandle;

    #[test]
    fn compute_matches_closed_form() {
        let listener = ShutdownHandle::new().new_listener();
        let n = 3 * COMPUTE_SLICE + 17;
        assert_eq!(
            Ok(n * (n - 1) / 2),
            run_compute("sum", n, &listener, None).map_err(|e| e.to_string())
        );
    }

    #[test]
    fn compute_under_lock_gives_same_value() {
        let listener = ShutdownHandle::new().new_listener();
        let lock = InterpreterLock::new();
        let value = run_compute("sum", 1000, &listener, Some(&lock)).unwrap();
        assert_eq!(499_500, value);
    }

    #[test]
    fn compute_stops_when_signalled() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        let result = run_compute("sum", u64::MAX, &handle.new_listener(), None);
        assert!(matches!(result, Err(ExecutionError::Cancelled { .. })));
    }

    #[test]
    fn wait_returns_value_derived_from_name() {
        let listener = ShutdownHandle::new().new_listener();
        let start = Instant::now();
        let value = run_wait("toast", Duration::from_millis(20), &listener).unwrap();
        assert!(start.elapsed() >= Duration::from_millis(20));
        assert_eq!(derive_value("toast"), value);
        assert_ne!(derive_value("toast"), derive_value("coffee"));
    }

    #[test]
    fn injected_failure_runs_nothing() {
        let listener = ShutdownHandle::new().new_listener();
        let workload = Workload::wait("toast", Duration::from_secs(5))
            .unwrap()
            .with_injected_failure();

        let start = Instant::now();
        let result = execute_blocking(&workload, &listener, None);
        assert!(matches!(result, Err(ExecutionError::Injected { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn contention_defaults_to_global() {
        assert_eq!(Contention::Global, Contention::default());
        assert!(InterpreterLock::for_contention(Contention::Global).is_some());
        assert!(InterpreterLock::for_contention(Contention::None).is_none());
    }
}
