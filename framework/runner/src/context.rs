use std::path::PathBuf;
use std::time::Duration;

use exec_harness_core::prelude::{Contention, DelegatedShutdownListener, ShutdownHandle};

pub use exec_harness_summariser::DEFAULT_TOLERANCE;

/// Default ceiling on how long the multi-process supervisor waits for its workers.
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every strategy runner.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Overall deadline for one strategy run, measured from when the run starts.
    pub deadline: Option<Duration>,
    /// Contention model for the threaded runner.
    pub contention: Contention,
    /// How long the multi-process supervisor waits before killing outstanding workers.
    pub process_timeout: Duration,
    /// The program re-executed as a worker process. Resolved by
    /// [crate::worker_binary::worker_path] when not set.
    pub worker_program: Option<PathBuf>,
    pub tolerance: f64,
    shutdown_handle: ShutdownHandle,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            deadline: None,
            contention: Contention::default(),
            process_timeout: DEFAULT_PROCESS_TIMEOUT,
            worker_program: None,
            tolerance: DEFAULT_TOLERANCE,
            shutdown_handle: ShutdownHandle::new(),
        }
    }
}

impl RunConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_contention(mut self, contention: Contention) -> Self {
        self.contention = contention;
        self
    }

    pub fn with_process_timeout(mut self, process_timeout: Duration) -> Self {
        self.process_timeout = process_timeout;
        self
    }

    pub fn with_worker_program(mut self, worker_program: impl Into<PathBuf>) -> Self {
        self.worker_program = Some(worker_program.into());
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Use the session-wide stop signal, so that Ctrl-C reaches every run started with this
    /// config.
    pub fn with_shutdown_handle(mut self, shutdown_handle: ShutdownHandle) -> Self {
        self.shutdown_handle = shutdown_handle;
        self
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown_handle
    }

    /// Create the stop signal for a single run. The run deadline starts counting now.
    pub(crate) fn start_run(&self) -> RunContext {
        let handle = self.shutdown_handle.scoped(self.deadline);
        RunContext {
            listener: handle.new_listener(),
            handle,
        }
    }
}

/// The stop signal of one strategy run.
#[derive(Debug)]
pub(crate) struct RunContext {
    handle: ShutdownHandle,
    listener: DelegatedShutdownListener,
}

impl RunContext {
    pub(crate) fn listener(&self) -> &DelegatedShutdownListener {
        &self.listener
    }

    pub(crate) fn new_listener(&self) -> DelegatedShutdownListener {
        self.handle.new_listener()
    }

    pub(crate) fn should_stop(&self) -> bool {
        self.listener.should_shutdown()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = RunConfig::default();
        assert_eq!(None, config.deadline);
        assert_eq!(Contention::Global, config.contention);
        assert_eq!(Duration::from_secs(60), config.process_timeout);
        assert_eq!(0.2, config.tolerance);
        assert!(config.worker_program.is_none());
    }

    #[test]
    fn run_deadline_is_scoped_to_the_run() {
        let config = RunConfig::default().with_deadline(Some(Duration::from_millis(1)));
        let run = config.start_run();
        std::thread::sleep(Duration::from_millis(5));

        assert!(run.should_stop());
        assert!(!config.shutdown_handle().is_shutdown());
        assert!(!config.start_run().should_stop());
    }

    #[test]
    fn session_shutdown_stops_runs() {
        let config = RunConfig::default();
        let run = config.start_run();
        config.shutdown_handle().shutdown();
        assert!(run.should_stop());
        assert!(run.new_listener().should_shutdown());
    }
}
