use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct StopState {
    stopped: Mutex<bool>,
    condvar: Condvar,
}

/// The stop signal for a single run.
///
/// Every execution unit of a run holds a listener created from the same handle. The signal fires
/// either when [ShutdownHandle::shutdown] is called (Ctrl-C, or the driver finishing) or when the
/// optional run deadline passes, whichever comes first.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    state: Arc<StopState>,
    deadline: Option<Instant>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            state: Arc::new(StopState::default()),
            deadline: None,
        }
    }

    /// Create a handle which fires on its own once `deadline` has elapsed from now.
    pub fn with_deadline(deadline: Option<Duration>) -> Self {
        Self {
            deadline: deadline.map(|d| Instant::now() + d),
            ..Self::new()
        }
    }

    /// A handle for one run inside a longer session. It fires when this handle fires, or when
    /// `deadline` has elapsed from now, whichever comes first.
    pub fn scoped(&self, deadline: Option<Duration>) -> Self {
        let scoped = deadline.map(|d| Instant::now() + d);
        Self {
            state: self.state.clone(),
            deadline: match (self.deadline, scoped) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn shutdown(&self) {
        let mut stopped = self.state.stopped.lock();
        if !*stopped {
            log::trace!("Shutdown signal raised");
        }
        *stopped = true;
        self.state.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        *self.state.stopped.lock() || deadline_passed(self.deadline)
    }

    pub fn new_listener(&self) -> DelegatedShutdownListener {
        DelegatedShutdownListener {
            state: self.state.clone(),
            deadline: self.deadline,
        }
    }
}

#[derive(Clone, Debug)]
pub struct DelegatedShutdownListener {
    state: Arc<StopState>,
    deadline: Option<Instant>,
}

impl DelegatedShutdownListener {
    /// Point in time check if the shutdown signal has fired. If this returns true then work should
    /// be stopped so that the run can report what it has.
    pub fn should_shutdown(&self) -> bool {
        *self.state.stopped.lock() || deadline_passed(self.deadline)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Block the calling thread for `duration` without consuming CPU.
    ///
    /// Returns `true` if the full duration elapsed and `false` if the wait was cut short by the
    /// shutdown signal or by the run deadline.
    pub fn sleep(&self, duration: Duration) -> bool {
        let wake_at = Instant::now() + duration;
        let until = match self.deadline {
            Some(deadline) if deadline < wake_at => deadline,
            _ => wake_at,
        };

        let mut stopped = self.state.stopped.lock();
        while !*stopped && Instant::now() < until {
            if self
                .state
                .condvar
                .wait_until(&mut stopped, until)
                .timed_out()
            {
                break;
            }
        }

        !*stopped && until == wake_at
    }
}

fn deadline_passed(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

#[derive(derive_more::Error, derive_more::Display, Debug, Clone, PartialEq)]
pub struct ShutdownSignalError {
    msg: String,
}

impl Default for ShutdownSignalError {
    fn default() -> Self {
        Self {
            msg: "Execution cancelled by shutdown signal".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sleep_runs_to_completion_without_signal() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();

        let start = Instant::now();
        assert!(listener.sleep(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert!(!listener.should_shutdown());
    }

    #[test]
    fn shutdown_interrupts_sleeping_thread() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();

        let sleeper = std::thread::spawn(move || {
            let start = Instant::now();
            let completed = listener.sleep(Duration::from_secs(10));
            (completed, start.elapsed())
        });

        std::thread::sleep(Duration::from_millis(50));
        handle.shutdown();

        let (completed, elapsed) = sleeper.join().unwrap();
        assert!(!completed);
        assert!(elapsed < Duration::from_secs(5));
    }

    #[test]
    fn deadline_cuts_sleep_short() {
        let handle = ShutdownHandle::with_deadline(Some(Duration::from_millis(50)));
        let listener = handle.new_listener();

        let start = Instant::now();
        assert!(!listener.sleep(Duration::from_secs(2)));
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(listener.should_shutdown());
        assert!(handle.is_shutdown());
    }

    #[test]
    fn scoped_handle_keeps_parent_signal_and_adds_deadline() {
        let session = ShutdownHandle::new();
        let run = session.scoped(Some(Duration::from_secs(60)));
        assert!(run.deadline().is_some());
        assert!(!run.is_shutdown());

        session.shutdown();
        assert!(run.new_listener().should_shutdown());
    }

    #[test]
    fn scoped_handle_takes_earliest_deadline() {
        let session = ShutdownHandle::with_deadline(Some(Duration::from_millis(10)));
        let run = session.scoped(Some(Duration::from_secs(60)));
        assert_eq!(session.deadline(), run.deadline());
        assert_eq!(session.deadline(), session.scoped(None).deadline());
    }

    #[test]
    fn listener_created_after_shutdown_sees_it() {
        let handle = ShutdownHandle::new();
        handle.shutdown();
        assert!(handle.new_listener().should_shutdown());
    }
}
