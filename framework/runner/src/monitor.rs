use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use anyhow::Context;
use exec_harness_core::prelude::DelegatedShutdownListener;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

/// Share of the host's CPU, in percent, that other processes may use before timings are suspect.
const BUSY_HOST_THRESHOLD: f32 = 25.0;

/// Watches the host while strategies run.
///
/// Other processes competing for the CPU make every strategy look slower and can break timing laws
/// that would otherwise hold. This won't stop a run, it logs a warning and remembers that the host
/// was busy so the comparison can say so.
///
/// The CPU usage is sampled every [sysinfo::MINIMUM_CPU_UPDATE_INTERVAL]. Usage by the harness
/// itself is subtracted, since a compute-heavy strategy is expected to keep cores busy.
pub(crate) struct HostMonitor {
    busy: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl HostMonitor {
    /// Whether other processes used more than [BUSY_HOST_THRESHOLD] percent of the CPU at any
    /// point.
    pub(crate) fn host_was_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    /// Wait for the monitor to notice the shutdown signal and exit.
    pub(crate) fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("Host monitor thread panicked");
            }
        }
    }
}

pub(crate) fn start_monitor(
    shutdown_listener: DelegatedShutdownListener,
) -> anyhow::Result<HostMonitor> {
    let busy = Arc::new(AtomicBool::new(false));
    let thread_busy = busy.clone();

    let thread = std::thread::Builder::new()
        .name("monitor".to_string())
        .spawn(move || {
            let this_process_pid = Pid::from_u32(std::process::id());
            let mut sys = System::new();

            sys.refresh_cpu_all();
            let cpu_count = sys.cpus().len().max(1);

            // The first sample has nothing to compare against.
            while shutdown_listener.sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL) {
                sys.refresh_cpu_usage();
                sys.refresh_processes_specifics(
                    ProcessesToUpdate::Some(&[this_process_pid]),
                    true,
                    ProcessRefreshKind::nothing().with_cpu(),
                );

                let Some(process) = sys.process(this_process_pid) else {
                    log::debug!("Host monitor cannot see its own process, stopping");
                    break;
                };

                let own_usage = process.cpu_usage() / cpu_count as f32;
                let other_usage = (sys.global_cpu_usage() - own_usage).max(0.0);
                if other_usage > BUSY_HOST_THRESHOLD {
                    if !thread_busy.swap(true, Ordering::Relaxed) {
                        log::warn!(
                            "High CPU usage by other processes detected: {:.2}% of {} cores. Timings may be inflated",
                            other_usage,
                            cpu_count
                        );
                    }
                } else {
                    log::trace!("Host CPU usage by other processes: {other_usage:.2}%");
                }
            }
        })
        .context("Failed to start monitor thread")?;

    Ok(HostMonitor {
        busy,
        thread: Some(thread),
    })
}
