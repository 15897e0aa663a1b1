//! The worker side of the multi-process strategy.
//!
//! A worker is the harness binary started with `--worker`. It reads one [WorkerCommand] from
//! stdin, says it is ready, runs the workload and reports the outcome on stdout. Anything else the
//! worker wants to say goes to stderr through the logger, stdout carries frames only.

use std::io::{BufReader, BufWriter, Read, Write};

use anyhow::Context;
use exec_harness_core::prelude::{execute_blocking, ShutdownHandle};

use crate::ipc::{read_frame, write_frame, WorkerCommand, WorkerMessage};
use crate::types::HarnessResult;

/// Exit code of a worker whose workload was set up to fail. It leaves without reporting a result,
/// the same way a crashing worker would.
pub const INJECTED_FAILURE_EXIT_CODE: i32 = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    Reported,
    InjectedFailure,
}

/// Serve one command from `reader`, writing messages to `writer`.
pub fn serve<R: Read, W: Write>(reader: R, writer: W) -> HarnessResult<WorkerExit> {
    let mut reader = BufReader::new(reader);
    let mut writer = BufWriter::new(writer);

    let command: WorkerCommand =
        read_frame(&mut reader).context("Failed to read command from supervisor")?;
    let WorkerCommand::Run { workload } = command;
    workload
        .validate()
        .context("Supervisor sent an invalid workload")?;

    let pid = std::process::id();
    write_frame(&mut writer, &WorkerMessage::Ready { pid })
        .context("Failed to report readiness")?;
    log::debug!("Worker {pid} running '{}'", workload.name());

    if workload.injects_failure() {
        log::warn!("Worker {pid} failing deliberately for '{}'", workload.name());
        return Ok(WorkerExit::InjectedFailure);
    }

    // The supervisor kills the process when it gives up, so the worker needs no deadline.
    let listener = ShutdownHandle::new().new_listener();
    let message = match execute_blocking(&workload, &listener, None) {
        Ok(value) => WorkerMessage::Done { value, pid },
        Err(e) => WorkerMessage::Failed {
            message: e.to_string(),
        },
    };
    write_frame(&mut writer, &message).context("Failed to report result")?;

    Ok(WorkerExit::Reported)
}

/// Serve the command on the process's own stdin and stdout.
pub fn serve_stdio() -> HarnessResult<WorkerExit> {
    serve(std::io::stdin().lock(), std::io::stdout().lock())
}
