use std::io::{self, BufReader};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, Sender};
use exec_harness_core::prelude::{ExecutionError, Workload};
use exec_harness_instruments::TimingRecorder;
use exec_harness_summary_model::{ExecutorIdentity, RunSummary, Strategy, TaskResult};

use crate::context::RunConfig;
use crate::ipc::{read_frame, write_frame, FrameError, WorkerCommand, WorkerMessage};
use crate::strategy::{RunCollector, StrategyRunner};
use crate::worker::INJECTED_FAILURE_EXIT_CODE;
use crate::worker_binary::worker_path;

/// How often the supervisor looks at the stop signal while no worker has anything to say.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Flag that switches the harness binary into worker mode.
pub const WORKER_FLAG: &str = "--worker";

/// Runs every workload in its own worker process, all started together.
///
/// The supervisor never aborts the batch for one worker: spawn failures, crashes and protocol
/// errors are recorded against that workload and the others carry on. Workers still running when
/// the process timeout or the run deadline is reached are killed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MultiProcessRunner;

#[derive(Debug)]
enum WorkerEvent {
    Message(WorkerMessage),
    Closed,
    Broken(String),
}

struct Worker {
    child: Child,
    reader: Option<JoinHandle<()>>,
    spawned_at: Instant,
    ready_at: Option<Instant>,
}

impl StrategyRunner for MultiProcessRunner {
    fn strategy(&self) -> Strategy {
        Strategy::MultiProcess
    }

    fn execute(
        &self,
        workloads: &[Workload],
        config: &RunConfig,
    ) -> Result<RunSummary, ExecutionError> {
        let run = config.start_run();
        let mut collector = RunCollector::start(self.strategy(), workloads);
        let recorder = TimingRecorder::new(workloads.len());

        let program = match worker_path(config.worker_program.as_deref()) {
            Ok(program) => Some(program),
            Err(e) => {
                log::error!("No worker program available: {e:?}");
                for (slot, workload) in workloads.iter().enumerate() {
                    collector.record(
                        slot,
                        Err(ExecutionError::SpawnFailed {
                            workload: workload.name().to_string(),
                            source: io::Error::new(io::ErrorKind::NotFound, format!("{e:#}")),
                        }),
                    );
                }
                None
            }
        };

        let (sender, receiver) = crossbeam_channel::unbounded();
        let wall_start = Instant::now();
        let mut workers = Vec::with_capacity(workloads.len());
        for (slot, workload) in workloads.iter().enumerate() {
            let Some(program) = program.as_deref() else {
                workers.push(None);
                continue;
            };

            match spawn_worker(program, slot, workload, sender.clone()) {
                Ok(worker) => {
                    log::debug!(
                        "Spawned worker PID {} for '{}'",
                        worker.child.id(),
                        workload.name()
                    );
                    workers.push(Some(worker));
                }
                Err(source) => {
                    collector.record(
                        slot,
                        Err(ExecutionError::SpawnFailed {
                            workload: workload.name().to_string(),
                            source,
                        }),
                    );
                    workers.push(None);
                }
            }
        }
        drop(sender);

        let ceiling = wall_start + config.process_timeout;
        let mut interrupted = false;
        let mut timed_out = false;
        while workers
            .iter()
            .enumerate()
            .any(|(slot, w)| w.is_some() && !collector.has_outcome(slot))
        {
            if run.should_stop() {
                interrupted = true;
                break;
            }
            let now = Instant::now();
            if now >= ceiling {
                timed_out = true;
                break;
            }

            match receiver.recv_timeout((ceiling - now).min(POLL_INTERVAL)) {
                Ok((slot, event)) => {
                    let received_at = Instant::now();
                    let workload = &workloads[slot];
                    let Some(worker) = workers[slot].as_mut() else {
                        continue;
                    };
                    if collector.has_outcome(slot) {
                        continue;
                    }

                    match event {
                        WorkerEvent::Message(WorkerMessage::Ready { pid }) => {
                            log::trace!("Worker PID {pid} ready for '{}'", workload.name());
                            worker.ready_at = Some(received_at);
                        }
                        WorkerEvent::Message(WorkerMessage::Done { value, pid }) => {
                            let start = worker.ready_at.unwrap_or(worker.spawned_at);
                            let interval =
                                recorder.store(slot, workload.name(), start, received_at);
                            collector.record(
                                slot,
                                Ok(TaskResult::new(
                                    workload.name(),
                                    interval.start,
                                    interval.end,
                                    value,
                                    ExecutorIdentity::Process { pid },
                                )
                                .with_startup_overhead(
                                    start.saturating_duration_since(worker.spawned_at),
                                )),
                            );
                        }
                        WorkerEvent::Message(WorkerMessage::Failed { message }) => {
                            collector.record(
                                slot,
                                Err(ExecutionError::Crashed {
                                    workload: workload.name().to_string(),
                                    message,
                                }),
                            );
                        }
                        WorkerEvent::Closed => {
                            collector.record(slot, Err(exit_error(workload, &mut worker.child)));
                        }
                        WorkerEvent::Broken(message) => {
                            kill(worker, workload);
                            collector.record(
                                slot,
                                Err(ExecutionError::Protocol {
                                    workload: workload.name().to_string(),
                                    message,
                                }),
                            );
                        }
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        for (slot, worker) in workers.iter_mut().enumerate() {
            let Some(worker) = worker.as_mut() else {
                continue;
            };
            let workload = &workloads[slot];

            if !collector.has_outcome(slot) {
                kill(worker, workload);
                let error = if timed_out {
                    ExecutionError::TimedOut {
                        workload: workload.name().to_string(),
                        timeout: config.process_timeout,
                    }
                } else {
                    ExecutionError::cancelled(workload.name())
                };
                collector.record(slot, Err(error));
            }

            if let Err(e) = worker.child.wait() {
                log::warn!("Failed to reap worker for '{}': {e}", workload.name());
            }
            if let Some(reader) = worker.reader.take() {
                if reader.join().is_err() {
                    log::warn!("Reader thread for '{}' panicked", workload.name());
                }
            }
        }
        let wall_clock_elapsed = wall_start.elapsed();

        let mut summary = collector.finish(wall_clock_elapsed, interrupted || timed_out);
        summary.startup_overhead = summary
            .results
            .iter()
            .filter_map(|r| r.startup_overhead)
            .max();
        Ok(summary)
    }
}

fn spawn_worker(
    program: &Path,
    slot: usize,
    workload: &Workload,
    sender: Sender<(usize, WorkerEvent)>,
) -> io::Result<Worker> {
    let spawned_at = Instant::now();
    let mut child = Command::new(program)
        .arg(WORKER_FLAG)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .spawn()?;

    let handed_over = child
        .stdin
        .take()
        .ok_or_else(|| io::Error::other("worker stdin was not captured"))
        .and_then(|mut stdin| {
            write_frame(
                &mut stdin,
                &WorkerCommand::Run {
                    workload: workload.clone(),
                },
            )
            .map_err(io::Error::other)
        })
        .and_then(|()| {
            child
                .stdout
                .take()
                .ok_or_else(|| io::Error::other("worker stdout was not captured"))
        })
        .and_then(|stdout| spawn_reader(slot, stdout, sender));

    match handed_over {
        Ok(reader) => Ok(Worker {
            child,
            reader: Some(reader),
            spawned_at,
            ready_at: None,
        }),
        Err(e) => {
            let _ = child.kill();
            let _ = child.wait();
            Err(e)
        }
    }
}

/// Forward every frame a worker writes to the supervisor, ending with [WorkerEvent::Closed] or
/// [WorkerEvent::Broken].
fn spawn_reader(
    slot: usize,
    stdout: ChildStdout,
    sender: Sender<(usize, WorkerEvent)>,
) -> io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("worker-reader-{slot}"))
        .spawn(move || {
            let mut reader = BufReader::new(stdout);
            loop {
                let event = match read_frame::<_, WorkerMessage>(&mut reader) {
                    Ok(message) => WorkerEvent::Message(message),
                    Err(FrameError::EndOfStream) => WorkerEvent::Closed,
                    Err(e) => WorkerEvent::Broken(e.to_string()),
                };
                let last = !matches!(event, WorkerEvent::Message(_));
                if sender.send((slot, event)).is_err() || last {
                    break;
                }
            }
        })
}

/// The error for a worker that closed its output without reporting a result.
fn exit_error(workload: &Workload, child: &mut Child) -> ExecutionError {
    match child.wait() {
        Ok(status) if status.code() == Some(INJECTED_FAILURE_EXIT_CODE) => {
            ExecutionError::Injected {
                workload: workload.name().to_string(),
            }
        }
        Ok(status) => ExecutionError::Crashed {
            workload: workload.name().to_string(),
            message: format!("worker exited with {status} before reporting a result"),
        },
        Err(e) => ExecutionError::Crashed {
            workload: workload.name().to_string(),
            message: format!("worker closed its output and could not be waited on: {e}"),
        },
    }
}

fn kill(worker: &mut Worker, workload: &Workload) {
    if let Ok(None) = worker.child.try_wait() {
        log::warn!(
            "Killing worker PID {} for '{}'",
            worker.child.id(),
            workload.name()
        );
        if let Err(e) = worker.child.kill() {
            log::error!("Failed to kill worker for '{}': {e}", workload.name());
        }
    }
}
