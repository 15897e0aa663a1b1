use exec_harness_core::prelude::ShutdownHandle;
use tokio::runtime::Runtime;
use tokio::signal;

/// Fire `handle` when the user presses Ctrl-C.
///
/// The listener runs on `runtime` and lives as long as it does.
pub(crate) fn start_shutdown_listener(runtime: &Runtime, handle: &ShutdownHandle) {
    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("Received shutdown signal, stopping the current run...");
                listener_handle.shutdown();
            }
            Err(e) => log::error!(
                "Failed to listen for Ctrl-C, runs can only stop on their deadline: {e}"
            ),
        }
    });
}
