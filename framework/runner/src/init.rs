use crate::cli::ExecHarnessCli;
use clap::Parser;

/// Initialise the CLI and logging for the harness.
pub fn init() -> ExecHarnessCli {
    env_logger::init();

    ExecHarnessCli::parse()
}
