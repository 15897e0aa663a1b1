use exec_harness_runner::prelude::*;

fn main() -> HarnessResult<()> {
    let cli = init();

    if cli.worker {
        return match serve_stdio()? {
            WorkerExit::Reported => Ok(()),
            WorkerExit::InjectedFailure => std::process::exit(INJECTED_FAILURE_EXIT_CODE),
        };
    }

    let report = run(cli)?;

    let violations = report.violations().count();
    if violations > 0 {
        log::warn!("{violations} timing law violation(s) reported, see the comparison above");
    }

    Ok(())
}
