use crate::report::ReportCollector;
use exec_harness_summary_model::{append_run_summary, RunSummary};
use std::path::PathBuf;

/// Appends each run summary to a JSON Lines file as soon as it is added, so that a crash later
/// in the comparison does not lose the runs that already finished.
pub struct JsonlReporter {
    path: PathBuf,
}

impl JsonlReporter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ReportCollector for JsonlReporter {
    fn add_run(&mut self, run: &RunSummary) {
        if let Err(e) = append_run_summary(run, &self.path) {
            log::error!(
                "Failed to append run summary for {} to {}: {e:?}",
                run.strategy,
                self.path.display()
            );
        }
    }

    fn finalize(&self) {
        log::info!("Run summaries written to {}", self.path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_harness_summary_model::{load_summary_runs, Strategy};

    #[test]
    fn appends_each_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runs.jsonl");
        let mut reporter = JsonlReporter::new(path.clone());

        for strategy in [Strategy::Sequential, Strategy::Threaded] {
            let run = RunSummary::new(
                format!("run-{strategy}"),
                strategy,
                0,
                Vec::new(),
                2,
                "test".to_string(),
            );
            reporter.add_run(&run);
        }

        let loaded = load_summary_runs(&path).unwrap();
        assert_eq!(2, loaded.len());
        assert_eq!(Strategy::Threaded, loaded[1].strategy);
    }
}
