mod in_memory_reporter;
mod jsonl_reporter;
mod summary_report;

use exec_harness_summary_model::RunSummary;
use parking_lot::Mutex;
use std::path::PathBuf;

pub use in_memory_reporter::intervals_table::{interval_rows, render_timeline, IntervalRow};
pub use in_memory_reporter::InMemoryReporter;
pub use jsonl_reporter::JsonlReporter;
pub use summary_report::runs_table::RunRow;
pub use summary_report::SummaryReportCollector;

pub trait ReportCollector {
    /// Record a finished strategy run.
    fn add_run(&mut self, run: &RunSummary);

    /// Called once after the last run has been added.
    fn finalize(&self);
}

/// Choose which collectors receive run summaries.
#[derive(Debug, Default, Clone)]
pub struct ReportConfig {
    in_memory: bool,
    summary: bool,
    jsonl_path: Option<PathBuf>,
}

impl ReportConfig {
    /// Print per-workload interval tables when the reporter is finalized.
    pub fn enable_in_memory(mut self) -> Self {
        self.in_memory = true;
        self
    }

    /// Print one row per strategy run when the reporter is finalized.
    pub fn enable_summary(mut self) -> Self {
        self.summary = true;
        self
    }

    /// Append every run summary to a JSON Lines file as it is added.
    pub fn enable_jsonl(mut self, path: PathBuf) -> Self {
        self.jsonl_path = Some(path);
        self
    }

    pub fn init(self) -> Reporter {
        let mut collectors: Vec<Box<dyn ReportCollector + Send>> = Vec::new();
        if self.in_memory {
            collectors.push(Box::new(InMemoryReporter::new()));
        }
        if self.summary {
            collectors.push(Box::new(SummaryReportCollector::new()));
        }
        if let Some(path) = self.jsonl_path {
            collectors.push(Box::new(JsonlReporter::new(path)));
        }

        Reporter {
            collectors: Mutex::new(collectors),
        }
    }
}

/// Fans run summaries out to the configured collectors. Safe to share between threads.
pub struct Reporter {
    collectors: Mutex<Vec<Box<dyn ReportCollector + Send>>>,
}

impl Reporter {
    pub fn add_run(&self, run: &RunSummary) {
        for collector in self.collectors.lock().iter_mut() {
            collector.add_run(run);
        }
    }

    pub fn finalize(&self) {
        for collector in self.collectors.lock().iter() {
            collector.finalize();
        }
    }

    pub fn collector_count(&self) -> usize {
        self.collectors.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_collectors() {
        assert_eq!(0, ReportConfig::default().init().collector_count());
    }

    #[test]
    fn each_enabled_collector_is_created() {
        let reporter = ReportConfig::default()
            .enable_in_memory()
            .enable_summary()
            .enable_jsonl(PathBuf::from("unused.jsonl"))
            .init();
        assert_eq!(3, reporter.collector_count());
    }
}
