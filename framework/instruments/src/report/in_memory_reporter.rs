pub(crate) mod intervals_table;

use crate::report::in_memory_reporter::intervals_table::interval_rows;
use crate::report::ReportCollector;
use exec_harness_summary_model::RunSummary;
use tabled::settings::Style;
use tabled::Table;

/// Keeps every run in memory and prints the per-workload intervals of each one at the end.
///
/// Reading the timeline column top to bottom shows which workloads overlapped.
#[derive(Default)]
pub struct InMemoryReporter {
    runs: Vec<RunSummary>,
}

impl InMemoryReporter {
    pub fn new() -> Self {
        Self { runs: Vec::new() }
    }

    pub(crate) fn print_intervals(&self) {
        for run in &self.runs {
            println!(
                "\n{} [{:?}] wall clock {:.3}s",
                run.strategy,
                run.status,
                run.wall_clock_elapsed.as_secs_f64()
            );

            let rows = interval_rows(run);
            if rows.is_empty() {
                println!("  no workload finished");
            } else {
                let mut table = Table::new(rows);
                table.with(Style::modern());
                println!("{table}");
            }

            for failure in &run.failures {
                println!("  ✗ {}: {}", failure.workload_name, failure.error);
            }
        }
    }
}

impl ReportCollector for InMemoryReporter {
    fn add_run(&mut self, run: &RunSummary) {
        self.runs.push(run.clone());
    }

    fn finalize(&self) {
        self.print_intervals();
    }
}
