pub(crate) mod runs_table;

use crate::report::summary_report::runs_table::RunRow;
use crate::report::ReportCollector;
use exec_harness_summary_model::RunSummary;
use tabled::settings::Style;
use tabled::Table;

/// Prints one row per strategy run: status, wall clock and how many distinct execution units
/// did the work.
#[derive(Default)]
pub struct SummaryReportCollector {
    rows: Vec<RunRow>,
}

impl SummaryReportCollector {
    pub fn new() -> Self {
        Self { rows: Vec::new() }
    }

    fn print_summary_of_runs(&self) {
        println!("\nSummary of runs");

        let mut table = Table::new(&self.rows);
        table.with(Style::modern());

        println!("{}", table);
    }
}

impl ReportCollector for SummaryReportCollector {
    fn add_run(&mut self, run: &RunSummary) {
        self.rows.push(RunRow::from(run));
    }

    fn finalize(&self) {
        self.print_summary_of_runs();
    }
}
