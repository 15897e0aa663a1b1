use exec_harness_summary_model::RunSummary;
use tabled::Tabled;

#[derive(Tabled)]
pub struct RunRow {
    pub strategy: String,
    pub status: String,
    #[tabled(display = "float3")]
    pub wall_clock_s: f64,
    pub completed: usize,
    pub failed: usize,
    pub executors: usize,
}

fn float3(n: &f64) -> String {
    format!("{:.3}", n)
}

impl From<&RunSummary> for RunRow {
    fn from(run: &RunSummary) -> Self {
        let mut executors = run
            .results
            .iter()
            .map(|r| r.executor.to_string())
            .collect::<Vec<_>>();
        executors.sort();
        executors.dedup();

        Self {
            strategy: run.strategy.to_string(),
            status: format!("{:?}", run.status),
            wall_clock_s: run.wall_clock_elapsed.as_secs_f64(),
            completed: run.results.len(),
            failed: run.failures.len(),
            executors: executors.len(),
        }
    }
}
