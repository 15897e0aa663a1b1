use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::model::{ComparisonReport, Decision, StrategyReport};

#[derive(Tabled)]
pub struct ComparisonRow {
    pub strategy: String,
    pub status: String,
    #[tabled(display = "float3")]
    pub wall_clock_s: f64,
    #[tabled(display = "option_float3")]
    pub expected_s: Option<f64>,
    #[tabled(display = "option_speedup")]
    pub speedup: Option<f64>,
    pub completed: usize,
    pub failed: usize,
    pub violations: usize,
}

fn float3(n: &f64) -> String {
    format!("{:.3}", n)
}

fn option_float3(n: &Option<f64>) -> String {
    n.map(|n| float3(&n)).unwrap_or_else(|| "-".to_string())
}

fn option_speedup(n: &Option<f64>) -> String {
    n.map(|n| format!("{:.2}x", n))
        .unwrap_or_else(|| "-".to_string())
}

impl From<&StrategyReport> for ComparisonRow {
    fn from(report: &StrategyReport) -> Self {
        Self {
            strategy: report.strategy.to_string(),
            status: format!("{:?}", report.status),
            wall_clock_s: report.wall_clock_elapsed.as_secs_f64(),
            expected_s: report.expected_elapsed.map(|d| d.as_secs_f64()),
            speedup: report.speedup_vs_baseline,
            completed: report.per_workload.len(),
            failed: report.failures.len(),
            violations: report.violations.len(),
        }
    }
}

/// Render the report as a table followed by violations, failures, caveats and the closing
/// decision.
pub fn render_report(report: &ComparisonReport) -> String {
    let rows = report
        .strategies
        .iter()
        .map(ComparisonRow::from)
        .collect::<Vec<_>>();
    let mut table = Table::new(&rows);
    table.with(Style::modern());

    let mut out = format!(
        "Comparison of {} strategies over {} workloads [{}] on {} cores\n{}\n",
        report.strategies.len(),
        report.profile,
        report.workloads.join(", "),
        report.available_cores,
        table
    );

    for strategy in &report.strategies {
        for violation in &strategy.violations {
            out.push_str(&format!("violation  {}: {violation}\n", strategy.strategy));
        }
        for failure in &strategy.failures {
            out.push_str(&format!(
                "failure    {}: {} ({:?}) {}\n",
                strategy.strategy, failure.workload_name, failure.kind, failure.error
            ));
        }
    }
    for caveat in &report.caveats {
        out.push_str(&format!("note       {caveat}\n"));
    }

    match &report.decision {
        Some(decision) => out.push_str(&render_decision(decision, report.tolerance)),
        None => out.push_str("decision   none, no sequential baseline to measure against\n"),
    }

    out
}

fn render_decision(decision: &Decision, tolerance: f64) -> String {
    let mut out = format!(
        "decision   {} work: use {} ({:.2}x)\n",
        decision.profile, decision.recommended, decision.speedup
    );
    for (strategy, speedup) in &decision.also_faster {
        out.push_str(&format!("           also faster: {strategy} ({speedup:.2}x)\n"));
    }
    if !decision.no_gain.is_empty() {
        out.push_str(&format!(
            "           no gain beyond {:.0}%: {}\n",
            tolerance * 100.0,
            decision
                .no_gain
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        ));
    }
    out
}
