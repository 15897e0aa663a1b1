use exec_harness_summary_model::RunSummary;
use std::time::Duration;
use tabled::Tabled;

/// Width of the timeline column, in characters.
pub const TIMELINE_WIDTH: usize = 40;

#[derive(Tabled, Debug, Clone, PartialEq)]
pub struct IntervalRow {
    pub workload: String,
    #[tabled(display = "float3")]
    pub start_s: f64,
    #[tabled(display = "float3")]
    pub end_s: f64,
    #[tabled(display = "float3")]
    pub duration_s: f64,
    pub executor: String,
    pub timeline: String,
}

fn float3(n: &f64) -> String {
    format!("{:.3}", n)
}

/// Draw `[start, end)` as a bar on a line representing `[0, total)`.
///
/// Bars of overlapping workloads line up vertically, which is the point of the column.
pub fn render_timeline(start: Duration, end: Duration, total: Duration, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    if total.is_zero() {
        return "#".repeat(width);
    }

    let scale = |d: Duration| -> usize {
        let cell = (d.as_secs_f64() / total.as_secs_f64() * width as f64).round() as usize;
        cell.min(width)
    };

    let from = scale(start);
    // Always draw at least one cell so very short workloads stay visible.
    let to = scale(end).max(from + 1).min(width);
    let from = from.min(to.saturating_sub(1));

    format!(
        "{}{}{}",
        ".".repeat(from),
        "#".repeat(to - from),
        ".".repeat(width - to)
    )
}

/// One row per successful workload, in completion order.
pub fn interval_rows(run: &RunSummary) -> Vec<IntervalRow> {
    let total = run
        .results
        .iter()
        .map(|r| r.end)
        .max()
        .unwrap_or_default()
        .max(run.wall_clock_elapsed);

    run.results
        .iter()
        .map(|result| {
            let label = run
                .workloads
                .iter()
                .find(|w| w.name() == result.workload_name)
                .map(|w| w.display_name())
                .unwrap_or_else(|| result.workload_name.clone());

            IntervalRow {
                workload: label,
                start_s: result.start.as_secs_f64(),
                end_s: result.end.as_secs_f64(),
                duration_s: result.duration().as_secs_f64(),
                executor: result.executor.to_string(),
                timeline: render_timeline(result.start, result.end, total, TIMELINE_WIDTH),
            }
        })
        .collect()
}
