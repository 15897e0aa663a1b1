mod report;
mod timing;

use exec_harness_summary_model::RunSummary;

pub use report::{
    interval_rows, render_timeline, InMemoryReporter, IntervalRow, JsonlReporter,
    ReportCollector, ReportConfig, Reporter, RunRow, SummaryReportCollector,
};
pub use timing::{Interval, TimingHandle, TimingRecorder, TimingSlot};

/// How many times faster `candidate` ran than `baseline`, by wall-clock time.
///
/// Returns `None` when the candidate took no measurable time.
pub fn speedup(baseline: &RunSummary, candidate: &RunSummary) -> Option<f64> {
    let candidate_secs = candidate.wall_clock_elapsed.as_secs_f64();
    if candidate_secs <= 0.0 {
        return None;
    }

    Some(baseline.wall_clock_elapsed.as_secs_f64() / candidate_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_harness_summary_model::Strategy;
    use std::time::Duration;

    fn summary_with_wall(strategy: Strategy, wall: Duration) -> RunSummary {
        let mut summary = RunSummary::new(
            "run".to_string(),
            strategy,
            0,
            Vec::new(),
            1,
            "test".to_string(),
        );
        summary.wall_clock_elapsed = wall;
        summary
    }

    #[test]
    fn speedup_is_ratio_of_wall_clock() {
        let baseline = summary_with_wall(Strategy::Sequential, Duration::from_millis(1800));
        let candidate =
            summary_with_wall(Strategy::CooperativeConcurrent, Duration::from_millis(1000));

        let speedup = speedup(&baseline, &candidate).unwrap();
        assert!((speedup - 1.8).abs() < 1e-9);
    }

    #[test]
    fn speedup_of_instant_run_is_undefined() {
        let baseline = summary_with_wall(Strategy::Sequential, Duration::from_secs(1));
        let candidate = summary_with_wall(Strategy::Threaded, Duration::ZERO);
        assert_eq!(None, speedup(&baseline, &candidate));
    }
}
