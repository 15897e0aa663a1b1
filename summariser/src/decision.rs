use exec_harness_summary_model::{RunStatus, Strategy};

use crate::model::{ComparisonReport, Decision};

/// Pick the strategy the measurements favour for the report's workload profile.
///
/// Only complete runs without timing law violations count. A strategy has to beat the sequential
/// baseline by more than the tolerance, otherwise sequential stays the recommendation.
pub(crate) fn decide(report: &ComparisonReport) -> Option<Decision> {
    report.baseline?;

    let (mut faster, no_gain): (Vec<_>, Vec<_>) = report
        .strategies
        .iter()
        .filter(|s| s.status == RunStatus::Complete && s.violations.is_empty())
        .filter(|s| s.strategy != Strategy::Sequential)
        .filter_map(|s| s.speedup_vs_baseline.map(|speedup| (s.strategy, speedup)))
        .partition(|(_, speedup)| *speedup > 1.0 + report.tolerance);

    faster.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut faster = faster.into_iter();

    let (recommended, speedup) = faster.next().unwrap_or((Strategy::Sequential, 1.0));

    Some(Decision {
        profile: report.profile,
        recommended,
        speedup,
        also_faster: faster.collect(),
        no_gain: no_gain.into_iter().map(|(strategy, _)| strategy).collect(),
    })
}
