use std::time::Duration;

use exec_harness_core::prelude::{Contention, Workload};
use exec_harness_summary_model::{RunSummary, Strategy};

use crate::model::{InvariantViolation, ViolationKind};

/// Slack allowed between the wall clock and the result span, for clock reads on different units.
const SPAN_SLACK: Duration = Duration::from_millis(1);

/// The duration each completed workload of `run` should take on its own.
///
/// Waits take their nominal duration. Compute workloads take what they measured in the baseline,
/// or in `run` itself when there is no baseline.
pub(crate) fn individual_durations<'a>(
    run: &'a RunSummary,
    baseline: Option<&RunSummary>,
) -> Vec<(&'a Workload, Duration)> {
    run.workloads
        .iter()
        .filter_map(|workload| {
            let own = run.result_for(workload.name())?;
            let duration = match workload.nominal_duration() {
                Some(nominal) => nominal,
                None => baseline
                    .and_then(|b| b.result_for(workload.name()))
                    .unwrap_or(own)
                    .duration(),
            };
            Some((workload, duration))
        })
        .collect()
}

/// The wall clock the run's strategy predicts and the law it comes from.
///
/// `None` when no law applies, for example for threads computing without contention.
pub(crate) fn expected_elapsed(
    run: &RunSummary,
    individual: &[(&Workload, Duration)],
) -> Option<(ViolationKind, Duration)> {
    if individual.is_empty() {
        return None;
    }

    let sum = individual.iter().map(|(_, d)| *d).sum::<Duration>();
    let max = individual.iter().map(|(_, d)| *d).max().unwrap_or_default();
    let max_wait = individual
        .iter()
        .filter(|(w, _)| w.is_wait())
        .map(|(_, d)| *d)
        .max()
        .unwrap_or_default();
    let computes = individual
        .iter()
        .filter(|(w, _)| w.is_compute())
        .map(|(_, d)| *d)
        .collect::<Vec<_>>();
    let compute_sum = computes.iter().sum::<Duration>();

    match run.strategy {
        s if s.is_sequential() => Some((ViolationKind::SumLaw, sum)),
        Strategy::CooperativeConcurrent => Some((ViolationKind::MaxLaw, max)),
        Strategy::Threaded if computes.is_empty() => Some((ViolationKind::MaxLaw, max)),
        Strategy::Threaded => match run.contention.unwrap_or_default() {
            Contention::Global => Some((ViolationKind::SumLaw, max_wait.max(compute_sum))),
            Contention::None => None,
        },
        Strategy::MultiProcess => {
            let lanes = computes.len().min(run.available_cores).max(1) as u32;
            Some((ViolationKind::MaxLaw, max.max(compute_sum / lanes)))
        }
        _ => None,
    }
}

/// Check the timing laws of a complete run. Partial runs are not checked.
pub(crate) fn check_laws(
    run: &RunSummary,
    expected: Option<(ViolationKind, Duration)>,
    tolerance: f64,
) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();
    if run.is_partial() {
        return violations;
    }

    if let Some(span) = run.result_span() {
        if run.wall_clock_elapsed + SPAN_SLACK < span {
            violations.push(InvariantViolation {
                kind: ViolationKind::Span,
                expected: span,
                actual: run.wall_clock_elapsed,
                deviation: deviation(span, run.wall_clock_elapsed),
            });
        }
    }

    if let Some((kind, expected)) = expected {
        let actual = measured_elapsed(run);
        let deviation = deviation(expected, actual);
        if deviation > tolerance {
            violations.push(InvariantViolation {
                kind,
                expected,
                actual,
                deviation,
            });
        }
    }

    violations
}

/// Wall clock with the startup overhead of worker processes taken out.
pub(crate) fn measured_elapsed(run: &RunSummary) -> Duration {
    match run.startup_overhead {
        Some(overhead) if run.strategy.has_startup_overhead() => {
            run.wall_clock_elapsed.saturating_sub(overhead)
        }
        _ => run.wall_clock_elapsed,
    }
}

fn deviation(expected: Duration, actual: Duration) -> f64 {
    let expected = expected.as_secs_f64();
    if expected <= 0.0 {
        return 0.0;
    }
    (actual.as_secs_f64() - expected).abs() / expected
}
