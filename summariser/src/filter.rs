use exec_harness_summary_model::RunSummary;
use itertools::Itertools;

/// Keep the most recent run of each strategy, grouped by the workload set it ran.
///
/// Groups are ordered by fingerprint, runs within a group by strategy.
pub fn latest_run_summaries_by_fingerprint_and_strategy(
    summary_runs: Vec<RunSummary>,
) -> Vec<(String, Vec<RunSummary>)> {
    summary_runs
        .into_iter()
        .into_group_map_by(|summary| summary.fingerprint())
        .into_iter()
        .sorted_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(fingerprint, summaries)| {
            let latest = summaries
                .into_iter()
                .into_group_map_by(|summary| summary.strategy)
                .into_iter()
                .filter_map(|(_, runs)| runs.into_iter().max_by_key(|run| run.started_at))
                .sorted_by_key(|run| run.strategy)
                .collect::<Vec<_>>();
            (fingerprint, latest)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use exec_harness_core::prelude::Workload;
    use exec_harness_summary_model::Strategy;

    fn run(id: &str, strategy: Strategy, started_at: i64, wait_secs: f64) -> RunSummary {
        RunSummary::new(
            id.to_string(),
            strategy,
            started_at,
            vec![Workload::wait_secs("coffee", wait_secs).unwrap()],
            1,
            "test".to_string(),
        )
    }

    #[test]
    fn keeps_latest_per_strategy() {
        let runs = vec![
            run("old-threaded", Strategy::Threaded, 10, 1.0),
            run("sequential", Strategy::Sequential, 5, 1.0),
            run("new-threaded", Strategy::Threaded, 20, 1.0),
        ];

        let groups = latest_run_summaries_by_fingerprint_and_strategy(runs);
        assert_eq!(1, groups.len());
        let ids = groups[0]
            .1
            .iter()
            .map(|r| r.run_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(vec!["sequential", "new-threaded"], ids);
    }

    #[test]
    fn separates_workload_sets() {
        let runs = vec![
            run("a", Strategy::Sequential, 1, 1.0),
            run("b", Strategy::Sequential, 2, 0.5),
        ];

        let groups = latest_run_summaries_by_fingerprint_and_strategy(runs);
        assert_eq!(2, groups.len());
        assert!(groups.iter().all(|(_, runs)| runs.len() == 1));
    }
}
