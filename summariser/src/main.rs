use anyhow::{anyhow, Context};
use chrono::Utc;
use exec_harness_summariser::filter::latest_run_summaries_by_fingerprint_and_strategy;
use exec_harness_summariser::{compare, render_report, DEFAULT_TOLERANCE};
use exec_harness_summary_model::{load_summary_runs, run_summary_path};
use log::debug;
use std::fs::File;

/// Environment variable name to override the timing law tolerance
const TOLERANCE_ENV: &str = "SUMMARY_TOLERANCE";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let ignore_errors = std::env::var("IGNORE_SUMMARY_ERRORS").is_ok();

    let tolerance = match std::env::var(TOLERANCE_ENV) {
        Ok(value) => value
            .parse::<f64>()
            .with_context(|| format!("Invalid {TOLERANCE_ENV} '{value}'"))?,
        Err(_) => DEFAULT_TOLERANCE,
    };

    let summary_path = run_summary_path();
    debug!("Loading summary from {}", summary_path.display());
    let summary_runs = load_summary_runs(&summary_path).with_context(|| {
        format!(
            "Failed to load run summaries from {}",
            summary_path.display()
        )
    })?;

    let groups = latest_run_summaries_by_fingerprint_and_strategy(summary_runs);
    let total = groups.len();

    let mut errors = vec![];
    let mut reports = vec![];
    for (fingerprint, runs) in groups {
        debug!("Selected {} runs for {fingerprint}", runs.len());
        match compare(&runs, tolerance) {
            Ok(report) => {
                println!("{}", render_report(&report));
                reports.push(report);
            }
            Err(e) => errors.push(e.context(format!("Comparison of {fingerprint}"))),
        }
    }

    let report = File::create_new(format!(
        "summariser-report-{}.json",
        Utc::now().format("%Y-%m-%dT%H.%M.%S%.fZ")
    ))?;

    serde_json::to_writer_pretty(report, &reports)?;

    // Fail on comparison errors unless told to ignore them.
    if !errors.is_empty() {
        let error_message = format!(
            "{} out of {} comparisons failed:\n{:#?}",
            errors.len(),
            total,
            errors
        );

        if ignore_errors {
            log::warn!("{}", error_message);
        } else {
            return Err(anyhow!(error_message));
        }
    }

    Ok(())
}
