use std::time::Duration;

use anyhow::Context;
use exec_harness_summary_model::{RunSummary, Strategy};
use indicatif::{ProgressBar, ProgressStyle};

/// Displays a progress bar over the strategies of a comparison, so the user can see which one is
/// running and how many are left.
pub(crate) struct StrategyProgress {
    pb: ProgressBar,
}

impl StrategyProgress {
    pub(crate) fn new(strategy_count: usize, visible: bool) -> anyhow::Result<Self> {
        if !visible {
            return Ok(Self {
                pb: ProgressBar::hidden(),
            });
        }

        let pb = ProgressBar::new(strategy_count as u64);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} strategies [{elapsed_precise}] {msg}",
            )
            .context("Failed to set progress style")?
            .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(100));

        Ok(Self { pb })
    }

    pub(crate) fn start(&self, strategy: Strategy) {
        self.pb.set_message(format!("running {strategy}"));
    }

    pub(crate) fn finish_run(&self, run: &RunSummary) {
        self.pb.println(format!(
            "{} finished in {:.3}s ({:?})",
            run.strategy,
            run.wall_clock_elapsed.as_secs_f64(),
            run.status
        ));
        self.pb.inc(1);
    }

    pub(crate) fn skip(&self, strategy: Strategy) {
        self.pb.println(format!("{strategy} could not run"));
        self.pb.inc(1);
    }

    pub(crate) fn finish(&self) {
        log::trace!("Progress bar finished");
        self.pb.finish_and_clear();
    }
}
