use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;
use exec_harness_summary_model::Strategy;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
pub struct ExecHarnessCli {
    /// The built-in workload set to run: `kitchen-wait`, `kitchen-compute`, `ingredients`,
    /// `gil-demo` or `mixed`.
    #[clap(long, default_value = "kitchen-wait", conflicts_with = "workloads_file")]
    pub workloads: String,

    /// Load the workload set from a TOML file instead of using a built-in one.
    #[clap(long)]
    pub workloads_file: Option<PathBuf>,

    /// A strategy to run. Use the flag multiple times to run several, for example
    /// `--strategy=sequential --strategy=threaded`, or pass `all`.
    ///
    /// Strategies run one after another in the order given. The sequential strategy is the
    /// baseline for speedups, so it is added first when it was not asked for.
    #[clap(long, short, value_parser = parse_strategy, default_value = "all")]
    pub strategy: Vec<StrategyList>,

    /// Overall deadline for each strategy run, in seconds. Workloads still pending when it passes
    /// are stopped and the run is reported as partial.
    #[clap(long)]
    pub deadline: Option<f64>,

    /// How long the multi-process strategy waits for its workers, in seconds.
    #[clap(long, default_value = "60")]
    pub process_timeout: f64,

    /// Let threads compute in parallel instead of taking turns on a global lock.
    #[clap(long, default_value = "false")]
    pub no_contention: bool,

    /// How far, as a fraction, a run may stray from its timing law before it is flagged.
    #[clap(long, default_value = "0.2")]
    pub tolerance: f64,

    /// Write the comparison report as JSON to this path.
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Do not show a progress bar on the CLI.
    ///
    /// This is recommended for CI/CD environments where the progress bar isn't being looked at by
    /// anyone and is just adding noise to the logs.
    #[clap(long, default_value = "false")]
    pub no_progress: bool,

    /// Append every run summary to the file named by `RUN_SUMMARY_PATH`, default
    /// `run_summary.jsonl`, for the summariser to pick up later.
    #[clap(long, default_value = "false")]
    pub persist: bool,

    /// Run as a worker process, reading one command from stdin.
    #[clap(long, hide = true, default_value = "false")]
    pub worker: bool,
}

impl ExecHarnessCli {
    /// The strategies to run, in order, without repeats.
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut strategies = Vec::new();
        for strategy in self.strategy.iter().flat_map(|list| list.0.iter()) {
            if !strategies.contains(strategy) {
                strategies.push(*strategy);
            }
        }

        if !strategies.contains(&Strategy::Sequential) {
            strategies.insert(0, Strategy::Sequential);
        }

        strategies
    }
}

/// The strategies named by one `--strategy` flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyList(pub Vec<Strategy>);

fn parse_strategy(s: &str) -> anyhow::Result<StrategyList> {
    if s.trim().eq_ignore_ascii_case("all") {
        return Ok(StrategyList(Strategy::ALL.to_vec()));
    }

    s.split(',')
        .map(Strategy::from_str)
        .collect::<anyhow::Result<Vec<_>>>()
        .map(StrategyList)
}
