//! Model-selection simulations over a directory of training metrics files.
//!
//! Usage:
//!   lcbandit bandit --datadir DIR --num-arms K --budget B [--algo ucb1]
//!   lcbandit hyperband --datadir DIR --max-iter N [--eta 3]
//!
//! Examples:
//!   # Epsilon-greedy over 10 runs, 40 checkpoints in aggregate
//!   lcbandit bandit -d data/wnmt18-de-en -k 10 -b 40
//!
//!   # Hyperband with randomized run order, JSON report on stdout
//!   lcbandit hyperband -d data/wnmt18-de-en -i 27 --randomize --seed 3 --json
//!
//! Logging is controlled with `RUST_LOG` (default `info`).

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lcbandit::source::{load_supply, DEFAULT_METRIC};
use lcbandit::{
    run_bandit, ArmSupply, HyperbandConfig, SimulationConfig, Strategy, StrategyConfig,
    StrategyKind, SuccessiveHalving, SupplyConfig, ValueUpdate,
};

#[derive(Parser)]
#[command(name = "lcbandit")]
#[command(about = "Simulate budgeted model selection over recorded learning curves")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Conventional k-arm bandit (epsilon-greedy or UCB1) under a total budget
    Bandit {
        #[command(flatten)]
        common: CommonArgs,

        /// Number of arms/models (k)
        #[arg(short = 'k', long)]
        num_arms: usize,

        /// Total budget in checkpoints, seeding round included
        #[arg(short = 'b', long)]
        budget: u64,

        /// Selection algorithm (epsilon-greedy, ucb1)
        #[arg(short = 'a', long, default_value = "epsilon-greedy")]
        algo: String,

        /// Exploration rate for epsilon-greedy
        #[arg(long, default_value = "0.1")]
        epsilon: f64,

        /// Use running-mean value estimates instead of last-reward replacement
        #[arg(long)]
        average: bool,
    },
    /// Hyperband (successive halving brackets)
    Hyperband {
        #[command(flatten)]
        common: CommonArgs,

        /// Max checkpoints for the best arm of a bracket
        #[arg(short = 'i', long)]
        max_iter: u64,

        /// Elimination ratio
        #[arg(short = 'e', long, default_value = "3")]
        eta: u64,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Directory searched recursively for `metrics` files
    #[arg(short = 'd', long)]
    datadir: PathBuf,

    /// Metric used as reward
    #[arg(short = 'm', long, default_value = DEFAULT_METRIC)]
    metric: String,

    /// Shuffle the order of runs before sampling
    #[arg(short = 'r', long)]
    randomize: bool,

    /// Seed for shuffling and exploration
    #[arg(short = 's', long, default_value = "0")]
    seed: u64,

    /// Use at most this many runs
    #[arg(long)]
    file_limit: Option<usize>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Print the per-instance status table at the end
    #[arg(long)]
    status: bool,
}

impl CommonArgs {
    fn load(&self) -> anyhow::Result<ArmSupply> {
        let cfg = SupplyConfig {
            randomize: self.randomize,
            seed: self.seed,
            file_limit: self.file_limit,
        };
        load_supply(&self.datadir, &self.metric, cfg)
            .with_context(|| format!("loading runs from {}", self.datadir.display()))
    }

    fn finish(&self, supply: &ArmSupply) {
        if self.status {
            println!("{supply}");
        }
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Bandit {
            common,
            num_arms,
            budget,
            algo,
            epsilon,
            average,
        } => {
            let kind: StrategyKind = algo.parse()?;
            let mut supply = common.load()?;
            let mut strategy = Strategy::new(
                num_arms,
                StrategyConfig {
                    kind,
                    epsilon,
                    update: if average {
                        ValueUpdate::SampleAverage
                    } else {
                        ValueUpdate::Replace
                    },
                    seed: common.seed,
                },
            )?;
            let report = run_bandit(&mut supply, &mut strategy, SimulationConfig { num_arms, budget })?;

            if common.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("arm: initial reward => final reward");
                for p in &report.initial {
                    println!("{}: {:.4} => {:.4}", p.index, p.reward, p.final_reward);
                }
                for s in &report.trace {
                    println!(
                        "step={}, chosen={}, reward={:.4}, regret={:.4} ({})",
                        s.step, s.chosen, s.reward, s.step_regret, s.reason
                    );
                }
                print!("{strategy}");
                let m = report.summary;
                println!(
                    "best_arm={} final_reward={:.4} oracle={:.4} terminal_regret={:.4} resource={}",
                    m.best_arm, m.best_final_reward, report.oracle_reward, m.terminal_regret, m.total_resource
                );
            }
            common.finish(&supply);
        }
        Command::Hyperband {
            common,
            max_iter,
            eta,
        } => {
            let hb = SuccessiveHalving::new(HyperbandConfig { max_iter, eta })?;
            let mut supply = common.load()?;
            let report = hb.run(&mut supply)?;
            let stats = supply.stats();

            if common.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "hyperband": report,
                        "summary": stats,
                        "oracle_reward": supply.oracle_reward(),
                    }))?
                );
            } else {
                for b in &report.brackets {
                    println!("bracket s={}: n={} r={} resource={}", b.s, b.n, b.r, b.resource);
                    for r in &b.rungs {
                        println!(
                            "  n_i={} arms, evaluated {} steps (r_i={}), cohort={}, inner_resource={}",
                            r.plan.n_i, r.plan.num_pull, r.plan.r_i, r.cohort_size, r.inner_resource
                        );
                    }
                }
                println!("total resource usage: {}", report.total_resource);
                if let Some(best) = report.best {
                    println!(
                        "best observed: arm={} reward={:.4} (bracket s={}, rung {})",
                        best.id, best.reward, best.bracket, best.rung
                    );
                }
                println!(
                    "best_arm={} final_reward={:.4} oracle={:.4} terminal_regret={:.4} resource={}",
                    stats.best_arm,
                    stats.best_final_reward,
                    supply.oracle_reward(),
                    stats.terminal_regret,
                    stats.total_resource
                );
            }
            common.finish(&supply);
        }
    }
    Ok(())
}
