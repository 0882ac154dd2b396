//! `lcbandit`: budget-constrained model selection over recorded learning curves.
//!
//! Designed for "which training run should get the next checkpoint?" problems:
//! you have a pool of finished training runs (their per-checkpoint validation
//! reward is on disk), and you want to know how well an allocation policy would
//! have done had it been choosing, step by step, which run to keep training.
//! Training is replayed, not executed: pulling an arm is a table lookup.
//!
//! **Building blocks:**
//! - [`Arm`]: one run's monotone reward curve (running maximum of the recorded
//!   reward) plus its own progress counter. Progress past the last recorded
//!   checkpoint is clamped to the final reward.
//! - [`ArmSupply`]: owns the pool and every instance handed out. After the pool
//!   is exhausted it issues fresh duplicates (shared curve, step 0), so supply
//!   never runs out. [`ArmSupply::stats`] summarizes the whole experiment,
//!   including the terminal regret against the oracle run.
//!
//! **Allocation policies:**
//! - [`EpsilonGreedy`] / [`Ucb1`] behind the [`SelectionStrategy`] trait, with
//!   [`Strategy`] as the closed, configuration-selected set. Driven by
//!   [`run_bandit`] under a total step budget.
//! - [`SuccessiveHalving`]: Hyperband brackets of successive halving, configured
//!   by [`HyperbandConfig`] (`max_iter`, `eta`).
//!
//! **Goals:**
//! - **Deterministic by default**: seeded RNGs (seed 0), lowest-index tie-breaks,
//!   stable pruning order. Same inputs give the same trace.
//! - **Exact accounting**: every step consumed is visible both in the policy's
//!   report and in the supply's `total_resource`.
//! - **Two regrets, kept apart**: per-step regret (`|oracle - reward|`) in
//!   simulation traces, terminal regret (`oracle - best final reward`) in the
//!   supply summary.
//!
//! **Non-goals:**
//! - No real training, no concurrency, no persistence of simulation state.
//! - No plotting: [`ArmSupply::curve_snapshots`] hands curves and stopping points
//!   to whatever renders them.
//!
//! # Example
//!
//! ```
//! use std::collections::BTreeMap;
//! use lcbandit::{run_bandit, Arm, ArmSupply, SimulationConfig, Ucb1};
//!
//! let runs = [
//!     BTreeMap::from([(1, 10.0), (2, 5.0), (3, 12.0)]),
//!     BTreeMap::from([(1, 4.0), (2, 8.0), (3, 9.0)]),
//! ];
//! let pool = runs
//!     .iter()
//!     .enumerate()
//!     .map(|(i, r)| Arm::from_readings(format!("run{i}"), r))
//!     .collect();
//! let mut supply = ArmSupply::from_pool(pool).unwrap();
//! let mut ucb = Ucb1::new(2).unwrap();
//!
//! let report = run_bandit(&mut supply, &mut ucb, SimulationConfig { num_arms: 2, budget: 6 }).unwrap();
//! assert_eq!(report.resource, 6);
//! assert_eq!(report.oracle_reward, 12.0);
//! assert!(report.summary.terminal_regret >= 0.0);
//! ```
//!
//! # Features
//!
//! - `serde`: `Serialize`/`Deserialize` for configs and reports.
//! - `cli`: the `lcbandit` binary (metrics-directory driven simulations).

#![forbid(unsafe_code)]

mod error;
pub use error::*;

mod arm;
pub use arm::*;

mod supply;
pub use supply::*;

mod decision;
pub use decision::{Selection, SelectionReason};

mod strategy;
pub use strategy::*;

mod hyperband;
pub use hyperband::*;

mod simulation;
pub use simulation::*;

pub mod source;
