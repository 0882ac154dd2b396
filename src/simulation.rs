//! Budgeted k-arm simulation driver.
//!
//! Draws `num_arms` arms from an [`ArmSupply`], pulls each once to seed the
//! strategy, then spends the rest of the budget one pull at a time on whatever
//! the strategy selects. Every pull after the seeding round is recorded with
//! its per-step regret (`|oracle - reward|`); the terminal regret of the whole
//! experiment comes from [`ArmSupply::stats`].

use crate::{ArmId, ArmSupply, Error, Result, SelectionReason, SelectionStrategy, SupplyStats};

/// Driver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationConfig {
    /// Number of arms (`k`) drawn from the supply.
    pub num_arms: usize,
    /// Total pulls, including the seeding round.
    pub budget: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            num_arms: 10,
            budget: 40,
        }
    }
}

/// Seeding pull of one arm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct InitialPull {
    /// Strategy-side arm index.
    pub index: usize,
    pub arm: ArmId,
    pub reward: f64,
    pub final_reward: f64,
}

/// One budgeted pull.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StepRecord {
    /// Resource consumed before this pull.
    pub step: u64,
    /// Strategy-side arm index.
    pub chosen: usize,
    pub arm: ArmId,
    pub reward: f64,
    /// `|oracle_reward - reward|`.
    pub step_regret: f64,
    pub reason: SelectionReason,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimulationReport {
    pub initial: Vec<InitialPull>,
    pub trace: Vec<StepRecord>,
    /// Pulls performed (seeding round included).
    pub resource: u64,
    pub oracle_reward: f64,
    pub summary: SupplyStats,
}

impl SimulationReport {
    /// Last budgeted pull, if the budget went beyond the seeding round.
    pub fn last_step(&self) -> Option<&StepRecord> {
        self.trace.last()
    }

    /// Mean of the per-step regrets.
    pub fn mean_step_regret(&self) -> Option<f64> {
        if self.trace.is_empty() {
            return None;
        }
        let sum: f64 = self.trace.iter().map(|s| s.step_regret).sum();
        Some(sum / self.trace.len() as f64)
    }
}

/// Run a budgeted simulation of `strategy` over arms drawn from `supply`.
///
/// `strategy.n_arms()` must equal `cfg.num_arms`.
pub fn run_bandit<S>(supply: &mut ArmSupply, strategy: &mut S, cfg: SimulationConfig) -> Result<SimulationReport>
where
    S: SelectionStrategy + ?Sized,
{
    if cfg.num_arms == 0 {
        return Err(Error::InvalidConfig("num_arms must be >= 1".to_string()));
    }
    if strategy.n_arms() != cfg.num_arms {
        return Err(Error::Arity {
            index: cfg.num_arms,
            n_arms: strategy.n_arms(),
        });
    }

    let arms: Vec<ArmId> = (0..cfg.num_arms).map(|_| supply.sample_arm()).collect();
    let oracle_reward = supply.oracle_reward();
    let mut resource = 0u64;

    let mut initial = Vec::with_capacity(arms.len());
    for (index, &arm) in arms.iter().enumerate() {
        let reward = supply.advance(arm, 1)?;
        strategy.update(index, reward)?;
        let final_reward = supply.arm(arm).map_or(reward, |a| a.final_reward());
        tracing::debug!(index, %arm, reward, final_reward, "seeding pull");
        initial.push(InitialPull {
            index,
            arm,
            reward,
            final_reward,
        });
        resource += 1;
    }

    tracing::info!(budget = cfg.budget, num_arms = cfg.num_arms, "budgeted selection starting");
    let mut trace = Vec::new();
    while resource < cfg.budget {
        let sel = strategy.select_arm_explain();
        let arm = *arms.get(sel.arm).ok_or(Error::Arity {
            index: sel.arm,
            n_arms: arms.len(),
        })?;
        let reward = supply.advance(arm, 1)?;
        let step_regret = (oracle_reward - reward).abs();
        tracing::debug!(
            step = resource,
            chosen = sel.arm,
            reward,
            step_regret,
            reason = %sel.reason,
            "pull"
        );
        trace.push(StepRecord {
            step: resource,
            chosen: sel.arm,
            arm,
            reward,
            step_regret,
            reason: sel.reason,
        });
        strategy.update(sel.arm, reward)?;
        resource += 1;
    }

    let summary = supply.stats();
    tracing::info!(
        resource,
        best_arm = %summary.best_arm,
        best_final_reward = summary.best_final_reward,
        oracle_reward,
        terminal_regret = summary.terminal_regret,
        "simulation finished"
    );
    Ok(SimulationReport {
        initial,
        trace,
        resource,
        oracle_reward,
        summary,
    })
}
