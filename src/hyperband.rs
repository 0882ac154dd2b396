//! Hyperband: successive halving run over several brackets.
//!
//! Each bracket `s` (from `s_max` down to `0`) trades the number of arms it
//! considers (`n`) against how far every arm is trained before the first prune
//! (`r`). Inside a bracket all arms of the cohort advance in lockstep to a
//! geometric schedule of checkpoints (`r * eta^i`); after each rung the lowest
//! `floor(n_i / eta)` arms are dropped. Brackets are independent: survivors are
//! not carried over, and every bracket samples a fresh cohort from the supply.
//!
//! | bracket `s` | `n`                                      | `r`                  |
//! |-------------|------------------------------------------|----------------------|
//! | `s`         | `floor(B / max_iter / (s+1)) * eta^s`    | `floor(max_iter / eta^s)` |
//!
//! with `s_max = floor(log_eta(max_iter))` and `B = (s_max + 1) * max_iter`.
//! All of the schedule arithmetic is done in integers, so `s_max` is the exact
//! floor of the logarithm.
//!
//! # Example
//!
//! ```
//! use lcbandit::HyperbandConfig;
//!
//! let cfg = HyperbandConfig { max_iter: 9, eta: 3 };
//! assert_eq!(cfg.s_max(), 2);
//! assert_eq!(cfg.budget(), 27);
//!
//! let last = cfg.bracket_plan(0);
//! assert_eq!((last.n, last.r), (3, 9));
//! ```

use crate::{ArmId, ArmSupply, Error, Result};

/// Hyperband parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HyperbandConfig {
    /// Steps available to the best surviving arm of a bracket.
    pub max_iter: u64,
    /// Elimination ratio; `1/eta` of a cohort is the unit that gets pruned.
    pub eta: u64,
}

impl Default for HyperbandConfig {
    fn default() -> Self {
        Self {
            max_iter: 81,
            eta: 3,
        }
    }
}

impl HyperbandConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be >= 1".to_string()));
        }
        if self.eta < 2 {
            return Err(Error::InvalidConfig(format!(
                "eta must be >= 2, got {}",
                self.eta
            )));
        }
        Ok(())
    }

    /// Largest `s` with `eta^s <= max_iter`.
    pub fn s_max(&self) -> u32 {
        if self.eta < 2 || self.max_iter == 0 {
            return 0;
        }
        let mut s = 0u32;
        let mut p = self.eta;
        while p <= self.max_iter {
            s += 1;
            match p.checked_mul(self.eta) {
                Some(next) => p = next,
                None => break,
            }
        }
        s
    }

    /// `B = (s_max + 1) * max_iter`.
    pub fn budget(&self) -> u64 {
        u64::from(self.s_max() + 1).saturating_mul(self.max_iter)
    }

    /// Schedule for bracket `s`.
    pub fn bracket_plan(&self, s: u32) -> BracketPlan {
        let eta = self.eta.max(2);
        let max_iter = self.max_iter.max(1);
        let n = (self.budget() / max_iter / u64::from(s + 1)).saturating_mul(eta.saturating_pow(s));
        let r = max_iter / eta.saturating_pow(s);

        let mut rungs = Vec::with_capacity(s as usize + 1);
        let mut prev_iter = 0u64;
        for i in 0..=s {
            let scale = eta.saturating_pow(i);
            let n_i = n / scale;
            let r_i = r.saturating_mul(scale);
            rungs.push(RungPlan {
                rung: i,
                n_i,
                r_i,
                num_pull: r_i.saturating_sub(prev_iter),
                drop: n_i / eta,
            });
            prev_iter = r_i;
        }
        BracketPlan { s, n, r, rungs }
    }

    /// Every bracket, in execution order (`s_max` down to `0`).
    pub fn plans(&self) -> Vec<BracketPlan> {
        (0..=self.s_max()).rev().map(|s| self.bracket_plan(s)).collect()
    }
}

/// Planned rung of a bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RungPlan {
    pub rung: u32,
    /// `floor(n * eta^-i)`; only used to size the prune.
    pub n_i: u64,
    /// Cumulative step target of this rung.
    pub r_i: u64,
    /// Extra steps each cohort member is advanced at this rung.
    pub num_pull: u64,
    /// Arms pruned after this rung: `floor(n_i / eta)`.
    pub drop: u64,
}

/// Planned bracket: cohort size, first-rung resource, rung schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BracketPlan {
    pub s: u32,
    pub n: u64,
    pub r: u64,
    pub rungs: Vec<RungPlan>,
}

/// What happened at one rung.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RungReport {
    pub plan: RungPlan,
    /// Cohort size when the rung started.
    pub cohort_size: usize,
    /// Resource used by the bracket so far, including this rung.
    pub inner_resource: u64,
    /// `(arm, reward)` after advancing, sorted by reward ascending.
    pub evaluated: Vec<(ArmId, f64)>,
    /// Arms kept for the next rung.
    pub survivors: Vec<ArmId>,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BracketReport {
    pub s: u32,
    pub n: u64,
    pub r: u64,
    pub rungs: Vec<RungReport>,
    pub resource: u64,
}

/// Best reward observed anywhere in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BestArm {
    pub id: ArmId,
    pub reward: f64,
    pub bracket: u32,
    pub rung: u32,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HyperbandReport {
    pub brackets: Vec<BracketReport>,
    pub total_resource: u64,
    pub best: Option<BestArm>,
}

/// Runs the Hyperband schedule against an [`ArmSupply`].
#[derive(Debug, Clone)]
pub struct SuccessiveHalving {
    cfg: HyperbandConfig,
}

impl SuccessiveHalving {
    pub fn new(cfg: HyperbandConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> HyperbandConfig {
        self.cfg
    }

    /// Run every bracket, `s_max` first.
    pub fn run(&self, supply: &mut ArmSupply) -> Result<HyperbandReport> {
        tracing::info!(
            max_iter = self.cfg.max_iter,
            eta = self.cfg.eta,
            s_max = self.cfg.s_max(),
            budget = self.cfg.budget(),
            "hyperband starting"
        );
        let mut brackets = Vec::new();
        let mut total_resource = 0u64;
        let mut best: Option<BestArm> = None;
        for plan in self.cfg.plans() {
            let report = self.run_bracket(supply, &plan)?;
            total_resource = total_resource.saturating_add(report.resource);
            for rung in &report.rungs {
                for &(id, reward) in &rung.evaluated {
                    if best.map_or(true, |b| reward > b.reward) {
                        best = Some(BestArm {
                            id,
                            reward,
                            bracket: report.s,
                            rung: rung.plan.rung,
                        });
                    }
                }
            }
            brackets.push(report);
        }
        tracing::info!(total_resource, "hyperband finished");
        Ok(HyperbandReport {
            brackets,
            total_resource,
            best,
        })
    }

    /// Run one successive-halving bracket on a freshly sampled cohort.
    pub fn run_bracket(&self, supply: &mut ArmSupply, plan: &BracketPlan) -> Result<BracketReport> {
        tracing::info!(s = plan.s, n = plan.n, r = plan.r, "successive halving bracket");
        let mut cohort: Vec<ArmId> = (0..plan.n).map(|_| supply.sample_arm()).collect();
        let mut resource = 0u64;
        let mut rungs = Vec::with_capacity(plan.rungs.len());

        for rp in &plan.rungs {
            let cohort_size = cohort.len();
            let mut evaluated = Vec::with_capacity(cohort_size);
            for &id in &cohort {
                evaluated.push((id, supply.advance(id, rp.num_pull)?));
            }
            resource = resource.saturating_add((cohort_size as u64).saturating_mul(rp.num_pull));
            tracing::info!(
                n_i = rp.n_i,
                num_pull = rp.num_pull,
                r_i = rp.r_i,
                cohort = cohort_size,
                inner_resource = resource,
                "rung evaluated"
            );

            // Stable: equal rewards keep sampling order, so earlier arms are pruned first.
            evaluated.sort_by(|a, b| a.1.total_cmp(&b.1));
            let drop = usize::try_from(rp.drop).unwrap_or(usize::MAX).min(evaluated.len());
            cohort = evaluated[drop..].iter().map(|&(id, _)| id).collect();
            tracing::debug!(dropped = drop, survivors = cohort.len(), "rung pruned");

            rungs.push(RungReport {
                plan: *rp,
                cohort_size,
                inner_resource: resource,
                evaluated,
                survivors: cohort.clone(),
            });
        }

        Ok(BracketReport {
            s: plan.s,
            n: plan.n,
            r: plan.r,
            rungs,
            resource,
        })
    }
}
