//! K-arm selection strategies: epsilon-greedy and UCB1.
//!
//! Both keep a pull count and a value estimate per arm index and share the same
//! two-method interface, [`SelectionStrategy::select_arm`] and
//! [`SelectionStrategy::update`]. [`Strategy`] is the closed set of strategies a
//! simulation can be configured with.
//!
//! Notes:
//! - Ties always go to the lowest arm index.
//! - Epsilon-greedy is seedable; default construction uses seed 0.
//! - The value update rule defaults to full replacement (`value <- reward`);
//!   [`ValueUpdate::SampleAverage`] gives the usual running mean.

use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::decision::first_argmax;
use crate::{Error, Result, Selection, SelectionReason};

/// How a new reward is folded into an arm's value estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ValueUpdate {
    /// `value <- reward` (step size 1).
    #[default]
    Replace,
    /// `value <- value + (reward - value) / count` (running mean of rewards).
    SampleAverage,
}

impl ValueUpdate {
    fn apply(self, value: f64, reward: f64, count: u64) -> f64 {
        let alpha = match self {
            ValueUpdate::Replace => 1.0,
            ValueUpdate::SampleAverage => 1.0 / (count.max(1) as f64),
        };
        value + alpha * (reward - value)
    }
}

/// Common interface for the k-arm selection strategies.
pub trait SelectionStrategy {
    fn n_arms(&self) -> usize;

    /// Choose the next arm index, with the reason for the choice.
    fn select_arm_explain(&mut self) -> Selection;

    /// Choose the next arm index in `[0, n_arms)`.
    fn select_arm(&mut self) -> usize {
        self.select_arm_explain().arm
    }

    /// Record `reward` for `arm`: bump its count, then update its value.
    ///
    /// Fails with [`Error::Arity`] if `arm >= n_arms`.
    fn update(&mut self, arm: usize, reward: f64) -> Result<()>;

    fn counts(&self) -> &[u64];

    fn values(&self) -> &[f64];
}

/// Per-arm counts and value estimates.
#[derive(Debug, Clone)]
struct Estimates {
    counts: Vec<u64>,
    values: Vec<f64>,
    rule: ValueUpdate,
}

impl Estimates {
    fn new(n_arms: usize, rule: ValueUpdate) -> Result<Self> {
        if n_arms == 0 {
            return Err(Error::InvalidConfig(
                "a strategy needs at least one arm".to_string(),
            ));
        }
        Ok(Self {
            counts: vec![0; n_arms],
            values: vec![0.0; n_arms],
            rule,
        })
    }

    fn record(&mut self, arm: usize, reward: f64) -> Result<()> {
        let n_arms = self.counts.len();
        if arm >= n_arms {
            return Err(Error::Arity { index: arm, n_arms });
        }
        self.counts[arm] = self.counts[arm].saturating_add(1);
        self.values[arm] = self.rule.apply(self.values[arm], reward, self.counts[arm]);
        Ok(())
    }

    fn write_status(&self, f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
        writeln!(f, "{title} status:")?;
        writeln!(f, "  pull count of each arm: {:?}", self.counts)?;
        writeln!(f, "  estimated value of each arm: {:?}", self.values)
    }
}

/// Configuration for [`EpsilonGreedy`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpsilonGreedyConfig {
    /// Exploration probability in `[0, 1]`.
    pub epsilon: f64,
    pub update: ValueUpdate,
    /// Seed for the internal RNG.
    pub seed: u64,
}

impl Default for EpsilonGreedyConfig {
    fn default() -> Self {
        Self {
            epsilon: 0.1,
            update: ValueUpdate::Replace,
            seed: 0,
        }
    }
}

/// Seedable epsilon-greedy strategy.
///
/// With probability `1 - epsilon` it exploits the arm with the highest value
/// estimate; otherwise it picks an arm uniformly at random.
#[derive(Debug, Clone)]
pub struct EpsilonGreedy {
    cfg: EpsilonGreedyConfig,
    est: Estimates,
    rng: StdRng,
}

impl EpsilonGreedy {
    pub fn new(n_arms: usize, cfg: EpsilonGreedyConfig) -> Result<Self> {
        if !(cfg.epsilon.is_finite() && (0.0..=1.0).contains(&cfg.epsilon)) {
            return Err(Error::InvalidConfig(format!(
                "epsilon must be in [0, 1], got {}",
                cfg.epsilon
            )));
        }
        Ok(Self {
            cfg,
            est: Estimates::new(n_arms, cfg.update)?,
            rng: StdRng::seed_from_u64(cfg.seed),
        })
    }

    pub fn config(&self) -> EpsilonGreedyConfig {
        self.cfg
    }
}

impl SelectionStrategy for EpsilonGreedy {
    fn n_arms(&self) -> usize {
        self.est.counts.len()
    }

    fn select_arm_explain(&mut self) -> Selection {
        let n = self.n_arms();
        let u: f64 = self.rng.random();
        if u < self.cfg.epsilon {
            Selection {
                arm: self.rng.random_range(0..n),
                reason: SelectionReason::ExploreRandom,
            }
        } else {
            Selection {
                arm: first_argmax(&self.est.values),
                reason: SelectionReason::Exploit,
            }
        }
    }

    fn update(&mut self, arm: usize, reward: f64) -> Result<()> {
        self.est.record(arm, reward)
    }

    fn counts(&self) -> &[u64] {
        &self.est.counts
    }

    fn values(&self) -> &[f64] {
        &self.est.values
    }
}

impl fmt::Display for EpsilonGreedy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.est.write_status(f, "Epsilon-greedy")
    }
}

/// UCB1: value estimate plus `sqrt(2 ln N / n_a)`.
///
/// Every arm is pulled once, in index order, before any bound is computed, so
/// `n_a` is never zero inside the bound.
#[derive(Debug, Clone)]
pub struct Ucb1 {
    est: Estimates,
}

impl Ucb1 {
    pub fn new(n_arms: usize) -> Result<Self> {
        Self::with_update(n_arms, ValueUpdate::default())
    }

    pub fn with_update(n_arms: usize, update: ValueUpdate) -> Result<Self> {
        Ok(Self {
            est: Estimates::new(n_arms, update)?,
        })
    }

    /// Current UCB scores, or `None` while some arm is still unpulled.
    pub fn scores(&self) -> Option<Vec<f64>> {
        if self.est.counts.contains(&0) {
            return None;
        }
        let total: u64 = self.est.counts.iter().sum();
        let ln_total = (total as f64).ln();
        Some(
            self.est
                .counts
                .iter()
                .zip(&self.est.values)
                .map(|(&n, &v)| v + (2.0 * ln_total / n as f64).sqrt())
                .collect(),
        )
    }
}

impl SelectionStrategy for Ucb1 {
    fn n_arms(&self) -> usize {
        self.est.counts.len()
    }

    fn select_arm_explain(&mut self) -> Selection {
        let Some(scores) = self.scores() else {
            let arm = self.est.counts.iter().position(|&c| c == 0).unwrap_or(0);
            return Selection {
                arm,
                reason: SelectionReason::ExploreFirst,
            };
        };
        tracing::trace!(?scores, "ucb1 scores");
        let arm = first_argmax(&scores);
        Selection {
            arm,
            reason: SelectionReason::UpperBound { score: scores[arm] },
        }
    }

    fn update(&mut self, arm: usize, reward: f64) -> Result<()> {
        self.est.record(arm, reward)
    }

    fn counts(&self) -> &[u64] {
        &self.est.counts
    }

    fn values(&self) -> &[f64] {
        &self.est.values
    }
}

impl fmt::Display for Ucb1 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.est.write_status(f, "UCB1")
    }
}

/// Which strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StrategyKind {
    #[default]
    EpsilonGreedy,
    Ucb1,
}

impl FromStr for StrategyKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "epsilon-greedy" | "epsilon_greedy" | "egreedy" => Ok(StrategyKind::EpsilonGreedy),
            "ucb1" | "ucb" => Ok(StrategyKind::Ucb1),
            _ => Err(Error::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::EpsilonGreedy => write!(f, "epsilon-greedy"),
            StrategyKind::Ucb1 => write!(f, "ucb1"),
        }
    }
}

/// Configuration used to build a [`Strategy`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StrategyConfig {
    pub kind: StrategyKind,
    /// Exploration rate (epsilon-greedy only).
    pub epsilon: f64,
    pub update: ValueUpdate,
    /// RNG seed (epsilon-greedy only).
    pub seed: u64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        let eg = EpsilonGreedyConfig::default();
        Self {
            kind: StrategyKind::default(),
            epsilon: eg.epsilon,
            update: eg.update,
            seed: eg.seed,
        }
    }
}

/// The closed set of selection strategies.
#[derive(Debug, Clone)]
pub enum Strategy {
    EpsilonGreedy(EpsilonGreedy),
    Ucb1(Ucb1),
}

impl Strategy {
    pub fn new(n_arms: usize, cfg: StrategyConfig) -> Result<Self> {
        Ok(match cfg.kind {
            StrategyKind::EpsilonGreedy => Strategy::EpsilonGreedy(EpsilonGreedy::new(
                n_arms,
                EpsilonGreedyConfig {
                    epsilon: cfg.epsilon,
                    update: cfg.update,
                    seed: cfg.seed,
                },
            )?),
            StrategyKind::Ucb1 => Strategy::Ucb1(Ucb1::with_update(n_arms, cfg.update)?),
        })
    }

    pub fn kind(&self) -> StrategyKind {
        match self {
            Strategy::EpsilonGreedy(_) => StrategyKind::EpsilonGreedy,
            Strategy::Ucb1(_) => StrategyKind::Ucb1,
        }
    }

    fn inner(&self) -> &dyn SelectionStrategy {
        match self {
            Strategy::EpsilonGreedy(s) => s,
            Strategy::Ucb1(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SelectionStrategy {
        match self {
            Strategy::EpsilonGreedy(s) => s,
            Strategy::Ucb1(s) => s,
        }
    }
}

impl SelectionStrategy for Strategy {
    fn n_arms(&self) -> usize {
        self.inner().n_arms()
    }

    fn select_arm_explain(&mut self) -> Selection {
        self.inner_mut().select_arm_explain()
    }

    fn update(&mut self, arm: usize, reward: f64) -> Result<()> {
        self.inner_mut().update(arm, reward)
    }

    fn counts(&self) -> &[u64] {
        self.inner().counts()
    }

    fn values(&self) -> &[f64] {
        self.inner().values()
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::EpsilonGreedy(s) => fmt::Display::fmt(s, f),
            Strategy::Ucb1(s) => fmt::Display::fmt(s, f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use super::Strategy;

    fn greedy(n: usize, epsilon: f64) -> EpsilonGreedy {
        EpsilonGreedy::new(
            n,
            EpsilonGreedyConfig {
                epsilon,
                ..EpsilonGreedyConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn zero_epsilon_always_exploits_lowest_argmax() {
        let mut eg = greedy(4, 0.0);
        eg.update(1, 0.7).unwrap();
        eg.update(3, 0.7).unwrap();
        eg.update(2, 0.2).unwrap();
        for _ in 0..50 {
            let s = eg.select_arm_explain();
            assert_eq!(s.arm, 1);
            assert_eq!(s.reason, SelectionReason::Exploit);
        }
    }

    #[test]
    fn full_epsilon_always_explores() {
        let mut eg = greedy(3, 1.0);
        for _ in 0..50 {
            let s = eg.select_arm_explain();
            assert!(s.arm < 3);
            assert_eq!(s.reason, SelectionReason::ExploreRandom);
        }
    }

    #[test]
    fn exploration_draw_covers_every_arm_evenly() {
        for seed in [0u64, 7, 42] {
            let mut eg = EpsilonGreedy::new(
                4,
                EpsilonGreedyConfig {
                    epsilon: 1.0,
                    seed,
                    ..EpsilonGreedyConfig::default()
                },
            )
            .unwrap();
            // Exploit a clear leader so only the random draw can reach the others.
            eg.update(2, 10.0).unwrap();
            let mut hits = [0u32; 4];
            for _ in 0..4000 {
                hits[eg.select_arm()] += 1;
            }
            // Expected 1000 each; sd is about 27.
            for (arm, &h) in hits.iter().enumerate() {
                assert!((850..=1150).contains(&h), "seed {seed}: arm {arm} picked {h} times");
            }
        }
    }

    #[test]
    fn same_seed_same_choices() {
        let mut a = greedy(5, 0.5);
        let mut b = greedy(5, 0.5);
        let xa: Vec<usize> = (0..40).map(|_| a.select_arm()).collect();
        let xb: Vec<usize> = (0..40).map(|_| b.select_arm()).collect();
        assert_eq!(xa, xb);
    }

    #[test]
    fn invalid_epsilon_and_empty_arms_are_rejected() {
        let bad = EpsilonGreedyConfig {
            epsilon: 1.5,
            ..EpsilonGreedyConfig::default()
        };
        assert!(matches!(EpsilonGreedy::new(3, bad), Err(Error::InvalidConfig(_))));
        assert!(matches!(
            EpsilonGreedy::new(0, EpsilonGreedyConfig::default()),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(Ucb1::new(0), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn update_replaces_value_by_default() {
        let mut eg = greedy(2, 0.0);
        eg.update(0, 0.9).unwrap();
        eg.update(0, 0.3).unwrap();
        assert_eq!(eg.counts(), &[2, 0]);
        assert_eq!(eg.values(), &[0.3, 0.0]);
    }

    #[test]
    fn sample_average_keeps_running_mean() {
        let mut u = Ucb1::with_update(2, ValueUpdate::SampleAverage).unwrap();
        u.update(1, 1.0).unwrap();
        u.update(1, 0.0).unwrap();
        u.update(1, 0.5).unwrap();
        assert!((u.values()[1] - 0.5).abs() < 1e-12);
        assert_eq!(u.counts(), &[0, 3]);
    }

    #[test]
    fn out_of_range_update_is_arity_error() {
        let mut u = Ucb1::new(3).unwrap();
        assert!(matches!(
            u.update(3, 1.0),
            Err(Error::Arity { index: 3, n_arms: 3 })
        ));
        let mut eg = greedy(2, 0.1);
        assert!(matches!(eg.update(5, 1.0), Err(Error::Arity { .. })));
        assert_eq!(eg.counts(), &[0, 0]);
    }

    #[test]
    fn ucb1_pulls_each_arm_first_in_order() {
        let mut u = Ucb1::new(3).unwrap();
        // Value state must not matter before every arm has a count.
        for (arm, expect) in [(0usize, 0usize), (1, 1), (2, 2)] {
            let s = u.select_arm_explain();
            assert_eq!(s.arm, expect);
            assert_eq!(s.reason, SelectionReason::ExploreFirst);
            u.update(arm, 10.0 - arm as f64).unwrap();
        }
        assert!(u.scores().is_some());
    }

    #[test]
    fn ucb1_unpulled_arm_wins_even_with_low_index_values() {
        let mut u = Ucb1::new(3).unwrap();
        u.update(0, 5.0).unwrap();
        u.update(2, 5.0).unwrap();
        assert_eq!(u.select_arm(), 1);
    }

    #[test]
    fn ucb1_ties_go_to_lowest_index() {
        let mut u = Ucb1::new(3).unwrap();
        for a in 0..3 {
            u.update(a, 0.5).unwrap();
        }
        let s = u.select_arm_explain();
        assert_eq!(s.arm, 0);
        let expected = 0.5 + (2.0 * 3f64.ln()).sqrt();
        match s.reason {
            SelectionReason::UpperBound { score } => assert!((score - expected).abs() < 1e-12),
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[test]
    fn ucb1_bound_favours_less_pulled_arm() {
        let mut u = Ucb1::new(2).unwrap();
        for _ in 0..20 {
            u.update(0, 0.5).unwrap();
        }
        u.update(1, 0.45).unwrap();
        assert_eq!(u.select_arm(), 1);
    }

    #[test]
    fn strategy_kind_parses_names() {
        assert_eq!("ucb1".parse::<StrategyKind>().unwrap(), StrategyKind::Ucb1);
        assert_eq!(
            "epsilon-greedy".parse::<StrategyKind>().unwrap(),
            StrategyKind::EpsilonGreedy
        );
        assert!(matches!(
            "softmax".parse::<StrategyKind>(),
            Err(Error::UnknownStrategy(_))
        ));
        assert_eq!(StrategyKind::Ucb1.to_string(), "ucb1");
    }

    #[test]
    fn strategy_enum_dispatches() {
        let cfg = StrategyConfig {
            kind: StrategyKind::Ucb1,
            ..StrategyConfig::default()
        };
        let mut s = Strategy::new(2, cfg).unwrap();
        assert_eq!(s.kind(), StrategyKind::Ucb1);
        assert_eq!(s.n_arms(), 2);
        assert_eq!(s.select_arm(), 0);
        s.update(0, 1.0).unwrap();
        assert_eq!(s.select_arm(), 1);
        assert!(s.to_string().starts_with("UCB1 status:"));
    }

    proptest! {
        #[test]
        fn selections_stay_in_range(
            n in 1usize..8,
            epsilon in 0.0f64..=1.0,
            seed in any::<u64>(),
            rewards in proptest::collection::vec(0.0f64..50.0, 0..40),
        ) {
            let mut eg = EpsilonGreedy::new(n, EpsilonGreedyConfig { epsilon, seed, ..EpsilonGreedyConfig::default() }).unwrap();
            let mut u = Ucb1::new(n).unwrap();
            for r in rewards {
                let a = eg.select_arm();
                prop_assert!(a < n);
                eg.update(a, r).unwrap();
                let b = u.select_arm();
                prop_assert!(b < n);
                u.update(b, r).unwrap();
            }
        }

        #[test]
        fn zero_epsilon_matches_argmax(
            values in proptest::collection::vec(0.0f64..10.0, 1..8),
            seed in any::<u64>(),
        ) {
            let mut eg = EpsilonGreedy::new(values.len(), EpsilonGreedyConfig { epsilon: 0.0, seed, ..EpsilonGreedyConfig::default() }).unwrap();
            for (a, &v) in values.iter().enumerate() {
                eg.update(a, v).unwrap();
            }
            let expect = first_argmax(&values);
            for _ in 0..5 {
                prop_assert_eq!(eg.select_arm(), expect);
            }
        }
    }
}
