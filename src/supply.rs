//! The pool of candidate runs, and the (unbounded) stream of arm instances drawn from it.
//!
//! An [`ArmSupply`] owns every arm instance it ever hands out. Consumers get an
//! [`ArmId`] back from [`ArmSupply::sample_arm`] and advance that instance through
//! the supply, so the supply can always summarize the whole experiment.
//!
//! Issue policy:
//! - the k-th sample for `k < pool_len` is base arm `k` itself;
//! - later samples are fresh duplicates of base arm `k % pool_len`
//!   (shared curve, progress reset to step 0, new id).

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::{Arm, ArmId, Error, Result};

/// How the base pool is ordered and bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupplyConfig {
    /// Shuffle the base pool once at construction.
    pub randomize: bool,
    /// Seed for the shuffle (ignored unless `randomize`).
    pub seed: u64,
    /// Keep at most this many base curves (applied after shuffling).
    pub file_limit: Option<usize>,
}

impl SupplyConfig {
    /// Apply the ordering policy to any list of pool items (arms, file paths, ...).
    pub fn arrange<T>(&self, items: &mut Vec<T>) {
        if self.randomize {
            let mut rng = StdRng::seed_from_u64(self.seed);
            items.shuffle(&mut rng);
        }
        if let Some(limit) = self.file_limit {
            items.truncate(limit);
        }
    }
}

/// Experiment-wide summary over every instance issued so far.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SupplyStats {
    /// Instance with the highest current reward (first one wins ties).
    pub best_arm: ArmId,
    pub best_current_reward: f64,
    /// Final reward of `best_arm`'s curve.
    pub best_final_reward: f64,
    /// Sum of `current_step` over all instances.
    pub total_resource: u64,
    /// `oracle_reward - best_final_reward`.
    pub terminal_regret: f64,
    /// Instances with `current_step > 0`.
    pub num_arms_examined: usize,
}

/// What an external plotter needs to draw one arm: its curve and where it stopped.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveSnapshot {
    pub id: ArmId,
    pub name: String,
    pub curve: Vec<f64>,
    pub current_step: u64,
    pub current_reward: f64,
}

/// Owner of the base pool and of every duplicate issued from it.
#[derive(Debug, Clone)]
pub struct ArmSupply {
    pool_len: usize,
    /// Base arms at `0..pool_len`, then duplicates in issue order.
    instances: Vec<Arm>,
    duplicates: BTreeMap<usize, Vec<ArmId>>,
    issued: usize,
    oracle_reward: f64,
    oracle_arm: usize,
}

impl ArmSupply {
    /// Build a supply, arranging the pool per `cfg` first.
    pub fn new(mut pool: Vec<Arm>, cfg: SupplyConfig) -> Result<Self> {
        cfg.arrange(&mut pool);
        Self::from_pool(pool)
    }

    /// Build a supply over `pool` in the given order.
    ///
    /// Base arms are renamed `k:<name>` after their position.
    pub fn from_pool(pool: Vec<Arm>) -> Result<Self> {
        if pool.is_empty() {
            return Err(Error::EmptyPool);
        }
        let mut instances = pool;
        let mut oracle_reward = 0.0;
        let mut oracle_arm = 0;
        for (k, a) in instances.iter_mut().enumerate() {
            a.assign(ArmId(k), k);
            let name = format!("{k}:{}", a.name());
            a.rename(name);
            if oracle_reward < a.final_reward() {
                oracle_reward = a.final_reward();
                oracle_arm = k;
            }
        }
        tracing::info!(
            pool = instances.len(),
            oracle_arm,
            oracle_reward,
            "arm supply ready"
        );
        Ok(Self {
            pool_len: instances.len(),
            instances,
            duplicates: BTreeMap::new(),
            issued: 0,
            oracle_reward,
            oracle_arm,
        })
    }

    /// Hand out the next arm instance. Never fails: the pool is recycled through duplicates.
    pub fn sample_arm(&mut self) -> ArmId {
        let k = self.issued;
        self.issued += 1;
        if k < self.pool_len {
            return ArmId(k);
        }
        let base = k % self.pool_len;
        let id = ArmId(self.instances.len());
        let dup = self.instances[base].duplicate(id);
        tracing::debug!(%id, base, name = dup.name(), "issuing duplicate arm");
        self.instances.push(dup);
        self.duplicates.entry(base).or_default().push(id);
        id
    }

    /// Advance instance `id` by `steps` and return its reward.
    pub fn advance(&mut self, id: ArmId, steps: u64) -> Result<f64> {
        let n_arms = self.instances.len();
        self.instances
            .get_mut(id.0)
            .ok_or(Error::Arity {
                index: id.0,
                n_arms,
            })?
            .advance(steps)
    }

    pub fn arm(&self, id: ArmId) -> Option<&Arm> {
        self.instances.get(id.0)
    }

    /// Every instance: the base pool followed by duplicates in issue order.
    pub fn instances(&self) -> &[Arm] {
        &self.instances
    }

    pub fn pool_len(&self) -> usize {
        self.pool_len
    }

    /// Number of `sample_arm` calls so far.
    pub fn issued(&self) -> usize {
        self.issued
    }

    pub fn duplicates_of(&self, base: usize) -> &[ArmId] {
        self.duplicates
            .get(&base)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn duplicate_count(&self, base: usize) -> usize {
        self.duplicates_of(base).len()
    }

    /// Best final reward in the base pool.
    pub fn oracle_reward(&self) -> f64 {
        self.oracle_reward
    }

    /// Base index holding the oracle reward (lowest index on ties).
    pub fn oracle_arm(&self) -> usize {
        self.oracle_arm
    }

    pub fn stats(&self) -> SupplyStats {
        let mut best_arm = 0usize;
        let mut best_current_reward = 0.0;
        let mut total_resource = 0u64;
        let mut num_arms_examined = 0usize;
        for (i, a) in self.instances.iter().enumerate() {
            total_resource = total_resource.saturating_add(a.current_step());
            if a.current_reward() > best_current_reward {
                best_arm = i;
                best_current_reward = a.current_reward();
            }
            if a.current_step() > 0 {
                num_arms_examined += 1;
            }
        }
        let best_final_reward = self.instances[best_arm].final_reward();
        SupplyStats {
            best_arm: ArmId(best_arm),
            best_current_reward,
            best_final_reward,
            total_resource,
            terminal_regret: self.oracle_reward - best_final_reward,
            num_arms_examined,
        }
    }

    pub fn curve_snapshots(&self) -> Vec<CurveSnapshot> {
        self.instances
            .iter()
            .map(|a| CurveSnapshot {
                id: a.id(),
                name: a.name().to_string(),
                curve: a.curve().to_vec(),
                current_step: a.current_step(),
                current_reward: a.current_reward(),
            })
            .collect()
    }
}

impl fmt::Display for ArmSupply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Multi-arm experiment status ===")?;
        writeln!(f, "id current_step max_step current_reward final_reward name")?;
        for (i, a) in self.instances.iter().enumerate() {
            writeln!(
                f,
                "{i} {} {} {:.6} {:.6} {}",
                a.current_step(),
                a.max_step(),
                a.current_reward(),
                a.final_reward(),
                a.name()
            )?;
        }
        let s = self.stats();
        writeln!(
            f,
            "chosen_arm={} final_reward={:.6} oracle={:.6} regret={:.6} resource={} num_arms_examined={}",
            s.best_arm,
            s.best_final_reward,
            self.oracle_reward,
            s.terminal_regret,
            s.total_resource,
            s.num_arms_examined
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn arm(name: &str, pairs: &[(u64, f64)]) -> Arm {
        Arm::from_readings(name, &pairs.iter().copied().collect())
    }

    fn pool() -> Vec<Arm> {
        vec![
            arm("a", &[(1, 1.0), (2, 2.0), (3, 3.0)]),
            arm("b", &[(1, 5.0), (2, 6.0)]),
            arm("c", &[(1, 0.5), (2, 4.0), (3, 4.5), (4, 4.6)]),
        ]
    }

    #[test]
    fn empty_pool_is_rejected() {
        assert!(matches!(ArmSupply::from_pool(Vec::new()), Err(Error::EmptyPool)));
    }

    #[test]
    fn oracle_is_best_final_reward() {
        let s = ArmSupply::from_pool(pool()).unwrap();
        assert_eq!(s.oracle_arm(), 1);
        assert_eq!(s.oracle_reward(), 6.0);
        assert_eq!(s.arm(ArmId(1)).unwrap().name(), "1:b");
    }

    #[test]
    fn base_arms_first_then_fresh_duplicates() {
        let mut s = ArmSupply::from_pool(pool()).unwrap();
        let first: Vec<ArmId> = (0..3).map(|_| s.sample_arm()).collect();
        assert_eq!(first, vec![ArmId(0), ArmId(1), ArmId(2)]);

        s.advance(ArmId(1), 2).unwrap();
        let d = s.sample_arm();
        assert_eq!(d, ArmId(3));
        let dup = s.arm(d).unwrap();
        assert_eq!(dup.base(), 0);
        assert_eq!(dup.current_step(), 0);

        let d2 = s.sample_arm();
        let dup2 = s.arm(d2).unwrap();
        assert_eq!(dup2.base(), 1);
        assert_eq!(dup2.current_step(), 0, "duplicate of an advanced arm starts fresh");
        assert!(dup2.shares_curve_with(&s.instances()[1]));
        assert_eq!(s.duplicate_count(1), 1);
        assert_eq!(s.duplicates_of(0), &[ArmId(3)]);
        assert_eq!(s.duplicate_count(2), 0);
    }

    #[test]
    fn advance_unknown_id_is_arity_error() {
        let mut s = ArmSupply::from_pool(pool()).unwrap();
        assert!(matches!(
            s.advance(ArmId(9), 1),
            Err(Error::Arity { index: 9, n_arms: 3 })
        ));
    }

    #[test]
    fn stats_cover_all_instances() {
        let mut s = ArmSupply::from_pool(pool()).unwrap();
        for _ in 0..4 {
            s.sample_arm();
        }
        s.advance(ArmId(0), 1).unwrap();
        s.advance(ArmId(2), 2).unwrap();
        s.advance(ArmId(3), 5).unwrap();

        let st = s.stats();
        assert_eq!(st.total_resource, 8);
        assert_eq!(st.num_arms_examined, 3);
        assert_eq!(st.best_arm, ArmId(2));
        assert_eq!(st.best_current_reward, 4.0);
        assert_eq!(st.best_final_reward, 4.6);
        assert!((st.terminal_regret - 1.4).abs() < 1e-12);
    }

    #[test]
    fn stats_before_any_pull_picks_first_arm() {
        let s = ArmSupply::from_pool(pool()).unwrap();
        let st = s.stats();
        assert_eq!(st.best_arm, ArmId(0));
        assert_eq!(st.total_resource, 0);
        assert_eq!(st.num_arms_examined, 0);
        assert_eq!(st.terminal_regret, 3.0);
    }

    #[test]
    fn randomized_order_is_seeded_and_limited() {
        let cfg = SupplyConfig {
            randomize: true,
            seed: 7,
            file_limit: Some(2),
        };
        let a = ArmSupply::new(pool(), cfg).unwrap();
        let b = ArmSupply::new(pool(), cfg).unwrap();
        assert_eq!(a.pool_len(), 2);
        let names_a: Vec<&str> = a.instances().iter().map(Arm::name).collect();
        let names_b: Vec<&str> = b.instances().iter().map(Arm::name).collect();
        assert_eq!(names_a, names_b);
        assert!(names_a[0].starts_with("0:"));
        assert!(names_a[1].starts_with("1:"));
    }

    #[test]
    fn status_table_lists_every_instance() {
        let mut s = ArmSupply::from_pool(pool()).unwrap();
        for _ in 0..4 {
            s.sample_arm();
        }
        let table = s.to_string();
        assert_eq!(table.lines().count(), 2 + 4 + 1);
        assert!(table.contains("oracle=6.000000"));
    }

    #[test]
    fn snapshots_report_stopping_points() {
        let mut s = ArmSupply::from_pool(pool()).unwrap();
        s.advance(ArmId(2), 3).unwrap();
        let snaps = s.curve_snapshots();
        assert_eq!(snaps.len(), 3);
        assert_eq!(snaps[2].current_step, 3);
        assert_eq!(snaps[2].current_reward, 4.5);
        assert_eq!(snaps[2].curve, vec![0.0, 0.5, 4.0, 4.5, 4.6]);
    }

    proptest! {
        #[test]
        fn later_samples_are_fresh_and_unique(
            pool_len in 1usize..6,
            draws in 0usize..30,
            pulls in proptest::collection::vec((0usize..40, 1u64..5), 0..20),
        ) {
            let arms: Vec<Arm> = (0..pool_len)
                .map(|i| arm(&format!("r{i}"), &[(1, i as f64), (2, i as f64 + 1.0)]))
                .collect();
            let mut s = ArmSupply::from_pool(arms).unwrap();
            let mut seen = std::collections::BTreeSet::new();
            for k in 0..(pool_len + draws) {
                // Interleave pulls on already-issued instances.
                if let Some(&(idx, steps)) = pulls.get(k) {
                    if idx < s.instances().len() {
                        s.advance(ArmId(idx), steps).unwrap();
                    }
                }
                let id = s.sample_arm();
                prop_assert!(seen.insert(id), "id {id} issued twice");
                if k >= pool_len {
                    prop_assert_eq!(s.arm(id).unwrap().current_step(), 0);
                    prop_assert_eq!(s.arm(id).unwrap().base(), k % pool_len);
                } else {
                    prop_assert_eq!(id, ArmId(k));
                }
            }
            prop_assert!(s.stats().terminal_regret >= 0.0);
        }
    }
}
