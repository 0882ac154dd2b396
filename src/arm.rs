//! A single training run viewed as a bandit arm.
//!
//! Pulling an arm means "train for `n` more checkpoints": progress moves forward
//! and the reward is read off a precomputed curve. The curve is the running
//! maximum of the recorded validation reward, so it never decreases; progress
//! past the last recorded checkpoint is clamped to the final reward.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::{Error, Result};

/// Identifier of one arm *instance*.
///
/// Inside an [`ArmSupply`](crate::ArmSupply) this is the instance's issue position:
/// base arms hold ids `0..pool_len`, duplicates are numbered after them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArmId(pub usize);

impl ArmId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ArmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Largest step a learning curve may extend to.
pub const MAX_CURVE_STEP: u64 = 1 << 24;

/// One candidate training run with its own progress counter.
///
/// Cloning an `Arm` shares the curve data; only the bookkeeping is copied.
#[derive(Debug, Clone)]
pub struct Arm {
    id: ArmId,
    base: usize,
    name: Arc<str>,
    curve: Arc<[f64]>,
    max_step: u64,
    current_step: u64,
}

impl Arm {
    /// Build an arm from raw per-step readings of the reward metric.
    ///
    /// Step 0 is implicit (`curve[0] = 0.0`); a reading keyed at 0 is ignored.
    /// The curve runs up to the largest step in `readings`; readings keyed past
    /// [`MAX_CURVE_STEP`] are ignored.
    pub fn from_readings(name: impl Into<String>, readings: &BTreeMap<u64, f64>) -> Self {
        let last = readings.range(..=MAX_CURVE_STEP).next_back().map_or(0, |(&s, _)| s);
        Self::build(name.into(), last, |step| readings.get(&step).copied())
    }

    /// Build an arm from full metrics records, reading only `metric`.
    ///
    /// The curve covers every recorded step (up to the largest step key), while
    /// `max_step` is the last step at which `metric` was actually present.
    /// Steps where `metric` is missing carry the previous value forward.
    /// Records keyed past [`MAX_CURVE_STEP`] are ignored.
    pub fn from_metrics(
        name: impl Into<String>,
        records: &BTreeMap<u64, BTreeMap<String, f64>>,
        metric: &str,
    ) -> Self {
        let last = records.range(..=MAX_CURVE_STEP).next_back().map_or(0, |(&s, _)| s);
        Self::build(name.into(), last, |step| {
            records.get(&step).and_then(|m| m.get(metric)).copied()
        })
    }

    fn build<F>(name: String, last_step: u64, mut reading: F) -> Self
    where
        F: FnMut(u64) -> Option<f64>,
    {
        debug_assert!(last_step <= MAX_CURVE_STEP);
        let len = usize::try_from(last_step).map_or(0, |n| n.saturating_add(1));
        let mut curve: Vec<f64> = Vec::with_capacity(len);
        curve.push(0.0);
        let mut max_step = 0u64;
        for step in 1..=last_step {
            let prev = curve[curve.len() - 1];
            match reading(step) {
                Some(r) => {
                    // `f64::max` drops a NaN reading in favour of `prev`.
                    curve.push(r.max(prev));
                    max_step = step;
                }
                None => curve.push(prev),
            }
        }
        Self {
            id: ArmId(0),
            base: 0,
            name: Arc::from(name),
            curve: Arc::from(curve),
            max_step,
            current_step: 0,
        }
    }

    pub(crate) fn assign(&mut self, id: ArmId, base: usize) {
        self.id = id;
        self.base = base;
    }

    pub(crate) fn rename(&mut self, name: String) {
        self.name = Arc::from(name);
    }

    /// A fresh instance over the same curve: new id, progress reset to step 0.
    pub(crate) fn duplicate(&self, id: ArmId) -> Self {
        Self {
            id,
            base: self.base,
            name: Arc::clone(&self.name),
            curve: Arc::clone(&self.curve),
            max_step: self.max_step,
            current_step: 0,
        }
    }

    pub fn id(&self) -> ArmId {
        self.id
    }

    /// Index of the base curve this instance was issued from.
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The monotone (running-maximum) reward curve, indexed by step.
    pub fn curve(&self) -> &[f64] {
        &self.curve
    }

    /// Whether two instances share the same underlying curve allocation.
    pub fn shares_curve_with(&self, other: &Arm) -> bool {
        Arc::ptr_eq(&self.curve, &other.curve)
    }

    /// Last step at which the reward metric was observed.
    pub fn max_step(&self) -> u64 {
        self.max_step
    }

    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    /// Train for `steps` more checkpoints and return the reward reached.
    ///
    /// `steps` must be at least 1.
    pub fn advance(&mut self, steps: u64) -> Result<f64> {
        if steps == 0 {
            return Err(Error::InvalidAdvance {
                current: self.current_step,
                steps,
            });
        }
        self.current_step = self
            .current_step
            .checked_add(steps)
            .ok_or(Error::InvalidAdvance {
                current: self.current_step,
                steps,
            })?;
        Ok(self.current_reward())
    }

    /// Reward at the current step, clamped to the last observed step.
    pub fn current_reward(&self) -> f64 {
        self.reward_at(self.current_step)
    }

    /// Best reward this run ever reaches.
    pub fn final_reward(&self) -> f64 {
        self.reward_at(self.max_step)
    }

    fn reward_at(&self, step: u64) -> f64 {
        let s = step.min(self.max_step) as usize;
        self.curve.get(s).copied().unwrap_or(0.0)
    }
}

impl fmt::Display for Arm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} len={} [ ", self.name, self.curve.len())?;
        for (i, c) in self.curve.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{c:.4}")?;
        }
        write!(f, " ]")
    }
}
