//! Audit-friendly record of a strategy's choice.
//!
//! Simulation traces want to know not only which arm was advanced but why: a forced
//! first pull, a random exploration step, a greedy choice, or an upper-bound win.

use std::fmt;

/// Why a strategy picked an arm.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionReason {
    /// The arm had never been pulled (stable-order exploration).
    ExploreFirst,
    /// Uniformly random exploration step.
    ExploreRandom,
    /// Arg-max of the current value estimates.
    Exploit,
    /// Arg-max of value + confidence bound.
    UpperBound { score: f64 },
}

impl fmt::Display for SelectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionReason::ExploreFirst => write!(f, "explore-first"),
            SelectionReason::ExploreRandom => write!(f, "explore-random"),
            SelectionReason::Exploit => write!(f, "exploit"),
            SelectionReason::UpperBound { score } => write!(f, "upper-bound({score:.4})"),
        }
    }
}

/// A chosen arm index plus the reason it was chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Selection {
    pub arm: usize,
    pub reason: SelectionReason,
}

/// Index of the first maximum in `xs` (lowest index wins ties).
///
/// Returns `0` for an empty slice.
pub(crate) fn first_argmax(xs: &[f64]) -> usize {
    let mut best = 0usize;
    let mut best_v = f64::NEG_INFINITY;
    for (i, &v) in xs.iter().enumerate() {
        if v > best_v {
            best = i;
            best_v = v;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_argmax_prefers_lowest_index() {
        assert_eq!(first_argmax(&[0.5, 0.5, 0.5]), 0);
        assert_eq!(first_argmax(&[0.1, 0.7, 0.7]), 1);
        assert_eq!(first_argmax(&[]), 0);
    }

    #[test]
    fn reasons_render_compactly() {
        assert_eq!(SelectionReason::ExploreFirst.to_string(), "explore-first");
        assert_eq!(
            SelectionReason::UpperBound { score: 1.5 }.to_string(),
            "upper-bound(1.5000)"
        );
    }
}
