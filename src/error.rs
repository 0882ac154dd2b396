//! Error types for curve loading and simulation.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for `lcbandit` operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading curves or running a simulation.
#[derive(Debug, Error)]
pub enum Error {
    /// A metrics record could not be parsed (bad step or metric value).
    ///
    /// `line` is 1-based.
    #[error("malformed curve record in {source_name} at line {line}: {reason}")]
    MalformedCurve {
        source_name: String,
        line: usize,
        reason: String,
    },

    /// Reading a metrics file or walking a data directory failed.
    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An arm was asked to advance by zero steps, or its step counter would overflow.
    #[error("invalid advance: current_step={current} steps={steps}")]
    InvalidAdvance { current: u64, steps: u64 },

    /// An arm index is outside `[0, n_arms)`.
    #[error("arm index {index} out of range for {n_arms} arms")]
    Arity { index: usize, n_arms: usize },

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A strategy name did not match any known selection strategy.
    #[error("unknown selection strategy: {0} (expected one of: epsilon-greedy, ucb1)")]
    UnknownStrategy(String),

    /// The base pool has no curves.
    #[error("arm pool is empty")]
    EmptyPool,
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
