//! Loading learning curves from training metrics files.
//!
//! A metrics file holds one checkpoint per line:
//!
//! ```text
//! 1 perplexity=41.2 bleu-val=10.1
//! 2 perplexity=30.5 bleu-val=12.7
//! ```
//!
//! i.e. an integer step followed by whitespace-separated `key=value` pairs.
//! Blank lines are skipped. Any other malformation fails the whole file, as
//! does a step key past [`MAX_CURVE_STEP`].

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{Arm, ArmSupply, Error, Result, SupplyConfig, MAX_CURVE_STEP};

/// Metric used as the reward unless told otherwise.
pub const DEFAULT_METRIC: &str = "bleu-val";

/// File name that marks a training run's metrics.
pub const METRICS_FILE_NAME: &str = "metrics";

/// Per-step metric records of one run.
pub type MetricsRecords = BTreeMap<u64, BTreeMap<String, f64>>;

/// Parse the text of a metrics file. `source_name` only appears in errors.
pub fn parse_metrics(source_name: &str, text: &str) -> Result<MetricsRecords> {
    let mut out = MetricsRecords::new();
    for (idx, line) in text.lines().enumerate() {
        let malformed = |reason: String| Error::MalformedCurve {
            source_name: source_name.to_string(),
            line: idx + 1,
            reason,
        };
        let mut fields = line.split_whitespace();
        let Some(step_field) = fields.next() else {
            continue;
        };
        let step: u64 = step_field
            .parse()
            .map_err(|e| malformed(format!("bad step {step_field:?}: {e}")))?;
        if step > MAX_CURVE_STEP || usize::try_from(step).is_err() {
            return Err(malformed(format!("step {step} is past the last indexable step {MAX_CURVE_STEP}")));
        }
        let entry = out.entry(step).or_default();
        for kv in fields {
            let (key, value) = kv
                .split_once('=')
                .ok_or_else(|| malformed(format!("expected key=value, got {kv:?}")))?;
            let v: f64 = value
                .parse()
                .map_err(|e| malformed(format!("bad value for {key}: {value:?}: {e}")))?;
            entry.insert(key.to_string(), v);
        }
    }
    Ok(out)
}

/// Read and parse one metrics file into an [`Arm`] using `metric` as reward.
pub fn load_arm(path: &Path, metric: &str) -> Result<Arm> {
    let text = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
    let name = path.display().to_string();
    let records = parse_metrics(&name, &text)?;
    let arm = Arm::from_metrics(name, &records, metric);
    if arm.max_step() == 0 {
        tracing::warn!(path = %path.display(), metric, "no reward readings in metrics file");
    }
    Ok(arm)
}

/// Recursively collect files named [`METRICS_FILE_NAME`] under `root`, sorted by path.
pub fn discover_metrics_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = fs::read_dir(&dir).map_err(|e| Error::io(&dir, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&dir, e))?;
            let path = entry.path();
            let ty = entry.file_type().map_err(|e| Error::io(&path, e))?;
            if ty.is_dir() {
                stack.push(path);
            } else if entry.file_name() == METRICS_FILE_NAME {
                found.push(path);
            }
        }
    }
    found.sort();
    Ok(found)
}

/// Discover, arrange (shuffle / limit) and load every run under `root`.
pub fn load_supply(root: &Path, metric: &str, cfg: SupplyConfig) -> Result<ArmSupply> {
    let mut files = discover_metrics_files(root)?;
    tracing::info!(count = files.len(), root = %root.display(), "found metrics files");
    cfg.arrange(&mut files);
    let pool = files
        .iter()
        .map(|p| load_arm(p, metric))
        .collect::<Result<Vec<_>>>()?;
    ArmSupply::from_pool(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps_and_metrics() {
        let text = "1 perplexity=41.2 bleu-val=10.0\n\n2 perplexity=30.5\n3 bleu-val=12.0 perplexity=20\n";
        let recs = parse_metrics("m", text).unwrap();
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[&1]["bleu-val"], 10.0);
        assert!(!recs[&2].contains_key("bleu-val"));
        assert_eq!(recs[&3]["perplexity"], 20.0);

        let a = Arm::from_metrics("m", &recs, DEFAULT_METRIC);
        assert_eq!(a.curve(), &[0.0, 10.0, 10.0, 12.0]);
        assert_eq!(a.max_step(), 3);
    }

    #[test]
    fn bad_step_is_malformed() {
        let err = parse_metrics("m", "1 bleu-val=1\nx bleu-val=2\n").unwrap_err();
        match err {
            Error::MalformedCurve { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn bad_value_is_malformed() {
        let err = parse_metrics("m", "1 bleu-val=abc\n").unwrap_err();
        assert!(matches!(err, Error::MalformedCurve { line: 1, .. }));
        let err = parse_metrics("m", "1 bleu-val\n").unwrap_err();
        assert!(matches!(err, Error::MalformedCurve { line: 1, .. }));
    }

    #[test]
    fn unindexable_step_is_malformed() {
        let err = parse_metrics("m", "1 bleu-val=1.0\n18446744073709551615 bleu-val=2.0\n").unwrap_err();
        assert!(matches!(err, Error::MalformedCurve { line: 2, .. }));
        let err = parse_metrics("m", "1000000000000 bleu-val=2.0\n").unwrap_err();
        assert!(matches!(err, Error::MalformedCurve { line: 1, .. }));

        let recs = parse_metrics("m", &format!("{MAX_CURVE_STEP} bleu-val=2.0\n")).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn load_arm_rejects_huge_step_without_building_a_curve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METRICS_FILE_NAME);
        fs::write(&path, "1 bleu-val=1.0\n18446744073709551615 bleu-val=2.0\n").unwrap();
        assert!(matches!(load_arm(&path, DEFAULT_METRIC), Err(Error::MalformedCurve { line: 2, .. })));
    }

    #[test]
    fn step_only_line_is_an_empty_record() {
        let recs = parse_metrics("m", "4\n").unwrap();
        assert!(recs[&4].is_empty());
    }
}
