//! Residual diagnostics per subgroup with pairwise two-sample t-tests.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::{EvalError, EvalResult},
    frame::Frame,
    stats,
    telemetry::{emit, EvaluationTelemetry},
};

/// Significance level used by [`diagnose`].
pub const DEFAULT_SIGNIFICANCE: f64 = 0.05;

/// Residual summary for one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupStats {
    /// Group label.
    pub group: String,
    /// Number of residuals.
    pub count: usize,
    /// Mean residual.
    pub mean: f64,
    /// Sample standard deviation; `None` for a single residual.
    pub std: Option<f64>,
    /// Median residual.
    pub median: f64,
    /// Smallest residual.
    pub min: f64,
    /// Largest residual.
    pub max: f64,
}

impl GroupStats {
    fn from_residuals(group: &str, residuals: &[f64]) -> Self {
        Self {
            group: group.to_owned(),
            count: residuals.len(),
            mean: stats::mean(residuals),
            std: stats::sample_std(residuals),
            median: stats::median(residuals),
            min: residuals.iter().copied().fold(f64::INFINITY, f64::min),
            max: residuals.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }
}

/// Student's t-test between the residuals of two groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseTest {
    /// First group, in order of appearance.
    pub group1: String,
    /// Second group.
    pub group2: String,
    /// t statistic of `group1 − group2`.
    pub t_stat: f64,
    /// Two-sided p-value.
    pub p_value: f64,
    /// `p_value` below the significance level.
    pub significant: bool,
}

/// Pair not tested because a group has fewer than two residuals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedPair {
    /// First group.
    pub group1: String,
    /// Second group.
    pub group2: String,
    /// Why the pair was skipped.
    pub reason: String,
}

/// Output of [`diagnose`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubgroupReport {
    /// Per-group residual statistics, sorted by label.
    pub groups: Vec<GroupStats>,
    /// Tests for every pair with at least two residuals on each side.
    pub pairs: Vec<PairwiseTest>,
    /// Pairs that were not tested.
    pub skipped_pairs: Vec<SkippedPair>,
}

impl SubgroupReport {
    /// Statistics for one group.
    #[must_use]
    pub fn group(&self, label: &str) -> Option<&GroupStats> {
        self.groups.iter().find(|g| g.group == label)
    }

    /// Test between two groups, in either order.
    #[must_use]
    pub fn pair(&self, a: &str, b: &str) -> Option<&PairwiseTest> {
        self.pairs.iter().find(|p| {
            (p.group1 == a && p.group2 == b) || (p.group1 == b && p.group2 == a)
        })
    }

    /// Tests flagged as significant.
    pub fn significant_pairs(&self) -> impl Iterator<Item = &PairwiseTest> + '_ {
        self.pairs.iter().filter(|p| p.significant)
    }
}

/// `target − prediction`, elementwise.
pub fn residuals(target: &[f64], prediction: &[f64]) -> EvalResult<Vec<f64>> {
    EvalError::check_pair(target.len(), prediction.len())?;
    Ok(target.iter().zip(prediction).map(|(t, p)| t - p).collect())
}

/// Groups residuals by `group_col` and tests every pair of groups at 0.05.
pub fn diagnose(
    frame: &Frame,
    group_col: &str,
    target_col: &str,
    pred_col: &str,
) -> EvalResult<SubgroupReport> {
    diagnose_at(frame, group_col, target_col, pred_col, DEFAULT_SIGNIFICANCE)
}

/// [`diagnose`] with a caller-chosen significance level.
pub fn diagnose_at(
    frame: &Frame,
    group_col: &str,
    target_col: &str,
    pred_col: &str,
    significance: f64,
) -> EvalResult<SubgroupReport> {
    diagnose_with_telemetry(frame, group_col, target_col, pred_col, significance, None)
}

/// [`diagnose_at`], reporting skipped pairs to `telemetry`.
///
/// Rows with a missing residual or group are ignored. `group_col` may be a
/// label column or a numeric one.
pub fn diagnose_with_telemetry(
    frame: &Frame,
    group_col: &str,
    target_col: &str,
    pred_col: &str,
    significance: f64,
    telemetry: Option<&EvaluationTelemetry>,
) -> EvalResult<SubgroupReport> {
    if !(significance > 0.0 && significance < 1.0) {
        return Err(EvalError::InvalidParameter {
            name: "significance",
            reason: format!("must lie strictly between 0 and 1, got {significance}"),
        });
    }
    let keys = group_keys(frame, group_col)?;
    let residuals = residuals(frame.numeric(target_col)?, frame.numeric(pred_col)?)?;

    let mut grouped: IndexMap<String, Vec<f64>> = IndexMap::new();
    for (key, residual) in keys.into_iter().zip(residuals) {
        if let Some(key) = key {
            if !residual.is_nan() {
                grouped.entry(key).or_default().push(residual);
            }
        }
    }

    let mut report = SubgroupReport {
        groups: grouped
            .iter()
            .map(|(group, values)| GroupStats::from_residuals(group, values))
            .collect(),
        ..SubgroupReport::default()
    };
    report.groups.sort_by(|a, b| a.group.cmp(&b.group));

    let labels: Vec<&String> = grouped.keys().collect();
    for (i, first) in labels.iter().enumerate() {
        for second in &labels[i + 1..] {
            match stats::student_t_test(&grouped[*first], &grouped[*second]) {
                Ok(test) => report.pairs.push(PairwiseTest {
                    group1: (*first).clone(),
                    group2: (*second).clone(),
                    t_stat: test.statistic,
                    p_value: test.p_value,
                    significant: test.p_value < significance,
                }),
                Err(err) => {
                    emit(
                        telemetry,
                        LogLevel::Debug,
                        "subgroup.pair_skipped",
                        json!({ "group1": first, "group2": second, "reason": err.to_string() }),
                    );
                    report.skipped_pairs.push(SkippedPair {
                        group1: (*first).clone(),
                        group2: (*second).clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
    }
    emit(
        telemetry,
        LogLevel::Info,
        "subgroup.diagnosed",
        json!({
            "groups": report.groups.len(),
            "pairs": report.pairs.len(),
            "significant": report.significant_pairs().count(),
        }),
    );
    Ok(report)
}

fn group_keys(frame: &Frame, column: &str) -> EvalResult<Vec<Option<String>>> {
    if let Ok(labels) = frame.labels(column) {
        return Ok(labels.iter().cloned().map(Some).collect());
    }
    let values = frame.numeric(column)?;
    Ok(values
        .iter()
        .map(|v| (!v.is_nan()).then(|| v.to_string()))
        .collect())
}
