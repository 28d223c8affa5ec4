//! Column-level cleaning applied before feature engineering.

use aapl_evaluation::{
    error::EvalError,
    impute::{self, median_impute},
    Frame,
};
use indexmap::IndexMap;

use crate::error::FeatureResult;

/// Replaces `NaN` in each listed column with that column's median.
///
/// Names that are not numeric columns are ignored, as are columns with no
/// present value.
#[must_use]
pub fn fill_missing_median(frame: &Frame, columns: &[&str]) -> Frame {
    let mut out = frame.clone();
    for &name in columns {
        let Ok(values) = out.numeric_mut(name) else {
            continue;
        };
        if let Ok(filled) = median_impute(values) {
            values.copy_from_slice(&filled);
        }
    }
    out
}

/// Share of missing values per numeric column.
#[must_use]
pub fn missing_ratios(frame: &Frame) -> IndexMap<String, f64> {
    frame
        .numeric_columns()
        .filter_map(|name| {
            let values = frame.numeric(name).ok()?;
            let ratio = if values.is_empty() {
                0.0
            } else {
                impute::missing_count(values) as f64 / values.len() as f64
            };
            Some((name.to_owned(), ratio))
        })
        .collect()
}

/// Drops numeric columns whose missing ratio exceeds `threshold`.
pub fn drop_sparse_columns(frame: &Frame, threshold: f64) -> FeatureResult<Frame> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(EvalError::InvalidParameter {
            name: "threshold",
            reason: format!("must lie in [0, 1], got {threshold}"),
        }
        .into());
    }
    let mut out = frame.clone();
    for (name, ratio) in missing_ratios(frame) {
        if ratio > threshold {
            out.remove_numeric(&name);
        }
    }
    Ok(out)
}

/// Rescales each listed column to `[0, 1]`.
///
/// A constant column becomes all zeros; `NaN` stays `NaN`. Names that are not
/// numeric columns are ignored.
#[must_use]
pub fn normalize_min_max(frame: &Frame, columns: &[&str]) -> Frame {
    let mut out = frame.clone();
    for &name in columns {
        let Ok(values) = out.numeric_mut(name) else {
            continue;
        };
        let (lo, hi) = values
            .iter()
            .filter(|v| !v.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if lo > hi {
            continue;
        }
        let range = hi - lo;
        for v in values.iter_mut().filter(|v| !v.is_nan()) {
            *v = if range > 0.0 { (*v - lo) / range } else { 0.0 };
        }
    }
    out
}
