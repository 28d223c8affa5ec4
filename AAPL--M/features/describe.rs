use aapl_evaluation::{impute, stats, Frame};
use serde::{Deserialize, Serialize};

/// Summary of the present values of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    /// Column name.
    pub column: String,
    /// Present values.
    pub count: usize,
    /// Mean.
    pub mean: f64,
    /// Sample standard deviation; `None` below two values.
    pub std: Option<f64>,
    /// Minimum.
    pub min: f64,
    /// 25th percentile.
    pub q25: f64,
    /// Median.
    pub median: f64,
    /// 75th percentile.
    pub q75: f64,
    /// Maximum.
    pub max: f64,
    /// `max − min`.
    pub range: f64,
}

impl ColumnSummary {
    /// Summarises one column. Every statistic is `NaN` when nothing is present.
    #[must_use]
    pub fn of(column: &str, values: &[f64]) -> Self {
        let mut present: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| !impute::is_missing(*v))
            .collect();
        present.sort_by(f64::total_cmp);
        let min = present.first().copied().unwrap_or(f64::NAN);
        let max = present.last().copied().unwrap_or(f64::NAN);
        Self {
            column: column.to_owned(),
            count: present.len(),
            mean: stats::mean(&present),
            std: stats::sample_std(&present),
            min,
            q25: stats::percentile_sorted(&present, 25.0),
            median: stats::percentile_sorted(&present, 50.0),
            q75: stats::percentile_sorted(&present, 75.0),
            max,
            range: max - min,
        }
    }
}

/// One summary per numeric column, in column order.
#[must_use]
pub fn describe(frame: &Frame) -> Vec<ColumnSummary> {
    frame
        .numeric_columns()
        .filter_map(|name| frame.numeric(name).ok().map(|v| ColumnSummary::of(name, v)))
        .collect()
}
