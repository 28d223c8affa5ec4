//! Missing-value strategies for the predictor column.
//!
//! A value is missing when it is `NaN`. Every strategy fails with
//! [`EvalError::AllMissing`] when no present value exists.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    error::{EvalError, EvalResult},
    stats,
};

/// Signature shared by every imputation strategy.
pub type ImputeFn = fn(&[f64]) -> EvalResult<Vec<f64>>;

/// Whether a value counts as missing.
#[must_use]
pub fn is_missing(value: f64) -> bool {
    value.is_nan()
}

/// `true` where the value is present.
#[must_use]
pub fn present_mask(values: &[f64]) -> Vec<bool> {
    values.iter().map(|&v| !is_missing(v)).collect()
}

/// Number of missing entries.
#[must_use]
pub fn missing_count(values: &[f64]) -> usize {
    values.iter().filter(|&&v| is_missing(v)).count()
}

fn present(values: &[f64]) -> EvalResult<Vec<f64>> {
    let kept: Vec<f64> = values.iter().copied().filter(|&v| !is_missing(v)).collect();
    if kept.is_empty() {
        return Err(EvalError::AllMissing);
    }
    Ok(kept)
}

fn replace_missing(values: &[f64], fill: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if is_missing(v) { fill } else { v })
        .collect()
}

/// Replaces missing values with the mean of the present ones.
pub fn mean_impute(values: &[f64]) -> EvalResult<Vec<f64>> {
    let fill = stats::mean(&present(values)?);
    Ok(replace_missing(values, fill))
}

/// Replaces missing values with the median of the present ones.
pub fn median_impute(values: &[f64]) -> EvalResult<Vec<f64>> {
    let fill = stats::median(&present(values)?);
    Ok(replace_missing(values, fill))
}

/// Replaces missing values with zero.
pub fn zero_fill(values: &[f64]) -> EvalResult<Vec<f64>> {
    present(values)?;
    Ok(replace_missing(values, 0.0))
}

/// Carries the last present value forward; a leading gap takes the first present value.
pub fn forward_fill(values: &[f64]) -> EvalResult<Vec<f64>> {
    let first = *present(values)?.first().ok_or(EvalError::AllMissing)?;
    let mut last = first;
    Ok(values
        .iter()
        .map(|&v| {
            if !is_missing(v) {
                last = v;
            }
            last
        })
        .collect())
}

/// Removes missing entries. Callers must filter any paired column with the same mask.
pub fn drop_missing(values: &[f64]) -> EvalResult<Vec<f64>> {
    present(values)
}

/// Built-in strategies, addressable by their snake_case names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Imputer {
    /// [`mean_impute`]
    MeanImpute,
    /// [`median_impute`]
    MedianImpute,
    /// [`zero_fill`]
    ZeroFill,
    /// [`forward_fill`]
    ForwardFill,
    /// [`drop_missing`]
    DropMissing,
}

impl Imputer {
    /// Every strategy in the standard scenario order.
    pub const ALL: [Self; 5] = [
        Self::MeanImpute,
        Self::MedianImpute,
        Self::ZeroFill,
        Self::ForwardFill,
        Self::DropMissing,
    ];

    /// Scenario name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MeanImpute => "mean_impute",
            Self::MedianImpute => "median_impute",
            Self::ZeroFill => "zero_fill",
            Self::ForwardFill => "forward_fill",
            Self::DropMissing => "drop_missing",
        }
    }

    /// Function implementing the strategy.
    #[must_use]
    pub fn function(self) -> ImputeFn {
        match self {
            Self::MeanImpute => mean_impute,
            Self::MedianImpute => median_impute,
            Self::ZeroFill => zero_fill,
            Self::ForwardFill => forward_fill,
            Self::DropMissing => drop_missing,
        }
    }

    /// Applies the strategy.
    pub fn apply(self, values: &[f64]) -> EvalResult<Vec<f64>> {
        (self.function())(values)
    }

    /// Looks a strategy up by scenario name.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|imputer| imputer.name() == name)
    }
}

/// Ordered table of named imputation scenarios.
#[derive(Debug, Clone, Default)]
pub struct Scenarios {
    table: IndexMap<String, ImputeFn>,
}

impl Scenarios {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All five built-in strategies under their own names.
    #[must_use]
    pub fn standard() -> Self {
        Self::from_imputers(Imputer::ALL)
    }

    /// Table built from built-in strategies, in the given order.
    #[must_use]
    pub fn from_imputers(imputers: impl IntoIterator<Item = Imputer>) -> Self {
        imputers
            .into_iter()
            .fold(Self::new(), |table, imputer| {
                table.with(imputer.name(), imputer.function())
            })
    }

    /// Adds or replaces a scenario; a replaced name keeps its original position.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, imputer: ImputeFn) -> Self {
        self.insert(name, imputer);
        self
    }

    /// Adds or replaces a scenario in place.
    pub fn insert(&mut self, name: impl Into<String>, imputer: ImputeFn) {
        self.table.insert(name.into(), imputer);
    }

    /// Scenarios in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, ImputeFn)> + '_ {
        self.table.iter().map(|(name, f)| (name.as_str(), *f))
    }

    /// Scenario names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.table.keys().map(String::as_str)
    }

    /// Number of scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
