//! Pointwise regression error metrics.

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

fn validate(y_true: &[f64], y_pred: &[f64]) -> EvalResult<()> {
    EvalError::check_pair(y_true.len(), y_pred.len())?;
    EvalError::check_len(y_true.len(), 1)
}

fn squared_errors(y_true: &[f64], y_pred: &[f64]) -> f64 {
    y_true
        .iter()
        .zip(y_pred)
        .map(|(t, p)| (t - p).powi(2))
        .sum()
}

/// Mean absolute error.
pub fn mae(y_true: &[f64], y_pred: &[f64]) -> EvalResult<f64> {
    validate(y_true, y_pred)?;
    let total: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).abs()).sum();
    Ok(total / y_true.len() as f64)
}

/// Mean squared error.
pub fn mse(y_true: &[f64], y_pred: &[f64]) -> EvalResult<f64> {
    validate(y_true, y_pred)?;
    Ok(squared_errors(y_true, y_pred) / y_true.len() as f64)
}

/// Root mean squared error.
pub fn rmse(y_true: &[f64], y_pred: &[f64]) -> EvalResult<f64> {
    mse(y_true, y_pred).map(f64::sqrt)
}

/// Coefficient of determination.
///
/// Fails with [`EvalError::DegenerateTarget`] when every `y_true` is identical.
pub fn r2(y_true: &[f64], y_pred: &[f64]) -> EvalResult<f64> {
    validate(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    if ss_tot == 0.0 {
        return Err(EvalError::DegenerateTarget);
    }
    Ok(1.0 - squared_errors(y_true, y_pred) / ss_tot)
}

/// Named metric, usable wherever a metric function is expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// [`mae`]
    Mae,
    /// [`rmse`]
    Rmse,
    /// [`r2`]
    R2,
}

impl Metric {
    /// Every metric in report order.
    pub const ALL: [Self; 3] = [Self::Mae, Self::Rmse, Self::R2];

    /// Column name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mae => "mae",
            Self::Rmse => "rmse",
            Self::R2 => "r2",
        }
    }

    /// Evaluates the metric.
    pub fn compute(self, y_true: &[f64], y_pred: &[f64]) -> EvalResult<f64> {
        match self {
            Self::Mae => mae(y_true, y_pred),
            Self::Rmse => rmse(y_true, y_pred),
            Self::R2 => r2(y_true, y_pred),
        }
    }

    /// Whether smaller values are better.
    #[must_use]
    pub const fn lower_is_better(self) -> bool {
        !matches!(self, Self::R2)
    }
}

/// MAE, RMSE and R² for one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Coefficient of determination.
    pub r2: f64,
}

impl MetricSet {
    /// Computes all three metrics; fails if any of them does.
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> EvalResult<Self> {
        Ok(Self {
            mae: mae(y_true, y_pred)?,
            rmse: rmse(y_true, y_pred)?,
            r2: r2(y_true, y_pred)?,
        })
    }

    /// Value for a named metric.
    #[must_use]
    pub const fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Mae => self.mae,
            Metric::Rmse => self.rmse,
            Metric::R2 => self.r2,
        }
    }
}
