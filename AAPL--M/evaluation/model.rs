//! Single-predictor least-squares model.

use std::{fs, path::Path};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, EvalResult};

/// Singular values below this fraction of the largest are treated as zero.
const PINV_RCOND: f64 = 1e-15;

/// `y = intercept + slope * x`, fit by least squares.
///
/// Serializes as `{"coef_": [slope], "intercept_": intercept}`, the layout the
/// prediction service reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(into = "PersistedModel", try_from = "PersistedModel")]
pub struct LinearModel {
    intercept: f64,
    slope: f64,
}

impl LinearModel {
    /// Builds a model from known coefficients.
    #[must_use]
    pub const fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    /// Fits `y` on `[1, x]` with the minimum-norm least-squares solution.
    ///
    /// A full-rank design gives ordinary least squares. When the smaller
    /// singular value of the design is within `1e-15` of zero relative to the
    /// larger one, the design has rank one and the pseudo-inverse solution is
    /// `ȳ / (1 + x̄²) · (1, x̄)`: every fitted value equals `ȳ` and the
    /// coefficient vector has the smallest norm that achieves it.
    pub fn fit(x: &[f64], y: &[f64]) -> EvalResult<Self> {
        EvalError::check_pair(x.len(), y.len())?;
        EvalError::check_len(x.len(), 2)?;
        if x.iter().chain(y).any(|v| !v.is_finite()) {
            return Err(EvalError::DegenerateFit(
                "design matrix contains non-finite values".into(),
            ));
        }

        let n = x.len() as f64;
        let x_mean = x.iter().sum::<f64>() / n;
        let y_mean = y.iter().sum::<f64>() / n;
        let (sxx, sxy) = x
            .iter()
            .zip(y)
            .fold((0.0, 0.0), |(sxx, sxy), (xi, yi)| {
                let dx = xi - x_mean;
                (dx.mul_add(dx, sxx), dx.mul_add(yi - y_mean, sxy))
            });
        let sum_sq = x.iter().map(|v| v * v).sum::<f64>();

        // Eigenvalues of [[n, Σx], [Σx, Σx²]] are the squared singular values of [1, x].
        let half_gap = (n - sum_sq) / 2.0;
        let lambda_max = (n + sum_sq) / 2.0 + half_gap.hypot(n * x_mean);
        let lambda_min = n * sxx / lambda_max;
        if lambda_min <= PINV_RCOND * PINV_RCOND * lambda_max {
            let scale = y_mean / x_mean.mul_add(x_mean, 1.0);
            return Ok(Self::new(scale, scale * x_mean));
        }

        let slope = sxy / sxx;
        Ok(Self::new(slope.mul_add(-x_mean, y_mean), slope))
    }

    /// Intercept term.
    #[must_use]
    pub const fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Slope on the single predictor.
    #[must_use]
    pub const fn slope(&self) -> f64 {
        self.slope
    }

    /// Coefficient vector without the intercept.
    #[must_use]
    pub const fn coef(&self) -> [f64; 1] {
        [self.slope]
    }

    /// Prediction for one input.
    #[must_use]
    pub fn predict_one(&self, x: f64) -> f64 {
        self.slope.mul_add(x, self.intercept)
    }

    /// Elementwise predictions.
    #[must_use]
    pub fn predict(&self, x: &[f64]) -> Vec<f64> {
        x.iter().map(|&v| self.predict_one(v)).collect()
    }

    /// Residual sum of squares on a sample.
    pub fn rss(&self, x: &[f64], y: &[f64]) -> EvalResult<f64> {
        EvalError::check_pair(x.len(), y.len())?;
        Ok(x
            .iter()
            .zip(y)
            .map(|(&xi, yi)| (yi - self.predict_one(xi)).powi(2))
            .sum())
    }

    /// Writes the model as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating model directory {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
    }

    /// Loads a model written by [`LinearModel::save`] or any producer of the same layout.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents =
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&contents).context("parsing linear model file")
    }
}

#[derive(Serialize, Deserialize)]
struct PersistedModel {
    coef_: Vec<f64>,
    intercept_: f64,
}

impl From<LinearModel> for PersistedModel {
    fn from(model: LinearModel) -> Self {
        Self {
            coef_: model.coef().to_vec(),
            intercept_: model.intercept,
        }
    }
}

impl TryFrom<PersistedModel> for LinearModel {
    type Error = String;

    fn try_from(persisted: PersistedModel) -> Result<Self, Self::Error> {
        match persisted.coef_.as_slice() {
            [slope] => Ok(Self::new(persisted.intercept_, *slope)),
            other => Err(format!(
                "expected exactly one coefficient, found {}",
                other.len()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn recovers_exact_line() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [3.0, 5.0, 7.0, 9.0];
        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.slope() - 2.0).abs() < 1e-12);
        assert!((model.intercept() - 1.0).abs() < 1e-12);
        assert_eq!(model.predict(&[10.0]), vec![21.0]);
    }

    #[test]
    fn least_squares_beats_every_fixed_slope() {
        let x = [0.0, 1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.2, 2.8, 5.1, 7.2, 8.7, 11.3];
        let model = LinearModel::fit(&x, &y).unwrap();
        let best = model.rss(&x, &y).unwrap();

        let x_mean = x.iter().sum::<f64>() / 6.0;
        let y_mean = y.iter().sum::<f64>() / 6.0;
        for step in 0..=400 {
            let slope = -2.0 + f64::from(step) * 0.02;
            let alternative = LinearModel::new(y_mean - slope * x_mean, slope);
            assert!(best <= alternative.rss(&x, &y).unwrap() + 1e-9);
        }
    }

    #[test]
    fn tightly_clustered_predictor_still_gets_ols() {
        let x = [150.0, 150.0 + 1e-6, 150.0 + 2e-6];
        let y = [0.0, 1.0, 2.0];
        let model = LinearModel::fit(&x, &y).unwrap();
        assert!((model.slope() - 1e6).abs() < 100.0);
        assert!(model.rss(&x, &y).unwrap() < 1e-6);

        let flat = LinearModel::new(1.0 - 0.006_666 * 150.0, 0.006_666);
        assert!(model.rss(&x, &y).unwrap() < flat.rss(&x, &y).unwrap());
    }

    #[test]
    fn constant_predictor_uses_minimum_norm_solution() {
        let model = LinearModel::fit(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]).unwrap();
        assert!((model.intercept() - 0.4).abs() < 1e-12);
        assert!((model.slope() - 0.8).abs() < 1e-12);
        assert!((model.predict_one(2.0) - 2.0).abs() < 1e-12);

        let tenths = LinearModel::fit(&[0.1, 0.1, 0.1], &[1.0, 2.0, 3.0]).unwrap();
        assert!((tenths.predict_one(0.1) - 2.0).abs() < 1e-9);
        assert!(tenths.slope().abs() < 1.0);

        let zeros = LinearModel::fit(&[0.0, 0.0], &[4.0, 6.0]).unwrap();
        assert_eq!(zeros, LinearModel::new(5.0, 0.0));
    }

    #[test]
    fn rejects_bad_shapes_and_missing_values() {
        assert!(matches!(
            LinearModel::fit(&[1.0, 2.0], &[1.0]),
            Err(EvalError::ShapeMismatch { left: 2, right: 1 })
        ));
        assert!(matches!(
            LinearModel::fit(&[1.0], &[1.0]),
            Err(EvalError::InsufficientData { needed: 2, found: 1 })
        ));
        assert!(matches!(
            LinearModel::fit(&[1.0, f64::NAN, 3.0], &[1.0, 2.0, 3.0]),
            Err(EvalError::DegenerateFit(_))
        ));
    }

    #[test]
    fn persists_with_coef_and_intercept_fields() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model/model.json");
        let model = LinearModel::new(0.5, 1.25);
        model.save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["coef_"], serde_json::json!([1.25]));
        assert_eq!(raw["intercept_"], serde_json::json!(0.5));
        assert_eq!(LinearModel::load(&path).unwrap(), model);
    }

    #[test]
    fn rejects_multi_coefficient_files() {
        let parsed: Result<LinearModel, _> =
            serde_json::from_str(r#"{"coef_": [1.0, 2.0], "intercept_": 0.0}"#);
        assert!(parsed.is_err());
    }
}
