//! Seeded bootstrap resampling and percentile confidence intervals.
//!
//! Every run draws its index vectors from `ChaCha8Rng::seed_from_u64(seed)`:
//! iteration `k` consumes `len` calls to `gen_range(0..len)` after the
//! `k - 1` iterations before it. The same seed, length and iteration count
//! therefore always reproduce the same resamples with this crate version,
//! which [`draw_indices`] exposes for inspection. Paired arrays are always
//! gathered with one shared index vector so `(x, y)` pairs stay intact.

use ndarray::{Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{EvalError, EvalResult},
    metrics::Metric,
    model::LinearModel,
    stats,
};

/// Default number of resamples.
pub const DEFAULT_N_BOOT: usize = 500;
/// Default PRNG seed.
pub const DEFAULT_SEED: u64 = 111;
/// Default two-sided miss rate; 0.05 gives the 2.5/97.5 percentile interval.
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Resampling parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    /// Number of resamples to attempt.
    pub n_boot: usize,
    /// PRNG seed.
    pub seed: u64,
    /// Interval miss rate, split evenly between both tails.
    pub alpha: f64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            n_boot: DEFAULT_N_BOOT,
            seed: DEFAULT_SEED,
            alpha: DEFAULT_ALPHA,
        }
    }
}

impl BootstrapConfig {
    /// Sets the number of resamples.
    #[must_use]
    pub const fn with_n_boot(mut self, n_boot: usize) -> Self {
        self.n_boot = n_boot;
        self
    }

    /// Sets the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the miss rate.
    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Rejects a zero resample count and an `alpha` outside `(0, 1)`.
    pub fn validate(&self) -> EvalResult<()> {
        if self.n_boot == 0 {
            return Err(EvalError::InvalidParameter {
                name: "n_boot",
                reason: "must be at least 1".into(),
            });
        }
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(EvalError::InvalidParameter {
                name: "alpha",
                reason: format!("must lie strictly between 0 and 1, got {}", self.alpha),
            });
        }
        Ok(())
    }

    /// Lower percentile on the 0–100 scale.
    #[must_use]
    pub fn lower_percentile(&self) -> f64 {
        100.0 * self.alpha / 2.0
    }

    /// Upper percentile on the 0–100 scale.
    #[must_use]
    pub fn upper_percentile(&self) -> f64 {
        100.0 * (1.0 - self.alpha / 2.0)
    }
}

/// Iterator over the index vectors of one bootstrap run.
#[derive(Debug, Clone)]
pub struct ResampleStream {
    rng: ChaCha8Rng,
    len: usize,
    remaining: usize,
}

impl ResampleStream {
    /// Stream of `n_boot` index vectors of length `len`.
    #[must_use]
    pub fn new(seed: u64, len: usize, n_boot: usize) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            len,
            remaining: n_boot,
        }
    }
}

impl Iterator for ResampleStream {
    type Item = Vec<usize>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let len = self.len;
        Some((0..len).map(|_| self.rng.gen_range(0..len)).collect())
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for ResampleStream {}

/// Every index vector a run with these parameters would use.
#[must_use]
pub fn draw_indices(seed: u64, len: usize, n_boot: usize) -> Vec<Vec<usize>> {
    ResampleStream::new(seed, len, n_boot).collect()
}

/// `values[i]` for each index, in order.
#[must_use]
pub fn gather(values: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| values[i]).collect()
}

/// Statistic values that survived a run.
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapDistribution<T> {
    /// Surviving values, in iteration order.
    pub values: Vec<T>,
    /// Iterations attempted.
    pub attempted: usize,
}

impl<T> BootstrapDistribution<T> {
    /// Iterations whose statistic failed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.attempted - self.values.len()
    }
}

/// Runs `statistic` on every resample of a dataset with `len` rows.
///
/// The closure receives the index vector and maps it to any value. Failed
/// iterations are skipped, not retried. Fails with
/// [`EvalError::InsufficientBootstrapSamples`] when nothing survives.
pub fn bootstrap_distribution<T, F>(
    len: usize,
    config: &BootstrapConfig,
    mut statistic: F,
) -> EvalResult<BootstrapDistribution<T>>
where
    F: FnMut(&[usize]) -> EvalResult<T>,
{
    config.validate()?;
    EvalError::check_len(len, 1)?;
    let mut values = Vec::with_capacity(config.n_boot);
    for (iteration, indices) in ResampleStream::new(config.seed, len, config.n_boot).enumerate() {
        match statistic(&indices) {
            Ok(value) => values.push(value),
            Err(err) => debug!(iteration, error = %err, "bootstrap iteration skipped"),
        }
    }
    if values.is_empty() {
        return Err(EvalError::InsufficientBootstrapSamples {
            attempted: config.n_boot,
        });
    }
    Ok(BootstrapDistribution {
        values,
        attempted: config.n_boot,
    })
}

/// Bootstraps a scalar statistic and summarises it as a percentile interval.
///
/// A non-finite statistic counts as a failed iteration.
pub fn bootstrap<F>(
    len: usize,
    config: &BootstrapConfig,
    mut statistic: F,
) -> EvalResult<BootstrapResult>
where
    F: FnMut(&[usize]) -> EvalResult<f64>,
{
    let distribution =
        bootstrap_distribution(len, config, |indices| statistic(indices).and_then(finite))?;
    BootstrapResult::from_samples(&distribution.values, config.alpha)
}

/// Bootstraps a statistic of two paired arrays resampled with shared indices.
pub fn bootstrap_pairs<F>(
    first: &[f64],
    second: &[f64],
    config: &BootstrapConfig,
    mut statistic: F,
) -> EvalResult<BootstrapResult>
where
    F: FnMut(&[f64], &[f64]) -> EvalResult<f64>,
{
    EvalError::check_pair(first.len(), second.len())?;
    bootstrap(first.len(), config, |indices| {
        statistic(&gather(first, indices), &gather(second, indices))
    })
}

fn finite(value: f64) -> EvalResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EvalError::DegenerateFit(format!("statistic evaluated to {value}")))
    }
}

/// Percentile interval over a bootstrap distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BootstrapResult {
    /// Mean of the distribution.
    pub mean: f64,
    /// Percentile at `100·alpha/2`.
    pub lower: f64,
    /// Percentile at `100·(1 − alpha/2)`.
    pub upper: f64,
    /// Sample standard deviation (`ddof = 1`); zero for a single sample.
    pub std: f64,
    /// Number of surviving iterations.
    pub samples: usize,
}

impl BootstrapResult {
    /// Summarises raw statistic values.
    pub fn from_samples(values: &[f64], alpha: f64) -> EvalResult<Self> {
        if values.is_empty() {
            return Err(EvalError::InsufficientBootstrapSamples { attempted: 0 });
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Ok(Self {
            mean: stats::mean(values),
            lower: stats::percentile_sorted(&sorted, 100.0 * alpha / 2.0),
            upper: stats::percentile_sorted(&sorted, 100.0 * (1.0 - alpha / 2.0)),
            std: stats::sample_std(values).unwrap_or(0.0),
            samples: values.len(),
        })
    }

    /// Whether `value` lies inside the closed interval.
    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// `upper − lower`.
    #[must_use]
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }
}

/// Interval for a metric of paired predictions.
pub fn bootstrap_metric(
    y_true: &[f64],
    y_pred: &[f64],
    metric: Metric,
    config: &BootstrapConfig,
) -> EvalResult<BootstrapResult> {
    bootstrap_pairs(y_true, y_pred, config, |t, p| metric.compute(t, p))
}

fn refit_distribution(
    x: &[f64],
    y: &[f64],
    config: &BootstrapConfig,
) -> EvalResult<BootstrapDistribution<LinearModel>> {
    EvalError::check_pair(x.len(), y.len())?;
    bootstrap_distribution(x.len(), config, |indices| {
        LinearModel::fit(&gather(x, indices), &gather(y, indices))
    })
}

/// Intervals for the intercept and slope of refit models.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientIntervals {
    /// Intercept interval.
    pub intercept: BootstrapResult,
    /// Slope interval.
    pub slope: BootstrapResult,
}

/// Refits the model on every resample of `(x, y)`.
pub fn bootstrap_coefficients(
    x: &[f64],
    y: &[f64],
    config: &BootstrapConfig,
) -> EvalResult<CoefficientIntervals> {
    let models = refit_distribution(x, y, config)?.values;
    let intercepts: Vec<f64> = models.iter().map(LinearModel::intercept).collect();
    let slopes: Vec<f64> = models.iter().map(LinearModel::slope).collect();
    Ok(CoefficientIntervals {
        intercept: BootstrapResult::from_samples(&intercepts, config.alpha)?,
        slope: BootstrapResult::from_samples(&slopes, config.alpha)?,
    })
}

/// Pointwise prediction interval of refit models over a fixed grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionBand {
    /// Grid points.
    pub grid: Vec<f64>,
    /// Mean prediction per grid point.
    pub mean: Vec<f64>,
    /// Lower percentile per grid point.
    pub lower: Vec<f64>,
    /// Upper percentile per grid point.
    pub upper: Vec<f64>,
    /// Refits that contributed.
    pub samples: usize,
}

impl PredictionBand {
    /// Widest interval across the grid.
    #[must_use]
    pub fn max_width(&self) -> f64 {
        self.lower
            .iter()
            .zip(&self.upper)
            .map(|(lo, hi)| hi - lo)
            .fold(0.0, f64::max)
    }
}

/// Refits the model on every resample and predicts at each grid point.
pub fn bootstrap_predictions(
    x: &[f64],
    y: &[f64],
    grid: &[f64],
    config: &BootstrapConfig,
) -> EvalResult<PredictionBand> {
    EvalError::check_len(grid.len(), 1)?;
    let models = refit_distribution(x, y, config)?.values;
    let predictions = Array2::from_shape_fn((models.len(), grid.len()), |(row, col)| {
        models[row].predict_one(grid[col])
    });
    let mean = predictions
        .mean_axis(Axis(0))
        .ok_or(EvalError::InsufficientBootstrapSamples {
            attempted: config.n_boot,
        })?;

    let (lower, upper): (Vec<f64>, Vec<f64>) = predictions
        .axis_iter(Axis(1))
        .map(|column| {
            let mut sorted = column.to_vec();
            sorted.sort_by(f64::total_cmp);
            (
                stats::percentile_sorted(&sorted, config.lower_percentile()),
                stats::percentile_sorted(&sorted, config.upper_percentile()),
            )
        })
        .unzip();

    Ok(PredictionBand {
        grid: grid.to_vec(),
        mean: mean.to_vec(),
        lower,
        upper,
        samples: models.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noisy_line(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x: Vec<f64> = (0..n).map(|i| i as f64 / 10.0).collect();
        let y = x
            .iter()
            .map(|xi| 2.0f64.mul_add(*xi, 1.0) + rng.gen_range(-0.5..0.5))
            .collect();
        (x, y)
    }

    #[test]
    fn index_draws_are_reproducible() {
        let first = draw_indices(7, 12, 30);
        assert_eq!(first, draw_indices(7, 12, 30));
        assert_ne!(first, draw_indices(8, 12, 30));
        assert_eq!(first.len(), 30);
        assert!(first.iter().all(|draw| draw.len() == 12));
        assert!(first.iter().flatten().all(|&i| i < 12));
        assert_eq!(ResampleStream::new(7, 12, 30).len(), 30);
    }

    #[test]
    fn later_iterations_do_not_depend_on_count() {
        let short = draw_indices(3, 5, 4);
        let long = draw_indices(3, 5, 10);
        assert_eq!(short[..], long[..4]);
    }

    #[test]
    fn metric_interval_brackets_mean_and_repeats_exactly() {
        let (x, y) = noisy_line(200, 42);
        let model = LinearModel::fit(&x, &y).unwrap();
        let pred = model.predict(&x);
        let config = BootstrapConfig::default().with_seed(42);

        let first = bootstrap_metric(&y, &pred, Metric::Mae, &config).unwrap();
        let again = bootstrap_metric(&y, &pred, Metric::Mae, &config).unwrap();
        assert_eq!(first, again);
        assert!(first.lower <= first.mean && first.mean <= first.upper);
        assert_eq!(first.samples, 500);
        assert!(first.std > 0.0);
        assert!(first.contains(crate::metrics::mae(&y, &pred).unwrap()));
    }

    #[test]
    fn failed_iterations_are_skipped_and_counted() {
        let config = BootstrapConfig::default().with_n_boot(200).with_seed(5);
        let distribution = bootstrap_distribution(10, &config, |indices| {
            if indices[0] % 2 == 0 {
                Err(EvalError::AllMissing)
            } else {
                Ok(indices[0])
            }
        })
        .unwrap();
        assert!(distribution.skipped() > 0);
        assert_eq!(distribution.values.len() + distribution.skipped(), 200);
        assert!(distribution.values.iter().all(|i| i % 2 == 1));
    }

    #[test]
    fn all_failures_are_reported() {
        let config = BootstrapConfig::default().with_n_boot(20);
        let result = bootstrap(4, &config, |_| Err(EvalError::DegenerateTarget));
        assert_eq!(
            result,
            Err(EvalError::InsufficientBootstrapSamples { attempted: 20 })
        );
        let nan = bootstrap(4, &config, |_| Ok(f64::NAN));
        assert!(nan.is_err());
    }

    #[test]
    fn constant_resamples_of_r2_are_skipped() {
        let y_true = [1.0, 1.0, 1.0, 1.0, 2.0];
        let y_pred = [1.1, 0.9, 1.0, 1.2, 1.8];
        let config = BootstrapConfig::default().with_n_boot(200);
        let result = bootstrap_metric(&y_true, &y_pred, Metric::R2, &config).unwrap();
        assert!(result.samples > 0 && result.samples < 200);
    }

    #[test]
    fn summary_of_known_samples() {
        let result = BootstrapResult::from_samples(&[5.0, 1.0, 4.0, 2.0, 3.0], 0.5).unwrap();
        assert_eq!(result.mean, 3.0);
        assert_eq!(result.lower, 2.0);
        assert_eq!(result.upper, 4.0);
        assert!((result.std - 2.5f64.sqrt()).abs() < 1e-12);
        assert_eq!(result.width(), 2.0);

        let single = BootstrapResult::from_samples(&[1.5], 0.05).unwrap();
        assert_eq!(single.std, 0.0);
        assert_eq!((single.lower, single.upper), (1.5, 1.5));
    }

    #[test]
    fn coefficients_of_exact_line_collapse() {
        let x: Vec<f64> = (0..20).map(f64::from).collect();
        let y: Vec<f64> = x.iter().map(|v| 3.0 * v - 2.0).collect();
        let config = BootstrapConfig::default().with_n_boot(100);
        let intervals = bootstrap_coefficients(&x, &y, &config).unwrap();
        assert!((intervals.slope.mean - 3.0).abs() < 1e-9);
        assert!((intervals.intercept.mean + 2.0).abs() < 1e-9);
        assert!(intervals.slope.width() < 1e-9);
    }

    #[test]
    fn prediction_band_is_ordered_per_point() {
        let (x, y) = noisy_line(80, 9);
        let grid = stats::linspace(0.0, 7.9, 6);
        let config = BootstrapConfig::default().with_n_boot(150);
        let band = bootstrap_predictions(&x, &y, &grid, &config).unwrap();
        assert_eq!(band.mean.len(), 6);
        assert_eq!(band.samples, 150);
        for i in 0..6 {
            assert!(band.lower[i] <= band.mean[i] && band.mean[i] <= band.upper[i]);
        }
        assert!(band.max_width() > 0.0);
        assert!(bootstrap_predictions(&x, &y, &[], &config).is_err());
    }

    #[test]
    fn configuration_is_validated() {
        let zero = BootstrapConfig::default().with_n_boot(0);
        assert!(matches!(
            zero.validate(),
            Err(EvalError::InvalidParameter { name: "n_boot", .. })
        ));
        for alpha in [0.0, 1.0, f64::NAN, -0.1] {
            assert!(BootstrapConfig::default().with_alpha(alpha).validate().is_err());
        }
        let config = BootstrapConfig::default();
        assert!((config.lower_percentile() - 2.5).abs() < 1e-12);
        assert!((config.upper_percentile() - 97.5).abs() < 1e-12);
        assert!(matches!(
            bootstrap_metric(&[1.0], &[1.0, 2.0], Metric::Mae, &config),
            Err(EvalError::ShapeMismatch { .. })
        ));
    }
}
