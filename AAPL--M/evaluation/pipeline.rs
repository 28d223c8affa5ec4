//! End-to-end evaluation of the single-predictor model.

use std::fmt::Write as _;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    bootstrap::{
        bootstrap_coefficients, bootstrap_metric, bootstrap_predictions, BootstrapResult,
        CoefficientIntervals, PredictionBand,
    },
    config::EvaluationConfig,
    error::{EvalError, EvalResult},
    frame::Frame,
    impute::{self, Scenarios},
    metrics::{Metric, MetricSet},
    model::LinearModel,
    sensitivity::{self, SensitivityTable},
    stats,
    subgroup::{self, SubgroupReport},
    telemetry::{emit, EvaluationTelemetry},
};

/// Everything one evaluation run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Model fit on the complete cases.
    pub model: LinearModel,
    /// Rows with both `x` and `y` present.
    pub complete_cases: usize,
    /// In-sample metrics of the baseline model.
    pub metrics: MetricSet,
    /// MAE interval over resampled `(y, ŷ)` pairs.
    pub mae_interval: BootstrapResult,
    /// RMSE interval over resampled `(y, ŷ)` pairs.
    pub rmse_interval: BootstrapResult,
    /// Intercept and slope intervals from refits.
    pub coefficients: CoefficientIntervals,
    /// Prediction band over the observed `x` range.
    pub prediction_band: PredictionBand,
    /// Imputation scenario comparison.
    pub sensitivity: SensitivityTable,
}

impl EvaluationReport {
    /// Renders a concise multi-line summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = format!(
            "[EVAL] n={} intercept={:.4} slope={:.4}\n",
            self.complete_cases,
            self.model.intercept(),
            self.model.slope()
        );
        let _ = writeln!(
            out,
            "  mae={:.4} [{:.4}, {:.4}] rmse={:.4} [{:.4}, {:.4}] r2={:.4}",
            self.metrics.mae,
            self.mae_interval.lower,
            self.mae_interval.upper,
            self.metrics.rmse,
            self.rmse_interval.lower,
            self.rmse_interval.upper,
            self.metrics.r2
        );
        let _ = writeln!(
            out,
            "  slope CI [{:.4}, {:.4}] intercept CI [{:.4}, {:.4}] band width<={:.4}",
            self.coefficients.slope.lower,
            self.coefficients.slope.upper,
            self.coefficients.intercept.lower,
            self.coefficients.intercept.upper,
            self.prediction_band.max_width()
        );
        match self.sensitivity.best_by(Metric::Rmse) {
            Some(best) => {
                let _ = writeln!(
                    out,
                    "  scenarios={} skipped={} best_rmse={} ({:.4})",
                    self.sensitivity.len(),
                    self.sensitivity.skipped.len(),
                    best.scenario,
                    best.rmse
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "  scenarios=0 skipped={}",
                    self.sensitivity.skipped.len()
                );
            }
        }
        out
    }
}

/// Runs the baseline fit, the three bootstrap call sites and the scenario comparison.
#[derive(Debug, Clone, Default)]
pub struct EvaluationPipeline {
    config: EvaluationConfig,
}

impl EvaluationPipeline {
    /// Pipeline using `config`.
    #[must_use]
    pub const fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Runs the evaluation, logging to the configured file if one is set.
    pub fn run(&self, x_raw: &[f64], y: &[f64], scenarios: &Scenarios) -> Result<EvaluationReport> {
        let telemetry = match &self.config.log_path {
            Some(path) => Some(EvaluationTelemetry::builder("evaluation").log_path(path).build()?),
            None => None,
        };
        self.run_with_telemetry(x_raw, y, scenarios, telemetry.as_ref())
    }

    /// Runs the evaluation with optional telemetry instrumentation.
    pub fn run_with_telemetry(
        &self,
        x_raw: &[f64],
        y: &[f64],
        scenarios: &Scenarios,
        telemetry: Option<&EvaluationTelemetry>,
    ) -> Result<EvaluationReport> {
        self.config.validate()?;
        let (x, y_clean) = complete_cases(x_raw, y)?;
        let boot = &self.config.bootstrap;
        emit(
            telemetry,
            LogLevel::Info,
            "evaluation.start",
            json!({
                "rows": x_raw.len(),
                "complete_cases": x.len(),
                "n_boot": boot.n_boot,
                "seed": boot.seed,
                "alpha": boot.alpha,
            }),
        );

        let model = LinearModel::fit(&x, &y_clean)?;
        let predictions = model.predict(&x);
        let metrics = MetricSet::compute(&y_clean, &predictions)?;
        emit(
            telemetry,
            LogLevel::Info,
            "evaluation.baseline",
            json!({
                "intercept": model.intercept(),
                "slope": model.slope(),
                "mae": metrics.mae,
                "rmse": metrics.rmse,
                "r2": metrics.r2,
            }),
        );

        let mae_interval = bootstrap_metric(&y_clean, &predictions, Metric::Mae, boot)?;
        let rmse_interval = bootstrap_metric(&y_clean, &predictions, Metric::Rmse, boot)?;
        let coefficients = bootstrap_coefficients(&x, &y_clean, boot)?;
        let (lo, hi) = x
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let grid = stats::linspace(lo, hi, self.config.grid_points);
        let prediction_band = bootstrap_predictions(&x, &y_clean, &grid, boot)?;
        emit(
            telemetry,
            LogLevel::Info,
            "evaluation.bootstrap_complete",
            json!({
                "mae": [mae_interval.lower, mae_interval.upper],
                "rmse": [rmse_interval.lower, rmse_interval.upper],
                "slope": [coefficients.slope.lower, coefficients.slope.upper],
                "refits": prediction_band.samples,
            }),
        );

        let sensitivity = sensitivity::analyze_with_telemetry(x_raw, y, scenarios, telemetry)?;
        emit(
            telemetry,
            LogLevel::Info,
            "evaluation.complete",
            json!({ "scenarios": sensitivity.len(), "skipped": sensitivity.skipped.len() }),
        );

        Ok(EvaluationReport {
            model,
            complete_cases: x.len(),
            metrics,
            mae_interval,
            rmse_interval,
            coefficients,
            prediction_band,
            sensitivity,
        })
    }

    /// Subgroup diagnostics at the configured significance level.
    pub fn subgroups(
        &self,
        frame: &Frame,
        group_col: &str,
        target_col: &str,
        pred_col: &str,
        telemetry: Option<&EvaluationTelemetry>,
    ) -> EvalResult<SubgroupReport> {
        subgroup::diagnose_with_telemetry(
            frame,
            group_col,
            target_col,
            pred_col,
            self.config.significance_level,
            telemetry,
        )
    }
}

/// Rows where both `x` and `y` are present.
pub fn complete_cases(x: &[f64], y: &[f64]) -> EvalResult<(Vec<f64>, Vec<f64>)> {
    EvalError::check_pair(x.len(), y.len())?;
    let (kept_x, kept_y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xi, yi)| !impute::is_missing(**xi) && !impute::is_missing(**yi))
        .map(|(xi, yi)| (*xi, *yi))
        .unzip();
    EvalError::check_len(kept_x.len(), 2)?;
    Ok((kept_x, kept_y))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;
    use shared_logging::MemoryLogSink;
    use tempfile::tempdir;

    use super::*;
    use crate::bootstrap::BootstrapConfig;

    fn price_like(n: usize) -> (Vec<f64>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(17);
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let xi = 150.0 + i as f64 * 0.25;
            y.push(0.98f64.mul_add(xi, 3.0) + rng.gen_range(-1.0..1.0));
            x.push(if i % 9 == 4 { f64::NAN } else { xi });
        }
        (x, y)
    }

    fn small_config() -> EvaluationConfig {
        EvaluationConfig {
            bootstrap: BootstrapConfig::default().with_n_boot(120),
            grid_points: 25,
            ..EvaluationConfig::default()
        }
    }

    #[test]
    fn full_run_produces_consistent_report() {
        let (x, y) = price_like(90);
        let memory = Arc::new(MemoryLogSink::new());
        let telemetry = EvaluationTelemetry::builder("evaluation")
            .sink(memory.clone())
            .build()
            .unwrap();
        let pipeline = EvaluationPipeline::new(small_config());
        let report = pipeline
            .run_with_telemetry(&x, &y, &Scenarios::standard(), Some(&telemetry))
            .unwrap();

        assert_eq!(report.complete_cases, 80);
        assert!((report.model.slope() - 0.98).abs() < 0.05);
        assert!(report.mae_interval.contains(report.metrics.mae));
        assert!(report.coefficients.slope.contains(report.model.slope()));
        assert_eq!(report.prediction_band.grid.len(), 25);
        assert_eq!(report.sensitivity.len(), 5);
        assert_eq!(report.sensitivity.get("drop_missing").unwrap().n_obs, 80);
        assert_eq!(report.sensitivity.get("zero_fill").unwrap().n_obs, 90);

        assert_eq!(memory.matching("evaluation.complete").len(), 1);
        assert!(report.summary().starts_with("[EVAL] n=80"));
        assert!(report.summary().contains("best_rmse="));
    }

    #[test]
    fn same_config_reproduces_report() {
        let (x, y) = price_like(40);
        let pipeline = EvaluationPipeline::new(small_config());
        let first = pipeline.run(&x, &y, &Scenarios::standard()).unwrap();
        let second = pipeline.run(&x, &y, &Scenarios::standard()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn configured_log_path_receives_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("logs/evaluation.jsonl");
        let config = EvaluationConfig {
            log_path: Some(path.clone()),
            ..small_config()
        };
        let (x, y) = price_like(30);
        EvaluationPipeline::new(config)
            .run(&x, &y, &Scenarios::standard())
            .unwrap();
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("evaluation.baseline"));
    }

    #[test]
    fn too_few_complete_cases_is_an_error() {
        let err = EvaluationPipeline::default()
            .run(&[1.0, f64::NAN], &[1.0, 2.0], &Scenarios::standard())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EvalError>(),
            Some(EvalError::InsufficientData { needed: 2, found: 1 })
        ));
    }

    #[test]
    fn subgroup_diagnostics_use_configured_level() {
        let frame = Frame::new()
            .with_labels("g", ["a", "a", "a", "b", "b", "b"].map(String::from).to_vec())
            .unwrap()
            .with_numeric("y", vec![0.0, 1.0, 2.0, 1.0, 2.0, 3.0])
            .unwrap()
            .with_numeric("p", vec![0.0; 6])
            .unwrap();
        let loose = EvaluationPipeline::new(EvaluationConfig {
            significance_level: 0.5,
            ..EvaluationConfig::default()
        });
        let report = loose.subgroups(&frame, "g", "y", "p", None).unwrap();
        assert!(report.pairs[0].significant);
    }
}
