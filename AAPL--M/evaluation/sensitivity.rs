//! Refits the model under each imputation scenario and compares the outcomes.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    error::{EvalError, EvalResult},
    impute::{self, Imputer, Scenarios},
    metrics::{Metric, MetricSet},
    model::LinearModel,
    telemetry::{emit, EvaluationTelemetry},
};

/// Fit quality under one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    /// Scenario name.
    pub scenario: String,
    /// Mean absolute error.
    pub mae: f64,
    /// Root mean squared error.
    pub rmse: f64,
    /// Coefficient of determination.
    pub r2: f64,
    /// Fitted slope.
    pub slope: f64,
    /// Fitted intercept.
    pub intercept: f64,
    /// Observations used for the fit.
    pub n_obs: usize,
}

impl ScenarioResult {
    /// Value of one metric.
    #[must_use]
    pub const fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Mae => self.mae,
            Metric::Rmse => self.rmse,
            Metric::R2 => self.r2,
        }
    }
}

/// Scenario that could not be evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedScenario {
    /// Scenario name.
    pub scenario: String,
    /// Error message.
    pub reason: String,
}

/// Rows in scenario declaration order, plus the scenarios left out.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensitivityTable {
    /// Successful scenarios.
    pub rows: Vec<ScenarioResult>,
    /// Failed scenarios.
    pub skipped: Vec<SkippedScenario>,
}

impl SensitivityTable {
    /// Row for a scenario name.
    #[must_use]
    pub fn get(&self, scenario: &str) -> Option<&ScenarioResult> {
        self.rows.iter().find(|row| row.scenario == scenario)
    }

    /// Number of successful scenarios.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no scenario succeeded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Best row for a metric; ties keep the earlier scenario.
    #[must_use]
    pub fn best_by(&self, metric: Metric) -> Option<&ScenarioResult> {
        self.rows.iter().reduce(|best, row| {
            let (a, b) = (row.metric(metric), best.metric(metric));
            let better = if metric.lower_is_better() { a < b } else { a > b };
            if better {
                row
            } else {
                best
            }
        })
    }

    /// Fixed-width text table.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "{:<16} {:>10} {:>10} {:>8} {:>10} {:>10} {:>6}\n",
            "scenario", "mae", "rmse", "r2", "slope", "intercept", "n_obs"
        );
        for row in &self.rows {
            let _ = writeln!(
                out,
                "{:<16} {:>10.4} {:>10.4} {:>8.4} {:>10.4} {:>10.4} {:>6}",
                row.scenario, row.mae, row.rmse, row.r2, row.slope, row.intercept, row.n_obs
            );
        }
        for skipped in &self.skipped {
            let _ = writeln!(out, "{:<16} skipped: {}", skipped.scenario, skipped.reason);
        }
        out
    }
}

/// Evaluates every scenario on `(x_raw, y)`.
pub fn analyze(x_raw: &[f64], y: &[f64], scenarios: &Scenarios) -> EvalResult<SensitivityTable> {
    analyze_with_telemetry(x_raw, y, scenarios, None)
}

/// [`analyze`], reporting skipped scenarios and each row to `telemetry`.
///
/// Only a length mismatch between `x_raw` and `y` fails the whole call; any
/// other error is confined to its scenario.
pub fn analyze_with_telemetry(
    x_raw: &[f64],
    y: &[f64],
    scenarios: &Scenarios,
    telemetry: Option<&EvaluationTelemetry>,
) -> EvalResult<SensitivityTable> {
    EvalError::check_pair(x_raw.len(), y.len())?;
    let mut table = SensitivityTable::default();
    for (name, imputer) in scenarios.iter() {
        match evaluate_scenario(name, imputer, x_raw, y) {
            Ok(row) => {
                emit(
                    telemetry,
                    LogLevel::Debug,
                    "sensitivity.scenario_complete",
                    json!({ "scenario": name, "n_obs": row.n_obs, "rmse": row.rmse }),
                );
                table.rows.push(row);
            }
            Err(err) => {
                emit(
                    telemetry,
                    LogLevel::Warn,
                    "sensitivity.scenario_skipped",
                    json!({ "scenario": name, "reason": err.to_string() }),
                );
                table.skipped.push(SkippedScenario {
                    scenario: name.to_owned(),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(table)
}

fn evaluate_scenario(
    name: &str,
    imputer: impute::ImputeFn,
    x_raw: &[f64],
    y: &[f64],
) -> EvalResult<ScenarioResult> {
    let (x, y) = if name == Imputer::DropMissing.name() && impute::missing_count(x_raw) > 0 {
        co_filter(x_raw, y)?
    } else {
        (imputer(x_raw)?, y.to_vec())
    };
    EvalError::check_pair(x.len(), y.len())?;
    let model = LinearModel::fit(&x, &y)?;
    let metrics = MetricSet::compute(&y, &model.predict(&x))?;
    Ok(ScenarioResult {
        scenario: name.to_owned(),
        mae: metrics.mae,
        rmse: metrics.rmse,
        r2: metrics.r2,
        slope: model.slope(),
        intercept: model.intercept(),
        n_obs: x.len(),
    })
}

/// Keeps the rows where `x` is present, in both arrays.
pub fn co_filter(x: &[f64], y: &[f64]) -> EvalResult<(Vec<f64>, Vec<f64>)> {
    EvalError::check_pair(x.len(), y.len())?;
    let (kept_x, kept_y): (Vec<f64>, Vec<f64>) = x
        .iter()
        .zip(y)
        .filter(|(xi, _)| !impute::is_missing(**xi))
        .map(|(xi, yi)| (*xi, *yi))
        .unzip();
    if kept_x.is_empty() {
        return Err(EvalError::AllMissing);
    }
    Ok((kept_x, kept_y))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shared_logging::MemoryLogSink;

    use super::*;
    use crate::impute::{mean_impute, zero_fill};

    const NAN: f64 = f64::NAN;

    fn six_points() -> ([f64; 6], [f64; 6]) {
        (
            [1.0, NAN, 3.0, 4.0, NAN, 6.0],
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        )
    }

    #[test]
    fn mean_and_drop_scenarios_report_observation_counts() {
        let (x, y) = six_points();
        let scenarios = Scenarios::from_imputers([Imputer::MeanImpute, Imputer::DropMissing]);
        let table = analyze(&x, &y, &scenarios).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0].scenario, "mean_impute");
        assert_eq!(table.rows[0].n_obs, 6);
        assert_eq!(table.rows[1].scenario, "drop_missing");
        assert_eq!(table.rows[1].n_obs, 4);
        assert!(table.skipped.is_empty());

        let dropped = table.get("drop_missing").unwrap();
        assert!((dropped.slope - 1.0).abs() < 1e-12);
        assert!(dropped.intercept.abs() < 1e-12);
        assert!((dropped.r2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn failing_scenario_is_skipped_not_fatal() {
        fn always_fails(_: &[f64]) -> EvalResult<Vec<f64>> {
            Err(EvalError::DegenerateFit("refused".into()))
        }

        let (x, y) = six_points();
        let memory = Arc::new(MemoryLogSink::new());
        let telemetry = EvaluationTelemetry::builder("sensitivity")
            .sink(memory.clone())
            .build()
            .unwrap();
        let scenarios = Scenarios::new()
            .with("zero_fill", zero_fill)
            .with("broken", always_fails)
            .with("mean_impute", mean_impute);

        let table = analyze_with_telemetry(&x, &y, &scenarios, Some(&telemetry)).unwrap();
        let names: Vec<&str> = table.rows.iter().map(|r| r.scenario.as_str()).collect();
        assert_eq!(names, ["zero_fill", "mean_impute"]);
        assert_eq!(table.skipped.len(), 1);
        assert_eq!(table.skipped[0].scenario, "broken");
        assert_eq!(memory.matching("sensitivity.scenario_skipped").len(), 1);
        assert!(table.render().contains("broken"));
    }

    #[test]
    fn degenerate_target_skips_every_scenario() {
        let x = [1.0, NAN, 3.0];
        let y = [2.0, 2.0, 2.0];
        let table = analyze(&x, &y, &Scenarios::standard()).unwrap();
        assert!(table.is_empty());
        assert_eq!(table.skipped.len(), 5);
    }

    #[test]
    fn all_missing_predictor_is_skipped_per_scenario() {
        let table = analyze(&[NAN, NAN, NAN], &[1.0, 2.0, 3.0], &Scenarios::standard()).unwrap();
        assert!(table.is_empty());
        assert!(table
            .skipped
            .iter()
            .all(|s| s.reason == EvalError::AllMissing.to_string()));
    }

    #[test]
    fn length_mismatch_fails_the_whole_call() {
        assert!(matches!(
            analyze(&[1.0, 2.0], &[1.0], &Scenarios::standard()),
            Err(EvalError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn best_by_respects_metric_direction() {
        let (x, y) = six_points();
        let table = analyze(&x, &y, &Scenarios::standard()).unwrap();
        assert_eq!(table.len(), 5);
        let best = table.best_by(Metric::Rmse).unwrap();
        assert_eq!(best.scenario, "drop_missing");
        assert_eq!(table.best_by(Metric::R2).unwrap().scenario, "drop_missing");
    }

    #[test]
    fn complete_predictor_uses_drop_missing_function_directly() {
        let x = [1.0, 2.0, 4.0];
        let y = [1.0, 2.5, 3.0];
        let (fx, fy) = co_filter(&x, &y).unwrap();
        assert_eq!(fx, x);
        assert_eq!(fy, y);
        let table = analyze(&x, &y, &Scenarios::from_imputers([Imputer::DropMissing])).unwrap();
        assert_eq!(table.rows[0].n_obs, 3);
    }
}
