#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Statistical evaluation of the single-predictor AAPL price model: least
//! squares, error metrics, imputation scenarios, seeded bootstrap intervals
//! and subgroup residual diagnostics.

/// Error type shared by every analysis.
#[path = "../error.rs"]
pub mod error;

/// Descriptive statistics and the t distribution.
#[path = "../stats.rs"]
pub mod stats;

/// Least-squares model and its persisted form.
#[path = "../model.rs"]
pub mod model;

/// MAE, RMSE and R².
#[path = "../metrics.rs"]
pub mod metrics;

/// Missing-value strategies and the scenario table.
#[path = "../impute.rs"]
pub mod impute;

/// Column table consumed by subgroup diagnostics.
#[path = "../frame.rs"]
pub mod frame;

/// Bootstrap engine and its three call sites.
#[path = "../bootstrap.rs"]
pub mod bootstrap;

/// Imputation sensitivity analysis.
#[path = "../sensitivity.rs"]
pub mod sensitivity;

/// Residual diagnostics per group.
#[path = "../subgroup.rs"]
pub mod subgroup;

/// Telemetry builder/hook for evaluation components.
#[path = "../telemetry.rs"]
pub mod telemetry;

/// Run configuration.
#[path = "../config.rs"]
pub mod config;

/// End-to-end evaluation run.
#[path = "../pipeline.rs"]
pub mod pipeline;

pub use bootstrap::{
    bootstrap, bootstrap_coefficients, bootstrap_metric, bootstrap_predictions, BootstrapConfig,
    BootstrapResult, CoefficientIntervals, PredictionBand,
};
pub use config::EvaluationConfig;
pub use error::{EvalError, EvalResult};
pub use frame::Frame;
pub use impute::{Imputer, Scenarios};
pub use metrics::{Metric, MetricSet};
pub use model::LinearModel;
pub use pipeline::{EvaluationPipeline, EvaluationReport};
pub use sensitivity::{analyze, ScenarioResult, SensitivityTable};
pub use subgroup::{diagnose, GroupStats, PairwiseTest, SubgroupReport};
pub use telemetry::{EvaluationTelemetry, EvaluationTelemetryBuilder};
