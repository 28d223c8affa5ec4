//! Technical features and the next-day target for daily OHLCV frames.
//!
//! Every feature at row `t` uses prices up to `t - 1` or the same-day bar,
//! never row `t + 1`; only the target looks ahead.

use aapl_evaluation::{
    telemetry::{emit, EvaluationTelemetry},
    Frame,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared_logging::LogLevel;

use crate::{
    config::{FeatureConfig, TargetVariable},
    error::{FeatureError, FeatureResult},
    series,
};

/// Columns the input frame must provide.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

/// Model features, in the order they are checked and correlated.
pub const FEATURE_COLUMNS: [&str; 4] = [
    "price_range",
    "close_ma_prev",
    "return_lag_1",
    "rolling_volatility",
];

/// Absolute correlation above which a feature pair is reported.
pub const HIGH_CORRELATION: f64 = 0.8;

/// Two features whose Pearson correlation exceeds [`HIGH_CORRELATION`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    /// Earlier feature.
    pub first: String,
    /// Later feature.
    pub second: String,
    /// Pearson correlation.
    pub r: f64,
}

/// First and last date of the surviving rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest date.
    pub start: NaiveDate,
    /// Latest date.
    pub end: NaiveDate,
}

/// What one engineering run did to the frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSummary {
    /// Rows in the input.
    pub initial_rows: usize,
    /// Rows after dropping incomplete ones.
    pub final_rows: usize,
    /// `initial_rows − final_rows`.
    pub dropped_rows: usize,
    /// Model features followed by the target column.
    pub created_features: Vec<String>,
    /// Feature pairs above the correlation threshold.
    pub high_correlations: Vec<CorrelatedPair>,
    /// Moving average became valid before a full window of history.
    pub leakage_detected: bool,
    /// Date span of the output, when the frame has a date index.
    pub date_range: Option<DateRange>,
}

impl FeatureSummary {
    /// Number of model features, excluding the target.
    #[must_use]
    pub fn features_created(&self) -> usize {
        self.created_features.len().saturating_sub(1)
    }
}

/// Engineered frame with its run summary.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureOutput {
    /// Complete rows with every input column, feature and target.
    pub frame: Frame,
    /// Run summary.
    pub summary: FeatureSummary,
}

/// Builds features and the target from an OHLCV frame.
pub fn engineer(frame: &Frame, config: &FeatureConfig) -> FeatureResult<FeatureOutput> {
    engineer_with_telemetry(frame, config, None)
}

/// [`engineer`] with optional telemetry instrumentation.
pub fn engineer_with_telemetry(
    frame: &Frame,
    config: &FeatureConfig,
    telemetry: Option<&EvaluationTelemetry>,
) -> FeatureResult<FeatureOutput> {
    config.validate()?;
    let initial_rows = frame.len();
    emit(
        telemetry,
        LogLevel::Info,
        "features.start",
        json!({ "rows": initial_rows, "config": config }),
    );

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|name| !frame.contains(name))
        .map(|name| (*name).to_owned())
        .collect();
    if !missing.is_empty() {
        return Err(FeatureError::MissingColumns(missing));
    }

    let mut out = frame.clone();
    let close = frame.numeric("Close")?.to_vec();

    if config.price_range_enabled {
        let range = frame
            .numeric("High")?
            .iter()
            .zip(frame.numeric("Low")?)
            .map(|(high, low)| high - low)
            .collect();
        out.insert_numeric("price_range", range)?;
    }

    let ma_window = config.moving_average_window;
    let close_ma_prev = series::rolling_mean(&series::shift(&close, 1), ma_window, ma_window);
    out.insert_numeric("close_ma_prev", close_ma_prev)?;

    let daily_return = series::pct_change(&close);
    if config.lagged_features_enabled {
        out.insert_numeric("daily_return", daily_return.clone())?;
        out.insert_numeric("return_lag_1", series::shift(&daily_return, 1))?;
    }

    let vol_window = config.volatility_window;
    let volatility = series::rolling_std(&series::shift(&daily_return, 1), vol_window, vol_window);
    out.insert_numeric("rolling_volatility", volatility)?;

    let target = match config.target_variable {
        TargetVariable::CloseNext => series::shift(&close, -1),
        TargetVariable::ReturnNext => series::shift(&daily_return, -1),
    };
    out.insert_numeric(config.target_variable.column(), target)?;
    emit(
        telemetry,
        LogLevel::Debug,
        "features.created",
        json!({ "columns": out.numeric_columns().collect::<Vec<_>>() }),
    );

    let features: Vec<&str> = FEATURE_COLUMNS
        .into_iter()
        .filter(|name| out.contains(name))
        .collect();

    let (leakage_detected, high_correlations) = if config.validation_enabled {
        validate(&out, &features, ma_window, telemetry)?
    } else {
        (false, Vec::new())
    };

    let mut required = features.clone();
    required.push(config.target_variable.column());
    let keep = complete_rows(&out, &required)?;
    let cleaned = out.filter_rows(&keep)?;
    let final_rows = cleaned.len();
    emit(
        telemetry,
        LogLevel::Info,
        "features.rows_dropped",
        json!({ "dropped": initial_rows - final_rows, "final": final_rows }),
    );
    if final_rows == 0 {
        return Err(FeatureError::NoRowsRemaining);
    }

    let date_range = cleaned.index().and_then(|index| {
        let start = index.iter().min()?;
        let end = index.iter().max()?;
        Some(DateRange {
            start: *start,
            end: *end,
        })
    });

    Ok(FeatureOutput {
        frame: cleaned,
        summary: FeatureSummary {
            initial_rows,
            final_rows,
            dropped_rows: initial_rows - final_rows,
            created_features: required.iter().map(|name| (*name).to_owned()).collect(),
            high_correlations,
            leakage_detected,
            date_range,
        },
    })
}

fn validate(
    frame: &Frame,
    features: &[&str],
    ma_window: usize,
    telemetry: Option<&EvaluationTelemetry>,
) -> FeatureResult<(bool, Vec<CorrelatedPair>)> {
    let first_valid = frame
        .numeric("close_ma_prev")?
        .iter()
        .position(|v| !v.is_nan());
    let leakage = first_valid.is_some_and(|position| position < ma_window);
    if leakage {
        emit(
            telemetry,
            LogLevel::Warn,
            "features.ma_leakage",
            json!({ "first_valid": first_valid, "window": ma_window }),
        );
    }

    let mut pairs = Vec::new();
    for (i, first) in features.iter().enumerate() {
        for second in &features[i + 1..] {
            let r = series::pearson(frame.numeric(first)?, frame.numeric(second)?);
            if let Some(r) = r.filter(|r| r.abs() > HIGH_CORRELATION) {
                pairs.push(CorrelatedPair {
                    first: (*first).to_owned(),
                    second: (*second).to_owned(),
                    r,
                });
            }
        }
    }
    if pairs.is_empty() {
        emit(telemetry, LogLevel::Info, "features.correlation_ok", json!({}));
    } else {
        emit(
            telemetry,
            LogLevel::Warn,
            "features.high_correlation",
            json!({ "pairs": pairs }),
        );
    }
    Ok((leakage, pairs))
}

fn complete_rows(frame: &Frame, columns: &[&str]) -> FeatureResult<Vec<bool>> {
    let mut keep = vec![true; frame.len()];
    for name in columns {
        for (flag, value) in keep.iter_mut().zip(frame.numeric(name)?) {
            *flag &= !value.is_nan();
        }
    }
    Ok(keep)
}
