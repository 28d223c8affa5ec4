use aapl_evaluation::EvalError;
use thiserror::Error;

/// Errors raised while cleaning or engineering features.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    /// Failure from the shared column and statistics layer.
    #[error(transparent)]
    Eval(#[from] EvalError),
    /// Input frame lacks price columns the features are built from.
    #[error("missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    /// Every row had a missing feature or target.
    #[error("no valid rows remaining after feature engineering")]
    NoRowsRemaining,
    /// Configuration value out of range.
    #[error("invalid feature configuration: {0}")]
    InvalidConfig(String),
}

/// Result alias for feature operations.
pub type FeatureResult<T> = Result<T, FeatureError>;
