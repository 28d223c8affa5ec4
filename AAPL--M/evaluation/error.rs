use thiserror::Error;

/// Errors raised by the evaluation core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Paired sequences have different lengths.
    #[error("shape mismatch: {left} observations vs {right}")]
    ShapeMismatch {
        /// Length of the first sequence.
        left: usize,
        /// Length of the second sequence.
        right: usize,
    },
    /// An imputer received no present value to work from.
    #[error("every value is missing")]
    AllMissing,
    /// No bootstrap iteration produced a statistic.
    #[error("no bootstrap iteration succeeded out of {attempted}")]
    InsufficientBootstrapSamples {
        /// Number of iterations that were attempted.
        attempted: usize,
    },
    /// The target has zero variance, so R² is undefined.
    #[error("target has zero variance; r2 is undefined")]
    DegenerateTarget,
    /// The design matrix cannot be fit.
    #[error("degenerate fit: {0}")]
    DegenerateFit(String),
    /// Too few observations for the requested statistic.
    #[error("need at least {needed} observations, got {found}")]
    InsufficientData {
        /// Minimum number of observations.
        needed: usize,
        /// Observations supplied.
        found: usize,
    },
    /// A parameter is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Constraint that was violated.
        reason: String,
    },
    /// A frame column was requested that does not exist.
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
}

impl EvalError {
    /// Checks that two paired sequences have equal length.
    pub const fn check_pair(left: usize, right: usize) -> EvalResult<()> {
        if left == right {
            Ok(())
        } else {
            Err(Self::ShapeMismatch { left, right })
        }
    }

    /// Checks a minimum observation count.
    pub const fn check_len(found: usize, needed: usize) -> EvalResult<()> {
        if found >= needed {
            Ok(())
        } else {
            Err(Self::InsufficientData { needed, found })
        }
    }
}

/// Result alias used throughout the crate.
pub type EvalResult<T> = Result<T, EvalError>;
