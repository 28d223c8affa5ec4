use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, FeatureResult};

/// Column predicted by the downstream model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetVariable {
    /// Next day's closing price.
    #[default]
    CloseNext,
    /// Next day's return.
    ReturnNext,
}

impl TargetVariable {
    /// Name of the column holding the target.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::CloseNext => "close_next",
            Self::ReturnNext => "return_next",
        }
    }
}

/// Feature engineering switches and window sizes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Rows in the lagged closing-price average.
    #[serde(default = "default_moving_average_window")]
    pub moving_average_window: usize,
    /// Rows in the rolling return volatility.
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
    /// Adds `price_range = High − Low`.
    #[serde(default = "default_true")]
    pub price_range_enabled: bool,
    /// Adds `daily_return` and `return_lag_1`.
    #[serde(default = "default_true")]
    pub lagged_features_enabled: bool,
    /// Runs the leakage and correlation checks.
    #[serde(default = "default_true")]
    pub validation_enabled: bool,
    /// Target column to build.
    #[serde(default)]
    pub target_variable: TargetVariable,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            moving_average_window: default_moving_average_window(),
            volatility_window: default_volatility_window(),
            price_range_enabled: true,
            lagged_features_enabled: true,
            validation_enabled: true,
            target_variable: TargetVariable::default(),
        }
    }
}

impl FeatureConfig {
    /// Loads a JSON file; absent keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading feature config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` when given and present, otherwise the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) if path.exists() => Self::from_file(path),
            _ => Ok(Self::default()),
        }
    }

    /// Rejects zero-length windows.
    pub fn validate(&self) -> FeatureResult<()> {
        if self.moving_average_window == 0 {
            return Err(FeatureError::InvalidConfig(
                "moving_average_window must be at least 1".into(),
            ));
        }
        if self.volatility_window < 2 {
            return Err(FeatureError::InvalidConfig(
                "volatility_window must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

const fn default_true() -> bool {
    true
}

const fn default_moving_average_window() -> usize {
    5
}

const fn default_volatility_window() -> usize {
    20
}
