use std::{
    env, fs,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::bootstrap::BootstrapConfig;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "AAPL_EVAL_";

/// Settings for a full evaluation run.
///
/// Missing fields in a JSON file fall back to their defaults, so a file may
/// override only what it needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Resampling parameters shared by every bootstrap call site.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
    /// Level below which a subgroup p-value is significant.
    #[serde(default = "default_significance")]
    pub significance_level: f64,
    /// Number of points in the prediction-band grid.
    #[serde(default = "default_grid_points")]
    pub grid_points: usize,
    /// JSON-lines log file, if any.
    #[serde(default)]
    pub log_path: Option<PathBuf>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            bootstrap: BootstrapConfig::default(),
            significance_level: default_significance(),
            grid_points: default_grid_points(),
            log_path: None,
        }
    }
}

impl EvaluationConfig {
    /// Loads and validates a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading evaluation config {}", path.display()))?;
        let config: Self =
            serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `AAPL_EVAL_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_overrides(|key| env::var(key).ok())
    }

    /// Applies overrides from a variable lookup; unset keys keep the current value.
    ///
    /// Recognised keys: `AAPL_EVAL_N_BOOT`, `AAPL_EVAL_SEED`, `AAPL_EVAL_ALPHA`,
    /// `AAPL_EVAL_SIGNIFICANCE`, `AAPL_EVAL_GRID_POINTS`, `AAPL_EVAL_LOG_PATH`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            lookup(&key).map(|value| (key, value))
        };
        if let Some(value) = parse_var(var("N_BOOT"))? {
            self.bootstrap.n_boot = value;
        }
        if let Some(value) = parse_var(var("SEED"))? {
            self.bootstrap.seed = value;
        }
        if let Some(value) = parse_var(var("ALPHA"))? {
            self.bootstrap.alpha = value;
        }
        if let Some(value) = parse_var(var("SIGNIFICANCE"))? {
            self.significance_level = value;
        }
        if let Some(value) = parse_var(var("GRID_POINTS"))? {
            self.grid_points = value;
        }
        if let Some((_, value)) = var("LOG_PATH") {
            self.log_path = (!value.is_empty()).then(|| PathBuf::from(value));
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks every field range.
    pub fn validate(&self) -> Result<()> {
        self.bootstrap.validate()?;
        if !(self.significance_level > 0.0 && self.significance_level < 1.0) {
            bail!(
                "significance_level must lie strictly between 0 and 1, got {}",
                self.significance_level
            );
        }
        if self.grid_points < 2 {
            bail!("grid_points must be at least 2, got {}", self.grid_points);
        }
        Ok(())
    }
}

fn parse_var<T>(entry: Option<(String, String)>) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    entry
        .map(|(key, value)| {
            value
                .trim()
                .parse()
                .with_context(|| format!("parsing {key}={value}"))
        })
        .transpose()
}

const fn default_significance() -> f64 {
    0.05
}

const fn default_grid_points() -> usize {
    150
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use tempfile::tempdir;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_reference_run() {
        let config = EvaluationConfig::default();
        assert_eq!(config.bootstrap.n_boot, 500);
        assert_eq!(config.bootstrap.seed, 111);
        assert!((config.bootstrap.alpha - 0.05).abs() < f64::EPSILON);
        assert_eq!(config.grid_points, 150);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eval.json");
        fs::write(&path, r#"{ "bootstrap": { "seed": 42 }, "grid_points": 20 }"#).unwrap();
        let config = EvaluationConfig::from_file(&path).unwrap();
        assert_eq!(config.bootstrap.seed, 42);
        assert_eq!(config.bootstrap.n_boot, 500);
        assert_eq!(config.grid_points, 20);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn invalid_file_values_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("eval.json");
        fs::write(&path, r#"{ "significance_level": 2.0 }"#).unwrap();
        assert!(EvaluationConfig::from_file(&path).is_err());
        assert!(EvaluationConfig::from_file(dir.path().join("absent.json")).is_err());
    }

    #[test]
    fn overrides_apply_and_validate() {
        let config = EvaluationConfig::default()
            .with_overrides(lookup(&[
                ("AAPL_EVAL_N_BOOT", "1000"),
                ("AAPL_EVAL_ALPHA", " 0.1 "),
                ("AAPL_EVAL_LOG_PATH", "logs/eval.jsonl"),
            ]))
            .unwrap();
        assert_eq!(config.bootstrap.n_boot, 1000);
        assert!((config.bootstrap.alpha - 0.1).abs() < f64::EPSILON);
        assert_eq!(config.bootstrap.seed, 111);
        assert_eq!(config.log_path, Some(PathBuf::from("logs/eval.jsonl")));

        let err = EvaluationConfig::default()
            .with_overrides(lookup(&[("AAPL_EVAL_SEED", "abc")]))
            .unwrap_err();
        assert!(err.to_string().contains("AAPL_EVAL_SEED"));
        assert!(EvaluationConfig::default()
            .with_overrides(lookup(&[("AAPL_EVAL_GRID_POINTS", "1")]))
            .is_err());
    }
}
