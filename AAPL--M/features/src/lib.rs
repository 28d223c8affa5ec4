#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    missing_docs,
    rust_2018_idioms
)]

//! Preparation of AAPL daily price frames ahead of model evaluation:
//! column cleaning, leakage-safe technical features and descriptive
//! summaries.

/// Error type for cleaning and feature construction.
#[path = "../error.rs"]
pub mod error;

/// Shift, percent change and rolling windows over one column.
#[path = "../series.rs"]
pub mod series;

/// Feature switches and window sizes.
#[path = "../config.rs"]
pub mod config;

/// Median fill, sparse-column removal and min-max scaling.
#[path = "../cleaning.rs"]
pub mod cleaning;

/// Technical features and next-day target.
#[path = "../engineering.rs"]
pub mod engineering;

/// Per-column descriptive statistics.
#[path = "../describe.rs"]
pub mod describe;

pub use cleaning::{drop_sparse_columns, fill_missing_median, missing_ratios, normalize_min_max};
pub use config::{FeatureConfig, TargetVariable};
pub use describe::{describe, ColumnSummary};
pub use engineering::{
    engineer, engineer_with_telemetry, CorrelatedPair, DateRange, FeatureOutput, FeatureSummary,
};
pub use error::{FeatureError, FeatureResult};
