//! # Series Math
//!
//! Numeric building blocks for turning a financial time series into
//! supervised-learning examples for a sequence model.
//!
//! Columns are represented as `&[Option<f64>]`, where `None` marks a missing
//! value. Statistics skip missing values and transforms keep them in place,
//! so a later missing-value drop can remove the affected rows.

use thiserror::Error;

pub mod features;
pub mod stats;
pub mod transform;
pub mod windowing;

pub use stats::{column_stats, ColumnStats};
pub use transform::{destandardize, normalize, normalize_range, standardize};
pub use windowing::{split_index, temporal_split, window_transform_series, Windows};

/// Errors that can occur while transforming a series
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for series math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Wrap plain values as a column with no missing entries.
pub fn to_column(values: &[f64]) -> Vec<Option<f64>> {
    values.iter().copied().map(Some).collect()
}

/// Iterate the present (non-missing, non-NaN) values of a column.
pub(crate) fn present(column: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    column.iter().filter_map(|v| v.filter(|x| !x.is_nan()))
}
