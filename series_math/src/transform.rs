//! Scaling transforms
//!
//! - Standardization (z-score) and its inverse
//! - Min/max normalization to a fixed range

use crate::stats::{column_stats, min_max, ColumnStats};
use crate::{MathError, Result};

/// Standardize a column to zero mean and unit variance using its own statistics.
///
/// Missing values stay missing. Fails when the column has zero variance,
/// since the result would be a division by zero.
pub fn standardize(column: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    let stats = column_stats(column)?;
    standardize_with(column, stats)
}

/// Standardize a column with externally supplied statistics
pub fn standardize_with(column: &[Option<f64>], stats: ColumnStats) -> Result<Vec<Option<f64>>> {
    if stats.std == 0.0 || !stats.std.is_finite() {
        return Err(MathError::CalculationError(format!(
            "Cannot standardize with standard deviation {}",
            stats.std
        )));
    }

    Ok(column
        .iter()
        .map(|v| v.map(|x| (x - stats.mean) / stats.std))
        .collect())
}

/// Map standardized values back to the original scale: `value * std + mean`.
pub fn destandardize(values: &[f64], mean: f64, std: f64) -> Vec<f64> {
    values.iter().map(|v| v * std + mean).collect()
}

/// Rescale a column to [0, 1] using its minimum and maximum.
pub fn normalize(column: &[Option<f64>]) -> Result<Vec<Option<f64>>> {
    normalize_range(column, 0.0, 1.0)
}

/// Rescale a column to `[low, high]` using its minimum and maximum.
pub fn normalize_range(column: &[Option<f64>], low: f64, high: f64) -> Result<Vec<Option<f64>>> {
    if low >= high {
        return Err(MathError::InvalidInput(format!(
            "Target range is empty: [{}, {}]",
            low, high
        )));
    }

    let (min, max) = min_max(column)?;
    let span = max - min;
    if span == 0.0 {
        return Err(MathError::CalculationError(
            "Cannot normalize a constant column".to_string(),
        ));
    }

    let scale = high - low;
    Ok(column
        .iter()
        .map(|v| v.map(|x| low + (x - min) / span * scale))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_column;
    use approx::assert_relative_eq;

    #[test]
    fn test_standardize_has_zero_mean_unit_std() {
        let standardized = standardize(&to_column(&[10.0, 20.0, 30.0, 40.0, 50.0])).unwrap();
        let stats = column_stats(&standardized).unwrap();

        assert!(stats.mean.abs() < 1e-12);
        assert_relative_eq!(stats.std, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standardize_keeps_missing_positions() {
        let standardized = standardize(&[None, Some(1.0), Some(3.0)]).unwrap();
        assert_eq!(standardized[0], None);
        assert!(standardized[1].unwrap() < 0.0);
        assert!(standardized[2].unwrap() > 0.0);
    }

    #[test]
    fn test_standardize_zero_variance_fails() {
        let result = standardize(&to_column(&[4.0, 4.0, 4.0]));
        assert!(matches!(result, Err(MathError::CalculationError(_))));
    }

    #[test]
    fn test_destandardize_known_value() {
        assert_eq!(destandardize(&[1.5], 5.0, 2.0), vec![8.0]);
    }

    #[test]
    fn test_normalize_bounds() {
        let normalized = normalize(&to_column(&[10.0, 20.0, 30.0, 40.0, 50.0])).unwrap();
        assert_eq!(normalized[0], Some(0.0));
        assert_eq!(normalized[4], Some(1.0));
        assert_relative_eq!(normalized[2].unwrap(), 0.5);

        let ranged = normalize_range(&to_column(&[10.0, 30.0]), -1.0, 1.0).unwrap();
        assert_eq!(ranged, vec![Some(-1.0), Some(1.0)]);
    }

    #[test]
    fn test_normalize_rejects_bad_input() {
        assert!(normalize(&to_column(&[2.0, 2.0])).is_err());
        assert!(normalize_range(&to_column(&[1.0, 2.0]), 1.0, 1.0).is_err());
        assert!(normalize(&[None]).is_err());
    }
}
