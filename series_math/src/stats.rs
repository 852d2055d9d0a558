//! Summary statistics over columns with missing values

use crate::{present, MathError, Result};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Mean and sample standard deviation of a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub mean: f64,
    /// Sample standard deviation (n - 1 denominator)
    pub std: f64,
}

/// Compute the mean and sample standard deviation over the present values of a column.
///
/// Missing values are skipped. At least two present values are required for
/// the sample standard deviation to be defined.
pub fn column_stats(column: &[Option<f64>]) -> Result<ColumnStats> {
    let values: Vec<f64> = present(column).collect();
    if values.len() < 2 {
        return Err(MathError::InsufficientData(format!(
            "Need at least 2 values for mean and standard deviation, have {}",
            values.len()
        )));
    }

    Ok(ColumnStats {
        mean: values.iter().mean(),
        std: values.iter().std_dev(),
    })
}

/// Minimum and maximum of the present values of a column
pub fn min_max(column: &[Option<f64>]) -> Result<(f64, f64)> {
    let mut values = present(column).peekable();
    if values.peek().is_none() {
        return Err(MathError::InsufficientData(
            "Column has no values".to_string(),
        ));
    }

    Ok(values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::to_column;
    use approx::assert_relative_eq;

    #[test]
    fn test_column_stats_sample_std() {
        let stats = column_stats(&to_column(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])).unwrap();
        assert_relative_eq!(stats.mean, 5.0);
        // Sample variance = 32 / 7
        assert_relative_eq!(stats.std, (32.0f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_column_stats_skips_missing() {
        let column = vec![None, Some(1.0), Some(f64::NAN), Some(3.0)];
        let stats = column_stats(&column).unwrap();
        assert_relative_eq!(stats.mean, 2.0);
        assert_relative_eq!(stats.std, 2.0f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_column_stats_insufficient() {
        assert!(matches!(
            column_stats(&[Some(1.0), None]),
            Err(MathError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_min_max() {
        let (lo, hi) = min_max(&[Some(3.0), None, Some(-1.0), Some(8.5)]).unwrap();
        assert_eq!(lo, -1.0);
        assert_eq!(hi, 8.5);
        assert!(min_max(&[None, None]).is_err());
    }
}
