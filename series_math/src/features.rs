//! Engineered-feature primitives
//!
//! Each function maps a column to a new column of the same length. Positions
//! without enough history, or whose inputs are missing, are `None`.

use crate::{MathError, Result};
use statrs::statistics::Statistics;

fn check_periods(periods: usize, what: &str) -> Result<()> {
    if periods == 0 {
        return Err(MathError::InvalidInput(format!(
            "{} must be greater than zero",
            what
        )));
    }
    Ok(())
}

/// Pair every value with the value `periods` steps earlier.
fn with_lagged<F>(column: &[Option<f64>], periods: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(f64, f64) -> Option<f64>,
{
    (0..column.len())
        .map(|i| {
            if i < periods {
                return None;
            }
            match (column[i], column[i - periods]) {
                (Some(current), Some(previous)) => f(current, previous),
                _ => None,
            }
        })
        .collect()
}

/// Value shifted forward by `periods` steps
pub fn lag(column: &[Option<f64>], periods: usize) -> Result<Vec<Option<f64>>> {
    check_periods(periods, "Lag")?;
    Ok((0..column.len())
        .map(|i| if i < periods { None } else { column[i - periods] })
        .collect())
}

/// Difference to the value `periods` steps earlier
pub fn diff(column: &[Option<f64>], periods: usize) -> Result<Vec<Option<f64>>> {
    check_periods(periods, "Periods")?;
    Ok(with_lagged(column, periods, |c, p| Some(c - p)))
}

/// Relative change to the value `periods` steps earlier
pub fn pct_change(column: &[Option<f64>], periods: usize) -> Result<Vec<Option<f64>>> {
    check_periods(periods, "Periods")?;
    Ok(with_lagged(column, periods, |c, p| {
        if p == 0.0 {
            None
        } else {
            Some(c / p - 1.0)
        }
    }))
}

/// Natural log of the ratio to the previous value
pub fn log_return(column: &[Option<f64>]) -> Vec<Option<f64>> {
    with_lagged(column, 1, |c, p| {
        if c > 0.0 && p > 0.0 {
            Some((c / p).ln())
        } else {
            None
        }
    })
}

fn rolling<F>(column: &[Option<f64>], window: usize, f: F) -> Result<Vec<Option<f64>>>
where
    F: Fn(&[f64]) -> f64,
{
    check_periods(window, "Window")?;
    Ok((0..column.len())
        .map(|i| {
            if i + 1 < window {
                return None;
            }
            let values: Option<Vec<f64>> = column[i + 1 - window..=i].iter().copied().collect();
            values.map(|v| f(&v))
        })
        .collect())
}

/// Mean over the trailing `window` values
pub fn rolling_mean(column: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    rolling(column, window, |v| v.iter().mean())
}

/// Sample standard deviation over the trailing `window` values
pub fn rolling_std(column: &[Option<f64>], window: usize) -> Result<Vec<Option<f64>>> {
    if window < 2 {
        return Err(MathError::InvalidInput(
            "Rolling standard deviation needs a window of at least 2".to_string(),
        ));
    }
    rolling(column, window, |v| v.iter().std_dev())
}
