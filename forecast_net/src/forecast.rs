//! Forecast output

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Destandardized predictions, one row per forecast step and one value per
/// feature to predict
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    targets: Vec<String>,
    timestamps: Option<Vec<NaiveDateTime>>,
    values: Vec<Vec<f64>>,
}

impl Forecast {
    /// A single next-step prediction with no timestamp
    pub fn single(targets: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            targets,
            timestamps: None,
            values: vec![values],
        }
    }

    /// Predictions attached to forecast dates
    pub fn dated(targets: Vec<String>, timestamps: Vec<NaiveDateTime>, values: Vec<Vec<f64>>) -> Self {
        Self {
            targets,
            timestamps: Some(timestamps),
            values,
        }
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn timestamps(&self) -> Option<&[NaiveDateTime]> {
        self.timestamps.as_deref()
    }

    pub fn values(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Number of forecast steps
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// All steps of the target at `index`
    pub fn column(&self, index: usize) -> Option<Vec<f64>> {
        self.values.iter().map(|row| row.get(index).copied()).collect()
    }

    /// All steps of one target, by name
    pub fn column_named(&self, target: &str) -> Option<Vec<f64>> {
        let index = self.targets.iter().position(|t| t == target)?;
        self.column(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::parse_datetime;

    #[test]
    fn test_single_forecast() {
        let forecast = Forecast::single(vec!["close".to_string()], vec![101.5]);

        assert_eq!(forecast.len(), 1);
        assert!(forecast.timestamps().is_none());
        assert_eq!(forecast.column(0), Some(vec![101.5]));
        assert_eq!(forecast.column_named("open"), None);
    }

    #[test]
    fn test_dated_forecast_columns() {
        let dates = vec![
            parse_datetime("2024-01-02").unwrap(),
            parse_datetime("2024-01-03").unwrap(),
        ];
        let forecast = Forecast::dated(
            vec!["close".to_string(), "volume".to_string()],
            dates.clone(),
            vec![vec![1.0, 10.0], vec![2.0, 20.0]],
        );

        assert_eq!(forecast.timestamps(), Some(dates.as_slice()));
        assert_eq!(forecast.column_named("volume"), Some(vec![10.0, 20.0]));
        assert_eq!(forecast.column(1), forecast.column_named("volume"));
    }
}
