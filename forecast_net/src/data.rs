//! Dataset handling and preprocessing
//!
//! [`Dataset`] is an immutable view of a polars `DataFrame` with an optional
//! time column. [`DataHandler`] owns the raw dataset, the statistics of the
//! features to predict, and derives the preprocessed dataset from the raw one.

use crate::config::{ColumnOp, EngineeredFeature, FeatureKind, ForecastConfig};
use crate::error::{ForecastError, Result};
use crate::utils::parse_datetime;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use log::{debug, info, warn};
use polars::prelude::*;
use series_math::{column_stats, features, normalize, standardize, ColumnStats, Windows};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Time series table with an optional time column
#[derive(Debug, Clone)]
pub struct Dataset {
    df: DataFrame,
    time_column: Option<String>,
}

impl Dataset {
    /// Wrap a DataFrame; the time column, if given, must exist
    pub fn new(df: DataFrame, time_column: Option<String>) -> Result<Self> {
        if let Some(name) = &time_column {
            if df.column(name).is_err() {
                return Err(ForecastError::DataError(format!(
                    "Time column '{}' not found",
                    name
                )));
            }
        }
        Ok(Self { df, time_column })
    }

    /// Load a dataset from a CSV file with a header row
    pub fn from_csv<P: AsRef<Path>>(path: P, time_column: Option<String>) -> Result<Self> {
        let file = File::open(path)?;
        let df = CsvReader::new(file)
            .infer_schema(None)
            .has_header(true)
            .finish()?;

        let time_column = time_column.or_else(|| detect_time_column(&df));
        Self::new(df, time_column)
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Get the time column name
    pub fn time_column(&self) -> Option<&str> {
        self.time_column.as_deref()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.df.height()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.column(name).is_ok()
    }

    /// Column values as f64; nulls and NaN become `None`
    pub fn column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        column_values(&self.df, name)
    }

    /// Row-major matrix of the given columns; fails on any missing value.
    pub fn matrix(&self, columns: &[String]) -> Result<Vec<Vec<f64>>> {
        let mut rows = vec![Vec::with_capacity(columns.len()); self.len()];
        for name in columns {
            for (i, value) in self.column(name)?.into_iter().enumerate() {
                let value = value.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Column '{}' has a missing value at row {}",
                        name, i
                    ))
                })?;
                rows[i].push(value);
            }
        }
        Ok(rows)
    }

    /// Row timestamps parsed from the time column
    pub fn timestamps(&self) -> Result<Vec<NaiveDateTime>> {
        let name = self.time_column.as_deref().ok_or_else(|| {
            ForecastError::DataError("Dataset has no time column".to_string())
        })?;
        let col = self.df.column(name)?;

        let parsed: Vec<Option<NaiveDateTime>> = match col.dtype() {
            DataType::Datetime(unit, _) => {
                let per_second = match unit {
                    TimeUnit::Nanoseconds => 1_000_000_000,
                    TimeUnit::Microseconds => 1_000_000,
                    TimeUnit::Milliseconds => 1_000,
                };
                col.datetime()?
                    .into_iter()
                    .map(|ts| ts.and_then(|ts| from_epoch(ts, per_second)))
                    .collect()
            }
            DataType::Date => col
                .date()?
                .into_iter()
                .map(|days| {
                    days.and_then(|days| NaiveDate::from_num_days_from_ce_opt(days + 719_163))
                        .and_then(|date| date.and_hms_opt(0, 0, 0))
                })
                .collect(),
            DataType::Utf8 => col
                .utf8()?
                .into_iter()
                .map(|text| text.and_then(|text| parse_datetime(text).ok()))
                .collect(),
            dtype if dtype.is_numeric() => col
                .cast(&DataType::Int64)?
                .i64()?
                .into_iter()
                .map(|ms| ms.and_then(|ms| from_epoch(ms, 1_000)))
                .collect(),
            dtype => {
                return Err(ForecastError::DataError(format!(
                    "Time column '{}' has unsupported type {}",
                    name, dtype
                )))
            }
        };

        parsed
            .into_iter()
            .enumerate()
            .map(|(i, ts)| {
                ts.ok_or_else(|| {
                    ForecastError::DataError(format!(
                        "Time column '{}' has an unreadable value at row {}",
                        name, i
                    ))
                })
            })
            .collect()
    }

    /// Most common spacing between consecutive timestamps.
    ///
    /// Ties are resolved towards the shorter spacing.
    pub fn infer_sampling_frequency(&self) -> Result<Duration> {
        let timestamps = self.timestamps()?;
        if timestamps.len() < 2 {
            return Err(ForecastError::DataError(
                "Need at least 2 timestamps to infer a sampling frequency".to_string(),
            ));
        }

        let mut counts: HashMap<i64, usize> = HashMap::new();
        for pair in timestamps.windows(2) {
            let step = (pair[1] - pair[0]).num_milliseconds();
            if step > 0 {
                *counts.entry(step).or_default() += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|(step_a, count_a), (step_b, count_b)| {
                count_a.cmp(count_b).then(step_b.cmp(step_a))
            })
            .map(|(step, _)| Duration::milliseconds(step))
            .ok_or_else(|| {
                ForecastError::DataError("Timestamps are not increasing".to_string())
            })
    }

    /// Write the dataset as CSV, replacing any existing file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = File::create(path)?;
        let mut df = self.df.clone();
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
        Ok(())
    }
}

fn from_epoch(value: i64, per_second: i64) -> Option<NaiveDateTime> {
    let secs = value.div_euclid(per_second);
    let nanos = value.rem_euclid(per_second) * (1_000_000_000 / per_second);
    DateTime::from_timestamp(secs, nanos as u32).map(|dt| dt.naive_utc())
}

/// Find a column whose name looks like a date or time
fn detect_time_column(df: &DataFrame) -> Option<String> {
    for name in df.get_column_names() {
        let lower_name = name.to_lowercase();
        if lower_name.contains("time") || lower_name.contains("date") {
            return Some(name.to_string());
        }
    }

    df.get_columns()
        .first()
        .filter(|col| col.dtype().is_temporal())
        .map(|col| col.name().to_string())
}

fn column_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    let col = df.column(name).map_err(|e| {
        ForecastError::DataError(format!("Column '{}' not found: {}", name, e))
    })?;
    if !col.dtype().is_numeric() {
        return Err(ForecastError::DataError(format!(
            "Column '{}' cannot be converted to f64",
            name
        )));
    }

    let values = col.cast(&DataType::Float64)?;
    let values = values
        .f64()?
        .into_iter()
        .map(|v| v.filter(|x| !x.is_nan()))
        .collect();
    Ok(values)
}

fn set_column(df: &mut DataFrame, name: &str, values: Vec<Option<f64>>) -> Result<()> {
    df.with_column(Series::new(name, values))?;
    Ok(())
}

/// Mean and standard deviation of each feature to predict, taken from the raw data
#[derive(Debug, Clone, PartialEq)]
pub struct TargetStats {
    columns: Vec<String>,
    stats: Vec<ColumnStats>,
}

impl TargetStats {
    fn from_dataset(dataset: &Dataset, columns: &[String]) -> Result<Self> {
        let stats = columns
            .iter()
            .map(|name| -> Result<ColumnStats> { Ok(column_stats(&dataset.column(name)?)?) })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            columns: columns.to_vec(),
            stats,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn means(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.mean).collect()
    }

    pub fn stds(&self) -> Vec<f64> {
        self.stats.iter().map(|s| s.std).collect()
    }

    pub fn get(&self, index: usize) -> Option<ColumnStats> {
        self.stats.get(index).copied()
    }

    /// Destandardize one prediction row (one value per target)
    pub fn destandardize_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.stats.iter())
            .map(|(v, s)| v * s.std + s.mean)
            .collect()
    }
}

/// Custom preprocessing step: receives the dataset under construction and the
/// column being processed, and returns the new values of that column.
pub type ColumnFn = Arc<dyn Fn(&Dataset, &str) -> Result<Vec<Option<f64>>> + Send + Sync>;

/// Owns the raw dataset and produces the preprocessed one
#[derive(Clone)]
pub struct DataHandler {
    config: ForecastConfig,
    raw: Dataset,
    processed: Option<Dataset>,
    target_stats: TargetStats,
    custom_fns: Vec<ColumnFn>,
}

impl fmt::Debug for DataHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataHandler")
            .field("rows", &self.raw.len())
            .field("processed_rows", &self.processed.as_ref().map(Dataset::len))
            .field("target_stats", &self.target_stats)
            .field("custom_fns", &self.custom_fns.len())
            .finish()
    }
}

impl DataHandler {
    /// Wrap raw data; the statistics of the features to predict are captured here.
    pub fn new(df: DataFrame, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let time_column = config
            .time_column
            .clone()
            .or_else(|| detect_time_column(&df));
        Self::from_dataset(Dataset::new(df, time_column)?, config)
    }

    /// Load raw data from a CSV file
    pub fn from_csv<P: AsRef<Path>>(path: P, config: ForecastConfig) -> Result<Self> {
        config.validate()?;
        let dataset = Dataset::from_csv(path, config.time_column.clone())?;
        Self::from_dataset(dataset, config)
    }

    fn from_dataset(raw: Dataset, config: ForecastConfig) -> Result<Self> {
        for target in &config.features_to_predict {
            if !raw.has_column(target) {
                return Err(ForecastError::DataError(format!(
                    "Feature to predict '{}' not found",
                    target
                )));
            }
        }
        let target_stats = TargetStats::from_dataset(&raw, &config.features_to_predict)?;
        debug!(
            "Target statistics: means {:?}, stds {:?}",
            target_stats.means(),
            target_stats.stds()
        );

        Ok(Self {
            config,
            raw,
            processed: None,
            target_stats,
            custom_fns: Vec::new(),
        })
    }

    /// Append a function to the custom preprocessing chain.
    ///
    /// Registered functions run after the configured column operations.
    pub fn with_custom_preprocessor<F>(mut self, f: F) -> Self
    where
        F: Fn(&Dataset, &str) -> Result<Vec<Option<f64>>> + Send + Sync + 'static,
    {
        self.custom_fns.push(Arc::new(f));
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn target_stats(&self) -> &TargetStats {
        &self.target_stats
    }

    pub fn raw(&self) -> &Dataset {
        &self.raw
    }

    pub fn processed(&self) -> Option<&Dataset> {
        self.processed.as_ref()
    }

    /// The preprocessed dataset if available, otherwise the raw one
    pub fn current(&self) -> &Dataset {
        self.processed.as_ref().unwrap_or(&self.raw)
    }

    /// Number of rows of the current dataset
    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current().is_empty()
    }

    /// Derive the preprocessed dataset from the raw one.
    ///
    /// Stages run in order: engineered features, standardization,
    /// normalization, the custom chain, and finally dropping every row with a
    /// missing value. The raw data is never modified, so calling this again
    /// produces the same result.
    pub fn preprocess_data(&mut self) -> Result<&Dataset> {
        let time_column = self.raw.time_column.clone();
        let mut df = self.raw.df.clone();

        for feature in &self.config.extra_features {
            let values = self.engineer(&df, feature)?;
            set_column(&mut df, &feature.name, values)?;
        }

        for name in &self.config.columns_to_standardize {
            let values = standardize(&column_values(&df, name)?).map_err(|e| {
                ForecastError::DataError(format!("Cannot standardize '{}': {}", name, e))
            })?;
            set_column(&mut df, name, values)?;
        }

        for name in &self.config.columns_to_normalize {
            let values = normalize(&column_values(&df, name)?).map_err(|e| {
                ForecastError::DataError(format!("Cannot normalize '{}': {}", name, e))
            })?;
            set_column(&mut df, name, values)?;
        }

        for name in &self.config.custom_preprocessor_columns {
            for op in &self.config.custom_preprocessors {
                let values = apply_column_op(op, column_values(&df, name)?);
                set_column(&mut df, name, values)?;
            }
            for f in &self.custom_fns {
                let snapshot = Dataset {
                    df: df.clone(),
                    time_column: time_column.clone(),
                };
                let values = f(&snapshot, name)?;
                if values.len() != df.height() {
                    return Err(ForecastError::DataError(format!(
                        "Custom preprocessor returned {} values for '{}', expected {}",
                        values.len(),
                        name,
                        df.height()
                    )));
                }
                set_column(&mut df, name, values)?;
            }
        }

        let before = df.height();
        let df = drop_missing_rows(df)?;
        if df.height() < before {
            info!(
                "Preprocessing dropped {} of {} rows with missing values",
                before - df.height(),
                before
            );
        }
        if df.height() == 0 {
            warn!("No rows left after preprocessing");
        }

        let processed = self.processed.insert(Dataset { df, time_column });
        Ok(&*processed)
    }

    fn engineer(&self, df: &DataFrame, feature: &EngineeredFeature) -> Result<Vec<Option<f64>>> {
        let source = feature
            .source
            .as_deref()
            .unwrap_or_else(|| self.config.primary_target());

        let values = match &feature.kind {
            FeatureKind::PctChange { periods } => {
                features::pct_change(&column_values(df, source)?, *periods)?
            }
            FeatureKind::Diff { periods } => features::diff(&column_values(df, source)?, *periods)?,
            FeatureKind::LogReturn => features::log_return(&column_values(df, source)?),
            FeatureKind::Lag { periods } => features::lag(&column_values(df, source)?, *periods)?,
            FeatureKind::RollingMean { window } => {
                features::rolling_mean(&column_values(df, source)?, *window)?
            }
            FeatureKind::RollingStd { window } => {
                features::rolling_std(&column_values(df, source)?, *window)?
            }
            FeatureKind::HourOfDay | FeatureKind::MinuteOfHour | FeatureKind::DayOfWeek => {
                let snapshot = Dataset {
                    df: df.clone(),
                    time_column: self.raw.time_column.clone(),
                };
                snapshot
                    .timestamps()?
                    .into_iter()
                    .map(|ts| {
                        Some(match feature.kind {
                            FeatureKind::HourOfDay => ts.hour() as f64,
                            FeatureKind::MinuteOfHour => ts.minute() as f64,
                            _ => ts.weekday().num_days_from_monday() as f64,
                        })
                    })
                    .collect()
            }
        };

        Ok(values)
    }

    /// Write the current dataset as CSV into the data directory
    pub fn save_data(&self, filename: &str) -> Result<PathBuf> {
        let path = self.config.data_path(filename);
        self.current().save_csv(&path)?;
        info!("Saved {} rows to {}", self.len(), path.display());
        Ok(path)
    }

    /// Cut the current dataset into windows of the input columns labelled with
    /// the next values of the features to predict.
    pub fn window_transform_series(&self) -> Result<Windows> {
        let dataset = self.current();
        let inputs = dataset.matrix(self.config.input_columns())?;
        let targets = dataset.matrix(&self.config.features_to_predict)?;
        Ok(series_math::window_transform_series(
            &inputs,
            &targets,
            self.config.window_size,
        )?)
    }
}

fn apply_column_op(op: &ColumnOp, values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    match op {
        ColumnOp::Log => values
            .into_iter()
            .map(|v| v.filter(|x| *x > 0.0).map(f64::ln))
            .collect(),
        ColumnOp::Abs => values.into_iter().map(|v| v.map(f64::abs)).collect(),
        ColumnOp::Clip { min, max } => values
            .into_iter()
            .map(|v| v.map(|x| x.clamp(*min, *max)))
            .collect(),
        ColumnOp::FillForward => {
            let mut last = None;
            values
                .into_iter()
                .map(|v| {
                    if v.is_some() {
                        last = v;
                    }
                    last
                })
                .collect()
        }
    }
}

/// Turn NaN into nulls and drop every row holding a null in any column
fn drop_missing_rows(mut df: DataFrame) -> Result<DataFrame> {
    let float_columns: Vec<String> = df
        .get_columns()
        .iter()
        .filter(|col| col.dtype().is_float())
        .map(|col| col.name().to_string())
        .collect();
    for name in &float_columns {
        let values = column_values(&df, name)?;
        set_column(&mut df, name, values)?;
    }

    Ok(df.drop_nulls::<String>(None)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(close: Vec<Option<f64>>) -> DataFrame {
        let n = close.len() as i64;
        DataFrame::new(vec![
            Series::new("time", (0..n).map(|i| i * 60_000).collect::<Vec<i64>>()),
            Series::new("close", close),
        ])
        .unwrap()
    }

    #[test]
    fn test_apply_column_ops() {
        let values = vec![Some(-2.0), None, Some(4.0)];

        assert_eq!(
            apply_column_op(&ColumnOp::Abs, values.clone()),
            vec![Some(2.0), None, Some(4.0)]
        );
        assert_eq!(
            apply_column_op(&ColumnOp::Clip { min: -1.0, max: 1.0 }, values.clone()),
            vec![Some(-1.0), None, Some(1.0)]
        );
        assert_eq!(
            apply_column_op(&ColumnOp::FillForward, values.clone()),
            vec![Some(-2.0), Some(-2.0), Some(4.0)]
        );
        let logged = apply_column_op(&ColumnOp::Log, values);
        assert_eq!(logged[0], None);
        assert!((logged[2].unwrap() - 4.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn test_drop_missing_rows_handles_nan() {
        let df = frame(vec![Some(1.0), Some(f64::NAN), None, Some(4.0)]);
        let cleaned = drop_missing_rows(df).unwrap();
        assert_eq!(cleaned.height(), 2);
    }

    #[test]
    fn test_epoch_millis_timestamps() {
        let dataset = Dataset::new(frame(vec![Some(1.0), Some(2.0)]), Some("time".to_string())).unwrap();
        let timestamps = dataset.timestamps().unwrap();
        assert_eq!(timestamps[1] - timestamps[0], Duration::minutes(1));
        assert_eq!(timestamps[0].to_string(), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_detect_time_column() {
        let df = frame(vec![Some(1.0)]);
        assert_eq!(detect_time_column(&df).as_deref(), Some("time"));

        let df = DataFrame::new(vec![Series::new("close", vec![1.0])]).unwrap();
        assert_eq!(detect_time_column(&df), None);
    }
}
