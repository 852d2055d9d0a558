//! Pipeline configuration
//!
//! Everything the data handler and the network need is carried by an explicit
//! [`ForecastConfig`], usually loaded from a JSON file.

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

fn one() -> usize {
    1
}

/// Engineered feature computed from a source column and appended to the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineeredFeature {
    /// Name of the new column
    pub name: String,
    /// Column the feature is derived from; defaults to the first feature to predict
    #[serde(default)]
    pub source: Option<String>,
    #[serde(flatten)]
    pub kind: FeatureKind,
}

/// How an engineered feature is computed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FeatureKind {
    PctChange {
        #[serde(default = "one")]
        periods: usize,
    },
    Diff {
        #[serde(default = "one")]
        periods: usize,
    },
    LogReturn,
    Lag {
        #[serde(default = "one")]
        periods: usize,
    },
    RollingMean {
        window: usize,
    },
    RollingStd {
        window: usize,
    },
    /// Hour of the row timestamp (0-23)
    HourOfDay,
    /// Minute of the row timestamp (0-59)
    MinuteOfHour,
    /// Day of week of the row timestamp, Monday = 0
    DayOfWeek,
}

/// Element-wise column operation usable in the custom preprocessor chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ColumnOp {
    /// Natural log; non-positive values become missing
    Log,
    Abs,
    Clip { min: f64, max: f64 },
    /// Replace missing values with the last present value
    FillForward,
}

/// Training loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    #[serde(alias = "mse")]
    MeanSquaredError,
    #[serde(alias = "mae")]
    MeanAbsoluteError,
}

/// Gradient-descent optimizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Adam,
    Sgd,
    RmsProp,
}

/// Metric watched by early stopping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EarlyStopMetric {
    Loss,
    ValLoss,
}

/// Configuration of the forecasting pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Target columns the network predicts
    pub features_to_predict: Vec<String>,
    /// Input columns fed to the network; empty means the targets
    pub feature_columns: Vec<String>,
    /// Name of the time column; detected from the column names when absent
    pub time_column: Option<String>,
    pub extra_features: Vec<EngineeredFeature>,
    pub columns_to_standardize: Vec<String>,
    pub columns_to_normalize: Vec<String>,
    pub custom_preprocessor_columns: Vec<String>,
    pub custom_preprocessors: Vec<ColumnOp>,

    pub window_size: usize,
    pub feature_dimension: usize,
    pub output_dimension: usize,
    pub num_layers: usize,
    pub num_cells: usize,
    pub dropout: f64,
    pub recurrent_dropout: f64,
    pub loss: LossKind,
    pub optimizer: OptimizerKind,
    pub learning_rate: f64,
    pub early_stop_metric: EarlyStopMetric,
    pub patience: usize,
    pub epochs: usize,
    pub batch_size: usize,
    pub validation_split: f64,
    pub train_test_split: f64,
    /// 0 = silent, 1 = one line per epoch, 2 = one line per batch
    pub verbose: u8,
    pub seed: u64,

    pub data_dir: PathBuf,
    pub model_dir: PathBuf,
    pub plot_dir: PathBuf,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            features_to_predict: vec!["close".to_string()],
            feature_columns: Vec::new(),
            time_column: None,
            extra_features: Vec::new(),
            columns_to_standardize: vec!["close".to_string()],
            columns_to_normalize: Vec::new(),
            custom_preprocessor_columns: Vec::new(),
            custom_preprocessors: Vec::new(),
            window_size: 30,
            feature_dimension: 1,
            output_dimension: 1,
            num_layers: 2,
            num_cells: 50,
            dropout: 0.2,
            recurrent_dropout: 0.0,
            loss: LossKind::MeanSquaredError,
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.001,
            early_stop_metric: EarlyStopMetric::ValLoss,
            patience: 5,
            epochs: 50,
            batch_size: 32,
            validation_split: 0.1,
            train_test_split: 0.8,
            verbose: 1,
            seed: 0,
            data_dir: PathBuf::from("data"),
            model_dir: PathBuf::from("models"),
            plot_dir: PathBuf::from("plots"),
        }
    }
}

impl ForecastConfig {
    /// Create a configuration predicting the given column from itself
    pub fn new(target: &str) -> Self {
        Self {
            features_to_predict: vec![target.to_string()],
            columns_to_standardize: vec![target.to_string()],
            ..Self::default()
        }
    }

    /// Load and validate a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Set the input columns, keeping `feature_dimension` in sync
    pub fn with_feature_columns(mut self, columns: &[&str]) -> Self {
        self.feature_columns = columns.iter().map(|c| c.to_string()).collect();
        self.feature_dimension = self.feature_columns.len();
        self
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_layers(mut self, num_layers: usize, num_cells: usize) -> Self {
        self.num_layers = num_layers;
        self.num_cells = num_cells;
        self
    }

    pub fn with_training(mut self, epochs: usize, batch_size: usize) -> Self {
        self.epochs = epochs;
        self.batch_size = batch_size;
        self
    }

    pub fn with_dirs<P: Into<PathBuf>>(mut self, data_dir: P, model_dir: P, plot_dir: P) -> Self {
        self.data_dir = data_dir.into();
        self.model_dir = model_dir.into();
        self.plot_dir = plot_dir.into();
        self
    }

    /// Columns that make up each input time step
    pub fn input_columns(&self) -> &[String] {
        if self.feature_columns.is_empty() {
            &self.features_to_predict
        } else {
            &self.feature_columns
        }
    }

    /// Column used as the source of engineered features without an explicit source
    pub fn primary_target(&self) -> &str {
        self.features_to_predict
            .first()
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn data_path(&self, filename: &str) -> PathBuf {
        self.data_dir.join(filename)
    }

    pub fn model_path(&self, filename: &str) -> PathBuf {
        self.model_dir.join(filename)
    }

    pub fn plot_path(&self, filename: &str) -> PathBuf {
        self.plot_dir.join(filename)
    }

    /// Check the configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.features_to_predict.is_empty() {
            return Err(ForecastError::ConfigError(
                "At least one feature to predict is required".to_string(),
            ));
        }
        if self.window_size == 0 {
            return Err(ForecastError::ConfigError(
                "window_size must be greater than zero".to_string(),
            ));
        }
        if self.feature_dimension != self.input_columns().len() {
            return Err(ForecastError::ConfigError(format!(
                "feature_dimension is {} but {} input columns are configured",
                self.feature_dimension,
                self.input_columns().len()
            )));
        }
        if self.output_dimension != self.features_to_predict.len() {
            return Err(ForecastError::ConfigError(format!(
                "output_dimension is {} but {} features to predict are configured",
                self.output_dimension,
                self.features_to_predict.len()
            )));
        }
        if self.num_layers == 0 || self.num_cells == 0 {
            return Err(ForecastError::ConfigError(
                "num_layers and num_cells must be greater than zero".to_string(),
            ));
        }
        for (name, rate) in [
            ("dropout", self.dropout),
            ("recurrent_dropout", self.recurrent_dropout),
            ("validation_split", self.validation_split),
        ] {
            if !(0.0..1.0).contains(&rate) {
                return Err(ForecastError::ConfigError(format!(
                    "{} must be in [0, 1), got {}",
                    name, rate
                )));
            }
        }
        if !(self.train_test_split > 0.0 && self.train_test_split <= 1.0) {
            return Err(ForecastError::ConfigError(format!(
                "train_test_split must be in (0, 1], got {}",
                self.train_test_split
            )));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ForecastError::ConfigError(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::ConfigError(
                "epochs and batch_size must be greater than zero".to_string(),
            ));
        }
        if self.verbose > 2 {
            return Err(ForecastError::ConfigError(format!(
                "verbose must be 0, 1 or 2, got {}",
                self.verbose
            )));
        }

        let mut names = HashSet::new();
        for feature in &self.extra_features {
            if feature.name.is_empty() || !names.insert(feature.name.as_str()) {
                return Err(ForecastError::ConfigError(format!(
                    "Engineered feature names must be unique and non-empty: '{}'",
                    feature.name
                )));
            }
        }

        Ok(())
    }
}
