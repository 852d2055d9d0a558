//! Lifecycle shared by every forecasting network

use crate::config::ForecastConfig;
use crate::data::DataHandler;
use crate::error::{ForecastError, Result};
use crate::forecast::Forecast;
use crate::plot::ForecastPlot;
use crate::training::TrainingHistory;
use chrono::{Duration, NaiveDateTime};
use log::info;
use std::path::PathBuf;

/// Extension the weight recorder writes
pub const WEIGHTS_EXTENSION: &str = "bin";

/// What `run_model` does besides building and forecasting
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunOptions {
    /// Train and save new weights instead of loading them
    pub train: bool,
    pub evaluate: bool,
    pub visualize: bool,
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub freq: Option<Duration>,
}

impl RunOptions {
    pub fn train(mut self, train: bool) -> Self {
        self.train = train;
        self
    }

    pub fn evaluate(mut self, evaluate: bool) -> Self {
        self.evaluate = evaluate;
        self
    }

    pub fn visualize(mut self, visualize: bool) -> Self {
        self.visualize = visualize;
        self
    }

    /// Forecast every `freq` step from `start` to `end`
    pub fn range(mut self, start: NaiveDateTime, end: NaiveDateTime, freq: Option<Duration>) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self.freq = freq;
        self
    }
}

/// Where weights named `filename` live: inside the model directory, with the
/// recorder's extension
pub fn weights_path(config: &ForecastConfig, filename: &str) -> PathBuf {
    let mut path = config.model_path(filename);
    path.set_extension(WEIGHTS_EXTENSION);
    path
}

/// Existing weight file for `filename`, or `ModelNotFound`
pub fn existing_weights(config: &ForecastConfig, filename: &str) -> Result<PathBuf> {
    let path = weights_path(config, filename);
    if path.is_file() {
        Ok(path)
    } else {
        Err(ForecastError::ModelNotFound(path.display().to_string()))
    }
}

/// A forecasting network driven through a fixed lifecycle: preprocess, split,
/// build, train or load, evaluate, visualize, forecast.
pub trait ForecastNetwork {
    fn data_handler(&self) -> &DataHandler;

    fn data_handler_mut(&mut self) -> &mut DataHandler;

    fn config(&self) -> &ForecastConfig {
        self.data_handler().config()
    }

    /// Window the preprocessed data and split it in time order into training
    /// and testing sets
    fn set_train_test_split(&mut self) -> Result<()>;

    /// Create the model with fresh weights
    fn build_model(&mut self) -> Result<()>;

    fn train_model(&mut self) -> Result<TrainingHistory>;

    /// Without dates, predict the step after the most recent test window.
    /// With `start` and `end`, predict every `freq` step in that range by
    /// feeding each prediction back as input.
    ///
    /// Values are returned on the raw scale only for targets listed in
    /// `columns_to_standardize`; other targets stay on their processed scale.
    fn forecast_model(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        freq: Option<Duration>,
    ) -> Result<Forecast>;

    /// Plot the original series against the training and testing fits
    fn visualize_output(&self) -> Result<Vec<ForecastPlot>>;

    /// Loss on the testing set
    fn evaluate_model(&self) -> Result<f64>;

    fn save_model(&self, filename: &str) -> Result<PathBuf>;

    fn load_model(&mut self, filename: &str) -> Result<()>;

    /// Run the whole lifecycle and return the forecast
    fn run_model(&mut self, weight_filename: &str, options: &RunOptions) -> Result<Forecast> {
        self.data_handler_mut().preprocess_data()?;
        self.set_train_test_split()?;
        self.build_model()?;

        if options.train {
            self.train_model()?;
            let path = self.save_model(weight_filename)?;
            info!("Saved weights to {}", path.display());
        } else {
            self.load_model(weight_filename)?;
        }

        if options.evaluate {
            let score = self.evaluate_model()?;
            info!("Test loss: {:.6}", score);
        }

        if options.visualize {
            let plots = self.visualize_output()?;
            info!("Rendered {} plot(s)", plots.len());
        }

        self.forecast_model(options.start, options.end, options.freq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_weights_path_uses_model_dir_and_extension() {
        let config = ForecastConfig::new("close").with_dirs("data", "models", "plots");

        assert_eq!(
            weights_path(&config, "weights.h5"),
            PathBuf::from("models").join("weights.bin")
        );
        assert_eq!(
            weights_path(&config, "lstm"),
            PathBuf::from("models").join("lstm.bin")
        );
    }

    #[test]
    fn test_existing_weights_missing_file() {
        let dir = tempdir().unwrap();
        let config = ForecastConfig::new("close").with_dirs(dir.path(), dir.path(), dir.path());

        let result = existing_weights(&config, "absent");

        assert!(matches!(result, Err(ForecastError::ModelNotFound(_))));
    }

    #[test]
    fn test_run_options_builder() {
        let options = RunOptions::default().train(true).visualize(true);

        assert!(options.train);
        assert!(!options.evaluate);
        assert!(options.visualize);
        assert!(options.start.is_none());
    }
}
