//! LSTM implementation of [`ForecastNetwork`]

use crate::config::ForecastConfig;
use crate::data::DataHandler;
use crate::error::{ForecastError, Result};
use crate::forecast::Forecast;
use crate::model::{evaluate_loss, predict, StackedLstm, StackedLstmConfig};
use crate::network::{existing_weights, weights_path, ForecastNetwork};
use crate::plot::ForecastPlot;
use crate::training::{fit, TrainingHistory};
use crate::utils::date_range;
use burn::module::{AutodiffModule, Module};
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use burn::tensor::backend::AutodiffBackend;
use chrono::{Duration, NaiveDateTime};
use log::{info, warn};
use series_math::{destandardize, split_index, Windows};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Windows split in time order into training and testing sets
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train: Windows,
    pub test: Windows,
    /// Number of windows in the training set
    pub split_index: usize,
}

impl TrainTestSplit {
    pub fn x_train(&self) -> &[Vec<Vec<f64>>] {
        &self.train.inputs
    }

    pub fn y_train(&self) -> &[Vec<f64>] {
        &self.train.labels
    }

    pub fn x_test(&self) -> &[Vec<Vec<f64>>] {
        &self.test.inputs
    }

    pub fn y_test(&self) -> &[Vec<f64>] {
        &self.test.labels
    }
}

/// Stacked LSTM forecaster over one dataset
pub struct LstmNetwork<B: AutodiffBackend> {
    data_handler: DataHandler,
    device: B::Device,
    model: Option<StackedLstm<B>>,
    history: Option<TrainingHistory>,
    split: Option<TrainTestSplit>,
}

impl<B: AutodiffBackend> fmt::Debug for LstmNetwork<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LstmNetwork")
            .field("data_handler", &self.data_handler)
            .field("device", &self.device)
            .field("built", &self.model.is_some())
            .field("epochs_trained", &self.history.as_ref().map(TrainingHistory::len))
            .field("split_index", &self.split.as_ref().map(|s| s.split_index))
            .finish()
    }
}

impl<B: AutodiffBackend> LstmNetwork<B> {
    pub fn new(data_handler: DataHandler, device: B::Device) -> Self {
        Self {
            data_handler,
            device,
            model: None,
            history: None,
            split: None,
        }
    }

    /// Load the data from a CSV file and wrap it in a new network
    pub fn from_csv<P: AsRef<Path>>(path: P, config: ForecastConfig, device: B::Device) -> Result<Self> {
        Ok(Self::new(DataHandler::from_csv(path, config)?, device))
    }

    pub fn model(&self) -> Option<&StackedLstm<B>> {
        self.model.as_ref()
    }

    /// History of the last `train_model` call
    pub fn history(&self) -> Option<&TrainingHistory> {
        self.history.as_ref()
    }

    pub fn split(&self) -> Option<&TrainTestSplit> {
        self.split.as_ref()
    }

    pub fn device(&self) -> &B::Device {
        &self.device
    }

    fn built_model(&self) -> Result<&StackedLstm<B>> {
        self.model.as_ref().ok_or(ForecastError::ModelNotBuilt)
    }

    fn train_test_split(&self) -> Result<&TrainTestSplit> {
        self.split.as_ref().ok_or_else(|| {
            ForecastError::DataError("set_train_test_split has not been run".to_string())
        })
    }

    /// Bring predictions of the features to predict back to their raw scale.
    ///
    /// Only features that were standardized are transformed.
    fn to_original_scale(&self, column: usize, values: &[f64]) -> Vec<f64> {
        let config = self.data_handler.config();
        let standardized = config
            .features_to_predict
            .get(column)
            .is_some_and(|name| config.columns_to_standardize.contains(name));

        match self.data_handler.target_stats().get(column) {
            Some(stats) if standardized => destandardize(values, stats.mean, stats.std),
            _ => values.to_vec(),
        }
    }

    fn row_to_original_scale(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, &v)| self.to_original_scale(j, &[v])[0])
            .collect()
    }

    /// Positions `(input column, target)` of features to predict that are also inputs
    fn feedback_positions(config: &ForecastConfig) -> Vec<(usize, usize)> {
        config
            .input_columns()
            .iter()
            .enumerate()
            .filter_map(|(input, name)| {
                config
                    .features_to_predict
                    .iter()
                    .position(|t| t == name)
                    .map(|target| (input, target))
            })
            .collect()
    }

    fn forecast_range(
        &self,
        model: &StackedLstm<B::InnerBackend>,
        start: NaiveDateTime,
        end: NaiveDateTime,
        freq: Option<Duration>,
    ) -> Result<Forecast> {
        let config = self.data_handler.config();
        let targets = config.features_to_predict.clone();
        let dataset = self.data_handler.current();

        let last = dataset
            .timestamps()?
            .last()
            .copied()
            .ok_or_else(|| ForecastError::DataError("Dataset is empty".to_string()))?;
        if start <= last {
            return Err(ForecastError::DateError(format!(
                "Forecast start {} must be after the last observation {}",
                start, last
            )));
        }
        if end < start {
            warn!("Forecast end {} is before start {}; nothing to forecast", end, start);
            return Ok(Forecast::dated(targets, Vec::new(), Vec::new()));
        }

        let step = match freq {
            Some(step) => step,
            None => dataset.infer_sampling_frequency()?,
        };
        let inputs = dataset.matrix(config.input_columns())?;
        if inputs.len() < config.window_size {
            return Err(ForecastError::DataError(format!(
                "Need {} rows to seed the forecast, have {}",
                config.window_size,
                inputs.len()
            )));
        }

        let feedback = Self::feedback_positions(config);
        if feedback.is_empty() {
            warn!("No feature to predict is an input column; inputs are held at their last values");
        }

        let mut window = inputs[inputs.len() - config.window_size..].to_vec();
        let mut cursor = last;
        let mut timestamps = Vec::new();
        let mut values = Vec::new();
        for date in date_range(start, end, step)? {
            // Roll through steps between the last observation and `date`
            loop {
                let prediction = self.predict_next(model, &mut window, &feedback)?;
                cursor = cursor.checked_add_signed(step).ok_or_else(|| {
                    ForecastError::DateError(format!("Forecast step past {} overflows", cursor))
                })?;
                if cursor >= date {
                    timestamps.push(date);
                    values.push(self.row_to_original_scale(&prediction));
                    cursor = date;
                    break;
                }
            }
        }

        info!(
            "Forecast {} step(s) from {} to {}",
            values.len(),
            start,
            end
        );
        Ok(Forecast::dated(targets, timestamps, values))
    }

    /// Predict the step after `window`, then slide the window over the prediction
    fn predict_next(
        &self,
        model: &StackedLstm<B::InnerBackend>,
        window: &mut Vec<Vec<f64>>,
        feedback: &[(usize, usize)],
    ) -> Result<Vec<f64>> {
        let prediction = predict(model, std::slice::from_ref(&*window), 1, &self.device)?
            .into_iter()
            .next()
            .ok_or_else(|| ForecastError::ModelError("Model returned no prediction".to_string()))?;

        let mut next = window.last().cloned().unwrap_or_default();
        for &(input, target) in feedback {
            next[input] = prediction[target];
        }
        window.remove(0);
        window.push(next);

        Ok(prediction)
    }

    fn render_plot(&self, plot: &ForecastPlot) -> Result<PathBuf> {
        let config = self.data_handler.config();
        let svg = config.plot_path(&format!("{}_forecast.svg", plot.target));
        plot.render_svg(&svg)?;
        plot.write_csv(config.plot_path(&format!("{}_forecast.csv", plot.target)))?;
        Ok(svg)
    }
}

impl<B: AutodiffBackend> ForecastNetwork for LstmNetwork<B> {
    fn data_handler(&self) -> &DataHandler {
        &self.data_handler
    }

    fn data_handler_mut(&mut self) -> &mut DataHandler {
        &mut self.data_handler
    }

    fn set_train_test_split(&mut self) -> Result<()> {
        if self.data_handler.processed().is_none() {
            warn!("Splitting data that has not been preprocessed");
        }

        let windows = self.data_handler.window_transform_series()?;
        let index = split_index(self.data_handler.config().train_test_split, windows.len())?;
        let (train, test) = windows.split_at(index);
        info!(
            "Split {} windows into {} training and {} testing",
            windows.len(),
            train.len(),
            test.len()
        );

        self.split = Some(TrainTestSplit {
            train,
            test,
            split_index: index,
        });
        Ok(())
    }

    fn build_model(&mut self) -> Result<()> {
        let config = self.data_handler.config();
        if config.recurrent_dropout > 0.0 {
            warn!(
                "recurrent_dropout {} is not supported by the LSTM layer and is ignored",
                config.recurrent_dropout
            );
        }
        if let Some(split) = &self.split {
            let features = split.train.feature_dimension();
            if features != 0 && features != config.feature_dimension {
                return Err(ForecastError::ConfigError(format!(
                    "Windows have {} features but feature_dimension is {}",
                    features, config.feature_dimension
                )));
            }
        }

        B::seed(config.seed);
        let model = StackedLstmConfig::from(config).init::<B>(&self.device);
        info!(
            "Built LSTM with {} layer(s) of {} cells",
            model.num_layers(),
            config.num_cells
        );

        self.model = Some(model);
        self.history = None;
        Ok(())
    }

    fn train_model(&mut self) -> Result<TrainingHistory> {
        let model = self.built_model()?.clone();
        let split = self.train_test_split()?;

        let (model, history) = fit(model, &split.train, self.data_handler.config(), &self.device)?;

        self.model = Some(model);
        self.history = Some(history.clone());
        Ok(history)
    }

    fn forecast_model(
        &self,
        start: Option<NaiveDateTime>,
        end: Option<NaiveDateTime>,
        freq: Option<Duration>,
    ) -> Result<Forecast> {
        let model = self.built_model()?.valid();

        match (start, end) {
            (None, None) => {
                let split = self.train_test_split()?;
                let window = split.test.last_input().ok_or_else(|| {
                    ForecastError::DataError("Testing set has no windows".to_string())
                })?;
                let prediction = predict(&model, std::slice::from_ref(window), 1, &self.device)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| {
                        ForecastError::ModelError("Model returned no prediction".to_string())
                    })?;

                Ok(Forecast::single(
                    self.data_handler.config().features_to_predict.clone(),
                    self.row_to_original_scale(&prediction),
                ))
            }
            (Some(start), Some(end)) => self.forecast_range(&model, start, end, freq),
            _ => Err(ForecastError::InvalidParameter(
                "Both start and end are required for a ranged forecast".to_string(),
            )),
        }
    }

    fn visualize_output(&self) -> Result<Vec<ForecastPlot>> {
        let model = self.built_model()?.valid();
        let split = self.train_test_split()?;
        let config = self.data_handler.config();
        let dataset = self.data_handler.current();

        let train_predictions = predict(&model, split.x_train(), config.batch_size, &self.device)?;
        let test_predictions = predict(&model, split.x_test(), config.batch_size, &self.device)?;

        let mut plots = Vec::with_capacity(config.features_to_predict.len());
        for (j, target) in config.features_to_predict.iter().enumerate() {
            let original: Vec<f64> = dataset
                .column(target)?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            let train_fit: Vec<f64> = train_predictions.iter().map(|row| row[j]).collect();
            let test_fit: Vec<f64> = test_predictions.iter().map(|row| row[j]).collect();

            let plot = ForecastPlot::new(
                target,
                &self.to_original_scale(j, &original),
                &self.to_original_scale(j, &train_fit),
                &self.to_original_scale(j, &test_fit),
                config.window_size,
                split.split_index,
            );
            let path = self.render_plot(&plot)?;
            info!("Plotted {} to {}", target, path.display());
            plots.push(plot);
        }

        Ok(plots)
    }

    fn evaluate_model(&self) -> Result<f64> {
        let model = self.built_model()?.valid();
        let split = self.train_test_split()?;
        let config = self.data_handler.config();

        evaluate_loss(
            &model,
            split.x_test(),
            split.y_test(),
            config.loss,
            config.batch_size,
            &self.device,
        )
    }

    fn save_model(&self, filename: &str) -> Result<PathBuf> {
        let model = self.built_model()?;
        let config = self.data_handler.config();
        fs::create_dir_all(&config.model_dir)?;

        let path = weights_path(config, filename);
        model
            .clone()
            .save_file(path.clone(), &BinFileRecorder::<FullPrecisionSettings>::new())
            .map_err(|e| ForecastError::ModelError(format!("Cannot save weights: {:?}", e)))?;
        Ok(path)
    }

    fn load_model(&mut self, filename: &str) -> Result<()> {
        let model = self.built_model()?.clone();
        let path = existing_weights(self.data_handler.config(), filename)?;

        let model = model
            .load_file(
                path.clone(),
                &BinFileRecorder::<FullPrecisionSettings>::new(),
                &self.device,
            )
            .map_err(|e| ForecastError::ModelError(format!("Cannot load weights: {:?}", e)))?;
        info!("Loaded weights from {}", path.display());

        self.model = Some(model);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_autodiff::Autodiff;
    use burn_ndarray::{NdArray, NdArrayDevice};
    use polars::prelude::*;

    type TestBackend = Autodiff<NdArray<f32>>;

    fn network(config: ForecastConfig) -> LstmNetwork<TestBackend> {
        let close: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let df = DataFrame::new(vec![Series::new("close", close)]).unwrap();
        let handler = DataHandler::new(df, config).unwrap();
        LstmNetwork::new(handler, NdArrayDevice::default())
    }

    #[test]
    fn test_feedback_positions() {
        let config = ForecastConfig::new("close").with_feature_columns(&["open", "close"]);

        assert_eq!(
            LstmNetwork::<TestBackend>::feedback_positions(&config),
            vec![(1, 0)]
        );
    }

    #[test]
    fn test_only_standardized_targets_are_destandardized() {
        let close: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let volume: Vec<f64> = (0..20).map(|i| 0.5 + 0.01 * i as f64).collect();
        let df = DataFrame::new(vec![Series::new("close", close), Series::new("volume", volume)]).unwrap();
        let mut config = ForecastConfig::new("close");
        config.features_to_predict = vec!["close".to_string(), "volume".to_string()];
        config.feature_dimension = 2;
        config.output_dimension = 2;
        let handler = DataHandler::new(df, config).unwrap();
        let net = LstmNetwork::<TestBackend>::new(handler, NdArrayDevice::default());

        let row = net.row_to_original_scale(&[0.0, 0.25]);

        assert!((row[0] - 109.5).abs() < 1e-9);
        assert_eq!(row[1], 0.25);
    }

    #[test]
    fn test_train_before_split_fails() {
        let mut net = network(ForecastConfig::new("close").with_window_size(3).with_layers(1, 4));
        net.build_model().unwrap();

        assert!(matches!(
            net.train_model(),
            Err(ForecastError::DataError(_))
        ));
    }

    #[test]
    fn test_ranged_forecast_requires_both_dates() {
        let mut net = network(ForecastConfig::new("close").with_window_size(3).with_layers(1, 4));
        net.build_model().unwrap();
        let date = crate::utils::parse_datetime("2024-01-01").unwrap();

        assert!(matches!(
            net.forecast_model(Some(date), None, None),
            Err(ForecastError::InvalidParameter(_))
        ));
    }
}
