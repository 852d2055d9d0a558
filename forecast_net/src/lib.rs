//! # Forecast Net
//!
//! LSTM forecasting of financial time series.
//!
//! ## Pipeline
//!
//! 1. [`DataHandler`] loads a table, engineers extra features, standardizes
//!    and normalizes columns, applies custom column operations and drops rows
//!    with missing values.
//! 2. The preprocessed table is cut into sliding windows labelled with the
//!    next value of each feature to predict, then split in time order into
//!    training and testing sets.
//! 3. [`LstmNetwork`] builds a stacked LSTM, trains or loads it, evaluates it
//!    on the testing set, plots its fit and forecasts the next step or a
//!    range of dates.
//!
//! ## Quick Start
//!
//! ```no_run
//! use forecast_net::{DefaultBackend, ForecastConfig, ForecastNetwork, LstmNetwork, RunOptions};
//!
//! let config = ForecastConfig::from_json_file("config.json")?;
//! let mut network =
//!     LstmNetwork::<DefaultBackend>::from_csv("data/prices.csv", config, Default::default())?;
//!
//! let forecast = network.run_model("weights", &RunOptions::default().train(true))?;
//! println!("{:?}", forecast.values());
//! # Ok::<(), forecast_net::ForecastError>(())
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod forecast;
pub mod lstm;
pub mod model;
pub mod network;
pub mod plot;
pub mod training;
pub mod utils;

pub use config::{
    ColumnOp, EarlyStopMetric, EngineeredFeature, FeatureKind, ForecastConfig, LossKind,
    OptimizerKind,
};
pub use data::{DataHandler, Dataset, TargetStats};
pub use error::{ForecastError, Result};
pub use forecast::Forecast;
pub use lstm::{LstmNetwork, TrainTestSplit};
pub use model::{StackedLstm, StackedLstmConfig};
pub use network::{ForecastNetwork, RunOptions};
pub use plot::{ForecastPlot, PlotSeries};
pub use training::{EarlyStopping, EpochMetrics, TrainingHistory};

/// CPU backend with automatic differentiation
pub type DefaultBackend = burn_autodiff::Autodiff<burn_ndarray::NdArray<f32>>;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
