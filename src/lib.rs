//! # Finance Forecast
//!
//! Single entry point to the workspace crates:
//!
//! - [`series_math`]: standardization, normalization, feature engineering and
//!   sliding windows over plain numeric columns
//! - [`forecast_net`]: data handling and the LSTM forecasting network
//!
//! ## Example
//!
//! ```
//! use finance_forecast::series_math::{to_column, window_transform_series};
//!
//! let series: Vec<Vec<f64>> = (1..=10).map(|v| vec![v as f64]).collect();
//! let windows = window_transform_series(&series, &series, 3).unwrap();
//!
//! assert_eq!(windows.len(), 7);
//! assert_eq!(windows.labels[0], vec![4.0]);
//! assert_eq!(to_column(&[1.0]), vec![Some(1.0)]);
//! ```

pub use forecast_net;
pub use series_math;

pub use forecast_net::{
    DataHandler, DefaultBackend, Forecast, ForecastConfig, ForecastError, ForecastNetwork,
    LstmNetwork, RunOptions,
};

/// Workspace version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
