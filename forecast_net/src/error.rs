//! Error types for the forecast_net crate

use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the forecast_net crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to data validation or processing
    #[error("Data error: {0}")]
    DataError(String),

    /// Error related to parameter validation
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error in the loaded configuration
    #[error("Config error: {0}")]
    ConfigError(String),

    /// A model operation was requested before `build_model`
    #[error("Model has not been built")]
    ModelNotBuilt,

    /// No weight file at the resolved path
    #[error("Model weights not found: {0}")]
    ModelNotFound(String),

    /// Error raised by the neural network framework
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error related to forecast dates
    #[error("Date error: {0}")]
    DateError(String),

    /// Error while rendering a plot
    #[error("Plot error: {0}")]
    PlotError(String),

    /// Error from series transforms
    #[error("Math error: {0}")]
    MathError(#[from] series_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// Error from CSV writing
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}
