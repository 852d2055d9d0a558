use approx::assert_relative_eq;
use chrono::Duration;
use forecast_net::config::{ColumnOp, EngineeredFeature, FeatureKind};
use forecast_net::data::{DataHandler, Dataset};
use forecast_net::{ForecastConfig, ForecastError};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn write_prices(path: &Path, rows: usize) {
    let mut text = String::from("timestamp,open,close,volume\n");
    for i in 0..rows {
        let close = 100.0 + i as f64 + if i % 2 == 0 { 0.5 } else { -0.5 };
        text.push_str(&format!(
            "2023-01-02 09:{:02}:00,{},{},{}\n",
            30 + i,
            close - 0.25,
            close,
            1000 + 10 * i
        ));
    }
    fs::write(path, text).unwrap();
}

fn handler(rows: usize, config: ForecastConfig) -> (tempfile::TempDir, DataHandler) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prices.csv");
    write_prices(&path, rows);
    let config = config.with_dirs(
        dir.path().join("data"),
        dir.path().join("models"),
        dir.path().join("plots"),
    );
    let handler = DataHandler::from_csv(&path, config).unwrap();
    (dir, handler)
}

#[test]
fn test_load_csv_detects_time_column() {
    let (_dir, handler) = handler(10, ForecastConfig::new("close"));

    assert_eq!(handler.len(), 10);
    assert_eq!(handler.raw().time_column(), Some("timestamp"));
    assert_eq!(
        handler.raw().infer_sampling_frequency().unwrap(),
        Duration::minutes(1)
    );
}

#[test]
fn test_missing_target_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("prices.csv");
    write_prices(&path, 5);

    let result = DataHandler::from_csv(&path, ForecastConfig::new("adj_close"));

    assert!(matches!(result, Err(ForecastError::DataError(_))));
}

#[test]
fn test_standardized_target_has_zero_mean() {
    let (_dir, mut handler) = handler(12, ForecastConfig::new("close"));

    let processed = handler.preprocess_data().unwrap();
    let close: Vec<f64> = processed
        .column("close")
        .unwrap()
        .into_iter()
        .map(Option::unwrap)
        .collect();

    let mean = close.iter().sum::<f64>() / close.len() as f64;
    assert_relative_eq!(mean, 0.0, epsilon = 1e-9);

    let stats = handler.target_stats().get(0).unwrap();
    assert_relative_eq!(stats.mean, 105.5, epsilon = 1e-9);
}

#[test]
fn test_engineered_features_drop_leading_rows() {
    let mut config = ForecastConfig::new("close").with_feature_columns(&["close", "returns", "ma3"]);
    config.extra_features = vec![
        EngineeredFeature {
            name: "returns".to_string(),
            source: None,
            kind: FeatureKind::PctChange { periods: 1 },
        },
        EngineeredFeature {
            name: "ma3".to_string(),
            source: Some("open".to_string()),
            kind: FeatureKind::RollingMean { window: 3 },
        },
    ];
    let (_dir, mut handler) = handler(10, config);

    let processed = handler.preprocess_data().unwrap();

    assert!(processed.has_column("returns"));
    assert!(processed.has_column("ma3"));
    assert_eq!(processed.len(), 8);
    assert_eq!(handler.raw().len(), 10);
}

#[test]
fn test_engineered_features_are_scaled_before_rows_drop() {
    let mut config = ForecastConfig::new("close").with_feature_columns(&["close", "returns", "ma2"]);
    config.extra_features = vec![
        EngineeredFeature {
            name: "returns".to_string(),
            source: None,
            kind: FeatureKind::PctChange { periods: 1 },
        },
        EngineeredFeature {
            name: "ma2".to_string(),
            source: Some("open".to_string()),
            kind: FeatureKind::RollingMean { window: 2 },
        },
    ];
    config.columns_to_standardize = vec!["close".to_string(), "returns".to_string()];
    config.columns_to_normalize = vec!["ma2".to_string()];
    let (_dir, mut handler) = handler(12, config);

    let processed = handler.preprocess_data().unwrap();
    assert_eq!(processed.len(), 11);

    let returns = processed.column("returns").unwrap();
    assert!(returns.iter().all(Option::is_some));
    let mean = returns.iter().flatten().sum::<f64>() / returns.len() as f64;
    assert_relative_eq!(mean, 0.0, epsilon = 1e-9);

    let ma2: Vec<f64> = processed.column("ma2").unwrap().into_iter().flatten().collect();
    assert_eq!(ma2.len(), 11);
    assert_relative_eq!(ma2.iter().cloned().fold(f64::INFINITY, f64::min), 0.0, epsilon = 1e-12);
    assert_relative_eq!(ma2.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 1.0, epsilon = 1e-12);

    assert_eq!(handler.raw().len(), 12);
    assert!(!handler.raw().has_column("returns"));
}

#[test]
fn test_preprocess_is_idempotent() {
    let mut config = ForecastConfig::new("close");
    config.columns_to_normalize = vec!["volume".to_string()];
    let (_dir, mut handler) = handler(15, config);

    let first = handler.preprocess_data().unwrap().column("volume").unwrap();
    let second = handler.preprocess_data().unwrap().column("volume").unwrap();

    assert_eq!(first, second);
    assert_eq!(first.first().copied().flatten(), Some(0.0));
    assert_eq!(first.last().copied().flatten(), Some(1.0));
}

#[test]
fn test_custom_operations_run_after_scaling() {
    let mut config = ForecastConfig::new("close");
    config.columns_to_normalize = vec!["volume".to_string()];
    config.custom_preprocessor_columns = vec!["volume".to_string()];
    config.custom_preprocessors = vec![ColumnOp::Clip { min: 0.25, max: 0.75 }];
    let (_dir, handler) = handler(9, config);
    let mut handler = handler.with_custom_preprocessor(|dataset: &Dataset, name: &str| {
        Ok(dataset
            .column(name)?
            .into_iter()
            .map(|v| v.map(|x| x * 2.0))
            .collect())
    });

    let volume = handler.preprocess_data().unwrap().column("volume").unwrap();

    assert_eq!(volume.first().copied().flatten(), Some(0.5));
    assert_eq!(volume.last().copied().flatten(), Some(1.5));
}

#[test]
fn test_constant_column_cannot_be_standardized() {
    let mut config = ForecastConfig::new("close");
    config.columns_to_standardize = vec!["close".to_string(), "flat".to_string()];
    let dir = tempdir().unwrap();
    let path = dir.path().join("flat.csv");
    fs::write(&path, "close,flat\n1.0,3.0\n2.0,3.0\n3.0,3.0\n").unwrap();

    let mut handler = DataHandler::from_csv(&path, config).unwrap();

    assert!(matches!(
        handler.preprocess_data(),
        Err(ForecastError::DataError(_))
    ));
}

#[test]
fn test_window_transform_uses_processed_data() {
    let config = ForecastConfig::new("close").with_window_size(4);
    let (_dir, mut handler) = handler(10, config);
    handler.preprocess_data().unwrap();

    let windows = handler.window_transform_series().unwrap();

    assert_eq!(windows.len(), 6);
    assert_eq!(windows.window_size(), 4);
    assert_eq!(windows.feature_dimension(), 1);
    assert_eq!(windows.output_dimension(), 1);
}

#[test]
fn test_save_data_writes_processed_rows() {
    let (dir, mut handler) = handler(6, ForecastConfig::new("close"));
    handler.preprocess_data().unwrap();

    let path = handler.save_data("processed.csv").unwrap();

    assert_eq!(path, dir.path().join("data").join("processed.csv"));
    let text = fs::read_to_string(&path).unwrap();
    assert_eq!(text.lines().count(), 7);
    assert!(text.lines().next().unwrap().contains("close"));
}
