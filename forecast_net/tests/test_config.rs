use forecast_net::{ForecastConfig, ForecastError, LossKind, OptimizerKind};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

#[test]
fn test_load_config_from_json_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(
        &path,
        r#"{
            "features_to_predict": ["close", "volume"],
            "feature_columns": ["open", "close", "volume"],
            "columns_to_standardize": ["close", "volume"],
            "window_size": 10,
            "feature_dimension": 3,
            "output_dimension": 2,
            "loss": "mean_absolute_error",
            "optimizer": "sgd",
            "model_dir": "weights"
        }"#,
    )
    .unwrap();

    let config = ForecastConfig::from_json_file(&path).unwrap();

    assert_eq!(config.features_to_predict, vec!["close", "volume"]);
    assert_eq!(config.window_size, 10);
    assert_eq!(config.loss, LossKind::MeanAbsoluteError);
    assert_eq!(config.optimizer, OptimizerKind::Sgd);
    assert_eq!(config.model_path("lstm"), PathBuf::from("weights").join("lstm"));
    assert_eq!(config.num_layers, 2);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{"window_size": 0}"#).unwrap();

    assert!(matches!(
        ForecastConfig::from_json_file(&path),
        Err(ForecastError::ConfigError(_))
    ));

    fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        ForecastConfig::from_json_file(&path),
        Err(ForecastError::SerdeError(_))
    ));

    assert!(matches!(
        ForecastConfig::from_json_file(dir.path().join("absent.json")),
        Err(ForecastError::IoError(_))
    ));
}
