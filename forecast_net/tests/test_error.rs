use forecast_net::error::ForecastError;
use series_math::MathError;
use std::io;

#[test]
fn test_error_conversion() {
    let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
    assert!(matches!(
        ForecastError::from(io_error),
        ForecastError::IoError(_)
    ));

    let math_error = MathError::InsufficientData("need 2 values".to_string());
    assert!(matches!(
        ForecastError::from(math_error),
        ForecastError::MathError(MathError::InsufficientData(_))
    ));

    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    assert!(matches!(
        ForecastError::from(json_error),
        ForecastError::SerdeError(_)
    ));
}

#[test]
fn test_error_display() {
    let error = ForecastError::InvalidParameter("window_size must be positive".to_string());
    assert!(error.to_string().contains("window_size must be positive"));

    let error = ForecastError::from(io::Error::new(
        io::ErrorKind::PermissionDenied,
        "permission denied",
    ));
    let text = error.to_string();
    assert!(text.contains("IO error"));
    assert!(text.contains("permission denied"));

    assert_eq!(
        ForecastError::ModelNotBuilt.to_string(),
        "Model has not been built"
    );
    assert!(ForecastError::ModelNotFound("models/weights.bin".to_string())
        .to_string()
        .contains("models/weights.bin"));
}
