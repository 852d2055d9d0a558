use std::fs;
use std::process::Command;
use tempfile::tempdir;

#[test]
fn test_stdout_holds_only_the_forecast() {
    let dir = tempdir().unwrap();
    let root = dir.path();

    let mut prices = String::from("timestamp,close\n");
    for i in 0..30 {
        prices.push_str(&format!(
            "2023-01-02 09:{:02}:00,{:.4}\n",
            30 + i,
            100.0 + (i as f64 * 0.5).cos() * 2.0 + i as f64 * 0.1
        ));
    }
    fs::write(root.join("prices.csv"), prices).unwrap();

    let config = format!(
        r#"{{
            "window_size": 3,
            "num_layers": 1,
            "num_cells": 4,
            "epochs": 2,
            "batch_size": 8,
            "data_dir": "{data}",
            "model_dir": "{models}",
            "plot_dir": "{plots}"
        }}"#,
        data = root.join("data").display(),
        models = root.join("models").display(),
        plots = root.join("plots").display(),
    );
    fs::write(root.join("config.json"), config).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_run_forecast"))
        .arg(root.join("config.json"))
        .arg(root.join("prices.csv"))
        .arg("weights")
        .arg("--train")
        .args(["--save-data", "processed.csv"])
        .env("RUST_LOG", "info")
        .output()
        .unwrap();

    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0], "close");
    assert!(lines[1].parse::<f64>().unwrap().is_finite());
    assert!(root.join("data").join("processed.csv").is_file());
}
