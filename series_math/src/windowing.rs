//! Sliding-window transform and temporal train/test splitting

use crate::{MathError, Result};
use serde::{Deserialize, Serialize};

/// Supervised-learning examples cut from a series with a sliding window.
///
/// `inputs[i]` holds `window_size` consecutive feature rows and `labels[i]`
/// holds the target values of the row right after that window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Windows {
    pub inputs: Vec<Vec<Vec<f64>>>,
    pub labels: Vec<Vec<f64>>,
}

impl Windows {
    /// Number of windows
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Length of each input window, or 0 when there are no windows
    pub fn window_size(&self) -> usize {
        self.inputs.first().map_or(0, Vec::len)
    }

    /// Number of features per time step, or 0 when there are no windows
    pub fn feature_dimension(&self) -> usize {
        self.inputs
            .first()
            .and_then(|w| w.first())
            .map_or(0, Vec::len)
    }

    /// Number of target values per label, or 0 when there are no windows
    pub fn output_dimension(&self) -> usize {
        self.labels.first().map_or(0, Vec::len)
    }

    /// The most recent input window
    pub fn last_input(&self) -> Option<&Vec<Vec<f64>>> {
        self.inputs.last()
    }

    /// Split into `[0, index)` and `[index, len)` keeping time order.
    pub fn split_at(&self, index: usize) -> (Windows, Windows) {
        let index = index.min(self.len());
        let head = Windows {
            inputs: self.inputs[..index].to_vec(),
            labels: self.labels[..index].to_vec(),
        };
        let tail = Windows {
            inputs: self.inputs[index..].to_vec(),
            labels: self.labels[index..].to_vec(),
        };
        (head, tail)
    }

    /// Select windows by position, in the given order
    pub fn select(&self, indices: &[usize]) -> Windows {
        Windows {
            inputs: indices.iter().map(|&i| self.inputs[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i].clone()).collect(),
        }
    }
}

/// Cut a series into sliding windows with stride 1.
///
/// `features` and `targets` are row-major matrices over the same N time
/// steps. The result has N - `window_size` windows: window `i` covers rows
/// `i..i + window_size` of `features` and is labelled with row
/// `i + window_size` of `targets`.
pub fn window_transform_series(
    features: &[Vec<f64>],
    targets: &[Vec<f64>],
    window_size: usize,
) -> Result<Windows> {
    if window_size == 0 {
        return Err(MathError::InvalidInput(
            "Window size must be greater than zero".to_string(),
        ));
    }
    if features.len() != targets.len() {
        return Err(MathError::InvalidInput(format!(
            "Feature rows ({}) and target rows ({}) differ",
            features.len(),
            targets.len()
        )));
    }
    if features.len() <= window_size {
        return Err(MathError::InsufficientData(format!(
            "Need more than {} rows to build windows, have {}",
            window_size,
            features.len()
        )));
    }
    check_rectangular(features, "feature")?;
    check_rectangular(targets, "target")?;

    let count = features.len() - window_size;
    let inputs = (0..count)
        .map(|start| features[start..start + window_size].to_vec())
        .collect();
    let labels = targets[window_size..].to_vec();

    Ok(Windows { inputs, labels })
}

fn check_rectangular(rows: &[Vec<f64>], what: &str) -> Result<()> {
    let width = rows.first().map_or(0, Vec::len);
    if width == 0 {
        return Err(MathError::InvalidInput(format!("{} rows are empty", what)));
    }
    if let Some(pos) = rows.iter().position(|r| r.len() != width) {
        return Err(MathError::InvalidInput(format!(
            "{} row {} has {} values, expected {}",
            what,
            pos,
            rows[pos].len(),
            width
        )));
    }
    Ok(())
}

/// Index separating the training portion from the test portion:
/// `ceil(fraction * total)`.
pub fn split_index(fraction: f64, total: usize) -> Result<usize> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(MathError::InvalidInput(format!(
            "Split fraction must be in (0, 1], got {}",
            fraction
        )));
    }

    Ok(((fraction * total as f64).ceil() as usize).min(total))
}

/// Split a sequence in time order at `split_index(fraction, items.len())`.
pub fn temporal_split<T: Clone>(items: &[T], fraction: f64) -> Result<(Vec<T>, Vec<T>)> {
    let index = split_index(fraction, items.len())?;
    Ok((items[..index].to_vec(), items[index..].to_vec()))
}
