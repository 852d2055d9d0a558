//! Stacked LSTM regressor built on burn
//!
//! The first `num_layers - 1` layers pass their full output sequence to the
//! next layer; only the final time step of the last layer reaches the linear
//! output head.

use crate::config::{ForecastConfig, LossKind};
use crate::error::{ForecastError, Result};
use burn::module::Module;
use burn::nn::{Dropout, DropoutConfig, Linear, LinearConfig, Lstm, LstmConfig};
use burn::tensor::backend::Backend;
use burn::tensor::{ElementConversion, Tensor, TensorData};
use serde::{Deserialize, Serialize};

/// Hyperparameters of [`StackedLstm`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackedLstmConfig {
    /// Features per time step
    pub input_size: usize,
    /// Cells per LSTM layer
    pub hidden_size: usize,
    /// Values predicted per window
    pub output_size: usize,
    pub num_layers: usize,
    /// Dropout applied to the input of every LSTM layer while training
    pub dropout: f64,
}

impl StackedLstmConfig {
    pub fn new(input_size: usize, hidden_size: usize, output_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            output_size,
            num_layers: 1,
            dropout: 0.0,
        }
    }

    pub fn with_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_dropout(mut self, dropout: f64) -> Self {
        self.dropout = dropout;
        self
    }

    /// Initialize a model with fresh weights on `device`
    pub fn init<B: Backend>(&self, device: &B::Device) -> StackedLstm<B> {
        let layers = (0..self.num_layers.max(1))
            .map(|i| {
                let d_input = if i == 0 {
                    self.input_size
                } else {
                    self.hidden_size
                };
                LstmConfig::new(d_input, self.hidden_size, true).init(device)
            })
            .collect();

        StackedLstm {
            layers,
            dropout: DropoutConfig::new(self.dropout).init(),
            output: LinearConfig::new(self.hidden_size, self.output_size).init(device),
        }
    }
}

impl From<&ForecastConfig> for StackedLstmConfig {
    fn from(config: &ForecastConfig) -> Self {
        Self::new(
            config.feature_dimension,
            config.num_cells,
            config.output_dimension,
        )
        .with_layers(config.num_layers)
        .with_dropout(config.dropout)
    }
}

/// Stacked LSTM layers followed by a dense output layer
#[derive(Module, Debug)]
pub struct StackedLstm<B: Backend> {
    layers: Vec<Lstm<B>>,
    dropout: Dropout,
    output: Linear<B>,
}

impl<B: Backend> StackedLstm<B> {
    /// Map windows `[batch, window_size, features]` to predictions `[batch, outputs]`
    pub fn forward(&self, input: Tensor<B, 3>) -> Tensor<B, 2> {
        let mut sequence = input;
        for layer in &self.layers {
            let (hidden, _) = layer.forward(self.dropout.forward(sequence), None);
            sequence = hidden;
        }

        let [batch, steps, hidden] = sequence.dims();
        let last = sequence
            .slice([0..batch, steps - 1..steps, 0..hidden])
            .reshape([batch, hidden]);
        self.output.forward(last)
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }
}

/// Mean loss of `predictions` against `targets`
pub fn compute_loss<B: Backend>(
    kind: LossKind,
    predictions: Tensor<B, 2>,
    targets: Tensor<B, 2>,
) -> Tensor<B, 1> {
    let error = predictions - targets;
    match kind {
        LossKind::MeanSquaredError => (error.clone() * error).mean(),
        LossKind::MeanAbsoluteError => error.abs().mean(),
    }
}

/// Read a single-element tensor as f64
pub fn scalar<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}

/// Pack windows into a `[batch, window_size, features]` tensor
pub fn inputs_tensor<B: Backend>(inputs: &[Vec<Vec<f64>>], device: &B::Device) -> Tensor<B, 3> {
    let steps = inputs.first().map_or(0, Vec::len);
    let features = inputs.first().and_then(|w| w.first()).map_or(0, Vec::len);
    let flat: Vec<f32> = inputs
        .iter()
        .flatten()
        .flatten()
        .map(|&v| v as f32)
        .collect();

    Tensor::from_data(TensorData::new(flat, [inputs.len(), steps, features]), device)
}

/// Pack label rows into a `[batch, outputs]` tensor
pub fn labels_tensor<B: Backend>(labels: &[Vec<f64>], device: &B::Device) -> Tensor<B, 2> {
    let outputs = labels.first().map_or(0, Vec::len);
    let flat: Vec<f32> = labels.iter().flatten().map(|&v| v as f32).collect();

    Tensor::from_data(TensorData::new(flat, [labels.len(), outputs]), device)
}

/// Unpack a `[batch, outputs]` tensor into rows
pub fn tensor_rows<B: Backend>(tensor: Tensor<B, 2>) -> Result<Vec<Vec<f64>>> {
    let [rows, cols] = tensor.dims();
    if rows == 0 || cols == 0 {
        return Ok(Vec::new());
    }

    let values = tensor
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| ForecastError::ModelError(format!("Cannot read predictions: {:?}", e)))?;

    Ok(values
        .chunks(cols)
        .map(|row| row.iter().map(|&v| v as f64).collect())
        .collect())
}

/// Predict every window, `batch_size` windows at a time
pub fn predict<B: Backend>(
    model: &StackedLstm<B>,
    inputs: &[Vec<Vec<f64>>],
    batch_size: usize,
    device: &B::Device,
) -> Result<Vec<Vec<f64>>> {
    let mut predictions = Vec::with_capacity(inputs.len());
    for chunk in inputs.chunks(batch_size.max(1)) {
        let output = model.forward(inputs_tensor::<B>(chunk, device));
        predictions.extend(tensor_rows(output)?);
    }
    Ok(predictions)
}

/// Mean loss over windows and labels, weighted by batch size
pub fn evaluate_loss<B: Backend>(
    model: &StackedLstm<B>,
    inputs: &[Vec<Vec<f64>>],
    labels: &[Vec<f64>],
    kind: LossKind,
    batch_size: usize,
    device: &B::Device,
) -> Result<f64> {
    if inputs.is_empty() || inputs.len() != labels.len() {
        return Err(ForecastError::DataError(format!(
            "Cannot evaluate {} windows against {} labels",
            inputs.len(),
            labels.len()
        )));
    }

    let batch_size = batch_size.max(1);
    let mut total = 0.0;
    for (x, y) in inputs.chunks(batch_size).zip(labels.chunks(batch_size)) {
        let output = model.forward(inputs_tensor::<B>(x, device));
        let loss = compute_loss(kind, output, labels_tensor::<B>(y, device));
        total += scalar(loss) * x.len() as f64;
    }

    Ok(total / inputs.len() as f64)
}
