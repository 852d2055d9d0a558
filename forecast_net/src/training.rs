//! Mini-batch training loop with a validation split and early stopping

use crate::config::{EarlyStopMetric, ForecastConfig, OptimizerKind};
use crate::error::{ForecastError, Result};
use crate::model::{compute_loss, evaluate_loss, inputs_tensor, labels_tensor, scalar, StackedLstm};
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer, RmsPropConfig, SgdConfig};
use burn::tensor::backend::AutodiffBackend;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use series_math::Windows;
use serde::{Deserialize, Serialize};

/// Losses recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub loss: f64,
    /// Loss on the validation windows, when there are any
    pub val_loss: Option<f64>,
}

/// Per-epoch losses of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingHistory {
    pub epochs: Vec<EpochMetrics>,
    pub stopped_early: bool,
}

impl TrainingHistory {
    /// Number of completed epochs
    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn last(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn losses(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.loss).collect()
    }

    pub fn val_losses(&self) -> Vec<Option<f64>> {
        self.epochs.iter().map(|e| e.val_loss).collect()
    }
}

/// Stops training once the monitored loss has not improved for `patience` epochs
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    metric: EarlyStopMetric,
    patience: usize,
    best: f64,
    wait: usize,
    warned: bool,
}

impl EarlyStopping {
    pub fn new(metric: EarlyStopMetric, patience: usize) -> Self {
        Self {
            metric,
            patience,
            best: f64::INFINITY,
            wait: 0,
            warned: false,
        }
    }

    /// Record an epoch and report whether training should stop
    pub fn should_stop(&mut self, metrics: &EpochMetrics) -> bool {
        let current = match self.metric {
            EarlyStopMetric::Loss => Some(metrics.loss),
            EarlyStopMetric::ValLoss => metrics.val_loss,
        };

        let Some(current) = current else {
            if !self.warned {
                warn!("Early stopping monitors val_loss but there is no validation data; it is disabled");
                self.warned = true;
            }
            return false;
        };

        if current < self.best {
            self.best = current;
            self.wait = 0;
            false
        } else {
            self.wait += 1;
            self.wait >= self.patience
        }
    }

    pub fn best(&self) -> Option<f64> {
        self.best.is_finite().then_some(self.best)
    }
}

/// Number of windows kept for training when `validation_split` of them are
/// held out from the end
pub fn validation_split_index(total: usize, validation_split: f64) -> usize {
    if validation_split <= 0.0 {
        total
    } else {
        ((total as f64) * (1.0 - validation_split)) as usize
    }
}

/// Fit `model` on `windows` with the optimizer named in `config`
pub fn fit<B: AutodiffBackend>(
    model: StackedLstm<B>,
    windows: &Windows,
    config: &ForecastConfig,
    device: &B::Device,
) -> Result<(StackedLstm<B>, TrainingHistory)> {
    match config.optimizer {
        OptimizerKind::Adam => fit_with(
            model,
            AdamConfig::new().init::<B, StackedLstm<B>>(),
            windows,
            config,
            device,
        ),
        OptimizerKind::Sgd => fit_with(
            model,
            SgdConfig::new().init::<B, StackedLstm<B>>(),
            windows,
            config,
            device,
        ),
        OptimizerKind::RmsProp => fit_with(
            model,
            RmsPropConfig::new().init::<B, StackedLstm<B>>(),
            windows,
            config,
            device,
        ),
    }
}

fn fit_with<B, O>(
    mut model: StackedLstm<B>,
    mut optimizer: O,
    windows: &Windows,
    config: &ForecastConfig,
    device: &B::Device,
) -> Result<(StackedLstm<B>, TrainingHistory)>
where
    B: AutodiffBackend,
    O: Optimizer<StackedLstm<B>, B>,
{
    let (train, validation) =
        windows.split_at(validation_split_index(windows.len(), config.validation_split));
    if train.is_empty() {
        return Err(ForecastError::DataError(format!(
            "No training windows left after holding out {} for validation",
            validation.len()
        )));
    }

    let batch_size = config.batch_size.max(1);
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut order: Vec<usize> = (0..train.len()).collect();
    let mut stopping = EarlyStopping::new(config.early_stop_metric, config.patience);
    let mut history = TrainingHistory::default();

    if config.verbose > 0 {
        info!(
            "Training on {} windows, validating on {}",
            train.len(),
            validation.len()
        );
    }

    for epoch in 1..=config.epochs {
        order.shuffle(&mut rng);

        let mut total = 0.0;
        for (step, indices) in order.chunks(batch_size).enumerate() {
            let batch = train.select(indices);
            let output = model.forward(inputs_tensor::<B>(&batch.inputs, device));
            let loss = compute_loss(config.loss, output, labels_tensor::<B>(&batch.labels, device));
            let batch_loss = scalar(loss.clone());
            if !batch_loss.is_finite() {
                return Err(ForecastError::ModelError(format!(
                    "Loss diverged at epoch {} batch {}",
                    epoch,
                    step + 1
                )));
            }
            total += batch_loss * indices.len() as f64;

            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            if config.verbose > 1 {
                debug!("epoch {} batch {} loss {:.6}", epoch, step + 1, batch_loss);
            }
        }

        let val_loss = if validation.is_empty() {
            None
        } else {
            Some(evaluate_loss(
                &model.valid(),
                &validation.inputs,
                &validation.labels,
                config.loss,
                batch_size,
                device,
            )?)
        };
        let metrics = EpochMetrics {
            epoch,
            loss: total / train.len() as f64,
            val_loss,
        };

        if config.verbose > 0 {
            match metrics.val_loss {
                Some(val) => info!(
                    "Epoch {}/{} - loss: {:.6} - val_loss: {:.6}",
                    epoch, config.epochs, metrics.loss, val
                ),
                None => info!("Epoch {}/{} - loss: {:.6}", epoch, config.epochs, metrics.loss),
            }
        }

        let stop = stopping.should_stop(&metrics);
        history.epochs.push(metrics);
        if stop {
            if config.verbose > 0 {
                info!("Early stopping after epoch {}", epoch);
            }
            history.stopped_early = true;
            break;
        }
    }

    Ok((model, history))
}
