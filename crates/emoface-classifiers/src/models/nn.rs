//! Shared candle plumbing for the CNN and MLP classifiers: tensor
//! conversion, the minibatch training loop and early stopping.
use candle_core::{DType, Device, Tensor, D};
use candle_nn::{loss, ops, AdamW, Module, Optimizer, ParamsAdamW, VarMap};
use log::{debug, info};
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::check_width;
use crate::preprocessing::Scaler;

/// Optimiser and stopping settings for one training run.
#[derive(Debug, Clone)]
pub struct TrainingParams {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Epochs without validation improvement before stopping.
    pub patience: usize,
    /// Seed for the per-epoch shuffle.
    pub seed: u64,
}

/// Loss summary of one epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochMetrics {
    pub epoch: usize,
    pub train_loss: f32,
    pub validation_loss: Option<f32>,
}

pub fn to_tensor(x: &Array2<f64>, device: &Device) -> Result<Tensor> {
    let data: Vec<f32> = x.iter().map(|&v| v as f32).collect();
    Ok(Tensor::from_vec(data, x.dim(), device)?)
}

pub fn labels_to_tensor(y: &[usize], device: &Device) -> Result<Tensor> {
    let data: Vec<u32> = y.iter().map(|&l| l as u32).collect();
    Ok(Tensor::from_vec(data, y.len(), device)?)
}

/// Row-wise softmax of the network output as an ndarray matrix.
pub fn softmax_rows(logits: &Tensor) -> Result<Array2<f32>> {
    let probs = ops::softmax(logits, D::Minus1)?;
    let (rows, cols) = probs.dims2()?;
    let data = probs.to_dtype(DType::F32)?.flatten_all()?.to_vec1::<f32>()?;
    Array2::from_shape_vec((rows, cols), data)
        .map_err(|e| EmofaceError::ShapeMismatch(e.to_string()))
}

fn evaluation_loss<M: Module>(net: &M, x: &Tensor, y: &Tensor) -> Result<f32> {
    let logits = net.forward(x)?;
    Ok(loss::cross_entropy(&logits, y)?.to_scalar::<f32>()?)
}

/// Minibatch AdamW training on cross-entropy loss.
///
/// With an evaluation split, training stops once the validation loss has not
/// improved for `patience` consecutive epochs.
pub fn train_network<M: Module>(
    name: &str,
    net: &M,
    varmap: &VarMap,
    x: &Tensor,
    y: &Tensor,
    eval: Option<(&Tensor, &Tensor)>,
    params: &TrainingParams,
) -> Result<Vec<EpochMetrics>> {
    let n_samples = x.dim(0)?;
    let batch_size = params.batch_size.max(1);
    let num_batches = n_samples.div_ceil(batch_size);

    info!(
        "Training {} on {} samples ({} batches) for up to {} epochs",
        name, n_samples, num_batches, params.epochs
    );

    let adamw = ParamsAdamW {
        lr: params.learning_rate,
        ..Default::default()
    };
    let mut opt = AdamW::new(varmap.all_vars(), adamw)?;

    let mut order: Vec<u32> = (0..n_samples as u32).collect();
    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut history = Vec::with_capacity(params.epochs);
    let mut best_val = f32::INFINITY;
    let mut epochs_without_improvement = 0;

    for epoch in 0..params.epochs {
        order.shuffle(&mut rng);
        let mut total_loss = 0.0f32;

        for batch in order.chunks(batch_size) {
            let idx = Tensor::from_slice(batch, batch.len(), x.device())?;
            let xb = x.index_select(&idx, 0)?;
            let yb = y.index_select(&idx, 0)?;

            let logits = net.forward(&xb)?;
            let batch_loss = loss::cross_entropy(&logits, &yb)?;
            opt.backward_step(&batch_loss)?;
            total_loss += batch_loss.to_scalar::<f32>()?;
        }

        let train_loss = total_loss / num_batches as f32;
        let validation_loss = match eval {
            Some((xv, yv)) => Some(evaluation_loss(net, xv, yv)?),
            None => None,
        };
        debug!(
            "[{}] epoch {}: train loss {:.4}, validation loss {:?}",
            name, epoch, train_loss, validation_loss
        );
        history.push(EpochMetrics {
            epoch,
            train_loss,
            validation_loss,
        });

        if let Some(val) = validation_loss {
            if val < best_val {
                best_val = val;
                epochs_without_improvement = 0;
            } else {
                epochs_without_improvement += 1;
                if epochs_without_improvement >= params.patience.max(1) {
                    info!(
                        "[{}] early stopping after epoch {} (best validation loss {:.4})",
                        name, epoch, best_val
                    );
                    break;
                }
            }
        }
    }

    if let Some(last) = history.last() {
        info!(
            "[{}] finished {} epochs, final train loss {:.4}",
            name,
            history.len(),
            last.train_loss
        );
    }

    Ok(history)
}

/// A trained network together with the scaler its inputs went through.
pub struct FittedNetwork<M: Module> {
    pub net: M,
    pub varmap: VarMap,
    pub scaler: Scaler,
    pub input_width: usize,
}

impl<M: Module> FittedNetwork<M> {
    pub fn predict_proba(&self, x: &Array2<f64>, n_classes: usize, device: &Device) -> Result<Array2<f32>> {
        check_width(Some(self.input_width), x)?;
        if x.nrows() == 0 {
            return Ok(Array2::zeros((0, n_classes)));
        }
        let scaled = self.scaler.transform(x)?;
        let logits = self.net.forward(&to_tensor(&scaled, device)?)?;
        softmax_rows(&logits)
    }
}

/// Evaluation split as tensors, or `None` when it is missing or empty.
pub fn eval_tensors(
    x_eval: Option<&Array2<f64>>,
    y_eval: Option<&[usize]>,
    transform: impl Fn(&Array2<f64>) -> Result<Array2<f64>>,
    device: &Device,
) -> Result<Option<(Tensor, Tensor)>> {
    match (x_eval, y_eval) {
        (Some(xv), Some(yv)) if xv.nrows() > 0 => {
            if xv.nrows() != yv.len() {
                return Err(EmofaceError::ShapeMismatch(format!(
                    "{} validation rows but {} labels",
                    xv.nrows(),
                    yv.len()
                )));
            }
            let scaled = transform(xv)?;
            Ok(Some((to_tensor(&scaled, device)?, labels_to_tensor(yv, device)?)))
        }
        _ => Ok(None),
    }
}
