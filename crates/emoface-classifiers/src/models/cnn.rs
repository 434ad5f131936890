use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{conv1d, linear, Conv1d, Conv1dConfig, Linear, VarBuilder, VarMap};
use log::info;
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::{check_training_input, ClassifierModel};
use crate::models::nn::{
    eval_tensors, labels_to_tensor, to_tensor, train_network, EpochMetrics, FittedNetwork,
    TrainingParams,
};
use crate::preprocessing;

/// One 1-D convolution over the feature vector followed by a two-layer head.
pub struct CnnNet {
    conv: Conv1d,
    fc1: Linear,
    fc2: Linear,
}

impl CnnNet {
    pub fn new(
        vb: VarBuilder,
        input_len: usize,
        filters: usize,
        hidden: usize,
        n_classes: usize,
    ) -> Result<Self> {
        let conv = conv1d(1, filters, 3, Conv1dConfig::default(), vb.pp("conv1"))?;
        let fc1 = linear(filters * input_len, hidden, vb.pp("fc1"))?;
        let fc2 = linear(hidden, n_classes, vb.pp("fc2"))?;
        Ok(Self { conv, fc1, fc2 })
    }
}

impl Module for CnnNet {
    /// `(batch, width)` → `(batch, 1, width + 2)` zero padded → logits
    /// `(batch, classes)`. The input is padded instead of the convolution so
    /// widths 1 and 2 still train.
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.unsqueeze(1)?
            .pad_with_zeros(2, 1, 1)?
            .apply(&self.conv)?
            .relu()?
            .flatten_from(1)?
            .apply(&self.fc1)?
            .relu()?
            .apply(&self.fc2)
    }
}

pub struct CnnClassifier {
    params: ModelConfig,
    n_classes: usize,
    device: Device,
    fitted: Option<FittedNetwork<CnnNet>>,
    history: Vec<EpochMetrics>,
}

impl CnnClassifier {
    pub fn new(params: ModelConfig, n_classes: usize) -> Self {
        CnnClassifier {
            params,
            n_classes,
            device: Device::Cpu,
            fitted: None,
            history: Vec::new(),
        }
    }

    pub fn history(&self) -> &[EpochMetrics] {
        &self.history
    }
}

impl ClassifierModel for CnnClassifier {
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        x_eval: Option<&Array2<f64>>,
        y_eval: Option<&[usize]>,
    ) -> Result<()> {
        let (epochs, batch_size, filters, hidden, patience, input_length) =
            match &self.params.model_type {
                ModelType::Cnn {
                    epochs,
                    batch_size,
                    filters,
                    hidden,
                    early_stopping_patience,
                    input_length,
                } => (
                    *epochs,
                    *batch_size,
                    *filters,
                    *hidden,
                    *early_stopping_patience,
                    *input_length,
                ),
                other => {
                    return Err(EmofaceError::InvalidConfig(format!(
                        "expected a cnn configuration, got {}",
                        other
                    )))
                }
            };
        check_training_input(x, y, self.n_classes)?;

        let input_len = x.ncols();
        if let Some(expected) = input_length {
            if expected != input_len {
                return Err(EmofaceError::InputShape {
                    expected,
                    found: input_len,
                });
            }
        }

        let (scaler, scaled) = preprocessing::fit_transform(x)?;
        let x_t = to_tensor(&scaled, &self.device)?;
        let y_t = labels_to_tensor(y, &self.device)?;
        let eval = eval_tensors(x_eval, y_eval, |xv| scaler.transform(xv), &self.device)?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let net = CnnNet::new(vb, input_len, filters, hidden, self.n_classes)?;
        info!(
            "CNN: input width {}, {} filters, {} hidden units, {} classes",
            input_len, filters, hidden, self.n_classes
        );

        let training = TrainingParams {
            epochs,
            batch_size,
            learning_rate: self.params.learning_rate,
            seed: self.params.seed,
            patience,
        };
        self.history = train_network(
            "cnn",
            &net,
            &varmap,
            &x_t,
            &y_t,
            eval.as_ref().map(|(xv, yv)| (xv, yv)),
            &training,
        )?;

        self.fitted = Some(FittedNetwork {
            net,
            varmap,
            scaler,
            input_width: input_len,
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>> {
        self.fitted
            .as_ref()
            .ok_or(EmofaceError::NotFitted("cnn"))?
            .predict_proba(x, self.n_classes, &self.device)
    }

    fn name(&self) -> &str {
        "cnn"
    }

    fn input_width(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.input_width)
    }

    fn uses_validation(&self) -> bool {
        true
    }
}
