use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{linear, Linear, VarBuilder, VarMap};
use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::{check_training_input, ClassifierModel};
use crate::models::nn::{
    eval_tensors, labels_to_tensor, to_tensor, train_network, EpochMetrics, FittedNetwork,
    TrainingParams,
};
use crate::preprocessing;

/// Single hidden layer perceptron.
pub struct MlpNet {
    hidden: Linear,
    out: Linear,
}

impl MlpNet {
    pub fn new(vb: VarBuilder, input_len: usize, hidden: usize, n_classes: usize) -> Result<Self> {
        Ok(Self {
            hidden: linear(input_len, hidden, vb.pp("hidden"))?,
            out: linear(hidden, n_classes, vb.pp("out"))?,
        })
    }
}

impl Module for MlpNet {
    fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        xs.apply(&self.hidden)?.relu()?.apply(&self.out)
    }
}

pub struct MlpClassifier {
    params: ModelConfig,
    n_classes: usize,
    device: Device,
    fitted: Option<FittedNetwork<MlpNet>>,
    history: Vec<EpochMetrics>,
}

impl MlpClassifier {
    pub fn new(params: ModelConfig, n_classes: usize) -> Self {
        MlpClassifier {
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

impl ClassifierModel for MlpClassifier {
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        x_eval: Option<&Array2<f64>>,
        y_eval: Option<&[usize]>,
    ) -> Result<()> {
        let ModelType::Mlp {
            hidden,
            epochs,
            batch_size,
            early_stopping_patience,
        } = self.params.model_type
        else {
            return Err(EmofaceError::InvalidConfig(format!(
                "expected an mlp configuration, got {}",
                self.params.model_type
            )));
        };
        check_training_input(x, y, self.n_classes)?;

        let (scaler, scaled) = preprocessing::fit_transform(x)?;
        let x_t = to_tensor(&scaled, &self.device)?;
        let y_t = labels_to_tensor(y, &self.device)?;
        let eval = eval_tensors(x_eval, y_eval, |xv| scaler.transform(xv), &self.device)?;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &self.device);
        let net = MlpNet::new(vb, x.ncols(), hidden, self.n_classes)?;

        let training = TrainingParams {
            epochs,
            batch_size,
            learning_rate: self.params.learning_rate,
            seed: self.params.seed,
            patience: early_stopping_patience,
        };
        self.history = train_network(
            "mlp",
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
            input_width: x.ncols(),
        });
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>> {
        self.fitted
            .as_ref()
            .ok_or(EmofaceError::NotFitted("mlp"))?
            .predict_proba(x, self.n_classes, &self.device)
    }

    fn name(&self) -> &str {
        "mlp"
    }

    fn input_width(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.input_width)
    }

    fn uses_validation(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fits_and_predicts_every_row() {
        let x = array![
            [0.0, 0.1],
            [0.1, 0.0],
            [0.2, 0.1],
            [3.0, 3.1],
            [3.1, 3.0],
            [2.9, 3.2]
        ];
        let y = vec![0, 0, 0, 1, 1, 1];
        let params = ModelConfig::new(
            1e-2,
            ModelType::Mlp {
                hidden: 8,
                epochs: 5,
                batch_size: 2,
                early_stopping_patience: 3,
            },
        );
        let mut model = MlpClassifier::new(params, 2);
        model.fit(&x, &y, None, None).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (6, 2));
        assert_eq!(model.predict(&x).unwrap().len(), 6);
        assert_eq!(model.history().len(), 5);
        assert_eq!(model.predict_proba(&Array2::zeros((0, 2))).unwrap().dim(), (0, 2));
    }

    #[test]
    fn wrong_config_variant_is_rejected() {
        let mut model = MlpClassifier::new(ModelConfig::for_selector("svm").unwrap(), 2);
        let x = array![[0.0], [1.0]];
        assert!(matches!(
            model.fit(&x, &[0, 1], None, None),
            Err(EmofaceError::InvalidConfig(_))
        ));
    }
}
