use ndarray::Array2;

use crate::config::{ModelConfig, ModelType};
use crate::error::Result;
use crate::models::adaboost::AdaBoostClassifier;
use crate::models::classifier_trait::ClassifierModel;
use crate::models::cnn::CnnClassifier;
use crate::models::mlp::MlpClassifier;
use crate::models::svm::SVMClassifier;

/// Build an unfitted classifier for `n_classes` classes from a `ModelConfig`.
pub fn build_model(params: ModelConfig, n_classes: usize) -> Box<dyn ClassifierModel> {
    match params.model_type {
        ModelType::Cnn { .. } => Box::new(CnnClassifier::new(params, n_classes)),
        ModelType::Svm { .. } => Box::new(SVMClassifier::new(params, n_classes)),
        ModelType::AdaBoost { .. } => Box::new(AdaBoostClassifier::new(params, n_classes)),
        ModelType::Mlp { .. } => Box::new(MlpClassifier::new(params, n_classes)),
    }
}

/// Build and fit a classifier. The validation split is only handed to the
/// families that train iteratively.
pub fn train_model(
    params: &ModelConfig,
    n_classes: usize,
    x: &Array2<f64>,
    y: &[usize],
    validation: Option<(&Array2<f64>, &[usize])>,
) -> Result<Box<dyn ClassifierModel>> {
    let mut model = build_model(params.clone(), n_classes);
    let (x_eval, y_eval) = match validation {
        Some((xv, yv)) if model.uses_validation() => (Some(xv), Some(yv)),
        _ => (None, None),
    };
    model.fit(x, y, x_eval, y_eval)?;
    Ok(model)
}
