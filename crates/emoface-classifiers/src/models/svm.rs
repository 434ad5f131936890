use linfa::traits::Fit;
use linfa::DatasetBase;
use linfa_svm::{Svm, SvmParams};
use log::{debug, info};
use ndarray::{Array1, Array2, ArrayView2, Axis};

use crate::config::{ModelConfig, ModelType};
use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::{check_training_input, check_width, ClassifierModel};

/// One-vs-rest support vector classifier.
///
/// Each class gets a binary SVM; per-class decision values are turned into
/// probabilities with a softmax. The binary problems are fitted one after
/// another over a shared view of the features, so only one `n x n` kernel
/// matrix is alive at a time.
pub struct SVMClassifier {
    params: ModelConfig,
    n_classes: usize,
    /// `None` for classes absent from the training labels.
    models: Vec<Option<Svm<f64, bool>>>,
    input_width: Option<usize>,
}

impl SVMClassifier {
    pub fn new(params: ModelConfig, n_classes: usize) -> Self {
        SVMClassifier {
            params,
            n_classes,
            models: Vec::new(),
            input_width: None,
        }
    }

    fn binary_params(&self, x: &Array2<f64>) -> Result<SvmParams<f64, bool>> {
        let ModelType::Svm {
            c,
            eps,
            kernel,
            gaussian_kernel_eps,
            polynomial_kernel_constant,
            polynomial_kernel_degree,
        } = &self.params.model_type
        else {
            return Err(EmofaceError::InvalidConfig(format!(
                "expected an svm configuration, got {}",
                self.params.model_type
            )));
        };

        let model = Svm::<f64, bool>::params().eps(*eps).pos_neg_weights(*c, *c);
        let model = match kernel.as_str() {
            "linear" => model.linear_kernel(),
            "gauss" => {
                let width = gaussian_kernel_eps.unwrap_or_else(|| default_gaussian_eps(x));
                debug!("SVM gaussian kernel eps = {}", width);
                model.gaussian_kernel(width)
            }
            "poly" => {
                model.polynomial_kernel(*polynomial_kernel_constant, *polynomial_kernel_degree)
            }
            other => {
                return Err(EmofaceError::InvalidConfig(format!(
                    "unsupported kernel type: {}. Valid options are: linear, gauss, poly",
                    other
                )))
            }
        };
        Ok(model)
    }

    fn decision_values(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut scores = Array2::from_elem((x.nrows(), self.n_classes), f64::NEG_INFINITY);
        for (class, model) in self.models.iter().enumerate() {
            if let Some(model) = model {
                for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                    scores[[i, class]] = model.weighted_sum(&row) - model.rho;
                }
            }
        }
        scores
    }
}

/// Fit the binary `class` vs. rest problem, or `None` when `class` has no
/// training samples.
fn fit_one_vs_rest(
    params: &SvmParams<f64, bool>,
    x: ArrayView2<f64>,
    y: &[usize],
    class: usize,
) -> Result<Option<Svm<f64, bool>>> {
    let targets: Array1<bool> = y.iter().map(|&l| l == class).collect();
    if !targets.iter().any(|&t| t) {
        return Ok(None);
    }
    let dataset = DatasetBase::new(x, targets.view());
    let model = params.fit(&dataset)?;
    debug!("SVM class {}: {} support vectors", class, model.nsupport());
    Ok(Some(model))
}

/// `n_features * var(x)`, the kernel width that makes the gaussian kernel
/// scale-invariant. Falls back to 1 for constant input.
fn default_gaussian_eps(x: &Array2<f64>) -> f64 {
    let n = x.len() as f64;
    if n == 0.0 {
        return 1.0;
    }
    let mean = x.sum() / n;
    let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    let eps = x.ncols() as f64 * var;
    if eps > 0.0 {
        eps
    } else {
        1.0
    }
}

impl ClassifierModel for SVMClassifier {
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        _x_eval: Option<&Array2<f64>>,
        _y_eval: Option<&[usize]>,
    ) -> Result<()> {
        check_training_input(x, y, self.n_classes)?;
        let params = self.binary_params(x)?;

        let models = (0..self.n_classes)
            .map(|class| fit_one_vs_rest(&params, x.view(), y, class))
            .collect::<Result<Vec<_>>>()?;

        info!(
            "SVM: fitted {} one-vs-rest models on {} samples x {} features",
            models.iter().filter(|m| m.is_some()).count(),
            x.nrows(),
            x.ncols()
        );
        self.models = models;
        self.input_width = Some(x.ncols());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>> {
        check_width(self.input_width, x)?;
        let scores = self.decision_values(x);
        Ok(softmax(&scores))
    }

    fn name(&self) -> &str {
        "svm"
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }
}

fn softmax(scores: &Array2<f64>) -> Array2<f32> {
    let mut out = Array2::<f32>::zeros(scores.dim());
    for (src, mut dst) in scores.rows().into_iter().zip(out.rows_mut()) {
        let max = src.fold(f64::NEG_INFINITY, |a, &b| a.max(b));
        let exp: Vec<f64> = src.iter().map(|&s| (s - max).exp()).collect();
        let total: f64 = exp.iter().sum();
        for (d, e) in dst.iter_mut().zip(exp) {
            *d = (e / total) as f32;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(kernel: &str) -> ModelConfig {
        ModelConfig::new(
            1e-3,
            ModelType::Svm {
                c: 1.0,
                eps: 1e-7,
                kernel: kernel.to_string(),
                gaussian_kernel_eps: None,
                polynomial_kernel_constant: 1.0,
                polynomial_kernel_degree: 2.0,
            },
        )
    }

    fn three_clusters() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [5.0, 5.0],
            [5.2, 4.9],
            [4.8, 5.1],
            [0.0, 5.0],
            [0.1, 5.2],
            [-0.2, 4.9]
        ];
        (x, vec![0, 0, 0, 1, 1, 1, 2, 2, 2])
    }

    #[test]
    fn separable_clusters_are_memorised() {
        let (x, y) = three_clusters();
        for kernel in ["gauss", "linear"] {
            let mut model = SVMClassifier::new(params(kernel), 3);
            model.fit(&x, &y, None, None).unwrap();
            assert_eq!(model.predict(&x).unwrap(), y, "kernel {}", kernel);
        }
    }

    #[test]
    fn probabilities_are_normalised() {
        let (x, y) = three_clusters();
        let mut model = SVMClassifier::new(params("gauss"), 3);
        model.fit(&x, &y, None, None).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (9, 3));
        for row in proba.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn absent_class_never_wins() {
        let (x, y) = three_clusters();
        let y: Vec<usize> = y.into_iter().map(|l| if l == 2 { 1 } else { l }).collect();
        let mut model = SVMClassifier::new(params("linear"), 3);
        model.fit(&x, &y, None, None).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba.column(2).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn one_vs_rest_problem_separates_its_class() {
        let (x, y) = three_clusters();
        let model = SVMClassifier::new(params("linear"), 3);
        let params = model.binary_params(&x).unwrap();

        let svm = fit_one_vs_rest(&params, x.view(), &y, 1).unwrap().unwrap();
        for (row, &label) in x.rows().into_iter().zip(&y) {
            let score = svm.weighted_sum(&row) - svm.rho;
            assert_eq!(score > 0.0, label == 1);
        }
        assert!(fit_one_vs_rest(&params, x.view(), &y, 5).unwrap().is_none());
    }

    #[test]
    fn unknown_kernel_is_rejected() {
        let (x, y) = three_clusters();
        let mut model = SVMClassifier::new(params("sigmoid"), 3);
        assert!(matches!(
            model.fit(&x, &y, None, None),
            Err(EmofaceError::InvalidConfig(_))
        ));
    }

    #[test]
    fn width_is_checked() {
        let (x, y) = three_clusters();
        let mut model = SVMClassifier::new(params("linear"), 3);
        assert!(model.predict_proba(&x).is_err());
        model.fit(&x, &y, None, None).unwrap();
        assert!(model.predict_proba(&array![[1.0, 2.0, 3.0]]).is_err());
    }
}
