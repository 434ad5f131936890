//! Multi-class AdaBoost (SAMME) over decision stumps.
//!
//! Each round fits the stump with the lowest weighted error, scores it with
//! `alpha = lr * (ln((1 - err) / err) + ln(K - 1))` and boosts the weight of
//! the samples it misclassified. Class probabilities are the normalised
//! alpha-weighted votes of all stumps.
use log::{debug, info, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;

use crate::config::{ModelConfig, ModelType};
use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::{check_training_input, check_width, ClassifierModel};

/// Depth-one tree: `x[feature] <= threshold` votes `left`, otherwise `right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Stump {
    pub feature: usize,
    pub threshold: f64,
    pub left: usize,
    pub right: usize,
}

impl Stump {
    fn predict_row(&self, row: &ArrayView1<f64>) -> usize {
        if row[self.feature] <= self.threshold {
            self.left
        } else {
            self.right
        }
    }
}

fn argmax(values: &[f64]) -> (usize, f64) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

/// Best split on one feature, returned with its weighted error.
fn best_split_for_feature(
    column: ArrayView1<f64>,
    y: &[usize],
    weights: &Array1<f64>,
    n_classes: usize,
) -> (Stump, f64) {
    let mut order: Vec<usize> = (0..column.len()).collect();
    order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

    let total: f64 = weights.sum();
    let mut right = vec![0.0; n_classes];
    for (&label, &w) in y.iter().zip(weights.iter()) {
        right[label] += w;
    }
    let mut left = vec![0.0; n_classes];

    // Threshold below every value: everything goes right.
    let (right_class, right_best) = argmax(&right);
    let mut best = (
        Stump {
            feature: 0,
            threshold: f64::NEG_INFINITY,
            left: right_class,
            right: right_class,
        },
        total - right_best,
    );

    for (pos, &i) in order.iter().enumerate() {
        left[y[i]] += weights[i];
        right[y[i]] -= weights[i];
        let Some(&next) = order.get(pos + 1) else {
            break;
        };
        if column[next] <= column[i] {
            continue;
        }
        let (lc, lw) = argmax(&left);
        let (rc, rw) = argmax(&right);
        let err = total - lw - rw;
        if err < best.1 {
            best = (
                Stump {
                    feature: 0,
                    threshold: 0.5 * (column[i] + column[next]),
                    left: lc,
                    right: rc,
                },
                err,
            );
        }
    }
    best
}

fn fit_stump(x: &Array2<f64>, y: &[usize], weights: &Array1<f64>, n_classes: usize) -> (Stump, f64) {
    (0..x.ncols())
        .into_par_iter()
        .map(|feature| {
            let (mut stump, err) = best_split_for_feature(x.column(feature), y, weights, n_classes);
            stump.feature = feature;
            (stump, err)
        })
        .reduce_with(|a, b| {
            if b.1 < a.1 || (b.1 == a.1 && b.0.feature < a.0.feature) {
                b
            } else {
                a
            }
        })
        .unwrap_or((
            Stump {
                feature: 0,
                threshold: f64::NEG_INFINITY,
                left: 0,
                right: 0,
            },
            f64::INFINITY,
        ))
}

pub struct AdaBoostClassifier {
    params: ModelConfig,
    n_classes: usize,
    estimators: Vec<(Stump, f64)>,
    /// Class frequencies of the training labels; used when no stump beat chance.
    prior: Vec<f64>,
    input_width: Option<usize>,
}

impl AdaBoostClassifier {
    pub fn new(params: ModelConfig, n_classes: usize) -> Self {
        AdaBoostClassifier {
            params,
            n_classes,
            estimators: Vec::new(),
            prior: Vec::new(),
            input_width: None,
        }
    }

    /// Fitted stumps and their weights.
    pub fn estimators(&self) -> &[(Stump, f64)] {
        &self.estimators
    }
}

impl ClassifierModel for AdaBoostClassifier {
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        _x_eval: Option<&Array2<f64>>,
        _y_eval: Option<&[usize]>,
    ) -> Result<()> {
        let ModelType::AdaBoost { n_estimators } = self.params.model_type else {
            return Err(EmofaceError::InvalidConfig(format!(
                "expected an adaboost configuration, got {}",
                self.params.model_type
            )));
        };
        check_training_input(x, y, self.n_classes)?;

        let n = x.nrows();
        let k = self.n_classes as f64;
        let learning_rate = self.params.learning_rate;
        let mut weights = Array1::from_elem(n, 1.0 / n as f64);
        let mut estimators = Vec::with_capacity(n_estimators);

        let mut prior = vec![0.0; self.n_classes];
        for &label in y {
            prior[label] += 1.0 / n as f64;
        }

        for round in 0..n_estimators {
            let (stump, err) = fit_stump(x, y, &weights, self.n_classes);
            let err = err / weights.sum();

            if err >= 1.0 - 1.0 / k {
                if estimators.is_empty() {
                    warn!("AdaBoost: no stump beats chance; falling back to the class prior");
                }
                break;
            }

            let err_clamped = err.max(1e-10);
            let alpha = learning_rate * (((1.0 - err_clamped) / err_clamped).ln() + (k - 1.0).ln());
            debug!(
                "AdaBoost round {}: feature {} err {:.4} alpha {:.4}",
                round, stump.feature, err, alpha
            );

            let mut misclassified = 0;
            for (i, row) in x.axis_iter(Axis(0)).enumerate() {
                if stump.predict_row(&row) != y[i] {
                    weights[i] *= alpha.exp();
                    misclassified += 1;
                }
            }
            let total = weights.sum();
            weights.mapv_inplace(|w| w / total);
            estimators.push((stump, alpha));

            if misclassified == 0 {
                break;
            }
        }

        info!(
            "AdaBoost: {} stumps on {} samples x {} features",
            estimators.len(),
            n,
            x.ncols()
        );
        self.estimators = estimators;
        self.prior = prior;
        self.input_width = Some(x.ncols());
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>> {
        check_width(self.input_width, x)?;
        let mut out = Array2::<f32>::zeros((x.nrows(), self.n_classes));
        let total_alpha: f64 = self.estimators.iter().map(|(_, a)| a).sum();

        for (row, mut dst) in x.axis_iter(Axis(0)).zip(out.rows_mut()) {
            if total_alpha <= 0.0 {
                for (d, &p) in dst.iter_mut().zip(&self.prior) {
                    *d = p as f32;
                }
                continue;
            }
            let mut votes = vec![0.0; self.n_classes];
            for (stump, alpha) in &self.estimators {
                votes[stump.predict_row(&row)] += alpha;
            }
            for (d, v) in dst.iter_mut().zip(votes) {
                *d = (v / total_alpha) as f32;
            }
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "adaboost"
    }

    fn input_width(&self) -> Option<usize> {
        self.input_width
    }
}
