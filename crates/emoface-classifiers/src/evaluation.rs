//! Test-split metrics: accuracy, confusion matrix and a per-class report.
use std::fmt;

use ndarray::Array2;

use crate::error::{EmofaceError, Result};
use crate::models::classifier_trait::ClassifierModel;
use crate::split::LabelEncoder;

/// Precision, recall and support of one class.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub support: usize,
}

#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub model: String,
    pub accuracy: f64,
    /// Rows are true classes, columns predicted classes.
    pub confusion: Array2<usize>,
    pub per_class: Vec<ClassMetrics>,
    pub n_samples: usize,
}

/// Fraction of positions where `predicted` equals `truth`.
pub fn accuracy(predicted: &[usize], truth: &[usize]) -> Result<f64> {
    if truth.is_empty() {
        return Err(EmofaceError::EmptyInput("accuracy of an empty set".to_string()));
    }
    if predicted.len() != truth.len() {
        return Err(EmofaceError::ShapeMismatch(format!(
            "{} predictions for {} labels",
            predicted.len(),
            truth.len()
        )));
    }
    let hits = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    Ok(hits as f64 / truth.len() as f64)
}

pub fn confusion_matrix(predicted: &[usize], truth: &[usize], n_classes: usize) -> Array2<usize> {
    let mut cm = Array2::zeros((n_classes, n_classes));
    for (&p, &t) in predicted.iter().zip(truth) {
        if p < n_classes && t < n_classes {
            cm[[t, p]] += 1;
        }
    }
    cm
}

fn class_metrics(confusion: &Array2<usize>, encoder: &LabelEncoder) -> Vec<ClassMetrics> {
    (0..confusion.nrows())
        .map(|c| {
            let tp = confusion[[c, c]];
            let support = confusion.row(c).sum();
            let predicted = confusion.column(c).sum();
            let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
            ClassMetrics {
                label: encoder.decode(c).unwrap_or("?").to_string(),
                precision: ratio(tp, predicted),
                recall: ratio(tp, support),
                support,
            }
        })
        .collect()
}

/// Score `model` on `(x, y)`. The model is only read.
pub fn evaluate_model(
    model: &dyn ClassifierModel,
    x: &Array2<f64>,
    y: &[usize],
    encoder: &LabelEncoder,
) -> Result<EvaluationReport> {
    if x.nrows() == 0 {
        return Err(EmofaceError::EmptyInput("test split has no samples".to_string()));
    }
    let predicted = model.predict(x)?;
    let acc = accuracy(&predicted, y)?;
    let confusion = confusion_matrix(&predicted, y, encoder.len());
    let per_class = class_metrics(&confusion, encoder);
    log::info!("{}: test accuracy {:.4} on {} samples", model.name(), acc, y.len());

    Ok(EvaluationReport {
        model: model.name().to_string(),
        accuracy: acc,
        confusion,
        per_class,
        n_samples: y.len(),
    })
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Accuracy: {:.4} ({} test samples, {})", self.accuracy, self.n_samples, self.model)?;
        writeln!(f)?;
        writeln!(f, "{:<12} {:>9} {:>9} {:>9}", "class", "precision", "recall", "support")?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:<12} {:>9.3} {:>9.3} {:>9}",
                m.label, m.precision, m.recall, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(f, "Confusion matrix (rows = true, columns = predicted):")?;
        for row in self.confusion.rows() {
            let cells: Vec<String> = row.iter().map(|v| format!("{:>5}", v)).collect();
            writeln!(f, "{}", cells.join(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    struct Fixed(Vec<usize>);

    impl ClassifierModel for Fixed {
        fn fit(
            &mut self,
            _x: &Array2<f64>,
            _y: &[usize],
            _x_eval: Option<&Array2<f64>>,
            _y_eval: Option<&[usize]>,
        ) -> Result<()> {
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>> {
            let mut out = Array2::zeros((x.nrows(), 2));
            for (i, &c) in self.0.iter().enumerate().take(x.nrows()) {
                out[[i, c]] = 1.0;
            }
            Ok(out)
        }

        fn input_width(&self) -> Option<usize> {
            Some(1)
        }
    }

    #[test]
    fn accuracy_bounds() {
        assert_eq!(accuracy(&[0, 1, 1], &[0, 1, 1]).unwrap(), 1.0);
        assert_eq!(accuracy(&[1, 0], &[0, 1]).unwrap(), 0.0);
        assert!(accuracy(&[], &[]).is_err());
    }

    #[test]
    fn report_counts_confusions() {
        let encoder = LabelEncoder::fit(["happy", "sad"]);
        let model = Fixed(vec![0, 0, 1, 0]);
        let x = array![[0.0], [0.0], [0.0], [0.0]];
        let report = evaluate_model(&model, &x, &[0, 0, 1, 1], &encoder).unwrap();

        assert_eq!(report.accuracy, 0.75);
        assert_eq!(report.confusion, array![[2, 0], [1, 1]]);
        assert_eq!(report.per_class[1].label, "sad");
        assert_eq!(report.per_class[1].recall, 0.5);
        assert!((report.per_class[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!(report.to_string().starts_with("Accuracy: 0.7500"));
    }

    #[test]
    fn empty_test_split_is_an_error() {
        let encoder = LabelEncoder::fit(["a", "b"]);
        let model = Fixed(vec![]);
        let err = evaluate_model(&model, &Array2::zeros((0, 1)), &[], &encoder).unwrap_err();
        assert!(matches!(err, EmofaceError::EmptyInput(_)));
    }
}
