use ndarray::Array2;

use crate::error::{EmofaceError, Result};

/// Contract shared by every classifier family. Labels are dense class
/// indices produced by the `LabelEncoder`.
pub trait ClassifierModel: Send + Sync {
    /// Fit the model. Only families that train iteratively look at the
    /// evaluation split; the others ignore it.
    fn fit(
        &mut self,
        x: &Array2<f64>,
        y: &[usize],
        x_eval: Option<&Array2<f64>>,
        y_eval: Option<&[usize]>,
    ) -> Result<()>;

    /// Class scores, one row per sample and one column per class. Rows sum
    /// to one.
    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f32>>;

    /// Most likely class index per row.
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        Ok(argmax_rows(&self.predict_proba(x)?))
    }

    fn name(&self) -> &str {
        "classifier"
    }

    /// Number of feature columns the fitted model expects.
    fn input_width(&self) -> Option<usize>;

    fn uses_validation(&self) -> bool {
        false
    }
}

/// Index of the largest value in every row. Ties go to the lowest index.
pub fn argmax_rows(scores: &Array2<f32>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0usize, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Common sanity checks on a training call.
pub(crate) fn check_training_input(
    x: &Array2<f64>,
    y: &[usize],
    n_classes: usize,
) -> Result<()> {
    if n_classes < 2 {
        return Err(EmofaceError::InvalidConfig(format!(
            "classification needs at least two classes, got {}",
            n_classes
        )));
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(EmofaceError::EmptyInput(format!(
            "training features have shape {:?}",
            x.dim()
        )));
    }
    if x.nrows() != y.len() {
        return Err(EmofaceError::ShapeMismatch(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if let Some(&bad) = y.iter().find(|&&l| l >= n_classes) {
        return Err(EmofaceError::ShapeMismatch(format!(
            "label {} out of range for {} classes",
            bad, n_classes
        )));
    }
    Ok(())
}

/// Prediction-time width check against the fitted width.
pub(crate) fn check_width(expected: Option<usize>, x: &Array2<f64>) -> Result<usize> {
    let expected = expected.ok_or(EmofaceError::NotFitted("classifier"))?;
    if x.ncols() != expected {
        return Err(EmofaceError::InputShape {
            expected,
            found: x.ncols(),
        });
    }
    Ok(expected)
}
