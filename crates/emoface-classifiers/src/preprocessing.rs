//! Feature standardisation shared by the neural-network models.
//!
//! Provides a per-column mean/std `Scaler` fitted on training features and
//! reused for validation, test and inference rows.

use ndarray::{Array1, Array2, Axis};

use crate::error::{EmofaceError, Result};

/// Simple standard scaler (per-column mean/std).
#[derive(Clone, Debug)]
pub struct Scaler {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

impl Scaler {
    /// Minimum stddev to avoid division by zero when transforming.
    const MIN_STD: f64 = 1e-6;

    /// Fit a `Scaler` on `x`, rows are samples and columns are features.
    pub fn fit(x: &Array2<f64>) -> Result<Self> {
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EmofaceError::EmptyInput("fit_scaler requires non-empty matrix".to_string()))?;
        let std = x.std_axis(Axis(0), 0.0).mapv(|s| s.max(Self::MIN_STD));
        Ok(Scaler { mean, std })
    }

    /// Standardise every row of `x`.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(EmofaceError::ShapeMismatch(format!(
                "scaler was fitted on {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean) / &self.std)
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }
}

/// Fit a scaler on `x` and return the standardised matrix along with it.
pub fn fit_transform(x: &Array2<f64>) -> Result<(Scaler, Array2<f64>)> {
    let scaler = Scaler::fit(x)?;
    let scaled = scaler.transform(x)?;
    Ok((scaler, scaled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn fit_computes_mean_and_std() {
        let x = array![[1.0, 10.0], [2.0, 20.0], [3.0, 30.0], [4.0, 40.0]];
        let sc = Scaler::fit(&x).unwrap();
        assert!((sc.mean[0] - 2.5).abs() < 1e-12);
        assert!((sc.mean[1] - 25.0).abs() < 1e-12);
        assert!(sc.std[0] > 0.0 && sc.std[1] > 0.0);
    }

    #[test]
    fn constant_columns_do_not_divide_by_zero() {
        let x = array![[1.0, 5.0], [2.0, 5.0], [3.0, 5.0]];
        let (_, t) = fit_transform(&x).unwrap();
        assert!(t.iter().all(|v| v.is_finite()));
        assert_eq!(t[[0, 1]], 0.0);
    }

    #[test]
    fn transform_centers_columns() {
        let x = array![[1.0, 100.0], [2.0, 200.0], [3.0, 300.0], [4.0, 400.0]];
        let (_, t) = fit_transform(&x).unwrap();
        for c in 0..2 {
            let col_mean = t.column(c).sum() / 4.0;
            assert!(col_mean.abs() < 1e-10, "col {} mean = {}", c, col_mean);
        }
    }

    #[test]
    fn empty_matrix_is_rejected() {
        let x = Array2::<f64>::zeros((0, 3));
        assert!(Scaler::fit(&x).is_err());
    }
}
