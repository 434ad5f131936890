use log::debug;
use ndarray::{Array1, Array2, Axis};

use crate::error::{EmofaceError, Result};
use crate::features::{normalize_signs, sorted_symmetric_eigen};

/// Relative eigenvalue threshold below which a direction carries no variance.
const VARIANCE_TOL: f64 = 1e-10;

/// Principal component analysis fitted on the rows of a matrix.
#[derive(Debug, Clone)]
pub struct Pca {
    mean: Array1<f64>,
    /// One principal direction per row, `n_components x n_features`.
    components: Array2<f64>,
    explained_variance: Array1<f64>,
}

impl Pca {
    /// Fit `n_components` principal directions of `x` (rows are samples).
    ///
    /// Decomposes the `n x n` Gram matrix when there are fewer samples than
    /// features, otherwise the `d x d` scatter matrix. Directions without
    /// variance are kept as zero rows so the output width stays `n_components`.
    pub fn fit(x: &Array2<f64>, n_components: usize) -> Result<Self> {
        let (n, d) = x.dim();
        let max = n.min(d);
        if n_components == 0 || n_components > max {
            return Err(EmofaceError::InvalidComponentCount {
                requested: n_components,
                max,
            });
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EmofaceError::EmptyInput("PCA needs at least one sample".to_string()))?;
        let centered = x - &mean;

        let (values, mut directions) = if n <= d {
            debug!("PCA via {}x{} Gram matrix", n, n);
            let gram = centered.dot(&centered.t());
            let (values, u) = sorted_symmetric_eigen(&gram);
            let top = values[0].max(0.0);
            let mut directions = Array2::<f64>::zeros((d, n_components));
            for k in 0..n_components {
                let lambda = values[k];
                if lambda > top * VARIANCE_TOL && lambda > 0.0 {
                    let v = centered.t().dot(&u.column(k)) / lambda.sqrt();
                    directions.column_mut(k).assign(&v);
                }
            }
            (values, directions)
        } else {
            debug!("PCA via {}x{} scatter matrix", d, d);
            let scatter = centered.t().dot(&centered);
            let (values, v) = sorted_symmetric_eigen(&scatter);
            let directions = v.slice(ndarray::s![.., ..n_components]).to_owned();
            (values, directions)
        };
        normalize_signs(&mut directions);

        let denom = (n.max(2) - 1) as f64;
        let explained_variance =
            Array1::from_iter(values.iter().take(n_components).map(|&l| l.max(0.0) / denom));

        Ok(Self {
            mean,
            components: directions.reversed_axes(),
            explained_variance,
        })
    }

    /// Coordinates of `x` in the fitted basis.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.n_features() {
            return Err(EmofaceError::ShapeMismatch(format!(
                "PCA was fitted on {} features, got {}",
                self.n_features(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean).dot(&self.components.t()))
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn recovers_dominant_axis() {
        // variance lives almost entirely on the first feature
        let x = array![
            [-2.0, 0.1, 0.0],
            [-1.0, -0.1, 0.0],
            [0.0, 0.0, 0.0],
            [1.0, 0.1, 0.0],
            [2.0, -0.1, 0.0]
        ];
        let pca = Pca::fit(&x, 1).unwrap();
        let c = pca.components();
        assert!((c[[0, 0]] - 1.0).abs() < 1e-2, "component = {:?}", c);
        assert!(pca.explained_variance()[0] > 2.0);
    }

    #[test]
    fn both_decomposition_paths_project() {
        let x = array![[1.0, 2.0], [3.0, 1.0], [0.0, 0.5], [2.0, 2.5], [4.0, 0.0]];
        // n > d: scatter path
        let a = Pca::fit(&x, 2).unwrap().transform(&x).unwrap();
        // n <= d: gram path, rank one after centering
        let x_small = x.slice(ndarray::s![..2, ..]).to_owned();
        let b = Pca::fit(&x_small, 2).unwrap().transform(&x_small).unwrap();
        assert_eq!(a.dim(), (5, 2));
        assert_eq!(b.dim(), (2, 2));
        // two points: one axis, symmetric around the mean
        assert!((b[[0, 0]] + b[[1, 0]]).abs() < 1e-10);
        assert!(b[[0, 1]].abs() < 1e-10);
    }

    #[test]
    fn components_are_orthonormal() {
        let x = array![
            [1.0, 0.0, 2.0, 1.0],
            [0.0, 1.0, 1.0, 3.0],
            [2.0, 2.0, 0.0, 1.0],
            [1.5, 0.5, 1.0, 0.0],
            [0.5, 1.5, 2.5, 2.0],
            [3.0, 1.0, 1.0, 1.0]
        ];
        let pca = Pca::fit(&x, 3).unwrap();
        let gram = pca.components().dot(&pca.components().t());
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((gram[[i, j]] - expected).abs() < 1e-8);
            }
        }
    }

    #[test]
    fn rejects_too_many_components() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(matches!(
            Pca::fit(&x, 3),
            Err(EmofaceError::InvalidComponentCount { requested: 3, max: 2 })
        ));
        assert!(Pca::fit(&x, 0).is_err());
    }

    #[test]
    fn transform_checks_width() {
        let x = array![[1.0, 2.0], [3.0, 4.0], [0.0, 1.0]];
        let pca = Pca::fit(&x, 1).unwrap();
        assert!(pca.transform(&array![[1.0, 2.0, 3.0]]).is_err());
    }
}
