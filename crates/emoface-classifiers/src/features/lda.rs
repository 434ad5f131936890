use log::debug;
use ndarray::{Array1, Array2, Axis};

use crate::error::{EmofaceError, Result};
use crate::features::{normalize_signs, sorted_symmetric_eigen};

/// Relative eigenvalue threshold for treating a scatter direction as null.
const SCATTER_TOL: f64 = 1e-10;

/// Linear discriminant projection maximising between-class scatter relative
/// to within-class scatter.
///
/// The within-class scatter is whitened through its eigen-decomposition
/// (null directions dropped), and the between-class scatter is diagonalised in
/// that whitened space. At most `num_classes - 1` directions are kept.
#[derive(Debug, Clone)]
pub struct Lda {
    mean: Array1<f64>,
    /// `n_features x n_components`
    scalings: Array2<f64>,
}

impl Lda {
    pub fn fit(x: &Array2<f64>, y: &[usize]) -> Result<Self> {
        let (n, p) = x.dim();
        if n != y.len() {
            return Err(EmofaceError::ShapeMismatch(format!(
                "{} rows but {} labels",
                n,
                y.len()
            )));
        }
        if n == 0 {
            return Err(EmofaceError::EmptyInput("LDA needs training samples".to_string()));
        }

        let n_labels = y.iter().copied().max().unwrap_or(0) + 1;
        let mut counts = vec![0usize; n_labels];
        let mut class_means = Array2::<f64>::zeros((n_labels, p));
        for (row, &label) in x.rows().into_iter().zip(y) {
            counts[label] += 1;
            let mut mean = class_means.row_mut(label);
            mean += &row;
        }
        let present: Vec<usize> = (0..n_labels).filter(|&c| counts[c] > 0).collect();
        if present.len() < 2 {
            return Err(EmofaceError::InvalidConfig(
                "LDA needs samples from at least two classes".to_string(),
            ));
        }
        for &c in &present {
            let mut mean = class_means.row_mut(c);
            mean /= counts[c] as f64;
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| EmofaceError::EmptyInput("LDA needs training samples".to_string()))?;

        // within-class scatter
        let mut within = x.to_owned();
        for (mut row, &label) in within.rows_mut().into_iter().zip(y) {
            row -= &class_means.row(label);
        }
        let sw = within.t().dot(&within);

        let (sw_values, sw_vectors) = sorted_symmetric_eigen(&sw);
        let top = sw_values.first().copied().unwrap_or(0.0);
        let kept: Vec<usize> = (0..p)
            .filter(|&i| sw_values[i] > 0.0 && sw_values[i] > top * SCATTER_TOL)
            .collect();
        if kept.is_empty() {
            return Err(EmofaceError::SingularScatter(
                "within-class scatter has no non-null direction".to_string(),
            ));
        }
        if kept.len() < p {
            debug!("LDA: dropping {} null within-class directions", p - kept.len());
        }

        // whitening: W = V_r diag(1 / sqrt(lambda_r))
        let whiten = Array2::from_shape_fn((p, kept.len()), |(r, c)| {
            sw_vectors[[r, kept[c]]] / sw_values[kept[c]].sqrt()
        });

        // between-class scatter, weighted by class size
        let mut between = Array2::<f64>::zeros((present.len(), p));
        for (i, &c) in present.iter().enumerate() {
            let diff = (&class_means.row(c) - &mean) * (counts[c] as f64).sqrt();
            between.row_mut(i).assign(&diff);
        }
        let projected = between.dot(&whiten);
        let sb = projected.t().dot(&projected);

        let (sb_values, sb_vectors) = sorted_symmetric_eigen(&sb);
        let sb_top = sb_values.first().copied().unwrap_or(0.0);
        let max_components = (present.len() - 1).min(kept.len());
        let n_components = (0..max_components)
            .take_while(|&i| sb_values[i] > 0.0 && sb_values[i] > sb_top * SCATTER_TOL)
            .count();
        if n_components == 0 {
            return Err(EmofaceError::SingularScatter(
                "between-class scatter vanishes; class means coincide".to_string(),
            ));
        }

        let mut scalings =
            whiten.dot(&sb_vectors.slice(ndarray::s![.., ..n_components]));
        normalize_signs(&mut scalings);

        debug!(
            "LDA: {} features -> {} discriminant directions ({} classes)",
            p,
            n_components,
            present.len()
        );

        Ok(Self { mean, scalings })
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if x.ncols() != self.mean.len() {
            return Err(EmofaceError::ShapeMismatch(format!(
                "LDA was fitted on {} features, got {}",
                self.mean.len(),
                x.ncols()
            )));
        }
        Ok((x - &self.mean).dot(&self.scalings))
    }

    pub fn n_components(&self) -> usize {
        self.scalings.ncols()
    }

    pub fn scalings(&self) -> &Array2<f64> {
        &self.scalings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn separates_two_clusters_on_one_axis() {
        let x = array![
            [0.0, 0.1],
            [0.2, -0.1],
            [-0.1, 0.0],
            [5.0, 0.05],
            [5.1, -0.05],
            [4.9, 0.1]
        ];
        let y = [0, 0, 0, 1, 1, 1];
        let lda = Lda::fit(&x, &y).unwrap();
        assert_eq!(lda.n_components(), 1);

        let z = lda.transform(&x).unwrap();
        let max_a = (0..3).map(|i| z[[i, 0]]).fold(f64::MIN, f64::max);
        let min_b = (3..6).map(|i| z[[i, 0]]).fold(f64::MAX, f64::min);
        let min_a = (0..3).map(|i| z[[i, 0]]).fold(f64::MAX, f64::min);
        let max_b = (3..6).map(|i| z[[i, 0]]).fold(f64::MIN, f64::max);
        assert!(max_a < min_b || max_b < min_a);
    }

    #[test]
    fn output_has_at_most_classes_minus_one_dims() {
        let x = array![
            [0.0, 0.0, 1.0, 0.2],
            [0.1, 0.2, 1.1, 0.0],
            [0.3, 0.1, 0.9, 0.1],
            [3.0, 0.1, 0.0, 0.3],
            [3.1, 0.3, 0.2, 0.1],
            [2.9, 0.0, 0.1, 0.2],
            [0.0, 4.0, 0.3, 0.0],
            [0.2, 4.2, 0.1, 0.3],
            [0.1, 3.9, 0.0, 0.1]
        ];
        let y = [0, 0, 0, 1, 1, 1, 2, 2, 2];
        let lda = Lda::fit(&x, &y).unwrap();
        assert!(lda.n_components() <= 2);
        assert_eq!(lda.transform(&x).unwrap().ncols(), lda.n_components());
    }

    #[test]
    fn identical_samples_within_classes_are_singular() {
        let x = array![[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [1.0, 1.0]];
        let y = [0, 0, 1, 1];
        assert!(matches!(Lda::fit(&x, &y), Err(EmofaceError::SingularScatter(_))));
    }

    #[test]
    fn needs_two_classes() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        assert!(Lda::fit(&x, &[0, 0]).is_err());
    }
}
