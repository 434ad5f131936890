//! Subspace feature extraction for face images.
//!
//! Images are flattened row-major into `[0, 1]` intensity rows, then projected
//! by either [`Eigenfaces`] (PCA) or [`Fisherfaces`] (PCA followed by LDA).
//! Both extractors are fitted on the training subset only and reused
//! unchanged for every later transform.
pub mod eigenfaces;
pub mod fisherfaces;
pub mod lda;
pub mod pca;

use image::GrayImage;
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::Array2;

use crate::error::{EmofaceError, Result};

pub use eigenfaces::Eigenfaces;
pub use fisherfaces::{Fisherfaces, FisherfacesProjection};
pub use lda::Lda;
pub use pca::Pca;

/// A fitted image → feature-vector projection.
pub trait FeatureExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Project images with the fitted state. Fails with `NotFitted` before fitting.
    fn transform(&self, images: &[GrayImage]) -> Result<Array2<f64>>;

    /// Width of the produced feature vectors, once fitted.
    fn output_dim(&self) -> Option<usize>;

    /// Image dimensions seen during fitting.
    fn image_size(&self) -> Option<(u32, u32)>;
}

/// Flatten images into one row each, scaling intensities to `[0, 1]`.
///
/// Every image must be `size`; an empty slice gives a `(0, w * h)` matrix.
pub fn construct_row_matrix(images: &[GrayImage], size: (u32, u32)) -> Result<Array2<f64>> {
    let (width, height) = size;
    let n_pixels = (width * height) as usize;
    let mut data = Vec::with_capacity(images.len() * n_pixels);

    for (i, img) in images.iter().enumerate() {
        if img.dimensions() != size {
            return Err(EmofaceError::ShapeMismatch(format!(
                "image {} is {}x{}, expected {}x{}",
                i,
                img.width(),
                img.height(),
                width,
                height
            )));
        }
        data.extend(img.as_raw().iter().map(|&p| p as f64 / 255.0));
    }

    Array2::from_shape_vec((images.len(), n_pixels), data)
        .map_err(|e| EmofaceError::ShapeMismatch(e.to_string()))
}

/// Size of the first image, used as the reference for fitting.
pub(crate) fn reference_size(images: &[GrayImage]) -> Result<(u32, u32)> {
    images
        .first()
        .map(|img| img.dimensions())
        .ok_or_else(|| EmofaceError::EmptyInput("no training images".to_string()))
}

/// Eigen-decomposition of a symmetric matrix with eigenpairs sorted by
/// decreasing eigenvalue. Eigenvectors are the columns of the returned matrix.
pub(crate) fn sorted_symmetric_eigen(m: &Array2<f64>) -> (Vec<f64>, Array2<f64>) {
    let (rows, cols) = m.dim();
    let dm = DMatrix::from_fn(rows, cols, |i, j| m[[i, j]]);
    let eig = SymmetricEigen::new(dm);

    let mut order: Vec<usize> = (0..rows).collect();
    order.sort_by(|&a, &b| eig.eigenvalues[b].total_cmp(&eig.eigenvalues[a]));

    let values = order.iter().map(|&i| eig.eigenvalues[i]).collect();
    let vectors = Array2::from_shape_fn((rows, rows), |(r, c)| eig.eigenvectors[(r, order[c])]);
    (values, vectors)
}

/// Flip each column so its largest-magnitude entry is positive.
pub(crate) fn normalize_signs(vectors: &mut Array2<f64>) {
    for mut col in vectors.columns_mut() {
        let pivot = col
            .iter()
            .copied()
            .fold(0.0f64, |acc, v| if v.abs() > acc.abs() { v } else { acc });
        if pivot < 0.0 {
            col.mapv_inplace(|v| -v);
        }
    }
}
