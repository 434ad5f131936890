use image::GrayImage;
use log::info;
use ndarray::Array2;

use crate::error::{EmofaceError, Result};
use crate::features::{construct_row_matrix, reference_size, FeatureExtractor, Pca};

/// PCA projection of flattened face images; label agnostic.
#[derive(Debug, Clone)]
pub struct Eigenfaces {
    component_count: usize,
    image_size: Option<(u32, u32)>,
    pca: Option<Pca>,
}

impl Eigenfaces {
    pub fn new(component_count: usize) -> Self {
        Self {
            component_count,
            image_size: None,
            pca: None,
        }
    }

    /// Fit the principal basis on the training images and return their
    /// coordinates in it.
    pub fn fit_transform(&mut self, train_images: &[GrayImage]) -> Result<Array2<f64>> {
        let size = reference_size(train_images)?;
        let rows = construct_row_matrix(train_images, size)?;
        let pca = Pca::fit(&rows, self.component_count)?;
        info!(
            "Eigenfaces: {} images of {}x{} -> {} components",
            rows.nrows(),
            size.0,
            size.1,
            pca.n_components()
        );

        let projected = pca.transform(&rows)?;
        self.image_size = Some(size);
        self.pca = Some(pca);
        Ok(projected)
    }

    pub fn pca(&self) -> Option<&Pca> {
        self.pca.as_ref()
    }

    pub fn component_count(&self) -> usize {
        self.component_count
    }
}

impl FeatureExtractor for Eigenfaces {
    fn name(&self) -> &'static str {
        "eigenfaces"
    }

    fn transform(&self, images: &[GrayImage]) -> Result<Array2<f64>> {
        let (pca, size) = match (&self.pca, self.image_size) {
            (Some(pca), Some(size)) => (pca, size),
            _ => return Err(EmofaceError::NotFitted("eigenfaces")),
        };
        let rows = construct_row_matrix(images, size)?;
        pca.transform(&rows)
    }

    fn output_dim(&self) -> Option<usize> {
        self.pca.as_ref().map(Pca::n_components)
    }

    fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }
}
