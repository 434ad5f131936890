use std::collections::BTreeSet;

use image::GrayImage;
use log::{info, warn};
use ndarray::Array2;

use crate::error::{EmofaceError, Result};
use crate::features::{construct_row_matrix, reference_size, FeatureExtractor, Lda, Pca};

/// Train/validation/test coordinates in the combined PCA → LDA space.
#[derive(Debug, Clone)]
pub struct FisherfacesProjection {
    pub train: Array2<f64>,
    pub validation: Array2<f64>,
    pub test: Array2<f64>,
}

/// PCA followed by a linear discriminant projection.
///
/// The PCA step keeps at least `num_samples - num_classes` components (capped
/// by the pixel count) so the within-class scatter seen by the LDA step is
/// well-posed. The output has at most `num_classes - 1` dimensions.
#[derive(Debug, Clone)]
pub struct Fisherfaces {
    pca_components: Option<usize>,
    image_size: Option<(u32, u32)>,
    pca: Option<Pca>,
    lda: Option<Lda>,
}

impl Fisherfaces {
    /// `pca_components: None` uses exactly the well-posedness floor.
    pub fn new(pca_components: Option<usize>) -> Self {
        Self {
            pca_components,
            image_size: None,
            pca: None,
            lda: None,
        }
    }

    /// Smallest PCA component count accepted for `n_samples` samples of
    /// `n_classes` classes with `n_pixels` pixels each.
    pub fn pca_floor(n_samples: usize, n_classes: usize, n_pixels: usize) -> usize {
        n_samples.saturating_sub(n_classes).min(n_pixels)
    }

    pub fn fit_transform(
        &mut self,
        train_images: &[GrayImage],
        train_labels: &[usize],
        validation_images: &[GrayImage],
        test_images: &[GrayImage],
    ) -> Result<FisherfacesProjection> {
        if train_images.len() != train_labels.len() {
            return Err(EmofaceError::ShapeMismatch(format!(
                "{} training images but {} labels",
                train_images.len(),
                train_labels.len()
            )));
        }
        let size = reference_size(train_images)?;
        let rows = construct_row_matrix(train_images, size)?;
        let (n_samples, n_pixels) = rows.dim();
        let n_classes = train_labels.iter().collect::<BTreeSet<_>>().len();

        let floor = Self::pca_floor(n_samples, n_classes, n_pixels);
        if floor == 0 {
            return Err(EmofaceError::SingularScatter(format!(
                "{} samples for {} classes leaves no within-class degrees of freedom",
                n_samples, n_classes
            )));
        }
        let n_components = match self.pca_components {
            Some(k) if k < floor => {
                return Err(EmofaceError::SingularScatter(format!(
                    "PCA component count {} is below the floor of {} (samples - classes)",
                    k, floor
                )));
            }
            Some(k) => k,
            None => floor,
        };
        if n_components > floor {
            warn!(
                "Fisherfaces: {} PCA components exceed the floor of {}; within-class scatter may be rank deficient",
                n_components, floor
            );
        }

        let pca = Pca::fit(&rows, n_components)?;
        let pca_train = pca.transform(&rows)?;
        let lda = Lda::fit(&pca_train, train_labels)?;
        let train = lda.transform(&pca_train)?;

        info!(
            "Fisherfaces: {} images, {} classes -> {} PCA -> {} discriminant components",
            n_samples,
            n_classes,
            pca.n_components(),
            lda.n_components()
        );

        self.image_size = Some(size);
        self.pca = Some(pca);
        self.lda = Some(lda);

        Ok(FisherfacesProjection {
            train,
            validation: self.transform(validation_images)?,
            test: self.transform(test_images)?,
        })
    }

    pub fn pca(&self) -> Option<&Pca> {
        self.pca.as_ref()
    }

    pub fn lda(&self) -> Option<&Lda> {
        self.lda.as_ref()
    }
}

impl FeatureExtractor for Fisherfaces {
    fn name(&self) -> &'static str {
        "fisherfaces"
    }

    fn transform(&self, images: &[GrayImage]) -> Result<Array2<f64>> {
        let (pca, lda, size) = match (&self.pca, &self.lda, self.image_size) {
            (Some(pca), Some(lda), Some(size)) => (pca, lda, size),
            _ => return Err(EmofaceError::NotFitted("fisherfaces")),
        };
        let rows = construct_row_matrix(images, size)?;
        lda.transform(&pca.transform(&rows)?)
    }

    fn output_dim(&self) -> Option<usize> {
        self.lda.as_ref().map(Lda::n_components)
    }

    fn image_size(&self) -> Option<(u32, u32)> {
        self.image_size
    }
}
