//! End-to-end runs: dataset → split → features → model → evaluation, and
//! single-photo recognition with a freshly trained fisherfaces + CNN pipeline.
use std::path::Path;

use image::GrayImage;
use log::{info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::config::{ExperimentConfig, FeatureAlgorithm, ModelConfig, ModelType, Selection};
use crate::dataset::{load_dataset, DatasetId};
use crate::error::{EmofaceError, Result};
use crate::evaluation::{evaluate_model, EvaluationReport};
use crate::face_locator::{DetectionMode, FaceBox, FaceLocator};
use crate::features::{Eigenfaces, FeatureExtractor, Fisherfaces};
use crate::models::classifier_trait::{argmax_rows, ClassifierModel};
use crate::models::factory::train_model;
use crate::split::{split_data, DatasetSplit, LabelEncoder, SplitSubset};

/// A fitted feature extractor and the model trained on its output, used
/// together to score new images.
pub struct FittedPipeline {
    extractor: Box<dyn FeatureExtractor>,
    model: Box<dyn ClassifierModel>,
    encoder: LabelEncoder,
    image_size: (u32, u32),
}

impl FittedPipeline {
    /// Fit the extractor on the training subset, project train and
    /// validation, then train the model.
    pub fn fit(
        config: &ExperimentConfig,
        model_config: &ModelConfig,
        algorithm: FeatureAlgorithm,
        split: &DatasetSplit,
    ) -> Result<Self> {
        let train = &split.train;
        if train.is_empty() {
            return Err(EmofaceError::EmptyInput("training split has no samples".to_string()));
        }

        let (extractor, x_train, x_validation) = match algorithm {
            FeatureAlgorithm::Eigenfaces => {
                let (w, h) = train.images[0].dimensions();
                let max = train.len().min((w * h) as usize);
                let mut components = config.eigenfaces_components;
                if components > max {
                    warn!(
                        "eigenfaces: {} components requested but the training split supports at most {}; using {}",
                        components, max, max
                    );
                    components = max;
                }
                let mut eigenfaces = Eigenfaces::new(components);
                let x_train = eigenfaces.fit_transform(&train.images)?;
                let x_validation = eigenfaces.transform(&split.validation.images)?;
                (Box::new(eigenfaces) as Box<dyn FeatureExtractor>, x_train, x_validation)
            }
            FeatureAlgorithm::Fisherfaces => {
                let mut fisherfaces = Fisherfaces::new(config.fisherfaces_pca_components);
                let projection = fisherfaces.fit_transform(
                    &train.images,
                    &train.labels,
                    &split.validation.images,
                    &[],
                )?;
                (
                    Box::new(fisherfaces) as Box<dyn FeatureExtractor>,
                    projection.train,
                    projection.validation,
                )
            }
        };

        let image_size = extractor
            .image_size()
            .ok_or(EmofaceError::NotFitted("feature extractor"))?;
        let validation = (!split.validation.is_empty())
            .then_some((&x_validation, split.validation.labels.as_slice()));
        let model = train_model(
            model_config,
            split.num_classes(),
            &x_train,
            &train.labels,
            validation,
        )?;

        info!(
            "Fitted {} + {} pipeline ({} features, {} classes)",
            extractor.name(),
            model.name(),
            x_train.ncols(),
            split.num_classes()
        );

        Ok(Self {
            extractor,
            model,
            encoder: split.encoder.clone(),
            image_size,
        })
    }

    /// Class probabilities for each image, `(images, classes)`.
    pub fn predict_images(&self, images: &[GrayImage]) -> Result<Array2<f32>> {
        if images.is_empty() {
            return Ok(Array2::zeros((0, self.encoder.len())));
        }
        let features = self.extractor.transform(images)?;
        if let Some(expected) = self.model.input_width() {
            if features.ncols() != expected {
                return Err(EmofaceError::InputShape {
                    expected,
                    found: features.ncols(),
                });
            }
        }
        self.model.predict_proba(&features)
    }

    pub fn evaluate(&self, subset: &SplitSubset) -> Result<EvaluationReport> {
        if subset.is_empty() {
            return Err(EmofaceError::EmptyInput("test split has no samples".to_string()));
        }
        let features = self.extractor.transform(&subset.images)?;
        evaluate_model(self.model.as_ref(), &features, &subset.labels, &self.encoder)
    }

    pub fn encoder(&self) -> &LabelEncoder {
        &self.encoder
    }

    pub fn image_size(&self) -> (u32, u32) {
        self.image_size
    }

    pub fn extractor(&self) -> &dyn FeatureExtractor {
        self.extractor.as_ref()
    }

    pub fn model(&self) -> &dyn ClassifierModel {
        self.model.as_ref()
    }
}

/// Hyper-parameters for `model`: the configured ones when the family matches,
/// otherwise the family defaults with the selection's own parameters. The
/// experiment seed always wins.
pub fn model_config_for(config: &ExperimentConfig, model: &ModelType) -> Result<ModelConfig> {
    let mut model_config = if config.model.model_type.name() == model.name() {
        config.model.clone()
    } else {
        let mut defaults = ModelConfig::for_selector(model.name())?;
        defaults.model_type = model.clone();
        defaults
    };
    model_config.seed = config.seed;
    Ok(model_config)
}

fn load_and_split(config: &ExperimentConfig, dataset: DatasetId) -> Result<DatasetSplit> {
    config.split.validate()?;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let samples = load_dataset(&config.data_dir, dataset, &mut rng)?;
    split_data(samples, &config.split)
}

/// Load → split → extract → train → evaluate once for `selection`.
pub fn run_comparison(config: &ExperimentConfig, selection: &Selection) -> Result<EvaluationReport> {
    info!(
        "Comparing {} on {} with {}",
        selection.model, selection.dataset, selection.algorithm
    );
    let split = load_and_split(config, selection.dataset)?;
    let model_config = model_config_for(config, &selection.model)?;
    let pipeline = FittedPipeline::fit(config, &model_config, selection.algorithm, &split)?;
    pipeline.evaluate(&split.test)
}

/// Per-face emotion predictions for one photo.
#[derive(Debug, Clone)]
pub struct Recognition {
    /// `(faces, classes)` probabilities.
    pub predictions: Array2<f32>,
    /// Argmax class index per face.
    pub recognized: Vec<usize>,
    /// Decoded label per face.
    pub labels: Vec<String>,
    pub faces: Vec<FaceBox>,
    /// Class names in column order.
    pub classes: Vec<String>,
}

pub fn load_photo(path: &Path) -> Result<GrayImage> {
    Ok(image::open(path)?.to_luma8())
}

/// Train a fisherfaces + CNN pipeline on `dataset` and classify every face
/// the locator finds in `photo`. No faces gives empty collections.
pub fn recognize_emotion(
    config: &ExperimentConfig,
    photo: &GrayImage,
    mode: DetectionMode,
    dataset: DatasetId,
    locator: &dyn FaceLocator,
) -> Result<Recognition> {
    let split = load_and_split(config, dataset)?;
    let model_config = model_config_for(config, &ModelType::default())?;
    let pipeline = FittedPipeline::fit(config, &model_config, FeatureAlgorithm::Fisherfaces, &split)?;

    let (faces, crops) = locator.detect_face(photo, mode, pipeline.image_size())?;
    let predictions = pipeline.predict_images(&crops)?;
    let recognized = argmax_rows(&predictions);
    let labels = recognized
        .iter()
        .map(|&i| pipeline.encoder().decode(i).unwrap_or("?").to_string())
        .collect();

    info!("Recognised {} face(s)", faces.len());
    Ok(Recognition {
        predictions,
        recognized,
        labels,
        faces,
        classes: pipeline.encoder().classes().to_vec(),
    })
}
