use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::dataset::DatasetId;
use crate::error::EmofaceError;

/// Central configuration for models in the crate.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ModelConfig {
    pub learning_rate: f64,

    /// Seed for minibatch shuffling in the neural-network families.
    #[serde(default)]
    pub seed: u64,

    #[serde(flatten)]
    pub model_type: ModelType,
}

/// Supported model families and their hyper-parameters.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ModelType {
    Cnn {
        epochs: usize,
        batch_size: usize,
        filters: usize,
        hidden: usize,
        early_stopping_patience: usize,
        /// Width of the `(batch, 1, width)` input. Recorded from the training
        /// features when unset; fitting fails if both disagree.
        input_length: Option<usize>,
    },
    Svm {
        c: f64,
        eps: f64,
        kernel: String,
        /// `None` picks `n_features * variance(x)` at fit time.
        gaussian_kernel_eps: Option<f64>,
        polynomial_kernel_constant: f64,
        polynomial_kernel_degree: f64,
    },
    AdaBoost {
        n_estimators: usize,
    },
    Mlp {
        hidden: usize,
        epochs: usize,
        batch_size: usize,
        early_stopping_patience: usize,
    },
}

impl Default for ModelType {
    fn default() -> Self {
        ModelType::Cnn {
            epochs: 50,
            batch_size: 32,
            filters: 16,
            hidden: 64,
            early_stopping_patience: 5,
            input_length: None,
        }
    }
}

impl ModelType {
    /// Selector string used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            ModelType::Cnn { .. } => "cnn",
            ModelType::Svm { .. } => "svm",
            ModelType::AdaBoost { .. } => "adaboost",
            ModelType::Mlp { .. } => "mlp",
        }
    }

    /// Only the iteratively trained networks look at validation data.
    pub fn uses_validation(&self) -> bool {
        matches!(self, ModelType::Cnn { .. } | ModelType::Mlp { .. })
    }

    pub const OPTIONS: [&'static str; 4] = ["cnn", "svm", "adaboost", "mlp"];
}

impl FromStr for ModelType {
    type Err = EmofaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cnn" => Ok(ModelType::default()),
            "svm" => Ok(ModelType::Svm {
                c: 1.0,
                eps: 1e-3,
                kernel: "gauss".to_string(),
                gaussian_kernel_eps: None,
                polynomial_kernel_constant: 1.0,
                polynomial_kernel_degree: 3.0,
            }),
            "adaboost" => Ok(ModelType::AdaBoost { n_estimators: 50 }),
            "mlp" => Ok(ModelType::Mlp {
                hidden: 100,
                epochs: 200,
                batch_size: 32,
                early_stopping_patience: 10,
            }),
            _ => Err(EmofaceError::InvalidModelType(s.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ModelConfig {
    pub fn new(learning_rate: f64, model_type: ModelType) -> Self {
        Self {
            learning_rate,
            seed: 0,
            model_type,
        }
    }

    /// Default hyper-parameters for a selector, with the learning rate the
    /// family expects (boosting shrinkage vs. optimiser step size).
    pub fn for_selector(selector: &str) -> Result<Self, EmofaceError> {
        let model_type = ModelType::from_str(selector)?;
        let learning_rate = match model_type {
            ModelType::AdaBoost { .. } => 1.0,
            _ => 1e-3,
        };
        Ok(Self::new(learning_rate, model_type))
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            learning_rate: 1e-3,
            seed: 0,
            model_type: ModelType::default(),
        }
    }
}

/// Subspace projection used to turn images into feature vectors.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FeatureAlgorithm {
    Eigenfaces,
    Fisherfaces,
}

impl FeatureAlgorithm {
    pub const OPTIONS: [&'static str; 2] = ["eigenfaces", "fisherfaces"];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureAlgorithm::Eigenfaces => "eigenfaces",
            FeatureAlgorithm::Fisherfaces => "fisherfaces",
        }
    }
}

impl FromStr for FeatureAlgorithm {
    type Err = EmofaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "eigenfaces" => Ok(FeatureAlgorithm::Eigenfaces),
            "fisherfaces" => Ok(FeatureAlgorithm::Fisherfaces),
            _ => Err(EmofaceError::InvalidFeatureAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for FeatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fractions of the shuffled samples assigned to train and validation; the
/// remainder is the test subset.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SplitConfig {
    pub train_fraction: f64,
    pub validation_fraction: f64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.7,
            validation_fraction: 0.15,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), EmofaceError> {
        let t = self.train_fraction;
        let v = self.validation_fraction;
        if !(t > 0.0 && v >= 0.0 && t + v < 1.0) {
            return Err(EmofaceError::InvalidConfig(format!(
                "split fractions must satisfy 0 < train, 0 <= validation, train + validation < 1 (got {} / {})",
                t, v
            )));
        }
        Ok(())
    }
}

/// SeetaFace detector settings used by the `auto` detection mode.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DetectorConfig {
    pub model_path: PathBuf,
    pub min_face_size: u32,
    pub score_thresh: f64,
    pub pyramid_scale_factor: f32,
    pub slide_window_step: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/seeta_fd_frontal_v1.0.bin"),
            min_face_size: 20,
            score_thresh: 2.0,
            pyramid_scale_factor: 0.8,
            slide_window_step: 4,
        }
    }
}

/// Everything one comparison or recognition run needs besides the three
/// user selections.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data_dir: PathBuf,
    pub seed: u64,
    pub split: SplitConfig,
    pub eigenfaces_components: usize,
    pub fisherfaces_pca_components: Option<usize>,
    pub model: ModelConfig,
    pub detector: DetectorConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            seed: 42,
            split: SplitConfig::default(),
            eigenfaces_components: 625,
            fisherfaces_pca_components: None,
            model: ModelConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

/// The three choices made by the comparison driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub model: ModelType,
    pub dataset: DatasetId,
    pub algorithm: FeatureAlgorithm,
}
