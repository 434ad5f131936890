use thiserror::Error;

/// Errors raised by the feature-extraction and classification pipeline.
#[derive(Error, Debug)]
pub enum EmofaceError {
    #[error("dataset '{dataset}' not found at {path}")]
    DatasetNotFound { dataset: String, path: String },

    #[error("invalid dataset: {0}. Valid options are: CK+48, fer2013")]
    InvalidDataset(String),

    #[error("invalid model type: {0}. Valid options are: cnn, svm, adaboost, mlp")]
    InvalidModelType(String),

    #[error("invalid feature algorithm: {0}. Valid options are: eigenfaces, fisherfaces")]
    InvalidFeatureAlgorithm(String),

    #[error("invalid detection mode: {0}. Valid options are: auto, manual")]
    InvalidDetectionMode(String),

    #[error("{0} used before it was fitted")]
    NotFitted(&'static str),

    #[error("singular within-class scatter: {0}")]
    SingularScatter(String),

    #[error("invalid component count {requested}: must be between 1 and {max}")]
    InvalidComponentCount { requested: usize, max: usize },

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("model expects input width {expected}, got {found}")]
    InputShape { expected: usize, found: usize },

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("unknown label '{0}'")]
    UnknownLabel(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("face detection failed: {0}")]
    FaceDetection(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("SVM error: {0}")]
    Svm(#[from] linfa_svm::SvmError),
}

pub type Result<T> = std::result::Result<T, EmofaceError>;
