use std::path::Path;

use emoface_classifiers::config::{ExperimentConfig, FeatureAlgorithm, ModelConfig, ModelType, Selection};
use emoface_classifiers::dataset::DatasetId;
use emoface_classifiers::face_locator::{DetectionMode, FaceBox, FaceLocator};
use emoface_classifiers::pipeline::{recognize_emotion, run_comparison};
use emoface_classifiers::{EmofaceError, Result};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// -----------------------------------------------------------------------------
// Fixtures
// -----------------------------------------------------------------------------

fn write_ck_class(root: &Path, label: &str, images: &[GrayImage]) {
    let dir = root.join("CK+48").join(label);
    std::fs::create_dir_all(&dir).unwrap();
    for (i, img) in images.iter().enumerate() {
        img.save(dir.join(format!("{}_{:03}.png", label, i))).unwrap();
    }
}

fn constant_images(value: u8, n: usize) -> Vec<GrayImage> {
    (0..n).map(|_| GrayImage::from_pixel(48, 48, Luma([value]))).collect()
}

fn noisy_images(base: u8, n: usize, rng: &mut StdRng) -> Vec<GrayImage> {
    (0..n)
        .map(|_| GrayImage::from_fn(48, 48, |_, _| Luma([base.saturating_add(rng.gen_range(0..40))])))
        .collect()
}

fn small_cnn() -> ModelConfig {
    ModelConfig::new(
        1e-2,
        ModelType::Cnn {
            epochs: 2,
            batch_size: 8,
            filters: 2,
            hidden: 4,
            early_stopping_patience: 1,
            input_length: None,
        },
    )
}

/// Short, fully-run training for the network families; defaults otherwise.
fn quick_model(name: &str) -> ModelConfig {
    match name {
        "cnn" => ModelConfig::new(
            1e-2,
            ModelType::Cnn {
                epochs: 60,
                batch_size: 8,
                filters: 4,
                hidden: 16,
                early_stopping_patience: 60,
                input_length: None,
            },
        ),
        "mlp" => ModelConfig::new(
            1e-2,
            ModelType::Mlp {
                hidden: 16,
                epochs: 60,
                batch_size: 8,
                early_stopping_patience: 60,
            },
        ),
        other => ModelConfig::for_selector(other).unwrap(),
    }
}

/// Returns fixed boxes cropped from the photo, or nothing.
struct FixedLocator(Vec<FaceBox>);

impl FaceLocator for FixedLocator {
    fn detect_face(
        &self,
        photo: &GrayImage,
        _mode: DetectionMode,
        face_size: (u32, u32),
    ) -> Result<(Vec<FaceBox>, Vec<GrayImage>)> {
        Ok(emoface_classifiers::face_locator::crop_faces(photo, &self.0, face_size))
    }
}

// -----------------------------------------------------------------------------
// Comparison runs
// -----------------------------------------------------------------------------

#[test]
fn constant_two_class_dataset_is_separable_with_eigenfaces() {
    let dir = tempfile::tempdir().unwrap();
    write_ck_class(dir.path(), "happy", &constant_images(60, 20));
    write_ck_class(dir.path(), "sadness", &constant_images(190, 20));

    let mut config = ExperimentConfig::default();
    config.data_dir = dir.path().to_path_buf();
    config.eigenfaces_components = 2;

    for model in ModelType::OPTIONS {
        config.model = quick_model(model);
        let selection = Selection {
            model: model.parse().unwrap(),
            dataset: DatasetId::CkPlus48,
            algorithm: FeatureAlgorithm::Eigenfaces,
        };
        let report = run_comparison(&config, &selection).unwrap();
        assert!(report.accuracy >= 0.9, "{} accuracy {}", model, report.accuracy);
        assert!(report.accuracy <= 1.0);
        assert_eq!(report.confusion.dim(), (2, 2));
        assert_eq!(report.n_samples, 6);
    }
}

#[test]
fn fisherfaces_comparison_reports_bounded_accuracy() {
    let dir = tempfile::tempdir().unwrap();
    let mut rng = StdRng::seed_from_u64(4);
    write_ck_class(dir.path(), "anger", &noisy_images(30, 12, &mut rng));
    write_ck_class(dir.path(), "happy", &noisy_images(170, 12, &mut rng));

    let mut config = ExperimentConfig::default();
    config.data_dir = dir.path().to_path_buf();

    let selection = Selection {
        model: "svm".parse().unwrap(),
        dataset: DatasetId::CkPlus48,
        algorithm: FeatureAlgorithm::Fisherfaces,
    };
    let report = run_comparison(&config, &selection).unwrap();
    assert!((0.0..=1.0).contains(&report.accuracy));
    assert_eq!(report.per_class.len(), 2);
}

#[test]
fn missing_dataset_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = ExperimentConfig::default();
    config.data_dir = dir.path().to_path_buf();
    let selection = Selection {
        model: "svm".parse().unwrap(),
        dataset: DatasetId::Fer2013,
        algorithm: FeatureAlgorithm::Eigenfaces,
    };
    let err = run_comparison(&config, &selection).unwrap_err();
    assert!(matches!(err, EmofaceError::DatasetNotFound { .. }));
}

// -----------------------------------------------------------------------------
// Single-photo recognition
// -----------------------------------------------------------------------------

fn recognition_config(root: &Path) -> ExperimentConfig {
    let mut config = ExperimentConfig::default();
    config.data_dir = root.to_path_buf();
    config.model = small_cnn();
    config
}

fn recognition_dataset(root: &Path) {
    let mut rng = StdRng::seed_from_u64(8);
    write_ck_class(root, "fear", &noisy_images(20, 12, &mut rng));
    write_ck_class(root, "surprise", &noisy_images(180, 12, &mut rng));
}

#[test]
fn zero_faces_yield_empty_output() {
    let dir = tempfile::tempdir().unwrap();
    recognition_dataset(dir.path());
    let config = recognition_config(dir.path());

    let photo = GrayImage::new(120, 90);
    let out = recognize_emotion(
        &config,
        &photo,
        DetectionMode::Auto,
        DatasetId::CkPlus48,
        &FixedLocator(vec![]),
    )
    .unwrap();

    assert_eq!(out.predictions.nrows(), 0);
    assert!(out.recognized.is_empty());
    assert!(out.labels.is_empty());
    assert!(out.faces.is_empty());
}

#[test]
fn each_located_face_gets_a_prediction() {
    let dir = tempfile::tempdir().unwrap();
    recognition_dataset(dir.path());
    let config = recognition_config(dir.path());

    let photo = GrayImage::from_fn(160, 100, |x, _| Luma([if x < 80 { 30 } else { 190 }]));
    let locator = FixedLocator(vec![FaceBox::new(0, 0, 60, 60), FaceBox::new(90, 20, 60, 60)]);
    let out = recognize_emotion(&config, &photo, DetectionMode::Manual, DatasetId::CkPlus48, &locator)
        .unwrap();

    assert_eq!(out.predictions.dim(), (2, 2));
    assert_eq!(out.recognized.len(), 2);
    assert_eq!(out.classes, vec!["fear".to_string(), "surprise".to_string()]);
    for label in &out.labels {
        assert!(out.classes.contains(label));
    }
}
