use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use csv::ReaderBuilder;
use image::GrayImage;
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::dataset::{DatasetId, Sample, FACE_SIZE};
use crate::error::{EmofaceError, Result};

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Load every sample of `dataset` below `root` and shuffle them with `rng`.
///
/// Layouts:
/// * `CK+48`: `<root>/CK+48/<emotion>/<image>.png`
/// * `fer2013`: `<root>/fer2013/fer2013.csv` with `emotion,pixels,Usage` columns
pub fn load_dataset<R: Rng + ?Sized>(
    root: &Path,
    dataset: DatasetId,
    rng: &mut R,
) -> Result<Vec<Sample>> {
    let mut samples = match dataset {
        DatasetId::CkPlus48 => load_image_folders(&root.join("CK+48"), dataset)?,
        DatasetId::Fer2013 => load_fer2013_csv(&root.join("fer2013").join("fer2013.csv"))?,
    };

    if samples.is_empty() {
        return Err(EmofaceError::DatasetNotFound {
            dataset: dataset.to_string(),
            path: root.display().to_string(),
        });
    }

    samples.shuffle(rng);
    info!("Loaded {} samples from {}", samples.len(), dataset);
    Ok(samples)
}

fn not_found(dataset: DatasetId, path: &Path) -> EmofaceError {
    EmofaceError::DatasetNotFound {
        dataset: dataset.to_string(),
        path: path.display().to_string(),
    }
}

/// One sub-directory per emotion, holding that emotion's images.
fn load_image_folders(dir: &Path, dataset: DatasetId) -> Result<Vec<Sample>> {
    if !dir.is_dir() {
        return Err(not_found(dataset, dir));
    }

    let mut class_dirs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_dir())
        .collect();
    class_dirs.sort();

    let mut samples = Vec::new();
    for class_dir in class_dirs {
        let label = match class_dir.file_name().and_then(|n| n.to_str()) {
            Some(name) => name.to_lowercase(),
            None => continue,
        };
        if !dataset.known_labels().contains(&label.as_str()) {
            return Err(EmofaceError::UnknownLabel(label));
        }

        let mut files: Vec<PathBuf> = fs::read_dir(&class_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image_file(p))
            .collect();
        files.sort();

        debug!("{}: {} images", label, files.len());
        for file in files {
            let image = image::open(&file)?.to_luma8();
            samples.push(Sample::new(image, label.clone()));
        }
    }

    Ok(samples)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// FER2013 ships as one CSV; each row is an emotion code and a 48x48 image as
/// space separated intensities.
fn load_fer2013_csv(path: &Path) -> Result<Vec<Sample>> {
    let dataset = DatasetId::Fer2013;
    if !path.is_file() {
        return Err(not_found(dataset, path));
    }

    let file = File::open(path)?;
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(BufReader::new(file));

    let headers = rdr.headers()?.clone();
    let emotion_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("emotion"))
        .unwrap_or(0);
    let pixels_col = headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case("pixels"))
        .unwrap_or(1);

    let labels = dataset.known_labels();
    let expected_len = (FACE_SIZE * FACE_SIZE) as usize;
    let mut samples = Vec::new();

    for (row, result) in rdr.records().enumerate() {
        let record = result?;
        let code = record
            .get(emotion_col)
            .and_then(|s| s.trim().parse::<usize>().ok())
            .ok_or_else(|| malformed(path, row, "emotion code"))?;
        let label = labels
            .get(code)
            .ok_or_else(|| EmofaceError::UnknownLabel(code.to_string()))?;

        let pixels = record
            .get(pixels_col)
            .ok_or_else(|| malformed(path, row, "pixels"))?
            .split_whitespace()
            .map(|p| p.parse::<u8>())
            .collect::<std::result::Result<Vec<u8>, _>>()
            .map_err(|_| malformed(path, row, "pixels"))?;
        if pixels.len() != expected_len {
            return Err(malformed(path, row, "pixel count"));
        }

        let image = GrayImage::from_raw(FACE_SIZE, FACE_SIZE, pixels)
            .ok_or_else(|| malformed(path, row, "pixels"))?;
        samples.push(Sample::new(image, *label));
    }

    Ok(samples)
}

fn malformed(path: &Path, row: usize, field: &str) -> EmofaceError {
    EmofaceError::ShapeMismatch(format!(
        "{}: row {} has an invalid {}",
        path.display(),
        row + 1,
        field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Write;

    fn write_ck_dataset(root: &Path) {
        for (label, value) in [("happy", 200u8), ("sadness", 30u8)] {
            let dir = root.join("CK+48").join(label);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..3 {
                let img = GrayImage::from_pixel(FACE_SIZE, FACE_SIZE, Luma([value]));
                img.save(dir.join(format!("{}_{}.png", label, i))).unwrap();
            }
        }
    }

    #[test]
    fn loads_ck_folders() {
        let dir = tempfile::tempdir().unwrap();
        write_ck_dataset(dir.path());

        let mut rng = StdRng::seed_from_u64(7);
        let samples = load_dataset(dir.path(), DatasetId::CkPlus48, &mut rng).unwrap();
        assert_eq!(samples.len(), 6);
        for s in &samples {
            assert!(DatasetId::CkPlus48.known_labels().contains(&s.label.as_str()));
            assert_eq!(s.image.dimensions(), (FACE_SIZE, FACE_SIZE));
        }
    }

    #[test]
    fn loads_fer_csv() {
        let dir = tempfile::tempdir().unwrap();
        let fer_dir = dir.path().join("fer2013");
        fs::create_dir_all(&fer_dir).unwrap();
        let mut f = File::create(fer_dir.join("fer2013.csv")).unwrap();
        writeln!(f, "emotion,pixels,Usage").unwrap();
        let pixels = vec!["10"; (FACE_SIZE * FACE_SIZE) as usize].join(" ");
        writeln!(f, "3,{},Training", pixels).unwrap();
        writeln!(f, "6,{},PublicTest", pixels).unwrap();
        drop(f);

        let mut rng = StdRng::seed_from_u64(1);
        let samples = load_dataset(dir.path(), DatasetId::Fer2013, &mut rng).unwrap();
        let mut labels: Vec<_> = samples.iter().map(|s| s.label.as_str()).collect();
        labels.sort();
        assert_eq!(labels, vec!["happy", "neutral"]);
        assert_eq!(samples[0].image.get_pixel(0, 0)[0], 10);
    }

    #[test]
    fn missing_dataset_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let err = load_dataset(dir.path(), DatasetId::CkPlus48, &mut rng).unwrap_err();
        assert!(matches!(err, EmofaceError::DatasetNotFound { .. }));
        let err = load_dataset(dir.path(), DatasetId::Fer2013, &mut rng).unwrap_err();
        assert!(matches!(err, EmofaceError::DatasetNotFound { .. }));
    }

    #[test]
    fn short_pixel_rows_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let fer_dir = dir.path().join("fer2013");
        fs::create_dir_all(&fer_dir).unwrap();
        fs::write(fer_dir.join("fer2013.csv"), "emotion,pixels,Usage\n0,1 2 3,Training\n").unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        assert!(load_dataset(dir.path(), DatasetId::Fer2013, &mut rng).is_err());
    }
}
