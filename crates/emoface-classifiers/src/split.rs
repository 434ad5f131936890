//! Train/validation/test partitioning and label encoding.
use std::collections::BTreeSet;

use image::GrayImage;
use log::info;
use serde::{Deserialize, Serialize};

use crate::config::SplitConfig;
use crate::dataset::Sample;
use crate::error::{EmofaceError, Result};

/// Bidirectional mapping between emotion labels and dense indices.
///
/// Classes are kept in lexicographic order so the same label set always
/// yields the same indices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    pub fn fit<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: BTreeSet<String> = labels
            .into_iter()
            .map(|l| l.as_ref().to_string())
            .collect();
        Self {
            classes: classes.into_iter().collect(),
        }
    }

    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| EmofaceError::UnknownLabel(label.to_string()))
    }

    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Images of one subset with their encoded labels, index-aligned.
#[derive(Debug, Clone, Default)]
pub struct SplitSubset {
    pub images: Vec<GrayImage>,
    pub labels: Vec<usize>,
}

impl SplitSubset {
    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: SplitSubset,
    pub validation: SplitSubset,
    pub test: SplitSubset,
    pub encoder: LabelEncoder,
}

impl DatasetSplit {
    pub fn num_classes(&self) -> usize {
        self.encoder.len()
    }
}

/// Partition already-shuffled samples in order: the first `train_fraction`
/// go to train, the next `validation_fraction` to validation, the rest to test.
pub fn split_data(samples: Vec<Sample>, config: &SplitConfig) -> Result<DatasetSplit> {
    config.validate()?;
    if samples.is_empty() {
        return Err(EmofaceError::EmptyInput("no samples to split".to_string()));
    }

    let encoder = LabelEncoder::fit(samples.iter().map(|s| s.label.as_str()));

    let n = samples.len();
    let n_train = ((n as f64 * config.train_fraction).round() as usize).clamp(1, n);
    let n_validation =
        ((n as f64 * config.validation_fraction).round() as usize).min(n - n_train);

    let mut split = DatasetSplit {
        train: SplitSubset::default(),
        validation: SplitSubset::default(),
        test: SplitSubset::default(),
        encoder,
    };

    for (i, sample) in samples.into_iter().enumerate() {
        let label = split.encoder.encode(&sample.label)?;
        let subset = if i < n_train {
            &mut split.train
        } else if i < n_train + n_validation {
            &mut split.validation
        } else {
            &mut split.test
        };
        subset.images.push(sample.image);
        subset.labels.push(label);
    }

    info!(
        "Split {} samples into {} train / {} validation / {} test ({} classes)",
        n,
        split.train.len(),
        split.validation.len(),
        split.test.len(),
        split.num_classes()
    );

    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| {
                let label = ["happy", "anger", "fear"][i % 3];
                Sample::new(GrayImage::from_pixel(2, 2, Luma([i as u8])), label)
            })
            .collect()
    }

    #[test]
    fn encoder_round_trips_and_is_sorted() {
        let enc = LabelEncoder::fit(["surprise", "happy", "anger", "happy"]);
        assert_eq!(enc.classes(), &["anger", "happy", "surprise"]);
        for label in ["surprise", "happy", "anger"] {
            let idx = enc.encode(label).unwrap();
            assert_eq!(enc.decode(idx), Some(label));
        }
        assert!(enc.encode("fear").is_err());
        assert_eq!(enc.decode(3), None);
    }

    #[test]
    fn split_is_disjoint_and_complete() {
        let split = split_data(samples(20), &SplitConfig::default()).unwrap();
        assert_eq!(split.train.len(), 14);
        assert_eq!(split.validation.len(), 3);
        assert_eq!(split.test.len(), 3);

        // pixel value doubles as the sample id
        let mut seen: Vec<u8> = split
            .train
            .images
            .iter()
            .chain(&split.validation.images)
            .chain(&split.test.images)
            .map(|img| img.get_pixel(0, 0)[0])
            .collect();
        seen.sort();
        assert_eq!(seen, (0..20u8).collect::<Vec<_>>());
    }

    #[test]
    fn labels_share_one_encoding() {
        let split = split_data(samples(9), &SplitConfig::default()).unwrap();
        let happy = split.encoder.encode("happy").unwrap();
        for subset in [&split.train, &split.validation, &split.test] {
            for (img, &label) in subset.images.iter().zip(&subset.labels) {
                let id = img.get_pixel(0, 0)[0] as usize;
                assert_eq!(label == happy, id % 3 == 0);
            }
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(split_data(Vec::new(), &SplitConfig::default()).is_err());
    }
}
