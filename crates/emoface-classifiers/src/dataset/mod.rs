//! Labeled face-image datasets.
//!
//! A dataset is a flat list of [`Sample`]s (grayscale image + emotion label)
//! identified by a closed set of [`DatasetId`]s. Loading lives in [`load`].
pub mod load;

use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::EmofaceError;

pub use load::load_dataset;

/// Side length of the square images shipped with both datasets.
pub const FACE_SIZE: u32 = 48;

/// One labeled face image.
#[derive(Debug, Clone)]
pub struct Sample {
    pub image: GrayImage,
    pub label: String,
}

impl Sample {
    pub fn new(image: GrayImage, label: impl Into<String>) -> Self {
        Self {
            image,
            label: label.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DatasetId {
    #[serde(rename = "CK+48")]
    CkPlus48,
    #[serde(rename = "fer2013")]
    Fer2013,
}

impl DatasetId {
    pub const OPTIONS: [&'static str; 2] = ["CK+48", "fer2013"];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetId::CkPlus48 => "CK+48",
            DatasetId::Fer2013 => "fer2013",
        }
    }

    /// Emotion classes the dataset can contain.
    pub fn known_labels(&self) -> &'static [&'static str] {
        match self {
            DatasetId::CkPlus48 => &[
                "anger", "contempt", "disgust", "fear", "happy", "sadness", "surprise",
            ],
            DatasetId::Fer2013 => &[
                "angry", "disgust", "fear", "happy", "sad", "surprise", "neutral",
            ],
        }
    }

    /// Width and height of every image in the dataset.
    pub fn image_size(&self) -> (u32, u32) {
        (FACE_SIZE, FACE_SIZE)
    }
}

impl FromStr for DatasetId {
    type Err = EmofaceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ck+48" => Ok(DatasetId::CkPlus48),
            "fer2013" => Ok(DatasetId::Fer2013),
            _ => Err(EmofaceError::InvalidDataset(s.to_string())),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
