//! Locating faces in a photograph and cutting them out at model resolution.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use image::imageops::{self, FilterType};
use image::GrayImage;
use log::{debug, info, warn};
use rustface::ImageData;

use crate::config::DetectorConfig;
use crate::error::{EmofaceError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMode {
    /// Run the face detector.
    Auto,
    /// Use caller-supplied boxes.
    Manual,
}

impl DetectionMode {
    pub const OPTIONS: [&'static str; 2] = ["auto", "manual"];
}

impl FromStr for DetectionMode {
    type Err = EmofaceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(DetectionMode::Auto),
            "manual" => Ok(DetectionMode::Manual),
            _ => Err(EmofaceError::InvalidDetectionMode(s.to_string())),
        }
    }
}

impl fmt::Display for DetectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionMode::Auto => f.write_str("auto"),
            DetectionMode::Manual => f.write_str("manual"),
        }
    }
}

/// Axis-aligned face rectangle in photo pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl FaceBox {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with a `width × height` image, `None` if empty.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<FaceBox> {
        if self.x >= width || self.y >= height {
            return None;
        }
        let w = self.width.min(width - self.x);
        let h = self.height.min(height - self.y);
        (w > 0 && h > 0).then_some(FaceBox::new(self.x, self.y, w, h))
    }
}

/// Parses `x,y,w,h`.
impl FromStr for FaceBox {
    type Err = EmofaceError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| EmofaceError::InvalidConfig(format!("face box '{}': {}", s, e)))?;
        match parts.as_slice() {
            &[x, y, w, h] if w > 0 && h > 0 => Ok(FaceBox::new(x, y, w, h)),
            _ => Err(EmofaceError::InvalidConfig(format!(
                "face box '{}' must be x,y,width,height with positive size",
                s
            ))),
        }
    }
}

impl fmt::Display for FaceBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Crop every box out of `photo` and resize it to `face_size`. Boxes that
/// fall outside the photo are dropped.
pub fn crop_faces(
    photo: &GrayImage,
    boxes: &[FaceBox],
    face_size: (u32, u32),
) -> (Vec<FaceBox>, Vec<GrayImage>) {
    let (pw, ph) = photo.dimensions();
    let mut kept = Vec::with_capacity(boxes.len());
    let mut crops = Vec::with_capacity(boxes.len());
    for b in boxes {
        let Some(clamped) = b.clamp_to(pw, ph) else {
            warn!("face box {} lies outside the {}x{} photo; skipped", b, pw, ph);
            continue;
        };
        let crop = imageops::crop_imm(photo, clamped.x, clamped.y, clamped.width, clamped.height)
            .to_image();
        crops.push(imageops::resize(
            &crop,
            face_size.0,
            face_size.1,
            FilterType::Triangle,
        ));
        kept.push(clamped);
    }
    (kept, crops)
}

/// Finds faces in a photo and returns them as model-sized crops alongside
/// their boxes. Zero faces is a valid answer.
pub trait FaceLocator {
    fn detect_face(
        &self,
        photo: &GrayImage,
        mode: DetectionMode,
        face_size: (u32, u32),
    ) -> Result<(Vec<FaceBox>, Vec<GrayImage>)>;
}

/// SeetaFace frontal detector for `auto`, fixed boxes for `manual`.
#[derive(Debug, Clone)]
pub struct SeetaFaceLocator {
    config: DetectorConfig,
    manual_boxes: Vec<FaceBox>,
}

impl SeetaFaceLocator {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            config,
            manual_boxes: Vec::new(),
        }
    }

    pub fn with_manual_boxes(mut self, boxes: Vec<FaceBox>) -> Self {
        self.manual_boxes = boxes;
        self
    }

    pub fn model_path(&self) -> &PathBuf {
        &self.config.model_path
    }

    fn run_detector(&self, photo: &GrayImage) -> Result<Vec<FaceBox>> {
        let path = self.config.model_path.to_str().ok_or_else(|| {
            EmofaceError::FaceDetection(format!(
                "detector model path {:?} is not valid UTF-8",
                self.config.model_path
            ))
        })?;
        if !self.config.model_path.is_file() {
            return Err(EmofaceError::FaceDetection(format!(
                "detector model not found at {}",
                path
            )));
        }
        let mut detector = rustface::create_detector(path).map_err(|e| {
            EmofaceError::FaceDetection(format!("failed to load detector {}: {}", path, e))
        })?;
        detector.set_min_face_size(self.config.min_face_size);
        detector.set_score_thresh(self.config.score_thresh);
        detector.set_pyramid_scale_factor(self.config.pyramid_scale_factor);
        detector.set_slide_window_step(self.config.slide_window_step, self.config.slide_window_step);

        let (w, h) = photo.dimensions();
        let faces = detector.detect(&ImageData::new(photo.as_raw(), w, h));
        debug!("detector returned {} candidate faces", faces.len());

        Ok(faces
            .iter()
            .map(|face| {
                let bbox = face.bbox();
                FaceBox::new(
                    bbox.x().max(0) as u32,
                    bbox.y().max(0) as u32,
                    bbox.width(),
                    bbox.height(),
                )
            })
            .collect())
    }
}

impl FaceLocator for SeetaFaceLocator {
    fn detect_face(
        &self,
        photo: &GrayImage,
        mode: DetectionMode,
        face_size: (u32, u32),
    ) -> Result<(Vec<FaceBox>, Vec<GrayImage>)> {
        let boxes = match mode {
            DetectionMode::Auto => self.run_detector(photo)?,
            DetectionMode::Manual => {
                if self.manual_boxes.is_empty() {
                    warn!("manual detection mode without any face boxes");
                }
                self.manual_boxes.clone()
            }
        };
        let (boxes, crops) = crop_faces(photo, &boxes, face_size);
        info!("located {} face(s) in {} mode", boxes.len(), mode);
        Ok((boxes, crops))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn parses_modes_and_boxes() {
        assert_eq!("AUTO".parse::<DetectionMode>().unwrap(), DetectionMode::Auto);
        assert!(matches!(
            "webcam".parse::<DetectionMode>(),
            Err(EmofaceError::InvalidDetectionMode(_))
        ));
        assert_eq!("1, 2,30,40".parse::<FaceBox>().unwrap(), FaceBox::new(1, 2, 30, 40));
        assert!("1,2,3".parse::<FaceBox>().is_err());
        assert!("1,2,0,4".parse::<FaceBox>().is_err());
    }

    #[test]
    fn crops_are_resized_and_clamped() {
        let photo = GrayImage::from_fn(100, 80, |x, _| Luma([x as u8]));
        let boxes = [
            FaceBox::new(10, 10, 30, 30),
            FaceBox::new(90, 70, 50, 50),
            FaceBox::new(200, 0, 5, 5),
        ];
        let (kept, crops) = crop_faces(&photo, &boxes, (48, 48));
        assert_eq!(kept, vec![FaceBox::new(10, 10, 30, 30), FaceBox::new(90, 70, 10, 10)]);
        assert!(crops.iter().all(|c| c.dimensions() == (48, 48)));
    }

    #[test]
    fn manual_mode_uses_given_boxes() {
        let photo = GrayImage::new(64, 64);
        let locator = SeetaFaceLocator::new(DetectorConfig::default())
            .with_manual_boxes(vec![FaceBox::new(0, 0, 32, 32)]);
        let (boxes, crops) = locator
            .detect_face(&photo, DetectionMode::Manual, (48, 48))
            .unwrap();
        assert_eq!(boxes.len(), 1);
        assert_eq!(crops[0].dimensions(), (48, 48));
    }

    #[test]
    fn auto_mode_without_model_file_fails() {
        let mut config = DetectorConfig::default();
        config.model_path = PathBuf::from("/nonexistent/seeta.bin");
        let locator = SeetaFaceLocator::new(config);
        let err = locator
            .detect_face(&GrayImage::new(10, 10), DetectionMode::Auto, (48, 48))
            .unwrap_err();
        assert!(matches!(err, EmofaceError::FaceDetection(_)));
    }
}
