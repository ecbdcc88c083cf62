//! Image → embedding pipeline.

use crate::detector::{DetectorError, FaceDetector};
use crate::recognizer::{FaceRecognizer, RecognizerError};
use crate::types::Embedding;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

pub const SCRFD_MODEL_FILE: &str = "det_10g.onnx";
pub const ARCFACE_MODEL_FILE: &str = "w600k_r50.onnx";

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("detector error: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer error: {0}")]
    Recognizer(#[from] RecognizerError),
}

/// Produces face encodings from images.
pub trait FaceEncoder {
    /// One embedding per detected face, in detection-confidence order.
    fn encode_all(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError>;

    /// The embedding of the only face in the image.
    ///
    /// `None` when the image holds zero or several faces; callers skip the
    /// image rather than guess which face was meant.
    fn encode(&mut self, image: &RgbImage) -> Result<Option<Embedding>, EncodeError> {
        let mut all = self.encode_all(image)?;
        Ok(if all.len() == 1 { all.pop() } else { None })
    }
}

/// SCRFD detection followed by ArcFace recognition.
pub struct OnnxFaceEncoder {
    detector: FaceDetector,
    recognizer: FaceRecognizer,
}

impl OnnxFaceEncoder {
    /// Load both models from `model_dir`. Fails fast if either is missing.
    pub fn load(model_dir: &Path) -> Result<Self, EncodeError> {
        let detector = FaceDetector::load(&model_dir.join(SCRFD_MODEL_FILE))?;
        let recognizer = FaceRecognizer::load(&model_dir.join(ARCFACE_MODEL_FILE))?;
        Ok(Self { detector, recognizer })
    }
}

impl FaceEncoder for OnnxFaceEncoder {
    fn encode_all(&mut self, image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
        let faces = self.detector.detect(image)?;
        faces
            .iter()
            .map(|face| self.recognizer.extract(image, face).map_err(EncodeError::from))
            .collect()
    }

    // Detect first so ambiguous images never pay for recognition.
    fn encode(&mut self, image: &RgbImage) -> Result<Option<Embedding>, EncodeError> {
        let faces = self.detector.detect(image)?;
        match faces.as_slice() {
            [face] => Ok(Some(self.recognizer.extract(image, face)?)),
            _ => {
                tracing::debug!(faces = faces.len(), "expected exactly one face");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(usize);

    impl FaceEncoder for Fixed {
        fn encode_all(&mut self, _image: &RgbImage) -> Result<Vec<Embedding>, EncodeError> {
            Ok((0..self.0).map(|i| Embedding::new(vec![i as f32])).collect())
        }
    }

    #[test]
    fn test_encode_requires_exactly_one_face() {
        let image = RgbImage::new(4, 4);
        assert_eq!(Fixed(0).encode(&image).unwrap(), None);
        assert_eq!(Fixed(1).encode(&image).unwrap(), Some(Embedding::new(vec![0.0])));
        assert_eq!(Fixed(2).encode(&image).unwrap(), None);
    }

    #[test]
    fn test_load_missing_models() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxFaceEncoder::load(dir.path());
        assert!(matches!(result, Err(EncodeError::Detector(DetectorError::ModelNotFound(_)))));
    }
}
