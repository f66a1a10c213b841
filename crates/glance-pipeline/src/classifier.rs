//! Image classifier via ONNX Runtime.
//!
//! Runs a quantized MobileNet-style model: `u8` NHWC input produced by the
//! tensor encoder, one `u8` score per vocabulary label as output.

use crate::pipeline::{DetectionError, DetectorKind, Recognizer};
use glance_core::{LabelScore, Recognition};
use glance_imaging::{encode, LabelVocabulary};
use image::{DynamicImage, RgbaImage};
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

pub struct OnnxClassifier {
    session: Session,
    vocabulary: LabelVocabulary,
    input_size: u32,
}

impl OnnxClassifier {
    /// Load the model at `model_path`; inputs are squashed to `input_size` squared.
    pub fn load(
        model_path: &str,
        vocabulary: LabelVocabulary,
        input_size: u32,
    ) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            labels = vocabulary.len(),
            input_size,
            "loaded classifier model"
        );

        Ok(Self {
            session,
            vocabulary,
            input_size,
        })
    }

    /// Score every vocabulary label for `image`.
    pub fn classify(&mut self, image: &DynamicImage) -> Result<Vec<LabelScore>, ClassifierError> {
        let tensor = encode(image, self.input_size, self.input_size);
        let view = tensor
            .as_array()
            .map_err(|e| ClassifierError::InferenceFailed(format!("input tensor: {e}")))?;

        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(view)?])?;

        let (_, scores) = outputs[0]
            .try_extract_tensor::<u8>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("label scores: {e}")))?;

        if scores.is_empty() {
            return Err(ClassifierError::InferenceFailed("model returned no scores".into()));
        }

        Ok(self.vocabulary.scores_from_quantized(scores))
    }
}

impl Recognizer for OnnxClassifier {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Label
    }

    fn recognize(&mut self, image: &RgbaImage) -> Result<Recognition, DetectionError> {
        let scores = self.classify(&DynamicImage::ImageRgba8(image.clone()))?;
        Ok(Recognition::Labels(scores))
    }
}
