//! Classifier label vocabulary: one label per line, line index = output index.

use glance_core::LabelScore;
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("label file not found: {0}")]
    NotFound(String),
    #[error("failed to read labels: {0}")]
    Io(#[from] std::io::Error),
    #[error("label file is empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelVocabulary {
    labels: Vec<String>,
}

impl LabelVocabulary {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LabelError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(LabelError::NotFound(path.display().to_string()));
        }
        let file = std::fs::File::open(path)?;
        let vocab = Self::from_reader(std::io::BufReader::new(file))?;
        tracing::info!(path = %path.display(), labels = vocab.len(), "loaded label vocabulary");
        Ok(vocab)
    }

    pub fn from_reader(reader: impl BufRead) -> Result<Self, LabelError> {
        let labels = reader
            .lines()
            .map(|line| line.map(|l| l.trim_end_matches('\r').to_string()))
            .collect::<Result<Vec<_>, _>>()?;
        if labels.is_empty() {
            return Err(LabelError::Empty);
        }
        Ok(Self { labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Pair quantized classifier outputs (`0..=255`) with their labels.
    ///
    /// Scores beyond the vocabulary, or labels without a score, are dropped.
    pub fn scores_from_quantized(&self, output: &[u8]) -> Vec<LabelScore> {
        if output.len() != self.labels.len() {
            tracing::warn!(
                outputs = output.len(),
                labels = self.labels.len(),
                "classifier output size differs from vocabulary"
            );
        }
        self.labels
            .iter()
            .zip(output)
            .map(|(label, &q)| LabelScore {
                label: label.clone(),
                confidence: q as f32 / 255.0,
            })
            .collect()
    }
}
