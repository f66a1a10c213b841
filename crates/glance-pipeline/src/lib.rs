//! glance-pipeline — Recognition pipeline.
//!
//! Runs each detector on its own worker thread, tags requests with a capture
//! generation, and turns results into overlay annotations.

pub mod classifier;
pub mod config;
pub mod pipeline;
pub mod replay;

pub use classifier::{ClassifierError, OnnxClassifier};
pub use config::Config;
pub use pipeline::{
    CaptureId, DetectionError, DetectionState, DetectorKind, Notice, Pipeline, PipelineError,
    Recognizer, Submission,
};
pub use replay::{ReplayError, ReplayRecognizer};
