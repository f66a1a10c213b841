use glance_imaging::tensor::DEFAULT_INPUT_SIZE;
use std::path::PathBuf;

/// Pipeline configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Classifier label file, one label per line.
    pub labels_path: PathBuf,
    /// Font used for annotation captions; captions are skipped without one.
    pub font_path: Option<PathBuf>,
    /// Display box the captured photo is fitted into.
    pub view_width: u32,
    pub view_height: u32,
    /// Square classifier input resolution.
    pub classifier_input: u32,
    /// How long to wait for a detector before reporting a timeout.
    pub submit_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `GLANCE_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("GLANCE_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("models"));

        let labels_path = std::env::var("GLANCE_LABELS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| model_dir.join("labels.txt"));

        Self {
            model_dir,
            labels_path,
            font_path: std::env::var("GLANCE_FONT_PATH").ok().map(PathBuf::from),
            view_width: env_u32("GLANCE_VIEW_WIDTH", 1080),
            view_height: env_u32("GLANCE_VIEW_HEIGHT", 1440),
            classifier_input: env_u32("GLANCE_CLASSIFIER_INPUT", DEFAULT_INPUT_SIZE),
            submit_timeout_secs: env_u64("GLANCE_SUBMIT_TIMEOUT_SECS", 10),
        }
    }

    /// Path to the classifier model.
    pub fn classifier_model_path(&self) -> String {
        self.model_dir
            .join("mobilenet.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
