use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the gauge reading pipeline and its front ends.
///
/// Degenerate detection outcomes (no objects, unusable keypoints) are not
/// errors; they are reported through [`crate::PipelineOutcome`].
#[derive(Error, Debug)]
pub enum GaugeError {
    #[error("input frame is empty")]
    EmptyFrame,

    #[error("failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load model {path}: {message}")]
    ModelLoad { path: PathBuf, message: String },

    #[error("inference failed: {0}")]
    Inference(String),

    #[error("unexpected tensor shape: expected {expected}, got {got}")]
    Shape { expected: String, got: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("no images found in {0}")]
    NoImages(PathBuf),

    #[error("failed to encode output image: {0}")]
    Encode(String),
}

impl GaugeError {
    /// Wrap any runtime failure from the inference backend
    pub fn inference(err: impl std::fmt::Display) -> Self {
        GaugeError::Inference(format!("{err}"))
    }
}

pub type Result<T> = std::result::Result<T, GaugeError>;
