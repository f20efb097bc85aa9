use crate::config::GaugeConfig;
use crate::error::Result;
use crate::models::{BoundingBox, KeypointSet};
use image::RgbImage;
use std::sync::Arc;

/// Raw detector candidate in detector input coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: usize,
}

/// Bounding-box model forward pass.
///
/// Implementations receive an already letterboxed square image of
/// [`DetectionBackend::input_size`] pixels and return every candidate they
/// decode; thresholding and NMS happen in [`super::ObjectDetector`].
/// `forward` takes `&self` and may be called from several threads at once.
pub trait DetectionBackend: Send + Sync {
    fn input_size(&self) -> u32;

    fn forward(&self, input: &RgbImage) -> Result<Vec<Candidate>>;

    fn name(&self) -> &str;
}

/// Keypoint model forward pass over one cropped gauge.
///
/// Returns `Ok(None)` when the model finds no gauge pose in the crop.
/// Keypoints are in the crop's own pixel coordinates.
pub trait KeypointBackend: Send + Sync {
    fn estimate(&self, region: &RgbImage) -> Result<Option<KeypointSet>>;

    fn name(&self) -> &str;
}

/// The two models, loaded once and shared by every pipeline invocation
#[derive(Clone)]
pub struct ModelBundle {
    pub detector: Arc<dyn DetectionBackend>,
    pub pose: Arc<dyn KeypointBackend>,
}

impl ModelBundle {
    pub fn new(detector: Arc<dyn DetectionBackend>, pose: Arc<dyn KeypointBackend>) -> Self {
        Self { detector, pose }
    }

    /// Load the `rten` detector and pose models named in the configuration
    pub fn load(config: &GaugeConfig) -> Result<Self> {
        let detector = super::nanodet::NanoDetBackend::load(
            &config.models.detector_path(),
            &config.detector,
        )?;
        let pose = crate::pose::yolo::YoloPoseBackend::load(&config.models.pose_path(), &config.pose)?;

        tracing::info!(
            detector = %config.models.detector_path().display(),
            pose = %config.models.pose_path().display(),
            "models loaded"
        );

        Ok(Self::new(Arc::new(detector), Arc::new(pose)))
    }
}

impl std::fmt::Debug for ModelBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBundle")
            .field("detector", &self.detector.name())
            .field("pose", &self.pose.name())
            .finish()
    }
}
