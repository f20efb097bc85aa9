use super::backend::DetectionBackend;
use super::nms::nms;
use super::preprocessing::{self, DETECTOR_PAD};
use crate::config::DetectorConfig;
use crate::error::Result;
use crate::models::{BoundingBox, DetectedObject, Detections, EffectiveRoi, Frame};
use image::RgbImage;
use std::sync::Arc;

/// Finds gauge faces in a full frame
pub struct ObjectDetector {
    backend: Arc<dyn DetectionBackend>,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
}

impl ObjectDetector {
    pub fn new(backend: Arc<dyn DetectionBackend>) -> Self {
        Self {
            backend,
            confidence_threshold: 0.3,
            nms_threshold: 0.3,
        }
    }

    pub fn from_config(backend: Arc<dyn DetectionBackend>, config: &DetectorConfig) -> Self {
        Self::new(backend).with_thresholds(config.confidence_threshold, config.nms_threshold)
    }

    pub fn with_thresholds(mut self, confidence: f32, nms: f32) -> Self {
        self.confidence_threshold = confidence;
        self.nms_threshold = nms;
        self
    }

    /// Letterbox the frame to the detector input size
    pub fn letterbox(&self, frame: &Frame) -> (RgbImage, EffectiveRoi) {
        preprocessing::letterbox(frame.image(), self.backend.input_size(), DETECTOR_PAD)
    }

    /// Detect with the configured thresholds
    pub fn detect(&self, frame: &Frame) -> Result<Detections> {
        self.detect_with(frame, self.confidence_threshold, self.nms_threshold)
    }

    /// Detect objects; boxes are returned in detector input coordinates
    /// alongside the letterbox needed to map them back.
    pub fn detect_with(&self, frame: &Frame, confidence: f32, nms_threshold: f32) -> Result<Detections> {
        let (input, roi) = self.letterbox(frame);
        let objects = self.detect_letterboxed(&input, confidence, nms_threshold)?;
        Ok(Detections { objects, roi })
    }

    /// Run the backend on an already letterboxed input
    pub fn detect_letterboxed(
        &self,
        input: &RgbImage,
        confidence: f32,
        nms_threshold: f32,
    ) -> Result<Vec<DetectedObject>> {
        let candidates = self.backend.forward(input)?;
        let raw = candidates.len();

        let survivors: Vec<_> = candidates
            .into_iter()
            .filter(|c| c.score >= confidence && c.bbox.is_finite())
            .collect();
        let kept = nms(survivors, nms_threshold);

        tracing::debug!(
            backend = self.backend.name(),
            raw,
            kept = kept.len(),
            "detector candidates"
        );

        Ok(kept
            .into_iter()
            .map(|c| DetectedObject {
                bbox: c.bbox,
                score: c.score,
                class_id: c.class_id,
            })
            .collect())
    }
}

/// Map detector-space boxes back onto the original frame.
///
/// Inverts the letterbox (subtract padding, divide by scale) and clamps each
/// box to `[0, frame_width] x [0, frame_height]`.
pub fn map_to_frame_coordinates(
    objects: &[DetectedObject],
    roi: &EffectiveRoi,
    frame_width: u32,
    frame_height: u32,
) -> Vec<DetectedObject> {
    let (fw, fh) = (frame_width as f32, frame_height as f32);

    objects
        .iter()
        .map(|obj| {
            let mapped = roi.to_frame_box(&obj.bbox);
            let x1 = mapped.x.clamp(0.0, fw);
            let y1 = mapped.y.clamp(0.0, fh);
            let x2 = mapped.right().clamp(0.0, fw);
            let y2 = mapped.bottom().clamp(0.0, fh);

            DetectedObject {
                bbox: BoundingBox::from_corners(x1, y1, x2, y2),
                ..*obj
            }
        })
        .collect()
}
