pub mod geometry;
pub mod yolo;

pub use geometry::{UnusableReason, fill_ratio};

use crate::config::{KeypointLayout, PoseConfig};
use crate::detection::backend::KeypointBackend;
use crate::error::Result;
use crate::models::{KeypointSet, RegionImage};
use std::sync::Arc;

/// Pose result for a single region
#[derive(Debug, Clone, PartialEq)]
pub enum PoseOutcome {
    Usable { keypoints: KeypointSet, ratio: f32 },
    Unusable(UnusableReason),
}

impl PoseOutcome {
    pub fn is_usable(&self) -> bool {
        matches!(self, PoseOutcome::Usable { .. })
    }

    pub fn ratio(&self) -> Option<f32> {
        match self {
            PoseOutcome::Usable { ratio, .. } => Some(*ratio),
            PoseOutcome::Unusable(_) => None,
        }
    }
}

/// One outcome per input region, in the same order
#[derive(Debug, Clone, PartialEq)]
pub struct PoseBatch {
    pub outcomes: Vec<PoseOutcome>,
}

impl PoseBatch {
    /// True when at least one region produced a usable keypoint set
    pub fn success(&self) -> bool {
        self.outcomes.iter().any(PoseOutcome::is_usable)
    }

    pub fn usable_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_usable()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

/// Runs the keypoint model over cropped gauges and derives fill ratios
pub struct PoseEstimator {
    backend: Arc<dyn KeypointBackend>,
    pub layout: KeypointLayout,
    pub min_keypoint_confidence: f32,
}

impl PoseEstimator {
    pub fn new(backend: Arc<dyn KeypointBackend>) -> Self {
        Self {
            backend,
            layout: KeypointLayout::default(),
            min_keypoint_confidence: 0.25,
        }
    }

    pub fn from_config(backend: Arc<dyn KeypointBackend>, config: &PoseConfig) -> Self {
        Self {
            backend,
            layout: config.layout,
            min_keypoint_confidence: config.min_keypoint_confidence,
        }
    }

    /// Estimate one region
    pub fn estimate(&self, region: &RegionImage) -> Result<PoseOutcome> {
        let Some(keypoints) = self.backend.estimate(&region.image)? else {
            return Ok(PoseOutcome::Unusable(UnusableReason::NoPose));
        };

        Ok(match fill_ratio(&keypoints, &self.layout, self.min_keypoint_confidence) {
            Ok(ratio) => PoseOutcome::Usable { keypoints, ratio },
            Err(reason) => PoseOutcome::Unusable(reason),
        })
    }

    /// Estimate every region independently.
    ///
    /// Backend failures are returned as errors; the caller decides what they
    /// mean for the overall reading.
    pub fn estimate_batch(&self, regions: &[RegionImage]) -> Result<PoseBatch> {
        let mut outcomes = Vec::with_capacity(regions.len());

        for region in regions {
            let outcome = self.estimate(region)?;
            match &outcome {
                PoseOutcome::Usable { ratio, .. } => {
                    tracing::debug!(object = region.object_index, ratio, "pose usable");
                }
                PoseOutcome::Unusable(reason) => {
                    tracing::debug!(object = region.object_index, %reason, "pose unusable");
                }
            }
            outcomes.push(outcome);
        }

        Ok(PoseBatch { outcomes })
    }
}
