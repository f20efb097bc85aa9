#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from gaugeread for tests
pub use gaugeread::config::{CalibrationConfig, GaugeConfig, KeypointLayout, ServerConfig};
pub use gaugeread::detection::{Candidate, ModelBundle, ObjectDetector, RoiSelector};
pub use gaugeread::models::{
    BoundingBox, DetectedObject, EffectiveRoi, Frame, Keypoint, KeypointSet, PipelineOutcome, PipelineResult,
};
pub use gaugeread::{GaugeError, GaugeReader, ScaleCalculator};
