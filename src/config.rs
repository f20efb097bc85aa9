use crate::error::{GaugeError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration, loadable from a TOML file.
///
/// Every section and field has a default, so an empty file (or no file at
/// all) yields the standard operating point.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    pub models: ModelConfig,
    pub detector: DetectorConfig,
    pub pose: PoseConfig,
    pub calibration: CalibrationConfig,
    pub server: ServerConfig,
}

impl GaugeConfig {
    /// Load from `path` when given, otherwise use the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
            .map_err(|e| GaugeError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| GaugeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        if !in_unit(self.detector.confidence_threshold) || !in_unit(self.detector.nms_threshold) {
            return Err(GaugeError::Config(
                "detector thresholds must be within [0, 1]".to_string(),
            ));
        }
        if self.detector.input_size == 0 || self.pose.input_size == 0 {
            return Err(GaugeError::Config("model input size must be non-zero".to_string()));
        }
        if !(self.calibration.full_scale > 0.0) {
            return Err(GaugeError::Config("calibration.full_scale must be positive".to_string()));
        }
        let layout = &self.pose.layout;
        let needed = [layout.zero, layout.full_scale, layout.pivot, layout.tip];
        if needed.iter().any(|&i| i >= layout.count) {
            return Err(GaugeError::Config(format!(
                "keypoint layout indices must be below count {}",
                layout.count
            )));
        }
        Ok(())
    }
}

/// Where the two model artifacts live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub dir: PathBuf,
    pub detector_file: String,
    pub pose_file: String,
}

impl ModelConfig {
    pub fn detector_path(&self) -> PathBuf {
        self.dir.join(&self.detector_file)
    }

    pub fn pose_path(&self) -> PathBuf {
        self.dir.join(&self.pose_file)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("weights"),
            detector_file: "nanodet.rten".to_string(),
            pose_file: "gauge-pose.rten".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Square side of the detector input
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub num_classes: usize,
    pub reg_max: usize,
    pub strides: Vec<u32>,
    /// Smallest side (in frame pixels) a clamped box may have
    pub min_roi_side: f32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            input_size: 320,
            confidence_threshold: 0.3,
            nms_threshold: 0.3,
            num_classes: 1,
            reg_max: 7,
            strides: vec![8, 16, 32, 64],
            min_roi_side: 1.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub input_size: u32,
    /// Minimum box score for the pose model's best candidate
    pub confidence_threshold: f32,
    /// Keypoints below this confidence make a region unusable
    pub min_keypoint_confidence: f32,
    pub layout: KeypointLayout,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            input_size: 640,
            confidence_threshold: 0.25,
            min_keypoint_confidence: 0.25,
            layout: KeypointLayout::default(),
        }
    }
}

/// Index of each gauge landmark inside a keypoint set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeypointLayout {
    pub count: usize,
    pub zero: usize,
    pub full_scale: usize,
    pub pivot: usize,
    pub tip: usize,
}

impl Default for KeypointLayout {
    fn default() -> Self {
        Self {
            count: 4,
            zero: 0,
            full_scale: 1,
            pivot: 2,
            tip: 3,
        }
    }
}

/// Empirical two-branch correction and output formatting
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub full_scale: f32,
    pub branch_threshold: f32,
    pub low_offset: f32,
    pub high_offset: f32,
    pub precision: usize,
    pub unit: String,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            full_scale: 1.0,
            branch_threshold: 0.50,
            low_offset: 0.012,
            high_offset: 0.008,
            precision: 3,
            unit: "Mpa".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub max_body_bytes: usize,
    pub jpeg_quality: u8,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8080".to_string(),
            max_body_bytes: 32 * 1024 * 1024,
            jpeg_quality: 90,
        }
    }
}
