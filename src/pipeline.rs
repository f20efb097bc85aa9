use crate::config::GaugeConfig;
use crate::detection::backend::ModelBundle;
use crate::detection::{ObjectDetector, RoiSelector, map_to_frame_coordinates};
use crate::error::{GaugeError, Result};
use crate::models::{Frame, PipelineOutcome, PipelineResult, RegionImage, ScaleReading};
use crate::pose::{PoseEstimator, PoseOutcome};
use crate::render::ResultRenderer;
use crate::scale::ScaleCalculator;
use image::RgbImage;
use std::path::{Path, PathBuf};

/// Debug configuration for pipeline execution
#[derive(Clone, Debug)]
pub struct DebugConfig {
    /// Directory receiving intermediate images for one invocation
    pub output_dir: PathBuf,
}

impl DebugConfig {
    /// Use `output_dir` as a debug root; it must be empty or not exist yet
    pub fn new(output_dir: PathBuf) -> Result<Self> {
        if output_dir.exists() {
            if std::fs::read_dir(&output_dir)?.next().is_some() {
                return Err(GaugeError::Config(format!(
                    "debug directory is not empty: {}",
                    output_dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&output_dir)?;
        }
        Ok(Self { output_dir })
    }

    /// Config for one image, in a subdirectory named after it
    pub fn for_image(&self, name: &str) -> Self {
        Self {
            output_dir: self.output_dir.join(name),
        }
    }

    fn save(&self, relative: &Path, image: &RgbImage) -> Result<()> {
        let path = self.output_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image.save(&path)?;
        tracing::debug!(path = %path.display(), "saved debug image");
        Ok(())
    }
}

/// Per-invocation options
#[derive(Clone, Debug, Default)]
pub struct PipelineContext {
    pub debug: Option<DebugConfig>,
}

impl PipelineContext {
    pub fn with_debug(debug: DebugConfig) -> Self {
        Self { debug: Some(debug) }
    }

    /// Debug output is best effort and never changes the reading
    fn save_debug(&self, relative: impl AsRef<Path>, image: &RgbImage) {
        if let Some(debug) = &self.debug {
            if let Err(e) = debug.save(relative.as_ref(), image) {
                tracing::warn!(error = %e, "failed to save debug image");
            }
        }
    }
}

/// Reads every gauge in a frame.
///
/// Holds the shared models and the per-stage components; one instance serves
/// any number of sequential or concurrent invocations.
pub struct GaugeReader {
    models: ModelBundle,
    pub detector: ObjectDetector,
    pub roi_selector: RoiSelector,
    pub pose: PoseEstimator,
    pub calculator: ScaleCalculator,
    pub renderer: ResultRenderer,
}

impl GaugeReader {
    pub fn new(models: ModelBundle, config: &GaugeConfig) -> Self {
        let calculator = ScaleCalculator::from_config(&config.calibration);
        Self {
            detector: ObjectDetector::from_config(models.detector.clone(), &config.detector),
            roi_selector: RoiSelector::new(config.detector.min_roi_side),
            pose: PoseEstimator::from_config(models.pose.clone(), &config.pose),
            renderer: ResultRenderer::new(calculator.clone(), config.pose.layout),
            calculator,
            models,
        }
    }

    /// Load the configured models and build a reader around them
    pub fn load(config: &GaugeConfig) -> Result<Self> {
        Ok(Self::new(ModelBundle::load(config)?, config))
    }

    pub fn models(&self) -> &ModelBundle {
        &self.models
    }

    pub fn read(&self, frame: &Frame) -> Result<PipelineResult> {
        self.read_with_context(frame, &PipelineContext::default())
    }

    /// Run detection, ROI validation, pose estimation and calibration.
    ///
    /// Only an empty frame is an error. Inference failures become the
    /// matching empty outcome so one bad model call never aborts a batch.
    pub fn read_with_context(&self, frame: &Frame, context: &PipelineContext) -> Result<PipelineResult> {
        if frame.is_empty() {
            return Err(GaugeError::EmptyFrame);
        }
        let (width, height) = (frame.width(), frame.height());

        let (input, roi) = self.detector.letterbox(frame);
        context.save_debug("00_letterbox.png", &input);

        let raw = match self.detector.detect_letterboxed(
            &input,
            self.detector.confidence_threshold,
            self.detector.nms_threshold,
        ) {
            Ok(objects) => objects,
            Err(e) => {
                tracing::warn!(error = %e, "detection failed");
                return Ok(PipelineResult::no_objects(Vec::new()));
            }
        };

        let detected = map_to_frame_coordinates(&raw, &roi, width, height);
        tracing::info!(objects = detected.len(), "detection finished");

        if detected.is_empty() || !self.roi_selector.is_valid_roi(&detected, width, height) {
            return Ok(PipelineResult::no_objects(detected));
        }

        let regions = self.roi_selector.extract_regions(frame, &detected);
        for region in &regions {
            context.save_debug(format!("01_regions/{:02}.png", region.object_index + 1), &region.image);
        }
        let validated = regions.len();

        let batch = match self.pose.estimate_batch(&regions) {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(error = %e, "pose estimation failed");
                return Ok(PipelineResult {
                    detected,
                    validated,
                    outcome: PipelineOutcome::NoReadings,
                });
            }
        };

        if !batch.success() {
            return Ok(PipelineResult {
                detected,
                validated,
                outcome: PipelineOutcome::NoReadings,
            });
        }

        let readings: Vec<ScaleReading> = regions
            .into_iter()
            .zip(batch.outcomes)
            .filter_map(|(region, outcome)| self.to_reading(region, outcome))
            .collect();

        tracing::info!(validated, readings = readings.len(), "gauges read");

        Ok(PipelineResult {
            detected,
            validated,
            outcome: PipelineOutcome::Readings(readings),
        })
    }

    fn to_reading(&self, region: RegionImage, outcome: PoseOutcome) -> Option<ScaleReading> {
        let PoseOutcome::Usable { keypoints, ratio } = outcome else {
            return None;
        };
        Some(ScaleReading {
            object_index: region.object_index,
            object: region.object,
            keypoints,
            origin: region.origin,
            ratio,
            value: self.calculator.calibrate(ratio),
        })
    }

    /// Overlay the result on a copy of the frame
    pub fn render(&self, frame: &Frame, result: &PipelineResult) -> RgbImage {
        self.renderer.render(frame, &result.detected, result.readings())
    }
}
