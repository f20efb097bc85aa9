use gaugeread::config::{GaugeConfig, KeypointLayout};
use gaugeread::detection::{Candidate, DetectionBackend, KeypointBackend, ModelBundle};
use gaugeread::models::{BoundingBox, EffectiveRoi, Frame, Keypoint, KeypointSet};
use gaugeread::{GaugeError, GaugeReader, Result};
use image::{ImageBuffer, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Detector input side used by every fake detector
pub const DETECTOR_INPUT: u32 = 320;

/// Zero mark at lower left, full scale at lower right: a 270 degree clockwise arc
pub const ZERO_ANGLE_DEG: f32 = 135.0;
pub const FULL_ANGLE_DEG: f32 = 45.0;
pub const SWEEP_DEG: f32 = 270.0;

/// Detector returning a fixed candidate list in detector input coordinates
pub struct FakeDetector {
    pub candidates: Vec<Candidate>,
}

impl FakeDetector {
    pub fn new(candidates: Vec<Candidate>) -> Self {
        Self { candidates }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Candidates placed so they map back onto `boxes` in a `width` x `height` frame
    pub fn for_frame(width: u32, height: u32, boxes: &[(BoundingBox, f32)]) -> Self {
        Self::new(
            boxes
                .iter()
                .map(|(bbox, score)| candidate_for(width, height, *bbox, *score))
                .collect(),
        )
    }
}

impl DetectionBackend for FakeDetector {
    fn input_size(&self) -> u32 {
        DETECTOR_INPUT
    }

    fn forward(&self, input: &RgbImage) -> Result<Vec<Candidate>> {
        assert_eq!(input.dimensions(), (DETECTOR_INPUT, DETECTOR_INPUT));
        Ok(self.candidates.clone())
    }

    fn name(&self) -> &str {
        "fake-detector"
    }
}

pub struct FailingDetector;

impl DetectionBackend for FailingDetector {
    fn input_size(&self) -> u32 {
        DETECTOR_INPUT
    }

    fn forward(&self, _input: &RgbImage) -> Result<Vec<Candidate>> {
        Err(GaugeError::Inference("detector blew up".to_string()))
    }

    fn name(&self) -> &str {
        "failing-detector"
    }
}

/// What the scripted pose backend answers for one region
#[derive(Debug, Clone, Copy)]
pub enum PoseScript {
    /// Keypoints whose pointer sits at this fill ratio
    Ratio(f32),
    NoPose,
    NonFinite,
    Fail,
    /// The backend panics mid-inference
    Panic,
}

/// Pose backend answering regions in call order, cycling through its script
pub struct ScriptedPose {
    script: Vec<PoseScript>,
    calls: AtomicUsize,
}

impl ScriptedPose {
    pub fn new(script: Vec<PoseScript>) -> Self {
        assert!(!script.is_empty(), "script needs at least one entry");
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn ratio(ratio: f32) -> Self {
        Self::new(vec![PoseScript::Ratio(ratio)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl KeypointBackend for ScriptedPose {
    fn estimate(&self, region: &RgbImage) -> Result<Option<KeypointSet>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script[call % self.script.len()] {
            PoseScript::Ratio(ratio) => Ok(Some(gauge_keypoints(ratio, region.width(), region.height()))),
            PoseScript::NoPose => Ok(None),
            PoseScript::NonFinite => {
                let mut keypoints = gauge_keypoints(0.5, region.width(), region.height());
                keypoints.points[3].x = f32::NAN;
                Ok(Some(keypoints))
            }
            PoseScript::Fail => Err(GaugeError::Inference("pose model blew up".to_string())),
            PoseScript::Panic => panic!("pose model crashed"),
        }
    }

    fn name(&self) -> &str {
        "scripted-pose"
    }
}

/// Keypoints for a region, laid out as zero mark, full-scale mark, pivot, tip.
///
/// Angles are in degrees, clockwise on screen from the +x axis.
pub fn keypoints_at_angles(zero_deg: f32, full_deg: f32, tip_deg: f32, width: u32, height: u32) -> KeypointSet {
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let radius = width.min(height) as f32 / 3.0;
    let at = |deg: f32| {
        let rad = deg.to_radians();
        Keypoint::new(cx + radius * rad.cos(), cy + radius * rad.sin(), 0.9)
    };

    KeypointSet::new(vec![at(zero_deg), at(full_deg), Keypoint::new(cx, cy, 0.9), at(tip_deg)])
}

/// Keypoints of a standard 270 degree gauge reading `ratio`
pub fn gauge_keypoints(ratio: f32, width: u32, height: u32) -> KeypointSet {
    keypoints_at_angles(
        ZERO_ANGLE_DEG,
        FULL_ANGLE_DEG,
        ZERO_ANGLE_DEG + ratio * SWEEP_DEG,
        width,
        height,
    )
}

pub fn default_layout() -> KeypointLayout {
    KeypointLayout::default()
}

/// Detector-space candidate that maps back onto `bbox` in the frame
pub fn candidate_for(width: u32, height: u32, bbox: BoundingBox, score: f32) -> Candidate {
    let roi = EffectiveRoi::for_source(width, height, DETECTOR_INPUT);
    Candidate {
        bbox: roi.to_input_box(&bbox),
        score,
        class_id: 0,
    }
}

/// A frame with a smooth gradient so crops are distinguishable
pub fn test_image(width: u32, height: u32) -> RgbImage {
    ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

pub fn test_frame(width: u32, height: u32) -> Frame {
    Frame::new(test_image(width, height))
}

pub fn reader_with(detector: impl DetectionBackend + 'static, pose: impl KeypointBackend + 'static) -> GaugeReader {
    GaugeReader::new(
        ModelBundle::new(Arc::new(detector), Arc::new(pose)),
        &GaugeConfig::default(),
    )
}

/// Reader seeing one gauge at `bbox` on a 640x480 frame, read at `ratio`
pub fn single_gauge_reader(bbox: BoundingBox, ratio: f32) -> GaugeReader {
    reader_with(
        FakeDetector::for_frame(640, 480, &[(bbox, 0.9)]),
        ScriptedPose::ratio(ratio),
    )
}

/// Box used by most single-gauge tests
pub fn gauge_box() -> BoundingBox {
    BoundingBox::new(100.0, 100.0, 200.0, 150.0)
}

pub fn encode_png(image: &RgbImage) -> Vec<u8> {
    let mut buf = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .expect("Failed to encode test image");
    buf
}

/// Writes a JPEG test image into `dir` and returns its path
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    test_image(width, height)
        .save_with_format(&path, image::ImageFormat::Jpeg)
        .expect("Failed to save test image");
    path
}

pub fn assert_close(actual: f32, expected: f32, tolerance: f32) {
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {} within {} of {}",
        actual,
        tolerance,
        expected
    );
}
