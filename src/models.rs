use crate::error::{GaugeError, Result};
use image::{DynamicImage, RgbImage};

/// Axis-aligned rectangle, in whichever coordinate space its owner documents
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Build from corner coordinates
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }

    /// Intersection over union; zero for disjoint or zero-area boxes
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        if self.area() <= 0.0 || other.area() <= 0.0 {
            return 0.0;
        }

        let ix = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }

    /// `[x, y, width, height]`, the order used by the HTTP API
    pub fn to_array(&self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// A photograph entering the pipeline
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self::new(image.to_rgb8())
    }

    /// Decode an encoded image (JPEG, PNG, ...) held in memory
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(bytes)?;
        let frame = Self::from_dynamic(image);
        if frame.is_empty() {
            return Err(GaugeError::EmptyFrame);
        }
        Ok(frame)
    }

    /// Open and decode an image file
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let image = image::ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let frame = Self::from_dynamic(image);
        if frame.is_empty() {
            return Err(GaugeError::EmptyFrame);
        }
        Ok(frame)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

/// One detector candidate that survived thresholding and NMS
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectedObject {
    pub bbox: BoundingBox,
    pub score: f32,
    pub class_id: usize,
}

/// Letterbox mapping between the detector's square input and the frame.
///
/// A frame point `(x, y)` lands at `(x * scale_x + pad_x, y * scale_y + pad_y)`
/// in detector space. The per-axis scales are taken from the rounded content
/// size the source is actually resized to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveRoi {
    pub input_size: u32,
    pub pad_x: u32,
    pub pad_y: u32,
    pub content_width: u32,
    pub content_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl EffectiveRoi {
    /// Compute the letterbox geometry for a `width` x `height` source
    pub fn for_source(width: u32, height: u32, input_size: u32) -> Self {
        let scale = (input_size as f32 / width as f32).min(input_size as f32 / height as f32);
        let content_width = ((width as f32 * scale).round() as u32).clamp(1, input_size);
        let content_height = ((height as f32 * scale).round() as u32).clamp(1, input_size);

        Self {
            input_size,
            pad_x: (input_size - content_width) / 2,
            pad_y: (input_size - content_height) / 2,
            content_width,
            content_height,
            scale_x: content_width as f32 / width as f32,
            scale_y: content_height as f32 / height as f32,
        }
    }

    pub fn to_frame_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale_x,
            (y - self.pad_y as f32) / self.scale_y,
        )
    }

    pub fn to_input_point(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.pad_x as f32,
            y * self.scale_y + self.pad_y as f32,
        )
    }

    /// Detector-space box to frame space (no clamping)
    pub fn to_frame_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let (x, y) = self.to_frame_point(bbox.x, bbox.y);
        BoundingBox::new(x, y, bbox.width / self.scale_x, bbox.height / self.scale_y)
    }

    /// Frame-space box to detector space
    pub fn to_input_box(&self, bbox: &BoundingBox) -> BoundingBox {
        let (x, y) = self.to_input_point(bbox.x, bbox.y);
        BoundingBox::new(x, y, bbox.width * self.scale_x, bbox.height * self.scale_y)
    }
}

/// Detector output together with the letterbox it was produced under
#[derive(Debug, Clone)]
pub struct Detections {
    pub objects: Vec<DetectedObject>,
    pub roi: EffectiveRoi,
}

/// Crop of the frame for one validated object
#[derive(Debug, Clone)]
pub struct RegionImage {
    /// Position of the source object in the detection list
    pub object_index: usize,
    pub object: DetectedObject,
    /// Top-left corner of the crop in frame pixels
    pub origin: (u32, u32),
    pub image: RgbImage,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub confidence: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32, confidence: f32) -> Self {
        Self { x, y, confidence }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.confidence.is_finite()
    }
}

/// Ordered keypoints for one region, in region pixel coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct KeypointSet {
    pub points: Vec<Keypoint>,
}

impl KeypointSet {
    pub fn new(points: Vec<Keypoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Keypoint> {
        self.points.get(index)
    }

    /// Shift every point by a region origin to get frame coordinates
    pub fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| Keypoint::new(p.x + dx, p.y + dy, p.confidence))
                .collect(),
        }
    }
}

/// Calibrated reading for one gauge
#[derive(Debug, Clone, PartialEq)]
pub struct ScaleReading {
    pub object_index: usize,
    pub object: DetectedObject,
    pub keypoints: KeypointSet,
    /// Region origin in frame pixels, for drawing keypoints
    pub origin: (u32, u32),
    /// Normalized pointer position in [0, 1]
    pub ratio: f32,
    /// Physical value after calibration
    pub value: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// At least one gauge was read
    Readings(Vec<ScaleReading>),
    /// Nothing detected, or no detection passed ROI validation
    NoObjects,
    /// Gauges were found but none produced usable keypoints
    NoReadings,
}

/// Everything one pipeline invocation produced
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    /// Detections in frame coordinates
    pub detected: Vec<DetectedObject>,
    /// How many detections passed ROI validation
    pub validated: usize,
    pub outcome: PipelineOutcome,
}

impl PipelineResult {
    pub fn no_objects(detected: Vec<DetectedObject>) -> Self {
        Self {
            detected,
            validated: 0,
            outcome: PipelineOutcome::NoObjects,
        }
    }

    pub fn readings(&self) -> &[ScaleReading] {
        match &self.outcome {
            PipelineOutcome::Readings(readings) => readings,
            _ => &[],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.readings().is_empty()
    }
}
