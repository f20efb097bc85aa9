use crate::models::{DetectedObject, Frame, RegionImage};
use image::imageops;

/// Integer pixel rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Gate between the detector and the pose stage
#[derive(Debug, Clone)]
pub struct RoiSelector {
    /// Smallest width/height a clamped box may keep
    pub min_side: f32,
}

impl Default for RoiSelector {
    fn default() -> Self {
        Self { min_side: 1.0 }
    }
}

impl RoiSelector {
    pub fn new(min_side: f32) -> Self {
        Self {
            min_side: min_side.max(1.0),
        }
    }

    /// Clamp an object's box to the frame, or `None` if nothing usable is left
    pub fn clamp(&self, object: &DetectedObject, width: u32, height: u32) -> Option<PixelRect> {
        let bbox = &object.bbox;
        if !bbox.is_finite() || bbox.width <= 0.0 || bbox.height <= 0.0 {
            return None;
        }

        let x1 = bbox.x.max(0.0).floor();
        let y1 = bbox.y.max(0.0).floor();
        let x2 = bbox.right().min(width as f32).ceil().min(width as f32);
        let y2 = bbox.bottom().min(height as f32).ceil().min(height as f32);

        if x2 - x1 < self.min_side || y2 - y1 < self.min_side {
            return None;
        }

        Some(PixelRect {
            x: x1 as u32,
            y: y1 as u32,
            width: (x2 - x1) as u32,
            height: (y2 - y1) as u32,
        })
    }

    pub fn is_valid(&self, object: &DetectedObject, width: u32, height: u32) -> bool {
        self.clamp(object, width, height).is_some()
    }

    /// True when at least one object can be cropped
    pub fn is_valid_roi(&self, objects: &[DetectedObject], width: u32, height: u32) -> bool {
        objects.iter().any(|o| self.is_valid(o, width, height))
    }

    /// Crop every valid object, keeping detection order
    pub fn extract_regions(&self, frame: &Frame, objects: &[DetectedObject]) -> Vec<RegionImage> {
        let (width, height) = (frame.width(), frame.height());

        objects
            .iter()
            .enumerate()
            .filter_map(|(index, object)| {
                let rect = self.clamp(object, width, height)?;
                let image =
                    imageops::crop_imm(frame.image(), rect.x, rect.y, rect.width, rect.height).to_image();
                Some(RegionImage {
                    object_index: index,
                    object: *object,
                    origin: (rect.x, rect.y),
                    image,
                })
            })
            .collect()
    }
}
