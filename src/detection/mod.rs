pub mod backend;
pub mod detector;
pub mod nanodet;
pub mod nms;
pub mod preprocessing;
pub mod roi;

pub use backend::{Candidate, DetectionBackend, KeypointBackend, ModelBundle};
pub use detector::{ObjectDetector, map_to_frame_coordinates};
pub use roi::{PixelRect, RoiSelector};
