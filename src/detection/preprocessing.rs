use crate::models::EffectiveRoi;
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use rten_tensor::NdTensor;

/// Padding colour used by the NanoDet reference preprocessing
pub const DETECTOR_PAD: [u8; 3] = [0, 0, 0];

/// Padding colour used by YOLO letterboxing
pub const POSE_PAD: [u8; 3] = [114, 114, 114];

/// Resize `img` into a `size` x `size` canvas keeping its aspect ratio.
///
/// The image is centred and the remaining border filled with `pad`. The
/// returned [`EffectiveRoi`] records the exact mapping used.
pub fn letterbox(img: &RgbImage, size: u32, pad: [u8; 3]) -> (RgbImage, EffectiveRoi) {
    let roi = EffectiveRoi::for_source(img.width(), img.height(), size);

    let resized = if roi.content_width == img.width() && roi.content_height == img.height() {
        img.clone()
    } else {
        imageops::resize(img, roi.content_width, roi.content_height, FilterType::Triangle)
    };

    let mut canvas = RgbImage::from_pixel(size, size, Rgb(pad));
    imageops::overlay(&mut canvas, &resized, roi.pad_x.into(), roi.pad_y.into());

    (canvas, roi)
}

/// Per-channel normalisation applied while packing pixels into a tensor
#[derive(Debug, Clone, Copy)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub scale: [f32; 3],
    /// Emit channels in BGR order instead of RGB
    pub bgr: bool,
}

impl Normalization {
    /// NanoDet-Plus: BGR, mean/std taken from its training pipeline
    pub const NANODET: Self = Self {
        mean: [103.53, 116.28, 123.675],
        scale: [0.017429, 0.017507, 0.017125],
        bgr: true,
    };

    /// YOLO: RGB scaled to [0, 1]
    pub const UNIT: Self = Self {
        mean: [0.0, 0.0, 0.0],
        scale: [1.0 / 255.0, 1.0 / 255.0, 1.0 / 255.0],
        bgr: false,
    };
}

/// Pack an RGB image into a `[1, 3, H, W]` tensor
pub fn to_nchw(img: &RgbImage, norm: Normalization) -> NdTensor<f32, 4> {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let plane = w * h;
    let mut data = vec![0.0f32; 3 * plane];

    for (x, y, pixel) in img.enumerate_pixels() {
        let offset = y as usize * w + x as usize;
        for c in 0..3 {
            // Source channel feeding output channel `c`
            let src = if norm.bgr { 2 - c } else { c };
            data[c * plane + offset] = (pixel[src] as f32 - norm.mean[c]) * norm.scale[c];
        }
    }

    NdTensor::from_data([1, 3, h, w], data)
}
