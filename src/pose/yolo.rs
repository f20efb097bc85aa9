use crate::config::PoseConfig;
use crate::detection::backend::KeypointBackend;
use crate::detection::preprocessing::{self, Normalization, POSE_PAD};
use crate::error::{GaugeError, Result};
use crate::models::{EffectiveRoi, Keypoint, KeypointSet};
use image::RgbImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

/// Single-class YOLOv8-pose model running on `rten`.
///
/// Output layout is `[1, 5 + 3 * K, N]`: box centre/size, score, then
/// `(x, y, visibility)` for each of the `K` keypoints.
pub struct YoloPoseBackend {
    model: Model,
    input_size: u32,
    head: PoseHead,
}

impl YoloPoseBackend {
    pub fn load(path: &Path, config: &PoseConfig) -> Result<Self> {
        let model = Model::load_file(path).map_err(|e| GaugeError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            model,
            input_size: config.input_size,
            head: PoseHead {
                num_keypoints: config.layout.count,
                conf_threshold: config.confidence_threshold,
            },
        })
    }
}

/// Decoder for the YOLOv8-pose output tensor
#[derive(Debug, Clone, Copy)]
pub struct PoseHead {
    pub num_keypoints: usize,
    pub conf_threshold: f32,
}

impl PoseHead {
    /// Pick the best candidate and map its keypoints back into the region
    pub fn decode(&self, output: &NdTensor<f32, 3>, roi: &EffectiveRoi) -> Result<Option<KeypointSet>> {
        let [batch, features, n] = output.shape();
        let expected = 5 + 3 * self.num_keypoints;

        if batch != 1 || features != expected {
            return Err(GaugeError::Shape {
                expected: format!("[1, {}, N]", expected),
                got: format!("{:?}", [batch, features, n]),
            });
        }

        let best = (0..n)
            .map(|i| (i, output[[0, 4, i]]))
            .filter(|&(_, score)| score >= self.conf_threshold)
            .max_by(|a, b| a.1.total_cmp(&b.1));

        let Some((i, _)) = best else {
            return Ok(None);
        };

        let points = (0..self.num_keypoints)
            .map(|k| {
                let base = 5 + k * 3;
                let (x, y) = roi.to_frame_point(output[[0, base, i]], output[[0, base + 1, i]]);
                Keypoint::new(x, y, output[[0, base + 2, i]])
            })
            .collect();

        Ok(Some(KeypointSet::new(points)))
    }
}

impl KeypointBackend for YoloPoseBackend {
    fn estimate(&self, region: &RgbImage) -> Result<Option<KeypointSet>> {
        let (input, roi) = preprocessing::letterbox(region, self.input_size, POSE_PAD);
        let tensor = preprocessing::to_nchw(&input, Normalization::UNIT);

        let output: NdTensor<f32, 3> = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(GaugeError::inference)?
            .try_into()
            .map_err(GaugeError::inference)?;

        self.head.decode(&output, &roi)
    }

    fn name(&self) -> &str {
        "yolov8-pose"
    }
}
