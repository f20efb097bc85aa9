use super::backend::{Candidate, DetectionBackend};
use super::preprocessing::{self, Normalization};
use crate::config::DetectorConfig;
use crate::error::{GaugeError, Result};
use crate::models::BoundingBox;
use image::RgbImage;
use rten::Model;
use rten_tensor::NdTensor;
use rten_tensor::prelude::*;
use std::path::Path;

/// NanoDet-Plus detector running on `rten`.
///
/// The exported head emits `[1, points, classes + 4 * (reg_max + 1)]`:
/// per-class scores (already sigmoid) followed by a discrete distribution
/// over distances for each box side.
pub struct NanoDetBackend {
    model: Model,
    head: NanoDetHead,
}

impl NanoDetBackend {
    pub fn load(path: &Path, config: &DetectorConfig) -> Result<Self> {
        let model = Model::load_file(path).map_err(|e| GaugeError::ModelLoad {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Ok(Self {
            model,
            head: NanoDetHead::from_config(config),
        })
    }
}

/// Decoder for the NanoDet-Plus head output
#[derive(Debug, Clone)]
pub struct NanoDetHead {
    pub input_size: u32,
    pub num_classes: usize,
    pub reg_max: usize,
    pub strides: Vec<u32>,
}

impl NanoDetHead {
    pub fn from_config(config: &DetectorConfig) -> Self {
        Self {
            input_size: config.input_size,
            num_classes: config.num_classes,
            reg_max: config.reg_max,
            strides: config.strides.clone(),
        }
    }

    /// Centre priors for every feature map cell, in head output order
    pub fn priors(&self) -> Vec<(f32, f32, f32)> {
        let mut priors = Vec::new();
        for &stride in &self.strides {
            let cells = self.input_size.div_ceil(stride);
            for y in 0..cells {
                for x in 0..cells {
                    priors.push(((x * stride) as f32, (y * stride) as f32, stride as f32));
                }
            }
        }
        priors
    }

    pub fn decode(&self, output: &NdTensor<f32, 3>) -> Result<Vec<Candidate>> {
        let [batch, points, features] = output.shape();
        let bins = self.reg_max + 1;
        let expected = self.num_classes + 4 * bins;
        let priors = self.priors();

        if batch != 1 || features != expected || points != priors.len() {
            return Err(GaugeError::Shape {
                expected: format!("[1, {}, {}]", priors.len(), expected),
                got: format!("{:?}", [batch, points, features]),
            });
        }

        let mut candidates = Vec::new();
        for (i, &(cx, cy, stride)) in priors.iter().enumerate() {
            let (class_id, score) = (0..self.num_classes)
                .map(|c| (c, output[[0, i, c]]))
                .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

            // Distances to left, top, right, bottom
            let mut dist = [0.0f32; 4];
            for (side, d) in dist.iter_mut().enumerate() {
                let base = self.num_classes + side * bins;
                let logits: Vec<f32> = (0..bins).map(|b| output[[0, i, base + b]]).collect();
                *d = expected_bin(&logits) * stride;
            }

            let size = self.input_size as f32;
            let x1 = (cx - dist[0]).max(0.0);
            let y1 = (cy - dist[1]).max(0.0);
            let x2 = (cx + dist[2]).min(size);
            let y2 = (cy + dist[3]).min(size);

            candidates.push(Candidate {
                bbox: BoundingBox::from_corners(x1, y1, x2, y2),
                score,
                class_id,
            });
        }

        Ok(candidates)
    }
}

/// Softmax expectation over distribution bins
fn expected_bin(logits: &[f32]) -> f32 {
    let max = logits.iter().copied().fold(f32::MIN, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().enumerate().map(|(i, e)| i as f32 * e).sum::<f32>() / sum
}

impl DetectionBackend for NanoDetBackend {
    fn input_size(&self) -> u32 {
        self.head.input_size
    }

    fn forward(&self, input: &RgbImage) -> Result<Vec<Candidate>> {
        let tensor = preprocessing::to_nchw(input, Normalization::NANODET);
        let output: NdTensor<f32, 3> = self
            .model
            .run_one(tensor.view().into(), None)
            .map_err(GaugeError::inference)?
            .try_into()
            .map_err(GaugeError::inference)?;

        self.head.decode(&output)
    }

    fn name(&self) -> &str {
        "nanodet-plus"
    }
}
