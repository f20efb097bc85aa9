use crate::config::CalibrationConfig;

/// Turns a fill ratio into a calibrated physical reading.
///
/// The correction is piecewise: values at or below `branch_threshold` get
/// `low_offset`, values above it get `high_offset`. The step at the threshold
/// is intentional and must not be smoothed.
#[derive(Debug, Clone)]
pub struct ScaleCalculator {
    pub full_scale: f32,
    pub branch_threshold: f32,
    pub low_offset: f32,
    pub high_offset: f32,
    pub precision: usize,
    pub unit: String,
}

impl Default for ScaleCalculator {
    fn default() -> Self {
        Self::from_config(&CalibrationConfig::default())
    }
}

impl ScaleCalculator {
    pub fn from_config(config: &CalibrationConfig) -> Self {
        Self {
            full_scale: config.full_scale,
            branch_threshold: config.branch_threshold,
            low_offset: config.low_offset,
            high_offset: config.high_offset,
            precision: config.precision,
            unit: config.unit.clone(),
        }
    }

    /// Ratio in physical units, before correction
    pub fn to_physical(&self, ratio: f32) -> f32 {
        ratio * self.full_scale
    }

    /// Additive bias correction for a physical value
    pub fn offset_for(&self, physical: f32) -> f32 {
        if physical <= self.branch_threshold {
            self.low_offset
        } else {
            self.high_offset
        }
    }

    pub fn calibrate(&self, ratio: f32) -> f32 {
        let physical = self.to_physical(ratio);
        physical + self.offset_for(physical)
    }

    /// Fixed-precision text of an already calibrated value
    pub fn format_value(&self, value: f32) -> String {
        format!("{:.*}", self.precision, value)
    }

    /// One CLI report line, e.g. `scale_value: 0.312 Mpa`
    pub fn report_line(&self, value: f32) -> String {
        format!("scale_value: {} {}", self.format_value(value), self.unit)
    }
}
