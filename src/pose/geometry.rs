use crate::config::KeypointLayout;
use crate::models::{Keypoint, KeypointSet};
use std::f32::consts::TAU;

/// Sweeps below this many radians are treated as a collapsed scale arc
const MIN_SWEEP: f32 = 1e-3;

/// Keypoints closer than this to the pivot carry no direction
const MIN_RADIUS: f32 = 1e-3;

/// Why a keypoint set could not be turned into a fill ratio
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusableReason {
    /// The model found no gauge pose in the region
    NoPose,
    WrongCardinality { expected: usize, got: usize },
    NonFinite,
    LowConfidence,
    /// A landmark sits on the pivot, so its angle is undefined
    CollapsedOnPivot,
    /// Zero mark and full-scale mark point the same way
    DegenerateSweep,
}

impl std::fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnusableReason::NoPose => write!(f, "no pose found"),
            UnusableReason::WrongCardinality { expected, got } => {
                write!(f, "expected {} keypoints, got {}", expected, got)
            }
            UnusableReason::NonFinite => write!(f, "non-finite keypoint"),
            UnusableReason::LowConfidence => write!(f, "keypoint confidence too low"),
            UnusableReason::CollapsedOnPivot => write!(f, "keypoint collapsed onto pivot"),
            UnusableReason::DegenerateSweep => write!(f, "degenerate scale sweep"),
        }
    }
}

/// Angle of `p` around `pivot`, increasing clockwise on screen (y points down)
fn screen_angle(pivot: &Keypoint, p: &Keypoint) -> Option<f32> {
    let (dx, dy) = (p.x - pivot.x, p.y - pivot.y);
    if dx.hypot(dy) < MIN_RADIUS {
        return None;
    }
    Some(dy.atan2(dx))
}

/// Clockwise sweep from angle `from` to angle `to`, in `[0, TAU)`
fn clockwise_sweep(from: f32, to: f32) -> f32 {
    (to - from).rem_euclid(TAU)
}

fn landmark(keypoints: &KeypointSet, index: usize, min_confidence: f32) -> Result<&Keypoint, UnusableReason> {
    let point = keypoints.get(index).ok_or(UnusableReason::WrongCardinality {
        expected: index + 1,
        got: keypoints.len(),
    })?;
    if point.confidence < min_confidence {
        return Err(UnusableReason::LowConfidence);
    }
    Ok(point)
}

/// Position of the pointer tip along the scale arc.
///
/// Angles are taken around the pivot and measured clockwise from the zero
/// mark. The result is the tip's sweep divided by the full-scale sweep,
/// clamped to `[0, 1]`. A tip in the dead zone between the full-scale mark
/// and the zero mark snaps to whichever end is angularly closer.
pub fn fill_ratio(
    keypoints: &KeypointSet,
    layout: &KeypointLayout,
    min_confidence: f32,
) -> Result<f32, UnusableReason> {
    if keypoints.len() != layout.count {
        return Err(UnusableReason::WrongCardinality {
            expected: layout.count,
            got: keypoints.len(),
        });
    }
    if keypoints.points.iter().any(|p| !p.is_finite()) {
        return Err(UnusableReason::NonFinite);
    }

    let point = |index: usize| landmark(keypoints, index, min_confidence);
    let pivot = point(layout.pivot)?;
    let zero = screen_angle(pivot, point(layout.zero)?).ok_or(UnusableReason::CollapsedOnPivot)?;
    let full = screen_angle(pivot, point(layout.full_scale)?).ok_or(UnusableReason::CollapsedOnPivot)?;
    let tip = screen_angle(pivot, point(layout.tip)?).ok_or(UnusableReason::CollapsedOnPivot)?;

    let scale_sweep = clockwise_sweep(zero, full);
    if scale_sweep < MIN_SWEEP || TAU - scale_sweep < MIN_SWEEP {
        return Err(UnusableReason::DegenerateSweep);
    }

    let tip_sweep = clockwise_sweep(zero, tip);
    if tip_sweep <= scale_sweep {
        return Ok((tip_sweep / scale_sweep).clamp(0.0, 1.0));
    }

    // Dead zone: past the full-scale mark, before wrapping back to zero
    let past_full = tip_sweep - scale_sweep;
    let before_zero = TAU - tip_sweep;
    Ok(if before_zero < past_full { 0.0 } else { 1.0 })
}
