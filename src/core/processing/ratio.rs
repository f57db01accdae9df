//! Adaptive crop ratios: decide, per axis, how much of the excess extent to take from
//! each side so the foreground bounding box survives the crop whenever it can.
use serde::{Deserialize, Serialize};

use crate::core::volume::BoundingBox;
use crate::error::{Error, Result};
use crate::types::CropDecision;

/// Fraction of the excess removed from the start side of each axis; the remainder
/// comes off the end side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 3]", into = "[f64; 3]")]
pub struct CropRatio([f64; 3]);

impl CropRatio {
    pub const SYMMETRIC: CropRatio = CropRatio([0.5; 3]);

    pub fn new(ratio: [f64; 3]) -> Result<Self> {
        if ratio.iter().any(|r| !(0.0..=1.0).contains(r)) {
            return Err(Error::InvalidCropRatio { ratio });
        }
        Ok(Self(ratio))
    }

    pub fn get(&self) -> [f64; 3] {
        self.0
    }
}

impl Default for CropRatio {
    fn default() -> Self {
        Self::SYMMETRIC
    }
}

impl TryFrom<[f64; 3]> for CropRatio {
    type Error = Error;

    fn try_from(ratio: [f64; 3]) -> Result<Self> {
        Self::new(ratio)
    }
}

impl From<CropRatio> for [f64; 3] {
    fn from(ratio: CropRatio) -> Self {
        ratio.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSolution {
    pub ratio: f64,
    pub decision: CropDecision,
    /// Cropping to the target extent necessarily cuts into the foreground.
    pub trespass: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropSolution {
    pub ratio: CropRatio,
    pub decisions: [CropDecision; 3],
    pub trespass: [bool; 3],
}

impl CropSolution {
    /// First axis whose foreground does not fit the target extent.
    pub fn trespass_axis(&self) -> Option<usize> {
        self.trespass.iter().position(|&t| t)
    }
}

/// Solve one axis. The side with the larger margin around the foreground gives up
/// more of the excess, in proportion to how lopsided the margins are.
///
/// `fg_start + fg_span` must not exceed `extent`, and `min_extent <= extent`.
pub fn solve_axis(
    extent: usize,
    min_extent: usize,
    fg_start: usize,
    fg_span: usize,
) -> AxisSolution {
    let excess = extent.saturating_sub(min_extent);
    let end_margin = extent.saturating_sub(fg_start + fg_span);
    let trespass = excess > extent.saturating_sub(fg_span);

    if fg_start > end_margin {
        let q = end_margin as f64 / fg_start as f64;
        AxisSolution {
            ratio: (q / 2.0).max(1.0 - q / 2.0),
            decision: CropDecision::ProtectEnd,
            trespass,
        }
    } else {
        // both margins empty: foreground spans the axis, split evenly
        let q = if end_margin == 0 {
            1.0
        } else {
            fg_start as f64 / end_margin as f64
        };
        AxisSolution {
            ratio: (q / 2.0).min(1.0 - q / 2.0),
            decision: CropDecision::ProtectStart,
            trespass,
        }
    }
}

/// Solve all three axes of a volume of `shape` cropped down to `min_shape`.
pub fn solve_crop_ratio(
    shape: [usize; 3],
    min_shape: [usize; 3],
    bbox: &BoundingBox,
) -> CropSolution {
    let axes: [AxisSolution; 3] =
        std::array::from_fn(|a| solve_axis(shape[a], min_shape[a], bbox.start[a], bbox.span[a]));
    CropSolution {
        // q is a ratio of non-negative margins, so every candidate lies in [0, 1]
        ratio: CropRatio(axes.map(|s| s.ratio.clamp(0.0, 1.0))),
        decisions: axes.map(|s| s.decision),
        trespass: axes.map(|s| s.trespass),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn ratio_rejects_out_of_range_components() {
        assert!(CropRatio::new([0.0, 0.5, 1.0]).is_ok());
        assert!(matches!(
            CropRatio::new([0.5, 1.2, 0.5]),
            Err(Error::InvalidCropRatio { .. })
        ));
        assert!(CropRatio::new([f64::NAN, 0.5, 0.5]).is_err());
    }

    #[test]
    fn ratio_deserializes_through_validation() {
        let r: CropRatio = serde_json::from_str("[0.25, 0.5, 1.0]").unwrap();
        assert_eq!(r.get(), [0.25, 0.5, 1.0]);
        assert!(serde_json::from_str::<CropRatio>("[0.25, -0.5, 1.0]").is_err());
    }

    #[test]
    fn foreground_near_start_protects_start() {
        // extent 100, fg [10, 30): start margin 10, end margin 70
        let s = solve_axis(100, 60, 10, 20);
        assert_eq!(s.decision, CropDecision::ProtectStart);
        assert_abs_diff_eq!(s.ratio, (10.0 / 70.0) / 2.0, epsilon = 1e-12);
        assert!(!s.trespass);
    }

    #[test]
    fn foreground_near_end_protects_end() {
        // extent 100, fg [80, 95): start margin 80, end margin 5
        let s = solve_axis(100, 60, 80, 15);
        assert_eq!(s.decision, CropDecision::ProtectEnd);
        assert_abs_diff_eq!(s.ratio, 1.0 - (5.0 / 80.0) / 2.0, epsilon = 1e-12);
    }

    #[test]
    fn centred_foreground_is_symmetric() {
        let s = solve_axis(50, 40, 10, 30);
        assert_eq!(s.decision, CropDecision::ProtectStart);
        assert_abs_diff_eq!(s.ratio, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn full_span_foreground_trespasses_at_half() {
        let s = solve_axis(60, 40, 0, 60);
        assert_abs_diff_eq!(s.ratio, 0.5, epsilon = 1e-12);
        assert!(s.trespass);

        let sol = solve_crop_ratio([60, 40, 40], [40, 40, 40], &BoundingBox::whole([60, 40, 40]));
        assert_eq!(sol.ratio, CropRatio::SYMMETRIC);
        assert_eq!(sol.trespass, [true, false, false]);
        assert_eq!(sol.trespass_axis(), Some(0));
    }

    #[test]
    fn ratios_stay_in_unit_interval() {
        for extent in [1usize, 2, 7, 33] {
            for start in 0..extent {
                for span in 1..=(extent - start) {
                    for min in 1..=extent {
                        let s = solve_axis(extent, min, start, span);
                        assert!((0.0..=1.0).contains(&s.ratio), "{extent} {start} {span} {min}");
                    }
                }
            }
        }
    }
}
