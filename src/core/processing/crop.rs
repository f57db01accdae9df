//! Cropping volumes down to a shared extent.
//!
//! A dataset is cropped to the per-axis minimum shape of its members. Where the excess
//! is taken from is controlled by a [`CropRatio`] per volume: fixed for the whole dataset,
//! replayed from an earlier [`CropPlan`], or solved adaptively around each mask's
//! foreground.
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::core::processing::foreground::estimate_foreground;
use crate::core::processing::parallel::{Workers, map_parallel};
use crate::core::processing::ratio::{CropRatio, solve_crop_ratio};
use crate::core::processing::threshold::ThresholdEstimator;
use crate::core::volume::{BoundingBox, Volume};
use crate::error::{Error, Result};
use crate::types::{CropDecision, TrespassPolicy};

/// Index window `[start, start + target)` on one axis of length `len`.
pub fn crop_window(len: usize, target: usize, ratio: f64) -> (usize, usize) {
    let excess = len.saturating_sub(target);
    let start = ((excess as f64 * ratio).floor() as usize).min(excess);
    (start, start + target)
}

/// Crop `volume` to exactly `target` voxels per axis. Spacing, origin and direction are
/// carried over unchanged.
pub fn crop_to_extent(volume: &Volume, target: [usize; 3], ratio: CropRatio) -> Result<Volume> {
    let shape = volume.shape();
    if (0..3).any(|a| target[a] == 0 || target[a] > shape[a]) {
        return Err(Error::InvalidCropTarget { shape, target });
    }
    let r = ratio.get();
    let windows: [(usize, usize); 3] =
        std::array::from_fn(|a| crop_window(shape[a], target[a], r[a]));
    volume.region(&BoundingBox {
        start: windows.map(|(start, _)| start),
        span: target,
    })
}

/// Per-axis minimum and maximum shape across `volumes`, or `None` for an empty set.
pub fn shape_extrema(volumes: &[Volume]) -> Option<([usize; 3], [usize; 3])> {
    let first = volumes.first()?.shape();
    Some(volumes.iter().skip(1).fold((first, first), |(lo, hi), v| {
        let s = v.shape();
        (
            std::array::from_fn(|a| lo[a].min(s[a])),
            std::array::from_fn(|a| hi[a].max(s[a])),
        )
    }))
}

/// Crop parameters for one dataset index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlannedCrop {
    /// Shape of the volume the ratio was computed for
    pub extent: [usize; 3],
    pub ratio: CropRatio,
    /// Present when the ratio was solved adaptively.
    pub decisions: Option<[CropDecision; 3]>,
    pub foreground: Option<BoundingBox>,
    pub trespass: [bool; 3],
}

/// Crop parameters for a whole dataset, produced by the mask pass and replayed on the
/// paired images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPlan {
    pub target: [usize; 3],
    pub entries: Vec<PlannedCrop>,
}

impl CropPlan {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn ratios(&self) -> Vec<CropRatio> {
        self.entries.iter().map(|e| e.ratio).collect()
    }

    pub fn trespass_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.trespass.iter().any(|&t| t))
            .count()
    }

    /// Fail unless this plan has one entry per volume and each volume's shape equals
    /// the recorded extent.
    pub fn check_against(&self, volumes: &[Volume]) -> Result<()> {
        if self.len() != volumes.len() {
            return Err(Error::MissingCropRatios {
                expected: volumes.len(),
                found: self.len(),
            });
        }
        for (i, (entry, volume)) in self.entries.iter().zip(volumes).enumerate() {
            if entry.extent != volume.shape() {
                return Err(Error::mismatch(format!(
                    "volume {} has shape {:?} but its crop ratio was computed for {:?}",
                    i,
                    volume.shape(),
                    entry.extent
                )));
            }
        }
        Ok(())
    }
}

/// How `crop_to_common_extent` chooses a ratio per volume.
#[derive(Clone, Copy)]
pub enum CropMode<'a> {
    /// Same ratio for every volume
    Fixed(CropRatio),
    /// Replay a plan from an earlier pass
    Planned(&'a CropPlan),
    /// Solve around each volume's thresholded foreground
    Adaptive {
        estimator: &'a dyn ThresholdEstimator,
        policy: TrespassPolicy,
    },
}

/// Solve an adaptive crop plan for `masks`. Foreground estimation runs on `workers`;
/// the trespass policy is applied afterwards in index order.
pub fn plan_common_crop(
    masks: &[Volume],
    estimator: &dyn ThresholdEstimator,
    policy: TrespassPolicy,
    workers: Workers,
) -> Result<CropPlan> {
    let Some((target, max)) = shape_extrema(masks) else {
        return Ok(CropPlan {
            target: [0; 3],
            entries: Vec::new(),
        });
    };
    info!("Common extent {:?} (largest {:?})", target, max);

    let entries = map_parallel(masks.iter().collect(), workers, |i, mask: &Volume| {
        let fg = estimate_foreground(mask, estimator);
        let solution = solve_crop_ratio(mask.shape(), target, &fg.bbox);
        debug!(
            "Mask {}: foreground {:?}+{:?} ratio {:?} decisions {:?}",
            i,
            fg.bbox.start,
            fg.bbox.span,
            solution.ratio.get(),
            solution.decisions
        );
        Ok(PlannedCrop {
            extent: mask.shape(),
            ratio: solution.ratio,
            decisions: Some(solution.decisions),
            foreground: Some(fg.bbox),
            trespass: solution.trespass,
        })
    })?;

    for (index, entry) in entries.iter().enumerate() {
        let Some(axis) = entry.trespass.iter().position(|&t| t) else {
            continue;
        };
        match policy {
            TrespassPolicy::Warn => warn!(
                "Foreground of mask {} exceeds the common extent {:?} on axis {}; cropping into it",
                index, target, axis
            ),
            TrespassPolicy::Abort => return Err(Error::ForegroundTrespass { index, axis }),
        }
    }

    Ok(CropPlan { target, entries })
}

/// Crop every volume to `plan.target` with its recorded ratio.
pub fn apply_crop_plan(
    volumes: Vec<Volume>,
    plan: &CropPlan,
    workers: Workers,
) -> Result<Vec<Volume>> {
    plan.check_against(&volumes)?;
    map_parallel(volumes, workers, |i, volume| {
        crop_to_extent(&volume, plan.target, plan.entries[i].ratio)
    })
}

/// Crop a dataset to its common extent and return the cropped volumes with the plan
/// that produced them.
pub fn crop_to_common_extent(
    volumes: Vec<Volume>,
    mode: CropMode<'_>,
    workers: Workers,
) -> Result<(Vec<Volume>, CropPlan)> {
    let plan = match mode {
        CropMode::Planned(plan) => plan.clone(),
        CropMode::Fixed(ratio) => CropPlan {
            target: shape_extrema(&volumes).map_or([0; 3], |(min, _)| min),
            entries: volumes
                .iter()
                .map(|v| PlannedCrop {
                    extent: v.shape(),
                    ratio,
                    decisions: None,
                    foreground: None,
                    trespass: [false; 3],
                })
                .collect(),
        },
        CropMode::Adaptive { estimator, policy } => {
            plan_common_crop(&volumes, estimator, policy, workers)?
        }
    };
    let cropped = apply_crop_plan(volumes, &plan, workers)?;
    Ok((cropped, plan))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processing::threshold::OtsuThreshold;
    use ndarray::Array3;
    use std::num::NonZeroUsize;

    fn cube_mask(shape: (usize, usize, usize), fg: [(usize, usize); 3]) -> Volume {
        let data = Array3::from_shape_fn(shape, |(x, y, z)| {
            let inside = (fg[0].0..fg[0].1).contains(&x)
                && (fg[1].0..fg[1].1).contains(&y)
                && (fg[2].0..fg[2].1).contains(&z);
            if inside { 1.0 } else { 0.0 }
        });
        Volume::label(data, [1.0; 3]).unwrap()
    }

    #[test]
    fn symmetric_window_on_even_excess() {
        assert_eq!(crop_window(10, 6, 0.5), (2, 8));
        assert_eq!(crop_window(10, 6, 0.0), (0, 6));
        assert_eq!(crop_window(10, 6, 1.0), (4, 10));
        assert_eq!(crop_window(7, 7, 0.3), (0, 7));
    }

    #[test]
    fn crop_takes_ratio_of_excess_from_start() {
        let data = Array3::from_shape_fn((10, 10, 10), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        let vol = Volume::image(data, [1.0; 3]).unwrap();
        let ratio = CropRatio::new([0.5, 0.0, 0.5]).unwrap();
        let out = crop_to_extent(&vol, [6, 6, 10], ratio).unwrap();
        assert_eq!(out.shape(), [6, 6, 10]);
        assert_eq!(out.data()[[0, 0, 0]], 200.0);
        assert_eq!(out.geometry(), vol.geometry());
    }

    #[test]
    fn crop_rejects_growing_or_empty_targets() {
        let vol = Volume::image(Array3::zeros((4, 4, 4)), [1.0; 3]).unwrap();
        for target in [[5, 4, 4], [4, 0, 4]] {
            assert!(matches!(
                crop_to_extent(&vol, target, CropRatio::SYMMETRIC),
                Err(Error::InvalidCropTarget { .. })
            ));
        }
    }

    #[test]
    fn extrema_span_the_dataset() {
        let vols = vec![
            Volume::label(Array3::zeros((5, 9, 3)), [1.0; 3]).unwrap(),
            Volume::label(Array3::zeros((7, 2, 3)), [1.0; 3]).unwrap(),
        ];
        assert_eq!(shape_extrema(&vols), Some(([5, 2, 3], [7, 9, 3])));
        assert_eq!(shape_extrema(&[]), None);
    }

    #[test]
    fn adaptive_crop_keeps_off_centre_foreground() {
        // foreground hugs the end of x; a symmetric crop to 10 would cut it
        let masks = vec![
            cube_mask((20, 10, 10), [(14, 19), (3, 6), (3, 6)]),
            cube_mask((10, 10, 10), [(2, 5), (2, 5), (2, 5)]),
        ];
        let estimator = OtsuThreshold::default();
        let mode = CropMode::Adaptive {
            estimator: &estimator,
            policy: TrespassPolicy::Abort,
        };
        let workers = Workers::Fixed(NonZeroUsize::new(2).unwrap());
        let (out, plan) = crop_to_common_extent(masks, mode, workers).unwrap();

        assert_eq!(plan.target, [10, 10, 10]);
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.entries[0].decisions.unwrap()[0], CropDecision::ProtectEnd);
        let kept: f32 = out[0].data().sum();
        assert_eq!(kept, 5.0 * 3.0 * 3.0);
        assert!(out.iter().all(|v| v.shape() == [10, 10, 10]));
    }

    #[test]
    fn abort_policy_rejects_trespass() {
        let masks = vec![
            cube_mask((12, 4, 4), [(1, 11), (0, 4), (0, 4)]),
            cube_mask((6, 4, 4), [(2, 4), (1, 3), (1, 3)]),
        ];
        let estimator = OtsuThreshold::default();
        let err = plan_common_crop(&masks, &estimator, TrespassPolicy::Abort, Workers::Sequential)
            .unwrap_err();
        assert!(matches!(err, Error::ForegroundTrespass { index: 0, axis: 0 }));

        let plan = plan_common_crop(&masks, &estimator, TrespassPolicy::Warn, Workers::Sequential)
            .unwrap();
        assert_eq!(plan.trespass_count(), 1);
    }

    #[test]
    fn fixed_mode_applies_one_ratio_to_every_volume() {
        let coded = |shape: (usize, usize, usize)| {
            let data = Array3::from_shape_fn(shape, |(x, y, z)| (x * 100 + y * 10 + z) as f32);
            Volume::image(data, [1.0; 3]).unwrap()
        };
        let ratio = CropRatio::new([0.0, 0.5, 1.0]).unwrap();
        let (out, plan) = crop_to_common_extent(
            vec![coded((12, 10, 6)), coded((8, 6, 9))],
            CropMode::Fixed(ratio),
            Workers::All,
        )
        .unwrap();

        assert_eq!(plan.target, [8, 6, 6]);
        assert_eq!(plan.entries[0].extent, [12, 10, 6]);
        assert_eq!(plan.entries[1].extent, [8, 6, 9]);
        assert!(plan.entries.iter().all(|e| e.ratio == ratio && e.decisions.is_none()));
        assert_eq!(plan.trespass_count(), 0);

        // excess (4, 4, 0): nothing off the x start, half of y, all of z
        assert!(out.iter().all(|v| v.shape() == [8, 6, 6]));
        assert_eq!(out[0].data()[[0, 0, 0]], 20.0);
        assert_eq!(out[0].data()[[7, 5, 5]], 775.0);
        // excess (0, 0, 3): the whole z excess comes off the start
        assert_eq!(out[1].data()[[0, 0, 0]], 3.0);
        assert_eq!(out[1].data()[[7, 5, 5]], 758.0);
    }

    #[test]
    fn planned_mode_checks_extents() {
        let plan = CropPlan {
            target: [4, 4, 4],
            entries: vec![PlannedCrop {
                extent: [6, 6, 6],
                ratio: CropRatio::SYMMETRIC,
                decisions: None,
                foreground: None,
                trespass: [false; 3],
            }],
        };
        let good = vec![Volume::image(Array3::zeros((6, 6, 6)), [1.0; 3]).unwrap()];
        let (out, _) =
            crop_to_common_extent(good, CropMode::Planned(&plan), Workers::Sequential).unwrap();
        assert_eq!(out[0].shape(), [4, 4, 4]);

        let wrong_shape = vec![Volume::image(Array3::zeros((6, 5, 6)), [1.0; 3]).unwrap()];
        assert!(matches!(
            apply_crop_plan(wrong_shape, &plan, Workers::Sequential),
            Err(Error::DatasetMismatch(_))
        ));

        let too_many = vec![
            Volume::image(Array3::zeros((6, 6, 6)), [1.0; 3]).unwrap(),
            Volume::image(Array3::zeros((6, 6, 6)), [1.0; 3]).unwrap(),
        ];
        assert!(matches!(
            apply_crop_plan(too_many, &plan, Workers::Sequential),
            Err(Error::MissingCropRatios {
                expected: 2,
                found: 1
            })
        ));
    }
}
