use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::processing::threshold::ThresholdEstimator;
use crate::core::volume::{BoundingBox, Volume};

/// Bounding box of a volume's thresholded foreground.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForegroundBox {
    pub bbox: BoundingBox,
    pub threshold: Option<f32>,
    /// No threshold could be found or nothing lay above it; `bbox` covers the whole volume.
    pub degenerate: bool,
}

/// Threshold `volume` with `estimator` and take the tightest box around voxels above
/// the threshold. Falls back to the whole volume when the foreground is empty.
pub fn estimate_foreground(volume: &Volume, estimator: &dyn ThresholdEstimator) -> ForegroundBox {
    let shape = volume.shape();
    let threshold = estimator.estimate_threshold(volume);

    let bounds = threshold.and_then(|t| {
        let mut lo = shape;
        let mut hi = [0usize; 3];
        let mut any = false;
        for ((x, y, z), &v) in volume.data().indexed_iter() {
            if v > t {
                any = true;
                for (a, i) in [x, y, z].into_iter().enumerate() {
                    lo[a] = lo[a].min(i);
                    hi[a] = hi[a].max(i);
                }
            }
        }
        any.then(|| BoundingBox {
            start: lo,
            span: std::array::from_fn(|a| hi[a] - lo[a] + 1),
        })
    });

    match bounds {
        Some(bbox) => ForegroundBox {
            bbox,
            threshold,
            degenerate: false,
        },
        None => {
            warn!(
                "No foreground found in {} of shape {:?}; using the whole volume",
                volume.kind(),
                shape
            );
            ForegroundBox {
                bbox: BoundingBox::whole(shape),
                threshold,
                degenerate: true,
            }
        }
    }
}
