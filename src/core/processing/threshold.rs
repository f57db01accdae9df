//! Automatic intensity thresholds for foreground detection.
use ndarray::Array3;

use crate::core::volume::Volume;

/// Threshold estimation capability: `None` when the volume holds no usable contrast.
pub trait ThresholdEstimator: Send + Sync {
    fn estimate_threshold(&self, volume: &Volume) -> Option<f32>;
}

/// Otsu's method over a fixed-bin histogram.
#[derive(Debug, Clone, Copy)]
pub struct OtsuThreshold {
    pub bins: usize,
}

impl Default for OtsuThreshold {
    fn default() -> Self {
        Self { bins: 128 }
    }
}

impl ThresholdEstimator for OtsuThreshold {
    fn estimate_threshold(&self, volume: &Volume) -> Option<f32> {
        otsu_threshold(volume.data(), self.bins)
    }
}

/// Histogram `data` into `bins` bins over its finite range and return the upper edge
/// of the bin that maximizes between-class variance. Voxels strictly above the returned
/// value form the foreground class.
pub fn otsu_threshold(data: &Array3<f32>, bins: usize) -> Option<f32> {
    let bins = bins.max(2);
    let (min, max) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !(min.is_finite() && max.is_finite()) || max <= min {
        return None;
    }

    let width = (max as f64 - min as f64) / bins as f64;
    let mut hist = vec![0u64; bins];
    for &v in data.iter().filter(|v| v.is_finite()) {
        let b = (((v as f64 - min as f64) / width) as usize).min(bins - 1);
        hist[b] += 1;
    }

    let centre = |b: usize| min as f64 + (b as f64 + 0.5) * width;
    let total: u64 = hist.iter().sum();
    let total_mass: f64 = hist
        .iter()
        .enumerate()
        .map(|(b, &n)| n as f64 * centre(b))
        .sum();

    let mut best: Option<(usize, f64)> = None;
    let mut count_lo = 0u64;
    let mut mass_lo = 0.0;
    for (b, &n) in hist.iter().enumerate().take(bins - 1) {
        count_lo += n;
        mass_lo += n as f64 * centre(b);
        let count_hi = total - count_lo;
        if count_lo == 0 || count_hi == 0 {
            continue;
        }
        let w0 = count_lo as f64 / total as f64;
        let w1 = count_hi as f64 / total as f64;
        let m0 = mass_lo / count_lo as f64;
        let m1 = (total_mass - mass_lo) / count_hi as f64;
        let variance = w0 * w1 * (m0 - m1) * (m0 - m1);
        if best.is_none_or(|(_, v)| variance > v) {
            best = Some((b, variance));
        }
    }

    best.map(|(b, _)| (min as f64 + (b + 1) as f64 * width) as f32)
}
