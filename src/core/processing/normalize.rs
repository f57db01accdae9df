use tracing::debug;

use crate::core::volume::Volume;
use crate::error::Result;

/// Min-max scale an image into `[0, 1]`. Uniform images map to zeros; label masks are
/// returned unchanged.
pub fn normalize_intensity(volume: &Volume) -> Result<Volume> {
    if volume.is_label() {
        return Ok(volume.clone());
    }
    let (min, max) = volume
        .data()
        .iter()
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min;
    debug!("Normalizing intensities from [{}, {}]", min, max);
    if !(range.is_finite() && range > 0.0) {
        return volume.with_data(volume.data().mapv(|_| 0.0));
    }
    volume.with_data(volume.data().mapv(|v| ((v - min) / range).clamp(0.0, 1.0)))
}
