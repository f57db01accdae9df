//! Volume resampling onto a new voxel grid.
//!
//! Output grids always start at the physical origin and share the input's direction
//! cosines, so a resample reduces to a per-axis scaling of continuous indices:
//! output voxel `i` reads the input at `i * out_spacing / in_spacing`.
use ndarray::Array3;
use tracing::debug;

use crate::core::processing::interpolate::{
    bspline_coefficients, cubic_taps, evaluate_cubic, nearest_taps,
};
use crate::core::volume::{Geometry, Volume, validate_shape, validate_spacing};
use crate::error::Result;
use crate::types::Interpolation;

/// Target voxel grid: exact voxel counts and the spacing between them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub shape: [usize; 3],
    pub spacing: [f64; 3],
}

impl Grid {
    pub fn new(shape: [usize; 3], spacing: [f64; 3]) -> Result<Self> {
        validate_shape(shape)?;
        validate_spacing(spacing)?;
        Ok(Self { shape, spacing })
    }

    /// Grid covering `volume` at `target_spacing`. Counts are rounded half-to-even.
    pub fn for_spacing(volume: &Volume, target_spacing: [f64; 3]) -> Result<Self> {
        validate_spacing(target_spacing)?;
        let shape = volume.shape();
        let spacing = volume.spacing();
        let out_shape = std::array::from_fn(|a| {
            (shape[a] as f64 * (spacing[a] / target_spacing[a])).round_ties_even() as usize
        });
        Self::new(out_shape, target_spacing)
    }

    /// Grid of exactly `target_shape` voxels covering the same physical extent as `volume`.
    pub fn for_shape(volume: &Volume, target_shape: [usize; 3]) -> Result<Self> {
        validate_shape(target_shape)?;
        let shape = volume.shape();
        let spacing = volume.spacing();
        let out_spacing =
            std::array::from_fn(|a| shape[a] as f64 * (spacing[a] / target_shape[a] as f64));
        Self::new(target_shape, out_spacing)
    }
}

/// Resampling capability. Implementations may be backed by any numerical library
/// as long as they honor the grid contract described in the module docs.
pub trait Resample: Send + Sync {
    fn resample(
        &self,
        volume: &Volume,
        grid: &Grid,
        interpolation: Interpolation,
        fill_value: f32,
    ) -> Result<Volume>;
}

/// Built-in nearest-neighbor and cubic B-spline resampler.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeResampler;

impl Resample for NativeResampler {
    fn resample(
        &self,
        volume: &Volume,
        grid: &Grid,
        interpolation: Interpolation,
        fill_value: f32,
    ) -> Result<Volume> {
        validate_shape(grid.shape)?;
        validate_spacing(grid.spacing)?;

        let in_shape = volume.shape();
        let in_spacing = volume.spacing();
        let scale: [f64; 3] = std::array::from_fn(|a| grid.spacing[a] / in_spacing[a]);
        let [gx, gy, gz] = grid.shape;

        let data = match interpolation {
            Interpolation::Nearest => {
                let tx = nearest_taps(gx, scale[0], in_shape[0]);
                let ty = nearest_taps(gy, scale[1], in_shape[1]);
                let tz = nearest_taps(gz, scale[2], in_shape[2]);
                let src = volume.data();
                Array3::from_shape_fn((gx, gy, gz), |(x, y, z)| match (tx[x], ty[y], tz[z]) {
                    (Some(i), Some(j), Some(k)) => src[[i, j, k]],
                    _ => fill_value,
                })
            }
            Interpolation::BSpline => {
                let coeffs = bspline_coefficients(volume.data());
                let tx = cubic_taps(gx, scale[0], in_shape[0]);
                let ty = cubic_taps(gy, scale[1], in_shape[1]);
                let tz = cubic_taps(gz, scale[2], in_shape[2]);
                Array3::from_shape_fn((gx, gy, gz), |(x, y, z)| {
                    match (&tx[x], &ty[y], &tz[z]) {
                        (Some(a), Some(b), Some(c)) => evaluate_cubic(&coeffs, a, b, c) as f32,
                        _ => fill_value,
                    }
                })
            }
        };

        let geometry = Geometry {
            spacing: grid.spacing,
            origin: [0.0; 3],
            direction: volume.direction(),
        };
        Volume::new(data, geometry, volume.kind())
    }
}

/// Resample to `target_spacing`, keeping the physical extent (up to rounding).
/// Labels use nearest-neighbor, images a cubic B-spline. Samples that fall past the
/// input edge receive `fill_value`.
pub fn resample_to_spacing(
    resampler: &dyn Resample,
    volume: &Volume,
    target_spacing: [f64; 3],
    fill_value: f32,
) -> Result<Volume> {
    let grid = Grid::for_spacing(volume, target_spacing)?;
    debug!(
        "Resampling {} {:?} @ {:?} -> {:?} @ {:?}",
        volume.kind(),
        volume.shape(),
        volume.spacing(),
        grid.shape,
        grid.spacing
    );
    resampler.resample(volume, &grid, volume.kind().interpolation(), fill_value)
}

/// Resample onto exactly `target_shape` voxels spanning the input's physical extent.
pub fn resample_to_shape(
    resampler: &dyn Resample,
    volume: &Volume,
    target_shape: [usize; 3],
) -> Result<Volume> {
    let grid = Grid::for_shape(volume, target_shape)?;
    debug!(
        "Resizing {} {:?} -> {:?} @ {:?}",
        volume.kind(),
        volume.shape(),
        grid.shape,
        grid.spacing
    );
    resampler.resample(volume, &grid, volume.kind().interpolation(), 0.0)
}
