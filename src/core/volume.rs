use ndarray::{Array3, s};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::VolumeKind;

pub const IDENTITY_DIRECTION: [[f64; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Physical placement of a voxel grid: spacing per axis, origin of voxel `[0, 0, 0]`
/// and the orientation cosines (rows are axes of the physical frame).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub direction: [[f64; 3]; 3],
}

impl Geometry {
    pub fn new(spacing: [f64; 3], origin: [f64; 3], direction: [[f64; 3]; 3]) -> Result<Self> {
        validate_spacing(spacing)?;
        if direction.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::MissingGeometry(format!(
                "direction cosines are not finite: {:?}",
                direction
            )));
        }
        Ok(Self {
            spacing,
            origin,
            direction,
        })
    }

    /// Axis-aligned geometry at the origin.
    pub fn with_spacing(spacing: [f64; 3]) -> Result<Self> {
        Self::new(spacing, [0.0; 3], IDENTITY_DIRECTION)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            spacing: [1.0; 3],
            origin: [0.0; 3],
            direction: IDENTITY_DIRECTION,
        }
    }
}

pub fn validate_spacing(spacing: [f64; 3]) -> Result<()> {
    if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
        return Err(Error::InvalidSpacing { spacing });
    }
    Ok(())
}

pub fn validate_shape(shape: [usize; 3]) -> Result<()> {
    if shape.contains(&0) {
        return Err(Error::InvalidShape { shape });
    }
    Ok(())
}

/// A single-channel 3-D volume, indexed `[x, y, z]`.
#[derive(Debug, Clone)]
pub struct Volume {
    data: Array3<f32>,
    geometry: Geometry,
    kind: VolumeKind,
}

impl Volume {
    pub fn new(data: Array3<f32>, geometry: Geometry, kind: VolumeKind) -> Result<Self> {
        let (nx, ny, nz) = data.dim();
        validate_shape([nx, ny, nz])?;
        validate_spacing(geometry.spacing)?;
        Ok(Self {
            data,
            geometry,
            kind,
        })
    }

    pub fn image(data: Array3<f32>, spacing: [f64; 3]) -> Result<Self> {
        Self::new(data, Geometry::with_spacing(spacing)?, VolumeKind::Image)
    }

    pub fn label(data: Array3<f32>, spacing: [f64; 3]) -> Result<Self> {
        Self::new(data, Geometry::with_spacing(spacing)?, VolumeKind::Label)
    }

    /// Voxel counts per axis.
    pub fn shape(&self) -> [usize; 3] {
        let (nx, ny, nz) = self.data.dim();
        [nx, ny, nz]
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }

    pub fn origin(&self) -> [f64; 3] {
        self.geometry.origin
    }

    pub fn direction(&self) -> [[f64; 3]; 3] {
        self.geometry.direction
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn kind(&self) -> VolumeKind {
        self.kind
    }

    pub fn is_label(&self) -> bool {
        self.kind.is_label()
    }

    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    pub fn into_data(self) -> Array3<f32> {
        self.data
    }

    /// Physical size covered by the grid along each axis.
    pub fn physical_extent(&self) -> [f64; 3] {
        let shape = self.shape();
        std::array::from_fn(|a| shape[a] as f64 * self.geometry.spacing[a])
    }

    /// Same geometry and kind, new samples.
    pub(crate) fn with_data(&self, data: Array3<f32>) -> Result<Self> {
        Self::new(data, self.geometry, self.kind)
    }

    /// Sub-volume `[start, start + span)` per axis. Geometry is carried over unchanged.
    pub(crate) fn region(&self, bbox: &BoundingBox) -> Result<Self> {
        let end = bbox.end();
        let shape = self.shape();
        if (0..3).any(|a| end[a] > shape[a]) {
            return Err(Error::InvalidCropTarget {
                shape,
                target: bbox.span,
            });
        }
        let view = self.data.slice(s![
            bbox.start[0]..end[0],
            bbox.start[1]..end[1],
            bbox.start[2]..end[2]
        ]);
        self.with_data(view.to_owned())
    }
}

/// Axis-aligned box in a volume's index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub start: [usize; 3],
    pub span: [usize; 3],
}

impl BoundingBox {
    pub fn whole(shape: [usize; 3]) -> Self {
        Self {
            start: [0; 3],
            span: shape,
        }
    }

    /// One past the last index per axis.
    pub fn end(&self) -> [usize; 3] {
        std::array::from_fn(|a| self.start[a] + self.span[a])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_and_unspaced_volumes() {
        let err = Volume::image(Array3::zeros((0, 4, 4)), [1.0; 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidShape { .. }));

        let err = Volume::image(Array3::zeros((4, 4, 4)), [1.0, 0.0, 1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidSpacing { .. }));

        let err = Volume::image(Array3::zeros((4, 4, 4)), [1.0, f64::NAN, 1.0]).unwrap_err();
        assert!(matches!(err, Error::InvalidSpacing { .. }));
    }

    #[test]
    fn region_keeps_geometry() {
        let data = Array3::from_shape_fn((6, 5, 4), |(x, y, z)| (x * 100 + y * 10 + z) as f32);
        let geometry = Geometry::new([0.5, 1.0, 2.0], [3.0, 0.0, 0.0], IDENTITY_DIRECTION).unwrap();
        let vol = Volume::new(data, geometry, VolumeKind::Image).unwrap();

        let sub = vol
            .region(&BoundingBox {
                start: [1, 2, 0],
                span: [3, 2, 4],
            })
            .unwrap();
        assert_eq!(sub.shape(), [3, 2, 4]);
        assert_eq!(sub.geometry(), vol.geometry());
        assert_eq!(sub.data()[[0, 0, 0]], 120.0);
        assert_eq!(sub.data()[[2, 1, 3]], 333.0);
    }

    #[test]
    fn physical_extent_is_count_times_spacing() {
        let vol = Volume::label(Array3::zeros((10, 20, 5)), [0.5, 1.0, 3.0]).unwrap();
        assert_eq!(vol.physical_extent(), [5.0, 20.0, 15.0]);
    }
}
