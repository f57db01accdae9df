//! Single-file NIfTI-1 (`.nii`) reader and writer.
//!
//! Volumes are stored x-fastest on disk and held `[x, y, z]` in memory. Geometry comes
//! from the sform when present, then the qform, then bare `pixdim`; written files always
//! carry an sform built from the volume's spacing, origin and direction.
use std::path::Path;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use ndarray::{Array3, ShapeBuilder};
use tracing::debug;

use crate::core::volume::{Geometry, IDENTITY_DIRECTION, Volume};
use crate::error::{Error, Result};
use crate::types::VolumeKind;

const HEADER_SIZE: usize = 348;
/// Header plus the four-byte empty extension block.
const DATA_OFFSET: usize = 352;

mod offsets {
    pub const SIZEOF_HDR: usize = 0;
    pub const DIM: usize = 40;
    pub const DATATYPE: usize = 70;
    pub const BITPIX: usize = 72;
    pub const PIXDIM: usize = 76;
    pub const VOX_OFFSET: usize = 108;
    pub const SCL_SLOPE: usize = 112;
    pub const SCL_INTER: usize = 116;
    pub const XYZT_UNITS: usize = 123;
    pub const QFORM_CODE: usize = 252;
    pub const SFORM_CODE: usize = 254;
    pub const QUATERN_B: usize = 256;
    pub const QOFFSET_X: usize = 268;
    pub const SROW_X: usize = 280;
    pub const SROW_Y: usize = 296;
    pub const SROW_Z: usize = 312;
    pub const MAGIC: usize = 344;
}

/// On-disk sample types this reader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataType {
    U8,
    I16,
    I32,
    F32,
    F64,
    I8,
    U16,
    U32,
}

impl DataType {
    fn from_code(code: i16) -> Result<Self> {
        match code {
            2 => Ok(DataType::U8),
            4 => Ok(DataType::I16),
            8 => Ok(DataType::I32),
            16 => Ok(DataType::F32),
            64 => Ok(DataType::F64),
            256 => Ok(DataType::I8),
            512 => Ok(DataType::U16),
            768 => Ok(DataType::U32),
            other => Err(Error::UnsupportedFormat(format!("NIfTI datatype code {}", other))),
        }
    }

    fn byte_size(self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::I32 | DataType::U32 | DataType::F32 => 4,
            DataType::F64 => 8,
        }
    }
}

fn check_extension(path: &Path) -> Result<()> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if name.ends_with(".nii.gz") {
        return Err(Error::UnsupportedFormat(format!(
            "compressed NIfTI is not supported, decompress {} first",
            path.display()
        )));
    }
    if !name.ends_with(".nii") {
        return Err(Error::UnsupportedFormat(format!(
            "expected a .nii file: {}",
            path.display()
        )));
    }
    Ok(())
}

pub fn read_volume(path: &Path, kind: VolumeKind) -> Result<Volume> {
    check_extension(path)?;
    let bytes = std::fs::read(path)?;
    let volume = decode_volume(&bytes, kind)?;
    debug!(
        "Read {} {:?} @ {:?} from {}",
        kind,
        volume.shape(),
        volume.spacing(),
        path.display()
    );
    Ok(volume)
}

pub fn write_volume(path: &Path, volume: &Volume) -> Result<()> {
    check_extension(path)?;
    std::fs::write(path, encode_volume(volume)?)?;
    debug!("Wrote {} {:?} to {}", volume.kind(), volume.shape(), path.display());
    Ok(())
}

/// Parse an in-memory `.nii` file. Byte order is detected from `sizeof_hdr`.
pub fn decode_volume(bytes: &[u8], kind: VolumeKind) -> Result<Volume> {
    if bytes.len() < HEADER_SIZE {
        return Err(Error::InvalidNifti(format!(
            "file holds {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_SIZE
        )));
    }
    if LittleEndian::read_i32(&bytes[..4]) == HEADER_SIZE as i32 {
        decode::<LittleEndian>(bytes, kind)
    } else if BigEndian::read_i32(&bytes[..4]) == HEADER_SIZE as i32 {
        decode::<BigEndian>(bytes, kind)
    } else {
        Err(Error::InvalidNifti("sizeof_hdr is not 348".to_string()))
    }
}

fn decode<E: ByteOrder>(bytes: &[u8], kind: VolumeKind) -> Result<Volume> {
    use offsets::*;

    match &bytes[MAGIC..MAGIC + 4] {
        b"n+1\0" => {}
        b"ni1\0" => {
            return Err(Error::UnsupportedFormat(
                "detached .hdr/.img NIfTI pairs".to_string(),
            ));
        }
        other => return Err(Error::InvalidNifti(format!("bad magic {:?}", other))),
    }

    let ndim = E::read_i16(&bytes[DIM..DIM + 2]);
    if !(2..=7).contains(&ndim) {
        return Err(Error::InvalidNifti(format!("dim[0] must be 2..=7, got {}", ndim)));
    }
    let ndim = ndim as usize;
    let mut dims = [1usize; 7];
    for (i, d) in dims.iter_mut().enumerate().take(ndim) {
        let offset = DIM + 2 + i * 2;
        let raw = E::read_i16(&bytes[offset..offset + 2]);
        if raw < 1 {
            return Err(Error::InvalidNifti(format!("dim[{}] is {}", i + 1, raw)));
        }
        *d = raw as usize;
    }
    if dims[3..].iter().any(|&d| d != 1) {
        return Err(Error::UnsupportedFormat(format!(
            "only single-channel 3-D volumes are supported, got dims {:?}",
            &dims[..ndim]
        )));
    }
    let [nx, ny, nz] = [dims[0], dims[1], dims[2]];

    let datatype = DataType::from_code(E::read_i16(&bytes[DATATYPE..DATATYPE + 2]))?;
    let bitpix = E::read_i16(&bytes[BITPIX..BITPIX + 2]);
    if bitpix as usize != datatype.byte_size() * 8 {
        return Err(Error::InvalidNifti(format!(
            "bitpix {} does not match datatype {:?}",
            bitpix, datatype
        )));
    }

    let vox_offset = E::read_f32(&bytes[VOX_OFFSET..VOX_OFFSET + 4]);
    if !(vox_offset.is_finite()
        && vox_offset >= HEADER_SIZE as f32
        && vox_offset <= bytes.len() as f32)
    {
        return Err(Error::InvalidNifti(format!(
            "vox_offset {} outside a {}-byte file",
            vox_offset,
            bytes.len()
        )));
    }
    let start = vox_offset as usize;
    let count = nx * ny * nz;
    let end = count
        .checked_mul(datatype.byte_size())
        .and_then(|n| n.checked_add(start))
        .ok_or_else(|| {
            Error::InvalidNifti(format!("data size overflows for dims {:?}", [nx, ny, nz]))
        })?;
    if bytes.len() < end {
        return Err(Error::InvalidNifti(format!(
            "expected {} data bytes after offset {}, file has {}",
            count * datatype.byte_size(),
            start,
            bytes.len().saturating_sub(start)
        )));
    }

    let raw = &bytes[start..end];
    let mut samples: Vec<f32> = match datatype {
        DataType::U8 => raw.iter().map(|&b| b as f32).collect(),
        DataType::I8 => raw.iter().map(|&b| b as i8 as f32).collect(),
        DataType::I16 => raw.chunks_exact(2).map(|c| E::read_i16(c) as f32).collect(),
        DataType::U16 => raw.chunks_exact(2).map(|c| E::read_u16(c) as f32).collect(),
        DataType::I32 => raw.chunks_exact(4).map(|c| E::read_i32(c) as f32).collect(),
        DataType::U32 => raw.chunks_exact(4).map(|c| E::read_u32(c) as f32).collect(),
        DataType::F32 => raw.chunks_exact(4).map(E::read_f32).collect(),
        DataType::F64 => raw.chunks_exact(8).map(|c| E::read_f64(c) as f32).collect(),
    };

    // a zero slope means "no scaling"
    let slope = E::read_f32(&bytes[SCL_SLOPE..SCL_SLOPE + 4]);
    let inter = E::read_f32(&bytes[SCL_INTER..SCL_INTER + 4]);
    if slope.is_finite() && slope != 0.0 && !(slope == 1.0 && inter == 0.0) {
        let inter = if inter.is_finite() { inter } else { 0.0 };
        for v in &mut samples {
            *v = *v * slope + inter;
        }
    }

    let data = Array3::from_shape_vec((nx, ny, nz).f(), samples)
        .map_err(|e| Error::InvalidNifti(e.to_string()))?
        .as_standard_layout()
        .into_owned();

    let geometry = header_geometry::<E>(bytes, ndim)?;
    Volume::new(data, geometry, kind)
}

fn read_f32s<E: ByteOrder, const N: usize>(bytes: &[u8], offset: usize) -> [f64; N] {
    std::array::from_fn(|i| E::read_f32(&bytes[offset + 4 * i..offset + 4 * i + 4]) as f64)
}

fn header_geometry<E: ByteOrder>(bytes: &[u8], ndim: usize) -> Result<Geometry> {
    use offsets::*;

    let pixdim: [f64; 8] = read_f32s::<E, 8>(bytes, PIXDIM);
    let sform_code = E::read_i16(&bytes[SFORM_CODE..SFORM_CODE + 2]);
    let qform_code = E::read_i16(&bytes[QFORM_CODE..QFORM_CODE + 2]);

    let (spacing, origin, direction) = if sform_code > 0 {
        let rows: [[f64; 4]; 3] = [
            read_f32s::<E, 4>(bytes, SROW_X),
            read_f32s::<E, 4>(bytes, SROW_Y),
            read_f32s::<E, 4>(bytes, SROW_Z),
        ];
        let spacing: [f64; 3] = std::array::from_fn(|c| {
            (0..3).map(|r| rows[r][c] * rows[r][c]).sum::<f64>().sqrt()
        });
        let direction = std::array::from_fn(|r| {
            std::array::from_fn(|c| {
                if spacing[c] > 0.0 {
                    rows[r][c] / spacing[c]
                } else {
                    IDENTITY_DIRECTION[r][c]
                }
            })
        });
        (spacing, rows.map(|row| row[3]), direction)
    } else {
        let mut spacing: [f64; 3] = [pixdim[1].abs(), pixdim[2].abs(), pixdim[3].abs()];
        if ndim < 3 && spacing[2] == 0.0 {
            spacing[2] = 1.0;
        }
        if qform_code > 0 {
            let [b, c, d] = read_f32s::<E, 3>(bytes, QUATERN_B);
            let origin = read_f32s::<E, 3>(bytes, QOFFSET_X);
            let qfac = if pixdim[0] < 0.0 { -1.0 } else { 1.0 };
            (spacing, origin, quaternion_direction(b, c, d, qfac))
        } else {
            (spacing, [0.0; 3], IDENTITY_DIRECTION)
        }
    };

    if spacing.iter().any(|&s| !(s.is_finite() && s > 0.0)) {
        return Err(Error::MissingGeometry(format!(
            "voxel spacing {:?} is not usable",
            spacing
        )));
    }
    Geometry::new(spacing, origin, direction)
}

/// Rotation from the qform quaternion; column `c` is the direction of voxel axis `c`.
fn quaternion_direction(b: f64, c: f64, d: f64, qfac: f64) -> [[f64; 3]; 3] {
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    [
        [
            a * a + b * b - c * c - d * d,
            2.0 * (b * c - a * d),
            qfac * 2.0 * (b * d + a * c),
        ],
        [
            2.0 * (b * c + a * d),
            a * a + c * c - b * b - d * d,
            qfac * 2.0 * (c * d - a * b),
        ],
        [
            2.0 * (b * d - a * c),
            2.0 * (c * d + a * b),
            qfac * (a * a + d * d - b * b - c * c),
        ],
    ]
}

/// Serialize as little-endian float32 NIfTI-1 with an sform.
pub fn encode_volume(volume: &Volume) -> Result<Vec<u8>> {
    use offsets::*;
    type E = LittleEndian;

    let [nx, ny, nz] = volume.shape();
    if [nx, ny, nz].iter().any(|&n| n > i16::MAX as usize) {
        return Err(Error::UnsupportedFormat(format!(
            "NIfTI-1 cannot store a volume of shape {:?}",
            volume.shape()
        )));
    }
    let spacing = volume.spacing();
    let origin = volume.origin();
    let direction = volume.direction();
    let mut buf = vec![0u8; DATA_OFFSET + nx * ny * nz * 4];

    E::write_i32(&mut buf[SIZEOF_HDR..SIZEOF_HDR + 4], HEADER_SIZE as i32);
    let dims: [i16; 8] = [3, nx as i16, ny as i16, nz as i16, 1, 1, 1, 1];
    for (i, &d) in dims.iter().enumerate() {
        E::write_i16(&mut buf[DIM + 2 * i..DIM + 2 * i + 2], d);
    }
    E::write_i16(&mut buf[DATATYPE..DATATYPE + 2], 16);
    E::write_i16(&mut buf[BITPIX..BITPIX + 2], 32);

    let pixdim = [1.0, spacing[0], spacing[1], spacing[2], 1.0, 1.0, 1.0, 1.0];
    for (i, &p) in pixdim.iter().enumerate() {
        E::write_f32(&mut buf[PIXDIM + 4 * i..PIXDIM + 4 * i + 4], p as f32);
    }
    E::write_f32(&mut buf[VOX_OFFSET..VOX_OFFSET + 4], DATA_OFFSET as f32);
    E::write_f32(&mut buf[SCL_SLOPE..SCL_SLOPE + 4], 1.0);
    buf[XYZT_UNITS] = 2; // millimetres

    E::write_i16(&mut buf[SFORM_CODE..SFORM_CODE + 2], 1);
    for (r, base) in [SROW_X, SROW_Y, SROW_Z].into_iter().enumerate() {
        let row = [
            direction[r][0] * spacing[0],
            direction[r][1] * spacing[1],
            direction[r][2] * spacing[2],
            origin[r],
        ];
        for (i, &v) in row.iter().enumerate() {
            E::write_f32(&mut buf[base + 4 * i..base + 4 * i + 4], v as f32);
        }
    }
    buf[MAGIC..MAGIC + 4].copy_from_slice(b"n+1\0");

    // reversed axes iterate x fastest
    for (chunk, &v) in buf[DATA_OFFSET..]
        .chunks_exact_mut(4)
        .zip(volume.data().t().iter())
    {
        E::write_f32(chunk, v);
    }
    Ok(buf)
}
