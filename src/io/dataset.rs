//! Directory listing and image/mask pairing.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// An image file and the mask file that segments it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VolumePair {
    pub key: String,
    pub image: PathBuf,
    pub mask: PathBuf,
}

/// True for `.nii` and `.nii.gz` files. Compressed files are listed so that reading
/// them fails loudly instead of silently dropping a volume.
pub fn is_volume_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

/// Volume files directly inside `dir`, sorted by file name.
pub fn list_volume_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && is_volume_file(&path) {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} volumes in {}", files.len(), dir.display());
    Ok(files)
}

/// Case identifier shared by an image and its mask: the file stem up to the first `.`
/// with its leading `-`-separated token dropped and the remaining tokens joined without
/// dashes (`img-case-01.nii` and `seg-case01.nii` share `case01`). Stems without a `-`
/// are used whole.
pub fn pair_key(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name.split('.').next().unwrap_or_default();
    match stem.split_once('-') {
        Some((_, rest)) => rest.split('-').collect(),
        None => stem.to_string(),
    }
}

/// Pair the sorted contents of two directories index by index, requiring equal counts
/// and matching pair keys.
pub fn pair_directories(images_dir: &Path, masks_dir: &Path) -> Result<Vec<VolumePair>> {
    let images = list_volume_files(images_dir)?;
    let masks = list_volume_files(masks_dir)?;
    if images.len() != masks.len() {
        return Err(Error::mismatch(format!(
            "{} holds {} volumes but {} holds {}",
            images_dir.display(),
            images.len(),
            masks_dir.display(),
            masks.len()
        )));
    }

    images
        .into_iter()
        .zip(masks)
        .map(|(image, mask)| {
            let key = pair_key(&image);
            if key != pair_key(&mask) {
                return Err(Error::mismatch(format!(
                    "{} does not match {}",
                    image.display(),
                    mask.display()
                )));
            }
            Ok(VolumePair { key, image, mask })
        })
        .collect()
}
