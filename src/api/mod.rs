//! High-level, ergonomic library API: run the paired image/mask pipeline from directory
//! to directory, resize whole directories, and load or save volume sets in parallel.
//! Prefer these entrypoints over the processing modules when integrating volprep.
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::core::params::PipelineParams;
use crate::core::processing::parallel::{Workers, map_parallel};
use crate::core::processing::pipeline::Pipeline;
use crate::core::processing::resample::{NativeResampler, resample_to_shape};
use crate::core::volume::{Volume, validate_shape};
use crate::error::{Error, Result};
use crate::io::dataset::{list_volume_files, pair_directories};
use crate::io::nifti::{read_volume, write_volume};
use crate::io::report::{PipelineReport, ReportEntry};
use crate::types::VolumeKind;

/// Batch processing report
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchReport {
    pub processed: usize,
    pub skipped: usize,
    pub errors: usize,
}

/// Read every file in `paths` as `kind`, keeping the input order.
pub fn load_volumes(paths: &[PathBuf], kind: VolumeKind, workers: Workers) -> Result<Vec<Volume>> {
    map_parallel(paths.iter().collect(), workers, |_, path: &PathBuf| {
        read_volume(path, kind)
    })
}

/// Write `volumes[i]` to `output_dir` under the file name of `names[i]`.
pub fn save_volumes(
    volumes: &[Volume],
    names: &[PathBuf],
    output_dir: &Path,
    workers: Workers,
) -> Result<()> {
    if volumes.len() != names.len() {
        return Err(Error::mismatch(format!(
            "{} volumes but {} output names",
            volumes.len(),
            names.len()
        )));
    }
    std::fs::create_dir_all(output_dir)?;
    let items: Vec<_> = volumes.iter().zip(names).collect();
    map_parallel(items, workers, |_, (volume, name): (&Volume, &PathBuf)| {
        let file_name = name
            .file_name()
            .ok_or_else(|| Error::mismatch(format!("{} has no file name", name.display())))?;
        write_volume(&output_dir.join(file_name), volume)
    })?;
    Ok(())
}

/// Run the full pipeline on `masks_dir` (and `images_dir`, unless `params.masks_only`),
/// writing `masks/`, `images/` and `report.json` under `output_dir`.
pub fn process_pair_directories(
    images_dir: Option<&Path>,
    masks_dir: &Path,
    output_dir: &Path,
    params: &PipelineParams,
) -> Result<PipelineReport> {
    let pipeline = Pipeline::with_native(params.clone())?;
    let workers = pipeline.workers();

    let (mask_paths, image_paths, entries) = if params.masks_only {
        if images_dir.is_some() {
            warn!("masks_only is set; the image directory is ignored");
        }
        let masks = list_volume_files(masks_dir)?;
        let entries: Vec<ReportEntry> = masks.iter().map(|m| ReportEntry::for_mask(m)).collect();
        (masks, None, entries)
    } else {
        let images_dir = images_dir.ok_or_else(|| {
            Error::mismatch("an image directory is required unless masks_only is set")
        })?;
        let pairs = pair_directories(images_dir, masks_dir)?;
        let entries: Vec<ReportEntry> = pairs.iter().map(ReportEntry::from).collect();
        let masks: Vec<PathBuf> = pairs.iter().map(|p| p.mask.clone()).collect();
        let images: Vec<PathBuf> = pairs.into_iter().map(|p| p.image).collect();
        (masks, Some(images), entries)
    };

    info!("Loading {} masks from {}", mask_paths.len(), masks_dir.display());
    let masks = load_volumes(&mask_paths, VolumeKind::Label, workers)?;
    let images = match &image_paths {
        Some(paths) => {
            info!("Loading {} images", paths.len());
            Some(load_volumes(paths, VolumeKind::Image, workers)?)
        }
        None => None,
    };

    let output = pipeline.run(masks, images)?;

    save_volumes(&output.masks, &mask_paths, &output_dir.join("masks"), workers)?;
    if let (Some(images), Some(paths)) = (&output.images, &image_paths) {
        save_volumes(images, paths, &output_dir.join("images"), workers)?;
    }

    let report = PipelineReport::new(params, entries, output.plan);
    report.write_json(&output_dir.join("report.json"))?;
    info!(
        "Prepared {} volume sets into {}",
        report.entries.len(),
        output_dir.display()
    );
    Ok(report)
}

/// Resize every volume in `input_dir` to exactly `shape` voxels and write it to
/// `output_dir` under the same name. Compressed files are skipped. If
/// `continue_on_error` is true, errors are counted in the report and processing
/// continues; otherwise, the first error is returned.
pub fn resample_directory_to_shape(
    input_dir: &Path,
    output_dir: &Path,
    shape: [usize; 3],
    kind: VolumeKind,
    workers: Workers,
    continue_on_error: bool,
) -> Result<BatchReport> {
    validate_shape(shape)?;
    std::fs::create_dir_all(output_dir)?;

    let files = list_volume_files(input_dir)?;
    info!("Resizing {} volumes to {:?}", files.len(), shape);

    let outcomes = map_parallel(files, workers, |_, path| {
        let result = read_volume(&path, kind)
            .and_then(|v| resample_to_shape(&NativeResampler, &v, shape))
            .and_then(|v| {
                let name = path.file_name().map(PathBuf::from).unwrap_or_default();
                write_volume(&output_dir.join(name), &v)
            });
        Ok((path, result))
    })?;

    let mut report = BatchReport::default();
    for (path, result) in outcomes {
        match result {
            Ok(()) => report.processed += 1,
            Err(Error::UnsupportedFormat(reason)) => {
                warn!("Skipping {}: {}", path.display(), reason);
                report.skipped += 1;
            }
            Err(e) => {
                report.errors += 1;
                if !continue_on_error {
                    return Err(e);
                }
                warn!("Failed to resize {}: {}", path.display(), e);
            }
        }
    }
    Ok(report)
}
