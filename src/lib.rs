#![doc = r#"
volprep: spacing normalization, foreground-aware cropping and fixed-size resampling
for paired 3-D image/mask datasets.

This crate prepares volumetric scans and their segmentation masks for model training.
Every volume is resampled to a common voxel spacing, cropped to the extent shared by
the whole dataset and resized to a fixed shape. Crop offsets are solved on the masks,
around each mask's foreground, and then replayed on the paired images so every image
stays voxel-aligned with its mask. It powers the volprep CLI and can be embedded in
your own Rust applications.

Stability
---------
The public library API is experimental in initial releases and may evolve as the
crate stabilizes. Breaking changes can occur.

Add dependency
--------------
```toml
[dependencies]
volprep = "0.1"
```

Quick start: prepare a paired dataset on disk
---------------------------------------------
```rust,no_run
use std::path::Path;
use volprep::{process_pair_directories, PipelineParams, TrespassPolicy};

fn main() -> volprep::Result<()> {
    let params = PipelineParams {
        target_spacing: [1.0, 1.0, 1.0],
        target_shape: [128, 128, 96],
        workers: Some(-1),
        trespass: TrespassPolicy::Warn,
        ..Default::default()
    };

    let report = process_pair_directories(
        Some(Path::new("/data/images")),
        Path::new("/data/masks"),
        Path::new("/out"),
        &params,
    )?;
    println!("common extent {:?} over {} cases", report.plan.target, report.entries.len());
    Ok(())
}
```

In-memory pipeline
------------------
```rust,no_run
use ndarray::Array3;
use volprep::{Pipeline, PipelineParams, Volume};

fn main() -> volprep::Result<()> {
    let masks = vec![
        Volume::label(Array3::zeros((50, 50, 50)), [1.0, 1.0, 1.0])?,
        Volume::label(Array3::zeros((60, 60, 60)), [1.0, 1.0, 1.0])?,
    ];
    let images = vec![
        Volume::image(Array3::zeros((50, 50, 50)), [1.0, 1.0, 1.0])?,
        Volume::image(Array3::zeros((60, 60, 60)), [1.0, 1.0, 1.0])?,
    ];

    let pipeline = Pipeline::with_native(PipelineParams {
        target_shape: [32, 32, 32],
        ..Default::default()
    })?;

    // Masks first: the crop plan they produce drives the image pass.
    let mask_pass = pipeline.run_mask_pass(masks)?;
    let images = pipeline.run_image_pass(images, &mask_pass.plan)?;
    assert_eq!(images[0].shape(), mask_pass.masks[0].shape());
    Ok(())
}
```

Building blocks
---------------
```rust
use ndarray::Array3;
use volprep::{
    crop_to_extent, resample_to_spacing, CropRatio, NativeResampler, Volume,
};

fn halve_and_crop(volume: &Volume) -> volprep::Result<Volume> {
    let spacing = volume.spacing().map(|s| s * 2.0);
    let coarse = resample_to_spacing(&NativeResampler, volume, spacing, 0.0)?;
    let target = coarse.shape().map(|n| n.saturating_sub(2).max(1));
    crop_to_extent(&coarse, target, CropRatio::SYMMETRIC)
}

let vol = Volume::image(Array3::ones((16, 16, 16)), [1.0, 1.0, 1.0]).unwrap();
assert_eq!(halve_and_crop(&vol).unwrap().shape(), [6, 6, 6]);
```

Error handling
--------------
All public functions return `volprep::Result<T>`; match on `volprep::Error` to handle
specific cases, e.g. a dataset whose images and masks do not line up.

```rust,no_run
use std::path::Path;
use volprep::{process_pair_directories, Error, PipelineParams};

fn main() {
    let params = PipelineParams::default();
    match process_pair_directories(
        Some(Path::new("/data/images")),
        Path::new("/data/masks"),
        Path::new("/out"),
        &params,
    ) {
        Ok(_) => {}
        Err(Error::DatasetMismatch(reason)) => eprintln!("Dataset mismatch: {reason}"),
        Err(Error::Worker { index, source, .. }) => eprintln!("Case {index} failed: {source}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`]: high-level, directory-to-directory entry points.
- [`core`]: the volume model, resampling, cropping and the two-pass pipeline.
- [`types`]: enums shared across the crate (e.g. `VolumeKind`, `TrespassPolicy`).
- [`io`]: NIfTI-1 reader/writer, dataset pairing and the JSON report.
- [`error`]: crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::params::PipelineParams;
pub use crate::core::volume::{BoundingBox, Geometry, Volume};
pub use error::{Error, Result};
pub use types::{CropDecision, Interpolation, TrespassPolicy, VolumeKind};

// Processing building blocks
pub use crate::core::processing::crop::{
    CropMode, CropPlan, PlannedCrop, crop_to_common_extent, crop_to_extent, shape_extrema,
};
pub use crate::core::processing::foreground::{ForegroundBox, estimate_foreground};
pub use crate::core::processing::parallel::{Workers, map_parallel};
pub use crate::core::processing::pipeline::{MaskPassOutput, Pipeline, PipelineOutput, Stage};
pub use crate::core::processing::ratio::{CropRatio, CropSolution, solve_crop_ratio};
pub use crate::core::processing::resample::{
    Grid, NativeResampler, Resample, resample_to_shape, resample_to_spacing,
};
pub use crate::core::processing::threshold::{OtsuThreshold, ThresholdEstimator};

// I/O
pub use io::nifti::{read_volume, write_volume};
pub use io::report::PipelineReport;

// High-level API re-exports
pub use api::{
    BatchReport, load_volumes, process_pair_directories, resample_directory_to_shape,
    save_volumes,
};
