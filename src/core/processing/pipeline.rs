//! Two-pass preparation of paired image/mask datasets.
//!
//! The mask pass normalizes spacing, solves a crop plan around each mask's foreground,
//! crops to the common extent and resizes. The image pass repeats the same steps on the
//! images but replays the mask pass's [`CropPlan`] instead of solving one, which keeps
//! every image aligned with its mask. Each stage runs to completion before the next.
use serde::Serialize;
use tracing::{info, warn};

use crate::core::params::PipelineParams;
use crate::core::processing::crop::{CropMode, CropPlan, apply_crop_plan, crop_to_common_extent};
use crate::core::processing::normalize::normalize_intensity;
use crate::core::processing::parallel::{Workers, map_parallel};
use crate::core::processing::resample::{
    NativeResampler, Resample, resample_to_shape, resample_to_spacing,
};
use crate::core::processing::threshold::{OtsuThreshold, ThresholdEstimator};
use crate::core::volume::Volume;
use crate::error::{Error, Result};
use crate::types::VolumeKind;

static NATIVE_RESAMPLER: NativeResampler = NativeResampler;
static NATIVE_THRESHOLD: OtsuThreshold = OtsuThreshold { bins: 128 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    ResamplingMaskSpacing,
    CroppingMasks,
    ResamplingMaskSize,
    ResamplingImageSpacing,
    CroppingImages,
    ResamplingImageSize,
    NormalizingImages,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::ResamplingMaskSpacing => write!(f, "Resampling mask spacing"),
            Stage::CroppingMasks => write!(f, "Cropping masks"),
            Stage::ResamplingMaskSize => write!(f, "Resampling mask size"),
            Stage::ResamplingImageSpacing => write!(f, "Resampling image spacing"),
            Stage::CroppingImages => write!(f, "Cropping images"),
            Stage::ResamplingImageSize => write!(f, "Resampling image size"),
            Stage::NormalizingImages => write!(f, "Normalizing images"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MaskPassOutput {
    pub masks: Vec<Volume>,
    pub plan: CropPlan,
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub masks: Vec<Volume>,
    /// `None` in masks-only mode
    pub images: Option<Vec<Volume>>,
    pub plan: CropPlan,
}

pub struct Pipeline<'a> {
    params: PipelineParams,
    workers: Workers,
    resampler: &'a dyn Resample,
    estimator: &'a dyn ThresholdEstimator,
}

impl<'a> Pipeline<'a> {
    /// Validates `params` up front so no stage is dispatched with bad settings.
    pub fn new(
        params: PipelineParams,
        resampler: &'a dyn Resample,
        estimator: &'a dyn ThresholdEstimator,
    ) -> Result<Self> {
        let workers = params.validate()?;
        Ok(Self {
            params,
            workers,
            resampler,
            estimator,
        })
    }

    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    pub fn workers(&self) -> Workers {
        self.workers
    }

    fn enter(&self, stage: Stage, count: usize) {
        info!("{} ({} volumes, workers: {})", stage, count, self.workers);
    }

    fn resample_spacing(&self, volumes: Vec<Volume>) -> Result<Vec<Volume>> {
        let spacing = self.params.target_spacing;
        let fill = self.params.fill_value;
        map_parallel(volumes, self.workers, |_, v| {
            resample_to_spacing(self.resampler, &v, spacing, fill)
        })
    }

    fn resample_shape(&self, volumes: Vec<Volume>) -> Result<Vec<Volume>> {
        let shape = self.params.target_shape;
        map_parallel(volumes, self.workers, |_, v| {
            resample_to_shape(self.resampler, &v, shape)
        })
    }

    /// Normalize, crop and resize the masks, producing the crop plan for the images.
    pub fn run_mask_pass(&self, masks: Vec<Volume>) -> Result<MaskPassOutput> {
        expect_kind(&masks, VolumeKind::Label)?;

        self.enter(Stage::ResamplingMaskSpacing, masks.len());
        let masks = self.resample_spacing(masks)?;

        self.enter(Stage::CroppingMasks, masks.len());
        let mode = CropMode::Adaptive {
            estimator: self.estimator,
            policy: self.params.trespass,
        };
        let (masks, plan) = crop_to_common_extent(masks, mode, self.workers)?;
        let trespassed = plan.trespass_count();
        if trespassed > 0 {
            warn!("{} of {} masks were cropped into their foreground", trespassed, plan.len());
        }

        self.enter(Stage::ResamplingMaskSize, masks.len());
        let masks = self.resample_shape(masks)?;

        Ok(MaskPassOutput { masks, plan })
    }

    /// Process the images with the crop plan of their masks.
    pub fn run_image_pass(&self, images: Vec<Volume>, plan: &CropPlan) -> Result<Vec<Volume>> {
        expect_kind(&images, VolumeKind::Image)?;
        if plan.len() != images.len() {
            return Err(Error::MissingCropRatios {
                expected: images.len(),
                found: plan.len(),
            });
        }

        self.enter(Stage::ResamplingImageSpacing, images.len());
        let images = self.resample_spacing(images)?;

        self.enter(Stage::CroppingImages, images.len());
        let images = apply_crop_plan(images, plan, self.workers)?;

        self.enter(Stage::ResamplingImageSize, images.len());
        let mut images = self.resample_shape(images)?;

        if self.params.normalize {
            self.enter(Stage::NormalizingImages, images.len());
            images = map_parallel(images, self.workers, |_, v| normalize_intensity(&v))?;
        }
        Ok(images)
    }

    /// Run the mask pass and, unless `masks_only` is set, the image pass.
    pub fn run(&self, masks: Vec<Volume>, images: Option<Vec<Volume>>) -> Result<PipelineOutput> {
        if self.params.masks_only {
            if images.is_some() {
                warn!("masks_only is set; ignoring the supplied images");
            }
            let MaskPassOutput { masks, plan } = self.run_mask_pass(masks)?;
            return Ok(PipelineOutput {
                masks,
                images: None,
                plan,
            });
        }

        let images = images
            .ok_or_else(|| Error::mismatch("images are required unless masks_only is set"))?;
        if images.len() != masks.len() {
            return Err(Error::mismatch(format!(
                "{} images but {} masks",
                images.len(),
                masks.len()
            )));
        }
        expect_kind(&images, VolumeKind::Image)?;

        let MaskPassOutput { masks, plan } = self.run_mask_pass(masks)?;
        let images = self.run_image_pass(images, &plan)?;
        Ok(PipelineOutput {
            masks,
            images: Some(images),
            plan,
        })
    }
}

impl Pipeline<'static> {
    /// Pipeline backed by the built-in resampler and a 128-bin Otsu threshold.
    pub fn with_native(params: PipelineParams) -> Result<Self> {
        Pipeline::new(params, &NATIVE_RESAMPLER, &NATIVE_THRESHOLD)
    }
}

fn expect_kind(volumes: &[Volume], kind: VolumeKind) -> Result<()> {
    match volumes.iter().position(|v| v.kind() != kind) {
        Some(i) => Err(Error::mismatch(format!(
            "volume {} is a {} but a {} was expected",
            i,
            volumes[i].kind(),
            kind
        ))),
        None => Ok(()),
    }
}
