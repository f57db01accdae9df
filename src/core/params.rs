use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::processing::parallel::Workers;
use crate::core::volume::{validate_shape, validate_spacing};
use crate::error::Result;
use crate::types::TrespassPolicy;

/// Pipeline parameters suitable for config files and CLI presets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineParams {
    /// Spacing every volume is normalized to before cropping
    pub target_spacing: [f64; 3],
    /// Final voxel counts of every output volume
    pub target_shape: [usize; 3],
    /// Stop after the mask pass; images are neither required nor produced
    pub masks_only: bool,
    /// None runs sequentially, -1 uses every processing unit
    pub workers: Option<i64>,
    /// Value for samples that fall outside the input during spacing normalization
    pub fill_value: f32,
    pub trespass: TrespassPolicy,
    /// Min-max scale images to [0, 1] after the final resize
    pub normalize: bool,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            target_spacing: [1.0; 3],
            target_shape: [64; 3],
            masks_only: false,
            workers: None,
            fill_value: 0.0,
            trespass: TrespassPolicy::Warn,
            normalize: false,
        }
    }
}

impl PipelineParams {
    /// Check every parameter and resolve the worker setting.
    pub fn validate(&self) -> Result<Workers> {
        validate_spacing(self.target_spacing)?;
        validate_shape(self.target_shape)?;
        Workers::from_count(self.workers)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}
