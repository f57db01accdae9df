//! JSON sidecar describing a pipeline run.
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::core::params::PipelineParams;
use crate::core::processing::crop::CropPlan;
use crate::error::Result;
use crate::io::dataset::{VolumePair, pair_key};

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub key: String,
    pub mask: PathBuf,
    /// Absent in masks-only runs
    pub image: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub generated: String,
    pub params: PipelineParams,
    pub entries: Vec<ReportEntry>,
    pub plan: CropPlan,
}

impl ReportEntry {
    pub fn for_mask(mask: &Path) -> Self {
        Self {
            key: pair_key(mask),
            mask: mask.to_path_buf(),
            image: None,
        }
    }
}

impl From<&VolumePair> for ReportEntry {
    fn from(pair: &VolumePair) -> Self {
        Self {
            key: pair.key.clone(),
            mask: pair.mask.clone(),
            image: Some(pair.image.clone()),
        }
    }
}

impl PipelineReport {
    pub fn new(params: &PipelineParams, entries: Vec<ReportEntry>, plan: CropPlan) -> Self {
        Self {
            generated: chrono::Utc::now().to_rfc3339(),
            params: params.clone(),
            entries,
            plan,
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!("Created pipeline report: {:?}", path);
        Ok(())
    }
}
