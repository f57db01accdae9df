//! I/O layer: NIfTI-1 volume files, image/mask directory pairing and the JSON
//! report written next to pipeline outputs.
pub mod dataset;
pub use dataset::{VolumePair, list_volume_files, pair_directories, pair_key};

pub mod nifti;
pub use nifti::{read_volume, write_volume};

pub mod report;
pub use report::PipelineReport;
