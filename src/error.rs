//! Crate-level error type and `Result` alias for stable, structured error handling.
//! Covers argument validation (spacing, shape, crop targets, concurrency), pipeline
//! contract violations (missing crop plan, dataset mismatches), worker failures and I/O.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid spacing {spacing:?}: every component must be a positive finite number")]
    InvalidSpacing { spacing: [f64; 3] },

    #[error("Invalid shape {shape:?}: every component must be greater than 0")]
    InvalidShape { shape: [usize; 3] },

    #[error("Invalid crop target {target:?} for volume of shape {shape:?}")]
    InvalidCropTarget { shape: [usize; 3], target: [usize; 3] },

    #[error("Invalid crop ratio {ratio:?}: every component must lie in [0, 1]")]
    InvalidCropRatio { ratio: [f64; 3] },

    #[error("Illegal worker count {count}. Legal values are none, -1, and n >= 1")]
    InvalidConcurrency { count: i64 },

    #[error("Crop plan holds {found} entries but the image set has {expected}")]
    MissingCropRatios { expected: usize, found: usize },

    #[error("Missing geometry: {0}")]
    MissingGeometry(String),

    #[error("Dataset mismatch: {0}")]
    DatasetMismatch(String),

    #[error("Foreground of mask {index} is larger than the common extent on axis {axis}")]
    ForegroundTrespass { index: usize, axis: usize },

    #[error("Worker failed on item {index} ({failed} failed in total): {source}")]
    Worker {
        index: usize,
        failed: usize,
        #[source]
        source: Box<Error>,
    },

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid NIfTI file: {0}")]
    InvalidNifti(String),
}

impl Error {
    pub fn mismatch<S: Into<String>>(reason: S) -> Self {
        Error::DatasetMismatch(reason.into())
    }
}
