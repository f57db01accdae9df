use thiserror::Error;

/// Application-specific errors for the CLI
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid value for {flag}: expected three comma-separated values, got {count}")]
    InvalidTriple { flag: String, count: usize },

    #[error("Missing required argument: {arg}")]
    MissingArgument { arg: String },

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] volprep::Error),
}
