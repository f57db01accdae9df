use std::path::Path;

use tracing::info;
use tracing_subscriber::EnvFilter;

use volprep::api::{process_pair_directories, resample_directory_to_shape};
use volprep::{PipelineParams, Workers};

use super::args::CliArgs;
use super::errors::AppError;

fn triple<T: Copy>(values: &[T], flag: &str) -> Result<[T; 3], AppError> {
    values.try_into().map_err(|_| AppError::InvalidTriple {
        flag: flag.to_string(),
        count: values.len(),
    })
}

/// Start from the config file (or defaults) and apply command-line overrides.
fn build_params(args: &CliArgs) -> Result<PipelineParams, AppError> {
    let mut params = match &args.config {
        Some(path) => PipelineParams::from_json_file(path)?,
        None => PipelineParams::default(),
    };
    if let Some(spacing) = &args.spacing {
        params.target_spacing = triple(spacing, "--spacing")?;
    }
    if let Some(shape) = &args.shape {
        params.target_shape = triple(shape, "--shape")?;
    }
    if args.masks_only {
        params.masks_only = true;
    }
    if args.workers.is_some() {
        params.workers = args.workers;
    }
    if let Some(fill) = args.fill_value {
        params.fill_value = fill;
    }
    if let Some(policy) = args.trespass {
        params.trespass = policy;
    }
    if args.normalize {
        params.normalize = true;
    }
    Ok(params)
}

fn run_resize(
    input_dir: &Path,
    output_dir: &Path,
    params: &PipelineParams,
    args: &CliArgs,
) -> Result<(), AppError> {
    let kind = args.kind;
    let workers = Workers::from_count(params.workers)?;

    info!("Starting resize from directory: {:?}", input_dir);
    info!("Output directory: {:?}", output_dir);

    let report = resample_directory_to_shape(
        input_dir,
        output_dir,
        params.target_shape,
        kind,
        workers,
        args.continue_on_error,
    )?;

    info!("Resize complete!");
    info!("Processed: {}", report.processed);
    info!("Skipped: {}", report.skipped);
    info!("Errors: {}", report.errors);
    Ok(())
}

fn run_pipeline(
    output_dir: &Path,
    params: &PipelineParams,
    args: &CliArgs,
) -> Result<(), AppError> {
    let masks_dir = args.masks_dir.as_deref().ok_or(AppError::MissingArgument {
        arg: "--masks-dir".to_string(),
    })?;
    if !params.masks_only && args.images_dir.is_none() {
        return Err(AppError::MissingArgument {
            arg: "--images-dir (or --masks-only)".to_string(),
        });
    }

    info!("Masks: {:?}", masks_dir);
    if let Some(images_dir) = &args.images_dir {
        info!("Images: {:?}", images_dir);
    }
    info!("Output directory: {:?}", output_dir);

    let report =
        process_pair_directories(args.images_dir.as_deref(), masks_dir, output_dir, params)?;

    info!("Pipeline complete!");
    info!("Cases: {}", report.entries.len());
    info!("Common extent: {:?}", report.plan.target);
    info!("Cropped into foreground: {}", report.plan.trespass_count());
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let output_dir = args.output_dir.clone().ok_or(AppError::MissingArgument {
        arg: "--output-dir".to_string(),
    })?;
    let params = build_params(&args)?;

    match &args.resize_dir {
        Some(input_dir) => run_resize(input_dir, &output_dir, &params, &args)?,
        None => run_pipeline(&output_dir, &params, &args)?,
    }
    Ok(())
}
