use clap::Parser;
use std::path::PathBuf;

use volprep::{TrespassPolicy, VolumeKind};

#[derive(Parser)]
#[command(name = "volprep", version, about = "volprep CLI")]
pub struct CliArgs {
    /// Directory of label masks (one per case)
    #[arg(long)]
    pub masks_dir: Option<PathBuf>,

    /// Directory of images, paired with the masks by sorted file name
    #[arg(long)]
    pub images_dir: Option<PathBuf>,

    /// Output directory (receives masks/, images/ and report.json)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// JSON parameter file; flags given on the command line override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target voxel spacing as x,y,z (default 1,1,1)
    #[arg(long, value_delimiter = ',')]
    pub spacing: Option<Vec<f64>>,

    /// Output voxel counts as x,y,z (default 64,64,64)
    #[arg(long, value_delimiter = ',')]
    pub shape: Option<Vec<usize>>,

    /// Process masks only; images are neither read nor written
    #[arg(long, default_value_t = false)]
    pub masks_only: bool,

    /// Worker threads per stage. Omit for sequential, -1 for all processing units
    #[arg(short, long, allow_negative_numbers = true)]
    pub workers: Option<i64>,

    /// Value for samples outside the input during spacing normalization (default 0)
    #[arg(long, allow_negative_numbers = true)]
    pub fill_value: Option<f32>,

    /// What to do when a mask's foreground does not fit the common extent (warn or abort)
    #[arg(long, value_enum)]
    pub trespass: Option<TrespassPolicy>,

    /// Min-max scale images to [0, 1] after the final resize
    #[arg(long, default_value_t = false)]
    pub normalize: bool,

    /// Standalone mode: resize every volume in this directory to --shape
    #[arg(long)]
    pub resize_dir: Option<PathBuf>,

    /// Standalone mode: content of the volumes (label masks use nearest-neighbor)
    #[arg(long, value_enum, default_value_t = VolumeKind::Image)]
    pub kind: VolumeKind,

    /// Standalone mode: keep going when a volume fails
    #[arg(long, default_value_t = false)]
    pub continue_on_error: bool,

    /// Enable logging (filter with RUST_LOG, default debug)
    #[arg(long, default_value_t = false)]
    pub log: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_mode_takes_kind_and_shape() {
        let args = CliArgs::try_parse_from([
            "volprep",
            "--resize-dir",
            "in",
            "-o",
            "out",
            "--shape",
            "32,32,16",
            "--kind",
            "label",
            "-w",
            "-1",
        ])
        .unwrap();
        assert_eq!(args.kind, VolumeKind::Label);
        assert_eq!(args.shape, Some(vec![32, 32, 16]));
        assert_eq!(args.workers, Some(-1));

        let default_kind = CliArgs::try_parse_from(["volprep", "--resize-dir", "in"]).unwrap();
        assert_eq!(default_kind.kind, VolumeKind::Image);
        assert!(CliArgs::try_parse_from(["volprep", "--kind", "mask"]).is_err());
    }
}
