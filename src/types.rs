//! Shared types and enums used across volprep.
//! Includes `VolumeKind`, `Interpolation`, `CropDecision` and `TrespassPolicy`.
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Content type of a volume. Selects the interpolation policy wherever a volume is consumed.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeKind {
    Image,
    Label,
}

impl VolumeKind {
    pub fn is_label(self) -> bool {
        matches!(self, VolumeKind::Label)
    }

    /// Nearest-neighbor keeps label identities intact; images get a smooth kernel.
    pub fn interpolation(self) -> Interpolation {
        match self {
            VolumeKind::Image => Interpolation::BSpline,
            VolumeKind::Label => Interpolation::Nearest,
        }
    }
}

impl std::fmt::Display for VolumeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolumeKind::Image => write!(f, "image"),
            VolumeKind::Label => write!(f, "label"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interpolation {
    Nearest,
    /// Cubic B-spline
    BSpline,
}

impl std::fmt::Display for Interpolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interpolation::Nearest => write!(f, "Nearest"),
            Interpolation::BSpline => write!(f, "BSpline"),
        }
    }
}

/// Which side of an axis the adaptive solver kept more of.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum CropDecision {
    /// Foreground sits closer to the start; most of the excess comes off the end.
    ProtectStart,
    /// Foreground sits closer to the end; most of the excess comes off the start.
    ProtectEnd,
}

impl std::fmt::Display for CropDecision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CropDecision::ProtectStart => write!(f, "ProtectStart"),
            CropDecision::ProtectEnd => write!(f, "ProtectEnd"),
        }
    }
}

/// What to do when the common extent is smaller than a mask's foreground.
#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TrespassPolicy {
    /// Log a warning and crop into the foreground anyway
    #[default]
    Warn,
    /// Fail the mask pass
    Abort,
}

impl std::fmt::Display for TrespassPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrespassPolicy::Warn => write!(f, "Warn"),
            TrespassPolicy::Abort => write!(f, "Abort"),
        }
    }
}
