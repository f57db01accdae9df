pub mod crop;
pub mod foreground;
pub(crate) mod interpolate;
pub mod normalize;
pub mod parallel;
pub mod pipeline;
pub mod ratio;
pub mod resample;
pub mod threshold;
