//! Core processing building blocks: the volume model, resampling kernels,
//! foreground analysis, crop planning, the worker harness and the two-pass
//! pipeline. These are the primitives consumed by the high-level `api` module.
pub mod params;
pub mod processing;
pub mod volume;
