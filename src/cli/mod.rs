//! Command Line Interface (CLI) layer for volprep.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for the paired pipeline and the
//! standalone directory resize. It wires user-provided options to the
//! library functionality exposed via `volprep::api`.
//!
//! If you are embedding volprep into another application, prefer using
//! the high-level `volprep::api` module instead of calling the CLI code.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
