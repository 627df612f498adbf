//! # Document Binarization
//!
//! Converts grayscale document scans into black/white images with a global
//! (Otsu) or locally adaptive (Sauvola) threshold, and sweeps parameter grids
//! over one scan to compare the results side by side.
//!
//! The core in [`binarization`] and [`sweep`] performs no I/O; [`output`]
//! decodes sources and writes labeled artifacts for the `binarize` binary.

pub mod binarization;
pub mod config;
pub mod errors;
pub mod observability;
pub mod observability_config;
pub mod output;
pub mod sweep;

// Re-export types for easier access
pub use binarization::{
    otsu_threshold, sauvola_threshold, BinarizationError, IntegralStatistics, PixelBuffer,
    SauvolaParams, ThresholdParameters,
};
pub use sweep::{run_sweep, run_sweep_parallel, ParameterSweepRunner, SweepConfig, SweepResult};
