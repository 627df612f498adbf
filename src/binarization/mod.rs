//! # Binarization Module
//!
//! Converts grayscale document scans into black/white images.
//!
//! The module is organized into focused sub-modules:
//! - `integral`: Prefix-sum tables for O(1) windowed mean and deviation
//! - `thresholding`: Global thresholding with Otsu's method
//! - `adaptive`: Local Sauvola thresholding
//! - `types`: Pixel buffer, parameters and error definitions

pub mod adaptive;
pub mod integral;
pub mod thresholding;
pub mod types;

// Re-export commonly used types and functions for convenience
pub use types::{BinarizationError, OtsuOutcome, PixelBuffer, SauvolaParams, ThresholdParameters};

pub use adaptive::{sauvola_threshold, sauvola_threshold_with_stats, DEFAULT_DYNAMIC_RANGE};
pub use integral::{IntegralStatistics, WindowStats};
pub use thresholding::{apply_global_threshold, compute_otsu_threshold, otsu_threshold};
