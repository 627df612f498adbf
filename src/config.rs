//! # Unified Application Configuration
//!
//! This module consolidates the sweep grid, output and logging settings into
//! one configuration object. Values come from environment variables (a `.env`
//! file is loaded by the binary first) and an optional JSON grid file, and every
//! section is validated before any image is touched.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::errors::{error_logging, AppError, AppResult};
use crate::observability_config::ObservabilityConfig;
use crate::output::OutputFormat;
use crate::sweep::SweepConfig;

/// Environment variable naming an explicit sweep grid file
pub const SWEEP_CONFIG_PATH_VAR: &str = "BINARIZE_SWEEP_CONFIG_PATH";

/// Grid files tried when no explicit path is configured
const FALLBACK_SWEEP_CONFIG_PATHS: [&str; 3] = [
    "/app/config/sweep_grid.json", // Docker path
    "config/sweep_grid.json",      // Local development path
    "../config/sweep_grid.json",   // Test path
];

/// Where and how sweep results are written
#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    /// Root directory; categories become sub-directories
    pub root: PathBuf,
    /// Encoding for every artifact
    pub format: OutputFormat,
    /// Whether to write manifest.json next to the category directories
    pub write_manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("output"),
            format: OutputFormat::Jpeg,
            write_manifest: true,
        }
    }
}

impl OutputConfig {
    /// Validate output configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.root.as_os_str().is_empty() {
            return Err(AppError::Config(
                "Output directory cannot be empty".to_string(),
            ));
        }

        // Clearing a category under "/" or a parent reference is never intended
        if self.root == Path::new("/") || self.root.components().any(|c| c.as_os_str() == "..") {
            return Err(AppError::Config(format!(
                "Output directory {} is not allowed",
                self.root.display()
            )));
        }

        Ok(())
    }
}

/// Worker pool settings for the parallel sweep
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Maximum concurrent thresholding workers
    pub max_workers: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

impl ExecutionConfig {
    /// Validate execution configuration
    pub fn validate(&self) -> AppResult<()> {
        if self.max_workers == 0 {
            return Err(AppError::Config("Max workers cannot be 0".to_string()));
        }

        if self.max_workers > 256 {
            return Err(AppError::Config(
                "Max workers cannot be greater than 256".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unified application configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppConfig {
    /// Parameter grids
    pub sweep: SweepConfig,
    /// Artifact output
    pub output: OutputConfig,
    /// Worker pool
    pub execution: ExecutionConfig,
    /// Logging
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppResult<Self> {
        let mut config = Self {
            sweep: load_sweep_config(lookup(SWEEP_CONFIG_PATH_VAR).as_deref())?,
            ..Self::default()
        };

        if let Some(value) = lookup("BINARIZE_DYNAMIC_RANGE") {
            config.sweep.dynamic_range = value.trim().parse().map_err(|_| {
                AppError::Config("BINARIZE_DYNAMIC_RANGE must be a valid number".to_string())
            })?;
        }
        if let Some(value) = lookup("BINARIZE_COMPUTED_OTSU") {
            config.sweep.computed_otsu = parse_bool("BINARIZE_COMPUTED_OTSU", &value)?;
        }

        // Load output configuration
        if let Some(value) = lookup("BINARIZE_OUTPUT_DIR") {
            config.output.root = PathBuf::from(value);
        }
        if let Some(value) = lookup("BINARIZE_OUTPUT_FORMAT") {
            config.output.format = value.parse()?;
        }
        if let Some(value) = lookup("BINARIZE_WRITE_MANIFEST") {
            config.output.write_manifest = parse_bool("BINARIZE_WRITE_MANIFEST", &value)?;
        }

        // Load execution configuration
        if let Some(value) = lookup("BINARIZE_MAX_WORKERS") {
            config.execution.max_workers = value.trim().parse().map_err(|_| {
                AppError::Config("BINARIZE_MAX_WORKERS must be a valid number".to_string())
            })?;
        }

        // Load observability configuration
        config.observability = ObservabilityConfig::from_lookup(&lookup);

        Ok(config)
    }

    /// Validate all configuration sections
    pub fn validate(&self) -> AppResult<()> {
        self.sweep.validate()?;
        self.output.validate()?;
        self.execution.validate()?;
        self.observability.validate()?;
        Ok(())
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: otsu_entries={}, sauvola_entries={}, computed_otsu={}, dynamic_range={}, output={}, format={}, max_workers={}",
            self.sweep.otsu_thresholds.len(),
            self.sweep.sauvola_params.len(),
            self.sweep.computed_otsu,
            self.sweep.dynamic_range,
            self.output.root.display(),
            self.output.format.extension(),
            self.execution.max_workers
        )
    }
}

/// Parses a strict `true`/`false` flag.
fn parse_bool(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(AppError::Config(format!(
            "{} must be 'true' or 'false', got '{}'",
            key, other
        ))),
    }
}

/// Loads the sweep grid.
///
/// An explicit path must exist and parse. Otherwise the first fallback
/// location holding a file is used, and that file must parse too; the
/// built-in grid is used only when no fallback file exists.
pub fn load_sweep_config(explicit_path: Option<&str>) -> AppResult<SweepConfig> {
    let fallbacks: Vec<&Path> = FALLBACK_SWEEP_CONFIG_PATHS
        .iter()
        .map(|path| Path::new(*path))
        .collect();
    load_sweep_config_with_fallbacks(explicit_path, &fallbacks)
}

fn load_sweep_config_with_fallbacks(
    explicit_path: Option<&str>,
    fallbacks: &[&Path],
) -> AppResult<SweepConfig> {
    if let Some(config_path) = explicit_path {
        info!("Loading sweep grid from {}: {}", SWEEP_CONFIG_PATH_VAR, config_path);
        return load_sweep_config_from(Path::new(config_path));
    }

    for path in fallbacks {
        if !path.is_file() {
            continue;
        }
        let config = load_sweep_config_from(path).inspect_err(|e| {
            error_logging::log_config_error(e, SWEEP_CONFIG_PATH_VAR, "load_fallback");
        })?;
        info!(
            "Successfully loaded sweep grid from fallback path: {}",
            path.display()
        );
        return Ok(config);
    }

    info!("No sweep grid file found, using built-in defaults");
    Ok(SweepConfig::default())
}

/// Reads and parses one JSON grid file.
pub fn load_sweep_config_from(path: &Path) -> AppResult<SweepConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        AppError::Config(format!(
            "Failed to read sweep grid {}: {}",
            path.display(),
            e
        ))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::Config(format!(
            "Failed to parse sweep grid {}: {}",
            path.display(),
            e
        ))
    })
}
