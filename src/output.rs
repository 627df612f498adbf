//! # Sweep Artifact Output
//!
//! The I/O edge around the binarization core: decoding the source scan,
//! preparing one directory per sweep category, encoding every result under a
//! name derived from its parameters, and writing a JSON manifest.
//!
//! Category preparation is destructive. An existing `otsu/` or `sauvola/`
//! directory under the output root is removed with all its contents before the
//! new results are written, so a directory never mixes files from two runs.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use image::ImageFormat;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::binarization::{PixelBuffer, ThresholdParameters};
use crate::errors::{error_logging, AppError, AppResult};
use crate::observability;
use crate::sweep::SweepResult;

/// Maximum allowed filename length (255 bytes on most filesystems)
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Characters that are not allowed in filenames
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &[
    '<', '>', ':', '"', '|', '?', '*', '/', '\\', '\0', // separators and null byte
    '\x01', '\x02', '\x03', '\x04', '\x05', '\x06', '\x07', // control chars
    '\x08', '\x09', '\x0a', '\x0b', '\x0c', '\x0d', '\x0e', '\x0f', // control chars
    '\x10', '\x11', '\x12', '\x13', '\x14', '\x15', '\x16', '\x17', // control chars
    '\x18', '\x19', '\x1a', '\x1b', '\x1c', '\x1d', '\x1e', '\x1f', // control chars
];

/// File name of the sweep manifest inside the output root
pub const MANIFEST_FILE_NAME: &str = "manifest.json";

/// Encoding used for sweep artifacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
        }
    }

    pub fn image_format(&self) -> ImageFormat {
        match self {
            OutputFormat::Jpeg => ImageFormat::Jpeg,
            OutputFormat::Png => ImageFormat::Png,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "jpg" | "jpeg" => Ok(OutputFormat::Jpeg),
            "png" => Ok(OutputFormat::Png),
            other => Err(AppError::Config(format!(
                "Unsupported output format: {}. Expected 'jpg' or 'png'",
                other
            ))),
        }
    }
}

/// One encoded sweep result on disk.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WrittenArtifact {
    pub label: String,
    pub parameters: ThresholdParameters,
    pub path: PathBuf,
    pub bytes: u64,
}

#[derive(Debug, Serialize)]
struct SweepManifest<'a> {
    source: String,
    width: usize,
    height: usize,
    generated_at: DateTime<Utc>,
    entries: &'a [WrittenArtifact],
}

/// Decodes an image file and converts it to 8-bit luminance.
///
/// Color images go through the `image` crate's standard luminance conversion.
pub fn load_grayscale(path: &Path) -> AppResult<PixelBuffer> {
    let decoded = image::open(path).map_err(|e| {
        error_logging::log_image_error(&e, "decode", path.to_str());
        AppError::Image(format!("Failed to decode {}: {}", path.display(), e))
    })?;

    let buffer = PixelBuffer::from(decoded.to_luma8());
    if buffer.is_empty() {
        return Err(AppError::Validation(format!(
            "Decoded image {} has zero area",
            path.display()
        )));
    }

    debug!(
        path = %path.display(),
        width = buffer.width(),
        height = buffer.height(),
        "Source image decoded"
    );
    Ok(buffer)
}

/// Sanitize a filename by replacing forbidden characters
pub fn sanitize_filename(filename: &str) -> String {
    let mut sanitized = filename.to_string();

    // Replace forbidden characters with underscores
    for &forbidden in FORBIDDEN_FILENAME_CHARS {
        sanitized = sanitized.replace(forbidden, "_");
    }

    // Trim whitespace and leading/trailing dots
    sanitized = sanitized.trim().trim_matches('.').trim().to_string();
    if sanitized.is_empty() {
        sanitized = "unnamed_file".to_string();
    }

    // Limit length, preserving the extension
    if sanitized.len() > MAX_FILENAME_LENGTH {
        if let Some(dot_pos) = sanitized.rfind('.') {
            let name = &sanitized[..dot_pos];
            let ext = &sanitized[dot_pos..];
            let max_name_len = MAX_FILENAME_LENGTH.saturating_sub(ext.len());
            sanitized = format!("{}{}", truncate_on_char_boundary(name, max_name_len), ext);
        } else {
            sanitized = truncate_on_char_boundary(&sanitized, MAX_FILENAME_LENGTH).to_string();
        }
    }

    sanitized
}

fn truncate_on_char_boundary(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// File name for one result, e.g. `sauvola_binarization_w21_k0.40.jpg`.
pub fn artifact_file_name(parameters: &ThresholdParameters, format: OutputFormat) -> String {
    sanitize_filename(&format!("{}.{}", parameters.file_stem(), format.extension()))
}

/// Like [`artifact_file_name`], with the sweep index appended to the stem.
///
/// Used when an earlier entry of the same sweep already took the plain name,
/// e.g. duplicate grid entries or a computed Otsu threshold equal to an
/// explicit one.
pub fn indexed_artifact_file_name(
    parameters: &ThresholdParameters,
    index: usize,
    format: OutputFormat,
) -> String {
    sanitize_filename(&format!(
        "{}_{}.{}",
        parameters.file_stem(),
        index,
        format.extension()
    ))
}

/// Removes `root/category` with all its contents if present, then recreates it empty.
pub fn prepare_category_dir(root: &Path, category: &str) -> AppResult<PathBuf> {
    let directory = root.join(sanitize_filename(category));

    if directory.exists() {
        fs::remove_dir_all(&directory).map_err(|e| {
            error_logging::log_filesystem_error(&e, "clear_directory", directory.to_str(), None);
            AppError::FileSystem(format!("Failed to clear {}: {}", directory.display(), e))
        })?;
    }

    fs::create_dir_all(&directory).map_err(|e| {
        error_logging::log_filesystem_error(&e, "create_directory", directory.to_str(), None);
        AppError::FileSystem(format!("Failed to create {}: {}", directory.display(), e))
    })?;

    debug!(directory = %directory.display(), "Output directory prepared");
    Ok(directory)
}

/// Writes every sweep entry into its category directory under `root`.
///
/// Only categories that have at least one entry are prepared (and therefore
/// cleared). Artifacts are returned in sweep order, each at its own path: an
/// entry whose name is already taken gets its sweep index appended.
pub fn write_sweep(
    result: &SweepResult,
    root: &Path,
    format: OutputFormat,
) -> AppResult<Vec<WrittenArtifact>> {
    let span = observability::output_span("write_sweep", &root.display().to_string());
    let _enter = span.enter();

    let mut categories: Vec<&'static str> = Vec::new();
    for entry in result {
        let category = entry.parameters.category();
        if !categories.contains(&category) {
            categories.push(category);
        }
    }

    let mut directories = Vec::with_capacity(categories.len());
    for category in &categories {
        directories.push((*category, prepare_category_dir(root, category)?));
    }

    let mut artifacts = Vec::with_capacity(result.len());
    let mut taken: HashSet<PathBuf> = HashSet::with_capacity(result.len());
    for (index, entry) in result.iter().enumerate() {
        let category = entry.parameters.category();
        let directory = directories
            .iter()
            .find(|(name, _)| *name == category)
            .map(|(_, path)| path)
            .ok_or_else(|| AppError::Internal(format!("No directory prepared for {}", category)))?;

        let mut path = directory.join(artifact_file_name(&entry.parameters, format));
        if taken.contains(&path) {
            path = directory.join(indexed_artifact_file_name(&entry.parameters, index, format));
            warn!(
                label = %entry.label,
                path = %path.display(),
                "Artifact name already used in this sweep, writing with index suffix"
            );
        }
        if !taken.insert(path.clone()) {
            return Err(AppError::Internal(format!(
                "Artifact path {} is used by more than one entry",
                path.display()
            )));
        }
        entry
            .output
            .to_gray_image()
            .save_with_format(&path, format.image_format())
            .map_err(|e| {
                error_logging::log_image_error(&e, "encode", path.to_str());
                AppError::Image(format!("Failed to write {}: {}", path.display(), e))
            })?;

        let bytes = fs::metadata(&path)?.len();
        debug!(label = %entry.label, path = %path.display(), bytes, "Artifact written");
        artifacts.push(WrittenArtifact {
            label: entry.label.clone(),
            parameters: entry.parameters,
            path,
            bytes,
        });
    }

    for category in &categories {
        let written: Vec<&WrittenArtifact> = artifacts
            .iter()
            .filter(|artifact| artifact.parameters.category() == *category)
            .collect();
        let bytes = written.iter().map(|artifact| artifact.bytes).sum();
        observability::record_artifact_metrics(category, written.len(), bytes);
    }

    info!(
        root = %root.display(),
        artifacts = artifacts.len(),
        categories = ?categories,
        "Sweep artifacts written"
    );
    Ok(artifacts)
}

/// Writes `manifest.json` describing every artifact of a sweep.
pub fn write_manifest(
    root: &Path,
    source: &Path,
    dimensions: (usize, usize),
    artifacts: &[WrittenArtifact],
) -> AppResult<PathBuf> {
    let manifest = SweepManifest {
        source: source.display().to_string(),
        width: dimensions.0,
        height: dimensions.1,
        generated_at: Utc::now(),
        entries: artifacts,
    };

    fs::create_dir_all(root)?;
    let path = root.join(MANIFEST_FILE_NAME);
    let content = serde_json::to_string_pretty(&manifest)?;
    fs::write(&path, content).map_err(|e| {
        error_logging::log_filesystem_error(&e, "write_manifest", path.to_str(), None);
        AppError::FileSystem(format!("Failed to write {}: {}", path.display(), e))
    })?;

    info!(path = %path.display(), entries = artifacts.len(), "Sweep manifest written");
    Ok(path)
}
