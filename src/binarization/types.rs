//! # Shared Types for Binarization
//!
//! This module contains the pixel buffer, the threshold parameter variants and
//! the error type shared by the thresholding sub-modules.

use image::GrayImage;
use serde::{Deserialize, Serialize};

/// Errors that can occur while validating or running a binarization.
#[derive(Debug, Clone, PartialEq)]
pub enum BinarizationError {
    /// Buffer has zero width or zero height
    EmptyBuffer { width: usize, height: usize },
    /// Raw data length does not match width * height
    BufferSizeMismatch { expected: usize, actual: usize },
    /// A row differs in length from the first row
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },
    /// Sauvola window must be odd so it is symmetric around the pixel
    EvenWindowSize { window_size: usize },
    /// Window smaller than the 3x3 minimum
    WindowTooSmall { window_size: usize },
    /// Window larger than the smaller image dimension
    WindowExceedsImage {
        window_size: usize,
        width: usize,
        height: usize,
    },
    /// Sauvola k is NaN or infinite
    InvalidK { k: f64 },
    /// Dynamic range is not a finite positive number
    InvalidDynamicRange { dynamic_range: f64 },
    /// Coordinates fall outside the buffer
    PixelOutOfBounds {
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },
    /// Integral statistics were built for a buffer of different dimensions
    StatisticsMismatch {
        buffer: (usize, usize),
        statistics: (usize, usize),
    },
    /// A sweep entry failed; carries the entry position and its label
    SweepEntry {
        index: usize,
        label: String,
        source: Box<BinarizationError>,
    },
    /// Sweep stopped by its cancellation token
    Cancelled { completed: usize },
    /// A worker task panicked or was aborted
    WorkerFailed { message: String },
}

impl std::fmt::Display for BinarizationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BinarizationError::EmptyBuffer { width, height } => {
                write!(f, "Buffer has zero area: {}x{}", width, height)
            }
            BinarizationError::BufferSizeMismatch { expected, actual } => {
                write!(
                    f,
                    "Buffer data length {} does not match dimensions (expected {})",
                    actual, expected
                )
            }
            BinarizationError::RaggedRows {
                row,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Row {} has length {}, expected {} like the first row",
                    row, actual, expected
                )
            }
            BinarizationError::EvenWindowSize { window_size } => {
                write!(
                    f,
                    "Invalid window size: {}. Sauvola window must be odd",
                    window_size
                )
            }
            BinarizationError::WindowTooSmall { window_size } => {
                write!(
                    f,
                    "Invalid window size: {}. Must be at least 3",
                    window_size
                )
            }
            BinarizationError::WindowExceedsImage {
                window_size,
                width,
                height,
            } => {
                write!(
                    f,
                    "Window size {} exceeds image dimensions {}x{}",
                    window_size, width, height
                )
            }
            BinarizationError::InvalidK { k } => {
                write!(f, "Invalid Sauvola k: {}. Must be a finite number", k)
            }
            BinarizationError::InvalidDynamicRange { dynamic_range } => {
                write!(
                    f,
                    "Invalid dynamic range: {}. Must be finite and greater than 0",
                    dynamic_range
                )
            }
            BinarizationError::PixelOutOfBounds {
                row,
                col,
                width,
                height,
            } => {
                write!(
                    f,
                    "Pixel ({}, {}) is outside the {}x{} buffer",
                    row, col, width, height
                )
            }
            BinarizationError::StatisticsMismatch { buffer, statistics } => {
                write!(
                    f,
                    "Statistics built for {}x{} cannot serve a {}x{} buffer",
                    statistics.0, statistics.1, buffer.0, buffer.1
                )
            }
            BinarizationError::SweepEntry {
                index,
                label,
                source,
            } => {
                write!(f, "Sweep entry {} ({}) failed: {}", index, label, source)
            }
            BinarizationError::Cancelled { completed } => {
                write!(f, "Sweep cancelled after {} completed entries", completed)
            }
            BinarizationError::WorkerFailed { message } => {
                write!(f, "Sweep worker failed: {}", message)
            }
        }
    }
}

impl std::error::Error for BinarizationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BinarizationError::SweepEntry { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Row-major grid of 8-bit intensities.
///
/// Buffers are never modified by thresholding; every operation returns a new
/// buffer so a sweep can start each combination from the same source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PixelBuffer {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw row-major data, checking that its length matches the dimensions.
    pub fn new(width: usize, height: usize, data: Vec<u8>) -> Result<Self, BinarizationError> {
        let expected = width * height;
        if data.len() != expected {
            return Err(BinarizationError::BufferSizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Creates a buffer with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width * height],
        }
    }

    /// Builds a buffer from explicit rows. All rows must share the first row's length.
    ///
    /// # Examples
    ///
    /// ```
    /// use doc_binarize::binarization::PixelBuffer;
    ///
    /// let buffer = PixelBuffer::from_rows(vec![vec![0, 10], vec![20, 30]]).unwrap();
    /// assert_eq!(buffer.get(1, 0), Some(20));
    /// assert!(PixelBuffer::from_rows(vec![vec![0, 10], vec![20]]).is_err());
    /// ```
    pub fn from_rows(rows: Vec<Vec<u8>>) -> Result<Self, BinarizationError> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(width * height);
        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(BinarizationError::RaggedRows {
                    row,
                    expected: width,
                    actual: values.len(),
                });
            }
            data.extend(values);
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Builds a buffer by evaluating `f(row, col)` for every cell.
    pub fn from_fn(width: usize, height: usize, mut f: impl FnMut(usize, usize) -> u8) -> Self {
        let mut data = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                data.push(f(row, col));
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of pixels.
    pub fn area(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checked pixel access.
    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        if row < self.height && col < self.width {
            Some(self.data[row * self.width + col])
        } else {
            None
        }
    }

    /// Row-major pixel data.
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
        // chunks_exact panics on 0; an empty-width buffer has no rows to yield
        self.data.chunks_exact(self.width.max(1))
    }

    /// Fails with [`BinarizationError::EmptyBuffer`] when the buffer has no pixels.
    pub fn ensure_not_empty(&self) -> Result<(), BinarizationError> {
        if self.width == 0 || self.height == 0 {
            return Err(BinarizationError::EmptyBuffer {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    /// Applies `f` to every pixel, producing a new buffer of the same size.
    pub(crate) fn map_indexed(&self, mut f: impl FnMut(usize, usize, u8) -> u8) -> Self {
        let mut data = Vec::with_capacity(self.data.len());
        for row in 0..self.height {
            let start = row * self.width;
            for (col, &value) in self.data[start..start + self.width].iter().enumerate() {
                data.push(f(row, col, value));
            }
        }
        Self {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Converts to an `image` crate grayscale image for encoding.
    pub fn to_gray_image(&self) -> GrayImage {
        // Dimensions come from a validated buffer, so the length always matches
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            image::Luma([self.data[y as usize * self.width + x as usize]])
        })
    }
}

impl From<&GrayImage> for PixelBuffer {
    fn from(image: &GrayImage) -> Self {
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data: image.as_raw().clone(),
        }
    }
}

impl From<GrayImage> for PixelBuffer {
    fn from(image: GrayImage) -> Self {
        let width = image.width() as usize;
        let height = image.height() as usize;
        Self {
            width,
            height,
            data: image.into_raw(),
        }
    }
}

/// Window size and sensitivity for one Sauvola run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SauvolaParams {
    /// Side of the square neighborhood, odd and at least 3
    pub window_size: usize,
    /// Sensitivity, conventionally in (0, 1]
    pub k: f64,
}

impl SauvolaParams {
    pub fn new(window_size: usize, k: f64) -> Self {
        Self { window_size, k }
    }
}

/// Parameters of a single thresholding run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ThresholdParameters {
    /// Global threshold applied uniformly
    Otsu { threshold: u8 },
    /// Local threshold from windowed mean and deviation
    Sauvola { window_size: usize, k: f64 },
}

impl ThresholdParameters {
    /// Checks the parameters against a buffer without touching its pixels.
    pub fn validate_for(&self, buffer: &PixelBuffer) -> Result<(), BinarizationError> {
        buffer.ensure_not_empty()?;
        match *self {
            ThresholdParameters::Otsu { .. } => Ok(()),
            ThresholdParameters::Sauvola { window_size, k } => {
                validate_window(window_size, buffer.width(), buffer.height())?;
                if !k.is_finite() {
                    return Err(BinarizationError::InvalidK { k });
                }
                Ok(())
            }
        }
    }

    /// Human-readable label. The format is relied on by downstream tooling.
    ///
    /// ```
    /// use doc_binarize::binarization::ThresholdParameters;
    ///
    /// let params = ThresholdParameters::Sauvola { window_size: 21, k: 0.4 };
    /// assert_eq!(params.label(), "Sauvola window=21 k=0.40");
    /// assert_eq!(ThresholdParameters::Otsu { threshold: 90 }.label(), "Otsu threshold=90");
    /// ```
    pub fn label(&self) -> String {
        match *self {
            ThresholdParameters::Otsu { threshold } => format!("Otsu threshold={}", threshold),
            ThresholdParameters::Sauvola { window_size, k } => {
                format!("Sauvola window={} k={}", window_size, format_k(k))
            }
        }
    }

    /// File stem used when the result is written to disk.
    pub fn file_stem(&self) -> String {
        match *self {
            ThresholdParameters::Otsu { threshold } => {
                format!("otsu_binarization_threshold{}", threshold)
            }
            ThresholdParameters::Sauvola { window_size, k } => {
                format!("sauvola_binarization_w{}_k{}", window_size, format_k(k))
            }
        }
    }

    /// Output sub-directory for this family.
    pub fn category(&self) -> &'static str {
        match self {
            ThresholdParameters::Otsu { .. } => "otsu",
            ThresholdParameters::Sauvola { .. } => "sauvola",
        }
    }
}

/// Shortest round-trip form of `k`, padded to at least two decimals.
fn format_k(k: f64) -> String {
    let mut formatted = k.to_string();
    match formatted.find('.') {
        Some(dot) => {
            let decimals = formatted.len() - dot - 1;
            for _ in decimals..2 {
                formatted.push('0');
            }
        }
        None if k.is_finite() => formatted.push_str(".00"),
        None => {}
    }
    formatted
}

impl From<SauvolaParams> for ThresholdParameters {
    fn from(params: SauvolaParams) -> Self {
        ThresholdParameters::Sauvola {
            window_size: params.window_size,
            k: params.k,
        }
    }
}

/// Window must be odd, at least 3, and fit inside the image.
pub(crate) fn validate_window(
    window_size: usize,
    width: usize,
    height: usize,
) -> Result<(), BinarizationError> {
    if window_size < 3 {
        return Err(BinarizationError::WindowTooSmall { window_size });
    }
    if window_size % 2 == 0 {
        return Err(BinarizationError::EvenWindowSize { window_size });
    }
    if window_size > width.min(height) {
        return Err(BinarizationError::WindowExceedsImage {
            window_size,
            width,
            height,
        });
    }
    Ok(())
}

/// Result of a global thresholding run.
#[derive(Debug, Clone)]
pub struct OtsuOutcome {
    /// The binary image
    pub image: PixelBuffer,
    /// Threshold that was applied, explicit or computed
    pub threshold: u8,
    /// Whether the threshold came from the histogram search
    pub computed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_wrong_length() {
        let err = PixelBuffer::new(3, 2, vec![0; 5]).unwrap_err();
        assert_eq!(
            err,
            BinarizationError::BufferSizeMismatch {
                expected: 6,
                actual: 5
            }
        );
    }

    #[test]
    fn test_get_is_bounds_checked() {
        let buffer = PixelBuffer::filled(4, 3, 9);
        assert_eq!(buffer.get(2, 3), Some(9));
        assert_eq!(buffer.get(3, 0), None);
        assert_eq!(buffer.get(0, 4), None);
    }

    #[test]
    fn test_from_rows_reports_ragged_row() {
        let err = PixelBuffer::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6], vec![7]]).unwrap_err();
        assert_eq!(
            err,
            BinarizationError::RaggedRows {
                row: 2,
                expected: 3,
                actual: 1
            }
        );
    }

    #[test]
    fn test_gray_image_conversion_preserves_layout() {
        let buffer = PixelBuffer::from_fn(5, 3, |r, c| (r * 10 + c) as u8);
        let image = buffer.to_gray_image();
        assert_eq!(image.get_pixel(4, 2)[0], 24);
        assert_eq!(PixelBuffer::from(&image), buffer);
    }

    #[test]
    fn test_validate_window() {
        assert!(validate_window(3, 10, 10).is_ok());
        assert_eq!(
            validate_window(1, 10, 10),
            Err(BinarizationError::WindowTooSmall { window_size: 1 })
        );
        assert_eq!(
            validate_window(4, 10, 10),
            Err(BinarizationError::EvenWindowSize { window_size: 4 })
        );
        assert_eq!(
            validate_window(11, 20, 10),
            Err(BinarizationError::WindowExceedsImage {
                window_size: 11,
                width: 20,
                height: 10
            })
        );
    }

    #[test]
    fn test_labels_and_stems() {
        let otsu = ThresholdParameters::Otsu { threshold: 120 };
        assert_eq!(otsu.file_stem(), "otsu_binarization_threshold120");
        assert_eq!(otsu.category(), "otsu");

        let sauvola = ThresholdParameters::from(SauvolaParams::new(15, 0.4));
        assert_eq!(sauvola.label(), "Sauvola window=15 k=0.40");
        assert_eq!(sauvola.file_stem(), "sauvola_binarization_w15_k0.40");
        assert_eq!(sauvola.category(), "sauvola");
    }

    #[test]
    fn test_k_is_formatted_without_rounding() {
        assert_eq!(format_k(0.4), "0.40");
        assert_eq!(format_k(1.0), "1.00");
        assert_eq!(format_k(0.25), "0.25");
        assert_eq!(format_k(0.341), "0.341");

        let a = ThresholdParameters::from(SauvolaParams::new(11, 0.341));
        let b = ThresholdParameters::from(SauvolaParams::new(11, 0.344));
        assert_eq!(a.label(), "Sauvola window=11 k=0.341");
        assert_ne!(a.label(), b.label());
        assert_ne!(a.file_stem(), b.file_stem());
    }

    #[test]
    fn test_validate_for_rejects_non_finite_k() {
        let buffer = PixelBuffer::filled(8, 8, 0);
        let params = ThresholdParameters::Sauvola {
            window_size: 3,
            k: f64::NAN,
        };
        assert!(matches!(
            params.validate_for(&buffer),
            Err(BinarizationError::InvalidK { .. })
        ));
    }

    #[test]
    fn test_sweep_entry_error_exposes_source() {
        use std::error::Error;
        let err = BinarizationError::SweepEntry {
            index: 2,
            label: "Sauvola window=4 k=0.40".to_string(),
            source: Box::new(BinarizationError::EvenWindowSize { window_size: 4 }),
        };
        assert!(err.to_string().contains("Sweep entry 2"));
        assert!(err.source().is_some());
    }
}
