//! # Adaptive Thresholding Module
//!
//! Sauvola binarization: every pixel is compared against a threshold derived
//! from the mean and standard deviation of its own neighborhood, so shadowed
//! and brightly lit regions of a page are each judged locally.

use tracing;

use super::integral::IntegralStatistics;
use super::types::{validate_window, BinarizationError, PixelBuffer};

/// Assumed maximum local standard deviation for 8-bit grayscale.
pub const DEFAULT_DYNAMIC_RANGE: f64 = 128.0;

/// Sauvola binarization with statistics built from `buffer`.
///
/// `T(r, c) = mean * (1 + k * (stddev / dynamic_range - 1))`; pixels strictly
/// above `T` become 255, the rest 0. Parameters are validated before any
/// statistics are built.
///
/// # Arguments
///
/// * `buffer` - Grayscale source, left untouched
/// * `window_size` - Odd neighborhood side, at least 3 and at most `min(width, height)`
/// * `k` - Sensitivity, conventionally in (0, 1]
/// * `dynamic_range` - Normalizer for the deviation; `None` uses [`DEFAULT_DYNAMIC_RANGE`]
///
/// # Examples
///
/// ```
/// use doc_binarize::binarization::{sauvola_threshold, PixelBuffer};
///
/// let mut rows = vec![vec![100u8; 4]; 4];
/// rows[2][2] = 10;
/// let buffer = PixelBuffer::from_rows(rows).unwrap();
///
/// let binary = sauvola_threshold(&buffer, 3, 0.3, None).unwrap();
/// assert_eq!(binary.get(2, 2), Some(0));
/// assert_eq!(binary.get(0, 0), Some(255));
/// ```
pub fn sauvola_threshold(
    buffer: &PixelBuffer,
    window_size: usize,
    k: f64,
    dynamic_range: Option<f64>,
) -> Result<PixelBuffer, BinarizationError> {
    let dynamic_range = dynamic_range.unwrap_or(DEFAULT_DYNAMIC_RANGE);
    validate_sauvola_params(buffer, window_size, k, dynamic_range)?;

    let stats = IntegralStatistics::build(buffer)?;
    sauvola_threshold_with_stats(buffer, &stats, window_size, k, dynamic_range)
}

/// Sauvola binarization reusing statistics built earlier for the same buffer.
///
/// A sweep builds one [`IntegralStatistics`] per source image and shares it
/// across every window size and `k`.
pub fn sauvola_threshold_with_stats(
    buffer: &PixelBuffer,
    stats: &IntegralStatistics,
    window_size: usize,
    k: f64,
    dynamic_range: f64,
) -> Result<PixelBuffer, BinarizationError> {
    let start_time = std::time::Instant::now();

    validate_sauvola_params(buffer, window_size, k, dynamic_range)?;
    if stats.width() != buffer.width() || stats.height() != buffer.height() {
        return Err(BinarizationError::StatisticsMismatch {
            buffer: (buffer.width(), buffer.height()),
            statistics: (stats.width(), stats.height()),
        });
    }

    let half = window_size / 2;
    let output = buffer.map_indexed(|row, col, intensity| {
        let window = stats.window_stats_unchecked(row, col, half);
        let threshold = window.mean * (1.0 + k * (window.stddev / dynamic_range - 1.0));
        if f64::from(intensity) > threshold {
            255
        } else {
            0
        }
    });

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "binarization",
        "Sauvola thresholding completed in {:.2}ms: window={}, k={:.2}, R={}, dimensions={}x{}",
        processing_time.as_secs_f64() * 1000.0,
        window_size,
        k,
        dynamic_range,
        buffer.width(),
        buffer.height()
    );
    crate::observability::record_binarization_metrics("sauvola", processing_time);

    Ok(output)
}

fn validate_sauvola_params(
    buffer: &PixelBuffer,
    window_size: usize,
    k: f64,
    dynamic_range: f64,
) -> Result<(), BinarizationError> {
    buffer.ensure_not_empty()?;
    validate_window(window_size, buffer.width(), buffer.height())?;
    if !k.is_finite() {
        return Err(BinarizationError::InvalidK { k });
    }
    if !dynamic_range.is_finite() || dynamic_range <= 0.0 {
        return Err(BinarizationError::InvalidDynamicRange { dynamic_range });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dark_dot_buffer() -> PixelBuffer {
        PixelBuffer::from_fn(4, 4, |r, c| if (r, c) == (2, 2) { 10 } else { 100 })
    }

    #[test]
    fn test_dark_pixel_against_its_neighborhood() {
        let output = sauvola_threshold(&dark_dot_buffer(), 3, 0.3, Some(128.0)).unwrap();

        for row in 0..4 {
            for col in 0..4 {
                let expected = if (row, col) == (2, 2) { 0 } else { 255 };
                assert_eq!(output.get(row, col), Some(expected), "pixel ({row}, {col})");
            }
        }
    }

    #[test]
    fn test_flat_region_stays_white() {
        // stddev = 0 gives T = mean * (1 - k), below the pixel itself
        let output = sauvola_threshold(&PixelBuffer::filled(9, 9, 180), 5, 0.5, None).unwrap();
        assert!(output.as_slice().iter().all(|&v| v == 255));
    }

    #[test]
    fn test_black_page_stays_black() {
        let output = sauvola_threshold(&PixelBuffer::filled(9, 9, 0), 5, 0.5, None).unwrap();
        assert!(output.as_slice().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_rejects_even_window_before_computing() {
        let err = sauvola_threshold(&dark_dot_buffer(), 2, 0.3, None).unwrap_err();
        assert_eq!(err, BinarizationError::WindowTooSmall { window_size: 2 });

        let buffer = PixelBuffer::filled(10, 10, 50);
        let err = sauvola_threshold(&buffer, 4, 0.3, None).unwrap_err();
        assert_eq!(err, BinarizationError::EvenWindowSize { window_size: 4 });
    }

    #[test]
    fn test_rejects_window_larger_than_image() {
        let err = sauvola_threshold(&dark_dot_buffer(), 5, 0.3, None).unwrap_err();
        assert_eq!(
            err,
            BinarizationError::WindowExceedsImage {
                window_size: 5,
                width: 4,
                height: 4
            }
        );
    }

    #[test]
    fn test_rejects_bad_dynamic_range() {
        for dynamic_range in [0.0, -1.0, f64::INFINITY] {
            assert!(matches!(
                sauvola_threshold(&dark_dot_buffer(), 3, 0.3, Some(dynamic_range)),
                Err(BinarizationError::InvalidDynamicRange { .. })
            ));
        }
    }

    #[test]
    fn test_with_stats_rejects_foreign_statistics() {
        let stats = IntegralStatistics::build(&PixelBuffer::filled(5, 5, 0)).unwrap();
        let err =
            sauvola_threshold_with_stats(&dark_dot_buffer(), &stats, 3, 0.3, 128.0).unwrap_err();
        assert!(matches!(err, BinarizationError::StatisticsMismatch { .. }));
    }

    #[test]
    fn test_with_stats_matches_one_shot() {
        let buffer = PixelBuffer::from_fn(12, 9, |r, c| ((r * 37 + c * 11) % 256) as u8);
        let stats = IntegralStatistics::build(&buffer).unwrap();

        for window_size in [3, 5, 9] {
            let shared =
                sauvola_threshold_with_stats(&buffer, &stats, window_size, 0.2, 128.0).unwrap();
            let fresh = sauvola_threshold(&buffer, window_size, 0.2, None).unwrap();
            assert_eq!(shared, fresh);
        }
    }
}
