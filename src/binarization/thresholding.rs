//! # Global Thresholding Module
//!
//! Binarization with one scalar threshold for the whole image, either supplied
//! by the caller or selected with Otsu's method.

use tracing;

use super::types::{BinarizationError, OtsuOutcome, PixelBuffer};

/// Binarizes `buffer` with a single cutoff: pixels strictly above `value`
/// become 255, all others 0.
pub fn apply_global_threshold(buffer: &PixelBuffer, value: u8) -> PixelBuffer {
    buffer.map_indexed(|_, _, intensity| if intensity > value { 255 } else { 0 })
}

/// Applies a global threshold, computing it with Otsu's method when `value` is `None`.
///
/// # Arguments
///
/// * `buffer` - Grayscale source, left untouched
/// * `value` - Explicit threshold; `None` runs the histogram search
///
/// # Examples
///
/// ```
/// use doc_binarize::binarization::{otsu_threshold, PixelBuffer};
///
/// let buffer = PixelBuffer::from_rows(vec![vec![20, 20, 220, 220]]).unwrap();
/// let explicit = otsu_threshold(&buffer, Some(100)).unwrap();
/// assert_eq!(explicit.image.as_slice(), &[0, 0, 255, 255]);
///
/// let computed = otsu_threshold(&buffer, None).unwrap();
/// assert!(computed.computed);
/// assert_eq!(computed.image.as_slice(), &[0, 0, 255, 255]);
/// ```
pub fn otsu_threshold(
    buffer: &PixelBuffer,
    value: Option<u8>,
) -> Result<OtsuOutcome, BinarizationError> {
    let start_time = std::time::Instant::now();

    buffer.ensure_not_empty()?;

    let (threshold, computed) = match value {
        Some(explicit) => (explicit, false),
        None => (compute_otsu_threshold(buffer)?, true),
    };

    let image = apply_global_threshold(buffer, threshold);

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "binarization",
        "Otsu thresholding completed in {:.2}ms: threshold={}, computed={}, dimensions={}x{}",
        processing_time.as_secs_f64() * 1000.0,
        threshold,
        computed,
        buffer.width(),
        buffer.height()
    );
    crate::observability::record_binarization_metrics("otsu", processing_time);

    Ok(OtsuOutcome {
        image,
        threshold,
        computed,
    })
}

/// Selects the threshold that maximizes between-class variance.
///
/// Class 0 holds intensities `<= t`. Ties resolve to the smallest `t`, and a
/// single-valued histogram yields 0 rather than an error.
pub fn compute_otsu_threshold(buffer: &PixelBuffer) -> Result<u8, BinarizationError> {
    buffer.ensure_not_empty()?;

    let mut histogram = [0u64; 256];
    for &intensity in buffer.as_slice() {
        histogram[intensity as usize] += 1;
    }

    Ok(find_otsu_threshold(&histogram, buffer.area() as f64))
}

/// Otsu search over a 256-bin histogram.
fn find_otsu_threshold(histogram: &[u64; 256], total_pixels: f64) -> u8 {
    // Pre-calculate cumulative statistics
    let mut cumulative_sums = [0f64; 256];
    let mut cumulative_weighted_sums = [0f64; 256];
    let mut cumulative_sum = 0f64;
    let mut cumulative_weighted_sum = 0f64;

    for (i, &count) in histogram.iter().enumerate() {
        let pixel_count = count as f64;
        cumulative_sum += pixel_count;
        cumulative_weighted_sum += (i as f64) * pixel_count;

        cumulative_sums[i] = cumulative_sum;
        cumulative_weighted_sums[i] = cumulative_weighted_sum;
    }

    let total_weighted_sum = cumulative_weighted_sums[255];

    let mut max_variance = -1f64;
    let mut optimal_threshold = 0u8;

    for threshold in 0..=255usize {
        let background_count = cumulative_sums[threshold];
        let foreground_count = total_pixels - background_count;

        // An empty class contributes no separation
        let variance = if background_count == 0.0 || foreground_count == 0.0 {
            0.0
        } else {
            let w0 = background_count / total_pixels;
            let w1 = foreground_count / total_pixels;
            let mu0 = cumulative_weighted_sums[threshold] / background_count;
            let mu1 = (total_weighted_sum - cumulative_weighted_sums[threshold]) / foreground_count;
            w0 * w1 * (mu0 - mu1).powi(2)
        };

        // Strict comparison keeps the smallest threshold on ties
        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold as u8;
        }
    }

    optimal_threshold
}
