//! # Integral Image Statistics
//!
//! Prefix-sum tables over a [`PixelBuffer`] for constant-time mean and
//! standard deviation over any axis-aligned window.

use super::types::{BinarizationError, PixelBuffer};

/// Mean and standard deviation of one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub mean: f64,
    pub stddev: f64,
}

/// Summed-area tables for intensity and squared intensity.
///
/// Both tables are `(height + 1) x (width + 1)` with a zero first row and
/// column, so `sum[i][j]` covers the pixels in `[0, i) x [0, j)`.
#[derive(Debug, Clone)]
pub struct IntegralStatistics {
    width: usize,
    height: usize,
    sum: Vec<u64>,
    sum_squares: Vec<u64>,
}

impl IntegralStatistics {
    /// Builds both tables in one pass over the buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use doc_binarize::binarization::{IntegralStatistics, PixelBuffer};
    ///
    /// let buffer = PixelBuffer::from_rows(vec![vec![1, 2], vec![3, 4]]).unwrap();
    /// let stats = IntegralStatistics::build(&buffer).unwrap();
    /// assert_eq!(stats.rect_sum(0, 0, 2, 2), 10);
    /// assert_eq!(stats.rect_sum_squares(1, 0, 2, 2), 25);
    /// ```
    pub fn build(buffer: &PixelBuffer) -> Result<Self, BinarizationError> {
        buffer.ensure_not_empty()?;

        let width = buffer.width();
        let height = buffer.height();
        let stride = width + 1;
        let mut sum = vec![0u64; stride * (height + 1)];
        let mut sum_squares = vec![0u64; stride * (height + 1)];

        for (r, row) in buffer.rows().enumerate() {
            let i = r + 1;
            for (c, &value) in row.iter().enumerate() {
                let j = c + 1;
                let v = value as u64;
                let here = i * stride + j;
                let up = (i - 1) * stride + j;
                let left = i * stride + (j - 1);
                let diag = (i - 1) * stride + (j - 1);

                sum[here] = sum[up] + sum[left] - sum[diag] + v;
                sum_squares[here] = sum_squares[up] + sum_squares[left] - sum_squares[diag] + v * v;
            }
        }

        tracing::trace!(
            target: "binarization",
            width,
            height,
            "Integral statistics built"
        );

        Ok(Self {
            width,
            height,
            sum,
            sum_squares,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Sum of intensities over the half-open rectangle `[r0, r1) x [c0, c1)`.
    pub fn rect_sum(&self, r0: usize, c0: usize, r1: usize, c1: usize) -> u64 {
        Self::lookup(&self.sum, self.width + 1, r0, c0, r1, c1)
    }

    /// Sum of squared intensities over `[r0, r1) x [c0, c1)`.
    pub fn rect_sum_squares(&self, r0: usize, c0: usize, r1: usize, c1: usize) -> u64 {
        Self::lookup(&self.sum_squares, self.width + 1, r0, c0, r1, c1)
    }

    fn lookup(table: &[u64], stride: usize, r0: usize, c0: usize, r1: usize, c1: usize) -> u64 {
        // Add before subtracting: the table is monotone so this never underflows
        table[r1 * stride + c1] + table[r0 * stride + c0]
            - table[r0 * stride + c1]
            - table[r1 * stride + c0]
    }

    /// Statistics of the `window_size` square centered on `(center_row, center_col)`.
    ///
    /// Near the border the window is clamped to the buffer and shrinks rather
    /// than wrapping, so corner pixels are measured over a smaller area.
    pub fn window_stats(
        &self,
        center_row: usize,
        center_col: usize,
        window_size: usize,
    ) -> Result<WindowStats, BinarizationError> {
        if center_row >= self.height || center_col >= self.width {
            return Err(BinarizationError::PixelOutOfBounds {
                row: center_row,
                col: center_col,
                width: self.width,
                height: self.height,
            });
        }
        if window_size == 0 {
            return Err(BinarizationError::WindowTooSmall { window_size });
        }
        Ok(self.window_stats_unchecked(center_row, center_col, window_size / 2))
    }

    /// Hot-path variant: the caller guarantees the center is in bounds.
    pub(crate) fn window_stats_unchecked(
        &self,
        center_row: usize,
        center_col: usize,
        half: usize,
    ) -> WindowStats {
        let r0 = center_row.saturating_sub(half);
        let c0 = center_col.saturating_sub(half);
        let r1 = (center_row + half + 1).min(self.height);
        let c1 = (center_col + half + 1).min(self.width);

        let area = ((r1 - r0) * (c1 - c0)) as f64;
        let mean = self.rect_sum(r0, c0, r1, c1) as f64 / area;
        let mean_square = self.rect_sum_squares(r0, c0, r1, c1) as f64 / area;
        let variance = (mean_square - mean * mean).max(0.0);

        WindowStats {
            mean,
            stddev: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_buffer() -> PixelBuffer {
        PixelBuffer::from_fn(6, 4, |r, c| (r * 6 + c) as u8)
    }

    #[test]
    fn test_build_rejects_empty_buffer() {
        let buffer = PixelBuffer::new(0, 5, Vec::new()).unwrap();
        assert_eq!(
            IntegralStatistics::build(&buffer).unwrap_err(),
            BinarizationError::EmptyBuffer {
                width: 0,
                height: 5
            }
        );
    }

    #[test]
    fn test_rect_sum_matches_naive_sum() {
        let buffer = gradient_buffer();
        let stats = IntegralStatistics::build(&buffer).unwrap();

        for r0 in 0..=4 {
            for r1 in r0..=4 {
                for c0 in 0..=6 {
                    for c1 in c0..=6 {
                        let mut expected = 0u64;
                        let mut expected_sq = 0u64;
                        for r in r0..r1 {
                            for c in c0..c1 {
                                let v = buffer.get(r, c).unwrap() as u64;
                                expected += v;
                                expected_sq += v * v;
                            }
                        }
                        assert_eq!(stats.rect_sum(r0, c0, r1, c1), expected);
                        assert_eq!(stats.rect_sum_squares(r0, c0, r1, c1), expected_sq);
                    }
                }
            }
        }
    }

    #[test]
    fn test_window_stats_interior() {
        let buffer = PixelBuffer::from_rows(vec![
            vec![0, 0, 0],
            vec![0, 90, 0],
            vec![0, 0, 0],
        ])
        .unwrap();
        let stats = IntegralStatistics::build(&buffer).unwrap();
        let window = stats.window_stats(1, 1, 3).unwrap();

        assert!((window.mean - 10.0).abs() < 1e-12);
        // E[x^2] = 8100 / 9 = 900, variance = 900 - 100 = 800
        assert!((window.stddev - 800f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_window_stats_clamps_at_corner() {
        let buffer = gradient_buffer();
        let stats = IntegralStatistics::build(&buffer).unwrap();

        // 5x5 window at (0, 0) covers rows 0..3 and cols 0..3
        let window = stats.window_stats(0, 0, 5).unwrap();
        let expected = [0, 1, 2, 6, 7, 8, 12, 13, 14].iter().sum::<u32>() as f64 / 9.0;
        assert!((window.mean - expected).abs() < 1e-12);
    }

    #[test]
    fn test_window_stats_rejects_out_of_bounds_center() {
        let stats = IntegralStatistics::build(&gradient_buffer()).unwrap();
        assert!(matches!(
            stats.window_stats(4, 0, 3),
            Err(BinarizationError::PixelOutOfBounds { .. })
        ));
        assert!(matches!(
            stats.window_stats(0, 6, 3),
            Err(BinarizationError::PixelOutOfBounds { .. })
        ));
        assert!(matches!(
            stats.window_stats(0, 0, 0),
            Err(BinarizationError::WindowTooSmall { .. })
        ));
    }

    #[test]
    fn test_constant_window_has_zero_stddev() {
        let stats = IntegralStatistics::build(&PixelBuffer::filled(7, 7, 255)).unwrap();
        let window = stats.window_stats(3, 3, 7).unwrap();
        assert_eq!(window.mean, 255.0);
        assert_eq!(window.stddev, 0.0);
    }
}
