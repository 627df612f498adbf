//! # Test Helper Library
//!
//! Synthetic pages shared by the integration tests.

#![allow(dead_code)]

use doc_binarize::binarization::PixelBuffer;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const PAGE_WIDTH: usize = 60;
pub const PAGE_HEIGHT: usize = 30;
/// Column where the lit half of the page meets the shadowed half
pub const SHADOW_EDGE: usize = 30;

/// Buffer of random intensities, reproducible from `seed`
pub fn random_buffer(seed: u64, width: usize, height: usize) -> PixelBuffer {
    let mut rng = StdRng::seed_from_u64(seed);
    PixelBuffer::from_fn(width, height, |_, _| rng.random::<u8>())
}

/// Left half intensity `left`, right half intensity `right`
pub fn two_region_buffer(width: usize, height: usize, left: u8, right: u8) -> PixelBuffer {
    PixelBuffer::from_fn(width, height, |_, c| if c < width / 2 { left } else { right })
}

/// 4x4 page of 100s with a single dark pixel at (2, 2)
pub fn dark_dot_buffer() -> PixelBuffer {
    PixelBuffer::from_fn(4, 4, |r, c| if (r, c) == (2, 2) { 10 } else { 100 })
}

/// Whether `(row, col)` lies on a pen stroke of [`shadowed_page`]
pub fn is_stroke(row: usize, col: usize) -> bool {
    let on_stroke_rows = (5..25).contains(&row);
    let lit_stroke = (10..13).contains(&col);
    let shadowed_stroke = (45..48).contains(&col);
    on_stroke_rows && (lit_stroke || shadowed_stroke)
}

/// Page with a lit half (paper 220, ink 100) and a shadowed half (paper 80, ink 40)
pub fn shadowed_page() -> PixelBuffer {
    PixelBuffer::from_fn(PAGE_WIDTH, PAGE_HEIGHT, |r, c| {
        let lit = c < SHADOW_EDGE;
        match (lit, is_stroke(r, c)) {
            (true, true) => 100,
            (true, false) => 220,
            (false, true) => 40,
            (false, false) => 80,
        }
    })
}

/// Expected binarization of [`shadowed_page`]: ink black, paper white
pub fn expected_ink(row: usize, col: usize) -> u8 {
    if is_stroke(row, col) {
        0
    } else {
        255
    }
}

/// Columns whose `window_size` neighborhood stays inside one half of the page
pub fn single_lighting_columns(window_size: usize) -> impl Iterator<Item = usize> {
    let half = window_size / 2;
    (0..PAGE_WIDTH).filter(move |&c| c + half < SHADOW_EDGE || c >= SHADOW_EDGE + half)
}
