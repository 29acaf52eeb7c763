use core::fmt;

use mm_core::{Image, ImageView};

use crate::conv::gaussian_blur_u8;
use crate::kernel::GaussianKernel1D;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    /// Adaptive block sizes must be odd and at least 3.
    InvalidBlockSize(usize),
}

impl fmt::Display for ThresholdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBlockSize(b) => {
                write!(f, "adaptive block size must be odd and >= 3, got {b}")
            }
        }
    }
}

impl std::error::Error for ThresholdError {}

/// Zeroes every pixel `>= cutoff` and keeps the rest unchanged.
pub fn threshold_to_zero_inv(src: &ImageView<'_, u8>, cutoff: u8) -> Image<u8> {
    map_pixels(src, |v| if v >= cutoff { 0 } else { v })
}

/// Sets every non-zero pixel to 255.
pub fn binarize_nonzero(src: &ImageView<'_, u8>) -> Image<u8> {
    map_pixels(src, |v| if v != 0 { 255 } else { 0 })
}

/// Marks pixels `<= level` as foreground.
pub fn threshold_binary_inv(src: &ImageView<'_, u8>, level: u8) -> Image<u8> {
    map_pixels(src, |v| if v > level { 0 } else { 255 })
}

/// Otsu's threshold: the level `t` maximizing the between-class variance of
/// `{v <= t}` and `{v > t}`. Ties keep the lowest level. Returns 0 for
/// images with fewer than two distinct values.
///
/// Same result as `imageproc::contrast::otsu_level`, but reads a strided
/// view directly so ROIs need no copy into a `GrayImage`.
pub fn otsu_level(src: &ImageView<'_, u8>) -> u8 {
    let mut hist = [0u64; 256];
    for y in 0..src.height() {
        for &v in src.row(y) {
            hist[v as usize] += 1;
        }
    }

    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0;
    }
    let total_sum: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut best_level = 0u8;
    let mut best_var = 0.0f64;
    let mut w0 = 0u64;
    let mut sum0 = 0.0f64;
    for (t, &count) in hist.iter().enumerate() {
        w0 += count;
        sum0 += t as f64 * count as f64;
        if w0 == 0 {
            continue;
        }
        let w1 = total - w0;
        if w1 == 0 {
            break;
        }

        let m0 = sum0 / w0 as f64;
        let m1 = (total_sum - sum0) / w1 as f64;
        let var = (w0 as f64) * (w1 as f64) * (m0 - m1).powi(2);
        if var > best_var {
            best_var = var;
            best_level = t as u8;
        }
    }

    best_level
}

/// Global inverse binarization at the Otsu level. Returns the level used.
pub fn threshold_otsu_inv(src: &ImageView<'_, u8>) -> (u8, Image<u8>) {
    let level = otsu_level(src);
    (level, threshold_binary_inv(src, level))
}

/// Adaptive inverse binarization against a Gaussian-weighted local mean.
///
/// A pixel is foreground when `v <= mean - c`, where `mean` is the rounded
/// Gaussian average over a `block x block` window (replicated borders).
/// Larger `c` demands more contrast before a pixel counts as foreground.
pub fn adaptive_threshold_gaussian_inv(
    src: &ImageView<'_, u8>,
    block: usize,
    c: f64,
) -> Result<Image<u8>, ThresholdError> {
    if block < 3 || block % 2 == 0 {
        return Err(ThresholdError::InvalidBlockSize(block));
    }

    let kernel = GaussianKernel1D::for_block(block);
    let mean = gaussian_blur_u8(src, &kernel);
    let delta = c.floor() as i32;

    let mut out = Image::new_fill(src.width(), src.height(), 0u8);
    for y in 0..src.height() {
        let row = src.row(y);
        let means = mean.row(y);
        for ((dst, &v), &m) in out.row_mut(y).iter_mut().zip(row).zip(means) {
            *dst = if (v as i32) - (m as i32) <= -delta { 255 } else { 0 };
        }
    }

    Ok(out)
}

fn map_pixels(src: &ImageView<'_, u8>, f: impl Fn(u8) -> u8) -> Image<u8> {
    let mut out = Image::new_fill(src.width(), src.height(), 0u8);
    for y in 0..src.height() {
        for (dst, &v) in out.row_mut(y).iter_mut().zip(src.row(y)) {
            *dst = f(v);
        }
    }
    out
}
