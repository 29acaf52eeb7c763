//! Background brightness equalization for camera images.

use std::collections::HashMap;

use mm_core::{Image, ImageView};
use mm_filter::{downsample2x2_mean_u8, threshold_to_zero_inv};
use mm_morph::{StructuringElement, erode};
use tracing::{debug, warn};

use crate::config::NormalizeConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Half-resolution image shifted so its background sits at the target.
    pub image: Image<u8>,
    /// Estimated background level before the shift.
    pub background: f64,
}

/// Downsamples `src` by two and shifts it so the dominant background level
/// lands on `cfg.target`.
///
/// The background is the median of the `top_values` most frequent levels
/// that survive glare removal and a grayscale erosion. With nothing left to
/// estimate from, the image is returned unshifted.
pub fn normalize(src: &ImageView<'_, u8>, cfg: &NormalizeConfig) -> Normalized {
    let small = downsample2x2_mean_u8(src);

    let background = match background_level(&small.as_view(), cfg) {
        Some(level) => level,
        None => {
            warn!("no background pixels survived glare removal; leaving brightness unchanged");
            cfg.target as f64
        }
    };
    let shift = cfg.target as f64 - background;
    debug!(background, shift, "background estimate");

    let image = small.map(|v| (v as f64 + shift).round().clamp(0.0, 255.0) as u8);
    Normalized { image, background }
}

/// Median of the most frequent non-zero levels after dropping glare
/// (`>= cutoff`) and eroding away dark foreground.
pub fn background_level(src: &ImageView<'_, u8>, cfg: &NormalizeConfig) -> Option<f64> {
    let kept = threshold_to_zero_inv(src, cfg.cutoff);
    let se = StructuringElement::square(cfg.erode_kernel);
    let eroded = erode(&kept.as_view(), &se, cfg.erode_iterations);

    let top = most_frequent(eroded.data().iter().copied().filter(|&v| v != 0), cfg.top_values);
    median(&top)
}

/// The `k` most frequent values, highest count first. Equal counts keep the
/// order in which values were first seen.
pub(crate) fn most_frequent(values: impl IntoIterator<Item = u8>, k: usize) -> Vec<u8> {
    let mut counts: HashMap<u8, (usize, usize)> = HashMap::new();
    for (seen, v) in values.into_iter().enumerate() {
        counts.entry(v).or_insert((0, seen)).0 += 1;
    }

    let mut ranked: Vec<(u8, usize, usize)> =
        counts.into_iter().map(|(v, (n, first))| (v, n, first)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
    ranked.into_iter().take(k).map(|(v, _, _)| v).collect()
}

fn median(values: &[u8]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 1 {
        sorted[mid] as f64
    } else {
        0.5 * (sorted[mid - 1] as f64 + sorted[mid] as f64)
    })
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use mm_core::Image;

    use super::{median, most_frequent, normalize};
    use crate::config::NormalizeConfig;

    #[test]
    fn ranking_breaks_ties_by_first_occurrence() {
        let values = [5u8, 7, 7, 9, 5, 3, 9, 1];
        assert_eq!(most_frequent(values, 3), vec![5, 7, 9]);
        assert_eq!(most_frequent(values, 10), vec![5, 7, 9, 3, 1]);
        assert!(most_frequent([], 9).is_empty());
    }

    #[test]
    fn median_of_odd_and_even_sets() {
        assert_eq!(median(&[9, 1, 5]), Some(5.0));
        assert_eq!(median(&[4, 1, 3, 2]), Some(2.5));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn dark_background_is_lifted_to_target() {
        // Background 200 with a dark object and a glare patch.
        let (w, h) = (240, 200);
        let mut img = Image::new_fill(w, h, 200u8);
        for y in 80..100 {
            for x in 100..120 {
                *img.get_mut(x, y).expect("in bounds") = 60;
            }
        }
        for y in 0..20 {
            for x in 0..20 {
                *img.get_mut(x, y).expect("in bounds") = 255;
            }
        }

        let cfg = NormalizeConfig {
            top_values: 1,
            ..NormalizeConfig::default()
        };
        let out = normalize(&img.as_view(), &cfg);
        assert_eq!(out.image.width(), 120);
        assert_eq!(out.image.height(), 100);
        assert_relative_eq!(out.background, 200.0);
        assert_eq!(out.image.get(100, 80), Some(&240));
        assert_eq!(out.image.get(55, 45), Some(&100));
        assert_eq!(out.image.get(1, 1), Some(&255));
    }

    #[test]
    fn uniform_background_with_default_ranking() {
        let img = Image::new_fill(64, 48, 212u8);
        let out = normalize(&img.as_view(), &NormalizeConfig::default());
        assert_relative_eq!(out.background, 212.0);
        assert!(out.image.data().iter().all(|&v| v == 240));
    }

    #[test]
    fn all_glare_leaves_image_unshifted() {
        let img = Image::new_fill(16, 16, 250u8);
        let out = normalize(&img.as_view(), &NormalizeConfig::default());
        assert_relative_eq!(out.background, 240.0);
        assert!(out.image.data().iter().all(|&v| v == 250));
    }

    #[test]
    fn odd_dimensions_drop_last_row_and_column() {
        let img = Image::new_fill(9, 7, 120u8);
        let out = normalize(&img.as_view(), &NormalizeConfig::default());
        assert_eq!((out.image.width(), out.image.height()), (4, 3));
    }
}
