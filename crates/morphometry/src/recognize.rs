//! Fine silhouette extraction inside one ROI.

use mm_contour::{ChainApprox, Contour, find_contours, largest_by_area};
use mm_morph::{close, open};
use tracing::debug;

use crate::config::{CleanupSchedule, MorphOp, RecognizerConfig, ScheduleFactors};
use crate::detect::{Roi, foreground};
use crate::error::{ConfigError, Result};

/// Resolved closing and opening for one ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cleanup {
    pub close: MorphOp,
    pub open: MorphOp,
}

impl CleanupSchedule {
    pub fn resolve(&self, length: f64) -> Cleanup {
        match self {
            Self::Fixed { close, open } => Cleanup {
                close: *close,
                open: *open,
            },
            Self::SizeAdaptive(factors) => size_adaptive_schedule(length, factors),
        }
    }
}

/// Cleanup schedule for an object of provisional length `length` pixels.
///
/// | length   | close              | open                      |
/// |----------|--------------------|---------------------------|
/// | `> 600`  | rect 3, `[0.005L] - 4` | cross 9, `[0.007L]`    |
/// | `<= 600` | rect 3, `[0.015L] - 4` | cross 5, `[0.03L] - 8` |
///
/// `[x]` rounds half to even. Each count and kernel size is then scaled by
/// its factor. Iterations are clamped to at least one, kernel sizes to the
/// nearest odd value `>= 1`.
pub fn size_adaptive_schedule(length: f64, factors: &ScheduleFactors) -> Cleanup {
    let (close_it, open_size, open_it) = if length > 600.0 {
        (
            (0.005 * length).round_ties_even() - 4.0,
            9,
            (0.007 * length).round_ties_even(),
        )
    } else {
        (
            (0.015 * length).round_ties_even() - 4.0,
            5,
            (0.03 * length).round_ties_even() - 8.0,
        )
    };

    Cleanup {
        close: MorphOp::rect(
            scaled_kernel(3, factors.close_kernel),
            scaled_iterations(close_it, factors.close_iterations),
        ),
        open: MorphOp::cross(
            scaled_kernel(open_size, factors.open_kernel),
            scaled_iterations(open_it, factors.open_iterations),
        ),
    }
}

fn scaled_iterations(base: f64, factor: f64) -> usize {
    (base * factor).round_ties_even().max(1.0) as usize
}

fn scaled_kernel(base: usize, factor: f64) -> usize {
    let k = (base as f64 * factor).round_ties_even().max(1.0) as usize;
    if k.is_multiple_of(2) { k + 1 } else { k }
}

#[derive(Debug, Clone)]
pub struct ShapeRecognizer {
    cfg: RecognizerConfig,
}

impl ShapeRecognizer {
    pub fn new(cfg: RecognizerConfig) -> std::result::Result<Self, ConfigError> {
        cfg.validate("recognizer")?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &RecognizerConfig {
        &self.cfg
    }

    /// Largest silhouette contour in ROI-local coordinates, or `None` when
    /// nothing survives the cleanup.
    pub fn recognize(&self, roi: &Roi) -> Result<Option<Contour>> {
        let view = roi.view();
        // Without a provisional length, the ROI's longer side stands in.
        let length = roi
            .provisional_length()
            .unwrap_or_else(|| view.width().max(view.height()) as f64);
        let cleanup = self.cfg.schedule.resolve(length);
        debug!(index = roi.index, length, ?cleanup, "recognizer schedule");

        let fg = foreground(&view, &self.cfg.threshold)?;
        let closed = close(
            &fg.as_view(),
            &cleanup.close.element(),
            cleanup.close.iterations,
        );
        let opened = open(
            &closed.as_view(),
            &cleanup.open.element(),
            cleanup.open.iterations,
        );

        let contours = find_contours(
            &opened.as_view(),
            self.cfg.retrieval.into(),
            ChainApprox::Simple,
        );
        debug!(index = roi.index, count = contours.len(), "recognizer contours");
        Ok(largest_by_area(contours))
    }
}

#[cfg(test)]
mod tests {
    use mm_core::Image;

    use super::{Cleanup, ShapeRecognizer, size_adaptive_schedule};
    use crate::config::{
        CleanupSchedule, MorphOp, RecognizerConfig, ScheduleFactors, ThresholdMethod,
    };
    use crate::detect::Roi;

    fn disc(w: usize, h: usize, cx: f64, cy: f64, r: f64) -> Image<u8> {
        let mut img = Image::new_fill(w, h, 225u8);
        for y in 0..h {
            for x in 0..w {
                if (x as f64 - cx).hypot(y as f64 - cy) <= r {
                    *img.get_mut(x, y).expect("in bounds") = 60;
                }
            }
        }
        img
    }

    #[test]
    fn schedule_for_large_objects() {
        let s = size_adaptive_schedule(1000.0, &ScheduleFactors::default());
        assert_eq!(
            s,
            Cleanup {
                close: MorphOp::rect(3, 1),
                open: MorphOp::cross(9, 7),
            }
        );

        let s = size_adaptive_schedule(2000.0, &ScheduleFactors::default());
        assert_eq!(s.close.iterations, 6);
        assert_eq!(s.open.iterations, 14);
    }

    #[test]
    fn schedule_for_small_objects() {
        let s = size_adaptive_schedule(400.0, &ScheduleFactors::default());
        assert_eq!(
            s,
            Cleanup {
                close: MorphOp::rect(3, 2),
                open: MorphOp::cross(5, 4),
            }
        );
    }

    #[test]
    fn tiny_objects_still_get_one_iteration() {
        let s = size_adaptive_schedule(120.0, &ScheduleFactors::default());
        assert_eq!(s.close.iterations, 1);
        assert_eq!(s.open.iterations, 1);
    }

    #[test]
    fn schedule_is_pure_and_never_zero_across_lengths() {
        let factors = ScheduleFactors::default();
        let lengths = std::iter::once(0.0).chain((0..=3000).map(|l| l as f64 + 0.5));
        for l in lengths {
            let s = size_adaptive_schedule(l, &factors);
            assert!(s.close.iterations >= 1, "close at L={l}");
            assert!(s.open.iterations >= 1, "open at L={l}");
            assert!(s.close.size % 2 == 1 && s.open.size % 2 == 1, "even kernel at L={l}");
            assert_eq!(s, size_adaptive_schedule(l, &factors));
        }
    }

    #[test]
    fn factors_scale_counts_and_keep_kernels_odd() {
        let factors = ScheduleFactors {
            close_iterations: 2.0,
            open_kernel: 2.0,
            ..ScheduleFactors::default()
        };
        let s = size_adaptive_schedule(2000.0, &factors);
        assert_eq!(s.close, MorphOp::rect(3, 12));
        assert_eq!(s.open, MorphOp::cross(19, 14));
    }

    #[test]
    fn fixed_schedule_ignores_length() {
        let schedule = CleanupSchedule::Fixed {
            close: MorphOp::rect(3, 3),
            open: MorphOp::cross(9, 6),
        };
        assert_eq!(schedule.resolve(10.0), schedule.resolve(5000.0));
    }

    #[test]
    fn rejects_even_block_size() {
        let cfg = RecognizerConfig {
            threshold: ThresholdMethod::Adaptive {
                block_size: 498,
                constant: 3.0,
            },
            ..RecognizerConfig::camera()
        };
        assert!(ShapeRecognizer::new(cfg).is_err());
    }

    #[test]
    fn finds_disc_in_supplied_roi() {
        let roi = Roi::supplied(disc(240, 200, 120.0, 100.0, 60.0));
        for cfg in [RecognizerConfig::camera(), RecognizerConfig::scanner()] {
            let contour = ShapeRecognizer::new(cfg)
                .expect("valid config")
                .recognize(&roi)
                .expect("recognition runs")
                .expect("disc found");
            let area = contour.area();
            let expected = std::f64::consts::PI * 60.0 * 60.0;
            assert!((area - expected).abs() / expected < 0.1, "area {area}");
        }
    }

    #[test]
    fn blank_roi_has_no_contour() {
        let roi = Roi::supplied(Image::new_fill(120, 90, 230u8));
        let found = ShapeRecognizer::new(RecognizerConfig::scanner())
            .expect("valid config")
            .recognize(&roi)
            .expect("recognition runs");
        assert!(found.is_none());
    }
}
