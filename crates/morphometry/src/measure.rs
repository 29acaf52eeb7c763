//! Physical size and intensity statistics of a recognized silhouette.

use mm_contour::{Contour, fill_contour};
use mm_core::{Circle, Image, Point2d};
use mm_morph::{StructuringElement, erode};

use crate::config::MeasureConfig;
use crate::detect::Roi;
use crate::error::MeasureError;

/// One measured object. Lengths are in millimetres, areas in square
/// millimetres, intensities in raw 8-bit levels.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement {
    /// Source identifier; empty until the caller assigns one.
    pub label: String,
    /// 1-based index of the ROI within its image.
    pub index: usize,
    pub length: f64,
    pub area: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub stddev: f64,
    pub min: u8,
    pub max: u8,
    /// Area centroid in parent image coordinates.
    pub centroid: Point2d,
    /// Minimum enclosing circle in ROI coordinates.
    pub enclosing: Circle,
    /// Pixels per millimetre used for the conversion.
    pub scale: f64,
}

impl Measurement {
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// Measures `contour` (ROI-local coordinates) against the pixels of `roi`.
///
/// The length is the diameter of the minimum enclosing circle with the
/// radius truncated to whole pixels; the area is the polygon area of the
/// contour. Intensities are taken over the filled contour after a
/// `erode_kernel` erosion, which keeps the border halo out of the
/// statistics.
pub fn measure(
    roi: &Roi,
    contour: &Contour,
    cfg: &MeasureConfig,
) -> Result<Measurement, MeasureError> {
    if contour.is_empty() {
        return Err(MeasureError::EmptyContour);
    }
    let enclosing = contour
        .min_enclosing_circle()
        .ok_or(MeasureError::EmptyContour)?;
    let local_centroid = contour
        .moments()
        .centroid()
        .ok_or(MeasureError::ZeroArea)?;

    let view = roi.view();
    let filled = fill_contour(contour, view.width(), view.height());
    let mask = erode(
        &filled.as_view(),
        &StructuringElement::square(cfg.erode_kernel),
        cfg.erode_iterations,
    );
    let stats = masked_stats(roi, &mask).ok_or(MeasureError::EmptyMask)?;

    let (ox, oy) = roi.origin();
    Ok(Measurement {
        label: String::new(),
        index: roi.index,
        length: 2.0 * enclosing.radius.floor() / cfg.scale,
        area: contour.area() / (cfg.scale * cfg.scale),
        mean: stats.mean,
        stddev: stats.stddev,
        min: stats.min,
        max: stats.max,
        centroid: Point2d::new(local_centroid.x + ox as f64, local_centroid.y + oy as f64),
        enclosing,
        scale: cfg.scale,
    })
}

struct Stats {
    mean: f64,
    stddev: f64,
    min: u8,
    max: u8,
}

fn masked_stats(roi: &Roi, mask: &Image<u8>) -> Option<Stats> {
    let mut n = 0u64;
    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    let mut min = u8::MAX;
    let mut max = u8::MIN;

    for (&v, &m) in roi.image.data().iter().zip(mask.data()) {
        if m == 0 {
            continue;
        }
        n += 1;
        let f = v as f64;
        sum += f;
        sum_sq += f * f;
        min = min.min(v);
        max = max.max(v);
    }

    if n == 0 {
        return None;
    }
    let mean = sum / n as f64;
    let var = (sum_sq / n as f64 - mean * mean).max(0.0);
    Some(Stats {
        mean,
        stddev: var.sqrt(),
        min,
        max,
    })
}
