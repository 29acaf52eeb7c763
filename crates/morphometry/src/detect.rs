//! Coarse localisation of objects: whole image in, regions of interest out.

use mm_contour::{ChainApprox, Contour, Ellipse, Retrieval, find_contours, largest_by_area};
use mm_core::{Image, ImageView, Point2d, Rect};
use mm_filter::{
    adaptive_threshold_gaussian_inv, binarize_nonzero, threshold_otsu_inv, threshold_to_zero_inv,
};
use mm_morph::{close, dilate, erode, open};
use tracing::{debug, warn};

use crate::config::{DetectStrategy, DetectorConfig, EnvelopeConfig, SizeFilter, ThresholdMethod};
use crate::error::Result;

/// Geometry that placed an ROI.
#[derive(Debug, Clone, PartialEq)]
pub enum RoiAnchor {
    /// Minimum enclosing circle of the detected region, parent coordinates.
    Circle { center: Point2d, radius: f64 },
    /// Contour bounding box (before the margin), its fitted ellipse and the
    /// provisional length derived from it.
    Box {
        bbox: Rect,
        ellipse: Ellipse,
        length: f64,
    },
    /// Externally cropped image; no detection was run.
    Supplied,
}

/// Rectangular window of a parent image with its own copy of the pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Roi {
    /// 1-based position in detection order.
    pub index: usize,
    /// Window in parent image coordinates.
    pub bounds: Rect,
    pub image: Image<u8>,
    pub anchor: RoiAnchor,
}

impl Roi {
    /// Whole `image` as an ROI, e.g. a manual re-crop.
    pub fn supplied(image: Image<u8>) -> Self {
        Self {
            index: 1,
            bounds: Rect::new(0, 0, image.width(), image.height()),
            image,
            anchor: RoiAnchor::Supplied,
        }
    }

    pub fn origin(&self) -> (usize, usize) {
        (self.bounds.x, self.bounds.y)
    }

    pub fn view(&self) -> ImageView<'_, u8> {
        self.image.as_view()
    }

    pub fn provisional_length(&self) -> Option<f64> {
        match self.anchor {
            RoiAnchor::Box { length, .. } => Some(length),
            _ => None,
        }
    }
}

/// Size estimate used by the global strategy: mean of the equal-area circle
/// diameter `sqrt(pi * A1 * A2)` and the longer full axis.
pub fn provisional_length(ellipse: &Ellipse) -> f64 {
    let equal_area = (std::f64::consts::PI * ellipse.major * ellipse.minor).sqrt();
    0.5 * (equal_area + ellipse.major.max(ellipse.minor))
}

#[derive(Debug, Clone)]
pub struct RegionDetector {
    cfg: DetectorConfig,
}

impl RegionDetector {
    pub fn new(cfg: DetectorConfig) -> Self {
        Self { cfg }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.cfg
    }

    /// Finds zero or more ROIs; the adaptive strategy returns at most one.
    pub fn detect(&self, img: &ImageView<'_, u8>) -> Result<Vec<Roi>> {
        match &self.cfg.strategy {
            DetectStrategy::Adaptive(env) => self.detect_single(img, env),
            DetectStrategy::Global(filter) => self.detect_many(img, filter),
        }
    }

    fn cleanup(&self, mask: &Image<u8>) -> (Image<u8>, Image<u8>) {
        let c = self.cfg.close;
        let o = self.cfg.open;
        let closed = close(&mask.as_view(), &c.element(), c.iterations);
        let opened = open(&closed.as_view(), &o.element(), o.iterations);
        (closed, opened)
    }

    fn detect_single(&self, img: &ImageView<'_, u8>, env: &EnvelopeConfig) -> Result<Vec<Roi>> {
        let envelope = envelope_mask(img, env);
        let fg = foreground(img, &self.cfg.threshold)?.masked_by(&envelope)?;
        if fg.count_nonzero() == 0 {
            debug!("no foreground inside the envelope");
            return Ok(Vec::new());
        }
        let (closed, opened) = self.cleanup(&fg);

        let candidates = [("opened", &opened), ("closed", &closed), ("envelope", &envelope)];
        let mut largest = None;
        for (stage, mask) in candidates {
            let contours = external_contours(mask);
            debug!(stage, count = contours.len(), "detection contours");
            if let Some(c) = largest_by_area(contours) {
                if stage != "opened" {
                    warn!(stage, "no region after opening; falling back");
                }
                largest = Some(c);
                break;
            }
        }

        let Some(largest) = largest else {
            return Ok(Vec::new());
        };
        let Some(circle) = largest.min_enclosing_circle() else {
            return Ok(Vec::new());
        };

        // Integer centre, as pixel coordinates.
        let (cx, cy) = (circle.center.x as i64, circle.center.y as i64);
        let bounds = Rect::around(cx, cy, env.roi_half_extent, img.width(), img.height());
        if bounds.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![Roi {
            index: 1,
            bounds,
            image: img.crop(bounds)?,
            anchor: RoiAnchor::Circle {
                center: circle.center,
                radius: circle.radius,
            },
        }])
    }

    fn detect_many(&self, img: &ImageView<'_, u8>, filter: &SizeFilter) -> Result<Vec<Roi>> {
        let fg = foreground(img, &self.cfg.threshold)?;
        let (_, opened) = self.cleanup(&fg);
        let contours = external_contours(&opened);
        debug!(count = contours.len(), "detection contours");

        let mut rois = Vec::new();
        for contour in contours {
            if contour.len() <= filter.min_contour_points {
                continue;
            }
            let Some(ellipse) = contour.fit_ellipse() else {
                warn!(points = contour.len(), "ellipse fit failed; contour rejected");
                continue;
            };
            let length = provisional_length(&ellipse);
            if length <= filter.min_length {
                continue;
            }

            let bbox = contour.bounding_rect();
            let bounds = bbox.expand(filter.margin, img.width(), img.height());
            debug!(index = rois.len() + 1, length, ?bounds, "object accepted");
            rois.push(Roi {
                index: rois.len() + 1,
                bounds,
                image: img.crop(bounds)?,
                anchor: RoiAnchor::Box {
                    bbox,
                    ellipse,
                    length,
                },
            });
        }

        Ok(rois)
    }
}

/// Glare-free area of the frame: pixels below the cutoff, grown to bridge
/// gaps and then shrunk well inside the bright surround.
fn envelope_mask(img: &ImageView<'_, u8>, env: &EnvelopeConfig) -> Image<u8> {
    let kept = threshold_to_zero_inv(img, env.cutoff);
    let bin = binarize_nonzero(&kept.as_view());
    let grown = dilate(&bin.as_view(), &env.dilate.element(), env.dilate.iterations);
    erode(&grown.as_view(), &env.erode.element(), env.erode.iterations)
}

/// Dark-object mask (`255` foreground) for either threshold method.
pub(crate) fn foreground(img: &ImageView<'_, u8>, method: &ThresholdMethod) -> Result<Image<u8>> {
    match *method {
        ThresholdMethod::Adaptive {
            block_size,
            constant,
        } => Ok(adaptive_threshold_gaussian_inv(img, block_size, constant)?),
        ThresholdMethod::Otsu => {
            let (level, mask) = threshold_otsu_inv(img);
            debug!(level, "otsu level");
            Ok(mask)
        }
    }
}

fn external_contours(mask: &Image<u8>) -> Vec<Contour> {
    find_contours(&mask.as_view(), Retrieval::External, ChainApprox::Simple)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use mm_contour::Ellipse;
    use mm_core::{Image, Point2d};

    use super::{RegionDetector, RoiAnchor, provisional_length};
    use crate::config::DetectorConfig;

    fn draw_ellipse(img: &mut Image<u8>, cx: f64, cy: f64, a: f64, b: f64, value: u8) {
        for y in 0..img.height() {
            for x in 0..img.width() {
                let dx = (x as f64 - cx) / a;
                let dy = (y as f64 - cy) / b;
                if dx * dx + dy * dy <= 1.0 {
                    *img.get_mut(x, y).expect("in bounds") = value;
                }
            }
        }
    }

    #[test]
    fn provisional_length_of_circle_is_between_diameters() {
        let e = Ellipse {
            center: Point2d::new(0.0, 0.0),
            major: 100.0,
            minor: 100.0,
            angle: 0.0,
        };
        let expected = 0.5 * ((std::f64::consts::PI * 1e4).sqrt() + 100.0);
        assert_relative_eq!(provisional_length(&e), expected, epsilon = 1e-9);
    }

    #[test]
    fn blank_image_yields_no_roi() {
        let img = Image::new_fill(300, 200, 235u8);
        for cfg in [DetectorConfig::scanner(), DetectorConfig::camera()] {
            let rois = RegionDetector::new(cfg)
                .detect(&img.as_view())
                .expect("detection runs");
            assert!(rois.is_empty());
        }

        let glare = Image::new_fill(300, 200, 250u8);
        let rois = RegionDetector::new(DetectorConfig::camera())
            .detect(&glare.as_view())
            .expect("detection runs");
        assert!(rois.is_empty());
    }

    #[test]
    fn camera_falls_back_to_closed_mask_when_opening_erases_everything() {
        let mut img = Image::new_fill(300, 200, 235u8);
        for y in 98..103 {
            for x in 148..153 {
                *img.get_mut(x, y).expect("in bounds") = 100;
            }
        }

        let rois = RegionDetector::new(DetectorConfig::camera())
            .detect(&img.as_view())
            .expect("detection runs");
        assert_eq!(rois.len(), 1);
        let RoiAnchor::Circle { center, radius } = &rois[0].anchor else {
            panic!("expected circle anchor");
        };
        assert_relative_eq!(center.x, 150.0, epsilon = 1.0);
        assert_relative_eq!(center.y, 100.0, epsilon = 1.0);
        assert!(*radius < 5.0, "radius {radius}");
    }

    #[test]
    fn scanner_numbers_objects_and_drops_small_ones() {
        let mut img = Image::new_fill(900, 500, 230u8);
        draw_ellipse(&mut img, 200.0, 150.0, 120.0, 50.0, 40);
        draw_ellipse(&mut img, 650.0, 300.0, 90.0, 70.0, 50);
        draw_ellipse(&mut img, 820.0, 450.0, 12.0, 8.0, 45);

        let rois = RegionDetector::new(DetectorConfig::scanner())
            .detect(&img.as_view())
            .expect("detection runs");
        assert_eq!(rois.len(), 2);
        assert_eq!(rois.iter().map(|r| r.index).collect::<Vec<_>>(), vec![1, 2]);

        let first = &rois[0];
        let RoiAnchor::Box { bbox, ellipse, length } = &first.anchor else {
            panic!("expected box anchor");
        };
        assert!(first.bounds.contains(bbox.x, bbox.y));
        assert_eq!(first.bounds.x, bbox.x.saturating_sub(100));
        assert_relative_eq!(ellipse.major, 240.0, max_relative = 0.05);
        assert!(*length > 100.0);
        assert_eq!(first.image.width(), first.bounds.width);
    }

    #[test]
    fn camera_roi_is_centred_on_object_and_clipped() {
        let mut img = Image::new_fill(1000, 700, 238u8);
        draw_ellipse(&mut img, 300.0, 350.0, 110.0, 45.0, 70);

        let rois = RegionDetector::new(DetectorConfig::camera())
            .detect(&img.as_view())
            .expect("detection runs");
        assert_eq!(rois.len(), 1);

        let roi = &rois[0];
        let RoiAnchor::Circle { center, radius } = roi.anchor else {
            panic!("expected circle anchor");
        };
        assert!((center.x - 300.0).abs() < 5.0);
        assert!((center.y - 350.0).abs() < 5.0);
        assert!((radius - 110.0).abs() < 6.0);
        assert_eq!(roi.bounds.x, 0);
        assert_eq!(roi.bounds.height, 700);
        assert_eq!(roi.image.width(), roi.bounds.width);
    }
}
