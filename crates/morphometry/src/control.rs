//! Annotated RGB control images for visual review of a run.

use std::path::Path;

use ab_glyph::{Font, FontRef, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut, text_size,
};
use imageproc::rect::Rect as DrawRect;
use mm_contour::Contour;
use mm_core::{Image, Point2d};
use tracing::warn;

use crate::detect::Roi;
use crate::error::{Error, Result};

static FONT_BYTES: &[u8] = include_bytes!("../fonts/DejaVuSans-Bold.ttf");

/// Pixel height of the object index on scanner control images.
const LABEL_SCALE: f32 = 40.0;

const BLUE: Rgb<u8> = Rgb([0, 0, 255]);
const RED: Rgb<u8> = Rgb([255, 0, 0]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Gray to RGB by channel replication.
pub fn to_rgb(img: &Image<u8>) -> RgbImage {
    RgbImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
        let v = img.row(y as usize)[x as usize];
        Rgb([v, v, v])
    })
}

/// Camera control image: the ROI with the contour's enclosing circle in
/// blue and the contour in red. Without a contour the plain ROI is
/// returned.
pub fn camera_control(roi: &Roi, contour: Option<&Contour>) -> RgbImage {
    let mut canvas = to_rgb(&roi.image);
    if let Some(contour) = contour {
        draw_enclosing_circle(&mut canvas, contour, (0, 0), 2, BLUE);
        draw_contour(&mut canvas, contour, (0, 0), 2, RED);
    }
    canvas
}

/// One object on a scanner control image.
#[derive(Debug, Clone, Copy)]
pub struct Annotation<'a> {
    pub roi: &'a Roi,
    /// Contour in ROI coordinates, if recognition succeeded.
    pub contour: Option<&'a Contour>,
}

/// Scanner control image: the full page with each ROI boxed in red, its
/// enclosing circle in blue, the contour in green and the ROI index written
/// at the object's centroid.
pub fn scanner_control(page: &Image<u8>, annotations: &[Annotation<'_>]) -> RgbImage {
    let mut canvas = to_rgb(page);
    let font = FontRef::try_from_slice(FONT_BYTES)
        .inspect_err(|err| warn!(%err, "label font unreadable; indices not drawn"))
        .ok();
    for a in annotations {
        let b = a.roi.bounds;
        let origin = (b.x as i32, b.y as i32);

        if let Some(contour) = a.contour {
            draw_enclosing_circle(&mut canvas, contour, origin, 3, BLUE);
            draw_contour(&mut canvas, contour, origin, 3, GREEN);
        }
        draw_box(&mut canvas, b.x as i32, b.y as i32, b.width as u32, b.height as u32, 3, RED);

        let at = a
            .contour
            .and_then(|c| c.moments().centroid())
            .map(|p| Point2d::new(p.x + b.x as f64, p.y + b.y as f64))
            .unwrap_or_else(|| {
                Point2d::new(
                    b.x as f64 + 0.5 * b.width as f64,
                    b.y as f64 + 0.5 * b.height as f64,
                )
            });
        if let Some(font) = &font {
            draw_label(&mut canvas, font, &a.roi.index.to_string(), at, WHITE);
        }
    }
    canvas
}

/// Writes `img` with the format picked from the extension, replacing any
/// existing file.
pub fn save(img: &RgbImage, path: &Path) -> Result<()> {
    img.save(path).map_err(|e| Error::image(path, e))
}

fn draw_enclosing_circle(
    canvas: &mut RgbImage,
    contour: &Contour,
    origin: (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    let Some(circle) = contour.min_enclosing_circle() else {
        return;
    };
    let center = (
        circle.center.x.round() as i32 + origin.0,
        circle.center.y.round() as i32 + origin.1,
    );
    let r = circle.radius.round() as i32;
    for k in 0..thickness {
        let radius = r + k - thickness / 2;
        if radius > 0 {
            draw_hollow_circle_mut(canvas, center, radius, color);
        }
    }
}

fn draw_contour(
    canvas: &mut RgbImage,
    contour: &Contour,
    origin: (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    let pts = contour.points();
    if pts.is_empty() {
        return;
    }
    let lo = -(thickness - 1) / 2;
    let hi = lo + thickness;
    for i in 0..pts.len() {
        let a = pts[i];
        let b = pts[(i + 1) % pts.len()];
        for dy in lo..hi {
            for dx in lo..hi {
                let ox = (origin.0 + dx) as f32;
                let oy = (origin.1 + dy) as f32;
                draw_line_segment_mut(
                    canvas,
                    (a.x as f32 + ox, a.y as f32 + oy),
                    (b.x as f32 + ox, b.y as f32 + oy),
                    color,
                );
            }
        }
    }
}

fn draw_box(canvas: &mut RgbImage, x: i32, y: i32, w: u32, h: u32, thickness: i32, color: Rgb<u8>) {
    if w == 0 || h == 0 {
        return;
    }
    for t in 0..thickness {
        let rect = DrawRect::at(x + t, y + t).of_size(
            w.saturating_sub(2 * t as u32).max(1),
            h.saturating_sub(2 * t as u32).max(1),
        );
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Draws `text` with its ink box centred on `at`.
fn draw_label(
    canvas: &mut RgbImage,
    font: &FontRef<'_>,
    text: &str,
    at: Point2d,
    color: Rgb<u8>,
) {
    let scale = PxScale::from(LABEL_SCALE);
    let (w, h) = text_size(scale, font, text);
    // Digits sit on the baseline, `ascent` below the layout origin.
    let ascent = font.as_scaled(scale).ascent();
    let x = (at.x - 0.5 * w as f64).round() as i32;
    let y = (at.y + 0.5 * h as f64 - ascent as f64).round() as i32;
    draw_text_mut(canvas, color, x, y, scale, font, text);
}

#[cfg(test)]
mod tests {
    use image::Rgb;
    use mm_contour::Contour;
    use mm_core::{Image, Point2d, Point2i, Rect};

    use ab_glyph::FontRef;

    use super::{
        Annotation, BLUE, FONT_BYTES, GREEN, RED, camera_control, draw_label, scanner_control,
        to_rgb,
    };
    use crate::detect::{Roi, RoiAnchor};

    fn square(x0: i32, y0: i32, side: i32) -> Contour {
        Contour::new(vec![
            Point2i::new(x0, y0),
            Point2i::new(x0 + side, y0),
            Point2i::new(x0 + side, y0 + side),
            Point2i::new(x0, y0 + side),
        ])
    }

    #[test]
    fn gray_replicates_to_three_channels() {
        let img = Image::from_vec(2, 1, vec![10u8, 200]).expect("valid image");
        let rgb = to_rgb(&img);
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([10, 10, 10]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([200, 200, 200]));
    }

    #[test]
    fn camera_overlay_draws_contour_and_circle() {
        let roi = Roi::supplied(Image::new_fill(100, 100, 128u8));
        let contour = square(30, 30, 40);

        let plain = camera_control(&roi, None);
        assert!(plain.pixels().all(|p| *p == Rgb([128, 128, 128])));

        let rgb = camera_control(&roi, Some(&contour));
        assert_eq!(rgb.dimensions(), (100, 100));
        assert_eq!(rgb.get_pixel(50, 30), &RED);
        // Circle through the square's corners, radius ~28 around (50, 50).
        assert!(rgb.pixels().any(|p| *p == BLUE));
        assert_eq!(rgb.get_pixel(50, 50), &Rgb([128, 128, 128]));
    }

    #[test]
    fn scanner_overlay_boxes_each_roi_in_page_coordinates() {
        let page = Image::new_fill(300, 200, 90u8);
        let mut roi = Roi::supplied(Image::new_fill(100, 80, 90u8));
        roi.bounds = Rect::new(150, 60, 100, 80);
        roi.anchor = RoiAnchor::Supplied;
        roi.index = 7;
        let contour = square(20, 20, 40);

        let rgb = scanner_control(
            &page,
            &[Annotation {
                roi: &roi,
                contour: Some(&contour),
            }],
        );
        assert_eq!(rgb.get_pixel(150, 100), &RED);
        assert_eq!(rgb.get_pixel(249, 100), &RED);
        assert_eq!(rgb.get_pixel(205, 80), &GREEN);
        // Index drawn in white around the centroid (190, 100).
        let label = (170..210)
            .flat_map(|x| (75..125).map(move |y| (x, y)))
            .filter(|&(x, y)| rgb.get_pixel(x, y).0.iter().all(|&c| c > 200))
            .count();
        assert!(label > 20, "label pixels {label}");
        assert_eq!(rgb.get_pixel(10, 10), &Rgb([90, 90, 90]));
    }

    #[test]
    fn labels_are_centred_and_clipped_at_edges() {
        let font = FontRef::try_from_slice(FONT_BYTES).expect("embedded font");
        let mut canvas = to_rgb(&Image::new_fill(120, 120, 0u8));
        draw_label(&mut canvas, &font, "8", Point2d::new(60.0, 60.0), Rgb([255, 255, 255]));

        let (mut xs, mut ys) = (Vec::new(), Vec::new());
        for (x, y, p) in canvas.enumerate_pixels() {
            if p[0] > 128 {
                xs.push(x as f64);
                ys.push(y as f64);
            }
        }
        assert!(!xs.is_empty());
        let mid = |v: &[f64]| {
            let lo = v.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = v.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            0.5 * (lo + hi)
        };
        assert!((mid(&xs) - 60.0).abs() <= 4.0, "x centre {}", mid(&xs));
        assert!((mid(&ys) - 60.0).abs() <= 4.0, "y centre {}", mid(&ys));

        let mut corner = to_rgb(&Image::new_fill(10, 10, 0u8));
        draw_label(&mut corner, &font, "12", Point2d::new(0.0, 0.0), Rgb([255, 255, 255]));
        assert!(corner.pixels().any(|p| p[0] > 128));
    }
}
