use mm_core::{Image, Point2i};

use crate::contour::Contour;

/// Rasterizes the region enclosed by `contour`, border pixels included, into
/// a fresh `width x height` mask (`255` inside, `0` elsewhere). Points outside
/// the image are clipped.
pub fn fill_contour(contour: &Contour, width: usize, height: usize) -> Image<u8> {
    let mut mask = Image::new_fill(width, height, 0u8);
    let pts = contour.points();
    if pts.is_empty() || width == 0 || height == 0 {
        return mask;
    }

    let (y_min, y_max) = pts
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), p| (lo.min(p.y), hi.max(p.y)));
    let y_lo = y_min.max(0);
    let y_hi = y_max.min(height as i32 - 1);

    // Even-odd scanline through pixel centres; half-open edge rule so shared
    // vertices are counted once.
    let mut crossings = Vec::new();
    for y in y_lo..=y_hi {
        crossings.clear();
        let yf = y as f64;
        for i in 0..pts.len() {
            let a = pts[i];
            let b = pts[(i + 1) % pts.len()];
            if (a.y <= y) == (b.y <= y) {
                continue;
            }
            let t = (yf - a.y as f64) / (b.y - a.y) as f64;
            crossings.push(a.x as f64 + t * (b.x - a.x) as f64);
        }
        crossings.sort_by(f64::total_cmp);

        let row = mask.row_mut(y as usize);
        for span in crossings.chunks_exact(2) {
            let x0 = span[0].ceil().max(0.0) as i64;
            let x1 = span[1].floor().min(width as f64 - 1.0) as i64;
            for x in x0..=x1 {
                row[x as usize] = 255;
            }
        }
    }

    for i in 0..pts.len() {
        draw_segment(&mut mask, pts[i], pts[(i + 1) % pts.len()]);
    }

    mask
}

/// Bresenham segment, inclusive of both end points.
fn draw_segment(mask: &mut Image<u8>, a: Point2i, b: Point2i) {
    let (mut x, mut y) = (a.x, a.y);
    let dx = (b.x - a.x).abs();
    let dy = -(b.y - a.y).abs();
    let sx = if a.x < b.x { 1 } else { -1 };
    let sy = if a.y < b.y { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        if x >= 0
            && y >= 0
            && let Some(px) = mask.get_mut(x as usize, y as usize)
        {
            *px = 255;
        }
        if x == b.x && y == b.y {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use mm_core::{Image, Point2i};

    use crate::{ChainApprox, Contour, Retrieval, fill_contour, find_contours};

    #[test]
    fn filled_rectangle_includes_border() {
        let c = Contour::new(vec![
            Point2i::new(2, 1),
            Point2i::new(6, 1),
            Point2i::new(6, 4),
            Point2i::new(2, 4),
        ]);
        let mask = fill_contour(&c, 10, 8);
        assert_eq!(mask.count_nonzero(), 5 * 4);
        assert_eq!(mask.get(2, 1), Some(&255));
        assert_eq!(mask.get(6, 4), Some(&255));
        assert_eq!(mask.get(7, 4), Some(&0));
    }

    #[test]
    fn traced_blob_fills_back_to_itself() {
        let mut img = Image::new_fill(40, 30, 0u8);
        for y in 0..30i32 {
            for x in 0..40i32 {
                let d2 = (x - 20).pow(2) + (y - 15).pow(2);
                if d2 <= 100 || (x >= 28 && x < 36 && y >= 12 && y < 18) {
                    *img.get_mut(x as usize, y as usize).expect("in bounds") = 255;
                }
            }
        }

        for approx in [ChainApprox::None, ChainApprox::Simple] {
            let contours = find_contours(&img.as_view(), Retrieval::External, approx);
            assert_eq!(contours.len(), 1);
            let filled = fill_contour(&contours[0], 40, 30);
            assert_eq!(filled, img, "{approx:?}");
        }
    }

    #[test]
    fn clips_points_outside_the_image() {
        let c = Contour::new(vec![
            Point2i::new(-5, -5),
            Point2i::new(3, -5),
            Point2i::new(3, 3),
            Point2i::new(-5, 3),
        ]);
        let mask = fill_contour(&c, 6, 6);
        assert_eq!(mask.count_nonzero(), 16);
        assert_eq!(mask.get(3, 3), Some(&255));
        assert_eq!(mask.get(4, 0), Some(&0));
    }
}
