use mm_core::{Circle, Point2d, Point2i, Rect};

use crate::circle::min_enclosing_circle;
use crate::ellipse::{Ellipse, fit_ellipse};

/// Closed border polygon through pixel centres.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Contour {
    points: Vec<Point2i>,
}

/// Spatial moments of the region enclosed by a contour polygon.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Moments {
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
}

impl Moments {
    /// `(m10 / m00, m01 / m00)`; `None` for a zero-area polygon.
    pub fn centroid(&self) -> Option<Point2d> {
        if self.m00.abs() < f64::EPSILON {
            return None;
        }
        Some(Point2d::new(self.m10 / self.m00, self.m01 / self.m00))
    }
}

impl Contour {
    pub fn new(points: Vec<Point2i>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point2i] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Shoelace area; positive for clockwise-on-screen traversal.
    pub fn signed_area(&self) -> f64 {
        0.5 * self.edges().map(|(a, b)| cross(a, b)).sum::<f64>()
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Polygon moments via Green's theorem. Orientation-independent: a
    /// counter-clockwise contour yields the same values as its reverse.
    pub fn moments(&self) -> Moments {
        let mut m = Moments::default();
        for (a, b) in self.edges() {
            let c = cross(a, b);
            m.m00 += c;
            m.m10 += (a.x + b.x) as f64 * c;
            m.m01 += (a.y + b.y) as f64 * c;
        }

        let sign = if m.m00 < 0.0 { -1.0 } else { 1.0 };
        Moments {
            m00: sign * m.m00 / 2.0,
            m10: sign * m.m10 / 6.0,
            m01: sign * m.m01 / 6.0,
        }
    }

    /// Smallest pixel rectangle covering every point (inclusive of both
    /// extreme pixels).
    pub fn bounding_rect(&self) -> Rect {
        let Some(first) = self.points.first() else {
            return Rect::default();
        };

        let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
        for p in &self.points[1..] {
            x0 = x0.min(p.x);
            y0 = y0.min(p.y);
            x1 = x1.max(p.x);
            y1 = y1.max(p.y);
        }

        let x0 = x0.max(0);
        let y0 = y0.max(0);
        Rect::new(
            x0 as usize,
            y0 as usize,
            (x1 - x0 + 1).max(0) as usize,
            (y1 - y0 + 1).max(0) as usize,
        )
    }

    pub fn min_enclosing_circle(&self) -> Option<Circle> {
        let pts: Vec<Point2d> = self.points.iter().map(|p| p.to_f64()).collect();
        min_enclosing_circle(&pts)
    }

    /// Direct least-squares ellipse through the border points; needs at
    /// least 6 points.
    pub fn fit_ellipse(&self) -> Option<Ellipse> {
        let pts: Vec<Point2d> = self.points.iter().map(|p| p.to_f64()).collect();
        fit_ellipse(&pts)
    }

    fn edges(&self) -> impl Iterator<Item = (Point2i, Point2i)> + '_ {
        let n = self.points.len();
        (0..n).map(move |i| (self.points[i], self.points[(i + 1) % n]))
    }
}

impl From<Vec<Point2i>> for Contour {
    fn from(points: Vec<Point2i>) -> Self {
        Self::new(points)
    }
}

/// Largest contour by enclosed area; the first one wins ties.
pub fn largest_by_area<I>(contours: I) -> Option<Contour>
where
    I: IntoIterator<Item = Contour>,
{
    let mut best: Option<(f64, Contour)> = None;
    for c in contours {
        let area = c.area();
        match &best {
            Some((best_area, _)) if area <= *best_area => {}
            _ => best = Some((area, c)),
        }
    }
    best.map(|(_, c)| c)
}

#[inline]
fn cross(a: Point2i, b: Point2i) -> f64 {
    a.x as f64 * b.y as f64 - b.x as f64 * a.y as f64
}
