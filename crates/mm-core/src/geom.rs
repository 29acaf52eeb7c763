use core::ops::{Add, Sub};

/// Integer pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point2i {
    pub x: i32,
    pub y: i32,
}

impl Point2i {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn to_f64(self) -> Point2d {
        Point2d {
            x: self.x as f64,
            y: self.y as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2d {
    pub x: f64,
    pub y: f64,
}

impl Point2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Self) -> f64 {
        (self - other).norm()
    }

    pub fn norm(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn midpoint(self, other: Self) -> Self {
        Self {
            x: 0.5 * (self.x + other.x),
            y: 0.5 * (self.y + other.y),
        }
    }
}

impl Add for Point2d {
    type Output = Point2d;

    fn add(self, rhs: Point2d) -> Self::Output {
        Point2d {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
        }
    }
}

impl Sub for Point2d {
    type Output = Point2d;

    fn sub(self, rhs: Point2d) -> Self::Output {
        Point2d {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
        }
    }
}

/// Axis-aligned pixel rectangle `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub const fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> usize {
        self.x + self.width
    }

    pub fn bottom(&self) -> usize {
        self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Square window `[cx - half, cx + half) x [cy - half, cy + half)`
    /// clipped to a `bound_w x bound_h` image.
    pub fn around(cx: i64, cy: i64, half: usize, bound_w: usize, bound_h: usize) -> Self {
        let half = half as i64;
        Self::from_corners(cx - half, cy - half, cx + half, cy + half, bound_w, bound_h)
    }

    /// Grows the rectangle by `margin` on every side, clipped to a
    /// `bound_w x bound_h` image.
    pub fn expand(&self, margin: usize, bound_w: usize, bound_h: usize) -> Self {
        let m = margin as i64;
        Self::from_corners(
            self.x as i64 - m,
            self.y as i64 - m,
            self.right() as i64 + m,
            self.bottom() as i64 + m,
            bound_w,
            bound_h,
        )
    }

    fn from_corners(x0: i64, y0: i64, x1: i64, y1: i64, bound_w: usize, bound_h: usize) -> Self {
        let x0 = x0.clamp(0, bound_w as i64) as usize;
        let y0 = y0.clamp(0, bound_h as i64) as usize;
        let x1 = x1.clamp(0, bound_w as i64) as usize;
        let y1 = y1.clamp(0, bound_h as i64) as usize;

        Self {
            x: x0,
            y: y0,
            width: x1.saturating_sub(x0),
            height: y1.saturating_sub(y0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Circle {
    pub center: Point2d,
    pub radius: f64,
}

impl Circle {
    pub fn contains(&self, p: Point2d, tol: f64) -> bool {
        self.center.distance(p) <= self.radius + tol
    }
}
