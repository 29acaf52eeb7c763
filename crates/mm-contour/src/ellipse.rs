//! Direct least-squares ellipse fit (Fitzgibbon, Pilu & Fisher, 1999).

use mm_core::Point2d;
use nalgebra::{DMatrix, Matrix3, Vector3};

/// Fitted ellipse with *full* axis lengths (diameters), not semi-axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Point2d,
    /// Length of the major axis, `>= minor`.
    pub major: f64,
    pub minor: f64,
    /// Major-axis direction in radians, in `(-pi/2, pi/2]`.
    pub angle: f64,
}

impl Ellipse {
    pub fn area(&self) -> f64 {
        std::f64::consts::PI * 0.25 * self.major * self.minor
    }
}

/// Fits an ellipse to at least 6 points. `None` when the points do not
/// determine a proper ellipse (too few, collinear, hyperbolic fit).
pub fn fit_ellipse(points: &[Point2d]) -> Option<Ellipse> {
    let n = points.len();
    if n < 6 {
        return None;
    }

    let (mx, my, s) = normalization(points);

    let mut d = DMatrix::<f64>::zeros(n, 6);
    for (i, p) in points.iter().enumerate() {
        let x = (p.x - mx) * s;
        let y = (p.y - my) * s;
        d[(i, 0)] = x * x;
        d[(i, 1)] = x * y;
        d[(i, 2)] = y * y;
        d[(i, 3)] = x;
        d[(i, 4)] = y;
        d[(i, 5)] = 1.0;
    }

    let scatter = d.transpose() * &d;
    let s11 = scatter.fixed_view::<3, 3>(0, 0).into_owned();
    let s12 = scatter.fixed_view::<3, 3>(0, 3).into_owned();
    let s22 = scatter.fixed_view::<3, 3>(3, 3).into_owned();

    // 4AC - B^2 = 1 constraint on the quadratic block.
    let c1 = Matrix3::new(0.0, 0.0, 2.0, 0.0, -1.0, 0.0, 2.0, 0.0, 0.0);
    let s22_inv = s22.try_inverse()?;
    let reduced = s11 - s12 * s22_inv * s12.transpose();
    let system = c1.try_inverse()? * reduced;

    let quad = constrained_eigenvector(&system)?;
    let lin = -s22_inv * s12.transpose() * quad;

    let conic = denormalize(
        [quad[0], quad[1], quad[2], lin[0], lin[1], lin[2]],
        mx,
        my,
        s,
    );
    conic_to_ellipse(conic)
}

/// Centroid shift and isotropic scale bringing the mean distance to sqrt(2).
fn normalization(points: &[Point2d]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    let mx = points.iter().map(|p| p.x).sum::<f64>() / n;
    let my = points.iter().map(|p| p.y).sum::<f64>() / n;
    let mean_dist = points
        .iter()
        .map(|p| Point2d::new(mx, my).distance(*p))
        .sum::<f64>()
        / n;

    let s = if mean_dist > 1e-15 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };
    (mx, my, s)
}

/// Conic coefficients in normalized coordinates `x' = s(x - mx)` mapped back
/// to image coordinates.
fn denormalize(c: [f64; 6], mx: f64, my: f64, s: f64) -> [f64; 6] {
    let [a, b, cc, d, e, f] = c;
    let s2 = s * s;
    [
        a * s2,
        b * s2,
        cc * s2,
        -2.0 * a * s2 * mx - b * s2 * my + d * s,
        -b * s2 * mx - 2.0 * cc * s2 * my + e * s,
        a * s2 * mx * mx + b * s2 * mx * my + cc * s2 * my * my - d * s * mx - e * s * my + f,
    ]
}

fn conic_to_ellipse([a, b, c, d, e, f]: [f64; 6]) -> Option<Ellipse> {
    let denom = 4.0 * a * c - b * b;
    if denom <= 0.0 {
        return None;
    }

    let cx = (b * e - 2.0 * c * d) / denom;
    let cy = (b * d - 2.0 * a * e) / denom;
    let f0 = a * cx * cx + b * cx * cy + c * cy * cy + d * cx + e * cy + f;
    if f0.abs() < 1e-15 {
        return None;
    }

    let root = ((a - c).powi(2) + b * b).sqrt();
    let l1 = 0.5 * (a + c + root);
    let l2 = 0.5 * (a + c - root);
    let s1 = -f0 / l1;
    let s2 = -f0 / l2;
    if s1 <= 0.0 || s2 <= 0.0 || !s1.is_finite() || !s2.is_finite() {
        return None;
    }

    // `theta` is the axis direction of eigenvalue `l1`.
    let theta = 0.5 * b.atan2(a - c);
    let (semi_1, semi_2) = (s1.sqrt(), s2.sqrt());
    let (major, minor, angle) = if semi_2 >= semi_1 {
        (semi_2, semi_1, theta + std::f64::consts::FRAC_PI_2)
    } else {
        (semi_1, semi_2, theta)
    };

    Some(Ellipse {
        center: Point2d::new(cx, cy),
        major: 2.0 * major,
        minor: 2.0 * minor,
        angle: wrap_half_turn(angle),
    })
}

fn wrap_half_turn(mut angle: f64) -> f64 {
    use std::f64::consts::{FRAC_PI_2, PI};
    while angle > FRAC_PI_2 {
        angle -= PI;
    }
    while angle <= -FRAC_PI_2 {
        angle += PI;
    }
    angle
}

/// Eigenvector of the reduced 3x3 system satisfying `4AC - B^2 > 0`.
///
/// Eigenvalues come from the characteristic cubic; each eigenvector is the
/// dominant row of the adjugate of `system - lambda I`.
fn constrained_eigenvector(system: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let m = system;
    let trace = m.trace();
    let minors = m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)] + m[(0, 0)] * m[(2, 2)]
        - m[(0, 2)] * m[(2, 0)]
        + m[(1, 1)] * m[(2, 2)]
        - m[(1, 2)] * m[(2, 1)];
    let det = m.determinant();

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for lambda in cubic_roots(-trace, minors, -det) {
        let Some(v) = null_vector(&(m - Matrix3::identity() * lambda)) else {
            continue;
        };
        if 4.0 * v[0] * v[2] - v[1] * v[1] <= 0.0 {
            continue;
        }
        if best.is_none_or(|(l, _)| lambda.abs() < l) {
            best = Some((lambda.abs(), v));
        }
    }
    best.map(|(_, v)| v)
}

fn null_vector(m: &Matrix3<f64>) -> Option<Vector3<f64>> {
    let rows = [
        Vector3::new(
            m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)],
            m[(1, 2)] * m[(2, 0)] - m[(1, 0)] * m[(2, 2)],
            m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)],
        ),
        Vector3::new(
            m[(0, 2)] * m[(2, 1)] - m[(0, 1)] * m[(2, 2)],
            m[(0, 0)] * m[(2, 2)] - m[(0, 2)] * m[(2, 0)],
            m[(0, 1)] * m[(2, 0)] - m[(0, 0)] * m[(2, 1)],
        ),
        Vector3::new(
            m[(0, 1)] * m[(1, 2)] - m[(0, 2)] * m[(1, 1)],
            m[(0, 2)] * m[(1, 0)] - m[(0, 0)] * m[(1, 2)],
            m[(0, 0)] * m[(1, 1)] - m[(0, 1)] * m[(1, 0)],
        ),
    ];

    let best = rows
        .into_iter()
        .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
    let norm = best.norm();
    if norm < 1e-15 {
        return None;
    }
    Some(best / norm)
}

/// Real roots of `x^3 + b x^2 + c x + d`.
fn cubic_roots(b: f64, c: f64, d: f64) -> Vec<f64> {
    let p = c - b * b / 3.0;
    let q = 2.0 * b * b * b / 27.0 - b * c / 3.0 + d;
    let shift = -b / 3.0;
    let disc = -4.0 * p * p * p - 27.0 * q * q;

    if disc >= 0.0 {
        let r = (-p / 3.0).max(0.0).sqrt();
        let arg = if r < 1e-15 {
            0.0
        } else {
            (-q / (2.0 * r * r * r)).clamp(-1.0, 1.0)
        };
        let theta = arg.acos();
        let tau = 2.0 * std::f64::consts::PI;
        (0..3)
            .map(|k| 2.0 * r * ((theta + tau * k as f64) / 3.0).cos() + shift)
            .collect()
    } else {
        let sq = (q * q / 4.0 + p * p * p / 27.0).sqrt();
        vec![(-q / 2.0 + sq).cbrt() + (-q / 2.0 - sq).cbrt() + shift]
    }
}
