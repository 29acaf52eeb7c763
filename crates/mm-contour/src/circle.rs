use mm_core::{Circle, Point2d};

const REL_EPS: f64 = 1e-7;

/// Smallest circle containing every point (Welzl's incremental algorithm).
///
/// Points are visited in a fixed pseudo-random order so border-ordered input
/// does not hit the quadratic worst case. Returns `None` for an empty set.
pub fn min_enclosing_circle(points: &[Point2d]) -> Option<Circle> {
    let mut pts = points.to_vec();
    shuffle(&mut pts);

    let mut circle = Circle {
        center: *pts.first()?,
        radius: 0.0,
    };

    for i in 1..pts.len() {
        if contains(&circle, pts[i]) {
            continue;
        }
        circle = Circle {
            center: pts[i],
            radius: 0.0,
        };
        for j in 0..i {
            if contains(&circle, pts[j]) {
                continue;
            }
            circle = diameter_circle(pts[i], pts[j]);
            for k in 0..j {
                if !contains(&circle, pts[k]) {
                    circle = circumcircle(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    Some(circle)
}

fn contains(c: &Circle, p: Point2d) -> bool {
    c.contains(p, REL_EPS * (1.0 + c.radius))
}

fn diameter_circle(a: Point2d, b: Point2d) -> Circle {
    Circle {
        center: a.midpoint(b),
        radius: 0.5 * a.distance(b),
    }
}

/// Circle through three points; collinear triples fall back to the circle
/// spanning the farthest pair.
fn circumcircle(a: Point2d, b: Point2d, c: Point2d) -> Circle {
    let ab = b - a;
    let ac = c - a;
    let d = 2.0 * (ab.x * ac.y - ab.y * ac.x);

    let scale = ab.norm().max(ac.norm()).max(1.0);
    if d.abs() < 1e-12 * scale * scale {
        let candidates = [diameter_circle(a, b), diameter_circle(a, c), diameter_circle(b, c)];
        return candidates
            .into_iter()
            .max_by(|l, r| l.radius.total_cmp(&r.radius))
            .unwrap_or(candidates[0]);
    }

    let ab2 = ab.x * ab.x + ab.y * ab.y;
    let ac2 = ac.x * ac.x + ac.y * ac.y;
    let ux = (ac.y * ab2 - ab.y * ac2) / d;
    let uy = (ab.x * ac2 - ac.x * ab2) / d;
    let center = Point2d::new(a.x + ux, a.y + uy);

    Circle {
        center,
        radius: (ux * ux + uy * uy).sqrt(),
    }
}

fn shuffle(pts: &mut [Point2d]) {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    for i in (1..pts.len()).rev() {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        let j = ((state >> 33) % (i as u64 + 1)) as usize;
        pts.swap(i, j);
    }
}
