use mm_core::{ImageView, Point2i};

use crate::contour::Contour;

/// Chain directions, clockwise on screen (y grows downward):
/// E, SE, S, SW, W, NW, N, NE.
const DX: [i32; 8] = [1, 1, 0, -1, -1, -1, 0, 1];
const DY: [i32; 8] = [0, 1, 1, 1, 0, -1, -1, -1];
const WEST: u8 = 4;

const NB4_DX: [isize; 4] = [1, 0, -1, 0];
const NB4_DY: [isize; 4] = [0, 1, 0, -1];

/// Which borders [`find_contours`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retrieval {
    /// Outer borders of components reachable from the image frame through
    /// background, i.e. not nested inside a hole of another component.
    External,
    /// Outer borders of every component, nested ones included.
    List,
}

/// Point density of the traced border.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChainApprox {
    /// Every border pixel.
    None,
    /// Only the end points of horizontal, vertical and diagonal runs.
    #[default]
    Simple,
}

/// Traces borders of 8-connected foreground (non-zero) components.
///
/// Pixels outside the image count as background. Each contour starts at the
/// top-most, left-most pixel of its component and runs clockwise on screen;
/// contours are returned in raster order of their start pixels. A
/// single-pixel component yields a one-point contour.
pub fn find_contours(
    mask: &ImageView<'_, u8>,
    retrieval: Retrieval,
    approx: ChainApprox,
) -> Vec<Contour> {
    let (w, h) = (mask.width(), mask.height());
    if w == 0 || h == 0 {
        return Vec::new();
    }

    let fg: Vec<bool> = (0..h)
        .flat_map(|y| mask.row(y).iter().map(|&v| v != 0))
        .collect();

    let outside = match retrieval {
        Retrieval::External => Some(outside_background(&fg, w, h)),
        Retrieval::List => None,
    };

    let mut seen = vec![false; w * h];
    let mut stack = Vec::new();
    let mut contours = Vec::new();

    for start in 0..fg.len() {
        if !fg[start] || seen[start] {
            continue;
        }

        seen[start] = true;
        stack.clear();
        stack.push(start);
        let mut external = false;

        while let Some(p) = stack.pop() {
            let (x, y) = ((p % w) as isize, (p / w) as isize);
            if let Some(outside) = &outside
                && !external
            {
                external = touches_outside(x, y, w, h, outside);
            }

            for (&dx, &dy) in DX.iter().zip(&DY) {
                let Some(nb) = index(x + dx as isize, y + dy as isize, w, h) else {
                    continue;
                };
                if fg[nb] && !seen[nb] {
                    seen[nb] = true;
                    stack.push(nb);
                }
            }
        }

        if outside.is_some() && !external {
            continue;
        }

        let origin = Point2i::new((start % w) as i32, (start / w) as i32);
        let (points, moves) = trace_border(&fg, w, h, origin);
        let points = match approx {
            ChainApprox::None => points,
            ChainApprox::Simple => compress_runs(points, &moves),
        };
        contours.push(Contour::new(points));
    }

    contours
}

/// Background pixels 4-connected to the image frame.
fn outside_background(fg: &[bool], w: usize, h: usize) -> Vec<bool> {
    let mut outside = vec![false; w * h];
    let mut stack = Vec::new();

    let frame = (0..w)
        .flat_map(|x| [x, (h - 1) * w + x])
        .chain((0..h).flat_map(|y| [y * w, y * w + w - 1]));
    for p in frame {
        if !fg[p] && !outside[p] {
            outside[p] = true;
            stack.push(p);
        }
    }

    while let Some(p) = stack.pop() {
        let (x, y) = ((p % w) as isize, (p / w) as isize);
        for (&dx, &dy) in NB4_DX.iter().zip(&NB4_DY) {
            let Some(nb) = index(x + dx, y + dy, w, h) else {
                continue;
            };
            if !fg[nb] && !outside[nb] {
                outside[nb] = true;
                stack.push(nb);
            }
        }
    }

    outside
}

fn touches_outside(x: isize, y: isize, w: usize, h: usize, outside: &[bool]) -> bool {
    NB4_DX.iter().zip(&NB4_DY).any(|(&dx, &dy)| {
        // The frame beyond the image is outside by definition.
        index(x + dx, y + dy, w, h).is_none_or(|nb| outside[nb])
    })
}

/// Moore-neighbour border following with Jacob's stopping criterion.
///
/// Returns the border pixels and, per pixel, the chain direction to the next
/// one (the last entry closes the loop).
fn trace_border(fg: &[bool], w: usize, h: usize, start: Point2i) -> (Vec<Point2i>, Vec<u8>) {
    let is_fg = |p: Point2i| {
        index(p.x as isize, p.y as isize, w, h).is_some_and(|i| fg[i])
    };

    let mut points = vec![start];
    let mut moves = Vec::new();

    // Raster order guarantees the west neighbour of `start` is background.
    let Some((first, mut back)) = next_step(&is_fg, start, WEST) else {
        return (points, moves);
    };
    moves.push(first);
    let mut cur = step(start, first);

    while let Some((dir, next_back)) = next_step(&is_fg, cur, back) {
        if cur == start && dir == first {
            break;
        }
        points.push(cur);
        moves.push(dir);
        cur = step(cur, dir);
        back = next_back;
    }

    (points, moves)
}

/// Scans the 8 neighbours of `c` clockwise starting at the background
/// neighbour `back`. Returns the direction of the first foreground neighbour
/// and the background neighbour to resume from once there.
fn next_step(is_fg: &impl Fn(Point2i) -> bool, c: Point2i, back: u8) -> Option<(u8, u8)> {
    for k in 0..8u8 {
        let dir = (back + k) % 8;
        if !is_fg(step(c, dir)) {
            continue;
        }

        let prev = (dir + 7) % 8;
        let dx = DX[prev as usize] - DX[dir as usize];
        let dy = DY[prev as usize] - DY[dir as usize];
        return Some((dir, direction_of(dx, dy)));
    }
    None
}

fn compress_runs(points: Vec<Point2i>, moves: &[u8]) -> Vec<Point2i> {
    let n = points.len();
    if n < 3 || moves.len() != n {
        return points;
    }

    let kept: Vec<Point2i> = points
        .iter()
        .enumerate()
        .filter(|&(i, _)| moves[(i + n - 1) % n] != moves[i])
        .map(|(_, &p)| p)
        .collect();

    if kept.is_empty() { points } else { kept }
}

#[inline]
fn step(p: Point2i, dir: u8) -> Point2i {
    Point2i::new(p.x + DX[dir as usize], p.y + DY[dir as usize])
}

fn direction_of(dx: i32, dy: i32) -> u8 {
    DX.iter()
        .zip(&DY)
        .position(|(&x, &y)| x == dx && y == dy)
        .map_or(WEST, |d| d as u8)
}

#[inline]
fn index(x: isize, y: isize, w: usize, h: usize) -> Option<usize> {
    if x < 0 || y < 0 || x >= w as isize || y >= h as isize {
        return None;
    }
    Some(y as usize * w + x as usize)
}
