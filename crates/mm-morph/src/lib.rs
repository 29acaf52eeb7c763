//! Erosion, dilation, opening and closing with rectangular and cross-shaped
//! structuring elements.
//!
//! Operators work on 8-bit images as minimum (erode) / maximum (dilate)
//! filters, so binary masks with values `0` / `255` stay binary. Taps that
//! fall outside the image do not participate: an all-set mask is not eroded
//! from its borders, and dilation does not invent foreground at the edges.
//!
//! `iterations` repeats the base operator; `open(n)` is `n` erosions followed
//! by `n` dilations, `close(n)` the reverse.

use std::collections::VecDeque;

use mm_core::{Image, ImageView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelShape {
    /// Every tap of the `w x h` box.
    Rect,
    /// The anchor row and the anchor column of the `w x h` box.
    Cross,
}

/// Structuring element anchored at `(w / 2, h / 2)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructuringElement {
    shape: KernelShape,
    width: usize,
    height: usize,
    offsets: Vec<(isize, isize)>,
}

impl StructuringElement {
    pub fn new(shape: KernelShape, width: usize, height: usize) -> Self {
        assert!(width > 0 && height > 0, "structuring element must be non-empty");

        let ax = (width / 2) as isize;
        let ay = (height / 2) as isize;
        let mut offsets = Vec::new();
        for j in 0..height as isize {
            for i in 0..width as isize {
                let keep = match shape {
                    KernelShape::Rect => true,
                    KernelShape::Cross => i == ax || j == ay,
                };
                if keep {
                    offsets.push((i - ax, j - ay));
                }
            }
        }

        Self {
            shape,
            width,
            height,
            offsets,
        }
    }

    pub fn square(size: usize) -> Self {
        Self::new(KernelShape::Rect, size, size)
    }

    pub fn cross(size: usize) -> Self {
        Self::new(KernelShape::Cross, size, size)
    }

    pub fn shape(&self) -> KernelShape {
        self.shape
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Tap offsets `(dx, dy)` relative to the anchor.
    pub fn offsets(&self) -> &[(isize, isize)] {
        &self.offsets
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extreme {
    Min,
    Max,
}

impl Extreme {
    #[inline]
    fn pick(self, a: u8, b: u8) -> u8 {
        match self {
            Self::Min => a.min(b),
            Self::Max => a.max(b),
        }
    }

    /// True when `incoming` makes `queued` irrelevant for the window result.
    #[inline]
    fn dominates(self, incoming: u8, queued: u8) -> bool {
        match self {
            Self::Min => incoming <= queued,
            Self::Max => incoming >= queued,
        }
    }
}

pub fn erode(src: &ImageView<'_, u8>, se: &StructuringElement, iterations: usize) -> Image<u8> {
    repeat(src, se, iterations, Extreme::Min)
}

pub fn dilate(src: &ImageView<'_, u8>, se: &StructuringElement, iterations: usize) -> Image<u8> {
    repeat(src, se, iterations, Extreme::Max)
}

/// Erosion then dilation: strips protrusions thinner than the element.
pub fn open(src: &ImageView<'_, u8>, se: &StructuringElement, iterations: usize) -> Image<u8> {
    let eroded = erode(src, se, iterations);
    dilate(&eroded.as_view(), se, iterations)
}

/// Dilation then erosion: fills gaps narrower than the element.
pub fn close(src: &ImageView<'_, u8>, se: &StructuringElement, iterations: usize) -> Image<u8> {
    let dilated = dilate(src, se, iterations);
    erode(&dilated.as_view(), se, iterations)
}

fn repeat(
    src: &ImageView<'_, u8>,
    se: &StructuringElement,
    iterations: usize,
    op: Extreme,
) -> Image<u8> {
    let mut current = src.to_image();
    for _ in 0..iterations {
        current = match se.shape {
            KernelShape::Rect => rect_pass(&current.as_view(), se, op),
            KernelShape::Cross => generic_pass(&current.as_view(), se, op),
        };
    }
    current
}

/// Box filters separate into a horizontal and a vertical sliding extreme.
fn rect_pass(src: &ImageView<'_, u8>, se: &StructuringElement, op: Extreme) -> Image<u8> {
    let (w, h) = (src.width(), src.height());
    let mut out = Image::new_fill(w, h, 0u8);
    if w == 0 || h == 0 {
        return out;
    }

    let (before_x, after_x) = reach(se.width);
    let (before_y, after_y) = reach(se.height);

    let mut horiz = Image::new_fill(w, h, 0u8);
    for y in 0..h {
        sliding_extreme(src.row(y), before_x, after_x, horiz.row_mut(y), op);
    }

    let mut column = vec![0u8; h];
    let mut filtered = vec![0u8; h];
    for x in 0..w {
        for (y, v) in column.iter_mut().enumerate() {
            *v = horiz.data()[y * w + x];
        }
        sliding_extreme(&column, before_y, after_y, &mut filtered, op);
        for (y, &v) in filtered.iter().enumerate() {
            out.data_mut()[y * w + x] = v;
        }
    }

    out
}

fn generic_pass(src: &ImageView<'_, u8>, se: &StructuringElement, op: Extreme) -> Image<u8> {
    let (w, h) = (src.width() as isize, src.height() as isize);
    let mut out = Image::new_fill(src.width(), src.height(), 0u8);

    for y in 0..h {
        let dst = out.row_mut(y as usize);
        for x in 0..w {
            let mut acc = match op {
                Extreme::Min => u8::MAX,
                Extreme::Max => u8::MIN,
            };
            for &(dx, dy) in se.offsets() {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w || ny >= h {
                    continue;
                }
                acc = op.pick(acc, src.row(ny as usize)[nx as usize]);
            }
            dst[x as usize] = acc;
        }
    }

    out
}

/// Taps before and after the anchor for a 1D extent of `len`.
fn reach(len: usize) -> (usize, usize) {
    let before = len / 2;
    (before, len - 1 - before)
}

/// `out[i] = extreme(line[i - before ..= i + after])`, window clipped to the
/// line. Monotonic deque, O(1) amortized per sample.
fn sliding_extreme(line: &[u8], before: usize, after: usize, out: &mut [u8], op: Extreme) {
    let n = line.len();
    let mut window: VecDeque<usize> = VecDeque::with_capacity(before + after + 1);
    let mut next = 0usize;

    for (i, dst) in out.iter_mut().enumerate().take(n) {
        let hi = (i + after).min(n - 1);
        while next <= hi {
            while let Some(&back) = window.back() {
                if op.dominates(line[next], line[back]) {
                    window.pop_back();
                } else {
                    break;
                }
            }
            window.push_back(next);
            next += 1;
        }

        let lo = i.saturating_sub(before);
        while let Some(&front) = window.front() {
            if front < lo {
                window.pop_front();
            } else {
                break;
            }
        }

        *dst = window.front().map_or(0, |&j| line[j]);
    }
}
