use crate::{Error, Rect};

/// Owned row-major image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Image<T> {
    /// Wraps `data`, which must hold exactly `width * height` pixels.
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, Error> {
        match width.checked_mul(height) {
            Some(n) if n == data.len() => Ok(Self {
                width,
                height,
                data,
            }),
            n => Err(Error::SizeMismatch {
                expected: n.unwrap_or(usize::MAX),
                actual: data.len(),
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&T> {
        (x < self.width && y < self.height).then(|| &self.data[y * self.width + x])
    }

    pub fn get_mut(&mut self, x: usize, y: usize) -> Option<&mut T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get_mut(y * self.width + x)
    }

    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row {y} outside image of height {}", self.height);
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row {y} outside image of height {}", self.height);
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            width: self.width,
            height: self.height,
            stride: self.width,
            data: &self.data,
        }
    }
}

impl<T: Clone> Image<T> {
    pub fn new_fill(width: usize, height: usize, value: T) -> Self {
        let len = width.checked_mul(height).expect("image size overflow");
        Self {
            width,
            height,
            data: vec![value; len],
        }
    }
}

impl<T: Copy> Image<T> {
    /// Applies `f` to every pixel, producing a new image of the same extent.
    pub fn map<U>(&self, mut f: impl FnMut(T) -> U) -> Image<U> {
        Image {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

impl Image<u8> {
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Zeroes every pixel whose `mask` counterpart is 0.
    pub fn masked_by(&self, mask: &Image<u8>) -> Result<Image<u8>, Error> {
        if (mask.width, mask.height) != (self.width, self.height) {
            return Err(Error::SizeMismatch {
                expected: self.data.len(),
                actual: mask.data.len(),
            });
        }

        let data = self
            .data
            .iter()
            .zip(&mask.data)
            .map(|(&v, &m)| if m != 0 { v } else { 0 })
            .collect();

        Ok(Image {
            width: self.width,
            height: self.height,
            data,
        })
    }
}

/// Borrowed window onto a row-major buffer with an element stride.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, T> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a [T],
}

impl<'a, T> ImageView<'a, T> {
    pub fn from_slice(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [T],
    ) -> Result<Self, Error> {
        if stride < width {
            return Err(Error::InvalidStride);
        }

        let needed = match (width, height) {
            (0, _) | (_, 0) => Some(0),
            _ => (height - 1)
                .checked_mul(stride)
                .and_then(|n| n.checked_add(width)),
        };
        match needed {
            Some(n) if n <= data.len() => Ok(Self {
                width,
                height,
                stride,
                data,
            }),
            n => Err(Error::SizeMismatch {
                expected: n.unwrap_or(usize::MAX),
                actual: data.len(),
            }),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width, self.height)
    }

    pub fn row(&self, y: usize) -> &'a [T] {
        assert!(y < self.height, "row {y} outside view of height {}", self.height);
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn get(&self, x: usize, y: usize) -> Option<&'a T> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data.get(y * self.stride + x)
    }
}

impl<T: Copy> ImageView<'_, T> {
    /// Copies the viewed pixels into a new, contiguous image.
    pub fn to_image(&self) -> Image<T> {
        let mut data = Vec::with_capacity(self.width * self.height);
        for y in 0..self.height {
            data.extend_from_slice(self.row(y));
        }

        Image {
            width: self.width,
            height: self.height,
            data,
        }
    }

    /// Copies `rect` out of the view. The rectangle must lie inside the view
    /// and be non-empty.
    pub fn crop(&self, rect: Rect) -> Result<Image<T>, Error> {
        if rect.is_empty() {
            return Err(Error::EmptyRegion);
        }
        if rect.right() > self.width || rect.bottom() > self.height {
            return Err(Error::OutOfBounds);
        }

        let mut data = Vec::with_capacity(rect.width * rect.height);
        for y in rect.y..rect.bottom() {
            data.extend_from_slice(&self.row(y)[rect.x..rect.right()]);
        }

        Ok(Image {
            width: rect.width,
            height: rect.height,
            data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{Image, ImageView};
    use crate::{Error, Rect};

    #[test]
    fn strided_view_skips_padding() {
        let data = vec![1u8, 2, 3, 99, 4, 5, 6, 88];
        let view = ImageView::from_slice(3, 2, 4, &data).expect("valid view");

        assert_eq!(view.row(1), &[4, 5, 6]);
        assert_eq!(view.get(2, 1), Some(&6));
        assert_eq!(view.get(3, 1), None);
        assert_eq!(view.to_image().data(), &[1, 2, 3, 4, 5, 6]);

        assert_eq!(
            ImageView::from_slice(3, 2, 2, &data).err(),
            Some(Error::InvalidStride)
        );
        assert_eq!(
            ImageView::from_slice(3, 3, 4, &data).err(),
            Some(Error::SizeMismatch {
                expected: 11,
                actual: 8
            })
        );
    }

    #[test]
    fn crop_copies_window_out_of_parent() {
        let data: Vec<u8> = (0..20).collect();
        let img = Image::from_vec(5, 4, data).expect("valid image");

        let roi = img.as_view().crop(Rect::new(1, 1, 3, 2)).expect("in bounds");
        assert_eq!((roi.width(), roi.height()), (3, 2));
        assert_eq!(roi.data(), &[6, 7, 8, 11, 12, 13]);

        assert_eq!(
            img.as_view().crop(Rect::new(4, 0, 2, 1)),
            Err(Error::OutOfBounds)
        );
        assert_eq!(
            img.as_view().crop(Rect::new(1, 1, 0, 2)),
            Err(Error::EmptyRegion)
        );
    }

    #[test]
    fn from_vec_checks_pixel_count() {
        assert_eq!(
            Image::from_vec(2, 2, vec![0u8; 3]),
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 3
            })
        );
        let img = Image::from_vec(2, 3, vec![0u8; 6]).expect("valid image");
        assert_eq!(img.get(1, 2), Some(&0));
        assert_eq!(img.get(2, 0), None);
    }

    #[test]
    fn masked_by_keeps_only_set_pixels() {
        let img = Image::from_vec(3, 1, vec![10u8, 20, 30]).expect("valid image");
        let mask = Image::from_vec(3, 1, vec![255u8, 0, 1]).expect("valid mask");

        let out = img.masked_by(&mask).expect("same size");
        assert_eq!(out.data(), &[10, 0, 30]);
        assert_eq!(out.count_nonzero(), 2);

        let other = Image::new_fill(2, 1, 255u8);
        assert!(img.masked_by(&other).is_err());
    }
}
