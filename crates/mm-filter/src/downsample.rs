use mm_core::{Image, ImageView};

/// Halves both dimensions with a 2x2 box mean (rounded to nearest).
///
/// Odd trailing rows/columns are dropped: output is
/// `(src.width() / 2, src.height() / 2)`.
pub fn downsample2x2_mean_u8(src: &ImageView<'_, u8>) -> Image<u8> {
    let dst_w = src.width() / 2;
    let dst_h = src.height() / 2;
    let mut dst = Image::new_fill(dst_w, dst_h, 0u8);
    if dst_w == 0 || dst_h == 0 {
        return dst;
    }

    for y in 0..dst_h {
        let row0 = src.row(2 * y);
        let row1 = src.row(2 * y + 1);
        for (x, out) in dst.row_mut(y).iter_mut().enumerate() {
            let sx = 2 * x;
            let sum = row0[sx] as u32 + row0[sx + 1] as u32 + row1[sx] as u32 + row1[sx + 1] as u32;
            *out = ((sum + 2) / 4) as u8;
        }
    }

    dst
}
