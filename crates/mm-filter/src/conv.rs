use mm_core::{Image, ImageView};

use crate::kernel::GaussianKernel1D;

/// Convolves `signal` with an odd-length `kernel` of the given `radius`.
/// Taps past either end replicate the edge sample.
pub fn convolve_f32(signal: &[f32], kernel: &[f32], radius: usize, out: &mut [f32]) {
    assert_eq!(out.len(), signal.len(), "out must match signal length");
    assert_eq!(
        kernel.len(),
        2 * radius + 1,
        "kernel len must be 2*radius+1"
    );

    let n = signal.len();
    if n == 0 {
        return;
    }

    // Interior taps never touch the border, so they skip the clamp.
    let interior = radius..n.saturating_sub(radius);
    let last = n as isize - 1;
    for (i, out_i) in out.iter_mut().enumerate() {
        if interior.contains(&i) {
            let window = &signal[i - radius..=i + radius];
            *out_i = window
                .iter()
                .zip(kernel.iter().rev())
                .map(|(&s, &k)| s * k)
                .sum();
            continue;
        }

        *out_i = kernel
            .iter()
            .enumerate()
            .map(|(k, &kv)| {
                let idx = (i as isize + radius as isize - k as isize).clamp(0, last);
                signal[idx as usize] * kv
            })
            .sum();
    }
}

/// Separable Gaussian blur of an 8-bit image with replicated borders,
/// rounded back to 8 bits.
pub fn gaussian_blur_u8(src: &ImageView<'_, u8>, kernel: &GaussianKernel1D) -> Image<u8> {
    let (w, h) = (src.width(), src.height());
    if w == 0 || h == 0 {
        return Image::new_fill(w, h, 0u8);
    }

    let mut horiz = Image::new_fill(w, h, 0.0f32);
    let mut line = vec![0.0f32; w];
    for y in 0..h {
        for (dst, &px) in line.iter_mut().zip(src.row(y)) {
            *dst = px as f32;
        }
        convolve_f32(&line, &kernel.taps, kernel.radius, horiz.row_mut(y));
    }

    let mut out = Image::new_fill(w, h, 0u8);
    let mut column = vec![0.0f32; h];
    let mut smoothed = vec![0.0f32; h];
    for x in 0..w {
        for (y, dst) in column.iter_mut().enumerate() {
            *dst = horiz.data()[y * w + x];
        }
        convolve_f32(&column, &kernel.taps, kernel.radius, &mut smoothed);
        for (y, &v) in smoothed.iter().enumerate() {
            out.data_mut()[y * w + x] = v.round().clamp(0.0, 255.0) as u8;
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use mm_core::Image;

    use crate::conv::{convolve_f32, gaussian_blur_u8};
    use crate::kernel::GaussianKernel1D;

    #[test]
    fn identity_kernel_copies_signal() {
        let signal = [1.0f32, 2.0, 3.0, 4.0];
        let mut out = vec![0.0f32; signal.len()];
        convolve_f32(&signal, &[1.0], 0, &mut out);
        assert_eq!(&out, &signal);
    }

    #[test]
    fn edges_replicate_the_outermost_sample() {
        let signal = [1.0f32, 2.0, 3.0];
        let mut out = vec![0.0f32; 3];
        convolve_f32(&signal, &[1.0, 1.0, 1.0], 1, &mut out);
        assert_eq!(out, vec![4.0, 6.0, 8.0]);

        // Kernel wider than the signal.
        let mut wide = vec![0.0f32; 1];
        convolve_f32(&[5.0], &[1.0; 5], 2, &mut wide);
        assert_eq!(wide, vec![25.0]);
    }

    #[test]
    fn blur_preserves_flat_image() {
        let img = Image::new_fill(9, 7, 200u8);
        let k = GaussianKernel1D::for_block(5);
        let out = gaussian_blur_u8(&img.as_view(), &k);
        assert!(out.data().iter().all(|&v| v == 200));
    }

    #[test]
    fn blur_spreads_a_spike_symmetrically() {
        let mut img = Image::new_fill(9, 9, 0u8);
        *img.get_mut(4, 4).expect("in bounds") = 255;

        let k = GaussianKernel1D::for_block(7);
        let out = gaussian_blur_u8(&img.as_view(), &k);

        let centre = *out.get(4, 4).expect("in bounds");
        assert!(centre < 255 && centre > 0);
        assert_eq!(out.get(3, 4), out.get(5, 4));
        assert_eq!(out.get(4, 3), out.get(4, 5));
        assert!(out.get(3, 4) < Some(&centre));
    }
}
