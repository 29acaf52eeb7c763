/// Normalized 1D Gaussian kernel.
///
/// Conventions:
/// - `taps.len() == 2 * radius + 1`, centre tap at index `radius`.
/// - `sum(taps) ~= 1`.
#[derive(Debug, Clone)]
pub struct GaussianKernel1D {
    pub sigma: f32,
    pub radius: usize,
    pub taps: Vec<f32>,
}

impl GaussianKernel1D {
    /// Kernel spanning exactly `ksize` taps, with sigma derived from the size
    /// as `0.3 * ((ksize - 1) / 2 - 1) + 0.8`.
    ///
    /// This is the weighting used for adaptive thresholding, where the block
    /// size, not sigma, is the tuning parameter.
    pub fn for_block(ksize: usize) -> Self {
        assert!(ksize % 2 == 1, "ksize must be odd");

        let radius = ksize / 2;
        let sigma = 0.3 * ((ksize as f32 - 1.0) * 0.5 - 1.0) + 0.8;
        let denom = 2.0 * sigma * sigma;

        let mut taps: Vec<f32> = (0..ksize)
            .map(|i| {
                let x = i as f32 - radius as f32;
                (-(x * x) / denom).exp()
            })
            .collect();
        let sum: f32 = taps.iter().sum();
        for t in &mut taps {
            *t /= sum;
        }

        Self {
            sigma,
            radius,
            taps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::GaussianKernel1D;

    #[test]
    fn taps_are_normalized_and_symmetric() {
        let k = GaussianKernel1D::for_block(9);
        assert_eq!(k.radius, 4);

        let sum: f32 = k.taps.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        for i in 1..=k.radius {
            assert!((k.taps[k.radius + i] - k.taps[k.radius - i]).abs() < 1e-7);
            assert!(k.taps[k.radius + i] < k.taps[k.radius + i - 1]);
        }
    }

    #[test]
    fn block_kernel_derives_sigma_from_size() {
        let k = GaussianKernel1D::for_block(499);
        assert_eq!(k.taps.len(), 499);
        assert!((k.sigma - 75.2).abs() < 1e-3);

        let small = GaussianKernel1D::for_block(3);
        assert_eq!(small.radius, 1);
        assert!((small.sigma - 0.8).abs() < 1e-6);
    }
}
