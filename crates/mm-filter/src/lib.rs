//! Smoothing, thresholding and downsampling for 8-bit grayscale images.
//!
//! Thresholds produce binary masks with values `0` / `255`, foreground set.
//! The `_inv` variants mark *dark* pixels as foreground, which is the
//! polarity of an organism photographed on a bright background.
//!
//! Adaptive thresholding compares each pixel with a Gaussian-weighted local
//! mean over a `block x block` neighbourhood; borders replicate the edge
//! pixel. Global thresholding picks a single level per image with Otsu's
//! method.

mod conv;
mod downsample;
mod kernel;
mod threshold;

pub use conv::{convolve_f32, gaussian_blur_u8};
pub use downsample::downsample2x2_mean_u8;
pub use kernel::GaussianKernel1D;
pub use threshold::{
    ThresholdError, adaptive_threshold_gaussian_inv, binarize_nonzero, otsu_level,
    threshold_binary_inv, threshold_otsu_inv, threshold_to_zero_inv,
};
