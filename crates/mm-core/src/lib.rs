//! Foundational primitives for silhouette morphometry.
//!
//! ## Images and Views
//! [`Image`] owns a row-major buffer. [`ImageView`] borrows one with an
//! element stride (not byte stride); a region of interest is copied out of a
//! view with [`ImageView::crop`].
//!
//! ## Coordinates
//! Pixel `(x, y)` is column `x`, row `y`, origin at the top-left corner.
//! Integer points ([`Point2i`]) address pixels; [`Point2d`] is used for
//! derived geometry such as circle centres and centroids, where integer
//! coordinates refer to pixel centres.

mod error;
mod geom;
mod image;

pub use error::Error;
pub use geom::{Circle, Point2d, Point2i, Rect};
pub use image::{Image, ImageView};
