//! Border tracing and contour geometry on binary masks.
//!
//! - [`find_contours`] labels 8-connected foreground components and follows
//!   each outer border with Moore-neighbour tracing. [`Retrieval::External`]
//!   keeps only components reachable from the image frame; holes are not
//!   reported as separate contours.
//! - [`Contour`] carries the polygon through border pixel centres together
//!   with its shoelace area, moments, bounding box, minimum enclosing circle
//!   and direct least-squares ellipse fit.
//! - [`fill_contour`] rasterizes a contour back into a mask.

mod circle;
mod contour;
mod ellipse;
mod fill;
mod trace;

pub use circle::min_enclosing_circle;
pub use contour::{Contour, Moments, largest_by_area};
pub use ellipse::{Ellipse, fit_ellipse};
pub use fill::fill_contour;
pub use trace::{ChainApprox, Retrieval, find_contours};
