//! Silhouette morphometry of single organisms on a uniform background.
//!
//! ## Pipeline
//! 1. [`normalize`] shifts camera images so their background sits at a
//!    common gray level ([`normalize_batch`]).
//! 2. [`RegionDetector`] finds regions of interest: one per photo in camera
//!    mode, many per page in scanner mode.
//! 3. [`ShapeRecognizer`] re-thresholds inside each ROI and cleans the mask
//!    with closing and opening, then keeps the largest contour.
//! 4. [`measure`] converts the silhouette to millimetres and collects
//!    intensity statistics.
//! 5. Results go to a tab-separated ledger ([`CameraLedger`],
//!    [`ScannerLedger`]) and an annotated control image ([`control`]).
//!
//! [`camera_batch`] and [`scanner_batch`] run the full chain over a
//! directory, driven by [`MorphometryConfig`].
//!
//! ## Coordinates
//! Contours returned by the recognizer are ROI-local; [`Roi::bounds`] holds
//! the ROI window in parent image coordinates. Measurement centroids are
//! reported in parent coordinates.

pub mod config;
pub mod control;
mod detect;
mod error;
pub mod io;
mod ledger;
mod measure;
mod normalize;
mod pipeline;
mod recognize;

pub use config::{
    CameraConfig, CleanupSchedule, ContourRetrieval, DetectStrategy, DetectorConfig,
    EnvelopeConfig, KernelShape, MeasureConfig, MorphOp, MorphometryConfig, NormalizeConfig,
    PathsConfig, RecognizerConfig, ScannerConfig, ScheduleFactors, SizeFilter, ThresholdMethod,
};
pub use detect::{RegionDetector, Roi, RoiAnchor, provisional_length};
pub use error::{ConfigError, Error, MeasureError, Result};
pub use ledger::{
    CAMERA_HEADER, CameraLedger, SCANNER_HEADER, ScannerLedger, Upsert, camera_row, scanner_row,
};
pub use measure::{Measurement, measure};
pub use normalize::{Normalized, background_level, normalize};
pub use pipeline::{
    BatchSummary, CaptureDate, FixedCaptureDate, NoCaptureDate, camera_batch, compact_date,
    gray_name, normalize_batch, scanner_batch,
};
pub use recognize::{Cleanup, ShapeRecognizer, size_adaptive_schedule};
