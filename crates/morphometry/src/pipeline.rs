//! Batch runners: normalization, camera mode and scanner mode.
//!
//! Images are processed one at a time. A failure on one image is logged and
//! counted; only directory-level problems abort a batch.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{CameraConfig, NormalizeConfig, PathsConfig, ScannerConfig};
use crate::control::{self, Annotation};
use crate::detect::{RegionDetector, Roi};
use crate::error::Result;
use crate::io::{ensure_dir, list_images, load_gray, save_gray};
use crate::ledger::{CameraLedger, ScannerLedger};
use crate::measure::measure;
use crate::normalize::normalize;
use crate::recognize::ShapeRecognizer;

/// Source of the capture date for a raw image, e.g. an EXIF reader.
pub trait CaptureDate {
    /// Raw date string such as `2023:05:09 14:02:11`.
    fn capture_date(&self, path: &Path) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoCaptureDate;

impl CaptureDate for NoCaptureDate {
    fn capture_date(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Same date for every image.
#[derive(Debug, Clone)]
pub struct FixedCaptureDate(pub String);

impl CaptureDate for FixedCaptureDate {
    fn capture_date(&self, _path: &Path) -> Option<String> {
        Some(self.0.clone())
    }
}

/// `YYYY:MM:DD[ hh:mm:ss]` (any separators) or `YYYYMMDD` to `YYYYMMDD`.
pub fn compact_date(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let bytes = raw.as_bytes();
    let digits = |r: std::ops::Range<usize>| {
        bytes
            .get(r.clone())
            .filter(|s| s.iter().all(u8::is_ascii_digit))
            .map(|_| &raw[r])
    };

    if let Some(d) = digits(0..8) {
        return Some(d.to_string());
    }
    Some(format!("{}{}{}", digits(0..4)?, digits(5..7)?, digits(8..10)?))
}

/// Name of the normalized copy of `source`.
pub fn gray_name(source: &Path, date: Option<&str>) -> String {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    match date {
        Some(d) => format!("{stem}_{d}_gray.jpg"),
        None => format!("{stem}_gray.jpg"),
    }
}

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Images looked at.
    pub images: usize,
    /// Images left alone because their output already exists.
    pub skipped: usize,
    /// Ledger rows written (normalized images for [`normalize_batch`]).
    pub measured: usize,
    /// Images (camera) or objects (scanner) with no row.
    pub unmeasured: usize,
    /// Images that failed with an error.
    pub failed: usize,
}

/// Brightness-normalizes every image under `paths.input_dir` (recursively)
/// into `paths.gray_dir`. Existing outputs are never overwritten.
///
/// An invalid `cfg` is rejected with [`crate::Error::Config`] before any file is
/// touched.
pub fn normalize_batch(
    paths: &PathsConfig,
    cfg: &NormalizeConfig,
    dates: &dyn CaptureDate,
) -> Result<BatchSummary> {
    cfg.validate()?;
    ensure_dir(&paths.gray_dir)?;
    let mut summary = BatchSummary::default();

    for src in list_images(&paths.input_dir, true)? {
        summary.images += 1;
        let date = dates.capture_date(&src).and_then(|raw| {
            let compact = compact_date(&raw);
            if compact.is_none() {
                warn!(file = %src.display(), raw, "unparsable capture date; omitting it");
            }
            compact
        });
        let dst = paths.gray_dir.join(gray_name(&src, date.as_deref()));
        if dst.exists() {
            debug!(file = %dst.display(), "normalized image exists; skipping");
            summary.skipped += 1;
            continue;
        }

        let run = || -> Result<f64> {
            let img = load_gray(&src)?;
            let out = normalize(&img.as_view(), cfg);
            save_gray(&out.image, &dst)?;
            Ok(out.background)
        };
        match run() {
            Ok(background) => {
                info!(file = %dst.display(), background, "normalized");
                summary.measured += 1;
            }
            Err(err) => {
                warn!(file = %src.display(), %err, "normalization failed");
                summary.failed += 1;
            }
        }
    }

    Ok(summary)
}

/// Measures one object per normalized image in `paths.gray_dir` and keeps
/// the camera ledger in `paths.out_dir` up to date.
///
/// Images already present in one of the curated output sub-directories are
/// skipped. A crop of the same name under `<gray_dir>/<redo_subdir>` is
/// used as the ROI instead of running detection. A control image
/// `<out_dir>/<name>` is written for every processed image.
pub fn camera_batch(paths: &PathsConfig, cfg: &CameraConfig) -> Result<BatchSummary> {
    cfg.validate()?;
    ensure_dir(&paths.out_dir)?;
    let ledger = CameraLedger::open(paths.out_dir.join(&cfg.ledger_name))?;
    let detector = RegionDetector::new(cfg.detector.clone());
    let recognizer = ShapeRecognizer::new(cfg.recognizer.clone())?;
    let mut summary = BatchSummary::default();

    for path in list_images(&paths.gray_dir, false)? {
        let Some(name) = file_name(&path) else {
            continue;
        };
        summary.images += 1;

        let curated = cfg
            .curated_subdirs
            .iter()
            .any(|d| paths.out_dir.join(d).join(&name).is_file());
        if curated {
            debug!(file = name, "already curated; skipping");
            summary.skipped += 1;
            continue;
        }

        let redo = paths.gray_dir.join(&cfg.redo_subdir).join(&name);
        let job = CameraJob {
            name: &name,
            source: &path,
            redo: redo.is_file().then_some(redo.as_path()),
            control: paths.out_dir.join(&name),
        };
        match job.run(cfg, &detector, &recognizer, &ledger) {
            Ok(true) => summary.measured += 1,
            Ok(false) => summary.unmeasured += 1,
            Err(err) => {
                warn!(file = name, %err, "camera image failed");
                summary.failed += 1;
            }
        }
    }

    info!(?summary, "camera batch done");
    Ok(summary)
}

struct CameraJob<'a> {
    name: &'a str,
    source: &'a Path,
    redo: Option<&'a Path>,
    control: PathBuf,
}

impl CameraJob<'_> {
    /// `Ok(true)` when a ledger row was written.
    fn run(
        &self,
        cfg: &CameraConfig,
        detector: &RegionDetector,
        recognizer: &ShapeRecognizer,
        ledger: &CameraLedger,
    ) -> Result<bool> {
        let roi = match self.redo {
            Some(redo) => {
                debug!(file = self.name, "using manual crop");
                Roi::supplied(load_gray(redo)?)
            }
            None => {
                let gray = load_gray(self.source)?;
                match detector.detect(&gray.as_view())?.into_iter().next() {
                    Some(roi) => roi,
                    None => {
                        warn!(file = self.name, "no object detected");
                        control::save(&control::to_rgb(&gray), &self.control)?;
                        return Ok(false);
                    }
                }
            }
        };

        let contour = recognizer.recognize(&roi)?;
        let measurement = match &contour {
            Some(c) => measure(&roi, c, &cfg.measure)
                .inspect_err(|err| warn!(file = self.name, %err, "measurement skipped"))
                .ok(),
            None => {
                warn!(file = self.name, "no silhouette inside the ROI");
                None
            }
        };

        let written = match measurement {
            Some(m) => {
                let m = m.with_label(self.name);
                let upsert = ledger.upsert(&m)?;
                info!(
                    file = self.name,
                    length = m.length,
                    area = m.area,
                    ?upsert,
                    "measured"
                );
                true
            }
            None => false,
        };

        control::save(&control::camera_control(&roi, contour.as_ref()), &self.control)?;
        Ok(written)
    }
}

/// Measures every object on each scanned page in `paths.input_dir`.
///
/// Each page gets a fresh ledger `<out_dir>/<stem>.txt` and a control image
/// `<out_dir>/<stem>_output.jpg`.
pub fn scanner_batch(paths: &PathsConfig, cfg: &ScannerConfig) -> Result<BatchSummary> {
    cfg.validate()?;
    ensure_dir(&paths.out_dir)?;
    let detector = RegionDetector::new(cfg.detector.clone());
    let recognizer = ShapeRecognizer::new(cfg.recognizer.clone())?;
    let mut summary = BatchSummary::default();

    for path in list_images(&paths.input_dir, false)? {
        summary.images += 1;
        match scan_page(&path, &paths.out_dir, cfg, &detector, &recognizer) {
            Ok((measured, unmeasured)) => {
                info!(file = %path.display(), measured, unmeasured, "page done");
                summary.measured += measured;
                summary.unmeasured += unmeasured;
            }
            Err(err) => {
                warn!(file = %path.display(), %err, "scanner page failed");
                summary.failed += 1;
            }
        }
    }

    info!(?summary, "scanner batch done");
    Ok(summary)
}

fn scan_page(
    path: &Path,
    out_dir: &Path,
    cfg: &ScannerConfig,
    detector: &RegionDetector,
    recognizer: &ShapeRecognizer,
) -> Result<(usize, usize)> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mut ledger = ScannerLedger::create(out_dir.join(format!("{stem}.txt")))?;

    let page = load_gray(path)?;
    let rois = detector.detect(&page.as_view())?;
    debug!(file = %path.display(), rois = rois.len(), "objects detected");

    let mut contours = Vec::with_capacity(rois.len());
    let (mut measured, mut unmeasured) = (0, 0);
    for roi in &rois {
        let contour = recognizer.recognize(roi)?;
        match contour.as_ref().map(|c| measure(roi, c, &cfg.measure)) {
            Some(Ok(m)) => {
                ledger.append(&m.with_label(stem.as_str()))?;
                measured += 1;
            }
            Some(Err(err)) => {
                warn!(file = %path.display(), index = roi.index, %err, "measurement skipped");
                unmeasured += 1;
            }
            None => {
                warn!(file = %path.display(), index = roi.index, "no silhouette inside the ROI");
                unmeasured += 1;
            }
        }
        contours.push(contour);
    }

    let annotations: Vec<Annotation<'_>> = rois
        .iter()
        .zip(&contours)
        .map(|(roi, contour)| Annotation {
            roi,
            contour: contour.as_ref(),
        })
        .collect();
    let control_path = out_dir.join(format!("{stem}_output.jpg"));
    control::save(&control::scanner_control(&page, &annotations), &control_path)?;

    Ok((measured, unmeasured))
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::{CaptureDate, FixedCaptureDate, NoCaptureDate, compact_date, gray_name};

    #[test]
    fn exif_style_dates_are_compacted() {
        assert_eq!(compact_date("2023:05:09 14:02:11").as_deref(), Some("20230509"));
        assert_eq!(compact_date("2023-05-09").as_deref(), Some("20230509"));
        assert_eq!(compact_date("20230509").as_deref(), Some("20230509"));
        assert_eq!(compact_date("May 9th"), None);
        assert_eq!(compact_date(""), None);
    }

    #[test]
    fn gray_names_with_and_without_date() {
        let src = Path::new("in/A1.JPG");
        assert_eq!(gray_name(src, Some("20230509")), "A1_20230509_gray.jpg");
        assert_eq!(gray_name(src, None), "A1_gray.jpg");
    }

    #[test]
    fn date_sources() {
        let p = Path::new("x.jpg");
        assert_eq!(NoCaptureDate.capture_date(p), None);
        assert_eq!(
            FixedCaptureDate("2024:01:02 00:00:00".into()).capture_date(p),
            Some("2024:01:02 00:00:00".to_string())
        );
    }
}
