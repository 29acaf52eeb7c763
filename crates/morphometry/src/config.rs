//! Serde configuration for the normalization, camera and scanner pipelines.
//!
//! Every struct defaults to the field-calibrated constants, so a partial JSON
//! file only needs the values it changes.

use std::fs;
use std::path::{Path, PathBuf};

use mm_morph::StructuringElement;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MorphometryConfig {
    pub paths: PathsConfig,
    pub normalize: NormalizeConfig,
    pub camera: CameraConfig,
    pub scanner: ScannerConfig,
}

impl MorphometryConfig {
    /// Loads and validates a JSON config. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let cfg: Self = serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.normalize.validate()?;
        self.camera.validate()?;
        self.scanner.validate()
    }
}

/// Directory layout. Relative paths resolve against the process working
/// directory of the caller, never against a directory changed at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw camera images (normalization input) or scanner images.
    pub input_dir: PathBuf,
    /// Normalized camera images; `redo/` below it holds manual crops.
    pub gray_dir: PathBuf,
    /// Control images and ledgers.
    pub out_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("in"),
            gray_dir: PathBuf::from("gray"),
            out_dir: PathBuf::from("out"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    /// Background grey level every image is shifted to.
    pub target: u8,
    /// Pixels at or above this level are treated as glare and dropped.
    pub cutoff: u8,
    /// Side of the square erosion kernel used to strip dark objects.
    pub erode_kernel: usize,
    pub erode_iterations: usize,
    /// Number of most frequent surviving values whose median is the
    /// background estimate.
    pub top_values: usize,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target: 240,
            cutoff: 245,
            erode_kernel: 7,
            erode_iterations: 5,
            top_values: 9,
        }
    }
}

impl NormalizeConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.erode_kernel == 0 {
            return Err(ConfigError::invalid("normalize.erode_kernel", "must be > 0"));
        }
        if self.top_values == 0 {
            return Err(ConfigError::invalid("normalize.top_values", "must be > 0"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelShape {
    Rect,
    Cross,
}

impl From<KernelShape> for mm_morph::KernelShape {
    fn from(shape: KernelShape) -> Self {
        match shape {
            KernelShape::Rect => Self::Rect,
            KernelShape::Cross => Self::Cross,
        }
    }
}

/// One morphological step: a square `size x size` element of `shape`,
/// applied `iterations` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphOp {
    pub shape: KernelShape,
    pub size: usize,
    pub iterations: usize,
}

impl MorphOp {
    pub const fn rect(size: usize, iterations: usize) -> Self {
        Self {
            shape: KernelShape::Rect,
            size,
            iterations,
        }
    }

    pub const fn cross(size: usize, iterations: usize) -> Self {
        Self {
            shape: KernelShape::Cross,
            size,
            iterations,
        }
    }

    pub fn element(&self) -> StructuringElement {
        StructuringElement::new(self.shape.into(), self.size, self.size)
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if self.size == 0 {
            return Err(ConfigError::invalid(format!("{field}.size"), "must be > 0"));
        }
        Ok(())
    }
}

/// Foreground extraction for dark objects on a bright background.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Gaussian-weighted local mean over `block_size`, offset by `constant`.
    Adaptive { block_size: usize, constant: f64 },
    /// Global Otsu level.
    Otsu,
}

impl ThresholdMethod {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if let Self::Adaptive {
            block_size,
            constant,
        } = *self
        {
            if block_size < 3 || block_size.is_multiple_of(2) {
                return Err(ConfigError::invalid(
                    format!("{field}.block_size"),
                    format!("must be odd and >= 3, got {block_size}"),
                ));
            }
            if !constant.is_finite() {
                return Err(ConfigError::invalid(
                    format!("{field}.constant"),
                    "must be finite",
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContourRetrieval {
    External,
    List,
}

impl From<ContourRetrieval> for mm_contour::Retrieval {
    fn from(r: ContourRetrieval) -> Self {
        match r {
            ContourRetrieval::External => Self::External,
            ContourRetrieval::List => Self::List,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub threshold: ThresholdMethod,
    pub close: MorphOp,
    pub open: MorphOp,
    pub strategy: DetectStrategy,
}

impl DetectorConfig {
    pub fn camera() -> Self {
        Self {
            threshold: ThresholdMethod::Adaptive {
                block_size: 799,
                constant: 3.0,
            },
            close: MorphOp::rect(5, 3),
            open: MorphOp::rect(7, 5),
            strategy: DetectStrategy::Adaptive(EnvelopeConfig::default()),
        }
    }

    pub fn scanner() -> Self {
        Self {
            threshold: ThresholdMethod::Otsu,
            close: MorphOp::rect(5, 3),
            open: MorphOp::cross(7, 5),
            strategy: DetectStrategy::Global(SizeFilter::default()),
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        self.threshold.validate(&format!("{field}.threshold"))?;
        self.close.validate(&format!("{field}.close"))?;
        self.open.validate(&format!("{field}.open"))?;
        match &self.strategy {
            DetectStrategy::Adaptive(env) => {
                env.dilate.validate(&format!("{field}.strategy.dilate"))?;
                env.erode.validate(&format!("{field}.strategy.erode"))?;
                if env.roi_half_extent == 0 {
                    return Err(ConfigError::invalid(
                        format!("{field}.strategy.roi_half_extent"),
                        "must be > 0",
                    ));
                }
            }
            DetectStrategy::Global(filter) => {
                if !filter.min_length.is_finite() || filter.min_length < 0.0 {
                    return Err(ConfigError::invalid(
                        format!("{field}.strategy.min_length"),
                        "must be finite and >= 0",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// How detected regions become ROIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetectStrategy {
    /// One object per image, located inside a coarse glare-free envelope.
    Adaptive(EnvelopeConfig),
    /// Many objects per image, filtered by size.
    Global(SizeFilter),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvelopeConfig {
    /// Levels at or above this are background when building the envelope.
    pub cutoff: u8,
    pub dilate: MorphOp,
    pub erode: MorphOp,
    /// Half side of the square ROI cut around the detected object.
    pub roi_half_extent: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            cutoff: 245,
            dilate: MorphOp::rect(9, 3),
            erode: MorphOp::rect(51, 10),
            roi_half_extent: 400,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SizeFilter {
    /// Contours with this many points or fewer are ignored.
    pub min_contour_points: usize,
    /// Provisional length (px) an object must exceed.
    pub min_length: f64,
    /// Margin (px) added around the contour bounding box.
    pub margin: usize,
}

impl Default for SizeFilter {
    fn default() -> Self {
        Self {
            min_contour_points: 50,
            min_length: 100.0,
            margin: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizerConfig {
    pub threshold: ThresholdMethod,
    pub retrieval: ContourRetrieval,
    pub schedule: CleanupSchedule,
}

impl RecognizerConfig {
    pub fn camera() -> Self {
        Self {
            threshold: ThresholdMethod::Adaptive {
                block_size: 499,
                constant: 3.0,
            },
            retrieval: ContourRetrieval::External,
            schedule: CleanupSchedule::Fixed {
                close: MorphOp::rect(3, 3),
                open: MorphOp::cross(9, 6),
            },
        }
    }

    pub fn scanner() -> Self {
        Self {
            threshold: ThresholdMethod::Otsu,
            retrieval: ContourRetrieval::List,
            schedule: CleanupSchedule::SizeAdaptive(ScheduleFactors::default()),
        }
    }

    pub(crate) fn validate(&self, field: &str) -> Result<(), ConfigError> {
        self.threshold.validate(&format!("{field}.threshold"))?;
        match &self.schedule {
            CleanupSchedule::Fixed { close, open } => {
                close.validate(&format!("{field}.schedule.close"))?;
                open.validate(&format!("{field}.schedule.open"))
            }
            CleanupSchedule::SizeAdaptive(f) => f.validate(&format!("{field}.schedule")),
        }
    }
}

/// Closing / opening applied inside an ROI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CleanupSchedule {
    Fixed { close: MorphOp, open: MorphOp },
    /// Kernel sizes and iteration counts derived from the provisional object
    /// length; see [`crate::size_adaptive_schedule`].
    SizeAdaptive(ScheduleFactors),
}

/// Multipliers on the size-adaptive schedule (1 leaves it unchanged).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleFactors {
    pub close_kernel: f64,
    pub close_iterations: f64,
    pub open_kernel: f64,
    pub open_iterations: f64,
}

impl Default for ScheduleFactors {
    fn default() -> Self {
        Self {
            close_kernel: 1.0,
            close_iterations: 1.0,
            open_kernel: 1.0,
            open_iterations: 1.0,
        }
    }
}

impl ScheduleFactors {
    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        let all = [
            ("close_kernel", self.close_kernel),
            ("close_iterations", self.close_iterations),
            ("open_kernel", self.open_kernel),
            ("open_iterations", self.open_iterations),
        ];
        for (name, v) in all {
            if !v.is_finite() || v <= 0.0 {
                return Err(ConfigError::invalid(
                    format!("{field}.{name}"),
                    format!("must be finite and > 0, got {v}"),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasureConfig {
    /// Pixels per millimetre.
    pub scale: f64,
    /// Side of the square kernel eroding the filled contour before
    /// statistics are taken.
    pub erode_kernel: usize,
    pub erode_iterations: usize,
}

impl MeasureConfig {
    pub fn with_scale(scale: f64) -> Self {
        Self {
            scale,
            erode_kernel: 5,
            erode_iterations: 1,
        }
    }

    fn validate(&self, field: &str) -> Result<(), ConfigError> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::invalid(
                format!("{field}.scale"),
                format!("must be finite and > 0, got {}", self.scale),
            ));
        }
        if self.erode_kernel == 0 {
            return Err(ConfigError::invalid(
                format!("{field}.erode_kernel"),
                "must be > 0",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub detector: DetectorConfig,
    pub recognizer: RecognizerConfig,
    pub measure: MeasureConfig,
    /// Ledger file name inside `out_dir`.
    pub ledger_name: String,
    /// Sub-directory of `gray_dir` holding manual crops.
    pub redo_subdir: String,
    /// Sub-directories of `out_dir` whose files count as already processed.
    pub curated_subdirs: Vec<String>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::camera(),
            recognizer: RecognizerConfig::camera(),
            measure: MeasureConfig::with_scale(70.0),
            ledger_name: "camera.txt".to_string(),
            redo_subdir: "redo".to_string(),
            curated_subdirs: vec!["good".to_string(), "redone".to_string()],
        }
    }
}

impl CameraConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.detector.strategy, DetectStrategy::Adaptive(_)) {
            return Err(ConfigError::invalid(
                "camera.detector.strategy",
                "camera mode expects the adaptive strategy",
            ));
        }
        self.detector.validate("camera.detector")?;
        self.recognizer.validate("camera.recognizer")?;
        self.measure.validate("camera.measure")?;
        if self.ledger_name.is_empty() {
            return Err(ConfigError::invalid("camera.ledger_name", "must not be empty"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    pub detector: DetectorConfig,
    pub recognizer: RecognizerConfig,
    pub measure: MeasureConfig,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::scanner(),
            recognizer: RecognizerConfig::scanner(),
            measure: MeasureConfig::with_scale(94.6876),
        }
    }
}

impl ScannerConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        self.detector.validate("scanner.detector")?;
        self.recognizer.validate("scanner.recognizer")?;
        self.measure.validate("scanner.measure")
    }
}
