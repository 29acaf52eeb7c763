//! Tab-separated result files.
//!
//! The camera ledger is a single file keyed by source label and updated in
//! place; the scanner writes one fresh file per source image.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::{Error, Result};
use crate::measure::Measurement;

pub const CAMERA_HEADER: &str = "Source_file\tLength\tArea\tMean\tStdDev\tScale";
pub const SCANNER_HEADER: &str = "PyLabel\tX\tY\tLength\tArea\tMean\tStdDev\tMin\tMax";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Replaced,
}

/// Camera row: mean truncated to an integer, scale printed as given.
pub fn camera_row(m: &Measurement) -> String {
    format!(
        "{}\t{:.2}\t{:.2}\t{}\t{:.2}\t{}",
        m.label,
        m.length,
        m.area,
        m.mean.trunc() as i64,
        m.stddev,
        m.scale
    )
}

pub fn scanner_row(m: &Measurement) -> String {
    format!(
        "{}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{:.2}\t{}\t{}",
        m.index, m.centroid.x, m.centroid.y, m.length, m.area, m.mean, m.stddev, m.min, m.max
    )
}

/// Single-file ledger with at most one row per label.
#[derive(Debug, Clone)]
pub struct CameraLedger {
    path: PathBuf,
}

impl CameraLedger {
    /// Opens `path`, writing the header if the file is missing or empty.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let empty = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == ErrorKind::NotFound => true,
            Err(e) => return Err(Error::io(&path, e)),
        };
        if empty {
            fs::write(&path, format!("{CAMERA_HEADER}\n")).map_err(|e| Error::io(&path, e))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// Data rows, header excluded.
    pub fn rows(&self) -> Result<Vec<String>> {
        let text = self.read()?;
        Ok(text.lines().skip(1).map(str::to_string).collect())
    }

    /// Inserts the row for `m.label`, or replaces it in place when a row
    /// with the same first column exists. Replacing backs up the old file
    /// and collapses any duplicate rows for that label.
    pub fn upsert(&self, m: &Measurement) -> Result<Upsert> {
        let text = self.read()?;
        let row = camera_row(m);
        let matches = |line: &str| line.split('\t').next() == Some(m.label.as_str());

        if !text.lines().skip(1).any(matches) {
            let mut file = OpenOptions::new()
                .append(true)
                .open(&self.path)
                .map_err(|e| Error::io(&self.path, e))?;
            // The file may have been emptied after `open`.
            let lead = if text.is_empty() {
                format!("{CAMERA_HEADER}\n")
            } else if text.ends_with('\n') {
                String::new()
            } else {
                "\n".to_string()
            };
            writeln!(file, "{lead}{row}").map_err(|e| Error::io(&self.path, e))?;
            return Ok(Upsert::Inserted);
        }

        let backup = self.backup_path();
        fs::copy(&self.path, &backup).map_err(|e| Error::io(&backup, e))?;

        let mut out = String::with_capacity(text.len() + row.len());
        let mut replaced = false;
        for (i, line) in text.lines().enumerate() {
            if i > 0 && matches(line) {
                if replaced {
                    continue;
                }
                replaced = true;
                out.push_str(&row);
            } else {
                out.push_str(line);
            }
            out.push('\n');
        }
        self.replace_contents(&out)?;
        Ok(Upsert::Replaced)
    }

    fn read(&self) -> Result<String> {
        let text = fs::read_to_string(&self.path).map_err(|e| Error::io(&self.path, e))?;
        match text.lines().next() {
            Some(CAMERA_HEADER) | None => Ok(text),
            Some(other) => Err(Error::Ledger {
                path: self.path.clone(),
                reason: format!("unexpected header {other:?}"),
            }),
        }
    }

    fn replace_contents(&self, contents: &str) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| Error::io(dir, e))?;
        tmp.write_all(contents.as_bytes())
            .map_err(|e| Error::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::io(&self.path, e.error))?;
        Ok(())
    }
}

/// Per-image ledger, truncated on creation; each row is flushed as soon as
/// it is appended.
#[derive(Debug)]
pub struct ScannerLedger {
    path: PathBuf,
    out: BufWriter<File>,
}

impl ScannerLedger {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let file = File::create(&path).map_err(|e| Error::io(&path, e))?;
        let mut ledger = Self {
            out: BufWriter::new(file),
            path,
        };
        ledger.write_line(SCANNER_HEADER)?;
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, m: &Measurement) -> Result<()> {
        self.write_line(&scanner_row(m))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.out, "{line}")
            .and_then(|_| self.out.flush())
            .map_err(|e| Error::io(&self.path, e))
    }
}
