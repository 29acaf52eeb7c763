//! Image file helpers shared by the batch runners.

use std::fs;
use std::path::{Path, PathBuf};

use image::GrayImage;
use mm_core::Image;

use crate::error::{Error, Result};

/// Extensions picked up from input directories (case-insensitive).
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Decodes any supported image file to 8-bit luma.
pub fn load_gray(path: &Path) -> Result<Image<u8>> {
    let luma = image::open(path)
        .map_err(|e| Error::image(path, e))?
        .to_luma8();
    let (w, h) = luma.dimensions();
    Ok(Image::from_vec(w as usize, h as usize, luma.into_raw())?)
}

/// Encodes `img` with the format picked from the extension.
pub fn save_gray(img: &Image<u8>, path: &Path) -> Result<()> {
    let out = GrayImage::from_fn(img.width() as u32, img.height() as u32, |x, y| {
        image::Luma([img.row(y as usize)[x as usize]])
    });
    out.save(path).map_err(|e| Error::image(path, e))
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::io(path, e))
}

pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

/// Image files in `dir`, sorted by path. Sub-directories are descended into
/// only when `recursive` is set.
pub fn list_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    collect(dir, recursive, &mut out)?;
    out.sort();
    Ok(out)
}

fn collect(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|e| Error::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| Error::io(dir, e))?.path();
        if path.is_dir() {
            if recursive {
                collect(&path, recursive, out)?;
            }
        } else if has_image_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}
