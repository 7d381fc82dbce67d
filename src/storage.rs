//! Thumbnail artifact storage.
//!
//! [`ThumbnailStore`] fits a decoded frame into the target box, encodes it
//! as JPEG and places it in the thumbnail directory under its
//! content-addressed name. Artifacts are write-once: an existing file with
//! the same name is left untouched.

use std::fs;
use std::path::{Path, PathBuf};

use image::{DynamicImage, codecs::jpeg::JpegEncoder, imageops::FilterType};

use crate::config::{ThumbnailSize, ThumbnailerConfig};
use crate::error::ThumbnailError;

/// Compute the largest size that fits within `bounds` preserving aspect
/// ratio.
///
/// Images already inside the box keep their size; nothing is upscaled. A
/// degenerate source (zero width or height) yields the box itself.
///
/// # Example
///
/// ```
/// use thumbnailer::{ThumbnailSize, storage::fit_within};
///
/// assert_eq!(fit_within(4000, 2000, ThumbnailSize::new(128, 128)), (128, 64));
/// assert_eq!(fit_within(100, 50, ThumbnailSize::new(128, 128)), (100, 50));
/// ```
pub fn fit_within(width: u32, height: u32, bounds: ThumbnailSize) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (bounds.width, bounds.height);
    }
    if width <= bounds.width && height <= bounds.height {
        return (width, height);
    }
    let scale = (bounds.width as f64 / width as f64).min(bounds.height as f64 / height as f64);
    let new_width = ((width as f64) * scale).round() as u32;
    let new_height = ((height as f64) * scale).round() as u32;
    (
        new_width.clamp(1, bounds.width),
        new_height.clamp(1, bounds.height),
    )
}

/// Writes thumbnail artifacts into a fixed directory.
#[derive(Debug, Clone)]
pub struct ThumbnailStore {
    directory: PathBuf,
    prefix: String,
    size: ThumbnailSize,
    quality: u8,
}

impl ThumbnailStore {
    /// Create a store from the pipeline configuration.
    pub fn new(config: &ThumbnailerConfig) -> Self {
        Self {
            directory: config.thumbnail_directory.clone(),
            prefix: config.thumbnail_prefix.clone(),
            size: config.size,
            quality: config.jpeg_quality,
        }
    }

    /// Directory artifacts are written into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// The path recorded in the catalog for `filename`.
    pub fn relative_path(&self, filename: &str) -> String {
        format!("{}/{filename}", self.prefix)
    }

    /// Resize, encode and write `image` as `filename`.
    ///
    /// Returns the relative path to record in the catalog. If the artifact
    /// already exists it is reused as-is.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Persistence`] if the directory cannot be
    /// created or the file cannot be encoded or written.
    pub fn write(&self, filename: &str, image: &DynamicImage) -> Result<String, ThumbnailError> {
        let target = self.directory.join(filename);
        if target.exists() {
            log::debug!("Thumbnail {} already exists, reusing it", target.display());
            return Ok(self.relative_path(filename));
        }

        fs::create_dir_all(&self.directory).map_err(|error| {
            ThumbnailError::Persistence(format!(
                "failed to create thumbnail directory {}: {error}",
                self.directory.display()
            ))
        })?;

        let bytes = self.encode(image)?;

        // Write to a sibling file first so a crash never leaves a partial
        // artifact under the final name.
        let partial = self.directory.join(format!("{filename}.part"));
        fs::write(&partial, &bytes)
            .and_then(|()| fs::rename(&partial, &target))
            .map_err(|error| {
                let _ = fs::remove_file(&partial);
                ThumbnailError::Persistence(format!(
                    "failed to write thumbnail {}: {error}",
                    target.display()
                ))
            })?;

        log::debug!(
            "Wrote thumbnail {} ({} bytes)",
            target.display(),
            bytes.len()
        );
        Ok(self.relative_path(filename))
    }

    /// Fit `image` into the box and encode it as JPEG.
    pub fn encode(&self, image: &DynamicImage) -> Result<Vec<u8>, ThumbnailError> {
        let (width, height) = fit_within(image.width(), image.height(), self.size);
        let resized = if (width, height) == (image.width(), image.height()) {
            image.to_rgb8()
        } else {
            image
                .resize_exact(width, height, FilterType::Triangle)
                .to_rgb8()
        };

        let mut bytes = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut bytes, self.quality);
        DynamicImage::ImageRgb8(resized)
            .write_with_encoder(encoder)
            .map_err(|error| {
                ThumbnailError::Persistence(format!("failed to encode JPEG: {error}"))
            })?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_keeps_aspect_ratio() {
        let bounds = ThumbnailSize::new(128, 128);
        assert_eq!(fit_within(1920, 1080, bounds), (128, 72));
        assert_eq!(fit_within(1080, 1920, bounds), (72, 128));
        assert_eq!(fit_within(5000, 5000, bounds), (128, 128));
    }

    #[test]
    fn fit_never_collapses_to_zero() {
        let bounds = ThumbnailSize::new(128, 128);
        assert_eq!(fit_within(10_000, 1, bounds), (128, 1));
        assert_eq!(fit_within(0, 50, bounds), (128, 128));
    }

    #[test]
    fn fit_respects_non_square_boxes() {
        let bounds = ThumbnailSize::new(200, 100);
        assert_eq!(fit_within(400, 400, bounds), (100, 100));
        assert_eq!(fit_within(1000, 100, bounds), (200, 20));
    }
}
