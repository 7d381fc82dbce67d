//! Pipeline configuration.
//!
//! [`ThumbnailerConfig`] is a builder that carries the target size, the
//! on-disk layout, the video decode budget, the corruption thresholds, and
//! the progress/cancellation hooks into a [`Thumbnailer`](crate::Thumbnailer)
//! without growing every function signature.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use thumbnailer::{CancellationToken, ThumbnailSize, ThumbnailerConfig};
//!
//! let token = CancellationToken::new();
//! let config = ThumbnailerConfig::new("/srv/archive/thumbnails", "/srv/archive/archives")
//!     .with_size(ThumbnailSize::new(256, 256))
//!     .with_video_timeout(Duration::from_secs(5))
//!     .with_cancellation(token.clone());
//! ```

use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ThumbnailError;
use crate::progress::{CancellationToken, NoOpProgress, ProgressCallback};
use crate::validation::CorruptionThresholds;

/// Default thumbnail box edge in pixels.
pub const DEFAULT_THUMBNAIL_EDGE: u32 = 128;

/// Default hard limit on a single video decode attempt.
pub const DEFAULT_VIDEO_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest edge a JPEG can carry; the format stores dimensions in 16 bits.
pub const MAX_THUMBNAIL_EDGE: u32 = 65_535;

/// Default JPEG quality for written thumbnails.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

/// Bounding box a thumbnail must fit into.
///
/// Parsed from and displayed as `WIDTHxHEIGHT`, e.g. `128x128`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThumbnailSize {
    /// Maximum output width in pixels.
    pub width: u32,
    /// Maximum output height in pixels.
    pub height: u32,
}

impl ThumbnailSize {
    /// Create a new bounding box.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for ThumbnailSize {
    fn default() -> Self {
        Self::new(DEFAULT_THUMBNAIL_EDGE, DEFAULT_THUMBNAIL_EDGE)
    }
}

impl Display for ThumbnailSize {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for ThumbnailSize {
    type Err = ThumbnailError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid =
            || ThumbnailError::InvalidConfiguration(format!("invalid thumbnail size: {value}"));
        let (width, height) = value
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(invalid)?;
        let width = width.trim().parse::<u32>().map_err(|_| invalid())?;
        let height = height.trim().parse::<u32>().map_err(|_| invalid())?;
        Ok(Self::new(width, height))
    }
}

/// Configuration for a thumbnail run.
///
/// All settings except the two directories have defaults: a 128x128 box,
/// a 10 second video budget, the default [`CorruptionThresholds`], JPEG
/// quality 75, no progress callback and no cancellation.
#[derive(Clone)]
pub struct ThumbnailerConfig {
    pub(crate) size: ThumbnailSize,
    /// Directory thumbnails are written into.
    pub(crate) thumbnail_directory: PathBuf,
    /// Prefix recorded in the catalog in front of the artifact filename.
    pub(crate) thumbnail_prefix: String,
    /// Directory archived media lives under.
    pub(crate) archives_root: PathBuf,
    /// Alias that stored media paths use for `archives_root`.
    pub(crate) archive_alias: String,
    pub(crate) video_timeout: Duration,
    pub(crate) thresholds: CorruptionThresholds,
    pub(crate) jpeg_quality: u8,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) cancellation: Option<CancellationToken>,
}

impl Debug for ThumbnailerConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ThumbnailerConfig")
            .field("size", &self.size)
            .field("thumbnail_directory", &self.thumbnail_directory)
            .field("thumbnail_prefix", &self.thumbnail_prefix)
            .field("archives_root", &self.archives_root)
            .field("archive_alias", &self.archive_alias)
            .field("video_timeout", &self.video_timeout)
            .field("thresholds", &self.thresholds)
            .field("jpeg_quality", &self.jpeg_quality)
            .field("has_cancellation", &self.cancellation.is_some())
            .finish()
    }
}

impl ThumbnailerConfig {
    /// Create a configuration writing into `thumbnail_directory` and
    /// reading media from under `archives_root`.
    pub fn new<T: Into<PathBuf>, A: Into<PathBuf>>(
        thumbnail_directory: T,
        archives_root: A,
    ) -> Self {
        Self {
            size: ThumbnailSize::default(),
            thumbnail_directory: thumbnail_directory.into(),
            thumbnail_prefix: "local_thumbnails".to_string(),
            archives_root: archives_root.into(),
            archive_alias: "local_archives".to_string(),
            video_timeout: DEFAULT_VIDEO_TIMEOUT,
            thresholds: CorruptionThresholds::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            progress: Arc::new(NoOpProgress),
            cancellation: None,
        }
    }

    /// Set the bounding box thumbnails are fitted into.
    #[must_use]
    pub fn with_size(mut self, size: ThumbnailSize) -> Self {
        self.size = size;
        self
    }

    /// Set the prefix stored in the catalog in front of artifact filenames.
    #[must_use]
    pub fn with_thumbnail_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.thumbnail_prefix = prefix.into();
        self
    }

    /// Set the alias that stored media paths use for the archives root.
    #[must_use]
    pub fn with_archive_alias<S: Into<String>>(mut self, alias: S) -> Self {
        self.archive_alias = alias.into();
        self
    }

    /// Set the hard time limit for a single video decode.
    #[must_use]
    pub fn with_video_timeout(mut self, timeout: Duration) -> Self {
        self.video_timeout = timeout;
        self
    }

    /// Replace the corruption heuristic limits.
    #[must_use]
    pub fn with_thresholds(mut self, thresholds: CorruptionThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    /// Set the JPEG quality (1-100).
    #[must_use]
    pub fn with_jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality;
        self
    }

    /// Attach a progress callback, invoked after every processed item.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Attach a cancellation token.
    ///
    /// The run checks the token before claiming each record and stops
    /// cleanly once it is cancelled. An item already in flight completes.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// The configured bounding box.
    pub fn size(&self) -> ThumbnailSize {
        self.size
    }

    /// The directory thumbnails are written into.
    pub fn thumbnail_directory(&self) -> &Path {
        &self.thumbnail_directory
    }

    /// Check the settings that would make every item fail.
    pub fn validate(&self) -> Result<(), ThumbnailError> {
        if self.size.width == 0 || self.size.height == 0 {
            return Err(ThumbnailError::InvalidConfiguration(format!(
                "thumbnail size must be non-zero, got {}",
                self.size
            )));
        }
        if self.size.width > MAX_THUMBNAIL_EDGE || self.size.height > MAX_THUMBNAIL_EDGE {
            return Err(ThumbnailError::InvalidConfiguration(format!(
                "thumbnail size must not exceed {MAX_THUMBNAIL_EDGE} per edge, got {}",
                self.size
            )));
        }
        if self.video_timeout.is_zero() {
            return Err(ThumbnailError::InvalidConfiguration(
                "video timeout must be greater than zero".to_string(),
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ThumbnailError::InvalidConfiguration(format!(
                "JPEG quality must be within 1-100, got {}",
                self.jpeg_quality
            )));
        }
        Ok(())
    }

    /// Returns `true` if cancellation has been requested.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Map a stored media path onto the local filesystem.
    ///
    /// Paths containing `<alias>/` are re-rooted under the archives root,
    /// absolute paths are kept, and other relative paths are joined onto
    /// the archives root.
    pub fn resolve_media_path(&self, local_path: &str) -> PathBuf {
        let marker = format!("{}/", self.archive_alias);
        if let Some((_, relative)) = local_path.split_once(marker.as_str()) {
            return self.archives_root.join(relative);
        }
        let path = Path::new(local_path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.archives_root.join(path)
        }
    }
}
