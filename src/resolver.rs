//! Representative frame resolution.
//!
//! [`FrameResolver`] turns a media item into a single raster image. Images
//! are decoded directly. Videos are checked against the corruption
//! heuristics and then decoded on a dedicated worker thread under a hard
//! time limit, trying a short list of fallback frames when the first one
//! cannot be read.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageReader};

use crate::config::ThumbnailerConfig;
use crate::error::ThumbnailError;
use crate::metadata::MediaType;
use crate::progress::CancellationToken;
use crate::validation::{self, CorruptionThresholds};
use crate::video::{FfmpegBackend, VideoBackend, VideoSource};

/// Frames tried in order until one decodes.
pub const FALLBACK_FRAMES: [u64; 4] = [0, 1, 10, 30];

/// Produces one representative frame per media item.
#[derive(Clone)]
pub struct FrameResolver {
    backend: Arc<dyn VideoBackend>,
    video_timeout: Duration,
    thresholds: CorruptionThresholds,
}

impl std::fmt::Debug for FrameResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameResolver")
            .field("video_timeout", &self.video_timeout)
            .field("thresholds", &self.thresholds)
            .finish_non_exhaustive()
    }
}

impl FrameResolver {
    /// Create a resolver that decodes videos with FFmpeg.
    pub fn new(config: &ThumbnailerConfig) -> Self {
        Self::with_backend(config, Arc::new(FfmpegBackend))
    }

    /// Create a resolver with a custom video backend.
    pub fn with_backend(config: &ThumbnailerConfig, backend: Arc<dyn VideoBackend>) -> Self {
        Self {
            backend,
            video_timeout: config.video_timeout,
            thresholds: config.thresholds.clone(),
        }
    }

    /// Resolve the representative frame for a media item.
    ///
    /// # Errors
    ///
    /// - [`ThumbnailError::UnsupportedType`] for anything but images and
    ///   videos.
    /// - [`ThumbnailError::Corruption`] when a video fails the heuristics.
    /// - [`ThumbnailError::Decode`] when decoding fails, every fallback frame
    ///   fails, or the video decode exceeds its time limit.
    pub fn resolve(
        &self,
        path: &Path,
        media_type: &MediaType,
    ) -> Result<DynamicImage, ThumbnailError> {
        match media_type {
            MediaType::Image => decode_image(path),
            MediaType::Video => self.resolve_video(path),
            MediaType::Other(other) => Err(ThumbnailError::UnsupportedType(other.clone())),
        }
    }

    /// Decode a video frame on a worker thread, giving up after the
    /// configured timeout.
    ///
    /// On timeout the worker's cancellation token is tripped and the thread
    /// is detached. The decoder stops at its next checkpoint, but a call
    /// stuck inside FFmpeg keeps its thread until that call returns.
    fn resolve_video(&self, path: &Path) -> Result<DynamicImage, ThumbnailError> {
        let (sender, receiver) = mpsc::channel();
        let cancellation = CancellationToken::new();

        let worker_path: PathBuf = path.to_path_buf();
        let worker_token = cancellation.clone();
        let backend = Arc::clone(&self.backend);
        let thresholds = self.thresholds.clone();

        thread::Builder::new()
            .name("video-decode".to_string())
            .spawn(move || {
                let result =
                    read_video_frame(backend.as_ref(), &worker_path, &thresholds, worker_token);
                let _ = sender.send(result);
            })
            .map_err(|error| {
                ThumbnailError::Decode(format!("could not start decode worker: {error}"))
            })?;

        match receiver.recv_timeout(self.video_timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                cancellation.cancel();
                log::warn!(
                    "Video decode timed out after {:?}: {}",
                    self.video_timeout,
                    path.display()
                );
                Err(ThumbnailError::Decode(format!(
                    "timeout after {:?}",
                    self.video_timeout
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ThumbnailError::Decode(
                "decode worker exited without a result".to_string(),
            )),
        }
    }
}

fn decode_image(path: &Path) -> Result<DynamicImage, ThumbnailError> {
    ImageReader::open(path)
        .map_err(|error| {
            ThumbnailError::Decode(format!("could not open image {}: {error}", path.display()))
        })?
        .with_guessed_format()
        .map_err(|error| {
            ThumbnailError::Decode(format!("could not read image {}: {error}", path.display()))
        })?
        .decode()
        .map_err(|error| ThumbnailError::Decode(format!("could not decode image: {error}")))
}

/// Body of the decode worker: heuristics first, then the fallback frames.
fn read_video_frame(
    backend: &dyn VideoBackend,
    path: &Path,
    thresholds: &CorruptionThresholds,
    cancellation: CancellationToken,
) -> Result<DynamicImage, ThumbnailError> {
    let byte_size = fs::metadata(path)
        .map_err(|error| {
            ThumbnailError::Decode(format!(
                "video file does not exist or is not readable: {}: {error}",
                path.display()
            ))
        })?
        .len();
    validation::check_file_size(byte_size, thresholds)?;

    let mut source = backend.open(path, cancellation)?;
    let diagnostics = source.diagnostics().clone();
    validation::validate(&diagnostics, thresholds)?;

    let mut last_error = None;
    for frame_number in FALLBACK_FRAMES {
        if frame_number > 0
            && diagnostics.frame_count > 0
            && frame_number >= diagnostics.frame_count
        {
            continue;
        }
        match source.read_frame(frame_number) {
            Ok(image) => {
                log::debug!(
                    "Read frame {frame_number} ({}x{})",
                    image.width(),
                    image.height()
                );
                return Ok(image);
            }
            Err(error) => {
                log::debug!("Frame {frame_number} failed: {error}");
                last_error = Some(error);
            }
        }
    }

    let cause = last_error
        .map(|error| format!("; last error: {error}"))
        .unwrap_or_default();
    Err(ThumbnailError::Decode(format!(
        "could not read any video frame ({diagnostics}){cause}. \
         Codec may not be supported by the decoder"
    )))
}
