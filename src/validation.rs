//! Corruption heuristics for video files.
//!
//! [`validate`] inspects [`VideoDiagnostics`] before any frame is decoded and
//! fails fast on files whose container metadata does not add up: files too
//! small to hold any stream, files shorter than their own frame count
//! implies, and absurd frame rates.
//!
//! These are heuristics. Passing them does not guarantee that a frame can be
//! decoded (the resolver's frame fallback covers that), and an unusual but
//! valid encode can trip a threshold, which is why the limits live in
//! [`CorruptionThresholds`] rather than in constants.
//!
//! # Example
//!
//! ```
//! use thumbnailer::{CorruptionThresholds, VideoDiagnostics, validation};
//!
//! let diagnostics = VideoDiagnostics {
//!     frame_count: 1000,
//!     width: 640,
//!     height: 480,
//!     frames_per_second: 30.0,
//!     codec_tag: "avc1".to_string(),
//!     backend_name: "ffmpeg".to_string(),
//!     byte_size: 2_000,
//! };
//! assert!(validation::validate(&diagnostics, &CorruptionThresholds::default()).is_err());
//! ```

use crate::error::ThumbnailError;
use crate::metadata::{VideoDiagnostics, format_kilobytes};

/// Tunable limits for the corruption heuristics.
#[derive(Debug, Clone, PartialEq)]
pub struct CorruptionThresholds {
    /// Files smaller than this cannot contain a usable stream.
    pub min_file_bytes: u64,
    /// Lower bound on compressed bytes per frame.
    pub min_bytes_per_frame: u64,
    /// Frame rates above this indicate corrupt container metadata.
    pub max_frames_per_second: f64,
}

impl Default for CorruptionThresholds {
    fn default() -> Self {
        Self {
            min_file_bytes: 5_000,
            min_bytes_per_frame: 50,
            max_frames_per_second: 1_000.0,
        }
    }
}

impl CorruptionThresholds {
    /// Set the absolute file size floor.
    #[must_use]
    pub fn with_min_file_bytes(mut self, bytes: u64) -> Self {
        self.min_file_bytes = bytes;
        self
    }

    /// Set the minimum bytes expected per reported frame.
    #[must_use]
    pub fn with_min_bytes_per_frame(mut self, bytes: u64) -> Self {
        self.min_bytes_per_frame = bytes;
        self
    }

    /// Set the frame rate ceiling.
    #[must_use]
    pub fn with_max_frames_per_second(mut self, fps: f64) -> Self {
        self.max_frames_per_second = fps;
        self
    }
}

/// Reject files below the absolute size floor.
///
/// Needs only the file size, so the resolver runs it before the container
/// is even opened.
pub fn check_file_size(
    byte_size: u64,
    thresholds: &CorruptionThresholds,
) -> Result<(), ThumbnailError> {
    if byte_size < thresholds.min_file_bytes {
        return Err(ThumbnailError::Corruption(format!(
            "file too small ({}), likely truncated or incomplete",
            format_kilobytes(byte_size),
        )));
    }
    Ok(())
}

/// Run every corruption heuristic against the gathered diagnostics.
///
/// # Errors
///
/// Returns [`ThumbnailError::Corruption`] naming the first failed check.
pub fn validate(
    diagnostics: &VideoDiagnostics,
    thresholds: &CorruptionThresholds,
) -> Result<(), ThumbnailError> {
    check_file_size(diagnostics.byte_size, thresholds)?;

    // ── Truncation ─────────────────────────────────────────────────
    if diagnostics.frame_count > 0 && diagnostics.width > 0 && diagnostics.height > 0 {
        let min_expected_size = diagnostics
            .frame_count
            .saturating_mul(thresholds.min_bytes_per_frame);
        if diagnostics.byte_size < min_expected_size {
            return Err(ThumbnailError::Corruption(format!(
                "file appears truncated: metadata reports {} frames ({}x{} @ {:.1}fps) \
                 but file is only {} (expected at least {})",
                diagnostics.frame_count,
                diagnostics.width,
                diagnostics.height,
                diagnostics.frames_per_second,
                format_kilobytes(diagnostics.byte_size),
                format_kilobytes(min_expected_size),
            )));
        }
    }

    // ── Frame rate ─────────────────────────────────────────────────
    if diagnostics.frames_per_second > thresholds.max_frames_per_second {
        return Err(ThumbnailError::Corruption(format!(
            "invalid metadata: fps={:.1} is unrealistic (size: {})",
            diagnostics.frames_per_second,
            format_kilobytes(diagnostics.byte_size),
        )));
    }

    Ok(())
}
