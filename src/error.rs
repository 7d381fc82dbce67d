//! Error types for the `thumbnailer` crate.
//!
//! This module defines [`ThumbnailError`], the unified error type returned by
//! all fallible operations in the crate. The variants double as the failure
//! taxonomy of the pipeline: some failures belong to a single media item and
//! are written back to the catalog as an error sentinel, others mean durable
//! state can no longer be trusted and must abort the run.

use ffmpeg_next::Error as FfmpegError;
use rusqlite::Error as SqliteError;
use thiserror::Error;

/// The unified error type for all `thumbnailer` operations.
///
/// Every public method that can fail returns `Result<T, ThumbnailError>`.
/// The `Display` output of item-level variants is what ends up in the
/// catalog after the `error: ` prefix, so messages carry enough context
/// (sizes, frame counts, codec) to triage a record without re-decoding it.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ThumbnailError {
    /// The media type of a record is neither `image` nor `video`.
    #[error("Unsupported media type for thumbnail generation: {0}")]
    UnsupportedType(String),

    /// The media could not be opened or decoded, including timeouts and
    /// videos where every fallback frame failed.
    #[error("Failed to decode media: {0}")]
    Decode(String),

    /// A video failed the corruption heuristics before any frame was read.
    #[error("Video appears corrupt: {0}")]
    Corruption(String),

    /// Writing the thumbnail artifact or updating the catalog failed.
    /// Always aborts the run.
    #[error("Persistence failure: {0}")]
    Persistence(String),

    /// The pipeline configuration is unusable (zero target size, zero
    /// timeout, out-of-range JPEG quality).
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The background task driving a run panicked or was cancelled by the
    /// async runtime.
    #[cfg(feature = "async")]
    #[error("Background worker failed: {0}")]
    Worker(String),
}

impl ThumbnailError {
    /// Returns `true` for failures scoped to a single media item.
    ///
    /// These are converted into an error sentinel on the record and the run
    /// moves on to the next item. Every other variant propagates.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            ThumbnailError::UnsupportedType(_)
                | ThumbnailError::Decode(_)
                | ThumbnailError::Corruption(_)
        )
    }
}

impl From<FfmpegError> for ThumbnailError {
    fn from(error: FfmpegError) -> Self {
        ThumbnailError::Decode(error.to_string())
    }
}

impl From<SqliteError> for ThumbnailError {
    fn from(error: SqliteError) -> Self {
        ThumbnailError::Persistence(format!("catalog: {error}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_failures_are_classified() {
        assert!(ThumbnailError::UnsupportedType("audio".into()).is_item_failure());
        assert!(ThumbnailError::Decode("timeout".into()).is_item_failure());
        assert!(ThumbnailError::Corruption("too small".into()).is_item_failure());
        assert!(!ThumbnailError::Persistence("disk full".into()).is_item_failure());
        assert!(!ThumbnailError::InvalidConfiguration("size".into()).is_item_failure());
    }

    #[test]
    fn sqlite_errors_become_persistence_failures() {
        let error: ThumbnailError = SqliteError::QueryReturnedNoRows.into();
        assert!(matches!(error, ThumbnailError::Persistence(_)));
    }
}
