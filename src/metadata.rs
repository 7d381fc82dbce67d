//! Catalog record and video diagnostic types.
//!
//! [`MediaRecord`] is the pipeline's view of one row of the catalog, and
//! [`VideoDiagnostics`] collects the container facts the corruption
//! heuristics decide on.

use std::fmt::{Display, Formatter, Result as FmtResult};

/// Prefix that marks a thumbnail column value as a permanent failure.
pub const ERROR_SENTINEL_PREFIX: &str = "error: ";

/// The kind of media a catalog record points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaType {
    /// A still image (JPEG, PNG, WebP, ...).
    Image,
    /// A video container.
    Video,
    /// Anything else the catalog knows about (audio, documents, ...).
    Other(String),
}

impl MediaType {
    /// Parse the catalog's `media_type` column.
    pub fn from_column(value: &str) -> Self {
        match value {
            "image" => MediaType::Image,
            "video" => MediaType::Video,
            other => MediaType::Other(other.to_string()),
        }
    }

    /// The value stored in the catalog's `media_type` column.
    pub fn as_column(&self) -> &str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Other(other) => other,
        }
    }
}

impl Display for MediaType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_column())
    }
}

/// Thumbnail status of a record.
///
/// The catalog stores this in a single nullable text column: `NULL` for
/// [`Pending`](ThumbnailState::Pending), `"error: <reason>"` for
/// [`Failed`](ThumbnailState::Failed) and the relative artifact path for
/// [`Generated`](ThumbnailState::Generated). Once a record leaves `Pending`
/// it is never picked up again until an operator clears it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThumbnailState {
    /// No thumbnail attempt has been recorded.
    Pending,
    /// A thumbnail was written; `path` is relative to the served root.
    Generated {
        /// Relative artifact path, e.g. `local_thumbnails/<hash>.jpg`.
        path: String,
    },
    /// Generation failed permanently.
    Failed {
        /// Human-readable diagnostic, without the sentinel prefix.
        reason: String,
    },
}

impl ThumbnailState {
    /// Decode the raw column value.
    pub fn from_column(value: Option<String>) -> Self {
        match value {
            None => ThumbnailState::Pending,
            Some(value) => match value.strip_prefix(ERROR_SENTINEL_PREFIX.trim_end()) {
                Some(reason) => ThumbnailState::Failed {
                    reason: reason.trim_start().to_string(),
                },
                None => ThumbnailState::Generated { path: value },
            },
        }
    }

    /// Encode into the raw column value.
    pub fn to_column(&self) -> Option<String> {
        match self {
            ThumbnailState::Pending => None,
            ThumbnailState::Generated { path } => Some(path.clone()),
            ThumbnailState::Failed { reason } => Some(format!("{ERROR_SENTINEL_PREFIX}{reason}")),
        }
    }

    /// Returns `true` while the record still awaits processing.
    pub fn is_pending(&self) -> bool {
        matches!(self, ThumbnailState::Pending)
    }
}

/// One media record as stored in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    /// Catalog-local row id.
    pub id: i64,
    /// Stable identifier of the item on its source platform. Feeds the
    /// thumbnail filename, so it must not change between runs.
    pub id_on_platform: String,
    /// Kind of media the record points at.
    pub media_type: MediaType,
    /// Stored file location as written by ingestion.
    pub local_path: String,
    /// Current thumbnail status.
    pub thumbnail: ThumbnailState,
}

/// Container facts gathered before decoding a video.
///
/// All values come straight from the demuxer and may be wrong for damaged
/// files; that is exactly what [`validate`](crate::validation::validate)
/// looks for.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDiagnostics {
    /// Frame count reported (or estimated) by the container. Zero if unknown.
    pub frame_count: u64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frame rate.
    pub frames_per_second: f64,
    /// FourCC codec tag, or the codec name when the container has no tag.
    pub codec_tag: String,
    /// Name and version of the demuxing backend.
    pub backend_name: String,
    /// Size of the file on disk.
    pub byte_size: u64,
}

impl Display for VideoDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "{} frames, {}x{} @ {:.1}fps, codec={}, backend={}, size={}",
            self.frame_count,
            self.width,
            self.height,
            self.frames_per_second,
            self.codec_tag,
            self.backend_name,
            format_kilobytes(self.byte_size),
        )
    }
}

/// Render a byte count as kilobytes with one decimal, e.g. `4.9 KB`.
pub(crate) fn format_kilobytes(bytes: u64) -> String {
    format!("{:.1} KB", bytes as f64 / 1024.0)
}

/// Decode a packed FourCC into text, `"unknown"` for an empty tag.
pub(crate) fn fourcc_to_string(tag: u32) -> String {
    if tag == 0 {
        return "unknown".to_string();
    }
    tag.to_le_bytes()
        .iter()
        .map(|&byte| {
            if byte.is_ascii_graphic() || byte == b' ' {
                byte as char
            } else {
                '?'
            }
        })
        .collect()
}
