//! # thumbnailer
//!
//! Catalog-driven thumbnail generation for archived images and videos.
//!
//! `thumbnailer` scans a media catalog for records without a preview image,
//! derives one representative frame per record, writes a JPEG thumbnail
//! under a content-addressed name, and records the outcome back in the
//! catalog. Broken media is marked with a permanent `error: <reason>`
//! sentinel so it is never retried until an operator clears it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use thumbnailer::{SqliteCatalog, Thumbnailer, ThumbnailerConfig, ThumbnailError};
//!
//! let catalog = SqliteCatalog::open("catalog.db")?;
//! let config = ThumbnailerConfig::new("data/thumbnails", "data/archives");
//! let mut thumbnailer = Thumbnailer::new(catalog, config)?;
//!
//! let summary = thumbnailer.run(None)?;
//! println!("{} generated, {} failed", summary.generated, summary.failed);
//! # Ok::<(), ThumbnailError>(())
//! ```
//!
//! ## How a record is processed
//!
//! - **Images** are decoded directly (format sniffed from content).
//! - **Videos** are probed with FFmpeg, checked against corruption
//!   heuristics (size floor, truncation, absurd frame rate), then decoded on
//!   a worker thread with a hard timeout, trying frames 0, 1, 10 and 30.
//! - The frame is fitted into the target box (128x128 by default) without
//!   upscaling and written as `<sha256(id_on_platform + size)>.jpg`.
//! - The catalog gets the relative artifact path, or `error: <reason>`.
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | [`task::run_blocking`] runs a pass on Tokio's blocking pool |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod catalog;
pub mod config;
pub mod error;
pub mod ffmpeg;
pub mod metadata;
pub mod naming;
pub mod pipeline;
pub mod progress;
pub mod resolver;
pub mod storage;
#[cfg(feature = "async")]
pub mod task;
pub mod validation;
pub mod video;

pub use catalog::{Catalog, CatalogCounts, SqliteCatalog};
pub use config::{ThumbnailSize, ThumbnailerConfig};
pub use error::ThumbnailError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use metadata::{MediaRecord, MediaType, ThumbnailState, VideoDiagnostics};
pub use pipeline::{RunSummary, Thumbnailer};
pub use progress::{CancellationToken, ItemOutcome, ProgressCallback, ProgressInfo};
pub use resolver::FrameResolver;
pub use storage::ThumbnailStore;
pub use validation::CorruptionThresholds;
pub use video::{FfmpegBackend, FfmpegVideo, VideoBackend, VideoSource};
