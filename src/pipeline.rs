//! The catalog-driven thumbnail run.
//!
//! [`Thumbnailer`] owns a [`Catalog`] and repeatedly claims the next record
//! without a thumbnail, resolves its representative frame, writes the
//! artifact and records the outcome. A failure scoped to one item becomes an
//! error sentinel on that record and the run continues; a persistence
//! failure aborts it.
//!
//! # Example
//!
//! ```no_run
//! use thumbnailer::{SqliteCatalog, Thumbnailer, ThumbnailerConfig, ThumbnailError};
//!
//! let catalog = SqliteCatalog::open("catalog.db")?;
//! let config = ThumbnailerConfig::new("thumbnails", "archives");
//! let mut thumbnailer = Thumbnailer::new(catalog, config)?;
//!
//! let summary = thumbnailer.run(Some(100))?;
//! println!("generated {} thumbnails", summary.generated);
//! # Ok::<(), ThumbnailError>(())
//! ```

use std::sync::Arc;
use std::time::Duration;

use crate::catalog::Catalog;
use crate::config::ThumbnailerConfig;
use crate::error::ThumbnailError;
use crate::metadata::{MediaRecord, ThumbnailState};
use crate::naming::thumbnail_filename;
use crate::progress::{ItemOutcome, ProgressTracker};
use crate::resolver::FrameResolver;
use crate::storage::ThumbnailStore;
use crate::video::VideoBackend;

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records claimed and processed.
    pub claimed: u64,
    /// Thumbnails generated and recorded.
    pub generated: u64,
    /// Records marked with an error sentinel.
    pub failed: u64,
    /// Records another writer finished first.
    pub conflicts: u64,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Drives thumbnail generation over a catalog.
pub struct Thumbnailer<C> {
    catalog: C,
    config: ThumbnailerConfig,
    resolver: FrameResolver,
    store: ThumbnailStore,
}

impl<C> std::fmt::Debug for Thumbnailer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thumbnailer")
            .field("config", &self.config)
            .field("resolver", &self.resolver)
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl<C: Catalog> Thumbnailer<C> {
    /// Create a thumbnailer decoding videos with FFmpeg.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::InvalidConfiguration`] if the configuration
    /// would make every item fail.
    pub fn new(catalog: C, config: ThumbnailerConfig) -> Result<Self, ThumbnailError> {
        config.validate()?;
        Ok(Self {
            resolver: FrameResolver::new(&config),
            store: ThumbnailStore::new(&config),
            catalog,
            config,
        })
    }

    /// Replace the video backend.
    #[must_use]
    pub fn with_video_backend(mut self, backend: Arc<dyn VideoBackend>) -> Self {
        self.resolver = FrameResolver::with_backend(&self.config, backend);
        self
    }

    /// The wrapped catalog.
    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// Consume the thumbnailer and return its catalog.
    pub fn into_catalog(self) -> C {
        self.catalog
    }

    /// Generate thumbnails for pending records.
    ///
    /// Stops when no pending record is left, when `limit` thumbnails have
    /// been generated, or when the configured cancellation token fires.
    /// Failed items do not count toward `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`ThumbnailError::Persistence`] if the catalog or the
    /// thumbnail directory cannot be written. Outcomes recorded before the
    /// failure stay recorded.
    pub fn run(&mut self, limit: Option<u64>) -> Result<RunSummary, ThumbnailError> {
        let mut tracker = ProgressTracker::new(Arc::clone(&self.config.progress), limit);
        let mut cursor = None;

        log::info!(
            "Starting thumbnail run (size={}, limit={})",
            self.config.size,
            limit.map_or_else(|| "none".to_string(), |limit| limit.to_string())
        );

        while !tracker.limit_reached() {
            if self.config.is_cancelled() {
                log::info!("Thumbnail run cancelled");
                break;
            }

            let Some(record) = self.catalog.next_pending(cursor)? else {
                break;
            };
            cursor = Some(record.id);

            let outcome = self.process(&record)?;
            tracker.advance(record.id, outcome);
        }

        if tracker.limit_reached() {
            log::info!("Reached limit of {} thumbnails", tracker.generated);
        }

        let summary = RunSummary {
            claimed: tracker.processed,
            generated: tracker.generated,
            failed: tracker.failed,
            conflicts: tracker.conflicts,
            elapsed: tracker.elapsed(),
        };
        log::info!(
            "Thumbnail run finished: {} generated, {} failed, {} conflicts in {:.1?}",
            summary.generated,
            summary.failed,
            summary.conflicts,
            summary.elapsed
        );
        Ok(summary)
    }

    /// Generate and record the outcome for one claimed record.
    fn process(&mut self, record: &MediaRecord) -> Result<ItemOutcome, ThumbnailError> {
        let local_path = self.config.resolve_media_path(&record.local_path);
        log::info!(
            "Generating thumbnail for media ID {} at {}",
            record.id,
            local_path.display()
        );

        let (state, outcome) = match self.generate(record, &local_path) {
            Ok(path) => (ThumbnailState::Generated { path }, ItemOutcome::Generated),
            Err(error) if error.is_item_failure() => {
                log::error!(
                    "Error generating thumbnail for media ID {} (type={}, path={}): {error}",
                    record.id,
                    record.media_type,
                    local_path.display()
                );
                (
                    ThumbnailState::Failed {
                        reason: error.to_string(),
                    },
                    ItemOutcome::Failed,
                )
            }
            Err(error) => return Err(error),
        };

        if self.catalog.record_outcome(record.id, &state)? {
            Ok(outcome)
        } else {
            log::warn!(
                "Media ID {} was updated by another writer, keeping its recorded outcome",
                record.id
            );
            Ok(ItemOutcome::Conflict)
        }
    }

    fn generate(
        &self,
        record: &MediaRecord,
        local_path: &std::path::Path,
    ) -> Result<String, ThumbnailError> {
        let image = self.resolver.resolve(local_path, &record.media_type)?;
        let filename = thumbnail_filename(&record.id_on_platform, self.config.size);
        self.store.write(&filename, &image)
    }
}
