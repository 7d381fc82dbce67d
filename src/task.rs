//! Running thumbnail passes from async code.
//!
//! A run is blocking work: SQLite queries, image decoding and a decode
//! worker waited on with a timeout. [`run_blocking`] moves the whole run onto
//! Tokio's blocking pool so an async host (an ingestion service, a web
//! server) keeps its reactor responsive.
//!
//! # Example
//!
//! ```no_run
//! use thumbnailer::{SqliteCatalog, Thumbnailer, ThumbnailerConfig, ThumbnailError};
//!
//! # async fn example() -> Result<(), ThumbnailError> {
//! let catalog = SqliteCatalog::open("catalog.db")?;
//! let worker = Thumbnailer::new(catalog, ThumbnailerConfig::new("thumbnails", "archives"))?;
//!
//! let (_worker, summary) = thumbnailer::task::run_blocking(worker, None).await?;
//! println!("generated {}", summary.generated);
//! # Ok(())
//! # }
//! ```

use crate::catalog::Catalog;
use crate::error::ThumbnailError;
use crate::pipeline::{RunSummary, Thumbnailer};

/// Run [`Thumbnailer::run`] on Tokio's blocking pool.
///
/// The thumbnailer is handed back alongside the summary so callers can
/// schedule the next pass with the same catalog connection.
///
/// # Errors
///
/// Returns the run's own error, or [`ThumbnailError::Worker`] if the
/// blocking task panicked.
pub async fn run_blocking<C>(
    mut thumbnailer: Thumbnailer<C>,
    limit: Option<u64>,
) -> Result<(Thumbnailer<C>, RunSummary), ThumbnailError>
where
    C: Catalog + Send + 'static,
{
    let (thumbnailer, result) = tokio::task::spawn_blocking(move || {
        let result = thumbnailer.run(limit);
        (thumbnailer, result)
    })
    .await
    .map_err(|error| ThumbnailError::Worker(error.to_string()))?;

    Ok((thumbnailer, result?))
}
