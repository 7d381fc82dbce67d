//! Media catalog access.
//!
//! The pipeline talks to the catalog through the [`Catalog`] trait: claim
//! the next unprocessed record, then record exactly one outcome for it.
//! [`SqliteCatalog`] implements it on top of a `media` table and adds the
//! operator-facing queries (status counts, failure listing, sentinel
//! clearing).

use std::path::Path;

use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::error::ThumbnailError;
use crate::metadata::{MediaRecord, MediaType, ThumbnailState};

/// Storage the pipeline reads pending records from and writes outcomes to.
///
/// Implementations must return records in ascending `id` order so the
/// `after_id` cursor visits each record at most once per run.
pub trait Catalog {
    /// Fetch the pending image or video record with the smallest id greater
    /// than `after_id` (or the smallest overall for `None`).
    fn next_pending(
        &mut self,
        after_id: Option<i64>,
    ) -> Result<Option<MediaRecord>, ThumbnailError>;

    /// Persist the outcome for record `id`.
    ///
    /// The write only applies while the record is still pending. Returns
    /// `false` when another writer got there first.
    fn record_outcome(&mut self, id: i64, state: &ThumbnailState) -> Result<bool, ThumbnailError>;
}

impl<C: Catalog + ?Sized> Catalog for &mut C {
    fn next_pending(
        &mut self,
        after_id: Option<i64>,
    ) -> Result<Option<MediaRecord>, ThumbnailError> {
        (**self).next_pending(after_id)
    }

    fn record_outcome(&mut self, id: i64, state: &ThumbnailState) -> Result<bool, ThumbnailError> {
        (**self).record_outcome(id, state)
    }
}

/// Record counts by thumbnail state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogCounts {
    /// Image/video records with a file path and no thumbnail yet.
    pub pending: u64,
    /// Records with a generated thumbnail.
    pub generated: u64,
    /// Records carrying an error sentinel.
    pub failed: u64,
}

/// SQLite-backed catalog.
pub struct SqliteCatalog {
    connection: Connection,
}

impl std::fmt::Debug for SqliteCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteCatalog")
            .field("path", &self.connection.path())
            .finish()
    }
}

const SELECT_COLUMNS: &str = "id, id_on_platform, media_type, local_url, thumbnail_path";

impl SqliteCatalog {
    /// Open (or create) the catalog database at `path`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ThumbnailError> {
        let connection = Connection::open(path.as_ref())?;
        log::debug!("Opened catalog at {}", path.as_ref().display());
        Self::from_connection(connection)
    }

    /// Create a private in-memory catalog.
    pub fn open_in_memory() -> Result<Self, ThumbnailError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the schema if it is missing.
    pub fn from_connection(connection: Connection) -> Result<Self, ThumbnailError> {
        let catalog = Self { connection };
        catalog.init_schema()?;
        Ok(catalog)
    }

    fn init_schema(&self) -> Result<(), ThumbnailError> {
        self.connection.execute(
            "CREATE TABLE IF NOT EXISTS media (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                id_on_platform  TEXT NOT NULL,
                media_type      TEXT NOT NULL,
                local_url       TEXT,
                thumbnail_path  TEXT
            )",
            [],
        )?;
        self.connection.execute(
            "CREATE INDEX IF NOT EXISTS idx_media_thumbnail_path ON media(thumbnail_path)",
            [],
        )?;
        Ok(())
    }

    /// Insert a media record as ingestion would. Returns the new id.
    pub fn insert_media(
        &self,
        id_on_platform: &str,
        media_type: &MediaType,
        local_path: Option<&str>,
    ) -> Result<i64, ThumbnailError> {
        self.connection.execute(
            "INSERT INTO media (id_on_platform, media_type, local_url) VALUES (?1, ?2, ?3)",
            params![id_on_platform, media_type.as_column(), local_path],
        )?;
        Ok(self.connection.last_insert_rowid())
    }

    /// Look up a record by id, regardless of state.
    ///
    /// Records without a stored file path are returned with an empty
    /// `local_path`.
    pub fn get(&self, id: i64) -> Result<Option<MediaRecord>, ThumbnailError> {
        let record = self
            .connection
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM media WHERE id = ?1"),
                params![id],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    /// Count records by thumbnail state.
    pub fn counts(&self) -> Result<CatalogCounts, ThumbnailError> {
        let counts = self.connection.query_row(
            "SELECT
                COALESCE(SUM(thumbnail_path IS NULL AND local_url IS NOT NULL
                    AND media_type IN ('image', 'video')), 0),
                COALESCE(SUM(thumbnail_path IS NOT NULL AND thumbnail_path NOT LIKE 'error:%'), 0),
                COALESCE(SUM(thumbnail_path LIKE 'error:%'), 0)
             FROM media",
            [],
            |row| {
                Ok(CatalogCounts {
                    pending: row.get::<_, i64>(0)? as u64,
                    generated: row.get::<_, i64>(1)? as u64,
                    failed: row.get::<_, i64>(2)? as u64,
                })
            },
        )?;
        Ok(counts)
    }

    /// List records carrying an error sentinel, oldest first.
    pub fn failures(&self) -> Result<Vec<MediaRecord>, ThumbnailError> {
        let mut statement = self.connection.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM media WHERE thumbnail_path LIKE 'error:%' ORDER BY id"
        ))?;
        let records = statement
            .query_map([], read_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Clear every error sentinel so the next run retries those records.
    ///
    /// Returns the number of records cleared.
    pub fn clear_errors(&self) -> Result<usize, ThumbnailError> {
        let cleared = self.connection.execute(
            "UPDATE media SET thumbnail_path = NULL WHERE thumbnail_path LIKE 'error:%'",
            [],
        )?;
        log::info!("Cleared {cleared} thumbnail error sentinels");
        Ok(cleared)
    }

    /// Reset one record to pending, whatever its current state.
    ///
    /// Returns `false` if no record has that id.
    pub fn clear_thumbnail(&self, id: i64) -> Result<bool, ThumbnailError> {
        let changed = self.connection.execute(
            "UPDATE media SET thumbnail_path = NULL WHERE id = ?1",
            params![id],
        )?;
        Ok(changed == 1)
    }
}

impl Catalog for SqliteCatalog {
    fn next_pending(
        &mut self,
        after_id: Option<i64>,
    ) -> Result<Option<MediaRecord>, ThumbnailError> {
        let record = self
            .connection
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS}
                     FROM media
                     WHERE thumbnail_path IS NULL
                       AND local_url IS NOT NULL
                       AND media_type IN ('image', 'video')
                       AND id > ?1
                     ORDER BY id
                     LIMIT 1"
                ),
                params![after_id.unwrap_or(i64::MIN)],
                read_record,
            )
            .optional()?;
        Ok(record)
    }

    fn record_outcome(&mut self, id: i64, state: &ThumbnailState) -> Result<bool, ThumbnailError> {
        let value = state.to_column().ok_or_else(|| {
            ThumbnailError::Persistence(format!(
                "refusing to record a pending outcome for media {id}"
            ))
        })?;
        let changed = self.connection.execute(
            "UPDATE media SET thumbnail_path = ?1 WHERE id = ?2 AND thumbnail_path IS NULL",
            params![value, id],
        )?;
        Ok(changed == 1)
    }
}

fn read_record(row: &Row<'_>) -> rusqlite::Result<MediaRecord> {
    let media_type: String = row.get(2)?;
    let local_path: Option<String> = row.get(3)?;
    Ok(MediaRecord {
        id: row.get(0)?,
        id_on_platform: row.get(1)?,
        media_type: MediaType::from_column(&media_type),
        local_path: local_path.unwrap_or_default(),
        thumbnail: ThumbnailState::from_column(row.get(4)?),
    })
}
