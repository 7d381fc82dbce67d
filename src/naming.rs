//! Content-addressed thumbnail filenames.
//!
//! A thumbnail's filename is a SHA-256 digest of the item's stable platform
//! identifier and the target box, so the same logical request always maps
//! to the same file and re-runs never produce duplicates.

use sha2::{Digest, Sha256};

use crate::config::ThumbnailSize;

/// Extension of every thumbnail artifact.
pub const THUMBNAIL_EXTENSION: &str = "jpg";

/// Derive the artifact filename for `stable_id` at `size`.
///
/// The result is 64 lowercase hex characters followed by `.jpg`.
///
/// # Example
///
/// ```
/// use thumbnailer::{ThumbnailSize, naming::thumbnail_filename};
///
/// let first = thumbnail_filename("3141592653", ThumbnailSize::new(128, 128));
/// let second = thumbnail_filename("3141592653", ThumbnailSize::new(128, 128));
/// assert_eq!(first, second);
/// assert_eq!(first.len(), 64 + ".jpg".len());
/// ```
pub fn thumbnail_filename(stable_id: &str, size: ThumbnailSize) -> String {
    let digest = Sha256::digest(format!("{stable_id}_{size}").as_bytes());
    format!("{}.{THUMBNAIL_EXTENSION}", hex::encode(digest))
}
