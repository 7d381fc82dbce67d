//! SQLite catalog integration tests.

use tempfile::TempDir;
use thumbnailer::{Catalog, CatalogCounts, MediaType, SqliteCatalog, ThumbnailState};

fn generated(path: &str) -> ThumbnailState {
    ThumbnailState::Generated {
        path: path.to_string(),
    }
}

fn failed(reason: &str) -> ThumbnailState {
    ThumbnailState::Failed {
        reason: reason.to_string(),
    }
}

// ── Pending selection ──────────────────────────────────────────────

#[test]
fn pending_skips_ineligible_records() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    catalog
        .insert_media("a", &MediaType::Other("audio".to_string()), Some("a.mp3"))
        .unwrap();
    catalog.insert_media("b", &MediaType::Image, None).unwrap();
    let done = catalog.insert_media("c", &MediaType::Image, Some("c.png")).unwrap();
    let broken = catalog.insert_media("d", &MediaType::Video, Some("d.mp4")).unwrap();
    let pending = catalog.insert_media("e", &MediaType::Video, Some("e.mp4")).unwrap();

    assert!(catalog.record_outcome(done, &generated("local_thumbnails/c.jpg")).unwrap());
    assert!(catalog.record_outcome(broken, &failed("too small")).unwrap());

    let record = catalog.next_pending(None).unwrap().expect("one pending record");
    assert_eq!(record.id, pending);
    assert_eq!(record.id_on_platform, "e");
    assert_eq!(record.media_type, MediaType::Video);
    assert_eq!(record.local_path, "e.mp4");
    assert!(record.thumbnail.is_pending());

    assert!(catalog.next_pending(Some(pending)).unwrap().is_none());
}

#[test]
fn pending_walks_in_id_order() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let first = catalog.insert_media("1", &MediaType::Image, Some("1.png")).unwrap();
    let second = catalog.insert_media("2", &MediaType::Image, Some("2.png")).unwrap();

    assert_eq!(catalog.next_pending(None).unwrap().unwrap().id, first);
    assert_eq!(catalog.next_pending(Some(first)).unwrap().unwrap().id, second);
    assert!(catalog.next_pending(Some(second)).unwrap().is_none());
}

#[test]
fn empty_catalog_has_nothing_pending() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    assert!(catalog.next_pending(None).unwrap().is_none());
    assert_eq!(catalog.counts().unwrap(), CatalogCounts::default());
}

// ── Outcomes ───────────────────────────────────────────────────────

#[test]
fn outcomes_round_trip_through_column() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let image = catalog.insert_media("i", &MediaType::Image, Some("i.png")).unwrap();
    let video = catalog.insert_media("v", &MediaType::Video, Some("v.mp4")).unwrap();

    catalog.record_outcome(image, &generated("local_thumbnails/i.jpg")).unwrap();
    catalog.record_outcome(video, &failed("Video appears corrupt: file too small")).unwrap();

    assert_eq!(
        catalog.get(image).unwrap().unwrap().thumbnail,
        generated("local_thumbnails/i.jpg")
    );
    assert_eq!(
        catalog.get(video).unwrap().unwrap().thumbnail,
        failed("Video appears corrupt: file too small")
    );
}

#[test]
fn second_writer_loses_conditional_update() {
    let directory = TempDir::new().unwrap();
    let path = directory.path().join("catalog.db");

    let mut first = SqliteCatalog::open(&path).unwrap();
    let mut second = SqliteCatalog::open(&path).unwrap();
    let id = first.insert_media("x", &MediaType::Image, Some("x.png")).unwrap();

    assert!(first.record_outcome(id, &generated("local_thumbnails/x.jpg")).unwrap());
    assert!(!second.record_outcome(id, &failed("late")).unwrap());

    assert_eq!(
        second.get(id).unwrap().unwrap().thumbnail,
        generated("local_thumbnails/x.jpg")
    );
}

#[test]
fn pending_outcome_is_refused() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let id = catalog.insert_media("p", &MediaType::Image, Some("p.png")).unwrap();
    assert!(catalog.record_outcome(id, &ThumbnailState::Pending).is_err());
}

// ── Operator tools ─────────────────────────────────────────────────

#[test]
fn counts_and_failures_reflect_states() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let a = catalog.insert_media("a", &MediaType::Image, Some("a.png")).unwrap();
    let b = catalog.insert_media("b", &MediaType::Video, Some("b.mp4")).unwrap();
    catalog.insert_media("c", &MediaType::Video, Some("c.mp4")).unwrap();

    catalog.record_outcome(a, &generated("local_thumbnails/a.jpg")).unwrap();
    catalog.record_outcome(b, &failed("timeout")).unwrap();

    assert_eq!(
        catalog.counts().unwrap(),
        CatalogCounts {
            pending: 1,
            generated: 1,
            failed: 1,
        }
    );

    let failures = catalog.failures().unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].id, b);
    assert_eq!(failures[0].thumbnail, failed("timeout"));
}

#[test]
fn clear_errors_makes_failures_pending_again() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let good = catalog.insert_media("g", &MediaType::Image, Some("g.png")).unwrap();
    let bad = catalog.insert_media("b", &MediaType::Image, Some("b.png")).unwrap();
    catalog.record_outcome(good, &generated("local_thumbnails/g.jpg")).unwrap();
    catalog.record_outcome(bad, &failed("decode")).unwrap();

    assert_eq!(catalog.clear_errors().unwrap(), 1);
    assert_eq!(catalog.next_pending(None).unwrap().unwrap().id, bad);
    assert!(!catalog.get(good).unwrap().unwrap().thumbnail.is_pending());
}

#[test]
fn clear_thumbnail_resets_single_record() {
    let mut catalog = SqliteCatalog::open_in_memory().unwrap();
    let id = catalog.insert_media("g", &MediaType::Image, Some("g.png")).unwrap();
    catalog.record_outcome(id, &generated("local_thumbnails/g.jpg")).unwrap();

    assert!(catalog.clear_thumbnail(id).unwrap());
    assert!(catalog.get(id).unwrap().unwrap().thumbnail.is_pending());
    assert!(!catalog.clear_thumbnail(id + 100).unwrap());
}

#[test]
fn catalog_persists_across_connections() {
    let directory = TempDir::new().unwrap();
    let path = directory.path().join("catalog.db");

    let id = {
        let catalog = SqliteCatalog::open(&path).unwrap();
        catalog.insert_media("keep", &MediaType::Video, Some("keep.mp4")).unwrap()
    };

    let catalog = SqliteCatalog::open(&path).unwrap();
    assert_eq!(catalog.get(id).unwrap().unwrap().id_on_platform, "keep");
}
