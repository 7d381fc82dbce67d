//! Thumbnail filename integration tests.

use thumbnailer::ThumbnailSize;
use thumbnailer::naming::{THUMBNAIL_EXTENSION, thumbnail_filename};

#[test]
fn same_inputs_give_same_name() {
    let size = ThumbnailSize::new(128, 128);
    assert_eq!(
        thumbnail_filename("video_8812", size),
        thumbnail_filename("video_8812", size)
    );
}

#[test]
fn name_is_hex_digest_with_extension() {
    let name = thumbnail_filename("abc", ThumbnailSize::default());
    let (stem, extension) = name.rsplit_once('.').expect("name has an extension");

    assert_eq!(extension, THUMBNAIL_EXTENSION);
    assert_eq!(stem.len(), 64);
    assert!(stem.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
}

#[test]
fn size_changes_name() {
    let small = thumbnail_filename("abc", ThumbnailSize::new(128, 128));
    let large = thumbnail_filename("abc", ThumbnailSize::new(256, 256));
    let wide = thumbnail_filename("abc", ThumbnailSize::new(256, 128));

    assert_ne!(small, large);
    assert_ne!(large, wide);
}

#[test]
fn identifier_changes_name() {
    let size = ThumbnailSize::default();
    assert_ne!(thumbnail_filename("abc", size), thumbnail_filename("abd", size));
}

#[test]
fn name_does_not_leak_identifier() {
    let name = thumbnail_filename("../../etc/passwd", ThumbnailSize::default());
    assert!(!name.contains('/'));
    assert!(!name.contains("passwd"));
}
