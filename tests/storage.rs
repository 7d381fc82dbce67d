//! Thumbnail storage integration tests.

use image::{DynamicImage, GenericImageView, ImageFormat, RgbImage};
use tempfile::TempDir;
use thumbnailer::storage::fit_within;
use thumbnailer::{ThumbnailSize, ThumbnailStore, ThumbnailerConfig};

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    }))
}

fn store_in(directory: &TempDir) -> ThumbnailStore {
    let config = ThumbnailerConfig::new(directory.path().join("thumbs"), directory.path());
    ThumbnailStore::new(&config)
}

#[test]
fn wide_image_fits_box_with_ratio_kept() {
    let (width, height) = fit_within(4000, 2000, ThumbnailSize::new(128, 128));
    assert!(width <= 128 && height <= 128);
    assert_eq!((width, height), (128, 64));
}

#[test]
fn written_thumbnail_is_jpeg_inside_box() {
    let directory = TempDir::new().unwrap();
    let store = store_in(&directory);

    let relative = store.write("wide.jpg", &gradient(400, 200)).unwrap();
    assert_eq!(relative, "local_thumbnails/wide.jpg");

    let bytes = std::fs::read(store.directory().join("wide.jpg")).unwrap();
    assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);

    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!(decoded.dimensions(), (128, 64));
}

#[test]
fn small_image_is_not_upscaled() {
    let directory = TempDir::new().unwrap();
    let store = store_in(&directory);

    store.write("small.jpg", &gradient(40, 30)).unwrap();
    let decoded = image::open(store.directory().join("small.jpg")).unwrap();
    assert_eq!(decoded.dimensions(), (40, 30));
}

#[test]
fn existing_artifact_is_reused() {
    let directory = TempDir::new().unwrap();
    let store = store_in(&directory);

    store.write("same.jpg", &gradient(300, 300)).unwrap();
    let path = store.directory().join("same.jpg");
    let first = std::fs::read(&path).unwrap();

    let relative = store.write("same.jpg", &gradient(10, 10)).unwrap();
    assert_eq!(relative, "local_thumbnails/same.jpg");
    assert_eq!(std::fs::read(&path).unwrap(), first);
}

#[test]
fn no_partial_files_left_behind() {
    let directory = TempDir::new().unwrap();
    let store = store_in(&directory);

    store.write("clean.jpg", &gradient(64, 64)).unwrap();
    let names: Vec<_> = std::fs::read_dir(store.directory())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["clean.jpg".to_string()]);
}

#[test]
fn custom_prefix_is_recorded() {
    let directory = TempDir::new().unwrap();
    let config = ThumbnailerConfig::new(directory.path(), directory.path())
        .with_thumbnail_prefix("thumbs/v2");
    let store = ThumbnailStore::new(&config);

    assert_eq!(store.relative_path("a.jpg"), "thumbs/v2/a.jpg");
}
