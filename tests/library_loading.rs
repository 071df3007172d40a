#![cfg(feature = "image-io")]

use iconmatch::image::io::{load_color_image, save_color_image};
use iconmatch::{
    ColorImage, IconMatchError, IconSize, LibraryConfig, Matcher, PreprocessConfig,
    ReferenceLibrary,
};
use std::fs;
use std::sync::Arc;

fn make_icon(seed: u8, size: usize) -> ColorImage {
    ColorImage::from_fn(size, size, |x, y| {
        let v = ((x * 13) ^ (y * 7) ^ (x * y)) as u8;
        [v.wrapping_add(seed), v / 2, 200u8.wrapping_sub(v / 3).wrapping_add(seed)]
    })
    .unwrap()
}

fn config() -> LibraryConfig {
    LibraryConfig {
        preprocess: PreprocessConfig {
            icon_size: IconSize::new(48, 48).unwrap(),
            ..PreprocessConfig::default()
        },
        ..LibraryConfig::default()
    }
}

#[test]
fn load_skips_bad_files_and_resizes() {
    let dir = tempfile::tempdir().unwrap();
    save_color_image(&make_icon(0, 48), dir.path().join("b_sword.png")).unwrap();
    save_color_image(&make_icon(40, 48), dir.path().join("a_shield.png")).unwrap();
    save_color_image(&make_icon(80, 64), dir.path().join("c_bow.bmp")).unwrap();
    fs::write(dir.path().join("broken.png"), b"not an image").unwrap();
    fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

    let mut library = ReferenceLibrary::new(config()).unwrap();
    let report = library.load(dir.path()).unwrap();

    assert_eq!(report.loaded, 3);
    assert_eq!(report.resized, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].path.file_name().unwrap(),
        std::ffi::OsStr::new("broken.png")
    );
    assert!(!report.skipped[0].reason.is_empty());

    assert_eq!(library.count(), 3);
    let ids: Vec<&str> = library.all().map(|e| e.item_id()).collect();
    assert_eq!(ids, vec!["a_shield", "b_sword", "c_bow"]);
    let bow = library.get("c_bow").unwrap();
    assert_eq!(bow.image().size(), IconSize::new(48, 48).unwrap());
}

#[test]
fn duplicate_stems_keep_first_file() {
    let dir = tempfile::tempdir().unwrap();
    save_color_image(&make_icon(0, 48), dir.path().join("gem.bmp")).unwrap();
    save_color_image(&make_icon(90, 48), dir.path().join("gem.png")).unwrap();

    let mut library = ReferenceLibrary::new(config()).unwrap();
    let report = library.load(dir.path()).unwrap();
    assert_eq!(report.loaded, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(
        report.skipped[0].path.file_name().unwrap(),
        std::ffi::OsStr::new("gem.png")
    );
    let gem = library.get("gem").unwrap();
    assert_eq!(gem.image().color, make_icon(0, 48));
}

#[test]
fn missing_directory_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");
    let mut library = ReferenceLibrary::new(config()).unwrap();
    let err = library.load(&missing).unwrap_err();
    assert_eq!(
        err,
        IconMatchError::LibraryNotFound {
            path: missing.display().to_string(),
        }
    );
}

#[test]
fn directory_without_usable_images_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut library = ReferenceLibrary::new(config()).unwrap();
    assert!(matches!(
        library.load(dir.path()),
        Err(IconMatchError::EmptyLibrary { .. })
    ));

    fs::write(dir.path().join("junk.webp"), b"garbage").unwrap();
    assert!(matches!(
        library.load(dir.path()),
        Err(IconMatchError::EmptyLibrary { .. })
    ));
    assert!(library.is_empty());
}

#[test]
fn loaded_file_recognizes_itself() {
    let dir = tempfile::tempdir().unwrap();
    for (seed, name) in [(0u8, "ring.png"), (60, "amulet.png"), (120, "boots.png")] {
        save_color_image(&make_icon(seed, 48), dir.path().join(name)).unwrap();
    }
    let mut library = ReferenceLibrary::new(config()).unwrap();
    library.load(dir.path()).unwrap();

    let query = load_color_image(dir.path().join("amulet.png")).unwrap();
    let matcher = Matcher::new(Arc::new(library));
    assert_eq!(matcher.recognize(&query).as_deref(), Some("amulet"));
}
