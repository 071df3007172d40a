#![cfg(all(feature = "rayon", feature = "image-io"))]

use iconmatch::image::io::save_color_image;
use iconmatch::{ColorImage, IconSize, LibraryConfig, Matcher, PreprocessConfig, ReferenceLibrary};
use std::sync::Arc;

fn make_icon(seed: usize, size: usize) -> ColorImage {
    ColorImage::from_fn(size, size, |x, y| {
        let v = ((x * 11) ^ (y * (3 + seed)) ^ (x * y)) & 0xFF;
        [v as u8, (255 - v) as u8, ((v + seed * 40) & 0xFF) as u8]
    })
    .unwrap()
}

fn load(dir: &std::path::Path, parallel: bool) -> ReferenceLibrary {
    let config = LibraryConfig {
        preprocess: PreprocessConfig {
            icon_size: IconSize::new(48, 48).unwrap(),
            ..PreprocessConfig::default()
        },
        parallel,
        ..LibraryConfig::default()
    };
    let mut library = ReferenceLibrary::new(config).unwrap();
    library.load(dir).unwrap();
    library
}

#[test]
fn parallel_load_matches_sequential() {
    let dir = tempfile::tempdir().unwrap();
    for seed in 0..8 {
        let size = if seed % 3 == 0 { 60 } else { 48 };
        save_color_image(&make_icon(seed, size), dir.path().join(format!("item_{seed}.png")))
            .unwrap();
    }

    let sequential = load(dir.path(), false);
    let parallel = load(dir.path(), true);

    let ids = |lib: &ReferenceLibrary| -> Vec<String> {
        lib.all().map(|e| e.item_id().to_string()).collect()
    };
    assert_eq!(ids(&sequential), ids(&parallel));
    for (a, b) in sequential.all().zip(parallel.all()) {
        assert_eq!(a.image().color, b.image().color);
        assert_eq!(a.image().features, b.image().features);
    }

    let query = make_icon(5, 48);
    let seq = Matcher::new(Arc::new(sequential)).top_matches(&query, 8);
    let par = Matcher::new(Arc::new(parallel)).top_matches(&query, 8);
    assert_eq!(seq, par);
    assert_eq!(seq[0].item_id, "item_5");
}
