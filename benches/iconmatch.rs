use iconmatch::lowlevel::{ActiveKernel, FeatureExtractor, Kernel, OrbExtractor};
use iconmatch::{
    ColorImage, IconSize, LibraryConfig, Matcher, OrbConfig, PreprocessConfig, ReferenceLibrary,
    Scorer,
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

fn make_icon(seed: usize, size: usize) -> ColorImage {
    ColorImage::from_fn(size, size, |x, y| {
        let v = ((x * 13) ^ (y * (7 + seed)) ^ (x * y)) & 0xFF;
        [v as u8, ((v + seed * 31) & 0xFF) as u8, (255 - v) as u8]
    })
    .unwrap()
}

fn library(count: usize) -> Arc<ReferenceLibrary> {
    let config = LibraryConfig {
        preprocess: PreprocessConfig {
            icon_size: IconSize::default(),
            ..PreprocessConfig::default()
        },
        ..LibraryConfig::default()
    };
    let images = (0..count).map(|i| (format!("item_{i}"), make_icon(i, 160)));
    Arc::new(ReferenceLibrary::from_images(config, images).unwrap())
}

fn bench_kernels(c: &mut Criterion) {
    let a: Vec<u8> = (0..160 * 160).map(|i| (i * 7 % 251) as u8).collect();
    let b: Vec<u8> = (0..160 * 160).map(|i| (i * 13 % 241) as u8).collect();
    c.bench_function("dot_160x160", |bench| {
        bench.iter(|| black_box(ActiveKernel::dot(black_box(&a), black_box(&b))));
    });
}

fn bench_features(c: &mut Criterion) {
    let gray = make_icon(3, 160).to_gray();
    let orb = OrbExtractor::new(OrbConfig::default());
    c.bench_function("orb_160x160", |b| {
        b.iter(|| black_box(orb.detect_and_compute(black_box(&gray))));
    });
}

fn bench_matcher(c: &mut Criterion) {
    let library = library(24);
    let query = make_icon(7, 180);

    let prepared = library.preprocessor().prepare_query(&query).unwrap();
    let scorer = Scorer::default();
    let reference = library.entries()[7].image();
    c.bench_function("score_pair", |b| {
        b.iter(|| black_box(scorer.score(black_box(&prepared), reference)));
    });

    c.bench_function("prepare_query", |b| {
        b.iter(|| black_box(library.preprocessor().prepare_query(black_box(&query)).unwrap()));
    });

    let matcher = Matcher::new(library);
    c.bench_function("top_matches_24", |b| {
        b.iter(|| black_box(matcher.top_matches(black_box(&query), 3)));
    });
}

criterion_group!(benches, bench_kernels, bench_features, bench_matcher);
criterion_main!(benches);
