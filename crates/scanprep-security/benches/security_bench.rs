// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for classification and pixel digests in the
// scanprep-security crate.

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{GrayImage, Luma};

use scanprep_backend::CpuBackend;
use scanprep_core::PipelineConfig;
use scanprep_imaging::PageImage;
use scanprep_security::{SecurityClassifier, page_digest};

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Full classifier pass over a 426x300 card-sized page with an MRZ band.
fn bench_classify(c: &mut Criterion) {
    let gray = GrayImage::from_fn(426, 300, |x, y| {
        let line = (250..262).contains(&y) || (272..284).contains(&y);
        let glyph = line && (20..406).contains(&x) && (x - 20) % 7 < 5;
        Luma([if glyph { 30 } else { 220 }])
    });
    let page = PageImage::from_gray(gray).expect("valid page");
    let classifier = SecurityClassifier::new(&PipelineConfig::default());

    c.bench_function("classify (426x300)", |b| {
        b.iter(|| black_box(classifier.classify(black_box(&page), &CpuBackend)));
    });
}

/// SHA-256 page digest over an A4 page at 150 dpi.
fn bench_page_digest(c: &mut Criterion) {
    let page = PageImage::from_gray(GrayImage::from_pixel(1240, 1754, Luma([230])))
        .expect("valid page");
    c.bench_function("page_digest (1240x1754)", |b| {
        b.iter(|| black_box(page_digest(black_box(&page))));
    });
}

criterion_group!(benches, bench_classify, bench_page_digest);
criterion_main!(benches);
