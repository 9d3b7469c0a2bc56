// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// End-to-end default-mode run over a noisy, slightly skewed scan with a
// black scanner border.

mod common;

use image::DynamicImage;
use scanprep_core::config::PipelineConfig;
use scanprep_core::types::PipelineMode;
use scanprep_pipeline::{PageOutcome, Pipeline};
use scanprep_security::UnitReport;

fn applied<'a>(outcome: &'a PageOutcome, module: &str) -> &'a UnitReport {
    let unit = outcome
        .report
        .unit(module)
        .next()
        .unwrap_or_else(|| panic!("{module} did not run"));
    assert!(unit.applied, "{module} not applied: {:?}", unit.detect_meta);
    unit
}

fn process_number(unit: &UnitReport, key: &str) -> f64 {
    unit.process_meta.as_ref().unwrap()[key].as_f64().unwrap()
}

fn check_scan(width: u32, height: u32, border: u32) {
    common::init_tracing();
    let config = PipelineConfig::for_mode(PipelineMode::Default);
    let min_strength = config.denoise.min_strength as f64;
    let pipeline = Pipeline::new(config).unwrap();
    let scan = common::scanned_page(width, height, border, 3.0, 8.0);
    let (outcome, _profile) = pipeline
        .process_image(DynamicImage::ImageLuma8(scan), None)
        .unwrap();
    assert!(!outcome.is_failed());

    applied(&outcome, "edge_mask");

    let deskew = applied(&outcome, "deskew");
    let rotation = process_number(deskew, "rotation_deg");
    assert!((-4.0..=-2.0).contains(&rotation), "rotation {rotation}");

    let denoise = applied(&outcome, "denoise");
    let strength = process_number(denoise, "strength");
    assert!((min_strength..=0.75).contains(&strength), "strength {strength}");

    let binarize = applied(&outcome, "binarize");
    let foreground = process_number(binarize, "foreground_ratio");
    assert!((0.03..=0.25).contains(&foreground), "foreground {foreground}");

    let out = outcome.image.as_ref().unwrap().as_gray().unwrap();
    assert!(out.as_raw().iter().all(|&v| v == 0 || v == 255));
    // The masked border and the rotation fill both end up as background.
    assert!((0..out.width()).all(|x| out.get_pixel(x, 0).0[0] == 255));
    assert!(out.width() > width && out.height() > height);

    assert!(outcome.pre_binarize.is_some());
}

#[test]
fn noisy_skewed_bordered_scan() {
    check_scan(400, 600, 8);
}

#[test]
#[ignore = "full page size; slow in debug builds"]
fn noisy_skewed_bordered_scan_full_size() {
    check_scan(2000, 3000, 40);
}
