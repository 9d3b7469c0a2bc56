// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Mode enforcement: feature-removal units only ever run in remove mode, and
// there exactly once per detected feature.

mod common;

use image::{DynamicImage, Rgb, RgbImage};
use scanprep_core::config::PipelineConfig;
use scanprep_core::types::{DocumentProfile, DocumentType, PipelineMode, SecurityFeature};
use scanprep_imaging::UnitKind;
use scanprep_pipeline::{CancellationToken, PageInput, Pipeline};

fn flagged_profile() -> DocumentProfile {
    DocumentProfile::generic()
        .with_feature(SecurityFeature::Guilloche, 0.9)
        .with_feature(SecurityFeature::Watermark, 0.9)
        .with_feature(SecurityFeature::Hologram, 0.9)
}

fn run(mode: PipelineMode, profile: &DocumentProfile) -> Vec<String> {
    let pipeline = Pipeline::new(PipelineConfig::for_mode(mode)).unwrap();
    let input = common::page(common::clean_text_page(240, 320));
    let outcome = pipeline.run_page(0, input, profile, None);
    assert!(!outcome.is_failed());
    outcome.report.units.into_iter().map(|u| u.module).collect()
}

fn is_removal(module: &str) -> bool {
    UnitKind::from_name(module).is_some_and(|k| k.is_feature_removal())
}

#[test]
fn preserve_never_runs_removal_units() {
    common::init_tracing();
    let modules = run(PipelineMode::Preserve, &flagged_profile());
    assert!(!modules.is_empty());
    assert!(!modules.iter().any(|m| is_removal(m)), "{modules:?}");
}

#[test]
fn default_never_runs_removal_units() {
    let modules = run(PipelineMode::Default, &flagged_profile());
    assert!(!modules.iter().any(|m| is_removal(m)), "{modules:?}");
    assert!(!modules.iter().any(|m| m == "mrz_enhancement"));
}

#[test]
fn remove_runs_each_flagged_removal_exactly_once() {
    let modules = run(PipelineMode::Remove, &flagged_profile());
    for name in ["guilloche_removal", "watermark_removal", "hologram_removal"] {
        let count = modules.iter().filter(|m| *m == name).count();
        assert_eq!(count, 1, "{name} in {modules:?}");
    }
    assert!(!modules.iter().any(|m| m == "mrz_enhancement"));
}

#[test]
fn remove_skips_removals_for_absent_features() {
    let profile = DocumentProfile::generic().with_feature(SecurityFeature::Hologram, 0.8);
    let modules = run(PipelineMode::Remove, &profile);
    let removals: Vec<_> = modules.iter().filter(|m| is_removal(m)).collect();
    assert_eq!(removals, ["hologram_removal"]);
}

#[test]
fn remove_puts_mrz_enhancement_first() {
    let profile = flagged_profile().with_feature(SecurityFeature::MachineReadableZone, 0.9);
    let modules = run(PipelineMode::Remove, &profile);
    assert_eq!(modules[0], "mrz_enhancement");
    assert_eq!(modules.iter().filter(|m| *m == "mrz_enhancement").count(), 1);
}

/// Passport-like page: two MRZ lines near the bottom and a row of specular
/// highlights near the top.
fn passport() -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(426, 300, |x, y| {
        let line = (250..262).contains(&y) || (272..284).contains(&y);
        let glyph = line && (20..406).contains(&x) && (x - 20) % 7 < 5;
        let glare = (40..48).contains(&y) && (20..200).contains(&x) && (x - 20) % 30 < 8;
        if glyph {
            Rgb([30, 30, 30])
        } else if glare {
            Rgb([252, 252, 252])
        } else {
            Rgb([220, 210, 180])
        }
    }))
}

#[test]
fn classified_travel_document_in_remove_mode() {
    common::init_tracing();
    let pipeline = Pipeline::new(PipelineConfig::for_mode(PipelineMode::Remove)).unwrap();
    let outcome = pipeline
        .run_document(vec![PageInput::new(passport())], &CancellationToken::new())
        .unwrap();
    let report = &outcome.report;

    assert_eq!(report.profile.document_type, DocumentType::TravelDocument);
    assert!(report.profile.risk_flag);
    assert!(report.compliance_warning.is_some());

    let modules: Vec<_> = report.pages[0].units.iter().map(|u| u.module.as_str()).collect();
    assert_eq!(modules[0], "mrz_enhancement");
    assert_eq!(modules.iter().filter(|m| **m == "hologram_removal").count(), 1);
}

#[test]
fn classified_travel_document_in_default_mode_keeps_features() {
    let pipeline = Pipeline::new(PipelineConfig::for_mode(PipelineMode::Default)).unwrap();
    let outcome = pipeline
        .run_document(vec![PageInput::new(passport())], &CancellationToken::new())
        .unwrap();
    let report = &outcome.report;

    assert!(report.profile.risk_flag);
    assert!(report.compliance_warning.is_none());
    assert!(!report.unit_reports().any(|u| is_removal(&u.module)));
}
