// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unit selection: one fixed template per mode, filtered by the document
// profile and the configuration switches.
//
//   preserve  edge_mask, orientation, deskew (conservative)
//   default   edge_mask, orientation, perspective, deskew, [de_raster],
//             denoise, background_clean, enhance, text_refine,
//             [dots_removal, sharpen, smooth, color_correction,
//             artifact_removal], binarize
//   remove    mrz_enhancement (when a zone was found),
//             edge_mask, orientation, perspective, deskew,
//             guilloche_removal, watermark_removal, hologram_removal
//             (each only for a detected feature),
//             then the default tail from de_raster on
//
// Bracketed units are opt-in and off unless their switch is set. Feature-
// removal units never appear in a preserve or default plan, whatever the
// profile says.

use scanprep_core::config::PipelineConfig;
use scanprep_core::types::{DocumentProfile, PipelineMode, SecurityFeature};
use scanprep_imaging::units::Deskew;
use scanprep_imaging::{Unit, UnitKind};

/// Removal units in execution order.
const REMOVAL_ORDER: [UnitKind; 3] = [
    UnitKind::GuillocheRemoval,
    UnitKind::WatermarkRemoval,
    UnitKind::HologramRemoval,
];

/// The ordered unit kinds a run with `config` applies to a document with
/// `profile`.
pub fn plan_kinds(config: &PipelineConfig, profile: &DocumentProfile) -> Vec<UnitKind> {
    let mut kinds = Vec::with_capacity(UnitKind::ALL.len());

    if config.mode == PipelineMode::Remove && profile.has(SecurityFeature::MachineReadableZone) {
        kinds.push(UnitKind::MrzEnhancement);
    }

    kinds.push(UnitKind::EdgeMask);
    kinds.push(UnitKind::Orientation);
    if config.mode != PipelineMode::Preserve {
        kinds.push(UnitKind::Perspective);
    }
    if config.deskew_enabled {
        kinds.push(UnitKind::Deskew);
    }
    if config.mode == PipelineMode::Preserve {
        return kinds;
    }

    if config.mode == PipelineMode::Remove {
        kinds.extend(
            REMOVAL_ORDER
                .into_iter()
                .filter(|k| k.removes().is_some_and(|f| profile.has(f))),
        );
    }

    if config.de_raster_enabled {
        kinds.push(UnitKind::DeRaster);
    }
    if config.noise_reduction {
        kinds.push(UnitKind::Denoise);
    }
    if config.background_clean {
        kinds.push(UnitKind::BackgroundClean);
    }
    if config.contrast_enhancement {
        kinds.push(UnitKind::Enhance);
    }
    kinds.push(UnitKind::TextRefine);
    let opt_in = [
        (config.dots_removal_enabled, UnitKind::DotsRemoval),
        (config.sharpen_enabled, UnitKind::Sharpen),
        (config.smooth_enabled, UnitKind::Smooth),
        (config.color_correction_enabled, UnitKind::ColorCorrection),
        (config.artifact_removal_enabled, UnitKind::ArtifactRemoval),
    ];
    kinds.extend(opt_in.into_iter().filter(|(on, _)| *on).map(|(_, kind)| kind));
    if config.allow_binarization {
        kinds.push(UnitKind::Binarize);
    }
    kinds
}

/// Build the units of [`plan_kinds`], configured for this run.
pub fn plan(config: &PipelineConfig, profile: &DocumentProfile) -> Vec<Unit> {
    plan_kinds(config, profile)
        .into_iter()
        .map(|kind| match (kind, config.mode) {
            (UnitKind::Deskew, PipelineMode::Preserve) => {
                Unit::Deskew(Deskew::conservative(config.deskew.clone()))
            }
            _ => kind.build(config),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scanprep_imaging::ProcessingUnit;

    fn everything() -> DocumentProfile {
        SecurityFeature::ALL
            .into_iter()
            .fold(DocumentProfile::generic(), |p, f| p.with_feature(f, 0.9))
    }

    fn config(mode: PipelineMode) -> PipelineConfig {
        PipelineConfig::for_mode(mode)
    }

    #[test]
    fn preserve_keeps_only_gentle_geometry() {
        let kinds = plan_kinds(&config(PipelineMode::Preserve), &everything());
        assert_eq!(
            kinds,
            vec![UnitKind::EdgeMask, UnitKind::Orientation, UnitKind::Deskew]
        );
    }

    #[test]
    fn preserve_deskew_is_conservative() {
        let cfg = config(PipelineMode::Preserve);
        let units = plan(&cfg, &everything());
        let Some(Unit::Deskew(deskew)) = units.iter().find(|u| u.kind() == UnitKind::Deskew)
        else {
            panic!("no deskew in preserve plan");
        };
        assert_eq!(deskew.min_angle_deg(), cfg.deskew.conservative_min_angle_deg);
    }

    #[test]
    fn default_never_removes_features() {
        let kinds = plan_kinds(&config(PipelineMode::Default), &everything());
        assert!(!kinds.iter().any(UnitKind::is_feature_removal));
        assert!(!kinds.contains(&UnitKind::MrzEnhancement));
        assert_eq!(kinds.last(), Some(&UnitKind::Binarize));
        let geometry = [
            UnitKind::EdgeMask,
            UnitKind::Orientation,
            UnitKind::Perspective,
            UnitKind::Deskew,
        ];
        assert_eq!(kinds[..4], geometry);
    }

    #[test]
    fn remove_orders_removals_and_puts_mrz_first() {
        let kinds = plan_kinds(&config(PipelineMode::Remove), &everything());
        assert_eq!(kinds[0], UnitKind::MrzEnhancement);
        let removals: Vec<_> = kinds.iter().copied().filter(UnitKind::is_feature_removal).collect();
        assert_eq!(removals, REMOVAL_ORDER.to_vec());

        let deskew = kinds.iter().position(|k| *k == UnitKind::Deskew).unwrap();
        let guilloche = kinds.iter().position(|k| *k == UnitKind::GuillocheRemoval).unwrap();
        let denoise = kinds.iter().position(|k| *k == UnitKind::Denoise).unwrap();
        assert!(deskew < guilloche && guilloche < denoise);
    }

    #[test]
    fn remove_only_targets_detected_features() {
        let profile = DocumentProfile::generic().with_feature(SecurityFeature::Watermark, 0.7);
        let kinds = plan_kinds(&config(PipelineMode::Remove), &profile);
        let removals: Vec<_> = kinds.iter().copied().filter(UnitKind::is_feature_removal).collect();
        assert_eq!(removals, vec![UnitKind::WatermarkRemoval]);
        assert_ne!(kinds[0], UnitKind::MrzEnhancement);
    }

    fn with_every_opt_in(mode: PipelineMode) -> PipelineConfig {
        PipelineConfig {
            de_raster_enabled: true,
            dots_removal_enabled: true,
            sharpen_enabled: true,
            smooth_enabled: true,
            color_correction_enabled: true,
            artifact_removal_enabled: true,
            ..config(mode)
        }
    }

    #[test]
    fn opt_in_units_are_off_by_default() {
        let kinds = plan_kinds(&config(PipelineMode::Default), &everything());
        for kind in [
            UnitKind::DeRaster,
            UnitKind::DotsRemoval,
            UnitKind::Sharpen,
            UnitKind::Smooth,
            UnitKind::ColorCorrection,
            UnitKind::ArtifactRemoval,
        ] {
            assert!(!kinds.contains(&kind), "{kind} planned without its switch");
        }
    }

    #[test]
    fn opt_in_units_follow_the_stage_order() {
        let kinds = plan_kinds(&with_every_opt_in(PipelineMode::Default), &everything());
        assert_eq!(
            kinds,
            vec![
                UnitKind::EdgeMask,
                UnitKind::Orientation,
                UnitKind::Perspective,
                UnitKind::Deskew,
                UnitKind::DeRaster,
                UnitKind::Denoise,
                UnitKind::Enhance,
                UnitKind::TextRefine,
                UnitKind::DotsRemoval,
                UnitKind::Sharpen,
                UnitKind::Smooth,
                UnitKind::ColorCorrection,
                UnitKind::ArtifactRemoval,
                UnitKind::Binarize,
            ]
        );

        let remove = plan_kinds(&with_every_opt_in(PipelineMode::Remove), &everything());
        let hologram = remove.iter().position(|k| *k == UnitKind::HologramRemoval).unwrap();
        let de_raster = remove.iter().position(|k| *k == UnitKind::DeRaster).unwrap();
        assert_eq!(de_raster, hologram + 1);
    }

    #[test]
    fn preserve_ignores_opt_in_switches() {
        let kinds = plan_kinds(&with_every_opt_in(PipelineMode::Preserve), &everything());
        assert_eq!(
            kinds,
            vec![UnitKind::EdgeMask, UnitKind::Orientation, UnitKind::Deskew]
        );
    }

    #[test]
    fn switches_drop_optional_units() {
        let mut cfg = config(PipelineMode::Default);
        cfg.deskew_enabled = false;
        cfg.noise_reduction = false;
        cfg.contrast_enhancement = false;
        cfg.allow_binarization = false;
        cfg.background_clean = true;
        let kinds = plan_kinds(&cfg, &DocumentProfile::generic());
        assert_eq!(
            kinds,
            vec![
                UnitKind::EdgeMask,
                UnitKind::Orientation,
                UnitKind::Perspective,
                UnitKind::BackgroundClean,
                UnitKind::TextRefine,
            ]
        );
    }
}
