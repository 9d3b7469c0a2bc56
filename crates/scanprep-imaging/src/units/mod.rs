// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processing units: detect-then-process stages run by the orchestrator.
//
// Every unit exposes exactly two operations. `detect` measures the current
// page and says whether the unit should act; `process` transforms the page
// and is only called after a positive `detect` on the same image, receiving
// that detection unchanged. Neither operation mutates its input. A unit that
// cannot complete hands back its input with `Reverted` or `Degraded` instead
// of failing.
//
// The always-on units (denoise, enhance, binarize) always detect positively;
// their `detect_meta.below_threshold` says whether a strict detector would
// have acted.

mod artifact_removal;
mod background;
mod binarize;
mod color_correction;
mod de_raster;
mod denoise;
mod deskew;
mod dots_removal;
mod edge_mask;
mod enhance;
mod guilloche;
mod hologram;
mod mrz;
mod orientation;
mod perspective;
mod sharpen;
mod smooth;
mod text_refine;
mod watermark;

use scanprep_backend::Backend;
use scanprep_core::config::PipelineConfig;
use scanprep_core::types::{
    DocumentProfile, MetaValue, Metadata, OrientationHint, SecurityFeature, UnitOutcome,
};

use crate::page::PageImage;
use crate::probe::{ImageStats, StatsCache};

pub use artifact_removal::ArtifactRemoval;
pub use background::BackgroundClean;
pub use binarize::Binarize;
pub use color_correction::ColorCorrection;
pub use de_raster::DeRaster;
pub use denoise::Denoise;
pub use deskew::Deskew;
pub use dots_removal::DotsRemoval;
pub use edge_mask::EdgeMask;
pub use enhance::Enhance;
pub use guilloche::GuillocheRemoval;
pub use hologram::HologramRemoval;
pub use mrz::{MrzEnhancement, MrzLayout, MrzMiss};
pub use orientation::Orientation;
pub use perspective::Perspective;
pub use sharpen::Sharpen;
pub use smooth::Smooth;
pub use text_refine::TextRefine;
pub use watermark::WatermarkRemoval;

// -- Results ------------------------------------------------------------------

/// Outcome of `detect`. Immutable once produced.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    pub should_process: bool,
    pub metadata: Metadata,
}

impl DetectionResult {
    /// Positive detection carrying the measurements `process` relies on.
    pub fn run(metadata: Metadata) -> Self {
        Self {
            should_process: true,
            metadata,
        }
    }

    /// Negative detection with a `reason` and any measurements taken.
    pub fn skip(reason: &str, mut metadata: Metadata) -> Self {
        metadata.insert("reason".into(), MetaValue::from(reason));
        Self {
            should_process: false,
            metadata,
        }
    }

    pub fn reason(&self) -> Option<&str> {
        self.metadata.get("reason").and_then(MetaValue::as_str)
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.metadata.get(key).and_then(MetaValue::as_f64)
    }

    pub fn flag(&self, key: &str) -> bool {
        self.metadata
            .get(key)
            .and_then(MetaValue::as_bool)
            .unwrap_or(false)
    }
}

/// Outcome of `process`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessResult {
    /// The new page, or the untouched input for `Reverted`/`Degraded`.
    pub image: PageImage,
    pub metadata: Metadata,
    pub outcome: UnitOutcome,
    /// The page dimensions or content placement changed.
    pub geometry_changed: bool,
}

impl ProcessResult {
    pub fn applied(image: PageImage, metadata: Metadata) -> Self {
        Self {
            image,
            metadata,
            outcome: UnitOutcome::Applied,
            geometry_changed: false,
        }
    }

    pub fn applied_geometry(image: PageImage, metadata: Metadata) -> Self {
        Self {
            geometry_changed: true,
            ..Self::applied(image, metadata)
        }
    }

    /// The transform failed its own safety check and was discarded.
    pub fn reverted(input: &PageImage, mut metadata: Metadata) -> Self {
        metadata.insert("reverted".into(), MetaValue::Bool(true));
        Self {
            image: input.clone(),
            metadata,
            outcome: UnitOutcome::Reverted,
            geometry_changed: false,
        }
    }

    /// A required input was missing, so nothing was done.
    pub fn degraded(input: &PageImage, reason: &str, mut metadata: Metadata) -> Self {
        metadata.insert("reason".into(), MetaValue::from(reason));
        Self {
            image: input.clone(),
            metadata,
            outcome: UnitOutcome::Degraded,
            geometry_changed: false,
        }
    }

    pub fn is_applied(&self) -> bool {
        self.outcome == UnitOutcome::Applied
    }
}

// -- Context ------------------------------------------------------------------

/// Read-only view of the page context handed to every unit call.
#[derive(Clone, Copy)]
pub struct UnitContext<'a> {
    pub backend: &'a dyn Backend,
    pub stats: &'a StatsCache,
    pub profile: &'a DocumentProfile,
    pub orientation_hint: Option<OrientationHint>,
}

impl<'a> UnitContext<'a> {
    /// Shared statistics for the current page geometry.
    pub fn stats(&self, image: &PageImage) -> &'a ImageStats {
        self.stats.get_or_measure(image, self.backend)
    }
}

// -- Unit interface -----------------------------------------------------------

/// The detect/process contract shared by every unit.
pub trait ProcessingUnit {
    fn kind(&self) -> UnitKind;

    fn name(&self) -> &'static str {
        self.kind().name()
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult;

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult;
}

/// Stable identifiers for every unit variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    EdgeMask,
    Orientation,
    Perspective,
    Deskew,
    DeRaster,
    Denoise,
    BackgroundClean,
    Enhance,
    TextRefine,
    DotsRemoval,
    Sharpen,
    Smooth,
    ColorCorrection,
    ArtifactRemoval,
    Binarize,
    GuillocheRemoval,
    WatermarkRemoval,
    HologramRemoval,
    MrzEnhancement,
}

impl UnitKind {
    pub const ALL: [UnitKind; 19] = [
        Self::EdgeMask,
        Self::Orientation,
        Self::Perspective,
        Self::Deskew,
        Self::DeRaster,
        Self::Denoise,
        Self::BackgroundClean,
        Self::Enhance,
        Self::TextRefine,
        Self::DotsRemoval,
        Self::Sharpen,
        Self::Smooth,
        Self::ColorCorrection,
        Self::ArtifactRemoval,
        Self::Binarize,
        Self::GuillocheRemoval,
        Self::WatermarkRemoval,
        Self::HologramRemoval,
        Self::MrzEnhancement,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::EdgeMask => "edge_mask",
            Self::Orientation => "orientation",
            Self::Perspective => "perspective",
            Self::Deskew => "deskew",
            Self::DeRaster => "de_raster",
            Self::Denoise => "denoise",
            Self::BackgroundClean => "background_clean",
            Self::Enhance => "enhance",
            Self::TextRefine => "text_refine",
            Self::DotsRemoval => "dots_removal",
            Self::Sharpen => "sharpen",
            Self::Smooth => "smooth",
            Self::ColorCorrection => "color_correction",
            Self::ArtifactRemoval => "artifact_removal",
            Self::Binarize => "binarize",
            Self::GuillocheRemoval => "guilloche_removal",
            Self::WatermarkRemoval => "watermark_removal",
            Self::HologramRemoval => "hologram_removal",
            Self::MrzEnhancement => "mrz_enhancement",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }

    /// Units that strip a security feature from the page.
    pub fn is_feature_removal(&self) -> bool {
        self.removes().is_some()
    }

    /// The security feature this unit removes, if any.
    pub fn removes(&self) -> Option<SecurityFeature> {
        match self {
            Self::GuillocheRemoval => Some(SecurityFeature::Guilloche),
            Self::WatermarkRemoval => Some(SecurityFeature::Watermark),
            Self::HologramRemoval => Some(SecurityFeature::Hologram),
            _ => None,
        }
    }

    /// Build this unit with its settings from `config`.
    pub fn build(&self, config: &PipelineConfig) -> Unit {
        match self {
            Self::EdgeMask => Unit::EdgeMask(EdgeMask::new(config.edge_mask.clone())),
            Self::Orientation => Unit::Orientation(Orientation::new(config.orientation.clone())),
            Self::Perspective => Unit::Perspective(Perspective::new(config.perspective.clone())),
            Self::Deskew => Unit::Deskew(Deskew::standard(config.deskew.clone())),
            Self::DeRaster => Unit::DeRaster(DeRaster::new(config.de_raster.clone())),
            Self::Denoise => Unit::Denoise(Denoise::new(config.denoise.clone())),
            Self::BackgroundClean => {
                Unit::BackgroundClean(BackgroundClean::new(config.background.clone()))
            }
            Self::Enhance => Unit::Enhance(Enhance::new(config.enhance.clone())),
            Self::TextRefine => Unit::TextRefine(TextRefine::new(config.text_refine.clone())),
            Self::DotsRemoval => Unit::DotsRemoval(DotsRemoval::new(config.dots.clone())),
            Self::Sharpen => Unit::Sharpen(Sharpen::new(config.sharpen.clone())),
            Self::Smooth => Unit::Smooth(Smooth::new(config.smooth.clone())),
            Self::ColorCorrection => {
                Unit::ColorCorrection(ColorCorrection::new(config.color_correction.clone()))
            }
            Self::ArtifactRemoval => {
                Unit::ArtifactRemoval(ArtifactRemoval::new(config.artifacts.clone()))
            }
            Self::Binarize => Unit::Binarize(Binarize::new(config.binarize.clone())),
            Self::GuillocheRemoval => {
                Unit::GuillocheRemoval(GuillocheRemoval::new(config.guilloche.clone()))
            }
            Self::WatermarkRemoval => {
                Unit::WatermarkRemoval(WatermarkRemoval::new(config.watermark.clone()))
            }
            Self::HologramRemoval => {
                Unit::HologramRemoval(HologramRemoval::new(config.hologram.clone()))
            }
            Self::MrzEnhancement => Unit::MrzEnhancement(MrzEnhancement::new(config.mrz.clone())),
        }
    }
}

impl std::fmt::Display for UnitKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Closed set of unit variants, dispatched statically.
#[derive(Debug, Clone)]
pub enum Unit {
    EdgeMask(EdgeMask),
    Orientation(Orientation),
    Perspective(Perspective),
    Deskew(Deskew),
    DeRaster(DeRaster),
    Denoise(Denoise),
    BackgroundClean(BackgroundClean),
    Enhance(Enhance),
    TextRefine(TextRefine),
    DotsRemoval(DotsRemoval),
    Sharpen(Sharpen),
    Smooth(Smooth),
    ColorCorrection(ColorCorrection),
    ArtifactRemoval(ArtifactRemoval),
    Binarize(Binarize),
    GuillocheRemoval(GuillocheRemoval),
    WatermarkRemoval(WatermarkRemoval),
    HologramRemoval(HologramRemoval),
    MrzEnhancement(MrzEnhancement),
}

macro_rules! dispatch {
    ($unit:expr, $inner:ident => $call:expr) => {
        match $unit {
            Unit::EdgeMask($inner) => $call,
            Unit::Orientation($inner) => $call,
            Unit::Perspective($inner) => $call,
            Unit::Deskew($inner) => $call,
            Unit::DeRaster($inner) => $call,
            Unit::Denoise($inner) => $call,
            Unit::BackgroundClean($inner) => $call,
            Unit::Enhance($inner) => $call,
            Unit::TextRefine($inner) => $call,
            Unit::DotsRemoval($inner) => $call,
            Unit::Sharpen($inner) => $call,
            Unit::Smooth($inner) => $call,
            Unit::ColorCorrection($inner) => $call,
            Unit::ArtifactRemoval($inner) => $call,
            Unit::Binarize($inner) => $call,
            Unit::GuillocheRemoval($inner) => $call,
            Unit::WatermarkRemoval($inner) => $call,
            Unit::HologramRemoval($inner) => $call,
            Unit::MrzEnhancement($inner) => $call,
        }
    };
}

impl ProcessingUnit for Unit {
    fn kind(&self) -> UnitKind {
        dispatch!(self, u => u.kind())
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        dispatch!(self, u => u.detect(image, ctx))
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        dispatch!(self, u => u.process(image, detection, ctx))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use scanprep_backend::CpuBackend;

    /// Run `f` with a fresh context over a generic profile and no hint.
    pub fn with_ctx<R>(f: impl FnOnce(&UnitContext<'_>) -> R) -> R {
        with_ctx_hint(None, f)
    }

    pub fn with_ctx_hint<R>(
        hint: Option<OrientationHint>,
        f: impl FnOnce(&UnitContext<'_>) -> R,
    ) -> R {
        let stats = StatsCache::default();
        let profile = DocumentProfile::generic();
        let ctx = UnitContext {
            backend: &CpuBackend,
            stats: &stats,
            profile: &profile,
            orientation_hint: hint,
        };
        f(&ctx)
    }

    /// Detect, then process only on a positive detection.
    pub fn run_unit(
        unit: &impl ProcessingUnit,
        image: &PageImage,
    ) -> (DetectionResult, Option<ProcessResult>) {
        with_ctx(|ctx| {
            let detection = unit.detect(image, ctx);
            let processed = detection
                .should_process
                .then(|| unit.process(image, &detection, ctx));
            (detection, processed)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_the_registry() {
        for kind in UnitKind::ALL {
            assert_eq!(UnitKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.build(&PipelineConfig::default()).kind(), kind);
        }
        assert_eq!(UnitKind::from_name("language"), None);
    }

    #[test]
    fn only_three_units_remove_features() {
        let removal: Vec<_> = UnitKind::ALL
            .into_iter()
            .filter(UnitKind::is_feature_removal)
            .collect();
        assert_eq!(
            removal,
            vec![
                UnitKind::GuillocheRemoval,
                UnitKind::WatermarkRemoval,
                UnitKind::HologramRemoval
            ]
        );
    }

    #[test]
    fn skip_records_reason() {
        let d = DetectionResult::skip("below_threshold", Metadata::new());
        assert!(!d.should_process);
        assert_eq!(d.reason(), Some("below_threshold"));
    }
}
