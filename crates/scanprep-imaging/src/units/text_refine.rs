// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Speckle cleanup: erase connected ink fragments too small to be glyphs.
//
// The cleanup is rolled back when it would erase too large a share of the
// page's ink, since at that point the "specks" are most likely thin strokes
// or small print.

use image::GrayImage;
use scanprep_core::config::TextRefineConfig;
use scanprep_core::metadata;
use tracing::{debug, warn};

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::Components;
use crate::ops::threshold;
use crate::page::PageImage;

/// Local-threshold dynamic range used for the cleanup mask.
const DYNAMIC_RANGE: f32 = 128.0;

#[derive(Debug, Clone)]
pub struct TextRefine {
    cfg: TextRefineConfig,
}

impl TextRefine {
    pub fn new(cfg: TextRefineConfig) -> Self {
        Self { cfg }
    }

    fn is_speck(&self, area: u32) -> bool {
        area < self.cfg.speck_size
    }

    /// Binary page (0 = ink) that both the speck count and the cleanup
    /// work from.
    fn binarize(&self, gray: &GrayImage) -> GrayImage {
        threshold::sauvola(gray, self.cfg.window, self.cfg.k, DYNAMIC_RANGE)
    }
}

/// Invert a binary page (0 = ink) into an ink mask (255 = ink).
fn ink_of(binary: &GrayImage) -> GrayImage {
    let mut mask = binary.clone();
    for p in mask.iter_mut() {
        *p = if *p == 0 { 255 } else { 0 };
    }
    mask
}

/// Median grey level of the pixels the binary page calls paper.
fn paper_level(gray: &GrayImage, binary: &GrayImage) -> u8 {
    let mut hist = [0u64; 256];
    for (g, b) in gray.as_raw().iter().zip(binary.as_raw()) {
        if *b != 0 {
            hist[*g as usize] += 1;
        }
    }
    if hist.iter().all(|&c| c == 0) {
        return 255;
    }
    threshold::percentile(&hist, 0.5)
}

fn white_ratio(binary: &GrayImage) -> f64 {
    1.0 - threshold::foreground_ratio(binary)
}

impl ProcessingUnit for TextRefine {
    fn kind(&self) -> UnitKind {
        UnitKind::TextRefine
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let gray = image.luma();
        let ink = ink_of(&self.binarize(&gray));
        let ink_pixels = ink.as_raw().iter().filter(|&&v| v != 0).count();
        let ink_fraction = ink_pixels as f64 / ink.as_raw().len().max(1) as f64;
        if ink_fraction > 0.5 {
            let meta = metadata! { "ink_fraction" => ink_fraction };
            return DetectionResult::skip("ink_dominant", meta);
        }
        if ink_pixels == 0 {
            return DetectionResult::skip("no_ink", metadata!());
        }

        let comps = Components::label(&ink);
        let specks = comps.regions().iter().filter(|r| self.is_speck(r.area)).count();
        let ratio = specks as f64 / comps.len().max(1) as f64;
        let meta = metadata! {
            "components" => comps.len(),
            "speckles" => specks,
            "speckle_ratio" => ratio,
            "ink_fraction" => ink_fraction,
        };
        if specks > self.cfg.min_speckles as usize && ratio > self.cfg.speckle_ratio as f64 {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let gray = image.luma();
        let binary = self.binarize(&gray);
        let comps = Components::label(&ink_of(&binary));

        let total_ink: u64 = comps.regions().iter().map(|r| r.area as u64).sum();
        let speck_ink: u64 = comps
            .regions()
            .iter()
            .filter(|r| self.is_speck(r.area))
            .map(|r| r.area as u64)
            .sum();
        let ink_loss = speck_ink as f64 / total_ink.max(1) as f64;
        let pre_white = white_ratio(&binary);
        let post_white = pre_white + speck_ink as f64 / binary.as_raw().len().max(1) as f64;

        if ink_loss > self.cfg.max_ink_loss as f64 {
            warn!(ink_loss, "Speckle cleanup would erase too much ink; rolled back");
            return ProcessResult::reverted(
                image,
                metadata! {
                    "reverted_cleanup" => true,
                    "ink_loss" => ink_loss,
                    "pre_white_ratio" => pre_white,
                    "post_white_ratio" => post_white,
                },
            );
        }

        let specks = comps.mask_where(|r| self.is_speck(r.area));
        let paper = paper_level(&gray, &binary);
        debug!(speck_ink, paper, "Speckles removed");
        ProcessResult::applied(
            image.paint(&specks, paper),
            metadata! {
                "removed_pixels" => speck_ink as i64,
                "ink_loss" => ink_loss,
                "paper_level" => paper as u32,
                "pre_white_ratio" => pre_white,
                "post_white_ratio" => post_white,
            },
        )
    }
}
