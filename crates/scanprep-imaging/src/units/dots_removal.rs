// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background dot removal for halftone screens and dot-matrix noise.
//
// Dots are small ink components inside a size band, counted on a fixed
// light threshold so faint screens are seen too. The page qualifies when
// there are many dots or when they are dense. Cleanup paints the dots with
// the paper level and is rolled back when it would take too much of the ink.

use image::GrayImage;
use scanprep_core::config::DotsConfig;
use scanprep_core::metadata;
use tracing::{debug, warn};

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::{Components, Region};
use crate::ops::threshold;
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct DotsRemoval {
    cfg: DotsConfig,
}

impl DotsRemoval {
    pub fn new(cfg: DotsConfig) -> Self {
        Self { cfg }
    }

    fn is_dot(&self, region: &Region) -> bool {
        region.area > self.cfg.min_dot_area && region.area < self.cfg.max_dot_area
    }

    fn components(&self, gray: &GrayImage) -> Components {
        Components::label(&threshold::ink_mask(gray, self.cfg.ink_level))
    }
}

impl ProcessingUnit for DotsRemoval {
    fn kind(&self) -> UnitKind {
        UnitKind::DotsRemoval
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let comps = self.components(&image.luma());
        if comps.is_empty() {
            return DetectionResult::skip("no_ink", metadata!());
        }
        let dots = comps.regions().iter().filter(|r| self.is_dot(r)).count();
        let blocks = (image.width() as f64 * image.height() as f64 / 10_000.0).max(1.0);
        let density = dots as f64 / blocks;
        let meta = metadata! {
            "dots" => dots,
            "dot_density" => density,
            "components" => comps.len(),
        };
        if dots > self.cfg.min_dots as usize || density > self.cfg.min_density as f64 {
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
        let comps = self.components(&gray);
        let total_ink: u64 = comps.regions().iter().map(|r| r.area as u64).sum();
        let dot_ink: u64 = comps
            .regions()
            .iter()
            .filter(|r| self.is_dot(r))
            .map(|r| r.area as u64)
            .sum();
        let ink_loss = dot_ink as f64 / total_ink.max(1) as f64;
        if ink_loss > self.cfg.max_ink_loss as f64 {
            warn!(ink_loss, "Dot removal would erase too much ink; rolled back");
            return ProcessResult::reverted(image, metadata! { "ink_loss" => ink_loss });
        }

        let mut hist = threshold::histogram(&gray);
        for level in hist.iter_mut().take(self.cfg.ink_level as usize + 1) {
            *level = 0;
        }
        let paper = if hist.iter().all(|&c| c == 0) {
            255
        } else {
            threshold::percentile(&hist, 0.5)
        };

        debug!(dot_ink, paper, "Background dots removed");
        ProcessResult::applied(
            image.paint(&comps.mask_where(|r| self.is_dot(r)), paper),
            metadata! {
                "removed_pixels" => dot_ink as i64,
                "ink_loss" => ink_loss,
                "paper_level" => paper as u32,
            },
        )
    }
}
