// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Form raster removal: ruling grids and stamps.
//
// Ruling lines are the ink that survives an opening with a long horizontal
// or vertical line and stays thin. Glyph strokes are too short to pass and
// the chords of a round stamp are too thick. Stamps are compact ink blobs
// much larger than a glyph. Both are rebuilt from the surrounding paper, so
// text crossing a rule keeps its strokes on either side.

use image::GrayImage;
use scanprep_core::config::DeRasterConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::{Components, Region};
use crate::ops::morph::{self, Axis};
use crate::ops::threshold;
use crate::page::PageImage;

/// A ruling line is at least this many times longer than it is thick.
const RULE_ASPECT: u32 = 8;

#[derive(Debug, Clone)]
pub struct DeRaster {
    cfg: DeRasterConfig,
}

struct Raster {
    rules: GrayImage,
    rule_count: usize,
    stamps: Vec<Region>,
    ink: Components,
}

impl DeRaster {
    pub fn new(cfg: DeRasterConfig) -> Self {
        Self { cfg }
    }

    fn is_stamp(&self, region: &Region) -> bool {
        let (w, h) = (region.width(), region.height());
        (self.cfg.stamp_min_area..=self.cfg.stamp_max_area).contains(&region.area)
            && w.min(h) >= self.cfg.stamp_min_side
            && w.max(h) <= 3 * w.min(h)
    }

    fn measure(&self, gray: &GrayImage) -> Raster {
        let ink = threshold::ink_mask(gray, threshold::otsu_threshold(gray));
        let radius = self.cfg.min_rule_length / 2;
        let (horizontal, across) = rule_lines(&morph::open_line(&ink, radius, Axis::Horizontal));
        let (vertical, down) = rule_lines(&morph::open_line(&ink, radius, Axis::Vertical));
        let rule_count = across + down;

        let mut rules = horizontal;
        for (r, v) in rules.iter_mut().zip(vertical.as_raw()) {
            *r = (*r).max(*v);
        }

        // Stamps are judged on the ink that is left once the rules are gone,
        // otherwise a grid would merge into one giant component.
        let mut residual = ink;
        for (p, r) in residual.iter_mut().zip(rules.as_raw()) {
            if *r != 0 {
                *p = 0;
            }
        }
        let ink = Components::label(&residual);
        let stamps = ink.regions().iter().copied().filter(|r| self.is_stamp(r)).collect();
        Raster {
            rules,
            rule_count,
            stamps,
            ink,
        }
    }
}

/// Thin components of a line-opened ink mask, and how many there are.
fn rule_lines(opened: &GrayImage) -> (GrayImage, usize) {
    let comps = Components::label(opened);
    let is_rule = |r: &Region| r.width().max(r.height()) >= RULE_ASPECT * r.width().min(r.height());
    let count = comps.regions().iter().filter(|r| is_rule(r)).count();
    (comps.mask_where(is_rule), count)
}

impl ProcessingUnit for DeRaster {
    fn kind(&self) -> UnitKind {
        UnitKind::DeRaster
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let raster = self.measure(&image.luma());
        let has_grid = raster.rule_count >= self.cfg.min_rules as usize;
        let has_stamps = raster.stamps.len() >= self.cfg.min_stamps as usize;
        let meta = metadata! {
            "rules" => raster.rule_count,
            "stamps" => raster.stamps.len(),
            "has_grid" => has_grid,
            "has_stamps" => has_stamps,
        };
        if has_grid || has_stamps {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let raster = self.measure(&image.luma());
        let mut mask = GrayImage::new(image.width(), image.height());
        if detection.flag("has_grid") {
            mask = raster.rules.clone();
        }
        if detection.flag("has_stamps") {
            let stamps = raster.ink.mask_where(|r| self.is_stamp(r));
            for (m, s) in mask.iter_mut().zip(stamps.as_raw()) {
                *m = (*m).max(*s);
            }
        }
        // Grow by one pixel so the anti-aliased rim goes too.
        let mask = morph::dilate(&mask, 1);
        let filled = mask.as_raw().iter().filter(|&&m| m != 0).count();

        debug!(filled, rules = raster.rule_count, stamps = raster.stamps.len(), "Raster removed");
        ProcessResult::applied(
            image.inpaint(&mask),
            metadata! {
                "inpainted_pixels" => filled,
                "grid_removed" => detection.flag("has_grid"),
                "stamps_removed" => detection.flag("has_stamps"),
            },
        )
    }
}
