// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive contrast enhancement: CLAHE followed by an unsharp mask, both
// weaker on pages that already have good contrast.

use image::GrayImage;
use scanprep_core::config::EnhanceConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::clahe::clahe;
use crate::ops::threshold;
use crate::page::PageImage;
use crate::probe::tone;
use crate::strength;

/// Sigma of the blur the unsharp mask subtracts.
const UNSHARP_SIGMA: f32 = 1.0;

#[derive(Debug, Clone)]
pub struct Enhance {
    cfg: EnhanceConfig,
}

impl Enhance {
    pub fn new(cfg: EnhanceConfig) -> Self {
        Self { cfg }
    }
}

/// `amount * sharp - (amount - 1) * blurred`, clamped to 8 bits.
fn unsharp(sharp: &GrayImage, blurred: &GrayImage, amount: f32) -> GrayImage {
    let mut out = sharp.clone();
    for (p, b) in out.iter_mut().zip(blurred.as_raw()) {
        let v = amount * *p as f32 - (amount - 1.0) * *b as f32;
        *p = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

impl ProcessingUnit for Enhance {
    fn kind(&self) -> UnitKind {
        UnitKind::Enhance
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let contrast = ctx.stats(image).contrast_std;
        let low_contrast = contrast < self.cfg.contrast_threshold;
        DetectionResult::run(metadata! {
            "contrast_std" => contrast,
            "low_contrast" => low_contrast,
            "below_threshold" => !low_contrast,
        })
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let contrast = match detection.number("contrast_std") {
            Some(c) => c as f32,
            None => ctx.stats(image).contrast_std,
        };
        let clip_limit = strength::clahe_clip_limit(contrast, &self.cfg);
        let amount = strength::unsharp_amount(contrast, &self.cfg);

        let equalised = clahe(&image.luma(), clip_limit, self.cfg.tiles);
        let blurred = ctx.backend.gaussian_blur(&equalised, UNSHARP_SIGMA);
        let sharpened = unsharp(&equalised, &blurred, amount);
        let (_, contrast_after) = tone(&threshold::histogram(&sharpened));

        debug!(clip_limit, amount, contrast, contrast_after, "Contrast enhanced");
        ProcessResult::applied(
            image.with_luma(&sharpened),
            metadata! {
                "clip_limit" => clip_limit,
                "unsharp_amount" => amount,
                "contrast_after" => contrast_after,
            },
        )
    }
}
