// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Edge sharpening for soft scans: an unsharp pass restores stroke edges,
// then a second high-pass pass brings back fine detail.

use image::GrayImage;
use scanprep_core::config::SharpenConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::page::PageImage;
use crate::probe::laplacian_variance;

#[derive(Debug, Clone)]
pub struct Sharpen {
    cfg: SharpenConfig,
}

impl Sharpen {
    pub fn new(cfg: SharpenConfig) -> Self {
        Self { cfg }
    }
}

/// `gray + weight * (gray - blurred)`, clamped to 8 bits.
fn add_high_pass(gray: &GrayImage, blurred: &GrayImage, weight: f32) -> GrayImage {
    let mut out = gray.clone();
    for (p, b) in out.iter_mut().zip(blurred.as_raw()) {
        let v = *p as f32 + weight * (*p as f32 - *b as f32);
        *p = v.round().clamp(0.0, 255.0) as u8;
    }
    out
}

impl ProcessingUnit for Sharpen {
    fn kind(&self) -> UnitKind {
        UnitKind::Sharpen
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let stats = ctx.stats(image);
        let meta = metadata! {
            "sharpness" => stats.sharpness,
            "contrast_std" => stats.contrast_std,
        };
        if stats.contrast_std < self.cfg.min_contrast {
            return DetectionResult::skip("no_content", meta);
        }
        if stats.sharpness < self.cfg.blur_threshold {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let gray = image.luma();
        let edges = add_high_pass(
            &gray,
            &ctx.backend.gaussian_blur(&gray, self.cfg.sigma),
            self.cfg.amount,
        );
        let detailed = add_high_pass(
            &edges,
            &ctx.backend.gaussian_blur(&edges, self.cfg.sigma),
            self.cfg.detail,
        );
        let sharpness_after = laplacian_variance(&detailed);

        debug!(sharpness_after, "Soft page sharpened");
        ProcessResult::applied(
            image.with_luma(&detailed),
            metadata! {
                "amount" => self.cfg.amount,
                "detail" => self.cfg.detail,
                "sharpness_after" => sharpness_after,
            },
        )
    }
}
