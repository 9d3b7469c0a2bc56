// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grain smoothing with edge-preserving filters.
//
// Grain is the median Sobel magnitude of the page. Text edges cover a small
// share of a page, so the median follows the paper texture rather than the
// strokes. The filter chain grows with the grain level: a light median for
// fine grain, blur plus bilateral for medium, and all three for heavy.

use image::GrayImage;
use imageproc::filter::bilateral_filter;
use imageproc::gradients::sobel_gradients;
use scanprep_core::config::SmoothConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::page::PageImage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Light,
    Medium,
    Heavy,
}

impl Chain {
    fn name(self) -> &'static str {
        match self {
            Chain::Light => "light",
            Chain::Medium => "medium",
            Chain::Heavy => "heavy",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Smooth {
    cfg: SmoothConfig,
}

impl Smooth {
    pub fn new(cfg: SmoothConfig) -> Self {
        Self { cfg }
    }

    fn chain(&self, grain: f32) -> Chain {
        if grain > self.cfg.heavy_grain {
            Chain::Heavy
        } else if grain > self.cfg.medium_grain {
            Chain::Medium
        } else {
            Chain::Light
        }
    }
}

/// Median Sobel gradient magnitude.
pub(crate) fn grain_level(gray: &GrayImage) -> f32 {
    if gray.width() < 3 || gray.height() < 3 {
        return 0.0;
    }
    let mut magnitudes: Vec<u16> = sobel_gradients(gray).into_raw();
    let mid = magnitudes.len() / 2;
    let (_, median, _) = magnitudes.select_nth_unstable(mid);
    *median as f32
}

impl ProcessingUnit for Smooth {
    fn kind(&self) -> UnitKind {
        UnitKind::Smooth
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let grain = grain_level(&image.luma());
        let meta = metadata! { "grain" => grain };
        if grain > self.cfg.grain_threshold {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let gray = image.luma();
        let grain = match detection.number("grain") {
            Some(g) => g as f32,
            None => grain_level(&gray),
        };
        let chain = self.chain(grain);
        let smoothed = match chain {
            Chain::Heavy => {
                let blurred = ctx.backend.gaussian_blur(&gray, 1.0);
                let median = ctx.backend.median_blur(&blurred, 2);
                bilateral_filter(&median, 9, 75.0, 75.0)
            }
            Chain::Medium => {
                let blurred = ctx.backend.gaussian_blur(&gray, 0.8);
                bilateral_filter(&blurred, 7, 50.0, 50.0)
            }
            Chain::Light => {
                let median = ctx.backend.median_blur(&gray, 1);
                bilateral_filter(&median, 5, 30.0, 30.0)
            }
        };
        let grain_after = grain_level(&smoothed);

        debug!(grain, grain_after, chain = chain.name(), "Grain smoothed");
        ProcessResult::applied(
            image.with_luma(&smoothed),
            metadata! {
                "chain" => chain.name(),
                "grain_after" => grain_after,
            },
        )
    }
}
