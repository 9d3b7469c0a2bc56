// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Watermark removal: estimate the broad, faint layer sitting between the
// paper and the text, lift it back to paper level, then restore local
// contrast.

use image::GrayImage;
use scanprep_core::config::WatermarkConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::clahe::clahe;
use crate::ops::{color, morph, threshold};
use crate::page::PageImage;

/// Smallest closing radius for the layer estimate.
const MIN_RADIUS: u32 = 7;
/// Pixels this far below the paper level count as ink, not watermark.
const INK_MARGIN: u8 = 60;
/// CLAHE grid used after lifting the layer.
const CLAHE_TILES: u32 = 8;

#[derive(Debug, Clone)]
pub struct WatermarkRemoval {
    cfg: WatermarkConfig,
}

/// The page with text closed away, and the paper level it sits on.
struct Layer {
    background: GrayImage,
    paper: u8,
}

impl WatermarkRemoval {
    pub fn new(cfg: WatermarkConfig) -> Self {
        Self { cfg }
    }

    fn layer(&self, gray: &GrayImage, ctx: &UnitContext<'_>) -> Layer {
        let radius = (gray.width().min(gray.height()) / 100).max(MIN_RADIUS);
        let closed = morph::close(gray, radius);
        let background = ctx.backend.gaussian_blur(&closed, radius as f32 / 2.0);
        let paper = threshold::percentile(&threshold::histogram(&background), 0.95);
        Layer { background, paper }
    }

    /// Share of pixels whose background sits measurably below the paper.
    fn luma_coverage(&self, layer: &Layer) -> f64 {
        let raw = layer.background.as_raw();
        let covered = raw
            .iter()
            .filter(|&&v| layer.paper.saturating_sub(v) > self.cfg.diff_level)
            .count();
        covered as f64 / raw.len().max(1) as f64
    }

    /// Share of non-ink pixels whose chroma departs from the paper's.
    fn chroma_coverage(&self, page: &PageImage, gray: &GrayImage, paper: u8) -> f64 {
        let Some(rgb) = page.as_rgb() else {
            return 0.0;
        };
        let ink_level = paper.saturating_sub(INK_MARGIN);
        let chroma: Vec<[f32; 2]> = color::chroma_ab(rgb)
            .into_iter()
            .zip(gray.as_raw())
            .filter(|(_, g)| **g > ink_level)
            .map(|(ab, _)| ab)
            .collect();
        if chroma.is_empty() {
            return 0.0;
        }

        let median = |i: usize| {
            let mut values: Vec<f32> = chroma.iter().map(|ab| ab[i]).collect();
            values.sort_by(f32::total_cmp);
            values[values.len() / 2]
        };
        let (pa, pb) = (median(0), median(1));
        let limit = self.cfg.diff_level as f32;
        let tinted = chroma
            .iter()
            .filter(|[a, b]| (a - pa).hypot(b - pb) > limit)
            .count();
        tinted as f64 / chroma.len() as f64
    }
}

impl ProcessingUnit for WatermarkRemoval {
    fn kind(&self) -> UnitKind {
        UnitKind::WatermarkRemoval
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let gray = image.luma();
        let layer = self.layer(&gray, ctx);
        let luma_coverage = self.luma_coverage(&layer);
        let chroma_coverage = self.chroma_coverage(image, &gray, layer.paper);
        let (signal, channel) = if chroma_coverage > luma_coverage {
            (chroma_coverage, "chroma")
        } else {
            (luma_coverage, "luma")
        };

        let meta = metadata! {
            "luma_coverage" => luma_coverage,
            "chroma_coverage" => chroma_coverage,
            "signal" => signal,
            "signal_channel" => channel,
            "paper_level" => layer.paper as u32,
        };
        if signal > self.cfg.ratio_threshold as f64 {
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
        let layer = self.layer(&gray, ctx);
        let weight = self.cfg.layer_weight;

        let mut lifted = gray.into_owned();
        for (p, bg) in lifted.iter_mut().zip(layer.background.as_raw()) {
            let lift = weight * layer.paper.saturating_sub(*bg) as f32;
            *p = (*p as f32 + lift).round().clamp(0.0, 255.0) as u8;
        }
        let restored = clahe(&lifted, self.cfg.clip_limit, CLAHE_TILES);

        debug!(paper = layer.paper, weight, "Watermark layer lifted");
        ProcessResult::applied(
            image.with_luma(&restored),
            metadata! {
                "paper_level" => layer.paper as u32,
                "layer_weight" => weight,
                "clip_limit" => self.cfg.clip_limit,
            },
        )
    }
}
