// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour correction for colour pages: gray-world white balance for a colour
// cast, local equalisation of luminance for faded pages, then a per-channel
// range stretch. Grey pages are never touched.

use scanprep_core::config::ColorCorrectionConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::clahe::clahe;
use crate::ops::color;
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct ColorCorrection {
    cfg: ColorCorrectionConfig,
}

impl ColorCorrection {
    pub fn new(cfg: ColorCorrectionConfig) -> Self {
        Self { cfg }
    }
}

/// Largest difference between any two channel means.
fn cast_of(means: [f64; 3]) -> f64 {
    let max = means.iter().copied().fold(f64::MIN, f64::max);
    let min = means.iter().copied().fold(f64::MAX, f64::min);
    max - min
}

impl ProcessingUnit for ColorCorrection {
    fn kind(&self) -> UnitKind {
        UnitKind::ColorCorrection
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let Some(rgb) = image.as_rgb() else {
            return DetectionResult::skip("not_color", metadata!());
        };
        let cast = cast_of(color::channel_means(rgb));
        let mean = ctx.stats(image).mean;
        let has_cast = cast > self.cfg.cast_threshold as f64;
        let faded = mean < self.cfg.faded_level;
        let meta = metadata! {
            "color_cast" => cast,
            "mean_luma" => mean,
            "has_cast" => has_cast,
            "faded" => faded,
        };
        if has_cast || faded {
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
        let Some(rgb) = image.as_rgb() else {
            return ProcessResult::degraded(image, "not_color", metadata!());
        };
        let mut out = if detection.flag("has_cast") {
            color::gray_world(rgb)
        } else {
            rgb.clone()
        };
        if detection.flag("faded") {
            let old = color::luma_of(&out);
            let new = clahe(&old, self.cfg.clip_limit, self.cfg.tiles);
            out = color::shift_luma(&out, &old, &new);
        }
        let out = color::stretch_channels(&out, self.cfg.stretch_tail as f64);
        let cast_after = cast_of(color::channel_means(&out));

        debug!(cast_after, "Colour corrected");
        match PageImage::from_rgb(out) {
            Ok(page) => {
                ProcessResult::applied(page, metadata! { "color_cast_after" => cast_after })
            }
            Err(err) => ProcessResult::degraded(image, &err.to_string(), metadata!()),
        }
    }
}
