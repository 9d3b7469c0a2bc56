// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Background flattening: divide the page by a smooth estimate of its paper
// level so shadows and uneven lighting drop out.

use image::GrayImage;
use scanprep_core::config::BackgroundCleanConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::morph;
use crate::page::PageImage;

/// Smallest closing radius used for the background estimate.
const MIN_RADIUS: u32 = 7;

#[derive(Debug, Clone)]
pub struct BackgroundClean {
    cfg: BackgroundCleanConfig,
}

impl BackgroundClean {
    pub fn new(cfg: BackgroundCleanConfig) -> Self {
        Self { cfg }
    }
}

fn region_mean(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32) -> f64 {
    let mut sum = 0u64;
    let mut n = 0u64;
    for y in y0..y1.min(gray.height()) {
        for x in x0..x1.min(gray.width()) {
            sum += gray.get_pixel(x, y).0[0] as u64;
            n += 1;
        }
    }
    if n == 0 { 0.0 } else { sum as f64 / n as f64 }
}

/// Relative brightness gap between the central third and the four corners.
fn lighting_difference(gray: &GrayImage) -> f64 {
    let (w, h) = gray.dimensions();
    let centre = region_mean(gray, w / 3, h / 3, 2 * w / 3, 2 * h / 3);
    let (cw, ch) = ((w / 8).max(1), (h / 8).max(1));
    let corners = [
        region_mean(gray, 0, 0, cw, ch),
        region_mean(gray, w - cw, 0, w, ch),
        region_mean(gray, 0, h - ch, cw, h),
        region_mean(gray, w - cw, h - ch, w, h),
    ];
    let corner_mean = corners.iter().sum::<f64>() / 4.0;
    if centre <= 0.0 {
        return 0.0;
    }
    (centre - corner_mean).abs() / centre
}

impl ProcessingUnit for BackgroundClean {
    fn kind(&self) -> UnitKind {
        UnitKind::BackgroundClean
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let stats = ctx.stats(image);
        let total: u64 = stats.histogram.iter().sum();
        let dark: u64 = stats.histogram[..=self.cfg.shadow_level as usize].iter().sum();
        let shadow_ratio = dark as f64 / total.max(1) as f64;
        let lighting_diff = lighting_difference(&image.luma());

        let meta = metadata! {
            "shadow_ratio" => shadow_ratio,
            "lighting_diff" => lighting_diff,
        };
        let shadowed = shadow_ratio > self.cfg.shadow_ratio as f64;
        if shadowed || lighting_diff > self.cfg.lighting_diff as f64 {
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
        let luma = image.luma();
        let (w, h) = luma.dimensions();
        let radius =
            ((w.min(h) as f32 * self.cfg.background_radius_fraction) as u32).max(MIN_RADIUS);
        let closed = morph::close(&luma, radius);
        let background = ctx.backend.gaussian_blur(&closed, radius as f32 / 2.0);

        let mut flat = luma.into_owned();
        for (p, bg) in flat.iter_mut().zip(background.as_raw()) {
            let bg = (*bg).max(1) as f32;
            *p = (255.0 * *p as f32 / bg).round().min(255.0) as u8;
        }

        debug!(radius, "Background flattened");
        ProcessResult::applied(image.with_luma(&flat), metadata! { "radius" => radius })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::run_unit;
    use image::Luma;

    fn stroke(x: u32, y: u32) -> bool {
        (20..100).contains(&x) && y % 20 < 2
    }

    fn page(paper: impl Fn(u32, u32) -> u8) -> PageImage {
        let gray = GrayImage::from_fn(120, 120, |x, y| {
            Luma([if stroke(x, y) { 20 } else { paper(x, y) }])
        });
        PageImage::from_gray(gray).unwrap()
    }

    fn vignette(x: u32, y: u32) -> u8 {
        let d2 = (x as f32 - 60.0).powi(2) + (y as f32 - 60.0).powi(2);
        (240.0 - d2 * 0.017) as u8
    }

    /// Brightness range of the paper away from the frame edge.
    fn paper_spread(gray: &GrayImage) -> u8 {
        let interior = 10..110;
        let paper: Vec<u8> = gray
            .enumerate_pixels()
            .filter(|(x, y, _)| interior.contains(x) && interior.contains(y) && !stroke(*x, *y))
            .map(|(_, _, p)| p.0[0])
            .collect();
        paper.iter().max().unwrap() - paper.iter().min().unwrap()
    }

    #[test]
    fn uneven_lighting_is_flattened() {
        let input = page(vignette);
        let (detection, processed) =
            run_unit(&BackgroundClean::new(BackgroundCleanConfig::default()), &input);
        assert!(detection.should_process, "{:?}", detection.metadata);

        let out = processed.unwrap();
        let before = paper_spread(input.as_gray().unwrap());
        let after = paper_spread(out.image.as_gray().unwrap());
        assert!(after < before / 2, "before {before}, after {after}");
        // Strokes stay ink.
        assert!(out.image.as_gray().unwrap().get_pixel(60, 40).0[0] < 60);
    }

    #[test]
    fn evenly_lit_page_is_skipped() {
        let (detection, processed) = run_unit(
            &BackgroundClean::new(BackgroundCleanConfig::default()),
            &page(|_, _| 200),
        );
        assert_eq!(detection.reason(), Some("below_threshold"));
        assert!(processed.is_none());
    }
}
