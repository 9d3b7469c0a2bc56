// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Final binarization: Sauvola local threshold with a Gaussian adaptive
// fallback when the result has an implausible amount of ink.

use image::GrayImage;
use scanprep_core::config::BinarizeConfig;
use scanprep_core::metadata;
use tracing::{debug, warn};

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::threshold;
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct Binarize {
    cfg: BinarizeConfig,
}

impl Binarize {
    pub fn new(cfg: BinarizeConfig) -> Self {
        Self { cfg }
    }

    fn plausible(&self, ratio: f64) -> bool {
        (self.cfg.min_foreground as f64..=self.cfg.max_foreground as f64).contains(&ratio)
    }

    fn fallback(&self, gray: &GrayImage, ctx: &UnitContext<'_>) -> GrayImage {
        let sigma = threshold::adaptive_sigma(self.cfg.fallback_block);
        let blurred = ctx.backend.gaussian_blur(gray, sigma);
        threshold::gaussian_adaptive(gray, &blurred, self.cfg.fallback_offset)
    }
}

impl ProcessingUnit for Binarize {
    fn kind(&self) -> UnitKind {
        UnitKind::Binarize
    }

    /// Binarization always runs once it is scheduled.
    fn detect(&self, _image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        DetectionResult::run(metadata! {
            "policy" => "finalization",
            "below_threshold" => false,
        })
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let gray = image.luma();
        let mut binary =
            threshold::sauvola(&gray, self.cfg.window, self.cfg.k, self.cfg.dynamic_range);
        let sauvola_ratio = threshold::foreground_ratio(&binary);
        let mut ratio = sauvola_ratio;
        let mut fallback_used = false;

        if !self.plausible(ratio) {
            binary = self.fallback(&gray, ctx);
            ratio = threshold::foreground_ratio(&binary);
            fallback_used = true;
        }

        let mut meta = metadata! {
            "method" => if fallback_used { "gaussian_adaptive" } else { "sauvola" },
            "fallback_used" => fallback_used,
            "sauvola_foreground_ratio" => sauvola_ratio,
            "foreground_ratio" => ratio,
        };

        if !self.plausible(ratio) {
            warn!(ratio, "Binarization produced an implausible ink ratio; rolled back");
            return ProcessResult::reverted(image, meta);
        }

        debug!(ratio, fallback_used, "Page binarized");
        meta.insert("white_ratio".into(), (1.0 - ratio).into());
        ProcessResult::applied(PageImage::gray(binary), meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::run_unit;
    use image::Luma;
    use scanprep_core::types::UnitOutcome;

    fn text_page() -> PageImage {
        let gray = GrayImage::from_fn(120, 120, |x, y| {
            let ink = (x / 3) % 4 == 0 && (y / 6) % 3 == 0;
            Luma([if ink { 30 } else { 220 }])
        });
        PageImage::from_gray(gray).unwrap()
    }

    #[test]
    fn text_page_becomes_two_level() {
        let unit = Binarize::new(BinarizeConfig::default());
        let (detection, processed) = run_unit(&unit, &text_page());
        assert_eq!(detection.metadata["policy"].as_str(), Some("finalization"));
        let out = processed.unwrap();
        assert!(out.is_applied());
        assert_eq!(out.image.channels(), 1);
        assert!(out.image.as_bytes().iter().all(|&v| v == 0 || v == 255));
        assert!(!out.metadata["fallback_used"].as_bool().unwrap());
        assert_eq!(out.image.as_gray().unwrap().get_pixel(0, 0).0[0], 0);
        assert_eq!(out.image.as_gray().unwrap().get_pixel(5, 0).0[0], 255);
    }

    #[test]
    fn blank_page_is_rolled_back() {
        let page = PageImage::from_gray(GrayImage::from_pixel(64, 64, Luma([230]))).unwrap();
        let (_, processed) = run_unit(&Binarize::new(BinarizeConfig::default()), &page);
        let out = processed.unwrap();
        assert_eq!(out.outcome, UnitOutcome::Reverted);
        assert!(out.metadata["fallback_used"].as_bool().unwrap());
        assert!(out.image.shares_buffer(&page));
    }

    #[test]
    fn colour_pages_come_out_grey() {
        let rgb = image::RgbImage::from_fn(60, 60, |x, y| {
            if (x / 3) % 4 == 0 && (y / 6) % 3 == 0 {
                image::Rgb([20, 20, 90])
            } else {
                image::Rgb([240, 230, 200])
            }
        });
        let page = PageImage::from_rgb(rgb).unwrap();
        let (_, processed) = run_unit(&Binarize::new(BinarizeConfig::default()), &page);
        let out = processed.unwrap();
        assert!(out.is_applied());
        assert!(!out.image.is_color());
    }
}
