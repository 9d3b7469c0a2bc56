// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Adaptive denoise: median plus Gaussian smoothing scaled by the measured
// noise level, softened on pages that are already blurry.

use scanprep_core::config::DenoiseConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::mean_abs_diff;
use crate::page::PageImage;
use crate::probe::NOISE_SIGMA;
use crate::strength;

#[derive(Debug, Clone)]
pub struct Denoise {
    cfg: DenoiseConfig,
}

impl Denoise {
    pub fn new(cfg: DenoiseConfig) -> Self {
        Self { cfg }
    }
}

impl ProcessingUnit for Denoise {
    fn kind(&self) -> UnitKind {
        UnitKind::Denoise
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let stats = ctx.stats(image);
        let high_noise = stats.noise_level > self.cfg.noise_threshold;
        let blurry = stats.sharpness < self.cfg.sharpness_threshold;
        DetectionResult::run(metadata! {
            "noise_level" => stats.noise_level,
            "laplacian_variance" => stats.sharpness,
            "high_noise" => high_noise,
            "blurry" => blurry,
            "below_threshold" => !high_noise,
        })
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let noise = match detection.number("noise_level") {
            Some(n) => n as f32,
            None => ctx.stats(image).noise_level,
        };
        let strength = strength::denoise_strength(noise, &self.cfg);
        let mut sigma = strength::gaussian_sigma(strength, &self.cfg);
        if detection.flag("blurry") {
            sigma *= 0.5;
        }
        let radius = strength::median_radius(strength);

        let luma = image.luma();
        let filtered = if radius > 0 {
            ctx.backend.median_blur(&luma, radius)
        } else {
            luma.into_owned()
        };
        let smoothed = ctx.backend.gaussian_blur(&filtered, sigma);
        let reblurred = ctx.backend.gaussian_blur(&smoothed, NOISE_SIGMA);
        let post_noise = mean_abs_diff(&smoothed, &reblurred);

        debug!(strength, sigma, radius, post_noise, "Denoised page");
        ProcessResult::applied(
            image.with_luma(&smoothed),
            metadata! {
                "strength" => strength,
                "sigma" => sigma,
                "median_radius" => radius,
                "post_noise_level" => post_noise,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::run_unit;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    fn jitter(x: u32, y: u32) -> i32 {
        (((x.wrapping_mul(73_856_093)) ^ (y.wrapping_mul(19_349_663))) % 97) as i32 - 48
    }

    fn noisy_page() -> PageImage {
        let gray = GrayImage::from_fn(96, 96, |x, y| Luma([(160 + jitter(x, y)) as u8]));
        PageImage::from_gray(gray).unwrap()
    }

    #[test]
    fn noisy_page_gets_quieter() {
        let unit = Denoise::new(DenoiseConfig::default());
        let (detection, processed) = run_unit(&unit, &noisy_page());
        assert!(detection.should_process);
        assert!(detection.flag("high_noise"));
        assert!(!detection.flag("below_threshold"));

        let out = processed.unwrap();
        let before = detection.number("noise_level").unwrap();
        let after = out.metadata["post_noise_level"].as_f64().unwrap();
        assert!(after < before / 2.0, "before {before}, after {after}");
        assert_eq!(out.metadata["median_radius"].as_i64(), Some(1));
    }

    #[test]
    fn clean_page_still_runs_lightly() {
        let page = PageImage::from_gray(GrayImage::from_pixel(32, 32, Luma([200]))).unwrap();
        let (detection, processed) = run_unit(&Denoise::new(DenoiseConfig::default()), &page);
        assert!(detection.should_process);
        assert!(detection.flag("below_threshold"));
        let out = processed.unwrap();
        assert_eq!(out.metadata["median_radius"].as_i64(), Some(0));
        assert!(out.image.as_gray().unwrap().pixels().all(|p| p.0[0].abs_diff(200) <= 1));
    }

    #[test]
    fn colour_pages_stay_colour() {
        let rgb = RgbImage::from_fn(48, 48, |x, y| {
            let v = (150 + jitter(x, y) / 2) as u8;
            Rgb([v, v.saturating_sub(40), v.saturating_sub(80)])
        });
        let page = PageImage::from_rgb(rgb).unwrap();
        let (_, processed) = run_unit(&Denoise::new(DenoiseConfig::default()), &page);
        let out = processed.unwrap();
        assert!(out.image.is_color());
        let p = out.image.as_rgb().unwrap().get_pixel(24, 24);
        assert!(p.0[0] > p.0[2]);
    }
}
