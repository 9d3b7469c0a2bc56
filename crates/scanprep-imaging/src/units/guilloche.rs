// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Guilloche removal: suppress the dominant ring of spectral power that fine
// periodic line patterns produce, leaving text (broadband) largely intact.

use image::GrayImage;
use scanprep_core::config::GuillocheConfig;
use scanprep_core::metadata;
use tracing::{debug, warn};

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::spectrum::{RingProfile, Spectrum, notch_gain};
use crate::page::PageImage;
use crate::probe::{self, PatternBand};

#[derive(Debug, Clone)]
pub struct GuillocheRemoval {
    cfg: GuillocheConfig,
}

impl GuillocheRemoval {
    pub fn new(cfg: GuillocheConfig) -> Self {
        Self { cfg }
    }

    /// Radius band to notch around the pattern reported near `peak`.
    fn notch_band(&self, profile: &RingProfile, peak: u32) -> (u32, u32) {
        let hw = self.cfg.ring_half_width;
        let smoothed = |r: u32| {
            let lo = r.saturating_sub(1) as usize;
            (lo..=r as usize + 1).map(|i| profile.mean_power(i)).sum::<f64>() / 3.0
        };

        let centre = (peak.saturating_sub(hw)..=peak + hw)
            .max_by(|&a, &b| {
                profile
                    .mean_power(a as usize)
                    .total_cmp(&profile.mean_power(b as usize))
            })
            .unwrap_or(peak);
        let cutoff = 0.5 * smoothed(centre);

        let mut lo = centre;
        while lo > self.cfg.min_radius && smoothed(lo - 1) > cutoff {
            lo -= 1;
        }
        let mut hi = centre;
        while hi < self.cfg.max_radius && smoothed(hi + 1) > cutoff {
            hi += 1;
        }

        let reach = hw + self.cfg.taper;
        let lo = lo.min(centre.saturating_sub(reach)).max(self.cfg.min_radius);
        let hi = hi.max(centre + reach).min(self.cfg.max_radius);
        (lo, hi.max(lo))
    }
}

impl ProcessingUnit for GuillocheRemoval {
    fn kind(&self) -> UnitKind {
        UnitKind::GuillocheRemoval
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let stats = ctx.stats(image);
        let meta = metadata! {
            "pattern_strength" => stats.pattern_strength,
            "peak_radius" => stats.pattern_peak_radius,
            "strength_threshold" => self.cfg.strength_threshold,
        };
        if stats.pattern_strength > self.cfg.strength_threshold {
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
        let peak = match detection.number("peak_radius") {
            Some(r) => r as u32,
            None => ctx.stats(image).pattern_peak_radius,
        };

        let luma = image.luma();
        let (mut spectrum, mean) = Spectrum::of_gray(&luma);
        let (band_low, band_high) = self.notch_band(&spectrum.ring_profile(), peak);
        let (lo, hi) = (band_low as f32, band_high as f32);
        let (taper, floor) = (self.cfg.taper as f32, self.cfg.floor_gain);
        spectrum.apply_radial_gain(|r| notch_gain(r, lo, hi, taper, floor));

        let samples = spectrum.inverse();
        let mut filtered = GrayImage::new(luma.width(), luma.height());
        for (p, v) in filtered.iter_mut().zip(samples) {
            *p = (v + mean).round().clamp(0.0, 255.0) as u8;
        }

        let band = PatternBand::from(&self.cfg);
        let (post_strength, _) = probe::pattern_strength(&filtered, ctx.backend, band);
        let pre_strength = match detection.number("pattern_strength") {
            Some(s) => s as f32,
            None => ctx.stats(image).pattern_strength,
        };
        let meta = metadata! {
            "band_low" => band_low,
            "band_high" => band_high,
            "pre_pattern_strength" => pre_strength,
            "post_pattern_strength" => post_strength,
        };

        if post_strength >= pre_strength {
            warn!(pre_strength, post_strength, "Notch did not weaken the pattern; reverting");
            return ProcessResult::reverted(image, meta);
        }
        debug!(band_low, band_high, post_strength, "Guilloche pattern suppressed");
        ProcessResult::applied(image.with_luma(&filtered), meta)
    }
}
