// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Hologram glare removal: find small, bright, unsaturated specular patches
// and rebuild them from the surrounding page.

use image::GrayImage;
use scanprep_core::config::HologramConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::{Components, Region};
use crate::ops::{color, morph, threshold};
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct HologramRemoval {
    cfg: HologramConfig,
}

struct Glare {
    components: Components,
    level: u8,
    max_area: u32,
}

impl HologramRemoval {
    pub fn new(cfg: HologramConfig) -> Self {
        Self { cfg }
    }

    fn glare(&self, image: &PageImage) -> Glare {
        let (sat, val) = match image.as_rgb() {
            Some(rgb) => color::saturation_value(rgb),
            None => {
                let luma = image.luma().into_owned();
                (GrayImage::new(luma.width(), luma.height()), luma)
            }
        };
        let median = threshold::percentile(&threshold::histogram(&val), 0.5);
        let level = (median as u16 + self.cfg.value_margin as u16)
            .max(self.cfg.min_value as u16)
            .min(255) as u8;

        let mut mask = GrayImage::new(val.width(), val.height());
        for ((m, s), v) in mask.iter_mut().zip(sat.as_raw()).zip(val.as_raw()) {
            if *s < self.cfg.max_saturation && *v > level {
                *m = 255;
            }
        }
        let max_area = (self.cfg.max_region_fraction as f64 * mask.as_raw().len() as f64) as u32;
        Glare {
            components: Components::label(&mask),
            level,
            max_area,
        }
    }

    fn qualifies(&self, region: &Region, max_area: u32) -> bool {
        (self.cfg.min_region_area..=max_area).contains(&region.area)
    }
}

impl ProcessingUnit for HologramRemoval {
    fn kind(&self) -> UnitKind {
        UnitKind::HologramRemoval
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let glare = self.glare(image);
        let regions = glare
            .components
            .regions()
            .iter()
            .filter(|r| self.qualifies(r, glare.max_area))
            .count();
        let meta = metadata! {
            "glare_regions" => regions,
            "value_level" => glare.level as u32,
            "candidates" => glare.components.len(),
        };
        if regions >= self.cfg.min_regions as usize {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let glare = self.glare(image);
        let mask = glare
            .components
            .mask_where(|r| self.qualifies(r, glare.max_area));
        // Grow by one pixel so the anti-aliased rim is rebuilt too.
        let mask = morph::dilate(&mask, 1);
        let filled = mask.as_raw().iter().filter(|&&m| m != 0).count();

        debug!(filled, level = glare.level, "Hologram glare inpainted");
        ProcessResult::applied(
            image.inpaint(&mask),
            metadata! { "inpainted_pixels" => filled },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::run_unit;
    use image::{Luma, Rgb, RgbImage};

    const PAPER: Rgb<u8> = Rgb([220, 210, 180]);

    fn is_glare(x: u32, y: u32) -> bool {
        y >= 40 && y < 48 && x >= 20 && (x - 20) % 30 < 8 && x < 170
    }

    #[test]
    fn glare_patches_are_rebuilt_from_paper() {
        let rgb = RgbImage::from_fn(200, 200, |x, y| {
            if is_glare(x, y) { Rgb([252, 252, 252]) } else { PAPER }
        });
        let page = PageImage::from_rgb(rgb).unwrap();
        let unit = HologramRemoval::new(HologramConfig::default());
        let (detection, processed) = run_unit(&unit, &page);
        assert!(detection.should_process, "{:?}", detection.metadata);
        assert_eq!(detection.number("glare_regions"), Some(5.0));

        let out = processed.unwrap();
        let rgb = out.image.as_rgb().unwrap();
        assert_eq!(*rgb.get_pixel(23, 43), PAPER);
        assert_eq!(*rgb.get_pixel(100, 150), PAPER);
    }

    #[test]
    fn plain_grey_page_has_no_glare() {
        let page = PageImage::from_gray(GrayImage::from_pixel(100, 100, Luma([235]))).unwrap();
        let (detection, processed) =
            run_unit(&HologramRemoval::new(HologramConfig::default()), &page);
        assert_eq!(detection.reason(), Some("below_threshold"));
        assert!(processed.is_none());
    }

    #[test]
    fn a_single_large_highlight_is_not_a_hologram() {
        let rgb = RgbImage::from_fn(100, 100, |x, y| {
            if x < 50 && y < 50 { Rgb([250, 250, 250]) } else { PAPER }
        });
        let page = PageImage::from_rgb(rgb).unwrap();
        let (detection, _) = run_unit(&HologramRemoval::new(HologramConfig::default()), &page);
        assert!(!detection.should_process);
    }
}
