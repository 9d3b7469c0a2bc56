// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image statistics probe: tone, noise, sharpness and periodic-pattern
// measurements computed once per page geometry and shared by the units.

use std::cell::OnceCell;

use image::GrayImage;
use imageproc::filter::laplacian_filter;
use scanprep_backend::Backend;
use scanprep_core::config::GuillocheConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::ops::spectrum::Spectrum;
use crate::ops::{downscale_factor, mean_abs_diff, threshold};
use crate::page::PageImage;

/// Longer side of the copy the spectrum is measured on.
pub const PATTERN_MAX_SIDE: u32 = 512;

/// Sigma of the smoothing the noise residual is measured against.
pub const NOISE_SIGMA: f32 = 1.0;

/// Scalar features of one page image.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageStats {
    pub width: u32,
    pub height: u32,
    /// Mean luminance.
    pub mean: f32,
    /// Standard deviation of luminance.
    pub contrast_std: f32,
    /// Mean absolute high-pass residual.
    pub noise_level: f32,
    /// Variance of the 4-neighbour Laplacian.
    pub sharpness: f32,
    /// 256-bin luminance histogram.
    pub histogram: Vec<u64>,
    /// Share of non-DC spectral power the strongest ring of the configured
    /// band holds above its flanks, weighted by its angular spread.
    pub pattern_strength: f32,
    /// Radius of highest mean power inside that ring, in cycles per
    /// longer side.
    pub pattern_peak_radius: u32,
}

impl ImageStats {
    pub fn summary(&self) -> QualitySummary {
        QualitySummary {
            mean: self.mean,
            contrast_std: self.contrast_std,
            noise_level: self.noise_level,
            sharpness: self.sharpness,
            pattern_strength: self.pattern_strength,
        }
    }
}

/// Before/after snapshot recorded in page reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySummary {
    pub mean: f32,
    pub contrast_std: f32,
    pub noise_level: f32,
    pub sharpness: f32,
    pub pattern_strength: f32,
}

/// Radius band the periodic-pattern measurement scans.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternBand {
    pub min_radius: u32,
    pub max_radius: u32,
    pub half_width: u32,
}

impl From<&GuillocheConfig> for PatternBand {
    fn from(cfg: &GuillocheConfig) -> Self {
        Self {
            min_radius: cfg.min_radius,
            max_radius: cfg.max_radius,
            half_width: cfg.ring_half_width,
        }
    }
}

impl Default for PatternBand {
    fn default() -> Self {
        Self::from(&GuillocheConfig::default())
    }
}

// -- Measurements -------------------------------------------------------------

/// Measure every statistic of a luminance plane.
#[instrument(skip_all, fields(width = gray.width(), height = gray.height()))]
pub fn measure(gray: &GrayImage, backend: &dyn Backend, band: PatternBand) -> ImageStats {
    let histogram = threshold::histogram(gray);
    let (mean, contrast_std) = tone(&histogram);
    let blurred = backend.gaussian_blur(gray, NOISE_SIGMA);
    let noise_level = mean_abs_diff(gray, &blurred);
    let sharpness = laplacian_variance(gray);
    let (pattern_strength, pattern_peak_radius) = pattern_strength(gray, backend, band);

    debug!(
        mean,
        contrast_std,
        noise_level,
        sharpness,
        pattern_strength,
        "Image statistics measured"
    );

    ImageStats {
        width: gray.width(),
        height: gray.height(),
        mean,
        contrast_std,
        noise_level,
        sharpness,
        histogram: histogram.to_vec(),
        pattern_strength,
        pattern_peak_radius,
    }
}

/// Mean and standard deviation from a histogram.
pub fn tone(hist: &[u64; 256]) -> (f32, f32) {
    let n: u64 = hist.iter().sum();
    if n == 0 {
        return (0.0, 0.0);
    }
    let mean = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| v as f64 * c as f64)
        .sum::<f64>()
        / n as f64;
    let var = hist
        .iter()
        .enumerate()
        .map(|(v, &c)| (v as f64 - mean).powi(2) * c as f64)
        .sum::<f64>()
        / n as f64;
    (mean as f32, var.sqrt() as f32)
}

/// Variance of the 4-neighbour Laplacian.
pub fn laplacian_variance(gray: &GrayImage) -> f32 {
    if gray.width() < 3 || gray.height() < 3 {
        return 0.0;
    }
    let lap = laplacian_filter(gray);
    let n = lap.as_raw().len() as f64;
    let (sum, sq) = lap.as_raw().iter().fold((0.0f64, 0.0f64), |(sum, sq), &v| {
        let v = v as f64;
        (sum + v, sq + v * v)
    });
    let mean = sum / n;
    (sq / n - mean * mean).max(0.0) as f32
}

/// Periodic-pattern strength on a copy no larger than [`PATTERN_MAX_SIDE`].
pub fn pattern_strength(gray: &GrayImage, backend: &dyn Backend, band: PatternBand) -> (f32, u32) {
    let (w, h) = gray.dimensions();
    let factor = downscale_factor(w, h, PATTERN_MAX_SIDE);
    let small;
    let work = if factor < 1.0 {
        let sw = ((w as f32 * factor).round() as u32).max(1);
        let sh = ((h as f32 * factor).round() as u32).max(1);
        small = backend.resize(gray, sw, sh);
        &small
    } else {
        gray
    };
    let (spectrum, _) = Spectrum::of_gray(work);
    spectrum
        .ring_profile()
        .strongest_ring(band.min_radius, band.max_radius, band.half_width)
}

// -- Cache --------------------------------------------------------------------

/// Lazily measured statistics for the current page geometry.
///
/// Filled on first use. The owner calls [`StatsCache::invalidate`] when a
/// unit changes the page geometry.
#[derive(Debug, Default)]
pub struct StatsCache {
    band: PatternBand,
    stats: OnceCell<ImageStats>,
    invalidations: u32,
}

impl StatsCache {
    pub fn new(band: PatternBand) -> Self {
        Self {
            band,
            stats: OnceCell::new(),
            invalidations: 0,
        }
    }

    /// Statistics of `image`, measuring it if nothing is cached.
    pub fn get_or_measure(&self, image: &PageImage, backend: &dyn Backend) -> &ImageStats {
        self.stats.get_or_init(|| measure(&image.luma(), backend, self.band))
    }

    pub fn cached(&self) -> Option<&ImageStats> {
        self.stats.get()
    }

    pub fn is_cached(&self) -> bool {
        self.stats.get().is_some()
    }

    pub fn invalidate(&mut self) {
        if self.stats.take().is_some() {
            self.invalidations += 1;
        }
    }

    /// Number of times a measurement was discarded.
    pub fn invalidations(&self) -> u32 {
        self.invalidations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use scanprep_backend::CpuBackend;

    #[test]
    fn flat_page_is_quiet() {
        let gray = GrayImage::from_pixel(64, 48, Luma([200]));
        let stats = measure(&gray, &CpuBackend, PatternBand::default());
        assert_eq!(stats.mean, 200.0);
        assert_eq!(stats.contrast_std, 0.0);
        assert!(stats.noise_level <= 1.0);
        assert_eq!(stats.sharpness, 0.0);
        assert_eq!(stats.pattern_strength, 0.0);
        assert_eq!(stats.histogram[200], 64 * 48);
    }

    #[test]
    fn checkerboard_noise_raises_noise_and_sharpness() {
        let gray = GrayImage::from_fn(64, 64, |x, y| {
            Luma([if (x + y) % 2 == 0 { 100 } else { 160 }])
        });
        let stats = measure(&gray, &CpuBackend, PatternBand::default());
        assert!(stats.noise_level > 12.0, "noise {}", stats.noise_level);
        assert!(stats.sharpness > 1000.0);
        assert!((stats.contrast_std - 30.0).abs() < 0.01);
    }

    #[test]
    fn concentric_pattern_is_detected() {
        let gray = GrayImage::from_fn(256, 256, |x, y| {
            let d = (x as f32 - 128.0).hypot(y as f32 - 128.0);
            let v = 150.0 + 60.0 * (2.0 * std::f32::consts::PI * d / 4.0).cos();
            Luma([v.round() as u8])
        });
        let (strength, radius) = pattern_strength(&gray, &CpuBackend, PatternBand::default());
        assert!(strength > 0.4, "strength {strength}");
        assert!((62..=66).contains(&radius), "radius {radius}");
    }

    #[test]
    fn regular_text_grid_is_not_a_pattern() {
        // Glyph rows and columns repeat inside the band on a page this size.
        let gray = GrayImage::from_fn(1000, 1500, |x, y| {
            let block = (125..875).contains(&x) && (200..1300).contains(&y);
            let glyph = block && (x - 125) % 30 < 20 && (y - 200) % 50 < 20;
            Luma([if glyph { 40 } else { 230 }])
        });
        let (strength, _) = pattern_strength(&gray, &CpuBackend, PatternBand::default());
        let limit = GuillocheConfig::default().strength_threshold / 2.0;
        assert!(strength < limit, "strength {strength}");
    }

    #[test]
    fn cache_measures_once_until_invalidated() {
        let page = PageImage::from_gray(GrayImage::from_pixel(16, 16, Luma([10]))).unwrap();
        let mut cache = StatsCache::new(PatternBand::default());
        assert!(!cache.is_cached());
        let first = cache.get_or_measure(&page, &CpuBackend).mean;
        assert_eq!(first, 10.0);

        // A different page does not replace the cached measurement.
        let other = PageImage::from_gray(GrayImage::from_pixel(16, 16, Luma([90]))).unwrap();
        assert_eq!(cache.get_or_measure(&other, &CpuBackend).mean, 10.0);

        cache.invalidate();
        assert_eq!(cache.invalidations(), 1);
        assert_eq!(cache.get_or_measure(&other, &CpuBackend).mean, 90.0);
    }
}
