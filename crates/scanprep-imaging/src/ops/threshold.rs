// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thresholding primitives: summed-area tables, Otsu, Sauvola and the
// gaussian-adaptive fallback. Binary outputs use 0 for ink, 255 for paper.

use image::{GrayImage, Luma};

// -- Summed-area tables -------------------------------------------------------

/// Summed-area tables of a grey image and of its squared samples.
///
/// `sum[y * (width+1) + x]` holds the sum over the rectangle [0, x) x [0, y),
/// so the tables carry a zero row and column on the top-left edge.
pub struct IntegralImage {
    width: u32,
    height: u32,
    sum: Vec<u64>,
    sq: Vec<u64>,
}

impl IntegralImage {
    pub fn new(gray: &GrayImage) -> Self {
        let (w, h) = gray.dimensions();
        let stride = (w + 1) as usize;
        let mut sum = vec![0u64; stride * (h + 1) as usize];
        let mut sq = vec![0u64; stride * (h + 1) as usize];

        for y in 0..h as usize {
            let mut row_sum = 0u64;
            let mut row_sq = 0u64;
            for x in 0..w as usize {
                let v = gray.as_raw()[y * w as usize + x] as u64;
                row_sum += v;
                row_sq += v * v;
                let idx = (y + 1) * stride + x + 1;
                let above = y * stride + x + 1;
                sum[idx] = row_sum + sum[above];
                sq[idx] = row_sq + sq[above];
            }
        }

        Self {
            width: w,
            height: h,
            sum,
            sq,
        }
    }

    /// Sum, squared sum and pixel count of the square window of `radius`
    /// around (cx, cy), clipped to the image.
    fn window(&self, cx: u32, cy: u32, radius: u32) -> (f64, f64, f64) {
        let stride = (self.width + 1) as usize;
        let x1 = cx.saturating_sub(radius) as usize;
        let y1 = cy.saturating_sub(radius) as usize;
        let x2 = (cx as usize + radius as usize + 1).min(self.width as usize);
        let y2 = (cy as usize + radius as usize + 1).min(self.height as usize);
        let area = ((x2 - x1) * (y2 - y1)) as f64;

        let lookup = |t: &[u64]| {
            t[y2 * stride + x2] as f64 - t[y1 * stride + x2] as f64 - t[y2 * stride + x1] as f64
                + t[y1 * stride + x1] as f64
        };
        (lookup(&self.sum), lookup(&self.sq), area)
    }

    /// Mean intensity of the window around (cx, cy).
    pub fn mean(&self, cx: u32, cy: u32, radius: u32) -> f64 {
        let (sum, _, area) = self.window(cx, cy, radius);
        if area == 0.0 { 128.0 } else { sum / area }
    }

    /// Mean and standard deviation of the window around (cx, cy).
    pub fn mean_std(&self, cx: u32, cy: u32, radius: u32) -> (f64, f64) {
        let (sum, sq, area) = self.window(cx, cy, radius);
        if area == 0.0 {
            return (128.0, 0.0);
        }
        let mean = sum / area;
        let var = (sq / area - mean * mean).max(0.0);
        (mean, var.sqrt())
    }
}

// -- Global thresholds --------------------------------------------------------

pub fn histogram(gray: &GrayImage) -> [u64; 256] {
    let mut hist = [0u64; 256];
    for &v in gray.as_raw() {
        hist[v as usize] += 1;
    }
    hist
}

/// Otsu level of a histogram: the level `t` maximising between-class
/// variance when the classes are `<= t` and `> t`.
pub fn otsu_level(hist: &[u64; 256]) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 128;
    }
    let sum_total: f64 = hist
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut sum_dark = 0.0f64;
    let mut weight_dark = 0u64;
    let mut best_variance = 0.0f64;
    let mut best = 0u8;

    for (t, &count) in hist.iter().enumerate() {
        weight_dark += count;
        if weight_dark == 0 {
            continue;
        }
        let weight_light = total - weight_dark;
        if weight_light == 0 {
            break;
        }
        sum_dark += t as f64 * count as f64;
        let mean_dark = sum_dark / weight_dark as f64;
        let mean_light = (sum_total - sum_dark) / weight_light as f64;
        let between =
            weight_dark as f64 * weight_light as f64 * (mean_dark - mean_light).powi(2);
        if between > best_variance {
            best_variance = between;
            best = t as u8;
        }
    }
    best
}

pub fn otsu_threshold(gray: &GrayImage) -> u8 {
    otsu_level(&histogram(gray))
}

/// Samples strictly above `level` become paper (255), the rest ink (0).
pub fn binarize_at(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.iter_mut() {
        *p = if *p > level { 255 } else { 0 };
    }
    out
}

/// Ink mask (255 where ink) of the samples at or below `level`.
pub fn ink_mask(gray: &GrayImage, level: u8) -> GrayImage {
    let mut out = gray.clone();
    for p in out.iter_mut() {
        *p = if *p <= level { 255 } else { 0 };
    }
    out
}

/// Smallest level at or below which at least `q` of the samples fall.
pub fn percentile(hist: &[u64; 256], q: f64) -> u8 {
    let total: u64 = hist.iter().sum();
    if total == 0 {
        return 0;
    }
    let target = (q.clamp(0.0, 1.0) * total as f64).ceil().max(1.0) as u64;
    let mut acc = 0u64;
    for (level, &count) in hist.iter().enumerate() {
        acc += count;
        if acc >= target {
            return level as u8;
        }
    }
    255
}

// -- Local thresholds ---------------------------------------------------------

/// Sauvola local threshold: `T = m * (1 + k * (s / r - 1))` over a
/// `window` x `window` neighbourhood.
pub fn sauvola(gray: &GrayImage, window: u32, k: f32, dynamic_range: f32) -> GrayImage {
    let integral = IntegralImage::new(gray);
    let radius = window / 2;
    let (w, h) = gray.dimensions();
    let (k, r) = (k as f64, dynamic_range.max(1.0) as f64);

    GrayImage::from_fn(w, h, |x, y| {
        let (mean, std) = integral.mean_std(x, y, radius);
        let level = mean * (1.0 + k * (std / r - 1.0));
        let v = gray.get_pixel(x, y).0[0] as f64;
        Luma([if v > level { 255 } else { 0 }])
    })
}

/// Gaussian sigma matching an odd `block` size.
pub fn adaptive_sigma(block: u32) -> f32 {
    let block = block.max(3) as f32;
    0.3 * ((block - 1.0) * 0.5 - 1.0) + 0.8
}

/// Gaussian-weighted adaptive threshold: a sample is paper when it is
/// brighter than its blurred neighbourhood minus `offset`.
pub fn gaussian_adaptive(gray: &GrayImage, blurred: &GrayImage, offset: i32) -> GrayImage {
    let mut out = gray.clone();
    for (p, b) in out.iter_mut().zip(blurred.as_raw()) {
        let level = *b as i32 - offset;
        *p = if (*p as i32) > level { 255 } else { 0 };
    }
    out
}

/// Fraction of ink (zero) samples in a binary image.
pub fn foreground_ratio(binary: &GrayImage) -> f64 {
    let total = binary.as_raw().len();
    if total == 0 {
        return 0.0;
    }
    let ink = binary.as_raw().iter().filter(|&&v| v == 0).count();
    ink as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_image() -> GrayImage {
        GrayImage::from_fn(40, 10, |x, _| Luma([if x < 10 { 20 } else { 220 }]))
    }

    #[test]
    fn integral_mean_and_std_of_uniform_window() {
        let img = GrayImage::from_pixel(9, 9, Luma([100]));
        let integral = IntegralImage::new(&img);
        let (mean, std) = integral.mean_std(4, 4, 2);
        assert!((mean - 100.0).abs() < 1e-9);
        assert!(std.abs() < 1e-9);
        // Windows are clipped at the border.
        assert!((integral.mean(0, 0, 3) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn otsu_separates_bimodal_histogram() {
        let level = otsu_threshold(&split_image());
        assert!((20..220).contains(&level));
        let bin = binarize_at(&split_image(), level);
        assert!((foreground_ratio(&bin) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn otsu_of_uniform_image_keeps_everything_above() {
        let img = GrayImage::from_pixel(5, 5, Luma([200]));
        let level = otsu_threshold(&img);
        assert_eq!(foreground_ratio(&binarize_at(&img, level)), 0.0);
    }

    #[test]
    fn sauvola_keeps_blank_page_white() {
        let img = GrayImage::from_pixel(30, 30, Luma([240]));
        assert_eq!(foreground_ratio(&sauvola(&img, 25, 0.2, 128.0)), 0.0);
    }

    #[test]
    fn sauvola_marks_dark_strokes_as_ink() {
        let mut img = GrayImage::from_pixel(60, 60, Luma([230]));
        for y in 20..40 {
            for x in 28..31 {
                img.put_pixel(x, y, Luma([30]));
            }
        }
        let bin = sauvola(&img, 25, 0.2, 128.0);
        assert_eq!(bin.get_pixel(29, 30).0[0], 0);
        assert_eq!(bin.get_pixel(5, 5).0[0], 255);
    }

    #[test]
    fn percentile_walks_the_histogram() {
        let hist = histogram(&split_image());
        assert_eq!(percentile(&hist, 0.1), 20);
        assert_eq!(percentile(&hist, 0.95), 220);
    }

    #[test]
    fn adaptive_sigma_matches_block_size() {
        assert!((adaptive_sigma(15) - 2.6).abs() < 1e-5);
    }
}
