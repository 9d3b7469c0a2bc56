// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// 2D Fourier analysis of page luminance: radial power profiles for periodic
// pattern detection and radial notch filtering for pattern removal.
//
// Radii are measured in cycles per longer image side, so a pattern reports
// the same radius on a downsampled copy as on the full-resolution page.
// Angles are folded onto a half turn since a real image has a symmetric
// spectrum.

use image::GrayImage;
use rustfft::FftPlanner;
use rustfft::num_complex::Complex;

/// Angular sectors a half turn of the spectrum is split into.
pub const SECTORS: usize = 16;

/// Frequency-domain copy of a real image.
pub struct Spectrum {
    width: usize,
    height: usize,
    data: Vec<Complex<f32>>,
}

impl Spectrum {
    /// Forward transform of a grey image with its mean removed.
    ///
    /// Returns the spectrum and the removed mean.
    pub fn of_gray(gray: &GrayImage) -> (Self, f32) {
        let n = gray.as_raw().len().max(1);
        let mean = gray.as_raw().iter().map(|&v| v as f64).sum::<f64>() / n as f64;
        let samples: Vec<f32> = gray.as_raw().iter().map(|&v| v as f32 - mean as f32).collect();
        let spectrum = Self::forward(&samples, gray.width() as usize, gray.height() as usize);
        (spectrum, mean as f32)
    }

    pub fn forward(samples: &[f32], width: usize, height: usize) -> Self {
        let mut data: Vec<Complex<f32>> = samples.iter().map(|&v| Complex::new(v, 0.0)).collect();
        fft2d(&mut data, width, height, false);
        Self {
            width,
            height,
            data,
        }
    }

    /// Inverse transform, returning the real part scaled back to sample units.
    pub fn inverse(mut self) -> Vec<f32> {
        fft2d(&mut self.data, self.width, self.height, true);
        let scale = 1.0 / (self.width * self.height).max(1) as f32;
        self.data.iter().map(|c| c.re * scale).collect()
    }

    /// Frequency of bin (kx, ky) in cycles per longer side.
    fn frequency(&self, kx: usize, ky: usize) -> (f32, f32) {
        let long = self.width.max(self.height) as f32;
        let fx = signed_index(kx, self.width) * long / self.width as f32;
        let fy = signed_index(ky, self.height) * long / self.height as f32;
        (fx, fy)
    }

    /// Radius of bin (kx, ky) in cycles per longer side.
    pub fn radius(&self, kx: usize, ky: usize) -> f32 {
        let (fx, fy) = self.frequency(kx, ky);
        fx.hypot(fy)
    }

    pub fn ring_profile(&self) -> RingProfile {
        let max_r = self.radius(self.width / 2, self.height / 2).ceil() as usize + 2;
        let mut power = vec![0.0f64; max_r];
        let mut count = vec![0u64; max_r];
        let mut sectors = vec![[0.0f64; SECTORS]; max_r];
        let mut total = 0.0f64;
        let sector_width = std::f32::consts::PI / SECTORS as f32;

        for ky in 0..self.height {
            for kx in 0..self.width {
                if kx == 0 && ky == 0 {
                    continue;
                }
                let p = self.data[ky * self.width + kx].norm_sqr() as f64;
                let (fx, fy) = self.frequency(kx, ky);
                let r = (fx.hypot(fy).round() as usize).min(max_r - 1);
                let angle = fy.atan2(fx).rem_euclid(std::f32::consts::PI);
                let sector = (angle / sector_width) as usize % SECTORS;
                power[r] += p;
                count[r] += 1;
                sectors[r][sector] += p;
                total += p;
            }
        }

        RingProfile {
            power,
            count,
            sectors,
            total,
        }
    }

    /// Multiply every bin by `gain(radius)`. DC is left untouched.
    pub fn apply_radial_gain(&mut self, gain: impl Fn(f32) -> f32) {
        for ky in 0..self.height {
            for kx in 0..self.width {
                if kx == 0 && ky == 0 {
                    continue;
                }
                let g = gain(self.radius(kx, ky));
                self.data[ky * self.width + kx] *= g;
            }
        }
    }
}

fn signed_index(k: usize, n: usize) -> f32 {
    if k <= n / 2 {
        k as f32
    } else {
        k as f32 - n as f32
    }
}

fn fft2d(data: &mut [Complex<f32>], width: usize, height: usize, inverse: bool) {
    if width == 0 || height == 0 {
        return;
    }
    let mut planner = FftPlanner::<f32>::new();
    let (row_fft, col_fft) = if inverse {
        (planner.plan_fft_inverse(width), planner.plan_fft_inverse(height))
    } else {
        (planner.plan_fft_forward(width), planner.plan_fft_forward(height))
    };

    row_fft.process(data);
    let mut columns = transpose(data, width, height);
    col_fft.process(&mut columns);
    data.copy_from_slice(&transpose(&columns, height, width));
}

/// Transpose a row-major `width` x `height` buffer.
fn transpose(src: &[Complex<f32>], width: usize, height: usize) -> Vec<Complex<f32>> {
    let mut out = vec![Complex::new(0.0, 0.0); src.len()];
    for y in 0..height {
        for x in 0..width {
            out[x * height + y] = src[y * width + x];
        }
    }
    out
}

/// Spectral power accumulated per integer radius and angular sector.
pub struct RingProfile {
    power: Vec<f64>,
    count: Vec<u64>,
    sectors: Vec<[f64; SECTORS]>,
    total: f64,
}

impl RingProfile {
    /// Total power excluding DC.
    pub fn total(&self) -> f64 {
        self.total
    }

    /// Mean power per bin on ring `r`.
    pub fn mean_power(&self, r: usize) -> f64 {
        match (self.power.get(r), self.count.get(r)) {
            (Some(&p), Some(&c)) if c > 0 => p / c as f64,
            _ => 0.0,
        }
    }

    /// Power summed over rings `lo..=hi`.
    pub fn band_power(&self, lo: usize, hi: usize) -> f64 {
        if lo >= self.power.len() {
            return 0.0;
        }
        let hi = hi.min(self.power.len() - 1);
        self.power[lo..=hi].iter().sum()
    }

    fn band_count(&self, lo: usize, hi: usize) -> u64 {
        if lo >= self.count.len() {
            return 0;
        }
        let hi = hi.min(self.count.len() - 1);
        self.count[lo..=hi].iter().sum()
    }

    /// Power rings `lo..=hi` would hold if they carried the mean per-bin
    /// power of the rings flanking them on either side.
    pub fn flank_baseline(&self, lo: usize, hi: usize) -> f64 {
        let reach = (hi - lo).max(2);
        let mut power = 0.0;
        let mut bins = 0u64;
        if lo > 0 {
            let below = lo.saturating_sub(reach);
            power += self.band_power(below, lo - 1);
            bins += self.band_count(below, lo - 1);
        }
        power += self.band_power(hi + 1, hi + reach);
        bins += self.band_count(hi + 1, hi + reach);
        if bins == 0 {
            return 0.0;
        }
        power / bins as f64 * self.band_count(lo, hi) as f64
    }

    /// How evenly the power of rings `lo..=hi` spreads over the angular
    /// sectors: 1 for a full ring, `1 / SECTORS` for a single direction.
    pub fn angular_spread(&self, lo: usize, hi: usize) -> f64 {
        if lo >= self.sectors.len() {
            return 0.0;
        }
        let hi = hi.min(self.sectors.len() - 1);
        let mut per_sector = [0.0f64; SECTORS];
        for ring in &self.sectors[lo..=hi] {
            for (acc, p) in per_sector.iter_mut().zip(ring) {
                *acc += p;
            }
        }
        let sum: f64 = per_sector.iter().sum();
        let sum_sq: f64 = per_sector.iter().map(|p| p * p).sum();
        if sum_sq <= f64::EPSILON {
            return 0.0;
        }
        sum * sum / (SECTORS as f64 * sum_sq)
    }

    /// Strongest ring window of `half_width` whose centre lies in
    /// `[min_radius, max_radius]`.
    ///
    /// A window scores the power it holds above its flank baseline, as a
    /// share of the total non-DC power, weighted by its angular spread.
    /// Curved line work fills a whole ring; regular text rows and columns
    /// only put power into a few directions and score low. Returns the
    /// best score and the single ring of highest mean power inside the
    /// winning window. An image without such a ring reports `(0.0, 0)`.
    pub fn strongest_ring(&self, min_radius: u32, max_radius: u32, half_width: u32) -> (f32, u32) {
        if self.total <= f64::EPSILON {
            return (0.0, 0);
        }
        let hw = half_width as usize;
        let mut best: Option<(f64, usize, usize)> = None;
        for centre in min_radius as usize..=max_radius as usize {
            let (lo, hi) = (centre.saturating_sub(hw), centre + hw);
            let excess = self.band_power(lo, hi) - self.flank_baseline(lo, hi);
            if excess <= 0.0 {
                continue;
            }
            let score = excess * self.angular_spread(lo, hi);
            if best.is_none_or(|(top, _, _)| score > top) {
                best = Some((score, lo, hi));
            }
        }

        let Some((score, lo, hi)) = best else {
            return (0.0, 0);
        };
        let hi = hi.min(self.power.len().saturating_sub(1));
        let peak = (lo..=hi)
            .max_by(|&a, &b| self.mean_power(a).total_cmp(&self.mean_power(b)))
            .unwrap_or(lo);
        (((score / self.total) as f32).clamp(0.0, 1.0), peak as u32)
    }
}

/// Radial notch: `floor` inside `[lo, hi]`, rising to 1 over a raised
/// cosine of width `taper` on either side.
pub fn notch_gain(r: f32, lo: f32, hi: f32, taper: f32, floor: f32) -> f32 {
    if (lo..=hi).contains(&r) {
        return floor;
    }
    let d = if r < lo { lo - r } else { r - hi };
    if taper <= 0.0 || d >= taper {
        return 1.0;
    }
    let rise = 0.5 * (1.0 - (std::f32::consts::PI * d / taper).cos());
    floor + (1.0 - floor) * rise
}
