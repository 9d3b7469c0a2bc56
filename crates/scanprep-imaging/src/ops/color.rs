// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Colour-space helpers: Rec. 601 luma, HSV saturation/value planes and CIE
// Lab chroma for 8-bit sRGB pages.

use std::sync::OnceLock;

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Rec. 601 luma, rounded.
#[inline]
pub fn luma_sample(p: &Rgb<u8>) -> u8 {
    let [r, g, b] = p.0;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32 + 500) / 1000) as u8
}

pub fn luma_of(rgb: &RgbImage) -> GrayImage {
    let (w, h) = rgb.dimensions();
    GrayImage::from_fn(w, h, |x, y| Luma([luma_sample(rgb.get_pixel(x, y))]))
}

/// Add `new - old` to every channel of each pixel.
pub fn shift_luma(rgb: &RgbImage, old: &GrayImage, new: &GrayImage) -> RgbImage {
    let mut out = rgb.clone();
    for ((p, o), n) in out.pixels_mut().zip(old.as_raw()).zip(new.as_raw()) {
        let delta = *n as i16 - *o as i16;
        for c in p.0.iter_mut() {
            *c = (*c as i16 + delta).clamp(0, 255) as u8;
        }
    }
    out
}

/// HSV saturation and value planes scaled to 0..=255.
pub fn saturation_value(rgb: &RgbImage) -> (GrayImage, GrayImage) {
    let (w, h) = rgb.dimensions();
    let mut sat = GrayImage::new(w, h);
    let mut val = GrayImage::new(w, h);
    for (x, y, p) in rgb.enumerate_pixels() {
        let max = p.0.iter().copied().max().unwrap_or(0);
        let min = p.0.iter().copied().min().unwrap_or(0);
        let s = if max == 0 {
            0
        } else {
            ((max - min) as u32 * 255 / max as u32) as u8
        };
        sat.put_pixel(x, y, Luma([s]));
        val.put_pixel(x, y, Luma([max]));
    }
    (sat, val)
}

pub fn mean_saturation(rgb: &RgbImage) -> f32 {
    let (sat, _) = saturation_value(rgb);
    let n = sat.as_raw().len().max(1);
    sat.as_raw().iter().map(|&v| v as u64).sum::<u64>() as f32 / n as f32
}

fn linear_lut() -> &'static [f32; 256] {
    static LUT: OnceLock<[f32; 256]> = OnceLock::new();
    LUT.get_or_init(|| {
        let mut lut = [0.0f32; 256];
        for (i, v) in lut.iter_mut().enumerate() {
            let c = i as f32 / 255.0;
            *v = if c <= 0.04045 {
                c / 12.92
            } else {
                ((c + 0.055) / 1.055).powf(2.4)
            };
        }
        lut
    })
}

fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    if t > DELTA * DELTA * DELTA {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// CIE Lab (D65) of one sRGB pixel.
pub fn lab(p: &Rgb<u8>) -> [f32; 3] {
    let lut = linear_lut();
    let [r, g, b] = p.0.map(|c| lut[c as usize]);
    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / 0.95047;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / 1.08883;
    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    [116.0 * fy - 16.0, 500.0 * (fx - fy), 200.0 * (fy - fz)]
}

/// Per-pixel (a, b) chroma components, row-major.
pub fn chroma_ab(rgb: &RgbImage) -> Vec<[f32; 2]> {
    rgb.pixels()
        .map(|p| {
            let [_, a, b] = lab(p);
            [a, b]
        })
        .collect()
}

/// Mean of each channel.
pub fn channel_means(rgb: &RgbImage) -> [f64; 3] {
    let mut sums = [0u64; 3];
    for p in rgb.pixels() {
        for (s, c) in sums.iter_mut().zip(p.0) {
            *s += c as u64;
        }
    }
    let n = (rgb.width() as u64 * rgb.height() as u64).max(1) as f64;
    sums.map(|s| s as f64 / n)
}

/// Gray-world white balance: scale each channel so its mean matches the
/// mean of all three.
pub fn gray_world(rgb: &RgbImage) -> RgbImage {
    let means = channel_means(rgb);
    let target = means.iter().sum::<f64>() / 3.0;
    let gains = means.map(|m| if m > 0.0 { target / m } else { 1.0 });
    let mut out = rgb.clone();
    for p in out.pixels_mut() {
        for (c, g) in p.0.iter_mut().zip(gains) {
            *c = (*c as f64 * g).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Stretch each channel linearly so that `tail` of its samples clip at
/// either end. Channels with no spread are left as they are.
pub fn stretch_channels(rgb: &RgbImage, tail: f64) -> RgbImage {
    let mut hists = [[0u64; 256]; 3];
    for p in rgb.pixels() {
        for (h, c) in hists.iter_mut().zip(p.0) {
            h[c as usize] += 1;
        }
    }
    let ranges = hists.map(|h| {
        let lo = super::threshold::percentile(&h, tail) as f32;
        let hi = super::threshold::percentile(&h, 1.0 - tail) as f32;
        (hi > lo).then_some((lo, 255.0 / (hi - lo)))
    });
    let mut out = rgb.clone();
    for p in out.pixels_mut() {
        for (c, range) in p.0.iter_mut().zip(ranges) {
            if let Some((lo, scale)) = range {
                *c = ((*c as f32 - lo) * scale).round().clamp(0.0, 255.0) as u8;
            }
        }
    }
    out
}
