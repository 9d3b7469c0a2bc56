// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Numeric building blocks shared by the probe and the processing units.

pub mod clahe;
pub mod color;
pub mod components;
pub mod geometry;
pub mod inpaint;
pub mod morph;
pub mod spectrum;
pub mod threshold;

use image::GrayImage;

/// Factor that brings the longer side of `(w, h)` down to at most `max_side`.
pub fn downscale_factor(w: u32, h: u32, max_side: u32) -> f32 {
    let long = w.max(h);
    if long <= max_side || long == 0 {
        1.0
    } else {
        max_side as f32 / long as f32
    }
}

/// Mean absolute difference between two same-sized grey images.
pub fn mean_abs_diff(a: &GrayImage, b: &GrayImage) -> f32 {
    let n = a.as_raw().len().max(1);
    let total: u64 = a
        .as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    total as f32 / n as f32
}
