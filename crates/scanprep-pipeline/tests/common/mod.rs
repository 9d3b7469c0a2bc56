// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Shared fixtures for the pipeline integration tests: deterministic noise
// and synthetic scanned pages.

#![allow(dead_code)]

use image::{GrayImage, Luma};
use scanprep_backend::CpuBackend;
use scanprep_core::types::DocumentProfile;
use scanprep_imaging::{PageImage, PatternBand, Unit};
use scanprep_pipeline::{FinishedPage, PageContext};

pub const PAPER: u8 = 230;
pub const INK: u8 = 40;

/// Route pipeline logs to the test harness. `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ---------------------------------------------------------------------------
// Noise
// ---------------------------------------------------------------------------

/// Seeded xorshift generator, so every fixture is reproducible.
pub struct Noise(u32);

impl Noise {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    /// Uniform in [0, 1).
    pub fn uniform(&mut self) -> f32 {
        let mut s = self.0;
        s ^= s << 13;
        s ^= s >> 17;
        s ^= s << 5;
        self.0 = s;
        (s >> 8) as f32 / (1u32 << 24) as f32
    }

    /// Approximately normal with the given standard deviation.
    pub fn gaussian(&mut self, sigma: f32) -> f32 {
        let sum: f32 = (0..12).map(|_| self.uniform()).sum();
        (sum - 6.0) * sigma
    }

    pub fn below(&mut self, n: u32) -> u32 {
        ((self.uniform() * n as f32) as u32).min(n.saturating_sub(1))
    }
}

fn add_noise(gray: &mut GrayImage, sigma: f32, seed: u32) {
    let mut noise = Noise::new(seed);
    for p in gray.iter_mut() {
        *p = (*p as f32 + noise.gaussian(sigma)).round().clamp(0.0, 255.0) as u8;
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// A scanned page: a black scanner border `border` pixels wide, text
/// rotated `tilt_deg` clockwise about the centre, Gaussian noise of `sigma`.
///
/// The text block covers three quarters of the width and 11/15 of the
/// height. Glyphs are 20x20 squares on a 30x50 grid.
pub fn scanned_page(
    width: u32,
    height: u32,
    border: u32,
    tilt_deg: f32,
    sigma: f32,
) -> GrayImage {
    let (sin, cos) = tilt_deg.to_radians().sin_cos();
    let (cx, cy) = (width as f32 / 2.0, height as f32 / 2.0);
    let half_w = width as f32 * 3.0 / 8.0;
    let half_h = height as f32 * 11.0 / 30.0;

    let mut gray = GrayImage::from_fn(width, height, |x, y| {
        let inside = x >= border && y >= border && x < width - border && y < height - border;
        if !inside {
            return Luma([0]);
        }
        let (dx, dy) = (x as f32 + 0.5 - cx, y as f32 + 0.5 - cy);
        let u = dx * cos + dy * sin + half_w;
        let v = -dx * sin + dy * cos + half_h;
        let in_block = (0.0..2.0 * half_w).contains(&u) && (0.0..2.0 * half_h).contains(&v);
        let glyph = in_block && u.rem_euclid(30.0) < 20.0 && v.rem_euclid(50.0) < 20.0;
        Luma([if glyph { INK } else { PAPER }])
    });
    if sigma > 0.0 {
        add_noise(&mut gray, sigma, width ^ (height << 12));
    }
    gray
}

/// Clean, upright text well away from the frame.
pub fn clean_text_page(width: u32, height: u32) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let in_block = (width / 6..width * 5 / 6).contains(&x)
            && (height / 6..height * 5 / 6).contains(&y);
        let glyph = in_block && (x / 7) % 3 != 0 && (y / 12) % 2 == 0;
        Luma([if glyph { 30 } else { PAPER }])
    })
}

/// A light page whose only ink is one row of tiny specks.
pub fn specks_only_page() -> GrayImage {
    GrayImage::from_fn(160, 160, |x, y| {
        let speck = y == 146 && (5..125).contains(&x) && (x - 5) % 3 < 2;
        Luma([if speck { 20 } else { 235 }])
    })
}

/// Sparse text blocks: 12x16 glyphs in 20x28 cells, about a third of the
/// cells filled, jittered by up to 4 pixels so neighbours never touch.
pub fn sparse_text(size: u32, seed: u32) -> Vec<(u32, u32)> {
    let mut noise = Noise::new(seed);
    let mut glyphs = Vec::new();
    for cy in (16..size - 44).step_by(28) {
        for cx in (16..size - 36).step_by(20) {
            if noise.uniform() < 0.3 {
                glyphs.push((cx + noise.below(5), cy + noise.below(5)));
            }
        }
    }
    glyphs
}

/// Square page with `glyphs` printed over an optional concentric
/// guilloche of period 5 pixels centred on the page.
pub fn guilloche_page(size: u32, glyphs: &[(u32, u32)], pattern: bool) -> GrayImage {
    let c = size as f32 / 2.0;
    let mut mask = vec![false; (size * size) as usize];
    for &(gx, gy) in glyphs {
        for y in gy..(gy + 16).min(size) {
            for x in gx..(gx + 12).min(size) {
                mask[(y * size + x) as usize] = true;
            }
        }
    }
    GrayImage::from_fn(size, size, |x, y| {
        if mask[(y * size + x) as usize] {
            return Luma([30]);
        }
        if !pattern {
            return Luma([180]);
        }
        let d = (x as f32 - c).hypot(y as f32 - c);
        let wave = 60.0 * (2.0 * std::f32::consts::PI * d / 5.0).cos();
        Luma([(180.0 + wave).round() as u8])
    })
}

pub fn page(gray: GrayImage) -> PageImage {
    PageImage::from_gray(gray).expect("fixture pages are never empty")
}

/// Run `units` over `image` on the CPU backend, outside any pipeline.
pub fn run_units(image: PageImage, profile: &DocumentProfile, units: &[Unit]) -> FinishedPage {
    let mut ctx = PageContext::new(image, profile, None, &CpuBackend, PatternBand::default());
    for unit in units {
        ctx.run_unit(unit);
    }
    ctx.finish()
}
