// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Strength functions: map a measurement to a transform intensity.
//
// Every function here is pure, monotone in its measurement and clamped to the
// configured bounds. Non-finite measurements map to the weakest setting.

use scanprep_core::config::{DenoiseConfig, EnhanceConfig};

/// Contrast (tone std-dev) at or below which enhancement runs at full strength.
pub const LOW_CONTRAST: f32 = 20.0;
/// Contrast at or above which enhancement runs at minimum strength.
pub const HIGH_CONTRAST: f32 = 80.0;

/// Denoise strength, non-decreasing in the measured noise.
///
/// Reaches `max_strength` at twice the noise threshold.
pub fn denoise_strength(noise: f32, cfg: &DenoiseConfig) -> f32 {
    if !noise.is_finite() || cfg.noise_threshold <= 0.0 {
        return cfg.min_strength;
    }
    (noise / (2.0 * cfg.noise_threshold)).clamp(cfg.min_strength, cfg.max_strength)
}

/// Gaussian sigma for a denoise strength, capped at `max_sigma`.
pub fn gaussian_sigma(strength: f32, cfg: &DenoiseConfig) -> f32 {
    (0.5 + strength.max(0.0)).min(cfg.max_sigma)
}

/// Median pre-filter radius: only strong denoising gets one.
pub fn median_radius(strength: f32) -> u32 {
    if strength >= 0.5 { 1 } else { 0 }
}

/// 0.0 at low contrast, 1.0 at high contrast.
fn contrast_position(contrast_std: f32) -> f32 {
    if !contrast_std.is_finite() {
        return 1.0;
    }
    ((contrast_std - LOW_CONTRAST) / (HIGH_CONTRAST - LOW_CONTRAST)).clamp(0.0, 1.0)
}

/// Linear from `hi` at t = 0 down to `lo` at t = 1, exact at both ends.
fn falling(t: f32, lo: f32, hi: f32) -> f32 {
    if t <= 0.0 {
        hi
    } else if t >= 1.0 {
        lo
    } else {
        (hi - t * (hi - lo)).clamp(lo, hi)
    }
}

/// CLAHE clip limit, non-increasing in contrast.
pub fn clahe_clip_limit(contrast_std: f32, cfg: &EnhanceConfig) -> f32 {
    falling(
        contrast_position(contrast_std),
        cfg.min_clip_limit,
        cfg.max_clip_limit,
    )
}

/// Unsharp-mask amount, non-increasing in contrast.
pub fn unsharp_amount(contrast_std: f32, cfg: &EnhanceConfig) -> f32 {
    falling(contrast_position(contrast_std), cfg.min_unsharp, cfg.max_unsharp)
}
