// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Backend-agnostic trait definitions for the primitive image operations the
// processing units delegate.

use image::GrayImage;
use scanprep_core::error::Result;

/// Primitive operations a compute backend executes.
///
/// Implementations must be observationally equivalent to the CPU backend up
/// to rounding: units and audit records never depend on which backend ran.
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// Short identifier recorded in reports (e.g. "cpu").
    fn name(&self) -> &str;

    /// Gaussian blur. A non-positive `sigma` returns a copy of the input.
    fn gaussian_blur(&self, image: &GrayImage, sigma: f32) -> GrayImage;

    /// Square median filter of the given radius. Radius 0 returns a copy.
    fn median_blur(&self, image: &GrayImage, radius: u32) -> GrayImage;

    /// Resample to exactly `width` x `height` with a low-pass filter.
    fn resize(&self, image: &GrayImage, width: u32, height: u32) -> GrayImage;

    /// Canny edge map (255 = edge).
    fn canny(&self, image: &GrayImage, low: f32, high: f32) -> GrayImage;

    /// Global threshold: pixels strictly above `level` become 255, others 0.
    fn threshold(&self, image: &GrayImage, level: u8) -> GrayImage;
}

/// Capability probe for an optional accelerated backend.
///
/// Probed exactly once when a pipeline is built; a failed probe selects the
/// CPU backend for the lifetime of that pipeline.
pub trait AcceleratorProbe {
    /// Human-readable accelerator name (e.g. "opencl", "cuda").
    fn accelerator_name(&self) -> &str;

    /// Initialise the accelerator and return its backend.
    fn probe(&self) -> Result<Box<dyn Backend>>;
}
