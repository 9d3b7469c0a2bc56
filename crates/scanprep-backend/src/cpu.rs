// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default CPU backend built on `image` and `imageproc`.

use image::GrayImage;
use image::imageops::{self, FilterType};
use imageproc::edges::canny;
use imageproc::filter::{gaussian_blur_f32, median_filter};

use crate::traits::Backend;

/// Portable backend that is always available.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn gaussian_blur(&self, image: &GrayImage, sigma: f32) -> GrayImage {
        if sigma <= 0.0 || !sigma.is_finite() {
            return image.clone();
        }
        gaussian_blur_f32(image, sigma)
    }

    fn median_blur(&self, image: &GrayImage, radius: u32) -> GrayImage {
        if radius == 0 {
            return image.clone();
        }
        median_filter(image, radius, radius)
    }

    fn resize(&self, image: &GrayImage, width: u32, height: u32) -> GrayImage {
        if image.dimensions() == (width, height) {
            return image.clone();
        }
        imageops::resize(image, width.max(1), height.max(1), FilterType::Triangle)
    }

    fn canny(&self, image: &GrayImage, low: f32, high: f32) -> GrayImage {
        canny(image, low, high)
    }

    fn threshold(&self, image: &GrayImage, level: u8) -> GrayImage {
        let mut out = image.clone();
        for p in out.iter_mut() {
            *p = if *p > level { 255 } else { 0 };
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn zero_sigma_blur_is_identity() {
        let img = GrayImage::from_fn(16, 16, |x, y| Luma([((x * 13 + y * 7) % 256) as u8]));
        assert_eq!(CpuBackend.gaussian_blur(&img, 0.0), img);
        assert_eq!(CpuBackend.median_blur(&img, 0), img);
    }

    #[test]
    fn median_removes_isolated_dot() {
        let mut img = GrayImage::from_pixel(9, 9, Luma([200u8]));
        img.put_pixel(4, 4, Luma([0u8]));
        let out = CpuBackend.median_blur(&img, 1);
        assert_eq!(out.get_pixel(4, 4).0[0], 200);
    }

    #[test]
    fn threshold_is_strictly_above() {
        let img = GrayImage::from_raw(3, 1, vec![127, 128, 129]).unwrap();
        let out = CpuBackend.threshold(&img, 128);
        assert_eq!(out.into_raw(), vec![0, 0, 255]);
    }

    #[test]
    fn resize_hits_requested_dimensions() {
        let img = GrayImage::from_pixel(100, 40, Luma([90u8]));
        let out = CpuBackend.resize(&img, 50, 20);
        assert_eq!(out.dimensions(), (50, 20));
        assert!(out.pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn canny_finds_step_edge() {
        let img = GrayImage::from_fn(32, 32, |x, _| Luma([if x < 16 { 20 } else { 230 }]));
        let edges = CpuBackend.canny(&img, 50.0, 150.0);
        assert!(edges.pixels().any(|p| p.0[0] == 255));
    }
}
