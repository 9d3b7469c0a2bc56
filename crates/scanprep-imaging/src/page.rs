// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page image: the immutable 8-bit sample grid handed from unit to unit.

use std::borrow::Cow;
use std::sync::Arc;

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage, imageops};
use imageproc::geometric_transformations::Projection;
use scanprep_core::error::{Result, ScanprepError};

use crate::ops::{color, geometry, inpaint};

#[derive(Debug, Clone, PartialEq)]
enum Pixels {
    Gray(GrayImage),
    Rgb(RgbImage),
}

/// A decoded page, either single-channel or RGB, 8 bits per sample.
///
/// The buffer is shared behind an `Arc` and never mutated in place. Every
/// transforming method returns a new `PageImage` with its own buffer, so a
/// unit's input stays valid for rollback and for the audit digests after the
/// unit has produced its output. Cloning is cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct PageImage {
    pixels: Arc<Pixels>,
}

impl PageImage {
    // -- Construction ---------------------------------------------------------

    /// Wrap a decoded image, normalising it to 8-bit grey or RGB.
    ///
    /// Alpha is dropped and 16-bit or float samples are rescaled to 8 bits.
    /// Zero-sized images are rejected.
    pub fn from_dynamic(image: DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(ScanprepError::EmptyImage { width, height });
        }
        let pixels = match image {
            DynamicImage::ImageLuma8(gray) => Pixels::Gray(gray),
            DynamicImage::ImageRgb8(rgb) => Pixels::Rgb(rgb),
            other if other.color().has_color() => Pixels::Rgb(other.to_rgb8()),
            other => Pixels::Gray(other.to_luma8()),
        };
        Ok(Self::wrap(pixels))
    }

    pub fn from_gray(gray: GrayImage) -> Result<Self> {
        let (width, height) = gray.dimensions();
        if width == 0 || height == 0 {
            return Err(ScanprepError::EmptyImage { width, height });
        }
        Ok(Self::gray(gray))
    }

    pub fn from_rgb(rgb: RgbImage) -> Result<Self> {
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(ScanprepError::EmptyImage { width, height });
        }
        Ok(Self::rgb(rgb))
    }

    /// Unchecked constructors for buffers derived from an existing page.
    pub(crate) fn gray(gray: GrayImage) -> Self {
        Self::wrap(Pixels::Gray(gray))
    }

    pub(crate) fn rgb(rgb: RgbImage) -> Self {
        Self::wrap(Pixels::Rgb(rgb))
    }

    fn wrap(pixels: Pixels) -> Self {
        Self {
            pixels: Arc::new(pixels),
        }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.dimensions().0
    }

    pub fn height(&self) -> u32 {
        self.dimensions().1
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => g.dimensions(),
            Pixels::Rgb(c) => c.dimensions(),
        }
    }

    /// Samples per pixel: 1 for grey, 3 for RGB.
    pub fn channels(&self) -> u8 {
        match self.pixels.as_ref() {
            Pixels::Gray(_) => 1,
            Pixels::Rgb(_) => 3,
        }
    }

    /// Bits per sample. Always 8 after normalisation.
    pub fn bit_depth(&self) -> u8 {
        8
    }

    pub fn is_color(&self) -> bool {
        matches!(self.pixels.as_ref(), Pixels::Rgb(_))
    }

    pub fn as_gray(&self) -> Option<&GrayImage> {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => Some(g),
            Pixels::Rgb(_) => None,
        }
    }

    pub fn as_rgb(&self) -> Option<&RgbImage> {
        match self.pixels.as_ref() {
            Pixels::Rgb(c) => Some(c),
            Pixels::Gray(_) => None,
        }
    }

    /// Raw interleaved samples, row-major.
    pub fn as_bytes(&self) -> &[u8] {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => g.as_raw(),
            Pixels::Rgb(c) => c.as_raw(),
        }
    }

    /// Luminance plane (Rec. 601). Borrowed for grey pages.
    pub fn luma(&self) -> Cow<'_, GrayImage> {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => Cow::Borrowed(g),
            Pixels::Rgb(c) => Cow::Owned(color::luma_of(c)),
        }
    }

    /// True when both handles point at the same buffer.
    pub fn shares_buffer(&self, other: &PageImage) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }

    // -- Derivations (return a new page) --------------------------------------

    /// Replace the luminance while keeping chroma.
    ///
    /// Grey pages take `luma` as-is. RGB pages get the same per-pixel offset
    /// added to all three channels, which moves luminance and leaves the
    /// colour-difference components untouched (up to clamping).
    pub fn with_luma(&self, luma: &GrayImage) -> PageImage {
        match self.pixels.as_ref() {
            Pixels::Gray(_) => Self::gray(luma.clone()),
            Pixels::Rgb(c) => {
                let old = color::luma_of(c);
                Self::rgb(color::shift_luma(c, &old, luma))
            }
        }
    }

    /// Paint every pixel where `mask` is non-zero with grey level `value`.
    pub fn paint(&self, mask: &GrayImage, value: u8) -> PageImage {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => {
                let mut out = g.clone();
                for (p, m) in out.pixels_mut().zip(mask.pixels()) {
                    if m.0[0] != 0 {
                        *p = Luma([value]);
                    }
                }
                Self::gray(out)
            }
            Pixels::Rgb(c) => {
                let mut out = c.clone();
                for (p, m) in out.pixels_mut().zip(mask.pixels()) {
                    if m.0[0] != 0 {
                        *p = Rgb([value, value, value]);
                    }
                }
                Self::rgb(out)
            }
        }
    }

    /// Rotate clockwise by `quarter_turns` x 90°.
    pub fn rotate_quarters(&self, quarter_turns: u32) -> PageImage {
        match (self.pixels.as_ref(), quarter_turns % 4) {
            (_, 0) => self.clone(),
            (Pixels::Gray(g), 1) => Self::gray(imageops::rotate90(g)),
            (Pixels::Gray(g), 2) => Self::gray(imageops::rotate180(g)),
            (Pixels::Gray(g), _) => Self::gray(imageops::rotate270(g)),
            (Pixels::Rgb(c), 1) => Self::rgb(imageops::rotate90(c)),
            (Pixels::Rgb(c), 2) => Self::rgb(imageops::rotate180(c)),
            (Pixels::Rgb(c), _) => Self::rgb(imageops::rotate270(c)),
        }
    }

    /// Rotate about the centre by `angle_deg` (clockwise on screen), growing
    /// the canvas so no content is cut off. Uncovered area is white.
    pub fn rotate_expanded(&self, angle_deg: f32) -> PageImage {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => Self::gray(geometry::rotate_expanded(g, angle_deg, Luma([255]))),
            Pixels::Rgb(c) => {
                Self::rgb(geometry::rotate_expanded(c, angle_deg, Rgb([255, 255, 255])))
            }
        }
    }

    /// Apply a projective warp into a `width` x `height` canvas.
    pub fn warp(&self, projection: &Projection, width: u32, height: u32) -> PageImage {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => {
                Self::gray(geometry::warp_to(g, projection, width, height, Luma([255])))
            }
            Pixels::Rgb(c) => Self::rgb(geometry::warp_to(
                c,
                projection,
                width,
                height,
                Rgb([255, 255, 255]),
            )),
        }
    }

    /// Fill the masked pixels from their surroundings.
    pub fn inpaint(&self, mask: &GrayImage) -> PageImage {
        let (width, height) = self.dimensions();
        match self.pixels.as_ref() {
            Pixels::Gray(g) => {
                let mut out = g.clone();
                inpaint::fill(&mut out, width, height, 1, mask);
                Self::gray(out)
            }
            Pixels::Rgb(c) => {
                let mut out = c.clone();
                inpaint::fill(&mut out, width, height, 3, mask);
                Self::rgb(out)
            }
        }
    }

    /// Overwrite a rectangle with grey samples, leaving everything else as is.
    pub fn blit_gray(&self, patch: &GrayImage, x0: u32, y0: u32) -> PageImage {
        match self.pixels.as_ref() {
            Pixels::Gray(g) => {
                let mut out = g.clone();
                imageops::replace(&mut out, patch, x0 as i64, y0 as i64);
                Self::gray(out)
            }
            Pixels::Rgb(c) => {
                let mut out = c.clone();
                for (x, y, p) in patch.enumerate_pixels() {
                    let (tx, ty) = (x0 + x, y0 + y);
                    if tx < out.width() && ty < out.height() {
                        let v = p.0[0];
                        out.put_pixel(tx, ty, Rgb([v, v, v]));
                    }
                }
                Self::rgb(out)
            }
        }
    }
}
