// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Grey-level morphology with square structuring elements.
//
// A square is applied as a horizontal line then a vertical line through
// `imageproc`'s mask morphology, which keeps the cost linear in the radius.
// Windows are clipped at the image border. Radii are capped at 255, the
// largest line mask `imageproc` accepts.

use image::{GrayImage, Luma};
use imageproc::morphology::{Mask, grayscale_dilate, grayscale_erode};

/// Direction of a line structuring element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Horizontal and vertical line masks of half length `radius`.
fn line_masks(radius: u32) -> (Mask, Mask) {
    let r = radius.min(u8::MAX as u32) as u8;
    let len = 2 * r as u32 + 1;
    let horizontal = Mask::from_image(&GrayImage::from_pixel(len, 1, Luma([255])), r, 0);
    let vertical = Mask::from_image(&GrayImage::from_pixel(1, len, Luma([255])), 0, r);
    (horizontal, vertical)
}

pub fn erode(gray: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    let (horizontal, vertical) = line_masks(radius);
    grayscale_erode(&grayscale_erode(gray, &horizontal), &vertical)
}

pub fn dilate(gray: &GrayImage, radius: u32) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    let (horizontal, vertical) = line_masks(radius);
    grayscale_dilate(&grayscale_dilate(gray, &horizontal), &vertical)
}

/// Closing: removes dark features narrower than the window.
pub fn close(gray: &GrayImage, radius: u32) -> GrayImage {
    erode(&dilate(gray, radius), radius)
}

/// Opening: removes bright features narrower than the window.
pub fn open(gray: &GrayImage, radius: u32) -> GrayImage {
    dilate(&erode(gray, radius), radius)
}

/// Opening with a line of half length `radius` along `axis`: keeps only
/// bright runs at least `2 * radius + 1` pixels long in that direction.
pub fn open_line(gray: &GrayImage, radius: u32, axis: Axis) -> GrayImage {
    if radius == 0 {
        return gray.clone();
    }
    let (horizontal, vertical) = line_masks(radius);
    let mask = match axis {
        Axis::Horizontal => horizontal,
        Axis::Vertical => vertical,
    };
    grayscale_dilate(&grayscale_erode(gray, &mask), &mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scrambled(w: u32, h: u32) -> GrayImage {
        GrayImage::from_fn(w, h, |x, y| Luma([((x * 73 + y * 151) ^ (x * y)) as u8]))
    }

    #[test]
    fn separable_square_matches_square_mask() {
        let img = scrambled(23, 17);
        for radius in [1u8, 2, 4] {
            let square = Mask::square(radius);
            assert_eq!(dilate(&img, radius as u32), grayscale_dilate(&img, &square));
            assert_eq!(erode(&img, radius as u32), grayscale_erode(&img, &square));
        }
    }

    #[test]
    fn zero_radius_is_identity() {
        let img = scrambled(9, 9);
        assert_eq!(close(&img, 0), img);
    }

    #[test]
    fn closing_removes_thin_dark_stroke() {
        let mut img = GrayImage::from_pixel(30, 30, Luma([220]));
        for y in 5..25 {
            img.put_pixel(15, y, Luma([10]));
        }
        let closed = close(&img, 3);
        assert!(closed.as_raw().iter().all(|&v| v == 220));
    }

    #[test]
    fn line_opening_keeps_only_long_runs() {
        let mut img = GrayImage::new(60, 20);
        for x in 5..55 {
            img.put_pixel(x, 4, Luma([255]));
        }
        for x in 10..18 {
            img.put_pixel(x, 12, Luma([255]));
        }
        for y in 2..18 {
            img.put_pixel(40, y, Luma([255]));
        }
        let rules = open_line(&img, 10, Axis::Horizontal);
        assert!((5..55).all(|x| rules.get_pixel(x, 4).0[0] == 255));
        assert_eq!(rules.get_pixel(12, 12).0[0], 0);
        assert_eq!(rules.get_pixel(40, 10).0[0], 0);

        let columns = open_line(&img, 5, Axis::Vertical);
        assert_eq!(columns.get_pixel(40, 10).0[0], 255);
        assert_eq!(columns.get_pixel(20, 4).0[0], 0);
    }

    #[test]
    fn opening_removes_small_bright_spot() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([50]));
        img.put_pixel(10, 10, Luma([250]));
        assert!(open(&img, 1).as_raw().iter().all(|&v| v == 50));
    }
}
