// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Neighbourhood inpainting: masked pixels are rebuilt from the outside in,
// each taking the mean of its already-known 8-neighbours.

use image::GrayImage;

/// Fill every pixel where `mask` is non-zero in an interleaved buffer of
/// `channels` samples per pixel.
///
/// Filling proceeds in layers, so a pixel only sees values from the previous
/// layer. Masked pixels with no known pixel anywhere (a fully masked image)
/// are left as they were.
pub fn fill(samples: &mut [u8], width: u32, height: u32, channels: usize, mask: &GrayImage) {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 || samples.len() != w * h * channels {
        return;
    }
    let mut unknown: Vec<bool> = mask.as_raw().iter().map(|&m| m != 0).collect();
    if unknown.len() != w * h {
        return;
    }

    let neighbours = |i: usize| {
        let (x, y) = ((i % w) as i64, (i / w) as i64);
        (-1i64..=1)
            .flat_map(move |dy| (-1i64..=1).map(move |dx| (dx, dy)))
            .filter(|&(dx, dy)| dx != 0 || dy != 0)
            .filter_map(move |(dx, dy)| {
                let (nx, ny) = (x + dx, y + dy);
                (nx >= 0 && ny >= 0 && nx < w as i64 && ny < h as i64)
                    .then_some(ny as usize * w + nx as usize)
            })
    };

    let mut frontier: Vec<usize> = (0..w * h)
        .filter(|&i| unknown[i] && neighbours(i).any(|n| !unknown[n]))
        .collect();

    while !frontier.is_empty() {
        let mut filled: Vec<(usize, Vec<u8>)> = Vec::with_capacity(frontier.len());
        for &i in &frontier {
            let mut acc = vec![0u32; channels];
            let mut n_known = 0u32;
            for n in neighbours(i).filter(|&n| !unknown[n]) {
                for (c, a) in acc.iter_mut().enumerate() {
                    *a += samples[n * channels + c] as u32;
                }
                n_known += 1;
            }
            if n_known > 0 {
                let value = acc.iter().map(|a| ((a + n_known / 2) / n_known) as u8).collect();
                filled.push((i, value));
            }
        }

        for (i, value) in &filled {
            samples[i * channels..(i + 1) * channels].copy_from_slice(value);
            unknown[*i] = false;
        }

        let mut next: Vec<usize> = filled
            .iter()
            .flat_map(|(i, _)| neighbours(*i))
            .filter(|&n| unknown[n])
            .collect();
        next.sort_unstable();
        next.dedup();
        frontier = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn fills_hole_from_surroundings() {
        let (w, h) = (9u32, 9u32);
        let mut samples = vec![80u8; 81];
        let mut mask = GrayImage::new(w, h);
        for y in 3..6 {
            for x in 3..6 {
                samples[y * 9 + x] = 255;
                mask.put_pixel(x as u32, y as u32, Luma([255]));
            }
        }
        fill(&mut samples, w, h, 1, &mask);
        assert!(samples.iter().all(|&v| v == 80));
    }

    #[test]
    fn leaves_fully_masked_image_alone() {
        let mut samples = vec![7u8; 3 * 4 * 4];
        let mask = GrayImage::from_pixel(4, 4, Luma([255]));
        fill(&mut samples, 4, 4, 3, &mask);
        assert!(samples.iter().all(|&v| v == 7));
    }

    #[test]
    fn blends_colour_channels_independently() {
        let mut samples = vec![0u8; 3 * 3];
        samples[0..3].copy_from_slice(&[200, 0, 0]);
        samples[6..9].copy_from_slice(&[0, 0, 100]);
        let mut mask = GrayImage::new(3, 1);
        mask.put_pixel(1, 0, Luma([255]));
        fill(&mut samples, 3, 1, 3, &mask);
        assert_eq!(&samples[3..6], &[100, 0, 50]);
    }
}
