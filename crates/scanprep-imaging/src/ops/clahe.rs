// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Contrast-limited adaptive histogram equalisation.

use image::{GrayImage, Luma};

/// Equalise `gray` on a `tiles` x `tiles` grid.
///
/// `clip_limit` is relative: each tile histogram bin is capped at
/// `clip_limit * tile_pixels / 256` and the excess is spread evenly over all
/// bins. Tile mappings are blended bilinearly between tile centres.
pub fn clahe(gray: &GrayImage, clip_limit: f32, tiles: u32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let tx = tiles.clamp(1, w);
    let ty = tiles.clamp(1, h);
    let tile_w = w.div_ceil(tx);
    let tile_h = h.div_ceil(ty);

    let mut luts = vec![[0u8; 256]; (tx * ty) as usize];
    for j in 0..ty {
        for i in 0..tx {
            let x0 = i * tile_w;
            let y0 = j * tile_h;
            let x1 = (x0 + tile_w).min(w);
            let y1 = (y0 + tile_h).min(h);
            luts[(j * tx + i) as usize] = tile_lut(gray, x0, y0, x1, y1, clip_limit);
        }
    }

    // Position of (x, y) relative to the tile centre grid.
    let locate = |p: u32, size: u32, count: u32| -> (usize, usize, f32) {
        let f = (p as f32 + 0.5) / size as f32 - 0.5;
        if f <= 0.0 {
            return (0, 0, 0.0);
        }
        let lo = f.floor() as u32;
        if lo + 1 >= count {
            let last = (count - 1) as usize;
            return (last, last, 0.0);
        }
        (lo as usize, lo as usize + 1, f - lo as f32)
    };

    GrayImage::from_fn(w, h, |x, y| {
        let v = gray.get_pixel(x, y).0[0] as usize;
        let (i0, i1, fx) = locate(x, tile_w, tx);
        let (j0, j1, fy) = locate(y, tile_h, ty);
        let at = |i: usize, j: usize| luts[j * tx as usize + i][v] as f32;
        let top = at(i0, j0) * (1.0 - fx) + at(i1, j0) * fx;
        let bottom = at(i0, j1) * (1.0 - fx) + at(i1, j1) * fx;
        Luma([(top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8])
    })
}

fn tile_lut(gray: &GrayImage, x0: u32, y0: u32, x1: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut hist = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            hist[gray.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let n = (x1 - x0) * (y1 - y0);
    let mut lut = [0u8; 256];
    if n == 0 {
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let limit = ((clip_limit * n as f32 / 256.0).max(1.0)) as u32;
    let mut excess = 0u32;
    for bin in hist.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in hist.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut acc = 0u32;
    for (i, bin) in hist.iter().enumerate() {
        acc += bin;
        lut[i] = ((acc as u64 * 255) / n as u64).min(255) as u8;
    }
    lut
}
