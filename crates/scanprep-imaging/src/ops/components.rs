// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Connected-component labelling of binary masks with per-region statistics.

use image::{GrayImage, ImageBuffer, Luma};
use imageproc::region_labelling::{Connectivity, connected_components};

/// Area and bounding box of one labelled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub label: u32,
    pub area: u32,
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl Region {
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }
}

/// 8-connected regions of the non-zero pixels of a mask.
pub struct Components {
    labels: ImageBuffer<Luma<u32>, Vec<u32>>,
    regions: Vec<Region>,
}

impl Components {
    /// Label `mask`. Any non-zero sample is foreground.
    pub fn label(mask: &GrayImage) -> Self {
        // Equal-valued neighbours are merged, so normalise to 0/255 first.
        let mut binary = mask.clone();
        for p in binary.iter_mut() {
            if *p != 0 {
                *p = 255;
            }
        }
        let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

        let max_label = labels.as_raw().iter().copied().max().unwrap_or(0) as usize;
        let mut slots: Vec<Option<Region>> = vec![None; max_label + 1];
        for (x, y, p) in labels.enumerate_pixels() {
            let label = p.0[0];
            if label == 0 {
                continue;
            }
            let slot = &mut slots[label as usize];
            match slot {
                Some(r) => {
                    r.area += 1;
                    r.min_x = r.min_x.min(x);
                    r.min_y = r.min_y.min(y);
                    r.max_x = r.max_x.max(x);
                    r.max_y = r.max_y.max(y);
                }
                None => {
                    *slot = Some(Region {
                        label,
                        area: 1,
                        min_x: x,
                        min_y: y,
                        max_x: x,
                        max_y: y,
                    })
                }
            }
        }

        Self {
            labels,
            regions: slots.into_iter().flatten().collect(),
        }
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Label at (x, y); 0 for background.
    pub fn label_at(&self, x: u32, y: u32) -> u32 {
        self.labels.get_pixel(x, y).0[0]
    }

    /// The two largest regions by area, largest first.
    pub fn two_largest(&self) -> (Option<Region>, Option<Region>) {
        let mut sorted: Vec<Region> = self.regions.clone();
        sorted.sort_by(|a, b| b.area.cmp(&a.area));
        (sorted.first().copied(), sorted.get(1).copied())
    }

    /// Mask (255) of every pixel whose region satisfies `keep`.
    pub fn mask_where(&self, keep: impl Fn(&Region) -> bool) -> GrayImage {
        let max_label = self.regions.iter().map(|r| r.label).max().unwrap_or(0) as usize;
        let mut selected = vec![false; max_label + 1];
        for r in &self.regions {
            selected[r.label as usize] = keep(r);
        }
        let (w, h) = self.labels.dimensions();
        GrayImage::from_fn(w, h, |x, y| {
            let label = self.label_at(x, y) as usize;
            Luma([if label != 0 && selected[label] { 255 } else { 0 }])
        })
    }
}
