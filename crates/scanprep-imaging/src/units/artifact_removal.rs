// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fold and crease removal.
//
// A crease is a faint, thin darkening that runs across a large part of the
// page, close to horizontal or vertical. Depth is measured against a closing
// of the page, which fills in every dark feature thinner than a crease.
// Pixels darker than the ink ceiling (text, rules, underlines) never count
// as crease but do carry a crease across, so a fold through a text line is
// still seen as one line.

use image::{GrayImage, Luma};
use scanprep_core::config::ArtifactConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::components::Components;
use crate::ops::morph::{self, Axis};
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct ArtifactRemoval {
    cfg: ArtifactConfig,
}

struct Creases {
    mask: GrayImage,
    count: usize,
    pixels: usize,
}

impl ArtifactRemoval {
    pub fn new(cfg: ArtifactConfig) -> Self {
        Self { cfg }
    }

    fn creases(&self, gray: &GrayImage) -> Creases {
        let background = morph::close(gray, self.cfg.max_half_width);
        let (w, h) = gray.dimensions();
        let mut path = GrayImage::new(w, h);
        let mut shallow = GrayImage::new(w, h);
        for (((p, s), g), b) in path
            .iter_mut()
            .zip(shallow.iter_mut())
            .zip(gray.as_raw())
            .zip(background.as_raw())
        {
            let depth = b.saturating_sub(*g);
            if depth >= self.cfg.min_depth {
                *p = 255;
                if depth <= self.cfg.max_depth {
                    *s = 255;
                }
            }
        }

        let span = |side: u32| (self.cfg.span_fraction * side as f32).ceil().max(1.0) as u32;
        let gap = self.cfg.max_gap;
        let mut mask = long_runs(&path, &shallow, span(w), gap, Axis::Horizontal);
        let vertical = long_runs(&path, &shallow, span(h), gap, Axis::Vertical);
        for (m, v) in mask.iter_mut().zip(vertical.as_raw()) {
            *m = (*m).max(*v);
        }
        let pixels = mask.as_raw().iter().filter(|&&m| m != 0).count();
        // Pieces of one crease split by text count once.
        let count = Components::label(&morph::dilate(&mask, gap)).len();
        Creases {
            mask,
            count,
            pixels,
        }
    }
}

/// Pixels of `keep` lying on runs of `path` along `axis` at least `min_len`
/// long. A run bridges gaps of up to `max_gap` and may drift one pixel
/// across, which admits lines a little off the axis.
fn long_runs(
    path: &GrayImage,
    keep: &GrayImage,
    min_len: u32,
    max_gap: u32,
    axis: Axis,
) -> GrayImage {
    let (w, h) = path.dimensions();
    let mut out = GrayImage::new(w, h);
    let (along, across) = match axis {
        Axis::Horizontal => (w, h),
        Axis::Vertical => (h, w),
    };
    if along == 0 || across == 0 {
        return out;
    }
    let at = |line: u32, pos: u32| match axis {
        Axis::Horizontal => (pos, line),
        Axis::Vertical => (line, pos),
    };
    let set = |image: &GrayImage, line: u32, pos: u32| {
        let (x, y) = at(line, pos);
        image.get_pixel(x, y).0[0] != 0
    };

    for line in 0..across {
        let near = |pos: u32| {
            (line.saturating_sub(1)..=(line + 1).min(across - 1)).any(|l| set(path, l, pos))
        };
        let mut pos = 0;
        while pos < along {
            if !near(pos) {
                pos += 1;
                continue;
            }
            let (start, mut end, mut gap) = (pos, pos, 0);
            pos += 1;
            while pos < along && gap <= max_gap {
                if near(pos) {
                    end = pos;
                    gap = 0;
                } else {
                    gap += 1;
                }
                pos += 1;
            }
            if end - start + 1 >= min_len {
                for p in (start..=end).filter(|&p| set(keep, line, p)) {
                    let (x, y) = at(line, p);
                    out.put_pixel(x, y, Luma([255]));
                }
            }
            pos = end + 1;
        }
    }
    out
}

impl ProcessingUnit for ArtifactRemoval {
    fn kind(&self) -> UnitKind {
        UnitKind::ArtifactRemoval
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let creases = self.creases(&image.luma());
        let meta = metadata! {
            "creases" => creases.count,
            "crease_pixels" => creases.pixels,
        };
        if creases.count > 0 {
            DetectionResult::run(meta)
        } else {
            DetectionResult::skip("below_threshold", meta)
        }
    }

    fn process(
        &self,
        image: &PageImage,
        _detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let creases = self.creases(&image.luma());
        let mask = morph::dilate(&creases.mask, 1);
        let filled = mask.as_raw().iter().filter(|&&m| m != 0).count();

        debug!(creases = creases.count, filled, "Creases inpainted");
        ProcessResult::applied(
            image.inpaint(&mask),
            metadata! { "inpainted_pixels" => filled },
        )
    }
}
