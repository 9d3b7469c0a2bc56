// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Perspective correction: find the page quadrilateral against a darker
// background and warp it onto an upright rectangle.

use image::GrayImage;
use scanprep_core::config::PerspectiveConfig;
use scanprep_core::metadata;
use scanprep_core::types::MetaValue;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::downscale_factor;
use crate::ops::geometry::{self, Quad};
use crate::page::PageImage;

/// Minimum brightness lead of the page over its surroundings.
const MIN_PAGE_CONTRAST: f64 = 30.0;
/// Corners may sit this far outside the frame (as a fraction of its size).
const FRAME_TOLERANCE: f32 = 0.02;

#[derive(Debug, Clone)]
pub struct Perspective {
    cfg: PerspectiveConfig,
}

impl Perspective {
    pub fn new(cfg: PerspectiveConfig) -> Self {
        Self { cfg }
    }
}

/// Whether `p` lies inside the convex quad (either winding).
fn inside_quad(quad: &Quad, p: (f32, f32)) -> bool {
    let mut sign = 0.0f32;
    for i in 0..4 {
        let (a, b) = (quad[i], quad[(i + 1) % 4]);
        let cross = (b.0 - a.0) * (p.1 - a.1) - (b.1 - a.1) * (p.0 - a.0);
        if cross != 0.0 {
            if sign != 0.0 && cross.signum() != sign {
                return false;
            }
            sign = cross.signum();
        }
    }
    true
}

/// Mean luminance inside and outside the quad.
fn split_means(gray: &GrayImage, quad: &Quad) -> (f64, f64) {
    let (mut sum_in, mut n_in, mut sum_out, mut n_out) = (0u64, 0u64, 0u64, 0u64);
    for (x, y, p) in gray.enumerate_pixels() {
        let v = p.0[0] as u64;
        if inside_quad(quad, (x as f32 + 0.5, y as f32 + 0.5)) {
            sum_in += v;
            n_in += 1;
        } else {
            sum_out += v;
            n_out += 1;
        }
    }
    let mean = |s: u64, n: u64| if n == 0 { 0.0 } else { s as f64 / n as f64 };
    (mean(sum_in, n_in), mean(sum_out, n_out))
}

fn corners_from(detection: &DetectionResult) -> Option<Quad> {
    let values = detection.metadata.get("corners")?.as_list()?;
    if values.len() != 8 {
        return None;
    }
    let mut coords = [0.0f32; 8];
    for (slot, v) in coords.iter_mut().zip(values) {
        *slot = v.as_f64()? as f32;
    }
    Some([
        (coords[0], coords[1]),
        (coords[2], coords[3]),
        (coords[4], coords[5]),
        (coords[6], coords[7]),
    ])
}

impl ProcessingUnit for Perspective {
    fn kind(&self) -> UnitKind {
        UnitKind::Perspective
    }

    fn detect(&self, image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let (w, h) = image.dimensions();
        let factor = downscale_factor(w, h, self.cfg.max_side);
        let gray = image.luma();
        let work = if factor < 1.0 {
            let sw = ((w as f32 * factor).round() as u32).max(1);
            let sh = ((h as f32 * factor).round() as u32).max(1);
            ctx.backend.resize(&gray, sw, sh)
        } else {
            gray.into_owned()
        };

        let blurred = ctx.backend.gaussian_blur(&work, 2.0);
        let edges = ctx.backend.canny(&blurred, 50.0, 150.0);
        let Some(quad) = geometry::find_quad(&edges) else {
            return DetectionResult::skip("no_quad", metadata!());
        };

        let (sw, sh) = (work.width() as f32, work.height() as f32);
        let area_ratio = geometry::quad_area(&quad) / (sw * sh);
        let mut meta = metadata! { "area_ratio" => area_ratio as f64 };
        if area_ratio < self.cfg.min_area_ratio {
            return DetectionResult::skip("quad_too_small", meta);
        }
        if area_ratio >= self.cfg.max_fill_ratio {
            return DetectionResult::skip("already_flat", meta);
        }

        let (tx, ty) = (sw * FRAME_TOLERANCE, sh * FRAME_TOLERANCE);
        let in_frame = quad
            .iter()
            .all(|&(x, y)| x >= -tx && y >= -ty && x <= sw + tx && y <= sh + ty);
        if !in_frame {
            return DetectionResult::skip("quad_outside_frame", meta);
        }

        let (inside, outside) = split_means(&work, &quad);
        meta.insert("page_contrast".into(), (inside - outside).into());
        if inside - outside < MIN_PAGE_CONTRAST {
            return DetectionResult::skip("no_page_contrast", meta);
        }

        let scale = 1.0 / factor as f64;
        let corners: Vec<MetaValue> = quad
            .iter()
            .flat_map(|&(x, y)| [x as f64 * scale, y as f64 * scale])
            .map(MetaValue::from)
            .collect();
        meta.insert("corners".into(), MetaValue::List(corners));
        DetectionResult::run(meta)
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let Some(quad) = corners_from(detection) else {
            return ProcessResult::degraded(image, "missing_corners", metadata!());
        };
        let (width, height) = geometry::quad_target_size(&quad);
        let Some(projection) = geometry::flatten_projection(&quad, width, height) else {
            return ProcessResult::degraded(image, "degenerate_quad", metadata!());
        };

        debug!(width, height, "Flattening page quadrilateral");
        ProcessResult::applied_geometry(
            image.warp(&projection, width, height),
            metadata! {
                "output_width" => width,
                "output_height" => height,
            },
        )
    }
}
