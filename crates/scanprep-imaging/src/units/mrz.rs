// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Machine-readable zone enhancement: locate the two or three aligned text
// lines at the foot of travel and identity documents and give that band
// alone a hard, sharpened binarization.

use image::{GrayImage, Luma};
use scanprep_core::config::MrzConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::threshold;
use crate::page::PageImage;

/// Shortest run of wide rows that counts as a text line.
const MIN_LINE_ROWS: u32 = 4;
/// Line ends must agree within this fraction of the page width.
const ALIGN_TOLERANCE: f64 = 0.03;
/// Tallest line may be at most this multiple of the shortest.
const MAX_HEIGHT_RATIO: f64 = 1.5;
/// Padding around the located lines.
const BBOX_PAD: u32 = 2;

/// Where the zone sits and how strongly the band reads as one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrzLayout {
    pub lines: usize,
    pub density: f64,
    /// (x, y, width, height) in page coordinates.
    pub bbox: (u32, u32, u32, u32),
}

/// Why no zone was found, with what was measured on the way.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MrzMiss {
    pub reason: &'static str,
    pub lines: usize,
    pub density: f64,
}

#[derive(Debug, Clone, Copy)]
struct Line {
    top: u32,
    bottom: u32,
    left: u32,
    right: u32,
}

impl Line {
    fn rows(&self) -> u32 {
        self.bottom - self.top + 1
    }
}

impl MrzLayout {
    /// Search the bottom band of `gray` for a machine-readable zone.
    pub fn locate(gray: &GrayImage, cfg: &MrzConfig) -> Result<Self, MrzMiss> {
        let (w, h) = gray.dimensions();
        let band_rows = ((h as f32 * cfg.band_fraction).round() as u32).clamp(1, h);
        let band_top = h - band_rows;
        let level = threshold::otsu_threshold(gray);

        let mut lines: Vec<Line> = Vec::new();
        let mut current: Option<Line> = None;
        for y in band_top..h {
            let mut count = 0u32;
            let (mut left, mut right) = (u32::MAX, 0u32);
            for x in 0..w {
                if gray.get_pixel(x, y).0[0] <= level {
                    count += 1;
                    left = left.min(x);
                    right = right.max(x);
                }
            }
            let wide = count as f32 > cfg.row_ink * w as f32
                && (right + 1).saturating_sub(left) as f32 > cfg.row_span * w as f32;

            current = match (current, wide) {
                (Some(mut line), true) => {
                    line.bottom = y;
                    line.left = line.left.min(left);
                    line.right = line.right.max(right);
                    Some(line)
                }
                (None, true) => Some(Line { top: y, bottom: y, left, right }),
                (Some(line), false) => {
                    lines.push(line);
                    None
                }
                (None, false) => None,
            };
        }
        lines.extend(current);
        lines.retain(|l| l.rows() >= MIN_LINE_ROWS);

        let line_rows: u32 = lines.iter().map(Line::rows).sum();
        let density = line_rows as f64 / band_rows as f64;
        let miss = |reason| MrzMiss { reason, lines: lines.len(), density };

        if !(2..=3).contains(&lines.len()) {
            return Err(miss("line_count"));
        }
        let tolerance = ALIGN_TOLERANCE * w as f64;
        let first = lines[0];
        let aligned = lines.iter().all(|l| {
            (l.left as f64 - first.left as f64).abs() <= tolerance
                && (l.right as f64 - first.right as f64).abs() <= tolerance
        });
        if !aligned {
            return Err(miss("misaligned_lines"));
        }
        let tallest = lines.iter().map(Line::rows).max().unwrap_or(1) as f64;
        let shortest = lines.iter().map(Line::rows).min().unwrap_or(1) as f64;
        if tallest > MAX_HEIGHT_RATIO * shortest {
            return Err(miss("uneven_lines"));
        }
        if density < cfg.density_threshold as f64 {
            return Err(miss("below_threshold"));
        }

        let x0 = lines.iter().map(|l| l.left).min().unwrap_or(0).saturating_sub(BBOX_PAD);
        let x1 = (lines.iter().map(|l| l.right).max().unwrap_or(0) + BBOX_PAD).min(w - 1);
        let y0 = first.top.saturating_sub(BBOX_PAD).max(band_top);
        let y1 = (lines[lines.len() - 1].bottom + BBOX_PAD).min(h - 1);
        Ok(Self {
            lines: lines.len(),
            density,
            bbox: (x0, y0, x1 - x0 + 1, y1 - y0 + 1),
        })
    }
}

/// Blank rows whose ink count stands far above the rest (underlines,
/// form rulings).
fn clear_rulings(region: &mut GrayImage, level: u8, paper: u8) -> usize {
    let (w, h) = region.dimensions();
    let counts: Vec<f64> = (0..h)
        .map(|y| (0..w).filter(|&x| region.get_pixel(x, y).0[0] <= level).count() as f64)
        .collect();
    let n = counts.len().max(1) as f64;
    let mean = counts.iter().sum::<f64>() / n;
    let std = (counts.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / n).sqrt();
    let limit = (mean + 2.0 * std).max(0.6 * w as f64);

    let mut cleared = 0;
    for (y, &count) in counts.iter().enumerate() {
        if count > limit {
            for x in 0..w {
                region.put_pixel(x, y as u32, Luma([paper]));
            }
            cleared += 1;
        }
    }
    cleared
}

/// 3x3 high-boost sharpen (centre 9, neighbours -1), edges clamped.
fn sharpen(region: &GrayImage) -> GrayImage {
    let (w, h) = region.dimensions();
    let at = |x: i64, y: i64| {
        let cx = x.clamp(0, w as i64 - 1) as u32;
        let cy = y.clamp(0, h as i64 - 1) as u32;
        region.get_pixel(cx, cy).0[0] as i32
    };
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as i64, y as i64);
        let mut acc = 0i32;
        for dy in -1..=1 {
            for dx in -1..=1 {
                let v = at(x + dx, y + dy);
                acc += if dx == 0 && dy == 0 { 9 * v } else { -v };
            }
        }
        Luma([acc.clamp(0, 255) as u8])
    })
}

fn bbox_from(detection: &DetectionResult) -> Option<(u32, u32, u32, u32)> {
    let values = detection.metadata.get("bbox")?.as_list()?;
    let mut it = values.iter().map(|v| v.as_i64().and_then(|n| u32::try_from(n).ok()));
    Some((it.next()??, it.next()??, it.next()??, it.next()??))
}

#[derive(Debug, Clone)]
pub struct MrzEnhancement {
    cfg: MrzConfig,
}

impl MrzEnhancement {
    pub fn new(cfg: MrzConfig) -> Self {
        Self { cfg }
    }
}

impl ProcessingUnit for MrzEnhancement {
    fn kind(&self) -> UnitKind {
        UnitKind::MrzEnhancement
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        match MrzLayout::locate(&image.luma(), &self.cfg) {
            Ok(layout) => {
                let (x, y, w, h) = layout.bbox;
                DetectionResult::run(metadata! {
                    "lines" => layout.lines,
                    "density" => layout.density,
                    "bbox" => vec![x, y, w, h],
                })
            }
            Err(miss) => DetectionResult::skip(
                miss.reason,
                metadata! {
                    "lines" => miss.lines,
                    "density" => miss.density,
                },
            ),
        }
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let Some((x, y, w, h)) = bbox_from(detection) else {
            return ProcessResult::degraded(image, "missing_bbox", metadata!());
        };
        let (pw, ph) = image.dimensions();
        if w == 0 || h == 0 || x + w > pw || y + h > ph {
            return ProcessResult::degraded(image, "bbox_outside_page", metadata!());
        }

        let gray = image.luma();
        let mut region = image::imageops::crop_imm(&*gray, x, y, w, h).to_image();
        let hist = threshold::histogram(&region);
        let level = threshold::otsu_level(&hist);
        let paper = threshold::percentile(&hist, 0.9);
        let rulings = clear_rulings(&mut region, level, paper);

        let sharp = sharpen(&region);
        let binary = threshold::binarize_at(&sharp, threshold::otsu_threshold(&sharp));

        debug!(x, y, w, h, rulings, "MRZ band binarized");
        ProcessResult::applied(
            image.blit_gray(&binary, x, y),
            metadata! {
                "bbox" => vec![x, y, w, h],
                "method" => "targeted_binarization",
                "rulings_removed" => rulings,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::run_unit;

    fn is_glyph(x: u32, y: u32) -> bool {
        let in_line = (166..176).contains(&y) || (182..192).contains(&y);
        in_line && (15..285).contains(&x) && (x - 15) % 7 < 5
    }

    fn passport_page() -> PageImage {
        let gray = GrayImage::from_fn(300, 200, |x, y| {
            let body = (30..150).contains(&x) && y % 20 < 3 && y < 120;
            Luma([if is_glyph(x, y) || body { 30 } else { 235 }])
        });
        PageImage::from_gray(gray).unwrap()
    }

    #[test]
    fn locates_two_aligned_lines() {
        let layout = MrzLayout::locate(
            passport_page().as_gray().unwrap(),
            &MrzConfig::default(),
        )
        .unwrap();
        assert_eq!(layout.lines, 2);
        assert!((layout.density - 0.5).abs() < 1e-9);
        assert_eq!(layout.bbox, (13, 164, 274, 30));
    }

    #[test]
    fn only_the_band_is_binarized() {
        let page = passport_page();
        let (detection, processed) = run_unit(&MrzEnhancement::new(MrzConfig::default()), &page);
        assert!(detection.should_process, "{:?}", detection.metadata);

        let out = processed.unwrap();
        assert!(out.is_applied());
        let g = out.image.as_gray().unwrap();
        assert_eq!(g.get_pixel(16, 170).0[0], 0);
        assert_eq!(g.get_pixel(20, 170).0[0], 255);
        assert_eq!(g.get_pixel(100, 50).0[0], 235);
        assert_eq!(g.get_pixel(5, 170).0[0], 235);
    }

    #[test]
    fn page_without_zone_is_skipped() {
        let page = PageImage::from_gray(GrayImage::from_pixel(300, 200, Luma([235]))).unwrap();
        let (detection, processed) = run_unit(&MrzEnhancement::new(MrzConfig::default()), &page);
        assert_eq!(detection.reason(), Some("line_count"));
        assert!(processed.is_none());
    }

    #[test]
    fn ruling_rows_are_blanked() {
        let mut region = GrayImage::from_fn(50, 40, |x, y| {
            Luma([if y == 20 || x % 5 == 0 { 20 } else { 230 }])
        });
        let cleared = clear_rulings(&mut region, 100, 230);
        assert_eq!(cleared, 1);
        assert_eq!(region.get_pixel(7, 20).0[0], 230);
        assert_eq!(region.get_pixel(10, 5).0[0], 20);
    }
}
