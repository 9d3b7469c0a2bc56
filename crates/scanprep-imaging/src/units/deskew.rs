// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Deskew: estimate the dominant text angle with a projection-profile search
// over the ink and rotate it back, growing the canvas so nothing is lost.
//
// Text rows line up at the right angle, so the row histogram of the ink is
// most sharply peaked there. Stray marks barely move that peak. The angle of
// the minimum-area rectangle around the ink is scored as one more candidate.

use image::GrayImage;
use imageproc::geometry::min_area_rect;
use imageproc::point::Point;
use scanprep_core::config::DeskewConfig;
use scanprep_core::metadata;
use tracing::debug;

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::ops::threshold;
use crate::page::PageImage;

/// Ink pixels need this many ink pixels in their 3x3 neighbourhood (centre
/// included) to count. Isolated specks do not steer the estimate.
const MIN_INK_NEIGHBOURS: u32 = 3;

/// Ink points beyond this are thinned evenly before profiling.
const MAX_PROFILE_POINTS: usize = 60_000;

/// Coarse and fine steps of the angle search, in degrees.
const COARSE_STEP_DEG: f32 = 0.5;
const FINE_STEP_DEG: f32 = 0.05;

#[derive(Debug, Clone)]
pub struct Deskew {
    cfg: DeskewConfig,
    min_angle_deg: f32,
}

impl Deskew {
    /// Corrects any tilt of at least `min_angle_deg`.
    pub fn standard(cfg: DeskewConfig) -> Self {
        Self {
            min_angle_deg: cfg.min_angle_deg,
            cfg,
        }
    }

    /// Only corrects tilts of at least `conservative_min_angle_deg`.
    pub fn conservative(cfg: DeskewConfig) -> Self {
        Self {
            min_angle_deg: cfg.conservative_min_angle_deg,
            cfg,
        }
    }

    pub fn min_angle_deg(&self) -> f32 {
        self.min_angle_deg
    }
}

/// Ink pixels that survive the speck filter.
fn solid_ink(gray: &GrayImage) -> Vec<Point<i32>> {
    let level = threshold::otsu_threshold(gray);
    let ink = threshold::ink_mask(gray, level);
    let (w, h) = ink.dimensions();
    let is_ink = |x: i64, y: i64| {
        x >= 0
            && y >= 0
            && x < w as i64
            && y < h as i64
            && ink.get_pixel(x as u32, y as u32).0[0] != 0
    };

    let mut points = Vec::new();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            if !is_ink(x, y) {
                continue;
            }
            let mut neighbours = 0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    if is_ink(x + dx, y + dy) {
                        neighbours += 1;
                    }
                }
            }
            if neighbours >= MIN_INK_NEIGHBOURS {
                points.push(Point::new(x as i32, y as i32));
            }
        }
    }
    points
}

/// Row and column extremes of a point set. Enough to carry its hull.
fn extremes(points: &[Point<i32>], width: u32, height: u32) -> Vec<Point<i32>> {
    let mut rows: Vec<Option<(i32, i32)>> = vec![None; height as usize];
    let mut cols: Vec<Option<(i32, i32)>> = vec![None; width as usize];
    for p in points {
        let row = &mut rows[p.y as usize];
        *row = Some(row.map_or((p.x, p.x), |(lo, hi)| (lo.min(p.x), hi.max(p.x))));
        let col = &mut cols[p.x as usize];
        *col = Some(col.map_or((p.y, p.y), |(lo, hi)| (lo.min(p.y), hi.max(p.y))));
    }

    let mut out = Vec::new();
    for (y, r) in rows.iter().enumerate() {
        if let Some((lo, hi)) = r {
            out.push(Point::new(*lo, y as i32));
            out.push(Point::new(*hi, y as i32));
        }
    }
    for (x, c) in cols.iter().enumerate() {
        if let Some((lo, hi)) = c {
            out.push(Point::new(x as i32, *lo));
            out.push(Point::new(x as i32, *hi));
        }
    }
    out
}

/// Edge angle (degrees) of the minimum-area rectangle around `points`.
fn min_area_rect_angle(points: &[Point<i32>]) -> Option<f32> {
    if points.len() < 3 {
        return None;
    }
    let [top_left, top_right, ..] = min_area_rect(points);
    let (dx, dy) = (top_right.x - top_left.x, top_right.y - top_left.y);
    if dx == 0 && dy == 0 {
        return None;
    }
    Some((dy as f32).atan2(dx as f32).to_degrees())
}

/// Row histogram of ink points for text lines running at `angle_deg`.
struct RowProfile<'a> {
    points: &'a [Point<i32>],
    offset: f32,
    bins: Vec<u32>,
}

impl<'a> RowProfile<'a> {
    fn new(points: &'a [Point<i32>], width: u32, height: u32) -> Self {
        Self {
            points,
            offset: width as f32,
            bins: vec![0; (height + 2 * width + 2) as usize],
        }
    }

    /// Sum of squared row counts. Largest when text rows are aligned.
    fn score(&mut self, angle_deg: f32) -> u64 {
        self.bins.fill(0);
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let last = self.bins.len() - 1;
        for p in self.points {
            let v = -(p.x as f32) * sin + p.y as f32 * cos + self.offset;
            let bin = (v.max(0.0) as usize).min(last);
            self.bins[bin] += 1;
        }
        self.bins.iter().map(|&c| c as u64 * c as u64).sum()
    }
}

/// Angles `centre`, `centre + step`, `centre - step`, ... out to `reach`.
fn outward(centre: f32, step: f32, reach: f32) -> impl Iterator<Item = f32> {
    let n = (reach / step).round() as i32;
    std::iter::once(centre).chain(
        (1..=n).flat_map(move |k| [centre + k as f32 * step, centre - k as f32 * step]),
    )
}

/// Highest-scoring angle among `best` and `angles` within `max_deg`.
/// Earlier candidates win ties.
fn best_of(
    profile: &mut RowProfile<'_>,
    best: (u64, f32),
    max_deg: f32,
    angles: impl IntoIterator<Item = f32>,
) -> (u64, f32) {
    angles
        .into_iter()
        .filter(|a| a.abs() <= max_deg)
        .fold(best, |best, angle| {
            let score = profile.score(angle);
            if score > best.0 { (score, angle) } else { best }
        })
}

/// Text angle in `[-max_deg, max_deg]` that best aligns the ink rows.
fn profile_angle(profile: &mut RowProfile<'_>, max_deg: f32, extra: Option<f32>) -> f32 {
    let upright = (profile.score(0.0), 0.0);
    let coarse_angles = outward(0.0, COARSE_STEP_DEG, max_deg).skip(1).chain(extra);
    let coarse = best_of(profile, upright, max_deg, coarse_angles);
    let fine_angles = outward(coarse.1, FINE_STEP_DEG, COARSE_STEP_DEG).skip(1);
    best_of(profile, coarse, max_deg, fine_angles).1
}

/// Fold an edge angle into (-45, 45].
fn normalize_angle(mut angle: f32) -> f32 {
    while angle > 45.0 {
        angle -= 90.0;
    }
    while angle <= -45.0 {
        angle += 90.0;
    }
    angle
}

impl ProcessingUnit for Deskew {
    fn kind(&self) -> UnitKind {
        UnitKind::Deskew
    }

    fn detect(&self, image: &PageImage, _ctx: &UnitContext<'_>) -> DetectionResult {
        let gray = image.luma();
        let (w, h) = gray.dimensions();
        let points = solid_ink(&gray);
        let ink_fraction = points.len() as f64 / (w as f64 * h as f64);
        let mut meta = metadata! {
            "ink_pixels" => points.len(),
            "ink_fraction" => ink_fraction,
            "min_angle_deg" => self.min_angle_deg,
        };

        if points.len() < self.cfg.min_ink_pixels as usize {
            return DetectionResult::skip("insufficient_ink", meta);
        }
        if ink_fraction >= 0.5 {
            return DetectionResult::skip("ink_dominant", meta);
        }

        let outline = extremes(&points, w, h);
        let hull_angle = min_area_rect_angle(&outline).map(normalize_angle);
        if let Some(hull_angle) = hull_angle {
            meta.insert("hull_angle_deg".into(), hull_angle.into());
        }

        let stride = points.len().div_ceil(MAX_PROFILE_POINTS).max(1);
        let sampled: Vec<Point<i32>> = points.iter().step_by(stride).copied().collect();
        let mut profile = RowProfile::new(&sampled, w, h);
        let angle = profile_angle(&mut profile, self.cfg.max_angle_deg, hull_angle);
        meta.insert("angle_deg".into(), angle.into());

        if angle.abs() < self.min_angle_deg {
            return DetectionResult::skip("below_threshold", meta);
        }
        DetectionResult::run(meta)
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let Some(angle) = detection.number("angle_deg") else {
            return ProcessResult::degraded(image, "missing_angle", metadata!());
        };
        let rotation = -angle as f32;
        debug!(angle, rotation, "Deskewing page");
        let rotated = image.rotate_expanded(rotation);
        let meta = metadata! {
            "rotation_deg" => rotation,
            "output_width" => rotated.width(),
            "output_height" => rotated.height(),
        };
        ProcessResult::applied_geometry(rotated, meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::test_support::{run_unit, with_ctx};
    use image::Luma;

    /// A dark block rotated `angle_deg` clockwise about the page centre.
    fn tilted_block(angle_deg: f32) -> PageImage {
        let (cx, cy) = (200.0f32, 150.0f32);
        let (sin, cos) = angle_deg.to_radians().sin_cos();
        let gray = GrayImage::from_fn(400, 300, |x, y| {
            let (dx, dy) = (x as f32 - cx, y as f32 - cy);
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            Luma([if u.abs() < 120.0 && v.abs() < 60.0 { 20 } else { 235 }])
        });
        PageImage::from_gray(gray).unwrap()
    }

    #[test]
    fn angle_folds_into_quarter_turn() {
        assert_eq!(normalize_angle(90.0), 0.0);
        assert_eq!(normalize_angle(-90.0), 0.0);
        assert_eq!(normalize_angle(95.0), 5.0);
        assert_eq!(normalize_angle(-45.0), 45.0);
    }

    #[test]
    fn measures_clockwise_tilt() {
        let unit = Deskew::standard(DeskewConfig::default());
        let (detection, processed) = run_unit(&unit, &tilted_block(5.0));
        assert!(detection.should_process, "{:?}", detection.metadata);
        let angle = detection.number("angle_deg").unwrap();
        assert!((angle - 5.0).abs() < 1.0, "angle {angle}");

        let out = processed.unwrap();
        assert!(out.geometry_changed);
        assert!(out.image.width() > 400 && out.image.height() > 300);

        let residual = with_ctx(|ctx| unit.detect(&out.image, ctx));
        let after = residual.number("angle_deg").unwrap();
        assert!(after.abs() < 1.0, "residual {after}");
    }

    #[test]
    fn stray_stroke_does_not_steer_the_angle() {
        // Upright text rows plus one long slanted pen stroke across the foot.
        let gray = GrayImage::from_fn(400, 300, |x, y| {
            let row = (40..190).contains(&y) && (y - 40) % 30 < 20;
            let glyph = row && (60..340).contains(&x) && (x - 60) % 18 < 12;
            let stroke_y = 280.0 - 50.0 * (x as f32 - 20.0) / 360.0;
            let stroke = (20..380).contains(&x) && (y as f32 - stroke_y).abs() < 1.5;
            Luma([if glyph || stroke { 25 } else { 235 }])
        });
        let page = PageImage::from_gray(gray).unwrap();
        let (detection, processed) = run_unit(&Deskew::standard(DeskewConfig::default()), &page);
        let angle = detection.number("angle_deg").unwrap();
        assert!(angle.abs() < 0.5, "angle {angle}");
        assert_eq!(detection.reason(), Some("below_threshold"));
        assert!(processed.is_none());
    }

    #[test]
    fn search_walks_outward_from_the_centre() {
        let angles: Vec<f32> = outward(1.0, 0.5, 1.0).collect();
        assert_eq!(angles, vec![1.0, 1.5, 0.5, 2.0, 0.0]);
    }

    #[test]
    fn straight_page_is_left_alone() {
        let (detection, processed) =
            run_unit(&Deskew::standard(DeskewConfig::default()), &tilted_block(0.0));
        assert_eq!(detection.reason(), Some("below_threshold"));
        assert!(processed.is_none());
    }

    #[test]
    fn conservative_variant_ignores_small_tilts() {
        let (detection, _) =
            run_unit(&Deskew::conservative(DeskewConfig::default()), &tilted_block(1.0));
        assert_eq!(detection.reason(), Some("below_threshold"));
        assert_eq!(
            Deskew::conservative(DeskewConfig::default()).min_angle_deg(),
            DeskewConfig::default().conservative_min_angle_deg
        );
    }

    #[test]
    fn blank_page_has_too_little_ink() {
        let page = PageImage::from_gray(GrayImage::from_pixel(100, 100, Luma([250]))).unwrap();
        let (detection, _) = run_unit(&Deskew::standard(DeskewConfig::default()), &page);
        assert_eq!(detection.reason(), Some("insufficient_ink"));
    }
}
