// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-page running state threaded through the selected units.

use std::time::Instant;

use scanprep_backend::Backend;
use scanprep_core::types::{DocumentProfile, OrientationHint, UnitOutcome};
use scanprep_imaging::{
    PageImage, PatternBand, ProcessingUnit, StatsCache, Unit, UnitContext, UnitKind,
};
use scanprep_security::{AuditRecorder, UnitReport};
use tracing::{debug, warn};

/// Cross-unit state for one page. Lives until the page's final image and
/// unit reports are taken out with [`PageContext::finish`].
pub struct PageContext<'a> {
    image: PageImage,
    stats: StatsCache,
    profile: &'a DocumentProfile,
    orientation_hint: Option<OrientationHint>,
    backend: &'a dyn Backend,
    audit: AuditRecorder,
    pre_binarize: Option<PageImage>,
}

/// What remains of a [`PageContext`] once every unit has run.
#[derive(Debug)]
pub struct FinishedPage {
    pub image: PageImage,
    /// The page as it entered the binarize unit, if that unit ran.
    pub pre_binarize: Option<PageImage>,
    pub units: Vec<UnitReport>,
    pub stats_invalidations: u32,
}

impl<'a> PageContext<'a> {
    pub fn new(
        image: PageImage,
        profile: &'a DocumentProfile,
        orientation_hint: Option<OrientationHint>,
        backend: &'a dyn Backend,
        band: PatternBand,
    ) -> Self {
        Self {
            image,
            stats: StatsCache::new(band),
            profile,
            orientation_hint,
            backend,
            audit: AuditRecorder::new(),
            pre_binarize: None,
        }
    }

    /// The current running image.
    pub fn image(&self) -> &PageImage {
        &self.image
    }

    pub fn reports(&self) -> &[UnitReport] {
        self.audit.entries()
    }

    /// Run one unit against the current image and record it.
    ///
    /// `process` is only called after a positive `detect` on the same image
    /// and receives that detection unchanged. Only an `Applied` result
    /// replaces the running image. Returns `None` when `detect` declined.
    pub fn run_unit(&mut self, unit: &Unit) -> Option<UnitOutcome> {
        let name = unit.name();
        let ctx = UnitContext {
            backend: self.backend,
            stats: &self.stats,
            profile: self.profile,
            orientation_hint: self.orientation_hint,
        };

        let started = Instant::now();
        let detection = unit.detect(&self.image, &ctx);
        let detect_time = started.elapsed();
        if !detection.should_process {
            self.audit.record_skip(name, &detection, detect_time);
            return None;
        }

        if unit.kind() == UnitKind::Binarize {
            self.pre_binarize = Some(self.image.clone());
        }

        let started = Instant::now();
        let result = unit.process(&self.image, &detection, &ctx);
        let process_time = started.elapsed();
        self.audit
            .record_processed(name, &detection, &result, detect_time, process_time);

        let outcome = result.outcome;
        match outcome {
            UnitOutcome::Applied => {
                let geometry_changed = result.geometry_changed;
                self.image = result.image;
                if geometry_changed {
                    self.stats.invalidate();
                    debug!(unit = name, "Page geometry changed; statistics invalidated");
                }
            }
            UnitOutcome::Reverted => {
                warn!(unit = name, "Unit rolled back its own result");
            }
            UnitOutcome::Degraded => {
                warn!(unit = name, reason = ?result.metadata.get("reason"), "Unit degraded");
            }
        }
        Some(outcome)
    }

    pub fn finish(self) -> FinishedPage {
        FinishedPage {
            image: self.image,
            pre_binarize: self.pre_binarize,
            stats_invalidations: self.stats.invalidations(),
            units: self.audit.finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use scanprep_backend::CpuBackend;
    use scanprep_core::config::{DeskewConfig, DenoiseConfig, EdgeMaskConfig};
    use scanprep_imaging::units::{Denoise, Deskew, EdgeMask};

    fn blank_page() -> PageImage {
        PageImage::from_gray(GrayImage::from_pixel(64, 64, Luma([230]))).unwrap()
    }

    #[test]
    fn skipped_unit_leaves_the_image_alone() {
        let profile = DocumentProfile::generic();
        let input = blank_page();
        let mut page =
            PageContext::new(input.clone(), &profile, None, &CpuBackend, PatternBand::default());
        let outcome = page.run_unit(&Unit::EdgeMask(EdgeMask::new(EdgeMaskConfig::default())));
        assert_eq!(outcome, None);

        let done = page.finish();
        assert!(done.image.shares_buffer(&input));
        assert_eq!(done.units.len(), 1);
        assert!(!done.units[0].applied);
        assert!(done.units[0].process_meta.is_none());
    }

    #[test]
    fn applied_unit_replaces_the_image() {
        let profile = DocumentProfile::generic();
        let input = blank_page();
        let mut page =
            PageContext::new(input.clone(), &profile, None, &CpuBackend, PatternBand::default());
        let outcome = page.run_unit(&Unit::Denoise(Denoise::new(DenoiseConfig::default())));
        assert_eq!(outcome, Some(UnitOutcome::Applied));
        assert!(!page.image().shares_buffer(&input));
        assert!(page.reports()[0].applied);
    }

    #[test]
    fn geometry_change_invalidates_shared_statistics() {
        // A block tilted by 4 degrees.
        let (sin, cos) = 4f32.to_radians().sin_cos();
        let gray = GrayImage::from_fn(300, 200, |x, y| {
            let (dx, dy) = (x as f32 - 150.0, y as f32 - 100.0);
            let u = dx * cos + dy * sin;
            let v = -dx * sin + dy * cos;
            Luma([if u.abs() < 90.0 && v.abs() < 40.0 { 20 } else { 235 }])
        });
        let profile = DocumentProfile::generic();
        let mut page = PageContext::new(
            PageImage::from_gray(gray).unwrap(),
            &profile,
            None,
            &CpuBackend,
            PatternBand::default(),
        );

        // Denoise fills the cache; deskew must then drop it.
        page.run_unit(&Unit::Denoise(Denoise::new(DenoiseConfig::default())));
        let outcome = page.run_unit(&Unit::Deskew(Deskew::standard(DeskewConfig::default())));
        assert_eq!(outcome, Some(UnitOutcome::Applied));

        let done = page.finish();
        assert_eq!(done.stats_invalidations, 1);
        assert!(done.image.width() > 300);
    }
}
