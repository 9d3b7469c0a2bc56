// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Quarter-turn orientation correction driven by an external OCR engine's
// rotation report. Without a report the unit does nothing.

use scanprep_core::config::OrientationConfig;
use scanprep_core::metadata;
use tracing::{debug, warn};

use super::{DetectionResult, ProcessResult, ProcessingUnit, UnitContext, UnitKind};
use crate::page::PageImage;

#[derive(Debug, Clone)]
pub struct Orientation {
    cfg: OrientationConfig,
}

impl Orientation {
    pub fn new(cfg: OrientationConfig) -> Self {
        Self { cfg }
    }
}

impl ProcessingUnit for Orientation {
    fn kind(&self) -> UnitKind {
        UnitKind::Orientation
    }

    fn detect(&self, _image: &PageImage, ctx: &UnitContext<'_>) -> DetectionResult {
        let Some(hint) = ctx.orientation_hint else {
            warn!("No orientation report from the OCR engine; orientation left unchanged");
            return DetectionResult::skip("hint_unavailable", metadata! { "degraded" => true });
        };

        let confidence = hint.confidence.unwrap_or(1.0);
        let reported = hint.rotate_deg.rem_euclid(360);
        let mut meta = metadata! {
            "reported_rotation" => reported,
            "confidence" => confidence,
        };

        if confidence < self.cfg.min_confidence {
            return DetectionResult::skip("low_confidence", meta);
        }
        if reported == 0 {
            return DetectionResult::skip("upright", meta);
        }
        if reported % 90 != 0 {
            return DetectionResult::skip("unknown_angle", meta);
        }

        meta.insert("correction_deg".into(), ((360 - reported) % 360).into());
        DetectionResult::run(meta)
    }

    fn process(
        &self,
        image: &PageImage,
        detection: &DetectionResult,
        _ctx: &UnitContext<'_>,
    ) -> ProcessResult {
        let Some(correction) = detection.number("correction_deg") else {
            return ProcessResult::degraded(image, "missing_correction", metadata!());
        };
        let correction = correction as u32;
        debug!(correction, "Correcting page orientation");
        ProcessResult::applied_geometry(
            image.rotate_quarters(correction / 90),
            metadata! { "rotation_deg" => correction },
        )
    }
}
