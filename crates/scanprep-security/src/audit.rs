// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Audit trail: one entry per unit that ran on a page, in execution order,
// rolled up into page and document reports.
//
// Report shape (field names are stable):
//   DocumentReport {
//     document_id, mode, backend, profile, pages[], compliance_warning, ...
//     pages[i] = PageReport {
//       page_index, input_sha256, output_sha256, before, after, error,
//       units[j] = UnitReport {
//         module, detected, applied, outcome, detect_meta, process_meta,
//         timing_ms { detect, process, total }
//       }
//     }
//   }

use std::time::Duration;

use chrono::{DateTime, Utc};
use scanprep_core::error::Result;
use scanprep_core::types::{DocumentId, DocumentProfile, Metadata, PipelineMode, UnitOutcome};
use scanprep_imaging::{DetectionResult, ProcessResult, QualitySummary};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Unit entries
// ---------------------------------------------------------------------------

/// Wall-clock time spent in one unit, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingMs {
    pub detect: f64,
    pub process: f64,
    pub total: f64,
}

impl TimingMs {
    fn new(detect: Duration, process: Duration) -> Self {
        let detect = detect.as_secs_f64() * 1e3;
        let process = process.as_secs_f64() * 1e3;
        Self {
            detect,
            process,
            total: detect + process,
        }
    }
}

/// What one unit did to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub module: String,
    /// `detect` asked for processing.
    pub detected: bool,
    /// `process` ran and its output replaced the page.
    pub applied: bool,
    /// How `process` ended; absent when it never ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<UnitOutcome>,
    pub detect_meta: Metadata,
    /// Effect metadata, present whenever `process` ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_meta: Option<Metadata>,
    pub timing_ms: TimingMs,
}

impl UnitReport {
    /// The transform was rolled back by its own safety check.
    pub fn reverted(&self) -> bool {
        self.outcome == Some(UnitOutcome::Reverted)
    }
}

/// Accumulates [`UnitReport`]s for one page in execution order.
#[derive(Debug, Default)]
pub struct AuditRecorder {
    entries: Vec<UnitReport>,
}

impl AuditRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a unit whose `detect` declined to act.
    pub fn record_skip(&mut self, module: &str, detection: &DetectionResult, detect: Duration) {
        self.push(UnitReport {
            module: module.to_owned(),
            detected: detection.should_process,
            applied: false,
            outcome: None,
            detect_meta: detection.metadata.clone(),
            process_meta: None,
            timing_ms: TimingMs::new(detect, Duration::ZERO),
        });
    }

    /// Record a unit whose `process` ran, whatever its outcome.
    pub fn record_processed(
        &mut self,
        module: &str,
        detection: &DetectionResult,
        result: &ProcessResult,
        detect: Duration,
        process: Duration,
    ) {
        self.push(UnitReport {
            module: module.to_owned(),
            detected: detection.should_process,
            applied: result.is_applied(),
            outcome: Some(result.outcome),
            detect_meta: detection.metadata.clone(),
            process_meta: Some(result.metadata.clone()),
            timing_ms: TimingMs::new(detect, process),
        });
    }

    fn push(&mut self, entry: UnitReport) {
        debug!(
            unit = %entry.module,
            detected = entry.detected,
            applied = entry.applied,
            detect_ms = entry.timing_ms.detect,
            process_ms = entry.timing_ms.process,
            "Unit recorded"
        );
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[UnitReport] {
        &self.entries
    }

    pub fn finish(self) -> Vec<UnitReport> {
        self.entries
    }
}

// ---------------------------------------------------------------------------
// Page and document reports
// ---------------------------------------------------------------------------

/// Everything recorded about one page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PageReport {
    pub page_index: usize,
    pub input_sha256: String,
    /// Empty when the page failed.
    pub output_sha256: String,
    pub width: u32,
    pub height: u32,
    pub units: Vec<UnitReport>,
    pub before: Option<QualitySummary>,
    pub after: Option<QualitySummary>,
    /// Set when the page failed fatally; sibling pages are unaffected.
    pub error: Option<String>,
    /// Times the shared statistics were re-measured after a geometry change.
    pub stats_invalidations: u32,
    pub total_ms: f64,
}

impl PageReport {
    /// Reports for the named unit, in execution order.
    pub fn unit(&self, module: &str) -> impl Iterator<Item = &UnitReport> {
        let module = module.to_owned();
        self.units.iter().filter(move |u| u.module == module)
    }

    pub fn applied_units(&self) -> impl Iterator<Item = &UnitReport> {
        self.units.iter().filter(|u| u.applied)
    }

    /// Output is bit-identical to input.
    pub fn unchanged(&self) -> bool {
        self.error.is_none() && self.input_sha256 == self.output_sha256
    }
}

/// The structured report for one document run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentReport {
    pub document_id: DocumentId,
    pub mode: PipelineMode,
    /// Name of the compute backend that executed the primitives.
    pub backend: String,
    /// Why the accelerated backend was not used, if one was requested.
    pub backend_fallback: Option<String>,
    pub profile: DocumentProfile,
    pub pages: Vec<PageReport>,
    /// Raised for remove-mode runs over restricted documents. Informational
    /// only; processing is never blocked on it.
    pub compliance_warning: Option<String>,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DocumentReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn failed_pages(&self) -> usize {
        self.pages.iter().filter(|p| p.error.is_some()).count()
    }

    /// Every unit report of every page, page by page.
    pub fn unit_reports(&self) -> impl Iterator<Item = &UnitReport> {
        self.pages.iter().flat_map(|p| p.units.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use scanprep_core::metadata;
    use scanprep_imaging::PageImage;

    fn page() -> PageImage {
        PageImage::from_gray(GrayImage::from_pixel(4, 4, Luma([200]))).unwrap()
    }

    #[test]
    fn recorder_keeps_execution_order_and_outcomes() {
        let mut rec = AuditRecorder::new();
        let skipped = DetectionResult::skip("below_threshold", metadata!());
        rec.record_skip("deskew", &skipped, Duration::from_millis(2));

        let input = page();
        let detection = DetectionResult::run(metadata! { "speckles" => 9usize });
        let result = ProcessResult::reverted(&input, metadata! { "reverted_cleanup" => true });
        rec.record_processed(
            "text_refine",
            &detection,
            &result,
            Duration::from_millis(1),
            Duration::from_millis(3),
        );

        let entries = rec.finish();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].module, "deskew");
        assert!(!entries[0].detected && !entries[0].applied);
        assert!(entries[0].process_meta.is_none());

        assert!(entries[1].detected && !entries[1].applied);
        assert!(entries[1].reverted());
        assert!((entries[1].timing_ms.total - 4.0).abs() < 1e-9);
    }

    #[test]
    fn unit_report_uses_stable_field_names() {
        let mut rec = AuditRecorder::new();
        let detection = DetectionResult::skip("no_quad", metadata!());
        rec.record_skip("perspective", &detection, Duration::ZERO);
        let json = serde_json::to_value(&rec.entries()[0]).unwrap();
        for key in ["module", "detected", "applied", "detect_meta", "timing_ms"] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert_eq!(json["detect_meta"]["reason"], "no_quad");
        assert!(json["timing_ms"].get("total").is_some());
        assert!(json.get("process_meta").is_none());
    }

    #[test]
    fn document_report_round_trips_through_json() {
        let now = Utc::now();
        let report = DocumentReport {
            document_id: DocumentId::new(),
            mode: PipelineMode::Preserve,
            backend: "cpu".into(),
            backend_fallback: None,
            profile: DocumentProfile::generic(),
            pages: vec![PageReport {
                page_index: 0,
                error: Some("page image is empty (0x0)".into()),
                ..PageReport::default()
            }],
            compliance_warning: None,
            cancelled: false,
            started_at: now,
            finished_at: now,
        };
        let json = report.to_json_pretty().unwrap();
        assert!(json.contains("\"mode\": \"preserve\""));
        let back = DocumentReport::from_json(&json).unwrap();
        assert_eq!(back, report);
        assert_eq!(back.failed_pages(), 1);
    }
}
