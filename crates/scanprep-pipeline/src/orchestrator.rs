// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The orchestrator: owns the configuration and the backend chosen at
// construction, and drives one page through the selected units.

use std::sync::Arc;
use std::time::Instant;

use image::DynamicImage;
use scanprep_backend::{AcceleratorProbe, Backend, BackendSelection, select_backend};
use scanprep_core::config::PipelineConfig;
use scanprep_core::error::Result;
use scanprep_core::types::{DocumentProfile, OrientationHint, PipelineMode};
use scanprep_imaging::{PageImage, PatternBand, Unit, UnitKind, probe};
use scanprep_security::{PageReport, SecurityClassifier, page_digest};
use tracing::{info, instrument, warn};

use crate::context::PageContext;
use crate::metrics::PipelineMetrics;
use crate::selector;

/// Result of running one page.
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub index: usize,
    /// Final page image. `None` when the page failed.
    pub image: Option<PageImage>,
    /// The page as it entered binarization, if binarization ran.
    pub pre_binarize: Option<PageImage>,
    pub report: PageReport,
}

impl PageOutcome {
    /// Outcome for a page that could not be processed.
    pub fn failed(index: usize, error: &str) -> Self {
        Self {
            index,
            image: None,
            pre_binarize: None,
            report: PageReport {
                page_index: index,
                error: Some(error.to_owned()),
                ..PageReport::default()
            },
        }
    }

    pub fn is_failed(&self) -> bool {
        self.report.error.is_some()
    }
}

/// A configured preprocessing pipeline.
///
/// The mode and backend are fixed for the lifetime of the pipeline. One
/// pipeline may run any number of pages and documents, concurrently.
#[derive(Debug)]
pub struct Pipeline {
    config: PipelineConfig,
    selection: BackendSelection,
    classifier: SecurityClassifier,
    metrics: Arc<PipelineMetrics>,
}

impl Pipeline {
    /// Build a pipeline on the CPU backend.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Build a pipeline, probing `probe` once if the configuration prefers
    /// an accelerated backend.
    pub fn with_probe(config: PipelineConfig, probe: &dyn AcceleratorProbe) -> Result<Self> {
        Self::build(config, Some(probe))
    }

    fn build(config: PipelineConfig, probe: Option<&dyn AcceleratorProbe>) -> Result<Self> {
        config.validate()?;
        let selection = select_backend(config.prefer_accelerated_backend, probe);
        info!(
            mode = %config.mode,
            backend = selection.backend.name(),
            "Pipeline ready"
        );
        Ok(Self {
            classifier: SecurityClassifier::new(&config),
            config,
            selection,
            metrics: Arc::new(PipelineMetrics::new()),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn mode(&self) -> PipelineMode {
        self.config.mode
    }

    pub fn backend(&self) -> &dyn Backend {
        self.selection.backend.as_ref()
    }

    /// Why the accelerated backend was not used, if one was requested.
    pub fn backend_fallback(&self) -> Option<&str> {
        self.selection.fallback_reason.as_deref()
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    /// Profile a document from one representative page.
    pub fn classify(&self, image: &PageImage) -> DocumentProfile {
        self.classifier.classify(image, self.backend())
    }

    /// The ordered units this pipeline applies to a document with `profile`.
    pub fn plan(&self, profile: &DocumentProfile) -> Vec<Unit> {
        selector::plan(&self.config, profile)
    }

    /// Informational notice for removal runs over restricted documents.
    /// Processing is never blocked on it.
    pub fn compliance_warning(&self, profile: &DocumentProfile) -> Option<String> {
        if !(self.config.legal_compliance_check
            && self.config.mode == PipelineMode::Remove
            && profile.risk_flag)
        {
            return None;
        }
        let warning = format!(
            "security features are being removed from a {} document; \
             check that this use is permitted",
            profile.document_type
        );
        warn!(document_type = %profile.document_type, "Compliance warning raised");
        Some(warning)
    }

    /// Run the selected units over one page, strictly in order.
    #[instrument(skip_all, fields(page = index, mode = %self.config.mode))]
    pub fn run_page(
        &self,
        index: usize,
        image: PageImage,
        profile: &DocumentProfile,
        orientation_hint: Option<OrientationHint>,
    ) -> PageOutcome {
        self.run_units(index, image, profile, orientation_hint, &self.plan(profile))
    }

    /// Decode-side convenience for a single page: classify it, then run it.
    pub fn process_image(
        &self,
        image: DynamicImage,
        orientation_hint: Option<OrientationHint>,
    ) -> Result<(PageOutcome, DocumentProfile)> {
        let page = PageImage::from_dynamic(image)?;
        let profile = self.classify(&page);
        let outcome = self.run_page(0, page, &profile, orientation_hint);
        self.metrics.record_page();
        Ok((outcome, profile))
    }

    pub(crate) fn run_units(
        &self,
        index: usize,
        image: PageImage,
        profile: &DocumentProfile,
        orientation_hint: Option<OrientationHint>,
        units: &[Unit],
    ) -> PageOutcome {
        let started = Instant::now();
        let band = PatternBand::from(&self.config.guilloche);
        let input_sha256 = page_digest(&image);
        let before = probe::measure(&image.luma(), self.backend(), band).summary();

        let mut page = PageContext::new(image, profile, orientation_hint, self.backend(), band);
        for unit in units {
            let outcome = page.run_unit(unit);
            self.metrics.record_unit(outcome);
        }
        let done = page.finish();

        let after = probe::measure(&done.image.luma(), self.backend(), band).summary();
        let report = PageReport {
            page_index: index,
            input_sha256,
            output_sha256: page_digest(&done.image),
            width: done.image.width(),
            height: done.image.height(),
            before: Some(before),
            after: Some(after),
            error: None,
            stats_invalidations: done.stats_invalidations,
            total_ms: started.elapsed().as_secs_f64() * 1e3,
            units: done.units,
        };

        info!(
            units = report.units.len(),
            applied = report.applied_units().count(),
            binarized = report.unit(UnitKind::Binarize.name()).any(|u| u.applied),
            total_ms = report.total_ms,
            "Page processed"
        );

        PageOutcome {
            index,
            image: Some(done.image),
            pre_binarize: done.pre_binarize,
            report,
        }
    }
}
