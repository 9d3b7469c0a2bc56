// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document runs: classify once, then process pages concurrently on a
// bounded worker pool and aggregate the page reports in page order.
//
// Pages share only the read-only profile and unit plan. A page with a bad
// image fails alone; cancellation stops pages that have not started yet.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use image::DynamicImage;
use rayon::prelude::*;
use scanprep_core::error::{Result, ScanprepError};
use scanprep_core::types::{DocumentId, DocumentProfile, OrientationHint};
use scanprep_imaging::PageImage;
use scanprep_security::DocumentReport;
use tracing::{info, instrument, warn};

use crate::orchestrator::{PageOutcome, Pipeline};

/// One decoded page handed in by the I/O layer.
#[derive(Debug, Clone)]
pub struct PageInput {
    pub image: DynamicImage,
    /// Orientation reported by an OCR engine, when one was consulted.
    pub orientation_hint: Option<OrientationHint>,
}

impl PageInput {
    pub fn new(image: DynamicImage) -> Self {
        Self {
            image,
            orientation_hint: None,
        }
    }

    pub fn with_hint(mut self, hint: OrientationHint) -> Self {
        self.orientation_hint = Some(hint);
        self
    }
}

/// Document-level cancellation flag. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Everything a document run produced.
#[derive(Debug, Clone)]
pub struct DocumentOutcome {
    pub report: DocumentReport,
    /// One entry per input page, in page order.
    pub pages: Vec<PageOutcome>,
}

impl DocumentOutcome {
    /// Final images of the pages that completed, in page order.
    pub fn images(&self) -> impl Iterator<Item = (usize, &PageImage)> {
        self.pages
            .iter()
            .filter_map(|p| p.image.as_ref().map(|img| (p.index, img)))
    }
}

impl Pipeline {
    /// Process every page of a document.
    ///
    /// The profile comes from the first page that decodes; a document
    /// without one gets the generic profile. Page-fatal errors are recorded
    /// on their page. Only a worker pool failure aborts the whole run.
    #[instrument(skip_all, fields(pages = pages.len(), mode = %self.mode()))]
    pub fn run_document(
        &self,
        pages: Vec<PageInput>,
        cancel: &CancellationToken,
    ) -> Result<DocumentOutcome> {
        let started_at = Utc::now();
        let document_id = DocumentId::new();

        let decoded: Vec<(Result<PageImage>, Option<OrientationHint>)> = pages
            .into_iter()
            .map(|p| (PageImage::from_dynamic(p.image), p.orientation_hint))
            .collect();

        let profile = decoded
            .iter()
            .find_map(|(page, _)| page.as_ref().ok())
            .map(|page| self.classify(page))
            .unwrap_or_else(DocumentProfile::generic);
        let compliance_warning = self.compliance_warning(&profile);
        let units = self.plan(&profile);

        let workers = self.config().effective_workers(decoded.len());
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("scanprep-page-{i}"))
            .build()
            .map_err(|e| ScanprepError::WorkerPool(e.to_string()))?;

        info!(
            document = %document_id,
            workers,
            document_type = %profile.document_type,
            risk = profile.risk_flag,
            "Document run started"
        );

        let results: Vec<Result<PageOutcome>> = pool.install(|| {
            decoded
                .into_par_iter()
                .enumerate()
                .map(|(index, (page, hint))| {
                    if cancel.is_cancelled() {
                        return Err(ScanprepError::Cancelled);
                    }
                    let page = page?;
                    Ok(self.run_units(index, page, &profile, hint, &units))
                })
                .collect()
        });

        let mut outcomes = Vec::with_capacity(results.len());
        let mut cancelled = false;
        for (index, result) in results.into_iter().enumerate() {
            self.metrics().record_page();
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(ScanprepError::Cancelled) => {
                    cancelled = true;
                    self.metrics().record_cancelled_page();
                    let reason = ScanprepError::Cancelled.to_string();
                    outcomes.push(PageOutcome::failed(index, &reason));
                }
                Err(err) if err.is_page_fatal() => {
                    warn!(page = index, error = %err, "Page failed");
                    self.metrics().record_failed_page();
                    outcomes.push(PageOutcome::failed(index, &err.to_string()));
                }
                Err(err) => return Err(err),
            }
        }
        self.metrics().record_document();

        let report = DocumentReport {
            document_id,
            mode: self.mode(),
            backend: self.backend().name().to_owned(),
            backend_fallback: self.backend_fallback().map(str::to_owned),
            profile,
            pages: outcomes.iter().map(|o| o.report.clone()).collect(),
            compliance_warning,
            cancelled,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            document = %report.document_id,
            pages = report.pages.len(),
            failed = report.failed_pages(),
            cancelled,
            "Document run finished"
        );

        Ok(DocumentOutcome {
            report,
            pages: outcomes,
        })
    }
}
