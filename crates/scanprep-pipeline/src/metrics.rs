// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory run counters, shared by every worker of a pipeline.

use std::sync::atomic::{AtomicU64, Ordering};

use scanprep_core::types::UnitOutcome;
use serde::Serialize;

/// Lock-free counters updated as documents, pages and units complete.
#[derive(Debug, Default)]
pub struct PipelineMetrics {
    documents: AtomicU64,
    pages: AtomicU64,
    failed_pages: AtomicU64,
    cancelled_pages: AtomicU64,
    units_skipped: AtomicU64,
    units_applied: AtomicU64,
    units_reverted: AtomicU64,
    units_degraded: AtomicU64,
}

/// Point-in-time copy of [`PipelineMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub documents: u64,
    pub pages: u64,
    pub failed_pages: u64,
    pub cancelled_pages: u64,
    pub units_skipped: u64,
    pub units_applied: u64,
    pub units_reverted: u64,
    pub units_degraded: u64,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_document(&self) {
        self.documents.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page(&self) {
        self.pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_page(&self) {
        self.failed_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cancelled_page(&self) {
        self.cancelled_pages.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one unit call. `None` means `detect` declined.
    pub fn record_unit(&self, outcome: Option<UnitOutcome>) {
        let counter = match outcome {
            None => &self.units_skipped,
            Some(UnitOutcome::Applied) => &self.units_applied,
            Some(UnitOutcome::Reverted) => &self.units_reverted,
            Some(UnitOutcome::Degraded) => &self.units_degraded,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            documents: self.documents.load(Ordering::Relaxed),
            pages: self.pages.load(Ordering::Relaxed),
            failed_pages: self.failed_pages.load(Ordering::Relaxed),
            cancelled_pages: self.cancelled_pages.load(Ordering::Relaxed),
            units_skipped: self.units_skipped.load(Ordering::Relaxed),
            units_applied: self.units_applied.load(Ordering::Relaxed),
            units_reverted: self.units_reverted.load(Ordering::Relaxed),
            units_degraded: self.units_degraded.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn unit_outcomes_land_in_their_own_counters() {
        let metrics = PipelineMetrics::new();
        metrics.record_unit(None);
        metrics.record_unit(Some(UnitOutcome::Applied));
        metrics.record_unit(Some(UnitOutcome::Applied));
        metrics.record_unit(Some(UnitOutcome::Reverted));
        metrics.record_unit(Some(UnitOutcome::Degraded));

        let snap = metrics.snapshot();
        assert_eq!(snap.units_skipped, 1);
        assert_eq!(snap.units_applied, 2);
        assert_eq!(snap.units_reverted, 1);
        assert_eq!(snap.units_degraded, 1);
    }

    #[test]
    fn counters_are_shared_across_threads() {
        let metrics = Arc::new(PipelineMetrics::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let m = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        m.record_page();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(metrics.snapshot().pages, 400);
    }
}
