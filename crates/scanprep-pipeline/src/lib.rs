// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanprep-pipeline: mode-aware unit selection, per-page orchestration and
// parallel document runs.
//
// Data flow per document:
//   decode -> classify first page -> select units for the mode ->
//   per page (in parallel): probe, run units in order, digest, report ->
//   aggregate page reports into the document report.

pub mod context;
pub mod document;
pub mod metrics;
pub mod orchestrator;
pub mod selector;

pub use context::{FinishedPage, PageContext};
pub use document::{CancellationToken, DocumentOutcome, PageInput};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use orchestrator::{PageOutcome, Pipeline};
pub use selector::{plan, plan_kinds};
