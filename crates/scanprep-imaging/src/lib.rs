// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanprep-imaging: page images, numeric primitives, the statistics probe
// and every detect/process unit.
//
// Nothing in this crate knows about modes or ordering. The pipeline crate
// decides which units run and in what sequence.

pub mod ops;
pub mod page;
pub mod probe;
pub mod strength;
pub mod units;

// Re-export the primary types so callers can use `scanprep_imaging::PageImage` etc.
pub use page::PageImage;
pub use probe::{ImageStats, PatternBand, QualitySummary, StatsCache};
pub use units::{
    DetectionResult, MrzLayout, ProcessResult, ProcessingUnit, Unit, UnitContext, UnitKind,
};
