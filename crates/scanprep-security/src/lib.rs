// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanprep-security: document classification, the per-unit audit trail and
// pixel digests.
//
// The classifier looks at one representative page and never alters it. The
// audit types are plain serde structs so an external layer can store or
// ship the report however it likes.

pub mod audit;
pub mod classifier;
pub mod integrity;

pub use audit::{AuditRecorder, DocumentReport, PageReport, TimingMs, UnitReport};
pub use classifier::SecurityClassifier;
pub use integrity::{hash_bytes, page_digest, verify_page};
