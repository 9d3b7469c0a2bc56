// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Scanprep.

use thiserror::Error;

/// Top-level error type for all Scanprep operations.
///
/// Only genuinely failed work ends up here. A unit that finds nothing to do,
/// falls back because an optional signal is missing, or rolls back an unsafe
/// result reports that through its audit entry instead.
#[derive(Debug, Error)]
pub enum ScanprepError {
    // -- Input errors (fatal for one page) --
    #[error("page image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("unsupported page image: {0}")]
    UnsupportedImage(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Configuration --
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // -- Backend --
    #[error("compute backend unavailable: {0}")]
    BackendUnavailable(String),

    // -- Document run --
    #[error("document run cancelled")]
    Cancelled,

    #[error("worker pool could not be started: {0}")]
    WorkerPool(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Reporting --
    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ScanprepError {
    /// Whether this error only invalidates the page it occurred on.
    ///
    /// Sibling pages keep processing after a page-fatal error. Cancellation
    /// and configuration problems affect the whole document.
    pub fn is_page_fatal(&self) -> bool {
        matches!(
            self,
            Self::EmptyImage { .. } | Self::UnsupportedImage(_) | Self::ImageError(_)
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, ScanprepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_are_page_fatal() {
        assert!(ScanprepError::EmptyImage { width: 0, height: 10 }.is_page_fatal());
        assert!(ScanprepError::UnsupportedImage("16-bit".into()).is_page_fatal());
        assert!(ScanprepError::ImageError("warp".into()).is_page_fatal());
    }

    #[test]
    fn document_level_errors_are_not_page_fatal() {
        assert!(!ScanprepError::Cancelled.is_page_fatal());
        assert!(!ScanprepError::InvalidConfig("workers".into()).is_page_fatal());
    }

    #[test]
    fn empty_image_message_names_dimensions() {
        let msg = ScanprepError::EmptyImage { width: 0, height: 7 }.to_string();
        assert_eq!(msg, "page image is empty (0x7)");
    }
}
