// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Placeholder accelerator probe for builds without an accelerated backend.
//
// Probing always fails with `BackendUnavailable`, which makes the selector
// fall back to the CPU backend.

use scanprep_core::error::{Result, ScanprepError};

use crate::traits::{AcceleratorProbe, Backend};

/// Probe that never finds an accelerator.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableAccelerator;

impl AcceleratorProbe for UnavailableAccelerator {
    fn accelerator_name(&self) -> &str {
        "none"
    }

    fn probe(&self) -> Result<Box<dyn Backend>> {
        tracing::warn!("AcceleratorProbe::probe called on stub accelerator");
        Err(ScanprepError::BackendUnavailable(
            "no accelerated backend compiled in".into(),
        ))
    }
}
