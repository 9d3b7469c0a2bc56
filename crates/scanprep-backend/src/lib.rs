// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// scanprep-backend: compute backend strategy for the primitive image
// operations (blur, median, resize, edge detection, threshold).
//
// A backend is chosen once, when a pipeline is built. If an accelerated
// backend is requested but its probe fails, the CPU backend is used for the
// rest of the run and the reason is kept for the audit report.

pub mod cpu;
pub mod stub;
pub mod traits;

use std::sync::Arc;

use tracing::{info, warn};

pub use cpu::CpuBackend;
pub use stub::UnavailableAccelerator;
pub use traits::{AcceleratorProbe, Backend};

/// Result of the one-time backend selection.
#[derive(Debug, Clone)]
pub struct BackendSelection {
    pub backend: Arc<dyn Backend>,
    /// Why the accelerated backend was not used, when one was requested.
    pub fallback_reason: Option<String>,
}

impl BackendSelection {
    /// CPU backend with no probe attempted.
    pub fn cpu() -> Self {
        Self {
            backend: Arc::new(CpuBackend),
            fallback_reason: None,
        }
    }
}

/// Pick the backend for a pipeline run.
///
/// The probe runs at most once. Any probe error degrades to the CPU backend
/// rather than failing the run.
pub fn select_backend(
    prefer_accelerated: bool,
    probe: Option<&dyn AcceleratorProbe>,
) -> BackendSelection {
    if !prefer_accelerated {
        return BackendSelection::cpu();
    }

    let Some(probe) = probe else {
        warn!("Accelerated backend requested but no probe available; using CPU");
        return BackendSelection {
            backend: Arc::new(CpuBackend),
            fallback_reason: Some("no accelerator probe registered".into()),
        };
    };

    match probe.probe() {
        Ok(backend) => {
            info!(
                accelerator = probe.accelerator_name(),
                backend = backend.name(),
                "Accelerated backend selected"
            );
            BackendSelection {
                backend: Arc::from(backend),
                fallback_reason: None,
            }
        }
        Err(err) => {
            warn!(
                accelerator = probe.accelerator_name(),
                error = %err,
                "Accelerated backend unavailable; falling back to CPU"
            );
            BackendSelection {
                backend: Arc::new(CpuBackend),
                fallback_reason: Some(err.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GrayImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct FakeAccelerated;

    impl Backend for FakeAccelerated {
        fn name(&self) -> &str {
            "fake"
        }
        fn gaussian_blur(&self, image: &GrayImage, sigma: f32) -> GrayImage {
            CpuBackend.gaussian_blur(image, sigma)
        }
        fn median_blur(&self, image: &GrayImage, radius: u32) -> GrayImage {
            CpuBackend.median_blur(image, radius)
        }
        fn resize(&self, image: &GrayImage, width: u32, height: u32) -> GrayImage {
            CpuBackend.resize(image, width, height)
        }
        fn canny(&self, image: &GrayImage, low: f32, high: f32) -> GrayImage {
            CpuBackend.canny(image, low, high)
        }
        fn threshold(&self, image: &GrayImage, level: u8) -> GrayImage {
            CpuBackend.threshold(image, level)
        }
    }

    struct CountingProbe {
        calls: AtomicUsize,
        succeed: bool,
    }

    impl AcceleratorProbe for CountingProbe {
        fn accelerator_name(&self) -> &str {
            "counting"
        }
        fn probe(&self) -> scanprep_core::Result<Box<dyn Backend>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.succeed {
                Ok(Box::new(FakeAccelerated))
            } else {
                Err(scanprep_core::ScanprepError::BackendUnavailable("no device".into()))
            }
        }
    }

    #[test]
    fn cpu_when_acceleration_not_requested() {
        let probe = CountingProbe { calls: AtomicUsize::new(0), succeed: true };
        let sel = select_backend(false, Some(&probe));
        assert_eq!(sel.backend.name(), "cpu");
        assert_eq!(probe.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn accelerated_backend_used_when_probe_succeeds() {
        let probe = CountingProbe { calls: AtomicUsize::new(0), succeed: true };
        let sel = select_backend(true, Some(&probe));
        assert_eq!(sel.backend.name(), "fake");
        assert!(sel.fallback_reason.is_none());
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_probe_falls_back_once() {
        let probe = CountingProbe { calls: AtomicUsize::new(0), succeed: false };
        let sel = select_backend(true, Some(&probe));
        assert_eq!(sel.backend.name(), "cpu");
        assert!(sel.fallback_reason.unwrap().contains("no device"));

        // The selected backend is reused; further operations never re-probe.
        let img = GrayImage::new(4, 4);
        let _ = sel.backend.gaussian_blur(&img, 1.0);
        assert_eq!(probe.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stub_accelerator_degrades_to_cpu() {
        let sel = select_backend(true, Some(&UnavailableAccelerator));
        assert_eq!(sel.backend.name(), "cpu");
        assert!(sel.fallback_reason.is_some());
    }
}
