// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Security feature classifier: one read-only pass over a representative page
// that estimates the document type, scores each security feature and raises
// the risk flag for restricted documents.
//
// Feature scores reuse the removal units' own `detect` measurements, so a
// feature the classifier reports is one the matching unit would act on.

use std::collections::{BTreeMap, BTreeSet};

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};
use scanprep_backend::Backend;
use scanprep_core::config::{ClassifierConfig, MrzConfig, PipelineConfig};
use scanprep_core::types::{DocumentProfile, DocumentType, SecurityFeature};
use scanprep_imaging::ops::{color, downscale_factor};
use scanprep_imaging::units::{
    GuillocheRemoval, HologramRemoval, MrzLayout, ProcessingUnit, UnitContext, WatermarkRemoval,
};
use scanprep_imaging::{PageImage, PatternBand, StatsCache};
use tracing::{debug, info, instrument};

// -- Constants ----------------------------------------------------------------

/// Longer side of the copy the barcode scan runs on.
const BARCODE_MAX_SIDE: u32 = 512;
/// Gradient tile edge, in pixels.
const BARCODE_TILE: u32 = 16;
/// Luminance std a tile needs to count as ink-dense.
const BARCODE_MIN_STD: f64 = 60.0;
/// Consecutive anisotropic tiles that make a barcode.
const BARCODE_MIN_RUN: f64 = 4.0;

/// ID-1 card aspect ratio (85.60 x 53.98 mm).
const ID1_ASPECT: f64 = 1.586;
/// Passport data page aspect ratio (125 x 88 mm).
const TD3_ASPECT: f64 = 1.42;
/// ISO 216 paper aspect ratio.
const ISO_PAPER_ASPECT: f64 = std::f64::consts::SQRT_2;
/// Banknotes are at least this elongated.
const CURRENCY_MIN_ASPECT: f64 = 1.9;

/// A candidate type must score at least this to beat `Generic`.
const MIN_TYPE_SCORE: f32 = 0.5;

// -- Helpers ------------------------------------------------------------------

/// Map a measurement onto [0, 1] so that exactly `threshold` scores 0.5.
fn confidence(measure: f64, threshold: f64) -> f32 {
    if threshold <= 0.0 {
        return if measure > 0.0 { 1.0 } else { 0.0 };
    }
    (0.5 * measure / threshold).clamp(0.0, 1.0) as f32
}

/// 1 at `target`, falling linearly to 0 at `target ± tolerance`.
fn closeness(value: f64, target: f64, tolerance: f64) -> f32 {
    (1.0 - (value - target).abs() / tolerance).max(0.0) as f32
}

/// Longest horizontal or vertical run of ink-dense tiles whose gradient
/// energy is dominated by one direction.
fn barcode_run(gray: &GrayImage, anisotropy: f64) -> u32 {
    let gx = horizontal_sobel(gray);
    let gy = vertical_sobel(gray);
    let cols = gray.width() / BARCODE_TILE;
    let rows = gray.height() / BARCODE_TILE;
    if cols == 0 || rows == 0 {
        return 0;
    }

    let mut hits = vec![false; (cols * rows) as usize];
    for ty in 0..rows {
        for tx in 0..cols {
            let (mut sum, mut sum_sq, mut ex, mut ey) = (0.0f64, 0.0f64, 0.0f64, 0.0f64);
            for y in ty * BARCODE_TILE..(ty + 1) * BARCODE_TILE {
                for x in tx * BARCODE_TILE..(tx + 1) * BARCODE_TILE {
                    let v = gray.get_pixel(x, y).0[0] as f64;
                    sum += v;
                    sum_sq += v * v;
                    ex += (gx.get_pixel(x, y).0[0] as f64).powi(2);
                    ey += (gy.get_pixel(x, y).0[0] as f64).powi(2);
                }
            }
            let n = (BARCODE_TILE * BARCODE_TILE) as f64;
            let mean = sum / n;
            let std = (sum_sq / n - mean * mean).max(0.0).sqrt();
            let ratio = ex.max(ey) / (ex.min(ey) + 1.0);
            hits[(ty * cols + tx) as usize] = std >= BARCODE_MIN_STD && ratio >= anisotropy;
        }
    }

    let hit = |tx: u32, ty: u32| hits[(ty * cols + tx) as usize];
    let mut best = 0;
    for ty in 0..rows {
        let mut run = 0;
        for tx in 0..cols {
            run = if hit(tx, ty) { run + 1 } else { 0 };
            best = best.max(run);
        }
    }
    for tx in 0..cols {
        let mut run = 0;
        for ty in 0..rows {
            run = if hit(tx, ty) { run + 1 } else { 0 };
            best = best.max(run);
        }
    }
    best
}

/// What the type scorer needs to know about the page.
struct Evidence {
    aspect: f64,
    colourful: bool,
    mrz_lines: usize,
    security_print: bool,
}

fn score_types(e: &Evidence) -> BTreeMap<DocumentType, f32> {
    let travel = if e.mrz_lines == 2 {
        0.6 + 0.4 * closeness(e.aspect, TD3_ASPECT, 0.15)
    } else {
        0.0
    };
    let identity = if e.mrz_lines == 3 {
        0.6 + 0.4 * closeness(e.aspect, ID1_ASPECT, 0.1)
    } else {
        closeness(e.aspect, ID1_ASPECT, 0.05) * if e.colourful { 0.7 } else { 0.3 }
    };
    let currency = if e.aspect >= CURRENCY_MIN_ASPECT {
        (if e.colourful { 0.7 } else { 0.4 }) + if e.security_print { 0.2 } else { 0.0 }
    } else {
        0.0
    };
    let certificate = if e.mrz_lines == 0 && e.security_print {
        0.4 + 0.3 * closeness(e.aspect, ISO_PAPER_ASPECT, 0.05)
    } else {
        0.0
    };

    BTreeMap::from([
        (DocumentType::TravelDocument, travel),
        (DocumentType::IdentityCard, identity),
        (DocumentType::Currency, currency),
        (DocumentType::Certificate, certificate),
    ])
}

fn pick_type(scores: &BTreeMap<DocumentType, f32>) -> DocumentType {
    scores
        .iter()
        .filter(|(_, s)| **s >= MIN_TYPE_SCORE)
        .max_by(|a, b| a.1.total_cmp(b.1))
        .map(|(t, _)| *t)
        .unwrap_or(DocumentType::Generic)
}

// -- Classifier ---------------------------------------------------------------

/// Builds a [`DocumentProfile`] from one page.
#[derive(Debug, Clone)]
pub struct SecurityClassifier {
    cfg: ClassifierConfig,
    mrz: MrzConfig,
    guilloche: GuillocheRemoval,
    watermark: WatermarkRemoval,
    hologram: HologramRemoval,
    band: PatternBand,
    guilloche_threshold: f64,
    watermark_threshold: f64,
    hologram_threshold: f64,
}

impl SecurityClassifier {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            cfg: config.classifier.clone(),
            mrz: config.mrz.clone(),
            guilloche: GuillocheRemoval::new(config.guilloche.clone()),
            watermark: WatermarkRemoval::new(config.watermark.clone()),
            hologram: HologramRemoval::new(config.hologram.clone()),
            band: PatternBand::from(&config.guilloche),
            guilloche_threshold: config.guilloche.strength_threshold as f64,
            watermark_threshold: config.watermark.ratio_threshold as f64,
            hologram_threshold: config.hologram.min_regions as f64,
        }
    }

    /// Classify `image`. The page is only read.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn classify(&self, image: &PageImage, backend: &dyn Backend) -> DocumentProfile {
        let stats = StatsCache::new(self.band);
        let generic = DocumentProfile::generic();
        let ctx = UnitContext {
            backend,
            stats: &stats,
            profile: &generic,
            orientation_hint: None,
        };
        let gray = image.luma();

        let mut strength = BTreeMap::new();
        let guilloche = self.guilloche.detect(image, &ctx);
        let pattern = guilloche.number("pattern_strength").unwrap_or(0.0);
        strength.insert(
            SecurityFeature::Guilloche,
            confidence(pattern, self.guilloche_threshold),
        );

        let watermark = self.watermark.detect(image, &ctx);
        let signal = watermark.number("signal").unwrap_or(0.0);
        strength.insert(
            SecurityFeature::Watermark,
            confidence(signal, self.watermark_threshold),
        );

        let hologram = self.hologram.detect(image, &ctx);
        let glare = hologram.number("glare_regions").unwrap_or(0.0);
        strength.insert(
            SecurityFeature::Hologram,
            confidence(glare, self.hologram_threshold),
        );

        let (mrz_lines, mrz_confidence) = match MrzLayout::locate(&gray, &self.mrz) {
            Ok(layout) => (
                layout.lines,
                confidence(layout.density, self.mrz.density_threshold as f64),
            ),
            Err(miss) if miss.reason == "below_threshold" => (
                0,
                confidence(miss.density, self.mrz.density_threshold as f64),
            ),
            Err(_) => (0, 0.0),
        };
        strength.insert(SecurityFeature::MachineReadableZone, mrz_confidence);

        let factor = downscale_factor(image.width(), image.height(), BARCODE_MAX_SIDE);
        let small = if factor < 1.0 {
            let w = ((image.width() as f32 * factor).round() as u32).max(1);
            let h = ((image.height() as f32 * factor).round() as u32).max(1);
            backend.resize(&gray, w, h)
        } else {
            gray.into_owned()
        };
        let run = barcode_run(&small, self.cfg.barcode_anisotropy as f64);
        strength.insert(
            SecurityFeature::Barcode,
            confidence(run as f64, BARCODE_MIN_RUN),
        );

        let detected = strength
            .iter()
            .filter(|(_, c)| **c >= self.cfg.detection_confidence)
            .map(|(f, _)| *f)
            .collect::<BTreeSet<_>>();

        let (w, h) = (image.width() as f64, image.height() as f64);
        let saturation = image.as_rgb().map(color::mean_saturation).unwrap_or(0.0);
        let evidence = Evidence {
            aspect: w.max(h) / w.min(h).max(1.0),
            colourful: saturation >= self.cfg.color_saturation,
            mrz_lines,
            security_print: detected.contains(&SecurityFeature::Guilloche)
                || detected.contains(&SecurityFeature::Watermark),
        };
        let type_scores = score_types(&evidence);
        let document_type = pick_type(&type_scores);

        let threshold = self.cfg.security_feature_threshold;
        let risk_flag =
            document_type.is_restricted() && strength.values().any(|c| *c > threshold);

        debug!(
            aspect = evidence.aspect,
            saturation,
            mrz_lines,
            barcode_run = run,
            "Classification evidence gathered"
        );
        info!(
            document_type = ?document_type,
            features = detected.len(),
            risk_flag,
            "Document classified"
        );

        DocumentProfile {
            document_type,
            detected_features: detected,
            feature_strength: strength,
            risk_flag,
            type_scores,
        }
    }
}
