// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration: top-level switches plus per-unit thresholds and
// strength bounds. Built once by the caller and handed to the orchestrator.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanprepError};
use crate::types::PipelineMode;

/// Settings for one document run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Orchestration template, fixed for the whole document.
    pub mode: PipelineMode,
    /// Include the deskew unit.
    pub deskew_enabled: bool,
    /// Include the adaptive denoise unit.
    pub noise_reduction: bool,
    /// Include the adaptive contrast enhancement unit.
    pub contrast_enhancement: bool,
    /// Include the final binarization unit (default and remove modes only).
    pub allow_binarization: bool,
    /// Include the lighting/shadow flattening unit.
    pub background_clean: bool,
    /// Include the grid and stamp removal unit.
    pub de_raster_enabled: bool,
    /// Include the halftone dot removal unit.
    pub dots_removal_enabled: bool,
    /// Include the edge sharpening unit for soft scans.
    pub sharpen_enabled: bool,
    /// Include the grain smoothing unit.
    pub smooth_enabled: bool,
    /// Include white balance and faded-page correction for colour pages.
    pub color_correction_enabled: bool,
    /// Include the fold and crease removal unit.
    pub artifact_removal_enabled: bool,
    /// Emit a compliance warning when removing features from restricted documents.
    pub legal_compliance_check: bool,
    /// Try the accelerated compute backend before the CPU one.
    pub prefer_accelerated_backend: bool,
    /// Worker threads for multi-page documents. 0 means available parallelism.
    pub workers: usize,

    pub edge_mask: EdgeMaskConfig,
    pub orientation: OrientationConfig,
    pub perspective: PerspectiveConfig,
    pub deskew: DeskewConfig,
    pub denoise: DenoiseConfig,
    pub background: BackgroundCleanConfig,
    pub enhance: EnhanceConfig,
    pub text_refine: TextRefineConfig,
    pub binarize: BinarizeConfig,
    pub de_raster: DeRasterConfig,
    pub dots: DotsConfig,
    pub sharpen: SharpenConfig,
    pub smooth: SmoothConfig,
    pub color_correction: ColorCorrectionConfig,
    pub artifacts: ArtifactConfig,
    pub guilloche: GuillocheConfig,
    pub watermark: WatermarkConfig,
    pub hologram: HologramConfig,
    pub mrz: MrzConfig,
    pub classifier: ClassifierConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mode: PipelineMode::Default,
            deskew_enabled: true,
            noise_reduction: true,
            contrast_enhancement: true,
            allow_binarization: true,
            background_clean: false,
            de_raster_enabled: false,
            dots_removal_enabled: false,
            sharpen_enabled: false,
            smooth_enabled: false,
            color_correction_enabled: false,
            artifact_removal_enabled: false,
            legal_compliance_check: true,
            prefer_accelerated_backend: false,
            workers: 0,
            edge_mask: EdgeMaskConfig::default(),
            orientation: OrientationConfig::default(),
            perspective: PerspectiveConfig::default(),
            deskew: DeskewConfig::default(),
            denoise: DenoiseConfig::default(),
            background: BackgroundCleanConfig::default(),
            enhance: EnhanceConfig::default(),
            text_refine: TextRefineConfig::default(),
            binarize: BinarizeConfig::default(),
            de_raster: DeRasterConfig::default(),
            dots: DotsConfig::default(),
            sharpen: SharpenConfig::default(),
            smooth: SmoothConfig::default(),
            color_correction: ColorCorrectionConfig::default(),
            artifacts: ArtifactConfig::default(),
            guilloche: GuillocheConfig::default(),
            watermark: WatermarkConfig::default(),
            hologram: HologramConfig::default(),
            mrz: MrzConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Config for a given mode with every other knob at its default.
    pub fn for_mode(mode: PipelineMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Number of worker threads to use for `page_count` pages.
    pub fn effective_workers(&self, page_count: usize) -> usize {
        let wanted = if self.workers == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            self.workers
        };
        wanted.clamp(1, page_count.max(1))
    }

    /// Reject values no unit can work with.
    pub fn validate(&self) -> Result<()> {
        check_unit("edge_mask.border_threshold", self.edge_mask.border_threshold)?;
        check_unit("edge_mask.min_content_fraction", self.edge_mask.min_content_fraction)?;
        if self.edge_mask.min_dominance < 1.0 {
            return Err(invalid("edge_mask.min_dominance must be >= 1"));
        }
        check_unit("perspective.min_area_ratio", self.perspective.min_area_ratio)?;
        check_unit("perspective.max_fill_ratio", self.perspective.max_fill_ratio)?;
        if self.perspective.max_side < 64 {
            return Err(invalid("perspective.max_side must be at least 64"));
        }
        if !(0.0..=45.0).contains(&self.deskew.max_angle_deg)
            || self.deskew.min_angle_deg < 0.0
            || self.deskew.min_angle_deg > self.deskew.max_angle_deg
        {
            return Err(invalid("deskew angles must satisfy 0 <= min <= max <= 45"));
        }
        check_bounds("denoise strength", self.denoise.min_strength, self.denoise.max_strength)?;
        if self.denoise.max_sigma <= 0.0 {
            return Err(invalid("denoise.max_sigma must be positive"));
        }
        check_bounds(
            "enhance clip limit",
            self.enhance.min_clip_limit,
            self.enhance.max_clip_limit,
        )?;
        check_bounds("enhance unsharp amount", self.enhance.min_unsharp, self.enhance.max_unsharp)?;
        if self.enhance.tiles == 0 {
            return Err(invalid("enhance.tiles must be positive"));
        }
        check_unit("text_refine.speckle_ratio", self.text_refine.speckle_ratio)?;
        check_unit("text_refine.max_ink_loss", self.text_refine.max_ink_loss)?;
        if self.binarize.window < 3 || self.text_refine.window < 3 {
            return Err(invalid("sauvola window must be at least 3"));
        }
        check_bounds(
            "binarize foreground ratio",
            self.binarize.min_foreground,
            self.binarize.max_foreground,
        )?;
        if self.de_raster.min_rule_length < 3 {
            return Err(invalid("de_raster.min_rule_length must be at least 3"));
        }
        if self.de_raster.stamp_min_area > self.de_raster.stamp_max_area {
            return Err(invalid("de_raster stamp area band is empty"));
        }
        if self.dots.max_dot_area <= self.dots.min_dot_area {
            return Err(invalid("dots area band is empty"));
        }
        check_unit("dots.max_ink_loss", self.dots.max_ink_loss)?;
        if self.sharpen.sigma <= 0.0 || self.sharpen.amount < 0.0 || self.sharpen.detail < 0.0 {
            return Err(invalid("sharpen sigma must be positive and weights non-negative"));
        }
        if !(self.smooth.grain_threshold <= self.smooth.medium_grain
            && self.smooth.medium_grain <= self.smooth.heavy_grain)
        {
            return Err(invalid("smooth grain levels must be ascending"));
        }
        if self.color_correction.tiles == 0 {
            return Err(invalid("color_correction.tiles must be positive"));
        }
        check_unit("color_correction.stretch_tail", self.color_correction.stretch_tail)?;
        check_unit("artifacts.span_fraction", self.artifacts.span_fraction)?;
        if self.artifacts.min_depth >= self.artifacts.max_depth {
            return Err(invalid("artifacts crease depth band is empty"));
        }
        if self.guilloche.min_radius >= self.guilloche.max_radius {
            return Err(invalid("guilloche radius band is empty"));
        }
        check_unit("watermark.ratio_threshold", self.watermark.ratio_threshold)?;
        check_unit("hologram.max_region_fraction", self.hologram.max_region_fraction)?;
        check_unit("mrz.band_fraction", self.mrz.band_fraction)?;
        check_unit(
            "classifier.security_feature_threshold",
            self.classifier.security_feature_threshold,
        )?;
        Ok(())
    }
}

fn invalid(msg: &str) -> ScanprepError {
    ScanprepError::InvalidConfig(msg.to_string())
}

fn check_unit(name: &str, value: f32) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ScanprepError::InvalidConfig(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

fn check_bounds(name: &str, lo: f32, hi: f32) -> Result<()> {
    if lo >= 0.0 && lo <= hi {
        Ok(())
    } else {
        Err(ScanprepError::InvalidConfig(format!(
            "{name} bounds are inverted or negative ({lo} > {hi})"
        )))
    }
}

/// Border masking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeMaskConfig {
    /// Pixels at or below this level count as scanner background.
    pub dark_level: u8,
    /// Content/frame area ratio below which a border is assumed.
    pub border_threshold: f32,
    /// Largest bright region must be this many times the runner-up.
    pub min_dominance: f32,
    /// Largest bright region must cover at least this fraction of the frame.
    pub min_content_fraction: f32,
    /// Dark fraction of the outer edge strips that flags a thin border.
    pub thin_border_dark_fraction: f32,
    /// Value painted over the border.
    pub fill: u8,
}

impl Default for EdgeMaskConfig {
    fn default() -> Self {
        Self {
            dark_level: 50,
            border_threshold: 0.97,
            min_dominance: 2.0,
            min_content_fraction: 0.25,
            thin_border_dark_fraction: 0.35,
            fill: 255,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Hints with a reported confidence below this are ignored.
    pub min_confidence: f32,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerspectiveConfig {
    /// Longer side of the working copy used for line detection.
    pub max_side: u32,
    /// Detected page quad must cover at least this fraction of the frame.
    pub min_area_ratio: f32,
    /// Quads covering more than this fraction are treated as already flat.
    pub max_fill_ratio: f32,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            max_side: 1024,
            min_area_ratio: 0.5,
            max_fill_ratio: 0.985,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskewConfig {
    /// Smallest tilt worth correcting in default and remove modes.
    pub min_angle_deg: f32,
    /// Smallest tilt corrected in preserve mode.
    pub conservative_min_angle_deg: f32,
    /// The angle search never looks beyond this magnitude.
    pub max_angle_deg: f32,
    /// Minimum number of ink pixels needed for an estimate.
    pub min_ink_pixels: u32,
}

impl Default for DeskewConfig {
    fn default() -> Self {
        Self {
            min_angle_deg: 0.5,
            conservative_min_angle_deg: 2.0,
            max_angle_deg: 45.0,
            min_ink_pixels: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DenoiseConfig {
    /// Mean absolute high-pass residual above which the page counts as noisy.
    pub noise_threshold: f32,
    /// Laplacian variance below which the page counts as blurry.
    pub sharpness_threshold: f32,
    pub min_strength: f32,
    pub max_strength: f32,
    /// Upper bound on the smoothing sigma.
    pub max_sigma: f32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            noise_threshold: 12.0,
            sharpness_threshold: 120.0,
            min_strength: 0.15,
            max_strength: 1.0,
            max_sigma: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackgroundCleanConfig {
    /// Pixels below this level count as shadow.
    pub shadow_level: u8,
    pub shadow_ratio: f32,
    /// Relative corner/center brightness difference that flags uneven lighting.
    pub lighting_diff: f32,
    /// Radius of the background estimation filter, as a fraction of the shorter side.
    pub background_radius_fraction: f32,
}

impl Default for BackgroundCleanConfig {
    fn default() -> Self {
        Self {
            shadow_level: 50,
            shadow_ratio: 0.10,
            lighting_diff: 0.2,
            background_radius_fraction: 0.02,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhanceConfig {
    /// Tone standard deviation below which the page counts as low contrast.
    pub contrast_threshold: f32,
    pub min_clip_limit: f32,
    pub max_clip_limit: f32,
    pub min_unsharp: f32,
    pub max_unsharp: f32,
    /// CLAHE tile grid (tiles x tiles).
    pub tiles: u32,
}

impl Default for EnhanceConfig {
    fn default() -> Self {
        Self {
            contrast_threshold: 40.0,
            min_clip_limit: 1.2,
            max_clip_limit: 3.0,
            min_unsharp: 1.1,
            max_unsharp: 1.5,
            tiles: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextRefineConfig {
    /// Ink components smaller than this many pixels are speckles.
    pub speck_size: u32,
    /// Fraction of speckle components that triggers cleanup.
    pub speckle_ratio: f32,
    /// Cleanup needs more than this many speckles.
    pub min_speckles: u32,
    /// Largest fraction of ink the cleanup may erase before it is rolled back.
    pub max_ink_loss: f32,
    pub window: u32,
    pub k: f32,
}

impl Default for TextRefineConfig {
    fn default() -> Self {
        Self {
            speck_size: 30,
            speckle_ratio: 0.35,
            min_speckles: 5,
            max_ink_loss: 0.15,
            window: 25,
            k: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    /// Sauvola window side in pixels.
    pub window: u32,
    pub k: f32,
    /// Sauvola dynamic range of the standard deviation.
    pub dynamic_range: f32,
    /// Plausible foreground ratio band for a text page.
    pub min_foreground: f32,
    pub max_foreground: f32,
    /// Fallback gaussian-adaptive block size and offset.
    pub fallback_block: u32,
    pub fallback_offset: i32,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            window: 25,
            k: 0.2,
            dynamic_range: 128.0,
            min_foreground: 0.002,
            max_foreground: 0.40,
            fallback_block: 15,
            fallback_offset: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeRasterConfig {
    /// Shortest straight ink run, in pixels, that counts as a ruling line.
    pub min_rule_length: u32,
    /// Number of ruling lines that flags a grid or form raster.
    pub min_rules: u32,
    /// Ink components within this area band are stamp candidates.
    pub stamp_min_area: u32,
    pub stamp_max_area: u32,
    /// Both sides of a stamp's bounding box must reach this many pixels.
    pub stamp_min_side: u32,
    /// Number of stamp candidates that flags stamps.
    pub min_stamps: u32,
}

impl Default for DeRasterConfig {
    fn default() -> Self {
        Self {
            min_rule_length: 31,
            min_rules: 10,
            stamp_min_area: 500,
            stamp_max_area: 50_000,
            stamp_min_side: 40,
            min_stamps: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DotsConfig {
    /// Pixels at or below this level count as ink.
    pub ink_level: u8,
    /// Dot components have an area strictly between these bounds.
    pub min_dot_area: u32,
    pub max_dot_area: u32,
    /// Dot count above which cleanup runs.
    pub min_dots: u32,
    /// Dots per 100x100 pixel block above which cleanup runs.
    pub min_density: f32,
    /// Largest fraction of ink the cleanup may erase before it is rolled back.
    pub max_ink_loss: f32,
}

impl Default for DotsConfig {
    fn default() -> Self {
        Self {
            ink_level: 200,
            min_dot_area: 5,
            max_dot_area: 20,
            min_dots: 50,
            min_density: 2.0,
            max_ink_loss: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharpenConfig {
    /// Laplacian variance below which the page counts as soft.
    pub blur_threshold: f32,
    /// Pages with a tone spread below this have nothing to sharpen.
    pub min_contrast: f32,
    /// Weight of the edge layer added back by the unsharp pass.
    pub amount: f32,
    /// Weight of the high-pass detail layer added by the second pass.
    pub detail: f32,
    pub sigma: f32,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            blur_threshold: 100.0,
            min_contrast: 8.0,
            amount: 0.8,
            detail: 0.5,
            sigma: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothConfig {
    /// Median Sobel magnitude above which the page counts as grainy.
    pub grain_threshold: f32,
    /// Grain levels that select the medium and heavy filter chains.
    pub medium_grain: f32,
    pub heavy_grain: f32,
}

impl Default for SmoothConfig {
    fn default() -> Self {
        Self {
            grain_threshold: 20.0,
            medium_grain: 25.0,
            heavy_grain: 40.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorCorrectionConfig {
    /// Largest difference between channel means that still counts as neutral.
    pub cast_threshold: f32,
    /// Mean luminance below which the page counts as faded.
    pub faded_level: f32,
    pub clip_limit: f32,
    pub tiles: u32,
    /// Share of samples clipped at each end of a channel by the final stretch.
    pub stretch_tail: f32,
}

impl Default for ColorCorrectionConfig {
    fn default() -> Self {
        Self {
            cast_threshold: 30.0,
            faded_level: 100.0,
            clip_limit: 2.0,
            tiles: 8,
            stretch_tail: 0.005,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    /// A crease must span this fraction of the page side it runs along.
    pub span_fraction: f32,
    /// Crease half thickness in pixels; wider dark features are content.
    pub max_half_width: u32,
    /// Darkening below the local paper level that counts as a crease.
    /// Anything darker than `max_depth` is ink, such as a rule or underline.
    pub min_depth: u8,
    pub max_depth: u8,
    /// Breaks in a crease up to this many pixels are bridged.
    pub max_gap: u32,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            span_fraction: 0.5,
            max_half_width: 3,
            min_depth: 12,
            max_depth: 90,
            max_gap: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuillocheConfig {
    /// Spectral radius band searched for periodic energy, in cycles per longer side.
    pub min_radius: u32,
    pub max_radius: u32,
    /// Half width of the ring window the strength is integrated over.
    pub ring_half_width: u32,
    /// Pattern strength (ring power above its flanks as a share of non-DC
    /// power, weighted by angular spread) that flags a pattern.
    pub strength_threshold: f32,
    /// Width of the cosine taper either side of the notch.
    pub taper: u32,
    /// Residual gain kept inside the notch.
    pub floor_gain: f32,
}

impl Default for GuillocheConfig {
    fn default() -> Self {
        Self {
            min_radius: 30,
            max_radius: 120,
            ring_half_width: 5,
            strength_threshold: 0.15,
            taper: 3,
            floor_gain: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WatermarkConfig {
    /// Background deviation (in grey levels) that counts as watermark coverage.
    pub diff_level: u8,
    /// Covered fraction of the page that flags a watermark.
    pub ratio_threshold: f32,
    /// Fraction of the estimated layer subtracted from luminance.
    pub layer_weight: f32,
    pub clip_limit: f32,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            diff_level: 10,
            ratio_threshold: 0.20,
            layer_weight: 1.0,
            clip_limit: 3.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HologramConfig {
    /// Saturation (0-255) below which a pixel can be a specular glare.
    pub max_saturation: u8,
    /// Minimum value (0-255) for glare pixels.
    pub min_value: u8,
    /// Glare must also exceed the page's median value by this margin.
    pub value_margin: u8,
    pub min_region_area: u32,
    /// Regions larger than this fraction of the frame are left alone.
    pub max_region_fraction: f32,
    /// Number of qualifying regions that flags a hologram.
    pub min_regions: u32,
}

impl Default for HologramConfig {
    fn default() -> Self {
        Self {
            max_saturation: 50,
            min_value: 200,
            value_margin: 20,
            min_region_area: 20,
            max_region_fraction: 0.02,
            min_regions: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MrzConfig {
    /// Height of the bottom band searched, as a fraction of page height.
    pub band_fraction: f32,
    /// Minimum ink fraction for a row to count as a text row.
    pub row_ink: f32,
    /// Minimum horizontal ink span of a text row, as a fraction of width.
    pub row_span: f32,
    /// Fraction of band rows that must be wide text rows.
    pub density_threshold: f32,
}

impl Default for MrzConfig {
    fn default() -> Self {
        Self {
            band_fraction: 0.20,
            row_ink: 0.03,
            row_span: 0.6,
            density_threshold: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Confidence above which a present feature raises the risk flag.
    pub security_feature_threshold: f32,
    /// Features with confidence at or above this are reported as detected.
    pub detection_confidence: f32,
    /// Gradient anisotropy of ink-dense tiles that indicates a 1D barcode.
    pub barcode_anisotropy: f32,
    /// Mean HSV saturation (0-255) above which a page counts as colourful.
    pub color_saturation: f32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            security_feature_threshold: 0.85,
            detection_confidence: 0.5,
            barcode_anisotropy: 6.0,
            color_saturation: 40.0,
        }
    }
}
