// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Scanprep preprocessing pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Unique identifier for one document run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub Uuid);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Orchestration template selected once per document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    /// Non-destructive geometry fixes only. Security features stay intact.
    Preserve,
    /// Strip detected security features before the OCR clean-up chain.
    Remove,
    /// General OCR clean-up with no feature removal.
    #[default]
    Default,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Remove => "remove",
            Self::Default => "default",
        }
    }
}

impl std::fmt::Display for PipelineMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse document category estimated by the classifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Passport data page or similar travel document.
    TravelDocument,
    /// ID-1 sized identity card.
    IdentityCard,
    Certificate,
    /// Banknote.
    Currency,
    #[default]
    Generic,
}

impl DocumentType {
    /// Types whose security features are treated as sensitive.
    pub fn is_restricted(&self) -> bool {
        matches!(self, Self::TravelDocument | Self::Currency)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TravelDocument => "travel_document",
            Self::IdentityCard => "identity_card",
            Self::Certificate => "certificate",
            Self::Currency => "currency",
            Self::Generic => "generic",
        }
    }
}

impl std::fmt::Display for DocumentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Security features the classifier scores and the remove-mode units target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecurityFeature {
    Watermark,
    Guilloche,
    Hologram,
    MachineReadableZone,
    Barcode,
}

impl SecurityFeature {
    pub const ALL: [SecurityFeature; 5] = [
        Self::Watermark,
        Self::Guilloche,
        Self::Hologram,
        Self::MachineReadableZone,
        Self::Barcode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Watermark => "watermark",
            Self::Guilloche => "guilloche",
            Self::Hologram => "hologram",
            Self::MachineReadableZone => "machine_readable_zone",
            Self::Barcode => "barcode",
        }
    }
}

impl std::fmt::Display for SecurityFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-document classification shared read-only by the selector and units.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentProfile {
    pub document_type: DocumentType,
    pub detected_features: BTreeSet<SecurityFeature>,
    /// Confidence in [0, 1] for every scored feature, detected or not.
    pub feature_strength: BTreeMap<SecurityFeature, f32>,
    /// Raised for restricted document types carrying a high-confidence feature.
    /// Consumed only by external compliance logic.
    pub risk_flag: bool,
    /// Likelihood score per candidate document type.
    #[serde(default)]
    pub type_scores: BTreeMap<DocumentType, f32>,
}

impl DocumentProfile {
    /// Profile of a plain document with no security features.
    pub fn generic() -> Self {
        Self::default()
    }

    pub fn has(&self, feature: SecurityFeature) -> bool {
        self.detected_features.contains(&feature)
    }

    pub fn strength(&self, feature: SecurityFeature) -> f32 {
        self.feature_strength.get(&feature).copied().unwrap_or(0.0)
    }

    /// Mark `feature` as present with the given confidence.
    pub fn with_feature(mut self, feature: SecurityFeature, confidence: f32) -> Self {
        self.detected_features.insert(feature);
        self.feature_strength.insert(feature, confidence.clamp(0.0, 1.0));
        self
    }
}

/// Rotation reported by an external OCR engine's orientation detection.
///
/// `rotate_deg` is the clockwise rotation the engine observed on the page
/// (so a value of 90 means the text currently reads rotated 90° clockwise).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrientationHint {
    pub rotate_deg: i32,
    pub confidence: Option<f32>,
}

impl OrientationHint {
    pub fn new(rotate_deg: i32) -> Self {
        Self {
            rotate_deg,
            confidence: None,
        }
    }
}

/// How a unit's `process` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitOutcome {
    /// The transform ran and its output replaces the page image.
    Applied,
    /// The transform failed its own post-condition and was discarded.
    Reverted,
    /// A required input was missing, so the unit did nothing.
    Degraded,
}

/// A single measurement or effect value recorded in unit metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<MetaValue>),
}

impl MetaValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric view; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[MetaValue]> {
        match self {
            Self::List(v) => Some(v),
            _ => None,
        }
    }
}

impl From<bool> for MetaValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i64> for MetaValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for MetaValue {
    fn from(v: i32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<u32> for MetaValue {
    fn from(v: u32) -> Self {
        Self::Int(v as i64)
    }
}

impl From<usize> for MetaValue {
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for MetaValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<f32> for MetaValue {
    fn from(v: f32) -> Self {
        // Round-trip through the shortest decimal form so 0.1f32 reports as 0.1.
        Self::Float(v.to_string().parse().unwrap_or(v as f64))
    }
}

impl From<&str> for MetaValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for MetaValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl<T: Into<MetaValue>> From<Vec<T>> for MetaValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

/// Ordered measurement/effect map attached to detections and process results.
pub type Metadata = BTreeMap<String, MetaValue>;

/// Build a [`Metadata`] map from `key => value` pairs.
#[macro_export]
macro_rules! metadata {
    () => { $crate::types::Metadata::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::types::Metadata::new();
        $( map.insert(($key).to_string(), $crate::types::MetaValue::from($value)); )+
        map
    }};
}
