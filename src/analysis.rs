// analysis.rs

use std::path::{Path, PathBuf};

use geojson::{Feature, FeatureCollection};
use serde_json::Value as JsonValue;

pub const DEFAULT_CLASS_COUNT: u32 = 5;

/// Sent as `radius` when no search radius applies.
pub const GLOBAL_RADIUS: &str = "n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Connectivity,
    Closeness,
    Betweenness,
}

impl AnalysisType {
    pub fn as_str(self) -> &'static str {
        match self {
            AnalysisType::Connectivity => "connectivity",
            AnalysisType::Closeness => "closeness",
            AnalysisType::Betweenness => "betweenness",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AnalysisType::Connectivity => "Connectivity (degree)",
            AnalysisType::Closeness => "Closeness centrality",
            AnalysisType::Betweenness => "Betweenness centrality",
        }
    }

    /// Metric and radius are only meaningful for centrality analyses.
    pub fn uses_centrality_params(self) -> bool {
        self != AnalysisType::Connectivity
    }

    pub fn next(self) -> Self {
        match self {
            AnalysisType::Connectivity => AnalysisType::Closeness,
            AnalysisType::Closeness => AnalysisType::Betweenness,
            AnalysisType::Betweenness => AnalysisType::Connectivity,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationMethod {
    NaturalBreaks,
    EqualCount,
    EqualInterval,
}

impl ClassificationMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            ClassificationMethod::NaturalBreaks => "Natural Breaks (Jenks)",
            ClassificationMethod::EqualCount => "Equal Count (Quantile)",
            ClassificationMethod::EqualInterval => "Equal Interval",
        }
    }

    pub fn next(self) -> Self {
        match self {
            ClassificationMethod::NaturalBreaks => ClassificationMethod::EqualCount,
            ClassificationMethod::EqualCount => ClassificationMethod::EqualInterval,
            ClassificationMethod::EqualInterval => ClassificationMethod::NaturalBreaks,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    Euclidean,
    Angular,
}

impl Metric {
    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Euclidean => "EUCLIDEAN",
            Metric::Angular => "ANGULAR",
        }
    }

    pub fn next(self) -> Self {
        match self {
            Metric::Euclidean => Metric::Angular,
            Metric::Angular => Metric::Euclidean,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Radius {
    Global,
    Meters(String),
}

impl Radius {
    /// Empty or non-positive input means "no radius".
    pub fn from_input(input: &str) -> Radius {
        let trimmed = input.trim();
        match trimmed.parse::<f64>() {
            Ok(v) if v.is_finite() && v > 0.0 => Radius::Meters(trimmed.to_string()),
            _ => Radius::Global,
        }
    }

    pub fn as_form_value(&self) -> &str {
        match self {
            Radius::Global => GLOBAL_RADIUS,
            Radius::Meters(m) => m,
        }
    }
}

/// Entries of the radius selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadiusChoice {
    Global,
    Preset(u32),
    Custom,
}

impl RadiusChoice {
    pub const ALL: [RadiusChoice; 5] = [
        RadiusChoice::Global,
        RadiusChoice::Preset(400),
        RadiusChoice::Preset(800),
        RadiusChoice::Preset(1600),
        RadiusChoice::Custom,
    ];

    pub fn label(self) -> String {
        match self {
            RadiusChoice::Global => "n (global)".to_string(),
            RadiusChoice::Preset(m) => format!("{m} m"),
            RadiusChoice::Custom => "custom".to_string(),
        }
    }

    pub fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

/// Current state of the analysis form in the input panel.
#[derive(Debug, Clone)]
pub struct AnalysisForm {
    pub analysis_type: AnalysisType,
    pub method: ClassificationMethod,
    pub class_count_input: String,
    pub metric: Metric,
    pub radius_choice: RadiusChoice,
    pub custom_radius_input: String,
}

impl Default for AnalysisForm {
    fn default() -> Self {
        AnalysisForm {
            analysis_type: AnalysisType::Connectivity,
            method: ClassificationMethod::NaturalBreaks,
            class_count_input: DEFAULT_CLASS_COUNT.to_string(),
            metric: Metric::Euclidean,
            radius_choice: RadiusChoice::Global,
            custom_radius_input: String::new(),
        }
    }
}

impl AnalysisForm {
    /// Parsed class count; anything unusable falls back to the default.
    pub fn class_count(&self) -> u32 {
        match self.class_count_input.trim().parse::<i64>() {
            Ok(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
            _ => DEFAULT_CLASS_COUNT,
        }
    }

    pub fn radius(&self) -> Radius {
        match self.radius_choice {
            RadiusChoice::Global => Radius::Global,
            RadiusChoice::Preset(m) => Radius::Meters(m.to_string()),
            RadiusChoice::Custom => Radius::from_input(&self.custom_radius_input),
        }
    }

    pub fn to_request(&self, file: &Path) -> AnalysisRequest {
        AnalysisRequest {
            file: file.to_path_buf(),
            analysis_type: self.analysis_type,
            classification_method: self.method,
            class_count: self.class_count(),
            metric: self.metric,
            radius: self.radius(),
        }
    }
}

/// One submission to `POST /analyze`.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub file: PathBuf,
    pub analysis_type: AnalysisType,
    pub classification_method: ClassificationMethod,
    pub class_count: u32,
    pub metric: Metric,
    pub radius: Radius,
}

impl AnalysisRequest {
    /// Text fields of the multipart body, in submission order. `file` is added separately.
    pub fn form_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("analysis_type", self.analysis_type.as_str().to_string()),
            (
                "classification_method",
                self.classification_method.as_str().to_string(),
            ),
            ("class_count", self.class_count.to_string()),
            ("metric", self.metric.as_str().to_string()),
            ("radius", self.radius.as_form_value().to_string()),
        ]
    }
}

/// The last successful analysis and its derived class range.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub collection: FeatureCollection,
    pub max_class_id: u64,
}

impl AnalysisResult {
    pub fn new(collection: FeatureCollection) -> Self {
        let max_class_id = max_class_id(&collection);
        AnalysisResult {
            collection,
            max_class_id,
        }
    }

    pub fn feature_count(&self) -> usize {
        self.collection.features.len()
    }
}

pub fn max_class_id(collection: &FeatureCollection) -> u64 {
    collection
        .features
        .iter()
        .map(class_id)
        .max()
        .unwrap_or(0)
}

/// `class_id` property; missing or unusable values count as class 0.
pub fn class_id(feature: &Feature) -> u64 {
    raw_class_id(feature).unwrap_or(0)
}

/// `class_id` as the backend sent it, if it is a non-negative number.
pub fn raw_class_id(feature: &Feature) -> Option<u64> {
    match feature.property("class_id")? {
        JsonValue::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|v| v.is_finite() && *v >= 0.0)
                .map(|v| v.trunc() as u64)
        }),
        _ => None,
    }
}

pub fn value(feature: &Feature) -> Option<f64> {
    feature.property("value").and_then(JsonValue::as_f64)
}

pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.4}"),
        None => String::from("N/A"),
    }
}
