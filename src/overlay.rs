// overlay.rs
//
// The classified analysis layer drawn over the base map.

use geojson::Value;
use plotters::prelude::RGBColor;

use crate::analysis::{self, AnalysisResult};
use crate::geometry::{self, Bounds};
use crate::palette::{self, Ramp};

pub const MIN_STROKE_WIDTH: u32 = 1;
pub const MAX_STROKE_WIDTH: u32 = 10;

/// Layer style controls. Changing these never needs a new request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StyleSettings {
    pub ramp: Ramp,
    pub invert: bool,
    pub opacity_percent: u8,
    pub stroke_width: u32,
}

impl Default for StyleSettings {
    fn default() -> Self {
        StyleSettings {
            ramp: Ramp::Blue,
            invert: false,
            opacity_percent: 80,
            stroke_width: 3,
        }
    }
}

impl StyleSettings {
    pub fn opacity(&self) -> f64 {
        f64::from(self.opacity_percent.min(100)) / 100.0
    }

    pub fn adjust_opacity(&mut self, delta: i16) {
        let next = (i16::from(self.opacity_percent) + delta).clamp(0, 100);
        self.opacity_percent = next as u8;
    }

    pub fn adjust_stroke_width(&mut self, delta: i32) {
        let next = (self.stroke_width as i32 + delta)
            .clamp(MIN_STROKE_WIDTH as i32, MAX_STROKE_WIDTH as i32);
        self.stroke_width = next as u32;
    }

    /// The ramp's stops for `steps` classes, with inversion applied.
    pub fn colors(&self, steps: usize) -> Vec<RGBColor> {
        palette::interpolated_colors(self.ramp, steps, self.invert)
    }
}

/// Upper bound on generated stops; class ids past it share the last stop.
const MAX_STEPS: u64 = 1 << 16;

/// One stop per class id in `0..=max_class_id`.
pub fn class_steps(max_class_id: u64) -> usize {
    (max_class_id.min(MAX_STEPS - 1) + 1) as usize
}

#[derive(Debug, Clone, Copy)]
pub struct FeatureStyle {
    pub color: RGBColor,
    pub weight: f64,
    pub opacity: f64,
}

#[derive(Debug, Clone)]
pub struct OverlayFeature {
    pub geometry: Option<Value>,
    pub class_id: u64,
    /// `class_id` exactly as received, shown in the popup.
    pub raw_class_id: Option<u64>,
    pub value: Option<f64>,
    pub style: FeatureStyle,
}

#[derive(Debug, Clone)]
pub struct Overlay {
    features: Vec<OverlayFeature>,
    bounds: Option<Bounds>,
    pub visible: bool,
}

impl Overlay {
    pub fn build(result: &AnalysisResult, style: &StyleSettings) -> Overlay {
        let mut bounds = None;
        let features = result
            .collection
            .features
            .iter()
            .map(|feature| {
                let geometry = feature.geometry.as_ref().map(|g| g.value.clone());
                if let Some(value) = &geometry {
                    geometry::extend_bounds(&mut bounds, value);
                }
                OverlayFeature {
                    geometry,
                    class_id: analysis::class_id(feature),
                    raw_class_id: analysis::raw_class_id(feature),
                    value: analysis::value(feature),
                    style: FeatureStyle {
                        color: RGBColor(0x33, 0x33, 0x33),
                        weight: 0.0,
                        opacity: 0.0,
                    },
                }
            })
            .collect();

        let mut overlay = Overlay {
            features,
            bounds,
            visible: true,
        };
        overlay.restyle(style, result.max_class_id);
        overlay
    }

    /// Reapplies color, weight and opacity. Geometry and bounds are untouched.
    pub fn restyle(&mut self, style: &StyleSettings, max_class_id: u64) {
        let steps = class_steps(max_class_id);
        let colors = style.colors(steps);
        let weight = f64::from(style.stroke_width);
        let opacity = style.opacity();
        for feature in &mut self.features {
            feature.style = FeatureStyle {
                color: palette::color_for_class(&colors, feature.class_id),
                weight,
                opacity,
            };
        }
    }

    pub fn features(&self) -> &[OverlayFeature] {
        &self.features
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Popup text for a feature: its value and class.
    pub fn popup(&self, index: usize) -> Option<Vec<String>> {
        let feature = self.features.get(index)?;
        let class = feature
            .raw_class_id
            .map_or_else(|| String::from("N/A"), |c| c.to_string());
        Some(vec![
            format!("Value: {}", analysis::format_value(feature.value)),
            format!("Class: {class}"),
        ])
    }

    /// Index of the feature closest to `(lon, lat)` within `tolerance` degrees.
    pub fn nearest_feature(&self, lon: f64, lat: f64, tolerance: f64) -> Option<usize> {
        self.features
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                let d = geometry::distance_to(f.geometry.as_ref()?, (lon, lat))?;
                (d <= tolerance).then_some((i, d))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(i, _)| i)
    }
}
