//! Visibility and threshold gating.
//!
//! Pure functions over `PipelineConfig`; nothing here holds state.

use crate::config::{PipelineConfig, VisibilityConfig};

/// A derived liquid measurement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Metric {
    Turbidity,
    Hue,
    VolumeFraction,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Turbidity, Metric::Hue, Metric::VolumeFraction];

    /// Short tag used in rendered labels.
    pub fn tag(&self) -> &'static str {
        match self {
            Metric::Turbidity => "T",
            Metric::Hue => "C",
            Metric::VolumeFraction => "V",
        }
    }
}

/// Class families recognised in detector labels, in lookup order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContentClass {
    Vessel,
    Solid,
    Residue,
    Empty,
    Homogeneous,
    Heterogeneous,
}

const CLASS_PATTERNS: [(&str, ContentClass); 6] = [
    ("vessel", ContentClass::Vessel),
    ("solid", ContentClass::Solid),
    ("residue", ContentClass::Residue),
    ("empty", ContentClass::Empty),
    ("homo", ContentClass::Homogeneous),
    ("hetero", ContentClass::Heterogeneous),
];

impl ContentClass {
    /// Case-insensitive substring lookup; the first pattern in table order wins.
    pub fn from_label(label: &str) -> Option<Self> {
        let lower = label.to_lowercase();
        CLASS_PATTERNS
            .iter()
            .find(|(pattern, _)| lower.contains(pattern))
            .map(|(_, class)| *class)
    }

    fn toggle(&self, visibility: &VisibilityConfig) -> bool {
        match self {
            ContentClass::Vessel => visibility.vessel,
            ContentClass::Solid => visibility.solid,
            ContentClass::Residue => visibility.residue,
            ContentClass::Empty => visibility.empty,
            ContentClass::Homogeneous => visibility.homogeneous,
            ContentClass::Heterogeneous => visibility.heterogeneous,
        }
    }
}

/// Whether a detected label should be drawn. Unknown classes are visible.
pub fn class_visible(label: &str, visibility: &VisibilityConfig) -> bool {
    ContentClass::from_label(label)
        .map(|class| class.toggle(visibility))
        .unwrap_or(true)
}

/// Liquid classes are the ones that get T/C/V measurements.
pub fn is_liquid_label(label: &str) -> bool {
    let lower = label.to_lowercase();
    lower.starts_with("homo") || lower.starts_with("hetero")
}

fn metric_enabled(metric: Metric, visibility: &VisibilityConfig) -> bool {
    match metric {
        Metric::Turbidity => visibility.turbidity,
        Metric::Hue => visibility.hue,
        Metric::VolumeFraction => visibility.volume_fraction,
    }
}

/// Raw per-frame show decision for one metric value.
///
/// `advanced_overlay AND metric toggle AND (no thresholds OR value >= threshold)`.
pub fn should_show(metric: Metric, value: f32, config: &PipelineConfig) -> bool {
    if !config.render.advanced_overlay || !metric_enabled(metric, &config.visibility) {
        return false;
    }
    match &config.thresholds {
        None => true,
        Some(t) => {
            let min = match metric {
                Metric::Turbidity => t.min_turbidity,
                Metric::Hue => t.min_hue,
                Metric::VolumeFraction => t.min_volume_fraction,
            };
            value >= min
        }
    }
}
