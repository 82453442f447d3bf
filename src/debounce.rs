//! Per-box, per-metric hysteresis for rendered measurements.
//!
//! A qualifying frame shows the current value immediately; a previously shown
//! value survives until `DEBOUNCE_WINDOW` consecutive non-qualifying frames
//! have been recorded, then drops to zero. A value renders only while it is
//! strictly positive.
//!
//! State lives in a `DebounceState` owned by one processing run. It is never
//! shared between runs and never persisted.

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::config::{DebounceSettings, KeyMatching};
use crate::geometry::BoundingBox;
use crate::measure::Measurement;
use crate::policy::Metric;

/// Consecutive non-qualifying frames before a value is hidden.
pub const DEBOUNCE_WINDOW: u32 = 3;

/// Hysteresis memory for one metric of one box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DebounceEntry {
    last_value: f32,
    zero_streak: u32,
}

impl DebounceEntry {
    /// A fresh entry starts hidden, as if the window had already elapsed.
    pub fn new() -> Self {
        Self {
            last_value: 0.0,
            zero_streak: DEBOUNCE_WINDOW,
        }
    }

    /// Feed this frame's raw decision and value; returns the value to show.
    pub fn observe(&mut self, raw_show: bool, value: f32) -> f32 {
        if raw_show {
            self.zero_streak = 0;
            self.last_value = value;
        } else {
            self.zero_streak = (self.zero_streak + 1).min(DEBOUNCE_WINDOW);
            if self.zero_streak >= DEBOUNCE_WINDOW {
                self.last_value = 0.0;
            }
        }
        self.last_value
    }

    pub fn last_value(&self) -> f32 {
        self.last_value
    }

    pub fn zero_streak(&self) -> u32 {
        self.zero_streak
    }

    pub fn is_showing(&self) -> bool {
        self.last_value > 0.0
    }
}

impl Default for DebounceEntry {
    fn default() -> Self {
        Self::new()
    }
}

/// Identity used to look up debounce state: the box's current-frame edges.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BoxKey(String);

impl From<&BoundingBox> for BoxKey {
    fn from(bbox: &BoundingBox) -> Self {
        BoxKey(bbox.to_string())
    }
}

impl fmt::Display for BoxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Metric values that survived gating, ready for rendering.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ShownMetrics {
    pub turbidity: Option<f32>,
    pub hue: Option<f32>,
    pub volume_fraction: Option<f32>,
}

impl ShownMetrics {
    pub fn get(&self, metric: Metric) -> Option<f32> {
        match metric {
            Metric::Turbidity => self.turbidity,
            Metric::Hue => self.hue,
            Metric::VolumeFraction => self.volume_fraction,
        }
    }

    fn set(&mut self, metric: Metric, value: Option<f32>) {
        match metric {
            Metric::Turbidity => self.turbidity = value,
            Metric::Hue => self.hue = value,
            Metric::VolumeFraction => self.volume_fraction = value,
        }
    }

    pub fn is_empty(&self) -> bool {
        Metric::ALL.iter().all(|m| self.get(*m).is_none())
    }

    /// `"T=…, C=…, V=…"` for the metrics present, or `None` when nothing is shown.
    pub fn label_suffix(&self) -> Option<String> {
        let mut parts = Vec::with_capacity(3);
        if let Some(t) = self.turbidity {
            parts.push(format!("T={t:.1}"));
        }
        if let Some(c) = self.hue {
            parts.push(format!("C={c:.1}"));
        }
        if let Some(v) = self.volume_fraction {
            parts.push(format!("V={v:.2}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}

/// Raw per-frame show decisions, indexed like `Metric::ALL`.
pub type RawDecisions = [bool; 3];

fn metric_index(metric: Metric) -> usize {
    match metric {
        Metric::Turbidity => 0,
        Metric::Hue => 1,
        Metric::VolumeFraction => 2,
    }
}

#[derive(Clone, Debug)]
struct TrackedBox {
    bbox: BoundingBox,
    entries: [DebounceEntry; 3],
    last_seen: u64,
}

/// Debounce memory for one processing run.
#[derive(Debug)]
pub struct DebounceState {
    settings: DebounceSettings,
    tracked: HashMap<BoxKey, TrackedBox>,
    frame: u64,
    claimed: HashSet<BoxKey>,
}

impl DebounceState {
    pub fn new(settings: DebounceSettings) -> Self {
        Self {
            settings,
            tracked: HashMap::new(),
            frame: 0,
            claimed: HashSet::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.settings.enabled
    }

    /// Forget every tracked box.
    pub fn reset(&mut self) {
        self.tracked.clear();
        self.claimed.clear();
        self.frame = 0;
    }

    /// Mark the start of a new frame.
    pub fn begin_frame(&mut self) {
        self.frame += 1;
        self.claimed.clear();
    }

    /// Number of tracked boxes.
    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    /// Current entry for a box key and metric, if tracked.
    pub fn entry(&self, bbox: &BoundingBox, metric: Metric) -> Option<DebounceEntry> {
        self.tracked
            .get(&BoxKey::from(bbox))
            .map(|t| t.entries[metric_index(metric)])
    }

    /// Gate one measurement. When disabled, raw decisions pass straight through.
    pub fn apply(
        &mut self,
        bbox: &BoundingBox,
        measurement: &Measurement,
        raw: RawDecisions,
    ) -> ShownMetrics {
        let mut shown = ShownMetrics::default();

        if !self.settings.enabled {
            for metric in Metric::ALL {
                let value = measurement.value(metric);
                shown.set(metric, raw[metric_index(metric)].then_some(value));
            }
            return shown;
        }

        let key = self.resolve_key(bbox);
        let frame = self.frame;
        let tracked = self.tracked.entry(key.clone()).or_insert_with(|| TrackedBox {
            bbox: *bbox,
            entries: [DebounceEntry::new(); 3],
            last_seen: frame,
        });
        tracked.bbox = *bbox;
        tracked.last_seen = frame;
        for metric in Metric::ALL {
            let idx = metric_index(metric);
            let value = tracked.entries[idx].observe(raw[idx], measurement.value(metric));
            shown.set(metric, (value > 0.0).then_some(value));
        }
        self.claimed.insert(key);
        shown
    }

    fn resolve_key(&mut self, bbox: &BoundingBox) -> BoxKey {
        let key = BoxKey::from(bbox);
        let KeyMatching::Iou { min_iou } = self.settings.matching else {
            return key;
        };
        if self.tracked.contains_key(&key) {
            return key;
        }

        let frame = self.frame;
        let best = self
            .tracked
            .iter()
            .filter(|(k, t)| t.last_seen + 1 == frame && !self.claimed.contains(*k))
            .map(|(k, t)| (k, t.bbox.iou(bbox)))
            .filter(|(_, iou)| *iou >= min_iou)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(k, _)| k.clone());

        if let Some(previous) = best {
            if let Some(tracked) = self.tracked.remove(&previous) {
                log::trace!("debounce: {} carried over from {}", key, previous);
                self.tracked.insert(key.clone(), tracked);
            }
        }
        key
    }
}
