use std::collections::VecDeque;

use anyhow::Result;
use image::RgbImage;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;

/// Deterministic backend that replays pre-recorded detections.
///
/// In `fixed` mode every call returns the same set. In `sequence` mode each
/// call pops the next set; once exhausted, calls return nothing.
pub struct ScriptedBackend {
    name: String,
    fixed: Option<Vec<Detection>>,
    queue: VecDeque<Vec<Detection>>,
    calls: usize,
}

impl ScriptedBackend {
    pub fn fixed(name: impl Into<String>, detections: Vec<Detection>) -> Self {
        Self {
            name: name.into(),
            fixed: Some(detections),
            queue: VecDeque::new(),
            calls: 0,
        }
    }

    pub fn sequence(name: impl Into<String>, calls: Vec<Vec<Detection>>) -> Self {
        Self {
            name: name.into(),
            fixed: None,
            queue: calls.into(),
            calls: 0,
        }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        Self::fixed(name, Vec::new())
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&mut self, _image: &RgbImage, min_confidence: f32) -> Result<Vec<Detection>> {
        self.calls += 1;
        let batch = match &self.fixed {
            Some(fixed) => fixed.clone(),
            None => self.queue.pop_front().unwrap_or_default(),
        };
        Ok(batch
            .into_iter()
            .filter(|d| d.confidence() >= min_confidence)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::BoundingBox;

    fn hit(conf: f32) -> Detection {
        Detection::new(BoundingBox::new(0, 0, 4, 4), conf, "vessel")
    }

    #[test]
    fn fixed_backend_filters_by_confidence_floor() {
        let mut backend = ScriptedBackend::fixed("fixed", vec![hit(0.9), hit(0.3)]);
        let img = RgbImage::new(8, 8);

        let r1 = backend.detect(&img, 0.4).unwrap();
        assert_eq!(r1.len(), 1);
        assert_eq!(r1[0].confidence(), 0.9);

        let r2 = backend.detect(&img, 0.1).unwrap();
        assert_eq!(r2.len(), 2);
        assert_eq!(backend.calls(), 2);
    }

    #[test]
    fn sequence_backend_runs_dry() {
        let mut backend = ScriptedBackend::sequence("seq", vec![vec![hit(0.8)], vec![]]);
        let img = RgbImage::new(8, 8);

        assert_eq!(backend.detect(&img, 0.4).unwrap().len(), 1);
        assert!(backend.detect(&img, 0.4).unwrap().is_empty());
        assert!(backend.detect(&img, 0.4).unwrap().is_empty());
    }
}
