use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use crate::detect::result::Detection;

use super::backend::{DetectionStage, DetectorBackend};

/// Binds one detector backend to each detection stage.
///
/// The pipeline never loads or discovers models itself; callers register
/// ready backends here and the nested adapter pulls them by stage.
pub struct DetectorRegistry {
    backends: HashMap<DetectionStage, Box<dyn DetectorBackend>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Convenience constructor binding both stages at once.
    pub fn with_backends<V, C>(vessel: V, content: C) -> Self
    where
        V: DetectorBackend + 'static,
        C: DetectorBackend + 'static,
    {
        let mut registry = Self::new();
        registry.register(DetectionStage::Vessel, vessel);
        registry.register(DetectionStage::Content, content);
        registry
    }

    /// Register a backend for a stage, replacing any previous binding.
    pub fn register<B: DetectorBackend + 'static>(&mut self, stage: DetectionStage, backend: B) {
        log::debug!(
            "registered {} backend '{}'",
            stage.as_str(),
            backend.name()
        );
        self.backends.insert(stage, Box::new(backend));
    }

    pub fn is_registered(&self, stage: DetectionStage) -> bool {
        self.backends.contains_key(&stage)
    }

    /// Backend name per registered stage.
    pub fn list(&self) -> Vec<(DetectionStage, String)> {
        let mut out: Vec<_> = self
            .backends
            .iter()
            .map(|(stage, backend)| (*stage, backend.name().to_string()))
            .collect();
        out.sort_by_key(|(stage, _)| stage.as_str());
        out
    }

    /// Fails unless both stages have a backend.
    pub fn ensure_ready(&self) -> Result<()> {
        for stage in [DetectionStage::Vessel, DetectionStage::Content] {
            if !self.is_registered(stage) {
                return Err(anyhow!("no {} detector loaded", stage.as_str()));
            }
        }
        Ok(())
    }

    /// Run every registered backend's warm-up hook.
    pub fn warm_up(&mut self) -> Result<()> {
        for (stage, backend) in self.backends.iter_mut() {
            backend
                .warm_up()
                .with_context(|| format!("warm up {} detector", stage.as_str()))?;
        }
        Ok(())
    }

    /// Run detection with the backend bound to `stage`.
    pub fn detect(
        &mut self,
        stage: DetectionStage,
        image: &RgbImage,
        min_confidence: f32,
    ) -> Result<Vec<Detection>> {
        let backend = self
            .backends
            .get_mut(&stage)
            .ok_or_else(|| anyhow!("no {} detector loaded", stage.as_str()))?;
        backend
            .detect(image, min_confidence)
            .with_context(|| format!("{} detector '{}' failed", stage.as_str(), backend.name()))
    }
}

impl Default for DetectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
