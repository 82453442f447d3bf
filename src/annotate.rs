//! Frame annotation orchestrator.
//!
//! `FrameAnnotator` glues the nested detector, the compositor and the
//! configured layout together. It holds the immutable `PipelineConfig`, the
//! label font, and the label list of the most recent frame. Debounce
//! state is passed in by the caller so each run owns its own.

use anyhow::Result;
use image::RgbImage;

use crate::compositor::{self, LabelFont};
use crate::config::PipelineConfig;
use crate::debounce::DebounceState;
use crate::detect::DetectorRegistry;
use crate::nested::{detect_nested, DrawableBox};

/// Result of annotating one frame before layout composition.
#[derive(Debug)]
pub enum FrameOutcome {
    /// The vessel stage found nothing; the frame passes through untouched.
    NoVessel,
    Annotated {
        image: RgbImage,
        boxes: Vec<DrawableBox>,
    },
}

impl FrameOutcome {
    pub fn is_annotated(&self) -> bool {
        matches!(self, FrameOutcome::Annotated { .. })
    }
}

/// A frame ready to be written, after side-by-side and summary composition.
#[derive(Debug)]
pub struct RenderedFrame {
    pub image: RgbImage,
    /// False when no vessel was found and the source frame was used as-is.
    pub annotated: bool,
}

pub struct FrameAnnotator {
    config: PipelineConfig,
    font: Option<LabelFont>,
    last_labels: Vec<String>,
}

impl FrameAnnotator {
    /// Build an annotator, loading the label font from `config.font_path`.
    ///
    /// Without a configured font, or when it fails to load, the bundled font
    /// is used instead.
    pub fn new(config: PipelineConfig) -> Self {
        let font = match &config.font_path {
            Some(path) => LabelFont::load(path).or_else(|err| {
                log::warn!("label font unavailable, using bundled font: {:#}", err);
                LabelFont::bundled()
            }),
            None => LabelFont::bundled(),
        };
        let font = match font {
            Ok(font) => Some(font),
            Err(err) => {
                log::warn!("no usable label font, drawing boxes without text: {:#}", err);
                None
            }
        };
        Self::with_font(config, font)
    }

    /// Use `font` as given; `None` draws boxes and swatches without text.
    pub fn with_font(config: PipelineConfig, font: Option<LabelFont>) -> Self {
        Self {
            config,
            font,
            last_labels: Vec::new(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Label strings rendered on the most recent frame; empty after a frame without vessels.
    pub fn last_labels(&self) -> &[String] {
        &self.last_labels
    }

    /// Detect and draw boxes, labels and swatches onto a copy of `frame`.
    pub fn annotate_frame(
        &mut self,
        frame: &RgbImage,
        detectors: &mut DetectorRegistry,
        debounce: &mut DebounceState,
    ) -> Result<FrameOutcome> {
        self.last_labels.clear();

        let Some(detections) = detect_nested(frame, detectors, &self.config, debounce)? else {
            return Ok(FrameOutcome::NoVessel);
        };

        let mut canvas = frame.clone();
        compositor::draw_swatches(&mut canvas, &detections.swatches);
        compositor::draw_boxes(
            &mut canvas,
            &detections.boxes,
            self.font.as_ref(),
            self.config.render.font_scale,
        );
        self.last_labels = detections.labels();

        Ok(FrameOutcome::Annotated {
            image: canvas,
            boxes: detections.boxes,
        })
    }

    /// Annotate `frame`, then apply side-by-side and top-left summary layout.
    pub fn render_frame(
        &mut self,
        frame: &RgbImage,
        detectors: &mut DetectorRegistry,
        debounce: &mut DebounceState,
    ) -> Result<RenderedFrame> {
        let (annotated, was_annotated) = match self.annotate_frame(frame, detectors, debounce)? {
            FrameOutcome::Annotated { image, .. } => (image, true),
            FrameOutcome::NoVessel => (frame.clone(), false),
        };
        Ok(RenderedFrame {
            image: self.compose(frame, annotated),
            annotated: was_annotated,
        })
    }

    fn compose(&self, original: &RgbImage, annotated: RgbImage) -> RgbImage {
        let render = &self.config.render;
        let mut output = if render.side_by_side {
            compositor::side_by_side(original, &annotated)
        } else {
            annotated
        };
        if render.top_left_list {
            compositor::draw_top_left_list(
                &mut output,
                &self.last_labels,
                self.font.as_ref(),
                render.font_scale * 2.0,
            );
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DebounceSettings;
    use crate::detect::{Detection, ScriptedBackend};
    use crate::geometry::BoundingBox;
    use image::Rgb;

    fn registry(vessels: Vec<Detection>) -> DetectorRegistry {
        DetectorRegistry::with_backends(
            ScriptedBackend::fixed("vessel", vessels),
            ScriptedBackend::fixed(
                "content",
                vec![Detection::new(BoundingBox::new(2, 2, 8, 8), 0.7, "Solid")],
            ),
        )
    }

    #[test]
    fn no_vessel_passes_frame_through() {
        let frame = RgbImage::from_pixel(30, 20, Rgb([7, 8, 9]));
        let mut annotator = FrameAnnotator::with_font(PipelineConfig::default(), None);
        let mut detectors = registry(vec![]);
        let mut debounce = DebounceState::new(DebounceSettings::default());

        let outcome = annotator
            .annotate_frame(&frame, &mut detectors, &mut debounce)
            .unwrap();
        assert!(!outcome.is_annotated());

        let rendered = annotator
            .render_frame(&frame, &mut detectors, &mut debounce)
            .unwrap();
        assert!(!rendered.annotated);
        assert_eq!(rendered.image, frame);
        assert!(annotator.last_labels().is_empty());
    }

    #[test]
    fn labels_are_recorded_and_cleared() {
        let frame = RgbImage::new(40, 40);
        let mut annotator = FrameAnnotator::with_font(PipelineConfig::default(), None);
        let mut debounce = DebounceState::new(DebounceSettings::default());

        let mut detectors = registry(vec![Detection::new(
            BoundingBox::new(10, 10, 30, 30),
            0.9,
            "vessel",
        )]);
        annotator
            .annotate_frame(&frame, &mut detectors, &mut debounce)
            .unwrap();
        assert_eq!(annotator.last_labels(), ["vessel 0.90", "Solid 0.70"]);

        let mut empty = registry(vec![]);
        annotator
            .annotate_frame(&frame, &mut empty, &mut debounce)
            .unwrap();
        assert!(annotator.last_labels().is_empty());
    }

    #[test]
    fn side_by_side_keeps_original_on_left() {
        let frame = RgbImage::from_pixel(40, 30, Rgb([20, 20, 20]));
        let mut config = PipelineConfig::default();
        config.render.side_by_side = true;
        let mut annotator = FrameAnnotator::with_font(config, None);
        let mut debounce = DebounceState::new(DebounceSettings::default());
        let mut detectors = registry(vec![Detection::new(
            BoundingBox::new(0, 0, 20, 20),
            0.9,
            "vessel",
        )]);

        let rendered = annotator
            .render_frame(&frame, &mut detectors, &mut debounce)
            .unwrap();
        assert!(rendered.annotated);
        assert_eq!(rendered.image.dimensions(), (80, 30));
        assert_eq!(*rendered.image.get_pixel(0, 0), Rgb([20, 20, 20]));
        assert_eq!(*rendered.image.get_pixel(40, 0), compositor::VESSEL_COLOR);
    }

    #[test]
    fn missing_font_file_falls_back_to_bundled_font() {
        let mut config = PipelineConfig::default();
        config.font_path = Some("/nonexistent/label-font.ttf".into());
        let annotator = FrameAnnotator::new(config);
        assert!(annotator.font.as_ref().is_some_and(LabelFont::is_bundled));
    }

    #[test]
    fn default_config_draws_label_text() {
        let frame = RgbImage::from_pixel(200, 200, Rgb([30, 30, 30]));
        let mut config = PipelineConfig::default();
        config.render.top_left_list = true;
        let mut annotator = FrameAnnotator::new(config);
        assert!(annotator.has_font());

        let mut detectors = DetectorRegistry::with_backends(
            ScriptedBackend::fixed(
                "vessel",
                vec![Detection::new(BoundingBox::new(20, 60, 180, 190), 0.9, "vessel")],
            ),
            ScriptedBackend::fixed(
                "content",
                vec![Detection::new(BoundingBox::new(10, 40, 150, 120), 0.8, "Homo")],
            ),
        );
        let mut debounce = DebounceState::new(DebounceSettings::default());
        let rendered = annotator
            .render_frame(&frame, &mut detectors, &mut debounce)
            .unwrap();

        let changed_above = (0..60)
            .flat_map(|y| (0..200).map(move |x| (x, y)))
            .filter(|&(x, y)| *rendered.image.get_pixel(x, y) != Rgb([30, 30, 30]))
            .count();
        assert!(changed_above > 0);
    }
}
