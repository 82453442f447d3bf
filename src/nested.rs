//! Two-stage vessel → content detection.
//!
//! The vessel detector runs on the full frame; the content detector runs on
//! each vessel crop. Content boxes are translated back to full-frame
//! coordinates, gated by class visibility, and liquid classes get a
//! measurement suffix. Output order is detection order: each vessel, then
//! its own content items.

use anyhow::Result;
use image::RgbImage;

use crate::config::PipelineConfig;
use crate::debounce::DebounceState;
use crate::detect::{DetectionStage, DetectorRegistry};
use crate::geometry::BoundingBox;
use crate::measure::measure_region;
use crate::policy::{class_visible, is_liquid_label, should_show, Metric};

/// Rendering family of a drawable box.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BoxKind {
    Vessel,
    Content,
}

/// A clipped full-frame box with its final label text.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawableBox {
    pub bbox: BoundingBox,
    pub text: String,
    pub kind: BoxKind,
}

/// Request to paint a hue swatch with its top-left corner at `(x, y)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorSwatch {
    pub x: i32,
    pub y: i32,
    pub hue: f32,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NestedDetections {
    pub boxes: Vec<DrawableBox>,
    pub swatches: Vec<ColorSwatch>,
}

impl NestedDetections {
    pub fn labels(&self) -> Vec<String> {
        self.boxes.iter().map(|b| b.text.clone()).collect()
    }
}

/// Run both detection stages over `frame`.
///
/// Returns `Ok(None)` when the vessel stage finds nothing.
pub fn detect_nested(
    frame: &RgbImage,
    detectors: &mut DetectorRegistry,
    config: &PipelineConfig,
    debounce: &mut DebounceState,
) -> Result<Option<NestedDetections>> {
    let (width, height) = frame.dimensions();
    let min_confidence = config.min_confidence();

    let vessels = detectors.detect(DetectionStage::Vessel, frame, min_confidence)?;
    if vessels.is_empty() {
        return Ok(None);
    }

    let mut out = NestedDetections::default();
    for vessel in &vessels {
        let vessel_box = vessel.bbox().clip(width, height);
        if class_visible(vessel.label(), &config.visibility) {
            out.boxes.push(DrawableBox {
                bbox: vessel_box,
                text: format!("{} {:.2}", vessel.label(), vessel.confidence()),
                kind: BoxKind::Vessel,
            });
        }

        if vessel_box.is_empty() {
            log::debug!("skipping degenerate vessel crop {}", vessel_box);
            continue;
        }
        let crop = image::imageops::crop_imm(
            frame,
            vessel_box.x1() as u32,
            vessel_box.y1() as u32,
            vessel_box.width(),
            vessel_box.height(),
        )
        .to_image();

        let contents = detectors.detect(DetectionStage::Content, &crop, min_confidence)?;
        for content in &contents {
            let content_box = content
                .bbox()
                .offset(vessel_box.x1(), vessel_box.y1())
                .clip(width, height);
            if !class_visible(content.label(), &config.visibility) {
                continue;
            }

            let mut text = format!("{} {:.2}", content.label(), content.confidence());
            if config.render.advanced_overlay && is_liquid_label(content.label()) {
                if let Some(suffix) =
                    measurement_suffix(frame, content_box, config, debounce, &mut out.swatches)
                {
                    text.push_str(" | ");
                    text.push_str(&suffix);
                }
            }
            out.boxes.push(DrawableBox {
                bbox: content_box,
                text,
                kind: BoxKind::Content,
            });
        }
    }

    Ok(Some(out))
}

fn measurement_suffix(
    frame: &RgbImage,
    region: BoundingBox,
    config: &PipelineConfig,
    debounce: &mut DebounceState,
    swatches: &mut Vec<ColorSwatch>,
) -> Option<String> {
    let measurement = measure_region(frame, region, frame.height())?;
    if config.render.color_patch {
        swatches.push(ColorSwatch {
            x: region.x2(),
            y: region.y1(),
            hue: measurement.hue,
        });
    }
    let raw = Metric::ALL.map(|metric| should_show(metric, measurement.value(metric), config));
    debounce.apply(&region, &measurement, raw).label_suffix()
}
