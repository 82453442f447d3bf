#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::geometry::BoundingBox;

const NMS_IOU_THRESHOLD: f32 = 0.45;

/// Tract-based YOLO detector for ONNX models with a square RGB input.
///
/// Expects the single-output YOLOv8 layout `[1, 4 + classes, proposals]`
/// with `(cx, cy, w, h)` in model-input pixels followed by per-class scores.
pub struct YoloBackend {
    name: String,
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    class_names: Vec<String>,
}

impl YoloBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(
        name: impl Into<String>,
        model_path: P,
        input_size: u32,
        class_names: Vec<String>,
    ) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, input_size as usize, input_size as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            name: name.into(),
            model,
            input_size,
            class_names,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let size = self.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, size as usize, size as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        input.into_tensor()
    }

    fn label_for(&self, class_id: usize) -> String {
        self.class_names
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    fn decode(
        &self,
        outputs: TVec<TValue>,
        image_width: u32,
        image_height: u32,
        min_confidence: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 || shape[1] < 5 {
            return Err(anyhow!("unexpected YOLO output shape {:?}", shape));
        }
        let rows = shape[1];
        let proposals = shape[2];
        let num_classes = rows - 4;
        let data: Vec<f32> = view.iter().copied().collect();

        let scale_x = image_width as f32 / self.input_size as f32;
        let scale_y = image_height as f32 / self.input_size as f32;

        let mut candidates = Vec::new();
        for i in 0..proposals {
            let mut best_class = 0usize;
            let mut best_score = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let s = data[(4 + c) * proposals + i];
                if s > best_score {
                    best_score = s;
                    best_class = c;
                }
            }
            if !best_score.is_finite() || best_score < min_confidence {
                continue;
            }

            let cx = data[i];
            let cy = data[proposals + i];
            let w = data[2 * proposals + i];
            let h = data[3 * proposals + i];
            let bbox = BoundingBox::from_xyxy_f32(
                (cx - w / 2.0) * scale_x,
                (cy - h / 2.0) * scale_y,
                (cx + w / 2.0) * scale_x,
                (cy + h / 2.0) * scale_y,
            );
            candidates.push((bbox, best_score, best_class));
        }

        Ok(nms(candidates, NMS_IOU_THRESHOLD)
            .into_iter()
            .map(|(bbox, score, class_id)| Detection::new(bbox, score, self.label_for(class_id)))
            .collect())
    }
}

/// Greedy class-aware NMS: highest score first, drop same-class overlaps.
fn nms(
    mut boxes: Vec<(BoundingBox, f32, usize)>,
    iou_thresh: f32,
) -> Vec<(BoundingBox, f32, usize)> {
    boxes.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut kept: Vec<(BoundingBox, f32, usize)> = Vec::new();
    let mut suppressed = vec![false; boxes.len()];
    for i in 0..boxes.len() {
        if suppressed[i] {
            continue;
        }
        kept.push(boxes[i]);
        for j in (i + 1)..boxes.len() {
            if boxes[i].2 == boxes[j].2 && boxes[i].0.iou(&boxes[j].0) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    kept
}

impl DetectorBackend for YoloBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(&mut self, image: &RgbImage, min_confidence: f32) -> Result<Vec<Detection>> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(Vec::new());
        }
        let input = self.build_input(image);
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, image.width(), image.height(), min_confidence)
    }

    fn warm_up(&mut self) -> Result<()> {
        let blank = RgbImage::new(self.input_size, self.input_size);
        self.detect(&blank, 1.0).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nms_keeps_best_of_overlapping_same_class() {
        let a = (BoundingBox::new(0, 0, 10, 10), 0.9, 0);
        let b = (BoundingBox::new(1, 1, 11, 11), 0.8, 0);
        let c = (BoundingBox::new(1, 1, 11, 11), 0.7, 1);
        let kept = nms(vec![b, a, c], 0.45);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].1, 0.9);
        assert_eq!(kept[1].2, 1);
    }
}
