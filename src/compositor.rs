//! Drawing primitives for annotated frames.
//!
//! Everything here paints onto an `RgbImage` in place, except
//! `side_by_side`, which builds a new canvas. Text is drawn with a
//! `LabelFont`, which is either loaded from a file or the bundled DejaVu Sans.
//! Passing no font draws boxes and swatches only.

use std::path::Path;

use ab_glyph::{Font, FontRef, FontVec, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::geometry::BoundingBox;
use crate::measure::hue_to_rgb;
use crate::nested::{BoxKind, ColorSwatch, DrawableBox};

pub const VESSEL_COLOR: Rgb<u8> = Rgb([255, 255, 0]);
pub const CONTENT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const SUMMARY_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub const BOX_THICKNESS: u32 = 2;
pub const SWATCH_SIZE: u32 = 20;

/// Text pixel height at font scale 1.0.
pub const FONT_PX_PER_SCALE: f32 = 30.0;

const LABEL_GAP: i32 = 5;
const SUMMARY_ORIGIN: (i32, i32) = (10, 30);

static BUNDLED_FONT: &[u8] = include_bytes!("../assets/fonts/DejaVuSans.ttf");

/// A TrueType/OpenType font used for box labels and the summary list.
pub struct LabelFont {
    face: FontFace,
}

enum FontFace {
    Bundled(FontRef<'static>),
    Loaded(FontVec),
}

impl LabelFont {
    /// DejaVu Sans, compiled into the binary.
    pub fn bundled() -> Result<Self> {
        let font = FontRef::try_from_slice(BUNDLED_FONT)
            .map_err(|e| anyhow!("bundled font: {}", e))?;
        Ok(Self {
            face: FontFace::Bundled(font),
        })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("invalid font {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let font = FontVec::try_from_vec(bytes).map_err(|e| anyhow!("{}", e))?;
        Ok(Self {
            face: FontFace::Loaded(font),
        })
    }

    pub fn is_bundled(&self) -> bool {
        matches!(self.face, FontFace::Bundled(_))
    }

    /// Distance from the top of a text line to its baseline at `px`.
    pub fn ascent(&self, px: f32) -> f32 {
        match &self.face {
            FontFace::Bundled(font) => font.as_scaled(PxScale::from(px)).ascent(),
            FontFace::Loaded(font) => font.as_scaled(PxScale::from(px)).ascent(),
        }
    }

    /// Draw `text` with its layout box's top-left corner at `(x, y)`.
    fn draw(&self, canvas: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, px: f32, text: &str) {
        let scale = PxScale::from(px);
        match &self.face {
            FontFace::Bundled(font) => draw_text_mut(canvas, color, x, y, scale, font, text),
            FontFace::Loaded(font) => draw_text_mut(canvas, color, x, y, scale, font, text),
        }
    }
}

impl std::fmt::Debug for LabelFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LabelFont")
            .field("bundled", &self.is_bundled())
            .finish_non_exhaustive()
    }
}

pub fn font_px(font_scale: f32) -> f32 {
    (FONT_PX_PER_SCALE * font_scale).max(1.0)
}

pub fn box_color(kind: BoxKind) -> Rgb<u8> {
    match kind {
        BoxKind::Vessel => VESSEL_COLOR,
        BoxKind::Content => CONTENT_COLOR,
    }
}

/// Outline `bbox` with a `BOX_THICKNESS` pixel border drawn inward.
pub fn draw_box(canvas: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>) {
    for t in 0..BOX_THICKNESS {
        let inset = t as i32;
        let width = bbox.width().saturating_sub(2 * t);
        let height = bbox.height().saturating_sub(2 * t);
        if width == 0 || height == 0 {
            break;
        }
        let rect = Rect::at(bbox.x1() + inset, bbox.y1() + inset).of_size(width, height);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

/// Draw every box with its label just above the top edge.
pub fn draw_boxes(
    canvas: &mut RgbImage,
    boxes: &[DrawableBox],
    font: Option<&LabelFont>,
    font_scale: f32,
) {
    let px = font_px(font_scale);
    for item in boxes {
        let color = box_color(item.kind);
        draw_box(canvas, item.bbox, color);
        if let Some(font) = font {
            let top = (item.bbox.y1() - LABEL_GAP - px.round() as i32).max(0);
            font.draw(canvas, color, item.bbox.x1(), top, px, &item.text);
        }
    }
}

/// Stack `lines` top-to-bottom from the upper-left corner.
///
/// `font_scale` is the summary's own scale. The first baseline sits at
/// `SUMMARY_ORIGIN` and each following one `int(30 * scale + 10)` lower.
pub fn draw_top_left_list(
    canvas: &mut RgbImage,
    lines: &[String],
    font: Option<&LabelFont>,
    font_scale: f32,
) {
    let Some(font) = font else {
        return;
    };
    let px = font_px(font_scale);
    let step = (FONT_PX_PER_SCALE * font_scale + 10.0) as i32;
    let ascent = font.ascent(px).round() as i32;
    let (x, mut baseline) = SUMMARY_ORIGIN;
    for line in lines {
        font.draw(canvas, SUMMARY_COLOR, x, baseline - ascent, px, line);
        baseline += step;
    }
}

/// Fill a `SWATCH_SIZE` square of the hue's color with its top-left at `(x, y)`.
pub fn draw_color_patch(canvas: &mut RgbImage, x: i32, y: i32, hue: f32) {
    let rect = Rect::at(x, y).of_size(SWATCH_SIZE, SWATCH_SIZE);
    draw_filled_rect_mut(canvas, rect, hue_to_rgb(hue));
}

pub fn draw_swatches(canvas: &mut RgbImage, swatches: &[ColorSwatch]) {
    for swatch in swatches {
        draw_color_patch(canvas, swatch.x, swatch.y, swatch.hue);
    }
}

/// Original on the left, annotated on the right.
///
/// The annotated frame is stretched vertically to the original's height when
/// the two differ.
pub fn side_by_side(original: &RgbImage, annotated: &RgbImage) -> RgbImage {
    let resized;
    let right = if annotated.height() != original.height() {
        resized = imageops::resize(
            annotated,
            annotated.width(),
            original.height(),
            FilterType::Triangle,
        );
        &resized
    } else {
        annotated
    };

    let mut combined = RgbImage::new(original.width() + right.width(), original.height());
    imageops::replace(&mut combined, original, 0, 0);
    imageops::replace(&mut combined, right, original.width() as i64, 0);
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    const GREY: Rgb<u8> = Rgb([40, 40, 40]);

    fn drawable(x1: i32, y1: i32, x2: i32, y2: i32, kind: BoxKind) -> DrawableBox {
        DrawableBox {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            text: "label".to_string(),
            kind,
        }
    }

    #[test]
    fn boxes_use_kind_colors_with_two_pixel_border() {
        let mut canvas = RgbImage::from_pixel(60, 60, GREY);
        let boxes = [
            drawable(5, 5, 25, 25, BoxKind::Vessel),
            drawable(30, 30, 50, 50, BoxKind::Content),
        ];
        draw_boxes(&mut canvas, &boxes, None, 0.6);

        assert_eq!(*canvas.get_pixel(5, 10), VESSEL_COLOR);
        assert_eq!(*canvas.get_pixel(6, 10), VESSEL_COLOR);
        assert_eq!(*canvas.get_pixel(7, 10), GREY);
        assert_eq!(*canvas.get_pixel(30, 40), CONTENT_COLOR);
        assert_eq!(*canvas.get_pixel(40, 40), GREY);
    }

    #[test]
    fn degenerate_and_offscreen_boxes_do_not_panic() {
        let mut canvas = RgbImage::from_pixel(20, 20, GREY);
        draw_box(&mut canvas, BoundingBox::new(5, 5, 5, 15), CONTENT_COLOR);
        draw_box(&mut canvas, BoundingBox::new(15, 15, 40, 40), CONTENT_COLOR);
        draw_box(&mut canvas, BoundingBox::new(8, 8, 9, 9), CONTENT_COLOR);
        assert_eq!(*canvas.get_pixel(15, 17), CONTENT_COLOR);
        assert_eq!(*canvas.get_pixel(8, 8), CONTENT_COLOR);
    }

    #[test]
    fn swatch_fills_twenty_pixel_square() {
        let mut canvas = RgbImage::from_pixel(50, 50, GREY);
        draw_color_patch(&mut canvas, 10, 5, 60.0);
        assert_eq!(*canvas.get_pixel(10, 5), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(29, 24), Rgb([0, 255, 0]));
        assert_eq!(*canvas.get_pixel(30, 24), GREY);
        assert_eq!(*canvas.get_pixel(29, 25), GREY);
    }

    #[test]
    fn swatch_at_right_edge_is_clipped() {
        let mut canvas = RgbImage::from_pixel(30, 30, GREY);
        draw_color_patch(&mut canvas, 25, 0, 0.0);
        draw_color_patch(&mut canvas, 30, 0, 0.0);
        assert_eq!(*canvas.get_pixel(29, 0), Rgb([255, 0, 0]));
        assert_eq!(*canvas.get_pixel(24, 0), GREY);
    }

    #[test]
    fn side_by_side_doubles_width() {
        let original = RgbImage::from_pixel(32, 24, Rgb([1, 2, 3]));
        let annotated = RgbImage::from_pixel(32, 24, Rgb([9, 9, 9]));
        let combined = side_by_side(&original, &annotated);
        assert_eq!(combined.dimensions(), (64, 24));
        assert_eq!(*combined.get_pixel(0, 0), Rgb([1, 2, 3]));
        assert_eq!(*combined.get_pixel(31, 23), Rgb([1, 2, 3]));
        assert_eq!(*combined.get_pixel(32, 0), Rgb([9, 9, 9]));
    }

    #[test]
    fn side_by_side_matches_original_height() {
        let original = RgbImage::from_pixel(20, 30, GREY);
        let annotated = RgbImage::from_pixel(20, 15, GREY);
        let combined = side_by_side(&original, &annotated);
        assert_eq!(combined.dimensions(), (40, 30));
    }

    #[test]
    fn summary_without_font_leaves_canvas_untouched() {
        let mut canvas = RgbImage::from_pixel(40, 40, GREY);
        let before = canvas.clone();
        draw_top_left_list(&mut canvas, &["Homo 0.90".to_string()], None, 1.2);
        assert_eq!(canvas, before);
    }

    fn bundled() -> LabelFont {
        LabelFont::bundled().expect("bundled font")
    }

    /// Rows with at least one pixel in `columns` that is no longer `GREY`.
    fn changed_rows(canvas: &RgbImage, columns: std::ops::Range<u32>) -> Vec<u32> {
        (0..canvas.height())
            .filter(|&y| columns.clone().any(|x| *canvas.get_pixel(x, y) != GREY))
            .collect()
    }

    #[test]
    fn bundled_font_is_available() {
        let font = bundled();
        assert!(font.is_bundled());
        let ascent = font.ascent(18.0);
        assert!(ascent > 0.0 && ascent < 18.0, "{ascent}");
    }

    #[test]
    fn label_sits_in_the_gap_above_its_box() {
        let mut canvas = RgbImage::from_pixel(200, 150, GREY);
        let mut item = drawable(10, 40, 190, 120, BoxKind::Vessel);
        item.text = "vessel 0.90".to_string();
        draw_boxes(&mut canvas, &[item], Some(&bundled()), 0.6);

        // px = 18, so the label occupies [40 - 5 - 18, 40).
        let above: Vec<u32> = changed_rows(&canvas, 0..200)
            .into_iter()
            .filter(|&y| y < 40)
            .collect();
        assert!(!above.is_empty());
        assert!(above.iter().all(|&y| y >= 17), "{above:?}");
    }

    #[test]
    fn label_of_box_at_top_edge_is_clamped_into_frame() {
        let mut canvas = RgbImage::from_pixel(200, 150, GREY);
        let mut item = drawable(10, 0, 190, 100, BoxKind::Content);
        item.text = "Homo 0.80".to_string();
        draw_boxes(&mut canvas, &[item], Some(&bundled()), 0.6);

        // Inside the border, text shows up in the first rows and nowhere deeper.
        let inside = changed_rows(&canvas, 12..188);
        let text_rows: Vec<u32> = inside.into_iter().filter(|&y| y >= 2 && y < 98).collect();
        assert!(!text_rows.is_empty());
        assert!(text_rows.iter().all(|&y| y < 24), "{text_rows:?}");
    }

    #[test]
    fn summary_lines_are_one_step_apart() {
        let scale = 1.2;
        let step = (FONT_PX_PER_SCALE * scale + 10.0) as u32;
        assert_eq!(step, 46);
        let font = bundled();

        let mut one = RgbImage::from_pixel(300, 140, GREY);
        draw_top_left_list(&mut one, &["AAAA".to_string()], Some(&font), scale);
        let mut two = RgbImage::from_pixel(300, 140, GREY);
        let lines = ["AAAA".to_string(), "AAAA".to_string()];
        draw_top_left_list(&mut two, &lines, Some(&font), scale);

        let first = changed_rows(&one, 0..300);
        assert!(!first.is_empty());
        // Capitals rest on the baseline at y = 30.
        assert!(*first.last().unwrap() <= 30, "{first:?}");
        assert!(first[0] + step > *first.last().unwrap());

        let mut expected = first.clone();
        expected.extend(first.iter().map(|y| y + step));
        assert_eq!(changed_rows(&two, 0..300), expected);
    }

    #[test]
    fn invalid_font_bytes_are_rejected() {
        assert!(LabelFont::from_bytes(vec![0, 1, 2, 3]).is_err());
    }
}
