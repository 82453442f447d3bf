//! Liquid measurements from a pixel region.
//!
//! Hue and value follow the 8-bit HSV convention of common vision libraries:
//! hue on a 180-step wheel (degrees / 2), saturation and value in `0..=255`.
//! Turbidity is the mean value channel, a brightness proxy rather than a
//! physical measurement.

use image::{GenericImageView, Rgb, RgbImage};

use crate::geometry::BoundingBox;

/// Mean hue/value statistics of one content region.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Measurement {
    /// Mean value channel, `0..=255`.
    pub turbidity: f32,
    /// Mean hue channel, `0..=180`.
    pub hue: f32,
    /// Region height over full-frame height, `0..=1`.
    pub volume_fraction: f32,
}

impl Measurement {
    pub fn value(&self, metric: crate::policy::Metric) -> f32 {
        match metric {
            crate::policy::Metric::Turbidity => self.turbidity,
            crate::policy::Metric::Hue => self.hue,
            crate::policy::Metric::VolumeFraction => self.volume_fraction,
        }
    }
}

/// Measure `region` of `frame`. Returns `None` when the clipped region has no area.
pub fn measure_region(
    frame: &RgbImage,
    region: BoundingBox,
    frame_height: u32,
) -> Option<Measurement> {
    let region = region.clip(frame.width(), frame.height());
    if region.is_empty() {
        return None;
    }

    let view = frame.view(
        region.x1() as u32,
        region.y1() as u32,
        region.width(),
        region.height(),
    );
    let mut hue_sum = 0u64;
    let mut value_sum = 0u64;
    let mut count = 0u64;
    for (_, _, pixel) in view.pixels() {
        let (h, _, v) = rgb_to_hsv8(pixel);
        hue_sum += h as u64;
        value_sum += v as u64;
        count += 1;
    }

    let volume_fraction = if frame_height > 0 {
        (region.height() as f32 / frame_height as f32).min(1.0)
    } else {
        0.0
    };

    Some(Measurement {
        turbidity: (value_sum as f64 / count as f64) as f32,
        hue: (hue_sum as f64 / count as f64) as f32,
        volume_fraction,
    })
}

/// Convert one RGB pixel to 8-bit HSV `(h 0..=180, s 0..=255, v 0..=255)`.
pub fn rgb_to_hsv8(pixel: Rgb<u8>) -> (u8, u8, u8) {
    let [r, g, b] = pixel.0.map(|c| c as f32);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let diff = max - min;

    let s = if max > 0.0 { diff * 255.0 / max } else { 0.0 };
    let h = if diff == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / diff
    } else if max == g {
        120.0 + 60.0 * (b - r) / diff
    } else {
        240.0 + 60.0 * (r - g) / diff
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (
        (h / 2.0).round().clamp(0.0, 180.0) as u8,
        s.round().clamp(0.0, 255.0) as u8,
        max as u8,
    )
}

/// Fully saturated, full-value color for a 0..=180 hue, truncated to an integer step.
pub fn hue_to_rgb(hue: f32) -> Rgb<u8> {
    let step = if hue.is_finite() {
        hue.clamp(0.0, 180.0) as u32
    } else {
        0
    };
    let degrees = (step * 2) as f32 % 360.0;
    let sector = degrees / 60.0;
    let f = sector - sector.floor();
    let rise = (f * 255.0).round() as u8;
    let fall = ((1.0 - f) * 255.0).round() as u8;
    match sector as u32 {
        0 => Rgb([255, rise, 0]),
        1 => Rgb([fall, 255, 0]),
        2 => Rgb([0, 255, rise]),
        3 => Rgb([0, fall, 255]),
        4 => Rgb([rise, 0, 255]),
        _ => Rgb([255, 0, fall]),
    }
}
