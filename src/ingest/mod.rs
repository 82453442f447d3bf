//! Frame ingestion sources.
//!
//! This module provides sources of decoded RGB frames for the stream driver:
//! - Local video files (feature: video-ffmpeg)
//! - Synthetic `stub://` clips (testing, smoke runs)
//! - In-memory frame lists (testing)
//!
//! Sources are local-only. URL schemes other than `stub://` are rejected.
//! Every source reports its geometry and frame rate up front so the output
//! sink can be sized before the first frame is read.

pub mod memory;
pub mod video;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod video_ffmpeg;

use anyhow::Result;
use image::RgbImage;

pub use memory::MemorySource;
pub use video::{VideoConfig, VideoSource};

/// Frame rate used when a container does not report a usable one.
pub const DEFAULT_FPS: f64 = 25.0;

/// Geometry and timing of a frame stream.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count hint from the container, when known.
    pub frame_count: Option<u64>,
}

impl StreamInfo {
    pub fn new(width: u32, height: u32, fps: f64, frame_count: Option<u64>) -> Self {
        Self {
            width,
            height,
            fps: normalize_fps(fps),
            frame_count: frame_count.filter(|n| *n > 0),
        }
    }
}

/// Replace missing, zero, or negative frame rates with `DEFAULT_FPS`.
pub fn normalize_fps(fps: f64) -> f64 {
    if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        DEFAULT_FPS
    }
}

/// A sequential source of frames. `Ok(None)` marks the end of the stream.
pub trait FrameSource {
    fn info(&self) -> &StreamInfo;
    fn next_frame(&mut self) -> Result<Option<RgbImage>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_falls_back_when_unknown() {
        assert_eq!(normalize_fps(0.0), DEFAULT_FPS);
        assert_eq!(normalize_fps(-1.0), DEFAULT_FPS);
        assert_eq!(normalize_fps(f64::NAN), DEFAULT_FPS);
        assert_eq!(normalize_fps(29.97), 29.97);
    }

    #[test]
    fn zero_frame_count_is_unknown() {
        let info = StreamInfo::new(10, 10, 30.0, Some(0));
        assert_eq!(info.frame_count, None);
    }
}
