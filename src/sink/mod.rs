//! Frame output sinks.
//!
//! - PNG image sequence directories (always available)
//! - Encoded video files (feature: video-ffmpeg)
//! - In-memory capture (testing)
//!
//! A sink is created for a fixed `SinkSpec`; frames of any other size are
//! rejected. `finish` must be called once all frames are written.

pub mod memory;
pub mod video;
#[cfg(feature = "video-ffmpeg")]
pub(crate) mod video_ffmpeg;

use anyhow::{bail, Result};
use image::RgbImage;

pub use memory::MemorySink;
pub use video::VideoSink;

/// Output geometry and rate, fixed for the life of a sink.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SinkSpec {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
}

impl SinkSpec {
    pub fn check_frame(&self, frame: &RgbImage) -> Result<()> {
        if frame.dimensions() != (self.width, self.height) {
            bail!(
                "frame is {}x{}, output expects {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            );
        }
        Ok(())
    }

    /// Frame size for 4:2:0 encoders, which need even dimensions.
    ///
    /// Odd sides are rounded down by one pixel; a side that would become 0
    /// is an error.
    pub fn even_dimensions(&self) -> Result<(u32, u32)> {
        let (width, height) = (self.width & !1, self.height & !1);
        if width == 0 || height == 0 {
            bail!(
                "{}x{} output is too small to encode as yuv420p video",
                self.width,
                self.height
            );
        }
        Ok((width, height))
    }
}

pub trait FrameSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()>;
    /// Flush buffered output and close the destination.
    fn finish(&mut self) -> Result<()>;
}
