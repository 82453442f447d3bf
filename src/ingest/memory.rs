use std::collections::VecDeque;

use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{FrameSource, StreamInfo};

/// Frames held in memory, yielded in order. Geometry comes from the first frame.
pub struct MemorySource {
    info: StreamInfo,
    frames: VecDeque<RgbImage>,
    fail_after: Option<usize>,
    yielded: usize,
}

impl MemorySource {
    pub fn new(frames: Vec<RgbImage>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| f.dimensions()).unwrap_or((0, 0));
        let count = frames.len() as u64;
        Self {
            info: StreamInfo::new(width, height, fps, Some(count)),
            frames: frames.into(),
            fail_after: None,
            yielded: 0,
        }
    }

    /// Return a read error once `count` frames have been yielded.
    pub fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

impl FrameSource for MemorySource {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        if self.fail_after == Some(self.yielded) {
            return Err(anyhow!("read failed after {} frames", self.yielded));
        }
        let frame = self.frames.pop_front();
        if frame.is_some() {
            self.yielded += 1;
        }
        Ok(frame)
    }
}
