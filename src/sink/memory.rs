use anyhow::{anyhow, Result};
use image::RgbImage;

use super::{FrameSink, SinkSpec};

/// Keeps written frames in memory.
#[derive(Debug)]
pub struct MemorySink {
    spec: SinkSpec,
    frames: Vec<RgbImage>,
    finished: bool,
    reject_frames: Vec<usize>,
    attempts: usize,
}

impl MemorySink {
    pub fn new(spec: SinkSpec) -> Self {
        Self {
            spec,
            frames: Vec::new(),
            finished: false,
            reject_frames: Vec::new(),
            attempts: 0,
        }
    }

    /// Fail the writes at these zero-based attempt indices.
    pub fn rejecting(mut self, attempts: &[usize]) -> Self {
        self.reject_frames = attempts.to_vec();
        self
    }

    pub fn spec(&self) -> &SinkSpec {
        &self.spec
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        let attempt = self.attempts;
        self.attempts += 1;
        if self.finished {
            return Err(anyhow!("sink already finished"));
        }
        if self.reject_frames.contains(&attempt) {
            return Err(anyhow!("write {} rejected", attempt));
        }
        self.spec.check_frame(frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
