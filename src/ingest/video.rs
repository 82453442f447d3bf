//! Local video frame source.
//!
//! `VideoSource` reads frames from a local video file (ffmpeg backend) or
//! generates a deterministic synthetic clip for `stub://` paths. The source is
//! responsible for:
//! - Rejecting remote URLs
//! - Decoding frames in-memory to RGB24
//! - Reporting width, height, fps and frame count before the first read

use anyhow::{anyhow, Result};
use image::{Rgb, RgbImage};

use super::{FrameSource, StreamInfo, DEFAULT_FPS};
#[cfg(feature = "video-ffmpeg")]
use super::video_ffmpeg::FfmpegVideoSource;

/// Configuration for a video source.
#[derive(Clone, Debug)]
pub struct VideoConfig {
    /// Local file path, or `stub://<name>` for a synthetic clip.
    pub path: String,
    /// Length of synthetic clips.
    pub synthetic_frames: u64,
    /// Dimensions of synthetic clips.
    pub synthetic_size: (u32, u32),
}

impl VideoConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            synthetic_frames: 30,
            synthetic_size: (320, 240),
        }
    }
}

/// Local video frame source.
pub struct VideoSource {
    backend: VideoBackend,
}

enum VideoBackend {
    Synthetic(SyntheticVideoSource),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegVideoSource),
}

impl VideoSource {
    pub fn open(config: VideoConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "video input only supports local paths (no URL schemes): {}",
                config.path
            ));
        }
        if config.path.starts_with("stub://") {
            let source = SyntheticVideoSource::new(config);
            log::info!(
                "VideoSource: opened {} (synthetic, {}x{})",
                source.config.path,
                source.info.width,
                source.info.height
            );
            Ok(Self {
                backend: VideoBackend::Synthetic(source),
            })
        } else {
            #[cfg(feature = "video-ffmpeg")]
            {
                Ok(Self {
                    backend: VideoBackend::Ffmpeg(FfmpegVideoSource::open(config)?),
                })
            }
            #[cfg(not(feature = "video-ffmpeg"))]
            {
                Err(anyhow!(
                    "video input requires the video-ffmpeg feature: {}",
                    config.path
                ))
            }
        }
    }

    /// Frames decoded so far.
    pub fn frames_read(&self) -> u64 {
        match &self.backend {
            VideoBackend::Synthetic(source) => source.frame_index,
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.frames_read(),
        }
    }
}

impl FrameSource for VideoSource {
    fn info(&self) -> &StreamInfo {
        match &self.backend {
            VideoBackend::Synthetic(source) => &source.info,
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.info(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>> {
        match &mut self.backend {
            VideoBackend::Synthetic(source) => Ok(source.next_frame()),
            #[cfg(feature = "video-ffmpeg")]
            VideoBackend::Ffmpeg(source) => source.next_frame(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticVideoSource {
    config: VideoConfig,
    info: StreamInfo,
    frame_index: u64,
}

impl SyntheticVideoSource {
    fn new(config: VideoConfig) -> Self {
        let (width, height) = config.synthetic_size;
        let info = StreamInfo::new(width, height, DEFAULT_FPS, Some(config.synthetic_frames));
        Self {
            config,
            info,
            frame_index: 0,
        }
    }

    /// A pale background with a dark band that drifts one pixel per frame.
    fn next_frame(&mut self) -> Option<RgbImage> {
        if self.frame_index >= self.config.synthetic_frames {
            return None;
        }
        let offset = self.frame_index as u32;
        self.frame_index += 1;

        let (width, height) = (self.info.width, self.info.height);
        let band_start = width / 4 + offset % (width / 2).max(1);
        let band_end = band_start + width / 8;
        Some(RgbImage::from_fn(width, height, |x, y| {
            if (band_start..band_end).contains(&x) && y > height / 3 {
                Rgb([30, 60, 160])
            } else {
                let shade = 200 + ((x + y) % 40) as u8;
                Rgb([shade, shade, shade])
            }
        }))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
