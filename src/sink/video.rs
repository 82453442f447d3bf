//! Video output sink.
//!
//! The output path picks the backend: a path without an extension (or ending
//! in a separator) becomes a directory of numbered PNG frames; `.mp4`, `.avi`,
//! `.mkv` and `.mov` are encoded with ffmpeg when the `video-ffmpeg` feature
//! is enabled.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::{FrameSink, SinkSpec};
#[cfg(feature = "video-ffmpeg")]
use super::video_ffmpeg::FfmpegVideoSink;

pub const VIDEO_EXTENSIONS: [&str; 4] = ["mp4", "avi", "mkv", "mov"];

pub struct VideoSink {
    backend: SinkBackend,
}

enum SinkBackend {
    ImageSequence(ImageSequenceSink),
    #[cfg(feature = "video-ffmpeg")]
    Ffmpeg(FfmpegVideoSink),
}

impl VideoSink {
    pub fn create(path: &Path, spec: SinkSpec) -> Result<Self> {
        let ends_with_separator = path
            .to_str()
            .is_some_and(|p| p.ends_with(std::path::MAIN_SEPARATOR) || p.ends_with('/'));
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_lowercase());

        let backend = match extension {
            _ if ends_with_separator => {
                SinkBackend::ImageSequence(ImageSequenceSink::create(path, spec)?)
            }
            None => SinkBackend::ImageSequence(ImageSequenceSink::create(path, spec)?),
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext.as_str()) => {
                spec.even_dimensions()
                    .with_context(|| format!("cannot encode {}", path.display()))?;
                #[cfg(feature = "video-ffmpeg")]
                {
                    SinkBackend::Ffmpeg(FfmpegVideoSink::create(path, spec)?)
                }
                #[cfg(not(feature = "video-ffmpeg"))]
                {
                    return Err(anyhow!(
                        "writing .{} video requires the video-ffmpeg feature: {}",
                        ext,
                        path.display()
                    ));
                }
            }
            Some(ext) => {
                return Err(anyhow!(
                    "unsupported video output extension .{}: {}",
                    ext,
                    path.display()
                ))
            }
        };
        Ok(Self { backend })
    }
}

impl FrameSink for VideoSink {
    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        match &mut self.backend {
            SinkBackend::ImageSequence(sink) => sink.write_frame(frame),
            #[cfg(feature = "video-ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.write_frame(frame),
        }
    }

    fn finish(&mut self) -> Result<()> {
        match &mut self.backend {
            SinkBackend::ImageSequence(sink) => sink.finish(),
            #[cfg(feature = "video-ffmpeg")]
            SinkBackend::Ffmpeg(sink) => sink.finish(),
        }
    }
}

// ----------------------------------------------------------------------------
// PNG image sequence
// ----------------------------------------------------------------------------

struct ImageSequenceSink {
    dir: PathBuf,
    spec: SinkSpec,
    next_index: u64,
}

impl ImageSequenceSink {
    fn create(dir: &Path, spec: SinkSpec) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create frame directory {}", dir.display()))?;
        log::info!(
            "VideoSink: writing {}x{} PNG frames to {}",
            spec.width,
            spec.height,
            dir.display()
        );
        Ok(Self {
            dir: dir.to_path_buf(),
            spec,
            next_index: 1,
        })
    }

    fn write_frame(&mut self, frame: &RgbImage) -> Result<()> {
        self.spec.check_frame(frame)?;
        let path = self.dir.join(format!("frame_{:06}.png", self.next_index));
        frame
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.next_index += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        log::info!(
            "VideoSink: wrote {} frames to {}",
            self.next_index - 1,
            self.dir.display()
        );
        Ok(())
    }
}
