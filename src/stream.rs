//! Still-image and video runs.
//!
//! Each run owns a fresh `DebounceState`. Detector readiness is checked before
//! any input is opened, and the input is opened before any output is created,
//! so configuration and input errors never leave partial files behind.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::annotate::FrameAnnotator;
use crate::config::RenderConfig;
use crate::debounce::DebounceState;
use crate::detect::DetectorRegistry;
use crate::ingest::{FrameSource, StreamInfo, VideoConfig, VideoSource};
use crate::sink::{FrameSink, SinkSpec, VideoSink};
use crate::ui::FrameProgress;

pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "tif", "tiff"];

const OUTPUT_SUFFIX: &str = "_annotated";

/// Counters for one video run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VideoReport {
    pub frames_read: u64,
    pub frames_written: u64,
    pub write_failures: u64,
    pub frames_without_vessel: u64,
    /// The source reported a read error before end of stream.
    pub ended_early: bool,
    /// The sink flushed and closed without error.
    pub finalized: bool,
}

impl VideoReport {
    pub fn succeeded(&self) -> bool {
        self.write_failures == 0 && self.finalized
    }
}

pub fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

/// `<stem>_annotated.png` for images, `<stem>_annotated.mp4` for video.
///
/// Goes into `output_dir` when it is an existing directory, otherwise next to
/// the input.
pub fn output_path_for(input: &Path, output_dir: Option<&Path>) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let extension = if is_image_path(input) { "png" } else { "mp4" };
    let file_name = format!("{stem}{OUTPUT_SUFFIX}.{extension}");

    let dir = match output_dir {
        Some(dir) if dir.is_dir() => dir.to_path_buf(),
        other => {
            if let Some(dir) = other {
                log::warn!(
                    "output directory {} is not a directory, writing next to the input",
                    dir.display()
                );
            }
            input
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("."))
        }
    };
    dir.join(file_name)
}

/// Output geometry for frames from `info`, doubled in width for side-by-side.
pub fn output_spec(info: &StreamInfo, render: &RenderConfig) -> SinkSpec {
    let width = if render.side_by_side {
        info.width * 2
    } else {
        info.width
    };
    SinkSpec {
        width,
        height: info.height,
        fps: info.fps,
    }
}

/// Annotate one still image and write it to `output`.
///
/// Returns `Ok(false)` when only the final write failed.
pub fn process_image(
    input: &Path,
    output: &Path,
    annotator: &mut FrameAnnotator,
    detectors: &mut DetectorRegistry,
) -> Result<bool> {
    detectors.ensure_ready()?;
    let frame = image::open(input)
        .with_context(|| format!("could not read image {}", input.display()))?
        .to_rgb8();

    let mut debounce = DebounceState::new(annotator.config().debounce);
    debounce.begin_frame();
    let rendered = annotator.render_frame(&frame, detectors, &mut debounce)?;
    if !rendered.annotated {
        log::info!("no vessel found in {}", input.display());
    }

    match rendered.image.save(output) {
        Ok(()) => {
            log::info!("wrote {}", output.display());
            Ok(true)
        }
        Err(err) => {
            log::warn!("failed to write {}: {}", output.display(), err);
            Ok(false)
        }
    }
}

/// Annotate every frame of `source` into `sink`.
///
/// The sink is always finished, even when the loop stops on a read failure or
/// a detector error. Detector errors are returned after the sink is closed.
pub fn process_video<S, K>(
    source: &mut S,
    sink: &mut K,
    annotator: &mut FrameAnnotator,
    detectors: &mut DetectorRegistry,
    progress: &mut FrameProgress,
) -> Result<VideoReport>
where
    S: FrameSource + ?Sized,
    K: FrameSink + ?Sized,
{
    detectors.ensure_ready()?;

    let mut debounce = DebounceState::new(annotator.config().debounce);
    log::debug!(
        "debounce state reset (enabled: {})",
        debounce.is_enabled()
    );

    let mut report = VideoReport::default();
    let mut detector_error = None;
    loop {
        let frame = match source.next_frame() {
            Ok(Some(frame)) => frame,
            Ok(None) => break,
            Err(err) => {
                log::warn!(
                    "stopping after {} frames, read failed: {:#}",
                    report.frames_read,
                    err
                );
                report.ended_early = true;
                break;
            }
        };
        report.frames_read += 1;
        debounce.begin_frame();

        let rendered = match annotator.render_frame(&frame, detectors, &mut debounce) {
            Ok(rendered) => rendered,
            Err(err) => {
                detector_error = Some(
                    err.context(format!("detection failed on frame {}", report.frames_read)),
                );
                break;
            }
        };
        if !rendered.annotated {
            report.frames_without_vessel += 1;
            log::debug!("frame {}: no vessel found", report.frames_read);
        }

        match sink.write_frame(&rendered.image) {
            Ok(()) => report.frames_written += 1,
            Err(err) => {
                report.write_failures += 1;
                log::warn!("frame {}: write failed: {:#}", report.frames_read, err);
            }
        }
        progress.inc();
    }
    progress.finish();

    match sink.finish() {
        Ok(()) => report.finalized = true,
        Err(err) => log::warn!("failed to finalize video output: {:#}", err),
    }

    if let Some(err) = detector_error {
        return Err(err);
    }

    log::info!(
        "video done: {} frames read, {} written, {} without vessel, {} write failures",
        report.frames_read,
        report.frames_written,
        report.frames_without_vessel,
        report.write_failures
    );
    Ok(report)
}

/// Open `input` as a video, create the sink at `output`, and run `process_video`.
pub fn process_video_file(
    input: &str,
    output: &Path,
    annotator: &mut FrameAnnotator,
    detectors: &mut DetectorRegistry,
    progress: impl FnOnce(&StreamInfo) -> FrameProgress,
) -> Result<VideoReport> {
    detectors.ensure_ready()?;
    let mut source = VideoSource::open(VideoConfig::new(input))?;
    let info = source.info().clone();
    let spec = output_spec(&info, &annotator.config().render);
    let mut sink = VideoSink::create(output, spec)?;
    let mut progress = progress(&info);
    process_video(&mut source, &mut sink, annotator, detectors, &mut progress)
}
