//! Foresight
//!
//! This crate turns nested vessel/content detections into annotated frames:
//! boxes, labels and liquid measurements (turbidity, hue, volume fraction)
//! for still images and video.
//!
//! # Pipeline
//!
//! 1. **Nested detection**: a vessel detector runs on the full frame, a content
//!    detector on each vessel crop; content boxes are mapped back to frame
//!    coordinates and clipped.
//! 2. **Gating**: class and metric visibility toggles, optional thresholds.
//! 3. **Debounce**: optional 3-frame hysteresis so measurements do not flicker.
//! 4. **Composition**: boxes, labels, hue swatches, side-by-side layout and a
//!    top-left summary.
//!
//! # Module Structure
//!
//! - `detect`: Detector capability, stage registry, backends
//! - `nested`, `measure`, `policy`, `debounce`: per-frame core
//! - `compositor`, `annotate`: rendering and orchestration
//! - `ingest`, `sink`, `stream`: frame sources, outputs, image/video runs
//! - `config`, `ui`: layered configuration and progress reporting

pub mod annotate;
pub mod compositor;
pub mod config;
pub mod debounce;
pub mod detect;
pub mod geometry;
pub mod ingest;
pub mod measure;
pub mod nested;
pub mod policy;
pub mod sink;
pub mod stream;
pub mod ui;

pub use annotate::{FrameAnnotator, FrameOutcome, RenderedFrame};
pub use compositor::LabelFont;
pub use config::{
    DebounceSettings, KeyMatching, ModelSettings, PipelineConfig, RenderConfig, Thresholds,
    VisibilityConfig,
};
pub use debounce::{DebounceState, ShownMetrics};
pub use detect::{Detection, DetectionStage, DetectorBackend, DetectorRegistry, ScriptedBackend};
#[cfg(feature = "backend-tract")]
pub use detect::YoloBackend;
pub use geometry::BoundingBox;
pub use ingest::{FrameSource, MemorySource, StreamInfo, VideoConfig, VideoSource};
pub use measure::Measurement;
pub use nested::{BoxKind, ColorSwatch, DrawableBox};
pub use policy::Metric;
pub use sink::{FrameSink, MemorySink, SinkSpec, VideoSink};
pub use stream::{process_image, process_video, process_video_file, VideoReport};
