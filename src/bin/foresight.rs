//! foresight - annotate vessel/content detections on images and videos
//!
//! Loads the layered configuration (file, `FORESIGHT_*` env, flags), binds
//! the vessel and content detectors, then runs a still-image or video pass
//! depending on the input's extension.

use anyhow::{anyhow, bail, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use foresight::config::{KeyMatching, PipelineConfig, Thresholds, DEFAULT_THRESHOLDS};
use foresight::detect::DetectorRegistry;
use foresight::stream::{is_image_path, output_path_for};
use foresight::ui::Ui;
use foresight::{process_image, process_video_file, FrameAnnotator};

#[derive(Parser, Debug)]
#[command(
    name = "foresight",
    about = "Annotate vessel/content detections with liquid measurements"
)]
struct Args {
    /// Input image or video (stub://<name> for a synthetic clip)
    #[arg(value_name = "INPUT")]
    input: String,

    /// Directory for <name>_annotated.png / .mp4 (defaults to the input's directory)
    #[arg(long, value_name = "DIR", conflicts_with = "output")]
    output_dir: Option<PathBuf>,

    /// Exact output path; an extensionless path writes a PNG frame directory for video
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// JSON or TOML config file
    #[arg(long, value_name = "PATH", env = "FORESIGHT_CONFIG")]
    config: Option<PathBuf>,

    /// Show original and annotated frames side by side
    #[arg(long)]
    side_by_side: bool,

    /// List every label in the top-left corner
    #[arg(long)]
    top_left_list: bool,

    /// Paint a hue swatch next to each measured liquid
    #[arg(long)]
    color_patch: bool,

    /// Smooth T/C/V visibility over 3 frames
    #[arg(long)]
    debounce: bool,

    /// Carry debounce state across frames by box overlap (implies --debounce)
    #[arg(long, value_name = "MIN_IOU")]
    iou_matching: Option<f32>,

    /// Do not compute or show T/C/V measurements
    #[arg(long)]
    no_advanced_overlay: bool,

    /// Label font scale (text height is 30 px per unit)
    #[arg(long, value_name = "SCALE")]
    font_scale: Option<f32>,

    /// Thresholds as TURBIDITY,HUE,VOLUME,CONFIDENCE, or "default" for 50,20,0.1,0.4
    #[arg(long, value_name = "T,C,V,CONF")]
    thresholds: Option<String>,

    /// TrueType/OpenType font for labels
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Vessel detector ONNX model
    #[arg(long, value_name = "PATH")]
    vessel_model: Option<PathBuf>,

    /// Content detector ONNX model
    #[arg(long, value_name = "PATH")]
    content_model: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let config = {
        let _stage = ui.stage("Load configuration");
        let mut config = PipelineConfig::load(args.config.as_deref())?;
        apply_flags(&mut config, &args)?;
        config.validate()?;
        config
    };

    let mut detectors = {
        let _stage = ui.stage("Load detectors");
        let mut detectors = build_detectors(&config)?;
        detectors.ensure_ready()?;
        detectors.warm_up()?;
        detectors
    };
    for (stage, name) in detectors.list() {
        log::info!("{} detector: {}", stage.as_str(), name);
    }

    let mut annotator = FrameAnnotator::new(config);
    let input_path = Path::new(&args.input);
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| output_path_for(input_path, args.output_dir.as_deref()));

    if is_image_path(input_path) {
        let written = {
            let _stage = ui.stage("Annotate image");
            process_image(input_path, &output, &mut annotator, &mut detectors)?
        };
        if !written {
            bail!("failed to write {}", output.display());
        }
        println!("foresight: wrote {}", output.display());
    } else {
        let report = process_video_file(
            &args.input,
            &output,
            &mut annotator,
            &mut detectors,
            |info| ui.frames("Annotate video", info.frame_count),
        )?;
        if report.ended_early {
            log::warn!("input ended early after {} frames", report.frames_read);
        }
        if !report.succeeded() {
            bail!(
                "video output incomplete: {} of {} frames written",
                report.frames_written,
                report.frames_read
            );
        }
        println!(
            "foresight: wrote {} ({} frames)",
            output.display(),
            report.frames_written
        );
    }

    Ok(())
}

fn apply_flags(config: &mut PipelineConfig, args: &Args) -> Result<()> {
    if args.side_by_side {
        config.render.side_by_side = true;
    }
    if args.top_left_list {
        config.render.top_left_list = true;
    }
    if args.color_patch {
        config.render.color_patch = true;
    }
    if args.no_advanced_overlay {
        config.render.advanced_overlay = false;
    }
    if let Some(scale) = args.font_scale {
        config.render.font_scale = scale;
    }
    if args.debounce {
        config.debounce.enabled = true;
    }
    if let Some(min_iou) = args.iou_matching {
        config.debounce.enabled = true;
        config.debounce.matching = KeyMatching::Iou { min_iou };
    }
    if let Some(value) = &args.thresholds {
        config.thresholds = Some(if value.trim().eq_ignore_ascii_case("default") {
            DEFAULT_THRESHOLDS
        } else {
            Thresholds::parse_csv(value)?
        });
    }
    if let Some(font) = &args.font {
        config.font_path = Some(font.clone());
    }
    if let Some(path) = &args.vessel_model {
        config.models.vessel_model = Some(path.clone());
    }
    if let Some(path) = &args.content_model {
        config.models.content_model = Some(path.clone());
    }
    Ok(())
}

#[cfg(feature = "backend-tract")]
fn build_detectors(config: &PipelineConfig) -> Result<DetectorRegistry> {
    use foresight::detect::{DetectionStage, YoloBackend};

    let models = &config.models;
    let vessel_path = models
        .vessel_model
        .as_ref()
        .ok_or_else(|| anyhow!("no vessel detector loaded (set --vessel-model)"))?;
    let content_path = models
        .content_model
        .as_ref()
        .ok_or_else(|| anyhow!("no content detector loaded (set --content-model)"))?;

    let mut detectors = DetectorRegistry::new();
    detectors.register(
        DetectionStage::Vessel,
        YoloBackend::new(
            "yolo-vessel",
            vessel_path,
            models.input_size,
            models.vessel_classes.clone(),
        )?,
    );
    detectors.register(
        DetectionStage::Content,
        YoloBackend::new(
            "yolo-content",
            content_path,
            models.input_size,
            models.content_classes.clone(),
        )?,
    );
    Ok(detectors)
}

#[cfg(not(feature = "backend-tract"))]
fn build_detectors(_config: &PipelineConfig) -> Result<DetectorRegistry> {
    Err(anyhow!(
        "no detector backend compiled in; rebuild with --features backend-tract"
    ))
}
