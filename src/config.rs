//! Pipeline configuration.
//!
//! `PipelineConfig` is an immutable value handed to every pipeline call.
//! `PipelineConfig::load` layers an optional JSON/TOML file, then
//! `FORESIGHT_*` environment overrides, then validation.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const DEFAULT_FONT_SCALE: f32 = 0.6;
pub const DEFAULT_MIN_CONFIDENCE: f32 = 0.4;
pub const DEFAULT_MODEL_INPUT_SIZE: u32 = 640;
pub const DEFAULT_MIN_IOU: f32 = 0.5;

/// Threshold values offered when gating is requested without explicit values.
pub const DEFAULT_THRESHOLDS: Thresholds = Thresholds {
    min_turbidity: 50.0,
    min_hue: 20.0,
    min_volume_fraction: 0.1,
    min_confidence: DEFAULT_MIN_CONFIDENCE,
};

/// Rendering switches read by every stage.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub font_scale: f32,
    pub side_by_side: bool,
    pub top_left_list: bool,
    pub color_patch: bool,
    /// Master switch for computing and showing T/C/V at all.
    pub advanced_overlay: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            font_scale: DEFAULT_FONT_SCALE,
            side_by_side: false,
            top_left_list: false,
            color_patch: false,
            advanced_overlay: true,
        }
    }
}

/// Per-class and per-metric visibility toggles. Everything is visible by default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityConfig {
    pub vessel: bool,
    pub solid: bool,
    pub residue: bool,
    pub empty: bool,
    pub homogeneous: bool,
    pub heterogeneous: bool,
    pub turbidity: bool,
    pub hue: bool,
    pub volume_fraction: bool,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            vessel: true,
            solid: true,
            residue: true,
            empty: true,
            homogeneous: true,
            heterogeneous: true,
            turbidity: true,
            hue: true,
            volume_fraction: true,
        }
    }
}

/// Minimum values a metric (and a detection) must reach to be shown.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub min_turbidity: f32,
    pub min_hue: f32,
    pub min_volume_fraction: f32,
    pub min_confidence: f32,
}

impl Thresholds {
    /// Parse `turbidity,hue,volume,confidence`.
    pub fn parse_csv(value: &str) -> Result<Self> {
        let parts: Vec<f32> = split_csv(value)
            .iter()
            .map(|p| {
                p.parse::<f32>()
                    .map_err(|_| anyhow!("threshold '{}' is not a number", p))
            })
            .collect::<Result<_>>()?;
        match parts.as_slice() {
            [t, c, v, conf] => Ok(Self {
                min_turbidity: *t,
                min_hue: *c,
                min_volume_fraction: *v,
                min_confidence: *conf,
            }),
            _ => Err(anyhow!(
                "thresholds need 4 comma-separated values (turbidity,hue,volume,confidence), got {}",
                parts.len()
            )),
        }
    }

    fn validate(&self) -> Result<()> {
        check_range("turbidity threshold", self.min_turbidity, 0.0, 255.0)?;
        check_range("hue threshold", self.min_hue, 0.0, 180.0)?;
        check_range("volume fraction threshold", self.min_volume_fraction, 0.0, 1.0)?;
        check_range("confidence threshold", self.min_confidence, 0.0, 1.0)?;
        Ok(())
    }
}

/// How debounce state is looked up from one frame to the next.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum KeyMatching {
    /// Key on the current frame's exact box edges.
    #[default]
    Coordinates,
    /// Carry state over from the previous frame's best-overlapping box.
    Iou { min_iou: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DebounceSettings {
    pub enabled: bool,
    pub matching: KeyMatching,
}

/// Detector model locations and class tables.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub vessel_model: Option<PathBuf>,
    pub content_model: Option<PathBuf>,
    pub vessel_classes: Vec<String>,
    pub content_classes: Vec<String>,
    pub input_size: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            vessel_model: None,
            content_model: None,
            vessel_classes: vec!["vessel".to_string()],
            content_classes: ["Empty", "Hetero", "Homo", "Residue", "Solid"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            input_size: DEFAULT_MODEL_INPUT_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    pub render: RenderConfig,
    pub visibility: VisibilityConfig,
    /// `None` means no gating beyond the visibility toggles.
    pub thresholds: Option<Thresholds>,
    pub debounce: DebounceSettings,
    pub models: ModelSettings,
    pub font_path: Option<PathBuf>,
}

impl PipelineConfig {
    /// Detection confidence floor for both stages.
    pub fn min_confidence(&self) -> f32 {
        self.thresholds
            .map(|t| t.min_confidence)
            .unwrap_or(DEFAULT_MIN_CONFIDENCE)
    }

    /// Load from `path`, or from `FORESIGHT_CONFIG` when `path` is `None`,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("FORESIGHT_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => ConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let render = match file.render {
            Some(r) => RenderConfig {
                font_scale: r.font_scale.unwrap_or(defaults.render.font_scale),
                side_by_side: r.side_by_side.unwrap_or(defaults.render.side_by_side),
                top_left_list: r.top_left_list.unwrap_or(defaults.render.top_left_list),
                color_patch: r.color_patch.unwrap_or(defaults.render.color_patch),
                advanced_overlay: r
                    .advanced_overlay
                    .unwrap_or(defaults.render.advanced_overlay),
            },
            None => defaults.render,
        };

        let mut visibility = defaults.visibility;
        if let Some(v) = file.visibility {
            let classes = v.classes.unwrap_or_default();
            let metrics = v.metrics.unwrap_or_default();
            visibility.vessel = classes.vessel.unwrap_or(true);
            visibility.solid = classes.solid.unwrap_or(true);
            visibility.residue = classes.residue.unwrap_or(true);
            visibility.empty = classes.empty.unwrap_or(true);
            visibility.homogeneous = classes.homogeneous.unwrap_or(true);
            visibility.heterogeneous = classes.heterogeneous.unwrap_or(true);
            visibility.turbidity = metrics.turbidity.unwrap_or(true);
            visibility.hue = metrics.hue.unwrap_or(true);
            visibility.volume_fraction = metrics.volume_fraction.unwrap_or(true);
        }

        let thresholds = file.thresholds.map(|t| Thresholds {
            min_turbidity: t.turbidity.unwrap_or(DEFAULT_THRESHOLDS.min_turbidity),
            min_hue: t.hue.unwrap_or(DEFAULT_THRESHOLDS.min_hue),
            min_volume_fraction: t
                .volume_fraction
                .unwrap_or(DEFAULT_THRESHOLDS.min_volume_fraction),
            min_confidence: t.confidence.unwrap_or(DEFAULT_THRESHOLDS.min_confidence),
        });

        let debounce = match file.debounce {
            Some(d) => DebounceSettings {
                enabled: d.enabled.unwrap_or(false),
                matching: match d.iou_matching {
                    Some(min_iou) => KeyMatching::Iou { min_iou },
                    None => KeyMatching::Coordinates,
                },
            },
            None => defaults.debounce,
        };

        let models = match file.models {
            Some(m) => ModelSettings {
                vessel_model: m.vessel,
                content_model: m.content,
                vessel_classes: m.vessel_classes.unwrap_or(defaults.models.vessel_classes),
                content_classes: m
                    .content_classes
                    .unwrap_or(defaults.models.content_classes),
                input_size: m.input_size.unwrap_or(defaults.models.input_size),
            },
            None => defaults.models,
        };

        Ok(Self {
            render,
            visibility,
            thresholds,
            debounce,
            models,
            font_path: file.font_path,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(scale) = env_value("FORESIGHT_FONT_SCALE") {
            self.render.font_scale = scale
                .parse()
                .map_err(|_| anyhow!("FORESIGHT_FONT_SCALE must be a number"))?;
        }
        if let Some(flag) = env_flag("FORESIGHT_SIDE_BY_SIDE")? {
            self.render.side_by_side = flag;
        }
        if let Some(flag) = env_flag("FORESIGHT_TOP_LEFT_LIST")? {
            self.render.top_left_list = flag;
        }
        if let Some(flag) = env_flag("FORESIGHT_COLOR_PATCH")? {
            self.render.color_patch = flag;
        }
        if let Some(flag) = env_flag("FORESIGHT_ADVANCED_OVERLAY")? {
            self.render.advanced_overlay = flag;
        }
        if let Some(flag) = env_flag("FORESIGHT_DEBOUNCE")? {
            self.debounce.enabled = flag;
        }
        if let Some(value) = env_value("FORESIGHT_THRESHOLDS") {
            self.thresholds = Some(Thresholds::parse_csv(&value)?);
        }
        if let Some(path) = env_value("FORESIGHT_FONT_PATH") {
            self.font_path = Some(PathBuf::from(path));
        }
        if let Some(classes) = env_value("FORESIGHT_HIDE_CLASSES") {
            for class in split_csv(&classes) {
                self.visibility.hide_class(&class)?;
            }
        }
        if let Some(metrics) = env_value("FORESIGHT_HIDE_METRICS") {
            for metric in split_csv(&metrics) {
                self.visibility.hide_metric(&metric)?;
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.render.font_scale.is_finite() && self.render.font_scale > 0.0) {
            return Err(anyhow!("font scale must be greater than zero"));
        }
        if let Some(thresholds) = &self.thresholds {
            thresholds.validate()?;
        }
        if let KeyMatching::Iou { min_iou } = self.debounce.matching {
            if !(min_iou > 0.0 && min_iou <= 1.0) {
                return Err(anyhow!("IoU matching threshold must be in (0, 1]"));
            }
        }
        if self.models.input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        Ok(())
    }
}

impl VisibilityConfig {
    /// Turn off a class toggle by name (`vessel`, `solid`, `residue`, `empty`, `homo`, `hetero`).
    pub fn hide_class(&mut self, name: &str) -> Result<()> {
        match name.to_lowercase().as_str() {
            "vessel" => self.vessel = false,
            "solid" => self.solid = false,
            "residue" => self.residue = false,
            "empty" => self.empty = false,
            "homo" | "homogeneous" => self.homogeneous = false,
            "hetero" | "heterogeneous" => self.heterogeneous = false,
            other => return Err(anyhow!("unknown class toggle '{}'", other)),
        }
        Ok(())
    }

    /// Turn off a metric toggle by name (`t`/`turbidity`, `c`/`hue`, `v`/`volume`).
    pub fn hide_metric(&mut self, name: &str) -> Result<()> {
        match name.to_lowercase().as_str() {
            "t" | "turbidity" => self.turbidity = false,
            "c" | "hue" | "color" => self.hue = false,
            "v" | "volume" | "volume_fraction" => self.volume_fraction = false,
            other => return Err(anyhow!("unknown metric toggle '{}'", other)),
        }
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// File schema
// ----------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    render: Option<RenderConfigFile>,
    visibility: Option<VisibilityConfigFile>,
    thresholds: Option<ThresholdsConfigFile>,
    debounce: Option<DebounceConfigFile>,
    models: Option<ModelsConfigFile>,
    font_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct RenderConfigFile {
    font_scale: Option<f32>,
    side_by_side: Option<bool>,
    top_left_list: Option<bool>,
    color_patch: Option<bool>,
    advanced_overlay: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct VisibilityConfigFile {
    classes: Option<ClassToggleFile>,
    metrics: Option<MetricToggleFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ClassToggleFile {
    vessel: Option<bool>,
    solid: Option<bool>,
    residue: Option<bool>,
    empty: Option<bool>,
    homogeneous: Option<bool>,
    heterogeneous: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct MetricToggleFile {
    turbidity: Option<bool>,
    hue: Option<bool>,
    volume_fraction: Option<bool>,
}

#[derive(Debug, Deserialize, Default)]
struct ThresholdsConfigFile {
    turbidity: Option<f32>,
    hue: Option<f32>,
    volume_fraction: Option<f32>,
    confidence: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct DebounceConfigFile {
    enabled: Option<bool>,
    iou_matching: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelsConfigFile {
    vessel: Option<PathBuf>,
    content: Option<PathBuf>,
    vessel_classes: Option<Vec<String>>,
    content_classes: Option<Vec<String>>,
    input_size: Option<u32>,
}

fn read_config_file(path: &Path) -> Result<ConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str) -> Result<Option<bool>> {
    let Some(value) = env_value(key) else {
        return Ok(None);
    };
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(Some(true)),
        "0" | "false" | "off" | "no" => Ok(Some(false)),
        _ => Err(anyhow!("{} must be a boolean (on/off)", key)),
    }
}

fn check_range(name: &str, value: f32, min: f32, max: f32) -> Result<()> {
    if !(value.is_finite() && value >= min && value <= max) {
        return Err(anyhow!("{} must be in [{}, {}], got {}", name, min, max, value));
    }
    Ok(())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}
