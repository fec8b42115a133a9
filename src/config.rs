use crate::ir::FeedbackRow;
use crate::theme::Theme;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Constants of the force integrator. The defaults reproduce the classic
/// d3 force layout tuned for fishbone diagrams: no gravity and a very short
/// charge range, so links and the per-step rules do most of the work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub friction: f64,
    pub link_strength: f64,
    pub charge: f64,
    pub charge_distance: f64,
    pub gravity: f64,
    pub alpha_start: f64,
    pub alpha_decay: f64,
    pub alpha_min: f64,
    pub max_iterations: usize,
    pub random_seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            friction: 0.9,
            link_strength: 1.0,
            charge: -30.0,
            charge_distance: 10.0,
            gravity: 0.0,
            alpha_start: 0.1,
            alpha_decay: 0.99,
            alpha_min: 0.005,
            max_iterations: 1000,
            random_seed: 1,
        }
    }
}

/// Logarithmic mapping from link generation to link length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkScaleConfig {
    pub domain_min: f64,
    pub domain_max: f64,
    pub range_start: f64,
    pub range_end: f64,
}

impl Default for LinkScaleConfig {
    fn default() -> Self {
        Self {
            domain_min: 1.0,
            domain_max: 5.0,
            range_start: 60.0,
            range_end: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub width: f64,
    pub height: f64,
    pub margin: f64,
    pub label_line_height: f32,
    pub fast_text_metrics: bool,
    pub link_scale: LinkScaleConfig,
    pub simulation: SimulationConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 1200.0,
            height: 800.0,
            margin: 50.0,
            label_line_height: 1.5,
            fast_text_metrics: false,
            link_scale: LinkScaleConfig::default(),
            simulation: SimulationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Zoom factor applied when rasterizing to PNG.
    pub scale: f32,
    pub background: String,
    /// Votes drawn as bars under node labels.
    #[serde(skip)]
    pub feedback: Vec<FeedbackRow>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background: "#FFFFFF".to_string(),
            feedback: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        let theme = Theme::classic();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..Default::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ThemeVariables {
    font_family: Option<String>,
    font_size: Option<NumberOrString>,
    root_font_size: Option<NumberOrString>,
    text_color: Option<String>,
    root_text_color: Option<String>,
    line_color: Option<String>,
    positive_color: Option<String>,
    negative_color: Option<String>,
    background: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f32),
    String(String),
}

impl NumberOrString {
    fn as_f32(&self) -> Option<f32> {
        match self {
            NumberOrString::Number(val) => Some(*val),
            NumberOrString::String(val) => val.trim().trim_end_matches("px").parse::<f32>().ok(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LayoutConfigFile {
    width: Option<f64>,
    height: Option<f64>,
    margin: Option<f64>,
    label_line_height: Option<f32>,
    fast_text_metrics: Option<bool>,
    link_scale: Option<LinkScaleConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct LinkScaleConfigFile {
    domain: Option<[f64; 2]>,
    range: Option<[f64; 2]>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SimulationConfigFile {
    friction: Option<f64>,
    link_strength: Option<f64>,
    charge: Option<f64>,
    charge_distance: Option<f64>,
    gravity: Option<f64>,
    alpha_start: Option<f64>,
    alpha_decay: Option<f64>,
    alpha_min: Option<f64>,
    max_iterations: Option<usize>,
    random_seed: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RenderConfigFile {
    scale: Option<f32>,
    background: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    theme: Option<String>,
    theme_variables: Option<ThemeVariables>,
    layout: Option<LayoutConfigFile>,
    simulation: Option<SimulationConfigFile>,
    render: Option<RenderConfigFile>,
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses a JSON config document and merges it onto the defaults.
pub fn parse_config(contents: &str) -> anyhow::Result<Config> {
    let parsed: ConfigFile = serde_json::from_str(contents)?;
    let mut config = Config::default();
    apply_config_file(&mut config, parsed);
    Ok(config)
}

/// Applies an inline `%%{init: ...}%%` directive onto an existing config.
pub fn merge_init_config(mut config: Config, init: serde_json::Value) -> Config {
    match serde_json::from_value::<ConfigFile>(init) {
        Ok(parsed) => apply_config_file(&mut config, parsed),
        Err(err) => tracing::warn!(error = %err, "ignoring malformed init directive"),
    }
    config
}

fn apply_config_file(config: &mut Config, parsed: ConfigFile) {
    if let Some(theme) = parsed.theme.as_deref().and_then(Theme::by_name) {
        config.render.background = theme.background.clone();
        config.theme = theme;
    }

    if let Some(vars) = parsed.theme_variables {
        apply_theme_variables(&mut config.theme, vars);
        config.render.background = config.theme.background.clone();
    }

    if let Some(layout) = parsed.layout {
        if let Some(v) = layout.width {
            config.layout.width = v;
        }
        if let Some(v) = layout.height {
            config.layout.height = v;
        }
        if let Some(v) = layout.margin {
            config.layout.margin = v;
        }
        if let Some(v) = layout.label_line_height {
            config.layout.label_line_height = v;
        }
        if let Some(v) = layout.fast_text_metrics {
            config.layout.fast_text_metrics = v;
        }
        if let Some(scale) = layout.link_scale {
            if let Some([min, max]) = scale.domain {
                // log scales are undefined at or below zero
                if min > 0.0 && max > 0.0 && min != max {
                    config.layout.link_scale.domain_min = min;
                    config.layout.link_scale.domain_max = max;
                } else {
                    tracing::warn!(min, max, "ignoring non-positive link scale domain");
                }
            }
            if let Some([start, end]) = scale.range {
                config.layout.link_scale.range_start = start;
                config.layout.link_scale.range_end = end;
            }
        }
    }

    if let Some(sim) = parsed.simulation {
        let target = &mut config.layout.simulation;
        if let Some(v) = sim.friction {
            target.friction = v;
        }
        if let Some(v) = sim.link_strength {
            target.link_strength = v;
        }
        if let Some(v) = sim.charge {
            target.charge = v;
        }
        if let Some(v) = sim.charge_distance {
            target.charge_distance = v;
        }
        if let Some(v) = sim.gravity {
            target.gravity = v;
        }
        if let Some(v) = sim.alpha_start {
            target.alpha_start = v;
        }
        if let Some(v) = sim.alpha_decay {
            target.alpha_decay = v;
        }
        if let Some(v) = sim.alpha_min {
            target.alpha_min = v;
        }
        if let Some(v) = sim.max_iterations {
            target.max_iterations = v;
        }
        if let Some(v) = sim.random_seed {
            target.random_seed = v;
        }
    }

    if let Some(render) = parsed.render {
        if let Some(v) = render.scale {
            config.render.scale = v;
        }
        if let Some(v) = render.background {
            config.render.background = v;
        }
    }
}

fn apply_theme_variables(theme: &mut Theme, vars: ThemeVariables) {
    if let Some(v) = vars.font_family {
        theme.font_family = v;
    }
    if let Some(v) = vars.font_size.as_ref().and_then(NumberOrString::as_f32) {
        theme.font_size = v;
    }
    if let Some(v) = vars.root_font_size.as_ref().and_then(NumberOrString::as_f32) {
        theme.root_font_size = v;
    }
    if let Some(v) = vars.text_color {
        theme.text_color = v;
    }
    if let Some(v) = vars.root_text_color {
        theme.root_text_color = v;
    }
    if let Some(v) = vars.line_color {
        theme.line_color = v;
    }
    if let Some(v) = vars.positive_color {
        theme.positive_color = v;
    }
    if let Some(v) = vars.negative_color {
        theme.negative_color = v;
    }
    if let Some(v) = vars.background {
        theme.background = v;
    }
}
