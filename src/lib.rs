#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod parser;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;

use config::{Config, LayoutConfig, RenderConfig, merge_init_config};
use layout::{FishboneLayout, compute_layout};
use parser::parse_fishbone;
use theme::Theme;

/// Theme and layout settings for the one-call rendering helpers.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub theme: Theme,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::classic()
    }
}

impl RenderOptions {
    pub fn classic() -> Self {
        Self::from_config(Config::default())
    }

    pub fn modern() -> Self {
        let theme = Theme::modern();
        let render = RenderConfig {
            background: theme.background.clone(),
            ..RenderConfig::default()
        };
        Self {
            theme,
            layout: LayoutConfig::default(),
            render,
        }
    }

    pub fn from_config(config: Config) -> Self {
        Self {
            theme: config.theme,
            layout: config.layout,
            render: config.render,
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.layout.width = width;
        self.layout.height = height;
        self
    }

    fn into_config(self) -> Config {
        Config {
            theme: self.theme,
            layout: self.layout,
            render: self.render,
        }
    }
}

/// Parses `input` and returns the converged layout, applying any init
/// directive found in the input on top of `options`.
pub fn layout_with_options(input: &str, options: RenderOptions) -> anyhow::Result<(FishboneLayout, Config)> {
    let parsed = parse_fishbone(input)?;
    let mut config = options.into_config();
    if let Some(init) = parsed.init_config {
        config = merge_init_config(config, init);
    }
    let layout = compute_layout(&parsed.tree, &config.theme, &config.layout)?;
    Ok((layout, config))
}

pub fn render_with_options(input: &str, options: RenderOptions) -> anyhow::Result<String> {
    let (layout, config) = layout_with_options(input, options)?;
    Ok(render::render_svg(
        &layout,
        &config.theme,
        &config.layout,
        &config.render,
    ))
}

/// Renders a fishbone document to SVG with the classic theme.
pub fn render(input: &str) -> anyhow::Result<String> {
    render_with_options(input, RenderOptions::default())
}
