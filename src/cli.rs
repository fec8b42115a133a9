use crate::config::{Config, load_config, merge_init_config};
use crate::layout::compute_layout;
use crate::layout_dump::write_layout_dump;
use crate::parser::{parse_feedback, parse_fishbone};
use crate::render::{render_svg, write_output_png, write_output_svg};
use crate::theme::Theme;
use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{Level, info};

#[derive(Parser, Debug)]
#[command(name = "fishbone", version, about = "Fishbone (Ishikawa) diagram renderer")]
pub struct Args {
    /// Input file (.json, .json5, .txt outline, .md) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout for SVG and JSON if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Config JSON file (theme, themeVariables, layout, simulation, render)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Built-in theme: classic or modern
    #[arg(short = 't', long = "theme")]
    pub theme: Option<String>,

    /// Canvas width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f64>,

    /// Canvas height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f64>,

    /// Whitespace inset around the pinned spine ends
    #[arg(short = 'm', long = "margin")]
    pub margin: Option<f64>,

    /// JSON file of `{k, rate}` votes drawn as bars under matching nodes
    #[arg(short = 'f', long = "feedback")]
    pub feedback: Option<PathBuf>,

    /// Seed for the initial node placement
    #[arg(long = "seed")]
    pub seed: Option<u64>,

    /// Measure labels with the built-in width table instead of system fonts
    #[arg(long = "fastText")]
    pub fast_text: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    fn extension(self) -> &'static str {
        match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        }
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let base_config = apply_cli_overrides(load_config(args.config.as_deref())?, &args)?;

    let (input, is_markdown) = read_input(args.input.as_deref())?;
    let diagrams = if is_markdown {
        extract_fishbone_blocks(&input)
    } else {
        vec![input]
    };

    if diagrams.is_empty() {
        return Err(anyhow::anyhow!("No fishbone diagrams found in input"));
    }

    if diagrams.len() == 1 {
        let output = match args.output_format {
            OutputFormat::Png => Some(ensure_output(&args.output, "png")?),
            _ => args.output.clone(),
        };
        return render_one(&diagrams[0], &base_config, args.output_format, output.as_deref());
    }

    let outputs = resolve_multi_outputs(args.output.as_deref(), args.output_format, diagrams.len())?;
    for (idx, (diagram, output)) in diagrams.iter().zip(&outputs).enumerate() {
        render_one(diagram, &base_config, args.output_format, Some(output))
            .with_context(|| format!("diagram {}", idx + 1))?;
    }
    Ok(())
}

fn render_one(
    source: &str,
    base_config: &Config,
    format: OutputFormat,
    output: Option<&Path>,
) -> Result<()> {
    let parsed = parse_fishbone(source)?;
    let mut config = base_config.clone();
    if let Some(init_cfg) = parsed.init_config {
        config = merge_init_config(config, init_cfg);
    }
    let layout = compute_layout(&parsed.tree, &config.theme, &config.layout)?;
    info!(
        nodes = layout.nodes().len(),
        iterations = layout.iterations(),
        "laid out fishbone"
    );
    match format {
        OutputFormat::Json => write_layout_dump(output, &layout),
        OutputFormat::Svg => {
            let svg = render_svg(&layout, &config.theme, &config.layout, &config.render);
            write_output_svg(&svg, output)
        }
        OutputFormat::Png => {
            let svg = render_svg(&layout, &config.theme, &config.layout, &config.render);
            let output = output.ok_or_else(|| anyhow::anyhow!("Output path required for png output"))?;
            write_output_png(&svg, output, &config.render)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init();
}

fn apply_cli_overrides(mut config: Config, args: &Args) -> Result<Config> {
    if let Some(name) = args.theme.as_deref() {
        let theme = Theme::by_name(name).ok_or_else(|| anyhow::anyhow!("Unknown theme: {name}"))?;
        config.render.background = theme.background.clone();
        config.theme = theme;
    }
    if let Some(width) = args.width {
        config.layout.width = width;
    }
    if let Some(height) = args.height {
        config.layout.height = height;
    }
    if let Some(margin) = args.margin {
        config.layout.margin = margin;
    }
    if let Some(seed) = args.seed {
        config.layout.simulation.random_seed = seed;
    }
    if args.fast_text {
        config.layout.fast_text_metrics = true;
    }
    if let Some(path) = args.feedback.as_deref() {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        config.render.feedback =
            parse_feedback(&contents).with_context(|| format!("parsing {}", path.display()))?;
    }
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<(String, bool)> {
    if let Some(path) = path {
        if path == Path::new("-") {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            return Ok((buf, false));
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let is_md = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|ext| matches!(ext, "md" | "markdown"))
            .unwrap_or(false);
        return Ok((content, is_md));
    }

    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok((buf, false))
}

fn ensure_output(output: &Option<PathBuf>, ext: &str) -> Result<PathBuf> {
    if let Some(path) = output {
        return Ok(path.clone());
    }
    Err(anyhow::anyhow!("Output path required for {} output", ext))
}

fn extract_fishbone_blocks(input: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let mut in_block = false;
    let mut current = Vec::new();
    let mut fence = String::new();

    for line in input.lines() {
        let trimmed = line.trim();
        if !in_block {
            if let Some(start_fence) = detect_fishbone_fence(trimmed) {
                in_block = true;
                fence = start_fence;
            }
            continue;
        }
        if is_fence_end(trimmed, &fence) {
            in_block = false;
            blocks.push(current.join("\n"));
            current.clear();
            continue;
        }
        current.push(line.to_string());
    }

    blocks
}

/// Recognizes an opening fence tagged `fishbone`, returning the fence run
/// that closes it.
fn detect_fishbone_fence(line: &str) -> Option<String> {
    for marker in ['`', '~'] {
        let run: String = line.chars().take_while(|ch| *ch == marker).collect();
        if run.len() < 3 {
            continue;
        }
        let info = line[run.len()..].trim();
        if info.split_whitespace().next() == Some("fishbone") {
            return Some(run);
        }
    }
    None
}

fn is_fence_end(line: &str, fence: &str) -> bool {
    if !line.starts_with(fence) {
        return false;
    }
    line[fence.len()..].trim().is_empty()
}

fn resolve_multi_outputs(
    output: Option<&Path>,
    format: OutputFormat,
    count: usize,
) -> Result<Vec<PathBuf>> {
    let ext = format.extension();
    let base = output.ok_or_else(|| anyhow::anyhow!("Output path required for markdown input"))?;
    if base.is_dir() {
        return Ok((1..=count)
            .map(|idx| base.join(format!("fishbone-{idx}.{ext}")))
            .collect());
    }
    let stem = base.file_stem().and_then(|s| s.to_str()).unwrap_or("fishbone");
    let parent = base.parent().unwrap_or_else(|| Path::new("."));
    Ok((1..=count)
        .map(|idx| parent.join(format!("{stem}-{idx}.{ext}")))
        .collect())
}
