use std::path::PathBuf;

use bgconfig::PatternKind;
use clap::{Parser, Subcommand};
use renderer::Viewport;

#[derive(Parser, Debug)]
#[command(
    name = "backdrop",
    author,
    version,
    about = "Animated procedural shader background"
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file; defaults to `config.toml` in the user config directory.
    #[arg(long, env = "BACKDROP_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Pattern to render: `lines` or `veil`.
    #[arg(long, value_name = "PATTERN", value_parser = parse_pattern)]
    pub pattern: Option<PatternKind>,

    /// Override a parameter of the selected pattern (e.g. `--set lineCount=8`).
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_param)]
    pub overrides: Vec<ParamOverride>,

    /// Window or surface size (e.g. `1280x720`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<Viewport>,

    /// Optional FPS cap (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Render on the recording context instead of opening a window.
    #[arg(long)]
    pub headless: bool,

    /// Number of frames to draw in headless mode (at least 1).
    #[arg(
        long,
        value_name = "N",
        default_value_t = 60,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub frames: u64,

    /// Write the headless frame trace as JSON to PATH (`-` for stdout).
    #[arg(long, value_name = "PATH", requires = "headless")]
    pub trace: Option<PathBuf>,

    /// Keep running when a shader fails to compile or link, logging the error.
    #[arg(long)]
    pub lenient_shaders: bool,

    /// Prefer a high-performance GPU adapter.
    #[arg(long)]
    pub high_power: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the resolved configuration file path.
    Where,
}

/// A `NAME=VALUE` parameter override.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamOverride {
    pub name: String,
    pub value: f32,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_pattern(value: &str) -> Result<PatternKind, String> {
    PatternKind::from_id(value)
        .ok_or_else(|| format!("unknown pattern '{}'; expected lines or veil", value.trim()))
}

pub fn parse_param(value: &str) -> Result<ParamOverride, String> {
    let (name, raw) = value
        .split_once('=')
        .ok_or_else(|| "expected NAME=VALUE".to_string())?;
    let name = name.trim();
    if name.is_empty() {
        return Err("parameter name must not be empty".into());
    }
    let value = raw
        .trim()
        .parse::<f32>()
        .map_err(|_| format!("invalid value '{}' for parameter '{name}'", raw.trim()))?;
    if !value.is_finite() {
        return Err(format!("parameter '{name}' must be a finite number"));
    }
    Ok(ParamOverride {
        name: name.to_string(),
        value,
    })
}

pub fn parse_size(value: &str) -> Result<Viewport, String> {
    let (w, h) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| "expected WIDTHxHEIGHT".to_string())?;
    let width = w
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid width in size".to_string())?;
    let height = h
        .trim()
        .parse::<u32>()
        .map_err(|_| "invalid height in size".to_string())?;
    if width == 0 || height == 0 {
        return Err("size must be greater than zero".into());
    }
    Ok(Viewport::new(width, height))
}
