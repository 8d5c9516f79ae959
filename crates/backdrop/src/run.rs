use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use bgconfig::BackdropConfig;
use renderer::{
    GpuPowerPreference, HeadlessReport, RenderMode, Renderer, RendererConfig, ShaderFailurePolicy,
    Viewport,
};
use tracing_subscriber::EnvFilter;

use crate::cli::RunArgs;
use crate::paths::{resolve_config_path, AppPaths};

const DEFAULT_SIZE: Viewport = Viewport {
    width: 1280,
    height: 720,
};

pub fn run(args: RunArgs) -> Result<()> {
    let config_path = resolve_config_path(args.config.as_deref())?;
    let mut settings = BackdropConfig::load_or_default(&config_path)
        .with_context(|| format!("failed to load configuration from {}", config_path.display()))?;
    tracing::debug!(
        path = %config_path.display(),
        exists = config_path.exists(),
        "resolved configuration file"
    );
    apply_overrides(&mut settings, &args)?;

    let renderer_config = RendererConfig {
        surface_size: args.size.unwrap_or(DEFAULT_SIZE),
        settings,
        shader_policy: if args.lenient_shaders {
            ShaderFailurePolicy::Continue
        } else {
            ShaderFailurePolicy::FailFast
        },
        gpu_power: if args.high_power {
            GpuPowerPreference::High
        } else {
            GpuPowerPreference::Low
        },
        mode: if args.headless {
            RenderMode::Headless {
                frames: args.frames,
            }
        } else {
            RenderMode::Windowed
        },
    };
    tracing::info!(
        pattern = %renderer_config.settings.pattern,
        size = %renderer_config.surface_size,
        headless = args.headless,
        "starting backdrop"
    );

    let mut renderer = Renderer::new(renderer_config);
    match args.trace.as_deref() {
        Some(trace) => {
            let report = renderer.run_headless(args.frames)?;
            tracing::info!(
                frames = report.frames_drawn,
                time = report.time,
                "headless run finished"
            );
            write_trace(trace, &report)
        }
        None => renderer.run(),
    }
}

/// Folds CLI flags into the loaded configuration and re-validates it.
pub fn apply_overrides(settings: &mut BackdropConfig, args: &RunArgs) -> Result<()> {
    if let Some(pattern) = args.pattern {
        settings.pattern = pattern;
    }
    if let Some(fps) = args.fps {
        settings.fps = Some(fps);
    }

    let mut render = settings.render_config();
    for param in &args.overrides {
        render
            .set(&param.name, param.value)
            .with_context(|| format!("invalid --set {}={}", param.name, param.value))?;
    }
    settings.store(render);
    settings.validate().context("invalid configuration")?;
    Ok(())
}

fn write_trace(path: &Path, report: &HeadlessReport) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialise frame trace")?;
    if path.as_os_str() == "-" {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{json}").context("failed to write frame trace")?;
        return Ok(());
    }
    fs::write(path, json)
        .with_context(|| format!("failed to write frame trace to {}", path.display()))?;
    tracing::info!(path = %path.display(), "frame trace written");
    Ok(())
}

pub fn print_where(explicit: Option<&Path>) -> Result<()> {
    let config_path = resolve_config_path(explicit)?;
    let paths = AppPaths::discover()?;
    println!("Configuration:");
    println!("  config dir:  {}", paths.config_dir().display());
    println!(
        "  config file: {} ({})",
        config_path.display(),
        if config_path.exists() {
            "present"
        } else {
            "missing, defaults in use"
        }
    );
    Ok(())
}

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}
