//! Renderer crate for backdrop, an animated full-viewport shader background.
//!
//! A [`Background`] owns one graphics context, one linked shader program, one
//! static full-screen quad, and the animation loop that redraws it:
//!
//! ```text
//!   RenderSurface ──▶ ContextManager ──▶ ShaderProgramBuilder ──▶ GeometryBuffer
//!                                                                     │
//!   FrameScheduler ◀── request_frame ◀── AnimationLoop::step ◀───────┘
//!          │                                  ▲
//!          └──────── take_due / on_frame ─────┘
//! ```
//!
//! The pipeline only talks to the [`GraphicsContext`] and [`FrameScheduler`]
//! traits. Two hosts ship: a `winit` window rendered through `wgpu`
//! ([`window`]) and a recording [`headless`] context that compiles the same
//! GLSL but logs draw calls instead of rasterising them.
//!
//! [`FrameScheduler`]: scheduler::FrameScheduler

pub mod compile;
pub mod context;
pub mod error;
pub mod geometry;
pub mod gpu;
pub mod headless;
pub mod host;
pub mod patterns;
pub mod pipeline;
mod reflect;
pub mod resize;
pub mod runtime;
pub mod types;
pub mod window;

use anyhow::{Context as _, Result};
use bgconfig::{BackdropConfig, PatternKind, RenderConfig};
use scheduler::ManualTicker;
use serde::Serialize;
use tracing::info;

pub use compile::{CompiledProgram, ProgramDiagnostics, ShaderProgramBuilder};
pub use context::{ContextManager, RenderContext};
pub use error::PipelineError;
pub use geometry::{GeometryBuffer, GeometryHandle};
pub use headless::{HeadlessContext, HeadlessSurface, Recording};
pub use host::{GraphicsContext, RenderSurface};
pub use pipeline::{Background, BackgroundOptions, PipelineUpdate, UpdateOutcome};
pub use resize::ResizeHandler;
pub use runtime::{AnimationLoop, AnimationState, LoopState, FIXED_DELTA};
pub use types::{GpuPowerPreference, ShaderFailurePolicy, ShaderStage, Viewport};

/// Where the background is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// A `winit` window rendered through `wgpu`, running until closed.
    Windowed,
    /// The recording context, driven for a fixed number of frames.
    Headless { frames: u64 },
}

/// Configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window or surface size in physical pixels.
    pub surface_size: Viewport,
    /// Selected pattern, per-pattern parameters, and frame cap.
    pub settings: BackdropConfig,
    pub shader_policy: ShaderFailurePolicy,
    pub gpu_power: GpuPowerPreference,
    pub mode: RenderMode,
}

impl Default for RendererConfig {
    /// A 1280x720 window showing the default pattern.
    fn default() -> Self {
        Self {
            surface_size: Viewport::new(1280, 720),
            settings: BackdropConfig::default(),
            shader_policy: ShaderFailurePolicy::default(),
            gpu_power: GpuPowerPreference::default(),
            mode: RenderMode::Windowed,
        }
    }
}

impl RendererConfig {
    /// Parameters of the selected pattern.
    pub fn render_config(&self) -> RenderConfig {
        self.settings.render_config()
    }
}

/// Outcome of a headless run, serialisable as a frame trace.
#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub pattern: PatternKind,
    pub viewport: Viewport,
    pub frames_drawn: u64,
    /// Simulated seconds after the last frame.
    pub time: f64,
    pub recording: Recording,
}

/// Entry point that owns the chosen configuration.
pub struct Renderer {
    config: RendererConfig,
}

impl Renderer {
    pub fn new(config: RendererConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Runs the background in the configured mode.
    pub fn run(&mut self) -> Result<()> {
        match self.config.mode {
            RenderMode::Windowed => window::run(&self.config),
            RenderMode::Headless { frames } => {
                let report = self.run_headless(frames)?;
                info!(
                    frames = report.frames_drawn,
                    time = report.time,
                    draws = report.recording.draws.len(),
                    "headless run finished"
                );
                Ok(())
            }
        }
    }

    /// Draws `frames` frames on the recording context and tears the pipeline
    /// down again. Initialisation always draws the first frame, so `frames`
    /// below 1 still yields one.
    pub fn run_headless(&self, frames: u64) -> Result<HeadlessReport> {
        let surface = HeadlessSurface::new(self.config.surface_size);
        let options = BackgroundOptions {
            shader_policy: self.config.shader_policy,
        };
        let mut background = Background::init(
            surface.clone(),
            self.config.render_config(),
            options,
            ManualTicker::new(),
        )
        .context("failed to initialise headless background")?;

        for _ in 1..frames {
            if !background.tick().context("headless frame failed")? {
                break;
            }
        }

        let report_time = background.time();
        let frames_drawn = background.frames_drawn();
        let viewport = background.viewport();
        let pattern = background.pattern();
        background.destroy();

        Ok(HeadlessReport {
            pattern,
            viewport,
            frames_drawn,
            time: report_time,
            recording: surface.snapshot(),
        })
    }
}
