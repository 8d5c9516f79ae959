use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use bgconfig::{BackdropConfig, PatternKind};
use scheduler::WakeScheduler;
use tracing::{debug, error, info, warn};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::gpu::WgpuContext;
use crate::host::RenderSurface;
use crate::pipeline::{Background, BackgroundOptions};
use crate::types::{GpuPowerPreference, Viewport};
use crate::RendererConfig;

const SPEED_STEP: f32 = 0.1;

/// Scheduler that turns frame requests into `Window::request_redraw` calls.
type RedrawScheduler = WakeScheduler<Box<dyn FnMut()>>;

/// A `winit` window used as the background's drawing surface.
pub struct WindowSurface {
    window: Arc<Window>,
    gpu_power: GpuPowerPreference,
}

impl WindowSurface {
    pub fn new(window: Arc<Window>, gpu_power: GpuPowerPreference) -> Self {
        Self { window, gpu_power }
    }

    pub fn window(&self) -> &Window {
        self.window.as_ref()
    }
}

impl RenderSurface for WindowSurface {
    type Context = WgpuContext;

    fn size(&self) -> Viewport {
        let size = self.window.inner_size();
        Viewport::new(size.width, size.height)
    }

    fn create_context(&self) -> Result<WgpuContext> {
        WgpuContext::new(self.window.clone(), self.size(), self.gpu_power)
    }
}

/// Opens the window and drives the background from the `winit` event loop
/// until the window is closed.
///
/// Keys: `Up`/`Down` change the speed in place, `Tab` switches pattern
/// (rebuilding the program), `Escape` closes the window.
pub(crate) fn run(config: &RendererConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;
    let window_size = PhysicalSize::new(config.surface_size.width, config.surface_size.height);
    let window = WindowBuilder::new()
        .with_title("Backdrop")
        .with_inner_size(window_size)
        .with_transparent(true)
        .build(&event_loop)
        .context("failed to create background window")?;
    let window = Arc::new(window);

    let wake_window = window.clone();
    let wake: Box<dyn FnMut()> = Box::new(move || wake_window.request_redraw());
    let scheduler: RedrawScheduler =
        WakeScheduler::new(wake).with_frame_cap(config.settings.frame_cap());

    let mut settings = config.settings.clone();
    let options = BackgroundOptions {
        shader_policy: config.shader_policy,
    };
    let surface = WindowSurface::new(window.clone(), config.gpu_power);
    let Some(mut background) =
        Background::try_init(surface, config.render_config(), options, scheduler)?
    else {
        warn!("no graphics context available; nothing to draw");
        return Ok(());
    };

    let window_id = window.id();
    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { window_id: id, event } if id == window_id => match event {
                WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                    background.destroy();
                    elwt.exit();
                }
                WindowEvent::Resized(size) => {
                    let applied =
                        background.handle_resize(Some(Viewport::new(size.width, size.height)));
                    debug!(viewport = ?applied, "window resized");
                }
                WindowEvent::KeyboardInput { event, .. } => {
                    if handle_key(&mut background, &mut settings, &event) {
                        background.destroy();
                        elwt.exit();
                    }
                }
                WindowEvent::RedrawRequested => {
                    if let Err(err) = background.tick() {
                        error!("background stopped: {err}");
                        background.destroy();
                        elwt.exit();
                    }
                }
                _ => {}
            },
            Event::AboutToWait => {
                let now = Instant::now();
                let scheduler = background.scheduler_mut();
                if scheduler.wake_if_ready(now) {
                    tracing::trace!("scheduler: issuing redraw now");
                    elwt.set_control_flow(ControlFlow::Wait);
                } else if let Some(deadline) = scheduler.next_deadline() {
                    elwt.set_control_flow(ControlFlow::WaitUntil(deadline));
                } else {
                    elwt.set_control_flow(ControlFlow::Wait);
                }
            }
            _ => {}
        })
        .map_err(|err| anyhow!("window event loop error: {err}"))
}

/// Returns `true` when the key asks to close the window.
fn handle_key(
    background: &mut Background<WindowSurface, RedrawScheduler>,
    settings: &mut BackdropConfig,
    event: &KeyEvent,
) -> bool {
    if event.state != ElementState::Pressed {
        return false;
    }
    match &event.logical_key {
        Key::Named(NamedKey::Escape) => return true,
        Key::Named(NamedKey::ArrowUp) => adjust_speed(background, SPEED_STEP),
        Key::Named(NamedKey::ArrowDown) => adjust_speed(background, -SPEED_STEP),
        Key::Named(NamedKey::Tab) if !event.repeat => {
            settings.store(*background.config());
            let next = match background.pattern() {
                PatternKind::Lines => PatternKind::Veil,
                PatternKind::Veil => PatternKind::Lines,
            };
            match background.update_params(settings.render_config_for(next)) {
                Ok(outcome) => info!(pattern = %next, ?outcome, "pattern switched"),
                Err(err) => error!("failed to switch pattern: {err}"),
            }
        }
        _ => {}
    }
    false
}

fn adjust_speed(background: &mut Background<WindowSurface, RedrawScheduler>, delta: f32) {
    let current = background.config().get("speed").unwrap_or(1.0);
    let speed = (current + delta).max(0.0);
    match background.set_param("speed", speed) {
        Ok(()) => debug!(speed, "speed adjusted"),
        Err(err) => warn!("failed to adjust speed: {err}"),
    }
}
