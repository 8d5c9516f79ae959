use tracing::debug;

use crate::error::PipelineError;
use crate::host::{GraphicsContext, RenderSurface};
use crate::types::{Rgba, Viewport};

/// A drawing context plus the viewport it currently renders into.
pub struct RenderContext<C: GraphicsContext> {
    gl: C,
    viewport: Viewport,
}

impl<C: GraphicsContext> RenderContext<C> {
    pub fn gl(&self) -> &C {
        &self.gl
    }

    pub fn gl_mut(&mut self) -> &mut C {
        &mut self.gl
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub(crate) fn into_inner(self) -> C {
        self.gl
    }
}

/// Acquires drawing contexts and keeps their viewport in sync with the surface.
pub struct ContextManager;

impl ContextManager {
    /// Creates a context for `surface` with alpha blending, a transparent
    /// clear colour, and a viewport matching the surface's current size.
    pub fn acquire<S: RenderSurface>(
        surface: &S,
    ) -> Result<RenderContext<S::Context>, PipelineError> {
        let mut gl = surface
            .create_context()
            .map_err(|err| PipelineError::ContextUnavailable {
                reason: format!("{err:#}"),
            })?;

        gl.enable_alpha_blending();
        gl.set_clear_color(Rgba::TRANSPARENT);

        let viewport = surface.size();
        gl.set_viewport(viewport);
        debug!(%viewport, "acquired drawing context");

        Ok(RenderContext { gl, viewport })
    }

    /// Sets the viewport to exactly `width` x `height`.
    pub fn resize<C: GraphicsContext>(context: &mut RenderContext<C>, width: u32, height: u32) {
        let viewport = Viewport::new(width, height);
        if context.viewport == viewport {
            return;
        }
        context.gl.set_viewport(viewport);
        context.viewport = viewport;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::{Command, HeadlessSurface};

    #[test]
    fn acquire_configures_blending_and_viewport() {
        let surface = HeadlessSurface::new(Viewport::new(640, 480));
        let context = ContextManager::acquire(&surface).expect("acquire");
        assert_eq!(context.viewport(), Viewport::new(640, 480));

        let commands = surface.recording().commands.clone();
        assert_eq!(
            commands,
            vec![
                Command::EnableBlending,
                Command::ClearColor(Rgba::TRANSPARENT),
                Command::Viewport(Viewport::new(640, 480)),
            ]
        );
    }

    #[test]
    fn unsupported_surface_reports_context_unavailable() {
        let surface = HeadlessSurface::unsupported(Viewport::new(10, 10));
        let err = ContextManager::acquire(&surface).err().expect("failure");
        assert!(matches!(err, PipelineError::ContextUnavailable { .. }));
    }

    #[test]
    fn resize_is_exact_and_idempotent() {
        let surface = HeadlessSurface::new(Viewport::new(100, 100));
        let mut context = ContextManager::acquire(&surface).unwrap();
        ContextManager::resize(&mut context, 1920, 1080);
        ContextManager::resize(&mut context, 1920, 1080);
        assert_eq!(context.viewport(), Viewport::new(1920, 1080));
        assert_eq!(surface.recording().viewport, Viewport::new(1920, 1080));

        let viewport_commands = surface
            .recording()
            .commands
            .iter()
            .filter(|command| matches!(command, Command::Viewport(_)))
            .count();
        assert_eq!(viewport_commands, 2);
    }

    #[test]
    fn zero_sized_viewport_is_stored_verbatim() {
        let surface = HeadlessSurface::new(Viewport::new(100, 100));
        let mut context = ContextManager::acquire(&surface).unwrap();
        ContextManager::resize(&mut context, 0, 240);
        assert_eq!(context.viewport(), Viewport::new(0, 240));
    }
}
