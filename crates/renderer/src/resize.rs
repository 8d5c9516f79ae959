use tracing::debug;

use crate::context::{ContextManager, RenderContext};
use crate::host::RenderSurface;
use crate::types::Viewport;

/// Applies surface size-change notifications to a context's viewport.
#[derive(Debug, Clone)]
pub struct ResizeHandler {
    viewport: Viewport,
    aspect: f32,
}

impl ResizeHandler {
    pub fn new(initial: Viewport) -> Self {
        Self {
            viewport: initial,
            aspect: initial.aspect(),
        }
    }

    /// Resizes `context` to `notified`, or to the surface's current size when
    /// the notification carries none.
    pub fn handle<S: RenderSurface>(
        &mut self,
        surface: &S,
        context: &mut RenderContext<S::Context>,
        notified: Option<Viewport>,
    ) -> Viewport {
        let viewport = notified.unwrap_or_else(|| surface.size());
        ContextManager::resize(context, viewport.width, viewport.height);
        if viewport != self.viewport {
            debug!(%viewport, "surface resized");
        }
        self.viewport = viewport;
        self.aspect = viewport.aspect();
        viewport
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Width over height of the last applied size.
    pub fn aspect(&self) -> f32 {
        self.aspect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::headless::HeadlessSurface;

    #[test]
    fn queries_surface_when_notification_has_no_size() {
        let surface = HeadlessSurface::new(Viewport::new(800, 600));
        let mut context = ContextManager::acquire(&surface).unwrap();
        let mut handler = ResizeHandler::new(context.viewport());

        surface.set_size(Viewport::new(1024, 512));
        let applied = handler.handle(&surface, &mut context, None);
        assert_eq!(applied, Viewport::new(1024, 512));
        assert_eq!(context.viewport(), applied);
        assert_eq!(handler.aspect(), 2.0);
    }

    #[test]
    fn explicit_size_wins_over_surface() {
        let surface = HeadlessSurface::new(Viewport::new(800, 600));
        let mut context = ContextManager::acquire(&surface).unwrap();
        let mut handler = ResizeHandler::new(context.viewport());

        handler.handle(&surface, &mut context, Some(Viewport::new(300, 300)));
        assert_eq!(context.viewport(), Viewport::new(300, 300));
        assert_eq!(handler.aspect(), 1.0);
    }

    #[test]
    fn zero_height_keeps_aspect_finite() {
        let surface = HeadlessSurface::new(Viewport::new(800, 600));
        let mut context = ContextManager::acquire(&surface).unwrap();
        let mut handler = ResizeHandler::new(context.viewport());
        handler.handle(&surface, &mut context, Some(Viewport::new(640, 0)));
        assert!(handler.aspect().is_finite());
    }
}
