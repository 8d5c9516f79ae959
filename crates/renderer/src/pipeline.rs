use bgconfig::{ConfigError, PatternKind, RenderConfig};
use scheduler::{FrameRequest, FrameScheduler};
use tracing::{debug, error, info};

use crate::compile::{CompiledProgram, ShaderProgramBuilder};
use crate::context::{ContextManager, RenderContext};
use crate::error::PipelineError;
use crate::geometry::{GeometryBuffer, GeometryHandle};
use crate::host::{GraphicsContext, RenderSurface};
use crate::patterns::shaders_for;
use crate::resize::ResizeHandler;
use crate::runtime::{AnimationLoop, FrameTarget, LoopState};
use crate::types::{ShaderFailurePolicy, Viewport};

/// Knobs that affect how a [`Background`] is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundOptions {
    pub shader_policy: ShaderFailurePolicy,
}

/// A change requested by the host.
pub enum PipelineUpdate<S> {
    /// New parameter values for the running pattern.
    Params(RenderConfig),
    /// New surface (and possibly a different pattern); everything is rebuilt.
    Rebuild { surface: S, config: RenderConfig },
}

/// How an update was applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Values changed in place; the next frame uploads them.
    ParamsUpdated,
    /// GPU resources were torn down and recreated.
    Rebuilt,
}

struct Resources<C: GraphicsContext> {
    context: RenderContext<C>,
    program: CompiledProgram,
    geometry: GeometryHandle,
}

impl<C: GraphicsContext> Resources<C> {
    fn build<S>(
        surface: &S,
        config: &RenderConfig,
        options: &BackgroundOptions,
    ) -> Result<Self, PipelineError>
    where
        S: RenderSurface<Context = C>,
    {
        let mut context = ContextManager::acquire(surface)?;
        let shaders = shaders_for(config.kind());
        let mut builder = ShaderProgramBuilder::new(options.shader_policy);
        let program = match builder.build(
            context.gl_mut(),
            shaders.vertex,
            shaders.fragment,
            &config.uniform_names(),
        ) {
            Ok(program) => program,
            Err(err) => {
                context.gl_mut().release();
                return Err(err);
            }
        };
        let geometry = match GeometryBuffer::quad(context.gl_mut(), &program) {
            Ok(geometry) => geometry,
            Err(err) => {
                program.delete(context.gl_mut());
                context.gl_mut().release();
                return Err(err);
            }
        };
        Ok(Self {
            context,
            program,
            geometry,
        })
    }

    fn release(self) {
        let Resources {
            context,
            program,
            geometry,
        } = self;
        let mut gl = context.into_inner();
        program.delete(&mut gl);
        geometry.release(&mut gl);
        gl.release();
    }
}

/// One animated background bound to one surface.
///
/// Owns the drawing context, the linked program, the quad geometry, and the
/// animation loop. The host drives it by handing due frame requests to
/// [`Background::on_frame`] (or calling [`Background::tick`]) and forwarding
/// resize notifications to [`Background::handle_resize`].
pub struct Background<S: RenderSurface, F: FrameScheduler> {
    surface: S,
    scheduler: F,
    config: RenderConfig,
    options: BackgroundOptions,
    resources: Option<Resources<S::Context>>,
    animation: AnimationLoop,
    resize: ResizeHandler,
    builds: u32,
}

impl<S: RenderSurface, F: FrameScheduler> Background<S, F> {
    /// Builds every resource for `surface` and starts the animation loop.
    pub fn init(
        surface: S,
        config: RenderConfig,
        options: BackgroundOptions,
        scheduler: F,
    ) -> Result<Self, PipelineError> {
        let mut background = Self {
            resize: ResizeHandler::new(surface.size()),
            surface,
            scheduler,
            config,
            options,
            resources: None,
            animation: AnimationLoop::new(),
            builds: 0,
        };
        background.build()?;
        info!(
            pattern = %background.config.kind(),
            viewport = %background.viewport(),
            "background initialised"
        );
        Ok(background)
    }

    /// Like [`Background::init`], but a missing graphics context is logged
    /// and turns initialisation into a no-op.
    pub fn try_init(
        surface: S,
        config: RenderConfig,
        options: BackgroundOptions,
        scheduler: F,
    ) -> Result<Option<Self>, PipelineError> {
        match Self::init(surface, config, options, scheduler) {
            Ok(background) => Ok(Some(background)),
            Err(PipelineError::ContextUnavailable { reason }) => {
                error!(%reason, "graphics context unavailable; background disabled");
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }

    fn build(&mut self) -> Result<(), PipelineError> {
        let resources = Resources::build(&self.surface, &self.config, &self.options)?;
        self.resize = ResizeHandler::new(resources.context.viewport());
        self.resources = Some(resources);
        self.builds += 1;
        self.animation.reset();
        self.animation.mark_initialized();
        self.start()
    }

    /// Starts (or restarts) the animation loop.
    pub fn start(&mut self) -> Result<(), PipelineError> {
        let resources = self.resources.as_mut().ok_or(PipelineError::NotInitialized)?;
        let target = FrameTarget {
            context: &mut resources.context,
            program: &resources.program,
            geometry: &resources.geometry,
            config: &self.config,
        };
        self.animation.start(target, &mut self.scheduler)
    }

    /// Stops the loop at the next suspension point.
    pub fn cancel(&mut self) {
        self.animation.cancel(&mut self.scheduler);
    }

    /// Runs the frame step for `request`. Returns whether a frame was drawn.
    pub fn on_frame(&mut self, request: FrameRequest) -> Result<bool, PipelineError> {
        let Some(resources) = self.resources.as_mut() else {
            return Ok(false);
        };
        let target = FrameTarget {
            context: &mut resources.context,
            program: &resources.program,
            geometry: &resources.geometry,
            config: &self.config,
        };
        self.animation.on_frame(target, &mut self.scheduler, request)
    }

    /// Delivers the next due frame from the scheduler, if any.
    pub fn tick(&mut self) -> Result<bool, PipelineError> {
        match self.scheduler.take_due() {
            Some(request) => self.on_frame(request),
            None => Ok(false),
        }
    }

    /// Applies a size-change notification. Without an explicit size the
    /// surface is queried. Returns the applied viewport.
    pub fn handle_resize(&mut self, notified: Option<Viewport>) -> Option<Viewport> {
        let resources = self.resources.as_mut()?;
        Some(
            self.resize
                .handle(&self.surface, &mut resources.context, notified),
        )
    }

    /// Cancels the loop and releases every resource. Calling it again does
    /// nothing.
    pub fn destroy(&mut self) {
        self.cancel();
        if let Some(resources) = self.resources.take() {
            resources.release();
            self.animation.reset();
            debug!("background destroyed");
        }
    }

    /// Overwrites one parameter; the next frame uploads it.
    pub fn set_param(&mut self, name: &str, value: f32) -> Result<(), ConfigError> {
        self.config.set(name, value)
    }

    /// Replaces the parameters. A different pattern rebuilds the program on
    /// the current surface.
    pub fn update_params(&mut self, config: RenderConfig) -> Result<UpdateOutcome, PipelineError> {
        if config.kind() == self.config.kind() {
            self.config = config;
            return Ok(UpdateOutcome::ParamsUpdated);
        }
        self.rebuild(config)?;
        Ok(UpdateOutcome::Rebuilt)
    }

    /// Declarative update entry point.
    pub fn apply(&mut self, update: PipelineUpdate<S>) -> Result<UpdateOutcome, PipelineError> {
        match update {
            PipelineUpdate::Params(config) => self.update_params(config),
            PipelineUpdate::Rebuild { surface, config } => {
                self.destroy();
                self.surface = surface;
                self.config = config;
                self.build()?;
                info!(pattern = %self.config.kind(), "background rebuilt for new surface");
                Ok(UpdateOutcome::Rebuilt)
            }
        }
    }

    fn rebuild(&mut self, config: RenderConfig) -> Result<(), PipelineError> {
        let previous = self.config.kind();
        self.destroy();
        self.config = config;
        self.build()?;
        info!(from = %previous, to = %self.config.kind(), "switched pattern");
        Ok(())
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// In-place access for incremental updates. Switching the variant through
    /// this reference surfaces as [`PipelineError::UnknownUniform`] on the
    /// next frame; use [`Background::update_params`] for that.
    pub fn params_mut(&mut self) -> &mut RenderConfig {
        &mut self.config
    }

    pub fn pattern(&self) -> PatternKind {
        self.config.kind()
    }

    pub fn options(&self) -> BackgroundOptions {
        self.options
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn scheduler(&self) -> &F {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut F {
        &mut self.scheduler
    }

    pub fn state(&self) -> LoopState {
        self.animation.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    pub fn is_destroyed(&self) -> bool {
        self.resources.is_none()
    }

    /// Simulated seconds since the loop first started.
    pub fn time(&self) -> f64 {
        self.animation.time()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.animation.frames_drawn()
    }

    pub fn pending_frame(&self) -> Option<FrameRequest> {
        self.animation.animation().pending()
    }

    /// Number of times GPU resources were built.
    pub fn builds(&self) -> u32 {
        self.builds
    }

    pub fn viewport(&self) -> Viewport {
        self.resources
            .as_ref()
            .map(|resources| resources.context.viewport())
            .unwrap_or_default()
    }

    pub fn aspect(&self) -> f32 {
        self.resize.aspect()
    }

    pub fn context(&self) -> Option<&RenderContext<S::Context>> {
        self.resources.as_ref().map(|resources| &resources.context)
    }

    pub fn program(&self) -> Option<&CompiledProgram> {
        self.resources.as_ref().map(|resources| &resources.program)
    }

    pub fn geometry(&self) -> Option<&GeometryHandle> {
        self.resources.as_ref().map(|resources| &resources.geometry)
    }
}

impl<S: RenderSurface, F: FrameScheduler> Drop for Background<S, F> {
    fn drop(&mut self) {
        self.destroy();
    }
}
