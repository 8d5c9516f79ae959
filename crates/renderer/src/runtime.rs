use bgconfig::{RenderConfig, TIME_UNIFORM};
use scheduler::{FrameRequest, FrameScheduler};
use tracing::{debug, trace};

use crate::compile::CompiledProgram;
use crate::context::RenderContext;
use crate::error::PipelineError;
use crate::geometry::GeometryHandle;
use crate::host::GraphicsContext;

/// Simulated seconds added per frame, independent of wall-clock time.
pub const FIXED_DELTA: f64 = 1.0 / 60.0;

const STATS_INTERVAL: u64 = 60;

/// Lifecycle of an [`AnimationLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Initialized,
    Running,
    Stopped,
}

/// Elapsed simulated time plus the outstanding frame request.
///
/// Time is kept as a step count so that `N` steps always read back as exactly
/// `N * FIXED_DELTA`.
#[derive(Debug, Clone, Default)]
pub struct AnimationState {
    steps: u64,
    pending: Option<FrameRequest>,
}

impl AnimationState {
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn time(&self) -> f64 {
        self.steps as f64 * FIXED_DELTA
    }

    pub fn pending(&self) -> Option<FrameRequest> {
        self.pending
    }

    fn advance(&mut self) -> f64 {
        self.steps += 1;
        self.time()
    }
}

/// Everything one frame step reads or draws into.
pub struct FrameTarget<'a, C: GraphicsContext> {
    pub context: &'a mut RenderContext<C>,
    pub program: &'a CompiledProgram,
    pub geometry: &'a GeometryHandle,
    pub config: &'a RenderConfig,
}

/// Self-rescheduling frame loop.
///
/// Every step advances time by [`FIXED_DELTA`], uploads `uTime` and the
/// config's uniforms, clears, draws the full index range, and asks the
/// scheduler for the next frame. Only the request the loop is waiting for runs
/// a step; anything else handed to [`AnimationLoop::on_frame`] is ignored.
#[derive(Debug)]
pub struct AnimationLoop {
    state: LoopState,
    animation: AnimationState,
    frames_drawn: u64,
}

impl Default for AnimationLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationLoop {
    pub fn new() -> Self {
        Self {
            state: LoopState::Idle,
            animation: AnimationState::default(),
            frames_drawn: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn animation(&self) -> &AnimationState {
        &self.animation
    }

    pub fn time(&self) -> f64 {
        self.animation.time()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Marks the resources the loop draws with as ready.
    pub fn mark_initialized(&mut self) {
        if self.state == LoopState::Idle {
            self.state = LoopState::Initialized;
        }
    }

    /// Begins running and immediately draws the first frame.
    pub fn start<C, F>(
        &mut self,
        target: FrameTarget<'_, C>,
        scheduler: &mut F,
    ) -> Result<(), PipelineError>
    where
        C: GraphicsContext,
        F: FrameScheduler + ?Sized,
    {
        match self.state {
            LoopState::Running => return Err(PipelineError::DoubleStart),
            LoopState::Idle => return Err(PipelineError::NotInitialized),
            LoopState::Initialized | LoopState::Stopped => {}
        }
        self.state = LoopState::Running;
        debug!(time = self.time(), "animation loop started");
        self.step(target, scheduler)
    }

    /// Runs a frame step when `request` is the one the loop is waiting for.
    /// Returns whether a frame was drawn.
    pub fn on_frame<C, F>(
        &mut self,
        target: FrameTarget<'_, C>,
        scheduler: &mut F,
        request: FrameRequest,
    ) -> Result<bool, PipelineError>
    where
        C: GraphicsContext,
        F: FrameScheduler + ?Sized,
    {
        if self.state != LoopState::Running || self.animation.pending != Some(request) {
            trace!(%request, state = ?self.state, "ignoring stale frame request");
            return Ok(false);
        }
        self.animation.pending = None;
        self.step(target, scheduler)?;
        Ok(true)
    }

    /// Withdraws the outstanding frame request. No frame runs afterwards until
    /// the loop is started again.
    pub fn cancel<F: FrameScheduler + ?Sized>(&mut self, scheduler: &mut F) {
        if let Some(request) = self.animation.pending.take() {
            scheduler.cancel_frame(request);
        }
        if self.state == LoopState::Running {
            self.state = LoopState::Stopped;
            debug!(frames = self.frames_drawn, "animation loop stopped");
        }
    }

    /// Forgets time and state after the resources the loop drew with are gone.
    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    fn step<C, F>(
        &mut self,
        target: FrameTarget<'_, C>,
        scheduler: &mut F,
    ) -> Result<(), PipelineError>
    where
        C: GraphicsContext,
        F: FrameScheduler + ?Sized,
    {
        let time = self.animation.advance();
        if let Err(err) = draw(target, time as f32) {
            self.state = LoopState::Stopped;
            return Err(err);
        }

        self.frames_drawn += 1;
        if self.frames_drawn % STATS_INTERVAL == 0 {
            debug!(frame_count = self.frames_drawn, time, "render stats");
        }

        self.animation.pending = Some(scheduler.request_frame());
        Ok(())
    }
}

fn draw<C: GraphicsContext>(target: FrameTarget<'_, C>, time: f32) -> Result<(), PipelineError> {
    let FrameTarget {
        context,
        program,
        geometry,
        config,
    } = target;
    let gl = context.gl_mut();

    gl.use_program(program.handle());
    program.set_uniform(gl, TIME_UNIFORM, time)?;
    for (name, value) in config.uniform_values() {
        program.set_uniform(gl, name, value)?;
    }

    gl.clear();
    gl.draw_indexed(geometry.index_count());
    Ok(())
}

#[cfg(test)]
mod tests {
    use bgconfig::PatternKind;
    use scheduler::ManualTicker;

    use super::*;
    use crate::compile::ShaderProgramBuilder;
    use crate::context::ContextManager;
    use crate::geometry::GeometryBuffer;
    use crate::headless::{HeadlessContext, HeadlessSurface};
    use crate::patterns::shaders_for;
    use crate::types::Viewport;

    struct Fixture {
        surface: HeadlessSurface,
        context: RenderContext<HeadlessContext>,
        program: CompiledProgram,
        geometry: GeometryHandle,
        config: RenderConfig,
        ticker: ManualTicker,
    }

    impl Fixture {
        fn new() -> Self {
            let surface = HeadlessSurface::new(Viewport::new(320, 200));
            let mut context = ContextManager::acquire(&surface).unwrap();
            let config = RenderConfig::defaults_for(PatternKind::Lines);
            let shaders = shaders_for(config.kind());
            let program = ShaderProgramBuilder::default()
                .build(
                    context.gl_mut(),
                    shaders.vertex,
                    shaders.fragment,
                    &config.uniform_names(),
                )
                .unwrap();
            let geometry = GeometryBuffer::quad(context.gl_mut(), &program).unwrap();
            Self {
                surface,
                context,
                program,
                geometry,
                config,
                ticker: ManualTicker::new(),
            }
        }

        fn start(&mut self, animation: &mut AnimationLoop) -> Result<(), PipelineError> {
            let target = FrameTarget {
                context: &mut self.context,
                program: &self.program,
                geometry: &self.geometry,
                config: &self.config,
            };
            animation.start(target, &mut self.ticker)
        }

        fn tick(&mut self, animation: &mut AnimationLoop) -> bool {
            let Some(request) = self.ticker.tick() else {
                return false;
            };
            let target = FrameTarget {
                context: &mut self.context,
                program: &self.program,
                geometry: &self.geometry,
                config: &self.config,
            };
            animation
                .on_frame(target, &mut self.ticker, request)
                .unwrap()
        }
    }

    #[test]
    fn start_requires_initialization() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        assert!(matches!(
            fixture.start(&mut animation),
            Err(PipelineError::NotInitialized)
        ));
        assert_eq!(fixture.surface.recording().draws.len(), 0);
    }

    #[test]
    fn start_draws_first_frame_and_schedules_next() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();

        assert_eq!(animation.state(), LoopState::Running);
        assert_eq!(animation.frames_drawn(), 1);
        assert_eq!(fixture.ticker.pending(), 1);
        assert!(animation.animation().pending().is_some());
    }

    #[test]
    fn fixed_step_time_is_exact() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();
        for _ in 0..119 {
            assert!(fixture.tick(&mut animation));
        }
        assert_eq!(animation.animation().steps(), 120);
        assert_eq!(animation.time(), 120.0 * FIXED_DELTA);
        assert!((animation.time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn double_start_is_rejected() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();
        assert!(matches!(
            fixture.start(&mut animation),
            Err(PipelineError::DoubleStart)
        ));
        assert_eq!(animation.frames_drawn(), 1);
    }

    #[test]
    fn stale_requests_are_ignored() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();

        let stranger = fixture.ticker.request_frame();
        let pending = animation.animation().pending().unwrap();
        assert_ne!(stranger, pending);
        let target = FrameTarget {
            context: &mut fixture.context,
            program: &fixture.program,
            geometry: &fixture.geometry,
            config: &fixture.config,
        };
        let drawn = animation
            .on_frame(target, &mut fixture.ticker, stranger)
            .unwrap();
        assert!(!drawn);
        assert_eq!(animation.frames_drawn(), 1);
    }

    #[test]
    fn cancel_stops_further_frames_and_restart_resumes_time() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();
        fixture.tick(&mut animation);

        animation.cancel(&mut fixture.ticker);
        assert_eq!(animation.state(), LoopState::Stopped);
        assert_eq!(fixture.ticker.pending(), 0);
        assert!(!fixture.tick(&mut animation));
        assert_eq!(animation.frames_drawn(), 2);

        fixture.start(&mut animation).unwrap();
        assert_eq!(animation.animation().steps(), 3);
    }

    #[test]
    fn uploads_time_and_parameters_each_frame() {
        let mut fixture = Fixture::new();
        let mut animation = AnimationLoop::new();
        animation.mark_initialized();
        fixture.start(&mut animation).unwrap();
        fixture.config.set("lineCount", 0.0).unwrap();
        fixture.tick(&mut animation);

        let recording = fixture.surface.recording();
        let first = &recording.draws[0];
        assert_eq!(first.index_count, 6);
        assert_eq!(first.uniforms.get("uTime"), Some(&(FIXED_DELTA as f32)));
        assert_eq!(first.uniforms.get("uLineCount"), Some(&15.0));
        let second = &recording.draws[1];
        assert_eq!(second.uniforms.get("uLineCount"), Some(&0.0));
    }
}
