use bgconfig::{PatternKind, RenderConfig};
use renderer::patterns::{FloatingLines, VERTEX_SHADER};
use renderer::{
    Background, BackgroundOptions, ContextManager, GraphicsContext, HeadlessSurface, LoopState,
    PipelineError, PipelineUpdate, ShaderFailurePolicy, ShaderProgramBuilder, UpdateOutcome,
    Viewport, FIXED_DELTA,
};
use scheduler::{FrameScheduler, ManualTicker};

fn surface() -> HeadlessSurface {
    HeadlessSurface::new(Viewport::new(1024, 768))
}

type TestBackground = Background<HeadlessSurface, ManualTicker>;

fn start(surface: &HeadlessSurface, kind: PatternKind) -> TestBackground {
    Background::init(
        surface.clone(),
        RenderConfig::defaults_for(kind),
        BackgroundOptions::default(),
        ManualTicker::new(),
    )
    .expect("background starts")
}

/// Delivers `count` frames; returns how many were drawn.
fn run_frames(background: &mut TestBackground, count: usize) -> usize {
    (0..count)
        .filter(|_| background.tick().expect("frame"))
        .count()
}

#[test]
fn default_config_draws_one_quad_with_positive_time() {
    let surface = surface();
    let background = start(&surface, PatternKind::Lines);

    let recording = surface.recording();
    assert_eq!(recording.draws.len(), 1);
    let draw = recording.last_draw().unwrap();
    assert_eq!(draw.index_count, 6);
    assert!(draw.uniforms["uTime"] > 0.0);
    assert_eq!(draw.viewport, Viewport::new(1024, 768));
    assert!(draw.cleared);
    assert!(recording.blending);
    assert!(background.time() > 0.0);
}

#[test]
fn time_advances_in_fixed_steps() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Veil);
    assert_eq!(run_frames(&mut background, 299), 299);

    assert_eq!(background.frames_drawn(), 300);
    assert_eq!(background.time(), 300.0 * FIXED_DELTA);
    let last = surface.recording().last_draw().unwrap().uniforms["uTime"];
    assert_eq!(last, (300.0 * FIXED_DELTA) as f32);
}

#[test]
fn two_runs_record_identical_uniform_streams() {
    let record = || {
        let surface = surface();
        let mut background = start(&surface, PatternKind::Lines);
        run_frames(&mut background, 30);
        let uniforms: Vec<_> = surface
            .recording()
            .draws
            .iter()
            .map(|draw| draw.uniforms.clone())
            .collect();
        uniforms
    };
    assert_eq!(record(), record());
}

#[test]
fn quad_geometry_is_identical_for_every_pattern() {
    for kind in [PatternKind::Lines, PatternKind::Veil] {
        let surface = surface();
        let background = start(&surface, kind);
        let geometry = background.geometry().unwrap();
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.index_count(), 6);

        let [positions, uvs, indices] = geometry.buffers();
        let recording = surface.recording();
        assert_eq!(recording.buffer_f32(positions).unwrap().len(), 12);
        assert_eq!(recording.buffer_f32(uvs).unwrap().len(), 8);
        assert_eq!(recording.buffer_u16(indices).unwrap(), vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(recording.last_draw().unwrap().attributes, vec![0, 1]);
    }
}

#[test]
fn destroy_is_idempotent() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    run_frames(&mut background, 3);

    background.destroy();
    background.destroy();

    assert!(background.is_destroyed());
    let recording = surface.recording();
    assert_eq!(recording.releases, 1);
    assert_eq!(recording.resources.invalid_deletes, 0);
    assert!(recording.resources.all_released());
}

#[test]
fn dropping_the_background_releases_everything() {
    let surface = surface();
    {
        let mut background = start(&surface, PatternKind::Veil);
        run_frames(&mut background, 2);
    }
    let recording = surface.recording();
    assert_eq!(recording.releases, 1);
    assert!(recording.resources.all_released());
}

#[test]
fn cancel_between_frames_prevents_later_draws() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    run_frames(&mut background, 4);
    background.cancel();

    assert_eq!(background.state(), LoopState::Stopped);
    assert_eq!(background.scheduler().pending(), 0);
    assert_eq!(run_frames(&mut background, 10), 0);
    assert_eq!(surface.recording().draws.len(), 5);
}

#[test]
fn restart_after_cancel_keeps_counting_time() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    run_frames(&mut background, 1);
    background.cancel();
    background.start().expect("restart");

    assert!(background.is_running());
    assert_eq!(background.time(), 3.0 * FIXED_DELTA);
}

#[test]
fn second_start_is_rejected() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    assert!(matches!(background.start(), Err(PipelineError::DoubleStart)));
    assert!(background.is_running());
}

#[test]
fn resize_sets_the_exact_viewport() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);

    let applied = background.handle_resize(Some(Viewport::new(333, 777)));
    assert_eq!(applied, Some(Viewport::new(333, 777)));
    run_frames(&mut background, 3);

    assert_eq!(background.viewport(), Viewport::new(333, 777));
    let recording = surface.recording();
    assert!(recording.draws[1..]
        .iter()
        .all(|draw| draw.viewport == Viewport::new(333, 777)));
}

#[test]
fn resize_without_size_queries_the_surface() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Veil);
    surface.set_size(Viewport::new(1920, 1080));

    assert_eq!(background.handle_resize(None), Some(Viewport::new(1920, 1080)));
    assert!((background.aspect() - 16.0 / 9.0).abs() < 1e-6);
}

#[test]
fn zero_line_count_uploads_zero_and_draws_no_lines() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    background.set_param("lineCount", 0.0).unwrap();
    run_frames(&mut background, 1);

    let count = surface.recording().last_draw().unwrap().uniforms["uLineCount"];
    assert_eq!(count, 0.0);
    assert_eq!(FloatingLines::active_lines(count), 0);
}

#[test]
fn incremental_update_is_visible_on_next_frame_without_rebuild() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Veil);

    let mut config = *background.config();
    config.set("hueShift", 0.25).unwrap();
    let outcome = background.apply(PipelineUpdate::Params(config)).unwrap();
    assert_eq!(outcome, UpdateOutcome::ParamsUpdated);

    background.params_mut().set("speed", 2.0).unwrap();
    run_frames(&mut background, 1);

    let recording = surface.recording();
    let draw = recording.last_draw().unwrap();
    assert_eq!(draw.uniforms["uHueShift"], 0.25);
    assert_eq!(draw.uniforms["uSpeed"], 2.0);
    assert_eq!(recording.contexts_created, 1);
    assert_eq!(background.builds(), 1);
}

#[test]
fn switching_variant_through_params_mut_reports_unknown_uniform() {
    let surface = surface();
    let mut background = start(&surface, PatternKind::Lines);
    *background.params_mut() = RenderConfig::defaults_for(PatternKind::Veil);

    let err = background.tick().unwrap_err();
    assert!(matches!(err, PipelineError::UnknownUniform(_)));
    assert!(err.is_programmer_error());
    assert_eq!(background.state(), LoopState::Stopped);
}

#[test]
fn declarative_rebuild_recreates_resources_once() {
    let first = surface();
    let mut background = start(&first, PatternKind::Lines);
    run_frames(&mut background, 10);

    let second = HeadlessSurface::new(Viewport::new(200, 100));
    let outcome = background
        .apply(PipelineUpdate::Rebuild {
            surface: second.clone(),
            config: RenderConfig::defaults_for(PatternKind::Veil),
        })
        .unwrap();

    assert_eq!(outcome, UpdateOutcome::Rebuilt);
    assert_eq!(background.builds(), 2);
    assert_eq!(background.pattern(), PatternKind::Veil);
    assert_eq!(background.frames_drawn(), 1);
    assert_eq!(background.time(), FIXED_DELTA);

    let old = first.recording();
    assert_eq!(old.releases, 1);
    assert!(old.resources.all_released());

    let new = second.recording();
    assert_eq!(new.contexts_created, 1);
    assert_eq!(new.draws.len(), 1);
    assert_eq!(new.viewport, Viewport::new(200, 100));
}

#[test]
fn missing_context_makes_try_init_a_noop() {
    let surface = HeadlessSurface::unsupported(Viewport::new(64, 64));
    let background = Background::try_init(
        surface.clone(),
        RenderConfig::defaults_for(PatternKind::Lines),
        BackgroundOptions::default(),
        ManualTicker::new(),
    )
    .unwrap();
    assert!(background.is_none());

    let err = Background::init(
        surface,
        RenderConfig::defaults_for(PatternKind::Lines),
        BackgroundOptions::default(),
        ManualTicker::new(),
    )
    .err()
    .unwrap();
    assert!(matches!(err, PipelineError::ContextUnavailable { .. }));
}

const BROKEN_FRAGMENT: &str = "#version 450
layout(location = 0) out vec4 color;
void main() { color = vec4(missing); }
";

#[test]
fn fail_fast_reports_the_compile_log() {
    let surface = surface();
    let mut context = ContextManager::acquire(&surface).unwrap();
    let mut builder = ShaderProgramBuilder::new(ShaderFailurePolicy::FailFast);
    let err = builder
        .build(context.gl_mut(), VERTEX_SHADER, BROKEN_FRAGMENT, &["uTime"])
        .err()
        .unwrap();

    match err {
        PipelineError::ShaderCompile { stage, log } => {
            assert_eq!(stage.to_string(), "fragment");
            assert!(!log.is_empty());
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(surface.recording().resources.live_shaders(), 0);
}

#[test]
fn continue_policy_keeps_going_and_skips_draws() {
    let surface = surface();
    let mut context = ContextManager::acquire(&surface).unwrap();
    let mut builder = ShaderProgramBuilder::new(ShaderFailurePolicy::Continue);
    let program = builder
        .build(context.gl_mut(), VERTEX_SHADER, BROKEN_FRAGMENT, &["uTime"])
        .expect("continue returns a program");

    assert!(!program.is_linked());
    assert!(!program.diagnostics().is_clean());

    let gl = context.gl_mut();
    gl.use_program(program.handle());
    program.set_uniform(gl, "uTime", 1.0).unwrap();
    gl.draw_indexed(6);

    let recording = surface.recording();
    assert!(recording.draws.is_empty());
    assert_eq!(recording.skipped_draws, 1);
}
