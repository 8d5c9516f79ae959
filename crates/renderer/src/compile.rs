use std::collections::HashMap;

use tracing::{debug, error, trace};

use crate::error::PipelineError;
use crate::host::GraphicsContext;
use crate::types::{ProgramHandle, ShaderFailurePolicy, ShaderHandle, ShaderStage, UniformLocation};

/// Compiler and linker logs collected while building a program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramDiagnostics {
    pub vertex_log: Option<String>,
    pub fragment_log: Option<String>,
    pub link_log: Option<String>,
}

impl ProgramDiagnostics {
    pub fn is_clean(&self) -> bool {
        self.vertex_log.is_none() && self.fragment_log.is_none() && self.link_log.is_none()
    }

    fn record_compile(&mut self, stage: ShaderStage, log: String) {
        match stage {
            ShaderStage::Vertex => self.vertex_log = Some(log),
            ShaderStage::Fragment => self.fragment_log = Some(log),
        }
    }
}

/// A linked program and the uniform locations resolved for it.
///
/// Names passed to [`ShaderProgramBuilder::resolve_uniforms`] map to
/// `Some(location)` when the program exposes them and to `None` when it does
/// not; writing a `None` entry is a silent no-op. Names that were never
/// resolved are rejected with [`PipelineError::UnknownUniform`].
#[derive(Debug)]
pub struct CompiledProgram {
    handle: ProgramHandle,
    linked: bool,
    uniforms: HashMap<String, Option<UniformLocation>>,
    diagnostics: ProgramDiagnostics,
}

impl CompiledProgram {
    pub fn handle(&self) -> ProgramHandle {
        self.handle
    }

    pub fn is_linked(&self) -> bool {
        self.linked
    }

    pub fn diagnostics(&self) -> &ProgramDiagnostics {
        &self.diagnostics
    }

    /// Cached location for `name`.
    pub fn location(&self, name: &str) -> Result<Option<UniformLocation>, PipelineError> {
        self.uniforms
            .get(name)
            .copied()
            .ok_or_else(|| PipelineError::UnknownUniform(name.to_string()))
    }

    pub fn resolved_names(&self) -> impl Iterator<Item = &str> {
        self.uniforms.keys().map(String::as_str)
    }

    /// Uploads one `float` uniform. The program must be in use.
    pub fn set_uniform<C: GraphicsContext>(
        &self,
        gl: &mut C,
        name: &str,
        value: f32,
    ) -> Result<(), PipelineError> {
        match self.location(name)? {
            Some(location) => gl.set_uniform_f32(location, value),
            None => trace!(uniform = name, "skipping inactive uniform"),
        }
        Ok(())
    }

    pub(crate) fn delete<C: GraphicsContext>(self, gl: &mut C) {
        gl.delete_program(self.handle);
    }
}

/// Compiles shader stages into a [`CompiledProgram`].
#[derive(Debug, Clone, Default)]
pub struct ShaderProgramBuilder {
    policy: ShaderFailurePolicy,
    diagnostics: ProgramDiagnostics,
}

impl ShaderProgramBuilder {
    pub fn new(policy: ShaderFailurePolicy) -> Self {
        Self {
            policy,
            diagnostics: ProgramDiagnostics::default(),
        }
    }

    pub fn policy(&self) -> ShaderFailurePolicy {
        self.policy
    }

    /// Compiles one stage.
    ///
    /// Under [`ShaderFailurePolicy::Continue`] a failed compile is logged and
    /// the handle to the invalid shader is still returned.
    pub fn compile_stage<C: GraphicsContext>(
        &mut self,
        gl: &mut C,
        source: &str,
        stage: ShaderStage,
    ) -> Result<ShaderHandle, PipelineError> {
        let shader = gl.create_shader(stage, source);
        if gl.shader_compiled(shader) {
            debug!(%stage, "compiled shader stage");
            return Ok(shader);
        }

        let log = gl.shader_info_log(shader);
        self.diagnostics.record_compile(stage, log.clone());
        match self.policy {
            ShaderFailurePolicy::FailFast => {
                gl.delete_shader(shader);
                Err(PipelineError::ShaderCompile { stage, log })
            }
            ShaderFailurePolicy::Continue => {
                error!(%stage, "shader compile error:\n{log}");
                Ok(shader)
            }
        }
    }

    /// Links both stages and deletes the intermediate shader objects.
    pub fn link<C: GraphicsContext>(
        &mut self,
        gl: &mut C,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<CompiledProgram, PipelineError> {
        let handle = gl.create_program(vertex, fragment);
        gl.delete_shader(vertex);
        gl.delete_shader(fragment);

        let linked = gl.program_linked(handle);
        if !linked {
            let log = gl.program_info_log(handle);
            self.diagnostics.link_log = Some(log.clone());
            match self.policy {
                ShaderFailurePolicy::FailFast => {
                    gl.delete_program(handle);
                    return Err(PipelineError::ProgramLink { log });
                }
                ShaderFailurePolicy::Continue => error!("program link error:\n{log}"),
            }
        }

        Ok(CompiledProgram {
            handle,
            linked,
            uniforms: HashMap::new(),
            diagnostics: std::mem::take(&mut self.diagnostics),
        })
    }

    /// Queries each name once and caches the result on `program`.
    pub fn resolve_uniforms<C: GraphicsContext>(
        &self,
        gl: &C,
        program: &mut CompiledProgram,
        names: &[&str],
    ) {
        for name in names {
            let location = gl.uniform_location(program.handle, name);
            if location.is_none() && program.linked {
                debug!(uniform = *name, "uniform is not active in program");
            }
            program.uniforms.insert((*name).to_string(), location);
        }
    }

    /// Compiles, links, and resolves `uniforms` in one go.
    pub fn build<C: GraphicsContext>(
        &mut self,
        gl: &mut C,
        vertex_source: &str,
        fragment_source: &str,
        uniforms: &[&str],
    ) -> Result<CompiledProgram, PipelineError> {
        let vertex = self.compile_stage(gl, vertex_source, ShaderStage::Vertex)?;
        let fragment = match self.compile_stage(gl, fragment_source, ShaderStage::Fragment) {
            Ok(fragment) => fragment,
            Err(err) => {
                gl.delete_shader(vertex);
                return Err(err);
            }
        };
        let mut program = self.link(gl, vertex, fragment)?;
        self.resolve_uniforms(gl, &mut program, uniforms);
        Ok(program)
    }
}
