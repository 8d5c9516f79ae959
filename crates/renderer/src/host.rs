use crate::types::{
    BufferHandle, BufferTarget, ProgramHandle, Rgba, ShaderHandle, ShaderStage, UniformLocation,
    Viewport,
};

/// Drawing-context operations the background pipeline relies on.
///
/// The surface is modelled on an immediate-mode GL context: objects are
/// referenced through opaque handles, compile and link failures are reported
/// through status queries plus info logs instead of `Result`s, and vertex
/// attributes and index buffers are bound to the program that draws them.
pub trait GraphicsContext {
    /// Source-over blending (`src_alpha`, `one_minus_src_alpha`).
    fn enable_alpha_blending(&mut self);
    fn set_clear_color(&mut self, color: Rgba);
    fn set_viewport(&mut self, viewport: Viewport);

    /// Compiles a stage. The handle is returned even when compilation fails.
    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> ShaderHandle;
    fn shader_compiled(&self, shader: ShaderHandle) -> bool;
    fn shader_info_log(&self, shader: ShaderHandle) -> String;

    /// Links two stages. The handle is returned even when linking fails.
    fn create_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle;
    fn program_linked(&self, program: ProgramHandle) -> bool;
    fn program_info_log(&self, program: ProgramHandle) -> String;
    fn use_program(&mut self, program: ProgramHandle);

    /// `None` when the program has no active uniform called `name`.
    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;
    /// `None` when the program has no active attribute called `name`.
    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32>;

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> anyhow::Result<BufferHandle>;
    fn bind_vertex_attribute(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        components: u32,
    );
    fn bind_index_buffer(&mut self, program: ProgramHandle, buffer: BufferHandle);

    /// Writes a uniform of the program currently in use.
    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32);

    /// Clears the drawing buffer to the clear colour before the next draw.
    fn clear(&mut self);
    /// Draws `index_count` indices as triangles with the program in use.
    fn draw_indexed(&mut self, index_count: u32);

    fn delete_shader(&mut self, shader: ShaderHandle);
    fn delete_program(&mut self, program: ProgramHandle);
    fn delete_buffer(&mut self, buffer: BufferHandle);

    /// Releases the surface resources the context created.
    fn release(&mut self);
}

/// Host object a drawing context can be created for.
pub trait RenderSurface {
    type Context: GraphicsContext;

    /// Current drawable size in device pixels.
    fn size(&self) -> Viewport;

    /// Creates a context bound to this surface. Failure means the host offers
    /// no compatible graphics API.
    fn create_context(&self) -> anyhow::Result<Self::Context>;
}
