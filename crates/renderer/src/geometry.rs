use tracing::{debug, warn};

use crate::compile::CompiledProgram;
use crate::error::PipelineError;
use crate::host::GraphicsContext;
use crate::types::{BufferHandle, BufferTarget};

/// Clip-space corners of the full-screen quad, counter-clockwise from
/// bottom-left.
pub const QUAD_POSITIONS: [f32; 12] = [
    -1.0, -1.0, 0.0, //
    1.0, -1.0, 0.0, //
    1.0, 1.0, 0.0, //
    -1.0, 1.0, 0.0,
];

pub const QUAD_UVS: [f32; 8] = [
    0.0, 0.0, //
    1.0, 0.0, //
    1.0, 1.0, //
    0.0, 1.0,
];

pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

pub const POSITION_ATTRIBUTE: &str = "position";
pub const UV_ATTRIBUTE: &str = "uv";

/// Buffers backing an uploaded mesh.
#[derive(Debug)]
pub struct GeometryHandle {
    positions: BufferHandle,
    uvs: BufferHandle,
    indices: BufferHandle,
    vertex_count: u32,
    index_count: u32,
}

impl GeometryHandle {
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }

    pub fn buffers(&self) -> [BufferHandle; 3] {
        [self.positions, self.uvs, self.indices]
    }

    pub(crate) fn release<C: GraphicsContext>(self, gl: &mut C) {
        for buffer in self.buffers() {
            gl.delete_buffer(buffer);
        }
    }
}

/// Uploads static meshes and binds them to a program's attributes.
pub struct GeometryBuffer;

impl GeometryBuffer {
    /// Uploads the canonical full-screen quad.
    pub fn quad<C: GraphicsContext>(
        gl: &mut C,
        program: &CompiledProgram,
    ) -> Result<GeometryHandle, PipelineError> {
        Self::build(gl, program, &QUAD_POSITIONS, &QUAD_UVS, &QUAD_INDICES)
    }

    /// Uploads `vec3` positions, `vec2` UVs, and triangle indices.
    pub fn build<C: GraphicsContext>(
        gl: &mut C,
        program: &CompiledProgram,
        positions: &[f32],
        uvs: &[f32],
        indices: &[u16],
    ) -> Result<GeometryHandle, PipelineError> {
        let vertex_count = validate(positions, uvs, indices)?;

        let mut created = Vec::with_capacity(3);
        let uploads: [(BufferTarget, &[u8]); 3] = [
            (BufferTarget::Vertex, bytemuck::cast_slice(positions)),
            (BufferTarget::Vertex, bytemuck::cast_slice(uvs)),
            (BufferTarget::Index, bytemuck::cast_slice(indices)),
        ];
        for (target, bytes) in uploads {
            match gl.create_buffer(target, bytes) {
                Ok(buffer) => created.push(buffer),
                Err(err) => {
                    for buffer in created {
                        gl.delete_buffer(buffer);
                    }
                    return Err(PipelineError::GeometryAllocationFailed {
                        reason: format!("{err:#}"),
                    });
                }
            }
        }

        let handle = GeometryHandle {
            positions: created[0],
            uvs: created[1],
            indices: created[2],
            vertex_count,
            index_count: indices.len() as u32,
        };

        let program_handle = program.handle();
        for (name, buffer, components) in [
            (POSITION_ATTRIBUTE, handle.positions, 3),
            (UV_ATTRIBUTE, handle.uvs, 2),
        ] {
            match gl.attribute_location(program_handle, name) {
                Some(location) => {
                    gl.bind_vertex_attribute(program_handle, location, buffer, components)
                }
                None if program.is_linked() => {
                    warn!(attribute = name, "program has no such vertex attribute")
                }
                None => {}
            }
        }
        gl.bind_index_buffer(program_handle, handle.indices);

        debug!(
            vertices = handle.vertex_count,
            indices = handle.index_count,
            "uploaded geometry"
        );
        Ok(handle)
    }
}

fn validate(positions: &[f32], uvs: &[f32], indices: &[u16]) -> Result<u32, PipelineError> {
    if positions.is_empty() || positions.len() % 3 != 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "expected 3 floats per vertex position, got {} floats",
            positions.len()
        )));
    }
    let vertex_count = positions.len() / 3;
    if uvs.len() != vertex_count * 2 {
        return Err(PipelineError::InvalidGeometry(format!(
            "expected {} uv floats for {vertex_count} vertices, got {}",
            vertex_count * 2,
            uvs.len()
        )));
    }
    if indices.is_empty() || indices.len() % 3 != 0 {
        return Err(PipelineError::InvalidGeometry(format!(
            "index count {} does not describe whole triangles",
            indices.len()
        )));
    }
    if let Some(index) = indices.iter().find(|index| usize::from(**index) >= vertex_count) {
        return Err(PipelineError::InvalidGeometry(format!(
            "index {index} references a missing vertex (have {vertex_count})"
        )));
    }
    Ok(vertex_count as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::ShaderProgramBuilder;
    use crate::headless::{HeadlessContext, HeadlessSurface};
    use crate::host::RenderSurface;
    use crate::patterns::{DarkVeil, VERTEX_SHADER};
    use crate::types::Viewport;

    fn setup() -> (HeadlessSurface, HeadlessContext, CompiledProgram) {
        let surface = HeadlessSurface::new(Viewport::new(32, 32));
        let mut gl = surface.create_context().unwrap();
        let program = ShaderProgramBuilder::default()
            .build(&mut gl, VERTEX_SHADER, DarkVeil::FRAGMENT_SHADER, &[])
            .unwrap();
        (surface, gl, program)
    }

    #[test]
    fn quad_uploads_four_vertices_and_six_indices() {
        let (surface, mut gl, program) = setup();
        let geometry = GeometryBuffer::quad(&mut gl, &program).expect("quad");
        assert_eq!(geometry.vertex_count(), 4);
        assert_eq!(geometry.index_count(), 6);

        let recording = surface.recording();
        assert_eq!(recording.resources.live_buffers(), 3);
        let [positions, uvs, indices] = geometry.buffers();
        assert_eq!(recording.buffer_f32(positions), Some(QUAD_POSITIONS.to_vec()));
        assert_eq!(recording.buffer_f32(uvs), Some(QUAD_UVS.to_vec()));
        assert_eq!(recording.buffer_u16(indices), Some(QUAD_INDICES.to_vec()));
    }

    #[test]
    fn rejects_mismatched_attribute_lengths() {
        let (_surface, mut gl, program) = setup();
        let uvs = [0.0; 6];
        let err = GeometryBuffer::build(&mut gl, &program, &QUAD_POSITIONS, &uvs, &QUAD_INDICES)
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry(_)));
    }

    #[test]
    fn rejects_out_of_range_indices() {
        let (_surface, mut gl, program) = setup();
        let err = GeometryBuffer::build(&mut gl, &program, &QUAD_POSITIONS, &QUAD_UVS, &[0, 1, 4])
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidGeometry(_)));
    }

    #[test]
    fn allocation_failure_releases_partial_uploads() {
        let (surface, mut gl, program) = setup();
        surface.fail_allocations_after(1);
        let err = GeometryBuffer::quad(&mut gl, &program).unwrap_err();
        assert!(matches!(err, PipelineError::GeometryAllocationFailed { .. }));
        assert_eq!(surface.recording().resources.live_buffers(), 0);
    }
}
