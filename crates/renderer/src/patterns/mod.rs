//! Embedded GLSL programs for every [`PatternKind`].
//!
//! All patterns share [`VERTEX_SHADER`], which forwards the quad's UVs to the
//! fragment stage. Fragment shaders read their parameters from a single
//! std140 uniform block at `set = 0, binding = 0` whose member names match
//! [`bgconfig::RenderConfig::uniform_names`].

mod lines;
mod veil;

use bgconfig::PatternKind;

pub use lines::FloatingLines;
pub use veil::DarkVeil;

/// Pass-through vertex stage: clip-space position in, UV out.
pub const VERTEX_SHADER: &str = r#"#version 450
layout(location = 0) in vec3 position;
layout(location = 1) in vec2 uv;

layout(location = 0) out vec2 vUv;

void main() {
    vUv = uv;
    gl_Position = vec4(position, 1.0);
}
"#;

/// Vertex and fragment source for one pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternShaders {
    pub vertex: &'static str,
    pub fragment: &'static str,
}

pub fn shaders_for(kind: PatternKind) -> PatternShaders {
    let fragment = match kind {
        PatternKind::Lines => FloatingLines::FRAGMENT_SHADER,
        PatternKind::Veil => DarkVeil::FRAGMENT_SHADER,
    };
    PatternShaders {
        vertex: VERTEX_SHADER,
        fragment,
    }
}
