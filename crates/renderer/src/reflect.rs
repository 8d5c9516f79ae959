//! GLSL front-end shared by every [`GraphicsContext`](crate::GraphicsContext).
//!
//! Sources go through naga's GLSL parser and validator, the same path `wgpu`
//! takes when it builds a shader module, so a shader that compiles here
//! compiles on the GPU host as well. Reflection pulls out the uniform block
//! layout and the `layout(location = N)` interface of each stage.

use std::collections::BTreeMap;

use wgpu::naga;

use crate::types::ShaderStage;

/// One `float` member of a stage's uniform block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct UniformMember {
    pub name: String,
    pub offset: u32,
}

/// A `layout(location = N) in|out <type> <name>;` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct InterfaceVar {
    pub location: u32,
    pub name: String,
    pub components: u32,
}

/// What a successfully compiled stage exposes.
#[derive(Debug, Clone, Default)]
pub(crate) struct StageInterface {
    pub inputs: Vec<InterfaceVar>,
    pub outputs: Vec<InterfaceVar>,
    pub uniforms: Vec<UniformMember>,
    pub uniform_block_size: u32,
}

/// Interface of a linked program.
#[derive(Debug, Clone, Default)]
pub(crate) struct ProgramInterface {
    pub attributes: Vec<InterfaceVar>,
    pub uniforms: BTreeMap<String, u32>,
    pub uniform_block_size: u32,
}

impl ProgramInterface {
    pub fn attribute(&self, name: &str) -> Option<&InterfaceVar> {
        self.attributes.iter().find(|attr| attr.name == name)
    }
}

/// Parses and validates `source`; the error is a human-readable compiler log.
pub(crate) fn compile_stage(stage: ShaderStage, source: &str) -> Result<StageInterface, String> {
    let mut frontend = naga::front::glsl::Frontend::default();
    let options = naga::front::glsl::Options::from(stage.to_naga());
    let module = frontend
        .parse(&options, source)
        .map_err(|errors| errors.emit_to_string(source))?;

    let mut validator = naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::default(),
    );
    validator
        .validate(&module)
        .map_err(|err| err.emit_to_string(source))?;

    let (uniforms, uniform_block_size) = uniform_members(&module);
    let (inputs, outputs) = interface_vars(&module);
    Ok(StageInterface {
        inputs,
        outputs,
        uniforms,
        uniform_block_size,
    })
}

/// Checks that the stages fit together and merges their interfaces.
pub(crate) fn link(
    vertex: &StageInterface,
    fragment: &StageInterface,
) -> Result<ProgramInterface, String> {
    let mut problems = Vec::new();
    for input in &fragment.inputs {
        match vertex
            .outputs
            .iter()
            .find(|output| output.location == input.location)
        {
            Some(output) if output.components == input.components => {}
            Some(output) => problems.push(format!(
                "fragment input '{}' at location {} has {} components but vertex output '{}' has {}",
                input.name, input.location, input.components, output.name, output.components
            )),
            None => problems.push(format!(
                "fragment input '{}' at location {} is not written by the vertex stage",
                input.name, input.location
            )),
        }
    }

    let mut uniforms = BTreeMap::new();
    for member in vertex.uniforms.iter().chain(&fragment.uniforms) {
        match uniforms.get(&member.name) {
            Some(offset) if *offset != member.offset => problems.push(format!(
                "uniform '{}' has conflicting offsets {} and {}",
                member.name, offset, member.offset
            )),
            Some(_) => {}
            None => {
                uniforms.insert(member.name.clone(), member.offset);
            }
        }
    }

    if !problems.is_empty() {
        return Err(problems.join("\n"));
    }

    Ok(ProgramInterface {
        attributes: vertex.inputs.clone(),
        uniforms,
        uniform_block_size: vertex.uniform_block_size.max(fragment.uniform_block_size),
    })
}

fn uniform_members(module: &naga::Module) -> (Vec<UniformMember>, u32) {
    let mut members = Vec::new();
    let mut size = 0;
    for (_, var) in module.global_variables.iter() {
        if var.space != naga::AddressSpace::Uniform {
            continue;
        }
        if let naga::TypeInner::Struct {
            members: fields,
            span,
        } = &module.types[var.ty].inner
        {
            size = size.max(*span);
            for field in fields {
                let is_float = matches!(
                    module.types[field.ty].inner,
                    naga::TypeInner::Scalar(scalar) if scalar == naga::Scalar::F32
                );
                if let (true, Some(name)) = (is_float, field.name.as_ref()) {
                    members.push(UniformMember {
                        name: name.clone(),
                        offset: field.offset,
                    });
                }
            }
        }
    }
    // Uniform buffers bind in 16-byte granules.
    (members, size.div_ceil(16) * 16)
}

/// Location-bound inputs and outputs of the module's entry point, ordered by
/// location. Built-ins such as `gl_Position` are skipped.
fn interface_vars(module: &naga::Module) -> (Vec<InterfaceVar>, Vec<InterfaceVar>) {
    let Some(entry) = module.entry_points.first() else {
        return (Vec::new(), Vec::new());
    };
    let function = &entry.function;

    let mut inputs: Vec<_> = function
        .arguments
        .iter()
        .filter_map(|arg| located_var(module, arg.name.as_deref(), arg.binding.as_ref(), arg.ty))
        .collect();

    let mut outputs = Vec::new();
    if let Some(result) = &function.result {
        match &module.types[result.ty].inner {
            naga::TypeInner::Struct { members, .. } => outputs.extend(members.iter().filter_map(
                |member| {
                    located_var(module, member.name.as_deref(), member.binding.as_ref(), member.ty)
                },
            )),
            _ => outputs.extend(located_var(module, None, result.binding.as_ref(), result.ty)),
        }
    }

    inputs.sort_by_key(|var| var.location);
    outputs.sort_by_key(|var| var.location);
    (inputs, outputs)
}

fn located_var(
    module: &naga::Module,
    name: Option<&str>,
    binding: Option<&naga::Binding>,
    ty: naga::Handle<naga::Type>,
) -> Option<InterfaceVar> {
    let naga::Binding::Location { location, .. } = binding? else {
        return None;
    };
    let components = match module.types[ty].inner {
        naga::TypeInner::Scalar(_) => 1,
        naga::TypeInner::Vector { size, .. } => size as u32,
        _ => return None,
    };
    Some(InterfaceVar {
        location: *location,
        name: name.unwrap_or_default().to_string(),
        components,
    })
}

#[cfg(test)]
mod tests {
    use bgconfig::{PatternKind, RenderConfig};

    use super::*;
    use crate::patterns::{shaders_for, VERTEX_SHADER};

    #[test]
    fn vertex_shader_exposes_position_and_uv() {
        let interface = compile_stage(ShaderStage::Vertex, VERTEX_SHADER).expect("compile");
        assert_eq!(
            interface.inputs,
            vec![
                InterfaceVar {
                    location: 0,
                    name: "position".into(),
                    components: 3
                },
                InterfaceVar {
                    location: 1,
                    name: "uv".into(),
                    components: 2
                },
            ]
        );
        assert_eq!(interface.outputs.len(), 1);
        assert!(interface.uniforms.is_empty());
    }

    #[test]
    fn pattern_programs_compile_and_link() {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX_SHADER).unwrap();
        for kind in [PatternKind::Lines, PatternKind::Veil] {
            let fragment = compile_stage(ShaderStage::Fragment, shaders_for(kind).fragment)
                .unwrap_or_else(|log| panic!("{kind} failed to compile:\n{log}"));
            let program = link(&vertex, &fragment).expect("link");
            let names = RenderConfig::defaults_for(kind).uniform_names();
            assert_eq!(program.uniforms.len(), names.len());
            assert_eq!(program.uniforms.get("uTime"), Some(&0));
            assert_eq!(program.uniform_block_size % 16, 0);
            assert!(program.uniform_block_size >= 4 * names.len() as u32);
        }
    }

    #[test]
    fn syntax_errors_produce_a_log() {
        let log = compile_stage(ShaderStage::Fragment, "#version 450\nvoid main() { oops }")
            .unwrap_err();
        assert!(!log.is_empty());
    }

    #[test]
    fn link_reports_unmatched_varyings() {
        let vertex = compile_stage(ShaderStage::Vertex, VERTEX_SHADER).unwrap();
        let fragment = StageInterface {
            inputs: vec![InterfaceVar {
                location: 3,
                name: "vColor".into(),
                components: 4,
            }],
            ..StageInterface::default()
        };
        let log = link(&vertex, &fragment).unwrap_err();
        assert!(log.contains("vColor"));
    }

    #[test]
    fn interface_ignores_precision_qualifiers_and_comments() {
        let source = r#"#version 450
layout(location = 1) in /* texture coordinates */ vec2 uv;
layout(location = 0) in highp vec3 position;
layout(location = 0) out mediump vec2 vUv;
layout(location = 2) flat out float tint;

void main() {
    vUv = uv;
    tint = 1.0;
    gl_Position = vec4(position, 1.0);
}
"#;
        let interface = compile_stage(ShaderStage::Vertex, source).expect("compile");
        let inputs: Vec<_> = interface
            .inputs
            .iter()
            .map(|var| (var.location, var.name.as_str(), var.components))
            .collect();
        assert_eq!(inputs, vec![(0, "position", 3), (1, "uv", 2)]);
        let outputs: Vec<_> = interface
            .outputs
            .iter()
            .map(|var| (var.location, var.name.as_str(), var.components))
            .collect();
        assert_eq!(outputs, vec![(0, "vUv", 2), (2, "tint", 1)]);
    }
}
