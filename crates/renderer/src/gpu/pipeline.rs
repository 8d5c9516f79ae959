pub(crate) fn uniform_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

/// One vertex buffer per attribute, tightly packed `f32` components.
pub(crate) struct VertexLayouts {
    attributes: Vec<[wgpu::VertexAttribute; 1]>,
    strides: Vec<u64>,
}

impl VertexLayouts {
    pub fn new(bindings: impl IntoIterator<Item = (u32, u32)>) -> Self {
        let mut attributes = Vec::new();
        let mut strides = Vec::new();
        for (location, components) in bindings {
            let format = match components {
                1 => wgpu::VertexFormat::Float32,
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                _ => wgpu::VertexFormat::Float32x4,
            };
            attributes.push([wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: location,
            }]);
            strides.push(format.size());
        }
        Self {
            attributes,
            strides,
        }
    }

    pub fn layouts(&self) -> Vec<wgpu::VertexBufferLayout<'_>> {
        self.attributes
            .iter()
            .zip(&self.strides)
            .map(|(attributes, stride)| wgpu::VertexBufferLayout {
                array_stride: *stride,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect()
    }
}

pub(crate) struct PipelineParts<'a> {
    pub layout: &'a wgpu::PipelineLayout,
    pub vertex: &'a wgpu::ShaderModule,
    pub fragment: &'a wgpu::ShaderModule,
    pub vertex_layouts: &'a VertexLayouts,
    pub format: wgpu::TextureFormat,
    pub blend: Option<wgpu::BlendState>,
}

pub(crate) fn build_render_pipeline(
    device: &wgpu::Device,
    parts: PipelineParts<'_>,
) -> wgpu::RenderPipeline {
    let buffers = parts.vertex_layouts.layouts();
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("background pipeline"),
        layout: Some(parts.layout),
        vertex: wgpu::VertexState {
            module: parts.vertex,
            entry_point: Some("main"),
            buffers: &buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        fragment: Some(wgpu::FragmentState {
            module: parts.fragment,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: parts.format,
                blend: parts.blend,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layouts_pack_each_attribute_separately() {
        let layouts = VertexLayouts::new([(0, 3), (1, 2)]);
        let buffers = layouts.layouts();
        assert_eq!(buffers.len(), 2);
        assert_eq!(buffers[0].array_stride, 12);
        assert_eq!(buffers[1].array_stride, 8);
        assert_eq!(buffers[1].attributes[0].shader_location, 1);
        assert_eq!(buffers[1].attributes[0].format, wgpu::VertexFormat::Float32x2);
    }
}
