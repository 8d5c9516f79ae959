use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::{debug, error, trace, warn};
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::host::GraphicsContext;
use crate::reflect::{self, ProgramInterface, StageInterface};
use crate::types::{
    BufferHandle, BufferTarget, GpuPowerPreference, ProgramHandle, Rgba, ShaderHandle, ShaderStage,
    UniformLocation, Viewport,
};

use super::context::GpuContext;
use super::pipeline::{build_render_pipeline, uniform_layout, PipelineParts, VertexLayouts};

struct GpuShader {
    stage: ShaderStage,
    compiled: Result<(StageInterface, wgpu::ShaderModule), String>,
}

struct LinkedProgram {
    interface: ProgramInterface,
    vertex: wgpu::ShaderModule,
    fragment: wgpu::ShaderModule,
    layout: wgpu::PipelineLayout,
    uniforms: Option<UniformBlock>,
    attributes: BTreeMap<u32, (BufferHandle, u32)>,
    index_buffer: Option<BufferHandle>,
    pipeline: Option<wgpu::RenderPipeline>,
    pipeline_failed: bool,
}

struct UniformBlock {
    staging: Vec<u8>,
    dirty: bool,
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
    target: BufferTarget,
}

/// [`GraphicsContext`] backed by a wgpu device and a window swapchain.
///
/// Uniform writes land in a CPU-side copy of the program's uniform block and
/// are flushed with `Queue::write_buffer` right before a draw. Render
/// pipelines are built lazily on the first draw after the vertex bindings
/// change. Every draw acquires, renders, and presents one swapchain frame.
pub struct WgpuContext {
    gpu: GpuContext,
    uniform_layout: wgpu::BindGroupLayout,
    viewport: Viewport,
    blend: Option<wgpu::BlendState>,
    clear_color: wgpu::Color,
    clear_pending: bool,
    shaders: HashMap<ShaderHandle, GpuShader>,
    programs: HashMap<ProgramHandle, Result<LinkedProgram, String>>,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    next_id: u32,
    current: Option<ProgramHandle>,
    frames_presented: u64,
    released: bool,
}

impl WgpuContext {
    pub(crate) fn new(
        window: Arc<Window>,
        size: Viewport,
        gpu_power: GpuPowerPreference,
    ) -> Result<Self> {
        let gpu = GpuContext::new(window, size, gpu_power)?;
        let uniform_layout = uniform_layout(&gpu.device);
        Ok(Self {
            gpu,
            uniform_layout,
            viewport: size,
            blend: None,
            clear_color: wgpu::Color::TRANSPARENT,
            clear_pending: false,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 0,
            current: None,
            frames_presented: 0,
            released: false,
        })
    }

    pub fn frames_presented(&self) -> u64 {
        self.frames_presented
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn with_error_scope<T>(
        &self,
        filter: wgpu::ErrorFilter,
        build: impl FnOnce() -> T,
    ) -> Result<T> {
        self.gpu.device.push_error_scope(filter);
        let value = build();
        match pollster::block_on(self.gpu.device.pop_error_scope()) {
            Some(err) => Err(anyhow!("{err}")),
            None => Ok(value),
        }
    }

    fn compile(
        &self,
        stage: ShaderStage,
        source: &str,
    ) -> Result<(StageInterface, wgpu::ShaderModule), String> {
        let interface = reflect::compile_stage(stage, source)?;
        let module = self
            .with_error_scope(wgpu::ErrorFilter::Validation, || {
                self.gpu
                    .device
                    .create_shader_module(wgpu::ShaderModuleDescriptor {
                        label: Some("background shader"),
                        source: wgpu::ShaderSource::Glsl {
                            shader: Cow::Owned(source.to_string()),
                            stage: stage.to_naga(),
                            defines: &[],
                        },
                    })
            })
            .map_err(|err| format!("{err:#}"))?;
        Ok((interface, module))
    }

    fn stage(
        &self,
        handle: ShaderHandle,
        expected: ShaderStage,
    ) -> Result<&(StageInterface, wgpu::ShaderModule), String> {
        let shader = self
            .shaders
            .get(&handle)
            .ok_or_else(|| format!("{expected} shader handle {} is not valid", handle.raw()))?;
        if shader.stage != expected {
            return Err(format!(
                "shader {} is a {} shader, expected {expected}",
                handle.raw(),
                shader.stage
            ));
        }
        shader
            .compiled
            .as_ref()
            .map_err(|_| format!("{expected} shader did not compile"))
    }

    fn link(&self, vertex: ShaderHandle, fragment: ShaderHandle) -> Result<LinkedProgram, String> {
        let (vertex_interface, vertex_module) = self.stage(vertex, ShaderStage::Vertex)?;
        let (fragment_interface, fragment_module) = self.stage(fragment, ShaderStage::Fragment)?;
        let interface = reflect::link(vertex_interface, fragment_interface)?;

        let device = &self.gpu.device;
        let uniforms = (interface.uniform_block_size > 0).then(|| {
            let size = interface.uniform_block_size as usize;
            let buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("uniform buffer"),
                size: size as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("uniform bind group"),
                layout: &self.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
            UniformBlock {
                staging: vec![0; size],
                dirty: true,
                buffer,
                bind_group,
            }
        });

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> = if uniforms.is_some() {
            vec![&self.uniform_layout]
        } else {
            Vec::new()
        };
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("background pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            push_constant_ranges: &[],
        });

        Ok(LinkedProgram {
            interface,
            vertex: vertex_module.clone(),
            fragment: fragment_module.clone(),
            layout,
            uniforms,
            attributes: BTreeMap::new(),
            index_buffer: None,
            pipeline: None,
            pipeline_failed: false,
        })
    }

    fn linked(&self, program: ProgramHandle) -> Option<&LinkedProgram> {
        self.programs.get(&program)?.as_ref().ok()
    }

    fn linked_mut(&mut self, program: ProgramHandle) -> Option<&mut LinkedProgram> {
        self.programs.get_mut(&program)?.as_mut().ok()
    }

    fn ensure_pipeline(&mut self, program: ProgramHandle) -> bool {
        let Some(linked) = self.linked(program) else {
            return false;
        };
        if linked.pipeline.is_some() {
            return true;
        }
        if linked.pipeline_failed {
            return false;
        }

        let vertex_layouts = VertexLayouts::new(
            linked
                .attributes
                .iter()
                .map(|(location, (_, components))| (*location, *components)),
        );
        let built = self.with_error_scope(wgpu::ErrorFilter::Validation, || {
            build_render_pipeline(
                &self.gpu.device,
                PipelineParts {
                    layout: &linked.layout,
                    vertex: &linked.vertex,
                    fragment: &linked.fragment,
                    vertex_layouts: &vertex_layouts,
                    format: self.gpu.surface_format,
                    blend: self.blend,
                },
            )
        });

        let Some(linked) = self.linked_mut(program) else {
            return false;
        };
        match built {
            Ok(pipeline) => {
                debug!(program = program.raw(), "built render pipeline");
                linked.pipeline = Some(pipeline);
                true
            }
            Err(err) => {
                error!(program = program.raw(), "failed to build render pipeline: {err:#}");
                linked.pipeline_failed = true;
                false
            }
        }
    }

    fn invalidate_pipelines(&mut self) {
        for linked in self.programs.values_mut().filter_map(|program| program.as_mut().ok()) {
            linked.pipeline = None;
            linked.pipeline_failed = false;
        }
    }

    fn present(&mut self, program: ProgramHandle, index_count: u32) {
        let frame = match self.gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err @ (wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                debug!(error = %err, "surface needs reconfiguring; skipping frame");
                self.gpu.reconfigure();
                return;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                error!("surface out of memory; skipping frame");
                return;
            }
            Err(err) => {
                warn!(error = %err, "failed to acquire surface texture; retrying next frame");
                return;
            }
        };

        if let Some(Ok(linked)) = self.programs.get_mut(&program) {
            if let Some(block) = linked.uniforms.as_mut().filter(|block| block.dirty) {
                self.gpu.queue.write_buffer(&block.buffer, 0, &block.staging);
                block.dirty = false;
            }
        }
        let Some(linked) = self.linked(program) else {
            return;
        };
        let (Some(pipeline), Some(index)) = (
            linked.pipeline.as_ref(),
            linked
                .index_buffer
                .and_then(|handle| self.buffers.get(&handle)),
        ) else {
            return;
        };

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("background encoder"),
            });
        let load = if self.clear_pending {
            wgpu::LoadOp::Clear(self.clear_color)
        } else {
            wgpu::LoadOp::Load
        };
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("background pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let width = self.viewport.width.min(self.gpu.config.width);
            let height = self.viewport.height.min(self.gpu.config.height);
            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            render_pass.set_pipeline(pipeline);
            if let Some(block) = linked.uniforms.as_ref() {
                render_pass.set_bind_group(0, &block.bind_group, &[]);
            }
            for (slot, (buffer, _)) in linked.attributes.values().enumerate() {
                if let Some(vertex) = self.buffers.get(buffer) {
                    render_pass.set_vertex_buffer(slot as u32, vertex.buffer.slice(..));
                }
            }
            render_pass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint16);
            render_pass.draw_indexed(0..index_count, 0, 0..1);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        self.clear_pending = false;
        self.frames_presented += 1;
    }
}

impl GraphicsContext for WgpuContext {
    fn enable_alpha_blending(&mut self) {
        self.blend = Some(wgpu::BlendState::ALPHA_BLENDING);
        self.invalidate_pipelines();
    }

    fn set_clear_color(&mut self, color: Rgba) {
        self.clear_color = wgpu::Color {
            r: color.r as f64,
            g: color.g as f64,
            b: color.b as f64,
            a: color.a as f64,
        };
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.gpu.resize(viewport);
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> ShaderHandle {
        let handle = ShaderHandle(self.next_id());
        let compiled = self.compile(stage, source);
        self.shaders.insert(handle, GpuShader { stage, compiled });
        handle
    }

    fn shader_compiled(&self, shader: ShaderHandle) -> bool {
        self.shaders
            .get(&shader)
            .is_some_and(|object| object.compiled.is_ok())
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        match self.shaders.get(&shader).map(|object| &object.compiled) {
            Some(Err(log)) => log.clone(),
            Some(Ok(_)) => String::new(),
            None => format!("shader handle {} is not valid", shader.raw()),
        }
    }

    fn create_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle {
        let handle = ProgramHandle(self.next_id());
        let linked = self.link(vertex, fragment);
        self.programs.insert(handle, linked);
        handle
    }

    fn program_linked(&self, program: ProgramHandle) -> bool {
        self.linked(program).is_some()
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        match self.programs.get(&program) {
            Some(Err(log)) => log.clone(),
            Some(Ok(_)) => String::new(),
            None => format!("program handle {} is not valid", program.raw()),
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.linked(program)?
            .interface
            .uniforms
            .get(name)
            .map(|offset| UniformLocation(*offset))
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.linked(program)?
            .interface
            .attribute(name)
            .map(|attribute| attribute.location)
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> Result<BufferHandle> {
        let usage = match target {
            BufferTarget::Vertex => wgpu::BufferUsages::VERTEX,
            BufferTarget::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self.with_error_scope(wgpu::ErrorFilter::OutOfMemory, || {
            self.gpu
                .device
                .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("geometry buffer"),
                    contents: data,
                    usage,
                })
        })?;
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, GpuBuffer { buffer, target });
        Ok(handle)
    }

    fn bind_vertex_attribute(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        components: u32,
    ) {
        if !matches!(
            self.buffers.get(&buffer).map(|buffer| buffer.target),
            Some(BufferTarget::Vertex)
        ) {
            warn!(buffer = buffer.raw(), "not a vertex buffer");
            return;
        }
        if let Some(linked) = self.linked_mut(program) {
            linked.attributes.insert(location, (buffer, components));
            linked.pipeline = None;
            linked.pipeline_failed = false;
        }
    }

    fn bind_index_buffer(&mut self, program: ProgramHandle, buffer: BufferHandle) {
        if !matches!(
            self.buffers.get(&buffer).map(|buffer| buffer.target),
            Some(BufferTarget::Index)
        ) {
            warn!(buffer = buffer.raw(), "not an index buffer");
            return;
        }
        if let Some(linked) = self.linked_mut(program) {
            linked.index_buffer = Some(buffer);
        }
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        let Some(program) = self.current else {
            return;
        };
        let Some(block) = self
            .linked_mut(program)
            .and_then(|linked| linked.uniforms.as_mut())
        else {
            return;
        };
        let offset = location.0 as usize;
        if let Some(slot) = block.staging.get_mut(offset..offset + 4) {
            slot.copy_from_slice(&value.to_ne_bytes());
            block.dirty = true;
        }
    }

    fn clear(&mut self) {
        self.clear_pending = true;
    }

    fn draw_indexed(&mut self, index_count: u32) {
        if self.released {
            return;
        }
        if self.viewport.is_empty() {
            trace!("viewport is empty; skipping draw");
            return;
        }
        let Some(program) = self.current else {
            return;
        };
        if !self.ensure_pipeline(program) {
            return;
        }
        self.present(program, index_count);
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        self.shaders.remove(&shader);
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.current == Some(program) {
            self.current = None;
        }
        if let Some(Ok(linked)) = self.programs.remove(&program) {
            if let Some(block) = linked.uniforms {
                block.buffer.destroy();
            }
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        if let Some(object) = self.buffers.remove(&buffer) {
            object.buffer.destroy();
        }
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.current = None;
        self.shaders.clear();
        self.programs.clear();
        for (_, object) in self.buffers.drain() {
            object.buffer.destroy();
        }
        debug!(frames = self.frames_presented, "released GPU context");
    }
}
