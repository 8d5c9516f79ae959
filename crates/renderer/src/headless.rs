//! Recording host used by tests and `--headless` runs.
//!
//! [`HeadlessContext`] compiles and reflects shaders through the same GLSL
//! front-end as the GPU host but records draw commands instead of rasterising.
//! The recording is shared with the [`HeadlessSurface`] that created the
//! context so it stays inspectable after the context moves into a pipeline.

use std::cell::{Cell, Ref, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use serde::Serialize;

use crate::host::{GraphicsContext, RenderSurface};
use crate::reflect::{self, ProgramInterface, StageInterface};
use crate::types::{
    BufferHandle, BufferTarget, ProgramHandle, Rgba, ShaderHandle, ShaderStage, UniformLocation,
    Viewport,
};

/// State-changing call issued against a headless context.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    EnableBlending,
    ClearColor(Rgba),
    Viewport(Viewport),
    UseProgram(ProgramHandle),
    Clear,
    Draw {
        program: ProgramHandle,
        index_count: u32,
    },
    Release,
}

/// Snapshot of one indexed draw.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawCall {
    pub program: ProgramHandle,
    pub index_count: u32,
    pub viewport: Viewport,
    /// Whether the colour buffer was cleared since the previous draw.
    pub cleared: bool,
    /// Vertex attribute locations with a buffer bound.
    pub attributes: Vec<u32>,
    pub uniforms: BTreeMap<String, f32>,
}

/// Object creation and deletion counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceCounts {
    pub shaders_created: usize,
    pub shaders_deleted: usize,
    pub programs_created: usize,
    pub programs_deleted: usize,
    pub buffers_created: usize,
    pub buffers_deleted: usize,
    /// Deletes of handles that were already deleted or never existed.
    pub invalid_deletes: usize,
}

impl ResourceCounts {
    pub fn live_shaders(&self) -> usize {
        self.shaders_created - self.shaders_deleted
    }

    pub fn live_programs(&self) -> usize {
        self.programs_created - self.programs_deleted
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers_created - self.buffers_deleted
    }

    pub fn all_released(&self) -> bool {
        self.live_shaders() == 0 && self.live_programs() == 0 && self.live_buffers() == 0
    }
}

/// Everything a headless surface observed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Recording {
    pub contexts_created: usize,
    pub releases: usize,
    pub blending: bool,
    pub clear_color: Rgba,
    pub viewport: Viewport,
    pub commands: Vec<Command>,
    pub draws: Vec<DrawCall>,
    /// Draws rejected because no linked program was in use.
    pub skipped_draws: usize,
    pub resources: ResourceCounts,
    #[serde(skip)]
    buffers: BTreeMap<BufferHandle, Vec<u8>>,
}

impl Recording {
    /// Contents of a live buffer read back as `f32`s.
    pub fn buffer_f32(&self, buffer: BufferHandle) -> Option<Vec<f32>> {
        let bytes = self.buffers.get(&buffer)?;
        Some(
            bytes
                .chunks_exact(4)
                .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                .collect(),
        )
    }

    /// Contents of a live buffer read back as `u16`s.
    pub fn buffer_u16(&self, buffer: BufferHandle) -> Option<Vec<u16>> {
        let bytes = self.buffers.get(&buffer)?;
        Some(
            bytes
                .chunks_exact(2)
                .map(|chunk| u16::from_ne_bytes([chunk[0], chunk[1]]))
                .collect(),
        )
    }

    pub fn last_draw(&self) -> Option<&DrawCall> {
        self.draws.last()
    }
}

/// Off-screen surface with a settable size.
#[derive(Debug, Clone)]
pub struct HeadlessSurface {
    size: Rc<Cell<Viewport>>,
    supported: bool,
    recording: Rc<RefCell<Recording>>,
    allocation_budget: Rc<Cell<Option<usize>>>,
}

impl HeadlessSurface {
    pub fn new(size: Viewport) -> Self {
        Self {
            size: Rc::new(Cell::new(size)),
            supported: true,
            recording: Rc::default(),
            allocation_budget: Rc::new(Cell::new(None)),
        }
    }

    /// A surface whose host offers no graphics context.
    pub fn unsupported(size: Viewport) -> Self {
        Self {
            supported: false,
            ..Self::new(size)
        }
    }

    /// Changes what [`RenderSurface::size`] reports, like a host window resize.
    pub fn set_size(&self, size: Viewport) {
        self.size.set(size);
    }

    /// Lets `count` more buffer allocations succeed, then fails the rest.
    pub fn fail_allocations_after(&self, count: usize) {
        self.allocation_budget.set(Some(count));
    }

    pub fn recording(&self) -> Ref<'_, Recording> {
        self.recording.borrow()
    }

    /// Copy of the recording, suitable for serialising.
    pub fn snapshot(&self) -> Recording {
        self.recording.borrow().clone()
    }
}

impl RenderSurface for HeadlessSurface {
    type Context = HeadlessContext;

    fn size(&self) -> Viewport {
        self.size.get()
    }

    fn create_context(&self) -> anyhow::Result<HeadlessContext> {
        if !self.supported {
            anyhow::bail!("headless surface was created without graphics support");
        }
        self.recording.borrow_mut().contexts_created += 1;
        Ok(HeadlessContext::new(
            self.recording.clone(),
            self.allocation_budget.clone(),
        ))
    }
}

struct ShaderObject {
    stage: ShaderStage,
    compiled: Result<StageInterface, String>,
}

struct ProgramObject {
    linked: Result<ProgramInterface, String>,
    values: BTreeMap<u32, f32>,
    attributes: BTreeMap<u32, (BufferHandle, u32)>,
    index_buffer: Option<BufferHandle>,
}

/// Recording [`GraphicsContext`].
pub struct HeadlessContext {
    recording: Rc<RefCell<Recording>>,
    allocation_budget: Rc<Cell<Option<usize>>>,
    shaders: HashMap<ShaderHandle, ShaderObject>,
    programs: HashMap<ProgramHandle, ProgramObject>,
    buffers: HashMap<BufferHandle, BufferTarget>,
    next_id: u32,
    current: Option<ProgramHandle>,
    clear_pending: bool,
    released: bool,
}

impl HeadlessContext {
    fn new(recording: Rc<RefCell<Recording>>, allocation_budget: Rc<Cell<Option<usize>>>) -> Self {
        Self {
            recording,
            allocation_budget,
            shaders: HashMap::new(),
            programs: HashMap::new(),
            buffers: HashMap::new(),
            next_id: 0,
            current: None,
            clear_pending: false,
            released: false,
        }
    }

    fn next_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, command: Command) {
        self.recording.borrow_mut().commands.push(command);
    }

    fn compiled_stage(
        &self,
        handle: ShaderHandle,
        expected: ShaderStage,
    ) -> Result<&StageInterface, String> {
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

    fn link(
        &self,
        vertex: ShaderHandle,
        fragment: ShaderHandle,
    ) -> Result<ProgramInterface, String> {
        let vertex = self.compiled_stage(vertex, ShaderStage::Vertex)?;
        let fragment = self.compiled_stage(fragment, ShaderStage::Fragment)?;
        reflect::link(vertex, fragment)
    }

    fn linked_interface(&self, program: ProgramHandle) -> Option<&ProgramInterface> {
        self.programs.get(&program)?.linked.as_ref().ok()
    }
}

impl GraphicsContext for HeadlessContext {
    fn enable_alpha_blending(&mut self) {
        self.recording.borrow_mut().blending = true;
        self.record(Command::EnableBlending);
    }

    fn set_clear_color(&mut self, color: Rgba) {
        self.recording.borrow_mut().clear_color = color;
        self.record(Command::ClearColor(color));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.recording.borrow_mut().viewport = viewport;
        self.record(Command::Viewport(viewport));
    }

    fn create_shader(&mut self, stage: ShaderStage, source: &str) -> ShaderHandle {
        let handle = ShaderHandle(self.next_id());
        let compiled = reflect::compile_stage(stage, source);
        self.shaders.insert(handle, ShaderObject { stage, compiled });
        self.recording.borrow_mut().resources.shaders_created += 1;
        handle
    }

    fn shader_compiled(&self, shader: ShaderHandle) -> bool {
        self.shaders
            .get(&shader)
            .is_some_and(|object| object.compiled.is_ok())
    }

    fn shader_info_log(&self, shader: ShaderHandle) -> String {
        match self.shaders.get(&shader) {
            Some(ShaderObject {
                compiled: Err(log), ..
            }) => log.clone(),
            Some(_) => String::new(),
            None => format!("shader handle {} is not valid", shader.raw()),
        }
    }

    fn create_program(&mut self, vertex: ShaderHandle, fragment: ShaderHandle) -> ProgramHandle {
        let handle = ProgramHandle(self.next_id());
        let linked = self.link(vertex, fragment);
        self.programs.insert(
            handle,
            ProgramObject {
                linked,
                values: BTreeMap::new(),
                attributes: BTreeMap::new(),
                index_buffer: None,
            },
        );
        self.recording.borrow_mut().resources.programs_created += 1;
        handle
    }

    fn program_linked(&self, program: ProgramHandle) -> bool {
        self.linked_interface(program).is_some()
    }

    fn program_info_log(&self, program: ProgramHandle) -> String {
        match self.programs.get(&program) {
            Some(ProgramObject {
                linked: Err(log), ..
            }) => log.clone(),
            Some(_) => String::new(),
            None => format!("program handle {} is not valid", program.raw()),
        }
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current = Some(program);
        self.record(Command::UseProgram(program));
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.linked_interface(program)?
            .uniforms
            .get(name)
            .map(|offset| UniformLocation(*offset))
    }

    fn attribute_location(&self, program: ProgramHandle, name: &str) -> Option<u32> {
        self.linked_interface(program)?
            .attribute(name)
            .map(|attribute| attribute.location)
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> anyhow::Result<BufferHandle> {
        if let Some(remaining) = self.allocation_budget.get() {
            if remaining == 0 {
                anyhow::bail!("out of memory allocating {} bytes", data.len());
            }
            self.allocation_budget.set(Some(remaining - 1));
        }
        let handle = BufferHandle(self.next_id());
        self.buffers.insert(handle, target);
        let mut recording = self.recording.borrow_mut();
        recording.resources.buffers_created += 1;
        recording.buffers.insert(handle, data.to_vec());
        Ok(handle)
    }

    fn bind_vertex_attribute(
        &mut self,
        program: ProgramHandle,
        location: u32,
        buffer: BufferHandle,
        components: u32,
    ) {
        if self.buffers.get(&buffer) != Some(&BufferTarget::Vertex) {
            return;
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.attributes.insert(location, (buffer, components));
        }
    }

    fn bind_index_buffer(&mut self, program: ProgramHandle, buffer: BufferHandle) {
        if self.buffers.get(&buffer) != Some(&BufferTarget::Index) {
            return;
        }
        if let Some(object) = self.programs.get_mut(&program) {
            object.index_buffer = Some(buffer);
        }
    }

    fn set_uniform_f32(&mut self, location: UniformLocation, value: f32) {
        let Some(program) = self.current else {
            return;
        };
        if let Some(object) = self.programs.get_mut(&program) {
            if object.linked.is_ok() {
                object.values.insert(location.0, value);
            }
        }
    }

    fn clear(&mut self) {
        self.clear_pending = true;
        self.record(Command::Clear);
    }

    fn draw_indexed(&mut self, index_count: u32) {
        let drawable = self.current.and_then(|program| {
            let object = self.programs.get(&program)?;
            let interface = object.linked.as_ref().ok()?;
            object.index_buffer?;
            Some((program, object, interface))
        });
        let mut recording = self.recording.borrow_mut();
        let Some((program, object, interface)) = drawable else {
            recording.skipped_draws += 1;
            return;
        };

        let uniforms = interface
            .uniforms
            .iter()
            .filter_map(|(name, offset)| Some((name.clone(), *object.values.get(offset)?)))
            .collect();
        let call = DrawCall {
            program,
            index_count,
            viewport: recording.viewport,
            cleared: self.clear_pending,
            attributes: object.attributes.keys().copied().collect(),
            uniforms,
        };
        recording.commands.push(Command::Draw {
            program,
            index_count,
        });
        recording.draws.push(call);
        drop(recording);
        self.clear_pending = false;
    }

    fn delete_shader(&mut self, shader: ShaderHandle) {
        let mut recording = self.recording.borrow_mut();
        match self.shaders.remove(&shader) {
            Some(_) => recording.resources.shaders_deleted += 1,
            None => recording.resources.invalid_deletes += 1,
        }
    }

    fn delete_program(&mut self, program: ProgramHandle) {
        if self.current == Some(program) {
            self.current = None;
        }
        let mut recording = self.recording.borrow_mut();
        match self.programs.remove(&program) {
            Some(_) => recording.resources.programs_deleted += 1,
            None => recording.resources.invalid_deletes += 1,
        }
    }

    fn delete_buffer(&mut self, buffer: BufferHandle) {
        let mut recording = self.recording.borrow_mut();
        match self.buffers.remove(&buffer) {
            Some(_) => {
                recording.resources.buffers_deleted += 1;
                recording.buffers.remove(&buffer);
            }
            None => recording.resources.invalid_deletes += 1,
        }
    }

    fn release(&mut self) {
        let mut recording = self.recording.borrow_mut();
        if self.released {
            recording.resources.invalid_deletes += 1;
            return;
        }
        self.released = true;
        recording.releases += 1;
        recording.commands.push(Command::Release);
    }
}
