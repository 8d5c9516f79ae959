use std::fmt;

use serde::Serialize;

/// Pipeline stage a shader source is compiled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub(crate) fn to_naga(self) -> wgpu::naga::ShaderStage {
        match self {
            ShaderStage::Vertex => wgpu::naga::ShaderStage::Vertex,
            ShaderStage::Fragment => wgpu::naga::ShaderStage::Fragment,
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Drawable area of a context in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Width over height; a zero height reports an aspect of 1.
    pub fn aspect(&self) -> f32 {
        if self.height == 0 {
            1.0
        } else {
            self.width as f32 / self.height as f32
        }
    }
}

impl fmt::Display for Viewport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Straight-alpha RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Rgba {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
}

/// Kind of data a buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferTarget {
    /// Per-vertex attribute data (`f32` components).
    Vertex,
    /// Triangle indices (`u16`).
    Index,
}

macro_rules! handle_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle_type!(
    /// Shader object owned by a graphics context.
    ShaderHandle
);
handle_type!(
    /// Program object owned by a graphics context.
    ProgramHandle
);
handle_type!(
    /// Buffer object owned by a graphics context.
    BufferHandle
);

/// Resolved location of a `float` uniform inside its program.
///
/// Backends are free to pick the encoding; both shipped backends use the byte
/// offset inside the program's uniform block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct UniformLocation(pub(crate) u32);

impl UniformLocation {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// What to do when a shader stage fails to compile or the program fails to link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShaderFailurePolicy {
    /// Abort initialisation with the compiler or linker log.
    #[default]
    FailFast,
    /// Log the diagnostic and keep going with the possibly-invalid program.
    Continue,
}

/// GPU adapter preference for hosts backed by a real device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GpuPowerPreference {
    #[default]
    Low,
    High,
}
