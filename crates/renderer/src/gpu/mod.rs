//! wgpu backend for [`GraphicsContext`](crate::host::GraphicsContext).
//!
//! - `context` owns instance, device, and swapchain wiring and reconfigures
//!   the swapchain when the window resizes.
//! - `pipeline` turns linked GLSL stages plus vertex bindings into render
//!   pipelines with a single uniform bind group.
//! - `state` implements the handle-based context on top of both.

mod context;
mod pipeline;
mod state;

pub use state::WgpuContext;
