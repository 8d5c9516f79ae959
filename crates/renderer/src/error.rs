use crate::types::ShaderStage;

/// Failures surfaced by the background pipeline.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The host offers no compatible graphics context for the surface.
    #[error("no compatible graphics context available: {reason}")]
    ContextUnavailable { reason: String },
    #[error("{stage} shader failed to compile:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("shader program failed to link:\n{log}")]
    ProgramLink { log: String },
    #[error("failed to allocate geometry buffers: {reason}")]
    GeometryAllocationFailed { reason: String },
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    #[error("uniform '{0}' was never resolved for this program")]
    UnknownUniform(String),
    #[error("animation loop is already running on this context")]
    DoubleStart,
    #[error("pipeline has no live GPU resources (destroyed or never built)")]
    NotInitialized,
}

impl PipelineError {
    /// Errors that indicate misuse of the API rather than a host failure.
    pub fn is_programmer_error(&self) -> bool {
        matches!(
            self,
            PipelineError::UnknownUniform(_)
                | PipelineError::DoubleStart
                | PipelineError::InvalidGeometry(_)
                | PipelineError::NotInitialized
        )
    }
}
