//! Error types shared across the renderer core.

use thiserror::Error;

use candela_shader::ShaderError;

/// Errors from the bounded light list.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LightError {
    /// The set already holds the maximum number of lights.
    #[error("light capacity exceeded: set already holds {capacity} lights")]
    CapacityExceeded { capacity: usize },

    /// An update or remove referenced a slot that does not exist.
    #[error("light index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Errors reported by a [`RenderDevice`](crate::device::RenderDevice)
/// implementation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The device could not allocate a GPU resource.
    #[error("failed to allocate {kind} '{label}'")]
    ResourceAllocationFailed { kind: &'static str, label: String },

    /// A handle referenced a resource that was never created or was
    /// already destroyed.
    #[error("invalid {kind} handle")]
    InvalidHandle { kind: &'static str },

    /// Commands were issued in an order the device cannot execute,
    /// e.g. a draw outside a pass.
    #[error("command order violation: {0}")]
    CommandOrder(String),
}

/// Top-level renderer error.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The renderer was asked to draw or mutate scene state before
    /// `init` succeeded (or after `cleanup`).
    #[error("renderer is not initialized")]
    NotInitialized,

    #[error(transparent)]
    Shader(#[from] ShaderError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Light(#[from] LightError),
}
