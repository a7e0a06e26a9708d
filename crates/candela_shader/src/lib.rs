//! # Candela Shader
//!
//! Shader pipeline for Candela providing:
//! - WGSL parsing and validation via naga
//! - Entry-point verification
//! - Uniform-block reflection with GL-style flattened member names
//!
//! ## Architecture
//!
//! ```text
//! Source (.wgsl) ──► Parser ──► naga::Module ──► Validator ──► ShaderProgram
//!                                     │
//!                                     ▼
//!                               Reflector ──► UniformLayout (name -> offset)
//! ```
//!
//! The reflected layout is what lets the renderer address uniforms by name
//! (`"view"`, `"lights[2].color"`) exactly as a fixed-function-era engine
//! would, while the GPU side sees one tightly packed uniform block.

pub mod compiler;
pub mod reflect;
pub mod source;

pub use compiler::{ShaderCompiler, ShaderProgram, FRAGMENT_ENTRY, VERTEX_ENTRY};
pub use reflect::{reflect_uniforms, UniformBlock, UniformKind, UniformLayout, UniformSlot};
pub use source::ShaderSource;

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the shader pipeline
#[derive(Debug, Error)]
pub enum ShaderError {
    #[error("failed to read shader file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("WGSL parse error in '{label}': {message}")]
    Parse { label: String, message: String },

    #[error("validation error in '{label}': {message}")]
    Validation { label: String, message: String },

    #[error("entry point '{name}' not found in '{label}'")]
    MissingEntryPoint { label: String, name: String },
}
