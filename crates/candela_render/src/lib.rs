//! # candela_render - Forward Renderer Core
//!
//! Backend-agnostic rendering with:
//! - A [`Renderer`] facade owning pipelines, primitive meshes and lights
//! - Up to [`MAX_LIGHTS`] point lights, each with its own shadow map
//! - Depth-only shadow passes that always complete before the color pass
//! - Name-addressed uniform uploads driven by shader reflection
//!
//! ## Architecture
//!
//! The core never calls a GPU API. All commands go through the
//! [`RenderDevice`] trait; `candela_wgpu` implements it on wgpu, and
//! [`NullDevice`] implements it in memory for tests and headless use.
//!
//! ## Example
//!
//! ```ignore
//! use candela_render::{Renderer, RendererConfig, Light};
//! use glam::Vec3;
//!
//! let mut renderer = Renderer::new(device, RendererConfig::default());
//! renderer.init()?;
//!
//! renderer.set_view_matrix(camera.view_matrix());
//! renderer.set_projection_matrix(camera.projection_matrix());
//! renderer.add_light(Light::new(Vec3::new(0.0, 6.0, 2.0), Vec3::ONE, 1.0, 30.0))?;
//!
//! renderer.clear()?;
//! renderer.draw_rectangle(Vec3::ZERO, glam::Vec2::new(4.0, 3.0))?;
//! renderer.draw_circle(Vec3::new(1.0, 0.5, 0.0), 0.5)?;
//!
//! renderer.cleanup();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod lighting;
pub mod mesh;
pub mod renderer;
pub mod scene;
pub mod shadow;
pub mod stats;
pub mod uniform;

// Facade and configuration
pub use config::{RendererConfig, ShaderSet};
pub use renderer::Renderer;
pub use stats::RenderStats;

// Device seam
pub use device::{
    BufferId, CullMode, DeviceEvent, FramebufferId, NullDevice, PipelineDesc, PipelineId,
    PipelineKind, RenderDevice, ResourceKind, TextureId, VertexAttribute, VertexFormat,
};

// Lights and shadows
pub use lighting::{Light, LightSet, MAX_LIGHTS};
pub use shadow::{compute_light_space, ShadowConfig, ShadowMap, ShadowPass, SHADOW_HEIGHT, SHADOW_WIDTH};

// Geometry
pub use mesh::{GpuMesh, Vertex};

// Scene helpers
pub use scene::{Camera, DirectionalLight, PointLight};

// Uniform uploads
pub use uniform::{UniformChannel, UniformValue};

// Errors
pub use error::{DeviceError, LightError, RenderError};
