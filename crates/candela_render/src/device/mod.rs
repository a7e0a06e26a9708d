//! Backend abstraction.
//!
//! The renderer core never talks to a GPU API directly. It issues
//! commands through [`RenderDevice`] and refers to resources by typed
//! handles, so the same core drives the wgpu backend and the in-memory
//! [`NullDevice`] used by tests.

pub mod handle;
pub mod null;

pub use handle::{BufferId, FramebufferId, Handle, HandleAllocator, PipelineId, TextureId};
pub use null::{DeviceEvent, NullDevice};

use candela_shader::ShaderProgram;

use crate::error::DeviceError;

/// Resource categories a device allocates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Buffer,
    Texture,
    Framebuffer,
    Pipeline,
}

impl ResourceKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Buffer => "buffer",
            ResourceKind::Texture => "texture",
            ResourceKind::Framebuffer => "framebuffer",
            ResourceKind::Pipeline => "pipeline",
        }
    }
}

/// Per-vertex attribute formats the mesh layer uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl VertexFormat {
    pub const fn size(self) -> u64 {
        match self {
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
        }
    }
}

/// One attribute within the vertex buffer layout.
#[derive(Debug, Clone, Copy)]
pub struct VertexAttribute {
    /// Shader `@location`.
    pub location: u32,
    /// Byte offset from the start of the vertex.
    pub offset: u64,
    pub format: VertexFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CullMode {
    None,
    Back,
    Front,
}

/// Whether a pipeline writes color or only depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    /// Renders to the device's color + depth targets. Requires a
    /// fragment entry point.
    Color,
    /// Renders to a shadow framebuffer's depth attachment only.
    DepthOnly,
}

/// Everything a device needs to build a render pipeline.
pub struct PipelineDesc<'a> {
    pub label: &'a str,
    /// Validated program; the device compiles from its WGSL source.
    pub program: &'a ShaderProgram,
    pub kind: PipelineKind,
    pub cull: CullMode,
    pub depth_test: bool,
    pub depth_write: bool,
    /// Byte stride of one vertex.
    pub vertex_stride: u64,
    pub vertex_attributes: &'a [VertexAttribute],
}

/// Commands and resource management the renderer core needs from a
/// backend.
///
/// Pass discipline: `begin_depth_pass` / `begin_color_pass` open a
/// pass, `bind_*` and `draw` are only legal inside one, `end_pass`
/// closes it. Devices report violations as
/// [`DeviceError::CommandOrder`] rather than panicking so the core's
/// sequencing stays testable.
pub trait RenderDevice {
    // --- resource creation ---

    /// Immutable vertex data, uploaded at creation.
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8])
        -> Result<BufferId, DeviceError>;

    /// Zero-initialized uniform buffer of `size` bytes, updated via
    /// [`write_buffer`](Self::write_buffer).
    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError>;

    /// Depth texture usable both as a pass attachment and as a
    /// comparison-sampled shadow map.
    fn create_depth_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TextureId, DeviceError>;

    /// Depth-only render target wrapping an existing depth texture.
    fn create_framebuffer(
        &mut self,
        label: &str,
        depth: TextureId,
    ) -> Result<FramebufferId, DeviceError>;

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, DeviceError>;

    // --- resource destruction ---

    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError>;
    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), DeviceError>;
    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError>;
    fn destroy_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError>;

    // --- data upload ---

    fn write_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8])
        -> Result<(), DeviceError>;

    // --- frame commands ---

    /// Clear the device's color and depth targets. Not legal inside a
    /// pass.
    fn clear_target(&mut self, color: [f32; 4]) -> Result<(), DeviceError>;

    /// Open a depth-only pass over `target`, clearing its depth
    /// attachment to 1.0 and setting the viewport to `width`×`height`.
    fn begin_depth_pass(
        &mut self,
        target: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError>;

    /// Open a pass over the device's color + depth targets, keeping
    /// their current contents.
    fn begin_color_pass(&mut self) -> Result<(), DeviceError>;

    fn bind_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError>;

    /// Bind `buffer` as the active pipeline's uniform block.
    fn bind_uniform_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError>;

    fn bind_vertex_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError>;

    /// Bind one shadow map per light slot. `None` slots get a fallback
    /// view that compares as fully lit.
    fn bind_shadow_textures(&mut self, textures: &[Option<TextureId>])
        -> Result<(), DeviceError>;

    fn draw(&mut self, vertex_count: u32) -> Result<(), DeviceError>;

    fn end_pass(&mut self) -> Result<(), DeviceError>;

    // --- introspection ---

    /// Buffers, textures, framebuffers and pipelines currently alive.
    /// Drives leak assertions around init rollback and cleanup.
    fn live_resource_count(&self) -> usize;
}
