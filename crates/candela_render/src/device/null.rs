//! In-memory device for tests and headless runs.
//!
//! `NullDevice` allocates nothing on a GPU. It tracks handles, buffer
//! sizes and pass state, enforces the same command ordering a real
//! backend would, and records every command as a [`DeviceEvent`] so
//! tests can assert on sequencing (e.g. that every shadow pass ends
//! before the color pass begins).

use std::collections::HashMap;

use crate::device::handle::{
    BufferId, BufferTag, FramebufferId, FramebufferTag, HandleAllocator, PipelineId, PipelineTag,
    TextureId, TextureTag,
};
use crate::device::{PipelineDesc, PipelineKind, RenderDevice, ResourceKind};
use crate::error::DeviceError;

/// One recorded device command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Created { kind: ResourceKind, label: String },
    Destroyed { kind: ResourceKind },
    Cleared,
    DepthPassBegun { target: FramebufferId },
    ColorPassBegun,
    PipelineBound { pipeline: PipelineId },
    UniformBufferBound { buffer: BufferId },
    VertexBufferBound { buffer: BufferId },
    /// `bound` of `slots` shadow slots carried a real texture.
    ShadowTexturesBound { bound: usize, slots: usize },
    BufferWritten { buffer: BufferId, offset: u64, len: usize },
    Drawn { vertices: u32 },
    PassEnded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActivePass {
    Depth(FramebufferId),
    Color,
}

/// Device implementation backed by plain maps.
#[derive(Default)]
pub struct NullDevice {
    buffers: HandleAllocator<BufferTag>,
    textures: HandleAllocator<TextureTag>,
    framebuffers: HandleAllocator<FramebufferTag>,
    pipelines: HandleAllocator<PipelineTag>,

    buffer_sizes: HashMap<BufferId, u64>,
    texture_dims: HashMap<TextureId, (u32, u32)>,
    framebuffer_depth: HashMap<FramebufferId, TextureId>,
    pipeline_kinds: HashMap<PipelineId, PipelineKind>,

    active_pass: Option<ActivePass>,
    bound_pipeline: Option<PipelineId>,
    bound_vertex: Option<BufferId>,

    fail_next: Option<ResourceKind>,
    events: Vec<DeviceEvent>,
}

impl NullDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next creation of a `kind` resource fail. Consumed by
    /// the first matching create call.
    pub fn set_fail_next_create(&mut self, kind: ResourceKind) {
        self.fail_next = Some(kind);
    }

    /// Commands recorded since construction or the last
    /// [`clear_events`](Self::clear_events).
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    /// Dimensions of a live depth texture.
    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.texture_dims.get(&texture).copied()
    }

    fn take_injected_failure(&mut self, kind: ResourceKind, label: &str) -> Result<(), DeviceError> {
        if self.fail_next == Some(kind) {
            self.fail_next = None;
            log::debug!("injected allocation failure: {} '{}'", kind.as_str(), label);
            return Err(DeviceError::ResourceAllocationFailed {
                kind: kind.as_str(),
                label: label.to_string(),
            });
        }
        Ok(())
    }

    fn require_pass(&self, what: &str) -> Result<ActivePass, DeviceError> {
        self.active_pass
            .ok_or_else(|| DeviceError::CommandOrder(format!("{what} outside a pass")))
    }
}

impl RenderDevice for NullDevice {
    fn create_vertex_buffer(
        &mut self,
        label: &str,
        contents: &[u8],
    ) -> Result<BufferId, DeviceError> {
        self.take_injected_failure(ResourceKind::Buffer, label)?;
        let id = self.buffers.allocate();
        self.buffer_sizes.insert(id, contents.len() as u64);
        self.events.push(DeviceEvent::Created {
            kind: ResourceKind::Buffer,
            label: label.to_string(),
        });
        log::trace!("created vertex buffer '{}' ({} bytes)", label, contents.len());
        Ok(id)
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError> {
        self.take_injected_failure(ResourceKind::Buffer, label)?;
        let id = self.buffers.allocate();
        self.buffer_sizes.insert(id, size);
        self.events.push(DeviceEvent::Created {
            kind: ResourceKind::Buffer,
            label: label.to_string(),
        });
        log::trace!("created uniform buffer '{}' ({} bytes)", label, size);
        Ok(id)
    }

    fn create_depth_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TextureId, DeviceError> {
        self.take_injected_failure(ResourceKind::Texture, label)?;
        let id = self.textures.allocate();
        self.texture_dims.insert(id, (width, height));
        self.events.push(DeviceEvent::Created {
            kind: ResourceKind::Texture,
            label: label.to_string(),
        });
        log::trace!("created depth texture '{}' ({}x{})", label, width, height);
        Ok(id)
    }

    fn create_framebuffer(
        &mut self,
        label: &str,
        depth: TextureId,
    ) -> Result<FramebufferId, DeviceError> {
        self.take_injected_failure(ResourceKind::Framebuffer, label)?;
        if !self.textures.is_live(depth) {
            return Err(DeviceError::InvalidHandle { kind: "texture" });
        }
        let id = self.framebuffers.allocate();
        self.framebuffer_depth.insert(id, depth);
        self.events.push(DeviceEvent::Created {
            kind: ResourceKind::Framebuffer,
            label: label.to_string(),
        });
        Ok(id)
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, DeviceError> {
        self.take_injected_failure(ResourceKind::Pipeline, desc.label)?;
        if desc.kind == PipelineKind::Color && desc.program.fragment_entry().is_none() {
            return Err(DeviceError::ResourceAllocationFailed {
                kind: ResourceKind::Pipeline.as_str(),
                label: desc.label.to_string(),
            });
        }
        let id = self.pipelines.allocate();
        self.pipeline_kinds.insert(id, desc.kind);
        self.events.push(DeviceEvent::Created {
            kind: ResourceKind::Pipeline,
            label: desc.label.to_string(),
        });
        log::trace!("created pipeline '{}' ({:?})", desc.label, desc.kind);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        if !self.buffers.release(buffer) {
            return Err(DeviceError::InvalidHandle { kind: "buffer" });
        }
        self.buffer_sizes.remove(&buffer);
        self.events.push(DeviceEvent::Destroyed {
            kind: ResourceKind::Buffer,
        });
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), DeviceError> {
        if !self.textures.release(texture) {
            return Err(DeviceError::InvalidHandle { kind: "texture" });
        }
        self.texture_dims.remove(&texture);
        self.events.push(DeviceEvent::Destroyed {
            kind: ResourceKind::Texture,
        });
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError> {
        if !self.framebuffers.release(framebuffer) {
            return Err(DeviceError::InvalidHandle {
                kind: "framebuffer",
            });
        }
        self.framebuffer_depth.remove(&framebuffer);
        self.events.push(DeviceEvent::Destroyed {
            kind: ResourceKind::Framebuffer,
        });
        Ok(())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError> {
        if !self.pipelines.release(pipeline) {
            return Err(DeviceError::InvalidHandle { kind: "pipeline" });
        }
        self.pipeline_kinds.remove(&pipeline);
        self.events.push(DeviceEvent::Destroyed {
            kind: ResourceKind::Pipeline,
        });
        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let size = *self
            .buffer_sizes
            .get(&buffer)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer" })?;
        let end = offset + data.len() as u64;
        if end > size {
            return Err(DeviceError::CommandOrder(format!(
                "write of {} bytes at offset {} exceeds buffer size {}",
                data.len(),
                offset,
                size
            )));
        }
        self.events.push(DeviceEvent::BufferWritten {
            buffer,
            offset,
            len: data.len(),
        });
        Ok(())
    }

    fn clear_target(&mut self, _color: [f32; 4]) -> Result<(), DeviceError> {
        if self.active_pass.is_some() {
            return Err(DeviceError::CommandOrder(
                "clear_target inside a pass".to_string(),
            ));
        }
        self.events.push(DeviceEvent::Cleared);
        Ok(())
    }

    fn begin_depth_pass(
        &mut self,
        target: FramebufferId,
        _width: u32,
        _height: u32,
    ) -> Result<(), DeviceError> {
        if self.active_pass.is_some() {
            return Err(DeviceError::CommandOrder(
                "begin_depth_pass while another pass is open".to_string(),
            ));
        }
        if !self.framebuffers.is_live(target) {
            return Err(DeviceError::InvalidHandle {
                kind: "framebuffer",
            });
        }
        self.active_pass = Some(ActivePass::Depth(target));
        self.bound_pipeline = None;
        self.bound_vertex = None;
        self.events.push(DeviceEvent::DepthPassBegun { target });
        Ok(())
    }

    fn begin_color_pass(&mut self) -> Result<(), DeviceError> {
        if self.active_pass.is_some() {
            return Err(DeviceError::CommandOrder(
                "begin_color_pass while another pass is open".to_string(),
            ));
        }
        self.active_pass = Some(ActivePass::Color);
        self.bound_pipeline = None;
        self.bound_vertex = None;
        self.events.push(DeviceEvent::ColorPassBegun);
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError> {
        let pass = self.require_pass("bind_pipeline")?;
        let kind = *self
            .pipeline_kinds
            .get(&pipeline)
            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;
        let compatible = match pass {
            ActivePass::Depth(_) => kind == PipelineKind::DepthOnly,
            ActivePass::Color => kind == PipelineKind::Color,
        };
        if !compatible {
            return Err(DeviceError::CommandOrder(format!(
                "{kind:?} pipeline bound in {pass:?} pass"
            )));
        }
        self.bound_pipeline = Some(pipeline);
        self.events.push(DeviceEvent::PipelineBound { pipeline });
        Ok(())
    }

    fn bind_uniform_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        self.require_pass("bind_uniform_buffer")?;
        if self.bound_pipeline.is_none() {
            return Err(DeviceError::CommandOrder(
                "uniform bound before a pipeline".to_string(),
            ));
        }
        if !self.buffers.is_live(buffer) {
            return Err(DeviceError::InvalidHandle { kind: "buffer" });
        }
        self.events.push(DeviceEvent::UniformBufferBound { buffer });
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        self.require_pass("bind_vertex_buffer")?;
        if !self.buffers.is_live(buffer) {
            return Err(DeviceError::InvalidHandle { kind: "buffer" });
        }
        self.bound_vertex = Some(buffer);
        self.events.push(DeviceEvent::VertexBufferBound { buffer });
        Ok(())
    }

    fn bind_shadow_textures(
        &mut self,
        textures: &[Option<TextureId>],
    ) -> Result<(), DeviceError> {
        match self.require_pass("bind_shadow_textures")? {
            ActivePass::Color => {}
            ActivePass::Depth(_) => {
                return Err(DeviceError::CommandOrder(
                    "bind_shadow_textures in a depth pass".to_string(),
                ));
            }
        }
        if self.bound_pipeline.is_none() {
            return Err(DeviceError::CommandOrder(
                "shadow textures bound before a pipeline".to_string(),
            ));
        }
        let mut bound = 0;
        for texture in textures.iter().flatten() {
            if !self.textures.is_live(*texture) {
                return Err(DeviceError::InvalidHandle { kind: "texture" });
            }
            bound += 1;
        }
        self.events.push(DeviceEvent::ShadowTexturesBound {
            bound,
            slots: textures.len(),
        });
        Ok(())
    }

    fn draw(&mut self, vertex_count: u32) -> Result<(), DeviceError> {
        self.require_pass("draw")?;
        if self.bound_pipeline.is_none() {
            return Err(DeviceError::CommandOrder(
                "draw without a bound pipeline".to_string(),
            ));
        }
        if self.bound_vertex.is_none() {
            return Err(DeviceError::CommandOrder(
                "draw without a bound vertex buffer".to_string(),
            ));
        }
        self.events.push(DeviceEvent::Drawn {
            vertices: vertex_count,
        });
        Ok(())
    }

    fn end_pass(&mut self) -> Result<(), DeviceError> {
        if self.active_pass.is_none() {
            return Err(DeviceError::CommandOrder(
                "end_pass without an open pass".to_string(),
            ));
        }
        self.active_pass = None;
        self.bound_pipeline = None;
        self.bound_vertex = None;
        self.events.push(DeviceEvent::PassEnded);
        Ok(())
    }

    fn live_resource_count(&self) -> usize {
        self.buffers.live_count()
            + self.textures.live_count()
            + self.framebuffers.live_count()
            + self.pipelines.live_count()
    }
}
