//! # candela_wgpu - wgpu Backend
//!
//! Implements [`RenderDevice`] on wgpu with a fixed-size offscreen
//! color + depth target, so the renderer runs identically with or
//! without a display server.
//!
//! Pass commands are recorded between `begin_*_pass` and `end_pass`
//! and replayed into a single wgpu render pass on `end_pass`; bind
//! groups are prepared before the pass opens and cached across frames.

use std::collections::HashMap;

use candela_render::device::handle::{
    BufferId, BufferTag, FramebufferId, FramebufferTag, HandleAllocator, PipelineId, PipelineTag,
    TextureId, TextureTag,
};
use candela_render::{
    CullMode, DeviceError, PipelineDesc, PipelineKind, RenderDevice, VertexFormat, MAX_LIGHTS,
};
use thiserror::Error;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Backend construction errors. Everything after construction reports
/// through [`DeviceError`].
#[derive(Debug, Error)]
pub enum WgpuError {
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    #[error("failed to acquire device: {0}")]
    DeviceRequest(String),
}

/// Offscreen target settings.
#[derive(Debug, Clone)]
pub struct WgpuConfig {
    pub width: u32,
    pub height: u32,
    pub power_preference: wgpu::PowerPreference,
}

impl Default for WgpuConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            power_preference: wgpu::PowerPreference::HighPerformance,
        }
    }
}

struct DepthTexture {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct PipelineEntry {
    pipeline: wgpu::RenderPipeline,
    kind: PipelineKind,
}

enum PassTarget {
    Shadow {
        texture: TextureId,
        width: u32,
        height: u32,
    },
    Frame,
}

enum PassCmd {
    SetPipeline(PipelineId),
    SetUniformBuffer(BufferId),
    SetShadowTextures(Vec<Option<TextureId>>),
    SetVertexBuffer(BufferId),
    Draw(u32),
}

struct PassRecording {
    target: PassTarget,
    commands: Vec<PassCmd>,
}

/// wgpu-backed [`RenderDevice`] rendering into an offscreen frame.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,

    color_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
    shadow_sampler: wgpu::Sampler,
    /// 1x1 depth view cleared to 1.0; bound for empty shadow slots so
    /// every comparison passes.
    fallback_shadow_view: wgpu::TextureView,

    buffer_ids: HandleAllocator<BufferTag>,
    texture_ids: HandleAllocator<TextureTag>,
    framebuffer_ids: HandleAllocator<FramebufferTag>,
    pipeline_ids: HandleAllocator<PipelineTag>,

    buffers: HashMap<BufferId, wgpu::Buffer>,
    textures: HashMap<TextureId, DepthTexture>,
    framebuffers: HashMap<FramebufferId, TextureId>,
    pipelines: HashMap<PipelineId, PipelineEntry>,

    uniform_groups: HashMap<(PipelineId, BufferId), wgpu::BindGroup>,
    shadow_groups: HashMap<(PipelineId, Vec<Option<TextureId>>), wgpu::BindGroup>,

    recording: Option<PassRecording>,
}

impl WgpuDevice {
    pub async fn new(config: WgpuConfig) -> Result<Self, WgpuError> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(WgpuError::AdapterNotFound)?;
        log::info!("using adapter: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("candela_device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|err| WgpuError::DeviceRequest(format!("{err:?}")))?;

        let width = config.width.max(1);
        let height = config.height.max(1);
        let color = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame.color"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: COLOR_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("frame.depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());

        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("shadow.sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let fallback = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("shadow.fallback"),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let fallback_shadow_view = fallback.create_view(&wgpu::TextureViewDescriptor::default());

        // Clear the fallback to the far plane so unused shadow slots
        // sample as fully lit.
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("fallback.clear"),
        });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("fallback.clear"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &fallback_shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        queue.submit(Some(encoder.finish()));

        log::info!("offscreen device ready ({width}x{height})");
        Ok(Self {
            device,
            queue,
            color_view,
            depth_view,
            shadow_sampler,
            fallback_shadow_view,
            buffer_ids: HandleAllocator::new(),
            texture_ids: HandleAllocator::new(),
            framebuffer_ids: HandleAllocator::new(),
            pipeline_ids: HandleAllocator::new(),
            buffers: HashMap::new(),
            textures: HashMap::new(),
            framebuffers: HashMap::new(),
            pipelines: HashMap::new(),
            uniform_groups: HashMap::new(),
            shadow_groups: HashMap::new(),
            recording: None,
        })
    }

    /// Synchronous construction for hosts without an executor.
    pub fn create_blocking(config: WgpuConfig) -> Result<Self, WgpuError> {
        pollster::block_on(Self::new(config))
    }

    fn record(&mut self, cmd: PassCmd, what: &str) -> Result<(), DeviceError> {
        match self.recording.as_mut() {
            Some(recording) => {
                recording.commands.push(cmd);
                Ok(())
            }
            None => Err(DeviceError::CommandOrder(format!("{what} outside a pass"))),
        }
    }

    fn ensure_uniform_group(
        &mut self,
        pipeline: PipelineId,
        buffer: BufferId,
    ) -> Result<(), DeviceError> {
        if self.uniform_groups.contains_key(&(pipeline, buffer)) {
            return Ok(());
        }
        let entry = self
            .pipelines
            .get(&pipeline)
            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;
        let buf = self
            .buffers
            .get(&buffer)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer" })?;
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("group.uniforms"),
            layout: &entry.pipeline.get_bind_group_layout(0),
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buf.as_entire_binding(),
            }],
        });
        self.uniform_groups.insert((pipeline, buffer), group);
        Ok(())
    }

    fn ensure_shadow_group(
        &mut self,
        pipeline: PipelineId,
        slots: &[Option<TextureId>],
    ) -> Result<(), DeviceError> {
        let key = (pipeline, slots.to_vec());
        if self.shadow_groups.contains_key(&key) {
            return Ok(());
        }
        let entry = self
            .pipelines
            .get(&pipeline)
            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;

        let mut entries = Vec::with_capacity(slots.len() + 1);
        entries.push(wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
        });
        for (i, slot) in slots.iter().enumerate() {
            let view = match slot {
                Some(texture) => {
                    &self
                        .textures
                        .get(texture)
                        .ok_or(DeviceError::InvalidHandle { kind: "texture" })?
                        .view
                }
                None => &self.fallback_shadow_view,
            };
            entries.push(wgpu::BindGroupEntry {
                binding: (i + 1) as u32,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("group.shadows"),
            layout: &entry.pipeline.get_bind_group_layout(1),
            entries: &entries,
        });
        self.shadow_groups.insert(key, group);
        Ok(())
    }

    fn prepare_bind_groups(&mut self, recording: &PassRecording) -> Result<(), DeviceError> {
        let mut current: Option<PipelineId> = None;
        for cmd in &recording.commands {
            match cmd {
                PassCmd::SetPipeline(id) => current = Some(*id),
                PassCmd::SetUniformBuffer(buffer) => {
                    let pipeline = current.ok_or_else(|| {
                        DeviceError::CommandOrder("uniform bound before a pipeline".to_string())
                    })?;
                    self.ensure_uniform_group(pipeline, *buffer)?;
                }
                PassCmd::SetShadowTextures(slots) => {
                    let pipeline = current.ok_or_else(|| {
                        DeviceError::CommandOrder(
                            "shadow textures bound before a pipeline".to_string(),
                        )
                    })?;
                    self.ensure_shadow_group(pipeline, slots)?;
                }
                PassCmd::SetVertexBuffer(_) | PassCmd::Draw(_) => {}
            }
        }
        Ok(())
    }

    fn replay(&self, recording: &PassRecording) -> Result<(), DeviceError> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("candela.pass"),
            });
        {
            let mut pass = match &recording.target {
                PassTarget::Shadow {
                    texture,
                    width,
                    height,
                } => {
                    let depth = self
                        .textures
                        .get(texture)
                        .ok_or(DeviceError::InvalidHandle { kind: "texture" })?;
                    let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("pass.shadow"),
                        color_attachments: &[],
                        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                            view: &depth.view,
                            depth_ops: Some(wgpu::Operations {
                                load: wgpu::LoadOp::Clear(1.0),
                                store: wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        }),
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    pass.set_viewport(0.0, 0.0, *width as f32, *height as f32, 0.0, 1.0);
                    pass
                }
                PassTarget::Frame => encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("pass.color"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &self.color_view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.depth_view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    timestamp_writes: None,
                    occlusion_query_set: None,
                }),
            };

            let mut current: Option<PipelineId> = None;
            for cmd in &recording.commands {
                match cmd {
                    PassCmd::SetPipeline(id) => {
                        let entry = self
                            .pipelines
                            .get(id)
                            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;
                        pass.set_pipeline(&entry.pipeline);
                        current = Some(*id);
                    }
                    PassCmd::SetUniformBuffer(buffer) => {
                        let pipeline = current.ok_or_else(|| {
                            DeviceError::CommandOrder("uniform bound before a pipeline".to_string())
                        })?;
                        let group = self
                            .uniform_groups
                            .get(&(pipeline, *buffer))
                            .ok_or_else(|| {
                                DeviceError::CommandOrder("uniform bind group missing".to_string())
                            })?;
                        pass.set_bind_group(0, group, &[]);
                    }
                    PassCmd::SetShadowTextures(slots) => {
                        let pipeline = current.ok_or_else(|| {
                            DeviceError::CommandOrder(
                                "shadow textures bound before a pipeline".to_string(),
                            )
                        })?;
                        let group = self
                            .shadow_groups
                            .get(&(pipeline, slots.clone()))
                            .ok_or_else(|| {
                               DeviceError::CommandOrder("shadow bind group missing".to_string())
                            })?;
                        pass.set_bind_group(1, group, &[]);
                    }
                    PassCmd::SetVertexBuffer(buffer) => {
                        let buf = self
                            .buffers
                            .get(buffer)
                            .ok_or(DeviceError::InvalidHandle { kind: "buffer" })?;
                        pass.set_vertex_buffer(0, buf.slice(..));
                    }
                    PassCmd::Draw(count) => {
                        pass.draw(0..*count, 0..1);
                    }
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn make_depth_texture(&self, label: &str, width: u32, height: u32) -> DepthTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        DepthTexture { texture, view }
    }
}

fn convert_vertex_format(format: VertexFormat) -> wgpu::VertexFormat {
    match format {
        VertexFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
        VertexFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
        VertexFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
    }
}

fn convert_cull_mode(cull: CullMode) -> Option<wgpu::Face> {
    match cull {
        CullMode::None => None,
        CullMode::Back => Some(wgpu::Face::Back),
        CullMode::Front => Some(wgpu::Face::Front),
    }
}

impl RenderDevice for WgpuDevice {
    fn create_vertex_buffer(
        &mut self,
        label: &str,
        contents: &[u8],
    ) -> Result<BufferId, DeviceError> {
        use wgpu::util::DeviceExt;

        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = self.buffer_ids.allocate();
        self.buffers.insert(id, buffer);
        log::trace!("created vertex buffer '{}' ({} bytes)", label, contents.len());
        Ok(id)
    }

    fn create_uniform_buffer(&mut self, label: &str, size: u64) -> Result<BufferId, DeviceError> {
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: size.max(16),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = self.buffer_ids.allocate();
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn create_depth_texture(
        &mut self,
        label: &str,
        width: u32,
        height: u32,
    ) -> Result<TextureId, DeviceError> {
        let texture = self.make_depth_texture(label, width.max(1), height.max(1));
        let id = self.texture_ids.allocate();
        self.textures.insert(id, texture);
        log::trace!("created depth texture '{}' ({}x{})", label, width, height);
        Ok(id)
    }

    fn create_framebuffer(
        &mut self,
        _label: &str,
        depth: TextureId,
    ) -> Result<FramebufferId, DeviceError> {
        if !self.textures.contains_key(&depth) {
            return Err(DeviceError::InvalidHandle { kind: "texture" });
        }
        let id = self.framebuffer_ids.allocate();
        self.framebuffers.insert(id, depth);
        Ok(id)
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc<'_>) -> Result<PipelineId, DeviceError> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(desc.label),
                source: wgpu::ShaderSource::Wgsl(desc.program.source().into()),
            });

        let attributes: Vec<wgpu::VertexAttribute> = desc
            .vertex_attributes
            .iter()
            .map(|attr| wgpu::VertexAttribute {
                format: convert_vertex_format(attr.format),
                offset: attr.offset,
                shader_location: attr.location,
            })
            .collect();

        let fragment_entry = match desc.kind {
            PipelineKind::Color => Some(desc.program.require_fragment().map_err(|_| {
                DeviceError::ResourceAllocationFailed {
                    kind: "pipeline",
                    label: desc.label.to_string(),
                }
            })?),
            PipelineKind::DepthOnly => None,
        };
        let color_targets = [Some(wgpu::ColorTargetState {
            format: COLOR_FORMAT,
            blend: None,
            write_mask: wgpu::ColorWrites::ALL,
        })];
        let fragment = fragment_entry.map(|entry_point| wgpu::FragmentState {
            module: &module,
            entry_point,
            compilation_options: Default::default(),
            targets: &color_targets,
        });

        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(desc.label),
                layout: None,
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: desc.program.vertex_entry(),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: desc.vertex_stride,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: convert_cull_mode(desc.cull),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: desc.depth_write,
                    depth_compare: if desc.depth_test {
                        wgpu::CompareFunction::Less
                    } else {
                        wgpu::CompareFunction::Always
                    },
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment,
                multiview: None,
                cache: None,
            });

        let id = self.pipeline_ids.allocate();
        self.pipelines.insert(
            id,
            PipelineEntry {
                pipeline,
                kind: desc.kind,
            },
        );
        log::debug!("created {:?} pipeline '{}'", desc.kind, desc.label);
        Ok(id)
    }

    fn destroy_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        let resource = self
            .buffers
            .remove(&buffer)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer" })?;
        self.buffer_ids.release(buffer);
        self.uniform_groups.retain(|(_, b), _| *b != buffer);
        resource.destroy();
        Ok(())
    }

    fn destroy_texture(&mut self, texture: TextureId) -> Result<(), DeviceError> {
        let resource = self
            .textures
            .remove(&texture)
            .ok_or(DeviceError::InvalidHandle { kind: "texture" })?;
        self.texture_ids.release(texture);
        self.shadow_groups
            .retain(|(_, slots), _| !slots.contains(&Some(texture)));
        resource.texture.destroy();
        Ok(())
    }

    fn destroy_framebuffer(&mut self, framebuffer: FramebufferId) -> Result<(), DeviceError> {
        self.framebuffers
            .remove(&framebuffer)
            .ok_or(DeviceError::InvalidHandle {
                kind: "framebuffer",
            })?;
        self.framebuffer_ids.release(framebuffer);
        Ok(())
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError> {
        self.pipelines
            .remove(&pipeline)
            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;
        self.pipeline_ids.release(pipeline);
        self.uniform_groups.retain(|(p, _), _| *p != pipeline);
        self.shadow_groups.retain(|(p, _), _| *p != pipeline);
        Ok(())
    }

    fn write_buffer(
        &mut self,
        buffer: BufferId,
        offset: u64,
        data: &[u8],
    ) -> Result<(), DeviceError> {
        let target = self
            .buffers
            .get(&buffer)
            .ok_or(DeviceError::InvalidHandle { kind: "buffer" })?;
        self.queue.write_buffer(target, offset, data);
        Ok(())
    }

    fn clear_target(&mut self, color: [f32; 4]) -> Result<(), DeviceError> {
        if self.recording.is_some() {
            return Err(DeviceError::CommandOrder(
                "clear_target inside a pass".to_string(),
            ));
        }
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("candela.clear"),
            });
        {
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pass.clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: color[0] as f64,
                            g: color[1] as f64,
                            b: color[2] as f64,
                            a: color[3] as f64,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn begin_depth_pass(
        &mut self,
        target: FramebufferId,
        width: u32,
        height: u32,
    ) -> Result<(), DeviceError> {
        if self.recording.is_some() {
            return Err(DeviceError::CommandOrder(
                "begin_depth_pass while another pass is open".to_string(),
            ));
        }
        let texture = *self
            .framebuffers
            .get(&target)
            .ok_or(DeviceError::InvalidHandle {
                kind: "framebuffer",
            })?;
        self.recording = Some(PassRecording {
            target: PassTarget::Shadow {
                texture,
                width,
                height,
            },
            commands: Vec::new(),
        });
        Ok(())
    }

    fn begin_color_pass(&mut self) -> Result<(), DeviceError> {
        if self.recording.is_some() {
            return Err(DeviceError::CommandOrder(
                "begin_color_pass while another pass is open".to_string(),
            ));
        }
        self.recording = Some(PassRecording {
            target: PassTarget::Frame,
            commands: Vec::new(),
        });
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: PipelineId) -> Result<(), DeviceError> {
        let kind = self
            .pipelines
            .get(&pipeline)
            .map(|entry| entry.kind)
            .ok_or(DeviceError::InvalidHandle { kind: "pipeline" })?;
        if let Some(recording) = &self.recording {
            let compatible = match recording.target {
                PassTarget::Shadow { .. } => kind == PipelineKind::DepthOnly,
                PassTarget::Frame => kind == PipelineKind::Color,
            };
            if !compatible {
                return Err(DeviceError::CommandOrder(format!(
                    "{kind:?} pipeline bound in an incompatible pass"
                )));
            }
        }
        self.record(PassCmd::SetPipeline(pipeline), "bind_pipeline")
    }

    fn bind_uniform_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidHandle { kind: "buffer" });
        }
        self.record(PassCmd::SetUniformBuffer(buffer), "bind_uniform_buffer")
    }

    fn bind_vertex_buffer(&mut self, buffer: BufferId) -> Result<(), DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(DeviceError::InvalidHandle { kind: "buffer" });
        }
        self.record(PassCmd::SetVertexBuffer(buffer), "bind_vertex_buffer")
    }

    fn bind_shadow_textures(
        &mut self,
        textures: &[Option<TextureId>],
    ) -> Result<(), DeviceError> {
        // Normalize to one slot per light so the bind group always has
        // a view for every shader binding.
        let mut slots: Vec<Option<TextureId>> = Vec::with_capacity(MAX_LIGHTS);
        for i in 0..MAX_LIGHTS {
            let slot = textures.get(i).copied().flatten();
            if let Some(texture) = slot {
                if !self.textures.contains_key(&texture) {
                    return Err(DeviceError::InvalidHandle { kind: "texture" });
                }
            }
            slots.push(slot);
        }
        self.record(PassCmd::SetShadowTextures(slots), "bind_shadow_textures")
    }

    fn draw(&mut self, vertex_count: u32) -> Result<(), DeviceError> {
        self.record(PassCmd::Draw(vertex_count), "draw")
    }

    fn end_pass(&mut self) -> Result<(), DeviceError> {
        let recording = self
            .recording
            .take()
            .ok_or_else(|| DeviceError::CommandOrder("end_pass without an open pass".to_string()))?;
        self.prepare_bind_groups(&recording)?;
        self.replay(&recording)
    }

    fn live_resource_count(&self) -> usize {
        self.buffers.len() + self.textures.len() + self.framebuffers.len() + self.pipelines.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_format_conversion() {
        assert_eq!(
            convert_vertex_format(VertexFormat::Float32x3),
            wgpu::VertexFormat::Float32x3
        );
        assert_eq!(
            convert_vertex_format(VertexFormat::Float32x2).size(),
            VertexFormat::Float32x2.size()
        );
    }

    #[test]
    fn test_cull_mode_conversion() {
        assert_eq!(convert_cull_mode(CullMode::None), None);
        assert_eq!(convert_cull_mode(CullMode::Back), Some(wgpu::Face::Back));
        assert_eq!(convert_cull_mode(CullMode::Front), Some(wgpu::Face::Front));
    }
}
