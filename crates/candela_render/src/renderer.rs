//! Renderer facade.
//!
//! One `Renderer` owns a device, the fixed shader pipelines, three
//! pre-built primitive meshes and the light set. Everything a frame
//! needs is created by [`init`](Renderer::init) and destroyed by
//! [`cleanup`](Renderer::cleanup); between the two, `draw_*` calls
//! render one shadowed primitive each.

use glam::{Mat4, Vec2, Vec3};

use candela_shader::{ShaderCompiler, ShaderError, ShaderProgram, ShaderSource};

use crate::config::{RendererConfig, ShaderSet};
use crate::device::{
    BufferId, CullMode, PipelineDesc, PipelineId, PipelineKind, RenderDevice, TextureId,
};
use crate::error::{DeviceError, RenderError};
use crate::lighting::{Light, LightSet, MAX_LIGHTS};
use crate::mesh::{self, GpuMesh, Vertex};
use crate::shadow::ShadowPass;
use crate::stats::RenderStats;
use crate::uniform::UniformChannel;

#[derive(Clone, Copy)]
enum MeshKind {
    Triangle,
    Rectangle,
    Circle,
}

/// Everything allocated by `init` and torn down by `cleanup`.
struct FrameResources {
    pipeline: PipelineId,
    channel: UniformChannel,
    shadow_pass: ShadowPass,
    triangle: GpuMesh,
    rectangle: GpuMesh,
    circle: GpuMesh,
}

/// Handles created during `init`, recorded so a mid-init failure can
/// destroy them in reverse order.
#[derive(Default)]
struct InitGuard {
    buffers: Vec<BufferId>,
    pipelines: Vec<PipelineId>,
}

impl InitGuard {
    fn rollback<D: RenderDevice>(self, device: &mut D) {
        for pipeline in self.pipelines.into_iter().rev() {
            if let Err(err) = device.destroy_pipeline(pipeline) {
                log::error!("rollback failed to destroy pipeline: {err}");
            }
        }
        for buffer in self.buffers.into_iter().rev() {
            if let Err(err) = device.destroy_buffer(buffer) {
                log::error!("rollback failed to destroy buffer: {err}");
            }
        }
    }
}

/// Forward renderer over an abstract device.
pub struct Renderer<D: RenderDevice> {
    device: D,
    config: RendererConfig,
    resources: Option<FrameResources>,
    view: Mat4,
    projection: Mat4,
    clear_color: [f32; 4],
    ambient: Vec3,
    object_color: Vec3,
    lights: LightSet,
    stats: RenderStats,
}

impl<D: RenderDevice> Renderer<D> {
    /// Wrap `device` without touching it. Nothing is allocated until
    /// [`init`](Self::init).
    pub fn new(device: D, config: RendererConfig) -> Self {
        let lights = LightSet::new(config.shadow);
        Self {
            device,
            clear_color: config.clear_color,
            config,
            resources: None,
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            ambient: Vec3::splat(0.1),
            object_color: Vec3::splat(0.8),
            lights,
            stats: RenderStats::default(),
        }
    }

    /// Compile both shaders and build every long-lived GPU resource.
    ///
    /// Fails without side effects: if any step errors, everything
    /// created so far is destroyed and the renderer stays
    /// uninitialized. Calling `init` on an initialized renderer is a
    /// no-op.
    pub fn init(&mut self) -> Result<(), RenderError> {
        if self.resources.is_some() {
            log::debug!("init called on an initialized renderer, ignoring");
            return Ok(());
        }

        // Shader work happens before any GPU allocation, so a compile
        // failure needs no rollback.
        let (basic_source, shadow_source) = self.load_sources()?;
        let compiler = ShaderCompiler::new();
        let basic = compiler.compile(&basic_source)?;
        basic.require_fragment()?;
        let shadow = compiler.compile(&shadow_source)?;

        let mut guard = InitGuard::default();
        match self.create_resources(&basic, &shadow, &mut guard) {
            Ok(resources) => {
                self.resources = Some(resources);
                log::info!(
                    "renderer initialized ({} light slots, {}-segment circle)",
                    MAX_LIGHTS,
                    self.config.circle_segments.max(3)
                );
                Ok(())
            }
            Err(err) => {
                log::error!("renderer init failed: {err}");
                guard.rollback(&mut self.device);
                Err(err.into())
            }
        }
    }

    fn load_sources(&self) -> Result<(ShaderSource, ShaderSource), ShaderError> {
        match &self.config.shaders {
            ShaderSet::Files { base_path } => Ok((
                ShaderSource::from_file(base_path.join("basic.wgsl"))?,
                ShaderSource::from_file(base_path.join("shadow.wgsl"))?,
            )),
            ShaderSet::Inline { basic, shadow } => Ok((
                ShaderSource::from_str("basic", basic.as_str()),
                ShaderSource::from_str("shadow", shadow.as_str()),
            )),
        }
    }

    fn create_resources(
        &mut self,
        basic: &ShaderProgram,
        shadow: &ShaderProgram,
        guard: &mut InitGuard,
    ) -> Result<FrameResources, DeviceError> {
        let triangle = GpuMesh::upload(&mut self.device, "mesh.triangle", &mesh::triangle())?;
        guard.buffers.push(triangle.buffer);
        let rectangle = GpuMesh::upload(&mut self.device, "mesh.rectangle", &mesh::rectangle())?;
        guard.buffers.push(rectangle.buffer);
        let circle = GpuMesh::upload(
            &mut self.device,
            "mesh.circle",
            &mesh::circle(self.config.circle_segments),
        )?;
        guard.buffers.push(circle.buffer);

        let frame_block = basic.uniforms().primary().cloned().unwrap_or_default();
        let channel = UniformChannel::new(&mut self.device, "uniforms.frame", &frame_block)?;
        guard.buffers.push(channel.buffer());

        let shadow_block = shadow.uniforms().primary().cloned().unwrap_or_default();
        let shadow_channel = UniformChannel::new(&mut self.device, "uniforms.shadow", &shadow_block)?;
        guard.buffers.push(shadow_channel.buffer());

        let pipeline = self.device.create_pipeline(&PipelineDesc {
            label: "pipeline.color",
            program: basic,
            kind: PipelineKind::Color,
            cull: CullMode::Back,
            depth_test: true,
            depth_write: true,
            vertex_stride: Vertex::STRIDE,
            vertex_attributes: Vertex::ATTRIBUTES,
        })?;
        guard.pipelines.push(pipeline);

        // Front-face culling in the depth pass pushes acne onto back
        // faces the comparison bias already covers.
        let shadow_pipeline = self.device.create_pipeline(&PipelineDesc {
            label: "pipeline.shadow",
            program: shadow,
            kind: PipelineKind::DepthOnly,
            cull: CullMode::Front,
            depth_test: true,
            depth_write: true,
            vertex_stride: Vertex::STRIDE,
            vertex_attributes: Vertex::ATTRIBUTES,
        })?;
        guard.pipelines.push(shadow_pipeline);

        Ok(FrameResources {
            pipeline,
            channel,
            shadow_pass: ShadowPass::new(shadow_pipeline, shadow_channel, self.config.shadow),
            triangle,
            rectangle,
            circle,
        })
    }

    /// Clear color and depth with the current clear color and reset
    /// the frame stats.
    pub fn clear(&mut self) -> Result<(), RenderError> {
        self.require_initialized()?;
        self.stats.reset();
        self.device.clear_target(self.clear_color)?;
        Ok(())
    }

    // --- scene state ---

    pub fn set_view_matrix(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn set_projection_matrix(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }

    pub fn set_object_color(&mut self, color: Vec3) {
        self.object_color = color;
    }

    // --- lights ---

    /// Add a light (and allocate its shadow map), returning its slot.
    pub fn add_light(&mut self, light: Light) -> Result<usize, RenderError> {
        self.require_initialized()?;
        Ok(self.lights.add(&mut self.device, light)?)
    }

    pub fn update_light(&mut self, index: usize, light: Light) -> Result<(), RenderError> {
        self.require_initialized()?;
        Ok(self.lights.update(index, light)?)
    }

    pub fn remove_light(&mut self, index: usize) -> Result<(), RenderError> {
        self.require_initialized()?;
        Ok(self.lights.remove(&mut self.device, index)?)
    }

    /// Drop every light and its shadow map. Never fails; on an
    /// uninitialized renderer the set is already empty.
    pub fn clear_lights(&mut self) {
        self.lights.clear(&mut self.device);
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    // --- drawing ---

    pub fn draw_triangle(&mut self, position: Vec3, size: f32) -> Result<(), RenderError> {
        let model =
            Mat4::from_translation(position) * Mat4::from_scale(Vec3::new(size, size, 1.0));
        self.draw_mesh(MeshKind::Triangle, model)
    }

    pub fn draw_rectangle(&mut self, position: Vec3, size: Vec2) -> Result<(), RenderError> {
        let model =
            Mat4::from_translation(position) * Mat4::from_scale(Vec3::new(size.x, size.y, 1.0));
        self.draw_mesh(MeshKind::Rectangle, model)
    }

    pub fn draw_circle(&mut self, position: Vec3, radius: f32) -> Result<(), RenderError> {
        // The unit circle has diameter 1.
        let diameter = radius * 2.0;
        let model = Mat4::from_translation(position)
            * Mat4::from_scale(Vec3::new(diameter, diameter, 1.0));
        self.draw_mesh(MeshKind::Circle, model)
    }

    fn draw_mesh(&mut self, kind: MeshKind, model: Mat4) -> Result<(), RenderError> {
        let resources = self.resources.as_mut().ok_or(RenderError::NotInitialized)?;
        let mesh = match kind {
            MeshKind::Triangle => resources.triangle,
            MeshKind::Rectangle => resources.rectangle,
            MeshKind::Circle => resources.circle,
        };

        // Every light's depth pass completes before the color pass
        // starts, so the color pass samples finished maps only.
        resources.shadow_pass.run(
            &mut self.device,
            &mut self.lights,
            &mesh,
            model,
            &mut self.stats,
        )?;

        self.device.begin_color_pass()?;
        self.device.bind_pipeline(resources.pipeline)?;
        self.device.bind_uniform_buffer(resources.channel.buffer())?;

        let channel = &mut resources.channel;
        channel.set_uniform("view", self.view);
        channel.set_uniform("projection", self.projection);
        channel.set_uniform("model", model);
        channel.set_uniform("ambient", self.ambient);
        channel.set_uniform("object_color", self.object_color);
        channel.set_uniform("shadow_bias", self.config.shadow.depth_bias);
        channel.set_uniform("light_count", self.lights.len() as u32);
        for (i, (light, map)) in self.lights.entries().enumerate() {
            channel.set_uniform(&format!("lights[{i}].position"), light.position);
            channel.set_uniform(&format!("lights[{i}].color"), light.color);
            channel.set_uniform(&format!("lights[{i}].intensity"), light.intensity);
            channel.set_uniform(&format!("lights[{i}].radius"), light.influence_radius);
            channel.set_uniform(&format!("light_space[{i}]"), map.light_space());
        }
        channel.flush(&mut self.device)?;

        let mut shadow_textures: Vec<Option<TextureId>> = Vec::with_capacity(MAX_LIGHTS);
        for (_, map) in self.lights.entries() {
            shadow_textures.push(if map.is_valid() { map.depth_texture() } else { None });
        }
        shadow_textures.resize(MAX_LIGHTS, None);
        self.device.bind_shadow_textures(&shadow_textures)?;

        self.device.bind_vertex_buffer(mesh.buffer)?;
        self.device.draw(mesh.vertex_count)?;
        self.device.end_pass()?;

        self.stats.draw_calls += 1;
        self.stats.triangles += mesh.triangle_count() as u64;
        self.stats.uniform_skips += resources.channel.take_skips();
        self.stats.lights = self.lights.len() as u32;
        Ok(())
    }

    // --- lifecycle ---

    /// Destroy every GPU resource this renderer created, including all
    /// shadow maps. Safe to call repeatedly and on an uninitialized
    /// renderer.
    pub fn cleanup(&mut self) {
        let had_resources = self.resources.is_some();
        if let Some(mut resources) = self.resources.take() {
            resources.shadow_pass.release(&mut self.device);
            if let Err(err) = resources.channel.release(&mut self.device) {
                log::error!("failed to destroy frame uniform buffer: {err}");
            }
            if let Err(err) = self.device.destroy_pipeline(resources.pipeline) {
                log::error!("failed to destroy color pipeline: {err}");
            }
            for mesh in [resources.triangle, resources.rectangle, resources.circle] {
                if let Err(err) = self.device.destroy_buffer(mesh.buffer) {
                    log::error!("failed to destroy mesh buffer: {err}");
                }
            }
        }
        self.lights.clear(&mut self.device);
        if had_resources {
            log::info!("renderer shut down");
        }
    }

    // --- introspection ---

    fn require_initialized(&self) -> Result<(), RenderError> {
        if self.resources.is_none() {
            return Err(RenderError::NotInitialized);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.resources.is_some()
    }

    pub fn stats(&self) -> &RenderStats {
        &self.stats
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

impl<D: RenderDevice> Drop for Renderer<D> {
    fn drop(&mut self) {
        if self.resources.is_some() {
            log::debug!("renderer dropped while initialized, releasing resources");
            self.cleanup();
        }
    }
}
