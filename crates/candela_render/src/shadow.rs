//! Shadow map resources and the per-light depth pass.
//!
//! Each light owns one square depth map. Maps allocate lazily when the
//! light is added and survive until the light is removed or the
//! renderer shuts down. A map that fails to allocate is marked invalid
//! and its light simply casts no shadow; rendering continues.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::device::{FramebufferId, PipelineId, RenderDevice, TextureId};
use crate::error::DeviceError;
use crate::lighting::{Light, LightSet};
use crate::mesh::GpuMesh;
use crate::stats::RenderStats;
use crate::uniform::UniformChannel;

/// Default shadow map width in texels.
pub const SHADOW_WIDTH: u32 = 1024;
/// Default shadow map height in texels. Maps are square.
pub const SHADOW_HEIGHT: u32 = 1024;

/// Shadow settings shared by every light.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Edge length of the square depth map.
    pub resolution: u32,
    /// Near plane of the light's projection.
    pub near_plane: f32,
    /// Depth offset subtracted when comparing fragments against the
    /// map, to suppress acne.
    pub depth_bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            resolution: SHADOW_WIDTH,
            near_plane: 0.1,
            depth_bias: 0.005,
        }
    }
}

/// Light-space matrix for a point light looking at the origin.
///
/// The direction degenerates for a light at the origin (falls back to
/// -Z) and the up vector flips to +Z when the light sits on the Y
/// axis, so the result is always a valid basis.
pub fn compute_light_space(light: &Light, config: &ShadowConfig) -> Mat4 {
    let eye = light.position;
    let dir = (Vec3::ZERO - eye).try_normalize().unwrap_or(Vec3::NEG_Z);
    let up = if dir.y.abs() > 0.95 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(eye, eye + dir, up);

    let far = light.influence_radius.max(config.near_plane + 1.0);
    let proj = Mat4::perspective_rh(std::f32::consts::FRAC_PI_2, 1.0, config.near_plane, far);
    proj * view
}

/// Depth texture + framebuffer pair for one light.
///
/// Holds either both handles or neither; a half-built pair never
/// escapes [`initialize`](Self::initialize).
#[derive(Debug)]
pub struct ShadowMap {
    depth_texture: Option<TextureId>,
    framebuffer: Option<FramebufferId>,
    light_space: Mat4,
    invalid: bool,
    resolution: u32,
}

impl ShadowMap {
    pub fn new(resolution: u32) -> Self {
        Self {
            depth_texture: None,
            framebuffer: None,
            light_space: Mat4::IDENTITY,
            invalid: false,
            resolution,
        }
    }

    /// Allocate the depth texture and framebuffer. Calling again after
    /// a successful allocation is a no-op. On failure nothing stays
    /// allocated and the map is marked invalid.
    pub fn initialize<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        label: &str,
    ) -> Result<(), DeviceError> {
        if self.is_initialized() {
            return Ok(());
        }

        let texture = match device.create_depth_texture(label, self.resolution, self.resolution) {
            Ok(texture) => texture,
            Err(err) => {
                self.invalid = true;
                return Err(err);
            }
        };
        let framebuffer = match device.create_framebuffer(label, texture) {
            Ok(framebuffer) => framebuffer,
            Err(err) => {
                if let Err(destroy_err) = device.destroy_texture(texture) {
                    log::error!("failed to destroy orphaned shadow texture: {destroy_err}");
                }
                self.invalid = true;
                return Err(err);
            }
        };

        self.depth_texture = Some(texture);
        self.framebuffer = Some(framebuffer);
        self.invalid = false;
        log::debug!(
            "allocated {}x{} shadow map '{}'",
            self.resolution,
            self.resolution,
            label
        );
        Ok(())
    }

    /// Destroy both handles. Safe to call on an uninitialized map and
    /// safe to call twice.
    pub fn release<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        if let Some(framebuffer) = self.framebuffer.take() {
            if let Err(err) = device.destroy_framebuffer(framebuffer) {
                log::error!("failed to destroy shadow framebuffer: {err}");
            }
        }
        if let Some(texture) = self.depth_texture.take() {
            if let Err(err) = device.destroy_texture(texture) {
                log::error!("failed to destroy shadow texture: {err}");
            }
        }
        self.invalid = false;
    }

    pub fn is_initialized(&self) -> bool {
        debug_assert_eq!(self.depth_texture.is_some(), self.framebuffer.is_some());
        self.depth_texture.is_some()
    }

    /// Initialized and usable as a depth pass target.
    pub fn is_valid(&self) -> bool {
        self.is_initialized() && !self.invalid
    }

    pub fn depth_texture(&self) -> Option<TextureId> {
        self.depth_texture
    }

    pub fn framebuffer(&self) -> Option<FramebufferId> {
        self.framebuffer
    }

    /// Light-space matrix from the last transform update.
    pub fn light_space(&self) -> Mat4 {
        self.light_space
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn update_transform(&mut self, light: &Light, config: &ShadowConfig) {
        self.light_space = compute_light_space(light, config);
    }
}

/// Renders one depth-only pass per shadow-casting light.
pub struct ShadowPass {
    pipeline: PipelineId,
    channel: UniformChannel,
    config: ShadowConfig,
}

impl ShadowPass {
    pub fn new(pipeline: PipelineId, channel: UniformChannel, config: ShadowConfig) -> Self {
        Self {
            pipeline,
            channel,
            config,
        }
    }

    /// Render `mesh` into every valid shadow map, in light slot order.
    /// All depth passes complete before the caller opens its color
    /// pass. Lights whose map failed to allocate are skipped and
    /// counted in `stats.shadow_skipped`.
    pub fn run<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        lights: &mut LightSet,
        mesh: &GpuMesh,
        model: Mat4,
        stats: &mut RenderStats,
    ) -> Result<(), DeviceError> {
        let config = self.config;
        for (index, (light, map)) in lights.entries_mut().enumerate() {
            if !map.is_valid() {
                stats.shadow_skipped += 1;
                log::trace!("light {index} has no valid shadow map, skipping depth pass");
                continue;
            }
            map.update_transform(light, &config);
            let target = match map.framebuffer() {
                Some(framebuffer) => framebuffer,
                None => continue,
            };

            device.begin_depth_pass(target, map.resolution(), map.resolution())?;
            device.bind_pipeline(self.pipeline)?;
            device.bind_uniform_buffer(self.channel.buffer())?;
            self.channel.set_uniform("light_space", map.light_space());
            self.channel.set_uniform("model", model);
            self.channel.flush(device)?;
            device.bind_vertex_buffer(mesh.buffer)?;
            device.draw(mesh.vertex_count)?;
            device.end_pass()?;

            stats.shadow_passes += 1;
            stats.triangles += mesh.triangle_count() as u64;
        }
        stats.uniform_skips += self.channel.take_skips();
        Ok(())
    }

    /// Destroy the pass's pipeline and uniform buffer.
    pub fn release<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        if let Err(err) = self.channel.release(device) {
            log::error!("failed to destroy shadow uniform buffer: {err}");
        }
        if let Err(err) = device.destroy_pipeline(self.pipeline) {
            log::error!("failed to destroy shadow pipeline: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceEvent, NullDevice, ResourceKind};

    fn light_at(position: Vec3) -> Light {
        Light::new(position, Vec3::ONE, 1.0, 25.0)
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let mut device = NullDevice::new();
        let mut map = ShadowMap::new(1024);

        map.initialize(&mut device, "shadow0").unwrap();
        assert!(map.is_valid());
        assert_eq!(device.live_resource_count(), 2);

        map.initialize(&mut device, "shadow0").unwrap();
        assert_eq!(device.live_resource_count(), 2);
        assert_eq!(
            device.texture_size(map.depth_texture().unwrap()),
            Some((1024, 1024))
        );
    }

    #[test]
    fn test_failed_framebuffer_leaves_no_orphan() {
        let mut device = NullDevice::new();
        let mut map = ShadowMap::new(1024);
        device.set_fail_next_create(ResourceKind::Framebuffer);

        assert!(map.initialize(&mut device, "shadow0").is_err());
        assert!(!map.is_initialized());
        assert!(!map.is_valid());
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn test_failed_texture_marks_invalid() {
        let mut device = NullDevice::new();
        let mut map = ShadowMap::new(1024);
        device.set_fail_next_create(ResourceKind::Texture);

        assert!(map.initialize(&mut device, "shadow0").is_err());
        assert!(!map.is_valid());
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut device = NullDevice::new();
        let mut map = ShadowMap::new(1024);
        map.initialize(&mut device, "shadow0").unwrap();

        map.release(&mut device);
        assert_eq!(device.live_resource_count(), 0);
        assert!(!map.is_initialized());

        // Second release has nothing left to destroy.
        map.release(&mut device);
        assert_eq!(device.live_resource_count(), 0);
    }

    #[test]
    fn test_light_space_is_deterministic() {
        let config = ShadowConfig::default();
        let light = light_at(Vec3::new(4.0, 6.0, -3.0));
        assert_eq!(
            compute_light_space(&light, &config),
            compute_light_space(&light, &config)
        );
    }

    #[test]
    fn test_light_space_handles_degenerate_positions() {
        let config = ShadowConfig::default();

        // Directly overhead: the default up vector would be colinear
        // with the view direction.
        let overhead = compute_light_space(&light_at(Vec3::new(0.0, 10.0, 0.0)), &config);
        assert!(overhead.to_cols_array().iter().all(|v| v.is_finite()));

        // At the origin: no direction toward the target at all.
        let centered = compute_light_space(&light_at(Vec3::ZERO), &config);
        assert!(centered.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_pass_skips_invalid_maps_in_slot_order() {
        let mut device = NullDevice::new();
        let config = ShadowConfig::default();
        let mut lights = LightSet::new(config);

        lights.add(&mut device, light_at(Vec3::new(0.0, 5.0, 0.0))).unwrap();
        device.set_fail_next_create(ResourceKind::Texture);
        lights.add(&mut device, light_at(Vec3::new(5.0, 0.0, 0.0))).unwrap();
        lights.add(&mut device, light_at(Vec3::new(0.0, 0.0, 5.0))).unwrap();

        let pass_targets: Vec<FramebufferId> = {
            use candela_shader::{ShaderCompiler, ShaderSource};
            use crate::device::{CullMode, PipelineDesc, PipelineKind};
            use crate::mesh::{self, Vertex};

            let program = ShaderCompiler::new()
                .compile(&ShaderSource::from_str(
                    "shadow",
                    include_str!("../../../shaders/shadow.wgsl"),
                ))
                .unwrap();
            let pipeline = device
                .create_pipeline(&PipelineDesc {
                    label: "shadow",
                    program: &program,
                    kind: PipelineKind::DepthOnly,
                    cull: CullMode::Front,
                    depth_test: true,
                    depth_write: true,
                    vertex_stride: Vertex::STRIDE,
                    vertex_attributes: Vertex::ATTRIBUTES,
                })
                .unwrap();
            let channel = UniformChannel::new(
                &mut device,
                "shadow",
                program.uniforms().primary().unwrap(),
            )
            .unwrap();
            let mesh = GpuMesh::upload(&mut device, "tri", &mesh::triangle()).unwrap();

            let mut pass = ShadowPass::new(pipeline, channel, config);
            let mut stats = RenderStats::default();
            device.clear_events();
            pass.run(&mut device, &mut lights, &mesh, Mat4::IDENTITY, &mut stats)
                .unwrap();

            assert_eq!(stats.shadow_passes, 2);
            assert_eq!(stats.shadow_skipped, 1);

            device
                .events()
                .iter()
                .filter_map(|event| match event {
                    DeviceEvent::DepthPassBegun { target } => Some(*target),
                    _ => None,
                })
                .collect()
        };

        // Lights 0 and 2 have maps; light 1's allocation failed.
        let expected: Vec<FramebufferId> = [0usize, 2]
            .iter()
            .map(|&i| lights.entry(i).unwrap().1.framebuffer().unwrap())
            .collect();
        assert_eq!(pass_targets, expected);
    }
}
