//! Named uniform uploads.
//!
//! A [`UniformChannel`] pairs one reflected uniform block with a GPU
//! buffer and a CPU staging copy. Writes go by flattened member name
//! ("view", "lights[2].color"); a name the active shader does not
//! declare is dropped without error so scene code can set a superset
//! of what any one shader consumes.

use std::collections::HashSet;

use glam::{Mat4, Vec2, Vec3, Vec4};

use candela_shader::{UniformBlock, UniformKind};

use crate::device::{BufferId, RenderDevice};
use crate::error::DeviceError;

/// A value destined for a uniform slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
}

impl UniformValue {
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Int(_) => UniformKind::Int,
            UniformValue::UInt(_) => UniformKind::UInt,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Vec4(_) => UniformKind::Vec4,
            UniformValue::Mat4(_) => UniformKind::Mat4,
        }
    }

    fn write_to(&self, out: &mut [u8]) {
        match self {
            UniformValue::Float(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Int(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::UInt(v) => out.copy_from_slice(bytemuck::bytes_of(v)),
            UniformValue::Vec2(v) => out.copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Vec3(v) => out.copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Vec4(v) => out.copy_from_slice(bytemuck::bytes_of(&v.to_array())),
            UniformValue::Mat4(v) => {
                out.copy_from_slice(bytemuck::bytes_of(&v.to_cols_array()))
            }
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for UniformValue {
    fn from(v: u32) -> Self {
        Self::UInt(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        Self::Vec2(v)
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        Self::Vec3(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(Vec3::from_array(v))
    }
}

impl From<Vec4> for UniformValue {
    fn from(v: Vec4) -> Self {
        Self::Vec4(v)
    }
}

impl From<Mat4> for UniformValue {
    fn from(v: Mat4) -> Self {
        Self::Mat4(v)
    }
}

/// Staged uniform block with name-addressed writes.
pub struct UniformChannel {
    block: UniformBlock,
    staging: Vec<u8>,
    buffer: BufferId,
    dirty: bool,
    skips: u32,
    warned: HashSet<String>,
}

impl UniformChannel {
    /// Allocate the backing buffer for `block` on `device`.
    pub fn new<D: RenderDevice + ?Sized>(
        device: &mut D,
        label: &str,
        block: &UniformBlock,
    ) -> Result<Self, DeviceError> {
        // A block with no slots still gets a minimal buffer so the
        // pipeline's bind group stays valid.
        let buffer = device.create_uniform_buffer(label, u64::from(block.size.max(16)))?;
        Ok(Self {
            block: block.clone(),
            staging: vec![0u8; block.size as usize],
            buffer,
            // Upload the zeroed block on first flush.
            dirty: true,
            skips: 0,
            warned: HashSet::new(),
        })
    }

    /// Stage a value for the named slot. Returns `false` without
    /// staging anything when the shader has no slot with that name or
    /// the value's type does not match the slot.
    pub fn set_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> bool {
        let value = value.into();
        let slot = match self.block.slot(name) {
            Some(slot) => *slot,
            None => {
                self.skips += 1;
                log::trace!(
                    "uniform '{}' not declared by block '{}', skipping",
                    name,
                    self.block.name
                );
                return false;
            }
        };

        if slot.kind != value.kind() {
            if self.warned.insert(name.to_string()) {
                log::warn!(
                    "uniform '{}' is {:?} but a {:?} was written, skipping",
                    name,
                    slot.kind,
                    value.kind()
                );
            }
            self.skips += 1;
            return false;
        }

        let start = slot.offset as usize;
        let end = start + slot.size as usize;
        value.write_to(&mut self.staging[start..end]);
        self.dirty = true;
        true
    }

    /// Upload the staged block if anything changed since the last
    /// flush.
    pub fn flush<D: RenderDevice + ?Sized>(&mut self, device: &mut D) -> Result<(), DeviceError> {
        if !self.dirty {
            return Ok(());
        }
        device.write_buffer(self.buffer, 0, &self.staging)?;
        self.dirty = false;
        Ok(())
    }

    pub fn buffer(&self) -> BufferId {
        self.buffer
    }

    /// Dropped writes since the last call, for frame stats.
    pub fn take_skips(&mut self) -> u32 {
        std::mem::take(&mut self.skips)
    }

    /// Destroy the backing buffer.
    pub fn release<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
    ) -> Result<(), DeviceError> {
        device.destroy_buffer(self.buffer)
    }
}
