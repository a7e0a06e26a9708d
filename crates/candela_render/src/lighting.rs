//! Bounded light list.
//!
//! Lights live in slots 0..[`MAX_LIGHTS`]. Removal shifts later lights
//! down, so an index always refers to the current occupant of that
//! slot, not to the light that originally received it. Each slot
//! carries its own shadow map, allocated when the light is added.

use glam::Vec3;

use crate::device::RenderDevice;
use crate::error::LightError;
use crate::shadow::{ShadowConfig, ShadowMap};

/// Maximum number of simultaneous lights.
pub const MAX_LIGHTS: usize = 8;

/// A point light. Shadow projection looks from `position` toward the
/// scene origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Light {
    pub position: Vec3,
    /// Linear RGB.
    pub color: Vec3,
    pub intensity: f32,
    /// Distance beyond which the light contributes nothing. Also the
    /// far plane of its shadow projection.
    pub influence_radius: f32,
}

impl Light {
    /// Intensity clamps to zero or above, the radius to a small
    /// positive minimum so the shadow projection stays well-formed.
    pub fn new(position: Vec3, color: Vec3, intensity: f32, influence_radius: f32) -> Self {
        Self {
            position,
            color,
            intensity: intensity.max(0.0),
            influence_radius: influence_radius.max(0.01),
        }
    }
}

struct LightEntry {
    light: Light,
    shadow_map: ShadowMap,
}

/// Lights plus their shadow maps, capped at [`MAX_LIGHTS`].
pub struct LightSet {
    entries: Vec<LightEntry>,
    shadow: ShadowConfig,
    overflow_count: u32,
}

impl LightSet {
    pub fn new(shadow: ShadowConfig) -> Self {
        Self {
            entries: Vec::with_capacity(MAX_LIGHTS),
            shadow,
            overflow_count: 0,
        }
    }

    /// Add a light, returning its slot index.
    ///
    /// A full set rejects the light and leaves existing slots
    /// untouched. A shadow map allocation failure does not reject the
    /// light; the slot is kept and simply casts no shadow.
    pub fn add<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        light: Light,
    ) -> Result<usize, LightError> {
        if self.entries.len() >= MAX_LIGHTS {
            self.overflow_count += 1;
            log::debug!("light rejected: all {MAX_LIGHTS} slots occupied");
            return Err(LightError::CapacityExceeded {
                capacity: MAX_LIGHTS,
            });
        }

        let index = self.entries.len();
        let mut shadow_map = ShadowMap::new(self.shadow.resolution);
        let label = format!("shadow_map[{index}]");
        if let Err(err) = shadow_map.initialize(device, &label) {
            log::warn!("light {index}: shadow map allocation failed ({err}), no shadow for this light");
        }
        self.entries.push(LightEntry { light, shadow_map });
        Ok(index)
    }

    /// Replace the light in `index`'s slot, keeping its shadow map.
    pub fn update(&mut self, index: usize, light: Light) -> Result<(), LightError> {
        let len = self.entries.len();
        match self.entries.get_mut(index) {
            Some(entry) => {
                entry.light = light;
                Ok(())
            }
            None => Err(LightError::IndexOutOfRange { index, len }),
        }
    }

    /// Remove the light in `index`'s slot and release its shadow map.
    /// Later lights shift down one slot.
    pub fn remove<D: RenderDevice + ?Sized>(
        &mut self,
        device: &mut D,
        index: usize,
    ) -> Result<(), LightError> {
        if index >= self.entries.len() {
            return Err(LightError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            });
        }
        let mut entry = self.entries.remove(index);
        entry.shadow_map.release(device);
        Ok(())
    }

    /// Remove every light and release every shadow map. Never fails;
    /// an empty set is left empty.
    pub fn clear<D: RenderDevice + ?Sized>(&mut self, device: &mut D) {
        for entry in &mut self.entries {
            entry.shadow_map.release(device);
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        MAX_LIGHTS
    }

    pub fn get(&self, index: usize) -> Option<&Light> {
        self.entries.get(index).map(|entry| &entry.light)
    }

    pub fn entry(&self, index: usize) -> Option<(&Light, &ShadowMap)> {
        self.entries
            .get(index)
            .map(|entry| (&entry.light, &entry.shadow_map))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Light> {
        self.entries.iter().map(|entry| &entry.light)
    }

    /// Lights with their shadow maps, in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (&Light, &ShadowMap)> {
        self.entries
            .iter()
            .map(|entry| (&entry.light, &entry.shadow_map))
    }

    /// Like [`entries`](Self::entries), with mutable map access for
    /// the depth pass.
    pub fn entries_mut(&mut self) -> impl Iterator<Item = (&Light, &mut ShadowMap)> {
        self.entries
            .iter_mut()
            .map(|entry| (&entry.light, &mut entry.shadow_map))
    }

    /// Lights rejected because the set was full.
    pub fn overflow_count(&self) -> u32 {
        self.overflow_count
    }
}
