//! Typed handles for GPU resources.
//!
//! Devices hand out opaque ids instead of references. Handles carry a
//! generation so a destroyed resource's slot can be reused while stale
//! copies of the old id keep failing validation.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Opaque id for a device resource of kind `T`.
///
/// Lower 24 bits are the slot index, upper 8 bits the generation.
#[repr(transparent)]
pub struct Handle<T> {
    bits: u32,
    _marker: PhantomData<*const T>,
}

/// Marker for vertex and uniform buffers.
pub enum BufferTag {}
/// Marker for depth textures.
pub enum TextureTag {}
/// Marker for depth-only render targets.
pub enum FramebufferTag {}
/// Marker for compiled render pipelines.
pub enum PipelineTag {}

pub type BufferId = Handle<BufferTag>;
pub type TextureId = Handle<TextureTag>;
pub type FramebufferId = Handle<FramebufferTag>;
pub type PipelineId = Handle<PipelineTag>;

impl<T> Handle<T> {
    /// Largest representable slot index (24 bits).
    pub const MAX_INDEX: u32 = (1 << 24) - 1;

    #[inline]
    pub(crate) const fn new(index: u32, generation: u8) -> Self {
        debug_assert!(index <= Self::MAX_INDEX);
        Self {
            bits: (generation as u32) << 24 | index,
            _marker: PhantomData,
        }
    }

    /// Sentinel that no allocator ever produces.
    #[inline]
    pub const fn null() -> Self {
        Self {
            bits: u32::MAX,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub const fn is_null(&self) -> bool {
        self.bits == u32::MAX
    }

    #[inline]
    pub const fn index(&self) -> u32 {
        self.bits & Self::MAX_INDEX
    }

    #[inline]
    pub const fn generation(&self) -> u8 {
        (self.bits >> 24) as u8
    }
}

// Manual impls so `T` needs no bounds.
impl<T> Clone for Handle<T> {
    #[inline]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bits.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = std::any::type_name::<T>()
            .rsplit("::")
            .next()
            .unwrap_or("?");
        if self.is_null() {
            write!(f, "{}(null)", name)
        } else {
            write!(f, "{}({}v{})", name, self.index(), self.generation())
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

/// Issues handles and validates them against slot generations.
pub struct HandleAllocator<T> {
    generations: Vec<u8>,
    free_list: Vec<u32>,
    next_fresh: u32,
    _marker: PhantomData<T>,
}

impl<T> HandleAllocator<T> {
    pub fn new() -> Self {
        Self {
            generations: Vec::new(),
            free_list: Vec::new(),
            next_fresh: 0,
            _marker: PhantomData,
        }
    }

    /// Issue a fresh handle, reusing a released slot when one exists.
    pub fn allocate(&mut self) -> Handle<T> {
        if let Some(index) = self.free_list.pop() {
            let generation = self.generations[index as usize];
            return Handle::new(index, generation);
        }
        let index = self.next_fresh;
        if index > Handle::<T>::MAX_INDEX {
            panic!("handle space exhausted");
        }
        self.next_fresh += 1;
        self.generations.push(0);
        Handle::new(index, 0)
    }

    /// Release a handle. Returns `false` if it was null, stale, or
    /// never issued; the slot's generation bumps so stale copies fail
    /// [`is_live`](Self::is_live) from now on.
    pub fn release(&mut self, handle: Handle<T>) -> bool {
        if handle.is_null() {
            return false;
        }
        let index = handle.index() as usize;
        if index >= self.generations.len() {
            return false;
        }
        let generation = &mut self.generations[index];
        if *generation != handle.generation() {
            return false;
        }
        *generation = generation.wrapping_add(1);
        self.free_list.push(handle.index());
        true
    }

    pub fn is_live(&self, handle: Handle<T>) -> bool {
        if handle.is_null() {
            return false;
        }
        let index = handle.index() as usize;
        index < self.generations.len() && self.generations[index] == handle.generation()
    }

    /// Handles issued and not yet released.
    pub fn live_count(&self) -> usize {
        self.generations.len() - self.free_list.len()
    }
}

impl<T> Default for HandleAllocator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_and_release() {
        let mut alloc: HandleAllocator<BufferTag> = HandleAllocator::new();
        let a = alloc.allocate();
        let b = alloc.allocate();

        assert!(alloc.is_live(a));
        assert!(alloc.is_live(b));
        assert_ne!(a, b);
        assert_eq!(alloc.live_count(), 2);

        assert!(alloc.release(a));
        assert!(!alloc.is_live(a));
        assert_eq!(alloc.live_count(), 1);
    }

    #[test]
    fn test_slot_reuse_bumps_generation() {
        let mut alloc: HandleAllocator<TextureTag> = HandleAllocator::new();
        let first = alloc.allocate();
        alloc.release(first);

        let second = alloc.allocate();
        assert_eq!(second.index(), first.index());
        assert_ne!(second.generation(), first.generation());
        assert!(!alloc.is_live(first));
        assert!(alloc.is_live(second));
    }

    #[test]
    fn test_double_release_rejected() {
        let mut alloc: HandleAllocator<FramebufferTag> = HandleAllocator::new();
        let h = alloc.allocate();
        assert!(alloc.release(h));
        assert!(!alloc.release(h));
        assert_eq!(alloc.live_count(), 0);
    }

    #[test]
    fn test_null_handle_never_live() {
        let mut alloc: HandleAllocator<PipelineTag> = HandleAllocator::new();
        let null = PipelineId::null();
        assert!(null.is_null());
        assert!(!alloc.is_live(null));
        assert!(!alloc.release(null));
    }
}
