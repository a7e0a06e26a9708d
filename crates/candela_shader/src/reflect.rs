//! Uniform-block reflection
//!
//! Walks a module's `var<uniform>` globals and flattens every addressable
//! member into a name -> byte-offset map. Nested structs flatten as
//! `outer.inner`, arrays as `name[i]`, so host code can address uniforms
//! with the same strings a GL-style engine would pass to the driver:
//! `"view"`, `"lights[3].color"`, `"light_space[0]"`.

use std::collections::HashMap;

/// Value type of a single uniform slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UniformKind {
    Float,
    Int,
    UInt,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformKind {
    /// Size of the value in bytes.
    pub const fn size(&self) -> u32 {
        match self {
            Self::Float | Self::Int | Self::UInt => 4,
            Self::Vec2 => 8,
            Self::Vec3 => 12,
            Self::Vec4 => 16,
            Self::Mat4 => 64,
        }
    }
}

/// One addressable member of a uniform block.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UniformSlot {
    /// Byte offset within the block.
    pub offset: u32,
    /// Value size in bytes.
    pub size: u32,
    /// Value type.
    pub kind: UniformKind,
}

/// A `var<uniform>` global with its flattened members.
#[derive(Clone, Debug, Default)]
pub struct UniformBlock {
    /// Variable name in the shader.
    pub name: String,
    /// Binding group.
    pub group: u32,
    /// Binding index within the group.
    pub binding: u32,
    /// Total block size in bytes.
    pub size: u32,
    slots: HashMap<String, UniformSlot>,
}

impl UniformBlock {
    /// Look up a member by its flattened name.
    pub fn slot(&self, name: &str) -> Option<&UniformSlot> {
        self.slots.get(name)
    }

    /// Whether the block has a member with this name.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.contains_key(name)
    }

    /// Number of addressable members.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the block has no addressable members.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// All uniform blocks of a module, ordered by (group, binding).
#[derive(Clone, Debug, Default)]
pub struct UniformLayout {
    blocks: Vec<UniformBlock>,
}

impl UniformLayout {
    /// All blocks.
    pub fn blocks(&self) -> &[UniformBlock] {
        &self.blocks
    }

    /// Block at a specific binding.
    pub fn block(&self, group: u32, binding: u32) -> Option<&UniformBlock> {
        self.blocks
            .iter()
            .find(|b| b.group == group && b.binding == binding)
    }

    /// The lowest-bound block; programs here carry exactly one.
    pub fn primary(&self) -> Option<&UniformBlock> {
        self.blocks.first()
    }
}

/// Reflect the uniform blocks of a naga module.
pub fn reflect_uniforms(module: &naga::Module) -> UniformLayout {
    let mut blocks = Vec::new();

    for (_, gv) in module.global_variables.iter() {
        if gv.space != naga::AddressSpace::Uniform {
            continue;
        }
        let Some(binding) = &gv.binding else { continue };

        let name = gv.name.clone().unwrap_or_else(|| "uniforms".to_string());
        let mut slots = HashMap::new();
        let size = match &module.types[gv.ty].inner {
            // Struct members are addressed without the variable name,
            // matching GL uniform naming.
            naga::TypeInner::Struct { span, .. } => {
                flatten_into(module, gv.ty, "", 0, &mut slots);
                *span
            }
            _ => {
                flatten_into(module, gv.ty, &name, 0, &mut slots);
                type_size(module, gv.ty)
            }
        };

        blocks.push(UniformBlock {
            name,
            group: binding.group,
            binding: binding.binding,
            size,
            slots,
        });
    }

    blocks.sort_by_key(|b| (b.group, b.binding));
    UniformLayout { blocks }
}

/// Recursively flatten a type into named slots.
fn flatten_into(
    module: &naga::Module,
    ty: naga::Handle<naga::Type>,
    prefix: &str,
    base: u32,
    slots: &mut HashMap<String, UniformSlot>,
) {
    match &module.types[ty].inner {
        naga::TypeInner::Scalar { kind, .. } => {
            let mapped = match kind {
                naga::ScalarKind::Float => Some(UniformKind::Float),
                naga::ScalarKind::Sint => Some(UniformKind::Int),
                naga::ScalarKind::Uint => Some(UniformKind::UInt),
                naga::ScalarKind::Bool => None,
            };
            if let Some(kind) = mapped {
                insert_slot(slots, prefix, base, kind);
            }
        }
        naga::TypeInner::Vector { size, kind, .. } => {
            if *kind == naga::ScalarKind::Float {
                let kind = match size {
                    naga::VectorSize::Bi => UniformKind::Vec2,
                    naga::VectorSize::Tri => UniformKind::Vec3,
                    naga::VectorSize::Quad => UniformKind::Vec4,
                };
                insert_slot(slots, prefix, base, kind);
            } else {
                log::trace!("skipping non-float vector uniform '{}'", prefix);
            }
        }
        naga::TypeInner::Matrix { columns, rows, .. } => {
            if *columns == naga::VectorSize::Quad && *rows == naga::VectorSize::Quad {
                insert_slot(slots, prefix, base, UniformKind::Mat4);
            } else {
                log::trace!("skipping non-4x4 matrix uniform '{}'", prefix);
            }
        }
        naga::TypeInner::Struct { members, .. } => {
            for (index, member) in members.iter().enumerate() {
                let member_name = member
                    .name
                    .clone()
                    .unwrap_or_else(|| index.to_string());
                let child = if prefix.is_empty() {
                    member_name
                } else {
                    format!("{}.{}", prefix, member_name)
                };
                flatten_into(module, member.ty, &child, base + member.offset, slots);
            }
        }
        naga::TypeInner::Array { base: elem, size, stride } => {
            if let naga::ArraySize::Constant(count) = size {
                for i in 0..count.get() {
                    let child = format!("{}[{}]", prefix, i);
                    flatten_into(module, *elem, &child, base + i * stride, slots);
                }
            }
        }
        _ => {
            log::trace!("skipping unsupported uniform member '{}'", prefix);
        }
    }
}

fn insert_slot(slots: &mut HashMap<String, UniformSlot>, name: &str, offset: u32, kind: UniformKind) {
    slots.insert(
        name.to_string(),
        UniformSlot {
            offset,
            size: kind.size(),
            kind,
        },
    );
}

/// Byte size of a type as laid out in the uniform address space.
fn type_size(module: &naga::Module, ty: naga::Handle<naga::Type>) -> u32 {
    match &module.types[ty].inner {
        naga::TypeInner::Scalar { width, .. } => *width as u32,
        naga::TypeInner::Vector { size, width, .. } => (*size as u32) * (*width as u32),
        naga::TypeInner::Matrix { columns, rows, width } => {
            (*columns as u32) * (*rows as u32) * (*width as u32)
        }
        naga::TypeInner::Struct { span, .. } => *span,
        naga::TypeInner::Array { size, stride, .. } => match size {
            naga::ArraySize::Constant(count) => count.get() * stride,
            naga::ArraySize::Dynamic => 0,
        },
        _ => 0,
    }
}
