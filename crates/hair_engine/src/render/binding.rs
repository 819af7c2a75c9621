//! Binding layouts and binding-set writes

use bitflags::bitflags;

use super::handles::{BufferHandle, ImageHandle};

/// Kind of resource bound at one binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingKind {
    /// Uniform block at a fixed offset
    UniformBuffer,
    /// Uniform block whose offset is supplied at bind time
    DynamicUniformBuffer,
    /// Read-only storage array
    StorageBuffer,
    /// Storage image (load, store, atomics)
    StorageImage,
    /// Sampled image with its sampler
    SampledImage,
}

bitflags! {
    /// Shader stages that see a binding
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ShaderStages: u32 {
        /// Vertex
        const VERTEX = 1 << 0;
        /// Geometry
        const GEOMETRY = 1 << 1;
        /// Fragment
        const FRAGMENT = 1 << 2;
        /// Compute
        const COMPUTE = 1 << 3;
        /// Every stage of the line-raster program
        const RASTER = Self::VERTEX.bits() | Self::GEOMETRY.bits() | Self::FRAGMENT.bits();
    }
}

/// One slot of a binding layout
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutBinding {
    /// Binding number
    pub binding: u32,
    /// Resource kind
    pub kind: BindingKind,
    /// Visible stages
    pub stages: ShaderStages,
}

/// Binding layout builder
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingLayoutDesc {
    label: String,
    bindings: Vec<LayoutBinding>,
}

impl BindingLayoutDesc {
    /// Create an empty layout
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            bindings: Vec::new(),
        }
    }

    fn add(mut self, binding: u32, kind: BindingKind, stages: ShaderStages) -> Self {
        self.bindings.push(LayoutBinding { binding, kind, stages });
        self
    }

    /// Add a uniform buffer binding
    pub fn add_uniform_buffer(self, binding: u32, stages: ShaderStages) -> Self {
        self.add(binding, BindingKind::UniformBuffer, stages)
    }

    /// Add a dynamic-offset uniform buffer binding
    pub fn add_dynamic_uniform_buffer(self, binding: u32, stages: ShaderStages) -> Self {
        self.add(binding, BindingKind::DynamicUniformBuffer, stages)
    }

    /// Add a storage buffer binding
    pub fn add_storage_buffer(self, binding: u32, stages: ShaderStages) -> Self {
        self.add(binding, BindingKind::StorageBuffer, stages)
    }

    /// Add a storage image binding
    pub fn add_storage_image(self, binding: u32, stages: ShaderStages) -> Self {
        self.add(binding, BindingKind::StorageImage, stages)
    }

    /// Add a sampled image binding
    pub fn add_sampled_image(self, binding: u32, stages: ShaderStages) -> Self {
        self.add(binding, BindingKind::SampledImage, stages)
    }

    /// Debug name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Every binding in insertion order
    pub fn bindings(&self) -> &[LayoutBinding] {
        &self.bindings
    }

    /// Look up a binding by number
    pub fn binding(&self, binding: u32) -> Option<&LayoutBinding> {
        self.bindings.iter().find(|b| b.binding == binding)
    }

    /// Position of `binding` among the dynamic bindings, ordered by binding number.
    ///
    /// This is the index of its entry in the dynamic offsets passed at bind time.
    pub fn dynamic_index(&self, binding: u32) -> Option<usize> {
        let target = self.binding(binding)?;
        if target.kind != BindingKind::DynamicUniformBuffer {
            return None;
        }
        Some(
            self.bindings
                .iter()
                .filter(|b| b.kind == BindingKind::DynamicUniformBuffer && b.binding < binding)
                .count(),
        )
    }

    /// Number of dynamic bindings
    pub fn dynamic_count(&self) -> usize {
        self.bindings
            .iter()
            .filter(|b| b.kind == BindingKind::DynamicUniformBuffer)
            .count()
    }
}

/// Resource written into a binding slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingResource {
    /// Buffer range; for dynamic bindings the bind-time offset is added to `offset`
    Buffer {
        /// Buffer
        buffer: BufferHandle,
        /// Base offset in bytes
        offset: u64,
        /// Visible range in bytes
        range: u64,
    },
    /// Image, with the layout implied by the binding kind
    Image(ImageHandle),
}

/// One binding-set update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindingWrite {
    /// Binding number
    pub binding: u32,
    /// New resource
    pub resource: BindingResource,
}

impl BindingWrite {
    /// Bind a buffer range
    pub fn buffer(binding: u32, buffer: BufferHandle, offset: u64, range: u64) -> Self {
        Self {
            binding,
            resource: BindingResource::Buffer { buffer, offset, range },
        }
    }

    /// Bind an image
    pub fn image(binding: u32, image: ImageHandle) -> Self {
        Self {
            binding,
            resource: BindingResource::Image(image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dynamic_index_follows_binding_order() {
        let layout = BindingLayoutDesc::new("object")
            .add_dynamic_uniform_buffer(1, ShaderStages::COMPUTE)
            .add_storage_image(2, ShaderStages::COMPUTE)
            .add_dynamic_uniform_buffer(0, ShaderStages::COMPUTE);

        assert_eq!(layout.dynamic_count(), 2);
        assert_eq!(layout.dynamic_index(0), Some(0));
        assert_eq!(layout.dynamic_index(1), Some(1));
        assert_eq!(layout.dynamic_index(2), None);
        assert_eq!(layout.dynamic_index(7), None);
    }
}
