//! Descriptor set layouts, pool and writes
//!
//! Layouts are built from a [`BindingLayoutDesc`]; the pool is sized for the
//! per-frame sets of the hair passes and allows individual frees.

use ash::{vk, Device};

use super::convert;
use crate::error::{HairError, HairResult};
use crate::render::binding::{BindingKind, BindingLayoutDesc};

/// Sets the pool can hold at once
pub const MAX_DESCRIPTOR_SETS: u32 = 64;

/// Descriptor set layout wrapper with automatic cleanup
pub struct DescriptorSetLayout {
    layout: vk::DescriptorSetLayout,
    device: Device,
    desc: BindingLayoutDesc,
}

impl DescriptorSetLayout {
    /// Create the layout described by `desc`
    pub fn new(device: Device, desc: &BindingLayoutDesc) -> HairResult<Self> {
        let bindings: Vec<vk::DescriptorSetLayoutBinding> = desc
            .bindings()
            .iter()
            .map(|b| {
                vk::DescriptorSetLayoutBinding::builder()
                    .binding(b.binding)
                    .descriptor_type(convert::descriptor_type(b.kind))
                    .descriptor_count(1)
                    .stage_flags(convert::shader_stages(b.stages))
                    .build()
            })
            .collect();

        let layout_info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
        let layout = unsafe { device.create_descriptor_set_layout(&layout_info, None) }.map_err(HairError::Api)?;

        Ok(Self {
            layout,
            device,
            desc: desc.clone(),
        })
    }

    /// Get the Vulkan descriptor set layout handle
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Get the description this layout was built from
    pub fn desc(&self) -> &BindingLayoutDesc {
        &self.desc
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

/// Descriptor pool for allocating descriptor sets
pub struct DescriptorPool {
    pool: vk::DescriptorPool,
    device: Device,
}

impl DescriptorPool {
    /// Create a new descriptor pool
    pub fn new(device: Device, max_sets: u32) -> HairResult<Self> {
        let size = |ty: vk::DescriptorType, per_set: u32| {
            vk::DescriptorPoolSize::builder()
                .ty(ty)
                .descriptor_count(max_sets * per_set)
                .build()
        };
        // The scatter global set is the widest: nine images, two buffers
        let pool_sizes = [
            size(vk::DescriptorType::UNIFORM_BUFFER, 2),
            size(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, 2),
            size(vk::DescriptorType::STORAGE_BUFFER, 4),
            size(vk::DescriptorType::STORAGE_IMAGE, 10),
            size(vk::DescriptorType::COMBINED_IMAGE_SAMPLER, 10),
        ];

        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .flags(vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET)
            .max_sets(max_sets)
            .pool_sizes(&pool_sizes);

        let pool = unsafe { device.create_descriptor_pool(&pool_info, None) }.map_err(HairError::Api)?;
        Ok(Self { pool, device })
    }

    /// Allocate one set of `layout`
    pub fn allocate(&self, layout: vk::DescriptorSetLayout) -> HairResult<vk::DescriptorSet> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(self.pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }.map_err(HairError::Api)?;
        sets.into_iter()
            .next()
            .ok_or_else(|| HairError::invalid_operation("descriptor pool returned no set"))
    }

    /// Return a set to the pool
    pub fn free(&self, set: vk::DescriptorSet) {
        // Only fails on out-of-host-memory, where nothing useful can be done
        let _ = unsafe { self.device.free_descriptor_sets(self.pool, &[set]) };
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_pool(self.pool, None);
        }
    }
}

/// Resolved resource of one descriptor write
pub enum DescriptorResource {
    /// Buffer range
    Buffer(vk::DescriptorBufferInfo),
    /// Image view, sampler and layout
    Image(vk::DescriptorImageInfo),
}

/// Batches descriptor writes into one `vkUpdateDescriptorSets`
#[derive(Default)]
pub struct DescriptorSetWriter {
    entries: Vec<(u32, vk::DescriptorType, DescriptorResource)>,
}

impl DescriptorSetWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a buffer write
    pub fn write_buffer(mut self, binding: u32, kind: BindingKind, info: vk::DescriptorBufferInfo) -> Self {
        self.entries
            .push((binding, convert::descriptor_type(kind), DescriptorResource::Buffer(info)));
        self
    }

    /// Queue an image write; the layout follows the binding kind
    pub fn write_image(mut self, binding: u32, kind: BindingKind, view: vk::ImageView, sampler: vk::Sampler) -> Self {
        let info = vk::DescriptorImageInfo::builder()
            .image_view(view)
            .sampler(sampler)
            .image_layout(convert::descriptor_image_layout(kind))
            .build();
        self.entries
            .push((binding, convert::descriptor_type(kind), DescriptorResource::Image(info)));
        self
    }

    /// Execute all write operations on `set`
    pub fn update(self, device: &Device, set: vk::DescriptorSet) {
        // Infos are owned by `self.entries`, which outlives the call
        let writes: Vec<vk::WriteDescriptorSet> = self
            .entries
            .iter()
            .map(|(binding, ty, resource)| {
                let write = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(0)
                    .descriptor_type(*ty);
                match resource {
                    DescriptorResource::Buffer(info) => write.buffer_info(std::slice::from_ref(info)).build(),
                    DescriptorResource::Image(info) => write.image_info(std::slice::from_ref(info)).build(),
                }
            })
            .collect();

        unsafe {
            device.update_descriptor_sets(&writes, &[]);
        }
    }
}
