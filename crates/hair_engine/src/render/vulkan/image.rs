//! Device-local images with a view and an optional sampler

use ash::{vk, Device};

use super::buffer::find_memory_type;
use super::convert;
use crate::error::{HairError, HairResult};
use crate::render::image::{ImageDesc, SamplerDesc, TexelFormat};

/// Image wrapper with RAII cleanup
pub struct Image {
    device: Device,
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
    sampler: Option<vk::Sampler>,
    desc: ImageDesc,
}

impl Image {
    /// Create an image, its full view, and a sampler if `desc` asks for one
    pub fn new(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        desc: &ImageDesc,
    ) -> HairResult<Self> {
        let format = convert::format(desc.format);
        let (image_type, view_type) = convert::image_type(desc.dimension);

        let image_create_info = vk::ImageCreateInfo::builder()
            .image_type(image_type)
            .extent(vk::Extent3D {
                width: desc.extent.width,
                height: desc.extent.height,
                depth: desc.extent.depth,
            })
            .mip_levels(desc.mip_levels.max(1))
            .array_layers(1)
            .format(format)
            .tiling(vk::ImageTiling::OPTIMAL)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .usage(convert::image_usage(desc.usage))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .samples(vk::SampleCountFlags::TYPE_1);

        let image = unsafe { device.create_image(&image_create_info, None) }.map_err(HairError::Api)?;

        // Every later failure releases what exists so far through Drop
        let mut wrapper = Self {
            device,
            image,
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
            sampler: None,
            desc: desc.clone(),
        };

        let requirements = unsafe { wrapper.device.get_image_memory_requirements(image) };
        let memory_type_index = find_memory_type(
            memory_properties,
            requirements.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);

        wrapper.memory = unsafe { wrapper.device.allocate_memory(&alloc_info, None) }.map_err(HairError::Api)?;
        unsafe { wrapper.device.bind_image_memory(image, wrapper.memory, 0) }.map_err(HairError::Api)?;

        let view_create_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(view_type)
            .format(format)
            .subresource_range(full_range(desc.mip_levels));
        wrapper.view = unsafe { wrapper.device.create_image_view(&view_create_info, None) }.map_err(HairError::Api)?;

        if let Some(sampler) = &desc.sampler {
            wrapper.sampler = Some(create_sampler(&wrapper.device, sampler, desc.format)?);
        }

        Ok(wrapper)
    }

    /// Get image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// Get the image view handle
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Sampler, or a null handle for storage-only images
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.unwrap_or_default()
    }

    /// Every mip of the color aspect
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        full_range(self.desc.mip_levels)
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        unsafe {
            if let Some(sampler) = self.sampler.take() {
                self.device.destroy_sampler(sampler, None);
            }
            if self.view != vk::ImageView::null() {
                self.device.destroy_image_view(self.view, None);
            }
            self.device.destroy_image(self.image, None);
            if self.memory != vk::DeviceMemory::null() {
                self.device.free_memory(self.memory, None);
            }
        }
    }
}

fn full_range(mip_levels: u32) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: mip_levels.max(1),
        base_array_layer: 0,
        layer_count: 1,
    }
}

fn create_sampler(device: &Device, desc: &SamplerDesc, format: TexelFormat) -> HairResult<vk::Sampler> {
    let address_mode = convert::address_mode(desc.address_mode);
    let filter = convert::filter(format);
    let sampler_info = vk::SamplerCreateInfo::builder()
        .mag_filter(filter)
        .min_filter(filter)
        .mipmap_mode(vk::SamplerMipmapMode::NEAREST)
        .address_mode_u(address_mode)
        .address_mode_v(address_mode)
        .address_mode_w(address_mode)
        .border_color(convert::border_color(desc.border_color, format))
        .unnormalized_coordinates(false)
        .max_lod(0.0);

    unsafe { device.create_sampler(&sampler_info, None) }.map_err(HairError::Api)
}
