//! Vulkan implementation of [`RenderBackend`]
//!
//! Objects live in slot maps keyed by the backend-neutral handles and are
//! released through their RAII wrappers. Commands are recorded into a command
//! buffer owned by the external frame driver, set with
//! [`VulkanBackend::set_command_buffer`] before every frame.
//!
//! The raster deposit stores from fragment shaders, so the device needs the
//! `geometryShader` and `fragmentStoresAndAtomics` features.

mod buffer;
mod convert;
mod descriptor_set;
mod image;
mod shader;

use ash::{vk, Device, Instance};
use log::{info, warn};
use slotmap::SlotMap;

use crate::core::config::ShaderConfig;
use crate::error::{HairError, HairResult};
use crate::render::backend::{ClearValue, RenderBackend};
use crate::render::binding::{BindingLayoutDesc, BindingResource, BindingWrite};
use crate::render::handles::{BindingSetHandle, BufferHandle, ImageHandle, LayoutHandle, ProgramHandle};
use crate::render::image::{BufferDesc, ImageDesc};
use crate::render::program::ProgramDesc;
use crate::render::state::ImageBarrier;

use buffer::Buffer;
use descriptor_set::{DescriptorPool, DescriptorSetLayout, DescriptorSetWriter, MAX_DESCRIPTOR_SETS};
use image::Image;
use shader::Program;

struct DescriptorSet {
    set: vk::DescriptorSet,
    layout: LayoutHandle,
}

/// `ash` backend
pub struct VulkanBackend {
    device: Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    min_uniform_alignment: u64,
    shaders: ShaderConfig,
    command_buffer: Option<vk::CommandBuffer>,
    bound_program: Option<ProgramHandle>,
    // Declaration order is drop order: sets return to the pool before it goes
    programs: SlotMap<ProgramHandle, Program>,
    sets: SlotMap<BindingSetHandle, DescriptorSet>,
    layouts: SlotMap<LayoutHandle, DescriptorSetLayout>,
    images: SlotMap<ImageHandle, Image>,
    buffers: SlotMap<BufferHandle, Buffer>,
    pool: DescriptorPool,
}

impl VulkanBackend {
    /// Backend over an existing device
    pub fn new(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        device: Device,
        shaders: ShaderConfig,
    ) -> HairResult<Self> {
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let properties = unsafe { instance.get_physical_device_properties(physical_device) };
        let min_uniform_alignment = properties.limits.min_uniform_buffer_offset_alignment.max(1);
        let pool = DescriptorPool::new(device.clone(), MAX_DESCRIPTOR_SETS)?;

        info!(
            "[VULKAN] Backend created (uniform alignment {}, shaders in {})",
            min_uniform_alignment, shaders.directory
        );
        Ok(Self {
            device,
            memory_properties,
            min_uniform_alignment,
            shaders,
            command_buffer: None,
            bound_program: None,
            programs: SlotMap::with_key(),
            sets: SlotMap::with_key(),
            layouts: SlotMap::with_key(),
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            pool,
        })
    }

    /// Command buffer in the recording state that following commands go to
    pub fn set_command_buffer(&mut self, command_buffer: vk::CommandBuffer) {
        self.command_buffer = Some(command_buffer);
        self.bound_program = None;
    }

    /// Vulkan image of a handle, for sampling by the renderer
    pub fn image(&self, image: ImageHandle) -> Option<vk::Image> {
        self.images.get(image).map(Image::handle)
    }

    /// View and sampler of a handle, for the renderer's own descriptor sets
    pub fn image_view(&self, image: ImageHandle) -> Option<(vk::ImageView, vk::Sampler)> {
        self.images.get(image).map(|i| (i.view(), i.sampler()))
    }

    fn command_buffer(&self) -> HairResult<vk::CommandBuffer> {
        self.command_buffer
            .ok_or_else(|| HairError::invalid_operation("no command buffer set"))
    }

    fn bound_program(&self) -> HairResult<&Program> {
        let handle = self
            .bound_program
            .ok_or_else(|| HairError::missing_input("bound program"))?;
        self.programs
            .get(handle)
            .ok_or(HairError::UnknownHandle { kind: "program" })
    }
}

impl Drop for VulkanBackend {
    fn drop(&mut self) {
        for (_, set) in self.sets.drain() {
            self.pool.free(set.set);
        }
    }
}

impl RenderBackend for VulkanBackend {
    fn create_image(&mut self, desc: &ImageDesc) -> HairResult<ImageHandle> {
        let image = Image::new(self.device.clone(), &self.memory_properties, desc)?;
        Ok(self.images.insert(image))
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.images.remove(image);
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> HairResult<BufferHandle> {
        let buffer = Buffer::new(self.device.clone(), &self.memory_properties, desc)?;
        Ok(self.buffers.insert(buffer))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> HairResult<()> {
        self.buffers
            .get_mut(buffer)
            .ok_or(HairError::UnknownHandle { kind: "buffer" })?
            .write(offset, data)
    }

    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> HairResult<LayoutHandle> {
        let layout = DescriptorSetLayout::new(self.device.clone(), desc)?;
        Ok(self.layouts.insert(layout))
    }

    fn destroy_binding_layout(&mut self, layout: LayoutHandle) {
        self.layouts.remove(layout);
    }

    fn create_binding_set(&mut self, layout: LayoutHandle) -> HairResult<BindingSetHandle> {
        let vk_layout = self
            .layouts
            .get(layout)
            .ok_or(HairError::UnknownHandle { kind: "binding layout" })?
            .handle();
        let set = self.pool.allocate(vk_layout)?;
        Ok(self.sets.insert(DescriptorSet { set, layout }))
    }

    fn update_binding_set(&mut self, set: BindingSetHandle, writes: &[BindingWrite]) -> HairResult<()> {
        let target = self
            .sets
            .get(set)
            .ok_or(HairError::UnknownHandle { kind: "binding set" })?;
        let layout = self
            .layouts
            .get(target.layout)
            .ok_or(HairError::UnknownHandle { kind: "binding layout" })?;

        let mut writer = DescriptorSetWriter::new();
        for write in writes {
            let kind = layout
                .desc()
                .binding(write.binding)
                .ok_or_else(|| {
                    HairError::invalid_operation(format!(
                        "binding {} not in layout {}",
                        write.binding,
                        layout.desc().label()
                    ))
                })?
                .kind;
            writer = match write.resource {
                BindingResource::Buffer { buffer, offset, range } => {
                    let buffer = self
                        .buffers
                        .get(buffer)
                        .ok_or(HairError::UnknownHandle { kind: "buffer" })?;
                    let info = vk::DescriptorBufferInfo::builder()
                        .buffer(buffer.handle())
                        .offset(offset)
                        .range(range)
                        .build();
                    writer.write_buffer(write.binding, kind, info)
                }
                BindingResource::Image(image) => {
                    let image = self
                        .images
                        .get(image)
                        .ok_or(HairError::UnknownHandle { kind: "image" })?;
                    writer.write_image(write.binding, kind, image.view(), image.sampler())
                }
            };
        }
        writer.update(&self.device, target.set);
        Ok(())
    }

    fn destroy_binding_set(&mut self, set: BindingSetHandle) {
        if let Some(set) = self.sets.remove(set) {
            self.pool.free(set.set);
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> HairResult<ProgramHandle> {
        let set_layouts = desc
            .set_layouts
            .iter()
            .map(|&layout| {
                self.layouts
                    .get(layout)
                    .map(DescriptorSetLayout::handle)
                    .ok_or(HairError::UnknownHandle { kind: "binding layout" })
            })
            .collect::<HairResult<Vec<_>>>()?;

        let program = match desc.raster {
            Some(raster) => Program::raster(
                self.device.clone(),
                &self.memory_properties,
                &self.shaders,
                desc.kernel,
                &set_layouts,
                raster,
            )?,
            None if desc.kernel.is_graphics() => {
                return Err(HairError::invalid_operation(format!(
                    "{} needs raster state",
                    desc.kernel.name()
                )))
            }
            None => Program::compute(self.device.clone(), &self.shaders, desc.kernel, &set_layouts)?,
        };
        Ok(self.programs.insert(program))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
        self.programs.remove(program);
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.min_uniform_alignment
    }

    fn cmd_image_barrier(&mut self, barrier: &ImageBarrier) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let image = self
            .images
            .get(barrier.image)
            .ok_or(HairError::UnknownHandle { kind: "image" })?;

        let (old_layout, src_access, src_stage) = convert::state(&barrier.src);
        let (new_layout, dst_access, dst_stage) = convert::state(&barrier.dst);
        let image_barrier = vk::ImageMemoryBarrier::builder()
            .old_layout(old_layout)
            .new_layout(new_layout)
            .src_access_mask(src_access)
            .dst_access_mask(dst_access)
            .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
            .image(image.handle())
            .subresource_range(image.subresource_range())
            .build();

        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                &[],
                &[image_barrier],
            );
        }
        Ok(())
    }

    fn cmd_clear_image(&mut self, image: ImageHandle, value: ClearValue) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let image = self.images.get(image).ok_or(HairError::UnknownHandle { kind: "image" })?;
        unsafe {
            self.device.cmd_clear_color_image(
                command_buffer,
                image.handle(),
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                &convert::clear_color(value),
                &[image.subresource_range()],
            );
        }
        Ok(())
    }

    fn cmd_bind_program(&mut self, program: ProgramHandle) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let bound = self
            .programs
            .get(program)
            .ok_or(HairError::UnknownHandle { kind: "program" })?;
        unsafe {
            self.device
                .cmd_bind_pipeline(command_buffer, bound.bind_point(), bound.handle());
        }
        self.bound_program = Some(program);
        Ok(())
    }

    fn cmd_bind_set(&mut self, index: u32, set: BindingSetHandle, dynamic_offsets: &[u32]) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let program = self.bound_program()?;
        let set = self
            .sets
            .get(set)
            .ok_or(HairError::UnknownHandle { kind: "binding set" })?;
        if let Some(misaligned) = dynamic_offsets
            .iter()
            .find(|&&offset| u64::from(offset) % self.min_uniform_alignment != 0)
        {
            return Err(HairError::invalid_operation(format!(
                "dynamic offset {} is not a multiple of {}",
                misaligned, self.min_uniform_alignment
            )));
        }
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                command_buffer,
                program.bind_point(),
                program.layout(),
                index,
                &[set.set],
                dynamic_offsets,
            );
        }
        Ok(())
    }

    fn cmd_draw_lines(&mut self, vertex_count: u32) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let program = self.bound_program()?;
        let Some((render_pass, framebuffer, extent)) = program.raster_target() else {
            warn!("[VULKAN] Draw with compute program {}", program.kernel().name());
            return Err(HairError::invalid_operation("bound program is not a raster program"));
        };

        let begin_info = vk::RenderPassBeginInfo::builder()
            .render_pass(render_pass)
            .framebuffer(framebuffer)
            .render_area(vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            });
        unsafe {
            self.device
                .cmd_begin_render_pass(command_buffer, &begin_info, vk::SubpassContents::INLINE);
            self.device.cmd_draw(command_buffer, vertex_count, 1, 0, 0);
            self.device.cmd_end_render_pass(command_buffer);
        }
        Ok(())
    }

    fn cmd_dispatch(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let command_buffer = self.command_buffer()?;
        let program = self.bound_program()?;
        if program.raster_target().is_some() {
            return Err(HairError::invalid_operation("bound program is not a compute program"));
        }
        unsafe {
            self.device
                .cmd_dispatch(command_buffer, groups[0], groups[1], groups[2]);
        }
        Ok(())
    }
}
