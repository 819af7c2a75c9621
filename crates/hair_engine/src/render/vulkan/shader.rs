//! Shader modules and kernel pipelines
//!
//! Compute kernels get a compute pipeline. The raster deposit gets a line-list
//! graphics pipeline drawing into a resolution-sized R8 proxy target that is
//! never written; its fragments only store into the density volume.

use std::ffi::CStr;
use std::path::Path;

use ash::{vk, Device};
use log::debug;

use super::convert;
use super::image::Image;
use crate::core::config::ShaderConfig;
use crate::error::{HairError, HairResult};
use crate::render::image::{Extent3D, ImageDesc, ImageDimension, ImageUsage, TexelFormat};
use crate::render::program::{Kernel, RasterState};

const ENTRY_POINT: &CStr = c"main";

/// Shader module wrapper with RAII cleanup
pub struct ShaderModule {
    device: Device,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create shader module from SPIR-V bytecode
    pub fn from_bytes(device: Device, bytes: &[u8]) -> Result<Self, String> {
        // SPIR-V is a u32 stream
        let (prefix, words, suffix) = unsafe { bytes.align_to::<u32>() };
        if !prefix.is_empty() || !suffix.is_empty() || words.is_empty() {
            return Err("SPIR-V bytecode is not properly aligned".to_string());
        }

        let create_info = vk::ShaderModuleCreateInfo::builder().code(words);
        let module = unsafe { device.create_shader_module(&create_info, None) }.map_err(|e| format!("{e:?}"))?;
        Ok(Self { device, module })
    }

    /// Load shader from SPIR-V file
    pub fn from_file(device: Device, path: &Path) -> HairResult<Self> {
        let shader_error = |reason: String| HairError::Shader {
            path: path.display().to_string(),
            reason,
        };
        let bytes = std::fs::read(path).map_err(|e| shader_error(format!("Failed to read shader file: {e}")))?;
        // Re-collect into u32 storage so the alignment check cannot fail on Vec<u8>
        let words: Vec<u32> = bytes
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        if words.len() * 4 != bytes.len() {
            return Err(shader_error("SPIR-V size is not a multiple of 4".to_string()));
        }
        Self::from_bytes(device, bytemuck::cast_slice(&words)).map_err(shader_error)
    }

    /// Create shader stage create info
    pub fn create_stage_info(&self, stage: vk::ShaderStageFlags) -> vk::PipelineShaderStageCreateInfo {
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(stage)
            .module(self.module)
            .name(ENTRY_POINT)
            .build()
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_shader_module(self.module, None);
        }
    }
}

/// Render pass, proxy attachment and framebuffer of a raster program
struct RasterTarget {
    device: Device,
    render_pass: vk::RenderPass,
    framebuffer: vk::Framebuffer,
    _proxy: Image,
    extent: vk::Extent2D,
}

impl RasterTarget {
    fn new(
        device: &Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        extent: u32,
    ) -> HairResult<Self> {
        let proxy = Image::new(
            device.clone(),
            memory_properties,
            &ImageDesc {
                label: "raster_proxy".to_string(),
                extent: Extent3D::square(extent),
                format: TexelFormat::R8Unorm,
                dimension: ImageDimension::D2,
                usage: ImageUsage::COLOR_ATTACHMENT,
                mip_levels: 1,
                sampler: None,
            },
        )?;

        let attachment = vk::AttachmentDescription::builder()
            .format(convert::format(TexelFormat::R8Unorm))
            .samples(vk::SampleCountFlags::TYPE_1)
            .load_op(vk::AttachmentLoadOp::DONT_CARE)
            .store_op(vk::AttachmentStoreOp::DONT_CARE)
            .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
            .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
            .initial_layout(vk::ImageLayout::UNDEFINED)
            .final_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_ref = vk::AttachmentReference::builder()
            .attachment(0)
            .layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .build();
        let color_refs = [color_ref];
        let subpass = vk::SubpassDescription::builder()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_refs)
            .build();

        let attachments = [attachment];
        let subpasses = [subpass];
        let render_pass_info = vk::RenderPassCreateInfo::builder()
            .attachments(&attachments)
            .subpasses(&subpasses);
        let render_pass = unsafe { device.create_render_pass(&render_pass_info, None) }.map_err(HairError::Api)?;

        let views = [proxy.view()];
        let framebuffer_info = vk::FramebufferCreateInfo::builder()
            .render_pass(render_pass)
            .attachments(&views)
            .width(extent)
            .height(extent)
            .layers(1);
        let framebuffer = match unsafe { device.create_framebuffer(&framebuffer_info, None) } {
            Ok(framebuffer) => framebuffer,
            Err(e) => {
                unsafe { device.destroy_render_pass(render_pass, None) };
                return Err(HairError::Api(e));
            }
        };

        Ok(Self {
            device: device.clone(),
            render_pass,
            framebuffer,
            _proxy: proxy,
            extent: vk::Extent2D {
                width: extent,
                height: extent,
            },
        })
    }
}

impl Drop for RasterTarget {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_framebuffer(self.framebuffer, None);
            self.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

/// Pipeline of one kernel with RAII cleanup
pub struct Program {
    device: Device,
    pipeline: vk::Pipeline,
    layout: vk::PipelineLayout,
    kernel: Kernel,
    raster: Option<RasterTarget>,
}

impl Program {
    /// Compute pipeline for a compute kernel
    pub fn compute(
        device: Device,
        shaders: &ShaderConfig,
        kernel: Kernel,
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> HairResult<Self> {
        let modules = load_modules(&device, shaders, kernel)?;
        let (module, stage) = modules
            .first()
            .ok_or_else(|| HairError::invalid_operation(format!("{} has no shader", kernel.name())))?;

        let layout = create_pipeline_layout(&device, set_layouts)?;
        let mut program = Self {
            device,
            pipeline: vk::Pipeline::null(),
            layout,
            kernel,
            raster: None,
        };

        let create_info = vk::ComputePipelineCreateInfo::builder()
            .stage(module.create_stage_info(*stage))
            .layout(layout)
            .build();
        let pipelines = unsafe {
            program
                .device
                .create_compute_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| HairError::Api(e))?;
        program.pipeline = pipelines.into_iter().next().unwrap_or_default();

        debug!("[VULKAN] Compute pipeline for {}", kernel.name());
        Ok(program)
    }

    /// Line-list graphics pipeline for the raster deposit
    pub fn raster(
        device: Device,
        memory_properties: &vk::PhysicalDeviceMemoryProperties,
        shaders: &ShaderConfig,
        kernel: Kernel,
        set_layouts: &[vk::DescriptorSetLayout],
        state: RasterState,
    ) -> HairResult<Self> {
        let modules = load_modules(&device, shaders, kernel)?;
        let layout = create_pipeline_layout(&device, set_layouts)?;
        let mut program = Self {
            device,
            pipeline: vk::Pipeline::null(),
            layout,
            kernel,
            raster: None,
        };
        let target = RasterTarget::new(&program.device, memory_properties, state.extent)?;

        let stages: Vec<vk::PipelineShaderStageCreateInfo> = modules
            .iter()
            .map(|(module, stage)| module.create_stage_info(*stage))
            .collect();

        // Vertices are pulled from the segment buffer by gl_VertexIndex
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder();
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
            .topology(vk::PrimitiveTopology::LINE_LIST)
            .primitive_restart_enable(false);

        let viewports = [vk::Viewport::builder()
            .x(0.0)
            .y(0.0)
            .width(state.extent as f32)
            .height(state.extent as f32)
            .min_depth(0.0)
            .max_depth(1.0)
            .build()];
        let scissors = [vk::Rect2D::builder()
            .offset(vk::Offset2D { x: 0, y: 0 })
            .extent(target.extent)
            .build()];
        let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
            .viewports(&viewports)
            .scissors(&scissors);

        let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
            .depth_clamp_enable(false)
            .rasterizer_discard_enable(false)
            .polygon_mode(vk::PolygonMode::FILL)
            .line_width(1.0)
            .cull_mode(vk::CullModeFlags::NONE)
            .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
            .depth_bias_enable(false);

        let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
            .sample_shading_enable(false)
            .rasterization_samples(vk::SampleCountFlags::TYPE_1);

        // The proxy target is never written
        let blend_attachments = [vk::PipelineColorBlendAttachmentState::builder()
            .color_write_mask(vk::ColorComponentFlags::empty())
            .blend_enable(false)
            .build()];
        let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
            .logic_op_enable(false)
            .attachments(&blend_attachments);

        let create_info = vk::GraphicsPipelineCreateInfo::builder()
            .stages(&stages)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&rasterizer)
            .multisample_state(&multisampling)
            .color_blend_state(&color_blending)
            .layout(layout)
            .render_pass(target.render_pass)
            .subpass(0)
            .build();

        let pipelines = unsafe {
            program
                .device
                .create_graphics_pipelines(vk::PipelineCache::null(), &[create_info], None)
        }
        .map_err(|(_, e)| HairError::Api(e))?;
        program.pipeline = pipelines.into_iter().next().unwrap_or_default();
        program.raster = Some(target);

        debug!("[VULKAN] Line raster pipeline for {} ({}px)", kernel.name(), state.extent);
        Ok(program)
    }

    /// Get the pipeline handle
    pub fn handle(&self) -> vk::Pipeline {
        self.pipeline
    }

    /// Get the pipeline layout
    pub fn layout(&self) -> vk::PipelineLayout {
        self.layout
    }

    /// Kernel this pipeline runs
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    /// Compute or graphics
    pub fn bind_point(&self) -> vk::PipelineBindPoint {
        if self.raster.is_some() {
            vk::PipelineBindPoint::GRAPHICS
        } else {
            vk::PipelineBindPoint::COMPUTE
        }
    }

    /// Render pass, framebuffer and render area of a raster program
    pub fn raster_target(&self) -> Option<(vk::RenderPass, vk::Framebuffer, vk::Extent2D)> {
        self.raster
            .as_ref()
            .map(|t| (t.render_pass, t.framebuffer, t.extent))
    }
}

impl Drop for Program {
    fn drop(&mut self) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                self.device.destroy_pipeline(self.pipeline, None);
            }
            self.device.destroy_pipeline_layout(self.layout, None);
        }
    }
}

fn create_pipeline_layout(device: &Device, set_layouts: &[vk::DescriptorSetLayout]) -> HairResult<vk::PipelineLayout> {
    let layout_info = vk::PipelineLayoutCreateInfo::builder().set_layouts(set_layouts);
    unsafe { device.create_pipeline_layout(&layout_info, None) }.map_err(HairError::Api)
}

fn load_modules(device: &Device, shaders: &ShaderConfig, kernel: Kernel) -> HairResult<Vec<(ShaderModule, vk::ShaderStageFlags)>> {
    kernel
        .shader_files()
        .iter()
        .map(|file| {
            let stage = convert::stage_of_file(file).ok_or_else(|| HairError::Shader {
                path: (*file).to_string(),
                reason: "unknown shader stage suffix".to_string(),
            })?;
            let module = ShaderModule::from_file(device.clone(), &shaders.spirv_path(file))?;
            Ok((module, stage))
        })
        .collect()
}
