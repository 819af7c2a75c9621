//! Mapping of backend-neutral descriptions onto `ash` types

use ash::vk;

use crate::render::backend::ClearValue;
use crate::render::binding::{BindingKind, ShaderStages};
use crate::render::image::{AddressMode, BorderColor, BufferUsage, ImageDimension, ImageUsage, TexelFormat};
use crate::render::state::{AccessMask, ImageLayout, ResourceState, StageMask};

pub fn format(format: TexelFormat) -> vk::Format {
    match format {
        TexelFormat::R32Uint => vk::Format::R32_UINT,
        TexelFormat::R8Unorm => vk::Format::R8_UNORM,
        TexelFormat::Rgba32Float => vk::Format::R32G32B32A32_SFLOAT,
    }
}

/// Integer formats cannot be linearly filtered
pub fn filter(format: TexelFormat) -> vk::Filter {
    match format {
        TexelFormat::R32Uint => vk::Filter::NEAREST,
        TexelFormat::R8Unorm | TexelFormat::Rgba32Float => vk::Filter::LINEAR,
    }
}

pub fn image_type(dimension: ImageDimension) -> (vk::ImageType, vk::ImageViewType) {
    match dimension {
        ImageDimension::D2 => (vk::ImageType::TYPE_2D, vk::ImageViewType::TYPE_2D),
        ImageDimension::D3 => (vk::ImageType::TYPE_3D, vk::ImageViewType::TYPE_3D),
    }
}

pub fn image_usage(usage: ImageUsage) -> vk::ImageUsageFlags {
    let mut flags = vk::ImageUsageFlags::empty();
    if usage.contains(ImageUsage::STORAGE) {
        flags |= vk::ImageUsageFlags::STORAGE;
    }
    if usage.contains(ImageUsage::SAMPLED) {
        flags |= vk::ImageUsageFlags::SAMPLED;
    }
    if usage.contains(ImageUsage::TRANSFER_DST) {
        flags |= vk::ImageUsageFlags::TRANSFER_DST;
    }
    if usage.contains(ImageUsage::COLOR_ATTACHMENT) {
        flags |= vk::ImageUsageFlags::COLOR_ATTACHMENT;
    }
    flags
}

pub fn buffer_usage(usage: BufferUsage) -> vk::BufferUsageFlags {
    let mut flags = vk::BufferUsageFlags::empty();
    if usage.contains(BufferUsage::UNIFORM) {
        flags |= vk::BufferUsageFlags::UNIFORM_BUFFER;
    }
    if usage.contains(BufferUsage::STORAGE) {
        flags |= vk::BufferUsageFlags::STORAGE_BUFFER;
    }
    flags
}

pub fn address_mode(mode: AddressMode) -> vk::SamplerAddressMode {
    match mode {
        AddressMode::ClampToEdge => vk::SamplerAddressMode::CLAMP_TO_EDGE,
        AddressMode::ClampToBorder => vk::SamplerAddressMode::CLAMP_TO_BORDER,
        AddressMode::Repeat => vk::SamplerAddressMode::REPEAT,
    }
}

pub fn border_color(color: BorderColor, format: TexelFormat) -> vk::BorderColor {
    let integer = format == TexelFormat::R32Uint;
    match (color, integer) {
        (BorderColor::OpaqueBlack, false) => vk::BorderColor::FLOAT_OPAQUE_BLACK,
        (BorderColor::OpaqueBlack, true) => vk::BorderColor::INT_OPAQUE_BLACK,
        (BorderColor::TransparentBlack, false) => vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
        (BorderColor::TransparentBlack, true) => vk::BorderColor::INT_TRANSPARENT_BLACK,
    }
}

pub fn layout(layout: ImageLayout) -> vk::ImageLayout {
    match layout {
        ImageLayout::Undefined => vk::ImageLayout::UNDEFINED,
        ImageLayout::General => vk::ImageLayout::GENERAL,
        ImageLayout::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
        ImageLayout::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
    }
}

pub fn access(access: AccessMask) -> vk::AccessFlags {
    let mut flags = vk::AccessFlags::empty();
    if access.contains(AccessMask::SHADER_READ) {
        flags |= vk::AccessFlags::SHADER_READ;
    }
    if access.contains(AccessMask::SHADER_WRITE) {
        flags |= vk::AccessFlags::SHADER_WRITE;
    }
    if access.contains(AccessMask::TRANSFER_WRITE) {
        flags |= vk::AccessFlags::TRANSFER_WRITE;
    }
    if access.contains(AccessMask::COLOR_ATTACHMENT_WRITE) {
        flags |= vk::AccessFlags::COLOR_ATTACHMENT_WRITE;
    }
    flags
}

/// An empty mask waits on nothing
pub fn stage(stage: StageMask) -> vk::PipelineStageFlags {
    let pairs = [
        (StageMask::TOP_OF_PIPE, vk::PipelineStageFlags::TOP_OF_PIPE),
        (StageMask::TRANSFER, vk::PipelineStageFlags::TRANSFER),
        (StageMask::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER),
        (StageMask::VERTEX_SHADER, vk::PipelineStageFlags::VERTEX_SHADER),
        (StageMask::GEOMETRY_SHADER, vk::PipelineStageFlags::GEOMETRY_SHADER),
        (StageMask::FRAGMENT_SHADER, vk::PipelineStageFlags::FRAGMENT_SHADER),
    ];
    let flags = pairs
        .iter()
        .filter(|(mask, _)| stage.contains(*mask))
        .fold(vk::PipelineStageFlags::empty(), |acc, (_, flag)| acc | *flag);
    if flags.is_empty() {
        vk::PipelineStageFlags::TOP_OF_PIPE
    } else {
        flags
    }
}

/// Layout, access and stage of a state in `vk` terms
pub fn state(state: &ResourceState) -> (vk::ImageLayout, vk::AccessFlags, vk::PipelineStageFlags) {
    (layout(state.layout), access(state.access), stage(state.stage))
}

pub fn descriptor_type(kind: BindingKind) -> vk::DescriptorType {
    match kind {
        BindingKind::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
        BindingKind::DynamicUniformBuffer => vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
        BindingKind::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
        BindingKind::StorageImage => vk::DescriptorType::STORAGE_IMAGE,
        BindingKind::SampledImage => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
    }
}

/// Layout an image must be in when read through a binding of `kind`
pub fn descriptor_image_layout(kind: BindingKind) -> vk::ImageLayout {
    match kind {
        BindingKind::SampledImage => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        _ => vk::ImageLayout::GENERAL,
    }
}

pub fn shader_stages(stages: ShaderStages) -> vk::ShaderStageFlags {
    let mut flags = vk::ShaderStageFlags::empty();
    if stages.contains(ShaderStages::VERTEX) {
        flags |= vk::ShaderStageFlags::VERTEX;
    }
    if stages.contains(ShaderStages::GEOMETRY) {
        flags |= vk::ShaderStageFlags::GEOMETRY;
    }
    if stages.contains(ShaderStages::FRAGMENT) {
        flags |= vk::ShaderStageFlags::FRAGMENT;
    }
    if stages.contains(ShaderStages::COMPUTE) {
        flags |= vk::ShaderStageFlags::COMPUTE;
    }
    flags
}

/// Shader stage of a compiled file, from its `.vert`/`.geom`/`.frag`/`.comp` suffix
pub fn stage_of_file(file: &str) -> Option<vk::ShaderStageFlags> {
    match file.rsplit('.').next()? {
        "vert" => Some(vk::ShaderStageFlags::VERTEX),
        "geom" => Some(vk::ShaderStageFlags::GEOMETRY),
        "frag" => Some(vk::ShaderStageFlags::FRAGMENT),
        "comp" => Some(vk::ShaderStageFlags::COMPUTE),
        _ => None,
    }
}

pub fn clear_color(value: ClearValue) -> vk::ClearColorValue {
    match value {
        ClearValue::Uint(uint32) => vk::ClearColorValue { uint32 },
        ClearValue::Float(float32) => vk::ClearColorValue { float32 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::state::ResourceState;

    #[test]
    fn test_state_conversion() {
        let (layout, access, stage) = state(&ResourceState::storage_write(StageMask::COMPUTE_SHADER));
        assert_eq!(layout, vk::ImageLayout::GENERAL);
        assert_eq!(access, vk::AccessFlags::SHADER_WRITE);
        assert_eq!(stage, vk::PipelineStageFlags::COMPUTE_SHADER);

        let (layout, access, stage) = state(&ResourceState::UNDEFINED);
        assert_eq!(layout, vk::ImageLayout::UNDEFINED);
        assert!(access.is_empty());
        assert_eq!(stage, vk::PipelineStageFlags::TOP_OF_PIPE);
    }

    #[test]
    fn test_combined_stages() {
        let flags = stage(StageMask::COMPUTE_SHADER | StageMask::FRAGMENT_SHADER);
        assert_eq!(
            flags,
            vk::PipelineStageFlags::COMPUTE_SHADER | vk::PipelineStageFlags::FRAGMENT_SHADER
        );
        assert_eq!(stage(StageMask::empty()), vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(
            shader_stages(ShaderStages::RASTER),
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::GEOMETRY | vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_descriptor_kinds() {
        assert_eq!(
            descriptor_type(BindingKind::DynamicUniformBuffer),
            vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC
        );
        assert_eq!(
            descriptor_image_layout(BindingKind::StorageImage),
            vk::ImageLayout::GENERAL
        );
        assert_eq!(
            descriptor_image_layout(BindingKind::SampledImage),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn test_integer_volume_sampling() {
        assert_eq!(filter(TexelFormat::R32Uint), vk::Filter::NEAREST);
        assert_eq!(
            border_color(BorderColor::OpaqueBlack, TexelFormat::R32Uint),
            vk::BorderColor::INT_OPAQUE_BLACK
        );
        assert_eq!(
            border_color(BorderColor::OpaqueBlack, TexelFormat::Rgba32Float),
            vk::BorderColor::FLOAT_OPAQUE_BLACK
        );
    }

    #[test]
    fn test_stage_of_file() {
        assert_eq!(stage_of_file("hair_lut.comp"), Some(vk::ShaderStageFlags::COMPUTE));
        assert_eq!(
            stage_of_file("density_voxelization.geom"),
            Some(vk::ShaderStageFlags::GEOMETRY)
        );
        assert_eq!(stage_of_file("readme"), None);
    }
}
