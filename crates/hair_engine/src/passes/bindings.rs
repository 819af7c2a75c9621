//! Binding numbers shared by the pipeline, the software kernels and the GLSL sources

use crate::render::{BindingLayoutDesc, ShaderStages};

/// Set index of the per-stage global bindings
pub const GLOBAL_SET: u32 = 0;
/// Set index of the per-object dynamic uniforms
pub const OBJECT_SET: u32 = 1;

/// Global set of the voxelization stage
pub mod voxel {
    /// Scene uniforms
    pub const SCENE: u32 = 0;
    /// Raw density volume (storage image, r32ui)
    pub const RAW_DENSITY: u32 = 1;
    /// Perceived density volume (storage image, rgba32f)
    pub const PERCEIVED_DENSITY: u32 = 2;
    /// Sample directions (storage buffer, vec4[])
    pub const DIRECTIONS: u32 = 3;
    /// Segment vertices in object space (storage buffer, vec4[])
    pub const SEGMENT_VERTICES: u32 = 4;
    /// Segment endpoint indices (storage buffer, uint[])
    pub const SEGMENT_INDICES: u32 = 5;
}

/// Global set of the scattering stage
pub mod scatter {
    /// A_f
    pub const FRONT_ATTENUATION: u32 = 0;
    /// A_b
    pub const BACK_ATTENUATION: u32 = 1;
    /// NG over R and TT
    pub const NG: u32 = 2;
    /// NG of TRT
    pub const NG_TRT: u32 = 3;
    /// Δ_f
    pub const FRONT_SHIFT: u32 = 4;
    /// Δ_b
    pub const BACK_SHIFT: u32 = 5;
    /// σ_f
    pub const FRONT_BETA: u32 = 6;
    /// σ_b
    pub const BACK_BETA: u32 = 7;
    /// GI volume
    pub const GLOBAL_ILLUMINATION: u32 = 8;
    /// Sample directions (storage buffer, vec4[])
    pub const DIRECTIONS: u32 = 9;
    /// Scene uniforms
    pub const SCENE: u32 = 10;

    /// The six 1D LUT bindings, in the order the LUT kernel writes them
    pub const LUTS: [u32; 6] = [
        FRONT_ATTENUATION,
        BACK_ATTENUATION,
        FRONT_SHIFT,
        BACK_SHIFT,
        FRONT_BETA,
        BACK_BETA,
    ];
}

/// Per-object set, bound with two dynamic offsets
pub mod object {
    /// Object uniforms
    pub const OBJECT: u32 = 0;
    /// Encoded material block
    pub const MATERIAL: u32 = 1;
}

/// Layout of the voxelization global set
pub fn voxel_global_layout() -> BindingLayoutDesc {
    let stages = ShaderStages::RASTER | ShaderStages::COMPUTE;
    BindingLayoutDesc::new("voxel_global")
        .add_uniform_buffer(voxel::SCENE, stages)
        .add_storage_image(voxel::RAW_DENSITY, stages)
        .add_storage_image(voxel::PERCEIVED_DENSITY, ShaderStages::COMPUTE)
        .add_storage_buffer(voxel::DIRECTIONS, ShaderStages::COMPUTE)
        .add_storage_buffer(voxel::SEGMENT_VERTICES, stages)
        .add_storage_buffer(voxel::SEGMENT_INDICES, stages)
}

/// Layout of the scattering global set
pub fn scatter_global_layout() -> BindingLayoutDesc {
    let stages = ShaderStages::COMPUTE;
    let mut layout = BindingLayoutDesc::new("scatter_global");
    for binding in scatter::LUTS {
        layout = layout.add_storage_image(binding, stages);
    }
    layout
        .add_storage_image(scatter::NG, stages)
        .add_storage_image(scatter::NG_TRT, stages)
        .add_storage_image(scatter::GLOBAL_ILLUMINATION, stages)
        .add_storage_buffer(scatter::DIRECTIONS, stages)
        .add_uniform_buffer(scatter::SCENE, stages)
}

/// Layout of a per-object set
pub fn object_layout(label: &str) -> BindingLayoutDesc {
    let stages = ShaderStages::RASTER | ShaderStages::COMPUTE;
    BindingLayoutDesc::new(label)
        .add_dynamic_uniform_buffer(object::OBJECT, stages)
        .add_dynamic_uniform_buffer(object::MATERIAL, stages)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_layout_offsets() {
        let layout = object_layout("object");
        assert_eq!(layout.dynamic_count(), 2);
        assert_eq!(layout.dynamic_index(object::MATERIAL), Some(1));
    }

    #[test]
    fn test_scatter_layout_has_every_binding() {
        let layout = scatter_global_layout();
        for binding in 0..=scatter::SCENE {
            assert!(layout.binding(binding).is_some(), "binding {binding} missing");
        }
    }
}
