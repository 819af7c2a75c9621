//! Uniform blocks uploaded by the pipeline
//!
//! std140-compatible: every member is a 16-byte vector or a column-major mat4.

use crate::core::config::VoxelizationStrategy;
use crate::foundation::math::{utils, Mat4, Vec3};
use crate::geometry::HairGeometry;
use crate::material::HairMaterial;
use crate::voxel::{VoxelGrid, DENSITY_FIXED_POINT_SCALE};

/// Upper bound on the voxels marched per direction by the perceived-density kernel
pub const MAX_MARCH_STEPS: u32 = 16;

/// Per-frame scene parameters
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneUniforms {
    /// (resolution, direction count, march steps, strategy)
    pub volume: [u32; 4],
    /// (fixed-point scale, 1 / fixed-point scale, 0, 0)
    pub scale: [f32; 4],
}

// SAFETY: repr(C), 32 bytes of u32/f32 with no padding.
unsafe impl bytemuck::Zeroable for SceneUniforms {}
unsafe impl bytemuck::Pod for SceneUniforms {}

impl SceneUniforms {
    /// Scene block for a volume configuration
    pub fn new(resolution: u32, direction_count: u32, strategy: VoxelizationStrategy) -> Self {
        Self {
            volume: [
                resolution,
                direction_count,
                resolution.min(MAX_MARCH_STEPS),
                strategy_id(strategy),
            ],
            scale: [DENSITY_FIXED_POINT_SCALE, 1.0 / DENSITY_FIXED_POINT_SCALE, 0.0, 0.0],
        }
    }

    /// Volume edge length
    pub fn resolution(&self) -> u32 {
        self.volume[0]
    }

    /// Number of sample directions
    pub fn direction_count(&self) -> u32 {
        self.volume[1]
    }

    /// Voxels marched per direction
    pub fn march_steps(&self) -> u32 {
        self.volume[2]
    }
}

fn strategy_id(strategy: VoxelizationStrategy) -> u32 {
    match strategy {
        VoxelizationStrategy::Rasterization => 0,
        VoxelizationStrategy::Dda => 1,
    }
}

/// Per-object parameters, one slot per scene mesh
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectUniforms {
    /// Object-to-world matrix, column-major
    pub model: [[f32; 4]; 4],
    /// World-space volume origin (xyz) and voxel size (w)
    pub volume_min: [f32; 4],
    /// (segment count, world-space average fiber length, material type id, hair flag)
    pub fiber: [f32; 4],
}

// SAFETY: repr(C), 96 bytes of f32 with no padding.
unsafe impl bytemuck::Zeroable for ObjectUniforms {}
unsafe impl bytemuck::Pod for ObjectUniforms {}

impl ObjectUniforms {
    /// Object block of a mesh.
    ///
    /// `grid` is only meaningful for the voxelized hair mesh; other meshes keep
    /// their transform and a zero hair flag.
    pub fn new(
        model: &Mat4,
        grid: Option<&VoxelGrid>,
        geometry: Option<&dyn HairGeometry>,
        material: Option<&HairMaterial>,
    ) -> Self {
        let (volume_min, voxel_size) = grid.map_or((Vec3::zeros(), 0.0), |g| (g.origin, g.voxel_size));
        let segments = geometry.map_or(0, |g| g.segment_count());
        let fiber_length = geometry.map_or(0.0, |g| g.average_fiber_length() * utils::uniform_scale(model));
        let type_id = material.map_or(0, |m| m.kind().type_id());
        let is_hair = grid.is_some() && material.is_some();

        Self {
            model: utils::to_columns(model),
            volume_min: [volume_min.x, volume_min.y, volume_min.z, voxel_size],
            fiber: [
                segments as f32,
                fiber_length,
                type_id as f32,
                if is_hair { 1.0 } else { 0.0 },
            ],
        }
    }

    /// Object-to-world matrix
    pub fn model_matrix(&self) -> Mat4 {
        utils::from_columns(&self.model)
    }

    /// Volume grid this object was voxelized into
    pub fn grid(&self, resolution: u32) -> VoxelGrid {
        VoxelGrid {
            origin: Vec3::new(self.volume_min[0], self.volume_min[1], self.volume_min[2]),
            voxel_size: self.volume_min[3],
            resolution,
        }
    }

    /// Number of line segments
    pub fn segment_count(&self) -> u32 {
        self.fiber[0] as u32
    }

    /// World-space average fiber length
    pub fn average_fiber_length(&self) -> f32 {
        self.fiber[1]
    }

    /// Material type id
    pub fn material_type_id(&self) -> u32 {
        self.fiber[2] as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::StrandGeometry;
    use crate::material::HairMaterialKind;
    use approx::assert_relative_eq;

    #[test]
    fn test_block_sizes() {
        assert_eq!(std::mem::size_of::<SceneUniforms>(), 32);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 96);
    }

    #[test]
    fn test_scene_uniforms_cap_march_steps() {
        let scene = SceneUniforms::new(64, 32, VoxelizationStrategy::Dda);
        assert_eq!(scene.march_steps(), MAX_MARCH_STEPS);
        assert_eq!(SceneUniforms::new(8, 0, VoxelizationStrategy::Rasterization).march_steps(), 8);
    }

    #[test]
    fn test_object_uniforms_scale_fiber_length() {
        let geometry = StrandGeometry::from_strands([[Vec3::zeros(), Vec3::new(0.0, 2.0, 0.0)]]);
        let model = Mat4::new_scaling(3.0);
        let grid = VoxelGrid::from_bounds(&geometry.bounds().transformed(&model), 8);
        let material = HairMaterial::default();
        let object = ObjectUniforms::new(&model, Some(&grid), Some(&geometry), Some(&material));

        assert_eq!(object.segment_count(), 1);
        assert_relative_eq!(object.average_fiber_length(), 6.0, epsilon = 1e-4);
        assert_eq!(
            HairMaterialKind::from_type_id(object.material_type_id()),
            Some(HairMaterialKind::Marschner)
        );
        assert_eq!(object.fiber[3], 1.0);
        assert_relative_eq!(object.model_matrix(), model);
        assert_eq!(object.grid(8), grid);
    }
}
