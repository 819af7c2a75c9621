//! End-to-end frames through the software backend
//!
//! Each scenario builds a full pipeline, records frames for small hair scenes
//! and inspects the resulting volumes, tables and command counts.

use std::collections::HashSet;

use super::{hair_scene, hair_strands, software_pipeline};
use crate::core::config::{HairPipelineConfig, VoxelizationStrategy};
use crate::error::HairError;
use crate::foundation::math::{Mat4, Vec3, Vec4};
use crate::material::HairMaterial;
use crate::pipeline::HairPipeline;
use crate::render::{Kernel, SoftwareBackend};
use crate::scene::{HairMesh, SceneMesh};
use crate::voxel::{traverse_segment, VoxelGrid, DENSITY_FIXED_POINT_SCALE};

#[cfg(test)]
mod tests {
    use super::*;

    /// Voxels crossed by any segment of `mesh`, computed on the host
    fn crossed_voxels(mesh: &HairMesh, resolution: u32) -> HashSet<usize> {
        let geometry = mesh.geometry().unwrap();
        let model = mesh.model_matrix();
        let grid = VoxelGrid::from_bounds(&geometry.bounds().transformed(&model), resolution);
        let to_grid = |p: &Vec3| grid.to_grid(&(model * Vec4::new(p.x, p.y, p.z, 1.0)).xyz());

        let mut crossed = HashSet::new();
        for [a, b] in geometry.line_indices() {
            let (pa, pb) = (
                to_grid(&geometry.positions()[*a as usize]),
                to_grid(&geometry.positions()[*b as usize]),
            );
            traverse_segment(&pa, &pb, resolution, |voxel, _| {
                crossed.insert(grid.index(voxel));
            });
        }
        crossed
    }

    fn total_density(pipeline: &HairPipeline<SoftwareBackend>) -> u64 {
        let raw = pipeline.density_volume().unwrap();
        pipeline
            .backend()
            .read_uint_texels(raw)
            .unwrap()
            .iter()
            .map(|&v| u64::from(v))
            .sum()
    }

    #[test]
    fn test_hair_frame_end_to_end() {
        let mut pipeline = software_pipeline(32, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert_eq!(report.hair_mesh, Some(0));
        assert_eq!(report.segments, 100);
        assert!(report.luts_computed);
        assert!(report.gi_computed);
        assert!(!meshes[0].hair_material().unwrap().is_dirty());

        // Every deposit lies on a voxel some segment crosses
        let crossed = crossed_voxels(&meshes[0], 32);
        let raw = pipeline
            .backend()
            .read_uint_texels(pipeline.density_volume().unwrap())
            .unwrap();
        let occupied: Vec<usize> = raw.iter().enumerate().filter(|(_, &v)| v > 0).map(|(i, _)| i).collect();
        assert!(!occupied.is_empty());
        assert!(occupied.iter().all(|i| crossed.contains(i)));

        // 20 strands fully inside the volume, one fixed-point unit scale each
        let expected = 20.0 * DENSITY_FIXED_POINT_SCALE;
        let total = total_density(&pipeline) as f32;
        assert!((total - expected).abs() / expected < 0.01, "total {total}");

        let perceived = pipeline
            .backend()
            .read_float_texels(pipeline.perceived_density_volume().unwrap())
            .unwrap();
        assert!(perceived.iter().any(|c| c[0] > 0.0));

        let log = pipeline.backend().command_log();
        assert_eq!(log.runs(Kernel::DensityDda), 1);
        assert_eq!(log.runs(Kernel::PerceivedDensity), 1);
        assert_eq!(log.runs(Kernel::FiberLut), 1);
        assert_eq!(log.runs(Kernel::NgMerge), 1);
        assert_eq!(log.runs(Kernel::GlobalIllumination), 1);
        assert!(pipeline.backend().hazards().is_empty());

        let stats = pipeline.stats();
        assert_eq!(stats.frames_executed, 1);
        assert_eq!(stats.voxelizations, 1);
        assert_eq!(stats.gi_computations, 1);
    }

    #[test]
    fn test_frame_without_sample_directions() {
        crate::foundation::logging::try_init();
        let config = HairPipelineConfig::new().with_resolution(16).with_direction_count(0);
        let mut pipeline = HairPipeline::with_defaults(SoftwareBackend::new(), config).unwrap();
        let mut meshes = hair_scene();

        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert!(report.gi_computed);
        assert!(pipeline.directions().is_empty());

        // Only the isotropic coefficient survives without directions
        let perceived = pipeline
            .backend()
            .read_float_texels(pipeline.perceived_density_volume().unwrap())
            .unwrap();
        assert!(perceived.iter().all(|c| c[1] == 0.0 && c[2] == 0.0 && c[3] == 0.0));
        assert!(perceived.iter().any(|c| c[0] > 0.0));

        let gi = pipeline
            .backend()
            .read_float_texels(pipeline.luts().unwrap().global_illumination)
            .unwrap();
        assert!(gi.iter().flatten().all(|v| v.is_finite()));
        assert!(gi.iter().any(|c| c.iter().any(|&v| v != 0.0)));
        assert!(pipeline.backend().hazards().is_empty());
    }

    #[test]
    fn test_luts_and_gi_are_not_recomputed_for_clean_material() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        let report = pipeline.execute(1, &mut meshes).unwrap();
        assert!(!report.luts_computed);
        assert!(!report.gi_computed);

        let log = pipeline.backend().command_log();
        assert_eq!(log.runs(Kernel::FiberLut), 1);
        assert_eq!(log.runs(Kernel::GlobalIllumination), 1);
        assert_eq!(log.runs(Kernel::DensityDda), 2);
        assert!(pipeline.backend().hazards().is_empty());
    }

    #[test]
    fn test_dirty_material_recomputes_luts_only() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        pipeline.complete_frame(0).unwrap();
        let front = pipeline
            .backend()
            .read_float_texels(pipeline.luts().unwrap().front_attenuation)
            .unwrap()
            .to_vec();

        meshes[0].hair_material_mut().unwrap().mark_dirty();
        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert!(report.luts_computed);
        assert!(!report.gi_computed);
        assert!(!meshes[0].hair_material().unwrap().is_dirty());

        // Same parameters, same tables
        let again = pipeline
            .backend()
            .read_float_texels(pipeline.luts().unwrap().front_attenuation)
            .unwrap();
        assert_eq!(front.as_slice(), again);
        assert_eq!(pipeline.stats().lut_computations, 2);
        assert_eq!(pipeline.stats().gi_computations, 1);
    }

    #[test]
    fn test_invalidated_gi_is_recomputed() {
        let mut pipeline = software_pipeline(8, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        pipeline.invalidate_gi();
        let report = pipeline.execute(1, &mut meshes).unwrap();
        assert!(report.gi_computed);
        assert!(!report.luts_computed);
        assert_eq!(pipeline.backend().command_log().runs(Kernel::GlobalIllumination), 2);
    }

    #[test]
    fn test_voxelization_is_idempotent() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        let raw = pipeline.density_volume().unwrap();
        let first = pipeline.backend().read_uint_texels(raw).unwrap().to_vec();

        pipeline.execute(1, &mut meshes).unwrap();
        assert_eq!(pipeline.backend().read_uint_texels(raw).unwrap(), first.as_slice());
    }

    #[test]
    fn test_rasterization_strategy() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Rasterization);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        let log = pipeline.backend().command_log();
        assert_eq!(log.draws, 1);
        assert_eq!(log.runs(Kernel::DensityRaster), 1);
        assert_eq!(log.runs(Kernel::DensityDda), 0);
        assert!(pipeline.backend().hazards().is_empty());

        let expected = 20.0 * DENSITY_FIXED_POINT_SCALE;
        let total = total_density(&pipeline) as f32;
        assert!((total - expected).abs() / expected < 0.01, "total {total}");
    }

    #[test]
    fn test_transformed_hair_keeps_total_density() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let transform = Mat4::new_translation(&Vec3::new(5.0, -2.0, 1.0)) * Mat4::new_scaling(3.0);
        let mut meshes = vec![HairMesh::new("hair", hair_strands(20, 6), HairMaterial::default()).with_transform(transform)];

        pipeline.execute(0, &mut meshes).unwrap();
        // Lengths and the average fiber length scale together
        let expected = 20.0 * DENSITY_FIXED_POINT_SCALE;
        let total = total_density(&pipeline) as f32;
        assert!((total - expected).abs() / expected < 0.01, "total {total}");
    }

    #[test]
    fn test_scene_without_hair_publishes_empty_volumes() {
        let mut pipeline = software_pipeline(8, VoxelizationStrategy::Dda);
        let mut meshes = vec![HairMesh::without_material("body", Some(hair_strands(2, 3)))];

        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert_eq!(report.hair_mesh, None);
        assert_eq!(report.segments, 0);
        assert!(!report.luts_computed);
        assert!(!report.gi_computed);
        assert_eq!(total_density(&pipeline), 0);
        assert_eq!(pipeline.backend().command_log().total_runs(), 0);
        assert!(pipeline.backend().hazards().is_empty());
    }

    #[test]
    fn test_only_first_hair_mesh_is_voxelized() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let mut meshes = vec![
            HairMesh::without_material("body", None),
            HairMesh::new("hair", hair_strands(20, 6), HairMaterial::default()),
            HairMesh::new("beard", hair_strands(5, 3), HairMaterial::default()),
        ];

        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert_eq!(report.hair_mesh, Some(1));
        assert_eq!(report.segments, 100);
        // The beard keeps its dirty flag since its LUTs were never computed
        assert!(meshes[2].hair_material().unwrap().is_dirty());
    }

    #[test]
    fn test_reconfigure_reallocates_and_recomputes() {
        let mut pipeline = software_pipeline(16, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        pipeline.complete_frame(0).unwrap();
        let old_raw = pipeline.density_volume().unwrap();
        let old_gi = pipeline.luts().unwrap().global_illumination;

        pipeline.configure(8).unwrap();
        let raw = pipeline.density_volume().unwrap();
        assert_ne!(raw, old_raw);
        assert!(pipeline.backend().image_desc(old_raw).is_none());
        assert_eq!(pipeline.backend().image_desc(raw).unwrap().extent.width, 8);
        let gi = pipeline.luts().unwrap().global_illumination;
        assert_eq!(pipeline.backend().image_desc(gi).unwrap().extent.depth, 8);
        assert_ne!(gi, old_gi);

        let report = pipeline.execute(0, &mut meshes).unwrap();
        assert!(report.luts_computed);
        assert!(report.gi_computed);
        assert_eq!(pipeline.backend().read_uint_texels(raw).unwrap().len(), 512);
        assert!(pipeline.backend().hazards().is_empty());
    }

    #[test]
    fn test_frame_in_flight_is_rejected() {
        let mut pipeline = software_pipeline(8, VoxelizationStrategy::Dda);
        let mut meshes = hair_scene();

        pipeline.execute(0, &mut meshes).unwrap();
        assert!(pipeline.is_frame_in_flight(0));
        assert!(matches!(pipeline.execute(0, &mut meshes), Err(HairError::ResourceInUse { .. })));
        assert!(matches!(pipeline.configure(16), Err(HairError::ResourceInUse { .. })));

        pipeline.complete_frame(0).unwrap();
        assert!(!pipeline.is_frame_in_flight(0));
        assert!(pipeline.execute(0, &mut meshes).is_ok());
        assert!(pipeline.execute(2, &mut meshes).is_err());
    }

    #[test]
    fn test_too_many_meshes() {
        let config = HairPipelineConfig::new().with_resolution(8).with_max_objects(2);
        let mut pipeline = HairPipeline::with_defaults(SoftwareBackend::new(), config).unwrap();
        let mut meshes = vec![
            HairMesh::without_material("a", None),
            HairMesh::without_material("b", None),
            HairMesh::without_material("c", None),
        ];

        let result = pipeline.execute(0, &mut meshes);
        assert!(matches!(
            result,
            Err(HairError::InsufficientSlots {
                requested: 3,
                available: 2
            })
        ));
        assert!(!pipeline.is_frame_in_flight(0));
    }

    #[test]
    fn test_lifecycle_order_is_enforced() {
        let config = HairPipelineConfig::new().with_resolution(8);
        let mut pipeline = HairPipeline::new(SoftwareBackend::new(), config).unwrap();
        assert!(matches!(pipeline.build(), Err(HairError::MissingInput { .. })));

        pipeline.configure(8).unwrap();
        let mut meshes = hair_scene();
        assert!(matches!(pipeline.execute(0, &mut meshes), Err(HairError::NotBuilt)));

        pipeline.build().unwrap();
        pipeline.build().unwrap();
        assert!(pipeline.execute(0, &mut meshes).is_ok());
    }

    #[test]
    fn test_segment_buffers_grow_between_frames() {
        let mut pipeline = software_pipeline(8, VoxelizationStrategy::Dda);
        let mut small = vec![HairMesh::new("hair", hair_strands(2, 3), HairMaterial::default())];
        let mut large = vec![HairMesh::new("hair", hair_strands(50, 20), HairMaterial::default())];

        assert_eq!(pipeline.execute(0, &mut small).unwrap().segments, 4);
        pipeline.complete_frame(0).unwrap();
        assert_eq!(pipeline.execute(0, &mut large).unwrap().segments, 950);

        let expected = 50.0 * DENSITY_FIXED_POINT_SCALE;
        let total = total_density(&pipeline) as f32;
        assert!((total - expected).abs() / expected < 0.01, "total {total}");
    }

    #[test]
    fn test_teardown_releases_everything() {
        let mut pipeline = software_pipeline(8, VoxelizationStrategy::Rasterization);
        let mut meshes = hair_scene();
        pipeline.execute(0, &mut meshes).unwrap();

        pipeline.teardown();
        assert_eq!(pipeline.backend().live_object_count(), 0);
        assert!(!pipeline.is_built());
        assert!(pipeline.density_volume().is_none());

        pipeline.teardown();
        assert_eq!(pipeline.backend().live_object_count(), 0);
    }
}
