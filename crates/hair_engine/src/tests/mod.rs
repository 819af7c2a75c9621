//! Crate-level scenario tests and shared fixtures

mod pipeline_scenarios;

use crate::core::config::{HairPipelineConfig, VoxelizationStrategy};
use crate::foundation::math::Vec3;
use crate::geometry::StrandGeometry;
use crate::material::HairMaterial;
use crate::pipeline::HairPipeline;
use crate::render::SoftwareBackend;
use crate::scene::HairMesh;

/// `strands` gently curved strands of `points` points hanging from a scalp patch
pub(crate) fn hair_strands(strands: usize, points: usize) -> StrandGeometry {
    let polylines: Vec<Vec<Vec3>> = (0..strands)
        .map(|s| {
            let root = Vec3::new((s % 5) as f32 * 0.2, 1.0, (s / 5) as f32 * 0.15);
            (0..points)
                .map(|p| {
                    let t = p as f32 / (points - 1) as f32;
                    root + Vec3::new(0.1 * (t * 3.0 + s as f32).sin(), -0.8 * t, 0.3 * t * t)
                })
                .collect()
        })
        .collect();
    StrandGeometry::from_strands(&polylines)
}

/// One hair mesh of 20 strands and 100 segments
pub(crate) fn hair_scene() -> Vec<HairMesh> {
    vec![HairMesh::new("hair", hair_strands(20, 6), HairMaterial::default())]
}

/// Configured and built pipeline over a fresh software backend
pub(crate) fn software_pipeline(
    resolution: u32,
    strategy: VoxelizationStrategy,
) -> HairPipeline<SoftwareBackend> {
    crate::foundation::logging::try_init();
    let config = HairPipelineConfig::new()
        .with_resolution(resolution)
        .with_direction_count(32)
        .with_strategy(strategy);
    HairPipeline::with_defaults(SoftwareBackend::new(), config).unwrap()
}
