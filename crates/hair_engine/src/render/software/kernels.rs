//! CPU versions of the GPU kernels
//!
//! Each function covers the texels (or segments) a dispatch of the given size
//! reaches, the way the GLSL kernels guard on `gl_GlobalInvocationID`.

use crate::core::config::VoxelizationStrategy;
use crate::foundation::math::{constants::PI, Vec3, Vec4};
use crate::passes::uniforms::{ObjectUniforms, SceneUniforms};
use crate::scattering::dual::{dual_scattering, global_illumination, phi_bin, theta_bin, NgTable};
use crate::scattering::fiber::FiberParams;
use crate::voxel::{rasterize_segment, traverse_segment, DENSITY_FIXED_POINT_SCALE};

const SH_Y00: f32 = 0.282_095;
const SH_Y1: f32 = 0.488_603;

/// Segment input of the deposit kernels
pub struct DepositInput<'a> {
    /// Scene block
    pub scene: &'a SceneUniforms,
    /// Object block of the hair mesh
    pub object: &'a ObjectUniforms,
    /// Object-space vertices
    pub vertices: &'a [[f32; 4]],
    /// Endpoint index pairs, flattened
    pub indices: &'a [u32],
    /// Segments reached by the dispatch or draw
    pub segment_limit: usize,
}

/// Accumulate segment lengths into the raw density volume
pub fn deposit_density(strategy: VoxelizationStrategy, input: &DepositInput<'_>, raw: &mut [u32]) {
    let n = input.scene.resolution();
    let fiber_length = input.object.average_fiber_length();
    let grid = input.object.grid(n);
    if fiber_length <= 0.0 || grid.voxel_size <= 0.0 {
        return;
    }
    let model = input.object.model_matrix();
    let units_per_grid_length = grid.voxel_size / fiber_length * DENSITY_FIXED_POINT_SCALE;

    let to_grid = |index: u32| -> Option<Vec3> {
        let v = input.vertices.get(index as usize)?;
        let world = model * Vec4::new(v[0], v[1], v[2], 1.0);
        Some(grid.to_grid(&world.xyz()))
    };

    let segments = (input.object.segment_count() as usize).min(input.segment_limit);
    for pair in input.indices.chunks_exact(2).take(segments) {
        let (Some(a), Some(b)) = (to_grid(pair[0]), to_grid(pair[1])) else {
            continue;
        };
        let mut deposit = |voxel: [u32; 3], length: f32| {
            let units = (length * units_per_grid_length).round() as u32;
            let texel = &mut raw[grid.index(voxel)];
            *texel = texel.saturating_add(units);
        };
        match strategy {
            VoxelizationStrategy::Dda => traverse_segment(&a, &b, n, &mut deposit),
            VoxelizationStrategy::Rasterization => rasterize_segment(&a, &b, n, &mut deposit),
        }
    }
}

/// Project the optical depth seen along each direction onto SH L1
pub fn perceived_density(
    scene: &SceneUniforms,
    packing_density: f32,
    raw: &[u32],
    directions: &[Vec3],
    coverage: [u32; 3],
    out: &mut [[f32; 4]],
) {
    let n = scene.resolution();
    let nn = n as usize;
    let sigma_at = |p: &Vec3| -> f32 {
        if p.x < 0.0 || p.y < 0.0 || p.z < 0.0 {
            return 0.0;
        }
        let (x, y, z) = (p.x as u32, p.y as u32, p.z as u32);
        if x >= n || y >= n || z >= n {
            return 0.0;
        }
        let index = x as usize + y as usize * nn + z as usize * nn * nn;
        raw[index] as f32 / DENSITY_FIXED_POINT_SCALE * packing_density
    };

    let steps = scene.march_steps();
    for z in 0..coverage[2].min(n) {
        for y in 0..coverage[1].min(n) {
            for x in 0..coverage[0].min(n) {
                let center = Vec3::new(x as f32 + 0.5, y as f32 + 0.5, z as f32 + 0.5);
                let index = x as usize + y as usize * nn + z as usize * nn * nn;

                if directions.is_empty() {
                    out[index] = [4.0 * PI * SH_Y00 * sigma_at(&center), 0.0, 0.0, 0.0];
                    continue;
                }

                let mut c = [0.0f32; 4];
                for d in directions {
                    let tau: f32 = (0..steps).map(|s| sigma_at(&(center + d * (s as f32 + 0.5)))).sum();
                    c[0] += tau * SH_Y00;
                    c[1] += tau * SH_Y1 * d.y;
                    c[2] += tau * SH_Y1 * d.z;
                    c[3] += tau * SH_Y1 * d.x;
                }
                let norm = 4.0 * PI / directions.len() as f32;
                out[index] = c.map(|v| v * norm);
            }
        }
    }
}

/// Fill the six dual-scattering tables, ordered A_f, A_b, Δ_f, Δ_b, σ_f, σ_b
pub fn fiber_luts(params: &FiberParams, n: u32, coverage: u32, luts: &mut [Vec<[f32; 4]>; 6]) {
    for i in 0..coverage.min(n) {
        let terms = dual_scattering(params, theta_bin(i, n));
        let values = [
            terms.front_attenuation,
            terms.back_attenuation,
            terms.front_shift,
            terms.back_shift,
            terms.front_beta,
            terms.back_beta,
        ];
        for (lut, value) in luts.iter_mut().zip(values) {
            lut[i as usize] = [value.x, value.y, value.z, 1.0];
        }
    }
}

/// Fill NG and NG_TRT over the (theta, phi) bins reached by the dispatch
pub fn ng_tables(params: &FiberParams, n: u32, coverage: [u32; 2], ng: &mut [[f32; 4]], ng_trt: &mut [[f32; 4]]) {
    let table = NgTable::compute(params, n);
    for y in 0..coverage[1].min(n) {
        for x in 0..coverage[0].min(n) {
            let index = (x + y * n) as usize;
            let (a, b) = (table.ng()[index], table.ng_trt()[index]);
            ng[index] = [a.x, a.y, a.z, 1.0];
            ng_trt[index] = [b.x, b.y, b.z, 1.0];
        }
    }
}

/// Fill the GI volume over (theta_i, theta_o, phi)
pub fn global_illumination_volume(table: &NgTable, directions: &[Vec3], coverage: [u32; 3], out: &mut [[f32; 4]]) {
    let n = table.resolution();
    let nn = n as usize;
    for z in 0..coverage[2].min(n) {
        for y in 0..coverage[1].min(n) {
            for x in 0..coverage[0].min(n) {
                let index = x as usize + y as usize * nn + z as usize * nn * nn;
                out[index] = global_illumination(table, theta_bin(x, n), theta_bin(y, n), phi_bin(z, n), directions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Mat4;
    use crate::geometry::StrandGeometry;
    use crate::material::{HairMaterial, HairMaterialKind, MarschnerHair};
    use crate::sampling::DirectionSet;
    use crate::voxel::VoxelGrid;
    use approx::assert_relative_eq;

    fn params() -> FiberParams {
        FiberParams::decode(HairMaterialKind::Marschner, &MarschnerHair::new().encode())
    }

    #[test]
    fn test_deposit_of_one_fiber_totals_fixed_scale() {
        let geometry = StrandGeometry::from_strands([[Vec3::new(0.0, 0.1, 0.1), Vec3::new(1.0, 0.9, 0.9)]]);
        let bounds = crate::geometry::HairGeometry::bounds(&geometry);
        let grid = VoxelGrid::from_bounds(&bounds, 8);
        let material = HairMaterial::default();
        let object = ObjectUniforms::new(&Mat4::identity(), Some(&grid), Some(&geometry), Some(&material));
        let scene = SceneUniforms::new(8, 0, VoxelizationStrategy::Dda);
        let vertices: Vec<[f32; 4]> = [[0.0, 0.1, 0.1, 1.0], [1.0, 0.9, 0.9, 1.0]].to_vec();
        let input = DepositInput {
            scene: &scene,
            object: &object,
            vertices: &vertices,
            indices: &[0, 1],
            segment_limit: 1,
        };

        for strategy in [VoxelizationStrategy::Dda, VoxelizationStrategy::Rasterization] {
            let mut raw = vec![0u32; 512];
            deposit_density(strategy, &input, &mut raw);
            let total: u64 = raw.iter().map(|&v| v as u64).sum();
            // The whole fiber lies inside the volume: one average fiber length
            assert!((total as f32 - DENSITY_FIXED_POINT_SCALE).abs() < 16.0, "{strategy:?}: {total}");
        }
    }

    #[test]
    fn test_degenerate_strand_does_not_dilute_deposit() {
        let (a, b) = (Vec3::new(0.0, 0.0, 0.5), Vec3::new(1.0, 1.0, 0.5));
        let p = Vec3::new(0.5, 0.5, 0.5);
        let geometry = StrandGeometry::from_strands([vec![a, b], vec![p, p]]);
        let bounds = crate::geometry::HairGeometry::bounds(&geometry);
        let grid = VoxelGrid::from_bounds(&bounds, 8);
        let material = HairMaterial::default();
        let object = ObjectUniforms::new(&Mat4::identity(), Some(&grid), Some(&geometry), Some(&material));
        let scene = SceneUniforms::new(8, 0, VoxelizationStrategy::Dda);
        let vertices = vec![[a.x, a.y, a.z, 1.0], [b.x, b.y, b.z, 1.0]];
        let input = DepositInput {
            scene: &scene,
            object: &object,
            vertices: &vertices,
            indices: &[0, 1],
            segment_limit: 1,
        };

        let mut raw = vec![0u32; 512];
        deposit_density(VoxelizationStrategy::Dda, &input, &mut raw);
        let total: u64 = raw.iter().map(|&v| v as u64).sum();
        assert!((total as f32 - DENSITY_FIXED_POINT_SCALE).abs() < 16.0, "{total}");
    }

    #[test]
    fn test_perceived_density_isotropic_fallback() {
        let scene = SceneUniforms::new(4, 0, VoxelizationStrategy::Dda);
        let mut raw = vec![0u32; 64];
        raw[0] = DENSITY_FIXED_POINT_SCALE as u32;
        let mut out = vec![[0.0; 4]; 64];
        perceived_density(&scene, 0.5, &raw, &[], [4, 4, 4], &mut out);

        assert_relative_eq!(out[0][0], 4.0 * PI * SH_Y00 * 0.5, epsilon = 1e-5);
        assert_eq!(out[1], [0.0; 4]);
    }

    #[test]
    fn test_perceived_density_of_empty_volume_is_zero() {
        let scene = SceneUniforms::new(4, 8, VoxelizationStrategy::Dda);
        let raw = vec![0u32; 64];
        let mut out = vec![[1.0; 4]; 64];
        let directions = DirectionSet::generate(8);
        perceived_density(&scene, 0.7, &raw, directions.directions(), [4, 4, 4], &mut out);
        assert!(out.iter().all(|c| *c == [0.0; 4]));
    }

    #[test]
    fn test_partial_coverage_leaves_texels_untouched() {
        let mut luts: [Vec<[f32; 4]>; 6] = std::array::from_fn(|_| vec![[-1.0; 4]; 32]);
        fiber_luts(&params(), 32, 16, &mut luts);
        for lut in &luts {
            assert_eq!(lut[16], [-1.0; 4]);
            assert_eq!(lut[0][3], 1.0);
        }
    }
}
