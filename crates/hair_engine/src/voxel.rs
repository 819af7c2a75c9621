//! Voxel grid mapping and segment traversal
//!
//! Grid space spans [0, N]^3 over the cubified world bounds of the hair; voxel
//! (i, j, k) covers [i, i+1) x [j, j+1) x [k, k+1). Both deposit strategies
//! walk a segment in grid space and report (voxel, length) pairs.

use crate::foundation::math::{Bounds, Vec3};

/// Raw density units per average fiber length
pub const DENSITY_FIXED_POINT_SCALE: f32 = 65536.0;

/// Segments shorter than this (in grid units) deposit nothing
const MIN_SEGMENT_LENGTH: f32 = 1.0e-6;

/// World-to-grid mapping of a cubic volume
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoxelGrid {
    /// World-space minimum corner
    pub origin: Vec3,
    /// World-space edge length of one voxel
    pub voxel_size: f32,
    /// Voxels per axis
    pub resolution: u32,
}

impl VoxelGrid {
    /// Grid covering the cube built from `bounds`
    pub fn from_bounds(bounds: &Bounds, resolution: u32) -> Self {
        let cube = bounds.cubify();
        Self {
            origin: cube.min,
            voxel_size: cube.max_extent() / resolution as f32,
            resolution,
        }
    }

    /// World position to grid coordinates
    pub fn to_grid(&self, world: &Vec3) -> Vec3 {
        (world - self.origin) / self.voxel_size
    }

    /// Linear texel index of a voxel
    pub fn index(&self, voxel: [u32; 3]) -> usize {
        let n = self.resolution as usize;
        voxel[0] as usize + voxel[1] as usize * n + voxel[2] as usize * n * n
    }

    /// World-space bounds of a voxel
    pub fn voxel_bounds(&self, voxel: [u32; 3]) -> Bounds {
        let min = self.origin + Vec3::new(voxel[0] as f32, voxel[1] as f32, voxel[2] as f32) * self.voxel_size;
        Bounds::new(min, min + Vec3::repeat(self.voxel_size))
    }
}

/// Parametric range of the segment a→b inside [0, n]^3, if any
pub fn clip_to_grid(a: &Vec3, b: &Vec3, n: u32) -> Option<(f32, f32)> {
    let d = b - a;
    let (mut t0, mut t1) = (0.0f32, 1.0f32);
    for axis in 0..3 {
        if d[axis].abs() < f32::EPSILON {
            if a[axis] < 0.0 || a[axis] > n as f32 {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d[axis];
        let mut near = (0.0 - a[axis]) * inv;
        let mut far = (n as f32 - a[axis]) * inv;
        if near > far {
            std::mem::swap(&mut near, &mut far);
        }
        t0 = t0.max(near);
        t1 = t1.min(far);
        if t0 > t1 {
            return None;
        }
    }
    Some((t0, t1))
}

fn voxel_of(p: &Vec3, n: u32) -> [u32; 3] {
    let clamp = |v: f32| (v.floor().max(0.0) as u32).min(n - 1);
    [clamp(p.x), clamp(p.y), clamp(p.z)]
}

/// Amanatides-Woo traversal of a grid-space segment.
///
/// Calls `visit(voxel, length)` for every voxel the segment crosses, with the
/// grid-space length of the part inside that voxel.
pub fn traverse_segment<F>(a: &Vec3, b: &Vec3, n: u32, mut visit: F)
where
    F: FnMut([u32; 3], f32),
{
    let d = b - a;
    let length = d.norm();
    if length < MIN_SEGMENT_LENGTH {
        return;
    }
    let Some((t_start, t_end)) = clip_to_grid(a, b, n) else {
        return;
    };

    // Nudge into the segment so a start on a voxel face picks the voxel it enters
    let nudge = (t_end - t_start) * 1.0e-5;
    let mut voxel = voxel_of(&(a + d * (t_start + nudge)), n);

    let mut step = [0i32; 3];
    let mut t_max = [f32::INFINITY; 3];
    let mut t_delta = [f32::INFINITY; 3];
    for axis in 0..3 {
        if d[axis] > 0.0 {
            step[axis] = 1;
            t_max[axis] = (voxel[axis] as f32 + 1.0 - a[axis]) / d[axis];
            t_delta[axis] = 1.0 / d[axis];
        } else if d[axis] < 0.0 {
            step[axis] = -1;
            t_max[axis] = (voxel[axis] as f32 - a[axis]) / d[axis];
            t_delta[axis] = -1.0 / d[axis];
        }
    }

    let mut t = t_start;
    loop {
        let axis = if t_max[0] <= t_max[1] && t_max[0] <= t_max[2] {
            0
        } else if t_max[1] <= t_max[2] {
            1
        } else {
            2
        };
        let t_next = t_max[axis].min(t_end);
        if t_next > t {
            visit(voxel, (t_next - t) * length);
        }
        if t_max[axis] >= t_end {
            break;
        }
        t = t_max[axis];
        let next = voxel[axis] as i32 + step[axis];
        if next < 0 || next >= n as i32 {
            break;
        }
        voxel[axis] = next as u32;
        t_max[axis] += t_delta[axis];
    }
}

/// Fragment walk of a grid-space segment as produced by line rasterization.
///
/// One fragment per voxel center covered along the segment's dominant axis,
/// each carrying an equal share of the clipped length. Segments too short to
/// cover a center still produce one fragment at their midpoint.
pub fn rasterize_segment<F>(a: &Vec3, b: &Vec3, n: u32, mut visit: F)
where
    F: FnMut([u32; 3], f32),
{
    let d = b - a;
    let length = d.norm();
    if length < MIN_SEGMENT_LENGTH {
        return;
    }
    let Some((t_start, t_end)) = clip_to_grid(a, b, n) else {
        return;
    };
    let span = t_end - t_start;
    if span <= 0.0 {
        return;
    }

    let p0 = a + d * t_start;
    let p1 = a + d * t_end;
    let major = d.iamax();
    let (lo, hi) = (p0[major].min(p1[major]), p0[major].max(p1[major]));

    // Voxel centers along the major axis covered by the segment
    let first = (lo - 0.5).ceil().max(0.0) as i64;
    let last = ((hi - 0.5).floor() as i64).min(n as i64 - 1);
    if last < first {
        visit(voxel_of(&((p0 + p1) * 0.5), n), length * span);
        return;
    }

    let count = (last - first + 1) as f32;
    let share = length * span / count;
    for i in first..=last {
        let t = (i as f32 + 0.5 - a[major]) / d[major];
        visit(voxel_of(&(a + d * t), n), share);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn collect(
        walk: fn(&Vec3, &Vec3, u32, &mut dyn FnMut([u32; 3], f32)),
        a: Vec3,
        b: Vec3,
        n: u32,
    ) -> Vec<([u32; 3], f32)> {
        let mut out = Vec::new();
        walk(&a, &b, n, &mut |v, l| out.push((v, l)));
        out
    }

    fn dda(a: &Vec3, b: &Vec3, n: u32, f: &mut dyn FnMut([u32; 3], f32)) {
        traverse_segment(a, b, n, f);
    }

    fn raster(a: &Vec3, b: &Vec3, n: u32, f: &mut dyn FnMut([u32; 3], f32)) {
        rasterize_segment(a, b, n, f);
    }

    #[test]
    fn test_axis_aligned_traversal() {
        let visits = collect(dda, Vec3::new(0.5, 0.5, 0.5), Vec3::new(3.5, 0.5, 0.5), 4);
        let voxels: Vec<[u32; 3]> = visits.iter().map(|(v, _)| *v).collect();
        assert_eq!(voxels, vec![[0, 0, 0], [1, 0, 0], [2, 0, 0], [3, 0, 0]]);
        assert_relative_eq!(visits[0].1, 0.5, epsilon = 1e-5);
        assert_relative_eq!(visits[1].1, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_traversal_conserves_length() {
        let a = Vec3::new(0.2, 1.7, 3.1);
        let b = Vec3::new(6.3, 4.4, 0.3);
        let visits = collect(dda, a, b, 8);
        let total: f32 = visits.iter().map(|(_, l)| l).sum();
        assert_relative_eq!(total, (b - a).norm(), epsilon = 1e-4);

        // Consecutive voxels differ by one step on one axis
        for pair in visits.windows(2) {
            let diff: i32 = (0..3).map(|i| (pair[0].0[i] as i32 - pair[1].0[i] as i32).abs()).sum();
            assert_eq!(diff, 1);
        }
    }

    #[test]
    fn test_traversal_clips_to_grid() {
        let a = Vec3::new(-2.0, 0.5, 0.5);
        let b = Vec3::new(6.0, 0.5, 0.5);
        let visits = collect(dda, a, b, 4);
        assert_eq!(visits.len(), 4);
        let total: f32 = visits.iter().map(|(_, l)| l).sum();
        assert_relative_eq!(total, 4.0, epsilon = 1e-4);

        assert!(collect(dda, Vec3::new(-2.0, -1.0, 0.5), Vec3::new(-1.0, -3.0, 0.5), 4).is_empty());
    }

    #[test]
    fn test_zero_length_segment_deposits_nothing() {
        let p = Vec3::new(1.5, 1.5, 1.5);
        assert!(collect(dda, p, p, 4).is_empty());
        assert!(collect(raster, p, p, 4).is_empty());
    }

    #[test]
    fn test_raster_walk_follows_dominant_axis() {
        let a = Vec3::new(0.5, 0.5, 0.5);
        let b = Vec3::new(7.5, 2.5, 0.5);
        let visits = collect(raster, a, b, 8);
        assert_eq!(visits.len(), 8);
        let total: f32 = visits.iter().map(|(_, l)| l).sum();
        assert_relative_eq!(total, (b - a).norm(), epsilon = 1e-4);
        assert_eq!(visits[0].0, [0, 0, 0]);
        assert_eq!(visits[7].0, [7, 2, 0]);

        let short = collect(raster, Vec3::new(1.1, 1.1, 1.1), Vec3::new(1.2, 1.1, 1.1), 4);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].0, [1, 1, 1]);
    }

    #[test]
    fn test_raster_share_splits_clipped_length() {
        // Clipped to [0, 4] along x: four centers share four units of length
        let visits = collect(raster, Vec3::new(-2.0, 0.5, 0.5), Vec3::new(6.0, 0.5, 0.5), 4);
        assert_eq!(visits.len(), 4);
        for (_, share) in &visits {
            assert_relative_eq!(*share, 1.0, epsilon = 1e-5);
        }

        // No center covered: the whole length lands on the midpoint voxel
        let short = collect(raster, Vec3::new(2.6, 0.2, 0.2), Vec3::new(2.9, 0.4, 0.2), 4);
        assert_eq!(short.len(), 1);
        assert_eq!(short[0].0, [2, 0, 0]);
        assert_relative_eq!(short[0].1, (0.3f32 * 0.3 + 0.2 * 0.2).sqrt(), epsilon = 1e-5);
    }

    #[test]
    fn test_grid_mapping() {
        let bounds = Bounds::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 1.0, 1.0));
        let grid = VoxelGrid::from_bounds(&bounds, 4);
        assert_relative_eq!(grid.voxel_size, 0.5);
        assert_relative_eq!(grid.to_grid(&Vec3::new(1.0, 0.5, 0.5)), Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(grid.index([1, 2, 3]), 1 + 2 * 4 + 3 * 16);
        let vb = grid.voxel_bounds([0, 0, 0]);
        assert_relative_eq!(vb.max - vb.min, Vec3::repeat(0.5));
    }
}
