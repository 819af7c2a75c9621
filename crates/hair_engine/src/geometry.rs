//! Line-based hair geometry
//!
//! Hair is a set of strands, each a polyline; consecutive points of a strand
//! form one line segment.

use crate::foundation::math::{Bounds, Vec3};

/// Read access to hair line geometry in object space
pub trait HairGeometry {
    /// Vertex positions
    fn positions(&self) -> &[Vec3];

    /// Segment endpoints as index pairs into [`HairGeometry::positions`]
    fn line_indices(&self) -> &[[u32; 2]];

    /// Number of line segments
    fn segment_count(&self) -> usize {
        self.line_indices().len()
    }

    /// Mean strand length
    fn average_fiber_length(&self) -> f32;

    /// Object-space bounds of every vertex
    fn bounds(&self) -> Bounds;
}

/// Strands stored as shared vertices plus line index pairs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrandGeometry {
    positions: Vec<Vec3>,
    segments: Vec<[u32; 2]>,
    strand_count: usize,
    average_fiber_length: f32,
    bounds: Bounds,
}

impl StrandGeometry {
    /// Build from polylines.
    ///
    /// Strands with fewer than two points or no length are skipped, so they
    /// neither add segments nor dilute the average fiber length.
    pub fn from_strands<S>(strands: impl IntoIterator<Item = S>) -> Self
    where
        S: AsRef<[Vec3]>,
    {
        let mut geometry = Self::default();
        let mut total_length = 0.0;

        for strand in strands {
            let points = strand.as_ref();
            let length: f32 = points.windows(2).map(|pair| (pair[1] - pair[0]).norm()).sum();
            if points.len() < 2 || length <= 0.0 {
                continue;
            }
            total_length += length;
            let base = geometry.positions.len() as u32;
            for i in 0..points.len() as u32 - 1 {
                geometry.segments.push([base + i, base + i + 1]);
            }
            geometry.positions.extend_from_slice(points);
            geometry.strand_count += 1;
        }

        geometry.bounds = Bounds::from_points(&geometry.positions);
        if geometry.strand_count > 0 {
            geometry.average_fiber_length = total_length / geometry.strand_count as f32;
        }
        geometry
    }

    /// Split a flat point stream into strands of `points_per_strand` points
    pub fn from_point_stream(points: &[Vec3], points_per_strand: usize) -> Self {
        if points_per_strand < 2 {
            return Self::default();
        }
        Self::from_strands(points.chunks(points_per_strand))
    }

    /// Number of strands
    pub fn strand_count(&self) -> usize {
        self.strand_count
    }

    /// True when no segment exists
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl HairGeometry for StrandGeometry {
    fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    fn line_indices(&self) -> &[[u32; 2]] {
        &self.segments
    }

    fn average_fiber_length(&self) -> f32 {
        self.average_fiber_length
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_strands() {
        let strands = vec![
            vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 2.0, 0.0)],
            vec![Vec3::new(1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 4.0)],
            vec![Vec3::new(9.0, 9.0, 9.0)],
        ];
        let geometry = StrandGeometry::from_strands(&strands);

        assert_eq!(geometry.strand_count(), 2);
        assert_eq!(geometry.segment_count(), 3);
        assert_eq!(geometry.line_indices().to_vec(), vec![[0u32, 1], [1, 2], [3, 4]]);
        assert_relative_eq!(geometry.average_fiber_length(), 3.0);
        assert_relative_eq!(geometry.bounds().max, Vec3::new(1.0, 2.0, 4.0));
    }

    #[test]
    fn test_zero_length_strand_is_skipped() {
        let p = Vec3::new(0.5, 0.5, 0.5);
        let strands = vec![vec![Vec3::zeros(), Vec3::new(1.0, 1.0, 0.0)], vec![p, p, p]];
        let geometry = StrandGeometry::from_strands(&strands);

        assert_eq!(geometry.strand_count(), 1);
        assert_eq!(geometry.segment_count(), 1);
        assert_relative_eq!(geometry.average_fiber_length(), 2.0f32.sqrt());
    }

    #[test]
    fn test_point_stream_split() {
        let points: Vec<Vec3> = (0..9).map(|i| Vec3::new(i as f32, 0.0, 0.0)).collect();
        let geometry = StrandGeometry::from_point_stream(&points, 4);

        // 4 + 4 + 1 points; the trailing single point is dropped
        assert_eq!(geometry.strand_count(), 2);
        assert_eq!(geometry.segment_count(), 6);
        assert_eq!(geometry.positions().len(), 8);
        assert!(StrandGeometry::from_point_stream(&points, 1).is_empty());
    }

    #[test]
    fn test_empty_geometry() {
        let geometry = StrandGeometry::from_strands(Vec::<Vec<Vec3>>::new());
        assert!(geometry.is_empty());
        assert_eq!(geometry.average_fiber_length(), 0.0);
        assert!(geometry.bounds().is_empty());
    }
}
