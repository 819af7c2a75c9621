//! Math utilities and types
//!
//! Provides the vector, matrix and bounds types shared by the hair materials,
//! the voxelization grid and the scattering integrators.

pub use nalgebra::{Matrix4, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// RGB spectrum stored as a 3D vector
pub type Rgb = Vector3<f32>;

/// Smallest edge length a voxelized bounding cube is allowed to have
pub const MIN_BOUNDS_EXTENT: f32 = 1.0e-4;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Bounds {
    /// Create bounds from two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// An inverted box that any `grow` call replaces
    pub fn empty() -> Self {
        Self {
            min: Vec3::repeat(f32::INFINITY),
            max: Vec3::repeat(f32::NEG_INFINITY),
        }
    }

    /// Bounds enclosing every point of the iterator
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Vec3>,
    {
        let mut bounds = Self::empty();
        for point in points {
            bounds.grow(point);
        }
        bounds
    }

    /// Extend the box to contain `point`
    pub fn grow(&mut self, point: &Vec3) {
        self.min = self.min.inf(point);
        self.max = self.max.sup(point);
    }

    /// True when no point was ever added
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Box center
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Edge lengths
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Largest edge length
    pub fn max_extent(&self) -> f32 {
        self.size().max()
    }

    /// Turn the box into a cube around its center, sized by the largest half-extent.
    ///
    /// Degenerate boxes are inflated to [`MIN_BOUNDS_EXTENT`] so voxel sizes stay non-zero.
    pub fn cubify(&self) -> Self {
        if self.is_empty() {
            let half = Vec3::repeat(MIN_BOUNDS_EXTENT * 0.5);
            return Self::new(-half, half);
        }
        let center = self.center();
        let mut edge = self.max_extent();
        if edge < MIN_BOUNDS_EXTENT {
            // Slack of a few ulps at the center's magnitude so the edge survives rounding
            edge = MIN_BOUNDS_EXTENT + center.abs().max() * 4.0 * f32::EPSILON;
        }
        let min = center - Vec3::repeat(edge * 0.5);
        Self::new(min, min + Vec3::repeat(edge))
    }

    /// Axis-aligned bounds of this box after transforming its eight corners
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut out = Self::empty();
        for i in 0..8 {
            let corner = Point3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.grow(&matrix.transform_point(&corner).coords);
        }
        out
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// 2 * Pi
    pub const TAU: f32 = 2.0 * PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Golden ratio
    pub const GOLDEN_RATIO: f32 = 1.618_034;
}

/// Math utility functions
pub mod utils {
    use super::*;

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * constants::DEG_TO_RAD
    }

    /// Square root clamped at zero
    pub fn safe_sqrt(x: f32) -> f32 {
        x.max(0.0).sqrt()
    }

    /// Arcsine with the argument clamped into [-1, 1]
    pub fn safe_asin(x: f32) -> f32 {
        x.clamp(-1.0, 1.0).asin()
    }

    /// Wrap an angle into [-pi, pi]
    pub fn wrap_angle(mut angle: f32) -> f32 {
        while angle > constants::PI {
            angle -= constants::TAU;
        }
        while angle < -constants::PI {
            angle += constants::TAU;
        }
        angle
    }

    /// Rec. 709 luminance of an RGB triple
    pub fn luminance(c: &Rgb) -> f32 {
        0.2126 * c.x + 0.7152 * c.y + 0.0722 * c.z
    }

    /// Uniform scale factor of an affine matrix (cube root of the 3x3 determinant)
    pub fn uniform_scale(matrix: &Mat4) -> f32 {
        matrix.fixed_view::<3, 3>(0, 0).determinant().abs().cbrt()
    }

    /// Column-major array form used by uniform blocks
    pub fn to_columns(matrix: &Mat4) -> [[f32; 4]; 4] {
        let mut columns = [[0.0; 4]; 4];
        for (c, column) in columns.iter_mut().enumerate() {
            for (r, value) in column.iter_mut().enumerate() {
                *value = matrix[(r, c)];
            }
        }
        columns
    }

    /// Rebuild a matrix from its column-major array form
    pub fn from_columns(columns: &[[f32; 4]; 4]) -> Mat4 {
        let mut matrix = Mat4::zeros();
        for (c, column) in columns.iter().enumerate() {
            for (r, value) in column.iter().enumerate() {
                matrix[(r, c)] = *value;
            }
        }
        matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cubify_uses_largest_half_extent() {
        let bounds = Bounds::new(Vec3::new(0.0, 0.0, 0.0), Vec3::new(4.0, 2.0, 1.0));
        let cube = bounds.cubify();

        assert_relative_eq!(cube.center(), Vec3::new(2.0, 1.0, 0.5));
        assert_relative_eq!(cube.size(), Vec3::new(4.0, 4.0, 4.0));
    }

    #[test]
    fn test_cubify_degenerate_bounds() {
        let bounds = Bounds::from_points(&[Vec3::new(1.0, 1.0, 1.0)]);
        let cube = bounds.cubify();
        assert!(cube.max_extent() >= MIN_BOUNDS_EXTENT);

        let empty = Bounds::empty().cubify();
        assert!(!empty.is_empty());
    }

    #[test]
    fn test_cubify_degenerate_bounds_far_from_origin() {
        for &p in &[Vec3::new(1.0, 1.0, 1.0), Vec3::new(-37.5, 12.25, 250.0), Vec3::new(1.0e4, 0.0, -1.0e4)] {
            let cube = Bounds::from_points(&[p]).cubify();
            assert!(cube.max_extent() >= MIN_BOUNDS_EXTENT, "extent {} at {p:?}", cube.max_extent());
            assert!(cube.size().min() > 0.0);
        }
    }

    #[test]
    fn test_transformed_bounds() {
        let bounds = Bounds::new(Vec3::new(-1.0, -1.0, -1.0), Vec3::new(1.0, 1.0, 1.0));
        let matrix = Mat4::new_translation(&Vec3::new(5.0, 0.0, 0.0)) * Mat4::new_scaling(2.0);
        let moved = bounds.transformed(&matrix);

        assert_relative_eq!(moved.min, Vec3::new(3.0, -2.0, -2.0));
        assert_relative_eq!(moved.max, Vec3::new(7.0, 2.0, 2.0));
    }

    #[test]
    fn test_column_round_trip_and_scale() {
        let matrix = Mat4::new_translation(&Vec3::new(1.0, 2.0, 3.0)) * Mat4::new_scaling(3.0);
        let columns = utils::to_columns(&matrix);

        assert_eq!(columns[3], [1.0, 2.0, 3.0, 1.0]);
        assert_relative_eq!(utils::from_columns(&columns), matrix);
        assert_relative_eq!(utils::uniform_scale(&matrix), 3.0, epsilon = 1e-5);
    }

    #[test]
    fn test_wrap_angle() {
        use constants::PI;
        assert_relative_eq!(utils::wrap_angle(3.0 * PI), PI, epsilon = 1e-5);
        assert_relative_eq!(utils::wrap_angle(-1.5 * PI), 0.5 * PI, epsilon = 1e-5);
        assert_relative_eq!(utils::deg_to_rad(180.0), PI);
    }
}
