//! Deterministic sample directions on the unit sphere
//!
//! Directions follow a Fibonacci spiral: the inclination steps uniformly in
//! cosine and the azimuth advances by the golden angle, which gives a near
//! uniform covering for any count.

use crate::foundation::math::{
    constants::{GOLDEN_RATIO, TAU},
    Vec3,
};

/// Ordered set of unit directions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirectionSet {
    directions: Vec<Vec3>,
}

impl DirectionSet {
    /// Generate `count` Fibonacci-sphere directions
    pub fn generate(count: u32) -> Self {
        let n = count as f32;
        let directions = (0..count)
            .map(|i| {
                let i = i as f32;
                let inclination = (1.0 - 2.0 * (i / n)).clamp(-1.0, 1.0).acos();
                let azimuth = i * TAU * (1.0 - 1.0 / GOLDEN_RATIO);
                Vec3::new(
                    inclination.sin() * azimuth.cos(),
                    inclination.sin() * azimuth.sin(),
                    inclination.cos(),
                )
            })
            .collect();
        Self { directions }
    }

    /// Wrap an explicit list of directions; each is normalized
    pub fn from_directions(directions: impl IntoIterator<Item = Vec3>) -> Self {
        Self {
            directions: directions.into_iter().map(|d| d.normalize()).collect(),
        }
    }

    /// Number of directions
    pub fn len(&self) -> usize {
        self.directions.len()
    }

    /// True for the isotropic (zero direction) set
    pub fn is_empty(&self) -> bool {
        self.directions.is_empty()
    }

    /// Directions in generation order
    pub fn directions(&self) -> &[Vec3] {
        &self.directions
    }

    /// Iterate directions
    pub fn iter(&self) -> impl Iterator<Item = &Vec3> {
        self.directions.iter()
    }

    /// std430 form: one vec4 per direction, w = 0.
    ///
    /// Always holds at least one element so the storage buffer is never empty.
    pub fn as_std430(&self) -> Vec<[f32; 4]> {
        if self.directions.is_empty() {
            return vec![[0.0; 4]];
        }
        self.directions.iter().map(|d| [d.x, d.y, d.z, 0.0]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_generates_unit_vectors() {
        let set = DirectionSet::generate(32);
        assert_eq!(set.len(), 32);
        for d in set.iter() {
            assert_relative_eq!(d.norm(), 1.0, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_directions_are_distinct() {
        let set = DirectionSet::generate(64);
        let dirs = set.directions();
        for i in 0..dirs.len() {
            for j in (i + 1)..dirs.len() {
                assert!((dirs[i] - dirs[j]).norm() > 1e-3, "directions {} and {} coincide", i, j);
            }
        }
    }

    #[test]
    fn test_generation_is_deterministic() {
        assert_eq!(DirectionSet::generate(17), DirectionSet::generate(17));
    }

    #[test]
    fn test_first_direction_is_pole() {
        let set = DirectionSet::generate(8);
        assert_relative_eq!(set.directions()[0], Vec3::new(0.0, 0.0, 1.0), epsilon = 1e-6);
    }

    #[test]
    fn test_covers_both_hemispheres() {
        let set = DirectionSet::generate(32);
        let mean: Vec3 = set.iter().sum::<Vec3>() / 32.0;
        assert!(mean.norm() < 0.1);
    }

    #[test]
    fn test_empty_set() {
        let set = DirectionSet::generate(0);
        assert!(set.is_empty());
        assert_eq!(set.as_std430(), vec![[0.0; 4]]);
        assert_eq!(DirectionSet::generate(3).as_std430().len(), 3);
    }
}
