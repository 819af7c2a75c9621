//! # Pipeline Configuration
//!
//! Settings of the hair precomputation pipeline: volume resolution, sample
//! directions, voxelization strategy, frame replication and shader lookup.
//! Every field has a default, so partial TOML/RON files are accepted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::config::{Config, ConfigError};

/// Default edge length of the density volume and of every LUT
pub const DEFAULT_RESOLUTION: u32 = 64;

/// Default number of Fibonacci sample directions
pub const MAX_DIRECTIONS: u32 = 32;

/// Upper bound on the direction count accepted by validation
pub const DIRECTION_LIMIT: u32 = 4096;

/// How hair segments are deposited into the raw density volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoxelizationStrategy {
    /// Line rasterization against a proxy target, one deposit per fragment
    Rasterization,
    /// Per-segment 3D DDA traversal in a compute kernel
    #[default]
    Dda,
}

/// # Shader Configuration
///
/// Where compiled SPIR-V kernels are looked up. Relative directories are
/// resolved against a few common working-directory layouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    /// Directory holding `<name>.spv` files
    pub directory: String,
}

impl ShaderConfig {
    /// Create a shader configuration for a directory
    pub fn new(directory: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Pick the first existing directory among the usual build output locations
    pub fn with_path_resolution() -> Self {
        let candidates = [
            "target/shaders",
            "../../target/shaders",
            "shaders",
            "resources/shaders",
        ];
        let directory = candidates
            .iter()
            .find(|dir| Path::new(dir).is_dir())
            .copied()
            .unwrap_or(candidates[0]);
        Self::new(directory)
    }

    /// Full path of a compiled shader
    pub fn spirv_path(&self, shader_file: &str) -> PathBuf {
        Path::new(&self.directory).join(format!("{}.spv", shader_file))
    }

    /// Check that every listed shader has been compiled
    pub fn validate(&self, shader_files: &[&str]) -> Result<(), String> {
        for file in shader_files {
            let path = self.spirv_path(file);
            if !path.exists() {
                return Err(format!("Shader not found: {}", path.display()));
            }
        }
        Ok(())
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self::new("target/shaders")
    }
}

/// # Hair Pipeline Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HairPipelineConfig {
    /// Edge length N of the density volume, the LUTs and the GI volume
    pub resolution: u32,
    /// Number of sample directions for perceived density and GI
    pub direction_count: u32,
    /// Voxelization strategy
    pub strategy: VoxelizationStrategy,
    /// Frames that may be recorded before the oldest completes
    pub frames_in_flight: u32,
    /// Object uniform slots available per frame
    pub max_objects: u32,
    /// Shader lookup
    pub shaders: ShaderConfig,
}

impl HairPipelineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            direction_count: MAX_DIRECTIONS,
            strategy: VoxelizationStrategy::default(),
            frames_in_flight: 2,
            max_objects: 64,
            shaders: ShaderConfig::default(),
        }
    }

    /// Set volume resolution
    pub fn with_resolution(mut self, resolution: u32) -> Self {
        self.resolution = resolution;
        self
    }

    /// Set direction count
    pub fn with_direction_count(mut self, count: u32) -> Self {
        self.direction_count = count;
        self
    }

    /// Set voxelization strategy
    pub fn with_strategy(mut self, strategy: VoxelizationStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Set frames in flight
    pub fn with_frames_in_flight(mut self, frames: u32) -> Self {
        self.frames_in_flight = frames;
        self
    }

    /// Set object slot count
    pub fn with_max_objects(mut self, max_objects: u32) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set shader configuration
    pub fn with_shaders(mut self, shaders: ShaderConfig) -> Self {
        self.shaders = shaders;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        validate_resolution(self.resolution)?;

        if self.direction_count > DIRECTION_LIMIT {
            return Err(format!(
                "Direction count {} exceeds the limit of {}",
                self.direction_count, DIRECTION_LIMIT
            ));
        }

        if self.frames_in_flight == 0 {
            return Err("Frames in flight must be at least 1".to_string());
        }

        if self.frames_in_flight > 8 {
            return Err("Frames in flight should not exceed 8".to_string());
        }

        if self.max_objects == 0 {
            return Err("At least one object slot is required".to_string());
        }

        Ok(())
    }
}

impl Default for HairPipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for HairPipelineConfig {}

/// Resolutions must be powers of two between 4 and 512
pub fn validate_resolution(resolution: u32) -> Result<(), String> {
    if !(4..=512).contains(&resolution) || !resolution.is_power_of_two() {
        return Err(format!(
            "Resolution {} must be a power of two in [4, 512]",
            resolution
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = HairPipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.direction_count, MAX_DIRECTIONS);
        assert_eq!(config.frames_in_flight, 2);
        assert_eq!(config.strategy, VoxelizationStrategy::Dda);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(HairPipelineConfig::new().with_resolution(48).validate().is_err());
        assert!(HairPipelineConfig::new().with_resolution(2).validate().is_err());
        assert!(HairPipelineConfig::new().with_resolution(1024).validate().is_err());
        assert!(HairPipelineConfig::new().with_frames_in_flight(0).validate().is_err());
        assert!(HairPipelineConfig::new().with_frames_in_flight(9).validate().is_err());
        assert!(HairPipelineConfig::new().with_max_objects(0).validate().is_err());
        assert!(HairPipelineConfig::new().with_direction_count(5000).validate().is_err());
        assert!(HairPipelineConfig::new().with_direction_count(0).validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hair.toml");

        let config = HairPipelineConfig::new()
            .with_resolution(32)
            .with_strategy(VoxelizationStrategy::Rasterization)
            .with_shaders(ShaderConfig::new("build/spv"));
        config.save_to_file(&path).unwrap();

        let loaded = HairPipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.resolution, 32);
        assert_eq!(loaded.strategy, VoxelizationStrategy::Rasterization);
        assert_eq!(loaded.shaders.directory, "build/spv");
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hair.ron");
        std::fs::write(&path, "(resolution: 16, direction_count: 8)").unwrap();

        let loaded = HairPipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.resolution, 16);
        assert_eq!(loaded.direction_count, 8);
        assert_eq!(loaded.max_objects, 64);
    }

    #[test]
    fn test_spirv_path() {
        let shaders = ShaderConfig::new("out");
        assert_eq!(shaders.spirv_path("hair_lut.comp"), Path::new("out").join("hair_lut.comp.spv"));
        assert!(shaders.validate(&["does_not_exist.comp"]).is_err());
    }
}
