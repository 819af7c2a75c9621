//! # Core Module
//!
//! Pipeline configuration shared by every subsystem.

pub mod config;

pub use config::{
    Config,
    ConfigError,
    HairPipelineConfig,
    ShaderConfig,
    VoxelizationStrategy,
};
