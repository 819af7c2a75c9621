//! # Hair Engine
//!
//! Hair fiber scattering materials and the volumetric precomputation passes
//! a physically based hair renderer needs every frame.
//!
//! ## Features
//!
//! - **Hair Materials**: Marschner, Disney and stylized models encoded into
//!   one 128-byte uniform block
//! - **Density Voxelization**: line rasterization or per-segment DDA into a
//!   fixed-point density volume, plus an SH L1 perceived density volume
//! - **Dual Scattering**: 1D attenuation, shift and width tables, NG tables
//!   and a global illumination volume
//! - **Backend Abstraction**: the passes record against [`render::RenderBackend`],
//!   implemented for Vulkan and for a validating CPU backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hair_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HairPipelineConfig::new().with_resolution(32);
//!     let mut pipeline = HairPipeline::with_defaults(SoftwareBackend::new(), config)?;
//!
//!     let strands = vec![vec![Vec3::new(0.0, 0.0, 0.0), Vec3::new(0.0, 1.0, 0.2)]];
//!     let mut meshes = vec![HairMesh::new("hair", StrandGeometry::from_strands(&strands), HairMaterial::default())];
//!
//!     let report = pipeline.execute(0, &mut meshes)?;
//!     println!("{} segments deposited", report.segments);
//!     pipeline.complete_frame(0)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]

pub mod config;
pub mod core;
pub mod error;
pub mod foundation;
pub mod geometry;
pub mod material;
pub mod passes;
pub mod pipeline;
pub mod render;
pub mod sampling;
pub mod scattering;
pub mod scene;
pub mod voxel;

pub use error::{HairError, HairResult};
pub use pipeline::{FrameReport, HairPipeline, PipelineStats};

#[cfg(test)]
mod tests;

/// Common imports for pipeline users
pub mod prelude {
    pub use crate::{
        core::config::{HairPipelineConfig, ShaderConfig, VoxelizationStrategy},
        error::{HairError, HairResult},
        foundation::math::{Bounds, Mat4, Vec3},
        geometry::{HairGeometry, StrandGeometry},
        material::{HairMaterial, HairMaterialKind},
        passes::LutHandles,
        pipeline::{FrameReport, HairPipeline, PipelineStats},
        render::{RenderBackend, SoftwareBackend},
        scene::{HairMesh, SceneMesh},
    };
}
