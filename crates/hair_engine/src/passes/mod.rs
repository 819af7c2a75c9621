//! Pipeline stages
//!
//! - [`voxelization`]: raw and perceived density volumes
//! - [`scattering`]: fiber LUTs, NG tables and the GI volume
//!
//! Stages own their images and programs; binding sets and buffers belong to
//! the pipeline and are handed in per frame.

pub mod bindings;
pub mod scattering;
pub mod uniforms;
pub mod voxelization;

use crate::render::BindingSetHandle;

pub use scattering::{LutHandles, MaterialDraw, ScatterReport, ScatteringLuts, ScatteringPass};
pub use uniforms::{ObjectUniforms, SceneUniforms};
pub use voxelization::{DensityVolumes, HairDraw, VoxelizationPass};

/// Binding sets a stage uses for one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSets {
    /// Set 0: stage-global resources
    pub global: BindingSetHandle,
    /// Set 1: per-object uniforms, bound with dynamic offsets
    pub object: BindingSetHandle,
}
