//! Device abstraction of the hair pipeline
//!
//! - [`backend`]: the [`RenderBackend`] trait
//! - [`state`]: checked resource state transitions
//! - [`software`]: CPU backend executing every kernel, used by tests and tools
//! - [`vulkan`]: `ash` backend recording into a caller-owned command buffer

pub mod backend;
pub mod binding;
pub mod handles;
pub mod image;
pub mod program;
pub mod software;
pub mod state;
pub mod vulkan;

pub use backend::{ClearValue, RenderBackend};
pub use binding::{BindingKind, BindingLayoutDesc, BindingResource, BindingWrite, ShaderStages};
pub use handles::{BindingSetHandle, BufferHandle, ImageHandle, LayoutHandle, ProgramHandle};
pub use image::{
    AddressMode, BorderColor, BufferDesc, BufferUsage, Extent3D, ImageDesc, ImageDimension, ImageUsage,
    SamplerDesc, TexelFormat,
};
pub use program::{Kernel, ProgramDesc, RasterState};
pub use software::SoftwareBackend;
pub use state::{AccessMask, HazardError, ImageBarrier, ImageLayout, Phase, ResourceState, StageMask, TrackedImage};
pub use vulkan::VulkanBackend;
