//! Backend abstraction for the hair pipeline
//!
//! The pipeline owns no device objects directly. It talks to a
//! [`RenderBackend`] through handles: resource creation, binding updates and
//! command recording into the frame the external driver is building.

use super::binding::{BindingLayoutDesc, BindingWrite};
use super::handles::{BindingSetHandle, BufferHandle, ImageHandle, LayoutHandle, ProgramHandle};
use super::image::{BufferDesc, ImageDesc};
use super::program::ProgramDesc;
use super::state::ImageBarrier;
use crate::error::HairResult;

/// Clear color of an image, matching its format class
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClearValue {
    /// Integer formats
    Uint([u32; 4]),
    /// Float and normalized formats
    Float([f32; 4]),
}

/// Device interface used by the pipeline
pub trait RenderBackend {
    /// Allocate an image; contents start undefined
    fn create_image(&mut self, desc: &ImageDesc) -> HairResult<ImageHandle>;

    /// Free an image; unknown handles are ignored
    fn destroy_image(&mut self, image: ImageHandle);

    /// Allocate a host-visible buffer
    fn create_buffer(&mut self, desc: &BufferDesc) -> HairResult<BufferHandle>;

    /// Free a buffer; unknown handles are ignored
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Copy `data` into a buffer at `offset`
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> HairResult<()>;

    /// Create a binding layout
    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> HairResult<LayoutHandle>;

    /// Free a binding layout
    fn destroy_binding_layout(&mut self, layout: LayoutHandle);

    /// Allocate a binding set of `layout`
    fn create_binding_set(&mut self, layout: LayoutHandle) -> HairResult<BindingSetHandle>;

    /// Point bindings of a set at resources
    fn update_binding_set(&mut self, set: BindingSetHandle, writes: &[BindingWrite]) -> HairResult<()>;

    /// Free a binding set
    fn destroy_binding_set(&mut self, set: BindingSetHandle);

    /// Create a compute or line-raster program
    fn create_program(&mut self, desc: &ProgramDesc) -> HairResult<ProgramHandle>;

    /// Free a program
    fn destroy_program(&mut self, program: ProgramHandle);

    /// Required alignment of dynamic uniform offsets
    fn min_uniform_alignment(&self) -> u64;

    /// Round `size` up to the dynamic uniform alignment
    fn pad_uniform_size(&self, size: u64) -> u64 {
        let alignment = self.min_uniform_alignment().max(1);
        size.div_ceil(alignment) * alignment
    }

    /// Record an image barrier
    fn cmd_image_barrier(&mut self, barrier: &ImageBarrier) -> HairResult<()>;

    /// Record a clear; the image must be in the transfer-write state
    fn cmd_clear_image(&mut self, image: ImageHandle, value: ClearValue) -> HairResult<()>;

    /// Bind a program for the following set binds, draws and dispatches
    fn cmd_bind_program(&mut self, program: ProgramHandle) -> HairResult<()>;

    /// Bind a set at `index` of the bound program's layout
    fn cmd_bind_set(&mut self, index: u32, set: BindingSetHandle, dynamic_offsets: &[u32]) -> HairResult<()>;

    /// Draw `vertex_count` line-list vertices with the bound raster program
    fn cmd_draw_lines(&mut self, vertex_count: u32) -> HairResult<()>;

    /// Dispatch the bound compute program
    fn cmd_dispatch(&mut self, groups: [u32; 3]) -> HairResult<()>;
}
