//! Opaque handles of backend objects
//!
//! Handles are generational slot-map keys: a handle outliving its object is
//! detected instead of aliasing a newer one.

use slotmap::new_key_type;

new_key_type! {
    /// Image (volume, LUT or render target)
    pub struct ImageHandle;
    /// Uniform or storage buffer
    pub struct BufferHandle;
    /// Binding layout
    pub struct LayoutHandle;
    /// Binding set allocated from a layout
    pub struct BindingSetHandle;
    /// Compute or graphics program
    pub struct ProgramHandle;
}
