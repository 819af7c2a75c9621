//! Resource state tracking with checked transitions
//!
//! Every pipeline-owned image carries a [`TrackedImage`]: its current
//! (layout, access, stage) triple and a coarse [`Phase`]. Transitions return the
//! barrier the caller must record; the barrier source always equals the state
//! the image was last left in.

use bitflags::bitflags;

use super::handles::ImageHandle;

/// Image memory layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageLayout {
    /// Contents undefined; transitioning out discards them
    Undefined,
    /// Storage load/store
    General,
    /// Clear destination
    TransferDst,
    /// Sampled in shaders
    ShaderReadOnly,
}

bitflags! {
    /// Memory access kinds
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessMask: u32 {
        /// Shader loads and samples
        const SHADER_READ = 1 << 0;
        /// Shader stores and atomics
        const SHADER_WRITE = 1 << 1;
        /// Clears
        const TRANSFER_WRITE = 1 << 2;
        /// Render-pass attachment writes
        const COLOR_ATTACHMENT_WRITE = 1 << 3;
    }
}

bitflags! {
    /// Pipeline stages
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StageMask: u32 {
        /// Start of the pipeline, nothing to wait on
        const TOP_OF_PIPE = 1 << 0;
        /// Clears
        const TRANSFER = 1 << 1;
        /// Compute kernels
        const COMPUTE_SHADER = 1 << 2;
        /// Vertex stage
        const VERTEX_SHADER = 1 << 3;
        /// Geometry stage
        const GEOMETRY_SHADER = 1 << 4;
        /// Fragment stage
        const FRAGMENT_SHADER = 1 << 5;
    }
}

/// Coarse lifecycle phase of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Never written since allocation or reset
    Undefined,
    /// Being cleared or written
    Writable,
    /// Published for shader reads
    Readable,
}

/// (layout, access, stage) of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceState {
    /// Layout
    pub layout: ImageLayout,
    /// Accesses performed in this state
    pub access: AccessMask,
    /// Stages performing them
    pub stage: StageMask,
}

impl ResourceState {
    /// State of a freshly allocated image
    pub const UNDEFINED: Self = Self::new(ImageLayout::Undefined, AccessMask::empty(), StageMask::TOP_OF_PIPE);

    /// Clear destination
    pub const TRANSFER_WRITE: Self =
        Self::new(ImageLayout::TransferDst, AccessMask::TRANSFER_WRITE, StageMask::TRANSFER);

    /// Build a state
    pub const fn new(layout: ImageLayout, access: AccessMask, stage: StageMask) -> Self {
        Self { layout, access, stage }
    }

    /// Storage writes from `stage`
    pub const fn storage_write(stage: StageMask) -> Self {
        Self::new(ImageLayout::General, AccessMask::SHADER_WRITE, stage)
    }

    /// Storage loads from `stage`
    pub const fn storage_read(stage: StageMask) -> Self {
        Self::new(ImageLayout::General, AccessMask::SHADER_READ, stage)
    }

    /// Sampled reads from `stage`
    pub const fn sampled(stage: StageMask) -> Self {
        Self::new(ImageLayout::ShaderReadOnly, AccessMask::SHADER_READ, stage)
    }
}

/// Image barrier to record before the next access
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrier {
    /// Image
    pub image: ImageHandle,
    /// State the image is leaving
    pub src: ResourceState,
    /// State the image is entering
    pub dst: ResourceState,
}

/// Violations of the resource state machine
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum HazardError {
    /// A read was requested from an image nobody has written
    #[error("{label}: read before any write")]
    ReadBeforeWrite {
        /// Image label
        label: String,
    },

    /// A barrier source does not describe the image's current state
    #[error("{label}: barrier source {recorded:?} does not match current state {current:?}")]
    SourceMismatch {
        /// Image label
        label: String,
        /// Source recorded in the barrier
        recorded: ResourceState,
        /// State the image is actually in
        current: ResourceState,
    },

    /// An access was issued in the wrong layout
    #[error("{label}: {operation} requires layout {expected:?}, image is in {actual:?}")]
    LayoutMismatch {
        /// Image label
        label: String,
        /// Offending operation
        operation: &'static str,
        /// Required layout
        expected: ImageLayout,
        /// Current layout
        actual: ImageLayout,
    },

    /// An access was issued without the matching access mask
    #[error("{label}: {operation} requires {required:?} access, image allows {actual:?}")]
    MissingAccess {
        /// Image label
        label: String,
        /// Offending operation
        operation: &'static str,
        /// Access needed
        required: AccessMask,
        /// Access granted by the last barrier
        actual: AccessMask,
    },

    /// An access came from a stage the last barrier did not make visible to
    #[error("{label}: {operation} from {required:?}, barrier covers {actual:?}")]
    StageMismatch {
        /// Image label
        label: String,
        /// Offending operation
        operation: &'static str,
        /// Stage performing the access
        required: StageMask,
        /// Stages of the last barrier
        actual: StageMask,
    },
}

/// An image plus its tracked state
#[derive(Debug, Clone)]
pub struct TrackedImage {
    handle: ImageHandle,
    label: String,
    state: ResourceState,
    phase: Phase,
    readable: ResourceState,
}

impl TrackedImage {
    /// Track a freshly allocated image; `readable` is the state it is published in
    pub fn new(handle: ImageHandle, label: impl Into<String>, readable: ResourceState) -> Self {
        Self {
            handle,
            label: label.into(),
            state: ResourceState::UNDEFINED,
            phase: Phase::Undefined,
            readable,
        }
    }

    /// Move into a write state; allowed from every phase
    pub fn to_writable(&mut self, dst: ResourceState) -> ImageBarrier {
        let barrier = ImageBarrier {
            image: self.handle,
            src: self.state,
            dst,
        };
        self.state = dst;
        self.phase = Phase::Writable;
        barrier
    }

    /// Publish the image for reads.
    ///
    /// Returns `None` when it is already readable. Fails when it was never written.
    pub fn to_readable(&mut self) -> Result<Option<ImageBarrier>, HazardError> {
        match self.phase {
            Phase::Undefined => Err(HazardError::ReadBeforeWrite {
                label: self.label.clone(),
            }),
            Phase::Readable => Ok(None),
            Phase::Writable => {
                let barrier = ImageBarrier {
                    image: self.handle,
                    src: self.state,
                    dst: self.readable,
                };
                self.state = self.readable;
                self.phase = Phase::Readable;
                Ok(Some(barrier))
            }
        }
    }

    /// Fail unless the image is published for reads
    pub fn require_readable(&self) -> Result<(), HazardError> {
        if self.phase == Phase::Readable {
            Ok(())
        } else {
            Err(HazardError::ReadBeforeWrite {
                label: self.label.clone(),
            })
        }
    }

    /// Forget the contents; the next transition discards them
    pub fn reset(&mut self) {
        self.state = ResourceState::UNDEFINED;
        self.phase = Phase::Undefined;
    }

    /// Backend handle
    pub fn handle(&self) -> ImageHandle {
        self.handle
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current state
    pub fn state(&self) -> ResourceState {
        self.state
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once published for reads
    pub fn is_readable(&self) -> bool {
        self.phase == Phase::Readable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn tracked() -> TrackedImage {
        let mut keys: SlotMap<ImageHandle, ()> = SlotMap::with_key();
        let handle = keys.insert(());
        TrackedImage::new(handle, "volume", ResourceState::sampled(StageMask::FRAGMENT_SHADER))
    }

    #[test]
    fn test_read_of_undefined_image_is_rejected() {
        let mut image = tracked();
        assert!(matches!(image.to_readable(), Err(HazardError::ReadBeforeWrite { .. })));
        assert!(image.require_readable().is_err());
        assert_eq!(image.phase(), Phase::Undefined);
    }

    #[test]
    fn test_barrier_sources_chain() {
        let mut image = tracked();
        let clear = image.to_writable(ResourceState::TRANSFER_WRITE);
        assert_eq!(clear.src, ResourceState::UNDEFINED);

        let write = image.to_writable(ResourceState::storage_write(StageMask::COMPUTE_SHADER));
        assert_eq!(write.src, clear.dst);

        let publish = image.to_readable().unwrap().unwrap();
        assert_eq!(publish.src, write.dst);
        assert_eq!(publish.dst.layout, ImageLayout::ShaderReadOnly);
        assert!(image.is_readable());

        // Already readable: nothing to record
        assert!(image.to_readable().unwrap().is_none());

        let next = image.to_writable(ResourceState::TRANSFER_WRITE);
        assert_eq!(next.src, publish.dst);
    }

    #[test]
    fn test_reset_returns_to_undefined() {
        let mut image = tracked();
        image.to_writable(ResourceState::TRANSFER_WRITE);
        image.to_readable().unwrap();
        image.reset();
        assert_eq!(image.state(), ResourceState::UNDEFINED);
        assert!(image.to_readable().is_err());
    }
}
