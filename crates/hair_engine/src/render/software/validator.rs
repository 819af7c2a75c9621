//! Access validation of the software backend
//!
//! Mirrors what a synchronization validation layer checks: barrier sources
//! match the state an image was left in, and every clear, store and load
//! happens in a layout/access/stage the last barrier made available.

use log::warn;

use crate::error::{HairError, HairResult};
use crate::render::state::{AccessMask, HazardError, ImageBarrier, ImageLayout, ResourceState, StageMask};

/// Device-side view of one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRecord {
    /// State set by the last barrier
    pub state: ResourceState,
    /// Whether the contents are defined
    pub written: bool,
}

impl Default for ImageRecord {
    fn default() -> Self {
        Self {
            state: ResourceState::UNDEFINED,
            written: false,
        }
    }
}

/// Collects every hazard seen while recording
#[derive(Debug, Default)]
pub struct Validator {
    hazards: Vec<HazardError>,
}

impl Validator {
    /// Every hazard reported so far
    pub fn hazards(&self) -> &[HazardError] {
        &self.hazards
    }

    fn report(&mut self, hazard: HazardError) -> HairError {
        warn!("[SOFTWARE] Hazard: {}", hazard);
        self.hazards.push(hazard.clone());
        HairError::Hazard(hazard)
    }

    /// Apply a barrier. An undefined source discards the contents.
    pub fn barrier(&mut self, label: &str, record: &mut ImageRecord, barrier: &ImageBarrier) -> HairResult<()> {
        if barrier.src.layout == ImageLayout::Undefined {
            record.written = false;
        } else if barrier.src != record.state {
            return Err(self.report(HazardError::SourceMismatch {
                label: label.to_string(),
                recorded: barrier.src,
                current: record.state,
            }));
        }
        record.state = barrier.dst;
        Ok(())
    }

    /// A clear needs the transfer-write state
    pub fn clear(&mut self, label: &str, record: &mut ImageRecord) -> HairResult<()> {
        self.require(label, record, "clear", ImageLayout::TransferDst, AccessMask::TRANSFER_WRITE, StageMask::TRANSFER)?;
        record.written = true;
        Ok(())
    }

    /// A shader store needs a general layout with write access from `stage`
    pub fn store(&mut self, label: &str, record: &mut ImageRecord, stage: StageMask) -> HairResult<()> {
        self.require(label, record, "store", ImageLayout::General, AccessMask::SHADER_WRITE, stage)?;
        record.written = true;
        Ok(())
    }

    /// A shader load needs read access from `stage` and defined contents
    pub fn load(&mut self, label: &str, record: &ImageRecord, stage: StageMask) -> HairResult<()> {
        if !record.written {
            return Err(self.report(HazardError::ReadBeforeWrite {
                label: label.to_string(),
            }));
        }
        self.check_access(label, record, "load", AccessMask::SHADER_READ, stage)
    }

    fn require(
        &mut self,
        label: &str,
        record: &ImageRecord,
        operation: &'static str,
        layout: ImageLayout,
        access: AccessMask,
        stage: StageMask,
    ) -> HairResult<()> {
        if record.state.layout != layout {
            return Err(self.report(HazardError::LayoutMismatch {
                label: label.to_string(),
                operation,
                expected: layout,
                actual: record.state.layout,
            }));
        }
        self.check_access(label, record, operation, access, stage)
    }

    fn check_access(
        &mut self,
        label: &str,
        record: &ImageRecord,
        operation: &'static str,
        access: AccessMask,
        stage: StageMask,
    ) -> HairResult<()> {
        if !record.state.access.contains(access) {
            return Err(self.report(HazardError::MissingAccess {
                label: label.to_string(),
                operation,
                required: access,
                actual: record.state.access,
            }));
        }
        if !record.state.stage.contains(stage) {
            return Err(self.report(HazardError::StageMismatch {
                label: label.to_string(),
                operation,
                required: stage,
                actual: record.state.stage,
            }));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::handles::ImageHandle;
    use slotmap::SlotMap;

    fn barrier(src: ResourceState, dst: ResourceState) -> ImageBarrier {
        let mut keys: SlotMap<ImageHandle, ()> = SlotMap::with_key();
        ImageBarrier {
            image: keys.insert(()),
            src,
            dst,
        }
    }

    #[test]
    fn test_valid_sequence_reports_nothing() {
        let mut validator = Validator::default();
        let mut record = ImageRecord::default();
        let write = ResourceState::storage_write(StageMask::COMPUTE_SHADER);
        let read = ResourceState::storage_read(StageMask::COMPUTE_SHADER);

        validator.barrier("v", &mut record, &barrier(ResourceState::UNDEFINED, ResourceState::TRANSFER_WRITE)).unwrap();
        validator.clear("v", &mut record).unwrap();
        validator.barrier("v", &mut record, &barrier(ResourceState::TRANSFER_WRITE, write)).unwrap();
        validator.store("v", &mut record, StageMask::COMPUTE_SHADER).unwrap();
        validator.barrier("v", &mut record, &barrier(write, read)).unwrap();
        validator.load("v", &record, StageMask::COMPUTE_SHADER).unwrap();
        assert!(validator.hazards().is_empty());
    }

    #[test]
    fn test_load_before_write_is_reported() {
        let mut validator = Validator::default();
        let mut record = ImageRecord::default();
        let read = ResourceState::storage_read(StageMask::COMPUTE_SHADER);
        validator.barrier("v", &mut record, &barrier(ResourceState::UNDEFINED, read)).unwrap();

        assert!(validator.load("v", &record, StageMask::COMPUTE_SHADER).is_err());
        assert!(matches!(validator.hazards()[0], HazardError::ReadBeforeWrite { .. }));
    }

    #[test]
    fn test_stale_barrier_source_is_reported() {
        let mut validator = Validator::default();
        let mut record = ImageRecord::default();
        validator.barrier("v", &mut record, &barrier(ResourceState::UNDEFINED, ResourceState::TRANSFER_WRITE)).unwrap();

        let stale = barrier(
            ResourceState::sampled(StageMask::FRAGMENT_SHADER),
            ResourceState::storage_write(StageMask::COMPUTE_SHADER),
        );
        assert!(validator.barrier("v", &mut record, &stale).is_err());
        assert!(matches!(validator.hazards()[0], HazardError::SourceMismatch { .. }));
    }

    #[test]
    fn test_store_from_wrong_stage_is_reported() {
        let mut validator = Validator::default();
        let mut record = ImageRecord::default();
        let write = ResourceState::storage_write(StageMask::COMPUTE_SHADER);
        validator.barrier("v", &mut record, &barrier(ResourceState::UNDEFINED, write)).unwrap();

        assert!(validator.store("v", &mut record, StageMask::FRAGMENT_SHADER).is_err());
        assert!(validator.clear("v", &mut record).is_err());
        assert_eq!(validator.hazards().len(), 2);
    }
}
