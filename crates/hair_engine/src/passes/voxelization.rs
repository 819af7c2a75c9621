//! Density voxelization stage
//!
//! Deposits the segments of the frame's hair mesh into the raw density volume,
//! then encodes the optical depth around every voxel into the perceived
//! density volume. Both volumes are cleared at the start of every record.

use log::debug;

use super::bindings::{GLOBAL_SET, OBJECT_SET};
use super::FrameSets;
use crate::core::config::VoxelizationStrategy;
use crate::error::{HairError, HairResult};
use crate::render::{
    ClearValue, ImageDesc, ImageHandle, Kernel, LayoutHandle, ProgramDesc, ProgramHandle, RenderBackend,
    ResourceState, SamplerDesc, StageMask, TexelFormat, TrackedImage,
};

/// Dynamic offset and size of the hair mesh drawn this frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HairDraw {
    /// Offset of the mesh's object slot
    pub object_offset: u32,
    /// Line segments to deposit
    pub segment_count: u32,
}

/// Raw and perceived density volumes
#[derive(Debug)]
pub struct DensityVolumes {
    /// Fixed-point accumulation (r32ui)
    pub raw: TrackedImage,
    /// SH L1 perceived density (rgba32f)
    pub perceived: TrackedImage,
}

impl DensityVolumes {
    /// State the raw volume is published in
    pub const RAW_READABLE: ResourceState =
        ResourceState::storage_read(StageMask::COMPUTE_SHADER.union(StageMask::FRAGMENT_SHADER));

    /// State the perceived volume is published in
    pub const PERCEIVED_READABLE: ResourceState = ResourceState::sampled(StageMask::FRAGMENT_SHADER);

    /// Allocate both volumes at `resolution`
    pub fn allocate<B: RenderBackend>(backend: &mut B, resolution: u32) -> HairResult<Self> {
        let raw = backend.create_image(&ImageDesc::volume(
            "raw_density",
            resolution,
            TexelFormat::R32Uint,
            SamplerDesc::BORDER_BLACK,
        ))?;
        let perceived = match backend.create_image(&ImageDesc::volume(
            "perceived_density",
            resolution,
            TexelFormat::Rgba32Float,
            SamplerDesc::BORDER_BLACK,
        )) {
            Ok(image) => image,
            Err(e) => {
                backend.destroy_image(raw);
                return Err(e);
            }
        };
        Ok(Self {
            raw: TrackedImage::new(raw, "raw_density", Self::RAW_READABLE),
            perceived: TrackedImage::new(perceived, "perceived_density", Self::PERCEIVED_READABLE),
        })
    }

    /// Free both volumes
    pub fn destroy<B: RenderBackend>(&self, backend: &mut B) {
        backend.destroy_image(self.raw.handle());
        backend.destroy_image(self.perceived.handle());
    }
}

#[derive(Debug, Clone, Copy)]
struct VoxelPrograms {
    deposit: ProgramHandle,
    perceived: ProgramHandle,
}

/// Voxelization stage
#[derive(Debug)]
pub struct VoxelizationPass {
    strategy: VoxelizationStrategy,
    resolution: u32,
    volumes: DensityVolumes,
    programs: Option<VoxelPrograms>,
}

impl VoxelizationPass {
    /// Allocate the stage's volumes
    pub fn new<B: RenderBackend>(backend: &mut B, strategy: VoxelizationStrategy, resolution: u32) -> HairResult<Self> {
        debug!("[VOXEL] Allocating {0}x{0}x{0} volumes ({1:?})", resolution, strategy);
        Ok(Self {
            strategy,
            resolution,
            volumes: DensityVolumes::allocate(backend, resolution)?,
            programs: None,
        })
    }

    /// Create the deposit and perceived-density programs.
    ///
    /// Both use (global, object) layouts; the raster program draws into a
    /// resolution-sized proxy target.
    pub fn create_programs<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        global_layout: LayoutHandle,
        object_layout: LayoutHandle,
    ) -> HairResult<()> {
        self.destroy_programs(backend);
        let layouts = vec![global_layout, object_layout];
        let deposit = match self.strategy {
            VoxelizationStrategy::Rasterization => {
                backend.create_program(&ProgramDesc::raster(Kernel::DensityRaster, layouts.clone(), self.resolution))?
            }
            VoxelizationStrategy::Dda => {
                backend.create_program(&ProgramDesc::compute(Kernel::DensityDda, layouts.clone()))?
            }
        };
        let perceived = match backend.create_program(&ProgramDesc::compute(Kernel::PerceivedDensity, layouts)) {
            Ok(program) => program,
            Err(e) => {
                backend.destroy_program(deposit);
                return Err(e);
            }
        };
        self.programs = Some(VoxelPrograms { deposit, perceived });
        Ok(())
    }

    /// Free the programs, if any
    pub fn destroy_programs<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(programs) = self.programs.take() {
            backend.destroy_program(programs.deposit);
            backend.destroy_program(programs.perceived);
        }
    }

    /// Free programs and volumes
    pub fn destroy<B: RenderBackend>(&mut self, backend: &mut B) {
        self.destroy_programs(backend);
        self.volumes.destroy(backend);
    }

    /// Deposit strategy
    pub fn strategy(&self) -> VoxelizationStrategy {
        self.strategy
    }

    /// Volume edge length
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// Tracked volumes
    pub fn volumes(&self) -> &DensityVolumes {
        &self.volumes
    }

    /// Raw volume handle
    pub fn raw_density(&self) -> ImageHandle {
        self.volumes.raw.handle()
    }

    /// Perceived volume handle
    pub fn perceived_density(&self) -> ImageHandle {
        self.volumes.perceived.handle()
    }

    fn deposit_stage(&self) -> StageMask {
        match self.strategy {
            VoxelizationStrategy::Rasterization => StageMask::FRAGMENT_SHADER,
            VoxelizationStrategy::Dda => StageMask::COMPUTE_SHADER,
        }
    }

    /// Record the stage.
    ///
    /// Without a hair mesh the cleared volumes are published as they are.
    pub fn record<B: RenderBackend>(&mut self, backend: &mut B, sets: &FrameSets, draw: Option<HairDraw>) -> HairResult<()> {
        let programs = self
            .programs
            .ok_or_else(|| HairError::missing_input("voxelization programs"))?;

        backend.cmd_image_barrier(&self.volumes.raw.to_writable(ResourceState::TRANSFER_WRITE))?;
        backend.cmd_clear_image(self.volumes.raw.handle(), ClearValue::Uint([0; 4]))?;
        backend.cmd_image_barrier(&self.volumes.perceived.to_writable(ResourceState::TRANSFER_WRITE))?;
        backend.cmd_clear_image(self.volumes.perceived.handle(), ClearValue::Float([0.0; 4]))?;

        let Some(draw) = draw else {
            debug!("[VOXEL] No hair mesh, publishing empty volumes");
            publish(backend, &mut self.volumes.raw)?;
            return publish(backend, &mut self.volumes.perceived);
        };

        let write = ResourceState::storage_write(self.deposit_stage());
        backend.cmd_image_barrier(&self.volumes.raw.to_writable(write))?;
        backend.cmd_bind_program(programs.deposit)?;
        backend.cmd_bind_set(GLOBAL_SET, sets.global, &[])?;
        backend.cmd_bind_set(OBJECT_SET, sets.object, &[draw.object_offset, draw.object_offset])?;
        match self.strategy {
            VoxelizationStrategy::Rasterization => backend.cmd_draw_lines(draw.segment_count.saturating_mul(2))?,
            VoxelizationStrategy::Dda => {
                backend.cmd_dispatch(Kernel::DensityDda.dispatch_size([draw.segment_count, 1, 1]))?
            }
        }
        publish(backend, &mut self.volumes.raw)?;

        let n = self.resolution;
        backend.cmd_image_barrier(
            &self
                .volumes
                .perceived
                .to_writable(ResourceState::storage_write(StageMask::COMPUTE_SHADER)),
        )?;
        backend.cmd_bind_program(programs.perceived)?;
        backend.cmd_bind_set(GLOBAL_SET, sets.global, &[])?;
        backend.cmd_bind_set(OBJECT_SET, sets.object, &[draw.object_offset, draw.object_offset])?;
        backend.cmd_dispatch(Kernel::PerceivedDensity.dispatch_size([n, n, n]))?;
        publish(backend, &mut self.volumes.perceived)?;

        debug!("[VOXEL] Deposited {} segments", draw.segment_count);
        Ok(())
    }
}

/// Publish an image for reads, recording the barrier if one is needed
pub(crate) fn publish<B: RenderBackend>(backend: &mut B, image: &mut TrackedImage) -> HairResult<()> {
    if let Some(barrier) = image.to_readable()? {
        backend.cmd_image_barrier(&barrier)?;
    }
    Ok(())
}
