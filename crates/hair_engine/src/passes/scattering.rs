//! Scattering precomputation stage
//!
//! Fills the dual-scattering LUTs and NG tables from the hair material, and
//! the GI volume from the NG tables. LUTs follow the material's dirty flag;
//! GI is computed once and kept until invalidated.

use log::debug;

use super::bindings::{GLOBAL_SET, OBJECT_SET};
use super::voxelization::publish;
use super::FrameSets;
use crate::error::{HairError, HairResult};
use crate::render::{
    Extent3D, ImageDesc, ImageHandle, Kernel, LayoutHandle, Phase, ProgramDesc, ProgramHandle, RenderBackend,
    ResourceState, SamplerDesc, StageMask, TexelFormat, TrackedImage,
};

/// Dynamic offset of the hair material and whether it changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaterialDraw {
    /// Offset of the hair mesh's object slot
    pub object_offset: u32,
    /// Material dirty flag
    pub dirty: bool,
}

/// Read-only handles of every scattering table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LutHandles {
    /// A_f
    pub front_attenuation: ImageHandle,
    /// A_b
    pub back_attenuation: ImageHandle,
    /// Δ_f
    pub front_shift: ImageHandle,
    /// Δ_b
    pub back_shift: ImageHandle,
    /// σ_f
    pub front_beta: ImageHandle,
    /// σ_b
    pub back_beta: ImageHandle,
    /// NG over R and TT
    pub ng: ImageHandle,
    /// NG of TRT
    pub ng_trt: ImageHandle,
    /// GI volume
    pub global_illumination: ImageHandle,
}

impl LutHandles {
    /// The six 1D tables, ordered like [`super::bindings::scatter::LUTS`]
    pub fn one_dimensional(&self) -> [ImageHandle; 6] {
        [
            self.front_attenuation,
            self.back_attenuation,
            self.front_shift,
            self.back_shift,
            self.front_beta,
            self.back_beta,
        ]
    }
}

/// Tracked scattering tables
#[derive(Debug)]
pub struct ScatteringLuts {
    /// 1D tables, ordered like [`super::bindings::scatter::LUTS`]
    pub fiber: [TrackedImage; 6],
    /// NG over R and TT
    pub ng: TrackedImage,
    /// NG of TRT
    pub ng_trt: TrackedImage,
    /// GI volume
    pub global_illumination: TrackedImage,
}

const FIBER_LUT_NAMES: [&str; 6] = [
    "front_attenuation",
    "back_attenuation",
    "front_shift",
    "back_shift",
    "front_beta",
    "back_beta",
];

impl ScatteringLuts {
    /// State the 1D tables and GI are published in
    pub const SAMPLED: ResourceState = ResourceState::sampled(StageMask::FRAGMENT_SHADER);

    /// State the NG tables are published in; GI loads them from compute
    pub const NG_READABLE: ResourceState =
        ResourceState::storage_read(StageMask::COMPUTE_SHADER.union(StageMask::FRAGMENT_SHADER));

    /// Allocate every table at `resolution`
    pub fn allocate<B: RenderBackend>(backend: &mut B, resolution: u32) -> HairResult<Self> {
        let mut created: Vec<ImageHandle> = Vec::new();
        let result = Self::allocate_into(backend, resolution, &mut created);
        if result.is_err() {
            for image in created {
                backend.destroy_image(image);
            }
        }
        result
    }

    fn allocate_into<B: RenderBackend>(
        backend: &mut B,
        n: u32,
        created: &mut Vec<ImageHandle>,
    ) -> HairResult<Self> {
        let mut create = |backend: &mut B, desc: ImageDesc, readable: ResourceState| -> HairResult<TrackedImage> {
            let label = desc.label.clone();
            let image = backend.create_image(&desc)?;
            created.push(image);
            Ok(TrackedImage::new(image, label, readable))
        };

        let mut fiber = Vec::with_capacity(FIBER_LUT_NAMES.len());
        for name in FIBER_LUT_NAMES {
            fiber.push(create(&mut *backend, ImageDesc::table(name, Extent3D::line(n)), Self::SAMPLED)?);
        }
        let ng = create(&mut *backend, ImageDesc::table("ng", Extent3D::square(n)), Self::NG_READABLE)?;
        let ng_trt = create(&mut *backend, ImageDesc::table("ng_trt", Extent3D::square(n)), Self::NG_READABLE)?;
        let gi = create(
            backend,
            ImageDesc::volume("global_illumination", n, TexelFormat::Rgba32Float, SamplerDesc::CLAMP),
            Self::SAMPLED,
        )?;

        let fiber: [TrackedImage; 6] = fiber
            .try_into()
            .map_err(|_| HairError::invalid_operation("fiber LUT count mismatch"))?;
        Ok(Self {
            fiber,
            ng,
            ng_trt,
            global_illumination: gi,
        })
    }

    /// Free every table
    pub fn destroy<B: RenderBackend>(&self, backend: &mut B) {
        for image in self.handles().one_dimensional() {
            backend.destroy_image(image);
        }
        backend.destroy_image(self.ng.handle());
        backend.destroy_image(self.ng_trt.handle());
        backend.destroy_image(self.global_illumination.handle());
    }

    /// Handles of every table
    pub fn handles(&self) -> LutHandles {
        LutHandles {
            front_attenuation: self.fiber[0].handle(),
            back_attenuation: self.fiber[1].handle(),
            front_shift: self.fiber[2].handle(),
            back_shift: self.fiber[3].handle(),
            front_beta: self.fiber[4].handle(),
            back_beta: self.fiber[5].handle(),
            ng: self.ng.handle(),
            ng_trt: self.ng_trt.handle(),
            global_illumination: self.global_illumination.handle(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ScatterPrograms {
    fiber_lut: ProgramHandle,
    ng_merge: ProgramHandle,
    global_illumination: ProgramHandle,
}

/// What a record of the stage computed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScatterReport {
    /// 1D LUTs and NG tables were recomputed
    pub luts_computed: bool,
    /// The GI volume was computed
    pub gi_computed: bool,
}

/// Scattering precomputation stage
#[derive(Debug)]
pub struct ScatteringPass {
    resolution: u32,
    luts: ScatteringLuts,
    programs: Option<ScatterPrograms>,
}

impl ScatteringPass {
    /// Allocate the stage's tables
    pub fn new<B: RenderBackend>(backend: &mut B, resolution: u32) -> HairResult<Self> {
        debug!("[SCATTER] Allocating tables at resolution {}", resolution);
        Ok(Self {
            resolution,
            luts: ScatteringLuts::allocate(backend, resolution)?,
            programs: None,
        })
    }

    /// Create the LUT, NG and GI programs.
    ///
    /// LUT and NG use (global, object) layouts; GI reads only the global set.
    pub fn create_programs<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        global_layout: LayoutHandle,
        object_layout: LayoutHandle,
    ) -> HairResult<()> {
        self.destroy_programs(backend);
        let per_object = vec![global_layout, object_layout];

        let fiber_lut = backend.create_program(&ProgramDesc::compute(Kernel::FiberLut, per_object.clone()))?;
        let ng_merge = match backend.create_program(&ProgramDesc::compute(Kernel::NgMerge, per_object)) {
            Ok(program) => program,
            Err(e) => {
                backend.destroy_program(fiber_lut);
                return Err(e);
            }
        };
        let global_illumination =
            match backend.create_program(&ProgramDesc::compute(Kernel::GlobalIllumination, vec![global_layout])) {
                Ok(program) => program,
                Err(e) => {
                    backend.destroy_program(fiber_lut);
                    backend.destroy_program(ng_merge);
                    return Err(e);
                }
            };

        self.programs = Some(ScatterPrograms {
            fiber_lut,
            ng_merge,
            global_illumination,
        });
        Ok(())
    }

    /// Free the programs, if any
    pub fn destroy_programs<B: RenderBackend>(&mut self, backend: &mut B) {
        if let Some(programs) = self.programs.take() {
            backend.destroy_program(programs.fiber_lut);
            backend.destroy_program(programs.ng_merge);
            backend.destroy_program(programs.global_illumination);
        }
    }

    /// Free programs and tables
    pub fn destroy<B: RenderBackend>(&mut self, backend: &mut B) {
        self.destroy_programs(backend);
        self.luts.destroy(backend);
    }

    /// Tracked tables
    pub fn luts(&self) -> &ScatteringLuts {
        &self.luts
    }

    /// Mark GI stale; it is recomputed on the next record with readable NG tables
    pub fn invalidate_gi(&mut self) {
        self.luts.global_illumination.reset();
    }

    /// True when the LUT and NG tables must be (re)computed for `material`
    fn needs_luts(&self, material: &MaterialDraw) -> bool {
        material.dirty || !self.luts.ng.is_readable() || !self.luts.ng_trt.is_readable()
    }

    /// Record the stage.
    ///
    /// `material` is the frame's hair material, if there is a hair mesh.
    pub fn record<B: RenderBackend>(
        &mut self,
        backend: &mut B,
        sets: &FrameSets,
        material: Option<MaterialDraw>,
    ) -> HairResult<ScatterReport> {
        let programs = self
            .programs
            .ok_or_else(|| HairError::missing_input("scattering programs"))?;
        let n = self.resolution;
        let mut report = ScatterReport::default();
        let write = ResourceState::storage_write(StageMask::COMPUTE_SHADER);

        if let Some(material) = material.filter(|m| self.needs_luts(m)) {
            let offsets = [material.object_offset, material.object_offset];

            for lut in &mut self.luts.fiber {
                backend.cmd_image_barrier(&lut.to_writable(write))?;
            }
            backend.cmd_bind_program(programs.fiber_lut)?;
            backend.cmd_bind_set(GLOBAL_SET, sets.global, &[])?;
            backend.cmd_bind_set(OBJECT_SET, sets.object, &offsets)?;
            backend.cmd_dispatch(Kernel::FiberLut.dispatch_size([n, 1, 1]))?;
            for lut in &mut self.luts.fiber {
                publish(backend, lut)?;
            }

            backend.cmd_image_barrier(&self.luts.ng.to_writable(write))?;
            backend.cmd_image_barrier(&self.luts.ng_trt.to_writable(write))?;
            backend.cmd_bind_program(programs.ng_merge)?;
            backend.cmd_bind_set(GLOBAL_SET, sets.global, &[])?;
            backend.cmd_bind_set(OBJECT_SET, sets.object, &offsets)?;
            backend.cmd_dispatch(Kernel::NgMerge.dispatch_size([n, n, 1]))?;
            publish(backend, &mut self.luts.ng)?;
            publish(backend, &mut self.luts.ng_trt)?;

            debug!("[SCATTER] Fiber LUTs and NG tables computed");
            report.luts_computed = true;
        }

        if self.luts.global_illumination.phase() == Phase::Undefined {
            if self.luts.ng.is_readable() && self.luts.ng_trt.is_readable() {
                backend.cmd_image_barrier(&self.luts.global_illumination.to_writable(write))?;
                backend.cmd_bind_program(programs.global_illumination)?;
                backend.cmd_bind_set(GLOBAL_SET, sets.global, &[])?;
                backend.cmd_dispatch(Kernel::GlobalIllumination.dispatch_size([n, n, n]))?;
                publish(backend, &mut self.luts.global_illumination)?;

                debug!("[SCATTER] GI volume computed");
                report.gi_computed = true;
            } else {
                debug!("[SCATTER] GI deferred until the NG tables exist");
            }
        }

        Ok(report)
    }
}
