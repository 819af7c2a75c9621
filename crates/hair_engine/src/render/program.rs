//! GPU kernels of the hair pipeline and their program descriptions

use super::handles::LayoutHandle;

/// Every kernel the pipeline dispatches or draws
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    /// Line-list raster deposit of segments into the raw volume
    DensityRaster,
    /// Per-segment DDA deposit into the raw volume
    DensityDda,
    /// SH L1 encoding of optical depth
    PerceivedDensity,
    /// Six dual-scattering 1D tables
    FiberLut,
    /// NG and NG_TRT tables
    NgMerge,
    /// Global-illumination volume
    GlobalIllumination,
}

impl Kernel {
    /// All kernels
    pub const ALL: [Kernel; 6] = [
        Kernel::DensityRaster,
        Kernel::DensityDda,
        Kernel::PerceivedDensity,
        Kernel::FiberLut,
        Kernel::NgMerge,
        Kernel::GlobalIllumination,
    ];

    /// Short name for logs
    pub fn name(self) -> &'static str {
        match self {
            Self::DensityRaster => "density_raster",
            Self::DensityDda => "density_dda",
            Self::PerceivedDensity => "perceived_density",
            Self::FiberLut => "fiber_lut",
            Self::NgMerge => "ng_merge",
            Self::GlobalIllumination => "global_illumination",
        }
    }

    /// GLSL sources, in pipeline stage order
    pub fn shader_files(self) -> &'static [&'static str] {
        match self {
            Self::DensityRaster => &[
                "density_voxelization.vert",
                "density_voxelization.geom",
                "density_voxelization.frag",
            ],
            Self::DensityDda => &["density_dda.comp"],
            Self::PerceivedDensity => &["perceived_density.comp"],
            Self::FiberLut => &["hair_lut.comp"],
            Self::NgMerge => &["hair_ng.comp"],
            Self::GlobalIllumination => &["hair_gi.comp"],
        }
    }

    /// True for the line-raster program
    pub fn is_graphics(self) -> bool {
        self == Self::DensityRaster
    }

    /// Local workgroup size of compute kernels
    pub fn workgroup_size(self) -> [u32; 3] {
        match self {
            Self::DensityRaster => [1, 1, 1],
            Self::DensityDda => [64, 1, 1],
            Self::PerceivedDensity => [4, 4, 4],
            Self::FiberLut => [16, 1, 1],
            Self::NgMerge => [16, 16, 1],
            Self::GlobalIllumination => [8, 8, 8],
        }
    }

    /// Workgroup count covering `items` invocations on each axis
    pub fn dispatch_size(self, items: [u32; 3]) -> [u32; 3] {
        let size = self.workgroup_size();
        [0, 1, 2].map(|axis| items[axis].div_ceil(size[axis]).max(1))
    }
}

/// Fixed-function state of the line-raster program.
///
/// Depth testing is off and color writes are masked; the target only sets the
/// rasterization grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterState {
    /// Edge length of the square proxy target
    pub extent: u32,
}

/// Program creation parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDesc {
    /// Kernel to instantiate
    pub kernel: Kernel,
    /// Binding layouts in set order
    pub set_layouts: Vec<LayoutHandle>,
    /// Raster state, required by graphics kernels
    pub raster: Option<RasterState>,
}

impl ProgramDesc {
    /// Compute program
    pub fn compute(kernel: Kernel, set_layouts: Vec<LayoutHandle>) -> Self {
        Self {
            kernel,
            set_layouts,
            raster: None,
        }
    }

    /// Line-raster program drawing into an `extent` x `extent` proxy target
    pub fn raster(kernel: Kernel, set_layouts: Vec<LayoutHandle>, extent: u32) -> Self {
        Self {
            kernel,
            set_layouts,
            raster: Some(RasterState { extent }),
        }
    }
}
