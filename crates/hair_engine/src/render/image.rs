//! Image and buffer descriptions

use bitflags::bitflags;

/// Texel format of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    /// Single 32-bit unsigned channel, used for atomic accumulation
    R32Uint,
    /// Single 8-bit normalized channel
    R8Unorm,
    /// Four 32-bit float channels
    Rgba32Float,
}

impl TexelFormat {
    /// Size of one texel in bytes
    pub fn texel_size(self) -> u64 {
        match self {
            Self::R32Uint => 4,
            Self::R8Unorm => 1,
            Self::Rgba32Float => 16,
        }
    }
}

/// Dimensionality of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageDimension {
    /// Two-dimensional image; one-dimensional LUTs use height 1
    D2,
    /// Volume
    D3,
}

bitflags! {
    /// How an image is used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ImageUsage: u32 {
        /// Shader load/store
        const STORAGE = 1 << 0;
        /// Shader sampling
        const SAMPLED = 1 << 1;
        /// Clear target
        const TRANSFER_DST = 1 << 2;
        /// Render-pass color attachment
        const COLOR_ATTACHMENT = 1 << 3;
    }
}

bitflags! {
    /// How a buffer is used
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        /// Uniform block, possibly with dynamic offsets
        const UNIFORM = 1 << 0;
        /// Read-only storage array
        const STORAGE = 1 << 1;
    }
}

/// Sampler addressing outside [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressMode {
    /// Clamp to the edge texel
    ClampToEdge,
    /// Return the border color
    ClampToBorder,
    /// Wrap around
    Repeat,
}

/// Border color for [`AddressMode::ClampToBorder`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderColor {
    /// (0, 0, 0, 1)
    OpaqueBlack,
    /// (0, 0, 0, 0)
    TransparentBlack,
}

/// Linear-filtered sampler attached to an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    /// Addressing on every axis
    pub address_mode: AddressMode,
    /// Border color used by `ClampToBorder`
    pub border_color: BorderColor,
}

impl SamplerDesc {
    /// Clamp to edge
    pub const CLAMP: Self = Self {
        address_mode: AddressMode::ClampToEdge,
        border_color: BorderColor::TransparentBlack,
    };

    /// Clamp to an opaque black border, so lookups outside the volume read zero density
    pub const BORDER_BLACK: Self = Self {
        address_mode: AddressMode::ClampToBorder,
        border_color: BorderColor::OpaqueBlack,
    };
}

/// Image size in texels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Extent3D {
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
    /// Depth
    pub depth: u32,
}

impl Extent3D {
    /// N x N x N
    pub fn cube(n: u32) -> Self {
        Self { width: n, height: n, depth: n }
    }

    /// N x N x 1
    pub fn square(n: u32) -> Self {
        Self { width: n, height: n, depth: 1 }
    }

    /// N x 1 x 1
    pub fn line(n: u32) -> Self {
        Self { width: n, height: 1, depth: 1 }
    }

    /// Number of texels
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize * self.depth as usize
    }
}

/// Everything needed to allocate an image
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    /// Debug name, also used in hazard reports
    pub label: String,
    /// Size
    pub extent: Extent3D,
    /// Texel format
    pub format: TexelFormat,
    /// 2D or 3D
    pub dimension: ImageDimension,
    /// Usage flags
    pub usage: ImageUsage,
    /// Mip level count
    pub mip_levels: u32,
    /// Sampler created with the image, if it is ever sampled
    pub sampler: Option<SamplerDesc>,
}

impl ImageDesc {
    /// Volume with a sampler, storable and clearable
    pub fn volume(label: impl Into<String>, n: u32, format: TexelFormat, sampler: SamplerDesc) -> Self {
        Self {
            label: label.into(),
            extent: Extent3D::cube(n),
            format,
            dimension: ImageDimension::D3,
            usage: ImageUsage::STORAGE | ImageUsage::SAMPLED | ImageUsage::TRANSFER_DST,
            mip_levels: 1,
            sampler: Some(sampler),
        }
    }

    /// Storable, sampled 2D table
    pub fn table(label: impl Into<String>, extent: Extent3D) -> Self {
        Self {
            label: label.into(),
            extent,
            format: TexelFormat::Rgba32Float,
            dimension: ImageDimension::D2,
            usage: ImageUsage::STORAGE | ImageUsage::SAMPLED,
            mip_levels: 1,
            sampler: Some(SamplerDesc::CLAMP),
        }
    }
}

/// Everything needed to allocate a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct BufferDesc {
    /// Debug name
    pub label: String,
    /// Size in bytes
    pub size: u64,
    /// Usage flags
    pub usage: BufferUsage,
}

impl BufferDesc {
    /// Describe a buffer
    pub fn new(label: impl Into<String>, size: u64, usage: BufferUsage) -> Self {
        Self {
            label: label.into(),
            size,
            usage,
        }
    }
}
