//! CPU implementation of [`RenderBackend`]
//!
//! Commands execute immediately at record time: clears fill texels, draws and
//! dispatches run the kernel bound to the current program, resolving every
//! resource through the bound binding sets and their dynamic offsets exactly as
//! the GLSL sources address them. Every access is checked by the
//! [`validator::Validator`], and the command log counts what was recorded.

mod kernels;
pub mod validator;

use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use slotmap::SlotMap;

use crate::core::config::VoxelizationStrategy;
use crate::error::{HairError, HairResult};
use crate::foundation::math::Vec3;
use crate::material::{EncodedUniformBlock, HairMaterialKind};
use crate::passes::bindings::{object, scatter, voxel, GLOBAL_SET, OBJECT_SET};
use crate::passes::uniforms::{ObjectUniforms, SceneUniforms};
use crate::render::backend::{ClearValue, RenderBackend};
use crate::render::binding::{BindingLayoutDesc, BindingResource, BindingWrite};
use crate::render::handles::{BindingSetHandle, BufferHandle, ImageHandle, LayoutHandle, ProgramHandle};
use crate::render::image::{BufferDesc, ImageDesc, TexelFormat};
use crate::render::program::{Kernel, ProgramDesc};
use crate::render::state::{HazardError, ImageBarrier, StageMask};
use crate::scattering::dual::NgTable;
use crate::scattering::fiber::FiberParams;

use kernels::DepositInput;
use validator::{ImageRecord, Validator};

/// Default dynamic uniform alignment, the common desktop limit
pub const DEFAULT_UNIFORM_ALIGNMENT: u64 = 256;

#[derive(Debug, Clone, PartialEq)]
enum Texels {
    Uint(Vec<u32>),
    Float(Vec<[f32; 4]>),
}

#[derive(Debug)]
struct SoftImage {
    desc: ImageDesc,
    texels: Texels,
    record: ImageRecord,
}

#[derive(Debug)]
struct SoftBuffer {
    desc: BufferDesc,
    data: Vec<u8>,
}

#[derive(Debug)]
struct SoftSet {
    layout: LayoutHandle,
    resources: BTreeMap<u32, BindingResource>,
}

#[derive(Debug, Clone)]
struct BoundSet {
    set: BindingSetHandle,
    offsets: Vec<u32>,
}

/// Counts of everything recorded since the last reset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandLog {
    /// Image barriers
    pub barriers: usize,
    /// Image clears
    pub clears: usize,
    /// Line draws
    pub draws: usize,
    runs: HashMap<Kernel, usize>,
}

impl CommandLog {
    /// Number of draws or dispatches of `kernel`
    pub fn runs(&self, kernel: Kernel) -> usize {
        self.runs.get(&kernel).copied().unwrap_or(0)
    }

    /// Total draws and dispatches
    pub fn total_runs(&self) -> usize {
        self.runs.values().sum()
    }
}

/// Software backend
#[derive(Debug)]
pub struct SoftwareBackend {
    images: SlotMap<ImageHandle, SoftImage>,
    buffers: SlotMap<BufferHandle, SoftBuffer>,
    layouts: SlotMap<LayoutHandle, BindingLayoutDesc>,
    sets: SlotMap<BindingSetHandle, SoftSet>,
    programs: SlotMap<ProgramHandle, ProgramDesc>,
    bound_program: Option<ProgramHandle>,
    bound_sets: Vec<Option<BoundSet>>,
    validator: Validator,
    log: CommandLog,
    uniform_alignment: u64,
}

impl Default for SoftwareBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftwareBackend {
    /// Empty backend with the default uniform alignment
    pub fn new() -> Self {
        Self::with_uniform_alignment(DEFAULT_UNIFORM_ALIGNMENT)
    }

    /// Empty backend with a specific dynamic uniform alignment
    pub fn with_uniform_alignment(alignment: u64) -> Self {
        info!("[SOFTWARE] Backend created (uniform alignment {})", alignment);
        Self {
            images: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            layouts: SlotMap::with_key(),
            sets: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            bound_program: None,
            bound_sets: Vec::new(),
            validator: Validator::default(),
            log: CommandLog::default(),
            uniform_alignment: alignment.max(1),
        }
    }

    /// Hazards reported since creation
    pub fn hazards(&self) -> &[HazardError] {
        self.validator.hazards()
    }

    /// Command counts since the last [`SoftwareBackend::reset_command_log`]
    pub fn command_log(&self) -> &CommandLog {
        &self.log
    }

    /// Start a fresh command log
    pub fn reset_command_log(&mut self) {
        self.log = CommandLog::default();
    }

    /// Description of a live image
    pub fn image_desc(&self, image: ImageHandle) -> Option<&ImageDesc> {
        self.images.get(image).map(|i| &i.desc)
    }

    /// Texels of an integer image, x fastest then y then z
    pub fn read_uint_texels(&self, image: ImageHandle) -> HairResult<&[u32]> {
        match &self.image(image)?.texels {
            Texels::Uint(t) => Ok(t),
            Texels::Float(_) => Err(HairError::invalid_operation("image holds float texels")),
        }
    }

    /// Texels of a float image, x fastest then y then z
    pub fn read_float_texels(&self, image: ImageHandle) -> HairResult<&[[f32; 4]]> {
        match &self.image(image)?.texels {
            Texels::Float(t) => Ok(t),
            Texels::Uint(_) => Err(HairError::invalid_operation("image holds integer texels")),
        }
    }

    /// Contents of a live buffer
    pub fn read_buffer(&self, buffer: BufferHandle) -> HairResult<&[u8]> {
        self.buffers
            .get(buffer)
            .map(|b| b.data.as_slice())
            .ok_or(HairError::UnknownHandle { kind: "buffer" })
    }

    /// Number of live images, buffers, layouts, sets and programs
    pub fn live_object_count(&self) -> usize {
        self.images.len() + self.buffers.len() + self.layouts.len() + self.sets.len() + self.programs.len()
    }

    fn image(&self, image: ImageHandle) -> HairResult<&SoftImage> {
        self.images.get(image).ok_or(HairError::UnknownHandle { kind: "image" })
    }

    fn resolve(&self, set_index: u32, binding: u32) -> HairResult<BindingResource> {
        let bound = self
            .bound_sets
            .get(set_index as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| HairError::missing_input(format!("binding set {set_index}")))?;
        let set = self
            .sets
            .get(bound.set)
            .ok_or(HairError::UnknownHandle { kind: "binding set" })?;
        let layout = self
            .layouts
            .get(set.layout)
            .ok_or(HairError::UnknownHandle { kind: "binding layout" })?;
        let resource = *set
            .resources
            .get(&binding)
            .ok_or_else(|| HairError::missing_input(format!("set {set_index} binding {binding}")))?;

        match (layout.dynamic_index(binding), resource) {
            (Some(i), BindingResource::Buffer { buffer, offset, range }) => {
                let dynamic = *bound
                    .offsets
                    .get(i)
                    .ok_or_else(|| HairError::invalid_operation(format!("missing dynamic offset {i}")))?;
                Ok(BindingResource::Buffer {
                    buffer,
                    offset: offset + u64::from(dynamic),
                    range,
                })
            }
            _ => Ok(resource),
        }
    }

    fn buffer_bytes(&self, set_index: u32, binding: u32) -> HairResult<&[u8]> {
        let BindingResource::Buffer { buffer, offset, range } = self.resolve(set_index, binding)? else {
            return Err(HairError::invalid_operation(format!(
                "set {set_index} binding {binding} is not a buffer"
            )));
        };
        let data = &self.buffers.get(buffer).ok_or(HairError::UnknownHandle { kind: "buffer" })?.data;
        let start = offset as usize;
        let end = start.saturating_add(range as usize);
        data.get(start..end).ok_or_else(|| {
            HairError::invalid_operation(format!(
                "set {set_index} binding {binding}: range {start}..{end} exceeds buffer of {} bytes",
                data.len()
            ))
        })
    }

    fn uniform<T: bytemuck::Pod>(&self, set_index: u32, binding: u32) -> HairResult<T> {
        let bytes = self.buffer_bytes(set_index, binding)?;
        let size = std::mem::size_of::<T>();
        if bytes.len() < size {
            return Err(HairError::invalid_operation(format!(
                "set {set_index} binding {binding}: {} bytes bound, block needs {size}",
                bytes.len()
            )));
        }
        Ok(bytemuck::pod_read_unaligned(&bytes[..size]))
    }

    fn vec4_array(&self, set_index: u32, binding: u32) -> HairResult<Vec<[f32; 4]>> {
        let bytes = self.buffer_bytes(set_index, binding)?;
        Ok(bytes.chunks_exact(16).map(bytemuck::pod_read_unaligned::<[f32; 4]>).collect())
    }

    fn u32_array(&self, set_index: u32, binding: u32) -> HairResult<Vec<u32>> {
        let bytes = self.buffer_bytes(set_index, binding)?;
        Ok(bytes.chunks_exact(4).map(bytemuck::pod_read_unaligned::<u32>).collect())
    }

    fn directions(&self, set_index: u32, binding: u32, count: u32) -> HairResult<Vec<Vec3>> {
        let directions = self.vec4_array(set_index, binding)?;
        Ok(directions
            .iter()
            .take(count as usize)
            .map(|d| Vec3::new(d[0], d[1], d[2]))
            .collect())
    }

    fn image_binding(&self, set_index: u32, binding: u32) -> HairResult<ImageHandle> {
        match self.resolve(set_index, binding)? {
            BindingResource::Image(image) => Ok(image),
            BindingResource::Buffer { .. } => Err(HairError::invalid_operation(format!(
                "set {set_index} binding {binding} is not an image"
            ))),
        }
    }

    fn fiber_params(&self) -> HairResult<FiberParams> {
        let uniforms: ObjectUniforms = self.uniform(OBJECT_SET, object::OBJECT)?;
        let block: EncodedUniformBlock = self.uniform(OBJECT_SET, object::MATERIAL)?;
        let type_id = uniforms.material_type_id();
        let kind = HairMaterialKind::from_type_id(type_id)
            .ok_or_else(|| HairError::invalid_operation(format!("unknown material type id {type_id}")))?;
        Ok(FiberParams::decode(kind, &block))
    }

    fn load(&mut self, image: ImageHandle, stage: StageMask) -> HairResult<()> {
        let img = self.images.get(image).ok_or(HairError::UnknownHandle { kind: "image" })?;
        self.validator.load(&img.desc.label, &img.record, stage)
    }

    fn store(&mut self, image: ImageHandle, stage: StageMask) -> HairResult<()> {
        let img = self.images.get_mut(image).ok_or(HairError::UnknownHandle { kind: "image" })?;
        self.validator.store(&img.desc.label, &mut img.record, stage)
    }

    fn take_float(&mut self, image: ImageHandle) -> HairResult<Vec<[f32; 4]>> {
        let img = self.images.get_mut(image).ok_or(HairError::UnknownHandle { kind: "image" })?;
        match &mut img.texels {
            Texels::Float(t) => Ok(std::mem::take(t)),
            Texels::Uint(_) => Err(HairError::invalid_operation(format!("{} is not a float image", img.desc.label))),
        }
    }

    fn put_float(&mut self, image: ImageHandle, texels: Vec<[f32; 4]>) {
        if let Some(img) = self.images.get_mut(image) {
            img.texels = Texels::Float(texels);
        }
    }

    fn extent_of(&self, image: ImageHandle) -> HairResult<u32> {
        Ok(self.image(image)?.desc.extent.width)
    }

    fn coverage(kernel: Kernel, groups: [u32; 3]) -> [u32; 3] {
        let size = kernel.workgroup_size();
        [0, 1, 2].map(|axis| groups[axis].saturating_mul(size[axis]))
    }

    fn run_deposit(&mut self, strategy: VoxelizationStrategy, segment_limit: usize) -> HairResult<()> {
        let stage = match strategy {
            VoxelizationStrategy::Rasterization => StageMask::FRAGMENT_SHADER,
            VoxelizationStrategy::Dda => StageMask::COMPUTE_SHADER,
        };
        let scene: SceneUniforms = self.uniform(GLOBAL_SET, voxel::SCENE)?;
        let uniforms: ObjectUniforms = self.uniform(OBJECT_SET, object::OBJECT)?;
        let vertices = self.vec4_array(GLOBAL_SET, voxel::SEGMENT_VERTICES)?;
        let indices = self.u32_array(GLOBAL_SET, voxel::SEGMENT_INDICES)?;
        let raw = self.image_binding(GLOBAL_SET, voxel::RAW_DENSITY)?;
        self.store(raw, stage)?;

        let texel_count = self.image(raw)?.desc.extent.texel_count();
        let n = scene.resolution() as usize;
        if n * n * n != texel_count {
            return Err(HairError::invalid_operation(format!(
                "scene resolution {n} does not match raw volume of {texel_count} texels"
            )));
        }

        let input = DepositInput {
            scene: &scene,
            object: &uniforms,
            vertices: &vertices,
            indices: &indices,
            segment_limit,
        };
        let img = self.images.get_mut(raw).ok_or(HairError::UnknownHandle { kind: "image" })?;
        match &mut img.texels {
            Texels::Uint(texels) => {
                kernels::deposit_density(strategy, &input, texels);
                Ok(())
            }
            Texels::Float(_) => Err(HairError::invalid_operation("raw density must be an integer image")),
        }
    }

    fn run_perceived_density(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let scene: SceneUniforms = self.uniform(GLOBAL_SET, voxel::SCENE)?;
        let params = self.fiber_params()?;
        let directions = self.directions(GLOBAL_SET, voxel::DIRECTIONS, scene.direction_count())?;
        let raw = self.image_binding(GLOBAL_SET, voxel::RAW_DENSITY)?;
        let perceived = self.image_binding(GLOBAL_SET, voxel::PERCEIVED_DENSITY)?;
        self.load(raw, StageMask::COMPUTE_SHADER)?;
        self.store(perceived, StageMask::COMPUTE_SHADER)?;

        let raw_texels = self.read_uint_texels(raw)?.to_vec();
        let mut out = self.take_float(perceived)?;
        if out.len() != raw_texels.len() {
            self.put_float(perceived, out);
            return Err(HairError::invalid_operation("density volumes differ in size"));
        }
        kernels::perceived_density(
            &scene,
            params.density,
            &raw_texels,
            &directions,
            Self::coverage(Kernel::PerceivedDensity, groups),
            &mut out,
        );
        self.put_float(perceived, out);
        Ok(())
    }

    fn run_fiber_lut(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let params = self.fiber_params()?;
        let mut images = Vec::with_capacity(scatter::LUTS.len());
        for binding in scatter::LUTS {
            let image = self.image_binding(GLOBAL_SET, binding)?;
            self.store(image, StageMask::COMPUTE_SHADER)?;
            images.push(image);
        }
        let n = self.extent_of(images[0])?;

        let mut luts: [Vec<[f32; 4]>; 6] = Default::default();
        for (lut, image) in luts.iter_mut().zip(&images) {
            *lut = self.take_float(*image)?;
        }
        kernels::fiber_luts(&params, n, Self::coverage(Kernel::FiberLut, groups)[0], &mut luts);
        for (lut, image) in luts.into_iter().zip(images) {
            self.put_float(image, lut);
        }
        Ok(())
    }

    fn run_ng_merge(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let params = self.fiber_params()?;
        let ng = self.image_binding(GLOBAL_SET, scatter::NG)?;
        let ng_trt = self.image_binding(GLOBAL_SET, scatter::NG_TRT)?;
        self.store(ng, StageMask::COMPUTE_SHADER)?;
        self.store(ng_trt, StageMask::COMPUTE_SHADER)?;
        let n = self.extent_of(ng)?;

        let mut ng_texels = self.take_float(ng)?;
        let mut trt_texels = self.take_float(ng_trt)?;
        let coverage = Self::coverage(Kernel::NgMerge, groups);
        kernels::ng_tables(&params, n, [coverage[0], coverage[1]], &mut ng_texels, &mut trt_texels);
        self.put_float(ng, ng_texels);
        self.put_float(ng_trt, trt_texels);
        Ok(())
    }

    fn run_global_illumination(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let scene: SceneUniforms = self.uniform(GLOBAL_SET, scatter::SCENE)?;
        let directions = self.directions(GLOBAL_SET, scatter::DIRECTIONS, scene.direction_count())?;
        let ng = self.image_binding(GLOBAL_SET, scatter::NG)?;
        let ng_trt = self.image_binding(GLOBAL_SET, scatter::NG_TRT)?;
        let gi = self.image_binding(GLOBAL_SET, scatter::GLOBAL_ILLUMINATION)?;
        self.load(ng, StageMask::COMPUTE_SHADER)?;
        self.load(ng_trt, StageMask::COMPUTE_SHADER)?;
        self.store(gi, StageMask::COMPUTE_SHADER)?;

        let table = NgTable::from_texels(
            self.extent_of(ng)?,
            self.read_float_texels(ng)?,
            self.read_float_texels(ng_trt)?,
        );
        let mut out = self.take_float(gi)?;
        kernels::global_illumination_volume(
            &table,
            &directions,
            Self::coverage(Kernel::GlobalIllumination, groups),
            &mut out,
        );
        self.put_float(gi, out);
        Ok(())
    }

    fn bound_kernel(&self) -> HairResult<Kernel> {
        let program = self
            .bound_program
            .ok_or_else(|| HairError::invalid_operation("no program bound"))?;
        self.programs
            .get(program)
            .map(|p| p.kernel)
            .ok_or(HairError::UnknownHandle { kind: "program" })
    }

    fn count_run(&mut self, kernel: Kernel) {
        *self.log.runs.entry(kernel).or_insert(0) += 1;
    }
}

impl RenderBackend for SoftwareBackend {
    fn create_image(&mut self, desc: &ImageDesc) -> HairResult<ImageHandle> {
        let count = desc.extent.texel_count();
        if count == 0 {
            return Err(HairError::invalid_operation(format!("{} has an empty extent", desc.label)));
        }
        let texels = match desc.format {
            TexelFormat::R32Uint | TexelFormat::R8Unorm => Texels::Uint(vec![0; count]),
            TexelFormat::Rgba32Float => Texels::Float(vec![[0.0; 4]; count]),
        };
        debug!("[SOFTWARE] Image {} {:?} {:?}", desc.label, desc.extent, desc.format);
        Ok(self.images.insert(SoftImage {
            desc: desc.clone(),
            texels,
            record: ImageRecord::default(),
        }))
    }

    fn destroy_image(&mut self, image: ImageHandle) {
        self.images.remove(image);
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> HairResult<BufferHandle> {
        Ok(self.buffers.insert(SoftBuffer {
            desc: desc.clone(),
            data: vec![0; desc.size as usize],
        }))
    }

    fn destroy_buffer(&mut self, buffer: BufferHandle) {
        self.buffers.remove(buffer);
    }

    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]) -> HairResult<()> {
        let target = self
            .buffers
            .get_mut(buffer)
            .ok_or(HairError::UnknownHandle { kind: "buffer" })?;
        let start = offset as usize;
        let end = start + data.len();
        let label = &target.desc.label;
        let size = target.data.len();
        let slot = target.data.get_mut(start..end).ok_or_else(|| {
            HairError::invalid_operation(format!("write {start}..{end} exceeds {label} of {size} bytes"))
        })?;
        slot.copy_from_slice(data);
        Ok(())
    }

    fn create_binding_layout(&mut self, desc: &BindingLayoutDesc) -> HairResult<LayoutHandle> {
        Ok(self.layouts.insert(desc.clone()))
    }

    fn destroy_binding_layout(&mut self, layout: LayoutHandle) {
        self.layouts.remove(layout);
    }

    fn create_binding_set(&mut self, layout: LayoutHandle) -> HairResult<BindingSetHandle> {
        if !self.layouts.contains_key(layout) {
            return Err(HairError::UnknownHandle { kind: "binding layout" });
        }
        Ok(self.sets.insert(SoftSet {
            layout,
            resources: BTreeMap::new(),
        }))
    }

    fn update_binding_set(&mut self, set: BindingSetHandle, writes: &[BindingWrite]) -> HairResult<()> {
        let target = self
            .sets
            .get_mut(set)
            .ok_or(HairError::UnknownHandle { kind: "binding set" })?;
        let layout = self
            .layouts
            .get(target.layout)
            .ok_or(HairError::UnknownHandle { kind: "binding layout" })?;
        for write in writes {
            if layout.binding(write.binding).is_none() {
                return Err(HairError::invalid_operation(format!(
                    "{} has no binding {}",
                    layout.label(),
                    write.binding
                )));
            }
            target.resources.insert(write.binding, write.resource);
        }
        Ok(())
    }

    fn destroy_binding_set(&mut self, set: BindingSetHandle) {
        self.sets.remove(set);
    }

    fn create_program(&mut self, desc: &ProgramDesc) -> HairResult<ProgramHandle> {
        if desc.kernel.is_graphics() && desc.raster.is_none() {
            return Err(HairError::invalid_operation(format!(
                "{} needs raster state",
                desc.kernel.name()
            )));
        }
        if desc.set_layouts.iter().any(|l| !self.layouts.contains_key(*l)) {
            return Err(HairError::UnknownHandle { kind: "binding layout" });
        }
        debug!("[SOFTWARE] Program {}", desc.kernel.name());
        Ok(self.programs.insert(desc.clone()))
    }

    fn destroy_program(&mut self, program: ProgramHandle) {
        if self.bound_program == Some(program) {
            self.bound_program = None;
        }
        self.programs.remove(program);
    }

    fn min_uniform_alignment(&self) -> u64 {
        self.uniform_alignment
    }

    fn cmd_image_barrier(&mut self, barrier: &ImageBarrier) -> HairResult<()> {
        let img = self
            .images
            .get_mut(barrier.image)
            .ok_or(HairError::UnknownHandle { kind: "image" })?;
        self.validator.barrier(&img.desc.label, &mut img.record, barrier)?;
        self.log.barriers += 1;
        Ok(())
    }

    fn cmd_clear_image(&mut self, image: ImageHandle, value: ClearValue) -> HairResult<()> {
        let img = self
            .images
            .get_mut(image)
            .ok_or(HairError::UnknownHandle { kind: "image" })?;
        self.validator.clear(&img.desc.label, &mut img.record)?;
        match (&mut img.texels, value) {
            (Texels::Uint(t), ClearValue::Uint(v)) => t.fill(v[0]),
            (Texels::Float(t), ClearValue::Float(v)) => t.fill(v),
            _ => {
                return Err(HairError::invalid_operation(format!(
                    "clear value does not match the format of {}",
                    img.desc.label
                )))
            }
        }
        self.log.clears += 1;
        Ok(())
    }

    fn cmd_bind_program(&mut self, program: ProgramHandle) -> HairResult<()> {
        if !self.programs.contains_key(program) {
            return Err(HairError::UnknownHandle { kind: "program" });
        }
        self.bound_program = Some(program);
        self.bound_sets.clear();
        Ok(())
    }

    fn cmd_bind_set(&mut self, index: u32, set: BindingSetHandle, dynamic_offsets: &[u32]) -> HairResult<()> {
        let program = self
            .bound_program
            .and_then(|p| self.programs.get(p))
            .ok_or_else(|| HairError::invalid_operation("set bound without a program"))?;
        let expected = *program.set_layouts.get(index as usize).ok_or_else(|| {
            HairError::invalid_operation(format!("{} has no set {index}", program.kernel.name()))
        })?;
        let target = self.sets.get(set).ok_or(HairError::UnknownHandle { kind: "binding set" })?;
        if target.layout != expected {
            return Err(HairError::invalid_operation(format!(
                "set {index} of {} bound with a foreign layout",
                program.kernel.name()
            )));
        }
        let layout = self
            .layouts
            .get(expected)
            .ok_or(HairError::UnknownHandle { kind: "binding layout" })?;
        if layout.dynamic_count() != dynamic_offsets.len() {
            return Err(HairError::invalid_operation(format!(
                "{} expects {} dynamic offsets, got {}",
                layout.label(),
                layout.dynamic_count(),
                dynamic_offsets.len()
            )));
        }
        if let Some(offset) = dynamic_offsets
            .iter()
            .find(|&&o| u64::from(o) % self.uniform_alignment != 0)
        {
            return Err(HairError::invalid_operation(format!(
                "dynamic offset {offset} is not a multiple of {}",
                self.uniform_alignment
            )));
        }

        let slot = index as usize;
        if self.bound_sets.len() <= slot {
            self.bound_sets.resize(slot + 1, None);
        }
        self.bound_sets[slot] = Some(BoundSet {
            set,
            offsets: dynamic_offsets.to_vec(),
        });
        Ok(())
    }

    fn cmd_draw_lines(&mut self, vertex_count: u32) -> HairResult<()> {
        let kernel = self.bound_kernel()?;
        if kernel != Kernel::DensityRaster {
            return Err(HairError::invalid_operation(format!(
                "draw with compute program {}",
                kernel.name()
            )));
        }
        self.run_deposit(VoxelizationStrategy::Rasterization, (vertex_count / 2) as usize)?;
        self.log.draws += 1;
        self.count_run(kernel);
        Ok(())
    }

    fn cmd_dispatch(&mut self, groups: [u32; 3]) -> HairResult<()> {
        let kernel = self.bound_kernel()?;
        match kernel {
            Kernel::DensityRaster => {
                return Err(HairError::invalid_operation("dispatch with the raster program"));
            }
            Kernel::DensityDda => {
                let limit = Self::coverage(kernel, groups).iter().product::<u32>() as usize;
                self.run_deposit(VoxelizationStrategy::Dda, limit)?;
            }
            Kernel::PerceivedDensity => self.run_perceived_density(groups)?,
            Kernel::FiberLut => self.run_fiber_lut(groups)?,
            Kernel::NgMerge => self.run_ng_merge(groups)?,
            Kernel::GlobalIllumination => self.run_global_illumination(groups)?,
        }
        self.count_run(kernel);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::binding::ShaderStages;
    use crate::render::image::{BufferUsage, Extent3D, SamplerDesc};
    use crate::render::state::{ImageLayout, ResourceState, TrackedImage};

    #[test]
    fn test_buffer_write_bounds() {
        let mut backend = SoftwareBackend::new();
        let buffer = backend
            .create_buffer(&BufferDesc::new("ubo", 8, BufferUsage::UNIFORM))
            .unwrap();
        backend.write_buffer(buffer, 4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(backend.read_buffer(buffer).unwrap(), &[0, 0, 0, 0, 1, 2, 3, 4]);
        assert!(backend.write_buffer(buffer, 6, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_clear_requires_transfer_state() {
        let mut backend = SoftwareBackend::new();
        let desc = ImageDesc::volume("raw", 4, TexelFormat::R32Uint, SamplerDesc::BORDER_BLACK);
        let image = backend.create_image(&desc).unwrap();

        assert!(backend.cmd_clear_image(image, ClearValue::Uint([0; 4])).is_err());
        assert_eq!(backend.hazards().len(), 1);

        let mut tracked = TrackedImage::new(image, "raw", ResourceState::storage_read(StageMask::COMPUTE_SHADER));
        backend
            .cmd_image_barrier(&tracked.to_writable(ResourceState::TRANSFER_WRITE))
            .unwrap();
        backend.cmd_clear_image(image, ClearValue::Uint([7; 4])).unwrap();
        assert!(backend.read_uint_texels(image).unwrap().iter().all(|&t| t == 7));
        assert_eq!(backend.command_log().clears, 1);
        assert_eq!(tracked.state().layout, ImageLayout::TransferDst);
    }

    #[test]
    fn test_bind_set_checks_layout_and_offsets() {
        let mut backend = SoftwareBackend::with_uniform_alignment(64);
        let object = backend
            .create_binding_layout(&crate::passes::bindings::object_layout("object"))
            .unwrap();
        let other = backend
            .create_binding_layout(&BindingLayoutDesc::new("other").add_uniform_buffer(0, ShaderStages::COMPUTE))
            .unwrap();
        let program = backend
            .create_program(&ProgramDesc::compute(Kernel::FiberLut, vec![other, object]))
            .unwrap();
        let set = backend.create_binding_set(object).unwrap();
        backend.cmd_bind_program(program).unwrap();

        assert!(backend.cmd_bind_set(0, set, &[0, 0]).is_err());
        assert!(backend.cmd_bind_set(1, set, &[0]).is_err());
        assert!(backend.cmd_bind_set(1, set, &[0, 32]).is_err());
        backend.cmd_bind_set(1, set, &[128, 128]).unwrap();
    }

    #[test]
    fn test_dispatch_without_program_fails() {
        let mut backend = SoftwareBackend::new();
        assert!(backend.cmd_dispatch([1, 1, 1]).is_err());
        assert!(backend.cmd_draw_lines(2).is_err());
        assert_eq!(backend.command_log().total_runs(), 0);
    }

    #[test]
    fn test_table_images_hold_float_texels() {
        let mut backend = SoftwareBackend::new();
        let image = backend
            .create_image(&ImageDesc::table("ng", Extent3D::square(8)))
            .unwrap();
        assert_eq!(backend.read_float_texels(image).unwrap().len(), 64);
        assert!(backend.read_uint_texels(image).is_err());
        backend.destroy_image(image);
        assert_eq!(backend.live_object_count(), 0);
    }
}
