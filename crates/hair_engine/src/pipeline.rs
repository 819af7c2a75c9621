//! # Hair Pipeline
//!
//! Owns every volume, table, buffer, binding layout and per-frame binding set
//! of the hair precomputation, and sequences the voxelization and scattering
//! stages into the frame being recorded by the external driver.
//!
//! Lifecycle: [`HairPipeline::new`] → [`HairPipeline::configure`] →
//! [`HairPipeline::build`] → per frame [`HairPipeline::execute`] and, once the
//! driver's fence signals, [`HairPipeline::complete_frame`] →
//! [`HairPipeline::teardown`] (also run on drop).

use log::{debug, info, warn};

use crate::core::config::{validate_resolution, HairPipelineConfig};
use crate::error::{HairError, HairResult};
use crate::geometry::HairGeometry;
use crate::material::{EncodedUniformBlock, HairMaterial};
use crate::passes::bindings::{self, object, scatter, voxel};
use crate::passes::{
    FrameSets, HairDraw, LutHandles, MaterialDraw, ObjectUniforms, SceneUniforms, ScatteringPass, VoxelizationPass,
};
use crate::render::{
    BindingSetHandle, BindingWrite, BufferDesc, BufferHandle, BufferUsage, ImageHandle, LayoutHandle, RenderBackend,
};
use crate::sampling::DirectionSet;
use crate::scene::{first_hair_mesh, SceneMesh};
use crate::voxel::VoxelGrid;

/// Smallest size of a segment buffer
const MIN_SEGMENT_BUFFER_SIZE: u64 = 256;

const SCENE_BLOCK_SIZE: u64 = std::mem::size_of::<SceneUniforms>() as u64;
const OBJECT_BLOCK_SIZE: u64 = std::mem::size_of::<ObjectUniforms>() as u64;
const MATERIAL_BLOCK_SIZE: u64 = std::mem::size_of::<EncodedUniformBlock>() as u64;

/// Counters over the pipeline's lifetime
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Successful `execute` calls
    pub frames_executed: u64,
    /// Frames that deposited a hair mesh
    pub voxelizations: u64,
    /// LUT and NG recomputations
    pub lut_computations: u64,
    /// GI computations
    pub gi_computations: u64,
}

/// Outcome of one `execute`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Frame slot used
    pub frame_index: usize,
    /// Index of the voxelized mesh
    pub hair_mesh: Option<usize>,
    /// Segments deposited
    pub segments: usize,
    /// LUT and NG tables were recomputed
    pub luts_computed: bool,
    /// GI volume was computed
    pub gi_computed: bool,
}

#[derive(Debug)]
struct FrameResources {
    scene_buffer: BufferHandle,
    object_buffer: BufferHandle,
    segment_vertices: BufferHandle,
    segment_vertices_size: u64,
    segment_indices: BufferHandle,
    segment_indices_size: u64,
    voxel_sets: FrameSets,
    scatter_sets: FrameSets,
}

#[derive(Debug)]
struct Layouts {
    voxel_global: LayoutHandle,
    voxel_object: LayoutHandle,
    scatter_global: LayoutHandle,
    scatter_object: LayoutHandle,
}

#[derive(Debug)]
struct BuiltResources {
    layouts: Layouts,
    direction_buffer: BufferHandle,
    direction_buffer_size: u64,
    frames: Vec<FrameResources>,
}

/// Hair precomputation pipeline over a render backend
pub struct HairPipeline<B: RenderBackend> {
    backend: B,
    config: HairPipelineConfig,
    directions: DirectionSet,
    object_stride: u64,
    material_offset: u64,
    voxelization: Option<VoxelizationPass>,
    scattering: Option<ScatteringPass>,
    built: Option<BuiltResources>,
    in_flight: Vec<bool>,
    stats: PipelineStats,
}

impl<B: RenderBackend> HairPipeline<B> {
    /// Validate `config` and prepare an unconfigured pipeline
    pub fn new(backend: B, config: HairPipelineConfig) -> HairResult<Self> {
        config
            .validate()
            .map_err(|reason| HairError::InvalidConfiguration { reason })?;

        let material_offset = backend.pad_uniform_size(OBJECT_BLOCK_SIZE);
        let object_stride = material_offset + backend.pad_uniform_size(MATERIAL_BLOCK_SIZE);
        let directions = DirectionSet::generate(config.direction_count);
        info!(
            "[PIPELINE] Created: {} directions, {:?}, {} frames in flight, object stride {}",
            directions.len(),
            config.strategy,
            config.frames_in_flight,
            object_stride
        );

        Ok(Self {
            in_flight: vec![false; config.frames_in_flight as usize],
            backend,
            config,
            directions,
            object_stride,
            material_offset,
            voxelization: None,
            scattering: None,
            built: None,
            stats: PipelineStats::default(),
        })
    }

    /// Pipeline configured with [`HairPipelineConfig::resolution`] and built
    pub fn with_defaults(backend: B, config: HairPipelineConfig) -> HairResult<Self> {
        let resolution = config.resolution;
        let mut pipeline = Self::new(backend, config)?;
        pipeline.configure(resolution)?;
        pipeline.build()?;
        Ok(pipeline)
    }

    fn ensure_idle(&self, operation: &str) -> HairResult<()> {
        if let Some(frame) = self.in_flight.iter().position(|&busy| busy) {
            return Err(HairError::ResourceInUse {
                reason: format!("{operation} while frame {frame} is in flight"),
            });
        }
        Ok(())
    }

    /// (Re)allocate every volume and table at `resolution`.
    ///
    /// All states return to undefined, so GI and the LUTs are recomputed. When
    /// already built, programs are recreated and bindings rewritten.
    pub fn configure(&mut self, resolution: u32) -> HairResult<()> {
        self.ensure_idle("configure")?;
        validate_resolution(resolution).map_err(|reason| HairError::InvalidConfiguration { reason })?;

        self.release_stages();
        let mut voxelization = VoxelizationPass::new(&mut self.backend, self.config.strategy, resolution)?;
        let mut scattering = match ScatteringPass::new(&mut self.backend, resolution) {
            Ok(pass) => pass,
            Err(e) => {
                voxelization.destroy(&mut self.backend);
                return Err(e);
            }
        };

        if let Some(built) = &self.built {
            let backend = &mut self.backend;
            let layouts = &built.layouts;
            let rebound = voxelization
                .create_programs(backend, layouts.voxel_global, layouts.voxel_object)
                .and_then(|_| scattering.create_programs(backend, layouts.scatter_global, layouts.scatter_object))
                .and_then(|_| {
                    built.frames.iter().try_for_each(|frame| {
                        write_frame_bindings(backend, &voxelization, &scattering, built, frame, self.material_offset)
                    })
                });
            if let Err(e) = rebound {
                voxelization.destroy(backend);
                scattering.destroy(backend);
                return Err(e);
            }
        }

        self.config.resolution = resolution;
        self.voxelization = Some(voxelization);
        self.scattering = Some(scattering);
        info!("[PIPELINE] Configured at resolution {}", resolution);
        Ok(())
    }

    /// Create layouts, buffers, per-frame binding sets and programs
    pub fn build(&mut self) -> HairResult<()> {
        if self.built.is_some() {
            debug!("[PIPELINE] Already built");
            return Ok(());
        }
        if self.voxelization.is_none() || self.scattering.is_none() {
            return Err(HairError::missing_input("density volume and LUTs (configure was not called)"));
        }

        let mut built = BuiltResources {
            layouts: self.create_layouts()?,
            direction_buffer: BufferHandle::default(),
            direction_buffer_size: 0,
            frames: Vec::new(),
        };
        // Partially built resources are released by teardown
        let result = self.build_into(&mut built);
        self.built = Some(built);
        if let Err(e) = result {
            warn!("[PIPELINE] Build failed: {}", e);
            self.teardown();
            return Err(e);
        }

        info!(
            "[PIPELINE] Built: {} frames, {} object slots",
            self.in_flight.len(),
            self.config.max_objects
        );
        Ok(())
    }

    fn create_layouts(&mut self) -> HairResult<Layouts> {
        let backend = &mut self.backend;
        let voxel_global = backend.create_binding_layout(&bindings::voxel_global_layout())?;
        let voxel_object = backend.create_binding_layout(&bindings::object_layout("voxel_object"))?;
        let scatter_global = backend.create_binding_layout(&bindings::scatter_global_layout())?;
        let scatter_object = backend.create_binding_layout(&bindings::object_layout("scatter_object"))?;
        Ok(Layouts {
            voxel_global,
            voxel_object,
            scatter_global,
            scatter_object,
        })
    }

    fn build_into(&mut self, built: &mut BuiltResources) -> HairResult<()> {
        let (Some(voxelization), Some(scattering)) = (self.voxelization.as_mut(), self.scattering.as_mut()) else {
            return Err(HairError::missing_input("density volume and LUTs"));
        };
        let backend = &mut self.backend;

        let directions = self.directions.as_std430();
        let direction_bytes: &[u8] = bytemuck::cast_slice(&directions);
        built.direction_buffer_size = direction_bytes.len() as u64;
        built.direction_buffer = backend.create_buffer(&BufferDesc::new(
            "directions",
            built.direction_buffer_size,
            BufferUsage::STORAGE,
        ))?;
        backend.write_buffer(built.direction_buffer, 0, direction_bytes)?;

        for index in 0..self.in_flight.len() {
            let frame = create_frame(backend, &built.layouts, index, self.config.max_objects as u64 * self.object_stride)?;
            built.frames.push(frame);
        }

        let layouts = &built.layouts;
        voxelization.create_programs(backend, layouts.voxel_global, layouts.voxel_object)?;
        scattering.create_programs(backend, layouts.scatter_global, layouts.scatter_object)?;

        for frame in &built.frames {
            write_frame_bindings(backend, voxelization, scattering, built, frame, self.material_offset)?;
        }
        Ok(())
    }

    /// Record both stages for `meshes` into frame slot `frame_index`.
    ///
    /// Every mesh gets an object slot at `object_stride * index`; only the
    /// first hair mesh is voxelized. The slot stays in flight until
    /// [`HairPipeline::complete_frame`].
    pub fn execute<M: SceneMesh>(&mut self, frame_index: usize, meshes: &mut [M]) -> HairResult<FrameReport> {
        if self.built.is_none() {
            return Err(HairError::NotBuilt);
        }
        if frame_index >= self.in_flight.len() {
            return Err(HairError::invalid_operation(format!(
                "frame index {} out of range ({} frames in flight)",
                frame_index,
                self.in_flight.len()
            )));
        }
        let available = self.config.max_objects as usize;
        if meshes.len() > available {
            return Err(HairError::InsufficientSlots {
                requested: meshes.len(),
                available,
            });
        }
        if self.in_flight[frame_index] {
            return Err(HairError::ResourceInUse {
                reason: format!("frame {frame_index} is still in flight"),
            });
        }

        let resolution = self.config.resolution;
        let hair = first_hair_mesh(meshes);
        let grid = hair.and_then(|i| {
            let mesh = &meshes[i];
            mesh.geometry()
                .map(|g| VoxelGrid::from_bounds(&g.bounds().transformed(&mesh.model_matrix()), resolution))
        });

        self.upload_uniforms(frame_index, meshes, hair, grid.as_ref())?;
        let segments = match hair.and_then(|i| meshes[i].geometry()) {
            Some(geometry) => self.upload_segments(frame_index, geometry)?,
            None => 0,
        };

        let offset_of = |index: usize| -> HairResult<u32> {
            u32::try_from(index as u64 * self.object_stride)
                .map_err(|_| HairError::invalid_operation("object offset exceeds 32 bits"))
        };
        let draw = match hair {
            Some(i) => Some(HairDraw {
                object_offset: offset_of(i)?,
                segment_count: segments as u32,
            }),
            None => None,
        };
        let material = match hair {
            Some(i) => Some(MaterialDraw {
                object_offset: offset_of(i)?,
                dirty: meshes[i].hair_material().is_some_and(HairMaterial::is_dirty),
            }),
            None => None,
        };

        let (Some(built), Some(voxelization), Some(scattering)) =
            (self.built.as_ref(), self.voxelization.as_mut(), self.scattering.as_mut())
        else {
            return Err(HairError::NotBuilt);
        };
        let frame = &built.frames[frame_index];
        voxelization.record(&mut self.backend, &frame.voxel_sets, draw)?;
        let scatter = scattering.record(&mut self.backend, &frame.scatter_sets, material)?;

        if scatter.luts_computed {
            if let Some(material) = hair.and_then(|i| meshes[i].hair_material_mut()) {
                material.mark_clean();
            }
            self.stats.lut_computations += 1;
        }
        if scatter.gi_computed {
            self.stats.gi_computations += 1;
        }
        if draw.is_some() {
            self.stats.voxelizations += 1;
        }
        self.stats.frames_executed += 1;
        self.in_flight[frame_index] = true;

        debug!(
            "[PIPELINE] Frame {}: {} meshes, hair {:?}, {} segments",
            frame_index,
            meshes.len(),
            hair,
            segments
        );
        Ok(FrameReport {
            frame_index,
            hair_mesh: hair,
            segments,
            luts_computed: scatter.luts_computed,
            gi_computed: scatter.gi_computed,
        })
    }

    fn upload_uniforms<M: SceneMesh>(
        &mut self,
        frame_index: usize,
        meshes: &[M],
        hair: Option<usize>,
        grid: Option<&VoxelGrid>,
    ) -> HairResult<()> {
        let built = self.built.as_ref().ok_or(HairError::NotBuilt)?;
        let frame = &built.frames[frame_index];

        let scene = SceneUniforms::new(
            self.config.resolution,
            self.directions.len() as u32,
            self.config.strategy,
        );
        self.backend
            .write_buffer(frame.scene_buffer, 0, bytemuck::bytes_of(&scene))?;

        for (index, mesh) in meshes.iter().enumerate() {
            let is_hair = hair == Some(index);
            let uniforms = ObjectUniforms::new(
                &mesh.model_matrix(),
                if is_hair { grid } else { None },
                mesh.geometry(),
                mesh.hair_material(),
            );
            let block = mesh
                .hair_material()
                .map_or_else(EncodedUniformBlock::zeroed, HairMaterial::encode);

            let base = index as u64 * self.object_stride;
            self.backend
                .write_buffer(frame.object_buffer, base, bytemuck::bytes_of(&uniforms))?;
            self.backend
                .write_buffer(frame.object_buffer, base + self.material_offset, bytemuck::bytes_of(&block))?;
        }
        Ok(())
    }

    /// Upload the hair mesh's segments, growing the frame's buffers as needed
    fn upload_segments(&mut self, frame_index: usize, geometry: &dyn HairGeometry) -> HairResult<usize> {
        let vertices: Vec<[f32; 4]> = geometry.positions().iter().map(|p| [p.x, p.y, p.z, 1.0]).collect();
        let indices: Vec<u32> = geometry.line_indices().iter().flatten().copied().collect();
        let vertex_bytes: &[u8] = bytemuck::cast_slice(&vertices);
        let index_bytes: &[u8] = bytemuck::cast_slice(&indices);

        let built = self.built.as_mut().ok_or(HairError::NotBuilt)?;
        let frame = &mut built.frames[frame_index];
        let backend = &mut self.backend;

        let mut writes = Vec::new();
        if vertex_bytes.len() as u64 > frame.segment_vertices_size {
            let size = grow(vertex_bytes.len() as u64);
            let buffer = backend.create_buffer(&BufferDesc::new("segment_vertices", size, BufferUsage::STORAGE))?;
            backend.destroy_buffer(frame.segment_vertices);
            frame.segment_vertices = buffer;
            frame.segment_vertices_size = size;
            writes.push(BindingWrite::buffer(voxel::SEGMENT_VERTICES, buffer, 0, size));
        }
        if index_bytes.len() as u64 > frame.segment_indices_size {
            let size = grow(index_bytes.len() as u64);
            let buffer = backend.create_buffer(&BufferDesc::new("segment_indices", size, BufferUsage::STORAGE))?;
            backend.destroy_buffer(frame.segment_indices);
            frame.segment_indices = buffer;
            frame.segment_indices_size = size;
            writes.push(BindingWrite::buffer(voxel::SEGMENT_INDICES, buffer, 0, size));
        }
        if !writes.is_empty() {
            debug!("[PIPELINE] Frame {} segment buffers grown", frame_index);
            backend.update_binding_set(frame.voxel_sets.global, &writes)?;
        }

        backend.write_buffer(frame.segment_vertices, 0, vertex_bytes)?;
        backend.write_buffer(frame.segment_indices, 0, index_bytes)?;
        Ok(geometry.segment_count())
    }

    /// Release frame slot `frame_index` once the driver's fence has signaled
    pub fn complete_frame(&mut self, frame_index: usize) -> HairResult<()> {
        let slot = self.in_flight.get_mut(frame_index).ok_or_else(|| {
            HairError::invalid_operation(format!("frame index {frame_index} out of range"))
        })?;
        *slot = false;
        Ok(())
    }

    /// Mark the GI volume stale; the next frame recomputes it
    pub fn invalidate_gi(&mut self) {
        if let Some(scattering) = self.scattering.as_mut() {
            scattering.invalidate_gi();
        }
    }

    fn release_stages(&mut self) {
        if let Some(mut pass) = self.voxelization.take() {
            pass.destroy(&mut self.backend);
        }
        if let Some(mut pass) = self.scattering.take() {
            pass.destroy(&mut self.backend);
        }
    }

    /// Destroy every backend object. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        let had_resources = self.built.is_some() || self.voxelization.is_some() || self.scattering.is_some();
        self.release_stages();

        if let Some(built) = self.built.take() {
            let backend = &mut self.backend;
            for frame in built.frames {
                for set in [
                    frame.voxel_sets.global,
                    frame.voxel_sets.object,
                    frame.scatter_sets.global,
                    frame.scatter_sets.object,
                ] {
                    backend.destroy_binding_set(set);
                }
                for buffer in [
                    frame.scene_buffer,
                    frame.object_buffer,
                    frame.segment_vertices,
                    frame.segment_indices,
                ] {
                    backend.destroy_buffer(buffer);
                }
            }
            backend.destroy_buffer(built.direction_buffer);
            let layouts = built.layouts;
            for layout in [
                layouts.voxel_global,
                layouts.voxel_object,
                layouts.scatter_global,
                layouts.scatter_object,
            ] {
                backend.destroy_binding_layout(layout);
            }
        }

        self.in_flight.iter_mut().for_each(|busy| *busy = false);
        if had_resources {
            info!("[PIPELINE] Torn down");
        }
    }

    /// Raw density volume
    pub fn density_volume(&self) -> Option<ImageHandle> {
        self.voxelization.as_ref().map(VoxelizationPass::raw_density)
    }

    /// Perceived density volume
    pub fn perceived_density_volume(&self) -> Option<ImageHandle> {
        self.voxelization.as_ref().map(VoxelizationPass::perceived_density)
    }

    /// Scattering tables and GI volume
    pub fn luts(&self) -> Option<LutHandles> {
        self.scattering.as_ref().map(|pass| pass.luts().handles())
    }

    /// Voxelization stage, if configured
    pub fn voxelization(&self) -> Option<&VoxelizationPass> {
        self.voxelization.as_ref()
    }

    /// Scattering stage, if configured
    pub fn scattering(&self) -> Option<&ScatteringPass> {
        self.scattering.as_ref()
    }

    /// Bytes between consecutive object slots
    pub fn object_stride(&self) -> u64 {
        self.object_stride
    }

    /// Lifetime counters
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Active configuration
    pub fn config(&self) -> &HairPipelineConfig {
        &self.config
    }

    /// Sample directions uploaded to the kernels
    pub fn directions(&self) -> &DirectionSet {
        &self.directions
    }

    /// True once `build` succeeded
    pub fn is_built(&self) -> bool {
        self.built.is_some()
    }

    /// True while frame slot `frame_index` awaits `complete_frame`
    pub fn is_frame_in_flight(&self, frame_index: usize) -> bool {
        self.in_flight.get(frame_index).copied().unwrap_or(false)
    }

    /// Backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: RenderBackend> Drop for HairPipeline<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn grow(required: u64) -> u64 {
    required.next_power_of_two().max(MIN_SEGMENT_BUFFER_SIZE)
}

fn create_frame<B: RenderBackend>(
    backend: &mut B,
    layouts: &Layouts,
    index: usize,
    object_buffer_size: u64,
) -> HairResult<FrameResources> {
    let label = |name: &str| format!("{name}[{index}]");
    let set = |backend: &mut B, layout: LayoutHandle| -> HairResult<BindingSetHandle> { backend.create_binding_set(layout) };

    Ok(FrameResources {
        scene_buffer: backend.create_buffer(&BufferDesc::new(label("scene"), SCENE_BLOCK_SIZE, BufferUsage::UNIFORM))?,
        object_buffer: backend.create_buffer(&BufferDesc::new(
            label("objects"),
            object_buffer_size,
            BufferUsage::UNIFORM,
        ))?,
        segment_vertices: backend.create_buffer(&BufferDesc::new(
            label("segment_vertices"),
            MIN_SEGMENT_BUFFER_SIZE,
            BufferUsage::STORAGE,
        ))?,
        segment_vertices_size: MIN_SEGMENT_BUFFER_SIZE,
        segment_indices: backend.create_buffer(&BufferDesc::new(
            label("segment_indices"),
            MIN_SEGMENT_BUFFER_SIZE,
            BufferUsage::STORAGE,
        ))?,
        segment_indices_size: MIN_SEGMENT_BUFFER_SIZE,
        voxel_sets: FrameSets {
            global: set(backend, layouts.voxel_global)?,
            object: set(backend, layouts.voxel_object)?,
        },
        scatter_sets: FrameSets {
            global: set(backend, layouts.scatter_global)?,
            object: set(backend, layouts.scatter_object)?,
        },
    })
}

fn write_frame_bindings<B: RenderBackend>(
    backend: &mut B,
    voxelization: &VoxelizationPass,
    scattering: &ScatteringPass,
    built: &BuiltResources,
    frame: &FrameResources,
    material_offset: u64,
) -> HairResult<()> {
    backend.update_binding_set(
        frame.voxel_sets.global,
        &[
            BindingWrite::buffer(voxel::SCENE, frame.scene_buffer, 0, SCENE_BLOCK_SIZE),
            BindingWrite::image(voxel::RAW_DENSITY, voxelization.raw_density()),
            BindingWrite::image(voxel::PERCEIVED_DENSITY, voxelization.perceived_density()),
            BindingWrite::buffer(voxel::DIRECTIONS, built.direction_buffer, 0, built.direction_buffer_size),
            BindingWrite::buffer(voxel::SEGMENT_VERTICES, frame.segment_vertices, 0, frame.segment_vertices_size),
            BindingWrite::buffer(voxel::SEGMENT_INDICES, frame.segment_indices, 0, frame.segment_indices_size),
        ],
    )?;

    let luts = scattering.luts().handles();
    let mut scatter_writes: Vec<BindingWrite> = scatter::LUTS
        .iter()
        .zip(luts.one_dimensional())
        .map(|(&binding, image)| BindingWrite::image(binding, image))
        .collect();
    scatter_writes.extend([
        BindingWrite::image(scatter::NG, luts.ng),
        BindingWrite::image(scatter::NG_TRT, luts.ng_trt),
        BindingWrite::image(scatter::GLOBAL_ILLUMINATION, luts.global_illumination),
        BindingWrite::buffer(scatter::DIRECTIONS, built.direction_buffer, 0, built.direction_buffer_size),
        BindingWrite::buffer(scatter::SCENE, frame.scene_buffer, 0, SCENE_BLOCK_SIZE),
    ]);
    backend.update_binding_set(frame.scatter_sets.global, &scatter_writes)?;

    let object_writes = [
        BindingWrite::buffer(object::OBJECT, frame.object_buffer, 0, OBJECT_BLOCK_SIZE),
        BindingWrite::buffer(object::MATERIAL, frame.object_buffer, material_offset, MATERIAL_BLOCK_SIZE),
    ];
    backend.update_binding_set(frame.voxel_sets.object, &object_writes)?;
    backend.update_binding_set(frame.scatter_sets.object, &object_writes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::SoftwareBackend;

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = HairPipelineConfig::default().with_resolution(48);
        let result = HairPipeline::new(SoftwareBackend::new(), config);
        assert!(matches!(result, Err(HairError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_object_stride_pads_both_blocks() {
        let pipeline = HairPipeline::new(SoftwareBackend::with_uniform_alignment(256), HairPipelineConfig::default())
            .unwrap();
        assert_eq!(pipeline.object_stride(), 512);

        let pipeline = HairPipeline::new(SoftwareBackend::with_uniform_alignment(32), HairPipelineConfig::default())
            .unwrap();
        assert_eq!(pipeline.object_stride(), 96 + 128);
    }

    #[test]
    fn test_configure_rejects_bad_resolution() {
        let mut pipeline = HairPipeline::new(SoftwareBackend::new(), HairPipelineConfig::default()).unwrap();
        assert!(pipeline.configure(3).is_err());
        assert!(pipeline.density_volume().is_none());
    }
}
