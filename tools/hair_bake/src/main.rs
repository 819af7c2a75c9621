//! Builds a procedural hair scene, runs the hair passes on the software
//! backend and prints statistics of the resulting volumes and tables.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use hair_engine::config::Config;
use hair_engine::foundation::logging;
use hair_engine::material::{DisneyHair, MarschnerHair, StylizedHair};
use hair_engine::prelude::*;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Model {
    Marschner,
    Disney,
    Stylized,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Strategy {
    Dda,
    Raster,
}

#[derive(Debug, Parser)]
#[command(name = "hair_bake", about = "Runs the hair precomputation passes headlessly")]
struct Args {
    /// Pipeline configuration (.toml or .ron); command-line flags override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write the effective configuration to FILE and exit
    #[arg(long, value_name = "FILE")]
    write_config: Option<PathBuf>,

    /// Volume and LUT resolution (power of two in [4, 512])
    #[arg(short, long)]
    resolution: Option<u32>,

    /// Sample directions for perceived density and GI
    #[arg(short, long)]
    directions: Option<u32>,

    /// Segment deposit strategy
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Hair shading model
    #[arg(short, long, value_enum, default_value = "marschner")]
    model: Model,

    /// Number of strands in the procedural patch
    #[arg(long, default_value_t = 64)]
    strands: usize,

    /// Points per strand
    #[arg(long, default_value_t = 12)]
    points: usize,

    /// Frames to execute; later frames reuse the clean material
    #[arg(short, long, default_value_t = 2)]
    frames: usize,
}

fn load_config(args: &Args) -> Result<HairPipelineConfig> {
    let mut config = match &args.config {
        Some(path) => HairPipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => HairPipelineConfig::default(),
    };
    if let Some(resolution) = args.resolution {
        config = config.with_resolution(resolution);
    }
    if let Some(count) = args.directions {
        config = config.with_direction_count(count);
    }
    if let Some(strategy) = args.strategy {
        config = config.with_strategy(match strategy {
            Strategy::Dda => VoxelizationStrategy::Dda,
            Strategy::Raster => VoxelizationStrategy::Rasterization,
        });
    }
    Ok(config)
}

/// Strands hanging from a square scalp patch, each with a slight wave
fn procedural_strands(strands: usize, points: usize) -> StrandGeometry {
    let side = (strands as f32).sqrt().ceil().max(1.0) as usize;
    let polylines: Vec<Vec<Vec3>> = (0..strands)
        .map(|s| {
            let root = Vec3::new((s % side) as f32 / side as f32, 1.0, (s / side) as f32 / side as f32);
            (0..points)
                .map(|p| {
                    let t = p as f32 / (points - 1) as f32;
                    let wave = 0.05 * (t * 6.0 + s as f32 * 0.7).sin();
                    root + Vec3::new(wave, -t, 0.2 * t * t)
                })
                .collect()
        })
        .collect();
    StrandGeometry::from_strands(&polylines)
}

fn material(model: Model) -> HairMaterial {
    match model {
        Model::Marschner => HairMaterial::Marschner(MarschnerHair::new()),
        Model::Disney => HairMaterial::Disney(DisneyHair::new()),
        Model::Stylized => HairMaterial::Stylized(StylizedHair::new()),
    }
}

fn float_range(texels: &[[f32; 4]], channel: usize) -> (f32, f32) {
    texels.iter().fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), t| {
        (lo.min(t[channel]), hi.max(t[channel]))
    })
}

fn print_summary(pipeline: &HairPipeline<SoftwareBackend>) -> Result<()> {
    let backend = pipeline.backend();
    let n = pipeline.config().resolution;

    let raw_handle = pipeline.density_volume().context("pipeline has no density volume")?;
    let raw = backend.read_uint_texels(raw_handle)?;
    let occupied = raw.iter().filter(|&&v| v > 0).count();
    let total: u64 = raw.iter().map(|&v| u64::from(v)).sum();
    println!("Density volume        {n}^3, {occupied} occupied voxels");
    println!("  total fiber length  {:.3} average fibers", total as f64 / 65536.0);

    if let Some(handle) = pipeline.perceived_density_volume() {
        let (lo, hi) = float_range(backend.read_float_texels(handle)?, 0);
        println!("  perceived c0        [{lo:.4}, {hi:.4}]");
    }

    let luts = pipeline.luts().context("pipeline has no scattering tables")?;
    let tables = [
        ("A_f", luts.front_attenuation),
        ("A_b", luts.back_attenuation),
        ("shift_f", luts.front_shift),
        ("shift_b", luts.back_shift),
        ("beta_f", luts.front_beta),
        ("beta_b", luts.back_beta),
        ("NG", luts.ng),
        ("NG_TRT", luts.ng_trt),
        ("GI", luts.global_illumination),
    ];
    for (name, handle) in tables {
        let texels = backend.read_float_texels(handle)?;
        let (lo, hi) = float_range(texels, 0);
        println!("  {name:<19} {} texels, red in [{lo:.4}, {hi:.4}]", texels.len());
    }

    let stats = pipeline.stats();
    println!(
        "Frames {}  voxelizations {}  LUT passes {}  GI passes {}",
        stats.frames_executed, stats.voxelizations, stats.lut_computations, stats.gi_computations
    );
    Ok(())
}

fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();

    let config = load_config(&args)?;
    if let Some(path) = &args.write_config {
        config
            .save_to_file(path)
            .with_context(|| format!("Failed to write configuration to {}", path.display()))?;
        info!("Configuration written to {}", path.display());
        return Ok(());
    }
    if args.points < 2 {
        bail!("strands need at least two points, got {}", args.points);
    }

    let geometry = procedural_strands(args.strands, args.points);
    info!(
        "Procedural hair: {} strands, {} segments",
        geometry.strand_count(),
        geometry.segment_count()
    );
    let mut meshes = vec![HairMesh::new("hair", geometry, material(args.model))];

    let mut pipeline = HairPipeline::with_defaults(SoftwareBackend::new(), config)?;
    let frames_in_flight = pipeline.config().frames_in_flight as usize;

    for frame in 0..args.frames {
        let slot = frame % frames_in_flight;
        let report = pipeline.execute(slot, &mut meshes)?;
        info!(
            "Frame {frame}: {} segments, LUTs {}, GI {}",
            report.segments,
            if report.luts_computed { "computed" } else { "reused" },
            if report.gi_computed { "computed" } else { "reused" }
        );
        pipeline.complete_frame(slot)?;
    }

    let hazards = pipeline.backend().hazards();
    if !hazards.is_empty() {
        for hazard in hazards {
            warn!("{hazard}");
        }
        bail!("{} synchronization hazards recorded", hazards.len());
    }

    print_summary(&pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_procedural_strands() {
        let geometry = procedural_strands(9, 4);
        assert_eq!(geometry.strand_count(), 9);
        assert_eq!(geometry.segment_count(), 27);
        assert!(geometry.average_fiber_length() > 1.0);
    }

    #[test]
    fn test_flags_override_config() {
        let args = Args::parse_from(["hair_bake", "--resolution", "16", "--strategy", "raster"]);
        let config = load_config(&args).unwrap();
        assert_eq!(config.resolution, 16);
        assert_eq!(config.strategy, VoxelizationStrategy::Rasterization);
        assert!(config.validate().is_ok());
    }
}
