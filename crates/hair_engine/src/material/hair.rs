//! Physically based Marschner hair model
//!
//! Absorption either comes from melanin concentrations (pigmentation enabled)
//! or is set directly. Angles are stored in degrees and converted on encode.

use crate::foundation::math::{utils::deg_to_rad, Rgb};
use crate::scattering::fiber::sigma_a_from_concentration;

use super::uniforms::{flag, EncodedUniformBlock};

/// Marschner hair parameters
#[derive(Debug, Clone, PartialEq)]
pub struct MarschnerHair {
    eumelanin: f32,
    pheomelanin: f32,
    absorption: Rgb,
    thickness: f32,
    roughness: f32,
    azimuthal_roughness: f32,
    shift: f32,
    ior: f32,
    density: f32,
    r_enabled: bool,
    tt_enabled: bool,
    trt_enabled: bool,
    r_power: f32,
    tt_power: f32,
    trt_power: f32,
    scatter_enabled: bool,
    pigmentation_enabled: bool,
    dirty: bool,
}

impl MarschnerHair {
    /// Slots written by [`MarschnerHair::encode`]
    pub const SLOT_COUNT: usize = 4;

    /// Create the model with brown-hair defaults
    pub fn new() -> Self {
        let eumelanin = 1.3;
        let pheomelanin = 0.2;
        Self {
            eumelanin,
            pheomelanin,
            absorption: sigma_a_from_concentration(eumelanin, pheomelanin),
            thickness: 0.003,
            roughness: 8.5,
            azimuthal_roughness: 0.35,
            shift: -5.2,
            ior: 1.55,
            density: 0.7,
            r_enabled: true,
            tt_enabled: true,
            trt_enabled: true,
            r_power: 1.0,
            tt_power: 1.0,
            trt_power: 1.0,
            scatter_enabled: false,
            pigmentation_enabled: true,
            dirty: true,
        }
    }

    /// Pack the parameters into the shader layout
    pub fn encode(&self) -> EncodedUniformBlock {
        let mut block = EncodedUniformBlock::zeroed();
        block.set(0, [self.absorption.x, self.absorption.y, self.absorption.z, self.thickness]);
        block.set(1, [deg_to_rad(self.roughness), deg_to_rad(self.shift), self.ior, self.density]);
        block.set(2, [self.r_power, self.tt_power, self.trt_power, 1.0]);
        block.set(
            3,
            [
                self.azimuthal_roughness,
                flag(self.r_enabled),
                flag(self.tt_enabled),
                flag(self.trt_enabled),
            ],
        );
        block
    }

    fn refresh_absorption(&mut self) {
        self.absorption = sigma_a_from_concentration(self.eumelanin, self.pheomelanin);
    }

    /// Eumelanin concentration
    pub fn eumelanin(&self) -> f32 {
        self.eumelanin
    }

    /// Set eumelanin; ignored while pigmentation is disabled
    pub fn set_eumelanin(&mut self, concentration: f32) {
        if !self.pigmentation_enabled {
            return;
        }
        self.eumelanin = concentration.max(0.0);
        self.refresh_absorption();
        self.dirty = true;
    }

    /// Pheomelanin concentration
    pub fn pheomelanin(&self) -> f32 {
        self.pheomelanin
    }

    /// Set pheomelanin; ignored while pigmentation is disabled
    pub fn set_pheomelanin(&mut self, concentration: f32) {
        if !self.pigmentation_enabled {
            return;
        }
        self.pheomelanin = concentration.max(0.0);
        self.refresh_absorption();
        self.dirty = true;
    }

    /// Absorption coefficient
    pub fn absorption(&self) -> Rgb {
        self.absorption
    }

    /// Set absorption directly; ignored while pigmentation is enabled
    pub fn set_absorption(&mut self, sigma_a: Rgb) {
        if self.pigmentation_enabled {
            return;
        }
        self.absorption = sigma_a.map(|c| c.max(0.0));
        self.dirty = true;
    }

    /// Whether absorption is derived from pigments
    pub fn pigmentation_enabled(&self) -> bool {
        self.pigmentation_enabled
    }

    /// Switch between pigment-derived and direct absorption
    pub fn set_pigmentation_enabled(&mut self, enabled: bool) {
        self.pigmentation_enabled = enabled;
        if enabled {
            self.refresh_absorption();
        }
        self.dirty = true;
    }

    /// Fiber thickness
    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Set fiber thickness
    pub fn set_thickness(&mut self, thickness: f32) {
        self.thickness = thickness.max(0.0);
        self.dirty = true;
    }

    /// Longitudinal roughness in degrees
    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    /// Set longitudinal roughness, clamped to [0, 90] degrees
    pub fn set_roughness(&mut self, degrees: f32) {
        self.roughness = degrees.clamp(0.0, 90.0);
        self.dirty = true;
    }

    /// Azimuthal roughness in [0, 1]
    pub fn azimuthal_roughness(&self) -> f32 {
        self.azimuthal_roughness
    }

    /// Set azimuthal roughness
    pub fn set_azimuthal_roughness(&mut self, roughness: f32) {
        self.azimuthal_roughness = roughness.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Cuticle tilt in degrees
    pub fn shift(&self) -> f32 {
        self.shift
    }

    /// Set cuticle tilt, clamped to [-90, 90] degrees
    pub fn set_shift(&mut self, degrees: f32) {
        self.shift = degrees.clamp(-90.0, 90.0);
        self.dirty = true;
    }

    /// Index of refraction
    pub fn ior(&self) -> f32 {
        self.ior
    }

    /// Set index of refraction
    pub fn set_ior(&mut self, ior: f32) {
        self.ior = ior.max(1.0);
        self.dirty = true;
    }

    /// Fiber packing density
    pub fn density(&self) -> f32 {
        self.density
    }

    /// Set fiber packing density
    pub fn set_density(&mut self, density: f32) {
        self.density = density.max(0.0);
        self.dirty = true;
    }

    /// Lobe enable flags (R, TT, TRT)
    pub fn lobes(&self) -> (bool, bool, bool) {
        (self.r_enabled, self.tt_enabled, self.trt_enabled)
    }

    /// Enable or disable individual lobes
    pub fn set_lobes(&mut self, r: bool, tt: bool, trt: bool) {
        self.r_enabled = r;
        self.tt_enabled = tt;
        self.trt_enabled = trt;
        self.dirty = true;
    }

    /// Lobe intensity scales (R, TT, TRT)
    pub fn lobe_powers(&self) -> (f32, f32, f32) {
        (self.r_power, self.tt_power, self.trt_power)
    }

    /// Set lobe intensity scales
    pub fn set_lobe_powers(&mut self, r: f32, tt: f32, trt: f32) {
        self.r_power = r.max(0.0);
        self.tt_power = tt.max(0.0);
        self.trt_power = trt.max(0.0);
        self.dirty = true;
    }

    /// Whether multiple scattering is applied when shading
    pub fn scatter_enabled(&self) -> bool {
        self.scatter_enabled
    }

    /// Toggle multiple scattering
    pub fn set_scatter_enabled(&mut self, enabled: bool) {
        self.scatter_enabled = enabled;
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl Default for MarschnerHair {
    fn default() -> Self {
        Self::new()
    }
}
