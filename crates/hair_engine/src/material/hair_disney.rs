//! Artist-directed Disney hair model
//!
//! Each lobe has its own color and intensity; back and front scattering
//! colors drive the multiple-scattering approximation. Roughness values are
//! perceptual and squared on encode.

use crate::foundation::math::{utils::deg_to_rad, Rgb};

use super::uniforms::{flag, EncodedUniformBlock};

/// Color and intensity of one lobe
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LobeTint {
    /// Lobe color
    pub color: Rgb,
    /// Intensity multiplier
    pub intensity: f32,
}

impl LobeTint {
    /// Create a tint
    pub fn new(color: Rgb, intensity: f32) -> Self {
        Self { color, intensity }
    }

    fn slot(&self) -> [f32; 4] {
        [self.color.x, self.color.y, self.color.z, self.intensity]
    }
}

/// Lobe selector for [`DisneyHair`] tints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisneyLobe {
    /// Primary reflection
    Reflection,
    /// Transmission
    Transmission,
    /// Secondary reflection
    SecondaryReflection,
    /// Back scattering
    BackScatter,
    /// Forward scattering
    ForwardScatter,
}

/// Disney hair parameters
#[derive(Debug, Clone, PartialEq)]
pub struct DisneyHair {
    reflection: LobeTint,
    transmission: LobeTint,
    secondary_reflection: LobeTint,
    back_scatter: LobeTint,
    forward_scatter: LobeTint,
    roughness: f32,
    azimuthal_roughness: f32,
    shift: f32,
    ior: f32,
    density: f32,
    thickness: f32,
    scatter_enabled: bool,
    r_enabled: bool,
    tt_enabled: bool,
    trt_enabled: bool,
    global_intensity: f32,
    dirty: bool,
}

impl DisneyHair {
    /// Slots written by [`DisneyHair::encode`]
    pub const SLOT_COUNT: usize = 8;

    /// Create the model with defaults
    pub fn new() -> Self {
        let warm = Rgb::new(0.6, 0.3, 0.2);
        Self {
            reflection: LobeTint::new(Rgb::new(1.0, 1.0, 1.0), 1.0),
            transmission: LobeTint::new(warm, 1.0),
            secondary_reflection: LobeTint::new(warm, 1.0),
            back_scatter: LobeTint::new(warm, 1.0),
            forward_scatter: LobeTint::new(warm, 1.0),
            roughness: 0.4,
            azimuthal_roughness: 0.35,
            shift: -5.2,
            ior: 1.55,
            density: 0.7,
            thickness: 0.003,
            scatter_enabled: false,
            r_enabled: true,
            tt_enabled: true,
            trt_enabled: true,
            global_intensity: 1.0,
            dirty: true,
        }
    }

    /// Pack the parameters into the shader layout
    pub fn encode(&self) -> EncodedUniformBlock {
        let mut block = EncodedUniformBlock::zeroed();
        block.set(0, self.reflection.slot());
        block.set(1, self.transmission.slot());
        block.set(2, self.secondary_reflection.slot());
        block.set(3, self.back_scatter.slot());
        block.set(4, self.forward_scatter.slot());
        block.set(
            5,
            [self.roughness * self.roughness, deg_to_rad(self.shift), self.ior, self.density],
        );
        let az = self.azimuthal_roughness * self.azimuthal_roughness;
        block.set(6, [az, az, self.thickness, flag(self.scatter_enabled)]);
        block.set(
            7,
            [
                flag(self.r_enabled),
                flag(self.tt_enabled),
                flag(self.trt_enabled),
                self.global_intensity,
            ],
        );
        block
    }

    fn tint_mut(&mut self, lobe: DisneyLobe) -> &mut LobeTint {
        match lobe {
            DisneyLobe::Reflection => &mut self.reflection,
            DisneyLobe::Transmission => &mut self.transmission,
            DisneyLobe::SecondaryReflection => &mut self.secondary_reflection,
            DisneyLobe::BackScatter => &mut self.back_scatter,
            DisneyLobe::ForwardScatter => &mut self.forward_scatter,
        }
    }

    /// Tint of a lobe
    pub fn tint(&self, lobe: DisneyLobe) -> LobeTint {
        match lobe {
            DisneyLobe::Reflection => self.reflection,
            DisneyLobe::Transmission => self.transmission,
            DisneyLobe::SecondaryReflection => self.secondary_reflection,
            DisneyLobe::BackScatter => self.back_scatter,
            DisneyLobe::ForwardScatter => self.forward_scatter,
        }
    }

    /// Set a lobe color, clamped to [0, 1]
    pub fn set_color(&mut self, lobe: DisneyLobe, color: Rgb) {
        self.tint_mut(lobe).color = color.map(|c| c.clamp(0.0, 1.0));
        self.dirty = true;
    }

    /// Set a lobe intensity
    pub fn set_intensity(&mut self, lobe: DisneyLobe, intensity: f32) {
        self.tint_mut(lobe).intensity = intensity.max(0.0);
        self.dirty = true;
    }

    /// Perceptual longitudinal roughness
    pub fn roughness(&self) -> f32 {
        self.roughness
    }

    /// Set perceptual longitudinal roughness in [0, 1]
    pub fn set_roughness(&mut self, roughness: f32) {
        self.roughness = roughness.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Perceptual azimuthal roughness
    pub fn azimuthal_roughness(&self) -> f32 {
        self.azimuthal_roughness
    }

    /// Set perceptual azimuthal roughness in [0, 1]
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

    /// Fiber thickness
    pub fn thickness(&self) -> f32 {
        self.thickness
    }

    /// Set fiber thickness
    pub fn set_thickness(&mut self, thickness: f32) {
        self.thickness = thickness.max(0.0);
        self.dirty = true;
    }

    /// Toggle multiple scattering
    pub fn set_scatter_enabled(&mut self, enabled: bool) {
        self.scatter_enabled = enabled;
        self.dirty = true;
    }

    /// Enable or disable individual lobes
    pub fn set_lobes(&mut self, r: bool, tt: bool, trt: bool) {
        self.r_enabled = r;
        self.tt_enabled = tt;
        self.trt_enabled = trt;
        self.dirty = true;
    }

    /// Set the overall intensity multiplier
    pub fn set_global_intensity(&mut self, intensity: f32) {
        self.global_intensity = intensity.max(0.0);
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl Default for DisneyHair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_encoding() {
        let block = DisneyHair::new().encode();

        assert_eq!(block.slot(0), [1.0, 1.0, 1.0, 1.0]);
        for slot in 1..5 {
            assert_eq!(block.slot(slot), [0.6, 0.3, 0.2, 1.0]);
        }
        assert_relative_eq!(block.slot(5)[0], 0.16, epsilon = 1e-6);
        assert_relative_eq!(block.slot(5)[1], -5.2f32.to_radians(), epsilon = 1e-6);
        assert_eq!(block.slot(5)[2..], [1.55, 0.7]);
        assert_relative_eq!(block.slot(6)[0], 0.1225, epsilon = 1e-6);
        assert_eq!(block.slot(6)[2..], [0.003, 0.0]);
        assert_eq!(block.slot(7), [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_lobe_setters_mark_dirty() {
        let mut hair = DisneyHair::new();
        hair.set_dirty(false);

        hair.set_color(DisneyLobe::BackScatter, Rgb::new(2.0, 0.5, -1.0));
        assert!(hair.is_dirty());
        assert_eq!(hair.tint(DisneyLobe::BackScatter).color, Rgb::new(1.0, 0.5, 0.0));

        hair.set_intensity(DisneyLobe::ForwardScatter, 3.0);
        hair.set_scatter_enabled(true);
        let block = hair.encode();
        assert_eq!(block.slot(3), [1.0, 0.5, 0.0, 1.0]);
        assert_eq!(block.slot(4)[3], 3.0);
        assert_eq!(block.slot(6)[3], 1.0);
    }
}
