//! Base-color hair model for stylized content
//!
//! A reduced parameter set in the spirit of metallic/roughness surface
//! shading: a single base color drives absorption, `metallic` tints the
//! primary highlight and `backlit` scales transmitted light.

use crate::foundation::math::{utils::deg_to_rad, Rgb};

use super::uniforms::{flag, EncodedUniformBlock};

/// Stylized hair parameters
#[derive(Debug, Clone, PartialEq)]
pub struct StylizedHair {
    base_color: Rgb,
    specular: f32,
    metallic: f32,
    roughness: f32,
    azimuthal_roughness: f32,
    shift: f32,
    ior: f32,
    density: f32,
    thickness: f32,
    scatter: f32,
    backlit: f32,
    r_enabled: bool,
    tt_enabled: bool,
    trt_enabled: bool,
    dirty: bool,
}

impl StylizedHair {
    /// Slots written by [`StylizedHair::encode`]
    pub const SLOT_COUNT: usize = 4;

    /// Create the model with defaults
    pub fn new() -> Self {
        Self {
            base_color: Rgb::new(0.3, 0.15, 0.08),
            specular: 0.5,
            metallic: 0.0,
            roughness: 8.5,
            azimuthal_roughness: 0.35,
            shift: -5.2,
            ior: 1.55,
            density: 0.7,
            thickness: 0.003,
            scatter: 0.5,
            backlit: 0.5,
            r_enabled: true,
            tt_enabled: true,
            trt_enabled: true,
            dirty: true,
        }
    }

    /// Pack the parameters into the shader layout
    pub fn encode(&self) -> EncodedUniformBlock {
        let mut block = EncodedUniformBlock::zeroed();
        let c = self.base_color;
        block.set(0, [c.x, c.y, c.z, self.specular]);
        block.set(1, [deg_to_rad(self.roughness), deg_to_rad(self.shift), self.ior, self.density]);
        block.set(2, [self.metallic, self.scatter, self.backlit, self.thickness]);
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

    /// Base color
    pub fn base_color(&self) -> Rgb {
        self.base_color
    }

    /// Set base color, clamped to [0, 1]
    pub fn set_base_color(&mut self, color: Rgb) {
        self.base_color = color.map(|c| c.clamp(0.0, 1.0));
        self.dirty = true;
    }

    /// Set specular strength in [0, 1]
    pub fn set_specular(&mut self, specular: f32) {
        self.specular = specular.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Set metallic tint in [0, 1]
    pub fn set_metallic(&mut self, metallic: f32) {
        self.metallic = metallic.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Set longitudinal roughness, clamped to [0, 90] degrees
    pub fn set_roughness(&mut self, degrees: f32) {
        self.roughness = degrees.clamp(0.0, 90.0);
        self.dirty = true;
    }

    /// Set azimuthal roughness in [0, 1]
    pub fn set_azimuthal_roughness(&mut self, roughness: f32) {
        self.azimuthal_roughness = roughness.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Set cuticle tilt, clamped to [-90, 90] degrees
    pub fn set_shift(&mut self, degrees: f32) {
        self.shift = degrees.clamp(-90.0, 90.0);
        self.dirty = true;
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

    /// Set fiber thickness
    pub fn set_thickness(&mut self, thickness: f32) {
        self.thickness = thickness.max(0.0);
        self.dirty = true;
    }

    /// Set multiple-scattering strength in [0, 1]
    pub fn set_scatter(&mut self, scatter: f32) {
        self.scatter = scatter.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Set backlit transmission strength in [0, 1]
    pub fn set_backlit(&mut self, backlit: f32) {
        self.backlit = backlit.clamp(0.0, 1.0);
        self.dirty = true;
    }

    /// Enable or disable individual lobes
    pub fn set_lobes(&mut self, r: bool, tt: bool, trt: bool) {
        self.r_enabled = r;
        self.tt_enabled = tt;
        self.trt_enabled = trt;
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }
}

impl Default for StylizedHair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_encoding() {
        let block = StylizedHair::new().encode();

        assert_eq!(block.slot(0), [0.3, 0.15, 0.08, 0.5]);
        assert_eq!(block.slot(1)[2..], [1.55, 0.7]);
        assert_eq!(block.slot(2), [0.0, 0.5, 0.5, 0.003]);
        assert_eq!(block.slot(3), [0.35, 1.0, 1.0, 1.0]);
        assert_eq!(block.slot(4), [0.0; 4]);
    }

    #[test]
    fn test_setters_clamp() {
        let mut hair = StylizedHair::new();
        hair.set_metallic(4.0);
        hair.set_backlit(-1.0);
        hair.set_base_color(Rgb::new(1.5, 0.2, 0.1));
        let block = hair.encode();
        assert_eq!(block.slot(0)[0], 1.0);
        assert_eq!(block.slot(2)[0], 1.0);
        assert_eq!(block.slot(2)[2], 0.0);
    }
}
