//! Single-fiber scattering terms
//!
//! Attenuation, azimuthal and longitudinal terms of the R, TT and TRT lobes of
//! a dielectric cylinder with an absorbing interior, following the
//! d'Eon/Chiang formulation of the Marschner model.

use crate::foundation::math::{
    constants::PI,
    utils::{safe_sqrt, wrap_angle},
    Rgb,
};
use crate::material::{EncodedUniformBlock, HairMaterialKind};

/// Absorption of one unit of eumelanin
pub const EUMELANIN_SIGMA_A: [f32; 3] = [0.419, 0.697, 1.37];

/// Absorption of one unit of pheomelanin
pub const PHEOMELANIN_SIGMA_A: [f32; 3] = [0.187, 0.4, 1.05];

/// Lobe index of primary reflection
pub const LOBE_R: usize = 0;
/// Lobe index of transmission
pub const LOBE_TT: usize = 1;
/// Lobe index of secondary reflection
pub const LOBE_TRT: usize = 2;

/// Smallest logistic scale used by the azimuthal term
const MIN_LOGISTIC_SCALE: f32 = 1.0e-3;

/// Absorption coefficient of a fiber with the given melanin concentrations
pub fn sigma_a_from_concentration(eumelanin: f32, pheomelanin: f32) -> Rgb {
    Rgb::from_fn(|i, _| eumelanin * EUMELANIN_SIGMA_A[i] + pheomelanin * PHEOMELANIN_SIGMA_A[i])
}

/// Absorption that produces roughly the requested multiple-scattered color
pub fn sigma_a_from_reflectance(color: Rgb, beta_n: f32) -> Rgb {
    let b = beta_n;
    let denom = 5.969 - 0.215 * b + 2.532 * b.powi(2) - 10.73 * b.powi(3) + 5.574 * b.powi(4)
        + 0.245 * b.powi(5);
    color.map(|c| {
        let f = c.clamp(1.0e-4, 1.0).ln() / denom;
        f * f
    })
}

/// Unpolarized Fresnel reflectance of a dielectric interface entered from air
pub fn fresnel_dielectric(cos_i: f32, eta: f32) -> f32 {
    let (mut eta_i, mut eta_t) = (1.0, eta);
    let mut cos_i = cos_i.clamp(-1.0, 1.0);
    if cos_i <= 0.0 {
        std::mem::swap(&mut eta_i, &mut eta_t);
        cos_i = cos_i.abs();
    }
    let sin_i = safe_sqrt(1.0 - cos_i * cos_i);
    let sin_t = eta_i / eta_t * sin_i;
    if sin_t >= 1.0 {
        return 1.0;
    }
    let cos_t = safe_sqrt(1.0 - sin_t * sin_t);
    let r_parl = (eta_t * cos_i - eta_i * cos_t) / (eta_t * cos_i + eta_i * cos_t);
    let r_perp = (eta_i * cos_i - eta_t * cos_t) / (eta_i * cos_i + eta_t * cos_t);
    (r_parl * r_parl + r_perp * r_perp) * 0.5
}

/// Longitudinal variance of the R lobe for a perceptual roughness in [0, 1]
pub fn longitudinal_variance(beta_m: f32) -> f32 {
    let f = 0.726 * beta_m + 0.812 * beta_m.powi(2) + 3.7 * beta_m.powi(20);
    f * f
}

/// Logistic scale of the azimuthal term for a roughness in [0, 1]
pub fn azimuthal_scale(beta_n: f32) -> f32 {
    let s = (PI / 8.0).sqrt() * (0.265 * beta_n + 1.194 * beta_n.powi(2) + 5.372 * beta_n.powi(22));
    s.max(MIN_LOGISTIC_SCALE)
}

/// Geometry of a ray entering the fiber at offset `h`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiberPath {
    /// Azimuthal angle of the entry point
    pub gamma_o: f32,
    /// Refracted azimuthal angle inside the fiber
    pub gamma_t: f32,
    /// Transmittance of one internal path segment
    pub transmittance: Rgb,
    /// Fresnel reflectance at entry
    pub fresnel: f32,
}

impl FiberPath {
    /// Trace the path for a longitudinal angle `theta` and offset `h` in (-1, 1)
    pub fn trace(theta: f32, h: f32, eta: f32, sigma_a: &Rgb) -> Self {
        let sin_theta_o = theta.sin();
        let cos_theta_o = theta.cos().max(1.0e-4);

        let sin_theta_t = sin_theta_o / eta;
        let cos_theta_t = safe_sqrt(1.0 - sin_theta_t * sin_theta_t).max(1.0e-4);

        let eta_p = safe_sqrt(eta * eta - sin_theta_o * sin_theta_o) / cos_theta_o;
        let sin_gamma_t = (h / eta_p).clamp(-1.0, 1.0);
        let cos_gamma_t = safe_sqrt(1.0 - sin_gamma_t * sin_gamma_t);

        let cos_gamma_o = safe_sqrt(1.0 - h * h);
        let fresnel = fresnel_dielectric(cos_theta_o * cos_gamma_o, eta);
        let path_length = 2.0 * cos_gamma_t / cos_theta_t;

        Self {
            gamma_o: h.clamp(-1.0, 1.0).asin(),
            gamma_t: sin_gamma_t.asin(),
            transmittance: sigma_a.map(|s| (-s * path_length).exp()),
            fresnel,
        }
    }

    /// Attenuation of the R, TT and TRT lobes
    pub fn attenuation(&self) -> [Rgb; 3] {
        let f = self.fresnel;
        let t = self.transmittance;
        let r = Rgb::repeat(f);
        let tt = t * ((1.0 - f) * (1.0 - f));
        let trt = tt.component_mul(&t) * f;
        [r, tt, trt]
    }
}

/// Exit azimuth of lobe `p`
pub fn lobe_azimuth(p: usize, gamma_o: f32, gamma_t: f32) -> f32 {
    let p = p as f32;
    2.0 * p * gamma_t - 2.0 * gamma_o + p * PI
}

/// Logistic distribution density
pub fn logistic(x: f32, s: f32) -> f32 {
    let e = (-x.abs() / s).exp();
    e / (s * (1.0 + e) * (1.0 + e))
}

/// Logistic cumulative distribution
pub fn logistic_cdf(x: f32, s: f32) -> f32 {
    1.0 / (1.0 + (-x / s).exp())
}

/// Logistic density renormalized over [a, b]
pub fn trimmed_logistic(x: f32, s: f32, a: f32, b: f32) -> f32 {
    logistic(x, s) / (logistic_cdf(b, s) - logistic_cdf(a, s))
}

/// Azimuthal scattering function N_p
pub fn azimuthal(p: usize, phi: f32, s: f32, gamma_o: f32, gamma_t: f32) -> f32 {
    let dphi = wrap_angle(phi - lobe_azimuth(p, gamma_o, gamma_t));
    trimmed_logistic(dphi, s, -PI, PI)
}

/// Normalized Gaussian used for longitudinal lobes
pub fn gaussian(x: f32, variance: f32) -> f32 {
    let v = variance.max(1.0e-6);
    (-x * x / (2.0 * v)).exp() / (2.0 * PI * v).sqrt()
}

/// Fiber optical parameters decoded from a material uniform block.
///
/// Shared by every model so the precomputation kernels stay model-agnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct FiberParams {
    /// Absorption coefficient per unit diameter
    pub sigma_a: Rgb,
    /// Index of refraction
    pub eta: f32,
    /// Longitudinal variance of the R lobe
    pub variance: f32,
    /// Logistic scale of the azimuthal term
    pub azimuthal_scale: f32,
    /// Cuticle tilt in radians
    pub alpha: f32,
    /// Fiber packing density
    pub density: f32,
    /// Fiber thickness
    pub thickness: f32,
    /// Per-lobe weight including enable flags and tints
    pub lobe_weights: [Rgb; 3],
    /// Tint applied to forward multiple scattering
    pub front_tint: Rgb,
    /// Tint applied to backward multiple scattering
    pub back_tint: Rgb,
}

impl FiberParams {
    /// Decode the block layout of `kind`
    pub fn decode(kind: HairMaterialKind, block: &EncodedUniformBlock) -> Self {
        let s = |i: usize| block.slot(i);
        let rgb = |v: [f32; 4]| Rgb::new(v[0], v[1], v[2]);
        let ones = Rgb::repeat(1.0);

        match kind {
            HairMaterialKind::Marschner => {
                let (s0, s1, s2, s3) = (s(0), s(1), s(2), s(3));
                Self {
                    sigma_a: rgb(s0),
                    eta: s1[2],
                    variance: s1[0] * s1[0],
                    azimuthal_scale: azimuthal_scale(s3[0]),
                    alpha: s1[1],
                    density: s1[3],
                    thickness: s0[3],
                    lobe_weights: [
                        Rgb::repeat(s2[0] * s3[1]),
                        Rgb::repeat(s2[1] * s3[2]),
                        Rgb::repeat(s2[2] * s3[3]),
                    ],
                    front_tint: ones,
                    back_tint: ones,
                }
            }
            HairMaterialKind::Disney => {
                let (s5, s6, s7) = (s(5), s(6), s(7));
                let beta_n = s6[0];
                let global = s7[3];
                Self {
                    sigma_a: sigma_a_from_reflectance(rgb(s(1)), beta_n),
                    eta: s5[2],
                    variance: longitudinal_variance(s5[0]),
                    azimuthal_scale: azimuthal_scale(beta_n),
                    alpha: s5[1],
                    density: s5[3],
                    thickness: s6[2],
                    lobe_weights: [
                        rgb(s(0)) * (s(0)[3] * s7[0] * global),
                        Rgb::repeat(s(1)[3] * s7[1] * global),
                        Rgb::repeat(s(2)[3] * s7[2] * global),
                    ],
                    front_tint: rgb(s(4)) * s(4)[3],
                    back_tint: rgb(s(3)) * s(3)[3],
                }
            }
            HairMaterialKind::Stylized => {
                let (s0, s1, s2, s3) = (s(0), s(1), s(2), s(3));
                let base = rgb(s0);
                let beta_n = s3[0];
                let metallic = s2[0];
                let highlight = ones.lerp(&base, metallic) * (2.0 * s0[3]);
                Self {
                    sigma_a: sigma_a_from_reflectance(base, beta_n),
                    eta: s1[2],
                    variance: s1[0] * s1[0],
                    azimuthal_scale: azimuthal_scale(beta_n),
                    alpha: s1[1],
                    density: s1[3],
                    thickness: s2[3],
                    lobe_weights: [
                        highlight * s3[1],
                        Rgb::repeat(2.0 * s2[2] * s3[2]),
                        Rgb::repeat(s3[3]),
                    ],
                    front_tint: ones,
                    back_tint: Rgb::repeat(2.0 * s2[1]),
                }
            }
        }
    }

    /// Longitudinal shift of each lobe
    pub fn lobe_shifts(&self) -> [f32; 3] {
        [self.alpha, -self.alpha * 0.5, -self.alpha * 1.5]
    }

    /// Longitudinal variance of each lobe
    pub fn lobe_variances(&self) -> [f32; 3] {
        [self.variance, self.variance * 0.25, self.variance * 4.0]
    }

    /// Longitudinal standard deviation of each lobe
    pub fn lobe_widths(&self) -> [f32; 3] {
        self.lobe_variances().map(f32::sqrt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{DisneyHair, MarschnerHair, StylizedHair};
    use approx::assert_relative_eq;

    #[test]
    fn test_melanin_absorption() {
        let sigma = sigma_a_from_concentration(1.0, 0.0);
        assert_relative_eq!(sigma, Rgb::new(0.419, 0.697, 1.37));
        let mixed = sigma_a_from_concentration(1.3, 0.2);
        assert_relative_eq!(mixed.x, 1.3 * 0.419 + 0.2 * 0.187, epsilon = 1e-6);
    }

    #[test]
    fn test_reflectance_inversion_orders_channels() {
        let sigma = sigma_a_from_reflectance(Rgb::new(0.9, 0.5, 0.1), 0.3);
        assert!(sigma.x < sigma.y && sigma.y < sigma.z);
        assert_relative_eq!(sigma_a_from_reflectance(Rgb::repeat(1.0), 0.3), Rgb::zeros());
    }

    #[test]
    fn test_fresnel_limits() {
        let normal = fresnel_dielectric(1.0, 1.5);
        assert_relative_eq!(normal, 0.04, epsilon = 1e-4);
        assert_relative_eq!(fresnel_dielectric(0.0, 1.5), 1.0, epsilon = 1e-4);
        assert!(fresnel_dielectric(0.5, 1.55) > normal);
    }

    #[test]
    fn test_trimmed_logistic_integrates_to_one() {
        let s = azimuthal_scale(0.35);
        let steps = 2000;
        let dx = 2.0 * PI / steps as f32;
        let total: f32 = (0..steps)
            .map(|i| trimmed_logistic(-PI + (i as f32 + 0.5) * dx, s, -PI, PI) * dx)
            .sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_attenuation_energy_bound() {
        let sigma = sigma_a_from_concentration(1.3, 0.2);
        for &h in &[-0.9, -0.3, 0.0, 0.5, 0.95] {
            let path = FiberPath::trace(0.2, h, 1.55, &sigma);
            let [r, tt, trt] = path.attenuation();
            let total = r + tt + trt;
            assert!(total.max() <= 1.0 + 1e-5);
            assert!(r.min() >= 0.0 && tt.min() >= 0.0 && trt.min() >= 0.0);
        }
    }

    #[test]
    fn test_transparent_fiber_transmits() {
        let path = FiberPath::trace(0.0, 0.0, 1.55, &Rgb::zeros());
        assert_relative_eq!(path.transmittance, Rgb::repeat(1.0));
        assert_relative_eq!(path.gamma_o, 0.0);
    }

    #[test]
    fn test_decode_marschner() {
        let mut hair = MarschnerHair::new();
        hair.set_lobes(true, false, true);
        let params = FiberParams::decode(HairMaterialKind::Marschner, &hair.encode());

        assert_relative_eq!(params.sigma_a, hair.absorption());
        assert_relative_eq!(params.eta, 1.55);
        assert_relative_eq!(params.density, 0.7);
        assert_relative_eq!(params.variance, 8.5f32.to_radians().powi(2), epsilon = 1e-6);
        assert_relative_eq!(params.alpha, -5.2f32.to_radians(), epsilon = 1e-6);
        assert_eq!(params.lobe_weights[LOBE_TT], Rgb::zeros());
        assert_eq!(params.lobe_weights[LOBE_TRT], Rgb::repeat(1.0));
    }

    #[test]
    fn test_decode_other_models() {
        let disney = FiberParams::decode(HairMaterialKind::Disney, &DisneyHair::new().encode());
        assert_relative_eq!(disney.density, 0.7);
        assert_relative_eq!(disney.thickness, 0.003);
        assert!(disney.sigma_a.min() > 0.0);
        assert_relative_eq!(disney.back_tint, Rgb::new(0.6, 0.3, 0.2));

        let stylized = FiberParams::decode(HairMaterialKind::Stylized, &StylizedHair::new().encode());
        assert_relative_eq!(stylized.density, 0.7);
        assert_relative_eq!(stylized.lobe_weights[LOBE_R], Rgb::repeat(1.0));
        assert_relative_eq!(stylized.back_tint, Rgb::repeat(1.0));
    }

    #[test]
    fn test_lobe_shifts_and_widths() {
        let params = FiberParams::decode(HairMaterialKind::Marschner, &MarschnerHair::new().encode());
        let shifts = params.lobe_shifts();
        assert_relative_eq!(shifts[LOBE_TT], -0.5 * shifts[LOBE_R]);
        let widths = params.lobe_widths();
        assert_relative_eq!(widths[LOBE_TRT], 4.0 * widths[LOBE_TT], epsilon = 1e-6);
    }
}
