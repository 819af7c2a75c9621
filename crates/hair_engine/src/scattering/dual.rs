//! Dual-scattering precomputation
//!
//! Integrates the single-fiber lobes into front/back hemisphere averages and
//! evaluates the closed forms of the dual-scattering approximation (Zinke et
//! al. 2008): global back attenuation A_b, back shift Δ_b and back spread σ_b.
//! Also builds the normalized azimuthal tables (NG) and the GI volume.

use crate::foundation::math::{
    constants::{HALF_PI, PI, TAU},
    utils::{safe_asin, wrap_angle},
    Rgb, Vec3,
};

use super::fiber::{azimuthal, FiberParams, FiberPath, LOBE_R, LOBE_TRT, LOBE_TT};

/// Density factor d_b of the back-scattering spread
pub const BACK_SCATTER_DENSITY: f32 = 0.7;

/// Fiber offsets h sampled across the fiber width
pub const OFFSET_SAMPLES: usize = 32;

/// Azimuth samples used to split lobes into hemispheres
pub const AZIMUTH_SAMPLES: usize = 64;

/// Front attenuation is clamped below one so the geometric series converge
const MAX_FRONT_ATTENUATION: f32 = 0.99;

const EPSILON: f32 = 1.0e-6;

/// Center of longitudinal bin `i` of `n`, in (-pi/2, pi/2)
pub fn theta_bin(i: u32, n: u32) -> f32 {
    -HALF_PI + (i as f32 + 0.5) * PI / n as f32
}

/// Center of azimuthal bin `j` of `n`, in (-pi, pi)
pub fn phi_bin(j: u32, n: u32) -> f32 {
    -PI + (j as f32 + 0.5) * TAU / n as f32
}

/// Longitudinal bin containing `theta`
pub fn theta_to_bin(theta: f32, n: u32) -> u32 {
    let t = ((theta + HALF_PI) / PI * n as f32).floor();
    (t.max(0.0) as u32).min(n - 1)
}

/// Azimuthal bin containing `phi`
pub fn phi_to_bin(phi: f32, n: u32) -> u32 {
    let t = ((wrap_angle(phi) + PI) / TAU * n as f32).floor();
    (t.max(0.0) as u32).min(n - 1)
}

fn offsets() -> impl Iterator<Item = f32> {
    (0..OFFSET_SAMPLES).map(|i| -1.0 + (i as f32 + 0.5) * 2.0 / OFFSET_SAMPLES as f32)
}

/// Energy of each lobe scattered into the front and back hemispheres
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HemisphereEnergy {
    /// Forward (|phi| > pi/2) energy per lobe
    pub front: [Rgb; 3],
    /// Backward (|phi| < pi/2) energy per lobe
    pub back: [Rgb; 3],
}

/// Integrate the weighted lobes over fiber offset and azimuth at `theta`
pub fn lobe_energy(params: &FiberParams, theta: f32) -> HemisphereEnergy {
    let mut energy = HemisphereEnergy {
        front: [Rgb::zeros(); 3],
        back: [Rgb::zeros(); 3],
    };
    let offset_weight = 1.0 / OFFSET_SAMPLES as f32;
    let dphi = TAU / AZIMUTH_SAMPLES as f32;

    for h in offsets() {
        let path = FiberPath::trace(theta, h, params.eta, &params.sigma_a);
        let attenuation = path.attenuation();
        for p in 0..3 {
            let mut front = 0.0;
            let mut total = 0.0;
            for j in 0..AZIMUTH_SAMPLES {
                let phi = -PI + (j as f32 + 0.5) * dphi;
                let n = azimuthal(p, phi, params.azimuthal_scale, path.gamma_o, path.gamma_t) * dphi;
                total += n;
                if phi.abs() > HALF_PI {
                    front += n;
                }
            }
            if total <= EPSILON {
                continue;
            }
            let front_fraction = front / total;
            let lobe = params.lobe_weights[p].component_mul(&attenuation[p]) * offset_weight;
            energy.front[p] += lobe * front_fraction;
            energy.back[p] += lobe * (1.0 - front_fraction);
        }
    }
    energy
}

/// Hemisphere-averaged attenuation, shift and width
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageScattering {
    /// Average forward attenuation a_f
    pub a_f: Rgb,
    /// Average backward attenuation a_b
    pub a_b: Rgb,
    /// Energy-weighted forward longitudinal shift
    pub alpha_f: Rgb,
    /// Energy-weighted backward longitudinal shift
    pub alpha_b: Rgb,
    /// Energy-weighted forward longitudinal width
    pub beta_f: Rgb,
    /// Energy-weighted backward longitudinal width
    pub beta_b: Rgb,
}

fn weighted(values: [f32; 3], energy: &[Rgb; 3], total: &Rgb) -> Rgb {
    Rgb::from_fn(|c, _| {
        if total[c] <= EPSILON {
            return 0.0;
        }
        (0..3).map(|p| values[p] * energy[p][c]).sum::<f32>() / total[c]
    })
}

/// Average scattering of one fiber at longitudinal angle `theta`
pub fn average_scattering(params: &FiberParams, theta: f32) -> AverageScattering {
    let energy = lobe_energy(params, theta);
    let a_f: Rgb = energy.front.iter().sum();
    let a_b: Rgb = energy.back.iter().sum();
    let shifts = params.lobe_shifts();
    let variances = params.lobe_variances();

    AverageScattering {
        a_f,
        a_b,
        alpha_f: weighted(shifts, &energy.front, &a_f),
        alpha_b: weighted(shifts, &energy.back, &a_b),
        beta_f: weighted(variances, &energy.front, &a_f).map(f32::sqrt),
        beta_b: weighted(variances, &energy.back, &a_b).map(f32::sqrt),
    }
}

/// Global back attenuation A_b
pub fn back_attenuation(a_f: f32, a_b: f32) -> f32 {
    let a_f2 = a_f.min(MAX_FRONT_ATTENUATION).powi(2);
    let one_minus = 1.0 - a_f2;
    a_b * a_f2 / one_minus + a_b.powi(3) * a_f2 / one_minus.powi(3)
}

/// Global back shift Δ_b
pub fn back_shift(a_f: f32, a_b: f32, alpha_f: f32, alpha_b: f32) -> f32 {
    let a_f2 = a_f.min(MAX_FRONT_ATTENUATION).powi(2);
    let one_minus = 1.0 - a_f2;
    let a_b2 = a_b * a_b;
    alpha_b * (1.0 - 2.0 * a_b2 / one_minus.powi(2))
        + alpha_f * (2.0 * one_minus.powi(2) + 4.0 * a_f2 * a_b2) / one_minus.powi(3)
}

/// Global back spread σ_b
pub fn back_width(a_f: f32, a_b: f32, beta_f: f32, beta_b: f32) -> f32 {
    let a_f2 = a_f.min(MAX_FRONT_ATTENUATION).powi(2);
    let a_b3 = a_b.powi(3);
    let denom = a_b + a_b3 * (2.0 * beta_f + 3.0 * beta_b);
    if denom <= EPSILON {
        return beta_b;
    }
    let bf2 = beta_f * beta_f;
    let bb2 = beta_b * beta_b;
    (1.0 + BACK_SCATTER_DENSITY * a_f2)
        * (a_b * (2.0 * bf2 + bb2).sqrt() + a_b3 * (2.0 * bf2 + 3.0 * bb2).sqrt())
        / denom
}

/// Values stored in the six one-dimensional LUTs for one angle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DualScatteringTerms {
    /// A_f
    pub front_attenuation: Rgb,
    /// A_b
    pub back_attenuation: Rgb,
    /// Δ_f
    pub front_shift: Rgb,
    /// Δ_b
    pub back_shift: Rgb,
    /// σ_f
    pub front_beta: Rgb,
    /// σ_b
    pub back_beta: Rgb,
}

/// Evaluate every dual-scattering LUT entry at `theta`
pub fn dual_scattering(params: &FiberParams, theta: f32) -> DualScatteringTerms {
    let avg = average_scattering(params, theta);
    let a_f = avg.a_f.map(|a| a.min(MAX_FRONT_ATTENUATION));

    DualScatteringTerms {
        front_attenuation: a_f.component_mul(&params.front_tint),
        back_attenuation: Rgb::from_fn(|c, _| back_attenuation(a_f[c], avg.a_b[c]))
            .component_mul(&params.back_tint),
        front_shift: avg.alpha_f,
        back_shift: Rgb::from_fn(|c, _| back_shift(a_f[c], avg.a_b[c], avg.alpha_f[c], avg.alpha_b[c])),
        front_beta: avg.beta_f,
        back_beta: Rgb::from_fn(|c, _| back_width(a_f[c], avg.a_b[c], avg.beta_f[c], avg.beta_b[c])),
    }
}

/// Energy-normalized azimuthal distributions at (theta, phi).
///
/// Returns (NG over R and TT, NG of TRT). Each integrates to one over phi;
/// a lobe set carrying no energy falls back to the uniform 1/(2 pi).
pub fn normalized_azimuthal(params: &FiberParams, theta: f32, phi: f32) -> (Rgb, Rgb) {
    let mut ng = Rgb::zeros();
    let mut ng_energy = Rgb::zeros();
    let mut trt = Rgb::zeros();
    let mut trt_energy = Rgb::zeros();

    for h in offsets() {
        let path = FiberPath::trace(theta, h, params.eta, &params.sigma_a);
        let attenuation = path.attenuation();
        let n = |p: usize| azimuthal(p, phi, params.azimuthal_scale, path.gamma_o, path.gamma_t);

        for p in [LOBE_R, LOBE_TT] {
            let e = params.lobe_weights[p].component_mul(&attenuation[p]);
            ng += e * n(p);
            ng_energy += e;
        }
        let e = params.lobe_weights[LOBE_TRT].component_mul(&attenuation[LOBE_TRT]);
        trt += e * n(LOBE_TRT);
        trt_energy += e;
    }

    let normalize = |value: Rgb, energy: Rgb| {
        Rgb::from_fn(|c, _| {
            if energy[c] <= EPSILON {
                1.0 / TAU
            } else {
                value[c] / energy[c]
            }
        })
    };
    (normalize(ng, ng_energy), normalize(trt, trt_energy))
}

/// NG and NG_TRT tables over (theta, phi) bins.
///
/// Texel (x, y) holds theta bin x and phi bin y at index `x + y * n`.
#[derive(Debug, Clone, PartialEq)]
pub struct NgTable {
    resolution: u32,
    ng: Vec<Rgb>,
    ng_trt: Vec<Rgb>,
}

impl NgTable {
    /// Evaluate both tables for a fiber
    pub fn compute(params: &FiberParams, resolution: u32) -> Self {
        let n = resolution;
        let mut ng = Vec::with_capacity((n * n) as usize);
        let mut ng_trt = Vec::with_capacity((n * n) as usize);
        for y in 0..n {
            for x in 0..n {
                let (a, b) = normalized_azimuthal(params, theta_bin(x, n), phi_bin(y, n));
                ng.push(a);
                ng_trt.push(b);
            }
        }
        Self { resolution, ng, ng_trt }
    }

    /// Rebuild a table from RGBA texels
    pub fn from_texels(resolution: u32, ng: &[[f32; 4]], ng_trt: &[[f32; 4]]) -> Self {
        let rgb = |t: &[f32; 4]| Rgb::new(t[0], t[1], t[2]);
        Self {
            resolution,
            ng: ng.iter().map(rgb).collect(),
            ng_trt: ng_trt.iter().map(rgb).collect(),
        }
    }

    /// Bin count along each axis
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    /// NG texels
    pub fn ng(&self) -> &[Rgb] {
        &self.ng
    }

    /// NG_TRT texels
    pub fn ng_trt(&self) -> &[Rgb] {
        &self.ng_trt
    }

    /// Nearest-bin lookup of (NG, NG_TRT)
    pub fn sample(&self, theta: f32, phi: f32) -> (Rgb, Rgb) {
        let n = self.resolution;
        let index = (theta_to_bin(theta, n) + phi_to_bin(phi, n) * n) as usize;
        (self.ng[index], self.ng_trt[index])
    }

    /// Mean of (NG + NG_TRT) / 2 over every phi bin at `theta`
    pub fn phi_average(&self, theta: f32) -> Rgb {
        let n = self.resolution;
        let x = theta_to_bin(theta, n);
        let sum: Rgb = (0..n)
            .map(|y| {
                let i = (x + y * n) as usize;
                (self.ng[i] + self.ng_trt[i]) * 0.5
            })
            .sum();
        sum / n as f32
    }
}

/// GI texel for incident/outgoing longitudinal angles and relative azimuth.
///
/// Averages the NG tables over the sample directions, each perturbing the
/// azimuth and weighted by a unit-variance Gaussian in latitude. RGB holds
/// the averaged distribution, alpha the mean weight.
pub fn global_illumination(
    table: &NgTable,
    theta_i: f32,
    theta_o: f32,
    phi: f32,
    directions: &[Vec3],
) -> [f32; 4] {
    let theta_d = (theta_o - theta_i) * 0.5;
    if directions.is_empty() {
        let avg = table.phi_average(theta_d);
        return [avg.x, avg.y, avg.z, 1.0];
    }

    let theta_h = (theta_i + theta_o) * 0.5;
    let mut acc = Rgb::zeros();
    let mut weight_sum = 0.0;
    for d in directions {
        let latitude = safe_asin(d.z);
        let azimuth = d.y.atan2(d.x);
        let w = (-(theta_h - latitude).powi(2) * 0.5).exp();
        let (ng, ng_trt) = table.sample(theta_d, phi + azimuth);
        acc += (ng + ng_trt) * (0.5 * w);
        weight_sum += w;
    }
    let value = if weight_sum > EPSILON { acc / weight_sum } else { Rgb::zeros() };
    [value.x, value.y, value.z, weight_sum / directions.len() as f32]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::{HairMaterialKind, MarschnerHair};
    use crate::sampling::DirectionSet;
    use approx::assert_relative_eq;

    fn default_params() -> FiberParams {
        FiberParams::decode(HairMaterialKind::Marschner, &MarschnerHair::new().encode())
    }

    #[test]
    fn test_bins_round_trip() {
        for i in 0..16 {
            assert_eq!(theta_to_bin(theta_bin(i, 16), 16), i);
            assert_eq!(phi_to_bin(phi_bin(i, 16), 16), i);
        }
        assert_eq!(theta_to_bin(10.0, 16), 15);
        assert_eq!(theta_to_bin(-10.0, 16), 0);
    }

    #[test]
    fn test_back_attenuation_closed_form() {
        assert_relative_eq!(back_attenuation(0.5, 0.2), 0.071_407_4, epsilon = 1e-5);
        assert_eq!(back_attenuation(0.5, 0.0), 0.0);
        assert!(back_attenuation(1.0, 0.5).is_finite());
    }

    #[test]
    fn test_back_shift_without_lobe_shift() {
        assert_relative_eq!(back_shift(0.5, 0.2, 0.0, 0.0), 0.0);
        assert_relative_eq!(back_shift(0.0, 0.0, 0.1, -0.1), 0.1 * 2.0 - 0.1, epsilon = 1e-6);
        assert_eq!(back_width(0.3, 0.0, 0.2, 0.4), 0.4);
    }

    #[test]
    fn test_average_attenuation_is_bounded() {
        let params = default_params();
        for i in 0..8 {
            let avg = average_scattering(&params, theta_bin(i, 8));
            let total = avg.a_f + avg.a_b;
            assert!(total.max() <= 1.0 + 1e-4);
            assert!(avg.a_f.min() >= 0.0 && avg.a_b.min() > 0.0);
        }
    }

    #[test]
    fn test_dual_scattering_terms_are_finite() {
        let params = default_params();
        let terms = dual_scattering(&params, 0.3);
        for value in [
            terms.front_attenuation,
            terms.back_attenuation,
            terms.front_shift,
            terms.back_shift,
            terms.front_beta,
            terms.back_beta,
        ] {
            assert!(value.iter().all(|v| v.is_finite()));
        }
        assert!(terms.back_attenuation.min() >= 0.0);
        assert!(terms.back_beta.min() > 0.0);
    }

    #[test]
    fn test_disabled_lobes_carry_no_energy() {
        let mut hair = MarschnerHair::new();
        hair.set_lobes(false, false, false);
        let params = FiberParams::decode(HairMaterialKind::Marschner, &hair.encode());
        let avg = average_scattering(&params, 0.0);
        assert_eq!(avg.a_f, Rgb::zeros());
        assert_eq!(avg.a_b, Rgb::zeros());

        let (ng, trt) = normalized_azimuthal(&params, 0.0, 0.0);
        assert_relative_eq!(ng, Rgb::repeat(1.0 / TAU));
        assert_relative_eq!(trt, Rgb::repeat(1.0 / TAU));
    }

    #[test]
    fn test_ng_is_normalized_over_phi() {
        let params = default_params();
        let n = 64;
        let table = NgTable::compute(&params, n);
        let theta = theta_bin(n / 2, n);
        let dphi = TAU / n as f32;
        let integral: Rgb = (0..n).map(|j| table.sample(theta, phi_bin(j, n)).0 * dphi).sum();
        for c in 0..3 {
            assert_relative_eq!(integral[c], 1.0, epsilon = 0.05);
        }
    }

    #[test]
    fn test_gi_without_directions_uses_phi_average() {
        let table = NgTable::compute(&default_params(), 8);
        let texel = global_illumination(&table, 0.2, 0.2, 1.0, &[]);
        let avg = table.phi_average(0.0);
        assert_relative_eq!(texel[0], avg.x);
        assert_eq!(texel[3], 1.0);

        let dirs = DirectionSet::generate(16);
        let texel = global_illumination(&table, 0.2, -0.4, 1.0, dirs.directions());
        assert!(texel.iter().all(|v| v.is_finite() && *v >= 0.0));
        assert!(texel[3] > 0.0 && texel[3] <= 1.0);
    }
}
