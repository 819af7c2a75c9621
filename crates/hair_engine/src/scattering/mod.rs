//! Fiber scattering mathematics
//!
//! CPU reference of the terms evaluated by the precomputation kernels:
//! - [`fiber`]: attenuation, azimuthal and longitudinal terms of one fiber
//! - [`dual`]: hemisphere averages, dual-scattering closed forms, NG and GI tables

pub mod dual;
pub mod fiber;

pub use dual::{dual_scattering, global_illumination, DualScatteringTerms, NgTable};
pub use fiber::{sigma_a_from_concentration, sigma_a_from_reflectance, FiberParams};
