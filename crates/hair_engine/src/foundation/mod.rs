//! Foundation module - Core utilities and types
//!
//! - Math types, bounds and angle helpers
//! - Logging utilities

pub mod math;
pub mod logging;
