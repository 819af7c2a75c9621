//! Logging utilities and structured logging support
//!
//! Log lines carry a bracketed subsystem tag such as `[VOXEL]`, `[SCATTER]` or `[PIPELINE]`.

pub use log::{debug, info, warn, error, trace};

/// Initialize the logging system
pub fn init() {
    env_logger::init();
}

/// Initialize logging, ignoring the error if a logger is already installed.
///
/// Used by tests, where several cases may race to install the logger.
pub fn try_init() {
    let _ = env_logger::builder().is_test(true).try_init();
}
