//! Error types of the hair pipeline

use ash::vk;

use crate::config::ConfigError;
use crate::render::state::HazardError;

/// Errors raised while configuring, building or recording the hair pipeline
#[derive(thiserror::Error, Debug)]
pub enum HairError {
    /// Configuration values are out of range
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// What is wrong with the configuration
        reason: String,
    },

    /// More objects were submitted than there are uniform slots
    #[error("Insufficient object slots: requested {requested}, available {available}")]
    InsufficientSlots {
        /// Object count of the frame
        requested: usize,
        /// Configured slot count
        available: usize,
    },

    /// A stage was built before its inputs existed
    #[error("Missing input: {name}")]
    MissingInput {
        /// Name of the absent input
        name: String,
    },

    /// A resource is still referenced by a frame in flight
    #[error("Resource in use: {reason}")]
    ResourceInUse {
        /// Which resource and why
        reason: String,
    },

    /// Execution was requested before `build`
    #[error("Pipeline has not been built")]
    NotBuilt,

    /// A transition or access violated the resource state machine
    #[error("Resource hazard: {0}")]
    Hazard(#[from] HazardError),

    /// A handle does not name a live backend object
    #[error("Unknown {kind} handle")]
    UnknownHandle {
        /// Object kind of the handle
        kind: &'static str,
    },

    /// Invalid operation attempted on a backend object
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Shader could not be loaded
    #[error("Shader error for {path}: {reason}")]
    Shader {
        /// Path of the SPIR-V file
        path: String,
        /// Load failure
        reason: String,
    },

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HairError {
    /// Shorthand for [`HairError::InvalidOperation`]
    pub fn invalid_operation(reason: impl Into<String>) -> Self {
        Self::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Shorthand for [`HairError::MissingInput`]
    pub fn missing_input(name: impl Into<String>) -> Self {
        Self::MissingInput { name: name.into() }
    }
}

/// Result type for hair pipeline operations
pub type HairResult<T> = Result<T, HairError>;
