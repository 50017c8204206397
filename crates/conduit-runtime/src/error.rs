//! Runtime error types.

use conduit_core::{CompileError, PipelineError};
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An endpoint's handler was rejected at registration.
    #[error("Endpoint '{endpoint}' failed to compile: {source}")]
    Compile {
        endpoint: String,
        #[source]
        source: CompileError,
    },

    /// An endpoint with this name is already registered.
    #[error("Endpoint already exists: {0}")]
    EndpointExists(String),

    /// No endpoint with this name is registered.
    #[error("Endpoint not found: {0}")]
    EndpointNotFound(String),

    /// The invocation itself failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl RuntimeError {
    /// Returns the pipeline error, if the invocation failed.
    pub fn as_pipeline(&self) -> Option<&PipelineError> {
        match self {
            Self::Pipeline(e) => Some(e),
            _ => None,
        }
    }
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
