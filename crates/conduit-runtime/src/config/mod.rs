//! Configuration for the Conduit runtime.
//!
//! Configuration is layered with figment: built-in defaults, a TOML file,
//! `CONDUIT_*` environment variables and programmatic overrides, in
//! increasing priority.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile};
pub use schema::{
    EndpointSpans, LogFormat, LogLevel, LogOutput, LoggingConfig, RuntimeConfig,
};
pub use validation::validate_config;
