//! Conduit Runtime - configuration, logging and endpoint hosting.
//!
//! This crate provides:
//! - Layered configuration loading ([`ConfigLoader`]): defaults, `conduit.toml`,
//!   `CONDUIT_*` environment variables, then programmatic overrides
//! - Logging initialisation ([`LoggingBuilder`], [`logging::init_from_config`])
//! - An endpoint [`Host`] that compiles handlers once, with the configured
//!   binding options, and invokes them by name
//!
//! ```ignore
//! use conduit_runtime::{Host, logging};
//!
//! let host = Host::load()?;
//! logging::init_from_config(&host.config().logging);
//!
//! host.register("show_todo", show_todo_endpoint())?;
//! host.invoke("show_todo", &ctx).await?;
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod logging;

pub use config::{ConfigError, ConfigLoader, ConfigResult, LoggingConfig, RuntimeConfig};
pub use error::{RuntimeError, RuntimeResult};
pub use host::Host;
pub use logging::LoggingBuilder;

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Prelude module for convenient logging imports.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
