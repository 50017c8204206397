//! # Conduit
//!
//! Compiles typed request handlers into request pipelines.
//!
//! ## Overview
//!
//! A handler is an ordinary function. Conduit looks at each parameter once,
//! decides where its value comes from (route, query string, headers, JSON
//! body, form, request services, a type's own `bind_async` capability or the
//! request context itself) and produces a [`RequestDelegate`](framework::RequestDelegate)
//! that binds, invokes and writes the response for every request.
//!
//! ```text
//! HandlerDescriptor ──▶ PipelineCompiler ──▶ RequestDelegate ──▶ HttpContext
//!                        │ BindingCapabilityResolver
//!                        │ ParameterSourceClassifier
//!                        │ ResultAdapter
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use conduit::prelude::*;
//!
//! #[endpoint]
//! async fn show_todo(#[route] id: i32, verbose: Option<bool>) -> String {
//!     format!("todo {id} (verbose: {verbose:?})")
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let host = Host::load()?;
//!     conduit::runtime::logging::init_from_config(&host.config().logging);
//!     host.register("show_todo", show_todo_endpoint())?;
//!
//!     let ctx = HttpContext::new(HttpRequest::builder().route_value("id", "7").build());
//!     host.invoke("show_todo", &ctx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `macros`: Enable the `#[endpoint]` attribute (default)
//! - `toml-config`: Read `conduit.toml` configuration files (default)
//! - `json-log`: JSON log output

pub use conduit_core as core;
pub use conduit_framework as framework;
pub use conduit_runtime as runtime;

#[cfg(feature = "macros")]
pub use conduit_macros::endpoint;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use conduit::prelude::*;
/// ```
pub mod prelude {
    // Hosting
    pub use conduit_runtime::{ConfigLoader, Host, RuntimeConfig};

    // Declaring and compiling handlers
    #[cfg(feature = "macros")]
    pub use conduit_macros::endpoint;
    pub use conduit_framework::{
        CompileOptions, HandlerDescriptor, ParamSpec, PipelineCompiler, RequestDelegate,
        handler_fn, sync_handler_fn,
    };

    // Replies
    pub use conduit_framework::{Deferred, HttpResult, Json, Results, Sequence};

    // Request model
    pub use conduit_core::{
        BadRequest, Bindable, BindingOptions, FormCollection, FormFile, FormFileCollection,
        HttpContext, HttpRequest, HttpResponse, PipelineError, ServiceCollection, TypeModel,
    };
}
