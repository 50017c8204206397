//! Endpoint hosting.
//!
//! A [`Host`] compiles each endpoint once, when it is registered, with the
//! binding options from the loaded configuration. Invocations replay the
//! compiled pipeline by name; the host does no URL matching of its own.
//!
//! ```rust,ignore
//! let host = Host::load()?;
//! host.register("get_todo", handler_fn(get_todo).with_params([ParamSpec::new("id")]))?;
//!
//! host.invoke("get_todo", &ctx).await?;
//! ```

use std::collections::HashMap;

use conduit_core::HttpContext;
use conduit_framework::{CompileOptions, HandlerDescriptor, PipelineCompiler, RequestDelegate};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::{ConfigLoader, RuntimeConfig};
use crate::error::{RuntimeError, RuntimeResult};

/// Compiled endpoints keyed by name.
pub struct Host {
    config: RuntimeConfig,
    compiler: PipelineCompiler,
    endpoints: RwLock<HashMap<String, RequestDelegate>>,
}

impl Host {
    /// Creates a host with default compile options and the configured
    /// binding options and route names.
    pub fn new(config: RuntimeConfig) -> Self {
        Self::with_options(config, CompileOptions::new())
    }

    /// Creates a host from explicit compile options.
    ///
    /// The configuration's binding options replace `options.binding`; its
    /// route names are used only when `options` has none.
    pub fn with_options(config: RuntimeConfig, mut options: CompileOptions) -> Self {
        options.binding = config.binding;
        if options.route_parameter_names.is_none() {
            options
                .route_parameter_names
                .clone_from(&config.route_parameters);
        }
        Self {
            config,
            compiler: PipelineCompiler::new(options),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    /// Loads configuration from the default locations and creates a host.
    pub fn load() -> RuntimeResult<Self> {
        Ok(Self::new(ConfigLoader::new().load()?))
    }

    /// The configuration this host was created with.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// The compile options endpoints are compiled with.
    pub fn options(&self) -> &CompileOptions {
        self.compiler.options()
    }

    /// Compiles `handler` and registers it under `name`.
    ///
    /// Handler-shape errors surface here, never at invocation.
    pub fn register(
        &self,
        name: impl Into<String>,
        handler: HandlerDescriptor,
    ) -> RuntimeResult<RequestDelegate> {
        let name = name.into();
        if self.endpoints.read().contains_key(&name) {
            return Err(RuntimeError::EndpointExists(name));
        }

        let delegate = self
            .compiler
            .compile(handler.with_name(name.clone()))
            .map_err(|source| RuntimeError::Compile {
                endpoint: name.clone(),
                source,
            })?;

        let mut endpoints = self.endpoints.write();
        if endpoints.contains_key(&name) {
            return Err(RuntimeError::EndpointExists(name));
        }
        endpoints.insert(name.clone(), delegate.clone());
        info!(endpoint = %name, parameters = delegate.parameters().len(), "Registered endpoint");

        Ok(delegate)
    }

    /// Removes an endpoint, returning its delegate.
    pub fn unregister(&self, name: &str) -> RuntimeResult<RequestDelegate> {
        let removed = self.endpoints.write().remove(name);
        match removed {
            Some(delegate) => {
                debug!(endpoint = %name, "Unregistered endpoint");
                Ok(delegate)
            }
            None => Err(RuntimeError::EndpointNotFound(name.to_string())),
        }
    }

    /// Gets a compiled endpoint by name.
    pub fn get(&self, name: &str) -> Option<RequestDelegate> {
        self.endpoints.read().get(name).cloned()
    }

    /// Returns all endpoint names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.endpoints.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.endpoints.read().len()
    }

    /// Returns `true` if no endpoint is registered.
    pub fn is_empty(&self) -> bool {
        self.endpoints.read().is_empty()
    }

    /// Runs the named endpoint against `ctx`.
    pub async fn invoke(&self, name: &str, ctx: &HttpContext) -> RuntimeResult<()> {
        let delegate = self
            .get(name)
            .ok_or_else(|| RuntimeError::EndpointNotFound(name.to_string()))?;
        delegate.invoke(ctx).await?;
        Ok(())
    }
}

impl Default for Host {
    fn default() -> Self {
        Self::new(RuntimeConfig::default())
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("endpoints", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use conduit_core::{Bindable, CompileError, HttpRequest, TypeModel};
    use conduit_framework::{ParamSpec, handler_fn};
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Todo {
        #[allow(dead_code)]
        title: String,
    }

    impl Bindable for Todo {
        fn type_model() -> TypeModel {
            TypeModel::object::<Todo>().json().build()
        }
    }

    async fn show(id: i32) -> String {
        format!("todo {id}")
    }

    async fn two_bodies(_a: Todo, _b: Todo) {}

    fn routed() -> RuntimeConfig {
        RuntimeConfig {
            route_parameters: Some(vec!["id".into()]),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_and_invoke() {
        let host = Host::new(routed());
        host.register("show", handler_fn(show).with_params([ParamSpec::new("id")]))
            .unwrap();

        let ctx = HttpContext::new(HttpRequest::builder().route_value("id", "7").build());
        host.invoke("show", &ctx).await.unwrap();
        assert_eq!(ctx.response().body_string(), "todo 7");
        assert_eq!(host.get("show").unwrap().name(), "show");
    }

    #[test]
    fn test_compile_errors_surface_at_registration() {
        let host = Host::default();
        let err = host
            .register(
                "bad",
                handler_fn(two_bodies)
                    .with_params([ParamSpec::new("a"), ParamSpec::new("b")]),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Compile {
                source: CompileError::MultipleBodyParameters { .. },
                ..
            }
        ));
        assert!(host.is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_names() {
        let host = Host::new(routed());
        let endpoint = || handler_fn(show).with_params([ParamSpec::new("id")]);
        host.register("show", endpoint()).unwrap();
        assert!(matches!(
            host.register("show", endpoint()),
            Err(RuntimeError::EndpointExists(name)) if name == "show"
        ));
        assert!(matches!(
            host.unregister("missing"),
            Err(RuntimeError::EndpointNotFound(_))
        ));
        host.unregister("show").unwrap();
        assert_eq!(host.names(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_configured_throw_mode() {
        let mut config = routed();
        config.binding.throw_on_bad_request = true;
        let host = Host::new(config);
        host.register("show", handler_fn(show).with_params([ParamSpec::new("id")]))
            .unwrap();

        let ctx = HttpContext::new(HttpRequest::builder().route_value("id", "seven").build());
        let err = host.invoke("show", &ctx).await.unwrap_err();
        let bad_request = err.as_pipeline().and_then(|e| e.as_bad_request()).unwrap();
        assert_eq!(bad_request.status, 400);
    }

    #[tokio::test]
    async fn test_unknown_endpoint() {
        let host = Host::default();
        let ctx = HttpContext::new(HttpRequest::default());
        assert!(matches!(
            host.invoke("nothing", &ctx).await,
            Err(RuntimeError::EndpointNotFound(_))
        ));
    }
}
