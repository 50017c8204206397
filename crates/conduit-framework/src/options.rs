//! Compile-time options.

use std::fmt;
use std::sync::Arc;

use conduit_core::BindingOptions;
use conduit_core::http::{FormReader, ServiceProvider, UrlEncodedFormReader};

use crate::binding::CapabilityCache;

/// Everything the compiler consults besides the handler itself.
#[derive(Clone)]
pub struct CompileOptions {
    /// Binding behaviour toggles.
    pub binding: BindingOptions,
    /// Route value names known to the router. `None` when no router is involved.
    pub route_parameter_names: Option<Vec<String>>,
    /// Services consulted while classifying parameters.
    pub services: Option<Arc<dyn ServiceProvider>>,
    /// Reads form bodies.
    pub form_reader: Arc<dyn FormReader>,
    /// Capability resolution cache.
    pub cache: Arc<CapabilityCache>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            binding: BindingOptions::default(),
            route_parameter_names: None,
            services: None,
            form_reader: Arc::new(UrlEncodedFormReader),
            cache: CapabilityCache::shared(),
        }
    }
}

impl CompileOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the binding options.
    pub fn binding(mut self, binding: BindingOptions) -> Self {
        self.binding = binding;
        self
    }

    /// Sets the route value names known to the router.
    pub fn route_parameters<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route_parameter_names = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the services consulted during classification.
    pub fn services(mut self, services: Arc<dyn ServiceProvider>) -> Self {
        self.services = Some(services);
        self
    }

    /// Replaces the form reader.
    pub fn form_reader(mut self, reader: Arc<dyn FormReader>) -> Self {
        self.form_reader = reader;
        self
    }

    /// Uses a private capability cache.
    pub fn cache(mut self, cache: Arc<CapabilityCache>) -> Self {
        self.cache = cache;
        self
    }
}

impl fmt::Debug for CompileOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileOptions")
            .field("binding", &self.binding)
            .field("route_parameter_names", &self.route_parameter_names)
            .field("services", &self.services.is_some())
            .field("cache", &self.cache.len())
            .finish_non_exhaustive()
    }
}
