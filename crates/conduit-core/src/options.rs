//! Binding behaviour switches.

use serde::{Deserialize, Serialize};

/// Options that change how parameters are resolved and how failures surface.
///
/// These are plain data so they can be loaded from configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingOptions {
    /// Raise a [`BadRequest`](crate::BadRequest) on the first binding failure
    /// instead of logging every failure and answering 400.
    pub throw_on_bad_request: bool,

    /// Parse enumerations through the table-driven non-generic parser.
    pub prefer_non_generic_enum_parse: bool,

    /// Treat shape-invalid `try_parse` / `bind_async` methods as absent
    /// instead of rejecting the handler.
    pub tolerate_invalid_methods: bool,
}

impl BindingOptions {
    /// Creates the default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets [`throw_on_bad_request`](Self::throw_on_bad_request).
    pub fn throw_on_bad_request(mut self, enabled: bool) -> Self {
        self.throw_on_bad_request = enabled;
        self
    }

    /// Sets [`prefer_non_generic_enum_parse`](Self::prefer_non_generic_enum_parse).
    pub fn prefer_non_generic_enum_parse(mut self, enabled: bool) -> Self {
        self.prefer_non_generic_enum_parse = enabled;
        self
    }

    /// Sets [`tolerate_invalid_methods`](Self::tolerate_invalid_methods).
    pub fn tolerate_invalid_methods(mut self, enabled: bool) -> Self {
        self.tolerate_invalid_methods = enabled;
        self
    }
}
