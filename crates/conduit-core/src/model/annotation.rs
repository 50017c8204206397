//! Explicit parameter source annotations.

use std::fmt;

/// Pins a parameter to one request source, overriding inference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceAnnotation {
    /// A route value, by parameter name or the given name.
    Route {
        /// Route value name override.
        name: Option<String>,
    },
    /// A query string value.
    Query {
        /// Query key override.
        name: Option<String>,
    },
    /// A header value.
    Header {
        /// Header name override.
        name: Option<String>,
    },
    /// The JSON request body.
    Body {
        /// Bind `None`/default instead of failing on an empty body.
        allow_empty: bool,
    },
    /// A request service.
    Service,
    /// A form field, file or the whole form.
    Form {
        /// Form key override.
        name: Option<String>,
    },
    /// Expand a record type into its members.
    AsParameters,
}

impl SourceAnnotation {
    /// The explicit name override, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Route { name } | Self::Query { name } | Self::Header { name } | Self::Form { name } => {
                name.as_deref()
            }
            _ => None,
        }
    }
}

impl fmt::Display for SourceAnnotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Route { .. } => "route",
            Self::Query { .. } => "query",
            Self::Header { .. } => "header",
            Self::Body { .. } => "body",
            Self::Service => "services",
            Self::Form { .. } => "form",
            Self::AsParameters => "as_parameters",
        })
    }
}
