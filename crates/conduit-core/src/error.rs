//! Error types shared by every Conduit crate.
//!
//! Errors fall into three groups:
//!
//! - [`CompileError`]: the handler's shape cannot be turned into a pipeline.
//!   These surface once, when the pipeline is compiled.
//! - [`BadRequest`] and [`PipelineError`]: the outcome of a single
//!   invocation. Client-caused failures carry a status code; capability and
//!   handler failures are passed through untouched.
//! - [`BindError`]: internal conversion failures between erased values and
//!   the concrete parameter types.

use std::fmt;

use thiserror::Error;

/// A boxed, thread-safe error, used wherever user code may fail.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// ============================================================================
// Compile-time errors
// ============================================================================

/// The handler cannot be compiled into a request pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A parameter has no name to bind by.
    #[error("A parameter does not have a name! Was it generated? All parameters must be named.")]
    UnnamedParameter {
        /// Zero-based position of the parameter.
        position: usize,
    },

    /// More than one capability interface supplies the same binding method.
    #[error(
        "{type_name} implements multiple interfaces with a matching {method} method: {}",
        .interfaces.join(", ")
    )]
    AmbiguousCapability {
        /// The type being bound.
        type_name: String,
        /// `try_parse` or `bind_async`.
        method: &'static str,
        /// Every interface that matched.
        interfaces: Vec<String>,
    },

    /// A method carries a binding name but none of the accepted shapes.
    #[error(
        "{method} method found on {type_name} with incorrect format. Must be a static method with format\n{}\nbut found\n{}",
        .expected.join("\n"),
        .found.join("\n")
    )]
    InvalidMethodShape {
        /// The type being bound.
        type_name: String,
        /// `try_parse` or `bind_async`.
        method: &'static str,
        /// The accepted shapes, in preference order.
        expected: Vec<String>,
        /// The shapes that were actually declared.
        found: Vec<String>,
    },

    /// A parameter must be bound from text but its type cannot parse text.
    #[error("No public static bool {type_name}::try_parse(&str, out {type_name}) method found for {parameter}.")]
    MissingTryParse {
        /// The parameter's type.
        type_name: String,
        /// The parameter name.
        parameter: String,
    },

    /// A route annotation names a value that is not part of the route template.
    #[error("{parameter} is not a route parameter.")]
    UnknownRouteParameter {
        /// The route value name.
        parameter: String,
    },

    /// More than one parameter claims the request body.
    #[error(
        "Failure to infer one or more parameters. Only one parameter may be bound from the request body, but found: {}",
        .parameters.join(", ")
    )]
    MultipleBodyParameters {
        /// Display names of the competing parameters.
        parameters: Vec<String>,
    },

    /// JSON body and form parameters cannot share a handler.
    #[error("A handler cannot bind both a JSON body ({body}) and form values ({form}) from the same request.")]
    BodyAndFormMixed {
        /// The body parameter.
        body: String,
        /// The first form parameter.
        form: String,
    },

    /// Explicit form names are meaningless for whole-form parameters.
    #[error("Assigning a value to the form name is not supported for parameters of type {type_name} ({parameter}).")]
    FormNameNotSupported {
        /// The parameter's type.
        type_name: String,
        /// The parameter name.
        parameter: String,
    },

    /// A body parameter's type has no JSON decoder.
    #[error("No JSON decoder is registered for {type_name}; {parameter} cannot be bound from the request body.")]
    NoBodyDecoder {
        /// The parameter's type.
        type_name: String,
        /// The parameter name.
        parameter: String,
    },

    /// Record binding requires a concrete type.
    #[error("The abstract type '{type_name}' is not supported.")]
    AbstractType {
        /// The record type.
        type_name: String,
    },

    /// The record type exposes no public constructor.
    #[error("No public parameterless constructor found for type '{type_name}'.")]
    NoPublicConstructor {
        /// The record type.
        type_name: String,
    },

    /// Several public parameterized constructors and no parameterless one.
    #[error("Only a single public parameterized constructor is allowed for type '{type_name}'.")]
    AmbiguousConstructors {
        /// The record type.
        type_name: String,
    },

    /// A constructor parameter has no matching public settable property.
    #[error(
        "The public parameterized constructor must contain only parameters that match the declared public properties for type '{type_name}'. Unmatched: {}",
        .unmatched.join(", ")
    )]
    ConstructorParameterMismatch {
        /// The record type.
        type_name: String,
        /// Constructor parameters without a property.
        unmatched: Vec<String>,
    },

    /// Record binding cannot be nested inside another record.
    #[error("Nested AsParameters is not supported and should be used only for handler parameters ({parameter}).")]
    NestedAsParameters {
        /// The nested member name.
        parameter: String,
    },

    /// A declared default value does not have the parameter's type.
    #[error("The default value for parameter \"{parameter}\" is not of its declared type {type_name}.")]
    DefaultValueMismatch {
        /// The parameter name.
        parameter: String,
        /// The declared type.
        type_name: String,
    },

    /// The handler's return type cannot be written to a response.
    #[error("Unsupported return type {description}.")]
    UnsupportedReturnType {
        /// Description of the offending shape.
        description: String,
    },
}

// ============================================================================
// Per-invocation errors
// ============================================================================

/// A client-caused failure, reported with the status that describes it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct BadRequest {
    /// HTTP status code, 400 or 415.
    pub status: u16,
    /// Human-readable explanation.
    pub message: String,
}

impl BadRequest {
    /// Creates a bad request with an explicit status.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Creates a 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    /// Creates a 415 Unsupported Media Type.
    pub fn unsupported_media_type(message: impl Into<String>) -> Self {
        Self::new(415, message)
    }
}

/// Which null the result writer found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullResult {
    /// A self-describing result was null.
    Result,
    /// The awaitable itself was null.
    Awaitable,
    /// The awaitable completed with a null self-describing result.
    AwaitedResult,
}

impl fmt::Display for NullResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Result => "The HttpResult returned by the handler must not be null.",
            Self::Awaitable => "The Deferred returned by the handler must not be null.",
            Self::AwaitedResult => {
                "The HttpResult in Deferred<HttpResult> response must not be null."
            }
        })
    }
}

/// The outcome of a failed pipeline invocation.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Binding failed and the pipeline is configured to raise.
    #[error(transparent)]
    BadRequest(#[from] BadRequest),

    /// The request was aborted while an extraction step was pending.
    #[error("the request was cancelled")]
    Cancelled,

    /// A required service is not registered.
    #[error("No service for type '{type_name}' has been registered.")]
    ServiceNotFound {
        /// The requested service type.
        type_name: String,
    },

    /// The handler produced a null where a value is required.
    #[error("{0}")]
    NullResult(NullResult),

    /// A `bind_async` capability failed; the error is its own.
    #[error(transparent)]
    Capability(BoxError),

    /// The handler or a self-describing result failed; the error is its own.
    #[error(transparent)]
    Handler(BoxError),

    /// A reply could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal value conversion failed.
    #[error(transparent)]
    Bind(#[from] BindError),
}

impl PipelineError {
    /// Returns the bad request if this is one.
    pub fn as_bad_request(&self) -> Option<&BadRequest> {
        match self {
            Self::BadRequest(bad) => Some(bad),
            _ => None,
        }
    }

    /// Returns `true` for cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

// ============================================================================
// Value conversion errors
// ============================================================================

/// Failure converting between erased values and concrete types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// An erased value did not have the expected type.
    #[error("bound value type mismatch: expected '{expected}'")]
    TypeMismatch {
        /// Expected type name.
        expected: &'static str,
    },

    /// Fewer values than parameters.
    #[error("missing bound value for argument {position}")]
    MissingArgument {
        /// Zero-based argument position.
        position: usize,
    },

    /// Custom conversion error.
    #[error("{0}")]
    Custom(String),
}

impl BindError {
    /// Creates a custom bind error.
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }
}

/// Result type for compilation.
pub type CompileResult<T> = Result<T, CompileError>;

/// Result type for pipeline invocations.
pub type PipelineResult<T> = Result<T, PipelineError>;
