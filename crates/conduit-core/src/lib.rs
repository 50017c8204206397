//! Conduit Core - request model and type metadata.
//!
//! This crate holds the pieces every other Conduit crate builds on:
//!
//! - **Request abstractions** ([`http`]): `HttpContext`, `HttpRequest`,
//!   `HttpResponse`, request services and form reading.
//! - **Type metadata** ([`model`]): the [`Bindable`] trait and the
//!   [`TypeModel`] each bindable type publishes, describing its parsing and
//!   binding capabilities.
//! - **Values** ([`value`]): erased parameter values and positional
//!   [`Arguments`].
//! - **Errors** ([`error`]) and **options** ([`options`]).

pub mod error;
pub mod http;
pub mod model;
pub mod options;
pub mod value;

pub use error::{
    BadRequest, BindError, BoxError, CompileError, CompileResult, NullResult, PipelineError,
    PipelineResult,
};
pub use http::{
    FormCollection, FormFile, FormFileCollection, FormReader, HttpContext, HttpRequest,
    HttpResponse, RequestBody, ServiceCollection, ServiceProvider, TraceIdentifier, User,
};
pub use model::{Bindable, SourceAnnotation, TypeModel, model_of};
pub use options::BindingOptions;
pub use value::{Arguments, BoundValue};
