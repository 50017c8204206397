//! # Conduit Framework
//!
//! Turns typed handlers into request pipelines.
//!
//! This layer provides:
//! - [`BindingCapabilityResolver`]: finds `try_parse` / `bind_async`
//!   capabilities on a type, its bases and its capability interfaces
//! - [`ParameterSourceClassifier`]: decides where each parameter comes from
//! - [`PipelineCompiler`]: compiles a [`HandlerDescriptor`] into a
//!   [`RequestDelegate`]
//! - [`ResultAdapter`]: normalises return values into a response writer
//! - typed handler adapters ([`handler_fn`], [`sync_handler_fn`]) and a tower
//!   `Service` implementation for compiled delegates

pub mod binding;
pub mod handler;
pub mod options;
pub mod parameter;
pub mod pipeline;
pub mod reply;
pub mod result;
pub mod service;
pub mod source;

pub use binding::{
    BindingCandidate, BindingCapabilityResolver, CandidateKind, CapabilityCache, DeclarationSite,
    RecordConstruction,
};
pub use handler::{
    ErasedHandler, Handler, HandlerDescriptor, SyncHandler, handler_fn, sync_handler_fn,
};
pub use options::CompileOptions;
pub use parameter::{DefaultValue, ParamSpec, ParameterDescriptor};
pub use pipeline::{BINDING_LOG_TARGET, BindingEvent, PipelineCompiler, RequestDelegate};
pub use reply::{Deferred, Json, Reply, ReplyModel, ReplyValue, Sequence};
pub use result::{HttpResult, ResultAdapter, ResultWriter, Results};
pub use source::{
    ClassifiedParameter, ParameterSourceClassifier, RecordSource, ResolvedSource, TextParser,
};
