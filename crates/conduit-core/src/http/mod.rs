//! Request-time abstractions consumed by compiled pipelines.

pub mod context;
pub mod form;
pub mod request;
pub mod response;
pub mod services;

pub use context::{HttpContext, RequestBody, TraceIdentifier, User};
pub use form::{
    FormCollection, FormFile, FormFileCollection, FormReadError, FormReader, UrlEncodedFormReader,
};
pub use request::{
    BoxedBody, HttpRequest, HttpRequestBuilder, ValueMap, is_form_media_type, is_json_media_type,
};
pub use response::HttpResponse;
pub use services::{ServiceCollection, ServiceProvider, ServiceProviderExt};
