//! Binding diagnostics.

use conduit_core::{BadRequest, HttpContext, PipelineError, PipelineResult};
use tracing::debug;

use crate::parameter::ParameterDescriptor;

/// The `tracing` target of every [`BindingEvent`].
pub const BINDING_LOG_TARGET: &str = "conduit::binding";

/// Diagnostic events emitted while binding a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingEvent {
    /// The body stream failed.
    RequestBodyIoException,
    /// The JSON body could not be read.
    InvalidJsonRequestBody,
    /// A value could not be parsed.
    ParameterBindingFailed,
    /// A required value is missing.
    RequiredParameterNotProvided,
    /// An inferred body parameter found no body.
    ImplicitBodyNotProvided,
    /// A JSON body was sent with another content type.
    UnexpectedJsonContentType,
    /// A form was expected but another content type was sent.
    UnexpectedNonFormContentType,
    /// The form body could not be read.
    InvalidFormRequestBody,
}

impl BindingEvent {
    /// The numeric event id.
    pub fn id(self) -> u16 {
        match self {
            Self::RequestBodyIoException => 1,
            Self::InvalidJsonRequestBody => 2,
            Self::ParameterBindingFailed => 3,
            Self::RequiredParameterNotProvided => 4,
            Self::ImplicitBodyNotProvided => 5,
            Self::UnexpectedJsonContentType => 6,
            Self::UnexpectedNonFormContentType => 7,
            Self::InvalidFormRequestBody => 8,
        }
    }

    /// The event name.
    pub fn name(self) -> &'static str {
        match self {
            Self::RequestBodyIoException => "RequestBodyIOException",
            Self::InvalidJsonRequestBody => "InvalidJsonRequestBody",
            Self::ParameterBindingFailed => "ParameterBindingFailed",
            Self::RequiredParameterNotProvided => "RequiredParameterNotProvided",
            Self::ImplicitBodyNotProvided => "ImplicitBodyNotProvided",
            Self::UnexpectedJsonContentType => "UnexpectedJsonContentType",
            Self::UnexpectedNonFormContentType => "UnexpectedNonFormContentType",
            Self::InvalidFormRequestBody => "InvalidFormRequestBody",
        }
    }
}

pub(crate) fn body_io_failed() -> String {
    "Reading the request body failed with an IOException.".into()
}

pub(crate) fn invalid_json(parameter: &ParameterDescriptor) -> String {
    format!(
        "Failed to read parameter \"{}\" from the request body as JSON.",
        parameter.display_name()
    )
}

pub(crate) fn invalid_form(parameter: &ParameterDescriptor) -> String {
    format!(
        "Failed to read parameter \"{}\" from the request body as form.",
        parameter.display_name()
    )
}

pub(crate) fn binding_failed(parameter: &ParameterDescriptor, raw: &str) -> String {
    format!(
        "Failed to bind parameter \"{}\" from \"{raw}\".",
        parameter.display_name()
    )
}

pub(crate) fn required_missing(parameter: &ParameterDescriptor, source: &str) -> String {
    format!(
        "Required parameter \"{}\" was not provided from {source}.",
        parameter.display_name()
    )
}

pub(crate) fn implicit_body_missing(parameter: &ParameterDescriptor) -> String {
    format!(
        "Implicit body inferred for parameter \"{}\" but no body was provided. Did you mean to use a Service instead?",
        parameter.display_name()
    )
}

pub(crate) fn unexpected_json_content_type(content_type: Option<&str>) -> String {
    format!(
        "Expected a supported JSON media type but got \"{}\".",
        content_type.unwrap_or_default()
    )
}

pub(crate) fn unexpected_form_content_type(content_type: Option<&str>) -> String {
    format!(
        "Expected a supported form media type but got \"{}\".",
        content_type.unwrap_or_default()
    )
}

/// Logs an event without affecting the outcome.
pub(crate) fn log(event: BindingEvent, message: &str) {
    debug!(
        target: BINDING_LOG_TARGET,
        event_id = event.id(),
        event_name = event.name(),
        "{message}"
    );
}

/// Collects recoverable binding failures for one invocation.
///
/// When `throw_on_bad_request` is set the first failure becomes a
/// [`BadRequest`] error; otherwise every failure is logged and the request
/// is answered with a 400 once binding completes.
pub(crate) struct Failures {
    throw: bool,
    failed: bool,
}

impl Failures {
    pub(crate) fn new(throw: bool) -> Self {
        Self {
            throw,
            failed: false,
        }
    }

    pub(crate) fn any(&self) -> bool {
        self.failed
    }

    /// Records a 400-class failure.
    pub(crate) fn fail(&mut self, event: BindingEvent, message: String) -> PipelineResult<()> {
        if self.throw {
            return Err(PipelineError::BadRequest(BadRequest::bad_request(message)));
        }
        log(event, &message);
        self.failed = true;
        Ok(())
    }

    /// Ends the invocation with `status` immediately.
    pub(crate) fn reject(
        &self,
        ctx: &HttpContext,
        event: BindingEvent,
        status: u16,
        message: String,
    ) -> PipelineResult<()> {
        if self.throw {
            return Err(PipelineError::BadRequest(BadRequest::new(status, message)));
        }
        log(event, &message);
        set_status(ctx, status);
        Ok(())
    }

    /// Ends the invocation with a 400 without raising, whatever the mode.
    pub(crate) fn swallow(&self, ctx: &HttpContext, event: BindingEvent, message: String) {
        log(event, &message);
        set_status(ctx, 400);
    }
}

pub(crate) fn set_status(ctx: &HttpContext, status: u16) {
    let response = ctx.response();
    if !response.has_started() {
        response.set_status(status);
    }
}
