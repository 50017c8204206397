//! Reading JSON and form bodies.
//!
//! Content-type mismatches end the invocation with 415. Malformed payloads
//! end it with 400 without raising, whatever the failure mode. Stream
//! failures are logged and end the invocation without touching the response.

use std::future::Future;

use conduit_core::http::FormReadError;
use conduit_core::{
    BoundValue, FormCollection, FormReader, HttpContext, PipelineError, PipelineResult,
};

use super::diagnostics::{self, BindingEvent, Failures};
use crate::parameter::ParameterDescriptor;

/// Result of reading a body for one parameter.
pub(crate) enum BodyRead<T> {
    /// The body was read.
    Read(T),
    /// There was no body to read.
    Empty,
    /// The invocation is over; the response already says why.
    Stop,
}

/// Runs `future` unless the request is aborted first.
pub(crate) async fn cancellable<F: Future>(ctx: &HttpContext, future: F) -> PipelineResult<F::Output> {
    let aborted = ctx.request_aborted();
    tokio::select! {
        biased;
        _ = aborted.cancelled() => Err(PipelineError::Cancelled),
        output = future => Ok(output),
    }
}

/// Reads the JSON body into `parameter`'s underlying type.
pub(crate) async fn read_json(
    ctx: &HttpContext,
    parameter: &ParameterDescriptor,
    failures: &Failures,
) -> PipelineResult<BodyRead<BoundValue>> {
    let request = ctx.request();
    if !request.can_have_body() {
        return Ok(BodyRead::Empty);
    }
    if !request.has_json_content_type() {
        failures.reject(
            ctx,
            BindingEvent::UnexpectedJsonContentType,
            415,
            diagnostics::unexpected_json_content_type(request.content_type()),
        )?;
        return Ok(BodyRead::Stop);
    }

    let bytes = match cancellable(ctx, request.read_body()).await? {
        Ok(bytes) => bytes,
        Err(e) => {
            diagnostics::log(BindingEvent::RequestBodyIoException, &diagnostics::body_io_failed());
            tracing::trace!(error = %e, "request body stream failed");
            return Ok(BodyRead::Stop);
        }
    };
    if bytes.is_empty() {
        return Ok(BodyRead::Empty);
    }

    let decoded = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|document| {
            if document.is_null() {
                return Some(Ok(None));
            }
            parameter
                .model()
                .decode_json(document)
                .map(|value| value.map(Some))
        });
    match decoded {
        Some(Ok(Some(value))) => Ok(BodyRead::Read(value)),
        Some(Ok(None)) => Ok(BodyRead::Empty),
        _ => {
            failures.swallow(
                ctx,
                BindingEvent::InvalidJsonRequestBody,
                diagnostics::invalid_json(parameter),
            );
            Ok(BodyRead::Stop)
        }
    }
}

/// Reads the form once for every form-bound parameter.
///
/// `first` names the parameter reported when the form is malformed.
pub(crate) async fn read_form(
    ctx: &HttpContext,
    reader: &dyn FormReader,
    first: &ParameterDescriptor,
    failures: &Failures,
) -> PipelineResult<BodyRead<FormCollection>> {
    let request = ctx.request();
    if !request.can_have_body() {
        return Ok(BodyRead::Empty);
    }
    if !request.has_form_content_type() {
        failures.reject(
            ctx,
            BindingEvent::UnexpectedNonFormContentType,
            415,
            diagnostics::unexpected_form_content_type(request.content_type()),
        )?;
        return Ok(BodyRead::Stop);
    }

    match cancellable(ctx, reader.read_form(request)).await? {
        Ok(form) => Ok(BodyRead::Read(form)),
        Err(FormReadError::Io(e)) => {
            diagnostics::log(BindingEvent::RequestBodyIoException, &diagnostics::body_io_failed());
            tracing::trace!(error = %e, "form body stream failed");
            Ok(BodyRead::Stop)
        }
        Err(FormReadError::InvalidData(reason)) => {
            tracing::trace!(%reason, "form body rejected");
            failures.swallow(
                ctx,
                BindingEvent::InvalidFormRequestBody,
                diagnostics::invalid_form(first),
            );
            Ok(BodyRead::Stop)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use conduit_core::http::UrlEncodedFormReader;
    use conduit_core::value::downcast;
    use conduit_core::{Bindable, HttpRequest, TypeModel};
    use serde::Deserialize;
    use tokio::io::{AsyncRead, ReadBuf};

    use super::*;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Todo {
        title: String,
    }

    impl Bindable for Todo {
        fn type_model() -> TypeModel {
            TypeModel::object::<Todo>().json().build()
        }
    }

    struct Broken;

    impl AsyncRead for Broken {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::other("connection reset")))
        }
    }

    fn todo() -> ParameterDescriptor {
        ParameterDescriptor::of::<Todo>().named("todo")
    }

    #[tokio::test]
    async fn test_reads_json() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body(br#"{"title":"write docs"}"#.to_vec())
                .build(),
        );
        let read = read_json(&ctx, &todo(), &Failures::new(false)).await.unwrap();
        let BodyRead::Read(value) = read else {
            panic!("expected a value");
        };
        assert_eq!(
            downcast::<Todo>(value).unwrap(),
            Todo {
                title: "write docs".into()
            }
        );
    }

    #[tokio::test]
    async fn test_wrong_content_type_is_415() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("text/plain")
                .body(b"{}".to_vec())
                .build(),
        );
        let read = read_json(&ctx, &todo(), &Failures::new(false)).await.unwrap();
        assert!(matches!(read, BodyRead::Stop));
        assert_eq!(ctx.response().status(), 415);

        let err = read_json(&ctx, &todo(), &Failures::new(true))
            .await
            .err()
            .unwrap();
        assert_eq!(err.as_bad_request().unwrap().status, 415);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400_even_when_throwing() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body(b"{not json".to_vec())
                .build(),
        );
        let read = read_json(&ctx, &todo(), &Failures::new(true)).await.unwrap();
        assert!(matches!(read, BodyRead::Stop));
        assert_eq!(ctx.response().status(), 400);
    }

    #[tokio::test]
    async fn test_io_failure_leaves_status() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body_reader(Broken)
                .build(),
        );
        let read = read_json(&ctx, &todo(), &Failures::new(true)).await.unwrap();
        assert!(matches!(read, BodyRead::Stop));
        assert_eq!(ctx.response().status(), 200);
    }

    #[tokio::test]
    async fn test_empty_and_null_bodies() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body(b"null".to_vec())
                .build(),
        );
        let read = read_json(&ctx, &todo(), &Failures::new(false)).await.unwrap();
        assert!(matches!(read, BodyRead::Empty));

        let ctx = HttpContext::new(HttpRequest::default());
        let read = read_json(&ctx, &todo(), &Failures::new(false)).await.unwrap();
        assert!(matches!(read, BodyRead::Empty));
    }

    #[tokio::test]
    async fn test_form_requires_form_content_type() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body(b"{}".to_vec())
                .build(),
        );
        let first = ParameterDescriptor::of::<String>().named("name");
        let read = read_form(&ctx, &UrlEncodedFormReader, &first, &Failures::new(false))
            .await
            .unwrap();
        assert!(matches!(read, BodyRead::Stop));
        assert_eq!(ctx.response().status(), 415);
    }

    #[tokio::test]
    async fn test_cancelled_read() {
        let ctx = HttpContext::new(
            HttpRequest::builder()
                .content_type("application/json")
                .body(b"{}".to_vec())
                .build(),
        );
        ctx.abort();
        let err = read_json(&ctx, &todo(), &Failures::new(false))
            .await
            .err()
            .unwrap();
        assert!(err.is_cancelled());
    }
}
