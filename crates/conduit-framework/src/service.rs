//! Tower integration for compiled pipelines.
//!
//! [`RequestDelegate`] implements `tower::Service<HttpContext>`, so timeouts,
//! concurrency limits and other tower layers can be stacked on top of a
//! compiled handler.
//!
//! # Example
//!
//! ```rust,ignore
//! use tower::ServiceBuilder;
//! use tower::limit::ConcurrencyLimitLayer;
//!
//! let service = ServiceBuilder::new()
//!     .layer(ConcurrencyLimitLayer::new(64))
//!     .service(delegate);
//! ```

use std::task::{Context, Poll};

use conduit_core::{HttpContext, PipelineError};
use futures::FutureExt;
use futures::future::BoxFuture;
use tower::Service;

use crate::pipeline::RequestDelegate;

impl Service<HttpContext> for RequestDelegate {
    type Response = ();
    type Error = PipelineError;
    type Future = BoxFuture<'static, Result<(), Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, ctx: HttpContext) -> Self::Future {
        let delegate = self.clone();
        async move { delegate.invoke(&ctx).await }.boxed()
    }
}
