//! Writing handler results to the response.
//!
//! The [`ResultAdapter`] turns a handler's [`ReplyModel`] into a
//! [`ResultWriter`] once, when the pipeline is compiled. The writer then
//! writes every returned [`ReplyValue`]:
//!
//! - `()` writes nothing;
//! - text is written as `text/plain; charset=utf-8`;
//! - JSON values as `application/json; charset=utf-8`;
//! - absent optional values as the `null` literal;
//! - [`HttpResult`]s write themselves;
//! - deferred values are awaited first;
//! - sequences are written as a JSON array, one element at a time.
//!
//! A content type set by the handler is never overwritten.

use async_trait::async_trait;
use conduit_core::{BoxError, CompileError, HttpContext, NullResult, PipelineError, PipelineResult};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use serde::Serialize;
use tracing::trace;

use crate::reply::{ReplyModel, ReplyValue};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

// ============================================================================
// HttpResult
// ============================================================================

/// A result that knows how to write itself to the response.
#[async_trait]
pub trait HttpResult: Send {
    /// Writes the result.
    async fn execute(self: Box<Self>, ctx: &HttpContext) -> Result<(), BoxError>;
}

struct StatusResult(u16);

#[async_trait]
impl HttpResult for StatusResult {
    async fn execute(self: Box<Self>, ctx: &HttpContext) -> Result<(), BoxError> {
        ctx.response().set_status(self.0);
        Ok(())
    }
}

struct TextResult {
    status: u16,
    text: String,
}

#[async_trait]
impl HttpResult for TextResult {
    async fn execute(self: Box<Self>, ctx: &HttpContext) -> Result<(), BoxError> {
        let response = ctx.response();
        response.set_status(self.status);
        response.set_default_content_type(TEXT_CONTENT_TYPE);
        response.write(self.text.as_bytes());
        Ok(())
    }
}

struct JsonResult {
    status: u16,
    body: Vec<u8>,
}

#[async_trait]
impl HttpResult for JsonResult {
    async fn execute(self: Box<Self>, ctx: &HttpContext) -> Result<(), BoxError> {
        let response = ctx.response();
        response.set_status(self.status);
        response.set_default_content_type(JSON_CONTENT_TYPE);
        response.write(&self.body);
        Ok(())
    }
}

/// Built-in [`HttpResult`]s.
pub struct Results;

impl Results {
    /// Sets the status code and writes nothing.
    pub fn status(status: u16) -> Box<dyn HttpResult> {
        Box::new(StatusResult(status))
    }

    /// A 204 No Content.
    pub fn empty() -> Box<dyn HttpResult> {
        Self::status(204)
    }

    /// Writes `text` with a 200 status.
    pub fn text(text: impl Into<String>) -> Box<dyn HttpResult> {
        Self::text_with_status(200, text)
    }

    /// Writes `text` with the given status.
    pub fn text_with_status(status: u16, text: impl Into<String>) -> Box<dyn HttpResult> {
        Box::new(TextResult {
            status,
            text: text.into(),
        })
    }

    /// Writes `value` as JSON with a 200 status.
    pub fn json<T: Serialize>(value: &T) -> Result<Box<dyn HttpResult>, serde_json::Error> {
        Self::json_with_status(200, value)
    }

    /// Writes `value` as JSON with the given status.
    pub fn json_with_status<T: Serialize>(
        status: u16,
        value: &T,
    ) -> Result<Box<dyn HttpResult>, serde_json::Error> {
        Ok(Box::new(JsonResult {
            status,
            body: serde_json::to_vec(value)?,
        }))
    }
}

// ============================================================================
// ResultWriter
// ============================================================================

/// Writes one handler's results. Built by [`ResultAdapter::adapt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultWriter {
    /// Writes nothing.
    Empty,
    /// Writes text.
    Text,
    /// Writes JSON.
    Json,
    /// Writes `null` when absent, the inner value otherwise.
    Nullable(Box<ResultWriter>),
    /// Executes a self-describing result.
    Result {
        /// The result may be absent, which is an error.
        nullable: bool,
    },
    /// Awaits, then writes the awaited value.
    Awaitable {
        /// The awaitable may be absent, which is an error.
        nullable: bool,
        /// Writes the awaited value.
        inner: Box<ResultWriter>,
    },
    /// Writes a JSON array element by element.
    Sequence(Box<ResultWriter>),
}

/// Normalises a handler's return shape into a [`ResultWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultAdapter;

impl ResultAdapter {
    /// Builds the writer for `model`.
    ///
    /// `Option` around a self-describing result or a deferred value folds
    /// into the writer's `nullable` flag. Sequences may only carry text or
    /// JSON elements.
    pub fn adapt(model: &ReplyModel) -> Result<ResultWriter, CompileError> {
        Ok(match model {
            ReplyModel::Empty => ResultWriter::Empty,
            ReplyModel::Text => ResultWriter::Text,
            ReplyModel::Json => ResultWriter::Json,
            ReplyModel::Result { nullable } => ResultWriter::Result {
                nullable: *nullable,
            },
            ReplyModel::Nullable(inner) => match Self::adapt(inner)? {
                ResultWriter::Result { .. } => ResultWriter::Result { nullable: true },
                ResultWriter::Awaitable { inner, .. } => ResultWriter::Awaitable {
                    nullable: true,
                    inner,
                },
                nullable @ ResultWriter::Nullable(_) => nullable,
                other => ResultWriter::Nullable(Box::new(other)),
            },
            ReplyModel::Awaitable { nullable, inner } => {
                let inner = match Self::adapt(inner)? {
                    ResultWriter::Awaitable { .. } => {
                        return Err(CompileError::UnsupportedReturnType {
                            description: model.to_string(),
                        });
                    }
                    inner => inner,
                };
                ResultWriter::Awaitable {
                    nullable: *nullable,
                    inner: Box::new(inner),
                }
            }
            ReplyModel::Sequence(element) => {
                let element = Self::adapt(element)?;
                if !element.is_serializable() {
                    return Err(CompileError::UnsupportedReturnType {
                        description: model.to_string(),
                    });
                }
                ResultWriter::Sequence(Box::new(element))
            }
        })
    }
}

impl ResultWriter {
    fn is_serializable(&self) -> bool {
        match self {
            Self::Text | Self::Json => true,
            Self::Nullable(inner) => inner.is_serializable(),
            _ => false,
        }
    }

    /// Writes `value` to the response of `ctx`.
    pub fn write<'a>(
        &'a self,
        value: ReplyValue,
        ctx: &'a HttpContext,
    ) -> BoxFuture<'a, PipelineResult<()>> {
        async move {
            if let ReplyValue::Failed(e) = value {
                return Err(PipelineError::Handler(e));
            }
            match self {
                Self::Empty => Ok(()),
                Self::Nullable(inner) => match value {
                    ReplyValue::Null => {
                        write_bytes(ctx, JSON_CONTENT_TYPE, b"null");
                        Ok(())
                    }
                    value => inner.write(value, ctx).await,
                },
                Self::Result { .. } => match value {
                    ReplyValue::Result(result) => {
                        result.execute(ctx).await.map_err(PipelineError::Handler)
                    }
                    ReplyValue::Null => Err(PipelineError::NullResult(NullResult::Result)),
                    value => write_plain(value, ctx),
                },
                Self::Awaitable { inner, .. } => match value {
                    ReplyValue::Awaitable(future) => {
                        let awaited = future.await;
                        if matches!(**inner, Self::Result { .. })
                            && matches!(awaited, ReplyValue::Null)
                        {
                            return Err(PipelineError::NullResult(NullResult::AwaitedResult));
                        }
                        inner.write(awaited, ctx).await
                    }
                    ReplyValue::Null => Err(PipelineError::NullResult(NullResult::Awaitable)),
                    value => inner.write(value, ctx).await,
                },
                Self::Sequence(_) => match value {
                    ReplyValue::Sequence(stream) => write_sequence(stream, ctx).await,
                    value => write_plain(value, ctx),
                },
                Self::Text | Self::Json => write_plain(value, ctx),
            }
        }
        .boxed()
    }
}

fn write_bytes(ctx: &HttpContext, content_type: &str, bytes: &[u8]) {
    let response = ctx.response();
    response.set_default_content_type(content_type);
    response.write(bytes);
}

fn write_plain(value: ReplyValue, ctx: &HttpContext) -> PipelineResult<()> {
    match value {
        ReplyValue::Text(text) => write_bytes(ctx, TEXT_CONTENT_TYPE, text.as_bytes()),
        ReplyValue::Json(bytes) => write_bytes(ctx, JSON_CONTENT_TYPE, &bytes?),
        ReplyValue::Null => write_bytes(ctx, JSON_CONTENT_TYPE, b"null"),
        ReplyValue::Empty => {}
        ReplyValue::Failed(e) => return Err(PipelineError::Handler(e)),
        other => trace!(value = ?other, "Reply does not match the declared return type"),
    }
    Ok(())
}

async fn write_sequence(
    mut stream: BoxStream<'static, ReplyValue>,
    ctx: &HttpContext,
) -> PipelineResult<()> {
    let response = ctx.response();
    let aborted = ctx.request_aborted();
    response.set_default_content_type(JSON_CONTENT_TYPE);
    response.write(b"[");
    let mut first = true;
    while let Some(item) = stream.next().await {
        if aborted.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }
        let bytes = match item {
            ReplyValue::Json(bytes) => bytes?,
            ReplyValue::Text(text) => serde_json::to_vec(&text)?,
            ReplyValue::Null => b"null".to_vec(),
            ReplyValue::Failed(e) => return Err(PipelineError::Handler(e)),
            other => {
                trace!(value = ?other, "Skipping a sequence element that is not serializable");
                continue;
            }
        };
        if !first {
            response.write(b",");
        }
        first = false;
        response.write(&bytes);
    }
    response.write(b"]");
    Ok(())
}
