//! Writing handler return values to the response.

use std::io;

use conduit::core::NullResult;
use futures::stream;
use serde::Serialize;

use conduit::prelude::*;

const TEXT: &str = "text/plain; charset=utf-8";
const JSON: &str = "application/json; charset=utf-8";

async fn run(handler: HandlerDescriptor) -> (HttpContext, Result<(), PipelineError>) {
    let delegate = PipelineCompiler::new(CompileOptions::new())
        .compile(handler)
        .unwrap();
    let ctx = HttpContext::new(HttpRequest::default());
    let outcome = delegate.invoke(&ctx).await;
    (ctx, outcome)
}

#[derive(Serialize)]
struct Todo {
    id: u32,
    title: &'static str,
}

#[tokio::test]
async fn test_text_json_and_empty_replies() {
    let (ctx, outcome) = run(sync_handler_fn(|| "pong")).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "pong");
    assert_eq!(ctx.response().content_type().as_deref(), Some(TEXT));

    let (ctx, outcome) = run(handler_fn(|| async {
        Json(Todo {
            id: 1,
            title: "ship",
        })
    }))
    .await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), r#"{"id":1,"title":"ship"}"#);
    assert_eq!(ctx.response().content_type().as_deref(), Some(JSON));

    let (ctx, outcome) = run(sync_handler_fn(|| 42_u64)).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "42");

    let (ctx, outcome) = run(handler_fn(|| async {})).await;
    outcome.unwrap();
    assert_eq!(ctx.response().status(), 200);
    assert!(ctx.response().body().is_empty());
    assert_eq!(ctx.response().content_type(), None);
}

#[tokio::test]
async fn test_absent_values_are_written_as_null() {
    let (ctx, outcome) = run(handler_fn(|| async { None::<Json<Vec<u32>>> })).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "null");
    assert_eq!(ctx.response().content_type().as_deref(), Some(JSON));

    let (ctx, outcome) = run(handler_fn(|| async { Some("here".to_string()) })).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "here");
}

#[tokio::test]
async fn test_handler_content_type_is_kept() {
    let delegate = PipelineCompiler::new(CompileOptions::new())
        .compile(
            handler_fn(|ctx: HttpContext| async move {
                ctx.response().set_content_type("text/csv");
                "a,b\n1,2".to_string()
            })
            .with_params([ParamSpec::new("ctx")]),
        )
        .unwrap();
    let ctx = HttpContext::new(HttpRequest::default());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().content_type().as_deref(), Some("text/csv"));
    assert_eq!(ctx.response().body_string(), "a,b\n1,2");
}

#[tokio::test]
async fn test_self_describing_results() {
    let (ctx, outcome) = run(sync_handler_fn(|| Results::text_with_status(201, "created"))).await;
    outcome.unwrap();
    assert_eq!(ctx.response().status(), 201);
    assert_eq!(ctx.response().body_string(), "created");

    let (ctx, outcome) = run(sync_handler_fn(|| Results::empty())).await;
    outcome.unwrap();
    assert_eq!(ctx.response().status(), 204);

    let (ctx, outcome) = run(handler_fn(|| async {
        Results::json_with_status(
            202,
            &Todo {
                id: 7,
                title: "queued",
            },
        )
    }))
    .await;
    outcome.unwrap();
    assert_eq!(ctx.response().status(), 202);
    assert_eq!(ctx.response().body_string(), r#"{"id":7,"title":"queued"}"#);
}

#[tokio::test]
async fn test_missing_results_are_errors() {
    let (_, outcome) = run(sync_handler_fn(|| None::<Box<dyn HttpResult>>)).await;
    assert!(matches!(
        outcome,
        Err(PipelineError::NullResult(NullResult::Result))
    ));

    let (_, outcome) = run(sync_handler_fn(|| {
        Deferred::new(async { None::<Box<dyn HttpResult>> })
    }))
    .await;
    assert!(matches!(
        outcome,
        Err(PipelineError::NullResult(NullResult::AwaitedResult))
    ));
}

#[tokio::test]
async fn test_deferred_replies_are_awaited() {
    let (ctx, outcome) = run(sync_handler_fn(|| {
        Deferred::new(async {
            tokio::task::yield_now().await;
            Json([1, 2, 3])
        })
    }))
    .await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "[1,2,3]");
    assert_eq!(ctx.response().content_type().as_deref(), Some(JSON));
}

#[tokio::test]
async fn test_sequences_stream_a_json_array() {
    let (ctx, outcome) = run(sync_handler_fn(|| {
        Sequence::new(stream::iter(["a".to_string(), "b".to_string()]))
    }))
    .await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), r#"["a","b"]"#);
    assert_eq!(ctx.response().content_type().as_deref(), Some(JSON));

    let (ctx, outcome) = run(sync_handler_fn(|| {
        Sequence::new(stream::iter([Some(Json(1)), None, Some(Json(3))]))
    }))
    .await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "[1,null,3]");

    let (ctx, outcome) = run(sync_handler_fn(|| Sequence::new(stream::empty::<u8>()))).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "[]");
}

#[test]
fn test_sequences_of_results_are_rejected() {
    let err = PipelineCompiler::new(CompileOptions::new())
        .compile(sync_handler_fn(|| {
            Sequence::new(stream::iter(Vec::<Box<dyn HttpResult>>::new()))
        }))
        .unwrap_err();
    assert!(matches!(
        err,
        conduit::core::CompileError::UnsupportedReturnType { .. }
    ));
}

#[tokio::test]
async fn test_handler_errors_are_passed_through() {
    let (ctx, outcome) = run(handler_fn(|| async {
        Err::<String, _>(io::Error::new(io::ErrorKind::NotFound, "no such todo"))
    }))
    .await;
    let err = outcome.unwrap_err();
    assert!(matches!(err, PipelineError::Handler(_)));
    assert_eq!(err.to_string(), "no such todo");
    assert!(ctx.response().body().is_empty());

    let (ctx, outcome) = run(handler_fn(|| async { Ok::<_, io::Error>("fine") })).await;
    outcome.unwrap();
    assert_eq!(ctx.response().body_string(), "fine");
}
