//! Types that bind themselves through `try_parse` and `bind_async`.

use std::sync::Arc;
use std::time::Duration;

use conduit::core::model::{
    CapabilityInterface, FormatProvider, MethodDecl, ParameterInfo, Receiver, Returns, Slot,
    TRY_PARSE,
};
use conduit::core::{BoxError, CompileError};
use conduit::framework::{BindingEvent, ResolvedSource};
use conduit::prelude::*;
use tracing_test::traced_test;

fn compiler() -> PipelineCompiler {
    PipelineCompiler::new(CompileOptions::new())
}

// ============================================================================
// try_parse
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
struct Point {
    x: i32,
    y: i32,
}

impl Bindable for Point {
    fn type_model() -> TypeModel {
        TypeModel::object::<Point>()
            .try_parse(|text: &str, _: &FormatProvider| {
                let (x, y) = text.split_once(',')?;
                Some(Point {
                    x: x.trim().parse().ok()?,
                    y: y.trim().parse().ok()?,
                })
            })
            .build()
    }
}

async fn distance(from: Point, to: Option<Point>) -> String {
    let to = to.unwrap_or(Point { x: 0, y: 0 });
    ((from.x - to.x).abs() + (from.y - to.y).abs()).to_string()
}

#[tokio::test]
async fn test_try_parse_types_bind_from_text() {
    let delegate = compiler()
        .compile(handler_fn(distance).with_params([ParamSpec::new("from"), ParamSpec::new("to")]))
        .unwrap();
    assert!(delegate.parameters()[0].parser.is_some());

    let ctx = HttpContext::new(
        HttpRequest::builder()
            .query("from", "3, 4")
            .query("to", "1,1")
            .build(),
    );
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().body_string(), "5");

    let ctx = HttpContext::new(HttpRequest::builder().query("from", "-2,2").build());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().body_string(), "4");
}

#[tokio::test]
#[traced_test]
async fn test_unparsable_text_is_a_bad_request() {
    let delegate = compiler()
        .compile(handler_fn(distance).with_params([ParamSpec::new("from"), ParamSpec::new("to")]))
        .unwrap();

    let ctx = HttpContext::new(HttpRequest::builder().query("from", "north").build());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().status(), 400);
    assert!(logs_contain(r#"Failed to bind parameter "Point from" from "north"."#));
    logs_assert(|lines: &[&str]| {
        match lines
            .iter()
            .filter(|line| line.contains("Failed to bind parameter"))
            .count()
        {
            1 => Ok(()),
            n => Err(format!("expected one binding failure entry, found {n}")),
        }
    });
}

struct Opaque;

impl Bindable for Opaque {
    fn type_model() -> TypeModel {
        TypeModel::object::<Opaque>().build()
    }
}

#[test]
fn test_annotated_text_source_needs_a_parser() {
    async fn take(_value: Opaque) {}

    let err = compiler()
        .compile(handler_fn(take).with_params([ParamSpec::new("value").from_query()]))
        .unwrap_err();
    assert!(matches!(err, CompileError::MissingTryParse { .. }));
}

// ============================================================================
// Interfaces and method shapes
// ============================================================================

#[derive(Debug)]
struct Slug(String);

fn slug_parsing() -> Arc<CapabilityInterface> {
    CapabilityInterface::new("SlugParsing")
        .method(MethodDecl::try_parse_invariant(|text: &str| {
            text.chars()
                .all(|c| c.is_ascii_lowercase() || c == '-')
                .then(|| Slug(text.to_string()))
        }))
        .build()
}

impl Bindable for Slug {
    fn type_model() -> TypeModel {
        TypeModel::object::<Slug>()
            .method(MethodDecl::new(
                TRY_PARSE,
                Receiver::Instance,
                vec![Slot::Text],
                Returns::Bool,
            ))
            .implements(slug_parsing())
            .build()
    }
}

async fn article(slug: Slug) -> String {
    slug.0
}

#[tokio::test]
async fn test_interface_default_replaces_a_misshapen_method() {
    let delegate = PipelineCompiler::new(CompileOptions::new().route_parameters(["slug"]))
        .compile(handler_fn(article).with_params([ParamSpec::new("slug")]))
        .unwrap();
    assert!(matches!(
        delegate.parameters()[0].source,
        ResolvedSource::RouteValue(_)
    ));

    let ctx = HttpContext::new(HttpRequest::builder().route_value("slug", "hello-world").build());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().body_string(), "hello-world");
}

struct Misshapen;

impl Bindable for Misshapen {
    fn type_model() -> TypeModel {
        TypeModel::object::<Misshapen>()
            .method(MethodDecl::new(
                TRY_PARSE,
                Receiver::Static,
                vec![Slot::Text],
                Returns::Bool,
            ))
            .build()
    }
}

#[test]
fn test_misshapen_method_is_reported_unless_tolerated() {
    async fn take(_value: Misshapen) {}

    let handler = || handler_fn(take).with_params([ParamSpec::new("value").from_query()]);

    let err = compiler().compile(handler()).unwrap_err();
    assert!(matches!(err, CompileError::InvalidMethodShape { .. }));

    let tolerant = PipelineCompiler::new(
        CompileOptions::new().binding(BindingOptions::new().tolerate_invalid_methods(true)),
    );
    assert!(matches!(
        tolerant.compile(handler()).unwrap_err(),
        CompileError::MissingTryParse { .. }
    ));
}

// ============================================================================
// bind_async
// ============================================================================

#[derive(Debug)]
struct Tenant(String);

impl Bindable for Tenant {
    fn type_model() -> TypeModel {
        TypeModel::object::<Tenant>()
            .try_parse_invariant(|text: &str| Some(Tenant(format!("parsed:{text}"))))
            .bind_async(|ctx: HttpContext, info: ParameterInfo| async move {
                let host = ctx
                    .request()
                    .headers()
                    .first("host")
                    .map(|host| host.split('.').next().unwrap_or_default().to_string());
                Ok::<_, BoxError>(host.map(|host| Tenant(format!("{}={host}", info.name()))))
            })
            .build()
    }
}

async fn tenant(tenant: Tenant) -> String {
    tenant.0
}

#[tokio::test]
async fn test_bind_async_wins_over_try_parse() {
    let delegate = compiler()
        .compile(handler_fn(tenant).with_params([ParamSpec::new("tenant")]))
        .unwrap();
    assert!(matches!(
        delegate.parameters()[0].source,
        ResolvedSource::BindCapability(_)
    ));

    let ctx = HttpContext::new(
        HttpRequest::builder()
            .header("Host", "acme.example.com")
            .query("tenant", "ignored")
            .build(),
    );
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().body_string(), "tenant=acme");
}

#[tokio::test]
#[traced_test]
async fn test_bind_async_without_a_value_is_a_bad_request() {
    let delegate = compiler()
        .compile(handler_fn(tenant).with_params([ParamSpec::new("tenant")]))
        .unwrap();

    let ctx = HttpContext::new(HttpRequest::default());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().status(), 400);
    assert!(logs_contain(BindingEvent::RequiredParameterNotProvided.name()));
    assert!(logs_contain(
        r#"Required parameter "Tenant tenant" was not provided from Tenant.bind_async(HttpContext, ParameterInfo)."#
    ));
}

#[tokio::test]
async fn test_bind_async_without_a_value_throws_naming_the_overload() {
    let delegate = PipelineCompiler::new(
        CompileOptions::new().binding(BindingOptions::new().throw_on_bad_request(true)),
    )
    .compile(handler_fn(tenant).with_params([ParamSpec::new("tenant")]))
    .unwrap();

    let err = delegate
        .invoke(&HttpContext::new(HttpRequest::default()))
        .await
        .unwrap_err();
    let bad_request = err.as_bad_request().unwrap();
    assert_eq!(bad_request.status, 400);
    assert_eq!(
        bad_request.message,
        r#"Required parameter "Tenant tenant" was not provided from Tenant.bind_async(HttpContext, ParameterInfo)."#
    );
}

#[tokio::test]
async fn test_optional_bind_async_accepts_no_value() {
    async fn maybe(tenant: Option<Tenant>) -> String {
        tenant.map_or_else(|| "none".to_string(), |t| t.0)
    }

    let delegate = compiler()
        .compile(handler_fn(maybe).with_params([ParamSpec::new("tenant")]))
        .unwrap();
    let ctx = HttpContext::new(HttpRequest::default());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().status(), 200);
    assert_eq!(ctx.response().body_string(), "none");
}

#[derive(Debug)]
struct Lease;

impl Bindable for Lease {
    fn type_model() -> TypeModel {
        TypeModel::object::<Lease>()
            .bind_async_context(|ctx: HttpContext| async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ctx.response().append_header("x-bound", "lease");
                Ok::<_, BoxError>(Some(Lease))
            })
            .build()
    }
}

#[derive(Debug)]
struct Audit(Option<String>);

impl Bindable for Audit {
    fn type_model() -> TypeModel {
        TypeModel::object::<Audit>()
            .bind_async_context(|ctx: HttpContext| async move {
                let seen = ctx.response().header("x-bound");
                ctx.response().append_header("x-bound", "audit");
                Ok::<_, BoxError>(Some(Audit(seen)))
            })
            .build()
    }
}

#[tokio::test]
async fn test_bind_async_parameters_run_in_declaration_order() {
    async fn checkout(_lease: Lease, audit: Audit) -> String {
        audit.0.unwrap_or_default()
    }

    let delegate = compiler()
        .compile(handler_fn(checkout).with_params([ParamSpec::new("lease"), ParamSpec::new("audit")]))
        .unwrap();
    let ctx = HttpContext::new(HttpRequest::default());
    delegate.invoke(&ctx).await.unwrap();
    assert_eq!(ctx.response().body_string(), "lease");
    assert_eq!(ctx.response().header("x-bound").as_deref(), Some("lease"));
}

#[derive(Debug)]
struct Quota;

impl Bindable for Quota {
    fn type_model() -> TypeModel {
        TypeModel::object::<Quota>()
            .bind_async_context(|_ctx: HttpContext| async {
                Err::<Option<Quota>, BoxError>("quota store unavailable".into())
            })
            .build()
    }
}

#[tokio::test]
async fn test_bind_async_errors_propagate() {
    async fn charge(_quota: Quota) {}

    let delegate = compiler()
        .compile(handler_fn(charge).with_params([ParamSpec::new("quota")]))
        .unwrap();
    let err = delegate
        .invoke(&HttpContext::new(HttpRequest::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Capability(_)));
    assert_eq!(err.to_string(), "quota store unavailable");
}

#[derive(Debug)]
struct Slow;

impl Bindable for Slow {
    fn type_model() -> TypeModel {
        TypeModel::object::<Slow>()
            .bind_async_context(|_ctx: HttpContext| async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, BoxError>(Some(Slow))
            })
            .build()
    }
}

#[tokio::test]
async fn test_aborted_requests_stop_binding() {
    async fn wait(_slow: Slow) -> &'static str {
        "done"
    }

    let delegate = compiler()
        .compile(handler_fn(wait).with_params([ParamSpec::new("slow")]))
        .unwrap();
    let ctx = HttpContext::new(HttpRequest::default());
    ctx.abort();

    let err = delegate.invoke(&ctx).await.unwrap_err();
    assert!(err.is_cancelled());
    assert_eq!(ctx.response().body_string(), "");
}
