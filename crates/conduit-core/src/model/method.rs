//! Declared methods and the callables behind them.
//!
//! A [`MethodDecl`] records a method's name, receiver, parameter slots and
//! return shape exactly as declared, whether or not that shape is one the
//! binding resolver accepts. Accepted declarations also carry a
//! [`MethodBody`] the pipeline can call.

use std::any::{TypeId, type_name};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use super::short_type_name;
use crate::error::BoxError;
use crate::http::HttpContext;
use crate::value::{BoundValue, bound};

/// Name of the text-parsing capability method.
pub const TRY_PARSE: &str = "try_parse";

/// Name of the asynchronous self-binding capability method.
pub const BIND_ASYNC: &str = "bind_async";

/// A reference to a Rust type inside a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeRef {
    id: TypeId,
    name: String,
}

impl TypeRef {
    /// Refers to `T`.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: short_type_name(type_name::<T>()),
        }
    }

    /// The referenced type's id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The referenced type's display name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Culture-style formatting information passed to `try_parse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatProvider {
    name: &'static str,
}

impl FormatProvider {
    /// The invariant provider used for all request binding.
    pub const INVARIANT: FormatProvider = FormatProvider { name: "invariant" };

    /// The provider's name.
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Describes the handler parameter being bound, for `bind_async`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterInfo {
    name: String,
    type_name: String,
    position: usize,
}

impl ParameterInfo {
    /// Creates parameter information.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            position,
        }
    }

    /// The parameter name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declared parameter type.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Zero-based position in the handler's parameter list.
    pub fn position(&self) -> usize {
        self.position
    }
}

/// Whether a method is associated with the type or with an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// An associated function.
    Static,
    /// Takes `&self`.
    Instance,
}

/// One declared parameter of a method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// `&str`.
    Text,
    /// `&FormatProvider`.
    FormatProvider,
    /// The parsed value, written on success.
    Out(TypeRef),
    /// `HttpContext`.
    Context,
    /// `ParameterInfo`.
    ParameterInfo,
    /// Anything else.
    Other(String),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("&str"),
            Self::FormatProvider => f.write_str("&FormatProvider"),
            Self::Out(ty) => write!(f, "out {ty}"),
            Self::Context => f.write_str("HttpContext"),
            Self::ParameterInfo => f.write_str("ParameterInfo"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// A method's declared return shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Returns {
    /// `bool`.
    Bool,
    /// `impl Future<Output = T>`.
    Future(TypeRef),
    /// `()`.
    Unit,
    /// Anything else.
    Other(String),
}

impl fmt::Display for Returns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Future(ty) => write!(f, "Future<Output = {ty}>"),
            Self::Unit => f.write_str("()"),
            Self::Other(text) => f.write_str(text),
        }
    }
}

/// Parses text into a value; `None` means the text was rejected.
pub type TryParseFn =
    Arc<dyn Fn(&str, Option<&FormatProvider>) -> Option<BoundValue> + Send + Sync>;

/// Binds a value from the whole request; `Ok(None)` means "no value".
pub type BindAsyncFn = Arc<
    dyn Fn(HttpContext, Option<ParameterInfo>) -> BoxFuture<'static, Result<Option<BoundValue>, BoxError>>
        + Send
        + Sync,
>;

/// The callable behind an accepted declaration.
#[derive(Clone)]
pub enum MethodBody {
    /// A text parser.
    TryParse(TryParseFn),
    /// An asynchronous binder.
    BindAsync(BindAsyncFn),
}

impl fmt::Debug for MethodBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TryParse(_) => f.write_str("TryParse(..)"),
            Self::BindAsync(_) => f.write_str("BindAsync(..)"),
        }
    }
}

/// A method as declared on a type or capability interface.
#[derive(Debug, Clone)]
pub struct MethodDecl {
    name: String,
    receiver: Receiver,
    params: Vec<Slot>,
    returns: Returns,
    body: Option<MethodBody>,
}

impl MethodDecl {
    /// Declares a method without a body.
    ///
    /// Used for interface members without a default implementation and for
    /// recording shapes the resolver must reject.
    pub fn new(
        name: impl Into<String>,
        receiver: Receiver,
        params: Vec<Slot>,
        returns: Returns,
    ) -> Self {
        Self {
            name: name.into(),
            receiver,
            params,
            returns,
            body: None,
        }
    }

    /// Attaches a body.
    pub fn with_body(mut self, body: MethodBody) -> Self {
        self.body = Some(body);
        self
    }

    /// `static bool try_parse(&str, &FormatProvider, out T)`.
    pub fn try_parse<T, F>(parse: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str, &FormatProvider) -> Option<T> + Send + Sync + 'static,
    {
        let body: TryParseFn = Arc::new(move |text: &str, provider: Option<&FormatProvider>| {
            parse(text, provider.unwrap_or(&FormatProvider::INVARIANT)).map(bound)
        });
        Self::new(
            TRY_PARSE,
            Receiver::Static,
            vec![Slot::Text, Slot::FormatProvider, Slot::Out(TypeRef::of::<T>())],
            Returns::Bool,
        )
        .with_body(MethodBody::TryParse(body))
    }

    /// `static bool try_parse(&str, out T)`.
    pub fn try_parse_invariant<T, F>(parse: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        let body: TryParseFn =
            Arc::new(move |text: &str, _: Option<&FormatProvider>| parse(text).map(bound));
        Self::new(
            TRY_PARSE,
            Receiver::Static,
            vec![Slot::Text, Slot::Out(TypeRef::of::<T>())],
            Returns::Bool,
        )
        .with_body(MethodBody::TryParse(body))
    }

    /// `static Future<Output = T> bind_async(HttpContext, ParameterInfo)`.
    pub fn bind_async<T, F, Fut>(bind: F) -> Self
    where
        T: Send + 'static,
        F: Fn(HttpContext, ParameterInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let body: BindAsyncFn = Arc::new(move |ctx: HttpContext, info: Option<ParameterInfo>| {
            let info = info.unwrap_or_else(|| ParameterInfo::new("", type_name::<T>(), 0));
            bind(ctx, info)
                .map(|result| result.map(|value| value.map(bound)))
                .boxed()
        });
        Self::new(
            BIND_ASYNC,
            Receiver::Static,
            vec![Slot::Context, Slot::ParameterInfo],
            Returns::Future(TypeRef::of::<T>()),
        )
        .with_body(MethodBody::BindAsync(body))
    }

    /// `static Future<Output = T> bind_async(HttpContext)`.
    pub fn bind_async_context<T, F, Fut>(bind: F) -> Self
    where
        T: Send + 'static,
        F: Fn(HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        let body: BindAsyncFn = Arc::new(move |ctx: HttpContext, _: Option<ParameterInfo>| {
            bind(ctx)
                .map(|result| result.map(|value| value.map(bound)))
                .boxed()
        });
        Self::new(
            BIND_ASYNC,
            Receiver::Static,
            vec![Slot::Context],
            Returns::Future(TypeRef::of::<T>()),
        )
        .with_body(MethodBody::BindAsync(body))
    }

    /// The method name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The receiver.
    pub fn receiver(&self) -> Receiver {
        self.receiver
    }

    /// Returns `true` for associated functions.
    pub fn is_static(&self) -> bool {
        self.receiver == Receiver::Static
    }

    /// The declared parameter slots.
    pub fn params(&self) -> &[Slot] {
        &self.params
    }

    /// The declared return shape.
    pub fn returns(&self) -> &Returns {
        &self.returns
    }

    /// The callable, if the method has one.
    pub fn body(&self) -> Option<&MethodBody> {
        self.body.as_ref()
    }
}

impl fmt::Display for MethodDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_static() {
            f.write_str("static ")?;
        }
        write!(f, "{} {}(", self.returns, self.name)?;
        for (i, slot) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{slot}")?;
        }
        f.write_str(")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::downcast;

    #[test]
    fn test_try_parse_declaration_shape() {
        let decl = MethodDecl::try_parse(|text: &str, _| text.parse::<u16>().ok());
        assert_eq!(
            decl.to_string(),
            "static bool try_parse(&str, &FormatProvider, out u16)"
        );
        let Some(MethodBody::TryParse(parse)) = decl.body() else {
            panic!("expected a try_parse body");
        };
        assert_eq!(downcast::<u16>(parse("8080", None).unwrap()).unwrap(), 8080);
        assert!(parse("nope", None).is_none());
    }

    #[test]
    fn test_invalid_declaration_display() {
        let decl = MethodDecl::new(
            TRY_PARSE,
            Receiver::Instance,
            vec![Slot::Text],
            Returns::Other("i32".into()),
        );
        assert_eq!(decl.to_string(), "i32 try_parse(&str)");
        assert!(decl.body().is_none());
    }

    #[tokio::test]
    async fn test_bind_async_context_body() {
        let decl = MethodDecl::bind_async_context(|ctx: HttpContext| async move {
            Ok::<_, BoxError>(Some(ctx.request().method().to_string()))
        });
        let Some(MethodBody::BindAsync(bind)) = decl.body() else {
            panic!("expected a bind_async body");
        };
        let ctx = HttpContext::new(crate::http::HttpRequest::builder().method("PUT").build());
        let value = bind(ctx, None).await.unwrap().unwrap();
        assert_eq!(downcast::<String>(value).unwrap(), "PUT");
    }
}
