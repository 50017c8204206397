//! Typed handlers and their erased descriptors.
//!
//! Any `Fn` taking up to twelve [`Bindable`] parameters and returning a
//! [`Reply`] (directly, or through a future) can be turned into a
//! [`HandlerDescriptor`]: the parameter list the compiler classifies, the
//! reply shape the result adapter normalises, and an erased invoker taking
//! positional [`Arguments`].
//!
//! Parameter names and annotations are not visible to the type system, so
//! they are attached with [`HandlerDescriptor::with_params`] (or generated by
//! the `#[endpoint]` attribute).
//!
//! # Example
//!
//! ```rust,ignore
//! async fn get_todo(id: u32, verbose: Option<bool>) -> Json<Todo> { ... }
//!
//! let descriptor = handler_fn(get_todo).with_params([
//!     ParamSpec::new("id").from_route(),
//!     ParamSpec::new("verbose"),
//! ]);
//! ```

use std::any::type_name;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use conduit_core::model::short_type_name;
use conduit_core::{Arguments, BindError, Bindable};
use futures::FutureExt;
use futures::future::BoxFuture;

use crate::parameter::{ParamSpec, ParameterDescriptor};
use crate::reply::{Reply, ReplyModel, ReplyValue};

/// A type-erased handler invoked with positional arguments.
pub type ErasedHandler =
    Arc<dyn Fn(Arguments) -> BoxFuture<'static, Result<ReplyValue, BindError>> + Send + Sync>;

// ============================================================================
// Handler traits
// ============================================================================

/// An asynchronous handler taking the parameters `T` and producing `R`.
pub trait Handler<T, R>: Clone + Send + Sync + 'static {
    /// Describes the parameters, unnamed, in declaration order.
    fn parameters() -> Vec<ParameterDescriptor>;

    /// Erases the handler.
    fn into_erased(self) -> ErasedHandler;
}

/// A synchronous handler taking the parameters `T` and returning `R`.
pub trait SyncHandler<T, R>: Clone + Send + Sync + 'static {
    /// Describes the parameters, unnamed, in declaration order.
    fn parameters() -> Vec<ParameterDescriptor>;

    /// Erases the handler.
    fn into_erased(self) -> ErasedHandler;
}

macro_rules! impl_handler {
    (
        $($ty:ident),*
    ) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, Fut, R, $($ty,)*> Handler<($($ty,)*), R> for F
        where
            F: Fn($($ty,)*) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = R> + Send + 'static,
            R: Reply,
            $( $ty: Bindable, )*
        {
            fn parameters() -> Vec<ParameterDescriptor> {
                let mut parameters = Vec::new();
                $(
                    parameters.push(ParameterDescriptor::of::<$ty>().at(parameters.len()));
                )*
                parameters
            }

            fn into_erased(self) -> ErasedHandler {
                Arc::new(
                    move |mut args: Arguments| -> BoxFuture<'static, Result<ReplyValue, BindError>> {
                        let handler = self.clone();
                        async move {
                            $(
                                let $ty = args.next::<$ty>()?;
                            )*
                            Ok((handler)($($ty,)*).await.into_reply())
                        }
                        .boxed()
                    },
                )
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<F, R, $($ty,)*> SyncHandler<($($ty,)*), R> for F
        where
            F: Fn($($ty,)*) -> R + Clone + Send + Sync + 'static,
            R: Reply,
            $( $ty: Bindable, )*
        {
            fn parameters() -> Vec<ParameterDescriptor> {
                let mut parameters = Vec::new();
                $(
                    parameters.push(ParameterDescriptor::of::<$ty>().at(parameters.len()));
                )*
                parameters
            }

            fn into_erased(self) -> ErasedHandler {
                Arc::new(
                    move |mut args: Arguments| -> BoxFuture<'static, Result<ReplyValue, BindError>> {
                        let handler = self.clone();
                        async move {
                            $(
                                let $ty = args.next::<$ty>()?;
                            )*
                            Ok((handler)($($ty,)*).into_reply())
                        }
                        .boxed()
                    },
                )
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);
impl_handler!(T1, T2, T3, T4, T5, T6, T7);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11);
impl_handler!(T1, T2, T3, T4, T5, T6, T7, T8, T9, T10, T11, T12);

// ============================================================================
// HandlerDescriptor
// ============================================================================

/// A handler as the compiler sees it.
#[derive(Clone)]
pub struct HandlerDescriptor {
    name: String,
    parameters: Vec<ParameterDescriptor>,
    reply: ReplyModel,
    invoke: ErasedHandler,
    nullability_tracking: bool,
}

impl HandlerDescriptor {
    /// Describes an erased handler directly.
    pub fn new(
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
        reply: ReplyModel,
        invoke: ErasedHandler,
    ) -> Self {
        Self {
            name: name.into(),
            parameters,
            reply,
            invoke,
            nullability_tracking: true,
        }
    }

    /// Renames the handler.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Applies names, annotations and defaults to the parameters, in order.
    ///
    /// Extra specs are ignored; parameters without a spec keep their
    /// current description.
    pub fn with_params<I>(mut self, specs: I) -> Self
    where
        I: IntoIterator<Item = ParamSpec>,
    {
        let parameters = std::mem::take(&mut self.parameters);
        let mut specs = specs.into_iter();
        self.parameters = parameters
            .into_iter()
            .map(|parameter| match specs.next() {
                Some(spec) => spec.apply(parameter),
                None => parameter,
            })
            .collect();
        self
    }

    /// Treats non-nullable text, object and sequence parameters with a
    /// type default as optional.
    pub fn without_nullability_tracking(mut self) -> Self {
        self.nullability_tracking = false;
        self
    }

    /// The handler name, used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parameters, in declaration order.
    pub fn parameters(&self) -> &[ParameterDescriptor] {
        &self.parameters
    }

    /// The return shape.
    pub fn reply(&self) -> &ReplyModel {
        &self.reply
    }

    /// Returns `true` unless nullability tracking was disabled.
    pub fn nullability_tracking(&self) -> bool {
        self.nullability_tracking
    }

    pub(crate) fn invoker(&self) -> &ErasedHandler {
        &self.invoke
    }
}

impl fmt::Debug for HandlerDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .field("reply", &self.reply)
            .field("nullability_tracking", &self.nullability_tracking)
            .finish_non_exhaustive()
    }
}

/// Describes an asynchronous handler.
pub fn handler_fn<F, T, R>(handler: F) -> HandlerDescriptor
where
    F: Handler<T, R>,
    R: Reply,
{
    HandlerDescriptor::new(
        short_type_name(type_name::<F>()),
        <F as Handler<T, R>>::parameters(),
        R::reply_model(),
        <F as Handler<T, R>>::into_erased(handler),
    )
}

/// Describes a synchronous handler.
pub fn sync_handler_fn<F, T, R>(handler: F) -> HandlerDescriptor
where
    F: SyncHandler<T, R>,
    R: Reply,
{
    HandlerDescriptor::new(
        short_type_name(type_name::<F>()),
        <F as SyncHandler<T, R>>::parameters(),
        R::reply_model(),
        <F as SyncHandler<T, R>>::into_erased(handler),
    )
}
