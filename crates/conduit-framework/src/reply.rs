//! Handler return values.
//!
//! A handler's return type implements [`Reply`]. The type describes its shape
//! once, at compile time, through [`Reply::reply_model`]; each returned value
//! is converted into a [`ReplyValue`] that the result writer knows how to
//! write.
//!
//! # Example
//!
//! ```rust,ignore
//! // Written as text/plain.
//! async fn hello() -> String { "hello".into() }
//!
//! // Written as JSON, `null` when absent.
//! async fn find(id: u32) -> Option<Json<Todo>> { ... }
//!
//! // Streamed as a JSON array.
//! fn numbers() -> Sequence<impl Stream<Item = u32> + Send> { ... }
//! ```

use std::fmt;
use std::future::Future;

use conduit_core::BoxError;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde::Serialize;

use crate::result::HttpResult;

/// The static shape of a handler's return type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyModel {
    /// No content.
    Empty,
    /// Written as `text/plain`.
    Text,
    /// Written as JSON.
    Json,
    /// `Option<T>`.
    Nullable(Box<ReplyModel>),
    /// A self-describing result.
    Result {
        /// The result may be absent.
        nullable: bool,
    },
    /// A value produced later.
    Awaitable {
        /// The awaitable itself may be absent.
        nullable: bool,
        /// The awaited value's shape.
        inner: Box<ReplyModel>,
    },
    /// A stream of values, written element by element.
    Sequence(Box<ReplyModel>),
}

impl fmt::Display for ReplyModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("()"),
            Self::Text => f.write_str("String"),
            Self::Json => f.write_str("Json"),
            Self::Nullable(inner) => write!(f, "Option<{inner}>"),
            Self::Result { nullable: false } => f.write_str("Box<dyn HttpResult>"),
            Self::Result { nullable: true } => f.write_str("Option<Box<dyn HttpResult>>"),
            Self::Awaitable { nullable, inner } => {
                if *nullable {
                    write!(f, "Option<Deferred<{inner}>>")
                } else {
                    write!(f, "Deferred<{inner}>")
                }
            }
            Self::Sequence(inner) => write!(f, "Sequence<{inner}>"),
        }
    }
}

/// One returned value, ready to be written.
pub enum ReplyValue {
    /// Nothing to write.
    Empty,
    /// Text.
    Text(String),
    /// Serialized JSON, or the serialization failure.
    Json(Result<Vec<u8>, serde_json::Error>),
    /// An absent optional value.
    Null,
    /// A self-describing result.
    Result(Box<dyn HttpResult>),
    /// A value produced later.
    Awaitable(BoxFuture<'static, ReplyValue>),
    /// Values produced one by one.
    Sequence(BoxStream<'static, ReplyValue>),
    /// The handler failed.
    Failed(BoxError),
}

impl fmt::Debug for ReplyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Self::Json(Ok(bytes)) => f
                .debug_tuple("Json")
                .field(&String::from_utf8_lossy(bytes))
                .finish(),
            Self::Json(Err(e)) => f.debug_tuple("Json").field(e).finish(),
            Self::Null => f.write_str("Null"),
            Self::Result(_) => f.write_str("Result(..)"),
            Self::Awaitable(_) => f.write_str("Awaitable(..)"),
            Self::Sequence(_) => f.write_str("Sequence(..)"),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

/// A type a handler can return.
pub trait Reply: Send + 'static {
    /// The static shape of the type.
    fn reply_model() -> ReplyModel;

    /// Converts a returned value.
    fn into_reply(self) -> ReplyValue;
}

impl Reply for () {
    fn reply_model() -> ReplyModel {
        ReplyModel::Empty
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Empty
    }
}

impl Reply for String {
    fn reply_model() -> ReplyModel {
        ReplyModel::Text
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Text(self)
    }
}

impl Reply for &'static str {
    fn reply_model() -> ReplyModel {
        ReplyModel::Text
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Text(self.to_string())
    }
}

macro_rules! impl_json_reply {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Reply for $ty {
                fn reply_model() -> ReplyModel {
                    ReplyModel::Json
                }

                fn into_reply(self) -> ReplyValue {
                    ReplyValue::Json(serde_json::to_vec(&self))
                }
            }
        )*
    };
}

impl_json_reply!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
);

/// Serializes the wrapped value as JSON.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Json<T>(pub T);

impl<T: Serialize + Send + 'static> Reply for Json<T> {
    fn reply_model() -> ReplyModel {
        ReplyModel::Json
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Json(serde_json::to_vec(&self.0))
    }
}

impl<T: Reply> Reply for Option<T> {
    fn reply_model() -> ReplyModel {
        ReplyModel::Nullable(Box::new(T::reply_model()))
    }

    fn into_reply(self) -> ReplyValue {
        match self {
            Some(value) => value.into_reply(),
            None => ReplyValue::Null,
        }
    }
}

/// `Ok` is written as `T`; `Err` fails the invocation with the error unchanged.
impl<T, E> Reply for Result<T, E>
where
    T: Reply,
    E: Into<BoxError> + Send + 'static,
{
    fn reply_model() -> ReplyModel {
        T::reply_model()
    }

    fn into_reply(self) -> ReplyValue {
        match self {
            Ok(value) => value.into_reply(),
            Err(e) => ReplyValue::Failed(e.into()),
        }
    }
}

impl Reply for Box<dyn HttpResult> {
    fn reply_model() -> ReplyModel {
        ReplyModel::Result { nullable: false }
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Result(self)
    }
}

/// A reply produced by a future the result writer awaits.
///
/// Lets a synchronous handler hand back work that completes later.
pub struct Deferred<R> {
    future: BoxFuture<'static, R>,
}

impl<R: Reply> Deferred<R> {
    /// Wraps `future`.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = R> + Send + 'static,
    {
        Self {
            future: future.boxed(),
        }
    }
}

impl<R> fmt::Debug for Deferred<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

impl<R: Reply> Reply for Deferred<R> {
    fn reply_model() -> ReplyModel {
        ReplyModel::Awaitable {
            nullable: false,
            inner: Box::new(R::reply_model()),
        }
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Awaitable(self.future.map(Reply::into_reply).boxed())
    }
}

/// Streams the wrapped values as a JSON array.
pub struct Sequence<S> {
    stream: S,
}

impl<S> Sequence<S> {
    /// Wraps `stream`.
    pub fn new(stream: S) -> Self {
        Self { stream }
    }
}

impl<S> fmt::Debug for Sequence<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sequence(..)")
    }
}

impl<S> Reply for Sequence<S>
where
    S: Stream + Send + 'static,
    S::Item: Reply,
{
    fn reply_model() -> ReplyModel {
        ReplyModel::Sequence(Box::new(<S::Item as Reply>::reply_model()))
    }

    fn into_reply(self) -> ReplyValue {
        ReplyValue::Sequence(self.stream.map(Reply::into_reply).boxed())
    }
}

#[cfg(test)]
mod tests {
    use futures::stream;

    use super::*;

    #[test]
    fn test_reply_models() {
        assert_eq!(<()>::reply_model(), ReplyModel::Empty);
        assert_eq!(String::reply_model(), ReplyModel::Text);
        assert_eq!(u32::reply_model(), ReplyModel::Json);
        assert_eq!(
            Option::<Json<Vec<u8>>>::reply_model(),
            ReplyModel::Nullable(Box::new(ReplyModel::Json))
        );
        assert_eq!(
            Result::<String, std::io::Error>::reply_model(),
            ReplyModel::Text
        );
        assert_eq!(
            Deferred::<Box<dyn HttpResult>>::reply_model().to_string(),
            "Deferred<Box<dyn HttpResult>>"
        );
    }

    #[test]
    fn test_sequence_model_names_element() {
        type Numbers = Sequence<stream::Iter<std::vec::IntoIter<i64>>>;
        assert_eq!(
            Numbers::reply_model(),
            ReplyModel::Sequence(Box::new(ReplyModel::Json))
        );
    }

    #[test]
    fn test_values() {
        assert!(matches!(
            Json(vec![1, 2]).into_reply(),
            ReplyValue::Json(Ok(bytes)) if bytes == b"[1,2]"
        ));
        assert!(matches!(None::<String>.into_reply(), ReplyValue::Null));
        let failed: Result<(), std::io::Error> = Err(std::io::Error::other("boom"));
        assert!(matches!(failed.into_reply(), ReplyValue::Failed(e) if e.to_string() == "boom"));
    }
}
