//! Models of standard and framework types.

use std::net::IpAddr;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::{Bindable, SpecialKind, TypeModel};
use crate::http::{
    FormCollection, FormFile, FormFileCollection, HttpContext, HttpRequest, HttpResponse,
    RequestBody, TraceIdentifier, User,
};

macro_rules! impl_value_model {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn type_model() -> TypeModel {
                    TypeModel::value::<$ty>().default_value().build()
                }
            }
        )*
    };
}

impl_value_model!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64, bool, char,
);

impl Bindable for IpAddr {
    fn type_model() -> TypeModel {
        TypeModel::value::<IpAddr>().build()
    }
}

impl Bindable for String {
    fn type_model() -> TypeModel {
        TypeModel::text()
    }
}

impl<T: Bindable> Bindable for Option<T> {
    fn type_model() -> TypeModel {
        TypeModel::nullable_of::<T>()
    }
}

impl<T: Bindable> Bindable for Vec<T> {
    fn type_model() -> TypeModel {
        TypeModel::sequence_of::<T>()
    }
}

impl<T: Send + Sync + 'static> Bindable for Arc<T> {
    fn type_model() -> TypeModel {
        TypeModel::service::<T>()
    }
}

macro_rules! impl_special_model {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl Bindable for $ty {
                fn type_model() -> TypeModel {
                    TypeModel::special_of::<$ty>(SpecialKind::$kind)
                }
            }
        )*
    };
}

impl_special_model!(
    HttpContext => Context,
    HttpRequest => Request,
    HttpResponse => Response,
    CancellationToken => Cancellation,
    User => User,
    TraceIdentifier => TraceIdentifier,
    RequestBody => BodyStream,
    FormCollection => FormCollection,
    FormFile => FormFile,
    FormFileCollection => FormFileCollection,
);
