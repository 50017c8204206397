//! Builders for [`TypeModel`].

use std::any::{TypeId, type_name};
use std::future::Future;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::{DeserializeOwned, Error as _};

use super::interface::CapabilityInterface;
use super::method::{FormatProvider, MethodDecl, ParameterInfo, TryParseFn};
use super::record::{ConstructorDecl, MemberDecl, PropertyDecl};
use super::{
    Bindable, CollectFn, EnumModel, EnumVariant, JsonDecoder, NullableModel, SequenceModel,
    SpecialKind, TypeKind, TypeModel, ValueFactory, WrapFn, model_of, short_type_name,
};
use crate::error::{BindError, BoxError};
use crate::http::HttpContext;
use crate::value::{Arguments, BoundValue, bound, downcast};

fn json_decoder<T: DeserializeOwned + Send + 'static>() -> JsonDecoder {
    Arc::new(|value: serde_json::Value| serde_json::from_value::<T>(value).map(bound))
}

fn mismatch(err: BindError) -> serde_json::Error {
    serde_json::Error::custom(err)
}

impl TypeModel {
    /// Starts a model of kind `kind` for `T`.
    pub fn builder<T: Send + 'static>(kind: TypeKind) -> TypeModelBuilder<T> {
        TypeModelBuilder {
            name: short_type_name(type_name::<T>()),
            kind,
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            is_abstract: false,
            json: None,
            default_value: None,
            _marker: PhantomData,
        }
    }

    /// Starts a model of a user-defined type.
    pub fn object<T: Send + 'static>() -> TypeModelBuilder<T> {
        Self::builder(TypeKind::Object)
    }

    /// Starts a model of a scalar parsed with [`FromStr`] and decoded with serde.
    pub fn value<T>() -> TypeModelBuilder<T>
    where
        T: FromStr + DeserializeOwned + Send + 'static,
    {
        Self::builder(TypeKind::Value)
            .try_parse(|text: &str, _: &FormatProvider| text.parse::<T>().ok())
            .json()
    }

    /// The model of `String`.
    pub fn text() -> TypeModel {
        Self::builder::<String>(TypeKind::Text)
            .json()
            .default_value()
            .build()
    }

    /// Starts a model of an enumeration.
    pub fn enumeration_of<T: Clone + Send + Sync + 'static>() -> EnumModelBuilder<T> {
        EnumModelBuilder {
            name: short_type_name(type_name::<T>()),
            variants: Vec::new(),
            json: None,
        }
    }

    /// The model of `Option<T>`.
    pub fn nullable_of<T: Bindable>() -> TypeModel {
        let inner = model_of::<T>();
        let json = inner.json.clone().map(|decode| -> JsonDecoder {
            Arc::new(move |value: serde_json::Value| {
                if value.is_null() {
                    return Ok(bound(None::<T>));
                }
                let decoded = decode(value)?;
                downcast::<T>(decoded)
                    .map(|v| bound(Some(v)))
                    .map_err(mismatch)
            })
        });
        let some: WrapFn =
            Arc::new(|value: BoundValue| downcast::<T>(value).map(|v| bound(Some(v))));
        let none: ValueFactory = Arc::new(|| bound(None::<T>));
        TypeModel {
            id: TypeId::of::<Option<T>>(),
            name: format!("Option<{}>", inner.name),
            kind: TypeKind::Nullable(NullableModel { inner, some, none }),
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            is_abstract: false,
            json,
            default_value: None,
        }
    }

    /// The model of `Vec<T>`.
    pub fn sequence_of<T: Bindable>() -> TypeModel {
        let element = model_of::<T>();
        let collect: CollectFn = Arc::new(|values: Vec<BoundValue>| {
            values
                .into_iter()
                .map(downcast::<T>)
                .collect::<Result<Vec<T>, _>>()
                .map(bound)
        });
        let json = element.json.clone().map(|decode| -> JsonDecoder {
            Arc::new(move |value: serde_json::Value| {
                let serde_json::Value::Array(items) = value else {
                    return Err(serde_json::Error::custom("expected a JSON array"));
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(downcast::<T>(decode(item)?).map_err(mismatch)?);
                }
                Ok(bound(out))
            })
        });
        TypeModel {
            id: TypeId::of::<Vec<T>>(),
            name: format!("Vec<{}>", element.name),
            kind: TypeKind::Sequence(SequenceModel { element, collect }),
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            is_abstract: false,
            json,
            default_value: Some(Arc::new(|| bound(Vec::<T>::new()))),
        }
    }

    /// The model of a shared service `Arc<T>`.
    pub fn service<T: Send + Sync + 'static>() -> TypeModel {
        Self::builder::<Arc<T>>(TypeKind::Service).build()
    }

    /// The model of a framework context type.
    pub fn special_of<T: Send + 'static>(kind: SpecialKind) -> TypeModel {
        Self::builder::<T>(TypeKind::Special(kind)).build()
    }
}

/// Builder for object and scalar models.
pub struct TypeModelBuilder<T> {
    name: String,
    kind: TypeKind,
    base: Option<Arc<TypeModel>>,
    interfaces: Vec<Arc<CapabilityInterface>>,
    methods: Vec<MethodDecl>,
    constructors: Vec<ConstructorDecl>,
    properties: Vec<PropertyDecl>,
    is_abstract: bool,
    json: Option<JsonDecoder>,
    default_value: Option<ValueFactory>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Send + 'static> TypeModelBuilder<T> {
    /// Overrides the display name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the base type.
    pub fn base(mut self, base: Arc<TypeModel>) -> Self {
        self.base = Some(base);
        self
    }

    /// Sets the base type to `B`.
    pub fn base_of<B: Bindable>(self) -> Self {
        self.base(model_of::<B>())
    }

    /// Implements a capability interface.
    pub fn implements(mut self, interface: Arc<CapabilityInterface>) -> Self {
        self.interfaces.push(interface);
        self
    }

    /// Declares a method as-is.
    pub fn method(mut self, decl: MethodDecl) -> Self {
        self.methods.push(decl);
        self
    }

    /// Declares `static bool try_parse(&str, &FormatProvider, out T)`.
    pub fn try_parse<F>(self, parse: F) -> Self
    where
        F: Fn(&str, &FormatProvider) -> Option<T> + Send + Sync + 'static,
    {
        self.method(MethodDecl::try_parse(parse))
    }

    /// Declares `static bool try_parse(&str, out T)`.
    pub fn try_parse_invariant<F>(self, parse: F) -> Self
    where
        F: Fn(&str) -> Option<T> + Send + Sync + 'static,
    {
        self.method(MethodDecl::try_parse_invariant(parse))
    }

    /// Declares `static Future<Output = T> bind_async(HttpContext, ParameterInfo)`.
    pub fn bind_async<F, Fut>(self, bind: F) -> Self
    where
        F: Fn(HttpContext, ParameterInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        self.method(MethodDecl::bind_async(bind))
    }

    /// Declares `static Future<Output = T> bind_async(HttpContext)`.
    pub fn bind_async_context<F, Fut>(self, bind: F) -> Self
    where
        F: Fn(HttpContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Option<T>, BoxError>> + Send + 'static,
    {
        self.method(MethodDecl::bind_async_context(bind))
    }

    /// Enables JSON body decoding through serde.
    pub fn json(mut self) -> Self
    where
        T: DeserializeOwned,
    {
        self.json = Some(json_decoder::<T>());
        self
    }

    /// Uses `T::default()` as the type's default value.
    pub fn default_value(mut self) -> Self
    where
        T: Default,
    {
        self.default_value = Some(Arc::new(|| bound(T::default())));
        self
    }

    /// Marks the type as abstract.
    pub fn abstract_type(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    /// Declares a public constructor.
    pub fn constructor<F>(mut self, parameters: Vec<MemberDecl>, construct: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BindError> + Send + Sync + 'static,
    {
        self.constructors
            .push(ConstructorDecl::new(true, parameters, construct));
        self
    }

    /// Declares a non-public constructor.
    pub fn private_constructor<F>(mut self, parameters: Vec<MemberDecl>, construct: F) -> Self
    where
        F: Fn(Arguments) -> Result<T, BindError> + Send + Sync + 'static,
    {
        self.constructors
            .push(ConstructorDecl::new(false, parameters, construct));
        self
    }

    /// Declares a public settable property.
    pub fn settable<P, F>(self, name: impl Into<String>, set: F) -> Self
    where
        P: Bindable,
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        self.property(PropertyDecl::settable::<T, P, F>(name, set))
    }

    /// Declares a public read-only property.
    pub fn readonly<P: Bindable>(self, name: impl Into<String>) -> Self {
        self.property(PropertyDecl::readonly::<P>(name))
    }

    /// Declares a property as-is.
    pub fn property(mut self, property: PropertyDecl) -> Self {
        self.properties.push(property);
        self
    }

    /// Finishes the model.
    pub fn build(self) -> TypeModel {
        TypeModel {
            id: TypeId::of::<T>(),
            name: self.name,
            kind: self.kind,
            base: self.base,
            interfaces: self.interfaces,
            methods: self.methods,
            constructors: self.constructors,
            properties: self.properties,
            is_abstract: self.is_abstract,
            json: self.json,
            default_value: self.default_value,
        }
    }
}

/// Builder for enumeration models.
pub struct EnumModelBuilder<T> {
    name: String,
    variants: Vec<(&'static str, i64, T)>,
    json: Option<JsonDecoder>,
}

impl<T: Clone + Send + Sync + 'static> EnumModelBuilder<T> {
    /// Adds a variant.
    pub fn variant(mut self, name: &'static str, discriminant: i64, value: T) -> Self {
        self.variants.push((name, discriminant, value));
        self
    }

    /// Enables JSON body decoding through serde.
    pub fn json(mut self) -> Self
    where
        T: DeserializeOwned,
    {
        self.json = Some(json_decoder::<T>());
        self
    }

    /// Finishes the model.
    pub fn build(self) -> TypeModel {
        let table: Arc<[(&'static str, i64, T)]> = Arc::from(self.variants);
        let variants: Arc<[EnumVariant]> = table
            .iter()
            .map(|(name, discriminant, value)| {
                let value = value.clone();
                EnumVariant {
                    name: *name,
                    discriminant: *discriminant,
                    value: Arc::new(move || bound(value.clone())),
                }
            })
            .collect();
        let generic: TryParseFn = Arc::new(move |text: &str, _: Option<&FormatProvider>| {
            let found = table.iter().find(|(name, _, _)| *name == text).or_else(|| {
                let discriminant = text.trim().parse::<i64>().ok()?;
                table.iter().find(|(_, d, _)| *d == discriminant)
            })?;
            Some(bound(found.2.clone()))
        });
        TypeModel {
            id: TypeId::of::<T>(),
            name: self.name,
            kind: TypeKind::Enum(EnumModel { variants, generic }),
            base: None,
            interfaces: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
            properties: Vec::new(),
            is_abstract: false,
            json: self.json,
            default_value: None,
        }
    }
}
