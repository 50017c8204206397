//! Type metadata consulted when a handler is compiled.
//!
//! Rust has no runtime reflection, so every type that can appear as a
//! handler parameter describes itself through [`Bindable::type_model`]. A
//! [`TypeModel`] records what the binding machinery needs to know about a
//! type: its kind, the methods it declares (valid or not), its base type and
//! capability interfaces, constructors and properties for record binding,
//! and optional JSON and default-value support.
//!
//! Models are memoised per type by [`model_of`].
//!
//! # Example
//!
//! ```rust,ignore
//! use conduit_core::model::{Bindable, TypeModel};
//!
//! #[derive(Clone, serde::Deserialize)]
//! struct Point { x: i32, y: i32 }
//!
//! impl Bindable for Point {
//!     fn type_model() -> TypeModel {
//!         TypeModel::object::<Point>()
//!             .json()
//!             .try_parse_invariant(|text| {
//!                 let (x, y) = text.split_once(',')?;
//!                 Some(Point { x: x.parse().ok()?, y: y.parse().ok()? })
//!             })
//!             .build()
//!     }
//! }
//! ```

mod annotation;
mod builder;
mod builtin;
mod interface;
mod method;
mod record;

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::error::BindError;
use crate::value::BoundValue;

pub use annotation::SourceAnnotation;
pub use builder::{EnumModelBuilder, TypeModelBuilder};
pub use interface::CapabilityInterface;
pub use method::{
    BIND_ASYNC, BindAsyncFn, FormatProvider, MethodBody, MethodDecl, ParameterInfo, Receiver,
    Returns, Slot, TRY_PARSE, TryParseFn, TypeRef,
};
pub use record::{AssignFn, ConstructFn, ConstructorDecl, MemberDecl, PropertyDecl};

/// Produces a fresh value.
pub type ValueFactory = Arc<dyn Fn() -> BoundValue + Send + Sync>;

/// Converts one erased value into another.
pub type WrapFn = Arc<dyn Fn(BoundValue) -> Result<BoundValue, BindError> + Send + Sync>;

/// Collects erased elements into an erased collection.
pub type CollectFn = Arc<dyn Fn(Vec<BoundValue>) -> Result<BoundValue, BindError> + Send + Sync>;

/// Decodes a JSON document into an erased value.
pub type JsonDecoder =
    Arc<dyn Fn(serde_json::Value) -> Result<BoundValue, serde_json::Error> + Send + Sync>;

/// A type that can appear as a handler parameter.
pub trait Bindable: Send + 'static {
    /// Describes the type.
    fn type_model() -> TypeModel;
}

static REGISTRY: LazyLock<RwLock<HashMap<TypeId, Arc<TypeModel>>>> =
    LazyLock::new(Default::default);

/// The memoised model of `T`.
///
/// Building a model may build the models of its members, so no lock is held
/// while [`Bindable::type_model`] runs. Concurrent first calls may build the
/// model twice; the first one stored wins.
pub fn model_of<T: Bindable>() -> Arc<TypeModel> {
    let id = TypeId::of::<T>();
    if let Some(model) = REGISTRY.read().get(&id) {
        return model.clone();
    }
    let model = Arc::new(T::type_model());
    debug_assert_eq!(model.id(), id, "type model built for the wrong type");
    REGISTRY.write().entry(id).or_insert(model).clone()
}

/// Strips module paths from a `std::any::type_name` string.
///
/// `core::option::Option<alloc::string::String>` becomes `Option<String>`.
pub fn short_type_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    let mut chars = full.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&':') => {
                chars.next();
                out.truncate(segment_start);
            }
            c if c.is_alphanumeric() || c == '_' => out.push(c),
            other => {
                out.push(other);
                segment_start = out.len();
            }
        }
    }
    out
}

// ============================================================================
// Kinds
// ============================================================================

/// Framework-supplied types bound straight from the request context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialKind {
    /// `HttpContext`.
    Context,
    /// `HttpRequest`.
    Request,
    /// `HttpResponse`.
    Response,
    /// The request abort `CancellationToken`.
    Cancellation,
    /// `User`.
    User,
    /// `TraceIdentifier`.
    TraceIdentifier,
    /// `RequestBody`.
    BodyStream,
    /// `FormCollection`.
    FormCollection,
    /// `FormFile`.
    FormFile,
    /// `FormFileCollection`.
    FormFileCollection,
}

impl SpecialKind {
    /// Returns `true` for the form-derived kinds.
    pub fn is_form(self) -> bool {
        matches!(
            self,
            Self::FormCollection | Self::FormFile | Self::FormFileCollection
        )
    }
}

/// One variant of an enumeration.
#[derive(Clone)]
pub struct EnumVariant {
    name: &'static str,
    discriminant: i64,
    value: ValueFactory,
}

impl EnumVariant {
    /// The variant name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The numeric discriminant.
    pub fn discriminant(&self) -> i64 {
        self.discriminant
    }
}

/// An enumeration's parsers.
///
/// Both parsers accept the same inputs: a variant name, matched
/// case-sensitively, or a numeric discriminant.
#[derive(Clone)]
pub struct EnumModel {
    variants: Arc<[EnumVariant]>,
    generic: TryParseFn,
}

impl EnumModel {
    /// The declared variants.
    pub fn variants(&self) -> &[EnumVariant] {
        &self.variants
    }

    /// The strongly typed parser.
    pub fn generic_parser(&self) -> TryParseFn {
        self.generic.clone()
    }

    /// The table-driven parser.
    pub fn table_parser(&self) -> TryParseFn {
        let variants = self.variants.clone();
        Arc::new(move |text: &str, _: Option<&FormatProvider>| {
            let found = variants.iter().find(|v| v.name == text).or_else(|| {
                let discriminant = text.trim().parse::<i64>().ok()?;
                variants.iter().find(|v| v.discriminant == discriminant)
            })?;
            Some((found.value)())
        })
    }
}

/// `Option<T>`.
#[derive(Clone)]
pub struct NullableModel {
    inner: Arc<TypeModel>,
    some: WrapFn,
    none: ValueFactory,
}

impl NullableModel {
    /// The wrapped type.
    pub fn inner(&self) -> &Arc<TypeModel> {
        &self.inner
    }

    /// Wraps a value of the inner type in `Some`.
    pub fn some(&self, value: BoundValue) -> Result<BoundValue, BindError> {
        (self.some)(value)
    }

    /// Produces `None`.
    pub fn none(&self) -> BoundValue {
        (self.none)()
    }
}

/// `Vec<T>`.
#[derive(Clone)]
pub struct SequenceModel {
    element: Arc<TypeModel>,
    collect: CollectFn,
}

impl SequenceModel {
    /// The element type.
    pub fn element(&self) -> &Arc<TypeModel> {
        &self.element
    }

    /// Collects elements into the sequence type.
    pub fn collect(&self, values: Vec<BoundValue>) -> Result<BoundValue, BindError> {
        (self.collect)(values)
    }
}

/// What sort of type a model describes.
#[derive(Clone)]
pub enum TypeKind {
    /// `String`: bound from raw text without parsing.
    Text,
    /// A scalar value type.
    Value,
    /// An enumeration.
    Enum(EnumModel),
    /// A user-defined type.
    Object,
    /// `Option<T>`.
    Nullable(NullableModel),
    /// `Vec<T>`.
    Sequence(SequenceModel),
    /// A shared service, `Arc<T>`.
    Service,
    /// A framework-supplied context type.
    Special(SpecialKind),
}

impl TypeKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Text => "Text",
            Self::Value => "Value",
            Self::Enum(_) => "Enum",
            Self::Object => "Object",
            Self::Nullable(_) => "Nullable",
            Self::Sequence(_) => "Sequence",
            Self::Service => "Service",
            Self::Special(_) => "Special",
        }
    }
}

impl fmt::Debug for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Special(kind) => write!(f, "Special({kind:?})"),
            Self::Nullable(n) => write!(f, "Nullable({})", n.inner.name),
            Self::Sequence(s) => write!(f, "Sequence({})", s.element.name),
            other => f.write_str(other.label()),
        }
    }
}

// ============================================================================
// TypeModel
// ============================================================================

/// Everything the binding machinery knows about a type.
pub struct TypeModel {
    id: TypeId,
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
}

impl TypeModel {
    /// The described type's id.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The display name used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The kind.
    pub fn kind(&self) -> &TypeKind {
        &self.kind
    }

    /// The base type, for types that extend another.
    pub fn base(&self) -> Option<&Arc<TypeModel>> {
        self.base.as_ref()
    }

    /// Directly implemented capability interfaces.
    pub fn interfaces(&self) -> &[Arc<CapabilityInterface>] {
        &self.interfaces
    }

    /// Methods declared directly on the type.
    pub fn methods(&self) -> &[MethodDecl] {
        &self.methods
    }

    /// Methods declared directly on the type with the given name.
    pub fn methods_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a MethodDecl> {
        self.methods.iter().filter(move |m| m.name() == name)
    }

    /// Declared constructors.
    pub fn constructors(&self) -> &[ConstructorDecl] {
        &self.constructors
    }

    /// Declared properties.
    pub fn properties(&self) -> &[PropertyDecl] {
        &self.properties
    }

    /// Returns `true` for abstract types.
    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    /// Returns `true` for `String`.
    pub fn is_text(&self) -> bool {
        matches!(self.kind, TypeKind::Text)
    }

    /// The special kind, if this is a framework context type.
    pub fn special(&self) -> Option<SpecialKind> {
        match self.kind {
            TypeKind::Special(kind) => Some(kind),
            _ => None,
        }
    }

    /// The nullable description, for `Option<T>`.
    pub fn nullable(&self) -> Option<&NullableModel> {
        match &self.kind {
            TypeKind::Nullable(n) => Some(n),
            _ => None,
        }
    }

    /// The enumeration description.
    pub fn enumeration(&self) -> Option<&EnumModel> {
        match &self.kind {
            TypeKind::Enum(e) => Some(e),
            _ => None,
        }
    }

    /// The sequence description, for `Vec<T>`.
    pub fn sequence(&self) -> Option<&SequenceModel> {
        match &self.kind {
            TypeKind::Sequence(s) => Some(s),
            _ => None,
        }
    }

    /// `T` for `Option<T>`, the model itself otherwise.
    pub fn underlying(self: &Arc<Self>) -> Arc<TypeModel> {
        match &self.kind {
            TypeKind::Nullable(n) => n.inner.clone(),
            _ => self.clone(),
        }
    }

    /// Returns `true` if a JSON decoder is available.
    pub fn has_json(&self) -> bool {
        self.json.is_some()
    }

    /// Decodes a JSON document, if the type supports JSON.
    pub fn decode_json(
        &self,
        value: serde_json::Value,
    ) -> Option<Result<BoundValue, serde_json::Error>> {
        self.json.as_ref().map(|decode| decode(value))
    }

    /// The default value, if the type has one.
    pub fn default_value(&self) -> Option<BoundValue> {
        self.default_value.as_ref().map(|make| make())
    }
}

impl fmt::Debug for TypeModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeModel")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("base", &self.base.as_ref().map(|b| b.name.as_str()))
            .field(
                "interfaces",
                &self.interfaces.iter().map(|i| i.name()).collect::<Vec<_>>(),
            )
            .field("methods", &self.methods.len())
            .field("is_abstract", &self.is_abstract)
            .field("json", &self.json.is_some())
            .finish_non_exhaustive()
    }
}
