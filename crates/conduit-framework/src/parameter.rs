//! Handler parameter descriptions.

use std::any::{TypeId, type_name};
use std::fmt;
use std::sync::Arc;

use conduit_core::model::{
    MemberDecl, ParameterInfo, TypeKind, TypeModel, ValueFactory, short_type_name,
};
use conduit_core::value::bound;
use conduit_core::{BindError, Bindable, BoundValue, SourceAnnotation, model_of};

/// A default value declared for a parameter.
#[derive(Clone)]
pub struct DefaultValue {
    type_id: TypeId,
    type_name: String,
    factory: ValueFactory,
}

impl DefaultValue {
    /// Uses `value` as the default.
    pub fn new<T: Clone + Send + Sync + 'static>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: short_type_name(type_name::<T>()),
            factory: Arc::new(move || bound(value.clone())),
        }
    }

    /// The default value's type.
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// The default value's type name.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Produces a fresh copy.
    pub fn make(&self) -> BoundValue {
        (self.factory)()
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DefaultValue").field(&self.type_name).finish()
    }
}

/// One declared handler parameter.
#[derive(Clone)]
pub struct ParameterDescriptor {
    name: Option<String>,
    position: usize,
    declared: Arc<TypeModel>,
    annotation: Option<SourceAnnotation>,
    default: Option<DefaultValue>,
}

impl ParameterDescriptor {
    /// Describes an unnamed parameter of type `P`.
    pub fn of<P: Bindable>() -> Self {
        Self::from_model(model_of::<P>())
    }

    /// Describes an unnamed parameter of the given declared type.
    pub fn from_model(declared: Arc<TypeModel>) -> Self {
        Self {
            name: None,
            position: 0,
            declared,
            annotation: None,
            default: None,
        }
    }

    /// Describes a record member as a parameter.
    pub fn from_member(member: &MemberDecl, position: usize) -> Self {
        Self {
            name: Some(member.name().to_string()),
            position,
            declared: member.model().clone(),
            annotation: member.annotation().cloned(),
            default: None,
        }
    }

    /// Sets the name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the position.
    pub fn at(mut self, position: usize) -> Self {
        self.position = position;
        self
    }

    /// Pins the parameter to a source.
    pub fn annotated(mut self, annotation: SourceAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Declares a default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// The name, if the parameter has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Zero-based position in the handler's parameter list.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The type as declared, `Option<T>` included.
    pub fn declared(&self) -> &Arc<TypeModel> {
        &self.declared
    }

    /// The type with any `Option` removed.
    pub fn model(&self) -> Arc<TypeModel> {
        self.declared.underlying()
    }

    /// The explicit annotation.
    pub fn annotation(&self) -> Option<&SourceAnnotation> {
        self.annotation.as_ref()
    }

    /// The declared default value.
    pub fn default_value(&self) -> Option<&DefaultValue> {
        self.default.as_ref()
    }

    /// Returns `true` if declared as `Option<T>`.
    pub fn is_nullable(&self) -> bool {
        self.declared.nullable().is_some()
    }

    /// `"Type name"`, as used in diagnostics.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.declared.name(), self.name.as_deref().unwrap_or("?"))
    }

    /// Information handed to `bind_async`.
    pub fn parameter_info(&self) -> ParameterInfo {
        ParameterInfo::new(
            self.name.clone().unwrap_or_default(),
            self.declared.name(),
            self.position,
        )
    }

    /// Returns `true` if a missing value is acceptable.
    ///
    /// Nullable parameters and parameters with a default are optional. With
    /// nullability tracking disabled, reference-like parameters whose type has
    /// a default value are optional as well.
    pub fn is_optional(&self, nullability_tracking: bool) -> bool {
        if self.is_nullable() || self.default.is_some() {
            return true;
        }
        !nullability_tracking
            && self.declared.default_value().is_some()
            && matches!(
                self.declared.kind(),
                TypeKind::Text | TypeKind::Object | TypeKind::Sequence(_)
            )
    }

    /// Checks that the default value has the declared type or its underlying type.
    pub(crate) fn default_matches(&self) -> bool {
        self.default.as_ref().is_none_or(|d| {
            d.type_id() == self.declared.id() || d.type_id() == self.model().id()
        })
    }

    /// Turns a bound value of the underlying type into the declared type,
    /// filling in defaults when no value was bound.
    pub(crate) fn finalize(
        &self,
        value: Option<BoundValue>,
        nullability_tracking: bool,
    ) -> Result<BoundValue, BindError> {
        let nullable = self.declared.nullable();
        match value {
            Some(value) => match nullable {
                Some(n) => n.some(value),
                None => Ok(value),
            },
            None => {
                if let Some(default) = &self.default {
                    let value = default.make();
                    return match nullable {
                        Some(n) if default.type_id() != self.declared.id() => n.some(value),
                        _ => Ok(value),
                    };
                }
                if let Some(n) = nullable {
                    return Ok(n.none());
                }
                if !nullability_tracking {
                    if let Some(value) = self.declared.default_value() {
                        return Ok(value);
                    }
                }
                Err(BindError::custom(format!(
                    "no value was bound for parameter \"{}\"",
                    self.display_name()
                )))
            }
        }
    }
}

impl fmt::Debug for ParameterDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParameterDescriptor")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("type", &self.declared.name())
            .field("annotation", &self.annotation)
            .field("default", &self.default)
            .finish()
    }
}

/// Per-parameter metadata supplied alongside a typed handler: name, source
/// annotation and default value.
///
/// # Example
///
/// ```rust,ignore
/// let handler = handler_fn(get_todo).with_params([
///     ParamSpec::new("id").from_route(),
///     ParamSpec::new("verbose").default(false),
/// ]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParamSpec {
    name: Option<String>,
    annotation: Option<SourceAnnotation>,
    default: Option<DefaultValue>,
}

impl ParamSpec {
    /// A parameter called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..<Self as Default>::default()
        }
    }

    /// A parameter without a name.
    pub fn unnamed() -> Self {
        <Self as Default>::default()
    }

    /// Pins the parameter to `annotation`.
    pub fn annotated(mut self, annotation: SourceAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// Binds from the route value of the same name.
    pub fn from_route(self) -> Self {
        self.annotated(SourceAnnotation::Route { name: None })
    }

    /// Binds from the route value `name`.
    pub fn from_route_named(self, name: impl Into<String>) -> Self {
        self.annotated(SourceAnnotation::Route {
            name: Some(name.into()),
        })
    }

    /// Binds from the query value of the same name.
    pub fn from_query(self) -> Self {
        self.annotated(SourceAnnotation::Query { name: None })
    }

    /// Binds from the query value `name`.
    pub fn from_query_named(self, name: impl Into<String>) -> Self {
        self.annotated(SourceAnnotation::Query {
            name: Some(name.into()),
        })
    }

    /// Binds from the header of the same name.
    pub fn from_header(self) -> Self {
        self.annotated(SourceAnnotation::Header { name: None })
    }

    /// Binds from the header `name`.
    pub fn from_header_named(self, name: impl Into<String>) -> Self {
        self.annotated(SourceAnnotation::Header {
            name: Some(name.into()),
        })
    }

    /// Binds from the JSON body.
    pub fn from_body(self) -> Self {
        self.annotated(SourceAnnotation::Body { allow_empty: false })
    }

    /// Binds from the JSON body, accepting an empty body.
    pub fn from_body_allow_empty(self) -> Self {
        self.annotated(SourceAnnotation::Body { allow_empty: true })
    }

    /// Binds from request services.
    pub fn from_services(self) -> Self {
        self.annotated(SourceAnnotation::Service)
    }

    /// Binds from the form field of the same name.
    pub fn from_form(self) -> Self {
        self.annotated(SourceAnnotation::Form { name: None })
    }

    /// Binds from the form field `name`.
    pub fn from_form_named(self, name: impl Into<String>) -> Self {
        self.annotated(SourceAnnotation::Form {
            name: Some(name.into()),
        })
    }

    /// Expands a record type into its members.
    pub fn as_parameters(self) -> Self {
        self.annotated(SourceAnnotation::AsParameters)
    }

    /// Declares a default value.
    pub fn default<T: Clone + Send + Sync + 'static>(mut self, value: T) -> Self {
        self.default = Some(DefaultValue::new(value));
        self
    }

    pub(crate) fn apply(self, mut parameter: ParameterDescriptor) -> ParameterDescriptor {
        if let Some(name) = self.name {
            parameter.name = Some(name);
        }
        if let Some(annotation) = self.annotation {
            parameter.annotation = Some(annotation);
        }
        if let Some(default) = self.default {
            parameter.default = Some(default);
        }
        parameter
    }
}
