//! Constructors and properties of record types bound with `AsParameters`.

use std::any::type_name;
use std::fmt;
use std::sync::Arc;

use super::annotation::SourceAnnotation;
use super::{Bindable, TypeModel, model_of};
use crate::error::BindError;
use crate::value::{Arguments, BoundValue, bound, downcast};

/// Builds a record from its constructor arguments, in declaration order.
pub type ConstructFn = Arc<dyn Fn(Arguments) -> Result<BoundValue, BindError> + Send + Sync>;

/// Assigns a property on an already constructed record.
pub type AssignFn = Arc<dyn Fn(&mut BoundValue, BoundValue) -> Result<(), BindError> + Send + Sync>;

/// A constructor parameter.
#[derive(Clone)]
pub struct MemberDecl {
    name: String,
    model: Arc<TypeModel>,
    annotation: Option<SourceAnnotation>,
}

impl MemberDecl {
    /// Declares a member of type `P`.
    pub fn of<P: Bindable>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model: model_of::<P>(),
            annotation: None,
        }
    }

    /// Pins the member to a source.
    pub fn annotated(mut self, annotation: SourceAnnotation) -> Self {
        self.annotation = Some(annotation);
        self
    }

    /// The member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The member's declared type.
    pub fn model(&self) -> &Arc<TypeModel> {
        &self.model
    }

    /// The explicit annotation, if any.
    pub fn annotation(&self) -> Option<&SourceAnnotation> {
        self.annotation.as_ref()
    }
}

impl fmt::Debug for MemberDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberDecl")
            .field("name", &self.name)
            .field("type", &self.model.name())
            .field("annotation", &self.annotation)
            .finish()
    }
}

/// A declared constructor.
#[derive(Clone)]
pub struct ConstructorDecl {
    public: bool,
    parameters: Vec<MemberDecl>,
    construct: ConstructFn,
}

impl ConstructorDecl {
    /// Declares a constructor for `T`.
    pub fn new<T, F>(public: bool, parameters: Vec<MemberDecl>, construct: F) -> Self
    where
        T: Send + 'static,
        F: Fn(Arguments) -> Result<T, BindError> + Send + Sync + 'static,
    {
        Self {
            public,
            parameters,
            construct: Arc::new(move |args: Arguments| construct(args).map(bound)),
        }
    }

    /// Returns `true` if the constructor is public.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// The constructor parameters.
    pub fn parameters(&self) -> &[MemberDecl] {
        &self.parameters
    }

    /// Invokes the constructor.
    pub fn construct(&self, args: Arguments) -> Result<BoundValue, BindError> {
        (self.construct)(args)
    }
}

impl fmt::Debug for ConstructorDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstructorDecl")
            .field("public", &self.public)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// A declared property.
#[derive(Clone)]
pub struct PropertyDecl {
    member: MemberDecl,
    public: bool,
    assign: Option<AssignFn>,
}

impl PropertyDecl {
    /// A public property of record `T` that can be assigned.
    pub fn settable<T, P, F>(name: impl Into<String>, set: F) -> Self
    where
        T: 'static,
        P: Bindable,
        F: Fn(&mut T, P) + Send + Sync + 'static,
    {
        let assign: AssignFn = Arc::new(move |target: &mut BoundValue, value: BoundValue| {
            let target = target
                .downcast_mut::<T>()
                .ok_or(BindError::TypeMismatch {
                    expected: type_name::<T>(),
                })?;
            set(target, downcast::<P>(value)?);
            Ok(())
        });
        Self {
            member: MemberDecl::of::<P>(name),
            public: true,
            assign: Some(assign),
        }
    }

    /// A public property without a setter.
    pub fn readonly<P: Bindable>(name: impl Into<String>) -> Self {
        Self {
            member: MemberDecl::of::<P>(name),
            public: true,
            assign: None,
        }
    }

    /// Marks the property as non-public.
    pub fn private(mut self) -> Self {
        self.public = false;
        self
    }

    /// Pins the property to a source.
    pub fn annotated(mut self, annotation: SourceAnnotation) -> Self {
        self.member = self.member.annotated(annotation);
        self
    }

    /// The property as a bindable member.
    pub fn member(&self) -> &MemberDecl {
        &self.member
    }

    /// The property name.
    pub fn name(&self) -> &str {
        self.member.name()
    }

    /// Returns `true` if the property is public.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// Returns `true` if the property can be assigned.
    pub fn is_settable(&self) -> bool {
        self.assign.is_some()
    }

    /// Assigns `value` to the property of `target`.
    pub fn assign(&self, target: &mut BoundValue, value: BoundValue) -> Result<(), BindError> {
        match &self.assign {
            Some(assign) => assign(target, value),
            None => Err(BindError::custom(format!(
                "property '{}' is not settable",
                self.member.name()
            ))),
        }
    }
}

impl fmt::Debug for PropertyDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDecl")
            .field("member", &self.member)
            .field("public", &self.public)
            .field("settable", &self.is_settable())
            .finish()
    }
}
