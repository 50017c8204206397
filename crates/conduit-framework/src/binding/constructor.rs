use conduit_core::CompileError;
use conduit_core::model::{ConstructorDecl, MemberDecl, PropertyDecl, TypeModel};

/// How a record bound with `AsParameters` is built.
#[derive(Debug, Clone)]
pub enum RecordConstruction {
    /// Construct with no arguments, then assign every public settable property.
    Parameterless {
        /// The constructor.
        constructor: ConstructorDecl,
        /// Properties assigned after construction.
        properties: Vec<PropertyDecl>,
    },
    /// Construct from matching properties, then assign the remaining ones.
    Parameterized {
        /// The constructor.
        constructor: ConstructorDecl,
        /// Settable properties not covered by constructor parameters.
        properties: Vec<PropertyDecl>,
    },
}

impl RecordConstruction {
    /// The chosen constructor.
    pub fn constructor(&self) -> &ConstructorDecl {
        match self {
            Self::Parameterless { constructor, .. } | Self::Parameterized { constructor, .. } => {
                constructor
            }
        }
    }

    /// Properties assigned after construction.
    pub fn properties(&self) -> &[PropertyDecl] {
        match self {
            Self::Parameterless { properties, .. } | Self::Parameterized { properties, .. } => {
                properties
            }
        }
    }

    /// Constructor parameters followed by assigned properties.
    pub fn members(&self) -> Vec<MemberDecl> {
        self.constructor()
            .parameters()
            .iter()
            .cloned()
            .chain(self.properties().iter().map(|p| p.member().clone()))
            .collect()
    }
}

fn settable_public(model: &TypeModel) -> impl Iterator<Item = &PropertyDecl> {
    model
        .properties()
        .iter()
        .filter(|p| p.is_public() && p.is_settable())
}

/// Chooses the constructor used to build `model`.
///
/// A public parameterless constructor wins. Otherwise there must be exactly
/// one public constructor, and each of its parameters must match a public
/// settable property by name, ignoring case.
pub(crate) fn find_constructor(model: &TypeModel) -> Result<RecordConstruction, CompileError> {
    let type_name = model.name().to_string();
    if model.is_abstract() {
        return Err(CompileError::AbstractType { type_name });
    }

    let public: Vec<&ConstructorDecl> = model
        .constructors()
        .iter()
        .filter(|c| c.is_public())
        .collect();

    if let Some(constructor) = public.iter().find(|c| c.parameters().is_empty()) {
        return Ok(RecordConstruction::Parameterless {
            constructor: (*constructor).clone(),
            properties: settable_public(model).cloned().collect(),
        });
    }

    let constructor = match public.as_slice() {
        [] => return Err(CompileError::NoPublicConstructor { type_name }),
        [only] => *only,
        _ => return Err(CompileError::AmbiguousConstructors { type_name }),
    };

    let unmatched: Vec<String> = constructor
        .parameters()
        .iter()
        .filter(|param| {
            !settable_public(model).any(|p| p.name().eq_ignore_ascii_case(param.name()))
        })
        .map(|param| param.name().to_string())
        .collect();
    if !unmatched.is_empty() {
        return Err(CompileError::ConstructorParameterMismatch {
            type_name,
            unmatched,
        });
    }

    let properties = settable_public(model)
        .filter(|p| {
            !constructor
                .parameters()
                .iter()
                .any(|param| param.name().eq_ignore_ascii_case(p.name()))
        })
        .cloned()
        .collect();

    Ok(RecordConstruction::Parameterized {
        constructor: constructor.clone(),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use conduit_core::Bindable;
    use conduit_core::model::model_of;

    use super::*;

    #[derive(Default)]
    struct Paging {
        page: i32,
        size: i32,
    }

    impl Bindable for Paging {
        fn type_model() -> TypeModel {
            TypeModel::object::<Paging>()
                .constructor(vec![], |_| Ok(Paging::default()))
                .constructor(
                    vec![MemberDecl::of::<i32>("page"), MemberDecl::of::<i32>("size")],
                    |mut args| {
                        Ok(Paging {
                            page: args.next()?,
                            size: args.next()?,
                        })
                    },
                )
                .settable("page", |p: &mut Paging, v: i32| p.page = v)
                .settable("size", |p: &mut Paging, v: i32| p.size = v)
                .build()
        }
    }

    struct Point {
        _x: i32,
        _y: i32,
    }

    impl Bindable for Point {
        fn type_model() -> TypeModel {
            TypeModel::object::<Point>()
                .constructor(
                    vec![MemberDecl::of::<i32>("X"), MemberDecl::of::<i32>("y")],
                    |mut args| {
                        Ok(Point {
                            _x: args.next()?,
                            _y: args.next()?,
                        })
                    },
                )
                .settable("x", |p: &mut Point, v: i32| p._x = v)
                .settable("y", |p: &mut Point, v: i32| p._y = v)
                .build()
        }
    }

    struct Orphan;

    impl Bindable for Orphan {
        fn type_model() -> TypeModel {
            TypeModel::object::<Orphan>()
                .constructor(vec![MemberDecl::of::<i32>("missing")], |_| Ok(Orphan))
                .build()
        }
    }

    struct Twins;

    impl Bindable for Twins {
        fn type_model() -> TypeModel {
            TypeModel::object::<Twins>()
                .constructor(vec![MemberDecl::of::<i32>("a")], |_| Ok(Twins))
                .constructor(vec![MemberDecl::of::<i32>("b")], |_| Ok(Twins))
                .build()
        }
    }

    struct Hidden;

    impl Bindable for Hidden {
        fn type_model() -> TypeModel {
            TypeModel::object::<Hidden>()
                .private_constructor(vec![], |_| Ok(Hidden))
                .build()
        }
    }

    struct Shape;

    impl Bindable for Shape {
        fn type_model() -> TypeModel {
            TypeModel::object::<Shape>()
                .abstract_type()
                .constructor(vec![], |_| Ok(Shape))
                .build()
        }
    }

    #[test]
    fn test_parameterless_wins() {
        let plan = find_constructor(&model_of::<Paging>()).unwrap();
        assert!(matches!(plan, RecordConstruction::Parameterless { .. }));
        assert_eq!(plan.members().len(), 2);
    }

    #[test]
    fn test_parameterized_matches_case_insensitively() {
        let plan = find_constructor(&model_of::<Point>()).unwrap();
        assert!(matches!(plan, RecordConstruction::Parameterized { .. }));
        assert!(plan.properties().is_empty());
        let names: Vec<_> = plan.members().iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, ["X", "y"]);
    }

    #[test]
    fn test_constructor_errors() {
        assert!(matches!(
            find_constructor(&model_of::<Orphan>()),
            Err(CompileError::ConstructorParameterMismatch { unmatched, .. }) if unmatched == ["missing"]
        ));
        assert!(matches!(
            find_constructor(&model_of::<Twins>()),
            Err(CompileError::AmbiguousConstructors { .. })
        ));
        assert!(matches!(
            find_constructor(&model_of::<Hidden>()),
            Err(CompileError::NoPublicConstructor { .. })
        ));
        assert!(matches!(
            find_constructor(&model_of::<Shape>()),
            Err(CompileError::AbstractType { .. })
        ));
    }
}
