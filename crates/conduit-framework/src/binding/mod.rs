//! Binding capability resolution.
//!
//! Given a type model, the [`BindingCapabilityResolver`] decides whether the
//! type can parse itself from text (`try_parse`), bind itself from the whole
//! request (`bind_async`), or be constructed member by member. Lookup order is
//! the same for both methods:
//!
//! 1. the type itself, and for `try_parse` on enumerations the built-in
//!    enumeration parser;
//! 2. each base type, nearest first;
//! 3. every capability interface the type or its bases implement, directly
//!    or by inheritance. More than one interface match is ambiguous.
//!
//! At each site the accepted shape with the lowest rank wins. A same-named
//! method with none of the accepted shapes rejects the type, unless an
//! interface supplies a valid fallback or invalid shapes are tolerated.
//!
//! Results are cached per type in a [`CapabilityCache`].

mod cache;
mod candidate;
mod constructor;

use std::any::TypeId;
use std::sync::Arc;

use conduit_core::model::{
    BIND_ASYNC, CapabilityInterface, MethodBody, MethodDecl, Returns, Slot, TRY_PARSE, TypeKind,
    TypeModel,
};
use conduit_core::{BindingOptions, CompileError};
use tracing::trace;

pub use cache::CapabilityCache;
pub use candidate::{BindingCandidate, CandidateKind, DeclarationSite};
pub use constructor::RecordConstruction;

use cache::CacheKey;

use crate::parameter::ParameterDescriptor;

impl CandidateKind {
    fn method_name(self) -> &'static str {
        match self {
            Self::TryParse => TRY_PARSE,
            Self::BindAsync => BIND_ASYNC,
        }
    }

    fn accepted_shapes(self, type_name: &str) -> Vec<String> {
        match self {
            Self::TryParse => vec![
                format!("static bool try_parse(&str, &FormatProvider, out {type_name})"),
                format!("static bool try_parse(&str, out {type_name})"),
            ],
            Self::BindAsync => vec![
                format!(
                    "static Future<Output = {type_name}> bind_async(HttpContext, ParameterInfo)"
                ),
                format!("static Future<Output = {type_name}> bind_async(HttpContext)"),
            ],
        }
    }

    /// Rank of `decl` among the accepted shapes, `None` if it has none of them.
    fn rank(self, decl: &MethodDecl, target: TypeId) -> Option<usize> {
        if !decl.is_static() {
            return None;
        }
        match self {
            Self::TryParse => {
                if decl.returns() != &Returns::Bool {
                    return None;
                }
                match decl.params() {
                    [Slot::Text, Slot::FormatProvider, Slot::Out(out)] if out.id() == target => {
                        Some(0)
                    }
                    [Slot::Text, Slot::Out(out)] if out.id() == target => Some(1),
                    _ => None,
                }
            }
            Self::BindAsync => {
                match decl.returns() {
                    Returns::Future(output) if output.id() == target => {}
                    _ => return None,
                }
                match decl.params() {
                    [Slot::Context, Slot::ParameterInfo] => Some(0),
                    [Slot::Context] => Some(1),
                    _ => None,
                }
            }
        }
    }
}

/// Finds `try_parse`, `bind_async` and record constructors for types.
#[derive(Debug, Clone)]
pub struct BindingCapabilityResolver {
    options: BindingOptions,
    cache: Arc<CapabilityCache>,
}

impl BindingCapabilityResolver {
    /// Creates a resolver backed by the process-wide cache.
    pub fn new(options: BindingOptions) -> Self {
        Self::with_cache(options, CapabilityCache::shared())
    }

    /// Creates a resolver backed by `cache`.
    pub fn with_cache(options: BindingOptions, cache: Arc<CapabilityCache>) -> Self {
        Self { options, cache }
    }

    /// The options in effect.
    pub fn options(&self) -> &BindingOptions {
        &self.options
    }

    /// The text parser for `model`, if it has one.
    ///
    /// `String` needs no parser and yields `None`.
    pub fn find_try_parse(
        &self,
        model: &TypeModel,
    ) -> Result<Option<BindingCandidate>, CompileError> {
        self.cached(model, CandidateKind::TryParse)
    }

    /// The request binder for `parameter`'s type, if it has one.
    pub fn find_bind_async(
        &self,
        parameter: &ParameterDescriptor,
    ) -> Result<Option<BindingCandidate>, CompileError> {
        self.find_bind_async_for(&parameter.model())
    }

    /// The request binder for `model`, if it has one.
    pub fn find_bind_async_for(
        &self,
        model: &TypeModel,
    ) -> Result<Option<BindingCandidate>, CompileError> {
        self.cached(model, CandidateKind::BindAsync)
    }

    /// Returns `true` if `model` has a text parser.
    pub fn has_try_parse(&self, model: &TypeModel) -> Result<bool, CompileError> {
        Ok(self.find_try_parse(model)?.is_some())
    }

    /// Returns `true` if `model` has a request binder.
    pub fn has_bind_async(&self, model: &TypeModel) -> Result<bool, CompileError> {
        Ok(self.find_bind_async_for(model)?.is_some())
    }

    /// Chooses how to construct the record type `model`.
    pub fn find_constructor(&self, model: &TypeModel) -> Result<RecordConstruction, CompileError> {
        constructor::find_constructor(model)
    }

    fn cached(
        &self,
        model: &TypeModel,
        kind: CandidateKind,
    ) -> Result<Option<BindingCandidate>, CompileError> {
        let key = CacheKey {
            type_id: model.id(),
            kind,
            prefer_non_generic_enum_parse: self.options.prefer_non_generic_enum_parse,
            tolerate_invalid_methods: self.options.tolerate_invalid_methods,
        };
        if let Some(hit) = self.cache.get(&key) {
            return Ok(hit);
        }

        let resolved = self.resolve(model, kind)?;
        trace!(
            type_name = model.name(),
            method = kind.method_name(),
            found = resolved.is_some(),
            "Resolved binding capability"
        );
        Ok(self.cache.insert(key, resolved))
    }

    fn resolve(
        &self,
        model: &TypeModel,
        kind: CandidateKind,
    ) -> Result<Option<BindingCandidate>, CompileError> {
        match model.kind() {
            TypeKind::Text
            | TypeKind::Nullable(_)
            | TypeKind::Sequence(_)
            | TypeKind::Service
            | TypeKind::Special(_) => return Ok(None),
            TypeKind::Enum(e) if kind == CandidateKind::TryParse => {
                let generic = !self.options.prefer_non_generic_enum_parse;
                let parse = if generic {
                    e.generic_parser()
                } else {
                    e.table_parser()
                };
                return Ok(Some(BindingCandidate::try_parse(
                    model.name(),
                    model.id(),
                    DeclarationSite::Enum { generic },
                    1,
                    format!("static bool try_parse(&str, out {})", model.name()),
                    parse,
                )));
            }
            _ => {}
        }

        let method = kind.method_name();

        let options = &self.options;
        let direct = best(kind, model.methods(), model, DeclarationSite::Direct, options)?;
        if let Some(found) = direct {
            return Ok(Some(found));
        }

        let mut base = model.base();
        while let Some(b) = base {
            let site = DeclarationSite::Base(b.name().to_string());
            if let Some(found) = best(kind, b.methods(), model, site, options)? {
                return Ok(Some(found));
            }
            base = b.base();
        }

        let mut matches = Vec::new();
        for iface in implemented_interfaces(model) {
            let site = DeclarationSite::Interface(iface.name().to_string());
            if let Some(found) = best(kind, iface.methods(), model, site, options)? {
                matches.push(found);
            }
        }
        if matches.len() > 1 {
            return Err(CompileError::AmbiguousCapability {
                type_name: model.name().to_string(),
                method,
                interfaces: matches
                    .iter()
                    .filter_map(|c| match c.site() {
                        DeclarationSite::Interface(name) => Some(name.clone()),
                        _ => None,
                    })
                    .collect(),
            });
        }
        if let Some(found) = matches.pop() {
            return Ok(Some(found));
        }

        let found: Vec<String> = declared_with_bases(model)
            .filter(|decl| decl.name() == method && kind.rank(decl, model.id()).is_none())
            .map(ToString::to_string)
            .collect();
        if !found.is_empty() && !self.options.tolerate_invalid_methods {
            return Err(CompileError::InvalidMethodShape {
                type_name: model.name().to_string(),
                method,
                expected: kind.accepted_shapes(model.name()),
                found,
            });
        }

        Ok(None)
    }
}

/// The best-ranked callable declaration named for `kind`, as a candidate.
///
/// A declaration of a type or base with an accepted shape must carry a
/// matching body; interface members without one are abstract and skipped.
fn best(
    kind: CandidateKind,
    methods: &[MethodDecl],
    model: &TypeModel,
    site: DeclarationSite,
    options: &BindingOptions,
) -> Result<Option<BindingCandidate>, CompileError> {
    let abstract_allowed = matches!(site, DeclarationSite::Interface(_));
    let mut callable = Vec::new();
    let mut broken = Vec::new();
    for decl in methods.iter().filter(|decl| decl.name() == kind.method_name()) {
        let Some(rank) = kind.rank(decl, model.id()) else {
            continue;
        };
        match (kind, decl.body()) {
            (CandidateKind::TryParse, Some(MethodBody::TryParse(_)))
            | (CandidateKind::BindAsync, Some(MethodBody::BindAsync(_))) => {
                callable.push((rank, decl));
            }
            (_, None) if abstract_allowed => {}
            (_, None) => broken.push(format!("{decl} without a body")),
            (_, Some(_)) => broken.push(format!("{decl} with a mismatched body")),
        }
    }
    if !broken.is_empty() && !options.tolerate_invalid_methods {
        return Err(CompileError::InvalidMethodShape {
            type_name: model.name().to_string(),
            method: kind.method_name(),
            expected: kind.accepted_shapes(model.name()),
            found: broken,
        });
    }

    let Some((_, decl)) = callable.into_iter().min_by_key(|(rank, _)| *rank) else {
        return Ok(None);
    };
    let signature = decl.to_string();
    Ok(match decl.body() {
        Some(MethodBody::TryParse(parse)) => Some(BindingCandidate::try_parse(
            model.name(),
            model.id(),
            site,
            decl.params().len() - 1,
            signature,
            parse.clone(),
        )),
        Some(MethodBody::BindAsync(bind)) => Some(BindingCandidate::bind_async(
            model.name(),
            model.id(),
            site,
            decl.params().len(),
            signature,
            bind.clone(),
        )),
        None => None,
    })
}

fn declared_with_bases(model: &TypeModel) -> impl Iterator<Item = &MethodDecl> {
    let mut chain = vec![model];
    let mut base = model.base();
    while let Some(b) = base {
        chain.push(b);
        base = b.base();
    }
    chain.into_iter().flat_map(|m| m.methods().iter())
}

fn implemented_interfaces(model: &TypeModel) -> Vec<Arc<CapabilityInterface>> {
    let mut all = Vec::new();
    let mut current = Some(model);
    while let Some(m) = current {
        for iface in m.interfaces() {
            iface.flatten_into(&mut all);
        }
        current = m.base().map(|b| b.as_ref());
    }
    all
}

#[cfg(test)]
mod tests {
    use conduit_core::model::{ParameterInfo, Receiver, TypeRef, model_of};
    use conduit_core::value::downcast;
    use conduit_core::{Bindable, BoxError, HttpContext, HttpRequest};

    use super::*;

    fn resolver() -> BindingCapabilityResolver {
        BindingCapabilityResolver::with_cache(BindingOptions::default(), Arc::new(CapabilityCache::new()))
    }

    fn resolver_with(options: BindingOptions) -> BindingCapabilityResolver {
        BindingCapabilityResolver::with_cache(options, Arc::new(CapabilityCache::new()))
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Celsius(f64);

    impl Bindable for Celsius {
        fn type_model() -> TypeModel {
            TypeModel::object::<Celsius>()
                .try_parse_invariant(|text| text.strip_suffix('C')?.parse().ok().map(Celsius))
                .try_parse(|text, _| text.parse().ok().map(Celsius))
                .build()
        }
    }

    #[test]
    fn test_format_provider_shape_ranks_first() {
        let found = resolver()
            .find_try_parse(&model_of::<Celsius>())
            .unwrap()
            .unwrap();
        assert_eq!(found.site(), &DeclarationSite::Direct);
        assert!(found.takes_format_provider());
        let value = downcast::<Celsius>(found.parse("21.5").unwrap()).unwrap();
        assert_eq!(value, Celsius(21.5));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let cache = Arc::new(CapabilityCache::new());
        let resolver = BindingCapabilityResolver::with_cache(BindingOptions::default(), cache.clone());
        let first = resolver.find_try_parse(&model_of::<Celsius>()).unwrap();
        let second = resolver.find_try_parse(&model_of::<Celsius>()).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.len(), 1);

        let uncached = resolver_with(BindingOptions::default())
            .find_try_parse(&model_of::<Celsius>())
            .unwrap();
        assert_eq!(first, uncached);
    }

    struct Base;

    impl Bindable for Base {
        fn type_model() -> TypeModel {
            TypeModel::object::<Base>().build()
        }
    }

    struct Derived;

    fn derived_base() -> Arc<TypeModel> {
        Arc::new(
            TypeModel::object::<Base>()
                .method(MethodDecl::try_parse_invariant(|_| Some(Derived)))
                .build(),
        )
    }

    impl Bindable for Derived {
        fn type_model() -> TypeModel {
            TypeModel::object::<Derived>().base(derived_base()).build()
        }
    }

    #[test]
    fn test_base_chain_is_searched() {
        let found = resolver()
            .find_try_parse(&model_of::<Derived>())
            .unwrap()
            .unwrap();
        assert_eq!(found.site(), &DeclarationSite::Base("Base".into()));
        assert!(resolver().find_try_parse(&model_of::<Base>()).unwrap().is_none());
    }

    struct Twice;

    fn parse_iface(name: &str) -> Arc<CapabilityInterface> {
        CapabilityInterface::new(name)
            .method(MethodDecl::try_parse_invariant(|_| Some(Twice)))
            .build()
    }

    impl Bindable for Twice {
        fn type_model() -> TypeModel {
            TypeModel::object::<Twice>()
                .implements(parse_iface("ParseA"))
                .implements(parse_iface("ParseB"))
                .build()
        }
    }

    #[test]
    fn test_two_interfaces_are_ambiguous() {
        let err = resolver().find_try_parse(&model_of::<Twice>()).unwrap_err();
        match err {
            CompileError::AmbiguousCapability { interfaces, method, .. } => {
                assert_eq!(method, "try_parse");
                assert_eq!(interfaces, ["ParseA", "ParseB"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    struct Inherited;

    impl Bindable for Inherited {
        fn type_model() -> TypeModel {
            let root = CapabilityInterface::new("Root")
                .method(MethodDecl::bind_async_context(|_ctx: HttpContext| async {
                    Ok::<_, BoxError>(Some(Inherited))
                }))
                .build();
            let child = CapabilityInterface::new("Child").extends(root.clone()).build();
            TypeModel::object::<Inherited>()
                .implements(child)
                .implements(root)
                .build()
        }
    }

    #[tokio::test]
    async fn test_inherited_interface_is_deduplicated() {
        let found = resolver()
            .find_bind_async_for(&model_of::<Inherited>())
            .unwrap()
            .unwrap();
        assert_eq!(found.site(), &DeclarationSite::Interface("Root".into()));
        assert!(!found.takes_parameter_info());
        let ctx = HttpContext::new(HttpRequest::default());
        let value = found
            .bind(ctx, ParameterDescriptor::of::<Inherited>().parameter_info())
            .await
            .unwrap();
        assert!(value.is_some());
    }

    struct Broken;

    impl Bindable for Broken {
        fn type_model() -> TypeModel {
            TypeModel::object::<Broken>()
                .method(MethodDecl::new(
                    TRY_PARSE,
                    Receiver::Instance,
                    vec![Slot::Text],
                    Returns::Bool,
                ))
                .build()
        }
    }

    #[test]
    fn test_invalid_shape_is_rejected_or_tolerated() {
        let err = resolver().find_try_parse(&model_of::<Broken>()).unwrap_err();
        match err {
            CompileError::InvalidMethodShape { expected, found, .. } => {
                assert_eq!(expected.len(), 2);
                assert_eq!(found, ["bool try_parse(&str)"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let tolerant = resolver_with(BindingOptions::new().tolerate_invalid_methods(true));
        assert!(tolerant.find_try_parse(&model_of::<Broken>()).unwrap().is_none());
    }

    struct Fallback;

    impl Bindable for Fallback {
        fn type_model() -> TypeModel {
            let iface = CapabilityInterface::new("DefaultParse")
                .method(MethodDecl::try_parse_invariant(|_| Some(Fallback)))
                .build();
            TypeModel::object::<Fallback>()
                .method(MethodDecl::new(
                    TRY_PARSE,
                    Receiver::Static,
                    vec![Slot::Text, Slot::Other("i32".into())],
                    Returns::Bool,
                ))
                .implements(iface)
                .build()
        }
    }

    #[test]
    fn test_interface_default_wins_over_invalid_direct_method() {
        let found = resolver()
            .find_try_parse(&model_of::<Fallback>())
            .unwrap()
            .unwrap();
        assert_eq!(found.site(), &DeclarationSite::Interface("DefaultParse".into()));
    }

    struct Hollow;

    impl Bindable for Hollow {
        fn type_model() -> TypeModel {
            let abstract_parse = CapabilityInterface::new("AbstractParse")
                .method(MethodDecl::new(
                    TRY_PARSE,
                    Receiver::Static,
                    vec![Slot::Text, Slot::Out(TypeRef::of::<Hollow>())],
                    Returns::Bool,
                ))
                .build();
            TypeModel::object::<Hollow>()
                .method(MethodDecl::new(
                    TRY_PARSE,
                    Receiver::Static,
                    vec![Slot::Text, Slot::Out(TypeRef::of::<Hollow>())],
                    Returns::Bool,
                ))
                .implements(abstract_parse)
                .build()
        }
    }

    #[test]
    fn test_declaration_without_body_is_rejected() {
        let err = resolver().find_try_parse(&model_of::<Hollow>()).unwrap_err();
        match err {
            CompileError::InvalidMethodShape { found, .. } => {
                assert_eq!(found, ["static bool try_parse(&str, out Hollow) without a body"]);
            }
            other => panic!("unexpected error: {other}"),
        }

        let tolerant = resolver_with(BindingOptions::new().tolerate_invalid_methods(true));
        assert!(tolerant.find_try_parse(&model_of::<Hollow>()).unwrap().is_none());
    }

    struct Session(&'static str);

    impl Bindable for Session {
        fn type_model() -> TypeModel {
            TypeModel::object::<Session>()
                .bind_async_context(|_ctx: HttpContext| async {
                    Ok::<_, BoxError>(Some(Session("context")))
                })
                .bind_async(|_ctx: HttpContext, _info: ParameterInfo| async {
                    Ok::<_, BoxError>(Some(Session("parameter info")))
                })
                .build()
        }
    }

    #[tokio::test]
    async fn test_parameter_info_overload_ranks_first() {
        let found = resolver()
            .find_bind_async_for(&model_of::<Session>())
            .unwrap()
            .unwrap();
        assert!(found.takes_parameter_info());
        assert_eq!(found.describe(), "Session.bind_async(HttpContext, ParameterInfo)");

        let ctx = HttpContext::new(HttpRequest::default());
        let value = found
            .bind(ctx, ParameterDescriptor::of::<Session>().parameter_info())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(downcast::<Session>(value).unwrap().0, "parameter info");
    }

    struct Visitor;

    impl Bindable for Visitor {
        fn type_model() -> TypeModel {
            let iface = CapabilityInterface::new("VisitorBinding")
                .method(MethodDecl::bind_async_context(|_ctx: HttpContext| async {
                    Ok::<_, BoxError>(Some(Visitor))
                }))
                .build();
            TypeModel::object::<Visitor>()
                .method(MethodDecl::new(
                    BIND_ASYNC,
                    Receiver::Static,
                    vec![Slot::Context, Slot::Other("String".into())],
                    Returns::Future(TypeRef::of::<Visitor>()),
                ))
                .implements(iface)
                .build()
        }
    }

    #[test]
    fn test_interface_bind_async_replaces_invalid_direct_method() {
        let found = resolver()
            .find_bind_async_for(&model_of::<Visitor>())
            .unwrap()
            .unwrap();
        assert_eq!(found.site(), &DeclarationSite::Interface("VisitorBinding".into()));
        assert_eq!(found.describe(), "Visitor.bind_async(HttpContext)");
    }

    #[derive(Clone, Debug, PartialEq)]
    enum Level {
        Low,
        High,
    }

    impl Bindable for Level {
        fn type_model() -> TypeModel {
            TypeModel::enumeration_of::<Level>()
                .variant("Low", 1, Level::Low)
                .variant("High", 2, Level::High)
                .build()
        }
    }

    #[test]
    fn test_enum_parser_selection() {
        let generic = resolver().find_try_parse(&model_of::<Level>()).unwrap().unwrap();
        assert_eq!(generic.site(), &DeclarationSite::Enum { generic: true });

        let table = resolver_with(BindingOptions::new().prefer_non_generic_enum_parse(true))
            .find_try_parse(&model_of::<Level>())
            .unwrap()
            .unwrap();
        assert_eq!(table.site(), &DeclarationSite::Enum { generic: false });

        for candidate in [generic, table] {
            assert_eq!(downcast::<Level>(candidate.parse("High").unwrap()).unwrap(), Level::High);
            assert_eq!(downcast::<Level>(candidate.parse("1").unwrap()).unwrap(), Level::Low);
            assert!(candidate.parse("Medium").is_none());
        }
    }

    #[test]
    fn test_text_and_specials_need_no_parser() {
        let resolver = resolver();
        assert!(resolver.find_try_parse(&model_of::<String>()).unwrap().is_none());
        assert!(resolver.find_bind_async_for(&model_of::<HttpContext>()).unwrap().is_none());
        assert!(resolver.has_try_parse(&model_of::<i64>()).unwrap());
    }
}
