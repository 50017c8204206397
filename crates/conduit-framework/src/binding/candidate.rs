use std::any::TypeId;
use std::fmt;

use conduit_core::model::{BindAsyncFn, FormatProvider, ParameterInfo, TryParseFn};
use conduit_core::{BoundValue, BoxError, HttpContext};

/// Which capability a candidate provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CandidateKind {
    /// Parses a single text value.
    TryParse,
    /// Binds from the whole request.
    BindAsync,
}

/// Where the chosen method was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DeclarationSite {
    /// On the type itself.
    Direct,
    /// On a base type, named here.
    Base(String),
    /// As a default body on a capability interface, named here.
    Interface(String),
    /// The built-in enumeration parser.
    Enum {
        /// `true` for the strongly typed parser.
        generic: bool,
    },
}

#[derive(Clone)]
enum Invoker {
    TryParse(TryParseFn),
    BindAsync(BindAsyncFn),
}

/// A resolved binding capability, ready to call.
///
/// Two candidates are equal when they describe the same method on the same
/// type; the callable itself is not compared.
#[derive(Clone)]
pub struct BindingCandidate {
    kind: CandidateKind,
    owner: String,
    owner_id: TypeId,
    site: DeclarationSite,
    arity: usize,
    signature: String,
    invoker: Invoker,
}

impl BindingCandidate {
    pub(crate) fn try_parse(
        owner: &str,
        owner_id: TypeId,
        site: DeclarationSite,
        arity: usize,
        signature: String,
        parse: TryParseFn,
    ) -> Self {
        Self {
            kind: CandidateKind::TryParse,
            owner: owner.to_string(),
            owner_id,
            site,
            arity,
            signature,
            invoker: Invoker::TryParse(parse),
        }
    }

    pub(crate) fn bind_async(
        owner: &str,
        owner_id: TypeId,
        site: DeclarationSite,
        arity: usize,
        signature: String,
        bind: BindAsyncFn,
    ) -> Self {
        Self {
            kind: CandidateKind::BindAsync,
            owner: owner.to_string(),
            owner_id,
            site,
            arity,
            signature,
            invoker: Invoker::BindAsync(bind),
        }
    }

    /// The capability kind.
    pub fn kind(&self) -> CandidateKind {
        self.kind
    }

    /// The bound type's name.
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// The bound type's id.
    pub fn owner_id(&self) -> TypeId {
        self.owner_id
    }

    /// Where the method was declared.
    pub fn site(&self) -> &DeclarationSite {
        &self.site
    }

    /// Number of declared parameters, excluding the output slot.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Returns `true` if the method takes a format provider.
    pub fn takes_format_provider(&self) -> bool {
        self.kind == CandidateKind::TryParse && self.arity == 2
    }

    /// Returns `true` if the method takes parameter information.
    pub fn takes_parameter_info(&self) -> bool {
        self.kind == CandidateKind::BindAsync && self.arity == 2
    }

    /// The method as declared.
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The chosen overload as `Type.method(params)`, as used in "not provided
    /// from" diagnostics.
    pub fn describe(&self) -> String {
        let method = match self.kind {
            CandidateKind::TryParse => "try_parse(",
            CandidateKind::BindAsync => "bind_async(",
        };
        match self.signature.find(method) {
            Some(at) => format!("{}.{}", self.owner, &self.signature[at..]),
            None => format!("{}.{}", self.owner, self.signature),
        }
    }

    /// Parses `text`. Always `None` for `bind_async` candidates.
    pub fn parse(&self, text: &str) -> Option<BoundValue> {
        match &self.invoker {
            Invoker::TryParse(parse) => {
                let provider = self
                    .takes_format_provider()
                    .then_some(&FormatProvider::INVARIANT);
                parse(text, provider)
            }
            Invoker::BindAsync(_) => None,
        }
    }

    /// Binds from the request. Always `Ok(None)` for `try_parse` candidates.
    pub async fn bind(
        &self,
        ctx: HttpContext,
        info: ParameterInfo,
    ) -> Result<Option<BoundValue>, BoxError> {
        match &self.invoker {
            Invoker::BindAsync(bind) => {
                let info = self.takes_parameter_info().then_some(info);
                bind(ctx, info).await
            }
            Invoker::TryParse(_) => Ok(None),
        }
    }
}

impl PartialEq for BindingCandidate {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
            && self.owner_id == other.owner_id
            && self.site == other.site
            && self.arity == other.arity
            && self.signature == other.signature
    }
}

impl Eq for BindingCandidate {}

impl fmt::Debug for BindingCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingCandidate")
            .field("kind", &self.kind)
            .field("owner", &self.owner)
            .field("site", &self.site)
            .field("signature", &self.signature)
            .finish()
    }
}
