use proc_macro2::{Span, TokenStream};
use quote::{format_ident, quote};
use syn::{
    Attribute, Expr, FnArg, Ident, ItemFn, LitStr, Pat, Type,
    ext::IdentExt,
    parse::{Parse, ParseStream, Result},
};

/// Parameter attributes understood by `#[endpoint]`.
const PARAM_ATTRS: &[&str] = &[
    "route",
    "query",
    "header",
    "body",
    "services",
    "form",
    "as_parameters",
    "default",
];

// ─── Input AST types ─────────────────────────────────────────────────────────

/// Options in `#[endpoint(...)]`.
#[derive(Default)]
pub struct EndpointArgs {
    name: Option<LitStr>,
    without_nullability_tracking: bool,
}

/// Where one parameter is pinned to.
enum Source {
    Route(Option<LitStr>),
    Query(Option<LitStr>),
    Header(Option<LitStr>),
    Body { allow_empty: bool },
    Services,
    Form(Option<LitStr>),
    AsParameters,
}

struct Param {
    name: Option<String>,
    ty: Type,
    source: Option<Source>,
    default: Option<Expr>,
}

// ─── Parsing ──────────────────────────────────────────────────────────────────

impl Parse for EndpointArgs {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut args = EndpointArgs::default();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            match key.to_string().as_str() {
                "name" => {
                    input.parse::<syn::Token![=]>()?;
                    args.name = Some(input.parse()?);
                }
                "without_nullability_tracking" => args.without_nullability_tracking = true,
                other => {
                    return Err(syn::Error::new(
                        key.span(),
                        format!(
                            "unknown endpoint option `{other}`; expected name or without_nullability_tracking"
                        ),
                    ));
                }
            }
            if !input.is_empty() {
                input.parse::<syn::Token![,]>()?;
            }
        }
        Ok(args)
    }
}

/// `#[route]` or `#[route("name")]`.
fn optional_name(attr: &Attribute) -> Result<Option<LitStr>> {
    match &attr.meta {
        syn::Meta::Path(_) => Ok(None),
        _ => attr.parse_args::<LitStr>().map(Some),
    }
}

fn set_source(slot: &mut Option<Source>, attr: &Attribute, source: Source) -> Result<()> {
    if slot.is_some() {
        return Err(syn::Error::new_spanned(
            attr,
            "a parameter can be bound from one source only",
        ));
    }
    *slot = Some(source);
    Ok(())
}

/// Reads and removes the binding attributes of one parameter.
fn take_param_attrs(attrs: &mut Vec<Attribute>) -> Result<(Option<Source>, Option<Expr>)> {
    let mut source = None;
    let mut default = None;

    for attr in attrs.iter() {
        let Some(ident) = attr.path().get_ident() else {
            continue;
        };
        match ident.to_string().as_str() {
            "route" => set_source(&mut source, attr, Source::Route(optional_name(attr)?))?,
            "query" => set_source(&mut source, attr, Source::Query(optional_name(attr)?))?,
            "header" => set_source(&mut source, attr, Source::Header(optional_name(attr)?))?,
            "form" => set_source(&mut source, attr, Source::Form(optional_name(attr)?))?,
            "services" => set_source(&mut source, attr, Source::Services)?,
            "as_parameters" => set_source(&mut source, attr, Source::AsParameters)?,
            "body" => {
                let mut allow_empty = false;
                if !matches!(attr.meta, syn::Meta::Path(_)) {
                    attr.parse_nested_meta(|meta| {
                        if meta.path.is_ident("allow_empty") {
                            allow_empty = true;
                            Ok(())
                        } else {
                            Err(meta.error("expected `allow_empty`"))
                        }
                    })?;
                }
                set_source(&mut source, attr, Source::Body { allow_empty })?;
            }
            "default" => default = Some(attr.parse_args::<Expr>()?),
            _ => {}
        }
    }

    attrs.retain(|attr| {
        !attr
            .path()
            .get_ident()
            .is_some_and(|ident| PARAM_ATTRS.contains(&ident.to_string().as_str()))
    });
    Ok((source, default))
}

fn collect_params(func: &mut ItemFn) -> Result<Vec<Param>> {
    let mut params = Vec::new();
    for input in func.sig.inputs.iter_mut() {
        let FnArg::Typed(typed) = input else {
            return Err(syn::Error::new_spanned(
                input,
                "#[endpoint] cannot be used on methods",
            ));
        };
        let (source, default) = take_param_attrs(&mut typed.attrs)?;
        let name = match typed.pat.as_ref() {
            Pat::Ident(pat) => Some(pat.ident.unraw().to_string()),
            _ => None,
        };
        params.push(Param {
            name,
            ty: (*typed.ty).clone(),
            source,
            default,
        });
    }
    Ok(params)
}

// ─── Code generation ─────────────────────────────────────────────────────────

fn param_spec(param: &Param) -> TokenStream {
    let mut spec = match &param.name {
        Some(name) => quote!(::conduit::framework::ParamSpec::new(#name)),
        None => quote!(::conduit::framework::ParamSpec::unnamed()),
    };

    spec = match &param.source {
        None => spec,
        Some(Source::Route(None)) => quote!(#spec.from_route()),
        Some(Source::Route(Some(name))) => quote!(#spec.from_route_named(#name)),
        Some(Source::Query(None)) => quote!(#spec.from_query()),
        Some(Source::Query(Some(name))) => quote!(#spec.from_query_named(#name)),
        Some(Source::Header(None)) => quote!(#spec.from_header()),
        Some(Source::Header(Some(name))) => quote!(#spec.from_header_named(#name)),
        Some(Source::Body { allow_empty: false }) => quote!(#spec.from_body()),
        Some(Source::Body { allow_empty: true }) => quote!(#spec.from_body_allow_empty()),
        Some(Source::Services) => quote!(#spec.from_services()),
        Some(Source::Form(None)) => quote!(#spec.from_form()),
        Some(Source::Form(Some(name))) => quote!(#spec.from_form_named(#name)),
        Some(Source::AsParameters) => quote!(#spec.as_parameters()),
    };

    if let Some(default) = &param.default {
        let ty = &param.ty;
        spec = quote!(#spec.default::<#ty>(#default));
    }
    spec
}

/// Implementation of the `#[endpoint]` attribute macro.
///
/// Emits the function with its parameter attributes removed, followed by a
/// `{name}_endpoint()` constructor returning its `HandlerDescriptor`.
pub fn expand(args: EndpointArgs, mut func: ItemFn) -> Result<TokenStream> {
    if !func.sig.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &func.sig.generics,
            "#[endpoint] functions cannot be generic",
        ));
    }

    let params = collect_params(&mut func)?;
    let fn_name = &func.sig.ident;
    let vis = &func.vis;
    let constructor = format_ident!("{}_endpoint", fn_name.unraw());
    let endpoint_name = args
        .name
        .unwrap_or_else(|| LitStr::new(&fn_name.unraw().to_string(), Span::call_site()));

    let adapter = if func.sig.asyncness.is_some() {
        quote!(::conduit::framework::handler_fn)
    } else {
        quote!(::conduit::framework::sync_handler_fn)
    };
    let specs = params.iter().map(param_spec);
    let nullability = args
        .without_nullability_tracking
        .then(|| quote!(.without_nullability_tracking()));
    let doc = format!("Describes the `{fn_name}` endpoint for compilation.");

    Ok(quote! {
        #func

        #[doc = #doc]
        #vis fn #constructor() -> ::conduit::framework::HandlerDescriptor {
            #adapter(#fn_name)
                .with_name(#endpoint_name)
                .with_params([#(#specs),*])
                #nullability
        }
    })
}
