//! Procedural macros for Conduit.
//!
//! This crate provides:
//!
//! - `#[endpoint]` - Records parameter names and binding sources of a handler
//!   function, which plain Rust cannot observe at runtime
//!
//! Use it through the `conduit` facade crate; the generated code refers to
//! `::conduit::framework`.

mod endpoint;

use proc_macro::TokenStream;
use syn::{ItemFn, parse_macro_input};

/// Declares a handler function as an endpoint.
///
/// Leaves the function in place and adds a `{name}_endpoint()` function that
/// returns its `HandlerDescriptor`, with every parameter named after its
/// pattern and pinned to the source its attribute names.
///
/// # Parameter attributes
///
/// - `#[route]`, `#[route("name")]` - a route value
/// - `#[query]`, `#[query("name")]` - a query string value
/// - `#[header]`, `#[header("name")]` - a request header
/// - `#[body]`, `#[body(allow_empty)]` - the JSON body
/// - `#[form]`, `#[form("name")]` - a form field or file
/// - `#[services]` - a request service
/// - `#[as_parameters]` - expand a record type into its members
/// - `#[default(expr)]` - a default value; `expr` must have the parameter's type
///
/// Parameters without an attribute are classified by type.
///
/// # Options
///
/// - `name = "..."` - the endpoint name used in logs (default: the function name)
/// - `without_nullability_tracking` - treat non-nullable text, object and
///   sequence parameters as optional
///
/// # Example
///
/// ```rust,ignore
/// use conduit::prelude::*;
///
/// #[endpoint]
/// async fn list_todos(
///     #[route] owner: String,
///     #[query] #[default(20)] limit: u32,
///     #[services] store: Arc<TodoStore>,
/// ) -> Json<Vec<Todo>> {
///     Json(store.list(&owner, limit))
/// }
///
/// let delegate = compiler.compile(list_todos_endpoint())?;
/// ```
#[proc_macro_attribute]
pub fn endpoint(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as endpoint::EndpointArgs);
    let func = parse_macro_input!(item as ItemFn);

    match endpoint::expand(args, func) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
