use proc_macro::TokenStream;

mod controller;
mod http_methods;
mod model;
mod module;
mod types;

/// Attribute macro declaring a controller type
///
/// Generates a `ControllerType` impl. Fields of type `Session` receive the
/// current request's session; every other field is defaulted.
///
/// # Example
/// ```ignore
/// use trellis::controller;
///
/// #[controller(path = "/admin", roles = ["admin"])]
/// pub struct AdminController {
///     session: Session,
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::controller_attribute(attr, item)
}

/// Attribute macro collecting the handler methods of a controller
///
/// A method is a handler when it carries `#[url]`, a verb marker, `#[rest]`
/// or `#[auth]`. Parameters declare how they are bound with `#[session]`,
/// `#[request_param]`, `#[model_attribute]` (plus `#[valid]`) or
/// `#[file_upload]`.
///
/// # Example
/// ```ignore
/// #[routes]
/// impl AccountController {
///     #[url("/accounts")]
///     #[post]
///     fn create(&self, #[model_attribute("account")] #[valid] account: Account) -> ModelView {
///         ModelView::new("account.jsp").with("account", account)
///     }
///
///     #[get("/accounts/count")]
///     #[rest]
///     fn count(&self, #[request_param("active")] active: bool) -> u64 {
///         // ...
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn routes(attr: TokenStream, item: TokenStream) -> TokenStream {
    controller::routes_attribute(attr, item)
}

/// Attribute macro grouping controllers and imported modules
///
/// # Example
/// ```ignore
/// use trellis::module;
///
/// #[module(
///     imports = [AdminModule],
///     controllers = [AccountController, ReportController],
/// )]
/// pub struct AppModule;
/// ```
#[proc_macro_attribute]
pub fn module(attr: TokenStream, item: TokenStream) -> TokenStream {
    module::module_attribute(attr, item)
}

/// Derive macro binding a struct from request parameters
///
/// `#[valid]` on the struct opts every use into validation. Fields may carry
/// `#[entity]` (foreign-key reference), `#[nested]` (dot-prefixed
/// composite), `#[skip]`, and constraints: `#[size]`, `#[not_null]`,
/// `#[number]` or `#[constraint("kind", ...)]`.
///
/// # Example
/// ```ignore
/// #[derive(Default, Serialize, Model)]
/// #[valid]
/// pub struct Flight {
///     #[size(min = 2, max = 8, message = "Invalid flight code")]
///     pub code: String,
///     #[number(can_be_negative = false)]
///     pub seats: i32,
///     #[entity]
///     pub plane: Plane,
/// }
/// ```
#[proc_macro_derive(
    Model,
    attributes(valid, entity, nested, skip, size, not_null, number, constraint)
)]
pub fn derive_model(input: TokenStream) -> TokenStream {
    model::derive_model(input)
}

/// Derive macro for models referenced by identity
///
/// Requires `#[derive(Model)]` as well and exactly one `#[id]` field.
#[proc_macro_derive(Entity, attributes(id))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    model::derive_entity(input)
}

/// HTTP GET marker for handler methods
#[proc_macro_attribute]
pub fn get(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("GET", attr, item)
}

/// HTTP POST marker for handler methods
#[proc_macro_attribute]
pub fn post(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("POST", attr, item)
}

/// HTTP PUT marker for handler methods
#[proc_macro_attribute]
pub fn put(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("PUT", attr, item)
}

/// HTTP DELETE marker for handler methods
#[proc_macro_attribute]
pub fn delete(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("DELETE", attr, item)
}

/// HTTP PATCH marker for handler methods
#[proc_macro_attribute]
pub fn patch(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("PATCH", attr, item)
}

/// Handler URL, relative to the controller path and the base path
#[proc_macro_attribute]
pub fn url(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("url", attr, item)
}

/// Serialize the handler result as JSON instead of forwarding to a view
#[proc_macro_attribute]
pub fn rest(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("rest", attr, item)
}

/// Require an authenticated session, optionally with one of `roles`
#[proc_macro_attribute]
pub fn auth(attr: TokenStream, item: TokenStream) -> TokenStream {
    http_methods::routing_marker_attribute("auth", attr, item)
}
