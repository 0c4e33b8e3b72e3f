use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, Attribute, Fields, FnArg, ImplItem,
    ImplItemFn, ItemImpl, ItemStruct, LitStr, Meta, Pat, ReturnType, Token, Type,
};

use crate::types::{generic_arg, is_str_ref, last_segment, unwrap_generic};

const VERBS: [&str; 5] = ["get", "post", "put", "delete", "patch"];
const METHOD_ATTRS: [&str; 3] = ["url", "rest", "auth"];
const PARAM_ATTRS: [&str; 5] = [
    "session",
    "request_param",
    "model_attribute",
    "valid",
    "file_upload",
];

/// An authorization declaration: `auth` and/or `roles = ["a", "b"]`.
#[derive(Default)]
struct AuthArgs {
    enabled: bool,
    roles: Vec<LitStr>,
}

impl AuthArgs {
    fn tokens(&self) -> TokenStream2 {
        if !self.enabled {
            return quote! { ::std::option::Option::None };
        }
        if self.roles.is_empty() {
            return quote! {
                ::std::option::Option::Some(::trellis::guard::Authorization::authenticated())
            };
        }
        let roles = &self.roles;
        quote! {
            ::std::option::Option::Some(::trellis::guard::Authorization::with_roles([#(#roles),*]))
        }
    }
}

/// Arguments of a method-level `#[auth(roles = [...])]`.
impl Parse for AuthArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = AuthArgs {
            enabled: true,
            roles: Vec::new(),
        };
        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            if name == "roles" {
                args.roles = parse_roles(input)?;
            } else {
                return Err(syn::Error::new(
                    name.span(),
                    format!("unknown auth argument `{name}`"),
                ));
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(args)
    }
}

fn parse_roles(input: ParseStream) -> syn::Result<Vec<LitStr>> {
    let content;
    syn::bracketed!(content in input);
    let roles = content.parse_terminated(<LitStr as Parse>::parse, Token![,])?;
    Ok(roles.into_iter().collect())
}

struct ControllerArgs {
    path: Option<LitStr>,
    auth: AuthArgs,
}

impl Parse for ControllerArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut path = None;
        let mut auth = AuthArgs::default();
        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            if name == "auth" {
                auth.enabled = true;
            } else {
                input.parse::<Token![=]>()?;
                if name == "path" {
                    path = Some(input.parse()?);
                } else if name == "roles" {
                    auth.enabled = true;
                    auth.roles = parse_roles(input)?;
                } else {
                    return Err(syn::Error::new(
                        name.span(),
                        format!("unknown controller argument `{name}`"),
                    ));
                }
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(ControllerArgs { path, auth })
    }
}

pub fn controller_attribute(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr as ControllerArgs);
    let input = parse_macro_input!(item as ItemStruct);
    let expanded = generate_controller_impl(&args, &input);
    TokenStream::from(expanded)
}

fn generate_controller_impl(args: &ControllerArgs, input: &ItemStruct) -> TokenStream2 {
    let struct_name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let construction = match &input.fields {
        Fields::Named(fields) => {
            let inits = fields.named.iter().map(|field| {
                let name = &field.ident;
                let value = field_injection(&field.ty);
                quote! { #name: #value }
            });
            quote! { Self { #(#inits),* } }
        }
        Fields::Unnamed(fields) => {
            let inits = fields.unnamed.iter().map(|field| field_injection(&field.ty));
            quote! { Self( #(#inits),* ) }
        }
        Fields::Unit => quote! { Self },
    };

    let authorization = args.auth.tokens();
    let path_prefix = match &args.path {
        Some(path) => quote! { ::std::option::Option::Some(#path) },
        None => quote! { ::std::option::Option::None },
    };

    quote! {
        #input

        impl #impl_generics ::trellis::controller::ControllerType for #struct_name #ty_generics #where_clause {
            #[allow(unused_variables)]
            fn create(
                session: &::trellis::session::Session,
            ) -> ::std::result::Result<Self, ::trellis::error::DispatchError> {
                ::std::result::Result::Ok(#construction)
            }

            fn authorization() -> ::std::option::Option<::trellis::guard::Authorization> {
                #authorization
            }

            fn path_prefix() -> ::std::option::Option<&'static str> {
                #path_prefix
            }
        }
    }
}

/// Session fields share the request's session; everything else is defaulted.
fn field_injection(ty: &Type) -> TokenStream2 {
    if last_segment(ty).as_deref() == Some("Session") {
        quote! { ::std::clone::Clone::clone(session) }
    } else {
        quote! { ::std::default::Default::default() }
    }
}

enum Returns {
    View,
    Text,
    File,
    Json,
    Other(String),
}

enum Binding {
    Session,
    Scalar(LitStr),
    Model { name: LitStr, validated: bool },
    File { name: Option<LitStr>, multiple: bool, required: bool },
}

struct Param {
    label: String,
    ty: Type,
    binding: Binding,
}

struct Handler {
    ident: syn::Ident,
    url: Option<LitStr>,
    verbs: Vec<String>,
    rest: bool,
    auth: AuthArgs,
    params: Vec<Param>,
    returns: Returns,
    fallible: bool,
}

pub fn routes_attribute(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    let expanded = generate_routes_impl(input).unwrap_or_else(|e| e.to_compile_error());
    TokenStream::from(expanded)
}

fn generate_routes_impl(input: ItemImpl) -> syn::Result<TokenStream2> {
    if let Some((_, path, _)) = &input.trait_ {
        return Err(syn::Error::new_spanned(
            path,
            "#[routes] must be placed on an inherent impl block",
        ));
    }

    let mut handlers = Vec::new();
    let mut clean_items = Vec::new();

    for item in &input.items {
        match item {
            ImplItem::Fn(method) => {
                if let Some(handler) = extract_handler(method)? {
                    handlers.push(handler);
                }
                let mut clean_method = method.clone();
                clean_method
                    .attrs
                    .retain(|attr| !is_named(attr, &VERBS) && !is_named(attr, &METHOD_ATTRS));
                for input in clean_method.sig.inputs.iter_mut() {
                    if let FnArg::Typed(pat_type) = input {
                        pat_type.attrs.retain(|attr| !is_named(attr, &PARAM_ATTRS));
                    }
                }
                clean_items.push(ImplItem::Fn(clean_method));
            }
            other => clean_items.push(other.clone()),
        }
    }

    let mut cleaned = input.clone();
    cleaned.items = clean_items;

    let invokers = handlers.iter().map(generate_invoker);
    let descriptors = handlers.iter().map(generate_method_descriptor);

    let self_ty = &input.self_ty;
    let (impl_generics, _, where_clause) = input.generics.split_for_impl();

    Ok(quote! {
        #cleaned

        impl #impl_generics #self_ty #where_clause {
            #(#invokers)*
        }

        impl #impl_generics ::trellis::controller::Controller for #self_ty #where_clause {
            fn descriptor() -> ::trellis::controller::ControllerDescriptor {
                let mut descriptor = ::trellis::controller::ControllerDescriptor::new(
                    ::std::any::type_name::<Self>(),
                    ::std::module_path!(),
                    <Self as ::trellis::controller::ControllerType>::instantiate,
                );
                descriptor.path_prefix = <Self as ::trellis::controller::ControllerType>::path_prefix();
                descriptor.authorization =
                    <Self as ::trellis::controller::ControllerType>::authorization();
                descriptor.methods = ::std::vec![#(#descriptors),*];
                descriptor
            }
        }
    })
}

fn is_named(attr: &Attribute, names: &[&str]) -> bool {
    attr.path()
        .get_ident()
        .is_some_and(|ident| names.contains(&ident.to_string().as_str()))
}

fn extract_handler(method: &ImplItemFn) -> syn::Result<Option<Handler>> {
    if !method
        .attrs
        .iter()
        .any(|attr| is_named(attr, &VERBS) || is_named(attr, &METHOD_ATTRS))
    {
        return Ok(None);
    }

    let mut url = None;
    let mut verbs = Vec::new();
    let mut rest = false;
    let mut auth = AuthArgs::default();

    for attr in &method.attrs {
        let Some(ident) = attr.path().get_ident() else {
            continue;
        };
        let name = ident.to_string();
        if VERBS.contains(&name.as_str()) {
            verbs.push(name.to_uppercase());
            // #[get("/path")] doubles as the URL declaration.
            if let Meta::List(_) = &attr.meta {
                let path: LitStr = attr.parse_args()?;
                url.get_or_insert(path);
            }
        } else if name == "url" {
            url = Some(attr.parse_args::<LitStr>()?);
        } else if name == "rest" {
            rest = true;
        } else if name == "auth" {
            auth = match &attr.meta {
                Meta::List(_) => attr.parse_args::<AuthArgs>()?,
                _ => AuthArgs {
                    enabled: true,
                    roles: Vec::new(),
                },
            };
        }
    }

    match method.sig.receiver() {
        Some(receiver) if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new_spanned(
                &method.sig,
                "handler methods must take `&self`",
            ));
        }
    }

    let mut params = Vec::new();
    for input in &method.sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            let label = match pat_type.pat.as_ref() {
                Pat::Ident(pat_ident) => pat_ident.ident.to_string(),
                other => quote!(#other).to_string(),
            };
            let ty = (*pat_type.ty).clone();
            let binding = resolve_binding(&label, &ty, &pat_type.attrs)?;
            params.push(Param { label, ty, binding });
        }
    }

    let (returns, fallible) = match &method.sig.output {
        ReturnType::Default => (Returns::Other("()".to_string()), false),
        ReturnType::Type(_, ty) => match unwrap_generic(ty, "Result") {
            Some(ok) => (classify_return(ok, rest), true),
            None => (classify_return(ty, rest), false),
        },
    };

    Ok(Some(Handler {
        ident: method.sig.ident.clone(),
        url,
        verbs,
        rest,
        auth,
        params,
        returns,
        fallible,
    }))
}

/// Resolves a parameter by declared capability, in the order
/// session, named scalar, composite model, file upload.
fn resolve_binding(label: &str, ty: &Type, attrs: &[Attribute]) -> syn::Result<Binding> {
    let find = |name: &str| attrs.iter().find(|attr| attr.path().is_ident(name));
    let name_or_label = |attr: &Attribute| -> syn::Result<LitStr> {
        match &attr.meta {
            Meta::List(_) => attr.parse_args::<LitStr>(),
            _ => Ok(LitStr::new(label, proc_macro2::Span::call_site())),
        }
    };

    if find("session").is_some() || last_segment(ty).as_deref() == Some("Session") {
        return Ok(Binding::Session);
    }
    if let Some(attr) = find("request_param") {
        return Ok(Binding::Scalar(name_or_label(attr)?));
    }
    if let Some(attr) = find("model_attribute") {
        return Ok(Binding::Model {
            name: name_or_label(attr)?,
            validated: find("valid").is_some(),
        });
    }
    if let Some(attr) = find("file_upload") {
        let args = match &attr.meta {
            Meta::List(_) => attr.parse_args::<FileArgs>()?,
            _ => FileArgs::default(),
        };
        let multiple = args.multiple || unwrap_generic(ty, "Vec").is_some();
        let optional = unwrap_generic(ty, "Option").is_some();
        let name = match (args.name, multiple) {
            (Some(name), _) => Some(name),
            (None, true) => None,
            (None, false) => Some(LitStr::new(label, proc_macro2::Span::call_site())),
        };
        return Ok(Binding::File {
            name,
            multiple,
            required: !multiple && !optional,
        });
    }

    Err(syn::Error::new_spanned(
        ty,
        format!("Parameter `{label}` is not annotated properly"),
    ))
}

#[derive(Default)]
struct FileArgs {
    name: Option<LitStr>,
    multiple: bool,
}

impl Parse for FileArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut args = FileArgs::default();
        while !input.is_empty() {
            if input.peek(LitStr) {
                args.name = Some(input.parse()?);
            } else {
                let flag: syn::Ident = input.parse()?;
                if flag != "multiple" {
                    return Err(syn::Error::new(
                        flag.span(),
                        format!("unknown file_upload argument `{flag}`"),
                    ));
                }
                args.multiple = true;
            }
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(args)
    }
}

fn classify_return(ty: &Type, rest: bool) -> Returns {
    if is_str_ref(ty) {
        return Returns::Text;
    }
    match last_segment(ty).as_deref() {
        Some("ModelView") => Returns::View,
        Some("String") if generic_arg(ty, 0).is_none() => Returns::Text,
        Some("FileExport") => Returns::File,
        _ if rest => Returns::Json,
        _ => Returns::Other(quote!(#ty).to_string().replace(' ', "")),
    }
}

fn generate_invoker(handler: &Handler) -> TokenStream2 {
    let ident = &handler.ident;
    let invoker = format_ident!("__trellis_invoke_{}", ident);

    let vars: Vec<_> = (0..handler.params.len())
        .map(|i| format_ident!("__arg{}", i))
        .collect();
    let fetches = handler.params.iter().zip(&vars).map(|(param, var)| {
        let ty = &param.ty;
        let label = &param.label;
        let fetch = match &param.binding {
            Binding::Session => quote! { __args.session(#label)? },
            Binding::Scalar(_) => quote! { __args.scalar::<#ty>(#label)? },
            Binding::Model { .. } => quote! { __args.model::<#ty>(#label)? },
            Binding::File { multiple: true, .. } => quote! { __args.files(#label)? },
            Binding::File { required: false, .. } => quote! { __args.file(#label)? },
            Binding::File { .. } => quote! { __args.required_file(#label)? },
        };
        quote! { let #var: #ty = #fetch; }
    });

    let unwrap = if handler.fallible {
        quote! {
            let __out = match __out {
                ::std::result::Result::Ok(value) => value,
                ::std::result::Result::Err(error) => {
                    return ::std::result::Result::Err(::std::convert::Into::into(error));
                }
            };
        }
    } else {
        quote! {}
    };

    let method_name = ident.to_string();
    let convert = match &handler.returns {
        Returns::View => quote! {
            ::std::result::Result::Ok(::trellis::response::HandlerResult::View(__out))
        },
        Returns::Text => quote! {
            ::std::result::Result::Ok(::trellis::response::HandlerResult::Text(
                ::std::string::String::from(__out),
            ))
        },
        Returns::File => quote! {
            ::std::result::Result::Ok(::trellis::response::HandlerResult::File(__out))
        },
        Returns::Json => quote! {
            ::trellis::response::HandlerResult::json(&__out)
        },
        Returns::Other(returned) => quote! {
            let _ = __out;
            ::std::result::Result::Err(::trellis::error::DispatchError::internal(::std::format!(
                "handler {} returned an unrenderable type {}",
                #method_name,
                #returned
            )))
        },
    };

    quote! {
        #[doc(hidden)]
        #[allow(unused_mut, unused_variables, clippy::let_unit_value)]
        fn #invoker(
            __instance: &(dyn ::std::any::Any + ::std::marker::Send + ::std::marker::Sync),
            mut __args: ::trellis::controller::Arguments,
        ) -> ::std::result::Result<
            ::trellis::response::HandlerResult,
            ::trellis::error::DispatchError,
        > {
            let __this = __instance.downcast_ref::<Self>().ok_or_else(|| {
                ::trellis::error::DispatchError::internal(::std::format!(
                    "instance is not a {}",
                    ::std::any::type_name::<Self>()
                ))
            })?;
            #(#fetches)*
            let __out = __this.#ident(#(#vars),*);
            #unwrap
            #convert
        }
    }
}

fn generate_method_descriptor(handler: &Handler) -> TokenStream2 {
    let name = handler.ident.to_string();
    let invoker = format_ident!("__trellis_invoke_{}", handler.ident);
    let url = match &handler.url {
        Some(url) => quote! { ::std::option::Option::Some(#url) },
        None => quote! { ::std::option::Option::None },
    };
    let verbs = &handler.verbs;
    let rest = handler.rest;
    let authorization = handler.auth.tokens();

    let returns = match &handler.returns {
        Returns::View => quote! { ::trellis::controller::ReturnKind::View },
        Returns::Text => quote! { ::trellis::controller::ReturnKind::Text },
        Returns::File => quote! { ::trellis::controller::ReturnKind::File },
        Returns::Json => quote! { ::trellis::controller::ReturnKind::Json },
        Returns::Other(returned) => quote! { ::trellis::controller::ReturnKind::Other(#returned) },
    };

    let params = handler.params.iter().map(|param| {
        let label = &param.label;
        let ty = &param.ty;
        let binding = match &param.binding {
            Binding::Session => quote! { ::trellis::controller::ParamBinding::Session },
            Binding::Scalar(name) => quote! {
                ::trellis::controller::ParamBinding::Scalar {
                    name: #name,
                    target: <#ty as ::trellis::binder::FromScalar>::TARGET,
                }
            },
            Binding::Model { name, validated } => quote! {
                ::trellis::controller::ParamBinding::Model {
                    name: #name,
                    type_name: ::std::any::type_name::<#ty>(),
                    validated: #validated || <#ty as ::trellis::binder::Model>::VALIDATED,
                    bind: <#ty as ::trellis::binder::Model>::bind_boxed,
                }
            },
            Binding::File {
                name,
                multiple,
                required,
            } => {
                let name = match name {
                    Some(name) => quote! { ::std::option::Option::Some(#name) },
                    None => quote! { ::std::option::Option::None },
                };
                quote! {
                    ::trellis::controller::ParamBinding::File {
                        name: #name,
                        multiple: #multiple,
                        required: #required,
                    }
                }
            }
        };
        quote! { ::trellis::controller::ParamDescriptor::new(#label, #binding) }
    });

    quote! {
        ::trellis::controller::MethodDescriptor {
            name: #name,
            url: #url,
            verbs: ::std::vec![#(#verbs),*],
            rest: #rest,
            returns: #returns,
            authorization: #authorization,
            params: ::std::vec![#(#params),*],
            invoker: Self::#invoker,
        }
    }
}
