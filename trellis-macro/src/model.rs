use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse::Parse, parse::ParseStream, parse_macro_input, Attribute, Data, DeriveInput, Expr,
    Field, Fields, Lit, LitStr, Meta, Token, UnOp,
};

use crate::types::unwrap_generic;

/// Constraint attributes understood on model fields, and the validator
/// kind each one maps to.
const CONSTRAINTS: [(&str, &str); 3] = [
    ("size", "size"),
    ("not_null", "not_null"),
    ("number", "number"),
];

/// `#[constraint("kind", name = value, ..., message = "...")]`, or the
/// argument list of one of the named constraint attributes.
struct ConstraintArgs {
    kind: Option<LitStr>,
    params: Vec<(syn::Ident, Expr)>,
}

impl Parse for ConstraintArgs {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut kind = None;
        let mut params = Vec::new();
        if input.peek(LitStr) {
            kind = Some(input.parse()?);
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        while !input.is_empty() {
            let name: syn::Ident = input.parse()?;
            input.parse::<Token![=]>()?;
            let value: Expr = input.parse()?;
            params.push((name, value));
            if input.peek(Token![,]) {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(ConstraintArgs { kind, params })
    }
}

enum FieldKind {
    Plain,
    Entity,
    Nested,
    Skip,
}

struct ModelField<'a> {
    field: &'a Field,
    kind: FieldKind,
    constraints: Vec<TokenStream2>,
}

pub fn derive_model(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = generate_model_impl(&input).unwrap_or_else(|e| e.to_compile_error());
    TokenStream::from(expanded)
}

fn generate_model_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    name,
                    "Model can only be derived for structs with named fields",
                ));
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                name,
                "Model can only be derived for structs",
            ));
        }
    };

    let validated = input.attrs.iter().any(|attr| attr.path().is_ident("valid"));

    let mut model_fields = Vec::new();
    for field in fields {
        model_fields.push(ModelField {
            field,
            kind: field_kind(&field.attrs),
            constraints: field_constraints(&field.attrs)?,
        });
    }

    let binds = model_fields.iter().map(generate_field_bind);
    let views = model_fields
        .iter()
        .filter(|f| !f.constraints.is_empty())
        .map(generate_field_view);

    Ok(quote! {
        impl #impl_generics ::trellis::binder::Model for #name #ty_generics #where_clause {
            const VALIDATED: bool = #validated;

            fn bind(
                data: &::trellis::request::RequestData,
                prefix: &str,
            ) -> ::std::result::Result<Self, ::trellis::error::BindingErrors> {
                let mut __errors = ::trellis::binder::FieldErrors::new();
                let __model = Self {
                    #(#binds),*
                };
                __errors.finish(__model)
            }

            fn fields(&self) -> ::std::vec::Vec<::trellis::validation::FieldView<'_>> {
                ::std::vec![#(#views),*]
            }
        }
    })
}

fn field_kind(attrs: &[Attribute]) -> FieldKind {
    if attrs.iter().any(|attr| attr.path().is_ident("skip")) {
        FieldKind::Skip
    } else if attrs.iter().any(|attr| attr.path().is_ident("entity")) {
        FieldKind::Entity
    } else if attrs.iter().any(|attr| attr.path().is_ident("nested")) {
        FieldKind::Nested
    } else {
        FieldKind::Plain
    }
}

fn field_constraints(attrs: &[Attribute]) -> syn::Result<Vec<TokenStream2>> {
    let mut constraints = Vec::new();
    for attr in attrs {
        let kind = if attr.path().is_ident("constraint") {
            None
        } else if let Some((_, kind)) = CONSTRAINTS
            .iter()
            .find(|(name, _)| attr.path().is_ident(name))
        {
            Some(LitStr::new(kind, proc_macro2::Span::call_site()))
        } else {
            continue;
        };

        let args = match &attr.meta {
            Meta::List(_) => attr.parse_args::<ConstraintArgs>()?,
            _ => ConstraintArgs {
                kind: None,
                params: Vec::new(),
            },
        };

        let kind = match (kind, args.kind) {
            (Some(kind), None) => kind,
            (None, Some(kind)) => kind,
            (Some(_), Some(extra)) => {
                return Err(syn::Error::new_spanned(
                    extra,
                    "unexpected constraint kind; use #[constraint(\"kind\", ...)]",
                ));
            }
            (None, None) => {
                return Err(syn::Error::new_spanned(
                    attr,
                    "#[constraint] requires a kind, e.g. #[constraint(\"email\")]",
                ));
            }
        };

        let mut builder = quote! { ::trellis::validation::Constraint::new(#kind) };
        for (param, value) in &args.params {
            let key = param.to_string();
            builder = if key == "message" {
                quote! { #builder.with_message(#value) }
            } else {
                let call = constraint_param(&key, value)?;
                quote! { #builder #call }
            };
        }
        constraints.push(builder);
    }
    Ok(constraints)
}

fn constraint_param(key: &str, value: &Expr) -> syn::Result<TokenStream2> {
    match value {
        Expr::Lit(expr) => match &expr.lit {
            Lit::Int(int) => {
                let value = int.base10_parse::<i64>()?;
                Ok(quote! { .with_int(#key, #value) })
            }
            Lit::Bool(flag) => {
                let value = flag.value;
                Ok(quote! { .with_bool(#key, #value) })
            }
            Lit::Str(text) => Ok(quote! { .with_text(#key, #text) }),
            other => Err(syn::Error::new_spanned(
                other,
                "constraint parameters must be integer, boolean or string literals",
            )),
        },
        Expr::Unary(unary) if matches!(unary.op, UnOp::Neg(_)) => match unary.expr.as_ref() {
            Expr::Lit(expr) => match &expr.lit {
                Lit::Int(int) => {
                    let value = -int.base10_parse::<i64>()?;
                    Ok(quote! { .with_int(#key, #value) })
                }
                other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
            },
            other => Err(syn::Error::new_spanned(other, "expected an integer literal")),
        },
        other => Err(syn::Error::new_spanned(
            other,
            "constraint parameters must be literals",
        )),
    }
}

fn generate_field_bind(model_field: &ModelField<'_>) -> TokenStream2 {
    let field = model_field.field;
    let ident = &field.ident;
    let ty = &field.ty;
    let name = ident
        .as_ref()
        .map(|ident| ident.to_string())
        .unwrap_or_default();
    let key = quote! { &::trellis::binder::field_key(prefix, #name) };

    let value = match model_field.kind {
        FieldKind::Skip => quote! { ::std::default::Default::default() },
        FieldKind::Plain => quote! {
            match data.value(#key) {
                ::std::option::Option::Some(raw) => __errors.take(
                    ::trellis::binder::bind_field::<#ty>(::std::option::Option::Some(raw)),
                ),
                ::std::option::Option::None => ::std::default::Default::default(),
            }
        },
        FieldKind::Entity => match unwrap_generic(ty, "Option") {
            Some(inner) => quote! {
                __errors.take(::trellis::binder::bind_optional_entity::<#inner>(data, #key))
            },
            None => quote! {
                __errors.take(::trellis::binder::bind_entity::<#ty>(data, #key))
            },
        },
        FieldKind::Nested => match unwrap_generic(ty, "Option") {
            Some(inner) => quote! {
                __errors.take(::trellis::binder::bind_optional_nested::<#inner>(data, #key))
            },
            None => quote! {
                __errors.take(::trellis::binder::bind_nested::<#ty>(data, #key))
            },
        },
    };

    quote! { #ident: #value }
}

fn generate_field_view(model_field: &ModelField<'_>) -> TokenStream2 {
    let field = model_field.field;
    let ident = &field.ident;
    let name = ident
        .as_ref()
        .map(|ident| ident.to_string())
        .unwrap_or_default();
    let constraints = &model_field.constraints;

    let value = match model_field.kind {
        FieldKind::Plain | FieldKind::Skip => quote! {
            ::trellis::validation::AsFieldValue::as_field_value(&self.#ident)
        },
        // Composite fields only expose presence.
        FieldKind::Entity | FieldKind::Nested => {
            if unwrap_generic(&field.ty, "Option").is_some() {
                quote! {
                    if self.#ident.is_some() {
                        ::trellis::validation::FieldValue::Present
                    } else {
                        ::trellis::validation::FieldValue::Null
                    }
                }
            } else {
                quote! { ::trellis::validation::FieldValue::Present }
            }
        }
    };

    quote! {
        ::trellis::validation::FieldView::new(#name, #value, ::std::vec![#(#constraints),*])
    }
}

pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let expanded = generate_entity_impl(&input).unwrap_or_else(|e| e.to_compile_error());
    TokenStream::from(expanded)
}

fn generate_entity_impl(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            name,
            "Entity can only be derived for structs",
        ));
    };

    let id = data
        .fields
        .iter()
        .find(|field| field.attrs.iter().any(|attr| attr.path().is_ident("id")))
        .ok_or_else(|| {
            syn::Error::new_spanned(name, "Entity requires exactly one field marked #[id]")
        })?;
    let id_ident = &id.ident;
    let id_ty = &id.ty;

    Ok(quote! {
        impl #impl_generics ::trellis::binder::Entity for #name #ty_generics #where_clause {
            const ID_TARGET: ::trellis::binder::ScalarTarget =
                <#id_ty as ::trellis::binder::FromScalar>::TARGET;

            fn with_identity(
                id: ::trellis::binder::ScalarValue,
            ) -> ::std::result::Result<Self, ::trellis::error::BindingError> {
                ::std::result::Result::Ok(Self {
                    #id_ident: <#id_ty as ::trellis::binder::FromScalar>::from_scalar(id)?,
                    ..::std::default::Default::default()
                })
            }
        }
    })
}
