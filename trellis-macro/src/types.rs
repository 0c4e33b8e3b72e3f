use syn::{GenericArgument, PathArguments, Type};

/// Last path segment name of a type, e.g. `Option` for `std::option::Option<T>`.
pub fn last_segment(ty: &Type) -> Option<String> {
    match ty {
        Type::Path(type_path) => type_path
            .path
            .segments
            .last()
            .map(|segment| segment.ident.to_string()),
        Type::Group(group) => last_segment(&group.elem),
        Type::Paren(paren) => last_segment(&paren.elem),
        _ => None,
    }
}

/// The `index`-th generic type argument of the last path segment.
pub fn generic_arg(ty: &Type, index: usize) -> Option<&Type> {
    let Type::Path(type_path) = ty else {
        return None;
    };
    let segment = type_path.path.segments.last()?;
    let PathArguments::AngleBracketed(args) = &segment.arguments else {
        return None;
    };
    args.args
        .iter()
        .filter_map(|arg| match arg {
            GenericArgument::Type(ty) => Some(ty),
            _ => None,
        })
        .nth(index)
}

/// `T` when `ty` is `<wrapper><T>`.
pub fn unwrap_generic<'a>(ty: &'a Type, wrapper: &str) -> Option<&'a Type> {
    if last_segment(ty).as_deref() == Some(wrapper) {
        generic_arg(ty, 0)
    } else {
        None
    }
}

pub fn is_str_ref(ty: &Type) -> bool {
    match ty {
        Type::Reference(reference) => last_segment(&reference.elem).as_deref() == Some("str"),
        _ => false,
    }
}
