use proc_macro::TokenStream;
use quote::quote;
use syn::parse_macro_input;

/// Routing markers are consumed by `#[routes]`; outside of it they leave
/// the method untouched.
pub fn routing_marker_attribute(_marker: &str, _attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as syn::ImplItemFn);

    TokenStream::from(quote! {
        #input
    })
}
