use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput, LitStr};

/// Implements `entity_chunks::Component` for a type.
///
/// The stable component name defaults to `module_path!()::Ident` and can be
/// overridden with `#[component(name = "...")]`. Generic types are rejected.
#[proc_macro_derive(Component, attributes(component))]
pub fn derive_component_fn(input: TokenStream) -> TokenStream {
    let main_crate = quote!(::entity_chunks);

    let DeriveInput {
        ident,
        generics,
        attrs,
        ..
    } = parse_macro_input!(input as DeriveInput);

    let mut custom_name: Option<LitStr> = None;

    for attr in attrs.iter().filter(|a| a.path().is_ident("component")) {
        let res = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                custom_name = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("unsupported component attribute"))
            }
        });
        if let Err(err) = res {
            return err.to_compile_error().into();
        }
    }

    let name = match custom_name {
        Some(lit) => quote!(#lit),
        None => quote!(::std::concat!(::std::module_path!(), "::", ::std::stringify!(#ident))),
    };

    // Every instantiation of a generic type would share one name, and with it
    // one stable id.
    if !generics.params.is_empty() {
        return syn::Error::new_spanned(
            &generics,
            "`Component` cannot be derived for generic types; implement it by hand with a distinct `NAME` per instantiation",
        )
        .to_compile_error()
        .into();
    }

    quote! {
        impl #main_crate::Component for #ident {
            const NAME: &'static str = #name;

            fn descriptor_slot(
            ) -> ::std::option::Option<&'static ::std::sync::OnceLock<&'static #main_crate::ComponentDescriptor>> {
                static SLOT: ::std::sync::OnceLock<&'static #main_crate::ComponentDescriptor> =
                    ::std::sync::OnceLock::new();
                ::std::option::Option::Some(&SLOT)
            }
        }
    }
    .into()
}
