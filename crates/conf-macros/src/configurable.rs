//! Implementation of #[derive(Configurable)]

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{
    parse_macro_input, Attribute, Data, DeriveInput, Fields, GenericArgument, PathArguments, Type,
};

pub fn derive_configurable_impl(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

/// How a single struct field takes part in binding
enum Role {
    Field { name: String, collection: bool },
    Key,
    Extension { element: Type },
    Skip,
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Configurable cannot be derived for generic types",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(syn::Error::new_spanned(
                    input,
                    "Configurable requires a struct with named fields",
                ))
            }
        },
        _ => {
            return Err(syn::Error::new_spanned(
                input,
                "Configurable only works on structs",
            ))
        }
    };

    let extension_name = parse_struct_attrs(&input.attrs)?;

    let mut declarations = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.as_ref() else {
            continue;
        };
        let ty = &field.ty;
        let declaration = match parse_field_attrs(ident, ty, &field.attrs)? {
            Role::Skip => continue,
            Role::Field {
                name,
                collection: false,
            } => quote! {
                shape.field(#name, |target: &mut Self, value: #ty| target.#ident = value);
            },
            Role::Field {
                name,
                collection: true,
            } => quote! {
                shape.collection(#name, |target: &mut Self, value: #ty| target.#ident = value);
            },
            Role::Key => quote! {
                shape.key(|target: &mut Self, value: ::std::string::String| {
                    target.#ident = ::core::convert::From::from(value)
                });
            },
            Role::Extension { element } => quote! {
                shape.extension(|target: &mut Self, value: #element| target.#ident.push(value));
            },
        };
        declarations.push(declaration);
    }

    let extension_name_fn = match extension_name {
        Some(ext) => quote! {
            fn extension_name() -> ::core::option::Option<&'static str> {
                ::core::option::Option::Some(#ext)
            }
        },
        None => quote! {},
    };

    Ok(quote! {
        impl ::conf_core::shape::Configurable for #name {
            #[allow(unused_variables)]
            fn describe(shape: &mut ::conf_core::shape::ObjectBuilder<Self>) {
                #(#declarations)*
            }

            #extension_name_fn
        }

        impl ::conf_core::shape::Shape for #name {
            fn kind() -> ::conf_core::shape::ShapeKind {
                ::conf_core::shape::ShapeKind::object::<Self>()
            }

            fn from_value(
                value: ::conf_core::value::Value,
            ) -> ::std::result::Result<Self, ::conf_core::value::ValueMismatch> {
                value.into_object::<Self>()
            }

            fn type_name() -> ::std::string::String {
                ::std::string::String::from(stringify!(#name))
            }
        }
    })
}

fn parse_struct_attrs(attrs: &[Attribute]) -> syn::Result<Option<String>> {
    let mut extension_name = None;

    for attr in attrs {
        if attr.path().is_ident("config") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("extension_name") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    extension_name = Some(value.value());
                    Ok(())
                } else {
                    Err(meta.error("unsupported struct attribute, expected `extension_name`"))
                }
            })?;
        }
    }

    Ok(extension_name)
}

fn parse_field_attrs(ident: &syn::Ident, ty: &Type, attrs: &[Attribute]) -> syn::Result<Role> {
    let mut name = None;
    let mut skip = false;
    let mut collection = false;
    let mut key = false;
    let mut extension = false;

    for attr in attrs {
        if attr.path().is_ident("config") {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let value: syn::LitStr = meta.value()?.parse()?;
                    name = Some(value.value());
                } else if meta.path.is_ident("skip") {
                    skip = true;
                } else if meta.path.is_ident("collection") {
                    collection = true;
                } else if meta.path.is_ident("key") {
                    key = true;
                } else if meta.path.is_ident("extension") {
                    extension = true;
                } else {
                    return Err(meta.error(
                        "unsupported field attribute, expected one of `name`, `skip`, `collection`, `key`, `extension`",
                    ));
                }
                Ok(())
            })?;
        }
    }

    if skip {
        return Ok(Role::Skip);
    }
    if [key, extension, collection].iter().filter(|set| **set).count() > 1 {
        return Err(syn::Error::new_spanned(
            ident,
            "`key`, `extension` and `collection` are mutually exclusive",
        ));
    }
    if key {
        return Ok(Role::Key);
    }
    if extension {
        let element = vec_element(ty).ok_or_else(|| {
            syn::Error::new_spanned(ty, "`extension` fields must have type Vec<T>")
        })?;
        return Ok(Role::Extension { element });
    }

    let name = name.unwrap_or_else(|| kebab_case(ident));
    Ok(Role::Field { name, collection })
}

/// `Vec<T>` -> `T`
fn vec_element(ty: &Type) -> Option<Type> {
    let Type::Path(path) = ty else {
        return None;
    };
    let segment = path.path.segments.last()?;
    if segment.ident != "Vec" {
        return None;
    }
    match &segment.arguments {
        PathArguments::AngleBracketed(args) if args.args.len() == 1 => match args.args.first()? {
            GenericArgument::Type(element) => Some(element.clone()),
            _ => None,
        },
        _ => None,
    }
}

fn kebab_case(ident: &syn::Ident) -> String {
    let raw = ident.to_string();
    raw.strip_prefix("r#").unwrap_or(&raw).replace('_', "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kebab_case() {
        let ident: syn::Ident = syn::parse_quote!(integer_value);
        assert_eq!(kebab_case(&ident), "integer-value");
        let ident: syn::Ident = syn::parse_quote!(r#type);
        assert_eq!(kebab_case(&ident), "type");
    }

    #[test]
    fn test_vec_element() {
        let ty: Type = syn::parse_quote!(Vec<Child>);
        let element: Type = syn::parse_quote!(Child);
        assert_eq!(vec_element(&ty), Some(element));
        let ty: Type = syn::parse_quote!(Option<Child>);
        assert_eq!(vec_element(&ty), None);
    }

    #[test]
    fn test_field_roles() {
        let input: DeriveInput = syn::parse_quote! {
            #[config(extension_name = "thing")]
            struct Thing {
                #[config(key)]
                id: String,
                plain_value: i32,
                #[config(name = "renamed")]
                other: bool,
                #[config(skip)]
                cache: u8,
                #[config(extension)]
                parts: Vec<Part>,
            }
        };
        let tokens = expand(&input).unwrap().to_string();
        assert!(tokens.contains("\"plain-value\""));
        assert!(tokens.contains("\"renamed\""));
        assert!(tokens.contains("\"thing\""));
        assert!(!tokens.contains("cache"));
        assert!(tokens.contains("Part"));
        assert!(tokens.contains("push"));
    }

    #[test]
    fn test_rejects_tuple_structs() {
        let input: DeriveInput = syn::parse_quote!(struct Wrapper(i32););
        assert!(expand(&input).is_err());
    }

    #[test]
    fn test_rejects_conflicting_roles() {
        let input: DeriveInput = syn::parse_quote! {
            struct Bad {
                #[config(key, collection)]
                id: String,
            }
        };
        let err = expand(&input).err().unwrap();
        assert!(err.to_string().contains("mutually exclusive"));
    }

    #[test]
    fn test_extension_requires_vec() {
        let input: DeriveInput = syn::parse_quote! {
            struct Bad {
                #[config(extension)]
                part: Part,
            }
        };
        assert!(expand(&input).is_err());
    }
}
