//! Derive macro for automatic binary serialization.
//!
//! Generates `Encode` and `Decode` implementations for structs.
//!
//! # Supported Types
//!
//! - **Named structs**: `struct Program { text: Vec<i32> }`
//! - **Tuple structs**: `struct Version(u8, u8, u8)`
//! - **Unit structs**: `struct Marker`
//!
//! Enums and unions are not supported.
//!
//! # Binary Format
//!
//! Fields are serialized in declaration order:
//! - Integers: little-endian, fixed-width
//! - Arrays: elements serialized sequentially
//! - Vec: 8-byte length prefix (little-endian u64) followed by elements
//!
//! The format is deterministic: the same value always encodes to the
//! same bytes, so encoded images can be compared directly.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields};

/// Derives `Encode` and `Decode` for a type.
///
/// # Example
///
/// ```ignore
/// use minic_derive::BinaryCodec;
///
/// #[derive(BinaryCodec)]
/// pub struct Program {
///     pub text: Vec<i32>,
/// }
/// ```
///
/// # Generated Code
///
/// ```ignore
/// impl Encode for Program {
///     fn encode<S: EncodeSink>(&self, out: &mut S) {
///         self.text.encode(out);
///     }
/// }
///
/// impl Decode for Program {
///     fn decode(input: &mut &[u8]) -> Result<Self, DecodeError> {
///         Ok(Self {
///             text: Vec::<i32>::decode(input)?,
///         })
///     }
/// }
/// ```
pub fn derive_binary_codec(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    // Extract the type name (e.g., "Program", "Version").
    let name = &input.ident;

    // Split generics into the components needed for impl blocks:
    // - impl_generics: `<T: Clone>` (for `impl<T: Clone>`)
    // - ty_generics: `<T>` (for `MyStruct<T>`)
    // - where_clause: `where T: Debug` (optional constraints)
    let generics = &input.generics;
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();

    let expanded = match &input.data {
        Data::Struct(data_struct) => match &data_struct.fields {
            // Named fields: `struct Foo { a: u32, b: u64 }`
            Fields::Named(fields) => {
                generate_named_struct_impl(name, &impl_generics, &ty_generics, where_clause, fields)
            }
            // Tuple fields: `struct Foo(u32, u64)`
            Fields::Unnamed(fields) => {
                generate_tuple_struct_impl(name, &impl_generics, &ty_generics, where_clause, fields)
            }
            // Unit struct: `struct Foo`
            Fields::Unit => {
                generate_unit_struct_impl(name, &impl_generics, &ty_generics, where_clause)
            }
        },
        Data::Enum(_) => {
            syn::Error::new_spanned(&input, "BinaryCodec derive does not support enums")
                .to_compile_error()
        }
        Data::Union(_) => {
            syn::Error::new_spanned(&input, "BinaryCodec derive does not support unions")
                .to_compile_error()
        }
    };

    TokenStream::from(expanded)
}

/// Generates `Encode` and `Decode` for named-field structs.
///
/// Encoding writes each field in declaration order. Decoding reads
/// fields in the same order and constructs the struct.
fn generate_named_struct_impl(
    name: &syn::Ident,
    impl_generics: &syn::ImplGenerics,
    ty_generics: &syn::TypeGenerics,
    where_clause: Option<&syn::WhereClause>,
    fields: &syn::FieldsNamed,
) -> proc_macro2::TokenStream {
    let field_names: Vec<_> = fields.named.iter().map(|f| &f.ident).collect();

    let encode_fields = field_names.iter().map(|name| {
        quote! {
            crate::types::encoding::Encode::encode(&self.#name, out);
        }
    });

    let decode_fields = field_names.iter().map(|name| {
        quote! {
            #name: crate::types::encoding::Decode::decode(input)?,
        }
    });

    quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #(#encode_fields)*
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                Ok(Self {
                    #(#decode_fields)*
                })
            }
        }
    }
}

/// Generates `Encode` and `Decode` for tuple structs.
///
/// Tuple structs have fields accessed by index: `self.0`, `self.1`.
/// Common for newtype wrappers like `struct Version(u8, u8, u8)`.
fn generate_tuple_struct_impl(
    name: &syn::Ident,
    impl_generics: &syn::ImplGenerics,
    ty_generics: &syn::TypeGenerics,
    where_clause: Option<&syn::WhereClause>,
    fields: &syn::FieldsUnnamed,
) -> proc_macro2::TokenStream {
    let field_indices: Vec<_> = (0..fields.unnamed.len()).map(syn::Index::from).collect();

    let encode_fields = field_indices.iter().map(|idx| {
        quote! {
            crate::types::encoding::Encode::encode(&self.#idx, out);
        }
    });

    let decode_fields = field_indices.iter().map(|_| {
        quote! {
            crate::types::encoding::Decode::decode(input)?,
        }
    });

    quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, out: &mut S) {
                #(#encode_fields)*
            }
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                Ok(Self(
                    #(#decode_fields)*
                ))
            }
        }
    }
}

/// Generates `Encode` and `Decode` for unit structs.
///
/// Encoding writes nothing; decoding just returns `Self`.
fn generate_unit_struct_impl(
    name: &syn::Ident,
    impl_generics: &syn::ImplGenerics,
    ty_generics: &syn::TypeGenerics,
    where_clause: Option<&syn::WhereClause>,
) -> proc_macro2::TokenStream {
    quote! {
        impl #impl_generics crate::types::encoding::Encode for #name #ty_generics #where_clause {
            fn encode<S: crate::types::encoding::EncodeSink>(&self, _out: &mut S) {}
        }

        impl #impl_generics crate::types::encoding::Decode for #name #ty_generics #where_clause {
            fn decode(_input: &mut &[u8]) -> ::std::result::Result<Self, crate::types::encoding::DecodeError> {
                Ok(Self)
            }
        }
    }
}
