//! Derive macro for `codable`'s `Decode` and `Encode` traits.
//!
//! `#[derive(Codable)]` synthesizes both trait impls from the field and
//! type layout, steered by `#[codable(...)]` attributes: dotted key
//! paths (`at`, `decode_at`, `encode_at`, `within`), fallback values
//! (`default`, `on_error`), helper coders (`with`), field skipping
//! (`skip`, `skip_decode`, `skip_encode`), and enum discriminators
//! (`tag`, `tag_type`). Attribute misuse is reported as aggregated
//! compile errors rather than stopping at the first problem.

mod decode_gen;
mod diagnostics;
mod directives;
mod encode_gen;
mod enum_gen;
mod key_tree;
mod keys_gen;
mod registration;

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::{parse_macro_input, Data, DataStruct, DeriveInput, Expr, Fields, Ident};

use diagnostics::{Diagnostics, Scope};
use directives::{Directive, DirectiveKind};
use keys_gen::KeyRegistry;
use registration::{build_registrations, FieldDescriptor};

#[proc_macro_derive(Codable, attributes(codable))]
pub fn derive_codable(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand(input: &DeriveInput) -> syn::Result<TokenStream2> {
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new_spanned(
            &input.generics,
            "Codable does not support generic types",
        ));
    }
    match &input.data {
        Data::Struct(data) => expand_struct(input, data),
        Data::Enum(data) => enum_gen::expand_enum(input, data),
        Data::Union(_) => Err(syn::Error::new(
            input.ident.span(),
            "Codable supports structs and enums, not unions",
        )),
    }
}

fn expand_struct(input: &DeriveInput, data: &DataStruct) -> syn::Result<TokenStream2> {
    let ident = &input.ident;
    let fields = match &data.fields {
        Fields::Named(fields) => &fields.named,
        _ => {
            return Err(syn::Error::new(
                ident.span(),
                "Codable structs need named fields",
            ));
        }
    };

    let mut diags = Diagnostics::new();
    let type_occ = directives::parse_directives(&input.attrs)?;
    registration::validate_occurrences(&type_occ, Scope::Type, &mut diags);

    let mut type_scope: Vec<String> = Vec::new();
    let mut type_helper: Option<Expr> = None;
    let mut init = false;
    for occ in &type_occ {
        match &occ.directive {
            Directive::At(segments) => {
                if segments.is_empty() {
                    diags.advisory(
                        DirectiveKind::At,
                        occ.span,
                        "an empty type-level path has no effect",
                    );
                } else {
                    type_scope = segments.clone();
                }
            }
            Directive::TagType(_) => {
                diags.misuse(DirectiveKind::TagType, occ.span, "`tag_type` is only valid on enums");
            }
            Directive::With(expr) => type_helper = Some(expr.clone()),
            Directive::Init => init = true,
            _ => {}
        }
    }

    let descriptors = fields
        .iter()
        .map(FieldDescriptor::from_field)
        .collect::<syn::Result<Vec<_>>>()?;
    let mut regs = build_registrations(&descriptors, &type_scope, &mut diags);
    registration::apply_type_helper(&mut regs, type_helper.as_ref());

    // the whole-value shortcut rebinds the entire input, so no other
    // field may code alongside it
    let active = regs.iter().filter(|r| r.decodes() || r.encodes()).count();
    for reg in &regs {
        if reg.is_whole_value() && active > 1 {
            diags.misuse(
                DirectiveKind::At,
                reg.span,
                "a whole-value field must be the only coded field of its type",
            );
        }
    }

    let mut init_inits: Vec<TokenStream2> = Vec::new();
    if init {
        for reg in &regs {
            match reg.init_expr() {
                Some(expr) => {
                    let field = &reg.ident;
                    init_inits.push(quote! { #field: #expr });
                }
                None => diags.misuse(
                    DirectiveKind::Init,
                    reg.span,
                    format!("`init` needs a default value for `{}`", reg.field_name),
                ),
            }
        }
    }

    if diags.has_errors() {
        let errors = diags.to_compile_errors();
        let stubs = stub_impls(ident);
        return Ok(quote! { #errors #stubs });
    }

    let mut keys = KeyRegistry::new();
    for reg in &regs {
        if reg.decodes() {
            for segment in &reg.decode_path {
                keys.intern(segment);
            }
        }
        if reg.encodes() {
            for segment in &reg.encode_path {
                keys.intern(segment);
            }
        }
    }

    let decode = decode_gen::generate_decode_impl(ident, &regs, &mut keys);
    let encode = encode_gen::generate_encode_impl(ident, &regs, &mut keys);
    let keys_enum = keys.emit();

    let default_impl = init.then(|| {
        quote! {
            impl ::core::default::Default for #ident {
                fn default() -> Self {
                    Self { #(#init_inits),* }
                }
            }
        }
    });

    Ok(quote! {
        const _: () = {
            #keys_enum
            #decode
            #encode
        };
        #default_impl
    })
}

/// Inert impls emitted next to the compile errors so a broken derive does
/// not cascade into unrelated "trait not implemented" noise.
pub(crate) fn stub_impls(ident: &Ident) -> TokenStream2 {
    quote! {
        impl ::codable::Decode for #ident {
            fn decode(_value: &::codable::Value) -> ::core::result::Result<Self, ::codable::CodableError> {
                ::core::unreachable!()
            }
        }
        impl ::codable::Encode for #ident {
            fn encode(&self) -> ::core::result::Result<::codable::Value, ::codable::CodableError> {
                ::core::unreachable!()
            }
        }
    }
}
