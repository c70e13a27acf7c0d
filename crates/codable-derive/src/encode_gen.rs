use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Ident;

use crate::key_tree::{build_tree, Direction, KeyPathNode};
use crate::keys_gen::KeyRegistry;
use crate::registration::Registration;

/// How the generated arms reach a field's value: through `self` in the
/// struct impl, or through a match-arm binding in enum variant arms.
#[derive(Clone, Copy)]
pub enum FieldAccess {
    SelfRef,
    Binding,
}

impl FieldAccess {
    fn expr(self, reg: &Registration) -> TokenStream {
        let ident = &reg.ident;
        match self {
            FieldAccess::SelfRef => quote! { &self.#ident },
            FieldAccess::Binding => quote! { #ident },
        }
    }
}

pub fn generate_encode_impl(
    type_ident: &Ident,
    regs: &[Registration],
    keys: &mut KeyRegistry,
) -> TokenStream {
    let type_name = type_ident.to_string();
    let body = encode_body(&type_name, regs, keys, FieldAccess::SelfRef);
    quote! {
        impl ::codable::Encode for #type_ident {
            fn encode(&self) -> ::core::result::Result<::codable::Value, ::codable::CodableError> {
                #body
            }
        }
    }
}

fn encode_body(
    type_name: &str,
    regs: &[Registration],
    keys: &mut KeyRegistry,
    access: FieldAccess,
) -> TokenStream {
    if let Some(reg) = regs.iter().find(|r| r.encodes() && r.encode_path.is_empty()) {
        return whole_value_expr(reg, access);
    }
    if !regs.iter().any(|r| r.encodes()) {
        return quote! {
            ::core::result::Result::Ok(::codable::Value::Object(::codable::Map::new()))
        };
    }
    let writes = encode_fields(&quote!(&mut __root), regs, keys, access);
    quote! {
        let mut __root = ::codable::Map::new();
        #writes
        ::core::result::Result::Ok(::codable::Value::Object(__root))
    }
}

/// Write statements for every encoded field, creating each intermediate
/// container unconditionally. Shared between the struct impl and enum
/// struct-variant arms, which differ only in the destination object and
/// the field access mode.
pub fn encode_fields(
    obj: &TokenStream,
    regs: &[Registration],
    keys: &mut KeyRegistry,
    access: FieldAccess,
) -> TokenStream {
    let tree = build_tree(regs, Direction::Encode);
    let mut counter = 0usize;
    gen_node(&tree, obj, regs, keys, access, &mut counter)
}

fn whole_value_expr(reg: &Registration, access: FieldAccess) -> TokenStream {
    let value = access.expr(reg);
    match &reg.helper {
        Some(helper) => {
            if reg.is_optional {
                quote! {
                    match #value {
                        ::core::option::Option::Some(__inner) => {
                            ::codable::HelperCoder::encode(&(#helper), __inner)
                        }
                        ::core::option::Option::None => {
                            ::core::result::Result::Ok(::codable::Value::Null)
                        }
                    }
                }
            } else {
                quote! { ::codable::HelperCoder::encode(&(#helper), #value) }
            }
        }
        None => quote! { ::codable::Encode::encode(#value) },
    }
}

fn gen_node(
    node: &KeyPathNode,
    obj: &TokenStream,
    regs: &[Registration],
    keys: &mut KeyRegistry,
    access: FieldAccess,
    counter: &mut usize,
) -> TokenStream {
    let mut stmts = Vec::new();

    for &index in &node.fields {
        stmts.push(gen_write(&regs[index], obj, keys, access));
    }

    for (segment, child) in &node.children {
        let key = keys.key_expr(segment);
        *counter += 1;
        let nested = format_ident!("__e{}", counter);
        let inner = gen_node(child, &quote!(#nested), regs, keys, access, counter);
        stmts.push(quote! {
            {
                let #nested = ::codable::nested_mut(#obj, #key);
                #inner
            }
        });
    }

    quote! { #(#stmts)* }
}

fn gen_write(
    reg: &Registration,
    obj: &TokenStream,
    keys: &mut KeyRegistry,
    access: FieldAccess,
) -> TokenStream {
    let key = match reg.encode_key() {
        Some(key) => key.to_string(),
        None => return TokenStream::new(),
    };
    let key_expr = keys.key_expr(&key);
    let value = access.expr(reg);

    match (&reg.helper, reg.is_optional) {
        (Some(helper), true) => quote! {
            ::codable::helpers::encode_optional_with(&(#helper), #obj, #key_expr, #value)?;
        },
        (Some(helper), false) => quote! {
            ::codable::helpers::encode_field_with(&(#helper), #obj, #key_expr, #value)?;
        },
        (None, true) => quote! {
            ::codable::helpers::encode_optional(#obj, #key_expr, #value)?;
        },
        (None, false) => quote! {
            ::codable::helpers::encode_field(#obj, #key_expr, #value)?;
        },
    }
}

/// Enum-variant entry point: the variant arm already holds a `__root`
/// with the discriminator written, so payload writes append to it.
pub fn encode_variant_fields(
    root: &TokenStream,
    regs: &[Registration],
    keys: &mut KeyRegistry,
) -> TokenStream {
    encode_fields(root, regs, keys, FieldAccess::Binding)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Diagnostics;
    use crate::registration::{build_registration, FieldDescriptor};
    use syn::parse_quote;

    fn regs(fields: Vec<syn::Field>) -> Vec<Registration> {
        let mut diags = Diagnostics::new();
        let out: Vec<Registration> = fields
            .iter()
            .map(|f| {
                let desc = FieldDescriptor::from_field(f).unwrap();
                build_registration(&desc, &[], &mut diags).unwrap()
            })
            .collect();
        assert!(!diags.has_errors());
        out
    }

    fn generated(fields: Vec<syn::Field>) -> String {
        let mut keys = KeyRegistry::new();
        let ident: Ident = parse_quote!(Sample);
        generate_encode_impl(&ident, &regs(fields), &mut keys).to_string()
    }

    #[test]
    fn nested_container_is_created_unconditionally() {
        let tokens = generated(vec![parse_quote! {
            #[codable(at = "deeply.nested.key", default = 0)]
            value: i64
        }]);
        assert_eq!(tokens.matches("nested_mut").count(), 2);
    }

    #[test]
    fn shared_prefix_writes_into_one_container() {
        let tokens = generated(vec![
            parse_quote! {
                #[codable(at = "info.name")]
                name: String
            },
            parse_quote! {
                #[codable(at = "info.age")]
                age: i64
            },
        ]);
        assert_eq!(tokens.matches("nested_mut").count(), 1);
        assert_eq!(tokens.matches("encode_field").count(), 2);
    }

    #[test]
    fn optional_fields_use_the_omitting_writer() {
        let tokens = generated(vec![parse_quote!(label: Option<String>)]);
        assert!(tokens.contains("encode_optional"));
    }

    #[test]
    fn encode_skip_drops_the_write() {
        let tokens = generated(vec![
            parse_quote!(kept: i64),
            parse_quote! {
                #[codable(skip_encode)]
                hidden: Option<i64>
            },
        ]);
        assert_eq!(tokens.matches("encode_field").count(), 1);
        assert!(!tokens.contains("hidden"));
    }

    #[test]
    fn whole_value_delegates_encoding() {
        let tokens = generated(vec![parse_quote! {
            #[codable(at)]
            value: i64
        }]);
        assert!(!tokens.contains("Map :: new"));
        assert!(tokens.contains("Encode :: encode"));
    }
}
