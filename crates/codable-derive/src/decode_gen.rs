use proc_macro2::TokenStream;
use quote::{format_ident, quote};
use syn::Ident;

use crate::key_tree::{
    build_tree, subtree_has_default, subtree_has_required, Direction, KeyPathNode,
};
use crate::keys_gen::KeyRegistry;
use crate::registration::Registration;

/// How the current container level was opened. Strict levels hold a live
/// `&Map`; the other two hold an `Option<&Map>`, with probing levels
/// additionally carrying whether the chain broke on a missing key (as
/// opposed to a present non-object), so defaulted fields can pick the
/// right fallback expression.
enum Parent {
    Strict(TokenStream),
    Opt(Ident),
    Probe(Ident, Ident),
}

pub fn generate_decode_impl(
    type_ident: &Ident,
    regs: &[Registration],
    keys: &mut KeyRegistry,
) -> TokenStream {
    let type_name = type_ident.to_string();
    let body = decode_body(&type_name, regs, keys);
    let inits = field_inits(regs);
    quote! {
        impl ::codable::Decode for #type_ident {
            fn decode(value: &::codable::Value) -> ::core::result::Result<Self, ::codable::CodableError> {
                #body
                ::core::result::Result::Ok(Self { #(#inits),* })
            }
        }
    }
}

/// Statements that bind one local per decoded field. Shared between the
/// struct impl and enum struct-variant match arms.
pub fn decode_body(type_name: &str, regs: &[Registration], keys: &mut KeyRegistry) -> TokenStream {
    if let Some(reg) = regs.iter().find(|r| r.decodes() && r.decode_path.is_empty()) {
        return whole_value_stmt(reg);
    }
    if !regs.iter().any(|r| r.decodes()) {
        // still insist on a keyed container even with nothing to read
        return quote! {
            ::codable::as_object(value, #type_name)?;
        };
    }
    let root = quote! { __obj };
    let fields = decode_fields(&root, type_name, regs, keys);
    quote! {
        let __obj = ::codable::as_object(value, #type_name)?;
        #fields
    }
}

/// One constructor entry per field; decode-skipped fields use their
/// replacement expression.
pub fn field_inits(regs: &[Registration]) -> Vec<TokenStream> {
    regs.iter()
        .map(|reg| {
            let ident = &reg.ident;
            match &reg.decode_replacement {
                Some(expr) => quote! { #ident: #expr },
                None => quote! { #ident },
            }
        })
        .collect()
}

/// Walks the decode-side key tree from an already opened root object.
pub fn decode_fields(
    root: &TokenStream,
    type_name: &str,
    regs: &[Registration],
    keys: &mut KeyRegistry,
) -> TokenStream {
    let tree = build_tree(regs, Direction::Decode);
    let mut counter = 0usize;
    gen_node(&tree, &Parent::Strict(root.clone()), type_name, regs, keys, &mut counter)
}

fn whole_value_stmt(reg: &Registration) -> TokenStream {
    let ident = &reg.ident;
    let ty = &reg.ty;
    match (&reg.helper, &reg.default) {
        (None, None) => quote! {
            let #ident = <#ty as ::codable::Decode>::decode(value)?;
        },
        (None, Some(default)) => {
            let on_error = &default.on_error;
            quote! {
                let #ident = match <#ty as ::codable::Decode>::decode(value) {
                    ::core::result::Result::Ok(__v) => __v,
                    ::core::result::Result::Err(_) => #on_error,
                };
            }
        }
        (Some(helper), None) => {
            if reg.is_optional {
                quote! {
                    let #ident = if value.is_null() {
                        ::core::option::Option::None
                    } else {
                        ::core::option::Option::Some(::codable::HelperCoder::decode(&(#helper), value)?)
                    };
                }
            } else {
                quote! {
                    let #ident = ::codable::HelperCoder::decode(&(#helper), value)?;
                }
            }
        }
        (Some(helper), Some(default)) => {
            let on_error = &default.on_error;
            let wrap = if reg.is_optional {
                quote! { ::core::option::Option::Some(__v) }
            } else {
                quote! { __v }
            };
            quote! {
                let #ident = match ::codable::HelperCoder::decode(&(#helper), value) {
                    ::core::result::Result::Ok(__v) => #wrap,
                    ::core::result::Result::Err(_) => #on_error,
                };
            }
        }
    }
}

fn gen_node(
    node: &KeyPathNode,
    parent: &Parent,
    type_name: &str,
    regs: &[Registration],
    keys: &mut KeyRegistry,
    counter: &mut usize,
) -> TokenStream {
    let mut stmts = Vec::new();

    for &index in &node.fields {
        stmts.push(gen_terminal(&regs[index], parent, type_name, keys));
    }

    for (segment, child) in &node.children {
        let key = keys.key_expr(segment);
        let has_default = subtree_has_default(child, regs);
        let has_required = subtree_has_required(child, regs);
        *counter += 1;
        let obj = format_ident!("__c{}", counter);
        let missing = format_ident!("__m{}", counter);

        match parent {
            Parent::Strict(p) => {
                if has_default {
                    let probe = probe_open(&quote!(#p), &key);
                    stmts.push(quote! { let (#obj, #missing) = #probe; });
                    stmts.push(gen_node(
                        child,
                        &Parent::Probe(obj, missing),
                        type_name,
                        regs,
                        keys,
                        counter,
                    ));
                } else if has_required {
                    stmts.push(quote! {
                        let #obj = ::codable::nested(#p, #key, #type_name)?;
                    });
                    stmts.push(gen_node(
                        child,
                        &Parent::Strict(quote!(#obj)),
                        type_name,
                        regs,
                        keys,
                        counter,
                    ));
                } else {
                    stmts.push(quote! {
                        let #obj = ::codable::nested_opt(#p, #key);
                    });
                    stmts.push(gen_node(child, &Parent::Opt(obj), type_name, regs, keys, counter));
                }
            }
            Parent::Opt(p) => {
                // an optionally opened level never covers defaulted or
                // required fields, so its children stay optional too
                stmts.push(quote! {
                    let #obj = #p.and_then(|__o| ::codable::nested_opt(__o, #key));
                });
                stmts.push(gen_node(child, &Parent::Opt(obj), type_name, regs, keys, counter));
            }
            Parent::Probe(p, pm) => {
                if has_default || has_required {
                    let probe = probe_open(&quote!(__o), &key);
                    stmts.push(quote! {
                        let (#obj, #missing) = match #p {
                            ::core::option::Option::Some(__o) => #probe,
                            ::core::option::Option::None => (::core::option::Option::None, #pm),
                        };
                    });
                    stmts.push(gen_node(
                        child,
                        &Parent::Probe(obj, missing),
                        type_name,
                        regs,
                        keys,
                        counter,
                    ));
                } else {
                    stmts.push(quote! {
                        let #obj = #p.and_then(|__o| ::codable::nested_opt(__o, #key));
                    });
                    stmts.push(gen_node(child, &Parent::Opt(obj), type_name, regs, keys, counter));
                }
            }
        }
    }

    quote! { #(#stmts)* }
}

fn probe_open(obj: &TokenStream, key: &TokenStream) -> TokenStream {
    quote! {
        match ::codable::probe(#obj, #key) {
            ::codable::Probe::Found(__inner) => (::core::option::Option::Some(__inner), false),
            ::codable::Probe::Missing => (::core::option::Option::None, true),
            ::codable::Probe::Invalid => (::core::option::Option::None, false),
        }
    }
}

fn gen_terminal(
    reg: &Registration,
    parent: &Parent,
    type_name: &str,
    keys: &mut KeyRegistry,
) -> TokenStream {
    let key = match reg.decode_key() {
        Some(key) => key.to_string(),
        None => return TokenStream::new(),
    };
    let key_expr = keys.key_expr(&key);
    let ident = &reg.ident;
    let ty = &reg.ty;
    let field_name = &reg.field_name;

    if let Some(default) = &reg.default {
        let missing_expr = &default.missing;
        let error_expr = &default.on_error;
        let attempt = |obj: TokenStream| {
            let probe_call = match &reg.helper {
                Some(helper) => quote! {
                    ::codable::helpers::try_decode_with(&(#helper), #obj, #key_expr)
                },
                None => quote! {
                    ::codable::helpers::try_decode::<#ty>(#obj, #key_expr)
                },
            };
            // a helper decodes the inner value of an Option field
            let value_arm = if reg.helper.is_some() && reg.is_optional {
                quote! { ::core::option::Option::Some(__v) }
            } else {
                quote! { __v }
            };
            quote! {
                match #probe_call {
                    ::codable::Decoded::Value(__v) => #value_arm,
                    ::codable::Decoded::Missing => #missing_expr,
                    ::codable::Decoded::Error(_) => #error_expr,
                }
            }
        };
        return match parent {
            Parent::Strict(p) => {
                let attempt = attempt(quote!(#p));
                quote! { let #ident = #attempt; }
            }
            Parent::Probe(p, pm) => {
                let attempt = attempt(quote!(__o));
                quote! {
                    let #ident = match #p {
                        ::core::option::Option::Some(__o) => #attempt,
                        ::core::option::Option::None if #pm => #missing_expr,
                        ::core::option::Option::None => #error_expr,
                    };
                }
            }
            Parent::Opt(p) => {
                let attempt = attempt(quote!(__o));
                quote! {
                    let #ident = match #p {
                        ::core::option::Option::Some(__o) => #attempt,
                        ::core::option::Option::None => #missing_expr,
                    };
                }
            }
        };
    }

    if reg.is_optional {
        let call = |obj: TokenStream| match (&reg.helper, &reg.inner_ty) {
            (Some(helper), _) => quote! {
                ::codable::helpers::decode_optional_with(&(#helper), #obj, #key_expr, #type_name, #field_name)?
            },
            (None, Some(inner)) => quote! {
                ::codable::helpers::decode_optional::<#inner>(#obj, #key_expr, #type_name, #field_name)?
            },
            (None, None) => quote! {
                ::codable::helpers::decode_required::<#ty>(#obj, #key_expr, #type_name, #field_name)?
            },
        };
        return match parent {
            Parent::Strict(p) => {
                let call = call(quote!(#p));
                quote! { let #ident = #call; }
            }
            Parent::Opt(p) | Parent::Probe(p, _) => {
                let call = call(quote!(__o));
                quote! {
                    let #ident = match #p {
                        ::core::option::Option::Some(__o) => #call,
                        ::core::option::Option::None => ::core::option::Option::None,
                    };
                }
            }
        };
    }

    let call = |obj: TokenStream| match &reg.helper {
        Some(helper) => quote! {
            ::codable::helpers::decode_required_with(&(#helper), #obj, #key_expr, #type_name, #field_name)?
        },
        None => quote! {
            ::codable::helpers::decode_required::<#ty>(#obj, #key_expr, #type_name, #field_name)?
        },
    };
    match parent {
        Parent::Strict(p) => {
            let call = call(quote!(#p));
            quote! { let #ident = #call; }
        }
        Parent::Probe(p, pm) => {
            let call = call(quote!(__o));
            quote! {
                let #ident = match #p {
                    ::core::option::Option::Some(__o) => #call,
                    ::core::option::Option::None if #pm => return ::core::result::Result::Err(
                        ::codable::CodableError::missing_key(#type_name, #field_name, #key_expr),
                    ),
                    ::core::option::Option::None => return ::core::result::Result::Err(
                        ::codable::CodableError::invalid_container(#type_name, #key_expr, "non-object"),
                    ),
                };
            }
        }
        Parent::Opt(p) => {
            let call = call(quote!(__o));
            quote! {
                let #ident = match #p {
                    ::core::option::Option::Some(__o) => #call,
                    ::core::option::Option::None => return ::core::result::Result::Err(
                        ::codable::CodableError::missing_key(#type_name, #field_name, #key_expr),
                    ),
                };
            }
        }
    }
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
        generate_decode_impl(&ident, &regs(fields), &mut keys).to_string()
    }

    #[test]
    fn shared_prefix_opens_one_container() {
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
        // both fields are required, so the shared level opens strictly,
        // exactly once
        assert_eq!(tokens.matches("nested (").count() + tokens.matches("nested(").count(), 1);
    }

    #[test]
    fn defaulted_subtree_probes_instead_of_failing() {
        let tokens = generated(vec![parse_quote! {
            #[codable(at = "outer.inner", default = 0)]
            inner: i64
        }]);
        assert!(tokens.contains("probe"));
        assert!(!tokens.contains("nested ("));
    }

    #[test]
    fn all_optional_subtree_opens_leniently() {
        let tokens = generated(vec![parse_quote! {
            #[codable(at = "outer.inner")]
            inner: Option<i64>
        }]);
        assert!(tokens.contains("nested_opt"));
        assert!(!tokens.contains("probe"));
    }

    #[test]
    fn whole_value_shortcut_skips_the_object_root() {
        let tokens = generated(vec![parse_quote! {
            #[codable(at)]
            value: i64
        }]);
        assert!(!tokens.contains("as_object"));
        assert!(tokens.contains("Decode > :: decode"));
    }

    #[test]
    fn skipped_field_is_constructed_from_its_replacement() {
        let tokens = generated(vec![
            parse_quote!(kept: i64),
            parse_quote! {
                #[codable(skip = 7)]
                dropped: i64
            },
        ]);
        assert!(tokens.contains("dropped : 7"));
    }
}
