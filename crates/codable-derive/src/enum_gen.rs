use proc_macro2::{Literal, Span, TokenStream};
use quote::quote;
use syn::spanned::Spanned;
use syn::{DataEnum, DeriveInput, Expr, Fields, Ident, Type};

use crate::diagnostics::{Diagnostics, Scope};
use crate::directives::{self, Directive, DirectiveKind, TagValue};
use crate::keys_gen::KeyRegistry;
use crate::registration::{
    self, build_registrations, extract_option_inner, FieldDescriptor, Registration,
};
use crate::{decode_gen, encode_gen};

/// What the discriminator decodes as. Without `tag_type` the tag is
/// probed leniently as an optional string; with one, it is decoded
/// strictly and a mismatch or absence is a hard error.
enum Strategy {
    Probing,
    Strict { ty: Type, class: TagClass },
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum TagClass {
    Str,
    Int,
    Float,
    Bool,
}

fn tag_class(ty: &Type) -> Option<TagClass> {
    let path = match ty {
        Type::Path(type_path) if type_path.qself.is_none() => &type_path.path,
        _ => return None,
    };
    let ident = path.segments.last()?.ident.to_string();
    match ident.as_str() {
        "String" => Some(TagClass::Str),
        "i8" | "i16" | "i32" | "i64" | "u8" | "u16" | "u32" | "u64" | "usize" => {
            Some(TagClass::Int)
        }
        "f32" | "f64" => Some(TagClass::Float),
        "bool" => Some(TagClass::Bool),
        _ => None,
    }
}

struct TupleSlot {
    ty: Type,
    inner: Option<Type>,
}

enum VariantKind {
    Unit,
    Newtype(Type),
    Tuple(Vec<TupleSlot>),
    Struct(Vec<Registration>),
}

struct VariantPlan {
    ident: Ident,
    tag: TagValue,
    span: Span,
    kind: VariantKind,
}

pub fn expand_enum(input: &DeriveInput, data: &DataEnum) -> syn::Result<TokenStream> {
    let ident = &input.ident;
    let type_name = ident.to_string();
    let mut diags = Diagnostics::new();

    let type_occ = directives::parse_directives(&input.attrs)?;
    registration::validate_occurrences(&type_occ, Scope::Type, &mut diags);

    let mut tag_path: Option<Vec<String>> = None;
    let mut tag_type: Option<(Type, Span)> = None;
    let mut type_helper: Option<Expr> = None;
    for occ in &type_occ {
        match &occ.directive {
            Directive::At(segments) => {
                if segments.is_empty() {
                    diags.misuse(
                        DirectiveKind::At,
                        occ.span,
                        "the discriminator path needs at least one segment",
                    );
                } else {
                    tag_path = Some(segments.clone());
                }
            }
            Directive::TagType(ty) => tag_type = Some((ty.clone(), occ.span)),
            Directive::With(expr) => type_helper = Some(expr.clone()),
            Directive::Init => {
                diags.misuse(DirectiveKind::Init, occ.span, "`init` is only supported on structs");
            }
            _ => {}
        }
    }
    let tag_path = tag_path.unwrap_or_else(|| vec!["type".to_string()]);

    let strategy = match tag_type {
        Some((ty, span)) => match tag_class(&ty) {
            Some(class) => Strategy::Strict { ty, class },
            None => {
                diags.misuse(
                    DirectiveKind::TagType,
                    span,
                    "`tag_type` must be String, bool, or a primitive number type",
                );
                Strategy::Probing
            }
        },
        None => Strategy::Probing,
    };

    let mut variants = Vec::new();
    for variant in &data.variants {
        variants.push(parse_variant(variant, type_helper.as_ref(), &mut diags)?);
    }
    check_tags(&variants, &strategy, &mut diags);

    if diags.has_errors() {
        let errors = diags.to_compile_errors();
        let stubs = crate::stub_impls(ident);
        return Ok(quote! { #errors #stubs });
    }

    let mut keys = KeyRegistry::new();
    pre_intern(&variants, &tag_path, &mut keys);

    let decode_impl = generate_decode(ident, &type_name, &variants, &strategy, &tag_path, &mut keys);
    let encode_impl = generate_encode(ident, &type_name, &variants, &tag_path, &mut keys);
    let keys_enum = keys.emit();

    Ok(quote! {
        const _: () = {
            #keys_enum
            #decode_impl
            #encode_impl
        };
    })
}

fn parse_variant(
    variant: &syn::Variant,
    type_helper: Option<&Expr>,
    diags: &mut Diagnostics,
) -> syn::Result<VariantPlan> {
    let occurrences = directives::parse_directives(&variant.attrs)?;
    registration::validate_occurrences(&occurrences, Scope::Variant, diags);

    let tag = occurrences
        .iter()
        .find_map(|occ| match &occ.directive {
            Directive::Tag(value) => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| TagValue::Str(variant.ident.to_string()));

    let kind = match &variant.fields {
        Fields::Unit => VariantKind::Unit,
        Fields::Unnamed(fields) => {
            for field in &fields.unnamed {
                for occ in directives::parse_directives(&field.attrs)? {
                    diags.misuse(
                        occ.directive.kind(),
                        occ.span,
                        "attributes are not supported on unnamed payload fields",
                    );
                }
            }
            if fields.unnamed.len() == 1 {
                VariantKind::Newtype(fields.unnamed[0].ty.clone())
            } else {
                VariantKind::Tuple(
                    fields
                        .unnamed
                        .iter()
                        .map(|f| TupleSlot {
                            inner: extract_option_inner(&f.ty).cloned(),
                            ty: f.ty.clone(),
                        })
                        .collect(),
                )
            }
        }
        Fields::Named(fields) => {
            let descriptors = fields
                .named
                .iter()
                .map(FieldDescriptor::from_field)
                .collect::<syn::Result<Vec<_>>>()?;
            let mut regs = build_registrations(&descriptors, &[], diags);
            registration::apply_type_helper(&mut regs, type_helper);
            for reg in &regs {
                if reg.is_whole_value() {
                    diags.misuse(
                        DirectiveKind::At,
                        reg.span,
                        "the whole-value shortcut is not available inside enum payloads",
                    );
                }
            }
            VariantKind::Struct(regs)
        }
    };

    Ok(VariantPlan {
        ident: variant.ident.clone(),
        span: variant.span(),
        tag,
        kind,
    })
}

fn check_tags(variants: &[VariantPlan], strategy: &Strategy, diags: &mut Diagnostics) {
    for (index, variant) in variants.iter().enumerate() {
        match strategy {
            Strategy::Probing => match &variant.tag {
                TagValue::Str(_) | TagValue::Null => {}
                _ => diags.misuse(
                    DirectiveKind::Tag,
                    variant.span,
                    "a non-string tag requires a type-level `tag_type`",
                ),
            },
            Strategy::Strict { class, .. } => {
                let compatible = matches!(
                    (class, &variant.tag),
                    (TagClass::Str, TagValue::Str(_))
                        | (TagClass::Int, TagValue::Int(_))
                        | (TagClass::Float, TagValue::Int(_))
                        | (TagClass::Float, TagValue::Float(_))
                        | (TagClass::Bool, TagValue::Bool(_))
                );
                if !compatible {
                    let message = if matches!(variant.tag, TagValue::Null) {
                        "a null tag requires the probing strategy; remove `tag_type`"
                    } else {
                        "the variant's tag literal does not match the declared `tag_type`"
                    };
                    diags.misuse(DirectiveKind::Tag, variant.span, message);
                }
            }
        }
        if variants[..index].iter().any(|other| other.tag == variant.tag) {
            diags.misuse(
                DirectiveKind::Tag,
                variant.span,
                format!("duplicate discriminator `{}`", variant.tag.display()),
            );
        }
    }
}

/// Registry order: payload keys in variant declaration order, then the
/// discriminator path.
fn pre_intern(variants: &[VariantPlan], tag_path: &[String], keys: &mut KeyRegistry) {
    for variant in variants {
        match &variant.kind {
            VariantKind::Unit | VariantKind::Newtype(_) => {}
            VariantKind::Tuple(slots) => {
                for index in 0..slots.len() {
                    keys.intern(&format!("_{index}"));
                }
            }
            VariantKind::Struct(regs) => {
                for reg in regs {
                    for segment in &reg.decode_path {
                        keys.intern(segment);
                    }
                    for segment in &reg.encode_path {
                        keys.intern(segment);
                    }
                }
            }
        }
    }
    for segment in tag_path {
        keys.intern(segment);
    }
}

fn strict_lit(tag: &TagValue, class: TagClass) -> TokenStream {
    match (class, tag) {
        (TagClass::Str, TagValue::Str(s)) => quote! { #s },
        (TagClass::Int, TagValue::Int(n)) => {
            let lit = Literal::i64_unsuffixed(*n);
            quote! { #lit }
        }
        (TagClass::Float, TagValue::Int(n)) => {
            let lit = Literal::f64_unsuffixed(*n as f64);
            quote! { #lit }
        }
        (TagClass::Float, TagValue::Float(f)) => {
            let lit = Literal::f64_unsuffixed(*f);
            quote! { #lit }
        }
        (TagClass::Bool, TagValue::Bool(b)) => quote! { #b },
        // incompatible pairs were rejected during validation
        _ => TokenStream::new(),
    }
}

fn generate_decode(
    ident: &Ident,
    type_name: &str,
    variants: &[VariantPlan],
    strategy: &Strategy,
    tag_path: &[String],
    keys: &mut KeyRegistry,
) -> TokenStream {
    let (prefix, tag_key) = match tag_path.split_last() {
        Some((key, prefix)) => (prefix, key.as_str()),
        None => (&tag_path[..], "type"),
    };
    let tag_key_expr = keys.key_expr(tag_key);

    let mut stmts = Vec::new();
    let mut arms = Vec::new();
    let valid: Vec<String> = variants.iter().map(|v| v.tag.display()).collect();

    match strategy {
        Strategy::Strict { ty, class } => {
            stmts.push(quote! {
                let __tag_obj = ::codable::as_object(value, #type_name)?;
            });
            for segment in prefix {
                let key = keys.key_expr(segment);
                stmts.push(quote! {
                    let __tag_obj = ::codable::nested(__tag_obj, #key, #type_name)?;
                });
            }
            stmts.push(quote! {
                let __tag = ::codable::helpers::decode_required::<#ty>(
                    __tag_obj, #tag_key_expr, #type_name, "tag",
                )?;
            });
            for variant in variants {
                let lit = strict_lit(&variant.tag, *class);
                let body = decode_arm(ident, type_name, variant, keys);
                arms.push(quote! {
                    if __tag == #lit {
                        #body
                    }
                });
            }
            stmts.push(quote! {
                #(#arms)*
                ::core::result::Result::Err(::codable::CodableError::no_variant_matched(
                    #type_name,
                    __tag.to_string(),
                    ::std::vec![#(#valid.to_string()),*],
                ))
            });
        }
        Strategy::Probing => {
            // probing relaxes the tag lookup, never the root container
            stmts.push(quote! {
                let __tag_obj = ::core::option::Option::Some(::codable::as_object(value, #type_name)?);
            });
            for segment in prefix {
                let key = keys.key_expr(segment);
                stmts.push(quote! {
                    let __tag_obj = __tag_obj.and_then(|__o| ::codable::nested_opt(__o, #key));
                });
            }
            stmts.push(quote! {
                let __tag = __tag_obj.and_then(|__o| ::codable::helpers::probe_string(__o, #tag_key_expr));
            });
            for variant in variants {
                let body = decode_arm(ident, type_name, variant, keys);
                let cond = match &variant.tag {
                    TagValue::Null => quote! { __tag.is_none() },
                    TagValue::Str(s) => quote! {
                        __tag.as_deref() == ::core::option::Option::Some(#s)
                    },
                    // other literal classes were rejected during validation
                    _ => continue,
                };
                arms.push(quote! {
                    if #cond {
                        #body
                    }
                });
            }
            stmts.push(quote! {
                #(#arms)*
                ::core::result::Result::Err(::codable::CodableError::no_variant_matched(
                    #type_name,
                    match __tag {
                        ::core::option::Option::Some(__t) => __t,
                        ::core::option::Option::None => "null".to_string(),
                    },
                    ::std::vec![#(#valid.to_string()),*],
                ))
            });
        }
    }

    quote! {
        impl ::codable::Decode for #ident {
            fn decode(value: &::codable::Value) -> ::core::result::Result<Self, ::codable::CodableError> {
                #(#stmts)*
            }
        }
    }
}

fn decode_arm(
    ident: &Ident,
    type_name: &str,
    variant: &VariantPlan,
    keys: &mut KeyRegistry,
) -> TokenStream {
    let v = &variant.ident;
    let context = format!("{type_name}::{v}");
    match &variant.kind {
        VariantKind::Unit => quote! {
            return ::core::result::Result::Ok(#ident::#v);
        },
        VariantKind::Newtype(ty) => quote! {
            return <#ty as ::codable::Decode>::decode(value).map(#ident::#v);
        },
        VariantKind::Tuple(slots) => {
            let mut stmts = Vec::new();
            let mut bindings = Vec::new();
            for (index, slot) in slots.iter().enumerate() {
                let binding = quote::format_ident!("__p{}", index);
                let key_expr = keys.key_expr(&format!("_{index}"));
                let slot_name = format!("_{index}");
                let ty = &slot.ty;
                let decode = match &slot.inner {
                    Some(inner) => quote! {
                        ::codable::helpers::decode_optional::<#inner>(
                            __payload, #key_expr, #context, #slot_name,
                        )?
                    },
                    None => quote! {
                        ::codable::helpers::decode_required::<#ty>(
                            __payload, #key_expr, #context, #slot_name,
                        )?
                    },
                };
                stmts.push(quote! { let #binding = #decode; });
                bindings.push(binding);
            }
            quote! {
                let __payload = ::codable::as_object(value, #context)?;
                #(#stmts)*
                return ::core::result::Result::Ok(#ident::#v(#(#bindings),*));
            }
        }
        VariantKind::Struct(regs) => {
            let body = decode_gen::decode_fields(&quote!(__payload), &context, regs, keys);
            let inits = decode_gen::field_inits(regs);
            quote! {
                let __payload = ::codable::as_object(value, #context)?;
                #body
                return ::core::result::Result::Ok(#ident::#v { #(#inits),* });
            }
        }
    }
}

fn generate_encode(
    ident: &Ident,
    type_name: &str,
    variants: &[VariantPlan],
    tag_path: &[String],
    keys: &mut KeyRegistry,
) -> TokenStream {
    if variants.is_empty() {
        return quote! {
            impl ::codable::Encode for #ident {
                fn encode(&self) -> ::core::result::Result<::codable::Value, ::codable::CodableError> {
                    match *self {}
                }
            }
        };
    }
    let arms: Vec<TokenStream> = variants
        .iter()
        .map(|variant| encode_arm(ident, type_name, variant, tag_path, keys))
        .collect();
    quote! {
        impl ::codable::Encode for #ident {
            fn encode(&self) -> ::core::result::Result<::codable::Value, ::codable::CodableError> {
                match self {
                    #(#arms)*
                }
            }
        }
    }
}

/// The discriminator is written before any payload so delegated payloads
/// can never displace it.
fn tag_write(tag: &TagValue, tag_path: &[String], keys: &mut KeyRegistry) -> TokenStream {
    let value = match tag {
        TagValue::Null => return TokenStream::new(),
        TagValue::Str(s) => quote! { ::codable::Value::String(#s.to_string()) },
        TagValue::Int(n) => quote! { ::codable::Value::from(#n) },
        TagValue::Float(f) => quote! { ::codable::Value::from(#f) },
        TagValue::Bool(b) => quote! { ::codable::Value::Bool(#b) },
    };
    let (prefix, tag_key) = match tag_path.split_last() {
        Some((key, prefix)) => (prefix, key.as_str()),
        None => (&tag_path[..], "type"),
    };
    let tag_key_expr = keys.key_expr(tag_key);
    let opens: Vec<TokenStream> = prefix
        .iter()
        .map(|segment| {
            let key = keys.key_expr(segment);
            quote! { let __t = ::codable::nested_mut(__t, #key); }
        })
        .collect();
    quote! {
        {
            let __t = &mut __root;
            #(#opens)*
            __t.insert((#tag_key_expr).to_string(), #value);
        }
    }
}

fn encode_arm(
    ident: &Ident,
    type_name: &str,
    variant: &VariantPlan,
    tag_path: &[String],
    keys: &mut KeyRegistry,
) -> TokenStream {
    let v = &variant.ident;
    let tag = tag_write(&variant.tag, tag_path, keys);
    match &variant.kind {
        VariantKind::Unit => {
            if tag.is_empty() {
                quote! {
                    #ident::#v => {
                        ::core::result::Result::Ok(::codable::Value::Object(::codable::Map::new()))
                    }
                }
            } else {
                quote! {
                    #ident::#v => {
                        let mut __root = ::codable::Map::new();
                        #tag
                        ::core::result::Result::Ok(::codable::Value::Object(__root))
                    }
                }
            }
        }
        VariantKind::Newtype(_) => quote! {
            #ident::#v(__inner) => {
                let mut __root = ::codable::Map::new();
                #tag
                ::codable::helpers::merge_payload(
                    &mut __root,
                    ::codable::Encode::encode(__inner)?,
                    #type_name,
                )?;
                ::core::result::Result::Ok(::codable::Value::Object(__root))
            }
        },
        VariantKind::Tuple(slots) => {
            let bindings: Vec<Ident> = (0..slots.len())
                .map(|index| quote::format_ident!("__p{}", index))
                .collect();
            let writes: Vec<TokenStream> = slots
                .iter()
                .enumerate()
                .map(|(index, slot)| {
                    let binding = &bindings[index];
                    let key_expr = keys.key_expr(&format!("_{index}"));
                    match &slot.inner {
                        Some(_) => quote! {
                            ::codable::helpers::encode_optional(&mut __root, #key_expr, #binding)?;
                        },
                        None => quote! {
                            ::codable::helpers::encode_field(&mut __root, #key_expr, #binding)?;
                        },
                    }
                })
                .collect();
            quote! {
                #ident::#v(#(#bindings),*) => {
                    let mut __root = ::codable::Map::new();
                    #tag
                    #(#writes)*
                    ::core::result::Result::Ok(::codable::Value::Object(__root))
                }
            }
        }
        VariantKind::Struct(regs) => {
            let pattern: Vec<TokenStream> = regs
                .iter()
                .map(|reg| {
                    let field = &reg.ident;
                    if reg.encodes() {
                        quote! { #field }
                    } else {
                        quote! { #field: _ }
                    }
                })
                .collect();
            let writes = encode_gen::encode_variant_fields(&quote!(&mut __root), regs, keys);
            quote! {
                #ident::#v { #(#pattern),* } => {
                    let mut __root = ::codable::Map::new();
                    #tag
                    #writes
                    ::core::result::Result::Ok(::codable::Value::Object(__root))
                }
            }
        }
    }
}
